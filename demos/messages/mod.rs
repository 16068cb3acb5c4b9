use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadRequest {
    pub image_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptRequest {
    pub prompt: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActionResponse {
    pub action: String,
    pub label: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PanelResponse {
    pub state: String,
    pub message: Option<String>,
    pub artifact_id: Option<u64>,
    pub content_type: Option<String>,
    pub size: Option<usize>,
    pub actions: Vec<ActionResponse>,
    pub notice: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowResponse {
    pub status: String,
    pub upload: Option<String>,
    pub upload_error: Option<String>,
    pub prompt: String,
    pub prompt_counter: String,
    pub can_generate_image: bool,
    pub can_generate_video: bool,
    pub image: PanelResponse,
    pub video: PanelResponse,
}
