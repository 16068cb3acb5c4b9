use argh::FromArgs;
use std::path::PathBuf;

mod messages;

// defaults for the client
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_PROJECT: &str = "default";

#[derive(FromArgs)]
/// UGC generator client for driving a project's workflow
struct ClientArgs {
    /// the host to connect to
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to connect to
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// the project whose workflow to drive
    #[argh(option, default = "DEFAULT_PROJECT.to_string()")]
    project: String,

    /// command to execute
    #[argh(subcommand)]
    command: ClientCommands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum ClientCommands {
    Upload(UploadCommand),
    Prompt(PromptCommand),
    Image(ImageCommand),
    Video(VideoCommand),
    Retry(RetryCommand),
    Download(DownloadCommand),
    Status(StatusCommand),
}

#[derive(FromArgs)]
/// Upload a product photo
#[argh(subcommand, name = "upload")]
struct UploadCommand {
    /// the path to the image
    #[argh(option, short = 'i')]
    image_path: PathBuf,
}

#[derive(FromArgs)]
/// Describe the lifestyle scene
#[argh(subcommand, name = "prompt")]
struct PromptCommand {
    /// the scene description
    #[argh(positional)]
    text: String,
}

#[derive(FromArgs)]
/// Generate (or regenerate) the lifestyle image
#[argh(subcommand, name = "image")]
struct ImageCommand {}

#[derive(FromArgs)]
/// Generate (or regenerate) the UGC video
#[argh(subcommand, name = "video")]
struct VideoCommand {}

#[derive(FromArgs)]
/// Retry the generation that failed last
#[argh(subcommand, name = "retry")]
struct RetryCommand {}

#[derive(FromArgs)]
/// Save a generated artifact on the server
#[argh(subcommand, name = "download")]
struct DownloadCommand {
    /// artifact kind: "image" or "video"
    #[argh(positional)]
    kind: String,
}

#[derive(FromArgs)]
/// Show the workflow state
#[argh(subcommand, name = "status")]
struct StatusCommand {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: ClientArgs = argh::from_env();

    let client = reqwest::Client::new();

    // format the host, port and project
    let base = format!("http://{}:{}/projects/{}", args.host, args.port, args.project);

    let response = match args.command {
        ClientCommands::Upload(upload) => {
            client
                .post(format!("{base}/media"))
                .json(&messages::UploadRequest {
                    image_path: upload.image_path,
                })
                .send()
                .await?
        }
        ClientCommands::Prompt(prompt) => {
            client
                .put(format!("{base}/prompt"))
                .json(&messages::PromptRequest { prompt: prompt.text })
                .send()
                .await?
        }
        ClientCommands::Image(_) => client.post(format!("{base}/image")).send().await?,
        ClientCommands::Video(_) => client.post(format!("{base}/video")).send().await?,
        ClientCommands::Retry(_) => client.post(format!("{base}/retry")).send().await?,
        ClientCommands::Download(download) => {
            client
                .post(format!("{base}/download/{}", download.kind))
                .send()
                .await?
        }
        ClientCommands::Status(_) => {
            let status = client
                .get(&base)
                .send()
                .await?
                .json::<messages::WorkflowResponse>()
                .await?;
            println!("Status: {}", status.status);
            println!("Prompt: {} ({})", status.prompt, status.prompt_counter);
            println!("Image:  {}", serde_json::to_string_pretty(&status.image)?);
            println!("Video:  {}", serde_json::to_string_pretty(&status.video)?);
            return Ok(());
        }
    };

    let result = response.json::<serde_json::Value>().await?;
    println!("Result: {}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
