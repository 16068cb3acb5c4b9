use crate::config::WorkflowConfig;
use crate::model::{GenerationService, ImageRequest, VideoRequest};
use crate::orchestrator::{GenerationOrchestrator, WorkflowEvent};
use std::{collections::HashMap, fmt};

/// Identifies the project a workflow belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(pub String);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

type ServiceFactory<I, V> = Box<dyn FnMut() -> (I, V) + Send>;

/// One independent workflow per project, created on first use.
pub struct WorkflowRegistry<I, V>
where
    I: GenerationService<Request = ImageRequest> + Send + 'static,
    V: GenerationService<Request = VideoRequest> + Send + 'static,
{
    config: WorkflowConfig,
    factory: ServiceFactory<I, V>,
    workflows: HashMap<ProjectId, GenerationOrchestrator<I, V>>,
}

impl<I, V> WorkflowRegistry<I, V>
where
    I: GenerationService<Request = ImageRequest> + Send + 'static,
    V: GenerationService<Request = VideoRequest> + Send + 'static,
{
    /// `factory` is called once per new project to build its pair of services.
    pub fn new(config: WorkflowConfig, factory: impl FnMut() -> (I, V) + Send + 'static) -> Self {
        Self {
            config,
            factory: Box::new(factory),
            workflows: HashMap::new(),
        }
    }

    pub fn get(&self, project: &ProjectId) -> Option<&GenerationOrchestrator<I, V>> {
        self.workflows.get(project)
    }

    pub fn get_mut(&mut self, project: &ProjectId) -> Option<&mut GenerationOrchestrator<I, V>> {
        self.workflows.get_mut(project)
    }

    pub fn get_or_create(&mut self, project: &ProjectId) -> &mut GenerationOrchestrator<I, V> {
        let Self {
            config,
            factory,
            workflows,
        } = self;
        workflows.entry(project.clone()).or_insert_with(|| {
            log::debug!("Creating workflow for project {project}");
            let (image_service, video_service) = (*factory)();
            GenerationOrchestrator::new(config.clone(), image_service, video_service)
        })
    }

    /// Cancels and drops the project's workflow. Returns whether it existed.
    pub fn remove(&mut self, project: &ProjectId) -> bool {
        match self.workflows.remove(project) {
            Some(mut workflow) => {
                workflow.cancel();
                log::debug!("Removed workflow for project {project}");
                true
            }
            None => false,
        }
    }

    /// Polls every workflow, tagging events with their project.
    pub fn poll_all(&mut self) -> Vec<(ProjectId, WorkflowEvent)> {
        let mut events = Vec::new();
        for (project, workflow) in self.workflows.iter_mut() {
            events.extend(workflow.poll().into_iter().map(|e| (project.clone(), e)));
        }
        events
    }

    pub fn project_ids(&self) -> impl Iterator<Item = &ProjectId> {
        self.workflows.keys()
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}
