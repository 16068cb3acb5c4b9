use crate::error::GenerationError;
use crate::intake::MediaPayload;
use crate::model::{CancelFlag, GenerationService, Stage};
use std::{
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex, PoisonError, mpsc},
    thread::JoinHandle,
    time::{Duration, Instant},
};

/// Identifies one scheduled generation. Tickets only ever increase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub u64);

/// Represents the current state of a generation worker.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkerState {
    /// Waiting for the next job.
    Idle,
    /// A service call is running.
    Processing,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Processing => "processing",
        }
    }
}

/// A job queued on a worker.
pub(crate) struct Job<Req> {
    pub ticket: Ticket,
    pub request: Req,
    pub cancel: CancelFlag,
}

/// What a worker reports on the shared channel.
#[derive(Debug)]
pub enum WorkerEvent {
    /// The service call for `ticket` began at `at`. Time spent queued is not included.
    Started {
        stage: Stage,
        ticket: Ticket,
        at: Instant,
    },
    /// The service call returned.
    Finished(Completion),
}

/// Message sent back by a worker once a service call returns.
#[derive(Debug)]
pub struct Completion {
    pub stage: Stage,
    pub ticket: Ticket,
    /// When the service call started.
    pub start_time: Instant,
    /// How long the service call took.
    pub duration: Duration,
    pub result: Result<MediaPayload, GenerationError>,
}

/// Runs one generation service on a background thread.
///
/// Jobs are processed in order. Jobs cancelled while still queued are skipped
/// without calling the service. A [`WorkerEvent::Started`] precedes every service call
/// and its [`WorkerEvent::Finished`] follows on the channel shared by all workers of a
/// workflow.
pub struct GenerationWorker<S: GenerationService + Send + 'static> {
    stage: Stage,
    state: Arc<Mutex<WorkerState>>,
    req_tx: Option<mpsc::Sender<Job<S::Request>>>,
    handle: Option<JoinHandle<()>>,
}

impl<S: GenerationService + Send + 'static> GenerationWorker<S> {
    pub fn new(stage: Stage, mut service: S, events: mpsc::Sender<WorkerEvent>) -> Self {
        let (req_tx, req_rx) = mpsc::channel::<Job<S::Request>>();
        let state = Arc::new(Mutex::new(WorkerState::Idle));

        let handle = std::thread::spawn({
            let state = state.clone();
            move || {
                while let Ok(job) = req_rx.recv() {
                    if job.cancel.is_cancelled() {
                        log::debug!("Skipping cancelled {} job {:?}", stage.as_str(), job.ticket);
                        continue;
                    }

                    log::debug!("Running {} job {:?}", stage.as_str(), job.ticket);
                    set_state(&state, WorkerState::Processing);
                    let start_time = Instant::now();
                    let started = WorkerEvent::Started {
                        stage,
                        ticket: job.ticket,
                        at: start_time,
                    };
                    if events.send(started).is_err() {
                        log::debug!("Event receiver dropped, stopping {} worker", stage.as_str());
                        break;
                    }

                    let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
                        service.run(job.request, &job.cancel)
                    }))
                    .unwrap_or_else(|_| {
                        log::error!("{} service panicked", stage.as_str());
                        Err(GenerationError::Unknown("generation service panicked".to_string()))
                    });

                    set_state(&state, WorkerState::Idle);

                    let completion = Completion {
                        stage,
                        ticket: job.ticket,
                        start_time,
                        duration: start_time.elapsed(),
                        result,
                    };
                    if events.send(WorkerEvent::Finished(completion)).is_err() {
                        log::debug!("Event receiver dropped, stopping {} worker", stage.as_str());
                        break;
                    }
                }
            }
        });

        Self {
            stage,
            state,
            req_tx: Some(req_tx),
            handle: Some(handle),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn state(&self) -> WorkerState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Queues a job. Fails when the worker has been stopped or its thread is gone.
    pub(crate) fn schedule(&self, job: Job<S::Request>) -> Result<(), GenerationError> {
        let unavailable =
            || GenerationError::ServiceUnavailable(format!("{} worker is not running", self.stage.as_str()));
        let tx = self.req_tx.as_ref().ok_or_else(unavailable)?;
        tx.send(job).map_err(|_| unavailable())
    }

    /// Closes the job queue and waits for the thread to finish its current job.
    pub fn stop(&mut self) {
        self.req_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl<S: GenerationService + Send + 'static> Drop for GenerationWorker<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn set_state(state: &Mutex<WorkerState>, next: WorkerState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = next;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl GenerationService for Echo {
        type Request = Vec<u8>;

        fn run(&mut self, request: Vec<u8>, _cancel: &CancelFlag) -> Result<MediaPayload, GenerationError> {
            Ok(MediaPayload::new("image/png", request))
        }
    }

    struct Panics;

    impl GenerationService for Panics {
        type Request = ();

        fn run(&mut self, _request: (), _cancel: &CancelFlag) -> Result<MediaPayload, GenerationError> {
            panic!("boom");
        }
    }

    struct Sleeps(Duration);

    impl GenerationService for Sleeps {
        type Request = ();

        fn run(&mut self, _request: (), _cancel: &CancelFlag) -> Result<MediaPayload, GenerationError> {
            std::thread::sleep(self.0);
            Ok(MediaPayload::new("image/png", Vec::new()))
        }
    }

    fn next_completion(rx: &mpsc::Receiver<WorkerEvent>) -> Completion {
        loop {
            match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
                WorkerEvent::Started { .. } => {}
                WorkerEvent::Finished(completion) => return completion,
            }
        }
    }

    fn job<R>(ticket: u64, request: R) -> Job<R> {
        Job {
            ticket: Ticket(ticket),
            request,
            cancel: CancelFlag::new(),
        }
    }

    #[test]
    fn delivers_completion_with_ticket() {
        let (tx, rx) = mpsc::channel();
        let worker = GenerationWorker::new(Stage::Image, Echo, tx);
        worker.schedule(job(7, vec![1, 2])).unwrap();

        let completion = next_completion(&rx);
        assert_eq!(completion.stage, Stage::Image);
        assert_eq!(completion.ticket, Ticket(7));
        assert_eq!(completion.result.unwrap().bytes, vec![1, 2]);
    }

    #[test]
    fn skips_jobs_cancelled_while_queued() {
        let (tx, rx) = mpsc::channel();
        let worker = GenerationWorker::new(Stage::Video, Echo, tx);
        let cancelled = job(1, vec![1]);
        cancelled.cancel.cancel();
        worker.schedule(cancelled).unwrap();
        worker.schedule(job(2, vec![2])).unwrap();

        let completion = next_completion(&rx);
        assert_eq!(completion.ticket, Ticket(2));
    }

    #[test]
    fn panicking_service_reports_unknown_error() {
        let (tx, rx) = mpsc::channel();
        let worker = GenerationWorker::new(Stage::Image, Panics, tx);
        worker.schedule(job(1, ())).unwrap();

        let completion = next_completion(&rx);
        assert!(matches!(completion.result, Err(GenerationError::Unknown(_))));
        assert_eq!(worker.state(), WorkerState::Idle);
    }

    #[test]
    fn start_is_reported_when_the_job_leaves_the_queue() {
        let (tx, rx) = mpsc::channel();
        let worker = GenerationWorker::new(Stage::Image, Sleeps(Duration::from_millis(50)), tx);
        let queued_at = Instant::now();
        worker.schedule(job(1, ())).unwrap();
        worker.schedule(job(2, ())).unwrap();

        let first = next_completion(&rx);
        assert_eq!(first.ticket, Ticket(1));
        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            WorkerEvent::Started { ticket, at, .. } => {
                assert_eq!(ticket, Ticket(2));
                assert!(at.duration_since(queued_at) >= Duration::from_millis(50));
            }
            WorkerEvent::Finished(completion) => panic!("unexpected completion {:?}", completion.ticket),
        }
    }

    #[test]
    fn stopped_worker_is_unavailable() {
        let (tx, _rx) = mpsc::channel();
        let mut worker = GenerationWorker::new(Stage::Image, Echo, tx);
        worker.stop();
        let err = worker.schedule(job(1, vec![])).unwrap_err();
        assert!(matches!(err, GenerationError::ServiceUnavailable(_)));
    }
}
