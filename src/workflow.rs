//! Analysis workflow.
//!
//! [`Workflow`] is the transition table: plain data, no I/O.
//! [`WorkflowHandle`] runs it inside a single task so every intent and every
//! completed request is applied in order, and publishes a [`Snapshot`] after
//! each change for the presentation layer to render.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};

use crate::client::{failure_message, AnalysisClient, AnalysisRequest, AnalysisResult};
use crate::encoder::ImageAsset;
use crate::error::{AnalysisError, WorkflowError};

/// What the user currently sees.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WorkflowState {
    #[default]
    Empty,
    Ready,
    Loading,
    Success(AnalysisResult),
    Error(String),
}

impl WorkflowState {
    pub fn status(&self) -> Status {
        match self {
            Self::Empty => Status::Empty,
            Self::Ready => Status::Ready,
            Self::Loading => Status::Loading,
            Self::Success(_) => Status::Success,
            Self::Error(_) => Status::Error,
        }
    }
}

/// Payload-free tag of a [`WorkflowState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Empty,
    Ready,
    Loading,
    Success,
    Error,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Ready => "ready",
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request the workflow has committed to. Its completion is only applied
/// while `generation` is still current.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub generation: u64,
    pub request: AnalysisRequest,
}

/// Immutable view handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub status: Status,
    pub image: Option<Arc<ImageAsset>>,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl Snapshot {
    /// No request is in flight.
    pub fn is_settled(&self) -> bool {
        self.status != Status::Loading
    }

    /// The same view without the image, for cheap polling.
    pub fn without_image(mut self) -> Self {
        self.image = None;
        self
    }
}

/// The single owner of the current image and state.
#[derive(Debug, Default)]
pub struct Workflow {
    state: WorkflowState,
    image: Option<Arc<ImageAsset>>,
    generation: u64,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn image(&self) -> Option<&Arc<ImageAsset>> {
        self.image.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replace the image. Returns `false` when there was no file.
    ///
    /// Any in-flight request is superseded.
    pub fn upload(&mut self, asset: Option<ImageAsset>) -> bool {
        let Some(asset) = asset else {
            return false;
        };
        self.image = Some(Arc::new(asset));
        self.state = WorkflowState::Ready;
        self.generation += 1;
        true
    }

    /// Start an analysis of the current image.
    pub fn analyze(&mut self) -> Result<Ticket, WorkflowError> {
        if self.state == WorkflowState::Loading {
            return Err(WorkflowError::AnalysisInFlight);
        }
        self.begin()
    }

    /// Re-issue the request that just failed.
    pub fn retry(&mut self) -> Result<Ticket, WorkflowError> {
        if matches!(self.state, WorkflowState::Error(_)) {
            return self.begin();
        }
        if self.state == WorkflowState::Loading {
            Err(WorkflowError::AnalysisInFlight)
        } else if self.image.is_none() {
            Err(WorkflowError::NoImage)
        } else {
            Err(WorkflowError::NothingToRetry(self.state.status().as_str()))
        }
    }

    fn begin(&mut self) -> Result<Ticket, WorkflowError> {
        let image = self.image.clone().ok_or(WorkflowError::NoImage)?;
        self.generation += 1;
        self.state = WorkflowState::Loading;
        Ok(Ticket { generation: self.generation, request: AnalysisRequest::new(image) })
    }

    /// Apply a finished request. Returns `false` if it was superseded.
    pub fn complete(
        &mut self,
        generation: u64,
        outcome: Result<AnalysisResult, AnalysisError>,
    ) -> bool {
        if generation != self.generation || self.state != WorkflowState::Loading {
            return false;
        }
        self.state = match outcome {
            Ok(result) => WorkflowState::Success(result),
            Err(err) => WorkflowState::Error(failure_message(&err)),
        };
        true
    }

    /// Drop the image and any result or error.
    pub fn reset(&mut self) {
        self.image = None;
        self.state = WorkflowState::Empty;
        self.generation += 1;
    }

    pub fn snapshot(&self) -> Snapshot {
        let (result, error) = match &self.state {
            WorkflowState::Success(result) => (Some(result.text.clone()), None),
            WorkflowState::Error(message) => (None, Some(message.clone())),
            _ => (None, None),
        };
        Snapshot { status: self.state.status(), image: self.image.clone(), result, error }
    }
}

type Reply = oneshot::Sender<Result<Snapshot, WorkflowError>>;

enum Intent {
    Upload(Option<ImageAsset>, Reply),
    Analyze(Reply),
    Retry(Reply),
    Reset(Reply),
}

struct Completion {
    generation: u64,
    outcome: Result<AnalysisResult, AnalysisError>,
}

/// Dispatch side of a running workflow. Cheap to clone.
#[derive(Clone)]
pub struct WorkflowHandle {
    intents: mpsc::Sender<Intent>,
    snapshots: watch::Receiver<Snapshot>,
}

impl WorkflowHandle {
    /// Start the workflow task. Must be called inside a tokio runtime.
    ///
    /// `timeout` bounds each request; `None` waits for the service.
    pub fn spawn(client: Arc<dyn AnalysisClient>, timeout: Option<Duration>) -> Self {
        let workflow = Workflow::new();
        let (intents_tx, intents_rx) = mpsc::channel(32);
        let (snapshots_tx, snapshots_rx) = watch::channel(workflow.snapshot());

        let actor = Actor {
            workflow,
            client,
            timeout,
            snapshots: snapshots_tx,
        };
        tokio::spawn(actor.run(intents_rx));

        Self { intents: intents_tx, snapshots: snapshots_rx }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Receive every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    pub async fn upload(&self, asset: Option<ImageAsset>) -> Result<Snapshot, WorkflowError> {
        self.dispatch(|reply| Intent::Upload(asset, reply)).await
    }

    pub async fn analyze(&self) -> Result<Snapshot, WorkflowError> {
        self.dispatch(Intent::Analyze).await
    }

    pub async fn retry(&self) -> Result<Snapshot, WorkflowError> {
        self.dispatch(Intent::Retry).await
    }

    pub async fn reset(&self) -> Result<Snapshot, WorkflowError> {
        self.dispatch(Intent::Reset).await
    }

    /// Wait until no request is in flight.
    pub async fn settled(&self) -> Result<Snapshot, WorkflowError> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx.wait_for(Snapshot::is_settled).await.map_err(|_| WorkflowError::Closed)?;
        Ok(snapshot.clone())
    }

    async fn dispatch(&self, intent: impl FnOnce(Reply) -> Intent) -> Result<Snapshot, WorkflowError> {
        let (reply, rx) = oneshot::channel();
        self.intents.send(intent(reply)).await.map_err(|_| WorkflowError::Closed)?;
        rx.await.map_err(|_| WorkflowError::Closed)?
    }
}

struct Actor {
    workflow: Workflow,
    client: Arc<dyn AnalysisClient>,
    timeout: Option<Duration>,
    snapshots: watch::Sender<Snapshot>,
}

impl Actor {
    async fn run(mut self, mut intents: mpsc::Receiver<Intent>) {
        let (completions_tx, mut completions) = mpsc::unbounded_channel::<Completion>();

        loop {
            tokio::select! {
                intent = intents.recv() => match intent {
                    Some(intent) => self.handle_intent(intent, &completions_tx),
                    None => break,
                },
                Some(done) = completions.recv() => self.handle_completion(done),
            }
        }

        tracing::debug!("Workflow task stopped");
    }

    fn handle_intent(&mut self, intent: Intent, completions: &mpsc::UnboundedSender<Completion>) {
        let (outcome, reply) = match intent {
            Intent::Upload(asset, reply) => {
                if self.workflow.upload(asset) {
                    tracing::info!(
                        mime_type = self.workflow.image().map(|i| i.mime_type()).unwrap_or_default(),
                        "Image uploaded"
                    );
                } else {
                    tracing::debug!("Upload without a file ignored");
                }
                (Ok(()), reply)
            }
            Intent::Analyze(reply) => (self.workflow.analyze().map(|t| self.start(t, completions)), reply),
            Intent::Retry(reply) => (self.workflow.retry().map(|t| self.start(t, completions)), reply),
            Intent::Reset(reply) => {
                self.workflow.reset();
                tracing::info!("Workflow reset");
                (Ok(()), reply)
            }
        };

        if let Err(err) = &outcome {
            tracing::debug!(error = %err, state = %self.workflow.state().status(), "Intent rejected");
        }

        let snapshot = self.publish();
        let _ = reply.send(outcome.map(|()| snapshot));
    }

    fn start(&self, ticket: Ticket, completions: &mpsc::UnboundedSender<Completion>) {
        tracing::info!(generation = ticket.generation, provider = self.client.name(), "Analysis started");

        let client = Arc::clone(&self.client);
        let timeout = self.timeout;
        let completions = completions.clone();

        tokio::spawn(async move {
            let outcome = run_analysis(client.as_ref(), &ticket.request, timeout).await;
            let _ = completions.send(Completion { generation: ticket.generation, outcome });
        });
    }

    fn handle_completion(&mut self, done: Completion) {
        let ok = done.outcome.is_ok();
        if let Err(err) = &done.outcome {
            tracing::warn!(generation = done.generation, error = %err, "Analysis failed");
        }

        if self.workflow.complete(done.generation, done.outcome) {
            tracing::info!(generation = done.generation, success = ok, "Analysis finished");
            self.publish();
        } else {
            tracing::debug!(
                generation = done.generation,
                current = self.workflow.generation(),
                "Discarding stale analysis result"
            );
        }
    }

    fn publish(&self) -> Snapshot {
        let snapshot = self.workflow.snapshot();
        self.snapshots.send_replace(snapshot.clone());
        snapshot
    }
}

async fn run_analysis(
    client: &dyn AnalysisClient,
    request: &AnalysisRequest,
    timeout: Option<Duration>,
) -> Result<AnalysisResult, AnalysisError> {
    let call = client.generate(request);
    let text = match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| AnalysisError::Timeout(limit.as_secs()))??,
        None => call.await?,
    };
    Ok(AnalysisResult::from_text(text))
}
