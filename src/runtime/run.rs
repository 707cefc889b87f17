use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{OrchestrateError, Result};

use super::state::FlowRunStatus;
use super::types::{FlowContext, FlowEvent, FlowEventKind};

pub type RunCallback = Arc<dyn Fn(&FlowRunSnapshot) + Send + Sync>;

/// Callbacks fired once, on the terminal event of a run.
#[derive(Clone, Default)]
pub struct FlowRunHandlers {
    on_done: Option<RunCallback>,
    on_error: Option<RunCallback>,
}

impl FlowRunHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_done(mut self, callback: impl Fn(&FlowRunSnapshot) + Send + Sync + 'static) -> Self {
        self.on_done = Some(Arc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&FlowRunSnapshot) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for FlowRunHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowRunHandlers")
            .field("on_done", &self.on_done.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Point-in-time view of a run.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct FlowRunSnapshot {
    pub id: Option<String>,
    pub status: FlowRunStatus,
    pub output: Option<Value>,
    pub error: Option<Value>,
    pub events: usize,
}

/// 工作流运行
///
/// State is driven only by engine events, applied in arrival order. Clones
/// share the same state.
#[derive(Clone)]
pub struct FlowRun {
    state: Arc<RwLock<FlowRunSnapshot>>,
    handlers: FlowRunHandlers,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl FlowRun {
    pub fn new(handlers: FlowRunHandlers) -> Self {
        Self {
            state: Arc::new(RwLock::new(FlowRunSnapshot::default())),
            handlers,
            task: Arc::new(Mutex::new(None)),
        }
    }

    /// Marks the run as started under `instance_id`. At most once per run.
    pub fn start(&self, instance_id: &str) -> Result<()> {
        let mut state = self.state.write();
        if state.status != FlowRunStatus::NotStarted {
            let id = state.id.clone().unwrap_or_else(|| instance_id.to_string());
            return Err(OrchestrateError::RunAlreadyStarted(id));
        }
        state.id = Some(instance_id.to_string());
        state.status = FlowRunStatus::InProgress;
        info!(instance = %instance_id, "flow run started");
        Ok(())
    }

    /// Applies one event and returns the resulting snapshot.
    ///
    /// Events arriving after a terminal state are ignored.
    pub fn apply(&self, event: &FlowEvent) -> FlowRunSnapshot {
        let snapshot = {
            let mut state = self.state.write();
            if state.status.is_terminal() {
                warn!(
                    instance = state.id.as_deref().unwrap_or_default(),
                    kind = ?event.kind,
                    "event after terminal state ignored"
                );
                return state.clone();
            }
            if event.kind == FlowEventKind::Unknown {
                warn!(instance = state.id.as_deref().unwrap_or_default(), "unknown event kind");
            }

            state.status = state.status.next(event.kind);
            state.events += 1;
            match event.kind {
                FlowEventKind::OnFlowEnd => state.output = event.context.data.clone(),
                FlowEventKind::OnFlowError => {
                    state.error = Some(
                        event
                            .error
                            .clone()
                            .unwrap_or_else(|| Value::from("flow failed")),
                    );
                }
                _ => {}
            }
            debug!(
                instance = state.id.as_deref().unwrap_or_default(),
                kind = ?event.kind,
                status = ?state.status,
                "event applied"
            );
            state.clone()
        };

        self.notify(&snapshot);
        snapshot
    }

    /// Fails the run when its event channel breaks.
    pub(crate) fn fail(&self, error: &OrchestrateError) -> FlowRunSnapshot {
        let snapshot = {
            let mut state = self.state.write();
            if state.status.is_terminal() {
                return state.clone();
            }
            warn!(instance = state.id.as_deref().unwrap_or_default(), %error, "event channel failed");
            state.status = FlowRunStatus::Failed;
            state.error = Some(Value::from(error.to_string()));
            state.clone()
        };
        self.notify(&snapshot);
        snapshot
    }

    fn notify(&self, snapshot: &FlowRunSnapshot) {
        let callback = match snapshot.status {
            FlowRunStatus::Completed => self.handlers.on_done.as_ref(),
            FlowRunStatus::Failed => self.handlers.on_error.as_ref(),
            _ => None,
        };
        if let Some(callback) = callback {
            callback(snapshot);
        }
    }

    /// Parses a record and applies it; malformed records are skipped. A
    /// channel failure fails the run and comes back as an `on_flow_error`
    /// event carrying the channel error.
    fn apply_record(&self, record: Result<String>) -> Option<(FlowEvent, FlowRunSnapshot)> {
        match record {
            Ok(raw) => match FlowEvent::parse(&raw) {
                Ok(event) => {
                    let snapshot = self.apply(&event);
                    Some((event, snapshot))
                }
                Err(err) => {
                    warn!(%err, "skipping malformed event record");
                    None
                }
            },
            Err(err) => {
                let snapshot = self.fail(&err);
                let context = snapshot
                    .id
                    .clone()
                    .map(FlowContext::for_instance)
                    .unwrap_or_default();
                let event = FlowEvent::new(FlowEventKind::OnFlowError, context)
                    .with_error(Value::from(err.to_string()));
                Some((event, snapshot))
            }
        }
    }

    /// Drains `records` until the run reaches a terminal state.
    pub async fn consume(&self, mut records: BoxStream<'static, Result<String>>) {
        while let Some(record) = records.next().await {
            self.apply_record(record);
            if self.status().is_terminal() {
                break;
            }
        }
    }

    /// Applies `records` lazily, yielding each event with the snapshot it
    /// produced. Ends after the terminal event.
    pub fn events(
        self,
        records: BoxStream<'static, Result<String>>,
    ) -> impl Stream<Item = (FlowEvent, FlowRunSnapshot)> + Send + 'static {
        stream::unfold(Some((self, records)), |state| async move {
            let (run, mut records) = state?;
            while let Some(record) = records.next().await {
                if let Some((event, snapshot)) = run.apply_record(record) {
                    let next = if snapshot.status.is_terminal() {
                        None
                    } else {
                        Some((run, records))
                    };
                    return Some(((event, snapshot), next));
                }
                if run.status().is_terminal() {
                    return None;
                }
            }
            None
        })
    }

    pub(crate) fn attach(&self, task: JoinHandle<()>) {
        *self.task.lock() = Some(task);
    }

    /// Waits for the background consumer started by `invoke`.
    pub async fn wait(&self) -> Result<FlowRunSnapshot> {
        let task = self.task.lock().take();
        if let Some(task) = task {
            task.await
                .map_err(|err| OrchestrateError::Other(anyhow!("flow run task failed: {err}")))?;
        }
        Ok(self.snapshot())
    }

    pub fn id(&self) -> Option<String> {
        self.state.read().id.clone()
    }

    pub fn status(&self) -> FlowRunStatus {
        self.state.read().status
    }

    pub fn output(&self) -> Option<Value> {
        self.state.read().output.clone()
    }

    pub fn error(&self) -> Option<Value> {
        self.state.read().error.clone()
    }

    pub fn snapshot(&self) -> FlowRunSnapshot {
        self.state.read().clone()
    }
}

impl fmt::Debug for FlowRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("FlowRun")
            .field("id", &state.id)
            .field("status", &state.status)
            .field("handlers", &self.handlers)
            .finish()
    }
}
