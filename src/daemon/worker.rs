//! Single writer: every engine call runs on one thread, in arrival order.

use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::common::{DaemonStatus, ProfileEntry};
use crate::core::cmd::get_prop;
use crate::core::device::Device;
use crate::core::engine::{Engine, TransitionOutcome};
use crate::core::error::TransitionError;
use crate::core::plan::TransitionPlan;
use crate::core::refresh::UiRefreshStrategy;
use crate::core::store::ScratchDocument;

const QUEUE_DEPTH: usize = 16;
const BOOT_POLL_MS: u64 = 2000;
const BOOT_POLL_LIMIT: u32 = 90;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Load(String),
    TurnOff,
    Toggle(String),
    Preview(String),
    Delete(String),
    Import(PathBuf),
    Edit(Option<String>),
    SetField { key: String, value: String },
    Commit(Option<String>),
    Reapply,
    IsActive(String),
    List,
    Status,
}

#[derive(Debug, Clone)]
pub enum Reply {
    Outcome(TransitionOutcome),
    Plan(TransitionPlan),
    Id(String),
    Active(bool),
    List(Vec<ProfileEntry>),
    Status(DaemonStatus),
    Scratch(ScratchDocument),
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyError {
    pub code: &'static str,
    pub message: String,
}

impl From<TransitionError> for ReplyError {
    fn from(e: TransitionError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
        }
    }
}

impl From<anyhow::Error> for ReplyError {
    fn from(e: anyhow::Error) -> Self {
        Self {
            code: "FAILED",
            message: format!("{:#}", e),
        }
    }
}

pub type WorkerResult = Result<Reply, ReplyError>;

struct Job {
    request: Request,
    reply: Option<oneshot::Sender<WorkerResult>>,
}

#[derive(Debug, Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Job>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job").field("request", &self.request).finish()
    }
}

impl WorkerHandle {
    pub async fn call(&self, request: Request) -> WorkerResult {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Job { request, reply: Some(reply) })
            .await
            .map_err(|_| ReplyError { code: "WORKER", message: "worker stopped".into() })?;
        rx.await
            .map_err(|_| ReplyError { code: "WORKER", message: "worker dropped request".into() })?
    }

    /// Queue a request without waiting for it.
    pub fn submit(&self, request: Request) {
        if let Err(e) = self.tx.try_send(Job { request, reply: None }) {
            warn!(target: "altscreen::daemon", "Worker queue rejected request: {}", e);
        }
    }
}

fn execute<D: Device>(engine: &mut Engine<D>, request: Request) -> WorkerResult {
    Ok(match request {
        Request::Load(id) => Reply::Outcome(engine.load(&id)?),
        Request::TurnOff => Reply::Outcome(engine.turn_off()?),
        Request::Toggle(id) => Reply::Outcome(engine.toggle(&id)?),
        Request::Preview(id) => Reply::Plan(engine.preview(&id)?),
        Request::Delete(id) => {
            engine.delete(&id)?;
            Reply::Done
        }
        Request::Import(path) => Reply::Id(engine.import(&path)?),
        Request::Edit(id) => Reply::Scratch(engine.begin_edit(id.as_deref())?),
        Request::SetField { key, value } => Reply::Scratch(engine.set_scratch_field(&key, &value)?),
        Request::Commit(title) => Reply::Id(engine.commit_scratch(title.as_deref())?),
        Request::Reapply => Reply::Outcome(engine.reapply()?),
        Request::IsActive(sel) => Reply::Active(engine.is_active(&sel)?),
        Request::List => Reply::List(engine.list()?),
        Request::Status => Reply::Status(engine.status()?),
    })
}

fn needs_boot_pass(outcome: &TransitionOutcome) -> bool {
    outcome.strategy == UiRefreshStrategy::FullRestart && outcome.commands > 0
}

fn boot_completed() -> bool {
    let done = |key| matches!(get_prop(key), Ok(Some(v)) if v == "1");
    done("sys.boot_completed") && done("service.bootanim.exit")
}

/// After a framework restart, wait for the UI to come back and queue the
/// boot-time pass.
fn schedule_boot_pass(handle: WorkerHandle, settle_ms: u64) {
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(settle_ms));
        for _ in 0..BOOT_POLL_LIMIT {
            if boot_completed() {
                info!(target: "altscreen::daemon", "Framework is back, reapplying boot-time settings");
                handle.submit(Request::Reapply);
                return;
            }
            std::thread::sleep(Duration::from_millis(BOOT_POLL_MS));
        }
        warn!(target: "altscreen::daemon", "Boot did not complete in time, boot-time settings left pending");
    });
}

/// Move `engine` onto its own thread and return the handle feeding it.
pub fn spawn<D: Device + 'static>(mut engine: Engine<D>, boot_settle_ms: u64) -> WorkerHandle {
    let (tx, mut rx) = mpsc::channel::<Job>(QUEUE_DEPTH);
    let handle = WorkerHandle { tx };
    let self_handle = handle.clone();

    std::thread::spawn(move || {
        debug!(target: "altscreen::daemon", "Worker started");
        while let Some(job) = rx.blocking_recv() {
            debug!(target: "altscreen::daemon", "Worker: {:?}", job.request);
            let result = execute(&mut engine, job.request);

            match &result {
                Ok(Reply::Outcome(o)) if needs_boot_pass(o) => {
                    schedule_boot_pass(self_handle.clone(), boot_settle_ms);
                }
                Err(e) => error!(target: "altscreen::daemon", "Request failed: {} {}", e.code, e.message),
                _ => {}
            }

            if let Some(reply) = job.reply {
                let _ = reply.send(result);
            }
        }
        debug!(target: "altscreen::daemon", "Worker stopped");
    });

    handle
}
