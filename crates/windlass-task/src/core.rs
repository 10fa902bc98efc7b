use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::event::TaskEvent;
use crate::state::State;

/// Shared bookkeeping for a task: identity, lifecycle state, status line,
/// progress, fail reason, warnings, and event subscribers.
///
/// Concrete tasks embed a `TaskCore` and drive it through [`TaskCore::begin`]
/// and the `emit_*` terminal methods. The core enforces the lifecycle
/// invariants: `begin` refuses re-entry while `Running`, and terminal
/// emission refuses to fire twice for one execution attempt.
pub struct TaskCore {
    uid: Uuid,
    name: String,
    state: State,
    status: String,
    progress: u64,
    progress_total: Option<u64>,
    fail_reason: String,
    warnings: Vec<String>,
    subscribers: Vec<UnboundedSender<TaskEvent>>,
}

impl TaskCore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uid: Uuid::new_v4(),
            name: name.into(),
            state: State::Inactive,
            status: String::new(),
            progress: 0,
            progress_total: None,
            fail_reason: String::new(),
            warnings: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    /// Stable identity for log lines.
    pub fn describe(&self) -> String {
        if self.name.is_empty() {
            format!("({})", self.uid)
        } else {
            format!("{} ({})", self.name, self.uid)
        }
    }

    pub fn uid(&self) -> Uuid {
        self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn was_successful(&self) -> bool {
        self.state == State::Succeeded
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn progress(&self) -> (u64, Option<u64>) {
        (self.progress, self.progress_total)
    }

    pub fn fail_reason(&self) -> &str {
        &self.fail_reason
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Register an event subscriber. Events are delivered in emission order;
    /// dropped receivers are pruned on the next emission.
    pub fn subscribe(&mut self) -> UnboundedReceiver<TaskEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Transition into `Running`, or refuse if already there.
    ///
    /// Returns `false` without touching any state when the task is currently
    /// `Running`; callers must not execute in that case.
    pub fn begin(&mut self) -> bool {
        match self.state {
            State::Inactive => debug!("task {} starting for the first time", self.describe()),
            State::AbortedByUser => {
                debug!("task {} restarting after being aborted by user", self.describe())
            }
            State::Failed => debug!("task {} restarting after failing", self.describe()),
            State::Succeeded => debug!("task {} restarting after succeeding", self.describe()),
            State::Running => {
                warn!("tried to start task {} while it was already running", self.describe());
                return false;
            }
        }
        self.state = State::Running;
        self.fail_reason.clear();
        self.emit(TaskEvent::Started);
        true
    }

    /// Update the status line, notifying subscribers only on change.
    pub fn set_status(&mut self, status: impl Into<String>) {
        let status = status.into();
        if self.status != status {
            self.status = status.clone();
            self.emit(TaskEvent::Status(status));
        }
    }

    pub fn set_progress(&mut self, current: u64, total: Option<u64>) {
        self.progress = current;
        self.progress_total = total;
        self.emit(TaskEvent::Progress { current, total });
    }

    /// Record a non-fatal warning on the task.
    pub fn log_warning(&mut self, line: impl Into<String>) {
        let line = line.into();
        warn!("task {}: {}", self.describe(), line);
        self.warnings.push(line);
    }

    pub fn emit_succeeded(&mut self) {
        if !self.is_running() {
            error!("task {} succeeded while not running", self.describe());
            return;
        }
        self.state = State::Succeeded;
        debug!("task {} succeeded", self.describe());
        self.emit(TaskEvent::Succeeded);
        self.emit(TaskEvent::Finished);
    }

    pub fn emit_failed(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        if !self.is_running() {
            error!("task {} failed while not running: {}", self.describe(), reason);
            return;
        }
        self.state = State::Failed;
        self.fail_reason = reason.clone();
        error!("task {} failed: {}", self.describe(), reason);
        self.emit(TaskEvent::Failed(reason));
        self.emit(TaskEvent::Finished);
    }

    pub fn emit_aborted(&mut self) {
        if !self.is_running() {
            error!("task {} aborted while not running", self.describe());
            return;
        }
        self.state = State::AbortedByUser;
        self.fail_reason = "Aborted.".into();
        debug!("task {} aborted", self.describe());
        self.emit(TaskEvent::Aborted);
        self.emit(TaskEvent::Finished);
    }

    fn emit(&mut self, event: TaskEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
