/// Notifications emitted by a task while it runs.
///
/// Exactly one of `Succeeded`/`Failed`/`Aborted` is emitted per execution
/// attempt, and `Finished` always follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// Execution began.
    Started,

    /// Human-readable status line changed.
    Status(String),

    /// Progress sample. `total` is `None` when the overall size is unknown.
    Progress { current: u64, total: Option<u64> },

    /// Terminal: the task produced its result.
    Succeeded,

    /// Terminal: the task failed, with a short reason (possibly empty).
    Failed(String),

    /// Terminal: the task was cancelled on user request.
    Aborted,

    /// Emitted after every terminal event.
    Finished,
}
