use std::fmt;

/// Lifecycle state shared by every task.
///
/// `Running` is the only non-terminal state a task passes through; the three
/// terminal states can all be restarted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Never started.
    #[default]
    Inactive,

    /// Currently executing.
    Running,

    /// Finished and produced its result.
    Succeeded,

    /// Finished with an error.
    Failed,

    /// Cancelled on user request.
    AbortedByUser,
}

impl State {
    /// Returns `true` while the task is executing.
    pub fn is_running(&self) -> bool {
        matches!(self, State::Running)
    }

    /// Returns `true` for `Succeeded`, `Failed` and `AbortedByUser`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Succeeded | State::Failed | State::AbortedByUser)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Inactive => write!(f, "inactive"),
            State::Running => write!(f, "running"),
            State::Succeeded => write!(f, "succeeded"),
            State::Failed => write!(f, "failed"),
            State::AbortedByUser => write!(f, "aborted by user"),
        }
    }
}
