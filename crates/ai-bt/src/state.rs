/// What a node hands back to the scheduler from `execute` or `receive_child_result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Finished successfully; the node is stopped, popped and its parent receives `true`.
    Success,
    /// Finished unsuccessfully; the parent receives `false`.
    Failed,
    /// The node pushed one or more children and has no result yet.
    NoReturn,
    /// Suspend until the next tick, then `execute` the same node again.
    Yield,
    /// Suspend until the action registered through `NodeContext::wait_for` completes.
    WaitAction,
    /// Unrecoverable for this execution path; the tree pauses.
    Error,
}

impl State {
    pub fn from_bool(success: bool) -> Self {
        if success {
            State::Success
        } else {
            State::Failed
        }
    }

    /// `Some(result)` for `Success`/`Failed`.
    pub fn outcome(self) -> Option<bool> {
        match self {
            State::Success => Some(true),
            State::Failed => Some(false),
            _ => None,
        }
    }
}

/// Scheduling state of a [`NodeCallStack`](crate::NodeCallStack).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackState {
    /// The top node is due for `execute`.
    Ready,
    /// A child was just pushed and is due for `execute`.
    Calling,
    /// The top node is due for `receive_child_result`.
    Receiving,
    /// Suspended until the next tick.
    WaitNextTick,
    /// Suspended on an asynchronous action.
    Waiting,
    /// Empty and inert.
    End,
    /// A contract violation faulted the stack.
    Invalid,
}

impl StackState {
    pub fn is_suspended(self) -> bool {
        matches!(self, StackState::WaitNextTick | StackState::Waiting)
    }

    pub fn is_runnable(self) -> bool {
        matches!(
            self,
            StackState::Ready | StackState::Calling | StackState::Receiving | StackState::WaitNextTick
        )
    }
}

/// The capability a node advertises to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Control flow: pushes children and combines their results.
    Flow,
    /// Does work in the world; may wait on asynchronous actions and receives per-frame updates.
    Action,
    /// Pure decision.
    Determine,
    Arithmetic,
    /// Runs periodically on its own stack while its owner is active.
    Service,
}
