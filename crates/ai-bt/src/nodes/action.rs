use std::fmt;

use crate::{ActionFuture, Capability, Node, NodeContext, NodeError, State};

/// Starts an asynchronous action each time it executes and reports the action's outcome.
#[derive(Clone)]
pub struct RunAction<F> {
    factory: F,
}

impl<F> RunAction<F>
where
    F: Fn(&mut NodeContext<'_>) -> ActionFuture + Clone + Send + Sync + 'static,
{
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

impl<F> fmt::Debug for RunAction<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunAction").finish_non_exhaustive()
    }
}

impl<F> Node for RunAction<F>
where
    F: Fn(&mut NodeContext<'_>) -> ActionFuture + Clone + Send + Sync + 'static,
{
    fn capability(&self) -> Capability {
        Capability::Action
    }

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<State, NodeError> {
        let action = (self.factory)(ctx);
        ctx.wait_for(action);
        Ok(State::WaitAction)
    }
}
