//! Asynchronous actions awaited by `WaitAction` nodes.
//!
//! The scheduler never busy-polls an action. Each pending action carries a waker that raises a
//! flag; the owning stack only polls the future again after the flag was raised, which is the
//! continuation that re-enters the stack with the action's outcome.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::task::{waker, ArcWake};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Treated as a one-tick deferral: the node is executed again on the next tick.
    #[error("action cancelled")]
    Cancelled,
    #[error("action failed: {0}")]
    Failed(String),
}

pub type ActionResult = Result<bool, ActionError>;

pub type ActionFuture = Pin<Box<dyn Future<Output = ActionResult> + Send>>;

#[derive(Debug)]
struct WakeFlag(AtomicBool);

impl ArcWake for WakeFlag {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.store(true, Ordering::Release);
    }
}

pub(crate) struct PendingAction {
    future: ActionFuture,
    woken: Arc<WakeFlag>,
}

impl PendingAction {
    pub(crate) fn new(future: ActionFuture) -> Self {
        Self {
            future,
            // Poll once on registration so already-complete actions resolve in the same step.
            woken: Arc::new(WakeFlag(AtomicBool::new(true))),
        }
    }

    pub(crate) fn poll(&mut self) -> Option<ActionResult> {
        if !self.woken.0.swap(false, Ordering::AcqRel) {
            return None;
        }
        let waker = waker(self.woken.clone());
        let mut cx = Context::from_waker(&waker);
        match self.future.as_mut().poll(&mut cx) {
            Poll::Ready(result) => Some(result),
            Poll::Pending => None,
        }
    }
}

/// Host-side half of an action started with [`action_channel`].
///
/// Dropping it without completing cancels the action.
#[derive(Debug)]
pub struct ActionCompleter(oneshot::Sender<ActionResult>);

impl ActionCompleter {
    pub fn complete(self, success: bool) {
        let _ = self.0.send(Ok(success));
    }

    pub fn succeed(self) {
        self.complete(true);
    }

    pub fn fail(self) {
        self.complete(false);
    }

    pub fn error(self, error: ActionError) {
        let _ = self.0.send(Err(error));
    }

    pub fn cancel(self) {
        self.error(ActionError::Cancelled);
    }
}

/// A future/completer pair for actions finished by something outside the tree.
pub fn action_channel() -> (ActionCompleter, ActionFuture) {
    let (tx, rx) = oneshot::channel();
    let future = async move {
        match rx.await {
            Ok(result) => result,
            Err(oneshot::Canceled) => Err(ActionError::Cancelled),
        }
    };
    (ActionCompleter(tx), Box::pin(future))
}
