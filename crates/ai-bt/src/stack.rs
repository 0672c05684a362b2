//! The call-stack scheduler.
//!
//! A [`NodeCallStack`] holds the chain of active nodes and a state register. `run` is the single
//! scheduling loop: it keeps dispatching `execute`/`receive_child_result` on the top node until
//! the stack suspends (`WaitNextTick`, `Waiting`), empties (`End`) or faults (`Invalid`).

use ai_core::{ActorHandle, LocalVariables, TickContext};

use crate::action::PendingAction;
use crate::node::Requests;
use crate::{
    ActionError, Capability, LiveGraph, NodeContext, NodeError, NodeIndex, SchedulerError,
    StackState, State,
};

/// What the stack borrows from its tree for one scheduling step.
pub struct StackEnv<'a> {
    pub graph: &'a mut LiveGraph,
    pub locals: &'a mut LocalVariables,
    pub actor: &'a ActorHandle,
    pub tick: &'a TickContext,
}

/// Push/pop notifications, drained by the owner to keep service stacks in step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackEvent {
    Pushed(NodeIndex),
    Popped(NodeIndex),
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    node: NodeIndex,
    started: bool,
}

enum Call {
    Execute,
    Receive(bool),
    Fail(NodeError),
}

pub struct NodeCallStack {
    label: String,
    frames: Vec<Frame>,
    state: StackState,
    current: Option<NodeIndex>,
    previous: Option<NodeIndex>,
    pending_result: bool,
    last_result: Option<bool>,
    action: Option<PendingAction>,
    // Tick on which the stack entered `WaitNextTick`.
    suspended_on: u64,
    track_events: bool,
    events: Vec<StackEvent>,
}

impl NodeCallStack {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            frames: Vec::new(),
            state: StackState::End,
            current: None,
            previous: None,
            pending_result: false,
            last_result: None,
            action: None,
            suspended_on: 0,
            track_events: true,
            events: Vec::new(),
        }
    }

    /// A stack that does not record push/pop events.
    pub fn untracked(label: impl Into<String>) -> Self {
        Self {
            track_events: false,
            ..Self::new(label)
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> StackState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn top(&self) -> Option<NodeIndex> {
        self.frames.last().map(|f| f.node)
    }

    /// The node being called right now. Only ever `Some` inside a scheduling step.
    pub fn current(&self) -> Option<NodeIndex> {
        self.current
    }

    pub fn contains(&self, node: NodeIndex) -> bool {
        self.frames.iter().any(|f| f.node == node)
    }

    /// Bottom to top.
    pub fn nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.frames.iter().map(|f| f.node)
    }

    /// Result of the last run that emptied the stack.
    pub fn last_result(&self) -> Option<bool> {
        self.last_result
    }

    pub fn drain_events(&mut self) -> std::vec::Drain<'_, StackEvent> {
        self.events.drain(..)
    }

    /// Push `head` onto an empty stack and run to the first suspension.
    pub fn start(&mut self, head: NodeIndex, env: &mut StackEnv<'_>) -> Result<(), SchedulerError> {
        match self.state {
            StackState::End => {}
            StackState::Invalid => self.unwind(None, env.graph),
            state => return Err(SchedulerError::Busy { state }),
        }
        if env.graph.get(head).is_none() {
            self.state = StackState::Invalid;
            return Err(SchedulerError::MissingNode {
                node: self.label.clone(),
                target: format!("#{}", head.index()),
            });
        }
        self.last_result = None;
        self.previous = None;
        self.push(head, env.graph);
        self.state = StackState::Ready;
        self.run(env)
    }

    /// The scheduling loop. A no-op on `End` and `Invalid` stacks, and on stacks that entered
    /// `WaitNextTick` during the current tick.
    pub fn run(&mut self, env: &mut StackEnv<'_>) -> Result<(), SchedulerError> {
        if self.state == StackState::WaitNextTick && env.tick.tick != self.suspended_on {
            self.state = StackState::Ready;
        }
        loop {
            let call = match self.state {
                StackState::Ready | StackState::Calling => Call::Execute,
                StackState::Receiving => Call::Receive(self.pending_result),
                StackState::Waiting => {
                    self.poll_action(env)?;
                    if self.state == StackState::Waiting {
                        return Ok(());
                    }
                    continue;
                }
                StackState::WaitNextTick | StackState::End | StackState::Invalid => {
                    return Ok(())
                }
            };
            let Some(top) = self.top() else {
                self.state = StackState::End;
                return Ok(());
            };
            self.guarded(|stack| stack.dispatch(env, top, call))?;
        }
    }

    /// Check the awaited action without running the loop any further.
    ///
    /// A completed action moves the stack to `Receiving`; a cancelled one defers the node by one
    /// tick; any other action error goes through the node's `handle_error`.
    pub fn poll_action(&mut self, env: &mut StackEnv<'_>) -> Result<(), SchedulerError> {
        if self.state != StackState::Waiting {
            return Ok(());
        }
        let Some(outcome) = self.action.as_mut().and_then(PendingAction::poll) else {
            return Ok(());
        };
        self.action = None;
        let Some(top) = self.top() else {
            self.state = StackState::End;
            return Ok(());
        };
        match outcome {
            Ok(result) => {
                tracing::debug!(stack = %self.label, node = %env.graph.name(top), result, "action completed");
                self.pending_result = result;
                self.state = StackState::Receiving;
                Ok(())
            }
            Err(ActionError::Cancelled) => {
                tracing::warn!(stack = %self.label, node = %env.graph.name(top), "action cancelled, retrying next tick");
                self.state = StackState::WaitNextTick;
                self.suspended_on = env.tick.tick;
                Ok(())
            }
            Err(error) => {
                self.guarded(|stack| stack.dispatch(env, top, Call::Fail(NodeError::Action(error))))
            }
        }
    }

    /// Unwind down to `stop_at`, stopping every popped node in LIFO order.
    ///
    /// Returns `false` without touching the stack when `stop_at` is not on it. `None` empties
    /// the stack.
    pub fn break_to(&mut self, stop_at: Option<NodeIndex>, graph: &mut LiveGraph) -> bool {
        if let Some(target) = stop_at {
            if !self.contains(target) {
                return false;
            }
        }
        self.unwind(stop_at, graph);
        self.state = if self.frames.is_empty() {
            StackState::End
        } else {
            StackState::Ready
        };
        true
    }

    /// Force-unwind everything.
    pub fn end(&mut self, graph: &mut LiveGraph) {
        self.unwind(None, graph);
        self.state = StackState::End;
    }

    fn unwind(&mut self, stop_at: Option<NodeIndex>, graph: &mut LiveGraph) {
        while let Some(top) = self.top() {
            if Some(top) == stop_at {
                if let Some(frame) = self.frames.last_mut() {
                    frame.started = false;
                }
                break;
            }
            self.pop(graph);
        }
        self.action = None;
        self.current = None;
        self.previous = None;
    }

    fn guarded<F>(&mut self, step: F) -> Result<(), SchedulerError>
    where
        F: FnOnce(&mut Self) -> Result<(), SchedulerError>,
    {
        let result = step(self);
        if result.is_err() {
            self.state = StackState::Invalid;
            self.current = None;
        }
        result
    }

    fn dispatch(
        &mut self,
        env: &mut StackEnv<'_>,
        index: NodeIndex,
        call: Call,
    ) -> Result<(), SchedulerError> {
        if self.previous == Some(index) {
            return Err(SchedulerError::RecursiveExecution {
                node: env.graph.name(index).to_string(),
            });
        }
        if matches!(call, Call::Execute) {
            if let Some(frame) = self.frames.last_mut() {
                frame.started = true;
            }
        }

        let (state, requests, capability) = {
            let slot = env
                .graph
                .get_mut(index)
                .ok_or_else(|| SchedulerError::MissingNode {
                    node: self.label.clone(),
                    target: format!("#{}", index.index()),
                })?;
            let capability = slot.capability();
            let node = slot.behaviour.as_mut();
            let mut ctx = NodeContext::new(index, env.tick, env.actor, &mut *env.locals);
            self.current = Some(index);
            let result = match call {
                Call::Execute => node.execute(&mut ctx),
                Call::Receive(child) => node.receive_child_result(&mut ctx, child),
                Call::Fail(error) => Err(error),
            };
            let state = match result {
                Ok(state) => state,
                Err(error) => {
                    tracing::debug!(stack = %self.label, %error, "node raised an error");
                    node.handle_error(&mut ctx, &error)
                }
            };
            self.current = None;
            (state, ctx.into_requests(), capability)
        };
        self.previous = Some(index);
        self.route(env, index, state, requests, capability)
    }

    fn route(
        &mut self,
        env: &mut StackEnv<'_>,
        index: NodeIndex,
        state: State,
        requests: Requests,
        capability: Capability,
    ) -> Result<(), SchedulerError> {
        if let Some(target) = requests.unresolved {
            return Err(SchedulerError::MissingNode {
                node: env.graph.name(index).to_string(),
                target: target.to_string(),
            });
        }
        if !requests.pushed.is_empty() && state != State::NoReturn {
            return Err(SchedulerError::UnexpectedPush {
                node: env.graph.name(index).to_string(),
                state,
            });
        }
        if requests.action.is_some() && state != State::WaitAction {
            tracing::debug!(stack = %self.label, node = %env.graph.name(index), ?state, "dropping action registered without WaitAction");
        }

        match state {
            State::Success | State::Failed => {
                let result = state == State::Success;
                self.pop(env.graph);
                match self.frames.last() {
                    None => {
                        self.state = StackState::End;
                        self.last_result = Some(result);
                        self.previous = None;
                    }
                    // Pushed together with the finished node but never run yet.
                    Some(frame) if !frame.started => {
                        self.pending_result = result;
                        self.state = StackState::Calling;
                    }
                    Some(_) => {
                        self.pending_result = result;
                        self.state = StackState::Receiving;
                    }
                }
                Ok(())
            }
            State::NoReturn => {
                if requests.pushed.is_empty() {
                    return Err(SchedulerError::NoReturnWithoutPush {
                        node: env.graph.name(index).to_string(),
                    });
                }
                for child in requests.pushed {
                    if env.graph.get(child).is_none() {
                        return Err(SchedulerError::MissingNode {
                            node: env.graph.name(index).to_string(),
                            target: format!("#{}", child.index()),
                        });
                    }
                    if self.contains(child) {
                        return Err(SchedulerError::AlreadyOnStack {
                            node: env.graph.name(child).to_string(),
                        });
                    }
                    self.push(child, env.graph);
                }
                self.state = StackState::Calling;
                Ok(())
            }
            State::Yield => {
                tracing::debug!(stack = %self.label, node = %env.graph.name(index), "yield until next tick");
                self.state = StackState::WaitNextTick;
                self.suspended_on = env.tick.tick;
                self.previous = None;
                Ok(())
            }
            State::WaitAction => {
                if capability != Capability::Action {
                    return Err(SchedulerError::IllegalWait {
                        node: env.graph.name(index).to_string(),
                        reason: "the node is not action-capable",
                    });
                }
                let Some(action) = requests.action else {
                    return Err(SchedulerError::IllegalWait {
                        node: env.graph.name(index).to_string(),
                        reason: "no action was registered",
                    });
                };
                tracing::debug!(stack = %self.label, node = %env.graph.name(index), "waiting on action");
                self.action = Some(PendingAction::new(action));
                self.state = StackState::Waiting;
                self.previous = None;
                Ok(())
            }
            State::Error => Err(SchedulerError::NodeFault {
                node: env.graph.name(index).to_string(),
            }),
        }
    }

    fn push(&mut self, node: NodeIndex, graph: &LiveGraph) {
        tracing::debug!(stack = %self.label, node = %graph.name(node), depth = self.frames.len() + 1, "push");
        self.frames.push(Frame {
            node,
            started: false,
        });
        if self.track_events {
            self.events.push(StackEvent::Pushed(node));
        }
    }

    fn pop(&mut self, graph: &mut LiveGraph) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        if let Some(slot) = graph.get_mut(frame.node) {
            slot.behaviour.stop();
        }
        tracing::debug!(stack = %self.label, node = %graph.name(frame.node), depth = self.frames.len(), "pop");
        if self.track_events {
            self.events.push(StackEvent::Popped(frame.node));
        }
    }
}
