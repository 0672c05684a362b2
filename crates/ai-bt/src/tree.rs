//! One live behaviour tree per controlled actor.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use ai_core::{ActorHandle, LocalVariables, SharedVariables, TickContext, VariableRegistry};
use ai_tools::{emit as trace_emit, TraceEvent, TraceSink};

use crate::{
    bind_graph, BindError, Capability, ErrorPolicy, LiveGraph, NodeCallStack, NodeContext,
    NodeIndex, SchedulerError, ServiceTable, StackEnv, StackEvent, StackState, TreeError,
    TreePrototype,
};

#[derive(Debug, Clone, Copy, Default)]
struct Stage {
    node: Option<NodeIndex>,
    elapsed: f32,
}

#[derive(Debug, Clone, Copy)]
enum FrameHook {
    Update,
    LateUpdate,
}

/// Owns a bound live graph, its main call stack, the service stacks and the instance's local
/// variables, and exposes the lifecycle and per-tick entry points to the host.
pub struct BehaviourTree {
    prototype: Arc<TreePrototype>,
    actor: ActorHandle,
    registry: Arc<VariableRegistry>,
    graph: LiveGraph,
    locals: LocalVariables,
    statics: Arc<SharedVariables>,
    main: NodeCallStack,
    services: ServiceTable,
    running: bool,
    paused: bool,
    stage: Stage,
    generation: u64,
    last_tick: u64,
    trace: Option<Box<dyn TraceSink>>,
}

impl BehaviourTree {
    pub fn new(
        prototype: Arc<TreePrototype>,
        actor: ActorHandle,
        registry: Arc<VariableRegistry>,
    ) -> Result<Self, BindError> {
        let bound = bind_graph(&prototype, &actor, &registry)?;
        Ok(Self {
            prototype,
            actor,
            registry,
            graph: bound.graph,
            locals: bound.locals,
            statics: bound.statics,
            main: NodeCallStack::new("main"),
            services: ServiceTable::new(),
            running: false,
            paused: false,
            stage: Stage::default(),
            generation: 0,
            last_tick: 0,
            trace: None,
        })
    }

    /// Bind the graph on a worker thread. [`PendingTree::join`] is the synchronization point and
    /// must be called before the first tick.
    pub fn build_in_background(
        prototype: Arc<TreePrototype>,
        actor: ActorHandle,
        registry: Arc<VariableRegistry>,
    ) -> PendingTree {
        PendingTree {
            handle: thread::spawn(move || BehaviourTree::new(prototype, actor, registry)),
        }
    }

    pub fn with_trace(mut self, sink: Box<dyn TraceSink>) -> Self {
        self.trace = Some(sink);
        self
    }

    pub fn set_trace(&mut self, sink: Option<Box<dyn TraceSink>>) {
        self.trace = sink;
    }

    pub fn prototype(&self) -> &Arc<TreePrototype> {
        &self.prototype
    }

    pub fn actor(&self) -> &ActorHandle {
        &self.actor
    }

    pub fn registry(&self) -> &Arc<VariableRegistry> {
        &self.registry
    }

    pub fn graph(&self) -> &LiveGraph {
        &self.graph
    }

    pub fn locals(&self) -> &LocalVariables {
        &self.locals
    }

    pub fn statics(&self) -> &Arc<SharedVariables> {
        &self.statics
    }

    pub fn services(&self) -> &ServiceTable {
        &self.services
    }

    pub fn main_stack(&self) -> &NodeCallStack {
        &self.main
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn stack_state(&self) -> StackState {
        self.main.state()
    }

    pub fn stack_len(&self) -> usize {
        self.main.len()
    }

    /// Top of the main stack.
    pub fn current_node(&self) -> Option<NodeIndex> {
        self.main.top()
    }

    pub fn current_node_name(&self) -> Option<&str> {
        self.main.top().map(|n| self.graph.name(n))
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn stage_elapsed(&self) -> f32 {
        self.stage.elapsed
    }

    /// Bumped every time the live graph is rebuilt.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Outcome of the last run that emptied the main stack.
    pub fn last_result(&self) -> Option<bool> {
        self.main.last_result()
    }

    pub fn start(&mut self, tick: &TickContext) -> Result<(), TreeError> {
        if self.running {
            return Err(TreeError::AlreadyRunning);
        }
        self.last_tick = tick.tick;
        match self.launch(tick) {
            Ok(()) => Ok(()),
            Err(error) => self.handle_fault(tick, error, true),
        }
    }

    /// Tear everything down, rebind the graph from the prototype and start again from the head.
    /// Clears a pause.
    pub fn restart(&mut self, tick: &TickContext) -> Result<(), TreeError> {
        self.last_tick = tick.tick;
        self.shutdown();
        let bound = bind_graph(&self.prototype, &self.actor, &self.registry)?;
        self.graph = bound.graph;
        self.locals = bound.locals;
        self.statics = bound.statics;
        self.main = NodeCallStack::new("main");
        self.generation += 1;
        self.paused = false;
        trace_emit(
            &mut self.trace,
            TraceEvent::new(tick.tick, "bt.tree.restart").with_a(self.generation),
        );
        tracing::info!(
            tree = %self.prototype.name(),
            actor = self.actor.id(),
            generation = self.generation,
            "behaviour tree restarted"
        );
        match self.launch(tick) {
            Ok(()) => Ok(()),
            Err(error) => self.handle_fault(tick, error, false),
        }
    }

    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            tracing::debug!(tree = %self.prototype.name(), "paused");
        }
    }

    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            tracing::debug!(tree = %self.prototype.name(), "resumed");
        }
    }

    /// Force-unwind the main stack and every service stack, leaving the tree inert.
    pub fn end(&mut self) {
        let was_running = self.running;
        self.shutdown();
        if was_running {
            trace_emit(&mut self.trace, TraceEvent::new(self.last_tick, "bt.tree.end"));
            tracing::info!(tree = %self.prototype.name(), actor = self.actor.id(), "behaviour tree ended");
        }
    }

    /// Unwind the main stack down to `stop_at` (or entirely for `None`), tearing down the
    /// services of every popped node. Returns `false` when `stop_at` is not on the stack.
    pub fn break_to(&mut self, stop_at: Option<NodeIndex>) -> bool {
        if !self.main.break_to(stop_at, &mut self.graph) {
            return false;
        }
        self.drain_stack_events(None);
        if self.main.state() == StackState::End {
            self.finish_run();
        }
        true
    }

    pub fn update(&mut self, tick: &TickContext) -> Result<(), TreeError> {
        self.forward_frame_hook(tick, FrameHook::Update);
        Ok(())
    }

    pub fn late_update(&mut self, tick: &TickContext) -> Result<(), TreeError> {
        self.forward_frame_hook(tick, FrameHook::LateUpdate);
        Ok(())
    }

    /// One scheduling step: main stack, then service stacks, then service timers, then the
    /// stage watchdog.
    ///
    /// `tick.tick` must advance from call to call: a node that yielded is resumed only by a
    /// step whose tick number differs from the one it yielded on.
    pub fn fixed_update(&mut self, tick: &TickContext) -> Result<(), TreeError> {
        if !self.running {
            return Ok(());
        }
        self.last_tick = tick.tick;

        // Action completions are accepted while paused.
        let polled = {
            let mut env = StackEnv {
                graph: &mut self.graph,
                locals: &mut self.locals,
                actor: &self.actor,
                tick,
            };
            self.main.poll_action(&mut env)
        };
        if let Err(error) = polled {
            return self.handle_fault(tick, error, true);
        }
        // A faulted stack stays inert until `restart` or `end`.
        if self.paused || self.main.state() == StackState::Invalid {
            return Ok(());
        }

        let stepped = {
            let mut env = StackEnv {
                graph: &mut self.graph,
                locals: &mut self.locals,
                actor: &self.actor,
                tick,
            };
            self.main.run(&mut env)
        };
        self.drain_stack_events(Some(tick));
        if let Err(error) = stepped {
            return self.handle_fault(tick, error, true);
        }
        if self.main.state() == StackState::End {
            self.finish_run();
            return Ok(());
        }

        if let Some(error) = self.tick_services(tick) {
            return self.handle_fault(tick, error, true);
        }

        let top = self.main.top();
        if top != self.stage.node {
            self.stage = Stage {
                node: top,
                elapsed: 0.0,
            };
        } else {
            self.stage.elapsed += tick.dt_seconds;
        }
        if self.prototype.settings().stage_timed_out(self.stage.elapsed) {
            tracing::warn!(
                tree = %self.prototype.name(),
                node = self.current_node_name().unwrap_or("<none>"),
                elapsed = self.stage.elapsed,
                "stage timed out, restarting"
            );
            trace_emit(
                &mut self.trace,
                TraceEvent::new(tick.tick, "bt.stage.timeout")
                    .with_a(top.map_or(u64::MAX, |n| n.index() as u64)),
            );
            return self.restart(tick);
        }
        Ok(())
    }

    fn launch(&mut self, tick: &TickContext) -> Result<(), SchedulerError> {
        self.running = true;
        trace_emit(
            &mut self.trace,
            TraceEvent::new(tick.tick, "bt.tree.start").with_a(self.generation),
        );
        tracing::info!(
            tree = %self.prototype.name(),
            actor = self.actor.id(),
            nodes = self.graph.len(),
            "behaviour tree started"
        );
        let head = self.graph.head();
        let started = {
            let mut env = StackEnv {
                graph: &mut self.graph,
                locals: &mut self.locals,
                actor: &self.actor,
                tick,
            };
            self.main.start(head, &mut env)
        };
        self.drain_stack_events(Some(tick));
        self.stage = Stage {
            node: self.main.top(),
            elapsed: 0.0,
        };
        started?;
        if self.main.state() == StackState::End {
            self.finish_run();
        }
        Ok(())
    }

    /// Keep the service table in step with main-stack pushes and pops. Without a tick only
    /// teardown is possible.
    fn drain_stack_events(&mut self, tick: Option<&TickContext>) {
        for event in self.main.drain_events() {
            match (event, tick) {
                (StackEvent::Pushed(node), Some(tick)) => {
                    self.services
                        .register(node, &self.graph, tick, &self.actor)
                }
                (StackEvent::Pushed(_), None) => {}
                (StackEvent::Popped(node), _) => {
                    self.services.unregister_owner(node, &mut self.graph)
                }
            }
        }
    }

    fn tick_services(&mut self, tick: &TickContext) -> Option<SchedulerError> {
        let mut fault = None;
        let mut env = StackEnv {
            graph: &mut self.graph,
            locals: &mut self.locals,
            actor: &self.actor,
            tick,
        };
        for service in self.services.iter_mut() {
            if let Err(error) = service.step(&mut env) {
                fault.get_or_insert(error);
            }
        }
        for service in self.services.iter_mut() {
            if !service.tick_timer(tick.dt_seconds) {
                continue;
            }
            let index = service.service().index() as u64;
            match service.fire(&mut env) {
                Ok(overrun) => {
                    if overrun {
                        trace_emit(
                            &mut self.trace,
                            TraceEvent::new(tick.tick, "bt.service.overrun").with_a(index),
                        );
                    }
                    trace_emit(
                        &mut self.trace,
                        TraceEvent::new(tick.tick, "bt.service.fire")
                            .with_a(index)
                            .with_b(service.runs()),
                    );
                }
                Err(error) => {
                    fault.get_or_insert(error);
                }
            }
        }
        fault
    }

    fn forward_frame_hook(&mut self, tick: &TickContext, hook: FrameHook) {
        if !self.running || self.paused {
            return;
        }
        let Some(top) = self.main.top() else {
            return;
        };
        let Some(slot) = self.graph.get_mut(top) else {
            return;
        };
        if slot.capability() != Capability::Action {
            return;
        }
        let mut ctx = NodeContext::new(top, tick, &self.actor, &mut self.locals);
        match hook {
            FrameHook::Update => slot.behaviour.update(&mut ctx),
            FrameHook::LateUpdate => slot.behaviour.late_update(&mut ctx),
        }
        if !ctx.into_requests().is_empty() {
            tracing::warn!(
                node = %slot.name(),
                ?hook,
                "per-frame hooks cannot push nodes or wait on actions; request ignored"
            );
        }
    }

    fn finish_run(&mut self) {
        self.services.clear(&mut self.graph);
        self.running = false;
        let result = self.main.last_result();
        trace_emit(
            &mut self.trace,
            TraceEvent::new(self.last_tick, "bt.tree.end").with_b(u64::from(result == Some(true))),
        );
        tracing::info!(tree = %self.prototype.name(), actor = self.actor.id(), ?result, "behaviour tree finished");
    }

    fn shutdown(&mut self) {
        self.services.clear(&mut self.graph);
        self.main.end(&mut self.graph);
        self.main.drain_events().for_each(drop);
        self.running = false;
        self.stage = Stage::default();
    }

    fn handle_fault(
        &mut self,
        tick: &TickContext,
        error: SchedulerError,
        allow_restart: bool,
    ) -> Result<(), TreeError> {
        let top = self.main.top();
        tracing::error!(
            tree = %self.prototype.name(),
            node = top.map(|n| self.graph.name(n)).unwrap_or("<none>"),
            state = ?self.main.state(),
            %error,
            "behaviour tree fault"
        );
        trace_emit(
            &mut self.trace,
            TraceEvent::new(tick.tick, "bt.fault").with_a(top.map_or(u64::MAX, |n| n.index() as u64)),
        );

        match self.prototype.settings().error_policy {
            ErrorPolicy::Throw => {
                self.end();
                Err(error.into())
            }
            // Contract violations are node bugs: keep the faulted stack for inspection.
            _ if error.is_contract_violation() => {
                self.park();
                Ok(())
            }
            ErrorPolicy::Pause => {
                self.park();
                Ok(())
            }
            ErrorPolicy::Restart if allow_restart => self.restart(tick),
            ErrorPolicy::Restart => {
                tracing::warn!(tree = %self.prototype.name(), "fault while restarting, pausing instead");
                self.park();
                Ok(())
            }
        }
    }

    /// Pause after a fault. An invalid main stack never runs again, so the services of the
    /// nodes left on it go now.
    fn park(&mut self) {
        self.paused = true;
        if self.main.state() == StackState::Invalid {
            self.services.clear(&mut self.graph);
        }
    }
}

/// A tree whose graph is being bound on a worker thread.
pub struct PendingTree {
    handle: JoinHandle<Result<BehaviourTree, BindError>>,
}

impl PendingTree {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until binding is done.
    pub fn join(self) -> Result<BehaviourTree, TreeError> {
        let built = self.handle.join().map_err(|_| TreeError::BuildPanicked)?;
        Ok(built?)
    }
}
