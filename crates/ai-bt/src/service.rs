//! Periodic service sub-stacks.
//!
//! Every service attached to a node on the main stack gets its own [`NodeCallStack`] and timer.
//! The stack lives exactly as long as its owner stays on the main stack.

use std::collections::BTreeMap;

use ai_core::{ActorHandle, DeterministicRng, SplitMix64, TickContext, TIME_EPSILON};
use serde::{Deserialize, Serialize};

use crate::{LiveGraph, NodeCallStack, NodeIndex, SchedulerError, StackEnv, StackState};

/// How often a service fires: every `interval_seconds`, jittered by up to `random_deviation`
/// seconds in either direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceTiming {
    pub interval_seconds: f32,
    #[serde(default)]
    pub random_deviation: f32,
}

impl ServiceTiming {
    pub fn new(interval_seconds: f32) -> Self {
        Self {
            interval_seconds,
            random_deviation: 0.0,
        }
    }

    pub fn with_deviation(mut self, random_deviation: f32) -> Self {
        self.random_deviation = random_deviation;
        self
    }
}

pub struct ServiceStack {
    owner: NodeIndex,
    service: NodeIndex,
    timing: ServiceTiming,
    stack: NodeCallStack,
    elapsed: f32,
    next_due: f32,
    rng: SplitMix64,
    runs: u64,
    overruns: u64,
}

impl ServiceStack {
    fn new(
        owner: NodeIndex,
        service: NodeIndex,
        timing: ServiceTiming,
        mut rng: SplitMix64,
        label: String,
    ) -> Self {
        let next_due = rng.deviate(timing.interval_seconds, timing.random_deviation);
        Self {
            owner,
            service,
            timing,
            stack: NodeCallStack::untracked(label),
            elapsed: 0.0,
            next_due,
            rng,
            runs: 0,
            overruns: 0,
        }
    }

    pub fn owner(&self) -> NodeIndex {
        self.owner
    }

    pub fn service(&self) -> NodeIndex {
        self.service
    }

    pub fn timing(&self) -> ServiceTiming {
        self.timing
    }

    pub fn state(&self) -> StackState {
        self.stack.state()
    }

    pub fn runs(&self) -> u64 {
        self.runs
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Advance the timer; `true` when the service is due. Resets the timer and draws the next
    /// jittered interval when it fires.
    pub fn tick_timer(&mut self, dt: f32) -> bool {
        self.elapsed += dt;
        if self.elapsed + TIME_EPSILON < self.next_due {
            return false;
        }
        self.elapsed = 0.0;
        self.next_due = self
            .rng
            .deviate(self.timing.interval_seconds, self.timing.random_deviation);
        true
    }

    /// Start a fresh run, breaking a previous one that has not finished. Returns whether a stale
    /// run was pre-empted.
    pub fn fire(&mut self, env: &mut StackEnv<'_>) -> Result<bool, SchedulerError> {
        let overrun = self.stack.state() != StackState::End;
        if overrun {
            self.overruns += 1;
            tracing::warn!(
                service = %env.graph.name(self.service),
                owner = %env.graph.name(self.owner),
                state = ?self.stack.state(),
                "service overrun, breaking previous run"
            );
            self.stack.end(env.graph);
        }
        self.runs += 1;
        tracing::debug!(service = %env.graph.name(self.service), run = self.runs, "service fired");
        self.stack.start(self.service, env)?;
        Ok(overrun)
    }

    /// Resume a run suspended on an earlier tick.
    pub fn step(&mut self, env: &mut StackEnv<'_>) -> Result<(), SchedulerError> {
        match self.stack.state() {
            StackState::End | StackState::Invalid => Ok(()),
            _ => self.stack.run(env),
        }
    }

    pub fn teardown(&mut self, graph: &mut LiveGraph) {
        self.stack.end(graph);
    }
}

/// Live service stacks keyed by service node.
#[derive(Default)]
pub struct ServiceTable {
    stacks: BTreeMap<NodeIndex, ServiceStack>,
}

impl ServiceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    pub fn get(&self, service: NodeIndex) -> Option<&ServiceStack> {
        self.stacks.get(&service)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceStack> {
        self.stacks.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ServiceStack> {
        self.stacks.values_mut()
    }

    /// Create stacks for every service attached to `owner`. Services already live are left alone.
    pub fn register(
        &mut self,
        owner: NodeIndex,
        graph: &LiveGraph,
        tick: &TickContext,
        actor: &ActorHandle,
    ) {
        let Some(slot) = graph.get(owner) else {
            return;
        };
        for &service in slot.services() {
            if self.stacks.contains_key(&service) {
                continue;
            }
            let Some(timing) = graph.get(service).and_then(|s| s.behaviour().service_timing())
            else {
                continue;
            };
            let rng = tick.rng_for_actor(actor.id(), service.index() as u64);
            let label = format!("service:{}", graph.name(service));
            tracing::debug!(service = %graph.name(service), owner = %slot.name(), "service registered");
            self.stacks
                .insert(service, ServiceStack::new(owner, service, timing, rng, label));
        }
    }

    /// Tear down every service owned by `owner`, cascading `stop` through unfinished runs.
    pub fn unregister_owner(&mut self, owner: NodeIndex, graph: &mut LiveGraph) {
        let owned: Vec<NodeIndex> = self
            .stacks
            .iter()
            .filter(|(_, s)| s.owner == owner)
            .map(|(k, _)| *k)
            .collect();
        for service in owned {
            if let Some(mut stack) = self.stacks.remove(&service) {
                stack.teardown(graph);
                tracing::debug!(service = %graph.name(service), "service torn down");
            }
        }
    }

    pub fn clear(&mut self, graph: &mut LiveGraph) {
        for stack in self.stacks.values_mut() {
            stack.teardown(graph);
        }
        self.stacks.clear();
    }
}
