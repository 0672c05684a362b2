#![allow(dead_code)]

use std::sync::Arc;

use ai_bt::{BindError, Binder, Capability, Node, NodeContext, NodeError, State, VariableField};
use ai_core::{ActorHandle, ObjectRef, TickContext, VariableRegistry, VariableValue};
use parking_lot::Mutex;

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().clone()
}

pub fn count(log: &Log, entry: &str) -> usize {
    log.lock().iter().filter(|e| e.as_str() == entry).count()
}

pub fn actor() -> ActorHandle {
    ActorHandle::new(7u64, ObjectRef::new("body"), ObjectRef::new("frame"))
}

pub fn registry() -> Arc<VariableRegistry> {
    Arc::new(VariableRegistry::new())
}

/// Half-second steps keep every accumulated time exactly representable.
pub fn tick(n: u64) -> TickContext {
    TickContext::new(n, 0.5)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Returns the states in `script` from successive `execute` calls, repeating the last one.
/// The script position survives `stop`, so a re-entered node continues where it left off.
#[derive(Clone)]
pub struct Scripted {
    name: &'static str,
    log: Log,
    script: Vec<State>,
    step: usize,
    capability: Capability,
    counter: Option<VariableField>,
}

impl Scripted {
    pub fn new(name: &'static str, log: &Log, script: impl Into<Vec<State>>) -> Self {
        Self {
            name,
            log: log.clone(),
            script: script.into(),
            step: 0,
            capability: Capability::Action,
            counter: None,
        }
    }

    pub fn forever(name: &'static str, log: &Log, state: State) -> Self {
        Self::new(name, log, vec![state])
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = capability;
        self
    }

    /// Increment an int variable on every `execute`.
    pub fn with_counter(mut self, counter: VariableField) -> Self {
        self.counter = Some(counter);
        self
    }
}

impl Node for Scripted {
    fn capability(&self) -> Capability {
        self.capability
    }

    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), BindError> {
        match self.counter.as_mut() {
            Some(counter) => binder.variable(counter),
            None => Ok(()),
        }
    }

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<State, NodeError> {
        self.log.lock().push(format!("execute:{}", self.name));
        if let Some(counter) = &self.counter {
            let current = ctx.read(counter)?.as_int().unwrap_or(0);
            ctx.write(counter, VariableValue::Int(current + 1))?;
        }
        let state = self.script[self.step.min(self.script.len() - 1)];
        self.step += 1;
        Ok(state)
    }

    fn receive_child_result(
        &mut self,
        _ctx: &mut NodeContext<'_>,
        result: bool,
    ) -> Result<State, NodeError> {
        self.log.lock().push(format!("receive:{}:{}", self.name, result));
        Ok(State::from_bool(result))
    }

    fn stop(&mut self) {
        self.log.lock().push(format!("stop:{}", self.name));
    }
}
