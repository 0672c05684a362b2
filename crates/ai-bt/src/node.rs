use std::future::Future;

use ai_core::{ActorHandle, LocalVariables, TickContext, VariableValue};
use uuid::Uuid;

use crate::action::{ActionFuture, ActionResult};
use crate::{BindError, Binder, Capability, NodeError, ServiceTiming, State, VariableField};

/// Position of a live node in its tree instance's graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(pub(crate) u32);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Reference from one node to another: authored as a UUID, resolved to an index by the binder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    id: Uuid,
    index: Option<NodeIndex>,
}

impl NodeRef {
    pub fn new(id: Uuid) -> Self {
        Self { id, index: None }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn index(&self) -> Option<NodeIndex> {
        self.index
    }

    pub fn is_bound(&self) -> bool {
        self.index.is_some()
    }

    pub(crate) fn set_index(&mut self, index: NodeIndex) {
        self.index = Some(index);
    }
}

impl From<Uuid> for NodeRef {
    fn from(id: Uuid) -> Self {
        NodeRef::new(id)
    }
}

/// The execution contract every node implements.
///
/// The scheduler only ever talks to nodes through this trait; it knows nothing about individual
/// node semantics.
pub trait Node: Send + 'static {
    fn capability(&self) -> Capability;

    /// Declare every `NodeRef`, `VariableField` and `AssetField` this node holds.
    fn bind(&mut self, _binder: &mut Binder<'_>) -> Result<(), BindError> {
        Ok(())
    }

    /// One-time setup after binding. Must not touch shared state.
    fn initialize(&mut self) {}

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<State, NodeError>;

    /// Called with the outcome of a pushed child or of an awaited action.
    fn receive_child_result(
        &mut self,
        _ctx: &mut NodeContext<'_>,
        result: bool,
    ) -> Result<State, NodeError> {
        Ok(State::from_bool(result))
    }

    /// Convert an error raised by `execute`/`receive_child_result`. Override to fail gracefully.
    fn handle_error(&mut self, _ctx: &mut NodeContext<'_>, _error: &NodeError) -> State {
        State::Error
    }

    /// Called exactly once each time the node is popped, for whatever reason.
    fn stop(&mut self) {}

    /// Per-frame hook, only delivered to the active node when it is an action node.
    fn update(&mut self, _ctx: &mut NodeContext<'_>) {}

    fn late_update(&mut self, _ctx: &mut NodeContext<'_>) {}

    /// Services report how often they run.
    fn service_timing(&self) -> Option<ServiceTiming> {
        None
    }
}

/// Immutable prototype-side form of a node; cloned into a fresh live node per tree instance.
pub trait NodeTemplate: Send + Sync + 'static {
    fn instantiate(&self) -> Box<dyn Node>;

    fn type_name(&self) -> &'static str;
}

impl<T> NodeTemplate for T
where
    T: Node + Clone + Sync,
{
    fn instantiate(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

#[derive(Default)]
pub(crate) struct Requests {
    pub(crate) pushed: Vec<NodeIndex>,
    pub(crate) unresolved: Option<Uuid>,
    pub(crate) action: Option<ActionFuture>,
}

impl Requests {
    pub(crate) fn is_empty(&self) -> bool {
        self.pushed.is_empty() && self.unresolved.is_none() && self.action.is_none()
    }
}

/// Everything a node may touch during one call.
pub struct NodeContext<'a> {
    node: NodeIndex,
    tick: &'a TickContext,
    actor: &'a ActorHandle,
    locals: &'a mut LocalVariables,
    requests: Requests,
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(
        node: NodeIndex,
        tick: &'a TickContext,
        actor: &'a ActorHandle,
        locals: &'a mut LocalVariables,
    ) -> Self {
        Self {
            node,
            tick,
            actor,
            locals,
            requests: Requests::default(),
        }
    }

    pub fn node(&self) -> NodeIndex {
        self.node
    }

    pub fn tick(&self) -> &TickContext {
        self.tick
    }

    pub fn dt(&self) -> f32 {
        self.tick.dt_seconds
    }

    pub fn actor(&self) -> &ActorHandle {
        self.actor
    }

    pub fn locals(&self) -> &LocalVariables {
        self.locals
    }

    /// Schedule `child` above this node. Children pushed in one call run last-pushed first.
    pub fn push(&mut self, child: &NodeRef) {
        match child.index() {
            Some(index) => self.requests.pushed.push(index),
            None => self.requests.unresolved = Some(child.id()),
        }
    }

    /// Register the action a `WaitAction` result waits on.
    pub fn wait_for<F>(&mut self, action: F)
    where
        F: Future<Output = ActionResult> + Send + 'static,
    {
        self.requests.action = Some(Box::pin(action));
    }

    pub fn read(&self, field: &VariableField) -> Result<VariableValue, NodeError> {
        field.read(self.locals)
    }

    pub fn write(
        &mut self,
        field: &VariableField,
        value: impl Into<VariableValue>,
    ) -> Result<(), NodeError> {
        field.write(self.locals, value.into())
    }

    pub(crate) fn into_requests(self) -> Requests {
        self.requests
    }
}
