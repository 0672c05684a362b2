use crate::{
    BindError, Binder, Capability, Node, NodeContext, NodeError, NodeRef, ServiceTiming, State,
};

/// A periodic service: each run executes `child` on the service's own stack.
#[derive(Debug, Clone)]
pub struct ServiceNode {
    child: NodeRef,
    timing: ServiceTiming,
}

impl ServiceNode {
    pub fn new(child: impl Into<NodeRef>, timing: ServiceTiming) -> Self {
        Self {
            child: child.into(),
            timing,
        }
    }
}

impl Node for ServiceNode {
    fn capability(&self) -> Capability {
        Capability::Service
    }

    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), BindError> {
        binder.node(&mut self.child)
    }

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<State, NodeError> {
        ctx.push(&self.child);
        Ok(State::NoReturn)
    }

    fn service_timing(&self) -> Option<ServiceTiming> {
        Some(self.timing)
    }
}
