use crate::{BindError, Binder, Capability, Node, NodeContext, NodeError, NodeRef, State};

/// Runs children in order; fails on the first failing child.
#[derive(Debug, Clone)]
pub struct Sequence {
    children: Vec<NodeRef>,
    index: usize,
}

impl Sequence {
    pub fn new(children: impl IntoIterator<Item = impl Into<NodeRef>>) -> Self {
        Self {
            children: children.into_iter().map(Into::into).collect(),
            index: 0,
        }
    }
}

impl Node for Sequence {
    fn capability(&self) -> Capability {
        Capability::Flow
    }

    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), BindError> {
        binder.nodes(&mut self.children)
    }

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<State, NodeError> {
        self.index = 0;
        match self.children.first() {
            Some(first) => {
                ctx.push(first);
                Ok(State::NoReturn)
            }
            None => Ok(State::Success),
        }
    }

    fn receive_child_result(
        &mut self,
        ctx: &mut NodeContext<'_>,
        result: bool,
    ) -> Result<State, NodeError> {
        if !result {
            return Ok(State::Failed);
        }
        self.index += 1;
        match self.children.get(self.index) {
            Some(next) => {
                ctx.push(next);
                Ok(State::NoReturn)
            }
            None => Ok(State::Success),
        }
    }

    fn stop(&mut self) {
        self.index = 0;
    }
}

/// Runs children in order; succeeds on the first succeeding child.
#[derive(Debug, Clone)]
pub struct Selector {
    children: Vec<NodeRef>,
    index: usize,
}

impl Selector {
    pub fn new(children: impl IntoIterator<Item = impl Into<NodeRef>>) -> Self {
        Self {
            children: children.into_iter().map(Into::into).collect(),
            index: 0,
        }
    }
}

impl Node for Selector {
    fn capability(&self) -> Capability {
        Capability::Flow
    }

    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), BindError> {
        binder.nodes(&mut self.children)
    }

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<State, NodeError> {
        self.index = 0;
        match self.children.first() {
            Some(first) => {
                ctx.push(first);
                Ok(State::NoReturn)
            }
            None => Ok(State::Failed),
        }
    }

    fn receive_child_result(
        &mut self,
        ctx: &mut NodeContext<'_>,
        result: bool,
    ) -> Result<State, NodeError> {
        if result {
            return Ok(State::Success);
        }
        self.index += 1;
        match self.children.get(self.index) {
            Some(next) => {
                ctx.push(next);
                Ok(State::NoReturn)
            }
            None => Ok(State::Failed),
        }
    }

    fn stop(&mut self) {
        self.index = 0;
    }
}

#[derive(Debug, Clone)]
pub struct Inverter {
    child: NodeRef,
}

impl Inverter {
    pub fn new(child: impl Into<NodeRef>) -> Self {
        Self {
            child: child.into(),
        }
    }
}

impl Node for Inverter {
    fn capability(&self) -> Capability {
        Capability::Flow
    }

    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), BindError> {
        binder.node(&mut self.child)
    }

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<State, NodeError> {
        ctx.push(&self.child);
        Ok(State::NoReturn)
    }

    fn receive_child_result(
        &mut self,
        _ctx: &mut NodeContext<'_>,
        result: bool,
    ) -> Result<State, NodeError> {
        Ok(State::from_bool(!result))
    }
}

/// Re-runs its child, once per tick, `count` times (forever for `None`).
///
/// Succeeds once the count is reached regardless of the child's results.
#[derive(Debug, Clone)]
pub struct Repeat {
    child: NodeRef,
    count: Option<u32>,
    iterations: u32,
}

impl Repeat {
    pub fn new(child: impl Into<NodeRef>, count: Option<u32>) -> Self {
        Self {
            child: child.into(),
            count,
            iterations: 0,
        }
    }

    pub fn forever(child: impl Into<NodeRef>) -> Self {
        Self::new(child, None)
    }

    pub fn times(child: impl Into<NodeRef>, count: u32) -> Self {
        Self::new(child, Some(count))
    }
}

impl Node for Repeat {
    fn capability(&self) -> Capability {
        Capability::Flow
    }

    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), BindError> {
        binder.node(&mut self.child)
    }

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<State, NodeError> {
        if self.count == Some(0) {
            return Ok(State::Success);
        }
        ctx.push(&self.child);
        Ok(State::NoReturn)
    }

    fn receive_child_result(
        &mut self,
        _ctx: &mut NodeContext<'_>,
        _result: bool,
    ) -> Result<State, NodeError> {
        self.iterations = self.iterations.saturating_add(1);
        match self.count {
            Some(count) if self.iterations >= count => Ok(State::Success),
            // The next iteration starts from `execute` on the following tick.
            _ => Ok(State::Yield),
        }
    }

    fn stop(&mut self) {
        self.iterations = 0;
    }
}
