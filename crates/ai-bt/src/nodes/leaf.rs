use std::cmp::Ordering;

use ai_core::{VariableType, VariableValue, TIME_EPSILON};

use crate::{BindError, Binder, Capability, Node, NodeContext, NodeError, State, VariableField};

#[derive(Debug, Clone, Copy, Default)]
pub struct Succeed;

impl Node for Succeed {
    fn capability(&self) -> Capability {
        Capability::Determine
    }

    fn execute(&mut self, _ctx: &mut NodeContext<'_>) -> Result<State, NodeError> {
        Ok(State::Success)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Fail;

impl Node for Fail {
    fn capability(&self) -> Capability {
        Capability::Determine
    }

    fn execute(&mut self, _ctx: &mut NodeContext<'_>) -> Result<State, NodeError> {
        Ok(State::Failed)
    }
}

/// Yields once, then succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct YieldOnce {
    yielded: bool,
}

impl Node for YieldOnce {
    fn capability(&self) -> Capability {
        Capability::Action
    }

    fn execute(&mut self, _ctx: &mut NodeContext<'_>) -> Result<State, NodeError> {
        if self.yielded {
            self.yielded = false;
            return Ok(State::Success);
        }
        self.yielded = true;
        Ok(State::Yield)
    }

    fn stop(&mut self) {
        self.yielded = false;
    }
}

/// Yields every tick until `seconds` of tick time have passed since it became active.
#[derive(Debug, Clone)]
pub struct Wait {
    seconds: VariableField,
    elapsed: f32,
    active: bool,
}

impl Wait {
    pub fn new(seconds: f32) -> Self {
        Self::from_field(VariableField::constant(seconds))
    }

    /// Read the duration from a numeric variable when the wait begins.
    pub fn from_field(seconds: VariableField) -> Self {
        Self {
            seconds: seconds.expecting(VariableType::Float),
            elapsed: 0.0,
            active: false,
        }
    }
}

impl Node for Wait {
    fn capability(&self) -> Capability {
        Capability::Action
    }

    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), BindError> {
        binder.variable(&mut self.seconds)
    }

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<State, NodeError> {
        if self.active {
            self.elapsed += ctx.dt();
        } else {
            self.active = true;
            self.elapsed = 0.0;
        }
        let value = ctx.read(&self.seconds)?;
        let seconds = value.as_float().ok_or(NodeError::Type {
            expected: VariableType::Float,
            found: value.value_type(),
        })?;
        if f64::from(self.elapsed + TIME_EPSILON) >= seconds {
            self.active = false;
            Ok(State::Success)
        } else {
            Ok(State::Yield)
        }
    }

    fn stop(&mut self) {
        self.active = false;
        self.elapsed = 0.0;
    }
}

/// Copies `value` into `target`.
#[derive(Debug, Clone)]
pub struct SetVariable {
    target: VariableField,
    value: VariableField,
}

impl SetVariable {
    pub fn new(target: VariableField, value: impl Into<VariableField>) -> Self {
        Self {
            target,
            value: value.into(),
        }
    }
}

impl Node for SetVariable {
    fn capability(&self) -> Capability {
        Capability::Action
    }

    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), BindError> {
        binder.variable(&mut self.target)?;
        binder.variable(&mut self.value)
    }

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<State, NodeError> {
        let value = ctx.read(&self.value)?;
        ctx.write(&self.target, value)?;
        Ok(State::Success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

/// Succeeds when `left <op> right` holds. Values that cannot be compared make it fail.
#[derive(Debug, Clone)]
pub struct Compare {
    left: VariableField,
    op: CompareOp,
    right: VariableField,
}

impl Compare {
    pub fn new(
        left: impl Into<VariableField>,
        op: CompareOp,
        right: impl Into<VariableField>,
    ) -> Self {
        Self {
            left: left.into(),
            op,
            right: right.into(),
        }
    }
}

fn order(left: &VariableValue, right: &VariableValue) -> Result<Option<Ordering>, NodeError> {
    match (left, right) {
        (VariableValue::Int(a), VariableValue::Int(b)) => Ok(Some(a.cmp(b))),
        (VariableValue::String(a), VariableValue::String(b)) => Ok(Some(a.cmp(b))),
        _ => match (left.as_float(), right.as_float()) {
            (Some(a), Some(b)) => Ok(a.partial_cmp(&b)),
            _ => Err(NodeError::Type {
                expected: left.value_type().unwrap_or(VariableType::Object),
                found: right.value_type(),
            }),
        },
    }
}

impl Node for Compare {
    fn capability(&self) -> Capability {
        Capability::Determine
    }

    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), BindError> {
        binder.variable(&mut self.left)?;
        binder.variable(&mut self.right)
    }

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<State, NodeError> {
        let left = ctx.read(&self.left)?;
        let right = ctx.read(&self.right)?;
        let holds = match self.op {
            CompareOp::Equal | CompareOp::NotEqual => {
                let equal = match (left.as_float(), right.as_float()) {
                    (Some(a), Some(b)) => a == b,
                    _ => left == right,
                };
                equal == (self.op == CompareOp::Equal)
            }
            CompareOp::Less => order(&left, &right)? == Some(Ordering::Less),
            CompareOp::LessOrEqual => matches!(
                order(&left, &right)?,
                Some(Ordering::Less | Ordering::Equal)
            ),
            CompareOp::Greater => order(&left, &right)? == Some(Ordering::Greater),
            CompareOp::GreaterOrEqual => matches!(
                order(&left, &right)?,
                Some(Ordering::Greater | Ordering::Equal)
            ),
        };
        Ok(State::from_bool(holds))
    }

    fn handle_error(&mut self, _ctx: &mut NodeContext<'_>, error: &NodeError) -> State {
        tracing::debug!(%error, "comparison failed");
        State::Failed
    }
}
