use ai_core::{VariableType, VariableValue};

use crate::{BindError, Binder, Capability, Node, NodeContext, NodeError, State, VariableField};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// `result = left <op> right`.
///
/// Two ints produce an int; anything involving a float produces a float. Division by zero and
/// integer overflow make the node fail and leave `result` untouched. Non-numeric operands are a
/// node error.
#[derive(Debug, Clone)]
pub struct Arithmetic {
    op: ArithmeticOp,
    left: VariableField,
    right: VariableField,
    result: VariableField,
}

impl Arithmetic {
    pub fn new(
        op: ArithmeticOp,
        left: impl Into<VariableField>,
        right: impl Into<VariableField>,
        result: VariableField,
    ) -> Self {
        Self {
            op,
            left: left.into(),
            right: right.into(),
            result,
        }
    }

    fn apply(
        &self,
        left: &VariableValue,
        right: &VariableValue,
    ) -> Result<Option<VariableValue>, NodeError> {
        if let (VariableValue::Int(a), VariableValue::Int(b)) = (left, right) {
            let value = match self.op {
                ArithmeticOp::Add => a.checked_add(*b),
                ArithmeticOp::Subtract => a.checked_sub(*b),
                ArithmeticOp::Multiply => a.checked_mul(*b),
                ArithmeticOp::Divide => a.checked_div(*b),
            };
            return Ok(value.map(VariableValue::Int));
        }

        let operand = |value: &VariableValue| {
            value.as_float().ok_or(NodeError::Type {
                expected: VariableType::Float,
                found: value.value_type(),
            })
        };
        let (a, b) = (operand(left)?, operand(right)?);
        let value = match self.op {
            ArithmeticOp::Add => a + b,
            ArithmeticOp::Subtract => a - b,
            ArithmeticOp::Multiply => a * b,
            ArithmeticOp::Divide if b == 0.0 => return Ok(None),
            ArithmeticOp::Divide => a / b,
        };
        Ok(value.is_finite().then_some(VariableValue::Float(value)))
    }
}

impl Node for Arithmetic {
    fn capability(&self) -> Capability {
        Capability::Arithmetic
    }

    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), BindError> {
        binder.variable(&mut self.left)?;
        binder.variable(&mut self.right)?;
        binder.variable(&mut self.result)
    }

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<State, NodeError> {
        let left = ctx.read(&self.left)?;
        let right = ctx.read(&self.right)?;
        match self.apply(&left, &right)? {
            Some(value) => {
                ctx.write(&self.result, value)?;
                Ok(State::Success)
            }
            None => {
                tracing::debug!(op = ?self.op, ?left, ?right, "arithmetic undefined");
                Ok(State::Failed)
            }
        }
    }
}
