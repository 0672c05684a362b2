//! Built-in nodes: enough control flow and leaves to assemble and test trees without a host.

mod action;
mod arithmetic;
mod flow;
mod leaf;
mod service;

pub use action::RunAction;
pub use arithmetic::{Arithmetic, ArithmeticOp};
pub use flow::{Inverter, Repeat, Selector, Sequence};
pub use leaf::{Compare, CompareOp, Fail, SetVariable, Succeed, Wait, YieldOnce};
pub use service::ServiceNode;
