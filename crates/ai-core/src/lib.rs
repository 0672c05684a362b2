//! Deterministic, engine-agnostic kernel primitives for behaviour tree instances.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod agent;
pub mod error;
pub mod registry;
pub mod rng;
pub mod table;
pub mod tick;
pub mod variable;

pub use agent::{ActorHandle, ActorId};
pub use error::VariableError;
pub use registry::VariableRegistry;
pub use rng::{DeterministicRng, SplitMix64};
pub use table::{LocalSlot, LocalVariables, SharedVariable, SharedVariables, VariableHandle};
pub use tick::{TickContext, TIME_EPSILON};
pub use variable::{
    ImplicitVariable, ObjectRef, Variable, VariableData, VariableScope, VariableType,
    VariableValue,
};
