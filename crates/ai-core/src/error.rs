use thiserror::Error;
use uuid::Uuid;

use crate::VariableType;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VariableError {
    #[error("variable `{name}` is constant")]
    Constant { name: String },
    #[error("variable `{name}` expects {expected:?}, got {found:?}")]
    TypeMismatch {
        name: String,
        expected: VariableType,
        found: Option<VariableType>,
    },
    #[error("unknown variable {0}")]
    Unknown(Uuid),
    #[error("variable {0} declared twice")]
    Duplicate(Uuid),
}
