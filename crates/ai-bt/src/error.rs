use std::path::PathBuf;

use ai_core::{VariableError, VariableType};
use thiserror::Error;
use uuid::Uuid;

use crate::{ActionError, State, StackState};

/// Structural problems found while binding a prototype into a live graph. Fatal to construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    #[error("prototype `{prototype}` has no head node")]
    MissingHead { prototype: String },
    #[error("head node {0} is not part of the prototype")]
    UnknownHead(Uuid),
    #[error("node {0} declared twice")]
    DuplicateNode(Uuid),
    #[error("node `{node}` references unknown node {target}")]
    UnknownNode { node: String, target: Uuid },
    #[error("node `{node}` references unknown variable {variable}")]
    UnknownVariable { node: String, variable: Uuid },
    #[error("node `{node}` expects {expected:?} from variable `{variable}`, found {found:?}")]
    VariableType {
        node: String,
        variable: String,
        expected: VariableType,
        found: VariableType,
    },
    #[error("node `{node}` references unknown asset {asset}")]
    UnknownAsset { node: String, asset: Uuid },
    #[error("node `{node}` lists `{service}` as a service, but it is not one")]
    NotAService { node: String, service: String },
    #[error(transparent)]
    Variable(#[from] VariableError),
}

/// Raised from inside a node call; routed through the node's own `handle_error`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NodeError {
    #[error(transparent)]
    Variable(#[from] VariableError),
    #[error("variable field is not bound")]
    UnboundField,
    #[error("expected {expected:?}, found {found:?}")]
    Type {
        expected: VariableType,
        found: Option<VariableType>,
    },
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error("{0}")]
    Custom(String),
}

impl NodeError {
    pub fn custom(message: impl Into<String>) -> Self {
        NodeError::Custom(message.into())
    }
}

/// Faults raised by the scheduler itself.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    #[error("recursive execution of `{node}` without an intervening suspension")]
    RecursiveExecution { node: String },
    #[error("`{node}` returned NoReturn without pushing a child")]
    NoReturnWithoutPush { node: String },
    #[error("`{node}` pushed children but returned {state:?}")]
    UnexpectedPush { node: String, state: State },
    #[error("`{node}` requested WaitAction but {reason}")]
    IllegalWait { node: String, reason: &'static str },
    #[error("`{node}` is already on the stack")]
    AlreadyOnStack { node: String },
    #[error("`{node}` scheduled a missing node {target}")]
    MissingNode { node: String, target: String },
    #[error("`{node}` reported an unrecoverable error")]
    NodeFault { node: String },
    #[error("stack cannot start while {state:?}")]
    Busy { state: StackState },
}

impl SchedulerError {
    /// Violations of the node contract. These always fault the stack and pause the tree,
    /// whatever the configured policy.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            SchedulerError::RecursiveExecution { .. }
                | SchedulerError::NoReturnWithoutPush { .. }
                | SchedulerError::UnexpectedPush { .. }
                | SchedulerError::IllegalWait { .. }
                | SchedulerError::AlreadyOnStack { .. }
                | SchedulerError::NodeFault { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("behaviour tree is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error("background graph binding panicked")]
    BuildPanicked,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Variable(#[from] VariableError),
}
