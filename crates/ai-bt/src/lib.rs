//! Behaviour tree interpreter built on `ai-core`.
//!
//! A [`TreePrototype`] is bound once per actor into a [`BehaviourTree`]: an arena of live nodes
//! driven by a [`NodeCallStack`], plus one periodic service stack per active service node.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod action;
pub mod binder;
pub mod error;
pub mod field;
pub mod node;
pub mod nodes;
pub mod prototype;
pub mod service;
pub mod settings;
pub mod stack;
pub mod state;
pub mod tree;

pub use action::{action_channel, ActionCompleter, ActionError, ActionFuture, ActionResult};
pub use binder::{bind_graph, Binder, BoundGraph, LiveGraph, NodeSlot};
pub use error::{BindError, NodeError, SchedulerError, SettingsError, TreeError};
pub use field::{AssetField, VariableField};
pub use node::{Node, NodeContext, NodeIndex, NodeRef, NodeTemplate};
pub use prototype::{NodePrototype, TreePrototype, TreePrototypeBuilder};
pub use service::{ServiceStack, ServiceTable, ServiceTiming};
pub use settings::{ErrorPolicy, GlobalSettings, TreeSettings};
pub use stack::{NodeCallStack, StackEnv, StackEvent};
pub use state::{Capability, StackState, State};
pub use tree::{BehaviourTree, PendingTree};
