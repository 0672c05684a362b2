use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::{SharedVariables, VariableData, VariableError};

/// Process-wide variable storage: one static table per prototype plus the global table.
///
/// Passed explicitly into every tree instead of living in a `static`, so independent
/// registries (e.g. one per test) never observe each other.
#[derive(Debug, Default)]
pub struct VariableRegistry {
    statics: RwLock<HashMap<Uuid, Arc<SharedVariables>>>,
    globals: Arc<SharedVariables>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize the global table from its declarations.
    pub fn with_globals<'a>(
        globals: impl IntoIterator<Item = &'a VariableData>,
    ) -> Result<Self, VariableError> {
        Ok(Self {
            statics: RwLock::new(HashMap::new()),
            globals: Arc::new(SharedVariables::from_data(globals)?),
        })
    }

    pub fn globals(&self) -> &Arc<SharedVariables> {
        &self.globals
    }

    /// The static table for `prototype`, created on first request and kept for the
    /// registry's lifetime.
    pub fn static_table(&self, prototype: Uuid) -> Arc<SharedVariables> {
        if let Some(table) = self.statics.read().get(&prototype) {
            return table.clone();
        }
        self.statics
            .write()
            .entry(prototype)
            .or_insert_with(|| Arc::new(SharedVariables::new()))
            .clone()
    }

    pub fn has_static_table(&self, prototype: Uuid) -> bool {
        self.statics.read().contains_key(&prototype)
    }

    pub fn static_table_count(&self) -> usize {
        self.statics.read().len()
    }
}
