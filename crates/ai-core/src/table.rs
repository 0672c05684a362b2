//! Variable tables.
//!
//! A running tree consults three tables in fixed priority order:
//! - local: one per tree instance, owned by the tree, never locked
//! - static: one per prototype, shared by every instance built from it
//! - global: one per process
//!
//! Static and global tables may be touched by tree instances ticking on different threads, so
//! they are internally synchronized. Nodes never hold table references; they hold a
//! [`VariableHandle`] produced once at bind time.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::variable::{ImplicitVariable, Variable, VariableData, VariableValue};
use crate::{ActorHandle, VariableError};

/// Position of a variable in one instance's local table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalSlot(usize);

impl LocalSlot {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct LocalVariables {
    slots: Vec<Variable>,
    by_id: HashMap<Uuid, LocalSlot>,
}

impl LocalVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh table holding the implicit variables for `actor`.
    pub fn for_actor(actor: &ActorHandle) -> Self {
        let mut table = Self::new();
        for which in ImplicitVariable::ALL {
            let value = match which {
                ImplicitVariable::Object => VariableValue::Object(actor.object().clone()),
                ImplicitVariable::Frame => VariableValue::Object(actor.frame().clone()),
                ImplicitVariable::Script => actor
                    .script()
                    .cloned()
                    .map(VariableValue::Object)
                    .unwrap_or(VariableValue::Null),
            };
            table.slots.push(Variable::implicit(which, value));
            table
                .by_id
                .insert(which.id(), LocalSlot(table.slots.len() - 1));
        }
        table
    }

    pub fn declare(&mut self, data: &VariableData) -> Result<LocalSlot, VariableError> {
        if self.by_id.contains_key(&data.id) {
            return Err(VariableError::Duplicate(data.id));
        }
        let slot = LocalSlot(self.slots.len());
        self.slots.push(Variable::from_data(data)?);
        self.by_id.insert(data.id, slot);
        Ok(slot)
    }

    pub fn slot(&self, id: Uuid) -> Option<LocalSlot> {
        self.by_id.get(&id).copied()
    }

    pub fn find_by_name(&self, name: &str) -> Option<LocalSlot> {
        self.slots
            .iter()
            .position(|v| v.name() == name)
            .map(LocalSlot)
    }

    pub fn get(&self, slot: LocalSlot) -> Option<&Variable> {
        self.slots.get(slot.0)
    }

    pub fn get_mut(&mut self, slot: LocalSlot) -> Option<&mut Variable> {
        self.slots.get_mut(slot.0)
    }

    pub fn value_of(&self, id: Uuid) -> Option<&VariableValue> {
        let slot = self.slot(id)?;
        self.get(slot).map(Variable::value)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.slots.iter()
    }
}

pub type SharedVariable = Arc<RwLock<Variable>>;

/// A synchronized table used for the static and global scopes.
#[derive(Debug, Default)]
pub struct SharedVariables {
    entries: RwLock<HashMap<Uuid, SharedVariable>>,
}

impl SharedVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data<'a>(
        data: impl IntoIterator<Item = &'a VariableData>,
    ) -> Result<Self, VariableError> {
        let table = Self::new();
        {
            let mut entries = table.entries.write();
            for d in data {
                if entries.contains_key(&d.id) {
                    return Err(VariableError::Duplicate(d.id));
                }
                entries.insert(d.id, Arc::new(RwLock::new(Variable::from_data(d)?)));
            }
        }
        Ok(table)
    }

    pub fn get(&self, id: Uuid) -> Option<SharedVariable> {
        self.entries.read().get(&id).cloned()
    }

    /// Return the entry for `data.id`, creating it from the descriptor on first use.
    pub fn get_or_declare(&self, data: &VariableData) -> Result<SharedVariable, VariableError> {
        if let Some(existing) = self.get(data.id) {
            return Ok(existing);
        }
        let mut entries = self.entries.write();
        // Another instance may have declared it between the two locks.
        if let Some(existing) = entries.get(&data.id) {
            return Ok(existing.clone());
        }
        let variable = Arc::new(RwLock::new(Variable::from_data(data)?));
        entries.insert(data.id, variable.clone());
        Ok(variable)
    }

    pub fn find_by_name(&self, name: &str) -> Option<SharedVariable> {
        self.entries
            .read()
            .values()
            .find(|v| v.read().name() == name)
            .cloned()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.entries.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// A bound reference to one variable. Once handed to a node it never changes target.
#[derive(Debug, Clone)]
pub enum VariableHandle {
    Local(LocalSlot),
    Shared(SharedVariable),
}

impl VariableHandle {
    pub fn read(&self, locals: &LocalVariables) -> Result<VariableValue, VariableError> {
        match self {
            VariableHandle::Local(slot) => locals
                .get(*slot)
                .map(|v| v.value().clone())
                .ok_or(VariableError::Unknown(Uuid::nil())),
            VariableHandle::Shared(shared) => Ok(shared.read().value().clone()),
        }
    }

    pub fn write(
        &self,
        locals: &mut LocalVariables,
        value: VariableValue,
    ) -> Result<(), VariableError> {
        match self {
            VariableHandle::Local(slot) => locals
                .get_mut(*slot)
                .ok_or(VariableError::Unknown(Uuid::nil()))?
                .set(value),
            VariableHandle::Shared(shared) => shared.write().set(value),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, VariableHandle::Local(_))
    }

    pub fn same_target(&self, other: &VariableHandle) -> bool {
        match (self, other) {
            (VariableHandle::Local(a), VariableHandle::Local(b)) => a == b,
            (VariableHandle::Shared(a), VariableHandle::Shared(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
