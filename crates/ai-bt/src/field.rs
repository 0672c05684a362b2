//! Indirections a node uses to reach variables and shared assets.
//!
//! Both are authored as UUIDs in the prototype and resolved exactly once by the binder.

use ai_core::{
    ImplicitVariable, LocalVariables, ObjectRef, VariableError, VariableHandle, VariableType,
    VariableValue,
};
use uuid::Uuid;

use crate::NodeError;

#[derive(Debug, Clone)]
enum FieldSource {
    Constant(VariableValue),
    Reference(Uuid),
}

/// A node input/output that is either a baked constant or a reference to a variable.
#[derive(Debug, Clone)]
pub struct VariableField {
    source: FieldSource,
    expected: Option<VariableType>,
    handle: Option<VariableHandle>,
}

impl VariableField {
    pub fn constant(value: impl Into<VariableValue>) -> Self {
        Self {
            source: FieldSource::Constant(value.into()),
            expected: None,
            handle: None,
        }
    }

    pub fn reference(variable: Uuid) -> Self {
        Self {
            source: FieldSource::Reference(variable),
            expected: None,
            handle: None,
        }
    }

    pub fn implicit(which: ImplicitVariable) -> Self {
        Self::reference(which.id()).expecting(VariableType::Object)
    }

    /// Checked against the bound variable's type at bind time. Numeric expectations accept
    /// either numeric type.
    pub fn expecting(mut self, ty: VariableType) -> Self {
        self.expected = Some(ty);
        self
    }

    pub fn expected(&self) -> Option<VariableType> {
        self.expected
    }

    pub fn reference_id(&self) -> Option<Uuid> {
        match &self.source {
            FieldSource::Reference(id) => Some(*id),
            FieldSource::Constant(_) => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.source, FieldSource::Constant(_))
    }

    /// Constants are always bound.
    pub fn is_bound(&self) -> bool {
        self.is_constant() || self.handle.is_some()
    }

    pub fn handle(&self) -> Option<&VariableHandle> {
        self.handle.as_ref()
    }

    pub(crate) fn set_handle(&mut self, handle: VariableHandle) {
        self.handle = Some(handle);
    }

    pub(crate) fn read(&self, locals: &LocalVariables) -> Result<VariableValue, NodeError> {
        match &self.source {
            FieldSource::Constant(value) => Ok(value.clone()),
            FieldSource::Reference(_) => {
                let handle = self.handle.as_ref().ok_or(NodeError::UnboundField)?;
                Ok(handle.read(locals)?)
            }
        }
    }

    pub(crate) fn write(
        &self,
        locals: &mut LocalVariables,
        value: VariableValue,
    ) -> Result<(), NodeError> {
        match &self.source {
            FieldSource::Constant(_) => Err(NodeError::Variable(VariableError::Constant {
                name: "<constant field>".to_string(),
            })),
            FieldSource::Reference(_) => {
                let handle = self.handle.as_ref().ok_or(NodeError::UnboundField)?;
                Ok(handle.write(locals, value)?)
            }
        }
    }
}

impl From<VariableValue> for VariableField {
    fn from(value: VariableValue) -> Self {
        VariableField::constant(value)
    }
}

/// A reference to an external asset. The asset itself is shared between instances, never copied.
#[derive(Debug, Clone)]
pub struct AssetField {
    id: Uuid,
    asset: Option<ObjectRef>,
}

impl AssetField {
    pub fn new(id: Uuid) -> Self {
        Self { id, asset: None }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn get(&self) -> Option<&ObjectRef> {
        self.asset.as_ref()
    }

    pub(crate) fn set(&mut self, asset: ObjectRef) {
        self.asset = Some(asset);
    }
}
