//! Typed variables and their descriptors.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::VariableError;

/// Opaque, shared handle to a host-side object (actor, transform, script, asset).
///
/// Equality is identity: two refs are equal when they point at the same allocation.
#[derive(Clone)]
pub struct ObjectRef(Arc<dyn Any + Send + Sync>);

impl ObjectRef {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn from_arc(value: Arc<dyn Any + Send + Sync>) -> Self {
        Self(value)
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:p})", Arc::as_ptr(&self.0))
    }
}

/// The closed set of kinds a variable may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum VariableType {
    Bool,
    Int,
    Float,
    String,
    Vector2,
    Vector3,
    Object,
    /// Generic container of other values.
    List,
}

impl VariableType {
    pub fn default_value(self) -> VariableValue {
        match self {
            VariableType::Bool => VariableValue::Bool(false),
            VariableType::Int => VariableValue::Int(0),
            VariableType::Float => VariableValue::Float(0.0),
            VariableType::String => VariableValue::String(String::new()),
            VariableType::Vector2 => VariableValue::Vector2([0.0; 2]),
            VariableType::Vector3 => VariableValue::Vector3([0.0; 3]),
            VariableType::Object => VariableValue::Null,
            VariableType::List => VariableValue::List(Vec::new()),
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, VariableType::Int | VariableType::Float)
    }
}

/// A variable's payload. Serialized untagged, so YAML defaults read naturally (`3`, `2.5`,
/// `[1.0, 2.0]`); integral literals land in `Int` and widen when stored into a float variable.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum VariableValue {
    /// An unset object reference.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    #[cfg_attr(feature = "serde", serde(skip))]
    Object(ObjectRef),
    List(Vec<VariableValue>),
}

impl VariableValue {
    /// `None` for `Null`, which only fits object-typed variables.
    pub fn value_type(&self) -> Option<VariableType> {
        match self {
            VariableValue::Null => None,
            VariableValue::Bool(_) => Some(VariableType::Bool),
            VariableValue::Int(_) => Some(VariableType::Int),
            VariableValue::Float(_) => Some(VariableType::Float),
            VariableValue::String(_) => Some(VariableType::String),
            VariableValue::Vector2(_) => Some(VariableType::Vector2),
            VariableValue::Vector3(_) => Some(VariableType::Vector3),
            VariableValue::Object(_) => Some(VariableType::Object),
            VariableValue::List(_) => Some(VariableType::List),
        }
    }

    pub fn fits(&self, ty: VariableType) -> bool {
        match self.value_type() {
            None => ty == VariableType::Object,
            Some(found) => found == ty,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            VariableValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            VariableValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Ints widen to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            VariableValue::Float(v) => Some(*v),
            VariableValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            VariableValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vector2(&self) -> Option<[f32; 2]> {
        match self {
            VariableValue::Vector2(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector3(&self) -> Option<[f32; 3]> {
        match self {
            VariableValue::Vector3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            VariableValue::Object(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[VariableValue]> {
        match self {
            VariableValue::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, VariableValue::Null)
    }
}

impl From<bool> for VariableValue {
    fn from(v: bool) -> Self {
        VariableValue::Bool(v)
    }
}

impl From<i64> for VariableValue {
    fn from(v: i64) -> Self {
        VariableValue::Int(v)
    }
}

impl From<i32> for VariableValue {
    fn from(v: i32) -> Self {
        VariableValue::Int(v as i64)
    }
}

impl From<f64> for VariableValue {
    fn from(v: f64) -> Self {
        VariableValue::Float(v)
    }
}

impl From<f32> for VariableValue {
    fn from(v: f32) -> Self {
        VariableValue::Float(v as f64)
    }
}

impl From<String> for VariableValue {
    fn from(v: String) -> Self {
        VariableValue::String(v)
    }
}

impl From<&str> for VariableValue {
    fn from(v: &str) -> Self {
        VariableValue::String(v.to_string())
    }
}

impl From<[f32; 2]> for VariableValue {
    fn from(v: [f32; 2]) -> Self {
        VariableValue::Vector2(v)
    }
}

impl From<[f32; 3]> for VariableValue {
    fn from(v: [f32; 3]) -> Self {
        VariableValue::Vector3(v)
    }
}

impl From<ObjectRef> for VariableValue {
    fn from(v: ObjectRef) -> Self {
        VariableValue::Object(v)
    }
}

/// Which table a declared variable lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum VariableScope {
    /// New per tree instance.
    #[default]
    Local,
    /// Shared by every instance built from the same prototype.
    Static,
    /// Process-wide.
    Global,
}

/// Declaration of a variable in a prototype or in the global settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VariableData {
    pub id: Uuid,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub ty: VariableType,
    /// `None` means the type's default value.
    #[cfg_attr(feature = "serde", serde(default))]
    pub default: Option<VariableValue>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub scope: VariableScope,
    #[cfg_attr(feature = "serde", serde(default))]
    pub constant: bool,
}

impl VariableData {
    pub fn new(name: impl Into<String>, ty: VariableType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            ty,
            default: None,
            scope: VariableScope::Local,
            constant: false,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_default(mut self, value: impl Into<VariableValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_scope(mut self, scope: VariableScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn constant(mut self) -> Self {
        self.constant = true;
        self
    }
}

/// The three variables every tree instance carries regardless of its declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImplicitVariable {
    /// The controlled object.
    Object,
    /// Its spatial frame.
    Frame,
    /// The controlling script, `Null` when the actor has none.
    Script,
}

impl ImplicitVariable {
    pub const ALL: [ImplicitVariable; 3] = [
        ImplicitVariable::Object,
        ImplicitVariable::Frame,
        ImplicitVariable::Script,
    ];

    pub const fn id(self) -> Uuid {
        match self {
            ImplicitVariable::Object => Uuid::from_u128(0x0b7e_c700_0000_4000_8000_0000_0000_0001),
            ImplicitVariable::Frame => Uuid::from_u128(0x0b7e_c700_0000_4000_8000_0000_0000_0002),
            ImplicitVariable::Script => Uuid::from_u128(0x0b7e_c700_0000_4000_8000_0000_0000_0003),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ImplicitVariable::Object => "self",
            ImplicitVariable::Frame => "frame",
            ImplicitVariable::Script => "script",
        }
    }
}

/// A live variable: identity plus a typed, optionally constant value.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    id: Uuid,
    name: String,
    ty: VariableType,
    value: VariableValue,
    constant: bool,
}

impl Variable {
    pub fn new(id: Uuid, name: impl Into<String>, ty: VariableType, value: VariableValue) -> Self {
        Self {
            id,
            name: name.into(),
            ty,
            value,
            constant: false,
        }
    }

    pub fn from_data(data: &VariableData) -> Result<Self, VariableError> {
        let value = match &data.default {
            Some(value) => {
                let value = coerce(data.ty, value.clone());
                if !value.fits(data.ty) {
                    return Err(VariableError::TypeMismatch {
                        name: data.name.clone(),
                        expected: data.ty,
                        found: value.value_type(),
                    });
                }
                value
            }
            None => data.ty.default_value(),
        };
        Ok(Self {
            id: data.id,
            name: data.name.clone(),
            ty: data.ty,
            value,
            constant: data.constant,
        })
    }

    pub(crate) fn implicit(which: ImplicitVariable, value: VariableValue) -> Self {
        Self {
            id: which.id(),
            name: which.name().to_string(),
            ty: VariableType::Object,
            value,
            constant: true,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> VariableType {
        self.ty
    }

    pub fn is_constant(&self) -> bool {
        self.constant
    }

    pub fn value(&self) -> &VariableValue {
        &self.value
    }

    pub fn set(&mut self, value: VariableValue) -> Result<(), VariableError> {
        if self.constant {
            return Err(VariableError::Constant {
                name: self.name.clone(),
            });
        }
        let value = coerce(self.ty, value);
        if !value.fits(self.ty) {
            return Err(VariableError::TypeMismatch {
                name: self.name.clone(),
                expected: self.ty,
                found: value.value_type(),
            });
        }
        self.value = value;
        Ok(())
    }
}

// Ints are accepted by float variables. Untagged deserialization reads any two or three number
// sequence as a vector, so list variables take vectors back as lists of floats.
fn coerce(ty: VariableType, value: VariableValue) -> VariableValue {
    match (ty, value) {
        (VariableType::Float, VariableValue::Int(v)) => VariableValue::Float(v as f64),
        (VariableType::List, VariableValue::Vector2(v)) => floats(&v),
        (VariableType::List, VariableValue::Vector3(v)) => floats(&v),
        (_, value) => value,
    }
}

fn floats(components: &[f32]) -> VariableValue {
    VariableValue::List(
        components
            .iter()
            .map(|&c| VariableValue::Float(f64::from(c)))
            .collect(),
    )
}
