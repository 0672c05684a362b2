//! Turns a shared [`TreePrototype`] into an independent live graph.
//!
//! Binding is one explicit pass: every prototype node is cloned into an arena slot, then each
//! live node is asked to resolve its own `NodeRef`/`VariableField`/`AssetField` members against
//! the arena and the variable tables. No field is ever re-resolved afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use ai_core::{
    ActorHandle, LocalVariables, SharedVariables, VariableData, VariableHandle, VariableRegistry,
    VariableScope, VariableType,
};
use uuid::Uuid;

use crate::{
    AssetField, BindError, Capability, Node, NodeIndex, NodeRef, TreePrototype, VariableField,
};

pub struct NodeSlot {
    id: Uuid,
    name: String,
    parent: Option<NodeIndex>,
    services: Vec<NodeIndex>,
    capability: Capability,
    pub(crate) behaviour: Box<dyn Node>,
}

impl NodeSlot {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeIndex> {
        self.parent
    }

    pub fn services(&self) -> &[NodeIndex] {
        &self.services
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn behaviour(&self) -> &dyn Node {
        self.behaviour.as_ref()
    }
}

/// Arena of live nodes for one tree instance.
pub struct LiveGraph {
    slots: Vec<NodeSlot>,
    by_id: HashMap<Uuid, NodeIndex>,
    head: NodeIndex,
}

impl LiveGraph {
    pub fn head(&self) -> NodeIndex {
        self.head
    }

    pub fn get(&self, index: NodeIndex) -> Option<&NodeSlot> {
        self.slots.get(index.index())
    }

    pub(crate) fn get_mut(&mut self, index: NodeIndex) -> Option<&mut NodeSlot> {
        self.slots.get_mut(index.index())
    }

    pub fn index_of(&self, id: Uuid) -> Option<NodeIndex> {
        self.by_id.get(&id).copied()
    }

    pub fn name(&self, index: NodeIndex) -> &str {
        self.get(index).map(NodeSlot::name).unwrap_or("<missing>")
    }

    pub fn set_name(&mut self, index: NodeIndex, name: impl Into<String>) {
        if let Some(slot) = self.slots.get_mut(index.index()) {
            slot.name = name.into();
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &NodeSlot)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (NodeIndex(i as u32), slot))
    }
}

/// Resolution context handed to [`Node::bind`].
pub struct Binder<'a> {
    node: NodeIndex,
    node_name: &'a str,
    by_id: &'a HashMap<Uuid, NodeIndex>,
    prototype: &'a TreePrototype,
    declarations: &'a HashMap<Uuid, &'a VariableData>,
    locals: &'a LocalVariables,
    statics: &'a SharedVariables,
    globals: &'a SharedVariables,
    children: Vec<NodeIndex>,
}

impl<'a> Binder<'a> {
    pub fn node_index(&self) -> NodeIndex {
        self.node
    }

    pub fn node(&mut self, reference: &mut NodeRef) -> Result<(), BindError> {
        let index = self
            .by_id
            .get(&reference.id())
            .copied()
            .ok_or_else(|| BindError::UnknownNode {
                node: self.node_name.to_string(),
                target: reference.id(),
            })?;
        reference.set_index(index);
        self.children.push(index);
        Ok(())
    }

    pub fn nodes(&mut self, references: &mut [NodeRef]) -> Result<(), BindError> {
        references.iter_mut().try_for_each(|r| self.node(r))
    }

    /// Bind a reference field, consulting local, then static, then global storage.
    pub fn variable(&mut self, field: &mut VariableField) -> Result<(), BindError> {
        let Some(id) = field.reference_id() else {
            return Ok(());
        };
        let (handle, name, ty) = self.resolve(id)?;
        if let Some(expected) = field.expected() {
            let compatible = expected == ty || (expected.is_numeric() && ty.is_numeric());
            if !compatible {
                return Err(BindError::VariableType {
                    node: self.node_name.to_string(),
                    variable: name,
                    expected,
                    found: ty,
                });
            }
        }
        field.set_handle(handle);
        Ok(())
    }

    pub fn asset(&mut self, field: &mut AssetField) -> Result<(), BindError> {
        let asset = self
            .prototype
            .asset(field.id())
            .ok_or_else(|| BindError::UnknownAsset {
                node: self.node_name.to_string(),
                asset: field.id(),
            })?;
        field.set(asset.clone());
        Ok(())
    }

    fn resolve(&self, id: Uuid) -> Result<(VariableHandle, String, VariableType), BindError> {
        if let Some(slot) = self.locals.slot(id) {
            if let Some(variable) = self.locals.get(slot) {
                return Ok((
                    VariableHandle::Local(slot),
                    variable.name().to_string(),
                    variable.ty(),
                ));
            }
        }

        let shared = match self.declarations.get(&id) {
            Some(data) if data.scope == VariableScope::Static => {
                Some(self.statics.get_or_declare(data)?)
            }
            Some(data) if data.scope == VariableScope::Global => {
                Some(self.globals.get_or_declare(data)?)
            }
            _ => self.statics.get(id).or_else(|| self.globals.get(id)),
        };

        match shared {
            Some(shared) => {
                let (name, ty) = {
                    let variable = shared.read();
                    (variable.name().to_string(), variable.ty())
                };
                Ok((VariableHandle::Shared(shared), name, ty))
            }
            None => Err(BindError::UnknownVariable {
                node: self.node_name.to_string(),
                variable: id,
            }),
        }
    }
}

/// A freshly bound instance: live graph plus its storage.
pub struct BoundGraph {
    pub graph: LiveGraph,
    pub locals: LocalVariables,
    pub statics: Arc<SharedVariables>,
}

pub fn bind_graph(
    prototype: &TreePrototype,
    actor: &ActorHandle,
    registry: &VariableRegistry,
) -> Result<BoundGraph, BindError> {
    let head_id = prototype.head().ok_or_else(|| BindError::MissingHead {
        prototype: prototype.name().to_string(),
    })?;

    let mut locals = LocalVariables::for_actor(actor);
    let mut declarations = HashMap::new();
    for data in prototype.variables() {
        if data.scope == VariableScope::Local {
            locals.declare(data)?;
        }
        declarations.insert(data.id, data);
    }
    let statics = registry.static_table(prototype.id());

    let mut slots = Vec::with_capacity(prototype.nodes().len());
    let mut by_id = HashMap::with_capacity(prototype.nodes().len());
    for proto in prototype.nodes() {
        let index = NodeIndex(slots.len() as u32);
        if by_id.insert(proto.id, index).is_some() {
            return Err(BindError::DuplicateNode(proto.id));
        }
        let behaviour = proto.template.instantiate();
        slots.push(NodeSlot {
            id: proto.id,
            name: proto.name.clone(),
            parent: None,
            services: Vec::new(),
            capability: behaviour.capability(),
            behaviour,
        });
    }

    let head = by_id
        .get(&head_id)
        .copied()
        .ok_or(BindError::UnknownHead(head_id))?;

    // Authored parent and service links.
    for (i, proto) in prototype.nodes().iter().enumerate() {
        if let Some(parent) = proto.parent {
            let parent = by_id
                .get(&parent)
                .copied()
                .ok_or_else(|| BindError::UnknownNode {
                    node: proto.name.clone(),
                    target: parent,
                })?;
            slots[i].parent = Some(parent);
        }
        for service in &proto.services {
            let index = by_id
                .get(service)
                .copied()
                .ok_or_else(|| BindError::UnknownNode {
                    node: proto.name.clone(),
                    target: *service,
                })?;
            let target = &slots[index.index()];
            if target.capability != Capability::Service
                || target.behaviour.service_timing().is_none()
            {
                return Err(BindError::NotAService {
                    node: proto.name.clone(),
                    service: target.name.clone(),
                });
            }
            slots[i].services.push(index);
        }
    }

    // Per-node field resolution.
    let mut derived_parents = Vec::new();
    for i in 0..slots.len() {
        let node = NodeIndex(i as u32);
        let slot = &mut slots[i];
        let mut binder = Binder {
            node,
            node_name: &slot.name,
            by_id: &by_id,
            prototype,
            declarations: &declarations,
            locals: &locals,
            statics: &statics,
            globals: registry.globals(),
            children: Vec::new(),
        };
        slot.behaviour.bind(&mut binder)?;
        derived_parents.extend(binder.children.into_iter().map(|child| (child, node)));
    }

    for (child, parent) in derived_parents {
        let slot = &mut slots[child.index()];
        match slot.parent {
            None => slot.parent = Some(parent),
            Some(authored) if authored != parent => {
                tracing::warn!(
                    node = %slot.name,
                    authored = authored.index(),
                    referenced_by = parent.index(),
                    "node is referenced by a node other than its authored parent"
                );
            }
            Some(_) => {}
        }
    }

    for slot in slots.iter_mut() {
        slot.behaviour.initialize();
    }

    tracing::debug!(
        prototype = %prototype.name(),
        nodes = slots.len(),
        locals = locals.len(),
        "bound behaviour tree graph"
    );

    Ok(BoundGraph {
        graph: LiveGraph { slots, by_id, head },
        locals,
        statics,
    })
}
