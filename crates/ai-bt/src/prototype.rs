//! The immutable, shared tree definition that live instances are cloned from.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ai_core::{ObjectRef, VariableData};
use uuid::Uuid;

use crate::{NodeTemplate, TreeSettings};

pub struct NodePrototype {
    pub id: Uuid,
    pub name: String,
    pub parent: Option<Uuid>,
    pub services: Vec<Uuid>,
    pub template: Box<dyn NodeTemplate>,
}

impl NodePrototype {
    pub fn new(name: impl Into<String>, template: impl NodeTemplate) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            parent: None,
            services: Vec::new(),
            template: Box::new(template),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_parent(mut self, parent: Uuid) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_service(mut self, service: Uuid) -> Self {
        self.services.push(service);
        self
    }
}

impl fmt::Debug for NodePrototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodePrototype")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("services", &self.services)
            .field("template", &self.template.type_name())
            .finish()
    }
}

#[derive(Debug)]
pub struct TreePrototype {
    id: Uuid,
    name: String,
    head: Option<Uuid>,
    nodes: Vec<NodePrototype>,
    variables: Vec<VariableData>,
    assets: HashMap<Uuid, ObjectRef>,
    settings: TreeSettings,
}

impl TreePrototype {
    pub fn builder(name: impl Into<String>) -> TreePrototypeBuilder {
        TreePrototypeBuilder {
            prototype: TreePrototype {
                id: Uuid::new_v4(),
                name: name.into(),
                head: None,
                nodes: Vec::new(),
                variables: Vec::new(),
                assets: HashMap::new(),
                settings: TreeSettings::default(),
            },
        }
    }

    /// Identity used to key the prototype's static variable table.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn head(&self) -> Option<Uuid> {
        self.head
    }

    pub fn nodes(&self) -> &[NodePrototype] {
        &self.nodes
    }

    pub fn node(&self, id: Uuid) -> Option<&NodePrototype> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn variables(&self) -> &[VariableData] {
        &self.variables
    }

    pub fn asset(&self, id: Uuid) -> Option<&ObjectRef> {
        self.assets.get(&id)
    }

    pub fn settings(&self) -> &TreeSettings {
        &self.settings
    }
}

pub struct TreePrototypeBuilder {
    prototype: TreePrototype,
}

impl TreePrototypeBuilder {
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.prototype.id = id;
        self
    }

    /// Add a fully described node and return its id.
    pub fn add(&mut self, node: NodePrototype) -> Uuid {
        let id = node.id;
        self.prototype.nodes.push(node);
        id
    }

    pub fn node(&mut self, name: impl Into<String>, template: impl NodeTemplate) -> Uuid {
        self.add(NodePrototype::new(name, template))
    }

    /// Attach `service` to `owner`. Unknown owners are left for the binder to report.
    pub fn attach_service(&mut self, owner: Uuid, service: Uuid) -> &mut Self {
        if let Some(node) = self.prototype.nodes.iter_mut().find(|n| n.id == owner) {
            node.services.push(service);
        }
        self
    }

    pub fn set_parent(&mut self, child: Uuid, parent: Uuid) -> &mut Self {
        if let Some(node) = self.prototype.nodes.iter_mut().find(|n| n.id == child) {
            node.parent = Some(parent);
        }
        self
    }

    pub fn head(&mut self, id: Uuid) -> &mut Self {
        self.prototype.head = Some(id);
        self
    }

    pub fn variable(&mut self, data: VariableData) -> Uuid {
        let id = data.id;
        self.prototype.variables.push(data);
        id
    }

    pub fn asset(&mut self, id: Uuid, asset: ObjectRef) -> &mut Self {
        self.prototype.assets.insert(id, asset);
        self
    }

    pub fn settings(&mut self, settings: TreeSettings) -> &mut Self {
        self.prototype.settings = settings;
        self
    }

    pub fn build(self) -> Arc<TreePrototype> {
        Arc::new(self.prototype)
    }
}
