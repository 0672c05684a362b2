use core::fmt::Debug;

use crate::ObjectRef;

/// Stable identifier for a controlled actor.
///
/// Deterministic simulation requires:
/// - stable ordering (`Ord`)
/// - a stable numeric ID (`stable_id`) for seeding and logs
pub trait ActorId: Copy + Ord + Eq + Debug {
    fn stable_id(self) -> u64;
}

impl ActorId for u64 {
    fn stable_id(self) -> u64 {
        self
    }
}

impl ActorId for u32 {
    fn stable_id(self) -> u64 {
        self as u64
    }
}

impl ActorId for usize {
    fn stable_id(self) -> u64 {
        self as u64
    }
}

/// The host actor a tree instance controls.
///
/// Nodes never see this directly: its parts are registered as the implicit
/// `Object`, `Frame` and `Script` variables when the tree is bound.
#[derive(Debug, Clone)]
pub struct ActorHandle {
    id: u64,
    object: ObjectRef,
    frame: ObjectRef,
    script: Option<ObjectRef>,
}

impl ActorHandle {
    pub fn new(id: impl ActorId, object: ObjectRef, frame: ObjectRef) -> Self {
        Self {
            id: id.stable_id(),
            object,
            frame,
            script: None,
        }
    }

    pub fn with_script(mut self, script: ObjectRef) -> Self {
        self.script = Some(script);
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    /// Spatial frame (transform) handle.
    pub fn frame(&self) -> &ObjectRef {
        &self.frame
    }

    pub fn script(&self) -> Option<&ObjectRef> {
        self.script.as_ref()
    }
}
