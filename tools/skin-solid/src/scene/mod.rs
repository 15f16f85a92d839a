//! Host scene model
//!
//! Everything the pipeline does to the scene goes through [`SceneAdapter`],
//! so the partitioning and binding code never touches host state directly.
//! [`InMemoryScene`] is the host used by the CLI and the tests.

mod adapter;
mod armature;
mod memory;
mod mesh;
mod object;

#[cfg(test)]
pub(crate) use mesh::fixtures;

pub use adapter::{BakeRequest, SceneAdapter, SceneError};
pub use armature::{Armature, Bone, BoneTrack, Keyframe, PoseAction, PosePosition};
pub use memory::InMemoryScene;
pub use mesh::{Face, Mesh, VertexWeight, VertexWeights};
pub use object::{
    Collection, Modifier, Object, ObjectData, Parent, TransformKey, TransformTrack, VertexGroup,
};

use std::fmt;

/// Handle of an object owned by a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

/// Handle of a collection owned by a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object #{}", self.0)
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "collection #{}", self.0)
    }
}
