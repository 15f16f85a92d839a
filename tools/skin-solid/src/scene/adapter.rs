//! Host scene seam: the mutations the pipeline performs and their errors

use glam::Mat4;

use super::armature::PosePosition;
use super::mesh::Mesh;
use super::object::{Collection, Modifier, Object};
use super::{CollectionId, ObjectId};

/// Failure reported by the host scene
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SceneError {
    #[error("Unknown {0}")]
    UnknownObject(ObjectId),

    #[error("Unknown {0}")]
    UnknownCollection(CollectionId),

    #[error("Rig '{rig}' has no bone named '{bone}'")]
    UnknownBone { rig: String, bone: String },

    #[error("Object '{name}' is a {found}, expected a {expected}")]
    WrongKind {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Object '{name}' has no modifier at index {index}")]
    ModifierOutOfRange { name: String, index: usize },

    #[error("Object '{name}' has no vertex group at index {index}")]
    VertexGroupOutOfRange { name: String, index: usize },

    #[error("Parenting '{child}' to '{parent}' would create a cycle")]
    ParentCycle { child: String, parent: String },

    #[error("Invalid frame range {start}..={end}")]
    InvalidFrameRange { start: i32, end: i32 },
}

/// Parameters of a transform bake
#[derive(Debug, Clone, PartialEq)]
pub struct BakeRequest {
    pub objects: Vec<ObjectId>,
    pub frame_start: i32,
    pub frame_end: i32,
    /// Record the evaluated world transform instead of the local basis
    pub visual_keying: bool,
    pub clear_constraints: bool,
    pub clear_parents: bool,
}

/// Imperative host operations consumed by the pipeline.
///
/// Implementations own every object and collection; callers only hold ids.
pub trait SceneAdapter {
    fn object(&self, id: ObjectId) -> Result<&Object, SceneError>;

    fn collection(&self, id: CollectionId) -> Result<&Collection, SceneError>;

    fn create_collection(&mut self, name: &str) -> CollectionId;

    /// Remove a collection. Objects linked to it are not removed.
    fn remove_collection(&mut self, id: CollectionId) -> Result<(), SceneError>;

    /// Copy an object together with a deep copy of its data. The copy is not linked anywhere.
    fn duplicate_object(&mut self, id: ObjectId) -> Result<ObjectId, SceneError>;

    /// Rename an object, returning the name actually assigned (names are unique)
    fn rename_object(&mut self, id: ObjectId, name: &str) -> Result<String, SceneError>;

    fn rename_mesh(&mut self, id: ObjectId, name: &str) -> Result<(), SceneError>;

    /// Replace the geometry of a mesh object, keeping the mesh name
    fn set_mesh(&mut self, id: ObjectId, mesh: Mesh) -> Result<(), SceneError>;

    /// Append an empty vertex group, returning its index
    fn add_vertex_group(&mut self, id: ObjectId, name: &str) -> Result<usize, SceneError>;

    fn remove_vertex_group(&mut self, id: ObjectId, index: usize) -> Result<(), SceneError>;

    fn link_object(&mut self, collection: CollectionId, id: ObjectId) -> Result<(), SceneError>;

    fn unlink_object(&mut self, collection: CollectionId, id: ObjectId) -> Result<(), SceneError>;

    /// Delete an object. Its children are unparented keeping their world transform.
    fn remove_object(&mut self, id: ObjectId) -> Result<(), SceneError>;

    fn set_pose_position(&mut self, rig: ObjectId, position: PosePosition)
    -> Result<(), SceneError>;

    fn remove_modifier(&mut self, id: ObjectId, index: usize) -> Result<Modifier, SceneError>;

    /// Move the object origin to the volumetric center of its mesh without moving the geometry in world space
    fn set_origin_to_volume_center(&mut self, id: ObjectId) -> Result<(), SceneError>;

    fn clear_parent_keep_transform(&mut self, id: ObjectId) -> Result<(), SceneError>;

    fn parent_to_bone_keep_transform(
        &mut self,
        id: ObjectId,
        rig: ObjectId,
        bone: &str,
    ) -> Result<(), SceneError>;

    fn bake_transforms(&mut self, request: &BakeRequest) -> Result<(), SceneError>;

    /// Evaluated world transform of an object at `frame`
    fn world_matrix(&self, id: ObjectId, frame: i32) -> Result<Mat4, SceneError>;

    fn has_bone(&self, rig: ObjectId, bone: &str) -> bool {
        self.object(rig)
            .ok()
            .and_then(Object::armature)
            .is_some_and(|armature| armature.bone_index(bone).is_some())
    }
}
