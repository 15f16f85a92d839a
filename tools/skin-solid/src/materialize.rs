//! Working collection seeding

use tracing::debug;

use crate::error::SolidError;
use crate::partition::with_suffix;
use crate::scene::{CollectionId, Object, ObjectId, SceneAdapter};

/// Collection holding the copies a preparation run works on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingSet {
    pub collection: CollectionId,
    pub objects: Vec<ObjectId>,
}

/// A mesh with at least one vertex group, deformed by `rig`
pub fn is_eligible(object: &Object, rig: ObjectId) -> bool {
    object.is_mesh()
        && !object.vertex_groups.is_empty()
        && object.modifiers.iter().any(|m| m.deforms_with(rig))
}

/// Copy every eligible object of `source` into a fresh collection.
///
/// The collection, each copy and each copy's mesh get `suffix` appended once.
/// Ineligible objects are left out without error.
pub fn create_working_collection<S: SceneAdapter + ?Sized>(
    scene: &mut S,
    source: CollectionId,
    rig: ObjectId,
    suffix: &str,
) -> Result<WorkingSet, SolidError> {
    let source_collection = scene.collection(source)?;
    let name = with_suffix(&source_collection.name, suffix);
    let members = source_collection.objects.clone();

    let collection = scene.create_collection(&name);
    let mut objects = Vec::new();
    for id in members {
        let object = scene.object(id)?;
        if !is_eligible(object, rig) {
            debug!("Skipping '{}': not a mesh skinned to the rig", object.name);
            continue;
        }
        let object_name = with_suffix(&object.name, suffix);
        let mesh_name = object.mesh().map(|mesh| with_suffix(&mesh.name, suffix));

        let copy = scene.duplicate_object(id)?;
        scene.link_object(collection, copy)?;
        scene.rename_object(copy, &object_name)?;
        if let Some(mesh_name) = mesh_name {
            scene.rename_mesh(copy, &mesh_name)?;
        }
        objects.push(copy);
    }

    debug!("Working collection '{}' holds {} objects", name, objects.len());
    Ok(WorkingSet {
        collection,
        objects,
    })
}
