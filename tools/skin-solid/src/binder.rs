//! Parenting of separated objects to the bones named by their tags

use tracing::{debug, warn};

use crate::error::SolidError;
use crate::scene::{CollectionId, ObjectId, SceneAdapter};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindReport {
    pub bound: Vec<ObjectId>,
    pub unbound: Vec<ObjectId>,
}

/// Parent every mesh object of `collection` to the bone named by its first vertex group.
///
/// World transforms are preserved. The rig should be in its rest pose so the
/// captured offsets match the bind pose. Objects without groups or whose tag
/// names no bone stay unbound.
pub fn bind_to_bones<S: SceneAdapter + ?Sized>(
    scene: &mut S,
    collection: CollectionId,
    rig: ObjectId,
) -> Result<BindReport, SolidError> {
    let members = scene.collection(collection)?.objects.clone();
    let mut report = BindReport::default();

    let rig_object = scene.object(rig)?;
    if rig_object.armature().is_none() {
        let error = SolidError::TypeMismatch {
            name: rig_object.name.clone(),
            expected: "armature",
            found: rig_object.data.kind_name(),
        };
        warn!("Cannot bind to bones: {}", error);
        report.unbound = members
            .into_iter()
            .filter(|id| scene.object(*id).is_ok_and(|o| o.is_mesh()))
            .collect();
        return Ok(report);
    }

    for id in members {
        let object = scene.object(id)?;
        if !object.is_mesh() {
            continue;
        }
        let Some(tag) = object.vertex_groups.first().map(|g| g.name.clone()) else {
            debug!("'{}' has no vertex group, left unbound", object.name);
            report.unbound.push(id);
            continue;
        };
        if !scene.has_bone(rig, &tag) {
            warn!("'{}' is tagged '{}' but the rig has no such bone", object.name, tag);
            report.unbound.push(id);
            continue;
        }

        scene.clear_parent_keep_transform(id)?;
        scene.parent_to_bone_keep_transform(id, rig, &tag)?;
        debug!("Bound '{}' to bone '{}'", scene.object(id)?.name, tag);
        report.bound.push(id);
    }

    Ok(report)
}
