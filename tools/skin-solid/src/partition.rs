//! Mesh partitioning by vertex group
//!
//! A skinned mesh is split into one object per vertex group. Each copy keeps
//! only the vertices confidently owned by its group (weight at or above the
//! threshold) and carries that group as its single tag.

use tracing::debug;

use crate::error::SolidError;
use crate::scene::{CollectionId, ObjectId, SceneAdapter};
use crate::weights::{WeightTable, build_weight_table};

/// Append `suffix` exactly once, stripping any occurrence already in `name`
pub fn with_suffix(name: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        return name.to_string();
    }
    format!("{}{}", name.replace(suffix, ""), suffix)
}

/// Name of the object produced for `group` from `source`
pub fn solid_name(source: &str, group: &str, suffix: &str) -> String {
    with_suffix(&format!("{source}_{group}"), suffix)
}

/// Split `object` into one object per vertex group, linked into `collection`.
///
/// Vertex membership is decided on `table`, which must describe the source
/// mesh. Groups without qualifying vertices still produce an (empty) object.
/// The source object is removed once every group has been processed; a
/// source without vertex groups is left alone.
pub fn partition_by_vertex_groups<S: SceneAdapter + ?Sized>(
    scene: &mut S,
    collection: CollectionId,
    object: ObjectId,
    table: &WeightTable,
    threshold: f32,
    suffix: &str,
) -> Result<Vec<ObjectId>, SolidError> {
    let source = scene.object(object)?;
    let mesh = source.mesh().ok_or_else(|| SolidError::TypeMismatch {
        name: source.name.clone(),
        expected: "mesh",
        found: source.data.kind_name(),
    })?;
    if table.len() != mesh.vertex_count() {
        return Err(SolidError::precondition(format!(
            "Weight table of '{}' has {} entries for {} vertices",
            source.name,
            table.len(),
            mesh.vertex_count()
        )));
    }

    let source_name = source.name.clone();
    let mesh = mesh.clone();
    let groups = source.vertex_groups.clone();
    if groups.is_empty() {
        debug!("'{}' has no vertex groups, nothing to separate", source_name);
        return Ok(Vec::new());
    }

    let mut produced = Vec::with_capacity(groups.len());
    for group in &groups {
        let copy = scene.duplicate_object(object)?;
        scene.link_object(collection, copy)?;

        let keep = table.retained_mask(group.index, threshold);
        scene.set_mesh(copy, mesh.retain_vertices(&keep))?;

        // The surviving group is a tag for the binder, not a weight map
        let tag = scene.object(copy)?.vertex_group_index(&group.name);
        let count = scene.object(copy)?.vertex_groups.len();
        for index in (0..count).rev() {
            if Some(index) != tag {
                scene.remove_vertex_group(copy, index)?;
            }
        }
        if tag.is_none() {
            scene.add_vertex_group(copy, &group.name)?;
        }

        let name = solid_name(&source_name, &group.name, suffix);
        let assigned = scene.rename_object(copy, &name)?;
        scene.rename_mesh(copy, &assigned)?;

        debug!(
            "Separated '{}' with {} vertices",
            assigned,
            keep.iter().filter(|kept| **kept).count()
        );
        produced.push(copy);
    }

    scene.unlink_object(collection, object)?;
    scene.remove_object(object)?;
    Ok(produced)
}

/// Partition an object using a weight table read from its own mesh
pub fn separate_object<S: SceneAdapter + ?Sized>(
    scene: &mut S,
    collection: CollectionId,
    object: ObjectId,
    threshold: f32,
    suffix: &str,
) -> Result<Vec<ObjectId>, SolidError> {
    let source = scene.object(object)?;
    let table = match source.mesh() {
        Some(mesh) => build_weight_table(mesh),
        None => {
            return Err(SolidError::TypeMismatch {
                name: source.name.clone(),
                expected: "mesh",
                found: source.data.kind_name(),
            });
        }
    };
    partition_by_vertex_groups(scene, collection, object, &table, threshold, suffix)
}
