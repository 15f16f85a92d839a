//! File-level pipelines used by the CLI: convert and inspect

use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::config::Config;
use crate::export::{ExportOptions, ExportStats, write_collection_glb};
use crate::import::{ImportOptions, ImportedScene, import_gltf};
use crate::scene::SceneAdapter;
use crate::session::Session;
use crate::weights::build_weight_table;

/// Outcome of a full conversion
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertSummary {
    /// Names of the rigid objects written
    pub objects: Vec<String>,
    pub bound: usize,
    pub unbound: usize,
    pub frame_start: i32,
    pub frame_end: i32,
    pub export: ExportStats,
}

/// Import `input`, split its skinned meshes per bone, bake and write a rigid GLB
pub fn convert_file(input: &Path, output: &Path, config: &Config) -> Result<ConvertSummary> {
    config.validate()?;
    let ImportedScene {
        mut scene,
        collection,
        rigs,
        animation,
    } = import_gltf(
        input,
        &ImportOptions {
            frame_rate: config.bake.frame_rate,
            animation: config.bake.animation,
        },
    )?;

    let source = match &config.source.collection {
        Some(name) => scene
            .collection_by_name(name)
            .with_context(|| format!("Collection '{}' not found in {:?}", name, input))?,
        None => collection,
    };
    let rig = match &config.source.rig {
        Some(name) => scene
            .object_by_name(name)
            .with_context(|| format!("Rig '{}' not found in {:?}", name, input))?,
        None => match rigs.first() {
            Some(rig) => *rig,
            None => bail!("No skin found in {:?}", input),
        },
    };

    let mut session = Session::new(config.settings());
    session.set_source_collection(Some(source));
    session.set_rig(Some(rig));
    if config.bake.fit_animation && !session.fit_frame_range_to_action(&scene)? {
        warn!(
            "Rig has no keyed animation, keeping frames {}..={}",
            session.settings.bake_frame_start, session.settings.bake_frame_end
        );
    }

    let prepared = session.try_prepare_objects(&mut scene)?;
    let baked = session.try_bake_animation(&mut scene)?;

    let options = ExportOptions {
        frame_rate: config.bake.frame_rate,
        frame: baked.frame_start,
        animation_name: animation.unwrap_or_else(|| "Baked".to_string()),
    };
    let export = write_collection_glb(&scene, prepared.working_collection, &options, output)?;

    let objects = prepared
        .objects
        .iter()
        .map(|id| scene.object(*id).map(|o| o.name.clone()))
        .collect::<Result<Vec<_>, _>>()?;
    info!(
        "Converted {} into {} rigid objects",
        input.display(),
        objects.len()
    );

    Ok(ConvertSummary {
        objects,
        bound: prepared.bound.len(),
        unbound: prepared.unbound.len(),
        frame_start: baked.frame_start,
        frame_end: baked.frame_end,
        export,
    })
}

/// Vertex counts one vertex group would keep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReport {
    pub name: String,
    pub kept: usize,
}

/// Dry-run partition of one skinned mesh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshReport {
    pub name: String,
    pub vertex_count: usize,
    pub groups: Vec<GroupReport>,
    /// Vertices no partition would keep
    pub unassigned: usize,
}

/// Report how the skinned meshes of `input` would be partitioned at `threshold`
pub fn inspect_file(input: &Path, threshold: f32) -> Result<Vec<MeshReport>> {
    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        bail!("Weight threshold must be within [0, 1], got {}", threshold);
    }
    let imported = import_gltf(input, &ImportOptions::default())?;
    let scene = &imported.scene;

    let mut reports = Vec::new();
    for &id in &scene.collection(imported.collection)?.objects {
        let object = scene.object(id)?;
        let Some(mesh) = object.mesh() else {
            continue;
        };
        let table = build_weight_table(mesh);
        reports.push(MeshReport {
            name: object.name.clone(),
            vertex_count: mesh.vertex_count(),
            groups: object
                .vertex_groups
                .iter()
                .map(|group| GroupReport {
                    name: group.name.clone(),
                    kept: table.count_qualifying(group.index, threshold),
                })
                .collect(),
            unassigned: table.count_unassigned(threshold),
        });
    }
    Ok(reports)
}
