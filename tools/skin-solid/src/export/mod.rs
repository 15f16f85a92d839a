//! GLB export of a rigid working collection
//!
//! Every mesh object becomes one node placed at its transform on the
//! export frame. Baked transform tracks become one linear animation.

mod buffer;
mod document;

pub use buffer::{AccessorIndex, BufferBuilder};
pub use document::{GltfBuilder, NodeChannels, assemble_glb};

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::DEFAULT_FRAME_RATE;
use crate::scene::{CollectionId, SceneAdapter};

const GENERATOR: &str = concat!("skin-solid ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Frames per second used to convert keyed frames to glTF seconds
    pub frame_rate: f32,
    /// Frame at which static node transforms are sampled
    pub frame: i32,
    pub animation_name: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            frame: 0,
            animation_name: "Baked".to_string(),
        }
    }
}

/// Summary of a written GLB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportStats {
    pub nodes: usize,
    pub meshes: usize,
    pub animated: usize,
}

/// Encode the mesh objects of `collection` as a GLB
pub fn export_collection_glb<S: SceneAdapter + ?Sized>(
    scene: &S,
    collection: CollectionId,
    options: &ExportOptions,
) -> Result<(Vec<u8>, ExportStats)> {
    if !options.frame_rate.is_finite() || options.frame_rate <= 0.0 {
        anyhow::bail!("Frame rate must be positive, got {}", options.frame_rate);
    }

    let members = scene.collection(collection)?;
    let mut buffer = BufferBuilder::new();
    let mut gltf = GltfBuilder::new();
    let mut roots = Vec::new();
    let mut channels = Vec::new();
    let mut stats = ExportStats {
        nodes: 0,
        meshes: 0,
        animated: 0,
    };

    for &id in &members.objects {
        let object = scene.object(id)?;
        let Some(mesh) = object.mesh() else {
            continue;
        };

        let mesh_index = if mesh.is_empty() {
            None
        } else {
            let positions: Vec<[f32; 3]> = mesh.positions.iter().map(|p| p.to_array()).collect();
            let positions = buffer.pack_positions(&positions);
            let indices: Vec<u32> = mesh.triangles().flatten().collect();
            let indices = (!indices.is_empty()).then(|| buffer.pack_indices_u32(&indices));
            stats.meshes += 1;
            Some(gltf.add_mesh(&mesh.name, positions, indices))
        };

        let world = scene.world_matrix(id, options.frame)?;
        let (scale, rotation, translation) = world.to_scale_rotation_translation();
        let node = gltf.add_node(
            &object.name,
            mesh_index,
            translation.to_array(),
            rotation.to_array(),
            scale.to_array(),
        );
        roots.push(node);
        stats.nodes += 1;

        if let Some(track) = object.animation.as_ref().filter(|t| !t.keys.is_empty()) {
            let times: Vec<f32> = track
                .keys
                .iter()
                .map(|key| key.frame as f32 / options.frame_rate)
                .collect();
            let translations: Vec<[f32; 3]> =
                track.keys.iter().map(|key| key.translation.to_array()).collect();
            let rotations: Vec<[f32; 4]> =
                track.keys.iter().map(|key| key.rotation.to_array()).collect();
            let scales: Vec<[f32; 3]> = track.keys.iter().map(|key| key.scale.to_array()).collect();

            channels.push(NodeChannels {
                node,
                times: buffer.pack_scalars_with_bounds(&times),
                translations: buffer.pack_vec3(&translations),
                rotations: buffer.pack_vec4(&rotations),
                scales: buffer.pack_vec3(&scales),
            });
            stats.animated += 1;
        }
    }

    if !channels.is_empty() {
        gltf.add_animation(&options.animation_name, &channels);
    }
    gltf.add_scene(&members.name, &roots);

    let root = gltf.build(buffer.data().len(), buffer.views(), buffer.accessors(), GENERATOR);
    let glb = assemble_glb(&root, buffer.data())?;
    Ok((glb, stats))
}

/// Write the mesh objects of `collection` to a GLB file
pub fn write_collection_glb<S: SceneAdapter + ?Sized>(
    scene: &S,
    collection: CollectionId,
    options: &ExportOptions,
    output: &Path,
) -> Result<ExportStats> {
    let (glb, stats) = export_collection_glb(scene, collection, options)?;
    std::fs::write(output, &glb)
        .with_context(|| format!("Failed to write output: {:?}", output))?;
    info!(
        "Wrote {} ({} nodes, {} meshes, {} animated)",
        output.display(),
        stats.nodes,
        stats.meshes,
        stats.animated
    );
    Ok(stats)
}
