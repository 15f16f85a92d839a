//! glTF document construction

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use gltf_json as json;
use gltf_json::validation::Checked::Valid;

use super::buffer::AccessorIndex;

/// Keyframe accessors of one animated node
#[derive(Debug, Clone, Copy)]
pub struct NodeChannels {
    pub node: u32,
    pub times: AccessorIndex,
    pub translations: AccessorIndex,
    pub rotations: AccessorIndex,
    pub scales: AccessorIndex,
}

#[derive(Default)]
pub struct GltfBuilder {
    nodes: Vec<json::Node>,
    meshes: Vec<json::Mesh>,
    animations: Vec<json::Animation>,
    scenes: Vec<json::Scene>,
}

impl GltfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node placed by TRS, returning its index
    pub fn add_node(
        &mut self,
        name: &str,
        mesh: Option<u32>,
        translation: [f32; 3],
        rotation: [f32; 4],
        scale: [f32; 3],
    ) -> u32 {
        self.nodes.push(json::Node {
            camera: None,
            children: None,
            extensions: Default::default(),
            extras: Default::default(),
            matrix: None,
            mesh: mesh.map(json::Index::new),
            name: Some(name.to_string()),
            rotation: Some(json::scene::UnitQuaternion(rotation)),
            scale: Some(scale),
            skin: None,
            translation: Some(translation),
            weights: None,
        });
        self.nodes.len() as u32 - 1
    }

    /// Add a single-primitive mesh. Without indices the vertices are drawn as points.
    pub fn add_mesh(
        &mut self,
        name: &str,
        positions: AccessorIndex,
        indices: Option<AccessorIndex>,
    ) -> u32 {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            Valid(json::mesh::Semantic::Positions),
            positions.as_json_index(),
        );

        let mode = if indices.is_some() {
            json::mesh::Mode::Triangles
        } else {
            json::mesh::Mode::Points
        };
        let primitive = json::mesh::Primitive {
            attributes,
            extensions: Default::default(),
            extras: Default::default(),
            indices: indices.map(|i| i.as_json_index()),
            material: None,
            mode: Valid(mode),
            targets: None,
        };

        self.meshes.push(json::Mesh {
            extensions: Default::default(),
            extras: Default::default(),
            name: Some(name.to_string()),
            primitives: vec![primitive],
            weights: None,
        });
        self.meshes.len() as u32 - 1
    }

    /// Add an animation with linear translation, rotation and scale channels per node
    pub fn add_animation(&mut self, name: &str, nodes: &[NodeChannels]) {
        let mut samplers = Vec::new();
        let mut channels = Vec::new();

        for node in nodes {
            for (output, path) in [
                (node.translations, json::animation::Property::Translation),
                (node.rotations, json::animation::Property::Rotation),
                (node.scales, json::animation::Property::Scale),
            ] {
                samplers.push(json::animation::Sampler {
                    input: node.times.as_json_index(),
                    interpolation: Valid(json::animation::Interpolation::Linear),
                    output: output.as_json_index(),
                    extensions: Default::default(),
                    extras: Default::default(),
                });
                channels.push(json::animation::Channel {
                    sampler: json::Index::new(samplers.len() as u32 - 1),
                    target: json::animation::Target {
                        node: json::Index::new(node.node),
                        path: Valid(path),
                        extensions: Default::default(),
                        extras: Default::default(),
                    },
                    extensions: Default::default(),
                    extras: Default::default(),
                });
            }
        }

        self.animations.push(json::Animation {
            channels,
            extensions: Default::default(),
            extras: Default::default(),
            name: Some(name.to_string()),
            samplers,
        });
    }

    pub fn add_scene(&mut self, name: &str, root_nodes: &[u32]) {
        self.scenes.push(json::Scene {
            extensions: Default::default(),
            extras: Default::default(),
            name: Some(name.to_string()),
            nodes: root_nodes.iter().map(|n| json::Index::new(*n)).collect(),
        });
    }

    pub fn build(
        self,
        buffer_byte_length: usize,
        buffer_views: &[json::buffer::View],
        accessors: &[json::Accessor],
        generator: &str,
    ) -> json::Root {
        let buffers = if buffer_byte_length > 0 {
            vec![json::Buffer {
                byte_length: buffer_byte_length.into(),
                extensions: Default::default(),
                extras: Default::default(),
                name: None,
                uri: None,
            }]
        } else {
            Vec::new()
        };

        json::Root {
            accessors: accessors.to_vec(),
            animations: self.animations,
            asset: json::Asset {
                copyright: None,
                extensions: Default::default(),
                extras: Default::default(),
                generator: Some(generator.to_string()),
                min_version: None,
                version: "2.0".to_string(),
            },
            buffers,
            buffer_views: buffer_views.to_vec(),
            cameras: Vec::new(),
            extensions: Default::default(),
            extensions_required: Vec::new(),
            extensions_used: Vec::new(),
            extras: Default::default(),
            images: Vec::new(),
            materials: Vec::new(),
            meshes: self.meshes,
            nodes: self.nodes,
            samplers: Vec::new(),
            scene: if self.scenes.is_empty() {
                None
            } else {
                Some(json::Index::new(0))
            },
            scenes: self.scenes,
            skins: Vec::new(),
            textures: Vec::new(),
        }
    }
}

/// Assemble a GLB container from the JSON document and its binary buffer
pub fn assemble_glb(root: &json::Root, buffer_data: &[u8]) -> Result<Vec<u8>> {
    let json_string = json::serialize::to_string(root).context("Failed to serialize glTF JSON")?;
    let json_bytes = json_string.as_bytes();

    let json_padding = (4 - (json_bytes.len() % 4)) % 4;
    let json_chunk_length = json_bytes.len() + json_padding;

    let buffer_padding = (4 - (buffer_data.len() % 4)) % 4;
    let buffer_chunk_length = buffer_data.len() + buffer_padding;
    let bin_chunk = if buffer_chunk_length > 0 {
        8 + buffer_chunk_length
    } else {
        0
    };

    let total_length = 12 + 8 + json_chunk_length + bin_chunk;
    let mut glb = Vec::with_capacity(total_length);

    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes()); // version
    glb.extend_from_slice(&(total_length as u32).to_le_bytes());

    glb.extend_from_slice(&(json_chunk_length as u32).to_le_bytes());
    glb.extend_from_slice(&0x4E4F534Au32.to_le_bytes()); // "JSON"
    glb.extend_from_slice(json_bytes);
    glb.resize(glb.len() + json_padding, 0x20);

    if bin_chunk > 0 {
        glb.extend_from_slice(&(buffer_chunk_length as u32).to_le_bytes());
        glb.extend_from_slice(&0x004E4942u32.to_le_bytes()); // "BIN\0"
        glb.extend_from_slice(buffer_data);
        glb.resize(glb.len() + buffer_padding, 0);
    }

    Ok(glb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::buffer::BufferBuilder;

    #[test]
    fn test_glb_round_trips_through_gltf() {
        let mut buffer = BufferBuilder::new();
        let positions = buffer.pack_positions(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        let indices = buffer.pack_indices_u32(&[0, 1, 2]);

        let mut gltf = GltfBuilder::new();
        let mesh = gltf.add_mesh("Triangle", positions, Some(indices));
        let node = gltf.add_node("Triangle", Some(mesh), [1.0, 2.0, 3.0], [0.0, 0.0, 0.0, 1.0], [1.0; 3]);
        gltf.add_scene("Scene", &[node]);
        let root = gltf.build(buffer.data().len(), buffer.views(), buffer.accessors(), "test");
        let glb = assemble_glb(&root, buffer.data()).unwrap();

        assert_eq!(&glb[0..4], b"glTF");
        assert_eq!(glb.len() % 4, 0);
        let (document, _, _) = gltf::import_slice(&glb).unwrap();
        let node = document.nodes().next().unwrap();
        assert_eq!(node.name(), Some("Triangle"));
        assert_eq!(node.transform().decomposed().0, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_glb_without_binary_chunk() {
        let mut gltf = GltfBuilder::new();
        let node = gltf.add_node("Empty", None, [0.0; 3], [0.0, 0.0, 0.0, 1.0], [1.0; 3]);
        gltf.add_scene("Scene", &[node]);
        let root = gltf.build(0, &[], &[], "test");
        let glb = assemble_glb(&root, &[]).unwrap();

        let (document, buffers, _) = gltf::import_slice(&glb).unwrap();
        assert!(buffers.is_empty());
        assert_eq!(document.nodes().count(), 1);
    }
}
