//! Buffer packing and glTF JSON for the generated test asset.

use std::collections::BTreeMap;

use gltf_json as json;
use json::validation::Checked::Valid;

use super::{AnimationData, MeshData};

#[derive(Default)]
struct Packer {
    buffer: Vec<u8>,
    views: Vec<json::buffer::View>,
    accessors: Vec<json::Accessor>,
}

impl Packer {
    fn push(
        &mut self,
        bytes: &[u8],
        count: usize,
        component_type: json::accessor::ComponentType,
        type_: json::accessor::Type,
        bounds: Option<(Vec<f32>, Vec<f32>)>,
    ) -> json::Index<json::Accessor> {
        let offset = self.buffer.len();
        self.buffer.extend_from_slice(bytes);
        while self.buffer.len() % 4 != 0 {
            self.buffer.push(0);
        }

        self.views.push(json::buffer::View {
            buffer: json::Index::new(0),
            byte_length: bytes.len().into(),
            byte_offset: Some(offset.into()),
            byte_stride: None,
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            target: None,
        });
        let to_value =
            |v: Vec<f32>| json::Value::Array(v.into_iter().map(json::Value::from).collect());
        let (min, max) = match bounds {
            Some((min, max)) => (Some(to_value(min)), Some(to_value(max))),
            None => (None, None),
        };
        self.accessors.push(json::Accessor {
            buffer_view: Some(json::Index::new(self.views.len() as u32 - 1)),
            byte_offset: Some(0u64.into()),
            count: count.into(),
            component_type: Valid(json::accessor::GenericComponentType(component_type)),
            extensions: Default::default(),
            extras: Default::default(),
            type_: Valid(type_),
            min,
            max,
            name: None,
            normalized: false,
            sparse: None,
        });
        json::Index::new(self.accessors.len() as u32 - 1)
    }

    fn vec3(&mut self, data: &[[f32; 3]]) -> json::Index<json::Accessor> {
        self.push(
            bytemuck::cast_slice(data),
            data.len(),
            json::accessor::ComponentType::F32,
            json::accessor::Type::Vec3,
            None,
        )
    }

    fn vec4(&mut self, data: &[[f32; 4]]) -> json::Index<json::Accessor> {
        self.push(
            bytemuck::cast_slice(data),
            data.len(),
            json::accessor::ComponentType::F32,
            json::accessor::Type::Vec4,
            None,
        )
    }

    fn mat4(&mut self, data: &[[f32; 16]]) -> json::Index<json::Accessor> {
        self.push(
            bytemuck::cast_slice(data),
            data.len(),
            json::accessor::ComponentType::F32,
            json::accessor::Type::Mat4,
            None,
        )
    }
}

fn node(name: &str) -> json::Node {
    json::Node {
        camera: None,
        children: None,
        extensions: Default::default(),
        extras: Default::default(),
        matrix: None,
        mesh: None,
        name: Some(name.to_string()),
        rotation: None,
        scale: None,
        skin: None,
        translation: None,
        weights: None,
    }
}

fn channel(
    samplers: &mut Vec<json::animation::Sampler>,
    input: json::Index<json::Accessor>,
    output: json::Index<json::Accessor>,
    node: u32,
    path: json::animation::Property,
) -> json::animation::Channel {
    samplers.push(json::animation::Sampler {
        input,
        interpolation: Valid(json::animation::Interpolation::Linear),
        output,
        extensions: Default::default(),
        extras: Default::default(),
    });
    json::animation::Channel {
        sampler: json::Index::new(samplers.len() as u32 - 1),
        target: json::animation::Target {
            node: json::Index::new(node),
            path: Valid(path),
            extensions: Default::default(),
            extras: Default::default(),
        },
        extensions: Default::default(),
        extras: Default::default(),
    }
}

pub(crate) fn build_glb(mesh: &MeshData, animation: &AnimationData) -> Vec<u8> {
    let mut packer = Packer::default();

    let mut min = vec![f32::MAX; 3];
    let mut max = vec![f32::MIN; 3];
    for p in &mesh.positions {
        for i in 0..3 {
            min[i] = min[i].min(p[i]);
            max[i] = max[i].max(p[i]);
        }
    }
    let positions = packer.push(
        bytemuck::cast_slice(&mesh.positions),
        mesh.positions.len(),
        json::accessor::ComponentType::F32,
        json::accessor::Type::Vec3,
        Some((min, max)),
    );
    let joints = packer.push(
        bytemuck::cast_slice(&mesh.joints),
        mesh.joints.len(),
        json::accessor::ComponentType::U16,
        json::accessor::Type::Vec4,
        None,
    );
    let weights = packer.vec4(&mesh.weights);
    let indices = packer.push(
        bytemuck::cast_slice(&mesh.indices),
        mesh.indices.len(),
        json::accessor::ComponentType::U16,
        json::accessor::Type::Scalar,
        None,
    );

    let inverse_binds: [[f32; 16]; 2] = [
        glam::Mat4::IDENTITY.to_cols_array(),
        glam::Mat4::from_translation(glam::Vec3::new(0.0, -1.0, 0.0)).to_cols_array(),
    ];
    let inverse_binds = packer.mat4(&inverse_binds);

    let times = packer.push(
        bytemuck::cast_slice(&animation.times),
        animation.times.len(),
        json::accessor::ComponentType::F32,
        json::accessor::Type::Scalar,
        Some((vec![animation.times[0]], vec![*animation.times.last().unwrap()])),
    );
    let translations = packer.vec3(&animation.lower_translations);
    let rotations = packer.vec4(&animation.upper_rotations);

    // Nodes: 0 Lower, 1 Upper (child of Lower), 2 Bar (skinned mesh)
    let mut lower = node("Lower");
    lower.children = Some(vec![json::Index::new(1)]);
    let mut upper = node("Upper");
    upper.translation = Some([0.0, 1.0, 0.0]);
    let mut bar = node("Bar");
    bar.mesh = Some(json::Index::new(0));
    bar.skin = Some(json::Index::new(0));

    let mut attributes = BTreeMap::new();
    attributes.insert(Valid(json::mesh::Semantic::Positions), positions);
    attributes.insert(Valid(json::mesh::Semantic::Joints(0)), joints);
    attributes.insert(Valid(json::mesh::Semantic::Weights(0)), weights);
    let primitive = json::mesh::Primitive {
        attributes,
        extensions: Default::default(),
        extras: Default::default(),
        indices: Some(indices),
        material: None,
        mode: Valid(json::mesh::Mode::Triangles),
        targets: None,
    };

    let mut samplers = Vec::new();
    let channels = vec![
        channel(&mut samplers, times, translations, 0, json::animation::Property::Translation),
        channel(&mut samplers, times, rotations, 1, json::animation::Property::Rotation),
    ];

    let root = json::Root {
        accessors: packer.accessors,
        animations: vec![json::Animation {
            channels,
            extensions: Default::default(),
            extras: Default::default(),
            name: Some("Wave".to_string()),
            samplers,
        }],
        asset: json::Asset {
            copyright: None,
            extensions: Default::default(),
            extras: Default::default(),
            generator: Some("skin-solid tests".to_string()),
            min_version: None,
            version: "2.0".to_string(),
        },
        buffers: vec![json::Buffer {
            byte_length: packer.buffer.len().into(),
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            uri: None,
        }],
        buffer_views: packer.views,
        cameras: Vec::new(),
        extensions: Default::default(),
        extensions_required: Vec::new(),
        extensions_used: Vec::new(),
        extras: Default::default(),
        images: Vec::new(),
        materials: Vec::new(),
        meshes: vec![json::Mesh {
            extensions: Default::default(),
            extras: Default::default(),
            name: Some("Bar".to_string()),
            primitives: vec![primitive],
            weights: None,
        }],
        nodes: vec![lower, upper, bar],
        samplers: Vec::new(),
        scene: Some(json::Index::new(0)),
        scenes: vec![json::Scene {
            extensions: Default::default(),
            extras: Default::default(),
            name: Some("Scene".to_string()),
            nodes: vec![json::Index::new(0), json::Index::new(2)],
        }],
        skins: vec![json::Skin {
            extensions: Default::default(),
            extras: Default::default(),
            inverse_bind_matrices: Some(inverse_binds),
            joints: vec![json::Index::new(0), json::Index::new(1)],
            name: Some("Rig".to_string()),
            skeleton: Some(json::Index::new(0)),
        }],
        textures: Vec::new(),
    };

    skin_solid::export::assemble_glb(&root, &packer.buffer).expect("Failed to assemble GLB")
}
