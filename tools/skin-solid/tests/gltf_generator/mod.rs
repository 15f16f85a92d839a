//! Programmatic GLB generation for integration tests.
//!
//! Generates a skinned two-bone "arm":
//! - Mesh "Bar": two stacked boxes, the lower one skinned to "Lower", the
//!   upper one to "Upper" (its bottom ring blended 0.75 Upper / 0.25 Lower)
//! - Skin "Rig": Lower at the origin, Upper one unit above as its child
//! - Animation "Wave" over one second: Lower slides +1 on x, Upper turns
//!   90 degrees around z

mod gltf_json;

/// Half width of both boxes
pub const HALF_WIDTH: f32 = 0.25;
/// Vertices per box
pub const BOX_VERTICES: usize = 8;

pub(crate) struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub joints: Vec<[u16; 4]>,
    pub weights: Vec<[f32; 4]>,
    pub indices: Vec<u16>,
}

pub(crate) struct AnimationData {
    pub times: Vec<f32>,
    pub lower_translations: Vec<[f32; 3]>,
    pub upper_rotations: Vec<[f32; 4]>,
}

/// Generate the skinned GLB
pub fn generate_skinned_glb() -> Vec<u8> {
    let mesh = create_mesh_data();
    let animation = create_animation();
    gltf_json::build_glb(&mesh, &animation)
}

fn create_mesh_data() -> MeshData {
    let mut positions = Vec::new();
    let mut joints = Vec::new();
    let mut weights = Vec::new();
    let mut indices = Vec::new();

    // Quads wound outward over corners 0..8 of a box
    const QUADS: [[u16; 4]; 6] = [
        [0, 3, 2, 1],
        [4, 5, 6, 7],
        [0, 1, 5, 4],
        [2, 3, 7, 6],
        [1, 2, 6, 5],
        [0, 4, 7, 3],
    ];

    for segment in 0..2u16 {
        let y0 = segment as f32;
        let y1 = y0 + 1.0;
        let base = segment * BOX_VERTICES as u16;
        let h = HALF_WIDTH;
        let corners = [
            [-h, y0, -h],
            [h, y0, -h],
            [h, y1, -h],
            [-h, y1, -h],
            [-h, y0, h],
            [h, y0, h],
            [h, y1, h],
            [-h, y1, h],
        ];
        for corner in corners {
            positions.push(corner);
            let bottom = corner[1] == y0;
            if segment == 1 && bottom {
                joints.push([1, 0, 0, 0]);
                weights.push([0.75, 0.25, 0.0, 0.0]);
            } else {
                joints.push([segment, 0, 0, 0]);
                weights.push([1.0, 0.0, 0.0, 0.0]);
            }
        }
        for [a, b, c, d] in QUADS {
            indices.extend_from_slice(&[base + a, base + b, base + c, base + a, base + c, base + d]);
        }
    }

    MeshData {
        positions,
        joints,
        weights,
        indices,
    }
}

fn create_animation() -> AnimationData {
    let half = std::f32::consts::FRAC_PI_8.sin();
    AnimationData {
        times: vec![0.0, 0.5, 1.0],
        lower_translations: vec![[0.0, 0.0, 0.0], [0.5, 0.0, 0.0], [1.0, 0.0, 0.0]],
        upper_rotations: vec![
            [0.0, 0.0, 0.0, 1.0],
            [0.0, 0.0, half, std::f32::consts::FRAC_PI_8.cos()],
            [0.0, 0.0, std::f32::consts::FRAC_1_SQRT_2, std::f32::consts::FRAC_1_SQRT_2],
        ],
    }
}
