//! glTF/GLB import into an in-memory scene
//!
//! Skins become armature objects, skinned mesh nodes become mesh objects
//! with one vertex group per joint and an armature modifier bound to their
//! rig. One animation drives the rigs as their pose action.

use std::path::Path;

use anyhow::{Context, Result, bail};
use gltf::animation::Interpolation;
use gltf::animation::util::ReadOutputs;
use glam::{Mat4, Quat, Vec3};
use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_FRAME_RATE;
use crate::scene::{
    Armature, Bone, BoneTrack, CollectionId, Face, InMemoryScene, Keyframe, Mesh, Modifier,
    Object, ObjectData, ObjectId, PoseAction, SceneAdapter, VertexWeight, VertexWeights,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ImportOptions {
    /// Frames per second used to turn glTF seconds into frames
    pub frame_rate: f32,
    /// Animation index driving the rigs (default: the first, if any)
    pub animation: Option<usize>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            animation: None,
        }
    }
}

/// Result of importing one glTF file
#[derive(Debug)]
pub struct ImportedScene {
    pub scene: InMemoryScene,
    /// Collection holding every imported object
    pub collection: CollectionId,
    /// One armature object per skin, in skin order
    pub rigs: Vec<ObjectId>,
    /// Name of the animation applied to the rigs
    pub animation: Option<String>,
}

pub fn import_gltf(path: &Path, options: &ImportOptions) -> Result<ImportedScene> {
    let (document, buffers, _images) =
        gltf::import(path).with_context(|| format!("Failed to load glTF: {:?}", path))?;
    import_document(&document, &buffers, options)
}

pub fn import_gltf_slice(bytes: &[u8], options: &ImportOptions) -> Result<ImportedScene> {
    let (document, buffers, _images) =
        gltf::import_slice(bytes).context("Failed to parse glTF data")?;
    import_document(&document, &buffers, options)
}

/// Node hierarchy with rest world matrices
struct NodeTree {
    parents: HashMap<usize, usize>,
    world: Vec<Mat4>,
}

impl NodeTree {
    fn build(document: &gltf::Document) -> Self {
        let mut parents = HashMap::new();
        for node in document.nodes() {
            for child in node.children() {
                parents.insert(child.index(), node.index());
            }
        }

        let locals: Vec<Mat4> = document
            .nodes()
            .map(|node| Mat4::from_cols_array_2d(&node.transform().matrix()))
            .collect();
        let world = (0..locals.len())
            .map(|index| {
                let mut matrix = locals[index];
                let mut current = parents.get(&index).copied();
                let mut depth = 0;
                while let Some(parent) = current {
                    if depth > locals.len() {
                        break;
                    }
                    matrix = locals[parent] * matrix;
                    current = parents.get(&parent).copied();
                    depth += 1;
                }
                matrix
            })
            .collect();

        Self { parents, world }
    }

    fn world(&self, node: usize) -> Mat4 {
        self.world.get(node).copied().unwrap_or(Mat4::IDENTITY)
    }
}

fn import_document(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    options: &ImportOptions,
) -> Result<ImportedScene> {
    if !options.frame_rate.is_finite() || options.frame_rate <= 0.0 {
        bail!("Frame rate must be positive, got {}", options.frame_rate);
    }

    let tree = NodeTree::build(document);
    let mut scene = InMemoryScene::new();

    let gltf_scene = document.default_scene().or_else(|| document.scenes().next());
    let collection_name = gltf_scene
        .as_ref()
        .and_then(|s| s.name())
        .unwrap_or("Scene")
        .to_string();
    let collection = scene.create_collection(&collection_name);

    // Nodes reachable from the scene; every node when the file has no scene
    let scene_nodes: Vec<gltf::Node> = match &gltf_scene {
        Some(s) => {
            let mut nodes = Vec::new();
            let mut stack: Vec<gltf::Node> = s.nodes().collect();
            while let Some(node) = stack.pop() {
                stack.extend(node.children());
                nodes.push(node);
            }
            nodes.sort_by_key(|node| node.index());
            nodes
        }
        None => document.nodes().collect(),
    };

    let animation = match options.animation {
        Some(index) => Some(
            document
                .animations()
                .nth(index)
                .with_context(|| format!("Animation index {} not found in glTF", index))?,
        ),
        None => document.animations().next(),
    };

    let mut rigs = Vec::new();
    for skin in document.skins() {
        let armature = import_skin(&skin, &tree, buffers, animation.as_ref(), options.frame_rate)?;
        let name = skin.name().unwrap_or("Armature");
        let base = skeleton_base(&skin, &tree);
        let rig = scene.add_object(
            Object::new(name, ObjectData::Armature(armature)).with_basis(base),
        );
        scene.link_object(collection, rig)?;
        rigs.push(rig);
    }

    for node in &scene_nodes {
        let Some(mesh) = node.mesh() else {
            continue;
        };
        let Some(skin) = node.skin() else {
            debug!(
                "Skipping mesh node '{}': not skinned",
                node.name().unwrap_or("unnamed")
            );
            continue;
        };
        let rig = *rigs
            .get(skin.index())
            .with_context(|| format!("Skin {} not found in glTF", skin.index()))?;

        let name = node
            .name()
            .or_else(|| mesh.name())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Mesh.{}", node.index()));
        let data = import_skinned_mesh(&mesh, &skin, &tree, buffers, &name)?;
        let vertex_count = data.vertex_count();

        let mut object = Object::new(name, ObjectData::Mesh(data))
            .with_modifier(Modifier::armature("Armature", rig));
        for bone in &scene.object(rig)?.armature().map(bone_names).unwrap_or_default() {
            object = object.with_vertex_group(bone.as_str());
        }
        let id = scene.add_object(object);
        scene.link_object(collection, id)?;
        debug!(
            "Imported skinned mesh '{}' ({} vertices)",
            scene.object(id)?.name,
            vertex_count
        );
    }

    let animation_name = animation.map(|a| {
        a.name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Animation.{}", a.index()))
    });
    info!(
        "Imported {} objects into '{}' ({} rigs)",
        scene.collection(collection)?.objects.len(),
        collection_name,
        rigs.len()
    );

    Ok(ImportedScene {
        scene,
        collection,
        rigs,
        animation: animation_name,
    })
}

fn bone_names(armature: &Armature) -> Vec<String> {
    armature.bones.iter().map(|bone| bone.name.clone()).collect()
}

/// World matrix of the node holding the skeleton roots
fn skeleton_base(skin: &gltf::Skin, tree: &NodeTree) -> Mat4 {
    let joints: HashSet<usize> = skin.joints().map(|j| j.index()).collect();
    skin.joints()
        .find(|joint| {
            tree.parents
                .get(&joint.index())
                .is_none_or(|parent| !joints.contains(parent))
        })
        .and_then(|root| tree.parents.get(&root.index()))
        .map(|parent| tree.world(*parent))
        .unwrap_or(Mat4::IDENTITY)
}

fn import_skin(
    skin: &gltf::Skin,
    tree: &NodeTree,
    buffers: &[gltf::buffer::Data],
    animation: Option<&gltf::Animation>,
    frame_rate: f32,
) -> Result<Armature> {
    let joints: Vec<gltf::Node> = skin.joints().collect();
    if joints.is_empty() {
        bail!("Skin '{}' has no joints", skin.name().unwrap_or("unnamed"));
    }
    let joint_map: HashMap<usize, usize> = joints
        .iter()
        .enumerate()
        .map(|(bone, joint)| (joint.index(), bone))
        .collect();
    let base_inverse = skeleton_base(skin, tree).inverse();

    let mut used = HashSet::new();
    let mut bones = Vec::with_capacity(joints.len());
    for (i, joint) in joints.iter().enumerate() {
        let mut name = joint
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Bone.{i}"));
        if !used.insert(name.clone()) {
            name = format!("{name}.{i}");
            used.insert(name.clone());
        }

        // Nearest ancestor that is a joint of this skin
        let mut parent = None;
        let mut current = tree.parents.get(&joint.index()).copied();
        while let Some(node) = current {
            if let Some(&bone) = joint_map.get(&node) {
                parent = Some(bone);
                break;
            }
            current = tree.parents.get(&node).copied();
        }

        let rest = match parent {
            Some(bone) => tree.world(joints[bone].index()).inverse() * tree.world(joint.index()),
            None => base_inverse * tree.world(joint.index()),
        };
        bones.push(Bone::new(name, parent, rest));
    }

    let mut armature = Armature::new(bones);
    if let Some(animation) = animation {
        armature.action = Some(import_action(animation, &joint_map, buffers, frame_rate)?);
    }
    Ok(armature)
}

fn import_action(
    animation: &gltf::Animation,
    joint_map: &HashMap<usize, usize>,
    buffers: &[gltf::buffer::Data],
    frame_rate: f32,
) -> Result<PoseAction> {
    let mut tracks: Vec<BoneTrack> = Vec::new();

    for channel in animation.channels() {
        let target = channel.target();
        let Some(&bone) = joint_map.get(&target.node().index()) else {
            continue;
        };
        let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
        let times: Vec<f32> = reader
            .read_inputs()
            .context("Animation channel has no input times")?
            .collect();
        let cubic = matches!(channel.sampler().interpolation(), Interpolation::CubicSpline);
        let frames: Vec<f32> = times.iter().map(|t| t * frame_rate).collect();

        let track = match tracks.iter().position(|t| t.bone == bone) {
            Some(index) => &mut tracks[index],
            None => {
                tracks.push(BoneTrack::new(bone));
                let last = tracks.len() - 1;
                &mut tracks[last]
            }
        };

        match reader.read_outputs() {
            Some(ReadOutputs::Translations(values)) => {
                track.translations = keyframes(&frames, values.map(Vec3::from_array), cubic);
            }
            Some(ReadOutputs::Rotations(values)) => {
                track.rotations = keyframes(
                    &frames,
                    values.into_f32().map(|q| Quat::from_array(q).normalize()),
                    cubic,
                );
            }
            Some(ReadOutputs::Scales(values)) => {
                track.scales = keyframes(&frames, values.map(Vec3::from_array), cubic);
            }
            Some(ReadOutputs::MorphTargetWeights(_)) => {
                debug!("Ignoring morph target weights channel");
            }
            None => warn!("Animation channel has no output values"),
        }
    }

    tracks.retain(|track| {
        !(track.translations.is_empty() && track.rotations.is_empty() && track.scales.is_empty())
    });
    Ok(PoseAction {
        name: animation
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Animation.{}", animation.index())),
        tracks,
    })
}

/// Pair keyed frames with their values. Cubic-spline outputs store
/// (in-tangent, value, out-tangent) triples; only the value is kept.
fn keyframes<T>(frames: &[f32], values: impl Iterator<Item = T>, cubic: bool) -> Vec<Keyframe<T>> {
    let values: Vec<T> = if cubic {
        values.skip(1).step_by(3).collect()
    } else {
        values.collect()
    };
    frames
        .iter()
        .zip(values)
        .map(|(&frame, value)| Keyframe::new(frame, value))
        .collect()
}

fn import_skinned_mesh(
    mesh: &gltf::Mesh,
    skin: &gltf::Skin,
    tree: &NodeTree,
    buffers: &[gltf::buffer::Data],
    name: &str,
) -> Result<Mesh> {
    // Rest-pose skinning matrices, so vertices land where the rig's rest pose puts them
    let joint_count = skin.joints().count();
    let inverse_binds: Vec<Mat4> = skin
        .reader(|buffer| Some(&buffers[buffer.index()]))
        .read_inverse_bind_matrices()
        .map(|iter| iter.map(|m| Mat4::from_cols_array_2d(&m)).collect())
        .unwrap_or_else(|| vec![Mat4::IDENTITY; joint_count]);
    let skinning: Vec<Mat4> = skin
        .joints()
        .enumerate()
        .map(|(i, joint)| {
            tree.world(joint.index()) * inverse_binds.get(i).copied().unwrap_or(Mat4::IDENTITY)
        })
        .collect();

    let mut out = Mesh::new(mesh.name().unwrap_or(name));
    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            debug!("Skipping {:?} primitive of '{}'", primitive.mode(), name);
            continue;
        }
        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
        let positions: Vec<Vec3> = reader
            .read_positions()
            .with_context(|| format!("No positions in mesh '{}'", name))?
            .map(Vec3::from_array)
            .collect();

        let mut weights: Vec<VertexWeights> = vec![SmallVec::new(); positions.len()];
        let mut set = 0;
        while let (Some(joints), Some(set_weights)) = (reader.read_joints(set), reader.read_weights(set)) {
            for (vertex, (joint_set, weight_set)) in
                joints.into_u16().zip(set_weights.into_f32()).enumerate()
            {
                let Some(entry) = weights.get_mut(vertex) else {
                    break;
                };
                for (&joint, &weight) in joint_set.iter().zip(weight_set.iter()) {
                    let group = joint as usize;
                    if weight <= 0.0 || group >= joint_count {
                        continue;
                    }
                    match entry.iter_mut().find(|w| w.group == group) {
                        Some(existing) => existing.weight += weight,
                        None => entry.push(VertexWeight::new(group, weight)),
                    }
                }
            }
            set += 1;
        }

        let offset = out.positions.len() as u32;
        let indices: Vec<u32> = match reader.read_indices() {
            Some(iter) => iter.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };
        out.faces.extend(
            indices
                .chunks_exact(3)
                .map(|tri| tri.iter().map(|index| index + offset).collect::<Face>()),
        );

        for (position, entry) in positions.into_iter().zip(weights) {
            let total: f32 = entry.iter().map(|w| w.weight).sum();
            let rest = if total > 0.0 {
                let matrix = entry
                    .iter()
                    .fold(Mat4::ZERO, |acc, w| acc + skinning[w.group] * (w.weight / total));
                matrix.transform_point3(position)
            } else {
                position
            };
            out.positions.push(rest);
            out.weights.push(entry);
        }
    }

    Ok(out)
}
