//! Scene objects and collections

use glam::{Mat4, Quat, Vec3};

use super::armature::Armature;
use super::mesh::Mesh;
use super::ObjectId;

/// Named vertex group definition on an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexGroup {
    pub name: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    /// Skinning deformation driven by an armature object
    Armature { name: String, rig: Option<ObjectId> },
    /// Any other modifier, carried through untouched
    Other { name: String, kind: String },
}

impl Modifier {
    pub fn armature(name: impl Into<String>, rig: ObjectId) -> Self {
        Modifier::Armature {
            name: name.into(),
            rig: Some(rig),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Modifier::Armature { name, .. } | Modifier::Other { name, .. } => name,
        }
    }

    pub fn is_armature(&self) -> bool {
        matches!(self, Modifier::Armature { .. })
    }

    /// True when this modifier deforms its object with `rig`
    pub fn deforms_with(&self, rig: ObjectId) -> bool {
        matches!(self, Modifier::Armature { rig: Some(bound), .. } if *bound == rig)
    }
}

/// Parent relation, optionally qualified by a bone of an armature parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parent {
    pub object: ObjectId,
    pub bone: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectData {
    Mesh(Mesh),
    Armature(Armature),
    Empty,
}

impl ObjectData {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ObjectData::Mesh(_) => "mesh",
            ObjectData::Armature(_) => "armature",
            ObjectData::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformKey {
    pub frame: i32,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl TransformKey {
    pub fn from_matrix(frame: i32, matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            frame,
            translation,
            rotation,
            scale,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Baked object-level transform keyframes, one per frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformTrack {
    pub keys: Vec<TransformKey>,
}

impl TransformTrack {
    /// Key in effect at `frame`, holding the first and last keys outside the range
    pub fn sample(&self, frame: i32) -> Option<&TransformKey> {
        let last = self.keys.len().checked_sub(1)?;
        let index = self.keys.partition_point(|key| key.frame <= frame);
        Some(&self.keys[index.saturating_sub(1).min(last)])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub name: String,
    pub data: ObjectData,
    pub vertex_groups: Vec<VertexGroup>,
    pub modifiers: Vec<Modifier>,
    pub parent: Option<Parent>,
    /// Local transform
    pub basis: Mat4,
    /// Inverse of the parent's world matrix captured when parenting
    pub parent_inverse: Mat4,
    pub animation: Option<TransformTrack>,
}

impl Object {
    pub fn new(name: impl Into<String>, data: ObjectData) -> Self {
        Self {
            name: name.into(),
            data,
            vertex_groups: Vec::new(),
            modifiers: Vec::new(),
            parent: None,
            basis: Mat4::IDENTITY,
            parent_inverse: Mat4::IDENTITY,
            animation: None,
        }
    }

    pub fn with_vertex_group(mut self, name: impl Into<String>) -> Self {
        let index = self.vertex_groups.len();
        self.vertex_groups.push(VertexGroup {
            name: name.into(),
            index,
        });
        self
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn with_basis(mut self, basis: Mat4) -> Self {
        self.basis = basis;
        self
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.data {
            ObjectData::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.data {
            ObjectData::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn armature(&self) -> Option<&Armature> {
        match &self.data {
            ObjectData::Armature(armature) => Some(armature),
            _ => None,
        }
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self.data, ObjectData::Mesh(_))
    }

    pub fn vertex_group_index(&self, name: &str) -> Option<usize> {
        self.vertex_groups.iter().position(|group| group.name == name)
    }

    /// Local transform at `frame`; baked keys take precedence over the static basis
    pub fn basis_at(&self, frame: i32) -> Mat4 {
        self.animation
            .as_ref()
            .and_then(|track| track.sample(frame))
            .map(TransformKey::matrix)
            .unwrap_or(self.basis)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collection {
    pub name: String,
    pub objects: Vec<ObjectId>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: Vec::new(),
        }
    }

    pub fn contains(&self, object: ObjectId) -> bool {
        self.objects.contains(&object)
    }
}
