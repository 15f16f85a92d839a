//! Armature data: bone hierarchy, rest/pose state and keyframed pose action

use glam::{Mat4, Quat, Vec3};

/// Which pose the armature evaluates to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PosePosition {
    /// Undeformed bind pose, the action is ignored
    Rest,
    /// Animated pose from the action
    #[default]
    Pose,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    /// Index of the parent bone in the owning armature
    pub parent: Option<usize>,
    /// Rest transform relative to the parent bone (or the armature for roots)
    pub rest: Mat4,
}

impl Bone {
    pub fn new(name: impl Into<String>, parent: Option<usize>, rest: Mat4) -> Self {
        Self {
            name: name.into(),
            parent,
            rest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe<T> {
    pub frame: f32,
    pub value: T,
}

impl<T> Keyframe<T> {
    pub fn new(frame: f32, value: T) -> Self {
        Self { frame, value }
    }
}

/// Animated channels of one bone. Empty channels keep the rest value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneTrack {
    pub bone: usize,
    pub translations: Vec<Keyframe<Vec3>>,
    pub rotations: Vec<Keyframe<Quat>>,
    pub scales: Vec<Keyframe<Vec3>>,
}

impl BoneTrack {
    pub fn new(bone: usize) -> Self {
        Self {
            bone,
            ..Default::default()
        }
    }

    fn frames(&self) -> impl Iterator<Item = f32> + '_ {
        self.translations
            .iter()
            .map(|k| k.frame)
            .chain(self.rotations.iter().map(|k| k.frame))
            .chain(self.scales.iter().map(|k| k.frame))
    }
}

/// Keyframed pose animation applied to an armature
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseAction {
    pub name: String,
    pub tracks: Vec<BoneTrack>,
}

impl PoseAction {
    /// First and last keyed frame, or `None` when nothing is keyed
    pub fn frame_range(&self) -> Option<(f32, f32)> {
        self.tracks
            .iter()
            .flat_map(BoneTrack::frames)
            .fold(None, |range, frame| match range {
                None => Some((frame, frame)),
                Some((lo, hi)) => Some((f32::min(lo, frame), f32::max(hi, frame))),
            })
    }

    fn track(&self, bone: usize) -> Option<&BoneTrack> {
        self.tracks.iter().find(|track| track.bone == bone)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Armature {
    pub bones: Vec<Bone>,
    pub pose_position: PosePosition,
    pub action: Option<PoseAction>,
}

impl Armature {
    pub fn new(bones: Vec<Bone>) -> Self {
        Self {
            bones,
            ..Default::default()
        }
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|bone| bone.name == name)
    }

    /// Local transform of a bone at `frame`, relative to its parent bone
    pub fn local_pose(&self, bone: usize, frame: f32) -> Mat4 {
        let Some(rest) = self.bones.get(bone).map(|b| b.rest) else {
            return Mat4::IDENTITY;
        };

        let track = match (self.pose_position, &self.action) {
            (PosePosition::Pose, Some(action)) => action.track(bone),
            _ => None,
        };
        let Some(track) = track else {
            return rest;
        };

        let (mut scale, mut rotation, mut translation) = rest.to_scale_rotation_translation();
        if let Some(value) = sample_vec3(&track.translations, frame) {
            translation = value;
        }
        if let Some(value) = sample_quat(&track.rotations, frame) {
            rotation = value;
        }
        if let Some(value) = sample_vec3(&track.scales, frame) {
            scale = value;
        }
        Mat4::from_scale_rotation_translation(scale, rotation, translation)
    }

    /// Posed transform of a bone in armature space
    pub fn bone_matrix(&self, bone: usize, frame: f32) -> Mat4 {
        let mut matrix = self.local_pose(bone, frame);
        let mut current = self.bones.get(bone).and_then(|b| b.parent);
        // Guard against malformed hierarchies
        let mut depth = 0;
        while let Some(parent) = current {
            if depth > self.bones.len() {
                break;
            }
            matrix = self.local_pose(parent, frame) * matrix;
            current = self.bones.get(parent).and_then(|b| b.parent);
            depth += 1;
        }
        matrix
    }
}

/// Find the segment containing `frame` and the clamped blend factor inside it
fn segment<T>(keys: &[Keyframe<T>], frame: f32) -> Option<(usize, f32)> {
    if keys.is_empty() {
        return None;
    }
    if keys.len() == 1 || frame <= keys[0].frame {
        return Some((0, 0.0));
    }

    let mut i = 0;
    while i < keys.len() - 1 && keys[i + 1].frame < frame {
        i += 1;
    }
    if i >= keys.len() - 1 {
        return Some((keys.len() - 1, 0.0));
    }

    let span = keys[i + 1].frame - keys[i].frame;
    let factor = if span > 0.0 {
        (frame - keys[i].frame) / span
    } else {
        0.0
    };
    Some((i, factor.clamp(0.0, 1.0)))
}

pub(crate) fn sample_vec3(keys: &[Keyframe<Vec3>], frame: f32) -> Option<Vec3> {
    let (i, factor) = segment(keys, frame)?;
    match keys.get(i + 1) {
        Some(next) if factor > 0.0 => Some(keys[i].value.lerp(next.value, factor)),
        _ => Some(keys[i].value),
    }
}

pub(crate) fn sample_quat(keys: &[Keyframe<Quat>], frame: f32) -> Option<Quat> {
    let (i, factor) = segment(keys, frame)?;
    match keys.get(i + 1) {
        Some(next) if factor > 0.0 => Some(keys[i].value.slerp(next.value, factor).normalize()),
        _ => Some(keys[i].value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn two_bone_arm() -> Armature {
        let mut armature = Armature::new(vec![
            Bone::new("Lower", None, Mat4::IDENTITY),
            Bone::new("Upper", Some(0), Mat4::from_translation(Vec3::Y)),
        ]);
        let mut lower = BoneTrack::new(0);
        lower.translations = vec![
            Keyframe::new(0.0, Vec3::ZERO),
            Keyframe::new(10.0, Vec3::new(2.0, 0.0, 0.0)),
        ];
        let mut upper = BoneTrack::new(1);
        upper.rotations = vec![
            Keyframe::new(0.0, Quat::IDENTITY),
            Keyframe::new(10.0, Quat::from_rotation_z(FRAC_PI_2)),
        ];
        armature.action = Some(PoseAction {
            name: "Wave".to_string(),
            tracks: vec![lower, upper],
        });
        armature
    }

    #[test]
    fn test_sample_vec3_interpolates_and_clamps() {
        let keys = [
            Keyframe::new(0.0, Vec3::ZERO),
            Keyframe::new(4.0, Vec3::new(4.0, 0.0, 0.0)),
        ];
        assert_eq!(sample_vec3(&keys, -1.0), Some(Vec3::ZERO));
        assert_eq!(sample_vec3(&keys, 1.0), Some(Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(sample_vec3(&keys, 9.0), Some(Vec3::new(4.0, 0.0, 0.0)));
        assert_eq!(sample_vec3(&[], 1.0), None);
    }

    #[test]
    fn test_rest_position_ignores_action() {
        let mut armature = two_bone_arm();
        armature.pose_position = PosePosition::Rest;
        let upper = armature.bone_matrix(1, 10.0);
        assert!(upper.abs_diff_eq(Mat4::from_translation(Vec3::Y), 1e-6));
    }

    #[test]
    fn test_bone_matrix_chains_parents() {
        let armature = two_bone_arm();
        let upper = armature.bone_matrix(1, 10.0);
        let tip = upper.transform_point3(Vec3::Y);
        // Lower moved by +2x, Upper turned 90 degrees so its tip points to -x
        assert!(tip.abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-5), "{tip}");
    }

    #[test]
    fn test_frame_range() {
        assert_eq!(two_bone_arm().action.unwrap().frame_range(), Some((0.0, 10.0)));
        assert_eq!(PoseAction::default().frame_range(), None);
    }

    #[test]
    fn test_bone_index() {
        let armature = two_bone_arm();
        assert_eq!(armature.bone_index("Upper"), Some(1));
        assert_eq!(armature.bone_index("Missing"), None);
    }
}
