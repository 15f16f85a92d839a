//! In-memory scene host

use glam::Mat4;
use hashbrown::HashMap;
use tracing::debug;

use super::adapter::{BakeRequest, SceneAdapter, SceneError};
use super::armature::PosePosition;
use super::mesh::Mesh;
use super::object::{
    Collection, Modifier, Object, ObjectData, Parent, TransformKey, TransformTrack, VertexGroup,
};
use super::{CollectionId, ObjectId};

/// Scene that owns its objects and collections directly
#[derive(Debug, Clone, Default)]
pub struct InMemoryScene {
    objects: HashMap<ObjectId, Object>,
    collections: HashMap<CollectionId, Collection>,
    next_object: u32,
    next_collection: u32,
    frame: i32,
}

impl InMemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object (unlinked). Its name is made unique.
    pub fn add_object(&mut self, mut object: Object) -> ObjectId {
        let id = ObjectId(self.next_object);
        self.next_object += 1;
        object.name = self.unique_name(&object.name, None);
        self.objects.insert(id, object);
        id
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Result<&mut Object, SceneError> {
        self.objects
            .get_mut(&id)
            .ok_or(SceneError::UnknownObject(id))
    }

    pub fn object_by_name(&self, name: &str) -> Option<ObjectId> {
        self.objects
            .iter()
            .filter(|(_, object)| object.name == name)
            .map(|(id, _)| *id)
            .min()
    }

    pub fn collection_by_name(&self, name: &str) -> Option<CollectionId> {
        self.collections
            .iter()
            .filter(|(_, collection)| collection.name == name)
            .map(|(id, _)| *id)
            .min()
    }

    /// All object ids in creation order
    pub fn object_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self.objects.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Frame used by keep-transform operations
    pub fn frame(&self) -> i32 {
        self.frame
    }

    pub fn set_frame(&mut self, frame: i32) {
        self.frame = frame;
    }

    fn unique_name(&self, base: &str, exclude: Option<ObjectId>) -> String {
        let taken = |name: &str| {
            self.objects
                .iter()
                .any(|(id, object)| Some(*id) != exclude && object.name == name)
        };
        if !taken(base) {
            return base.to_string();
        }
        (1u32..)
            .map(|n| format!("{base}.{n:03}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    fn world_at(&self, id: ObjectId, frame: i32, depth: usize) -> Result<Mat4, SceneError> {
        let object = self.object(id)?;
        let basis = object.basis_at(frame);
        match &object.parent {
            None => Ok(basis),
            Some(parent) => {
                if depth > self.objects.len() {
                    let parent_name = self.object(parent.object)?.name.clone();
                    return Err(SceneError::ParentCycle {
                        child: object.name.clone(),
                        parent: parent_name,
                    });
                }
                let parent_matrix = self.parent_matrix(parent, frame, depth + 1)?;
                Ok(parent_matrix * object.parent_inverse * basis)
            }
        }
    }

    /// World matrix of a parent, including the posed bone when parented to one
    fn parent_matrix(&self, parent: &Parent, frame: i32, depth: usize) -> Result<Mat4, SceneError> {
        let world = self.world_at(parent.object, frame, depth)?;
        let Some(bone) = &parent.bone else {
            return Ok(world);
        };

        let rig = self.object(parent.object)?;
        let armature = rig.armature().ok_or_else(|| SceneError::WrongKind {
            name: rig.name.clone(),
            expected: "armature",
            found: rig.data.kind_name(),
        })?;
        let index = armature
            .bone_index(bone)
            .ok_or_else(|| SceneError::UnknownBone {
                rig: rig.name.clone(),
                bone: bone.clone(),
            })?;
        Ok(world * armature.bone_matrix(index, frame as f32))
    }

    fn mesh_mut(&mut self, id: ObjectId) -> Result<&mut Mesh, SceneError> {
        let object = self.object_mut(id)?;
        let found = object.data.kind_name();
        let name = object.name.clone();
        object.mesh_mut().ok_or(SceneError::WrongKind {
            name,
            expected: "mesh",
            found,
        })
    }

    /// True when `ancestor` appears in the parent chain of `id` (or is `id`)
    fn is_ancestor(&self, ancestor: ObjectId, id: ObjectId) -> bool {
        let mut current = Some(id);
        let mut depth = 0;
        while let Some(object) = current {
            if object == ancestor {
                return true;
            }
            if depth > self.objects.len() {
                return true;
            }
            current = self
                .objects
                .get(&object)
                .and_then(|o| o.parent.as_ref())
                .map(|p| p.object);
            depth += 1;
        }
        false
    }
}

impl SceneAdapter for InMemoryScene {
    fn object(&self, id: ObjectId) -> Result<&Object, SceneError> {
        self.objects.get(&id).ok_or(SceneError::UnknownObject(id))
    }

    fn collection(&self, id: CollectionId) -> Result<&Collection, SceneError> {
        self.collections
            .get(&id)
            .ok_or(SceneError::UnknownCollection(id))
    }

    fn create_collection(&mut self, name: &str) -> CollectionId {
        let id = CollectionId(self.next_collection);
        self.next_collection += 1;
        self.collections.insert(id, Collection::new(name));
        id
    }

    fn remove_collection(&mut self, id: CollectionId) -> Result<(), SceneError> {
        self.collections
            .remove(&id)
            .map(|_| ())
            .ok_or(SceneError::UnknownCollection(id))
    }

    fn duplicate_object(&mut self, id: ObjectId) -> Result<ObjectId, SceneError> {
        let copy = self.object(id)?.clone();
        Ok(self.add_object(copy))
    }

    fn rename_object(&mut self, id: ObjectId, name: &str) -> Result<String, SceneError> {
        self.object(id)?;
        let name = self.unique_name(name, Some(id));
        self.object_mut(id)?.name = name.clone();
        Ok(name)
    }

    fn rename_mesh(&mut self, id: ObjectId, name: &str) -> Result<(), SceneError> {
        self.mesh_mut(id)?.name = name.to_string();
        Ok(())
    }

    fn set_mesh(&mut self, id: ObjectId, mut mesh: Mesh) -> Result<(), SceneError> {
        let current = self.mesh_mut(id)?;
        mesh.name = std::mem::take(&mut current.name);
        *current = mesh;
        Ok(())
    }

    fn add_vertex_group(&mut self, id: ObjectId, name: &str) -> Result<usize, SceneError> {
        let object = self.object_mut(id)?;
        let index = object.vertex_groups.len();
        object.vertex_groups.push(VertexGroup {
            name: name.to_string(),
            index,
        });
        Ok(index)
    }

    fn remove_vertex_group(&mut self, id: ObjectId, index: usize) -> Result<(), SceneError> {
        let object = self.object_mut(id)?;
        if index >= object.vertex_groups.len() {
            return Err(SceneError::VertexGroupOutOfRange {
                name: object.name.clone(),
                index,
            });
        }
        object.vertex_groups.remove(index);
        for (i, group) in object.vertex_groups.iter_mut().enumerate() {
            group.index = i;
        }
        if let Some(mesh) = object.mesh_mut() {
            mesh.remove_group(index);
        }
        Ok(())
    }

    fn link_object(&mut self, collection: CollectionId, id: ObjectId) -> Result<(), SceneError> {
        self.object(id)?;
        let collection = self
            .collections
            .get_mut(&collection)
            .ok_or(SceneError::UnknownCollection(collection))?;
        if !collection.contains(id) {
            collection.objects.push(id);
        }
        Ok(())
    }

    fn unlink_object(&mut self, collection: CollectionId, id: ObjectId) -> Result<(), SceneError> {
        let collection = self
            .collections
            .get_mut(&collection)
            .ok_or(SceneError::UnknownCollection(collection))?;
        collection.objects.retain(|object| *object != id);
        Ok(())
    }

    fn remove_object(&mut self, id: ObjectId) -> Result<(), SceneError> {
        self.object(id)?;

        let children: Vec<ObjectId> = self
            .objects
            .iter()
            .filter(|(_, object)| object.parent.as_ref().is_some_and(|p| p.object == id))
            .map(|(child, _)| *child)
            .collect();
        for child in children {
            self.clear_parent_keep_transform(child)?;
        }

        for collection in self.collections.values_mut() {
            collection.objects.retain(|object| *object != id);
        }
        for object in self.objects.values_mut() {
            for modifier in &mut object.modifiers {
                if let Modifier::Armature { rig, .. } = modifier
                    && *rig == Some(id)
                {
                    *rig = None;
                }
            }
        }

        if let Some(object) = self.objects.remove(&id) {
            debug!("Removed object '{}'", object.name);
        }
        Ok(())
    }

    fn set_pose_position(
        &mut self,
        rig: ObjectId,
        position: PosePosition,
    ) -> Result<(), SceneError> {
        let object = self.object_mut(rig)?;
        match &mut object.data {
            ObjectData::Armature(armature) => {
                armature.pose_position = position;
                Ok(())
            }
            other => Err(SceneError::WrongKind {
                name: object.name.clone(),
                expected: "armature",
                found: other.kind_name(),
            }),
        }
    }

    fn remove_modifier(&mut self, id: ObjectId, index: usize) -> Result<Modifier, SceneError> {
        let object = self.object_mut(id)?;
        if index >= object.modifiers.len() {
            return Err(SceneError::ModifierOutOfRange {
                name: object.name.clone(),
                index,
            });
        }
        Ok(object.modifiers.remove(index))
    }

    fn set_origin_to_volume_center(&mut self, id: ObjectId) -> Result<(), SceneError> {
        let Some(center) = self.mesh_mut(id)?.volume_center() else {
            return Ok(());
        };

        let object = self.object_mut(id)?;
        if let Some(mesh) = object.mesh_mut() {
            mesh.translate(-center);
        }
        let offset = Mat4::from_translation(center);
        object.basis *= offset;
        if let Some(track) = &mut object.animation {
            for key in &mut track.keys {
                *key = TransformKey::from_matrix(key.frame, key.matrix() * offset);
            }
        }
        Ok(())
    }

    fn clear_parent_keep_transform(&mut self, id: ObjectId) -> Result<(), SceneError> {
        let world = self.world_matrix(id, self.frame)?;
        let object = self.object_mut(id)?;
        object.parent = None;
        object.parent_inverse = Mat4::IDENTITY;
        object.basis = world;
        Ok(())
    }

    fn parent_to_bone_keep_transform(
        &mut self,
        id: ObjectId,
        rig: ObjectId,
        bone: &str,
    ) -> Result<(), SceneError> {
        let child_name = self.object(id)?.name.clone();
        let rig_object = self.object(rig)?;
        let armature = rig_object.armature().ok_or_else(|| SceneError::WrongKind {
            name: rig_object.name.clone(),
            expected: "armature",
            found: rig_object.data.kind_name(),
        })?;
        if armature.bone_index(bone).is_none() {
            return Err(SceneError::UnknownBone {
                rig: rig_object.name.clone(),
                bone: bone.to_string(),
            });
        }
        if self.is_ancestor(id, rig) {
            return Err(SceneError::ParentCycle {
                child: child_name,
                parent: rig_object.name.clone(),
            });
        }

        let world = self.world_matrix(id, self.frame)?;
        let parent = Parent {
            object: rig,
            bone: Some(bone.to_string()),
        };
        let parent_matrix = self.parent_matrix(&parent, self.frame, 0)?;

        let object = self.object_mut(id)?;
        object.parent = Some(parent);
        object.parent_inverse = parent_matrix.inverse();
        object.basis = world;
        Ok(())
    }

    fn bake_transforms(&mut self, request: &BakeRequest) -> Result<(), SceneError> {
        if request.frame_start > request.frame_end {
            return Err(SceneError::InvalidFrameRange {
                start: request.frame_start,
                end: request.frame_end,
            });
        }

        // Sample everything before mutating anything so objects baked
        // earlier cannot influence objects baked later.
        let mut tracks = Vec::with_capacity(request.objects.len());
        for &id in &request.objects {
            let object = self.object(id)?;
            let mut keys = Vec::new();
            for frame in request.frame_start..=request.frame_end {
                let matrix = if !request.visual_keying {
                    object.basis_at(frame)
                } else {
                    let world = self.world_at(id, frame, 0)?;
                    match (&object.parent, request.clear_parents) {
                        (Some(parent), false) => {
                            let parent_matrix = self.parent_matrix(parent, frame, 0)?;
                            (parent_matrix * object.parent_inverse).inverse() * world
                        }
                        _ => world,
                    }
                };
                keys.push(TransformKey::from_matrix(frame, matrix));
            }
            tracks.push((id, TransformTrack { keys }));
        }

        for (id, track) in tracks {
            let object = self.object_mut(id)?;
            if request.clear_parents {
                object.parent = None;
                object.parent_inverse = Mat4::IDENTITY;
            }
            if let Some(first) = track.keys.first() {
                object.basis = first.matrix();
            }
            debug!("Baked {} keys on '{}'", track.keys.len(), object.name);
            object.animation = Some(track);
        }
        Ok(())
    }

    fn world_matrix(&self, id: ObjectId, frame: i32) -> Result<Mat4, SceneError> {
        self.world_at(id, frame, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::fixtures::weighted_box;
    use crate::scene::{Armature, Bone, BoneTrack, Keyframe, PoseAction};
    use glam::{Quat, Vec3};
    use std::f32::consts::FRAC_PI_2;

    fn rig(scene: &mut InMemoryScene) -> ObjectId {
        let mut armature = Armature::new(vec![
            Bone::new("Root", None, Mat4::IDENTITY),
            Bone::new("Arm", Some(0), Mat4::from_translation(Vec3::Y)),
        ]);
        let mut arm = BoneTrack::new(1);
        arm.rotations = vec![
            Keyframe::new(0.0, Quat::IDENTITY),
            Keyframe::new(10.0, Quat::from_rotation_z(FRAC_PI_2)),
        ];
        armature.action = Some(PoseAction {
            name: "Raise".to_string(),
            tracks: vec![arm],
        });
        scene.add_object(
            Object::new("Armature", ObjectData::Armature(armature))
                .with_basis(Mat4::from_translation(Vec3::new(0.0, 0.0, 2.0))),
        )
    }

    fn cube(scene: &mut InMemoryScene, name: &str) -> ObjectId {
        let mesh = weighted_box(name, Vec3::new(0.0, 1.0, 0.0), Vec3::new(1.0, 2.0, 1.0), Some(0));
        scene.add_object(Object::new(name, ObjectData::Mesh(mesh)).with_vertex_group("Arm"))
    }

    #[test]
    fn test_duplicate_is_independent_and_unlinked() {
        let mut scene = InMemoryScene::new();
        let collection = scene.create_collection("Source");
        let source = cube(&mut scene, "Cube");
        scene.link_object(collection, source).unwrap();

        let copy = scene.duplicate_object(source).unwrap();
        assert_eq!(scene.object(copy).unwrap().name, "Cube.001");
        assert!(!scene.collection(collection).unwrap().contains(copy));

        scene.set_mesh(copy, Mesh::default()).unwrap();
        assert_eq!(scene.object(source).unwrap().mesh().unwrap().vertex_count(), 8);
        assert_eq!(scene.object(copy).unwrap().mesh().unwrap().name, "Cube");
    }

    #[test]
    fn test_rename_keeps_names_unique() {
        let mut scene = InMemoryScene::new();
        let a = cube(&mut scene, "A");
        let b = cube(&mut scene, "B");
        assert_eq!(scene.rename_object(b, "A").unwrap(), "A.001");
        assert_eq!(scene.rename_object(a, "A").unwrap(), "A");
        assert_eq!(scene.object_by_name("A.001"), Some(b));
    }

    #[test]
    fn test_remove_vertex_group_reindexes() {
        let mut scene = InMemoryScene::new();
        let id = cube(&mut scene, "Cube");
        scene.add_vertex_group(id, "Extra").unwrap();
        scene.remove_vertex_group(id, 0).unwrap();

        let object = scene.object(id).unwrap();
        assert_eq!(object.vertex_groups.len(), 1);
        assert_eq!(object.vertex_groups[0].name, "Extra");
        assert_eq!(object.vertex_groups[0].index, 0);
        assert!(object.mesh().unwrap().vertex_weights(0).is_empty());

        assert!(matches!(
            scene.remove_vertex_group(id, 3),
            Err(SceneError::VertexGroupOutOfRange { index: 3, .. })
        ));
    }

    #[test]
    fn test_parent_to_bone_keeps_world_transform() {
        let mut scene = InMemoryScene::new();
        let rig = rig(&mut scene);
        let id = cube(&mut scene, "Cube");
        scene.object_mut(id).unwrap().basis =
            Mat4::from_scale_rotation_translation(Vec3::splat(2.0), Quat::from_rotation_x(0.3), Vec3::X);

        // Posed at an animated frame to make the parent matrix non-trivial
        scene.set_frame(5);
        let before = scene.world_matrix(id, 5).unwrap();
        scene.parent_to_bone_keep_transform(id, rig, "Arm").unwrap();
        let after = scene.world_matrix(id, 5).unwrap();
        assert!(before.abs_diff_eq(after, 1e-5), "{before} != {after}");

        scene.clear_parent_keep_transform(id).unwrap();
        let cleared = scene.world_matrix(id, 5).unwrap();
        assert!(before.abs_diff_eq(cleared, 1e-5));
        assert!(scene.object(id).unwrap().parent.is_none());
    }

    #[test]
    fn test_bone_parent_follows_pose() {
        let mut scene = InMemoryScene::new();
        let rig = rig(&mut scene);
        let id = cube(&mut scene, "Cube");
        scene.set_pose_position(rig, PosePosition::Rest).unwrap();
        scene.parent_to_bone_keep_transform(id, rig, "Arm").unwrap();
        scene.set_pose_position(rig, PosePosition::Pose).unwrap();

        // Arm head sits at (0, 1, 2) in world space; the point above it swings to -x
        let world = scene.world_matrix(id, 10).unwrap();
        let point = world.transform_point3(Vec3::new(0.0, 2.0, 0.0));
        assert!(point.abs_diff_eq(Vec3::new(-1.0, 1.0, 0.0), 1e-5), "{point}");
    }

    #[test]
    fn test_parent_errors() {
        let mut scene = InMemoryScene::new();
        let rig = rig(&mut scene);
        let id = cube(&mut scene, "Cube");
        assert!(matches!(
            scene.parent_to_bone_keep_transform(id, rig, "Tail"),
            Err(SceneError::UnknownBone { .. })
        ));
        assert!(matches!(
            scene.parent_to_bone_keep_transform(rig, id, "Arm"),
            Err(SceneError::WrongKind { expected: "armature", .. })
        ));
        assert!(matches!(
            scene.parent_to_bone_keep_transform(rig, rig, "Arm"),
            Err(SceneError::ParentCycle { .. })
        ));
        assert!(matches!(
            scene.set_pose_position(id, PosePosition::Rest),
            Err(SceneError::WrongKind { found: "mesh", .. })
        ));
    }

    #[test]
    fn test_origin_to_volume_center_keeps_world_positions() {
        let mut scene = InMemoryScene::new();
        let id = cube(&mut scene, "Cube");
        scene.object_mut(id).unwrap().basis = Mat4::from_rotation_y(FRAC_PI_2);
        let world = scene.world_matrix(id, 0).unwrap();
        let before = world.transform_point3(scene.object(id).unwrap().mesh().unwrap().positions[6]);

        scene.set_origin_to_volume_center(id).unwrap();

        let object = scene.object(id).unwrap();
        let mesh = object.mesh().unwrap();
        let center = mesh.volume_center().unwrap();
        assert!(center.abs_diff_eq(Vec3::ZERO, 1e-5), "{center}");
        let after = scene.world_matrix(id, 0).unwrap().transform_point3(mesh.positions[6]);
        assert!(before.abs_diff_eq(after, 1e-5));
    }

    #[test]
    fn test_remove_object_unparents_children() {
        let mut scene = InMemoryScene::new();
        let collection = scene.create_collection("Work");
        let rig = rig(&mut scene);
        let id = cube(&mut scene, "Cube");
        scene.link_object(collection, rig).unwrap();
        scene.parent_to_bone_keep_transform(id, rig, "Arm").unwrap();
        let before = scene.world_matrix(id, 0).unwrap();

        scene.remove_object(rig).unwrap();
        assert!(scene.object(rig).is_err());
        assert!(scene.collection(collection).unwrap().objects.is_empty());
        let after = scene.world_matrix(id, 0).unwrap();
        assert!(before.abs_diff_eq(after, 1e-5));
    }

    #[test]
    fn test_bake_visual_keys_and_clears_parents() {
        let mut scene = InMemoryScene::new();
        let rig = rig(&mut scene);
        let id = cube(&mut scene, "Cube");
        scene.set_pose_position(rig, PosePosition::Rest).unwrap();
        scene.parent_to_bone_keep_transform(id, rig, "Arm").unwrap();
        scene.set_pose_position(rig, PosePosition::Pose).unwrap();

        let expected: Vec<Mat4> = (0..=10)
            .map(|frame| scene.world_matrix(id, frame).unwrap())
            .collect();

        scene
            .bake_transforms(&BakeRequest {
                objects: vec![id],
                frame_start: 0,
                frame_end: 10,
                visual_keying: true,
                clear_constraints: true,
                clear_parents: true,
            })
            .unwrap();

        let object = scene.object(id).unwrap();
        assert!(object.parent.is_none());
        assert_eq!(object.animation.as_ref().unwrap().keys.len(), 11);
        for (frame, matrix) in expected.iter().enumerate() {
            let baked = scene.world_matrix(id, frame as i32).unwrap();
            assert!(baked.abs_diff_eq(*matrix, 1e-4), "frame {frame}");
        }
    }

    #[test]
    fn test_bake_rejects_inverted_range() {
        let mut scene = InMemoryScene::new();
        let id = cube(&mut scene, "Cube");
        let result = scene.bake_transforms(&BakeRequest {
            objects: vec![id],
            frame_start: 5,
            frame_end: 1,
            visual_keying: true,
            clear_constraints: true,
            clear_parents: true,
        });
        assert_eq!(result, Err(SceneError::InvalidFrameRange { start: 5, end: 1 }));
        assert!(scene.object(id).unwrap().animation.is_none());
    }
}
