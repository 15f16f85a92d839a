//! Conversion session: settings, preparation state machine and bake stage
//!
//! A [`Session`] drives the three host commands. Preparation copies the
//! skinned meshes of the source collection into a working collection, splits
//! them per vertex group, strips skinning and parents the pieces to their
//! bones. Baking turns the bone-driven motion into object keyframes.

use std::fmt;

use tracing::{debug, info, warn};

use crate::binder::{BindReport, bind_to_bones};
use crate::error::SolidError;
use crate::materialize::create_working_collection;
use crate::partition::{partition_by_vertex_groups, separate_object};
use crate::scene::{
    BakeRequest, CollectionId, ObjectId, PosePosition, SceneAdapter, SceneError,
};
use crate::weights::build_weight_table;

pub const DEFAULT_FRAME_START: i32 = 0;
pub const DEFAULT_FRAME_END: i32 = 250;
pub const DEFAULT_NAME_SUFFIX: &str = "_Solid";
pub const DEFAULT_WEIGHT_THRESHOLD: f32 = 0.3;

/// Tunable parameters of a session
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub bake_frame_start: i32,
    pub bake_frame_end: i32,
    pub name_suffix: String,
    pub weight_threshold: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bake_frame_start: DEFAULT_FRAME_START,
            bake_frame_end: DEFAULT_FRAME_END,
            name_suffix: DEFAULT_NAME_SUFFIX.to_string(),
            weight_threshold: DEFAULT_WEIGHT_THRESHOLD,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), SolidError> {
        if self.bake_frame_start < 0 {
            return Err(SolidError::configuration(format!(
                "bake frame start must be >= 0, got {}",
                self.bake_frame_start
            )));
        }
        if self.bake_frame_end < 1 {
            return Err(SolidError::configuration(format!(
                "bake frame end must be >= 1, got {}",
                self.bake_frame_end
            )));
        }
        if self.bake_frame_start > self.bake_frame_end {
            return Err(SolidError::configuration(format!(
                "bake frame start {} is after frame end {}",
                self.bake_frame_start, self.bake_frame_end
            )));
        }
        if !self.weight_threshold.is_finite() || !(0.0..=1.0).contains(&self.weight_threshold) {
            return Err(SolidError::configuration(format!(
                "weight threshold must be within [0, 1], got {}",
                self.weight_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrepareState {
    #[default]
    Unprepared,
    Preparing,
    Prepared,
}

/// Outcome of a host command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    Ok,
    Error(String),
}

impl CommandStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, CommandStatus::Ok)
    }
}

impl<T> From<Result<T, SolidError>> for CommandStatus {
    fn from(result: Result<T, SolidError>) -> Self {
        match result {
            Ok(_) => CommandStatus::Ok,
            Err(e) => CommandStatus::Error(e.to_string()),
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandStatus::Ok => write!(f, "OK"),
            CommandStatus::Error(message) => write!(f, "ERROR({message})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareReport {
    pub working_collection: CollectionId,
    /// Objects left in the working collection
    pub objects: Vec<ObjectId>,
    pub bound: Vec<ObjectId>,
    pub unbound: Vec<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BakeReport {
    pub objects: Vec<ObjectId>,
    pub frame_start: i32,
    pub frame_end: i32,
}

#[derive(Debug, Default)]
pub struct Session {
    pub settings: Settings,
    source_collection: Option<CollectionId>,
    rig: Option<ObjectId>,
    working_collection: Option<CollectionId>,
    state: PrepareState,
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn state(&self) -> PrepareState {
        self.state
    }

    pub fn is_prepared(&self) -> bool {
        self.state == PrepareState::Prepared
    }

    pub fn source_collection(&self) -> Option<CollectionId> {
        self.source_collection
    }

    pub fn rig(&self) -> Option<ObjectId> {
        self.rig
    }

    pub fn working_collection(&self) -> Option<CollectionId> {
        self.working_collection
    }

    /// Change the source collection. Any prepared working set becomes stale.
    pub fn set_source_collection(&mut self, collection: Option<CollectionId>) {
        self.source_collection = collection;
        self.invalidate();
    }

    /// Change the rig. Any prepared working set becomes stale.
    pub fn set_rig(&mut self, rig: Option<ObjectId>) {
        self.rig = rig;
        self.invalidate();
    }

    fn invalidate(&mut self) {
        if self.state != PrepareState::Unprepared {
            debug!("Session references changed, working set invalidated");
        }
        self.state = PrepareState::Unprepared;
    }

    fn ensure_idle(&self) -> Result<(), SolidError> {
        if self.state == PrepareState::Preparing {
            return Err(SolidError::Busy);
        }
        Ok(())
    }

    fn configured(&self) -> Result<(CollectionId, ObjectId), SolidError> {
        match (self.source_collection, self.rig) {
            (Some(source), Some(rig)) => Ok((source, rig)),
            (None, _) => Err(SolidError::configuration("no source collection set")),
            (_, None) => Err(SolidError::configuration("no rig set")),
        }
    }

    /// Split a single object by its vertex groups inside the working collection.
    ///
    /// A non-mesh object is skipped with a warning and yields no objects.
    pub fn try_separate_by_vertex_groups<S: SceneAdapter + ?Sized>(
        &mut self,
        scene: &mut S,
        object: ObjectId,
    ) -> Result<Vec<ObjectId>, SolidError> {
        self.ensure_idle()?;
        self.configured()?;
        self.settings.validate()?;
        let collection = self.working_collection.ok_or_else(|| {
            SolidError::precondition("no working collection, prepare objects first")
        })?;

        match separate_object(
            scene,
            collection,
            object,
            self.settings.weight_threshold,
            &self.settings.name_suffix,
        ) {
            Err(e @ SolidError::TypeMismatch { .. }) => {
                warn!("Skipping separation: {}", e);
                Ok(Vec::new())
            }
            result => result,
        }
    }

    pub fn try_prepare_objects<S: SceneAdapter + ?Sized>(
        &mut self,
        scene: &mut S,
    ) -> Result<PrepareReport, SolidError> {
        self.ensure_idle()?;
        let (source, rig) = self.configured()?;
        self.settings.validate()?;

        self.state = PrepareState::Preparing;
        match self.prepare(scene, source, rig) {
            Ok(report) => {
                self.working_collection = Some(report.working_collection);
                self.state = PrepareState::Prepared;
                info!(
                    "Prepared {} objects ({} bound, {} unbound)",
                    report.objects.len(),
                    report.bound.len(),
                    report.unbound.len()
                );
                Ok(report)
            }
            Err(e) => {
                self.state = PrepareState::Unprepared;
                Err(e)
            }
        }
    }

    fn prepare<S: SceneAdapter + ?Sized>(
        &mut self,
        scene: &mut S,
        source: CollectionId,
        rig: ObjectId,
    ) -> Result<PrepareReport, SolidError> {
        self.discard_working_collection(scene)?;

        let suffix = self.settings.name_suffix.clone();
        let threshold = self.settings.weight_threshold;
        let working = create_working_collection(scene, source, rig, &suffix)?;
        // Recorded early so a failed run can still be cleaned up by the next one
        self.working_collection = Some(working.collection);

        for id in working.objects {
            let object = scene.object(id)?;
            let Some(mesh) = object.mesh() else {
                continue;
            };
            if object.vertex_groups.len() <= 1 {
                continue;
            }
            let table = build_weight_table(mesh);
            partition_by_vertex_groups(scene, working.collection, id, &table, threshold, &suffix)?;
        }

        match scene.set_pose_position(rig, PosePosition::Rest) {
            Err(SceneError::WrongKind { name, found, .. }) => {
                warn!("Rig '{}' is a {}, cannot switch it to rest pose", name, found);
            }
            result => result?,
        }

        let bound = strip_and_bind(scene, working.collection, rig);

        if scene.object(rig)?.armature().is_some() {
            scene.set_pose_position(rig, PosePosition::Pose)?;
        }
        let (members, binding) = bound?;

        Ok(PrepareReport {
            working_collection: working.collection,
            objects: members,
            bound: binding.bound,
            unbound: binding.unbound,
        })
    }

    /// Remove the working collection of a previous run together with its objects
    fn discard_working_collection<S: SceneAdapter + ?Sized>(
        &mut self,
        scene: &mut S,
    ) -> Result<(), SolidError> {
        let Some(previous) = self.working_collection.take() else {
            return Ok(());
        };
        let objects = match scene.collection(previous) {
            Ok(collection) => collection.objects.clone(),
            Err(SceneError::UnknownCollection(_)) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        for id in objects {
            match scene.remove_object(id) {
                Ok(()) | Err(SceneError::UnknownObject(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        scene.remove_collection(previous)?;
        debug!("Discarded previous working collection");
        Ok(())
    }

    pub fn try_bake_animation<S: SceneAdapter + ?Sized>(
        &mut self,
        scene: &mut S,
    ) -> Result<BakeReport, SolidError> {
        self.ensure_idle()?;
        self.configured()?;
        if self.state != PrepareState::Prepared {
            return Err(SolidError::precondition("objects are not prepared"));
        }
        self.settings.validate()?;
        let collection = self
            .working_collection
            .ok_or_else(|| SolidError::precondition("no working collection"))?;

        let objects: Vec<ObjectId> = scene
            .collection(collection)?
            .objects
            .iter()
            .copied()
            .filter(|id| scene.object(*id).is_ok_and(|o| o.is_mesh()))
            .collect();

        let request = BakeRequest {
            objects: objects.clone(),
            frame_start: self.settings.bake_frame_start,
            frame_end: self.settings.bake_frame_end,
            visual_keying: true,
            clear_constraints: true,
            clear_parents: true,
        };
        scene.bake_transforms(&request)?;

        info!(
            "Baked {} objects over frames {}..={}",
            objects.len(),
            request.frame_start,
            request.frame_end
        );
        Ok(BakeReport {
            objects,
            frame_start: request.frame_start,
            frame_end: request.frame_end,
        })
    }

    /// Use the keyed range of the rig's action as bake range.
    ///
    /// Returns false (leaving the settings alone) when the rig has no keyed action.
    pub fn fit_frame_range_to_action<S: SceneAdapter + ?Sized>(
        &mut self,
        scene: &S,
    ) -> Result<bool, SolidError> {
        let (_, rig) = self.configured()?;
        let range = scene
            .object(rig)?
            .armature()
            .and_then(|armature| armature.action.as_ref())
            .and_then(|action| action.frame_range());
        let Some((start, end)) = range else {
            return Ok(false);
        };

        self.settings.bake_frame_start = start.floor().max(0.0) as i32;
        self.settings.bake_frame_end = (end.ceil() as i32).max(self.settings.bake_frame_start).max(1);
        debug!(
            "Bake range fitted to action: {}..={}",
            self.settings.bake_frame_start, self.settings.bake_frame_end
        );
        Ok(true)
    }

    pub fn separate_by_vertex_groups<S: SceneAdapter + ?Sized>(
        &mut self,
        scene: &mut S,
        object: ObjectId,
    ) -> CommandStatus {
        report("separate", self.try_separate_by_vertex_groups(scene, object))
    }

    pub fn prepare_objects<S: SceneAdapter + ?Sized>(&mut self, scene: &mut S) -> CommandStatus {
        report("prepare", self.try_prepare_objects(scene))
    }

    pub fn bake_animation<S: SceneAdapter + ?Sized>(&mut self, scene: &mut S) -> CommandStatus {
        report("bake", self.try_bake_animation(scene))
    }
}

fn report<T>(command: &str, result: Result<T, SolidError>) -> CommandStatus {
    if let Err(e) = &result {
        warn!("{} failed: {}", command, e);
    }
    result.into()
}

/// Drop armature modifiers, recenter mesh origins and bind the working objects.
///
/// Expects the rig in rest pose; the caller restores the pose afterwards
/// whether or not this succeeds.
fn strip_and_bind<S: SceneAdapter + ?Sized>(
    scene: &mut S,
    collection: CollectionId,
    rig: ObjectId,
) -> Result<(Vec<ObjectId>, BindReport), SolidError> {
    let members = scene.collection(collection)?.objects.clone();
    for &id in &members {
        let armature_modifiers: Vec<usize> = scene
            .object(id)?
            .modifiers
            .iter()
            .enumerate()
            .filter(|(_, modifier)| modifier.is_armature())
            .map(|(index, _)| index)
            .collect();
        for index in armature_modifiers.into_iter().rev() {
            scene.remove_modifier(id, index)?;
        }
    }

    for &id in &members {
        if scene.object(id)?.is_mesh() {
            scene.set_origin_to_volume_center(id)?;
        }
    }

    let binding = bind_to_bones(scene, collection, rig)?;
    Ok((members, binding))
}
