//! skin-solid library
//!
//! Turns skinned (armature-deformed) meshes into rigid per-bone objects with
//! baked transform animation. The pipeline runs against the [`scene::SceneAdapter`]
//! trait; [`scene::InMemoryScene`] backs it for glTF files.

pub mod binder;
pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod import;
pub mod materialize;
pub mod partition;
pub mod scene;
pub mod session;
pub mod weights;

pub use config::{Config, load_config};
pub use convert::{ConvertSummary, MeshReport, convert_file, inspect_file};
pub use error::SolidError;
pub use session::{CommandStatus, PrepareState, Session, Settings};
