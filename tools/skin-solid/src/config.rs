//! Conversion config (skin-solid.toml)
//!
//! Every section and key is optional; missing values fall back to the
//! session defaults. Command-line flags are applied on top.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::session::{
    DEFAULT_FRAME_END, DEFAULT_FRAME_START, DEFAULT_NAME_SUFFIX, DEFAULT_WEIGHT_THRESHOLD, Settings,
};

pub const DEFAULT_FRAME_RATE: f32 = 24.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub partition: PartitionConfig,
    #[serde(default)]
    pub bake: BakeConfig,
}

/// Where the skinned meshes and their rig come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SourceConfig {
    /// Collection holding the skinned meshes (default: the imported scene)
    #[serde(default)]
    pub collection: Option<String>,
    /// Armature object name (default: the first imported rig)
    #[serde(default)]
    pub rig: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Minimum weight for a vertex to belong to a bone (default: 0.3)
    #[serde(default = "default_weight_threshold")]
    pub weight_threshold: f32,
    /// Appended once to every produced name (default: "_Solid")
    #[serde(default = "default_name_suffix")]
    pub name_suffix: String,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            weight_threshold: default_weight_threshold(),
            name_suffix: default_name_suffix(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BakeConfig {
    #[serde(default = "default_frame_start")]
    pub frame_start: i32,
    #[serde(default = "default_frame_end")]
    pub frame_end: i32,
    /// Frames per second used to convert between glTF seconds and frames
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f32,
    /// Replace the frame range with the keyed range of the animation
    #[serde(default)]
    pub fit_animation: bool,
    /// glTF animation index driving the rig (default: the first)
    #[serde(default)]
    pub animation: Option<usize>,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            frame_start: default_frame_start(),
            frame_end: default_frame_end(),
            frame_rate: default_frame_rate(),
            fit_animation: false,
            animation: None,
        }
    }
}

fn default_weight_threshold() -> f32 {
    DEFAULT_WEIGHT_THRESHOLD
}

fn default_name_suffix() -> String {
    DEFAULT_NAME_SUFFIX.to_string()
}

fn default_frame_start() -> i32 {
    DEFAULT_FRAME_START
}

fn default_frame_end() -> i32 {
    DEFAULT_FRAME_END
}

fn default_frame_rate() -> f32 {
    DEFAULT_FRAME_RATE
}

impl Config {
    /// Session settings described by this config
    pub fn settings(&self) -> Settings {
        Settings {
            bake_frame_start: self.bake.frame_start,
            bake_frame_end: self.bake.frame_end,
            name_suffix: self.partition.name_suffix.clone(),
            weight_threshold: self.partition.weight_threshold,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.settings().validate()?;
        if !self.bake.frame_rate.is_finite() || self.bake.frame_rate <= 0.0 {
            anyhow::bail!("frame rate must be positive, got {}", self.bake.frame_rate);
        }
        Ok(())
    }
}

pub fn parse_config(text: &str) -> Result<Config> {
    toml::from_str(text).context("Failed to parse config")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    parse_config(&text).with_context(|| format!("Invalid config: {}", path.display()))
}
