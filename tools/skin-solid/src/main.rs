//! skin-solid - skinned mesh to rigid object converter
//!
//! Splits skinned glTF meshes into one rigid object per bone and bakes the
//! bone motion into object transform animation.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use skin_solid::{Config, convert_file, inspect_file, load_config};

#[derive(Parser)]
#[command(name = "skin-solid")]
#[command(about = "Convert skinned mesh animation into per-bone rigid animation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split, bind and bake a skinned glTF into a rigid GLB
    Convert {
        /// Input glTF/GLB file
        input: PathBuf,

        /// Output GLB file (default: <input>_solid.glb)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Path to skin-solid.toml
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Minimum weight for a vertex to follow a bone
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Suffix appended to produced names
        #[arg(short, long)]
        suffix: Option<String>,

        /// First baked frame
        #[arg(long)]
        frame_start: Option<i32>,

        /// Last baked frame
        #[arg(long)]
        frame_end: Option<i32>,

        /// Frames per second (default: 24)
        #[arg(short, long)]
        frame_rate: Option<f32>,

        /// Animation index (default: first animation)
        #[arg(short, long)]
        animation: Option<usize>,

        /// Bake over the keyed range of the animation
        #[arg(long)]
        fit_animation: bool,
    },

    /// Show how the skinned meshes would be partitioned
    Inspect {
        /// Input glTF/GLB file
        input: PathBuf,

        /// Minimum weight for a vertex to follow a bone
        #[arg(short, long, default_value_t = skin_solid::session::DEFAULT_WEIGHT_THRESHOLD)]
        threshold: f32,
    },

    /// Validate a config file
    Check {
        /// Path to skin-solid.toml
        #[arg(default_value = "skin-solid.toml")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            input,
            output,
            config,
            threshold,
            suffix,
            frame_start,
            frame_end,
            frame_rate,
            animation,
            fit_animation,
        } => {
            let mut config = match config {
                Some(path) => load_config(&path)?,
                None => Config::default(),
            };
            if let Some(threshold) = threshold {
                config.partition.weight_threshold = threshold;
            }
            if let Some(suffix) = suffix {
                config.partition.name_suffix = suffix;
            }
            if let Some(frame_start) = frame_start {
                config.bake.frame_start = frame_start;
            }
            if let Some(frame_end) = frame_end {
                config.bake.frame_end = frame_end;
            }
            if let Some(frame_rate) = frame_rate {
                config.bake.frame_rate = frame_rate;
            }
            if animation.is_some() {
                config.bake.animation = animation;
            }
            config.bake.fit_animation |= fit_animation;

            let output = output.unwrap_or_else(|| default_output(&input));
            let summary = convert_file(&input, &output, &config)?;

            println!(
                "Baked frames {}..={} into {}",
                summary.frame_start,
                summary.frame_end,
                output.display()
            );
            for name in &summary.objects {
                println!("  {}", name);
            }
            if summary.unbound > 0 {
                println!("  ({} objects left unbound)", summary.unbound);
            }
        }

        Commands::Inspect { input, threshold } => {
            let reports = inspect_file(&input, threshold)?;
            if reports.is_empty() {
                println!("No skinned meshes in {}", input.display());
            }
            for report in reports {
                println!("{} ({} vertices)", report.name, report.vertex_count);
                for group in &report.groups {
                    println!("  {}: {} vertices", group.name, group.kept);
                }
                println!("  unassigned: {} vertices", report.unassigned);
            }
        }

        Commands::Check { config } => {
            let parsed = load_config(&config)?;
            parsed.validate()?;
            println!("Config OK: {}", config.display());
        }
    }

    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{stem}_solid.glb"))
}
