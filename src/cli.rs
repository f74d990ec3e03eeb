//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::error::{ConfigError, PathError};
use crate::params::{PathShape, RenderConfig, SimulationConfig};
use crate::paths::{PathLibrary, PathSamples};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "Epicycles")]
#[command(about = "Traces closed paths with rotating Fourier epicycles", long_about = None)]
pub struct Args {
    /// Shape to trace: heart, star, square, trefoil, infinity
    #[arg(long, value_name = "SHAPE", default_value = "heart")]
    pub shape: PathShape,

    /// Quadrature steps per coefficient (300-3000)
    #[arg(long, value_name = "STEPS", default_value_t = 1000)]
    pub iterations: u32,

    /// Harmonics computed per sign (1-1024)
    #[arg(long, value_name = "COUNT", default_value_t = 200)]
    pub frequencies: u32,

    /// Rotation terms used for the live trace (1 to 2 x frequencies)
    #[arg(long, value_name = "COUNT", default_value_t = 100)]
    pub used_frequencies: u32,

    /// Seconds per loop (1-30)
    #[arg(long, value_name = "SECONDS", default_value_t = 10.0)]
    pub duration: f32,

    /// Start with the rotating arrows hidden
    #[arg(long)]
    pub no_arrows: bool,

    /// Start paused
    #[arg(long)]
    pub paused: bool,

    /// JSON samples `{ "paths": [{ "x", "y" }, ...] }` replacing the selected shape
    #[arg(long, value_name = "FILE")]
    pub path_file: Option<PathBuf>,

    /// Window width (pixels)
    #[arg(long, value_name = "PIXELS", default_value_t = 1280)]
    pub width: u32,

    /// Window height (pixels)
    #[arg(long, value_name = "PIXELS", default_value_t = 720)]
    pub height: u32,

    /// Shorter side of the trace layers (texels)
    #[arg(long, value_name = "TEXELS", default_value_t = 1024)]
    pub resolution: u32,

    /// Directory for PNG captures taken with the S key
    #[arg(long, value_name = "DIR")]
    pub capture_dir: Option<PathBuf>,
}

impl Args {
    /// Initial simulation configuration; out-of-range values are rejected
    pub fn simulation_config(&self) -> Result<SimulationConfig, ConfigError> {
        let config = SimulationConfig {
            active_path: self.shape,
            iteration_count: self.iterations,
            frequency_count: self.frequencies,
            used_frequency_count: self.used_frequencies,
            duration_s: self.duration,
            rotating_arrows: !self.no_arrows,
            paused: self.paused,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            window_width: self.width.max(1),
            window_height: self.height.max(1),
            display_resolution: self.resolution.max(1),
            capture_dir: self.capture_dir.clone(),
            ..RenderConfig::default()
        }
    }

    /// Built-in shapes, with `--path-file` replacing the selected one
    pub fn path_library(&self, sample_count: usize) -> Result<PathLibrary, PathError> {
        let mut library = PathLibrary::builtin(sample_count);
        if let Some(file) = &self.path_file {
            let samples = PathSamples::load(file)?;
            log::info!(
                "Loaded {} samples from {} as {}",
                samples.len(),
                file.display(),
                self.shape
            );
            library.insert(self.shape, samples);
        }
        Ok(library)
    }
}
