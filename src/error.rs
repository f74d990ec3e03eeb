//! Error taxonomy for the simulation.
//!
//! Shader failures are fatal packaging defects. An unsupported platform is
//! reported separately so the caller can show a notice instead of crashing.

use thiserror::Error;

/// Shader compilation and reflection failures
#[derive(Error, Debug)]
pub enum ShaderError {
    #[error("Shader compile error ({label}):\n{diagnostic}")]
    Parse { label: String, diagnostic: String },
    #[error("Shader validation error ({label}):\n{diagnostic}")]
    Validation { label: String, diagnostic: String },
    #[error("Program link error ({label}): {diagnostic}")]
    Link { label: String, diagnostic: String },
    #[error("Program {label} has no uniform named '{name}'")]
    MissingUniform { label: String, name: String },
    #[error("Program {label} has no attribute named '{name}'")]
    MissingAttribute { label: String, name: String },
}

/// Simulation configuration out of range
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be in {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
}

/// Path sample data errors
#[derive(Error, Debug)]
pub enum PathError {
    #[error("Path JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Path file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Path needs at least {min} points, got {count}")]
    TooFewPoints { count: usize, min: usize },
    #[error("Path point {index} is not finite")]
    NonFinite { index: usize },
}

/// Top-level simulation errors
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("GPU float render targets unsupported: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error("Surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("Frame capture failed: {0}")]
    Capture(String),
}
