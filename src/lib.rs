//! Epicycles library - Fourier-series path tracing on the GPU

pub mod cli;
pub mod complex;
pub mod controls;
pub mod error;
pub mod fourier;
pub mod gpu;
pub mod params;
pub mod paths;
pub mod simulation;
pub mod timing;
