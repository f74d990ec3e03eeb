//! Parameter definitions with units and documented ranges.

mod render;
mod simulation;

pub use render::{RenderConfig, TraceStyle};
pub use simulation::{limits, PathShape, SimulationConfig};
