//! The running animation: trace layers, rotating arrows and the frame state machine.

pub mod arrows;
pub mod layers;
pub mod pipeline;

pub use arrows::{aspect_matrix, ArrowGeometry};
pub use layers::TraceLayers;
pub use pipeline::{
    advance_elapsed, AnimationPipeline, AnimationState, FrameReport, PipelineState,
    SimulationContext,
};
