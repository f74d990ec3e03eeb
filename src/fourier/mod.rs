//! Fourier series of a closed path: GPU coefficient reduction and the
//! rotating terms evaluated on the CPU each frame.

pub mod engine;
pub mod rotation;

pub use engine::{decode_row, interleave, FourierCoefficientEngine, PathTextures};
pub use rotation::{
    approximation, partial_sums, rotation_terms, signed_frequency, trace_index, RotationTerm,
};
