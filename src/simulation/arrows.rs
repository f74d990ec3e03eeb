//! Rotating arrows and orbit circles.
//!
//! Arrow space maps path space `[0,1]²` (y down) to `(p − 0.5)·1.8` with y
//! flipped up, then the aspect matrix squeezes it into clip space.

use std::f32::consts::TAU;

use glam::{Mat3, Vec2, Vec3};

use crate::complex::Complex;
use crate::fourier::RotationTerm;
use crate::gpu::backend::{ArrowInstance, OrbitCircle};

/// Path space → arrow space scale
pub const ARROW_SPREAD: f32 = 1.8;

const CENTER: Complex = Complex::new(0.5, 0.5);

/// Keeps arrow space square on a non-square canvas
pub fn aspect_matrix(aspect_ratio: f32) -> Mat3 {
    if aspect_ratio > 1.0 {
        Mat3::from_scale(Vec2::new(1.0 / aspect_ratio, 1.0))
    } else {
        Mat3::from_scale(Vec2::new(1.0, aspect_ratio))
    }
}

/// Path-space point in arrow space
fn to_arrow_space(p: Complex) -> Vec2 {
    let q = (p - CENTER).scale(ARROW_SPREAD);
    Vec2::new(q.real, -q.imag)
}

/// Arrow `i` at `t = 0`: a rotation-and-scale taking the unit +x arrow to its
/// vector, without translation.
fn initial_condition(vector: Complex) -> Mat3 {
    Mat3::from_cols(
        Vec3::new(vector.real, -vector.imag, 0.0),
        Vec3::new(vector.imag, vector.real, 0.0),
        Vec3::Z,
    )
}

/// Per-coefficient data fixed between recomputes
#[derive(Debug, Clone)]
pub struct ArrowGeometry {
    aspect: Mat3,
    initial_conditions: Vec<Mat3>,
    radii: Vec<f32>,
    /// On-screen frequency of each term (negated for the y flip)
    screen_frequencies: Vec<f32>,
}

impl ArrowGeometry {
    pub fn new(terms: &[RotationTerm], aspect_ratio: f32) -> Self {
        let vectors: Vec<Complex> = terms
            .iter()
            .enumerate()
            .map(|(i, term)| {
                if i == 0 {
                    (term.coefficient - CENTER).scale(ARROW_SPREAD)
                } else {
                    term.coefficient.scale(ARROW_SPREAD)
                }
            })
            .collect();

        Self {
            aspect: aspect_matrix(aspect_ratio),
            initial_conditions: vectors.iter().copied().map(initial_condition).collect(),
            radii: vectors.iter().map(|v| v.magnitude()).collect(),
            screen_frequencies: terms.iter().map(|term| -(term.frequency as f32)).collect(),
        }
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect = aspect_matrix(aspect_ratio);
    }

    pub fn len(&self) -> usize {
        self.initial_conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.initial_conditions.is_empty()
    }

    pub fn radius(&self, index: usize) -> Option<f32> {
        self.radii.get(index).copied()
    }

    /// Arrows drawn for `used` harmonics: DC plus `used`, capped by `max` and
    /// the number of terms.
    pub fn arrow_count(&self, used: usize, max: usize) -> usize {
        used.saturating_add(1).min(max).min(self.len())
    }

    /// Instance data for the arrows at time `t`.
    ///
    /// # Arguments
    /// * `positions` - Partial sums at `t`; arrow `i` starts at `positions[i − 1]`
    /// * `t` - Elapsed fraction of the period
    /// * `count` - Arrows to emit, from [`ArrowGeometry::arrow_count`]
    pub fn arrows(&self, positions: &[Complex], t: f32, count: usize) -> Vec<ArrowInstance> {
        let count = count.min(self.len()).min(positions.len() + 1);
        (0..count)
            .map(|i| {
                let tail = if i == 0 { CENTER } else { positions[i - 1] };
                let mut placed = self.initial_conditions[i];
                placed.z_axis = to_arrow_space(tail).extend(1.0);
                let rotation = Mat3::from_angle(TAU * self.screen_frequencies[i] * t);
                ArrowInstance {
                    transform: (self.aspect * placed * rotation).to_cols_array_2d(),
                    shaft_scale: self.radii[i],
                }
            })
            .collect()
    }

    /// Orbit circles traced by the first `count` arrow tips
    pub fn orbits(&self, positions: &[Complex], count: usize) -> Vec<OrbitCircle> {
        let count = count.min(self.len()).min(positions.len() + 1);
        (0..count)
            .map(|k| {
                let center = if k == 0 { CENTER } else { positions[k - 1] };
                OrbitCircle {
                    center: [center.real, center.imag],
                    radius: self.radii[k],
                }
            })
            .collect()
    }
}
