//! Simulation configuration shared between the controls and the pipeline.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Named closed shapes available for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathShape {
    Heart,
    Star,
    Square,
    Trefoil,
    Infinity,
}

impl PathShape {
    pub const ALL: [PathShape; 5] = [
        PathShape::Heart,
        PathShape::Star,
        PathShape::Square,
        PathShape::Trefoil,
        PathShape::Infinity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PathShape::Heart => "heart",
            PathShape::Star => "star",
            PathShape::Square => "square",
            PathShape::Trefoil => "trefoil",
            PathShape::Infinity => "infinity",
        }
    }

    /// Shape for a 0-based keyboard slot
    pub fn from_index(index: usize) -> Option<PathShape> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for PathShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PathShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|shape| shape.name() == lower)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|s| s.name()).collect();
                format!("unknown shape '{}', expected one of {}", s, names.join(", "))
            })
    }
}

/// Live simulation parameters, edited by the controls and read every frame.
///
/// `used_frequency_count <= 2 * frequency_count` holds after every setter.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Shape whose samples are decomposed
    pub active_path: PathShape,

    /// Quadrature steps per coefficient (300..=3000)
    pub iteration_count: u32,

    /// Harmonics computed per sign; the coefficient target is this + 1 texels wide
    pub frequency_count: u32,

    /// Rotation terms summed for the live trace (1..=2 × frequency_count)
    pub used_frequency_count: u32,

    /// Seconds per full traversal of the path (1..=30)
    pub duration_s: f32,

    /// Draw the rotating arrows and orbit circles
    pub rotating_arrows: bool,

    /// Freeze elapsed time (compositing continues)
    pub paused: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            active_path: PathShape::Heart,
            iteration_count: 1000,
            frequency_count: 200,
            used_frequency_count: 100,
            duration_s: 10.0,
            rotating_arrows: true,
            paused: false,
        }
    }
}

impl SimulationConfig {
    /// Restore every field to its default
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn set_iteration_count(&mut self, count: u32) {
        self.iteration_count = count.clamp(limits::MIN_ITERATIONS, limits::MAX_ITERATIONS);
    }

    /// Also re-clamps the used count so it stays within `2 × frequency_count`.
    pub fn set_frequency_count(&mut self, count: u32) {
        self.frequency_count = count.clamp(limits::MIN_FREQUENCIES, limits::MAX_FREQUENCIES);
        self.set_used_frequency_count(self.used_frequency_count);
    }

    pub fn set_used_frequency_count(&mut self, count: u32) {
        self.used_frequency_count = count.clamp(1, self.max_used_frequency_count());
    }

    pub fn set_duration_s(&mut self, seconds: f32) {
        self.duration_s = seconds.clamp(limits::MIN_DURATION_S, limits::MAX_DURATION_S);
    }

    /// Number of rotation terms the coefficient engine produces
    pub fn coefficient_count(&self) -> usize {
        2 * self.frequency_count as usize + 1
    }

    pub fn max_used_frequency_count(&self) -> u32 {
        2 * self.frequency_count
    }

    /// Check every field against its documented range
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "iteration_count",
            self.iteration_count as f32,
            limits::MIN_ITERATIONS as f32,
            limits::MAX_ITERATIONS as f32,
        )?;
        check_range(
            "frequency_count",
            self.frequency_count as f32,
            limits::MIN_FREQUENCIES as f32,
            limits::MAX_FREQUENCIES as f32,
        )?;
        check_range(
            "used_frequency_count",
            self.used_frequency_count as f32,
            1.0,
            self.max_used_frequency_count() as f32,
        )?;
        check_range(
            "duration_s",
            self.duration_s,
            limits::MIN_DURATION_S,
            limits::MAX_DURATION_S,
        )?;
        Ok(())
    }
}

fn check_range(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

/// Documented parameter ranges
pub mod limits {
    pub const MIN_ITERATIONS: u32 = 300;
    pub const MAX_ITERATIONS: u32 = 3000;

    pub const MIN_FREQUENCIES: u32 = 1;
    /// Bounded by the coefficient target width
    pub const MAX_FREQUENCIES: u32 = 1024;

    pub const MIN_DURATION_S: f32 = 1.0;
    pub const MAX_DURATION_S: f32 = 30.0;
}
