//! Closed-path sample data.
//!
//! Samples are points in the unit box `[0,1]²` with y pointing down, one
//! fixed-length sequence per shape. Built-in shapes are generated
//! procedurally; external data arrives as `{ "paths": [{ "x": .., "y": .. }] }`.

use std::collections::HashMap;
use std::f32::consts::{FRAC_PI_2, PI, TAU};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::complex::Complex;
use crate::error::PathError;
use crate::params::PathShape;

/// Fewest points that still describe a closed curve
pub const MIN_POINTS: usize = 3;

/// Fraction of the unit box left empty around a normalized shape
const PADDING: f32 = 0.05;

/// Segments used to flatten parametric curves before resampling
const CURVE_SEGMENTS: usize = 4096;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct PathPoint {
    x: f32,
    y: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct PathFile {
    paths: Vec<PathPoint>,
}

/// One closed curve sampled at evenly spaced parameter values
#[derive(Debug, Clone, PartialEq)]
pub struct PathSamples {
    points: Vec<Complex>,
}

impl PathSamples {
    pub fn new(points: Vec<Complex>) -> Result<Self, PathError> {
        if points.len() < MIN_POINTS {
            return Err(PathError::TooFewPoints {
                count: points.len(),
                min: MIN_POINTS,
            });
        }
        if let Some(index) = points
            .iter()
            .position(|p| !p.real.is_finite() || !p.imag.is_finite())
        {
            return Err(PathError::NonFinite { index });
        }
        Ok(Self { points })
    }

    pub fn from_json(json: &str) -> Result<Self, PathError> {
        let file: PathFile = serde_json::from_str(json)?;
        Self::new(
            file.paths
                .into_iter()
                .map(|p| Complex::new(p.x, p.y))
                .collect(),
        )
    }

    pub fn load(path: &Path) -> Result<Self, PathError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, PathError> {
        let file = PathFile {
            paths: self
                .points
                .iter()
                .map(|p| PathPoint {
                    x: p.real,
                    y: p.imag,
                })
                .collect(),
        };
        Ok(serde_json::to_string(&file)?)
    }

    pub fn points(&self) -> &[Complex] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Sample nearest to parametric time `t` in `[0,1)`
    pub fn at(&self, t: f32) -> Complex {
        let n = self.points.len();
        let index = ((t.rem_euclid(1.0) * n as f32) as usize).min(n - 1);
        self.points[index]
    }

    /// Every `len / count`-th sample, for stamping ghost overlays
    pub fn subsample(&self, count: usize) -> Vec<Complex> {
        let count = count.clamp(1, self.points.len());
        (0..count)
            .map(|i| self.at(i as f32 / count as f32))
            .collect()
    }

    /// Real (x) channel, one value per texel
    pub fn real_channel(&self) -> Vec<f32> {
        self.points.iter().map(|p| p.real).collect()
    }

    /// Imaginary (y) channel, one value per texel
    pub fn imag_channel(&self) -> Vec<f32> {
        self.points.iter().map(|p| p.imag).collect()
    }
}

/// Sample sets for every named shape
#[derive(Debug, Clone, Default)]
pub struct PathLibrary {
    paths: HashMap<PathShape, PathSamples>,
}

impl PathLibrary {
    /// Generate all built-in shapes with `sample_count` points each
    pub fn builtin(sample_count: usize) -> Self {
        let count = sample_count.max(MIN_POINTS);
        let paths = PathShape::ALL
            .iter()
            .map(|&shape| (shape, generate(shape, count)))
            .collect();
        Self { paths }
    }

    pub fn get(&self, shape: PathShape) -> Option<&PathSamples> {
        self.paths.get(&shape)
    }

    /// Replace the samples of one shape
    pub fn insert(&mut self, shape: PathShape, samples: PathSamples) {
        self.paths.insert(shape, samples);
    }
}

fn generate(shape: PathShape, count: usize) -> PathSamples {
    let outline = match shape {
        PathShape::Heart => flatten(|t| {
            let s = t.sin();
            Complex::new(
                16.0 * s * s * s,
                13.0 * t.cos() - 5.0 * (2.0 * t).cos() - 2.0 * (3.0 * t).cos() - (4.0 * t).cos(),
            )
        }, TAU),
        PathShape::Star => (0..10)
            .map(|k| {
                let radius = if k % 2 == 0 { 1.0 } else { 0.4 };
                let angle = FRAC_PI_2 + k as f32 * PI / 5.0;
                Complex::new(radius * angle.cos(), radius * angle.sin())
            })
            .collect(),
        PathShape::Square => vec![
            Complex::new(-1.0, -1.0),
            Complex::new(1.0, -1.0),
            Complex::new(1.0, 1.0),
            Complex::new(-1.0, 1.0),
        ],
        PathShape::Trefoil => flatten(|t| {
            let r = (3.0 * t).cos();
            Complex::new(r * t.cos(), r * t.sin())
        }, PI),
        PathShape::Infinity => flatten(|t| {
            let d = 1.0 + t.sin() * t.sin();
            Complex::new(t.cos() / d, t.sin() * t.cos() / d)
        }, TAU),
    };

    let points = normalize(resample_closed(&outline, count));
    PathSamples { points }
}

/// Flatten a parametric curve over `[0, period)` into a dense polyline
fn flatten(curve: impl Fn(f32) -> Complex, period: f32) -> Vec<Complex> {
    (0..CURVE_SEGMENTS)
        .map(|i| curve(period * i as f32 / CURVE_SEGMENTS as f32))
        .collect()
}

/// Resample a closed polyline at `count` points evenly spaced by arc length
pub fn resample_closed(outline: &[Complex], count: usize) -> Vec<Complex> {
    let n = outline.len();
    if n == 0 || count == 0 {
        return Vec::new();
    }

    let segment_lengths: Vec<f32> = (0..n)
        .map(|i| outline[i].distance(outline[(i + 1) % n]))
        .collect();
    let total: f32 = segment_lengths.iter().sum();
    if total <= f32::EPSILON {
        return vec![outline[0]; count];
    }

    let mut points = Vec::with_capacity(count);
    let mut segment = 0;
    let mut walked = 0.0;
    for k in 0..count {
        let target = total * k as f32 / count as f32;
        while segment < n - 1 && walked + segment_lengths[segment] < target {
            walked += segment_lengths[segment];
            segment += 1;
        }
        let length = segment_lengths[segment];
        let f = if length > 0.0 {
            ((target - walked) / length).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let a = outline[segment];
        let b = outline[(segment + 1) % n];
        points.push(a + (b - a).scale(f));
    }
    points
}

/// Fit into the padded unit box keeping proportions, flipping y to point down
fn normalize(points: Vec<Complex>) -> Vec<Complex> {
    let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
    let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
    for p in &points {
        min_x = min_x.min(p.real);
        max_x = max_x.max(p.real);
        min_y = min_y.min(p.imag);
        max_y = max_y.max(p.imag);
    }
    let extent = (max_x - min_x).max(max_y - min_y).max(f32::EPSILON);
    let scale = (1.0 - 2.0 * PADDING) / extent;
    let center = Complex::new((min_x + max_x) * 0.5, (min_y + max_y) * 0.5);

    points
        .into_iter()
        .map(|p| {
            let q = (p - center).scale(scale);
            Complex::new(0.5 + q.real, 0.5 - q.imag)
        })
        .collect()
}
