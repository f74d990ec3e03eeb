//! Complex numbers for the frequency-domain math.

use std::f32::consts::TAU;
use std::ops::{Add, AddAssign, Mul, Sub};

/// Immutable complex value `real + i·imag`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex {
    pub real: f32,
    pub imag: f32,
}

impl Complex {
    pub const ZERO: Complex = Complex::new(0.0, 0.0);

    pub const fn new(real: f32, imag: f32) -> Self {
        Self { real, imag }
    }

    /// `e^(i·2π·frequency·t)`
    ///
    /// The phase is reduced to one turn before the trig call so large
    /// `frequency·t` products keep full f32 precision.
    pub fn euler(frequency: f32, t: f32) -> Self {
        let theta = TAU * (frequency * t).rem_euclid(1.0);
        Self::new(theta.cos(), theta.sin())
    }

    pub fn magnitude(self) -> f32 {
        self.real.hypot(self.imag)
    }

    pub fn conjugate(self) -> Self {
        Self::new(self.real, -self.imag)
    }

    pub fn scale(self, factor: f32) -> Self {
        Self::new(self.real * factor, self.imag * factor)
    }

    pub fn distance(self, other: Complex) -> f32 {
        (self - other).magnitude()
    }
}

impl Add for Complex {
    type Output = Complex;

    fn add(self, rhs: Complex) -> Complex {
        Complex::new(self.real + rhs.real, self.imag + rhs.imag)
    }
}

impl AddAssign for Complex {
    fn add_assign(&mut self, rhs: Complex) {
        self.real += rhs.real;
        self.imag += rhs.imag;
    }
}

impl Sub for Complex {
    type Output = Complex;

    fn sub(self, rhs: Complex) -> Complex {
        Complex::new(self.real - rhs.real, self.imag - rhs.imag)
    }
}

impl Mul for Complex {
    type Output = Complex;

    fn mul(self, rhs: Complex) -> Complex {
        Complex::new(
            self.real * rhs.real - self.imag * rhs.imag,
            self.real * rhs.imag + self.imag * rhs.real,
        )
    }
}

impl From<(f32, f32)> for Complex {
    fn from((real, imag): (f32, f32)) -> Self {
        Self::new(real, imag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiplication_rotates() {
        let i = Complex::new(0.0, 1.0);
        let product = i * i;
        assert!((product.real + 1.0).abs() < 1e-6, "i·i should be -1");
        assert!(product.imag.abs() < 1e-6);
    }

    #[test]
    fn test_euler_quarter_turn() {
        let e = Complex::euler(1.0, 0.25);
        assert!(e.real.abs() < 1e-6);
        assert!((e.imag - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_euler_negative_frequency_is_conjugate() {
        let pos = Complex::euler(3.0, 0.1);
        let neg = Complex::euler(-3.0, 0.1);
        assert!((pos.conjugate().real - neg.real).abs() < 1e-6);
        assert!((pos.conjugate().imag - neg.imag).abs() < 1e-6);
    }

    #[test]
    fn test_euler_large_phase_stays_on_unit_circle() {
        let e = Complex::euler(200.0, 0.999);
        assert!((e.magnitude() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_magnitude() {
        assert_eq!(Complex::new(3.0, 4.0).magnitude(), 5.0);
    }
}
