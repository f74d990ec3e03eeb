//! Rotation terms and partial Fourier sums.

use crate::complex::Complex;

/// One harmonic of the series: `coefficient · e^(i·2π·frequency·t)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationTerm {
    pub coefficient: Complex,
    pub frequency: i32,
}

impl RotationTerm {
    pub fn evaluate(&self, t: f32) -> Complex {
        self.coefficient * Complex::euler(self.frequency as f32, t)
    }
}

/// Signed frequency at a position of the interleaved coefficient sequence:
/// 0 → DC, odd `i` → `+(i+1)/2`, even `i` → `−i/2`.
pub fn signed_frequency(index: usize) -> i32 {
    if index == 0 {
        0
    } else if index % 2 == 1 {
        ((index + 1) / 2) as i32
    } else {
        -((index / 2) as i32)
    }
}

/// Terms for an interleaved coefficient sequence
pub fn rotation_terms(coefficients: &[Complex]) -> Vec<RotationTerm> {
    coefficients
        .iter()
        .enumerate()
        .map(|(i, &coefficient)| RotationTerm {
            coefficient,
            frequency: signed_frequency(i),
        })
        .collect()
}

/// Running sums: entry `k` is the sum of terms `0..=k` at time `t`
pub fn partial_sums(terms: &[RotationTerm], t: f32) -> Vec<Complex> {
    let mut sum = Complex::ZERO;
    terms
        .iter()
        .map(|term| {
            sum += term.evaluate(t);
            sum
        })
        .collect()
}

/// Series truncated to the DC term plus `used` harmonics
pub fn approximation(terms: &[RotationTerm], used: usize, t: f32) -> Complex {
    terms
        .iter()
        .take(used.saturating_add(1))
        .fold(Complex::ZERO, |acc, term| acc + term.evaluate(t))
}

/// Index into [`partial_sums`] for the live trace
pub fn trace_index(term_count: usize, used: usize) -> usize {
    used.min(term_count.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_frequency_order() {
        let order: Vec<i32> = (0..7).map(signed_frequency).collect();
        assert_eq!(order, vec![0, 1, -1, 2, -2, 3, -3]);
    }

    #[test]
    fn test_term_evaluation() {
        let term = RotationTerm {
            coefficient: Complex::new(2.0, 0.0),
            frequency: -1,
        };
        let value = term.evaluate(0.25);
        assert!(value.real.abs() < 1e-6);
        assert!((value.imag + 2.0).abs() < 1e-6, "−1 Hz turns clockwise");
    }

    #[test]
    fn test_partial_sums_accumulate() {
        let terms = rotation_terms(&[
            Complex::new(0.5, 0.5),
            Complex::new(0.1, 0.0),
            Complex::new(0.0, 0.2),
        ]);
        let sums = partial_sums(&terms, 0.0);
        assert_eq!(sums.len(), 3);
        assert_eq!(sums[0], Complex::new(0.5, 0.5));
        assert!((sums[2].real - 0.6).abs() < 1e-6);
        assert!((sums[2].imag - 0.7).abs() < 1e-6);
        assert_eq!(approximation(&terms, 2, 0.0), sums[2]);
        assert_eq!(approximation(&terms, 1, 0.0), sums[1]);
        assert_eq!(approximation(&terms, 99, 0.0), sums[2]);
    }

    #[test]
    fn test_trace_index_bounded() {
        assert_eq!(trace_index(401, 100), 100);
        assert_eq!(trace_index(401, 4000), 400);
        assert_eq!(trace_index(0, 5), 0);
    }
}
