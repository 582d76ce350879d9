//! Small IIR filter in direct form I.
//!
//! The receiver uses this for the 75 microsecond FM de-emphasis stage, a
//! first-order filter, but the implementation accepts any small order:
//!
//! ```text
//! y[n] = b0*x[n] + b1*x[n-1] + ... - a1*y[n-1] - a2*y[n-2] - ...
//! ```
//!
//! Coefficients are normalized by `a0` at construction.

use alloc::vec;
use alloc::vec::Vec;

/// Direct-form I IIR filter over f32 samples.
///
/// # Example
///
/// ```rust
/// use ondas_dsp::IirFilter;
///
/// // 75 us de-emphasis at 256 kS/s; unity DC gain.
/// let mut deemphasis = IirFilter::new(&[0.0253863, 0.0253863], &[1.0, -0.9492274]);
/// let mut y = 0.0;
/// for _ in 0..10_000 {
///     y = deemphasis.process(1.0);
/// }
/// assert!((y - 1.0).abs() < 1e-3);
/// ```
#[derive(Debug, Clone)]
pub struct IirFilter {
    /// Feedforward coefficients, normalized by a0.
    b: Vec<f32>,
    /// Feedback coefficients a1.., normalized by a0 (a0 itself dropped).
    a: Vec<f32>,
    /// Input delay line: x[n-1], x[n-2], ...
    x: Vec<f32>,
    /// Output delay line: y[n-1], y[n-2], ...
    y: Vec<f32>,
}

impl IirFilter {
    /// Create a filter from numerator and denominator coefficient arrays.
    ///
    /// `denominator[0]` is `a0`; all coefficients are divided by it.
    ///
    /// # Panics
    ///
    /// When the numerator is empty, the denominator is empty, or `a0` is
    /// zero.
    pub fn new(numerator: &[f32], denominator: &[f32]) -> Self {
        assert!(!numerator.is_empty(), "numerator needs at least b0");
        assert!(!denominator.is_empty(), "denominator needs at least a0");
        let a0 = denominator[0];
        assert!(a0 != 0.0, "a0 must be non-zero");

        let a0_inv = 1.0 / a0;
        Self {
            b: numerator.iter().map(|&b| b * a0_inv).collect(),
            a: denominator[1..].iter().map(|&a| a * a0_inv).collect(),
            x: vec![0.0; numerator.len().saturating_sub(1)],
            y: vec![0.0; denominator.len() - 1],
        }
    }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let mut output = self.b[0] * input;
        for (k, &b) in self.b.iter().enumerate().skip(1) {
            output += b * self.x[k - 1];
        }
        for (k, &a) in self.a.iter().enumerate() {
            output -= a * self.y[k];
        }

        // Shift the delay lines, newest first.
        for k in (1..self.x.len()).rev() {
            self.x[k] = self.x[k - 1];
        }
        if let Some(first) = self.x.first_mut() {
            *first = input;
        }
        for k in (1..self.y.len()).rev() {
            self.y[k] = self.y[k - 1];
        }
        if let Some(first) = self.y.first_mut() {
            *first = output;
        }

        output
    }

    /// Clear the delay lines without touching the coefficients.
    pub fn reset(&mut self) {
        self.x.fill(0.0);
        self.y.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough() {
        let mut filter = IirFilter::new(&[1.0], &[1.0]);
        for i in 0..10 {
            let x = i as f32 * 0.1;
            assert!((filter.process(x) - x).abs() < 1e-6);
        }
    }

    #[test]
    fn test_a0_normalization() {
        // Doubling every coefficient must not change the response.
        let mut reference = IirFilter::new(&[0.0253863, 0.0253863], &[1.0, -0.9492274]);
        let mut scaled = IirFilter::new(&[0.0507726, 0.0507726], &[2.0, -1.8984548]);
        for i in 0..100 {
            let x = (i % 7) as f32 - 3.0;
            assert!((reference.process(x) - scaled.process(x)).abs() < 1e-5);
        }
    }

    #[test]
    fn test_deemphasis_dc_gain_is_unity() {
        let mut filter = IirFilter::new(&[0.0253863, 0.0253863], &[1.0, -0.9492274]);
        let mut output = 0.0;
        for _ in 0..10_000 {
            output = filter.process(1.0);
        }
        assert!((output - 1.0).abs() < 1e-3, "DC gain was {output}");
    }

    #[test]
    fn test_deemphasis_attenuates_high_frequency() {
        // Nyquist-rate alternation is far above the 2.1 kHz corner and
        // must be strongly attenuated.
        let mut filter = IirFilter::new(&[0.0253863, 0.0253863], &[1.0, -0.9492274]);
        let mut peak = 0.0f32;
        for i in 0..10_000 {
            let x = if i % 2 == 0 { 1.0 } else { -1.0 };
            let y = filter.process(x);
            if i > 1000 {
                peak = peak.max(libm::fabsf(y));
            }
        }
        assert!(peak < 0.05, "Nyquist leakage {peak}");
    }

    #[test]
    fn test_reset() {
        let mut filter = IirFilter::new(&[0.0253863, 0.0253863], &[1.0, -0.9492274]);
        for _ in 0..100 {
            filter.process(1.0);
        }
        filter.reset();
        // First post-reset output only sees b0 * x.
        let y = filter.process(1.0);
        assert!((y - 0.0253863).abs() < 1e-6);
    }
}
