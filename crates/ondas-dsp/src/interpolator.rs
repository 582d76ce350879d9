//! Polyphase interpolator: L outputs for every input.
//!
//! Rather than stuffing zeros and filtering at the interpolated rate, the
//! commutation method runs each of the L sub-filters against the same
//! low-rate delay line, so all arithmetic happens before the rate change.

use crate::fir::FirState;
use crate::polyphase::{FilterError, FilterSpec, PolyphaseBank};

/// Integer-factor polyphase FIR interpolator over Q15 samples.
///
/// Every input produces a burst of exactly L outputs; the latency is
/// `q = N / L` input samples.
#[derive(Debug, Clone)]
pub struct Interpolator {
    bank: PolyphaseBank,
    state: FirState,
}

impl Interpolator {
    /// Build an interpolator from prototype taps and an interpolation
    /// factor.
    ///
    /// # Errors
    ///
    /// [`FilterError::Geometry`] when the tap count is not divisible by
    /// `factor`.
    pub fn new(taps: &[f32], factor: usize) -> Result<Self, FilterError> {
        let bank = PolyphaseBank::new(FilterSpec { taps, factor })?;
        let state = FirState::new(bank.sub_len());
        Ok(Self { bank, state })
    }

    /// Interpolation factor L.
    pub fn factor(&self) -> usize {
        self.bank.factor()
    }

    /// Zero the delay line.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Push one input sample and write the burst of L outputs into
    /// `output[..L]`.
    ///
    /// # Panics
    ///
    /// When `output` is shorter than the interpolation factor.
    #[inline]
    pub fn interpolate(&mut self, sample: i16, output: &mut [i16]) {
        assert!(output.len() >= self.bank.factor());

        self.state.write(sample);
        for i in 0..self.bank.factor() {
            output[i] = self.state.filter(self.bank.sub_filter(i));
        }
        self.state.advance();
    }
}
