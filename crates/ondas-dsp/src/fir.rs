//! Fixed-point FIR engine.
//!
//! Samples and coefficients are Q15 (signed-fractional, 15 fractional bits
//! in an i16). The multiply-accumulate kernel works in a 32-bit Q30
//! accumulator that is saturated after every product, so a pathological
//! input cannot wrap, only clip.

use alloc::vec;
use alloc::vec::Vec;

use crate::polyphase::quantize_q15;

/// Upper saturation rail of the Q30 accumulator.
const ACCUMULATOR_MAX: i32 = 0x3FFF_FFFF;
/// Lower saturation rail of the Q30 accumulator.
const ACCUMULATOR_MIN: i32 = -0x4000_0000;
/// Q30 representation of 0.5, preloaded for rounding.
const ROUNDING_PRELOAD: i32 = 1 << 14;

/// Circular Q15 delay line plus the saturating MAC kernel.
///
/// The state is addressed by a descending index that wraps from 0 back to
/// `len - 1`, so a convolution walks from the newest sample toward the
/// oldest. After [`write`](Self::write) the buffer logically holds the last
/// `len` inputs in order; [`advance`](Self::advance) retires the oldest.
///
/// Writing and advancing are split because the polyphase interpolator runs
/// several convolutions against the same input before the state moves.
#[derive(Debug, Clone)]
pub struct FirState {
    state: Vec<i16>,
    head: usize,
}

impl FirState {
    /// Create a zeroed delay line of `len` samples.
    pub fn new(len: usize) -> Self {
        assert!(len > 0, "delay line must hold at least one sample");
        Self {
            state: vec![0; len],
            head: 0,
        }
    }

    /// Number of samples the delay line holds.
    pub fn len(&self) -> usize {
        self.state.len()
    }

    /// Always false; a delay line has at least one slot.
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Zero the state and move the head back to the start.
    pub fn reset(&mut self) {
        self.head = 0;
        self.state.fill(0);
    }

    /// Place `sample` at the head position, overwriting the oldest entry.
    #[inline]
    pub fn write(&mut self, sample: i16) {
        self.state[self.head] = sample;
    }

    /// Retire the oldest sample by moving the head forward one slot.
    #[inline]
    pub fn advance(&mut self) {
        self.head += 1;
        if self.head == self.state.len() {
            self.head = 0;
        }
    }

    /// Run the Q15 convolution of `coeffs` against the delay line.
    ///
    /// `coeffs` must be exactly as long as the state. The accumulator is
    /// preloaded with Q30 0.5 so the final arithmetic shift rounds rather
    /// than truncates; it is saturated to `[-2^30, 2^30 - 1]` after every
    /// MAC, and the result is the Q15 sample `acc >> 15`.
    #[inline]
    pub fn filter(&self, coeffs: &[i16]) -> i16 {
        debug_assert_eq!(coeffs.len(), self.state.len());

        let mut index = self.head;
        let mut accumulator: i32 = ROUNDING_PRELOAD;

        for &h in coeffs {
            accumulator += i32::from(h) * i32::from(self.state[index]);
            accumulator = accumulator.clamp(ACCUMULATOR_MIN, ACCUMULATOR_MAX);

            // Descending index, wrapping 0 -> len - 1.
            index = if index == 0 {
                self.state.len() - 1
            } else {
                index - 1
            };
        }

        (accumulator >> 15) as i16
    }
}

/// Plain Q15 FIR filter: one output per input, all taps engaged.
///
/// This is the non-rate-changing counterpart of [`Decimator`] and
/// [`Interpolator`]; the SSB phase-shift network is built from two of
/// these.
///
/// [`Decimator`]: crate::Decimator
/// [`Interpolator`]: crate::Interpolator
///
/// # Example
///
/// ```rust
/// use ondas_dsp::Fir;
///
/// // Identity filter: a single unity tap.
/// let mut fir = Fir::new(&[1.0]);
/// assert_eq!(fir.filter(1000), 1000);
/// ```
#[derive(Debug, Clone)]
pub struct Fir {
    coeffs: Vec<i16>,
    state: FirState,
}

impl Fir {
    /// Build a filter from float prototype taps, quantizing each to Q15.
    pub fn new(taps: &[f32]) -> Self {
        assert!(!taps.is_empty(), "filter needs at least one tap");
        Self {
            coeffs: taps.iter().map(|&h| quantize_q15(h)).collect(),
            state: FirState::new(taps.len()),
        }
    }

    /// Number of taps.
    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    /// Always false; construction rejects empty tap sets.
    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Zero the delay line.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Push one sample and produce the filtered output.
    #[inline]
    pub fn filter(&mut self, sample: i16) -> i16 {
        self.state.write(sample);
        let y = self.state.filter(&self.coeffs);
        self.state.advance();
        y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_holds_last_inputs() {
        let mut state = FirState::new(4);
        for x in 1..=5i16 {
            state.write(x);
            state.advance();
        }
        // The convolution reads between write and advance, with the newest
        // sample under the head.
        state.write(6);

        // An identity-at-delay-k tap isolates each retained sample:
        // newest first along the descending traversal.
        for (delay, expected) in [(0, 6i16), (1, 5), (2, 4), (3, 3)] {
            let mut coeffs = [0i16; 4];
            coeffs[delay] = 32767;
            // 32767/32768 of the sample, rounded back up by the preload.
            assert_eq!(state.filter(&coeffs), expected, "delay {delay}");
        }
    }

    #[test]
    fn test_filter_rounds_half_up() {
        let mut state = FirState::new(1);
        state.write(1);
        // 1 * 32767 + 16384 = 49151 -> >> 15 -> 1.
        assert_eq!(state.filter(&[32767]), 1);
        // Without the preload this would truncate to 0.
        assert_eq!(state.filter(&[16384]), 0);
    }

    #[test]
    fn test_filter_saturates_not_wraps() {
        let mut state = FirState::new(8);
        for _ in 0..8 {
            state.write(i16::MIN);
            state.advance();
        }
        let coeffs = [i16::MIN; 8];
        // Eight full-scale products overflow Q30 many times over; the
        // output must clip to the positive rail instead of wrapping.
        assert_eq!(state.filter(&coeffs), (ACCUMULATOR_MAX >> 15) as i16);
    }

    #[test]
    fn test_negative_saturation_rail() {
        let mut state = FirState::new(8);
        for _ in 0..8 {
            state.write(i16::MIN);
            state.advance();
        }
        let coeffs = [i16::MAX; 8];
        assert_eq!(state.filter(&coeffs), (ACCUMULATOR_MIN >> 15) as i16);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut state = FirState::new(3);
        state.write(123);
        state.advance();
        state.write(-456);
        state.reset();
        assert_eq!(state.filter(&[32767, 32767, 32767]), 0);
    }

    #[test]
    fn test_plain_fir_moving_average() {
        // Two half-weight taps: y[n] = (x[n] + x[n-1]) / 2.
        let mut fir = Fir::new(&[0.5, 0.5]);
        assert_eq!(fir.filter(1000), 500);
        assert_eq!(fir.filter(3000), 2000);
        assert_eq!(fir.filter(3000), 3000);
    }

    #[test]
    fn test_plain_fir_reset() {
        let mut fir = Fir::new(&[0.5, 0.5]);
        fir.filter(20000);
        fir.reset();
        assert_eq!(fir.filter(0), 0);
    }
}
