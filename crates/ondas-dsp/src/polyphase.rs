//! Polyphase coefficient storage.
//!
//! A prototype lowpass of N taps is quantized to Q15 and permuted into
//! `factor` sub-filters of `q = N / factor` taps each, so that sub-filter
//! `i` holds `h(i), h(i + factor), h(i + 2*factor), ...` contiguously.
//! The permutation lets the rate converters hand a single contiguous slice
//! to the FIR kernel instead of striding through the prototype.

use alloc::vec::Vec;
use thiserror::Error;

/// Filter construction failures. Fatal: a receiver chain cannot be built
/// from a malformed prototype.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// The prototype tap count is not an integer multiple of the rate
    /// factor, so the polyphase sub-filters would have unequal lengths.
    #[error("filter length {taps} is not an integer multiple of factor {factor}")]
    Geometry {
        /// Number of prototype taps supplied.
        taps: usize,
        /// Rate-change factor requested.
        factor: usize,
    },
}

/// A prototype filter paired with its rate-change factor.
///
/// Coefficients are designed offline and supplied as constants; this type
/// only carries them to [`PolyphaseBank::new`].
#[derive(Debug, Clone, Copy)]
pub struct FilterSpec<'a> {
    /// Prototype lowpass taps, in natural order.
    pub taps: &'a [f32],
    /// Decimation or interpolation factor. Must divide `taps.len()`.
    pub factor: usize,
}

/// Quantize a float coefficient to Q15: `round(h * 32768)` clipped to the
/// i16 range (so +1.0 becomes 32767).
#[inline]
pub fn quantize_q15(h: f32) -> i16 {
    let scaled = libm::roundf(h * 32768.0);
    scaled.clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}

/// Quantized, permuted polyphase coefficient bank.
#[derive(Debug, Clone)]
pub struct PolyphaseBank {
    /// All sub-filters back to back: sub-filter `i` occupies
    /// `coeffs[i*q .. (i+1)*q]`.
    coeffs: Vec<i16>,
    factor: usize,
    sub_len: usize,
}

impl PolyphaseBank {
    /// Quantize and permute a prototype filter.
    ///
    /// # Errors
    ///
    /// [`FilterError::Geometry`] when the tap count is zero, the factor is
    /// zero, or the tap count is not divisible by the factor.
    pub fn new(spec: FilterSpec<'_>) -> Result<Self, FilterError> {
        if spec.factor == 0 || spec.taps.is_empty() || spec.taps.len() % spec.factor != 0 {
            return Err(FilterError::Geometry {
                taps: spec.taps.len(),
                factor: spec.factor,
            });
        }

        let scaled: Vec<i16> = spec.taps.iter().map(|&h| quantize_q15(h)).collect();
        let sub_len = spec.taps.len() / spec.factor;

        let mut coeffs = Vec::with_capacity(spec.taps.len());
        for i in 0..spec.factor {
            for j in 0..sub_len {
                coeffs.push(scaled[i + j * spec.factor]);
            }
        }

        Ok(Self {
            coeffs,
            factor: spec.factor,
            sub_len,
        })
    }

    /// Rate-change factor (number of sub-filters).
    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Taps per sub-filter (`q = N / factor`).
    pub fn sub_len(&self) -> usize {
        self.sub_len
    }

    /// Coefficient slice of sub-filter `i`.
    #[inline]
    pub fn sub_filter(&self, i: usize) -> &[i16] {
        &self.coeffs[i * self.sub_len..(i + 1) * self.sub_len]
    }
}
