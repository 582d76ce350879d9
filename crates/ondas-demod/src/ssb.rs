//! Single-sideband demodulator.
//!
//! After tuner decimation to 64 kS/s the two channels pass through a
//! phase-shift network: the in-phase branch is delayed to match the group
//! delay of the Hilbert branch, which shifts quadrature by -pi/2. Adding
//! the branches selects the lower sideband; subtracting selects the upper.

use alloc::vec::Vec;

use ondas_dsp::{Decimator, FilterError, Fir};

use crate::coefficients::{
    AUDIO_DECIMATION, AUDIO_DECIMATOR_TAPS, POST_DEMOD_DECIMATION, POST_DEMOD_DECIMATOR_TAPS,
    SSB_DELAY_TAPS, SSB_HILBERT_TAPS, TUNER_DECIMATION, TUNER_DECIMATOR_TAPS,
};
use crate::saturate_i16;

/// Which sideband the demodulator recovers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsbMode {
    /// Lower sideband: `y = i + q`.
    Lsb,
    /// Upper sideband: `y = i - q`.
    Usb,
}

/// SSB demodulator.
#[derive(Debug, Clone)]
pub struct SsbDemodulator {
    i_tuner_decimator: Decimator,
    q_tuner_decimator: Decimator,
    delay_filter: Fir,
    hilbert_filter: Fir,
    post_demod_decimator: Decimator,
    audio_decimator: Decimator,
    mode: SsbMode,
    gain: f32,
    i_data: Vec<i16>,
    q_data: Vec<i16>,
}

impl SsbDemodulator {
    /// Nominal gain: unity through the i +/- q summation.
    pub const DEFAULT_GAIN: f32 = 1.0;

    /// Build the demodulator chain in the given sideband mode.
    pub fn new(mode: SsbMode) -> Result<Self, FilterError> {
        Ok(Self {
            i_tuner_decimator: Decimator::new(&TUNER_DECIMATOR_TAPS, TUNER_DECIMATION)?,
            q_tuner_decimator: Decimator::new(&TUNER_DECIMATOR_TAPS, TUNER_DECIMATION)?,
            delay_filter: Fir::new(&SSB_DELAY_TAPS),
            hilbert_filter: Fir::new(&SSB_HILBERT_TAPS),
            post_demod_decimator: Decimator::new(
                &POST_DEMOD_DECIMATOR_TAPS,
                POST_DEMOD_DECIMATION,
            )?,
            audio_decimator: Decimator::new(&AUDIO_DECIMATOR_TAPS, AUDIO_DECIMATION)?,
            mode,
            gain: Self::DEFAULT_GAIN,
            i_data: Vec::new(),
            q_data: Vec::new(),
        })
    }

    /// Selected sideband.
    pub fn mode(&self) -> SsbMode {
        self.mode
    }

    /// Select a sideband. Sets exactly the requested mode.
    pub fn set_mode(&mut self, mode: SsbMode) {
        self.mode = mode;
    }

    /// Output gain.
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Replace the output gain.
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    /// Reset every filter to its initial condition.
    pub fn reset(&mut self) {
        self.i_tuner_decimator.reset();
        self.q_tuner_decimator.reset();
        self.delay_filter.reset();
        self.hilbert_filter.reset();
        self.post_demod_decimator.reset();
        self.audio_decimator.reset();
    }

    /// Demodulate one block of interleaved signed I/Q samples, appending
    /// PCM to `pcm`.
    pub fn demodulate(&mut self, iq: &[i8], pcm: &mut Vec<i16>) {
        self.reduce_sample_rate(iq);

        for k in 0..self.i_data.len() {
            let i = self.delay_filter.filter(self.i_data[k]);
            let q = self.hilbert_filter.filter(self.q_data[k]);

            let combined = match self.mode {
                SsbMode::Lsb => i32::from(i) + i32::from(q),
                SsbMode::Usb => i32::from(i) - i32::from(q),
            };
            let sample = saturate_i16(combined as f32 * self.gain);

            if let Some(s) = self.post_demod_decimator.decimate(sample) {
                if let Some(s) = self.audio_decimator.decimate(s) {
                    pcm.push(s);
                }
            }
        }
    }

    fn reduce_sample_rate(&mut self, iq: &[i8]) {
        self.i_data.clear();
        self.q_data.clear();

        for pair in iq.chunks_exact(2) {
            let i = i16::from(pair[0]) << 8;
            let q = i16::from(pair[1]) << 8;
            if let Some(s) = self.i_tuner_decimator.decimate(i) {
                self.i_data.push(s);
            }
            if let Some(s) = self.q_tuner_decimator.decimate(q) {
                self.q_data.push(s);
            }
        }
    }
}
