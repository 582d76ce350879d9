//! Wideband (broadcast) FM demodulator.
//!
//! The discriminator runs at the full 256 kS/s rate straight off the
//! 8-bit samples, using the 256x256 atan2 lookup instead of a per-sample
//! `atan2`. De-emphasis is applied before the 4 x 4 x 2 decimation chain
//! brings the audio to 8 kHz.

use alloc::vec::Vec;
use core::f32::consts::PI;

use ondas_dsp::{Atan2Table, Decimator, FilterError, IirFilter, wrap_phase};

use crate::coefficients::{
    AUDIO_DECIMATION, DEEMPHASIS_DENOMINATOR, DEEMPHASIS_NUMERATOR, POST_DEMOD_DECIMATION,
    TUNER_DECIMATION, WBFM_AUDIO_DECIMATOR_TAPS, WBFM_STAGE1_DECIMATOR_TAPS,
    WBFM_STAGE2_DECIMATOR_TAPS,
};
use crate::saturate_i16;

/// Wideband FM demodulator.
#[derive(Debug, Clone)]
pub struct WbFmDemodulator {
    atan2_table: Atan2Table,
    deemphasis: IirFilter,
    stage1_decimator: Decimator,
    stage2_decimator: Decimator,
    audio_decimator: Decimator,
    previous_theta: f32,
    gain: f32,
}

impl WbFmDemodulator {
    /// Nominal gain at the 256 kS/s discriminator stage.
    pub const DEFAULT_GAIN: f32 = 64_000.0 / (2.0 * PI);

    /// Build the demodulator chain, including the atan2 lookup table.
    pub fn new() -> Result<Self, FilterError> {
        Ok(Self {
            atan2_table: Atan2Table::new(),
            deemphasis: IirFilter::new(&DEEMPHASIS_NUMERATOR, &DEEMPHASIS_DENOMINATOR),
            stage1_decimator: Decimator::new(&WBFM_STAGE1_DECIMATOR_TAPS, TUNER_DECIMATION)?,
            stage2_decimator: Decimator::new(&WBFM_STAGE2_DECIMATOR_TAPS, POST_DEMOD_DECIMATION)?,
            audio_decimator: Decimator::new(&WBFM_AUDIO_DECIMATOR_TAPS, AUDIO_DECIMATION)?,
            previous_theta: 0.0,
            gain: Self::DEFAULT_GAIN,
        })
    }

    /// Demodulator gain.
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Replace the demodulator gain.
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    /// Reset every filter and the phase memory.
    pub fn reset(&mut self) {
        self.stage1_decimator.reset();
        self.stage2_decimator.reset();
        self.audio_decimator.reset();
        self.deemphasis.reset();
        self.previous_theta = 0.0;
    }

    /// Demodulate one block of interleaved signed I/Q samples, appending
    /// PCM to `pcm`.
    pub fn demodulate(&mut self, iq: &[i8], pcm: &mut Vec<i16>) {
        for pair in iq.chunks_exact(2) {
            // Back to offset binary for the table axes.
            let i = (i16::from(pair[0]) + 128) as u8;
            let q = (i16::from(pair[1]) + 128) as u8;

            let theta = self.atan2_table.lookup(i, q);
            let delta = wrap_phase(theta - self.previous_theta);
            self.previous_theta = theta;

            let audio = self.deemphasis.process(self.gain * delta);

            if let Some(s) = self.stage1_decimator.decimate(saturate_i16(audio)) {
                if let Some(s) = self.stage2_decimator.decimate(s) {
                    if let Some(s) = self.audio_decimator.decimate(s) {
                        pcm.push(s);
                    }
                }
            }
        }
    }
}
