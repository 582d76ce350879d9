//! Narrowband FM demodulator.
//!
//! 256 kS/s I/Q in, 8 kHz PCM out. The tuner decimators bring both
//! channels to 64 kS/s where the phase discriminator recovers the
//! instantaneous frequency; two more decimation stages produce PCM.

use alloc::vec::Vec;
use core::f32::consts::PI;

use ondas_dsp::{Decimator, DiscriminatorKind, FilterError, PhaseDiscriminator};

use crate::coefficients::{
    AUDIO_DECIMATION, AUDIO_DECIMATOR_TAPS, POST_DEMOD_DECIMATION, POST_DEMOD_DECIMATOR_TAPS,
    TUNER_DECIMATION, TUNER_DECIMATOR_TAPS,
};
use crate::saturate_i16;

/// Narrowband FM demodulator.
#[derive(Debug, Clone)]
pub struct FmDemodulator {
    i_tuner_decimator: Decimator,
    q_tuner_decimator: Decimator,
    post_demod_decimator: Decimator,
    audio_decimator: Decimator,
    discriminator: PhaseDiscriminator,
    i_data: Vec<i16>,
    q_data: Vec<i16>,
}

impl FmDemodulator {
    /// Nominal gain at the 64 kS/s discriminator stage, sized so the full
    /// 15 kHz narrowband deviation maps onto the PCM range.
    pub const DEFAULT_GAIN: f32 = 256_000.0 / (8.0 * 2.0 * PI);

    /// Build the demodulator chain with the chosen discriminator variant.
    pub fn new(kind: DiscriminatorKind) -> Result<Self, FilterError> {
        Ok(Self {
            i_tuner_decimator: Decimator::new(&TUNER_DECIMATOR_TAPS, TUNER_DECIMATION)?,
            q_tuner_decimator: Decimator::new(&TUNER_DECIMATOR_TAPS, TUNER_DECIMATION)?,
            post_demod_decimator: Decimator::new(
                &POST_DEMOD_DECIMATOR_TAPS,
                POST_DEMOD_DECIMATION,
            )?,
            audio_decimator: Decimator::new(&AUDIO_DECIMATOR_TAPS, AUDIO_DECIMATION)?,
            discriminator: PhaseDiscriminator::new(kind, Self::DEFAULT_GAIN),
            i_data: Vec::new(),
            q_data: Vec::new(),
        })
    }

    /// Demodulator gain.
    pub fn gain(&self) -> f32 {
        self.discriminator.gain()
    }

    /// Replace the demodulator gain.
    pub fn set_gain(&mut self, gain: f32) {
        self.discriminator.set_gain(gain);
    }

    /// Reset every filter and the discriminator phase memory.
    pub fn reset(&mut self) {
        self.i_tuner_decimator.reset();
        self.q_tuner_decimator.reset();
        self.post_demod_decimator.reset();
        self.audio_decimator.reset();
        self.discriminator.reset();
    }

    /// Demodulate one block of interleaved signed I/Q samples, appending
    /// PCM to `pcm`.
    pub fn demodulate(&mut self, iq: &[i8], pcm: &mut Vec<i16>) {
        self.reduce_sample_rate(iq);

        for k in 0..self.i_data.len() {
            let sample = self
                .discriminator
                .demodulate(f32::from(self.i_data[k]), f32::from(self.q_data[k]));

            if let Some(s) = self.post_demod_decimator.decimate(saturate_i16(sample)) {
                if let Some(s) = self.audio_decimator.decimate(s) {
                    pcm.push(s);
                }
            }
        }
    }

    /// Split the interleaved stream and decimate both channels to the
    /// discriminator rate.
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
