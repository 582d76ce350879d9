//! AM envelope demodulator.
//!
//! 256 kS/s I/Q in, 8 kHz PCM out. The tuner decimators bring both
//! channels to 64 kS/s, the envelope `sqrt(I^2 + Q^2)` strips the phase, a
//! DC blocker removes the carrier level, and the post-demod and audio
//! decimators bring the result to the PCM rate.

use alloc::vec::Vec;

use ondas_dsp::{Decimator, FilterError};

use crate::coefficients::{
    AUDIO_DECIMATION, AUDIO_DECIMATOR_TAPS, POST_DEMOD_DECIMATION, POST_DEMOD_DECIMATOR_TAPS,
    TUNER_DECIMATION, TUNER_DECIMATOR_TAPS,
};
use crate::saturate_i16;

/// First-order DC blocker: `y[n] = x[n] - x[n-1] + R * y[n-1]`.
///
/// R = 0.95 at 64 kS/s puts the corner around 500 Hz, low enough to keep
/// voice content and high enough to settle quickly after a carrier-level
/// step.
#[derive(Debug, Clone)]
struct DcBlocker {
    coeff: f32,
    x_prev: f32,
    y_prev: f32,
}

impl DcBlocker {
    fn new(coeff: f32) -> Self {
        Self {
            coeff,
            x_prev: 0.0,
            y_prev: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let output = input - self.x_prev + self.coeff * self.y_prev;
        self.x_prev = input;
        self.y_prev = output;
        output
    }

    fn reset(&mut self) {
        self.x_prev = 0.0;
        self.y_prev = 0.0;
    }
}

/// AM demodulator.
#[derive(Debug, Clone)]
pub struct AmDemodulator {
    i_tuner_decimator: Decimator,
    q_tuner_decimator: Decimator,
    post_demod_decimator: Decimator,
    audio_decimator: Decimator,
    dc_blocker: DcBlocker,
    gain: f32,
    i_data: Vec<i16>,
    q_data: Vec<i16>,
}

impl AmDemodulator {
    /// Nominal output gain. The envelope is already full-scale in the
    /// `(x << 8)` integer path, so unity is the neutral setting.
    pub const DEFAULT_GAIN: f32 = 1.0;

    const DC_BLOCKER_COEFF: f32 = 0.95;

    /// Build the demodulator chain.
    pub fn new() -> Result<Self, FilterError> {
        Ok(Self {
            i_tuner_decimator: Decimator::new(&TUNER_DECIMATOR_TAPS, TUNER_DECIMATION)?,
            q_tuner_decimator: Decimator::new(&TUNER_DECIMATOR_TAPS, TUNER_DECIMATION)?,
            post_demod_decimator: Decimator::new(
                &POST_DEMOD_DECIMATOR_TAPS,
                POST_DEMOD_DECIMATION,
            )?,
            audio_decimator: Decimator::new(&AUDIO_DECIMATOR_TAPS, AUDIO_DECIMATION)?,
            dc_blocker: DcBlocker::new(Self::DC_BLOCKER_COEFF),
            gain: Self::DEFAULT_GAIN,
            i_data: Vec::new(),
            q_data: Vec::new(),
        })
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
        self.post_demod_decimator.reset();
        self.audio_decimator.reset();
        self.dc_blocker.reset();
    }

    /// Demodulate one block of interleaved signed I/Q samples, appending
    /// PCM to `pcm`.
    pub fn demodulate(&mut self, iq: &[i8], pcm: &mut Vec<i16>) {
        self.reduce_sample_rate(iq);

        for k in 0..self.i_data.len() {
            let i = i32::from(self.i_data[k]);
            let q = i32::from(self.q_data[k]);
            let envelope = libm::sqrtf((i * i + q * q) as f32);
            let centered = self.dc_blocker.process(envelope);

            if let Some(s) = self.post_demod_decimator.decimate(saturate_i16(centered)) {
                if let Some(s) = self.audio_decimator.decimate(s) {
                    pcm.push(saturate_i16(f32::from(s) * self.gain));
                }
            }
        }
    }

    /// Split the interleaved stream and decimate both channels to the
    /// demodulator rate.
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
