//! Ondas Demod - demodulators and level-driven control loops for the
//! ondas SDR receiver.
//!
//! Everything here consumes blocks of interleaved signed 8-bit I/Q
//! samples at 256 kS/s and is built from the ondas-dsp primitives:
//!
//! - [`AmDemodulator`] - envelope detection
//! - [`FmDemodulator`] - narrowband FM via the phase discriminator
//! - [`WbFmDemodulator`] - broadcast FM with table-lookup atan2 and 75 us
//!   de-emphasis
//! - [`SsbDemodulator`] - LSB/USB via a Hilbert phase-shift network
//! - [`Demodulator`] - the tagged sum the pipeline switches between
//! - [`SignalTracker`] - squelch with hysteresis and edge events
//! - [`Agc`] - IF-gain control loop (lowpass or Harris update)
//!
//! All demodulators emit 16-bit PCM at 8 kHz through factored decimation
//! (4 x 4 x 2 from 256 kS/s).

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod agc;
pub mod am;
pub mod coefficients;
pub mod demodulator;
pub mod fm;
pub mod squelch;
pub mod ssb;
pub mod wbfm;

pub use agc::{Agc, AgcKind, MAX_IF_GAIN_DB};
pub use am::AmDemodulator;
pub use demodulator::{DemodMode, Demodulator, ParseDemodModeError};
pub use fm::FmDemodulator;
pub use squelch::{SQUELCH_HYSTERESIS_DB, SignalEvent, SignalTracker};
pub use ssb::{SsbDemodulator, SsbMode};
pub use wbfm::WbFmDemodulator;

/// Clamp a float sample into the i16 PCM range.
#[inline]
pub(crate) fn saturate_i16(x: f32) -> i16 {
    x.clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}
