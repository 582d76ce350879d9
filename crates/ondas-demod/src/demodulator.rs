//! Demodulator selection.
//!
//! The receiver exposes one demodulator at a time, chosen by
//! [`DemodMode`]. [`Demodulator`] is the tagged sum over the four
//! implementations; filter composition happens inside each variant by
//! plain aggregation.

use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use ondas_dsp::{DiscriminatorKind, FilterError};

use crate::am::AmDemodulator;
use crate::fm::FmDemodulator;
use crate::ssb::{SsbDemodulator, SsbMode};
use crate::wbfm::WbFmDemodulator;

/// Receiver demodulation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DemodMode {
    /// Pass nothing; the pipeline produces no PCM.
    #[default]
    None,
    /// Amplitude modulation.
    Am,
    /// Narrowband frequency modulation.
    Fm,
    /// Wideband (broadcast) frequency modulation.
    WbFm,
    /// Lower sideband.
    Lsb,
    /// Upper sideband.
    Usb,
}

impl fmt::Display for DemodMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DemodMode::None => "none",
            DemodMode::Am => "am",
            DemodMode::Fm => "fm",
            DemodMode::WbFm => "wbfm",
            DemodMode::Lsb => "lsb",
            DemodMode::Usb => "usb",
        };
        f.write_str(name)
    }
}

/// Error for unrecognized mode names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDemodModeError;

impl fmt::Display for ParseDemodModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("expected one of: none, am, fm, wbfm, lsb, usb")
    }
}

impl core::error::Error for ParseDemodModeError {}

impl FromStr for DemodMode {
    type Err = ParseDemodModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(DemodMode::None),
            "am" => Ok(DemodMode::Am),
            "fm" | "nbfm" => Ok(DemodMode::Fm),
            "wbfm" => Ok(DemodMode::WbFm),
            "lsb" => Ok(DemodMode::Lsb),
            "usb" => Ok(DemodMode::Usb),
            _ => Err(ParseDemodModeError),
        }
    }
}

/// The selected demodulation chain.
///
/// Constructing a variant builds its filters in their initial (reset)
/// state, so selecting a mode starts the new chain clean.
#[derive(Debug, Clone)]
pub enum Demodulator {
    /// No demodulation.
    None,
    /// AM chain.
    Am(AmDemodulator),
    /// Narrowband FM chain.
    Fm(FmDemodulator),
    /// Wideband FM chain.
    WbFm(WbFmDemodulator),
    /// SSB chain (either sideband).
    Ssb(SsbDemodulator),
}

impl Demodulator {
    /// Build the chain for `mode`.
    ///
    /// Narrowband FM uses the direct discriminator; use
    /// [`Demodulator::Fm`] with a hand-built [`FmDemodulator`] for the
    /// differentiated variant.
    pub fn new(mode: DemodMode) -> Result<Self, FilterError> {
        Ok(match mode {
            DemodMode::None => Demodulator::None,
            DemodMode::Am => Demodulator::Am(AmDemodulator::new()?),
            DemodMode::Fm => Demodulator::Fm(FmDemodulator::new(DiscriminatorKind::Direct)?),
            DemodMode::WbFm => Demodulator::WbFm(WbFmDemodulator::new()?),
            DemodMode::Lsb => Demodulator::Ssb(SsbDemodulator::new(SsbMode::Lsb)?),
            DemodMode::Usb => Demodulator::Ssb(SsbDemodulator::new(SsbMode::Usb)?),
        })
    }

    /// Mode this chain implements.
    pub fn mode(&self) -> DemodMode {
        match self {
            Demodulator::None => DemodMode::None,
            Demodulator::Am(_) => DemodMode::Am,
            Demodulator::Fm(_) => DemodMode::Fm,
            Demodulator::WbFm(_) => DemodMode::WbFm,
            Demodulator::Ssb(d) => match d.mode() {
                SsbMode::Lsb => DemodMode::Lsb,
                SsbMode::Usb => DemodMode::Usb,
            },
        }
    }

    /// Demodulate one block of interleaved signed I/Q samples, appending
    /// PCM to `pcm`. The `None` variant appends nothing.
    pub fn demodulate(&mut self, iq: &[i8], pcm: &mut Vec<i16>) {
        match self {
            Demodulator::None => {}
            Demodulator::Am(d) => d.demodulate(iq, pcm),
            Demodulator::Fm(d) => d.demodulate(iq, pcm),
            Demodulator::WbFm(d) => d.demodulate(iq, pcm),
            Demodulator::Ssb(d) => d.demodulate(iq, pcm),
        }
    }

    /// Reset the chain to its initial condition.
    pub fn reset(&mut self) {
        match self {
            Demodulator::None => {}
            Demodulator::Am(d) => d.reset(),
            Demodulator::Fm(d) => d.reset(),
            Demodulator::WbFm(d) => d.reset(),
            Demodulator::Ssb(d) => d.reset(),
        }
    }

    /// Replace the output gain of the chain (no-op for `None`).
    pub fn set_gain(&mut self, gain: f32) {
        match self {
            Demodulator::None => {}
            Demodulator::Am(d) => d.set_gain(gain),
            Demodulator::Fm(d) => d.set_gain(gain),
            Demodulator::WbFm(d) => d.set_gain(gain),
            Demodulator::Ssb(d) => d.set_gain(gain),
        }
    }
}
