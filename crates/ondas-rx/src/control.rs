//! Control surface.
//!
//! Parameter changes arrive on the control thread, are validated against
//! their documented ranges, and land in a versioned configuration cell.
//! The DSP task polls the cell at the top of each block, so a change never
//! touches filter state mid-block. Settings that only concern the device
//! (frequency, sample rate, manual gains) go straight to the tuner through
//! the shared mutex.

use std::sync::{Arc, Mutex};

use ondas_demod::{Agc, AgcKind, DemodMode};

use crate::error::RxError;
use crate::tuner::{AUTO_GAIN_DB, MAX_IF_GAIN_DB, SharedTuner};

/// Sample rates the pipeline has filter banks for.
pub const SUPPORTED_SAMPLE_RATES: [u32; 1] = [256_000];

/// Receiver configuration as seen by the DSP task.
#[derive(Debug, Clone, PartialEq)]
pub struct RxConfig {
    /// Selected demodulation mode.
    pub demod_mode: DemodMode,
    /// RF center frequency, for bookkeeping and display.
    pub frequency_hz: u64,
    /// I/Q sample rate. Only [`SUPPORTED_SAMPLE_RATES`] pass validation.
    pub sample_rate_hz: u32,
    /// Squelch threshold in dBFS referenced to the antenna.
    pub squelch_threshold_dbfs: i32,
    /// Master AGC switch.
    pub agc_enabled: bool,
    /// AGC update rule.
    pub agc_kind: AgcKind,
    /// AGC deadband in dB (0..=10).
    pub agc_deadband_db: i32,
    /// AGC post-adjustment blanking in blocks (0..=10).
    pub agc_blanking_limit: u32,
    /// AGC loop coefficient, exclusive (0.001, 0.999).
    pub agc_alpha: f32,
    /// AGC operating point in dBFS.
    pub agc_operating_point_dbfs: i32,
    /// Demodulator output gain; `None` keeps each mode's default.
    pub demodulator_gain: Option<f32>,
}

impl Default for RxConfig {
    fn default() -> Self {
        Self {
            demod_mode: DemodMode::None,
            frequency_hz: 100_000_000,
            sample_rate_hz: 256_000,
            squelch_threshold_dbfs: -200,
            agc_enabled: false,
            agc_kind: AgcKind::Harris,
            agc_deadband_db: Agc::DEFAULT_DEADBAND_DB,
            agc_blanking_limit: Agc::DEFAULT_BLANKING_LIMIT,
            agc_alpha: Agc::DEFAULT_ALPHA,
            agc_operating_point_dbfs: -30,
            demodulator_gain: None,
        }
    }
}

#[derive(Debug)]
struct Shared {
    config: RxConfig,
    version: u64,
}

/// Versioned configuration cell shared by the control surface and the
/// DSP task.
#[derive(Debug, Clone)]
pub struct ConfigCell {
    shared: Arc<Mutex<Shared>>,
}

impl ConfigCell {
    /// Create a cell holding `config` at version 0.
    pub fn new(config: RxConfig) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared { config, version: 0 })),
        }
    }

    /// Copy the current configuration.
    pub fn read(&self) -> RxConfig {
        self.lock().config.clone()
    }

    /// Mutate the configuration and bump the version.
    pub fn update(&self, f: impl FnOnce(&mut RxConfig)) {
        let mut shared = self.lock();
        f(&mut shared.config);
        shared.version += 1;
    }

    /// Return the configuration if it changed since `last_version`,
    /// together with the new version.
    pub fn poll(&self, last_version: u64) -> Option<(RxConfig, u64)> {
        let shared = self.lock();
        (shared.version != last_version).then(|| (shared.config.clone(), shared.version))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Validated parameter setters, usable from any thread.
///
/// Every setter either applies the change or returns
/// [`RxError::InvalidParameter`] without mutating anything.
#[derive(Clone)]
pub struct ControlHandle {
    cell: ConfigCell,
    tuner: SharedTuner,
}

impl ControlHandle {
    /// Build a handle over the shared cell and tuner.
    pub fn new(cell: ConfigCell, tuner: SharedTuner) -> Self {
        Self { cell, tuner }
    }

    /// Copy the current configuration.
    pub fn config(&self) -> RxConfig {
        self.cell.read()
    }

    /// Select the demodulation mode. Takes effect at the next block
    /// boundary.
    pub fn set_demod_mode(&self, mode: DemodMode) {
        self.cell.update(|c| c.demod_mode = mode);
    }

    /// Tune the receiver. Valid range 24 MHz..=1.7 GHz.
    pub fn set_frequency_hz(&self, hz: u64) -> Result<(), RxError> {
        if !(24_000_000..=1_700_000_000).contains(&hz) {
            return Err(RxError::invalid(
                "rx_frequency_hz",
                format!("{hz} outside 24e6..=1.7e9"),
            ));
        }
        self.with_tuner(|t| t.set_center_frequency(hz))?;
        self.cell.update(|c| c.frequency_hz = hz);
        Ok(())
    }

    /// Set the I/Q sample rate. The tuner ranges are 225_001..=300_000
    /// and 900_001..=3_200_000, but only rates with a filter bank are
    /// accepted.
    pub fn set_sample_rate_hz(&self, hz: u32) -> Result<(), RxError> {
        let tuner_valid =
            (225_001..=300_000).contains(&hz) || (900_001..=3_200_000).contains(&hz);
        if !tuner_valid {
            return Err(RxError::invalid(
                "rx_sample_rate_hz",
                format!("{hz} outside the tuner's rate ranges"),
            ));
        }
        if !SUPPORTED_SAMPLE_RATES.contains(&hz) {
            return Err(RxError::invalid(
                "rx_sample_rate_hz",
                format!("no filter coefficients for {hz} S/s"),
            ));
        }
        self.with_tuner(|t| t.set_sample_rate(hz))?;
        self.cell.update(|c| c.sample_rate_hz = hz);
        Ok(())
    }

    /// Set the overall RF gain (0..=50 dB) or [`AUTO_GAIN_DB`].
    pub fn set_overall_gain_db(&self, gain_db: u32) -> Result<(), RxError> {
        if gain_db != AUTO_GAIN_DB && gain_db > 50 {
            return Err(RxError::invalid(
                "rx_gain_db",
                format!("{gain_db} outside 0..=50 (or 99999 for auto)"),
            ));
        }
        self.with_tuner(|t| t.set_overall_gain_db(gain_db))
    }

    /// Manually set the IF gain (0..=46 dB). With the AGC enabled the
    /// loop will adopt this value on its next cycle (drift recovery).
    pub fn set_if_gain_db(&self, gain_db: u32) -> Result<(), RxError> {
        if gain_db > MAX_IF_GAIN_DB {
            return Err(RxError::invalid(
                "rx_if_gain_db",
                format!("{gain_db} outside 0..=46"),
            ));
        }
        self.with_tuner(|t| t.set_if_gain_db(0, gain_db))
    }

    /// Set the squelch threshold (-200..=0 dBFS).
    pub fn set_squelch_threshold_dbfs(&self, threshold: i32) -> Result<(), RxError> {
        if !(-200..=0).contains(&threshold) {
            return Err(RxError::invalid(
                "squelch_threshold_dbfs",
                format!("{threshold} outside -200..=0"),
            ));
        }
        self.cell.update(|c| c.squelch_threshold_dbfs = threshold);
        Ok(())
    }

    /// Master AGC switch.
    pub fn set_agc_enabled(&self, enabled: bool) {
        self.cell.update(|c| c.agc_enabled = enabled);
    }

    /// Select the AGC update rule.
    pub fn set_agc_kind(&self, kind: AgcKind) {
        self.cell.update(|c| c.agc_kind = kind);
    }

    /// Set the AGC deadband (0..=10 dB).
    pub fn set_agc_deadband_db(&self, deadband: i32) -> Result<(), RxError> {
        if !(0..=10).contains(&deadband) {
            return Err(RxError::invalid(
                "agc_deadband_db",
                format!("{deadband} outside 0..=10"),
            ));
        }
        self.cell.update(|c| c.agc_deadband_db = deadband);
        Ok(())
    }

    /// Set the AGC blanking limit (0..=10 blocks).
    pub fn set_agc_blanking_limit(&self, limit: u32) -> Result<(), RxError> {
        if limit > 10 {
            return Err(RxError::invalid(
                "agc_blanking_limit",
                format!("{limit} outside 0..=10"),
            ));
        }
        self.cell.update(|c| c.agc_blanking_limit = limit);
        Ok(())
    }

    /// Set the AGC loop coefficient, exclusive (0.001, 0.999).
    pub fn set_agc_alpha(&self, alpha: f32) -> Result<(), RxError> {
        if !(alpha > 0.001 && alpha < 0.999) {
            return Err(RxError::invalid(
                "agc_alpha",
                format!("{alpha} outside (0.001, 0.999)"),
            ));
        }
        self.cell.update(|c| c.agc_alpha = alpha);
        Ok(())
    }

    /// Set the AGC operating point (-200..=0 dBFS).
    pub fn set_agc_operating_point_dbfs(&self, dbfs: i32) -> Result<(), RxError> {
        if !(-200..=0).contains(&dbfs) {
            return Err(RxError::invalid(
                "agc_operating_point_dbfs",
                format!("{dbfs} outside -200..=0"),
            ));
        }
        self.cell.update(|c| c.agc_operating_point_dbfs = dbfs);
        Ok(())
    }

    /// Set the demodulator output gain (must be positive).
    pub fn set_demodulator_gain(&self, gain: f32) -> Result<(), RxError> {
        if !(gain > 0.0 && gain.is_finite()) {
            return Err(RxError::invalid(
                "demodulator_gain",
                format!("{gain} is not a positive finite gain"),
            ));
        }
        self.cell.update(|c| c.demodulator_gain = Some(gain));
        Ok(())
    }

    fn with_tuner<T>(
        &self,
        f: impl FnOnce(&mut dyn crate::tuner::Tuner) -> Result<T, crate::error::TunerError>,
    ) -> Result<T, RxError> {
        let mut tuner = self.tuner.lock().unwrap_or_else(|e| e.into_inner());
        f(tuner.as_mut()).map_err(RxError::from)
    }
}
