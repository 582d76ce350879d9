//! Automatic gain control for the tuner's adjustable IF stage.
//!
//! The loop closes around hardware: once per block the measured magnitude
//! is compared against the operating point and the IF gain (0..=46 dB) is
//! nudged toward it. Two update rules are provided; the Harris rule is the
//! one described in Lyons, *Understanding Digital Signal Processing*,
//! 3rd ed., section 13.30.
//!
//! Gain changes excite a transient in the sampled data, so after every
//! adjustment the loop blanks itself for a configurable number of blocks
//! rather than chase its own step response. When no adjustment was made
//! the loop always runs, keeping response to signal changes fast.

use ondas_dsp::DbfsTable;

/// Largest gain the IF amplifier accepts, in dB.
pub const MAX_IF_GAIN_DB: u32 = 46;

/// AGC update rule. The set is closed: exactly these two exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgcKind {
    /// First-order lowpass of the adjusted gain:
    /// `filtered = alpha * (gain + error) + (1 - alpha) * filtered`.
    Lowpass,
    /// Harris integrator: `filtered += alpha * error`.
    Harris,
}

/// IF-gain control loop.
///
/// The loop never talks to hardware itself: [`step`](Self::step) returns
/// the gain to commit, and the caller owns the write (and the retry on a
/// transient failure). The hardware's own reading is passed back in on the
/// next cycle, which doubles as drift recovery when some other actor moved
/// the gain.
#[derive(Debug, Clone)]
pub struct Agc {
    kind: AgcKind,
    operating_point_dbfs: i32,
    deadband_db: i32,
    blanking_limit: u32,
    blanking_counter: u32,
    gain_was_adjusted: bool,
    alpha: f32,
    if_gain_db: u32,
    filtered_if_gain_db: f32,
    dbfs_table: DbfsTable,
    signal_magnitude: u32,
    normalized_level_dbfs: i32,
}

impl Agc {
    /// Reasonable power-on IF gain.
    pub const DEFAULT_IF_GAIN_DB: u32 = 24;
    /// Default loop coefficient: fast convergence, stable.
    pub const DEFAULT_ALPHA: f32 = 0.8;
    /// Default deadband in dB.
    pub const DEFAULT_DEADBAND_DB: i32 = 1;
    /// Default post-adjustment blanking interval in blocks.
    pub const DEFAULT_BLANKING_LIMIT: u32 = 1;

    /// Create a loop with the given update rule and operating point.
    pub fn new(kind: AgcKind, operating_point_dbfs: i32) -> Self {
        Self {
            kind,
            operating_point_dbfs,
            deadband_db: Self::DEFAULT_DEADBAND_DB,
            blanking_limit: Self::DEFAULT_BLANKING_LIMIT,
            blanking_counter: 0,
            gain_was_adjusted: false,
            alpha: Self::DEFAULT_ALPHA,
            if_gain_db: Self::DEFAULT_IF_GAIN_DB,
            filtered_if_gain_db: Self::DEFAULT_IF_GAIN_DB as f32,
            dbfs_table: DbfsTable::new(),
            signal_magnitude: 0,
            normalized_level_dbfs: -(Self::DEFAULT_IF_GAIN_DB as i32),
        }
    }

    /// Update rule in use.
    pub fn kind(&self) -> AgcKind {
        self.kind
    }

    /// Replace the update rule.
    pub fn set_kind(&mut self, kind: AgcKind) {
        self.kind = kind;
    }

    /// Operating point in dBFS.
    pub fn operating_point_dbfs(&self) -> i32 {
        self.operating_point_dbfs
    }

    /// Replace the operating point.
    pub fn set_operating_point_dbfs(&mut self, operating_point_dbfs: i32) {
        self.operating_point_dbfs = operating_point_dbfs;
    }

    /// Replace the deadband (clamped to 0..=10 dB).
    pub fn set_deadband_db(&mut self, deadband_db: i32) {
        self.deadband_db = deadband_db.clamp(0, 10);
    }

    /// Replace the blanking limit (clamped to 0..=10 blocks) and restart
    /// the blanking system.
    pub fn set_blanking_limit(&mut self, blanking_limit: u32) {
        self.blanking_limit = blanking_limit.min(10);
        self.reset_blanking();
    }

    /// Replace the loop coefficient (clamped to the open interval
    /// (0.001, 0.999)).
    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.001, 0.999);
    }

    /// Force the loop's idea of the IF gain, e.g. at startup.
    pub fn set_if_gain_db(&mut self, if_gain_db: u32) {
        self.if_gain_db = if_gain_db.min(MAX_IF_GAIN_DB);
        self.filtered_if_gain_db = self.if_gain_db as f32;
    }

    /// The loop's current IF gain in dB. Always within 0..=46.
    pub fn if_gain_db(&self) -> u32 {
        self.if_gain_db
    }

    /// Signal level referenced to the antenna input (RSSI after mixer).
    pub fn normalized_signal_level_dbfs(&self) -> i32 {
        self.normalized_level_dbfs
    }

    /// Magnitude of the most recent measured block.
    pub fn signal_magnitude(&self) -> u32 {
        self.signal_magnitude
    }

    /// Restart the blanking system so the next cycle runs.
    pub fn reset_blanking(&mut self) {
        self.blanking_counter = 0;
        self.gain_was_adjusted = false;
    }

    /// Run one AGC cycle.
    ///
    /// `magnitude` is the block's average magnitude; `hardware_gain_db` is
    /// the IF gain read back from the tuner at the top of the cycle.
    /// Returns the gain to commit to hardware, or `None` when no
    /// adjustment is wanted this cycle.
    pub fn step(&mut self, magnitude: u32, hardware_gain_db: u32) -> Option<u32> {
        // Drift recovery: some other actor moved the gain. Adopt the
        // hardware value and sit this cycle out.
        if hardware_gain_db != self.if_gain_db {
            self.set_if_gain_db(hardware_gain_db);
            return None;
        }

        // Post-adjustment blanking: ignore measurements that may still
        // carry the gain-switch transient.
        if self.gain_was_adjusted {
            if self.blanking_counter < self.blanking_limit {
                self.blanking_counter += 1;
                return None;
            }
            self.reset_blanking();
        }

        self.signal_magnitude = magnitude;
        let signal_dbfs = self.dbfs_table.dbfs(magnitude);
        self.normalized_level_dbfs = signal_dbfs - self.if_gain_db as i32;

        let mut error_db = self.operating_point_dbfs - signal_dbfs;

        // Rail clamps: no use pushing past either end of the range.
        if self.if_gain_db == MAX_IF_GAIN_DB {
            if error_db > 0 {
                error_db = 0;
            }
        } else if self.if_gain_db == 0 && error_db < 0 {
            error_db = 0;
        }

        // Deadband against gain-setting oscillation.
        if error_db.abs() <= self.deadband_db {
            error_db = 0;
        }

        match self.kind {
            AgcKind::Lowpass => {
                let adjusted = self.if_gain_db as i32 + error_db;
                self.filtered_if_gain_db = self.alpha * adjusted as f32
                    + (1.0 - self.alpha) * self.filtered_if_gain_db;
            }
            AgcKind::Harris => {
                self.filtered_if_gain_db += self.alpha * error_db as f32;
            }
        }

        self.filtered_if_gain_db = self
            .filtered_if_gain_db
            .clamp(0.0, MAX_IF_GAIN_DB as f32);
        self.if_gain_db = libm::floorf(self.filtered_if_gain_db) as u32;

        // No change, no hardware write: be nice to the tuner.
        if error_db != 0 {
            self.gain_was_adjusted = true;
            Some(self.if_gain_db)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Closed-loop plant: a fixed antenna level amplified by the current
    /// IF gain, measured back as a linear magnitude.
    fn measured_magnitude(antenna_dbfs: f32, if_gain_db: u32) -> u32 {
        let level_dbfs = antenna_dbfs + if_gain_db as f32;
        libm::roundf(128.0 * libm::powf(10.0, level_dbfs / 20.0)) as u32
    }

    fn harris_loop() -> Agc {
        let mut agc = Agc::new(AgcKind::Harris, -30);
        agc.set_deadband_db(0);
        agc.set_blanking_limit(0);
        agc.set_alpha(0.5);
        agc.set_if_gain_db(24);
        agc
    }

    #[test]
    fn test_harris_converges_to_operating_point() {
        // Antenna at -36 dBFS, operating point -30 dBFS: the loop must
        // settle at 6 dB of IF gain.
        let mut agc = harris_loop();
        let mut gain = 24u32;
        let mut history = vec![gain];

        for _ in 0..20 {
            let magnitude = measured_magnitude(-36.0, gain);
            if let Some(next) = agc.step(magnitude, gain) {
                gain = next;
            }
            history.push(gain);
        }

        assert_eq!(gain, 6, "history {history:?}");
        // Monotone descent from above the operating point.
        for pair in history.windows(2) {
            assert!(pair[1] <= pair[0], "history {history:?}");
        }
    }

    #[test]
    fn test_gain_stays_bounded() {
        let mut agc = Agc::new(AgcKind::Harris, -10);
        agc.set_deadband_db(0);
        agc.set_blanking_limit(0);
        agc.set_alpha(0.9);
        let mut gain = agc.if_gain_db();

        // Silence drives the gain up; it must stop exactly at the rail.
        for _ in 0..100 {
            if let Some(next) = agc.step(0, gain) {
                gain = next;
            }
            assert!(gain <= MAX_IF_GAIN_DB);
        }
        assert_eq!(gain, MAX_IF_GAIN_DB);

        // A saturating signal drives it down to zero.
        for _ in 0..100 {
            if let Some(next) = agc.step(256, gain) {
                gain = next;
            }
        }
        assert_eq!(gain, 0);
    }

    #[test]
    fn test_monotone_under_constant_error_sign() {
        // While the measured level sits below the operating point and the
        // gain is off the top rail, the gain never decreases.
        let mut agc = harris_loop();
        let mut gain = 24u32;
        for _ in 0..30 {
            let magnitude = measured_magnitude(-60.0, gain);
            let before = gain;
            if let Some(next) = agc.step(magnitude, gain) {
                gain = next;
            }
            assert!(gain >= before);
        }
    }

    #[test]
    fn test_deadband_suppresses_small_errors() {
        let mut agc = Agc::new(AgcKind::Harris, -12);
        agc.set_deadband_db(2);
        agc.set_blanking_limit(0);
        // Magnitude 32 measures -12 dBFS: error 0. Magnitude 40 measures
        // -10 dBFS: error -2, inside the deadband.
        assert_eq!(agc.step(32, 24), None);
        assert_eq!(agc.step(40, 24), None);
        // -6 dBFS is outside it.
        assert!(agc.step(64, 24).is_some());
    }

    #[test]
    fn test_blanking_skips_after_adjustment() {
        let mut agc = Agc::new(AgcKind::Harris, -30);
        agc.set_deadband_db(0);
        agc.set_blanking_limit(2);
        agc.set_alpha(0.5);

        // First cycle adjusts.
        let first = agc.step(64, 24);
        assert!(first.is_some());
        let committed = first.unwrap();

        // Two blanked cycles follow, even with a large error present.
        assert_eq!(agc.step(0, committed), None);
        assert_eq!(agc.step(0, committed), None);
        // Third cycle runs again.
        assert!(agc.step(0, committed).is_some());
    }

    #[test]
    fn test_no_adjustment_means_no_blanking() {
        let mut agc = Agc::new(AgcKind::Harris, -12);
        agc.set_deadband_db(0);
        agc.set_blanking_limit(5);
        // Zero error: no adjustment, and the loop keeps running every
        // cycle (fast response).
        assert_eq!(agc.step(32, 24), None);
        assert_eq!(agc.step(32, 24), None);
        assert!(agc.step(128, 24).is_some());
    }

    #[test]
    fn test_drift_recovery_adopts_external_gain() {
        let mut agc = harris_loop();
        // Some other actor set the hardware to 40 dB.
        assert_eq!(agc.step(32, 40), None);
        assert_eq!(agc.if_gain_db(), 40);
        // The next cycle operates from the adopted value.
        let next = agc.step(measured_magnitude(-36.0, 40), 40);
        assert!(next.is_some());
        assert!(next.unwrap() < 40);
    }

    #[test]
    fn test_lowpass_converges_too() {
        let mut agc = Agc::new(AgcKind::Lowpass, -30);
        agc.set_deadband_db(0);
        agc.set_blanking_limit(0);
        agc.set_alpha(0.8);
        agc.set_if_gain_db(24);

        let mut gain = 24u32;
        for _ in 0..40 {
            let magnitude = measured_magnitude(-36.0, gain);
            if let Some(next) = agc.step(magnitude, gain) {
                gain = next;
            }
        }
        assert!(
            (5..=7).contains(&gain),
            "lowpass settled at {gain}, wanted about 6"
        );
    }
}
