//! Squelch / signal-presence tracker.
//!
//! Each I/Q block is reduced to its average `|I| + |Q|` magnitude,
//! converted to dBFS, and referenced back to the antenna input by backing
//! out the current IF gain. A two-state machine with 3 dB of hysteresis
//! classifies the block and reports edge events, so a receiver can open on
//! `StartOfSignal`, stay open through `SignalPresent`, and still forward
//! the `EndOfSignal` block as a squelch tail.

use ondas_dsp::{DbfsTable, average_magnitude};

/// Hysteresis below the open threshold before the squelch closes.
pub const SQUELCH_HYSTERESIS_DB: i32 = 3;

/// Per-block squelch classification.
///
/// Exactly one event is produced per block, and the tracker makes at most
/// one state transition per block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// No signal; the block should not be demodulated.
    Noise,
    /// First block at or above the threshold.
    StartOfSignal,
    /// Signal continues (within hysteresis of the threshold).
    SignalPresent,
    /// Signal just dropped out; this block is still forwarded as the
    /// squelch tail.
    EndOfSignal,
}

impl SignalEvent {
    /// Whether a block with this event reaches the demodulator.
    #[inline]
    pub fn forwards_block(self) -> bool {
        !matches!(self, SignalEvent::Noise)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackerState {
    Noise,
    Active,
}

/// Block-rate signal tracker with hysteresis.
#[derive(Debug, Clone)]
pub struct SignalTracker {
    threshold_dbfs: i32,
    state: TrackerState,
    last_magnitude: u32,
    dbfs_table: DbfsTable,
}

impl SignalTracker {
    /// Create a tracker. A threshold of -200 dBFS lets every block pass.
    pub fn new(threshold_dbfs: i32) -> Self {
        Self {
            threshold_dbfs,
            state: TrackerState::Noise,
            last_magnitude: 0,
            dbfs_table: DbfsTable::new(),
        }
    }

    /// Detection threshold in dBFS, referenced to the antenna input.
    pub fn threshold_dbfs(&self) -> i32 {
        self.threshold_dbfs
    }

    /// Replace the detection threshold.
    pub fn set_threshold_dbfs(&mut self, threshold_dbfs: i32) {
        self.threshold_dbfs = threshold_dbfs;
    }

    /// Average magnitude of the most recent block.
    pub fn last_magnitude(&self) -> u32 {
        self.last_magnitude
    }

    /// Drop back to the no-signal state.
    pub fn reset(&mut self) {
        self.state = TrackerState::Noise;
        self.last_magnitude = 0;
    }

    /// Classify one block of interleaved signed I/Q samples.
    ///
    /// `if_gain_db` is backed out of the measured level so the threshold
    /// stays referenced to the antenna regardless of the AGC's setting.
    pub fn run(&mut self, iq: &[i8], if_gain_db: u32) -> SignalEvent {
        let magnitude = average_magnitude(iq);
        self.last_magnitude = magnitude;

        let level_dbfs = self.dbfs_table.dbfs(magnitude) - if_gain_db as i32;

        match self.state {
            TrackerState::Noise => {
                if level_dbfs >= self.threshold_dbfs {
                    self.state = TrackerState::Active;
                    SignalEvent::StartOfSignal
                } else {
                    SignalEvent::Noise
                }
            }
            TrackerState::Active => {
                if level_dbfs >= self.threshold_dbfs - SQUELCH_HYSTERESIS_DB {
                    SignalEvent::SignalPresent
                } else {
                    self.state = TrackerState::Noise;
                    SignalEvent::EndOfSignal
                }
            }
        }
    }
}
