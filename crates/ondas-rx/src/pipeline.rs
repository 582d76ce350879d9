//! Pipeline orchestrator.
//!
//! Wires squelch, AGC, and the selected demodulator into the per-block
//! processing order: squelch -> AGC -> demodulate -> sink. The pipeline is
//! the sole mutator of all filter and demodulator state; configuration
//! changes are picked up from the [`ConfigCell`] at block boundaries only.

use std::sync::Arc;
use std::sync::mpsc::Sender;

use ondas_demod::{Agc, DemodMode, Demodulator, SignalEvent, SignalTracker};

use crate::block::{IqBlock, TIMESTAMP_STEP};
use crate::control::{ConfigCell, RxConfig};
use crate::error::RxError;
use crate::queue::RxStats;
use crate::tuner::SharedTuner;

/// PCM delivery capability, handed to the pipeline at construction.
///
/// The sink is called on the DSP thread and must not block for long.
pub trait PcmSink: Send {
    /// Accept one block of 8 kHz mono PCM.
    fn on_pcm(&mut self, pcm: &[i16]);
}

impl<F: FnMut(&[i16]) + Send> PcmSink for F {
    fn on_pcm(&mut self, pcm: &[i16]) {
        self(pcm);
    }
}

/// Diagnostic events the control surface can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxEvent {
    /// The squelch opened.
    SignalStart,
    /// The squelch closed (the tail block was still demodulated).
    SignalEnd,
    /// The AGC committed a new IF gain.
    GainAdjusted(u32),
    /// The demodulation mode changed.
    ModeChanged(DemodMode),
}

/// The receive pipeline.
pub struct Pipeline {
    demodulator: Demodulator,
    tracker: SignalTracker,
    agc: Agc,
    agc_enabled: bool,
    tuner: SharedTuner,
    sink: Box<dyn PcmSink>,
    events: Option<Sender<RxEvent>>,
    cell: ConfigCell,
    config_version: u64,
    stats: Arc<RxStats>,
    signed: Vec<i8>,
    pcm: Vec<i16>,
    last_timestamp: Option<u32>,
}

impl Pipeline {
    /// Build a pipeline from an initial configuration.
    pub fn new(
        cell: ConfigCell,
        tuner: SharedTuner,
        sink: Box<dyn PcmSink>,
        stats: Arc<RxStats>,
    ) -> Result<Self, RxError> {
        let config = cell.read();
        let mut agc = Agc::new(config.agc_kind, config.agc_operating_point_dbfs);
        agc.set_deadband_db(config.agc_deadband_db);
        agc.set_blanking_limit(config.agc_blanking_limit);
        agc.set_alpha(config.agc_alpha);

        let mut demodulator = Demodulator::new(config.demod_mode)?;
        if let Some(gain) = config.demodulator_gain {
            demodulator.set_gain(gain);
        }

        Ok(Self {
            demodulator,
            tracker: SignalTracker::new(config.squelch_threshold_dbfs),
            agc,
            agc_enabled: config.agc_enabled,
            tuner,
            sink,
            events: None,
            cell,
            config_version: 0,
            stats,
            signed: Vec::new(),
            pcm: Vec::new(),
            last_timestamp: None,
        })
    }

    /// Subscribe a diagnostic event channel.
    pub fn set_event_sender(&mut self, events: Sender<RxEvent>) {
        self.events = Some(events);
    }

    /// Current demodulation mode.
    pub fn demod_mode(&self) -> DemodMode {
        self.demodulator.mode()
    }

    /// Process one block: squelch, AGC, demodulation, PCM delivery.
    ///
    /// Never fails; malformed input was already rejected at the enqueue
    /// side. Returns the payload buffer for recycling.
    pub fn accept_block(&mut self, block: IqBlock) -> Vec<u8> {
        self.apply_pending_config();
        self.check_timestamp(block.timestamp, block.sample_pairs());

        block.payload_to_signed(&mut self.signed);

        let if_gain_db = self.read_if_gain();
        let event = self.tracker.run(&self.signed, if_gain_db);
        match event {
            SignalEvent::StartOfSignal => self.emit(RxEvent::SignalStart),
            SignalEvent::EndOfSignal => self.emit(RxEvent::SignalEnd),
            _ => {}
        }

        // The AGC sees the magnitude of the block being demodulated, not
        // the next one.
        if self.agc_enabled {
            if let Some(gain) = self.agc.step(self.tracker.last_magnitude(), if_gain_db) {
                self.commit_if_gain(gain);
            }
        }

        if event.forwards_block() {
            self.pcm.clear();
            self.demodulator.demodulate(&self.signed, &mut self.pcm);
            if !self.pcm.is_empty() {
                self.sink.on_pcm(&self.pcm);
            }
        }

        self.stats.note_processed();
        block.into_payload()
    }

    /// Switch the demodulation mode, resetting only the new chain.
    pub fn set_demod_mode(&mut self, mode: DemodMode) -> Result<(), RxError> {
        if mode == self.demodulator.mode() {
            return Ok(());
        }
        self.demodulator = Demodulator::new(mode)?;
        if let Some(gain) = self.cell.read().demodulator_gain {
            self.demodulator.set_gain(gain);
        }
        tracing::info!(%mode, "demodulator switched");
        self.emit(RxEvent::ModeChanged(mode));
        Ok(())
    }

    /// Zero all filter state, the discriminator phase, the squelch state,
    /// and the AGC blanking counter.
    pub fn reset(&mut self) {
        self.demodulator.reset();
        self.tracker.reset();
        self.agc.reset_blanking();
        self.last_timestamp = None;
    }

    /// Apply any configuration published since the last block.
    fn apply_pending_config(&mut self) {
        let Some((config, version)) = self.cell.poll(self.config_version) else {
            return;
        };
        self.config_version = version;
        self.apply_config(&config);
    }

    fn apply_config(&mut self, config: &RxConfig) {
        self.tracker
            .set_threshold_dbfs(config.squelch_threshold_dbfs);

        self.agc_enabled = config.agc_enabled;
        self.agc.set_kind(config.agc_kind);
        self.agc.set_operating_point_dbfs(config.agc_operating_point_dbfs);
        self.agc.set_deadband_db(config.agc_deadband_db);
        self.agc.set_blanking_limit(config.agc_blanking_limit);
        self.agc.set_alpha(config.agc_alpha);

        if let Some(gain) = config.demodulator_gain {
            self.demodulator.set_gain(gain);
        }

        if config.demod_mode != self.demodulator.mode() {
            // A bad filter geometry cannot happen with the built-in
            // coefficient tables; keep the old chain if it somehow does.
            if let Err(error) = self.set_demod_mode(config.demod_mode) {
                tracing::error!(%error, "demodulator switch failed");
            }
        }
    }

    /// Coherence check on producer timestamps.
    fn check_timestamp(&mut self, timestamp: u32, sample_pairs: usize) {
        if let Some(last) = self.last_timestamp {
            let expected = last.wrapping_add(TIMESTAMP_STEP);
            if timestamp != expected && sample_pairs > 0 {
                self.stats.note_timestamp_gap();
                tracing::debug!(timestamp, expected, "timestamp gap");
            }
        }
        self.last_timestamp = Some(timestamp);
    }

    fn read_if_gain(&self) -> u32 {
        self.tuner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .if_gain_db()
    }

    fn commit_if_gain(&mut self, gain_db: u32) {
        let result = self
            .tuner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .set_if_gain_db(0, gain_db);
        match result {
            Ok(()) => {
                tracing::debug!(gain_db, "agc committed if gain");
                self.emit(RxEvent::GainAdjusted(gain_db));
            }
            Err(error) => {
                // Transient: audio continues at the last-known gain and
                // the next cycle retries.
                tracing::warn!(%error, gain_db, "agc gain commit failed");
            }
        }
    }

    fn emit(&self, event: RxEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}
