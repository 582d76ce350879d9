//! Ondas RX - the receive pipeline of the ondas software-defined radio.
//!
//! A producer (the tuner device driver, or a file reader) pushes
//! fixed-size blocks of 8-bit offset-binary I/Q samples into a bounded
//! queue; the DSP thread dequeues them and drives the pipeline, which
//! emits 8 kHz PCM to a sink callback:
//!
//! ```text
//! producer -> [IqQueue] -> squelch -> AGC -> demodulator -> PcmSink
//! ```
//!
//! # Concurrency model
//!
//! - The **producer** calls [`BlockSender::try_enqueue`] and never
//!   blocks; a full queue drops the newest block.
//! - The **DSP thread** (spawned by [`RxEngine`]) owns every piece of
//!   filter state. Nothing else touches it.
//! - The **control surface** ([`ControlHandle`]) validates parameters and
//!   publishes them through a versioned cell; the DSP thread applies
//!   changes at block boundaries only.
//! - The tuner's IF-gain register is shared between the AGC and the
//!   control surface, serialized by the [`SharedTuner`] mutex; the AGC
//!   reads the register back each cycle and adopts external changes.
//!
//! # Example
//!
//! ```rust,no_run
//! use ondas_demod::DemodMode;
//! use ondas_rx::{IqBlock, RxConfig, RxEngine, SampleClock, StubTuner, IQ_BLOCK_BYTES};
//!
//! let config = RxConfig {
//!     demod_mode: DemodMode::Fm,
//!     ..RxConfig::default()
//! };
//! let engine = RxEngine::start(
//!     config,
//!     Box::new(StubTuner::new()),
//!     Box::new(|pcm: &[i16]| {
//!         // deliver to the audio device or a file
//!         let _ = pcm;
//!     }),
//! )
//! .unwrap();
//!
//! let sender = engine.block_sender();
//! let mut clock = SampleClock::new();
//! let mut payload = engine.pool().acquire();
//! payload.resize(IQ_BLOCK_BYTES, 128);
//! sender.try_enqueue(IqBlock::new(clock.next(), payload).unwrap());
//!
//! engine.shutdown();
//! ```

pub mod block;
pub mod control;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod queue;
pub mod tuner;

pub use block::{IQ_BLOCK_BYTES, IqBlock, TIMESTAMP_HEADER_BYTES, TIMESTAMP_STEP};
pub use control::{ConfigCell, ControlHandle, RxConfig, SUPPORTED_SAMPLE_RATES};
pub use engine::RxEngine;
pub use error::{RxError, TunerError};
pub use pipeline::{PcmSink, Pipeline, RxEvent};
pub use queue::{
    BlockPool, BlockReceiver, BlockSender, Dequeue, QUEUE_CAPACITY, RxStats, RxStatsSnapshot,
    block_queue,
};
pub use tuner::{AUTO_GAIN_DB, MAX_IF_GAIN_DB, SampleClock, SharedTuner, StubTuner, Tuner, shared};
