//! Error types for the receive pipeline.

use ondas_dsp::FilterError;
use thiserror::Error;

/// Failures reported by the tuner driver.
///
/// `Io` during an AGC gain commit is treated as transient: audio continues
/// at the last-known gain and the next cycle retries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TunerError {
    /// The device is servicing another request.
    #[error("tuner is busy")]
    Busy,
    /// The device transaction failed.
    #[error("tuner i/o failure: {0}")]
    Io(String),
}

/// Errors surfaced by the receiver's control and framing surfaces.
///
/// Hot-path conditions (full queue, malformed producer block) are never
/// propagated as errors; they are converted to [`RxStats`] counters.
///
/// [`RxStats`]: crate::RxStats
#[derive(Debug, Error)]
pub enum RxError {
    /// A control parameter was outside its documented range. The receiver
    /// state is unchanged.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Which parameter was rejected.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// A filter chain could not be constructed.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// The tuner driver rejected an operation.
    #[error(transparent)]
    Tuner(#[from] TunerError),

    /// An I/Q payload had an odd byte count.
    #[error("i/q block has odd byte length {0}")]
    OddBlockLength(usize),

    /// An encoded block was shorter than its timestamp header.
    #[error("i/q block shorter than its 4-byte timestamp header")]
    TruncatedBlock,

    /// The DSP thread could not be spawned.
    #[error("failed to spawn dsp thread: {0}")]
    ThreadSpawn(String),
}

impl RxError {
    /// Shorthand for an [`RxError::InvalidParameter`].
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        RxError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
