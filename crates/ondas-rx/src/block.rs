//! I/Q block framing.
//!
//! On the wire a block is a 4-byte little-endian u32 sample-pair timestamp
//! followed by interleaved offset-binary bytes `I,Q,I,Q,...`
//! (`signed = byte - 128`). In memory the timestamp and payload are kept
//! separate so payload buffers can cycle through the [`BlockPool`].
//!
//! [`BlockPool`]: crate::queue::BlockPool

use crate::error::RxError;

/// DSP block size in payload bytes. This is the single named constant the
/// producer's DMA size, the pool buffers, and the short-block accounting
/// all agree on.
pub const IQ_BLOCK_BYTES: usize = 16_384;

/// Encoded-block timestamp header size.
pub const TIMESTAMP_HEADER_BYTES: usize = 4;

/// Timestamp advance between consecutive full blocks, in sample pairs.
pub const TIMESTAMP_STEP: u32 = (IQ_BLOCK_BYTES / 2 - 2) as u32;

/// One block of raw I/Q with its capture timestamp.
///
/// The payload is owned by exactly one component at a time: the producer
/// fills it, the queue carries it, the pipeline consumes it and hands the
/// buffer back to the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IqBlock {
    /// Monotonic timestamp in sample-pair units.
    pub timestamp: u32,
    payload: Vec<u8>,
}

impl IqBlock {
    /// Wrap a payload, rejecting odd byte counts.
    pub fn new(timestamp: u32, payload: Vec<u8>) -> Result<Self, RxError> {
        if payload.len() % 2 != 0 {
            return Err(RxError::OddBlockLength(payload.len()));
        }
        Ok(Self { timestamp, payload })
    }

    /// Offset-binary payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Number of complete I/Q sample pairs.
    pub fn sample_pairs(&self) -> usize {
        self.payload.len() / 2
    }

    /// Give the payload buffer back (for return to a pool).
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Serialize to the wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(TIMESTAMP_HEADER_BYTES + self.payload.len());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Parse from the wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, RxError> {
        if bytes.len() < TIMESTAMP_HEADER_BYTES {
            return Err(RxError::TruncatedBlock);
        }
        let (header, payload) = bytes.split_at(TIMESTAMP_HEADER_BYTES);
        let timestamp = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        Self::new(timestamp, payload.to_vec())
    }

    /// Convert the offset-binary payload to signed samples, appending to
    /// `signed`.
    pub fn payload_to_signed(&self, signed: &mut Vec<i8>) {
        signed.clear();
        signed.reserve(self.payload.len());
        for &byte in &self.payload {
            signed.push((i16::from(byte) - 128) as i8);
        }
    }
}
