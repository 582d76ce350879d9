//! Bounded block queue and payload buffer pool.
//!
//! The producer thread hands blocks to the DSP thread through a bounded
//! SPSC channel. Back-pressure policy is drop-newest: when the consumer
//! falls behind, `try_enqueue` discards the arriving block (returning its
//! buffer to the pool) and counts the drop, so the producer never blocks
//! the device callback.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, TrySendError, sync_channel};
use std::time::Duration;

use crate::block::{IQ_BLOCK_BYTES, IqBlock};

/// Queue depth, in blocks.
pub const QUEUE_CAPACITY: usize = 64;

/// Receiver statistics. All counters are monotonic; the hot path only
/// ever increments them.
#[derive(Debug, Default)]
pub struct RxStats {
    enqueued: AtomicU64,
    processed: AtomicU64,
    dropped_full: AtomicU64,
    short_blocks: AtomicU64,
    odd_length_blocks: AtomicU64,
    timestamp_gaps: AtomicU64,
}

/// Point-in-time copy of [`RxStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxStatsSnapshot {
    /// Blocks accepted into the queue.
    pub enqueued: u64,
    /// Blocks the DSP task consumed.
    pub processed: u64,
    /// Blocks dropped because the queue was full.
    pub dropped_full: u64,
    /// Blocks shorter than [`IQ_BLOCK_BYTES`].
    pub short_blocks: u64,
    /// Malformed producer blocks rejected for an odd byte count.
    pub odd_length_blocks: u64,
    /// Blocks whose timestamp did not follow its predecessor.
    pub timestamp_gaps: u64,
}

impl RxStats {
    pub(crate) fn note_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_dropped_full(&self) {
        self.dropped_full.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_short_block(&self) {
        self.short_blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_odd_length(&self) {
        self.odd_length_blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_timestamp_gap(&self) {
        self.timestamp_gaps.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the counters.
    pub fn snapshot(&self) -> RxStatsSnapshot {
        RxStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            dropped_full: self.dropped_full.load(Ordering::Relaxed),
            short_blocks: self.short_blocks.load(Ordering::Relaxed),
            odd_length_blocks: self.odd_length_blocks.load(Ordering::Relaxed),
            timestamp_gaps: self.timestamp_gaps.load(Ordering::Relaxed),
        }
    }
}

/// Free list of payload buffers.
///
/// Buffers cycle producer -> queue -> pipeline -> pool; steady state
/// allocates nothing.
#[derive(Debug)]
pub struct BlockPool {
    free: Mutex<Vec<Vec<u8>>>,
    buffer_capacity: usize,
}

impl BlockPool {
    /// Create a pool handing out buffers of `buffer_capacity` bytes.
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            buffer_capacity,
        }
    }

    /// Take a cleared buffer from the pool, allocating if empty.
    pub fn acquire(&self) -> Vec<u8> {
        let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
        free.pop()
            .unwrap_or_else(|| Vec::with_capacity(self.buffer_capacity))
    }

    /// Return a buffer for reuse.
    pub fn release(&self, mut buffer: Vec<u8>) {
        buffer.clear();
        let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
        // Bound the free list so a burst of drops cannot pin memory
        // forever.
        if free.len() < 2 * QUEUE_CAPACITY {
            free.push(buffer);
        }
    }
}

impl Default for BlockPool {
    fn default() -> Self {
        Self::new(IQ_BLOCK_BYTES)
    }
}

/// Producer side of the block queue.
#[derive(Debug, Clone)]
pub struct BlockSender {
    tx: SyncSender<IqBlock>,
    pool: Arc<BlockPool>,
    stats: Arc<RxStats>,
}

impl BlockSender {
    /// Offer a block to the DSP task. Never blocks.
    ///
    /// Returns `true` when the block was queued. On a full queue the block
    /// is dropped (drop-newest), its buffer is recycled, and the drop is
    /// counted.
    pub fn try_enqueue(&self, block: IqBlock) -> bool {
        if block.payload().len() < IQ_BLOCK_BYTES {
            self.stats.note_short_block();
        }

        match self.tx.try_send(block) {
            Ok(()) => {
                self.stats.note_enqueued();
                true
            }
            Err(TrySendError::Full(block)) => {
                self.stats.note_dropped_full();
                tracing::warn!(
                    timestamp = block.timestamp,
                    "i/q queue full, dropping newest block"
                );
                self.pool.release(block.into_payload());
                false
            }
            Err(TrySendError::Disconnected(block)) => {
                self.pool.release(block.into_payload());
                false
            }
        }
    }

    /// Frame a raw payload and offer it to the DSP task.
    ///
    /// The producer-side entry point for unframed device data: a payload
    /// with an odd byte count never forms a block; it is dropped, its
    /// buffer recycled, and the reject counted.
    pub fn try_enqueue_payload(&self, timestamp: u32, payload: Vec<u8>) -> bool {
        if payload.len() % 2 != 0 {
            self.stats.note_odd_length();
            tracing::warn!(
                timestamp,
                len = payload.len(),
                "rejecting odd-length i/q payload"
            );
            self.pool.release(payload);
            return false;
        }
        match IqBlock::new(timestamp, payload) {
            Ok(block) => self.try_enqueue(block),
            Err(_) => false,
        }
    }

    /// Buffer pool shared with the consumer.
    pub fn pool(&self) -> &Arc<BlockPool> {
        &self.pool
    }
}

/// Consumer side of the block queue.
#[derive(Debug)]
pub struct BlockReceiver {
    rx: Receiver<IqBlock>,
}

/// What a bounded dequeue wait produced.
#[derive(Debug)]
pub enum Dequeue {
    /// A block arrived.
    Block(IqBlock),
    /// The wait timed out; check for cancellation and wait again.
    TimedOut,
    /// Every producer handle is gone.
    Disconnected,
}

impl BlockReceiver {
    /// Wait for a block, bounded by `timeout` so cancellation can be
    /// observed between waits.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Dequeue {
        match self.rx.recv_timeout(timeout) {
            Ok(block) => Dequeue::Block(block),
            Err(RecvTimeoutError::Timeout) => Dequeue::TimedOut,
            Err(RecvTimeoutError::Disconnected) => Dequeue::Disconnected,
        }
    }

    /// Drain whatever is queued without waiting (shutdown path).
    pub fn drain(&self) -> Vec<IqBlock> {
        let mut blocks = Vec::new();
        while let Ok(block) = self.rx.try_recv() {
            blocks.push(block);
        }
        blocks
    }
}

/// Build the queue pair over a shared pool and stats block.
pub fn block_queue(
    capacity: usize,
    pool: Arc<BlockPool>,
    stats: Arc<RxStats>,
) -> (BlockSender, BlockReceiver) {
    let (tx, rx) = sync_channel(capacity);
    (
        BlockSender { tx, pool, stats },
        BlockReceiver { rx },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_block(timestamp: u32) -> IqBlock {
        IqBlock::new(timestamp, vec![128; IQ_BLOCK_BYTES]).unwrap()
    }

    #[test]
    fn test_drop_newest_on_full() {
        let pool = Arc::new(BlockPool::default());
        let stats = Arc::new(RxStats::default());
        let (sender, receiver) = block_queue(2, pool, Arc::clone(&stats));

        assert!(sender.try_enqueue(filled_block(1)));
        assert!(sender.try_enqueue(filled_block(2)));
        // Queue full: the newest block is the one discarded.
        assert!(!sender.try_enqueue(filled_block(3)));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.enqueued, 2);
        assert_eq!(snapshot.dropped_full, 1);

        match receiver.dequeue_timeout(Duration::from_millis(10)) {
            Dequeue::Block(block) => assert_eq!(block.timestamp, 1),
            other => panic!("expected a block, got {other:?}"),
        }
        match receiver.dequeue_timeout(Duration::from_millis(10)) {
            Dequeue::Block(block) => assert_eq!(block.timestamp, 2),
            other => panic!("expected a block, got {other:?}"),
        }
    }

    #[test]
    fn test_dequeue_times_out() {
        let pool = Arc::new(BlockPool::default());
        let stats = Arc::new(RxStats::default());
        let (_sender, receiver) = block_queue(2, pool, stats);

        let start = std::time::Instant::now();
        assert!(matches!(
            receiver.dequeue_timeout(Duration::from_millis(20)),
            Dequeue::TimedOut
        ));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_disconnected_when_sender_dropped() {
        let pool = Arc::new(BlockPool::default());
        let stats = Arc::new(RxStats::default());
        let (sender, receiver) = block_queue(2, pool, stats);
        drop(sender);
        assert!(matches!(
            receiver.dequeue_timeout(Duration::from_millis(10)),
            Dequeue::Disconnected
        ));
    }

    #[test]
    fn test_short_block_counted() {
        let pool = Arc::new(BlockPool::default());
        let stats = Arc::new(RxStats::default());
        let (sender, _receiver) = block_queue(4, pool, Arc::clone(&stats));

        sender.try_enqueue(IqBlock::new(0, vec![128; 512]).unwrap());
        assert_eq!(stats.snapshot().short_blocks, 1);
    }

    #[test]
    fn test_odd_payload_rejected_and_counted() {
        let pool = Arc::new(BlockPool::default());
        let stats = Arc::new(RxStats::default());
        let (sender, receiver) = block_queue(4, Arc::clone(&pool), Arc::clone(&stats));

        assert!(!sender.try_enqueue_payload(0, vec![128; 4097]));
        assert_eq!(stats.snapshot().odd_length_blocks, 1);
        assert_eq!(stats.snapshot().enqueued, 0);
        assert!(matches!(
            receiver.dequeue_timeout(Duration::from_millis(5)),
            Dequeue::TimedOut
        ));
        // The rejected buffer went back to the pool.
        assert!(pool.acquire().capacity() >= 4097);
    }

    #[test]
    fn test_pool_recycles_buffers() {
        let pool = BlockPool::new(64);
        let mut buffer = pool.acquire();
        buffer.extend_from_slice(&[1, 2, 3]);
        pool.release(buffer);

        let again = pool.acquire();
        assert!(again.is_empty());
        assert!(again.capacity() >= 3);
    }
}
