//! Receiver engine: owns the DSP thread and the queue plumbing.
//!
//! The engine spawns the consumer thread, which blocks on the queue with a
//! bounded wait so cancellation is observed within a second even when the
//! producer stalls. All DSP state lives on that thread; the rest of the
//! world interacts through the [`BlockSender`], the [`ControlHandle`], and
//! the PCM sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::block::IQ_BLOCK_BYTES;
use crate::control::{ConfigCell, ControlHandle, RxConfig};
use crate::error::RxError;
use crate::pipeline::{PcmSink, Pipeline};
use crate::queue::{
    BlockPool, BlockReceiver, BlockSender, Dequeue, QUEUE_CAPACITY, RxStats, block_queue,
};
use crate::tuner::{SharedTuner, Tuner, shared};

/// Bounded dequeue wait; cancellation is observed at this granularity.
const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(1);

/// A running receiver.
pub struct RxEngine {
    sender: BlockSender,
    control: ControlHandle,
    stats: Arc<RxStats>,
    pool: Arc<BlockPool>,
    time_to_exit: Arc<AtomicBool>,
    dsp_thread: Option<JoinHandle<()>>,
}

impl RxEngine {
    /// Start the receiver: build the pipeline and spawn the DSP thread.
    pub fn start(
        config: RxConfig,
        tuner: Box<dyn Tuner>,
        sink: Box<dyn PcmSink>,
    ) -> Result<Self, RxError> {
        let tuner: SharedTuner = shared(tuner);
        let cell = ConfigCell::new(config);
        let stats = Arc::new(RxStats::default());
        let pool = Arc::new(BlockPool::new(IQ_BLOCK_BYTES));
        let (sender, receiver) = block_queue(QUEUE_CAPACITY, Arc::clone(&pool), Arc::clone(&stats));

        let pipeline = Pipeline::new(
            cell.clone(),
            Arc::clone(&tuner),
            sink,
            Arc::clone(&stats),
        )?;

        let control = ControlHandle::new(cell, tuner);
        let time_to_exit = Arc::new(AtomicBool::new(false));

        let dsp_thread = {
            let time_to_exit = Arc::clone(&time_to_exit);
            let pool = Arc::clone(&pool);
            std::thread::Builder::new()
                .name("ondas-dsp".into())
                .spawn(move || consumer_loop(pipeline, &receiver, &pool, &time_to_exit))
                .map_err(|e| RxError::ThreadSpawn(e.to_string()))?
        };

        Ok(Self {
            sender,
            control,
            stats,
            pool,
            time_to_exit,
            dsp_thread: Some(dsp_thread),
        })
    }

    /// Producer-side handle for enqueueing raw blocks.
    pub fn block_sender(&self) -> BlockSender {
        self.sender.clone()
    }

    /// Parameter control handle.
    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    /// Receiver statistics.
    pub fn stats(&self) -> &RxStats {
        &self.stats
    }

    /// Buffer pool for producer-side payload buffers.
    pub fn pool(&self) -> &Arc<BlockPool> {
        &self.pool
    }

    /// Request cancellation and join the DSP thread.
    ///
    /// The dequeue wait is bounded, so this returns within about a
    /// second even when no data is flowing.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.time_to_exit.store(true, Ordering::SeqCst);
        if let Some(handle) = self.dsp_thread.take() {
            if handle.join().is_err() {
                tracing::error!("dsp thread panicked");
            }
        }
    }
}

impl Drop for RxEngine {
    fn drop(&mut self) {
        if self.dsp_thread.is_some() {
            self.stop();
        }
    }
}

fn consumer_loop(
    mut pipeline: Pipeline,
    receiver: &BlockReceiver,
    pool: &BlockPool,
    time_to_exit: &AtomicBool,
) {
    tracing::info!("dsp task started");

    while !time_to_exit.load(Ordering::SeqCst) {
        match receiver.dequeue_timeout(DEQUEUE_TIMEOUT) {
            Dequeue::Block(block) => {
                let buffer = pipeline.accept_block(block);
                pool.release(buffer);
            }
            Dequeue::TimedOut => {
                // Producer stalled; loop to observe cancellation.
            }
            Dequeue::Disconnected => break,
        }
    }

    // Return whatever is still queued to the pool.
    for block in receiver.drain() {
        pool.release(block.into_payload());
    }

    tracing::info!("dsp task exiting");
}
