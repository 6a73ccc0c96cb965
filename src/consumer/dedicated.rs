//! Consumers running on a worker thread of their own.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::consumer::Consumer;
use crate::{SampleBlock, SignalParams};

struct Shared {
    consumer: Mutex<Box<dyn Consumer>>,
    running: AtomicBool,
    dropped: AtomicU64,
}

/// Engine-side wrapper of a [`ExecutionMode::Dedicated`](crate::ExecutionMode::Dedicated) consumer.
///
/// Owns the sending end of a bounded block queue drained by a blocking-pool
/// worker. Control calls reach the consumer through the mutex it shares with
/// the worker, so a `stop` waits for an in-progress `accept` to return.
/// Dropping the wrapper closes the queue and lets the worker exit.
pub(crate) struct DedicatedConsumer {
    name: String,
    shared: Arc<Shared>,
    sender: mpsc::Sender<SampleBlock>,
}

impl DedicatedConsumer {
    /// Wraps `consumer` and spawns its worker. Must be called within a tokio runtime.
    pub(crate) fn spawn(consumer: Box<dyn Consumer>, queue_depth: usize) -> Self {
        let name = consumer.name().to_string();
        let shared = Arc::new(Shared {
            consumer: Mutex::new(consumer),
            running: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        });
        let (sender, mut receiver) = mpsc::channel::<SampleBlock>(queue_depth);

        let worker = shared.clone();
        tokio::task::spawn_blocking(move || {
            while let Some(block) = receiver.blocking_recv() {
                let mut consumer = worker.consumer.lock();
                // `stop` clears the flag before taking the lock, so a block
                // that raced it is discarded here.
                if worker.running.load(Ordering::Acquire) {
                    consumer.accept(&block.samples);
                }
            }
            tracing::trace!("dedicated consumer worker exiting");
        });

        Self {
            name,
            shared,
            sender,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Waits for an in-progress `accept` to return.
    pub(crate) fn on_signal_changed(&self, params: SignalParams) {
        self.shared.consumer.lock().on_signal_changed(params);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub(crate) fn start(&self) {
        if self.is_running() {
            return;
        }
        self.shared.consumer.lock().start();
        self.shared.running.store(true, Ordering::Release);
    }

    pub(crate) fn stop(&self) {
        if !self.is_running() {
            return;
        }
        self.shared.running.store(false, Ordering::Release);
        self.shared.consumer.lock().stop();
    }

    /// Queues a block for the worker without blocking.
    ///
    /// Blocks offered while stopped are ignored. Returns the total number of
    /// dropped blocks when the queue was full.
    pub(crate) fn offer(&self, block: &SampleBlock) -> Option<u64> {
        if !self.is_running() {
            return None;
        }
        match self.sender.try_send(block.clone()) {
            Ok(()) | Err(TrySendError::Closed(_)) => None,
            Err(TrySendError::Full(_)) => Some(self.shared.dropped.fetch_add(1, Ordering::Relaxed) + 1),
        }
    }

    pub(crate) fn dropped_blocks(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}
