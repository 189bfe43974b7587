use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use thiserror::Error;

use crate::shared::frame::Frame;

/// The other side of the queue is gone.
///
/// For the producer this means the consumer was dropped; for the consumer
/// it means the producer was dropped and every pending frame was drained.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("frame queue closed")]
pub struct QueueClosed;

struct QueueShared {
    capacity: usize,
    dropped: AtomicU64,
    consumer_gone: AtomicBool,
}

/// Creates a bounded single-producer/single-consumer frame queue.
///
/// When full, a push evicts the oldest pending frame instead of blocking,
/// so the consumer always sees the freshest `capacity` frames in arrival
/// order. A capacity of zero is treated as one.
pub fn frame_queue(capacity: usize) -> (FrameProducer, FrameConsumer) {
    let capacity = capacity.max(1);
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    let shared = Arc::new(QueueShared {
        capacity,
        dropped: AtomicU64::new(0),
        consumer_gone: AtomicBool::new(false),
    });
    let producer = FrameProducer {
        tx,
        overflow: rx.clone(),
        shared: shared.clone(),
    };
    let consumer = FrameConsumer { rx, shared };
    (producer, consumer)
}

/// Capture-side handle. Dropping it closes the queue once drained.
pub struct FrameProducer {
    tx: Sender<Frame>,
    // Producer-side receiver used only to evict the oldest frame on overflow.
    overflow: Receiver<Frame>,
    shared: Arc<QueueShared>,
}

impl FrameProducer {
    /// Enqueues a frame without ever blocking the caller.
    pub fn push(&self, frame: Frame) -> Result<(), QueueClosed> {
        if self.shared.consumer_gone.load(Ordering::Acquire) {
            return Err(QueueClosed);
        }
        let mut frame = frame;
        loop {
            match self.tx.try_send(frame) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(rejected)) => {
                    // The consumer may win the race for the oldest slot; only
                    // frames actually taken here count as dropped.
                    if self.overflow.try_recv().is_ok() {
                        self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    frame = rejected;
                }
                Err(TrySendError::Disconnected(_)) => return Err(QueueClosed),
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

/// Detection-side handle.
pub struct FrameConsumer {
    rx: Receiver<Frame>,
    shared: Arc<QueueShared>,
}

impl FrameConsumer {
    /// Blocks until a frame arrives. Pending frames are still delivered
    /// after the producer is dropped; `QueueClosed` follows the last one.
    pub fn pop(&self) -> Result<Frame, QueueClosed> {
        self.rx.recv().map_err(|_| QueueClosed)
    }

    /// Like [`FrameConsumer::pop`] but gives up after `timeout`, returning
    /// `Ok(None)` so the caller can check for cancellation.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<Option<Frame>, QueueClosed> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(QueueClosed),
        }
    }

    pub fn try_pop(&self) -> Result<Option<Frame>, QueueClosed> {
        match self.rx.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(QueueClosed),
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Frames evicted by overflow since the queue was created.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for FrameConsumer {
    fn drop(&mut self) {
        self.shared.consumer_gone.store(true, Ordering::Release);
    }
}
