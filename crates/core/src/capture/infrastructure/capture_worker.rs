use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::capture::domain::frame_source::FrameSource;
use crate::capture::frame_queue::FrameProducer;

/// Counters reported by the capture thread when it exits.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    pub frames_pushed: u64,
    pub read_errors: u64,
}

/// Runs `source` on a dedicated thread, pushing every frame into the queue.
///
/// The thread stops when the source ends, the consumer goes away, or
/// `cancelled` is set. Dropping the producer on exit closes the queue, so
/// the consumer drains what is left and then sees `QueueClosed`.
pub fn spawn_capture(
    mut source: Box<dyn FrameSource>,
    producer: FrameProducer,
    frame_interval: Option<Duration>,
    cancelled: Arc<AtomicBool>,
) -> JoinHandle<CaptureSummary> {
    std::thread::spawn(move || {
        let mut summary = CaptureSummary::default();
        while !cancelled.load(Ordering::Relaxed) {
            match source.current_frame() {
                Ok(Some(frame)) => {
                    if producer.push(frame).is_err() {
                        log::debug!("Capture stopping: consumer closed the queue");
                        break;
                    }
                    summary.frames_pushed += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    summary.read_errors += 1;
                    log::warn!("Frame source error: {e}");
                }
            }
            if let Some(interval) = frame_interval {
                std::thread::sleep(interval);
            }
        }
        log::debug!(
            "Capture finished: {} frames pushed, {} dropped by the queue",
            summary.frames_pushed,
            producer.dropped()
        );
        summary
    })
}
