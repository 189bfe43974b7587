use crate::shared::frame::Frame;

/// Capture-side capability the pipeline consumes.
///
/// Device access, decoding and pacing live behind this trait; the pipeline
/// only ever sees finished frames.
pub trait FrameSource: Send {
    /// Returns the current frame, or `Ok(None)` once the source has ended.
    fn current_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error + Send + Sync>>;
}
