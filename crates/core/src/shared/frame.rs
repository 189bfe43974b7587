use std::time::SystemTime;

use ndarray::ArrayView3;

/// A single captured frame: contiguous pixel bytes in row-major order.
///
/// Supported layouts are grayscale (1 channel), RGB (3) and RGBA (4).
/// Frames are immutable once built; overlays produce a new frame.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: u64,
    captured_at: SystemTime,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: u64) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
            captured_at: SystemTime::now(),
        }
    }

    /// Overrides the capture timestamp (sources that carry their own clock).
    pub fn with_captured_at(mut self, captured_at: SystemTime) -> Self {
        self.captured_at = captured_at;
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Position of the frame in its source stream.
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn captured_at(&self) -> SystemTime {
        self.captured_at
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
