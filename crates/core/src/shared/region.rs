use serde::{Deserialize, Serialize};

use crate::shared::constants::MIN_ROI_SIDE;

/// Axis-aligned rectangle in frame pixel coordinates.
///
/// Used for the profile's region of interest and for the best match
/// placement reported by the comparison engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Saturates instead of overflowing for regions read from config.
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Clamps the region to a `frame_w` x `frame_h` frame.
    ///
    /// The result always keeps at least one pixel inside the frame, so a
    /// region lying entirely outside collapses onto the nearest edge.
    pub fn clamp_to(&self, frame_w: u32, frame_h: u32) -> Region {
        let fw = frame_w as i32;
        let fh = frame_h as i32;
        let x0 = self.x.clamp(0, (fw - 1).max(0));
        let y0 = self.y.clamp(0, (fh - 1).max(0));
        let x1 = self.right().min(fw).max(x0 + 1);
        let y1 = self.bottom().min(fh).max(y0 + 1);
        Region::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Clamps a region of interest and rejects it when either side ends up
    /// below [`MIN_ROI_SIDE`] pixels.
    pub fn sanitize_roi(&self, frame_w: u32, frame_h: u32) -> Option<Region> {
        if self.width < MIN_ROI_SIDE || self.height < MIN_ROI_SIDE {
            return None;
        }
        let clamped = self.clamp_to(frame_w, frame_h);
        (clamped.width >= MIN_ROI_SIDE && clamped.height >= MIN_ROI_SIDE).then_some(clamped)
    }

    /// Rounds the origin down to a multiple of `grid`, keeping the size.
    pub fn snap_to_grid(&self, grid: i32) -> Region {
        if grid <= 1 {
            return *self;
        }
        Region::new(
            self.x.div_euclid(grid) * grid,
            self.y.div_euclid(grid) * grid,
            self.width,
            self.height,
        )
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Region {
        Region::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.width,
            self.height,
        )
    }
}
