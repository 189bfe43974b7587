use crate::comparison::domain::feature_map::luma;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

const ROI_COLOR: [u8; 3] = [96, 96, 96];
const ROI_THICKNESS: i32 = 1;
const MATCH_COLOR: [u8; 3] = [0, 255, 0];
const MATCH_THICKNESS: i32 = 2;

/// Builds the match evidence image: the frame as grayscale RGB with the ROI
/// outlined in grey and the match region outlined in green.
///
/// Both regions are in full-frame coordinates; parts outside the frame are
/// clipped.
pub fn render_debug_frame(frame: &Frame, roi: Option<Region>, matched: Option<Region>) -> Frame {
    let gray = luma(frame);
    let mut data = Vec::with_capacity(gray.len() * 3);
    for &v in gray.iter() {
        data.extend_from_slice(&[v, v, v]);
    }

    let width = frame.width();
    let height = frame.height();
    if let Some(roi) = roi {
        draw_outline(&mut data, width, height, roi, ROI_COLOR, ROI_THICKNESS);
    }
    if let Some(region) = matched {
        draw_outline(&mut data, width, height, region, MATCH_COLOR, MATCH_THICKNESS);
    }

    Frame::new(data, width, height, 3, frame.index()).with_captured_at(frame.captured_at())
}

fn draw_outline(
    data: &mut [u8],
    width: u32,
    height: u32,
    region: Region,
    color: [u8; 3],
    thickness: i32,
) {
    if region.width <= 0 || region.height <= 0 {
        return;
    }
    let w = width as i32;
    let h = height as i32;
    let inner_x0 = region.x.saturating_add(thickness);
    let inner_y0 = region.y.saturating_add(thickness);
    let inner_x1 = region.right().saturating_sub(thickness);
    let inner_y1 = region.bottom().saturating_sub(thickness);

    for y in region.y.max(0)..region.bottom().min(h) {
        for x in region.x.max(0)..region.right().min(w) {
            let on_border = x < inner_x0 || x >= inner_x1 || y < inner_y0 || y >= inner_y1;
            if on_border {
                let idx = (y as usize * width as usize + x as usize) * 3;
                data[idx..idx + 3].copy_from_slice(&color);
            }
        }
    }
}
