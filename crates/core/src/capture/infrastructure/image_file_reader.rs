use std::path::Path;

use crate::shared::frame::Frame;

/// Decodes an image file into an RGB [`Frame`] using the `image` crate.
///
/// Alpha is discarded and grayscale sources are expanded, so a file and
/// the in-memory buffer it was written from produce identical RGB bytes.
pub struct ImageFileReader;

impl ImageFileReader {
    pub fn read(path: &Path, index: u64) -> Result<Frame, image::ImageError> {
        let img = image::open(path)?.to_rgb8();
        let (width, height) = img.dimensions();
        Ok(Frame::new(img.into_raw(), width, height, 3, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_test_image(dir: &Path, width: u32, height: u32) -> PathBuf {
        let path = dir.join("test.png");
        let mut img = image::RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([50, 100, 200]);
        }
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_read_returns_rgb_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 100, 80);

        let frame = ImageFileReader::read(&path, 3).unwrap();

        assert_eq!(frame.width(), 100);
        assert_eq!(frame.height(), 80);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.index(), 3);
        assert_eq!(&frame.data()[..3], &[50, 100, 200]);
    }

    #[test]
    fn test_read_gray_png_expands_to_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        image::GrayImage::from_pixel(4, 4, image::Luma([77])).save(&path).unwrap();

        let frame = ImageFileReader::read(&path, 0).unwrap();

        assert_eq!(frame.channels(), 3);
        assert_eq!(&frame.data()[..3], &[77, 77, 77]);
    }

    #[test]
    fn test_read_nonexistent_errors() {
        assert!(ImageFileReader::read(Path::new("/nonexistent/test.png"), 0).is_err());
    }

    #[test]
    fn test_read_garbage_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(ImageFileReader::read(&path, 0).is_err());
    }
}
