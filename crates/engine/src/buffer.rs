//! RGB8 frame buffer and its encoders.

use std::io::Cursor;

use image::RgbImage;
use prism_core::image::{ImageFormat, ImageResult};
use prism_core::types::Vec3;

use crate::RenderError;

/// A finished frame, row-major, three bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 3],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = self.offset(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    pub fn put(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let i = self.offset(x, y);
        self.data[i..i + 3].copy_from_slice(&rgb);
    }

    /// Store an averaged linear colour, gamma corrected (gamma 2).
    pub fn put_linear(&mut self, x: u32, y: u32, color: Vec3) {
        self.put(
            x,
            y,
            [to_byte(color.x), to_byte(color.y), to_byte(color.z)],
        );
    }

    /// Encode the frame as PNG or JPEG.
    pub fn encode(&self, format: ImageFormat) -> Result<ImageResult, RenderError> {
        let image = RgbImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(
            || RenderError::InvalidScene("pixel buffer size mismatch".to_string()),
        )?;

        let target = match format {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        };
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, target)?;
        Ok(ImageResult::new(bytes.into_inner(), format))
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 3
    }
}

fn to_byte(linear: f64) -> u8 {
    let gamma = if linear > 0.0 { linear.sqrt() } else { 0.0 };
    (256.0 * gamma.clamp(0.0, 0.999)) as u8
}
