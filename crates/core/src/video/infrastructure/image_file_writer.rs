use std::path::Path;

use crate::shared::frame::{ChannelOrder, Frame};
use crate::video::domain::image_writer::ImageWriter;

/// Writes a single frame to an image file using the `image` crate.
///
/// The encoder is picked from the file extension (JPEG for exported frames).
/// Frames in BGR order are converted to RGB first. Supports optional
/// resizing for gallery thumbnails.
pub struct ImageFileWriter;

impl ImageFileWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageWriter for ImageFileWriter {
    fn write(
        &self,
        path: &Path,
        frame: &Frame,
        size: Option<(u32, u32)>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if frame.is_empty() {
            return Err(format!(
                "cannot encode an empty {}x{} frame",
                frame.width(),
                frame.height()
            )
            .into());
        }
        if frame.channels() != 3 {
            return Err(format!("expected 3 channels, got {}", frame.channels()).into());
        }

        let rgb = frame.to_channel_order(ChannelOrder::Rgb);
        let img = image::RgbImage::from_raw(rgb.width(), rgb.height(), rgb.data().to_vec())
            .ok_or("Failed to create image from frame data")?;

        let img = if let Some((w, h)) = size {
            image::imageops::resize(&img, w, h, image::imageops::FilterType::Triangle)
        } else {
            img
        };

        img.save(path)?;
        Ok(())
    }
}
