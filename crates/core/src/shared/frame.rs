use ndarray::{s, ArrayView3};

use crate::shared::crop_rect::CropRect;

/// Order of the colour channels inside a pixel.
///
/// The decode backend produces `Bgr` (its native order); observers and the
/// image encoder expect `Rgb`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

/// A single video frame: contiguous 8-bit pixels in row-major order.
///
/// Format conversion happens at I/O boundaries only; the engine treats pixel
/// data as opaque apart from cropping and channel reordering.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
    order: ChannelOrder,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
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
            order: ChannelOrder::Rgb,
        }
    }

    /// Tags the pixel data with the given channel order without touching it.
    pub fn with_channel_order(mut self, order: ChannelOrder) -> Self {
        self.order = order;
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

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn channel_order(&self) -> ChannelOrder {
        self.order
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Returns the sub-region `[top .. height - bottom, left .. width - right]`.
    ///
    /// Insets are not validated. Insets that meet or cross each other
    /// collapse the corresponding dimension to zero.
    pub fn crop(&self, rect: &CropRect) -> Frame {
        if rect.is_zero() {
            return self.clone();
        }

        let (y0, y1) = span(self.height, rect.top, rect.bottom);
        let (x0, x1) = span(self.width, rect.left, rect.right);

        let view = self.as_ndarray();
        let region = view.slice(s![y0..y1, x0..x1, ..]);
        let data: Vec<u8> = region.iter().copied().collect();

        Frame {
            data,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
            channels: self.channels,
            index: self.index,
            order: self.order,
        }
    }

    /// Returns a copy with the channels arranged in `order`.
    pub fn to_channel_order(&self, order: ChannelOrder) -> Frame {
        let mut converted = self.clone();
        if order != self.order {
            if self.channels >= 3 {
                for pixel in converted.data.chunks_exact_mut(self.channels as usize) {
                    pixel.swap(0, 2);
                }
            }
            converted.order = order;
        }
        converted
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

/// Start and end of a cropped axis, clamped into `[0, len]` with `start <= end`.
fn span(len: u32, leading: u32, trailing: u32) -> (usize, usize) {
    let start = leading.min(len) as usize;
    let end = (len.saturating_sub(trailing) as usize).max(start);
    (start, end)
}
