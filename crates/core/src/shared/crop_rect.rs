/// Pixel insets removed from each edge of a frame before it is published.
///
/// Measured in source-frame pixels. A plain value: passed and returned by
/// copy, never shared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CropRect {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

/// Partial crop change: `None` leaves the corresponding inset untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CropUpdate {
    pub left: Option<u32>,
    pub right: Option<u32>,
    pub top: Option<u32>,
    pub bottom: Option<u32>,
}

impl CropRect {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Returns a copy with every inset present in `update` replaced.
    pub fn apply(self, update: CropUpdate) -> Self {
        Self {
            left: update.left.unwrap_or(self.left),
            right: update.right.unwrap_or(self.right),
            top: update.top.unwrap_or(self.top),
            bottom: update.bottom.unwrap_or(self.bottom),
        }
    }

    /// Whether the crop leaves a non-empty region of a `width x height` frame.
    pub fn is_valid_for(&self, width: u32, height: u32) -> bool {
        let horizontal = self.left as u64 + self.right as u64;
        let vertical = self.top as u64 + self.bottom as u64;
        horizontal < width as u64 && vertical < height as u64
    }

    /// Dimensions of a `width x height` frame after cropping, saturating at zero.
    pub fn cropped_size(&self, width: u32, height: u32) -> (u32, u32) {
        (
            width.saturating_sub(self.left).saturating_sub(self.right),
            height.saturating_sub(self.top).saturating_sub(self.bottom),
        )
    }
}
