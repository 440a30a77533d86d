use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// File name of the source without directory or extension.
    pub fn base_name(&self) -> String {
        self.source_path
            .as_ref()
            .and_then(|p| p.file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string())
    }

    pub fn has_usable_fps(&self) -> bool {
        self.fps.is_finite() && self.fps > 0.0
    }

    pub fn duration(&self) -> Duration {
        if !self.has_usable_fps() {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.total_frames as f64 / self.fps)
    }

    /// Playback tick period: `round(1000 / fps)` milliseconds.
    ///
    /// `fallback_fps` stands in when the container reports no usable rate.
    pub fn tick_interval(&self, fallback_fps: f64) -> Duration {
        let fps = if self.has_usable_fps() {
            self.fps
        } else {
            fallback_fps
        };
        let millis = if fps.is_finite() && fps > 0.0 {
            (1000.0 / fps).round().max(1.0) as u64
        } else {
            1000
        };
        Duration::from_millis(millis)
    }
}
