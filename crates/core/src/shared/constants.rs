/// Container extensions offered when picking a video.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];

/// Image files shown in the export gallery.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Extension of exported frames.
pub const EXPORT_EXTENSION: &str = "jpg";

/// Separator between base name and position in exported file names.
pub const EXPORT_FRAME_MARKER: &str = "_Frame-";

/// Used for the playback tick when the container reports no frame rate.
pub const DEFAULT_FALLBACK_FPS: f64 = 30.0;

/// Longest side of gallery thumbnails, in pixels.
pub const THUMBNAIL_SIZE: u32 = 100;
