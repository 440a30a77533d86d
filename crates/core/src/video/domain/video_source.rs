use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Error type reported by decode backends; must cross thread boundaries.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Sequential and random-access frame decoder over a single video file.
///
/// The backend keeps its own read cursor: `read` returns the frame at the
/// cursor and advances it by one. Callers never track the position in
/// parallel; they ask the source after every read or seek.
///
/// Implementations are not required to be thread-safe, only movable to the
/// thread that drives them.
pub trait VideoSource: Send {
    /// Opens a video file and returns its metadata. The cursor starts at 0.
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, SourceError>;

    /// Decodes the frame at the cursor and advances it.
    ///
    /// Returns `Ok(None)` once the stream is exhausted.
    fn read(&mut self) -> Result<Option<Frame>, SourceError>;

    /// Index of the next frame `read` will return.
    fn position(&self) -> usize;

    /// Moves the cursor so the next `read` returns `frame_number`.
    ///
    /// This is a random-access operation and may be expensive; sequential
    /// playback should use `read` only.
    fn set_position(&mut self, frame_number: usize) -> Result<(), SourceError>;

    /// Releases decoder resources. Safe to call more than once.
    fn release(&mut self);
}
