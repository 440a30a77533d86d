use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::engine_error::EngineError;
use crate::engine::engine_events::{PlaybackState, Subscribers};
use crate::shared::constants::DEFAULT_FALLBACK_FPS;
use crate::shared::crop_rect::{CropRect, CropUpdate};
use crate::shared::export_name;
use crate::shared::frame::{ChannelOrder, Frame};
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_source::VideoSource;
use crate::video::infrastructure::image_file_writer::ImageFileWriter;

/// Tunables for a [`VideoEngine`].
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Frame rate assumed for playback when the container reports none.
    pub fallback_fps: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fallback_fps: DEFAULT_FALLBACK_FPS,
        }
    }
}

/// Point-in-time view of the engine, as shown by an info table.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineInfo {
    pub position: usize,
    pub metadata: VideoMetadata,
    pub crop: CropRect,
    pub playback: PlaybackState,
    pub active_frame_index: Option<usize>,
}

/// Owns one open video source plus the crop, playback flag and active frame.
///
/// Single-threaded: every method runs on the caller's thread. Use
/// [`EngineHandle`](crate::engine::infrastructure::threaded_engine::EngineHandle)
/// to drive it from a dedicated worker with timed playback.
///
/// The read position is never tracked here; it is always asked from the
/// source, whose cursor advances by one on every decode.
pub struct VideoEngine {
    source: Option<Box<dyn VideoSource>>,
    metadata: VideoMetadata,
    crop: CropRect,
    playback: PlaybackState,
    active_frame: Option<Frame>,
    subscribers: Subscribers,
    writer: Box<dyn ImageWriter>,
    config: EngineConfig,
}

impl VideoEngine {
    /// Opens `path` with `source`.
    ///
    /// Fails with [`EngineError::NotFound`] when the path does not exist and
    /// [`EngineError::Unopenable`] when the backend cannot open it.
    pub fn open(
        path: &Path,
        mut source: Box<dyn VideoSource>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        if !path.exists() {
            return Err(EngineError::NotFound(path.to_path_buf()));
        }

        let metadata = source.open(path).map_err(|source| EngineError::Unopenable {
            path: path.to_path_buf(),
            source,
        })?;

        log::info!(
            "Opened {}: {}x{} @ {:.3} fps, {} frames ({})",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.total_frames,
            metadata.codec
        );

        Ok(Self {
            source: Some(source),
            metadata,
            crop: CropRect::default(),
            playback: PlaybackState::Stopped,
            active_frame: None,
            subscribers: Subscribers::new(),
            writer: Box::new(ImageFileWriter::new()),
            config,
        })
    }

    /// Replaces the writer used by [`save`](Self::save).
    pub fn with_image_writer(mut self, writer: Box<dyn ImageWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    pub fn crop(&self) -> CropRect {
        self.crop
    }

    /// Replaces the insets present in `update`. Bounds are not checked: an
    /// over-large crop produces empty frames on the next decode.
    pub fn set_crop(&mut self, update: CropUpdate) {
        self.crop = self.crop.apply(update);
        if !self
            .crop
            .is_valid_for(self.metadata.width, self.metadata.height)
        {
            log::warn!(
                "Crop {:?} leaves no pixels of a {}x{} frame",
                self.crop,
                self.metadata.width,
                self.metadata.height
            );
        }
    }

    /// Source cursor: index of the next frame a sequential decode returns.
    pub fn position(&self) -> usize {
        self.source.as_ref().map(|s| s.position()).unwrap_or(0)
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback
    }

    /// Last decoded, cropped frame in the source's native channel order.
    pub fn active_frame(&self) -> Option<&Frame> {
        self.active_frame.as_ref()
    }

    pub fn subscribers_mut(&mut self) -> &mut Subscribers {
        &mut self.subscribers
    }

    pub fn is_stopped(&self) -> bool {
        self.source.is_none()
    }

    pub fn tick_interval(&self) -> Duration {
        self.metadata.tick_interval(self.config.fallback_fps)
    }

    pub fn info(&self) -> EngineInfo {
        EngineInfo {
            position: self.position(),
            metadata: self.metadata.clone(),
            crop: self.crop,
            playback: self.playback,
            active_frame_index: self.active_frame.as_ref().map(Frame::index),
        }
    }

    /// Decodes the next sequential frame, crops it and publishes it.
    ///
    /// Observers get the frame in display order, then the source position.
    /// Returns `Ok(None)` at end of stream without touching any state.
    pub fn decode_next(&mut self) -> Result<Option<Frame>, EngineError> {
        let source = self.source.as_mut().ok_or(EngineError::Stopped)?;

        let Some(frame) = source.read().map_err(EngineError::Decode)? else {
            log::debug!("End of stream at position {}", source.position());
            return Ok(None);
        };
        let position = source.position();

        let cropped = frame.crop(&self.crop);
        let display = cropped.to_channel_order(ChannelOrder::Rgb);
        self.active_frame = Some(cropped);

        self.subscribers.publish_frame(&display);
        self.subscribers.publish_position(position);
        Ok(Some(display))
    }

    /// Moves to `frame_number` and materialises it as the active frame.
    ///
    /// Requests outside `[0, total_frames)` are ignored.
    pub fn seek_to(&mut self, frame_number: i64) -> Result<(), EngineError> {
        let source = self.source.as_mut().ok_or(EngineError::Stopped)?;

        if frame_number < 0 || frame_number as u64 >= self.metadata.total_frames as u64 {
            log::debug!(
                "Ignoring seek to {frame_number}, outside 0..{}",
                self.metadata.total_frames
            );
            return Ok(());
        }

        log::debug!("Seeking to frame {frame_number}");
        source
            .set_position(frame_number as usize)
            .map_err(EngineError::Decode)?;
        self.decode_next()?;
        Ok(())
    }

    /// Moves by `delta` frames relative to the current position.
    ///
    /// The target is `position + delta - 1` because the decode that follows
    /// the seek advances the cursor by one; from cursor `p` the cursor lands
    /// on `p + delta`. Targets outside the video are ignored.
    pub fn seek_relative(&mut self, delta: i64) -> Result<(), EngineError> {
        if self.source.is_none() {
            return Err(EngineError::Stopped);
        }
        let Some(target) = (self.position() as i64)
            .checked_add(delta)
            .and_then(|t| t.checked_sub(1))
        else {
            log::debug!("Ignoring relative seek by {delta} from {}", self.position());
            return Ok(());
        };
        self.seek_to(target)
    }

    /// Switches the playback flag. Returns whether the state changed.
    pub fn play(&mut self, playing: bool) -> Result<bool, EngineError> {
        if self.source.is_none() {
            return Err(EngineError::Stopped);
        }
        let next = if playing {
            PlaybackState::Playing
        } else {
            PlaybackState::Stopped
        };
        if next == self.playback {
            return Ok(false);
        }
        self.set_playback(next);
        Ok(true)
    }

    /// One playback step: decodes a frame, stopping at the end of the stream.
    ///
    /// Does nothing unless playing.
    pub fn tick(&mut self) -> Result<(), EngineError> {
        if self.playback != PlaybackState::Playing {
            return Ok(());
        }

        let decoded = match self.decode_next() {
            Ok(decoded) => decoded,
            Err(e) => {
                self.set_playback(PlaybackState::Stopped);
                return Err(e);
            }
        };

        if decoded.is_none() || self.position() >= self.metadata.total_frames {
            log::debug!("Playback reached the end at position {}", self.position());
            self.set_playback(PlaybackState::Stopped);
        }
        Ok(())
    }

    /// Writes the active frame to `{base_name}_Frame-{position}.jpg` in `dir`.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, EngineError> {
        if !dir.is_dir() {
            return Err(EngineError::InvalidPath(dir.to_path_buf()));
        }
        let frame = self.active_frame.as_ref().ok_or(EngineError::NoFrame)?;

        let path = dir.join(export_name::format(
            &self.metadata.base_name(),
            self.position(),
        ));
        self.writer
            .write(&path, frame, None)
            .map_err(|source| EngineError::Export {
                path: path.clone(),
                source,
            })?;

        log::info!("Saved frame {} to {}", frame.index(), path.display());
        Ok(path)
    }

    /// Stops playback and releases the source. Later calls are no-ops.
    pub fn stop(&mut self) {
        let Some(mut source) = self.source.take() else {
            return;
        };
        if self.playback == PlaybackState::Playing {
            self.set_playback(PlaybackState::Stopped);
        }
        source.release();
        self.active_frame = None;
        self.subscribers.clear();
        log::info!("Released {}", self.metadata.base_name());
    }

    fn set_playback(&mut self, state: PlaybackState) {
        log::debug!("Playback {:?} -> {:?}", self.playback, state);
        self.playback = state;
        self.subscribers.publish_playback(state);
    }
}

impl Drop for VideoEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
