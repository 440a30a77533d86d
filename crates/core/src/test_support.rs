//! In-memory decode backend for engine tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::engine::video_engine::{EngineConfig, VideoEngine};
use crate::shared::frame::{ChannelOrder, Frame};
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_source::{SourceError, VideoSource};

/// Call counters shared with a [`FakeSource`] after it is boxed.
#[derive(Clone, Default)]
pub(crate) struct SourceProbe {
    reads: Arc<AtomicUsize>,
    seeks: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl SourceProbe {
    /// Successful reads (end-of-stream reads included).
    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub(crate) fn seeks(&self) -> usize {
        self.seeks.load(Ordering::SeqCst)
    }

    pub(crate) fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

/// Synthetic video: BGR pixel at (row, col) of frame `i` is `[i, row, col]`
/// (each modulo 256), so after conversion to RGB it reads `[col, row, i]`.
pub(crate) struct FakeSource {
    width: u32,
    height: u32,
    fps: f64,
    total_frames: usize,
    cursor: usize,
    opened: bool,
    fail_open: bool,
    probe: SourceProbe,
}

impl FakeSource {
    pub(crate) fn new(total_frames: usize, width: u32, height: u32, fps: f64) -> Self {
        Self {
            width,
            height,
            fps,
            total_frames,
            cursor: 0,
            opened: false,
            fail_open: false,
            probe: SourceProbe::default(),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::new(0, 1, 1, 30.0)
        }
    }

    pub(crate) fn probe(&self) -> SourceProbe {
        self.probe.clone()
    }

    pub(crate) fn frame(index: usize, width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for row in 0..height {
            for col in 0..width {
                data.extend_from_slice(&[index as u8, row as u8, col as u8]);
            }
        }
        Frame::new(data, width, height, 3, index).with_channel_order(ChannelOrder::Bgr)
    }
}

impl VideoSource for FakeSource {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, SourceError> {
        if self.fail_open {
            return Err("invalid data found when processing input".into());
        }
        self.opened = true;
        self.cursor = 0;
        Ok(VideoMetadata {
            width: self.width,
            height: self.height,
            fps: self.fps,
            total_frames: self.total_frames,
            codec: "fake".to_string(),
            source_path: Some(path.to_path_buf()),
        })
    }

    fn read(&mut self) -> Result<Option<Frame>, SourceError> {
        if !self.opened {
            return Err("FakeSource: not opened".into());
        }
        self.probe.reads.fetch_add(1, Ordering::SeqCst);
        if self.cursor >= self.total_frames {
            return Ok(None);
        }
        let frame = Self::frame(self.cursor, self.width, self.height);
        self.cursor += 1;
        Ok(Some(frame))
    }

    fn position(&self) -> usize {
        self.cursor
    }

    fn set_position(&mut self, frame_number: usize) -> Result<(), SourceError> {
        if !self.opened {
            return Err("FakeSource: not opened".into());
        }
        self.probe.seeks.fetch_add(1, Ordering::SeqCst);
        self.cursor = frame_number.min(self.total_frames);
        Ok(())
    }

    fn release(&mut self) {
        if self.opened {
            self.opened = false;
            self.probe.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// A placeholder video file, so path validation passes.
pub(crate) fn video_file(dir: &Path) -> PathBuf {
    let path = dir.join("clip.mp4");
    std::fs::write(&path, b"").unwrap();
    path
}

/// Opens an engine over a [`FakeSource`] with `total_frames` frames.
pub(crate) fn open_engine(
    dir: &Path,
    total_frames: usize,
    width: u32,
    height: u32,
    fps: f64,
) -> (VideoEngine, SourceProbe) {
    let source = FakeSource::new(total_frames, width, height, fps);
    let probe = source.probe();
    let engine = VideoEngine::open(
        &video_file(dir),
        Box::new(source),
        EngineConfig::default(),
    )
    .unwrap();
    (engine, probe)
}
