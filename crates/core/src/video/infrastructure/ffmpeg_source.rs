use std::path::Path;

use ffmpeg_next::util::frame::video::Video as VideoFrame;

use crate::shared::frame::{ChannelOrder, Frame};
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_source::{SourceError, VideoSource};

/// Decodes video frames via ffmpeg-next (libavformat + libavcodec).
///
/// Each decoded frame is converted to packed BGR24, the source's native
/// channel order. The cursor is derived from the decoder's own timestamps,
/// so after a seek it reflects where the demuxer actually landed.
pub struct FfmpegSource {
    state: Option<DecodeState>,
}

// Safety: FfmpegSource is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegSource {}

struct DecodeState {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    time_base: (i32, i32),
    start_pts: i64,
    fps: f64,
    width: u32,
    height: u32,
    cursor: usize,
    /// First frame at or after a seek target, returned by the next `read`.
    pending: Option<Frame>,
    eof_sent: bool,
}

impl FfmpegSource {
    pub fn new() -> Self {
        Self { state: None }
    }
}

impl Default for FfmpegSource {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoSource for FfmpegSource {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, SourceError> {
        self.release();
        ffmpeg_next::init()?;

        let ictx = ffmpeg_next::format::input(path)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let fps = stream_fps(&stream);
        let time_base = stream.time_base();
        let time_base = (time_base.numerator(), time_base.denominator());
        let start_pts = if stream.start_time() == ffmpeg_next::ffi::AV_NOPTS_VALUE {
            0
        } else {
            stream.start_time()
        };
        let total_frames = frame_count(&stream, ictx.duration(), fps);

        let width = decoder.width();
        let height = decoder.height();
        let metadata = VideoMetadata {
            width,
            height,
            fps,
            total_frames,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::BGR24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        self.state = Some(DecodeState {
            ictx,
            decoder,
            scaler,
            stream_index,
            time_base,
            start_pts,
            fps,
            width,
            height,
            cursor: 0,
            pending: None,
            eof_sent: false,
        });

        Ok(metadata)
    }

    fn read(&mut self) -> Result<Option<Frame>, SourceError> {
        let state = self.state.as_mut().ok_or("FfmpegSource: not opened")?;

        if let Some(frame) = state.pending.take() {
            state.cursor = frame.index() + 1;
            return Ok(Some(frame));
        }

        let Some(decoded) = state.next_decoded()? else {
            return Ok(None);
        };
        let index = state.frame_number(&decoded);
        let frame = state.convert(&decoded, index)?;
        state.cursor = index + 1;
        Ok(Some(frame))
    }

    fn position(&self) -> usize {
        self.state.as_ref().map(|s| s.cursor).unwrap_or(0)
    }

    fn set_position(&mut self, frame_number: usize) -> Result<(), SourceError> {
        let state = self.state.as_mut().ok_or("FfmpegSource: not opened")?;

        if frame_number == state.cursor {
            return Ok(());
        }

        let timestamp = frame_to_av_timestamp(frame_number, state.fps);
        state.ictx.seek(timestamp, ..timestamp)?;
        state.decoder.flush();
        state.pending = None;
        state.eof_sent = false;

        // Decode forward from the keyframe the demuxer landed on.
        while let Some(decoded) = state.next_decoded()? {
            let index = state.frame_number(&decoded);
            if index >= frame_number {
                state.pending = Some(state.convert(&decoded, index)?);
                state.cursor = index;
                return Ok(());
            }
        }

        log::debug!("Seek to frame {frame_number} ran past the end of the stream");
        state.cursor = frame_number;
        Ok(())
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::debug!("FfmpegSource: decoder released");
        }
    }
}

impl DecodeState {
    /// Pulls the next decoded picture, feeding packets as needed.
    fn next_decoded(&mut self) -> Result<Option<VideoFrame>, SourceError> {
        let mut decoded = VideoFrame::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return Ok(Some(decoded));
            }

            if self.eof_sent {
                return Ok(None);
            }

            let Some((stream, packet)) = self.ictx.packets().next() else {
                self.decoder.send_eof()?;
                self.eof_sent = true;
                continue;
            };

            if stream.index() != self.stream_index {
                continue;
            }

            if let Err(e) = self.decoder.send_packet(&packet) {
                log::trace!("Skipping undecodable packet: {e}");
            }
        }
    }

    /// Frame number of a decoded picture, from its best-effort timestamp.
    fn frame_number(&self, decoded: &VideoFrame) -> usize {
        let Some(pts) = decoded.timestamp().or_else(|| decoded.pts()) else {
            return self.cursor;
        };
        let (num, den) = self.time_base;
        if den == 0 || self.fps <= 0.0 {
            return self.cursor;
        }
        let seconds = (pts - self.start_pts) as f64 * num as f64 / den as f64;
        (seconds * self.fps).round().max(0.0) as usize
    }

    fn convert(&mut self, decoded: &VideoFrame, index: usize) -> Result<Frame, SourceError> {
        let mut bgr_frame = VideoFrame::empty();
        self.scaler.run(decoded, &mut bgr_frame)?;
        let pixels = extract_packed_pixels(&bgr_frame, self.width, self.height);
        Ok(Frame::new(pixels, self.width, self.height, 3, index)
            .with_channel_order(ChannelOrder::Bgr))
    }
}

fn stream_fps(stream: &ffmpeg_next::format::stream::Stream) -> f64 {
    let rate = stream.rate();
    let avg = stream.avg_frame_rate();
    fps_from_rates(
        (rate.numerator(), rate.denominator()),
        (avg.numerator(), avg.denominator()),
    )
}

/// Real base rate of the stream, or its average rate when the base is unset.
fn fps_from_rates(rate: (i32, i32), avg_frame_rate: (i32, i32)) -> f64 {
    let (num, den) = if rate.0 != 0 && rate.1 != 0 {
        rate
    } else {
        avg_frame_rate
    };
    if den != 0 {
        num as f64 / den as f64
    } else {
        0.0
    }
}

fn frame_count(
    stream: &ffmpeg_next::format::stream::Stream,
    container_duration: i64,
    fps: f64,
) -> usize {
    let time_base = stream.time_base();
    estimate_frame_count(
        stream.frames(),
        stream.duration(),
        (time_base.numerator(), time_base.denominator()),
        container_duration,
        fps,
    )
}

/// Frame count recorded by the container, or `duration * fps`.
///
/// The stream duration (in `time_base` units) is preferred over the container
/// duration (in `AV_TIME_BASE` units).
fn estimate_frame_count(
    recorded: i64,
    stream_duration: i64,
    time_base: (i32, i32),
    container_duration: i64,
    fps: f64,
) -> usize {
    if recorded > 0 {
        return recorded as usize;
    }
    if !(fps.is_finite() && fps > 0.0) {
        return 0;
    }

    let (num, den) = time_base;
    let seconds = if stream_duration > 0 && den != 0 {
        stream_duration as f64 * num as f64 / den as f64
    } else if container_duration > 0 {
        container_duration as f64 / ffmpeg_next::ffi::AV_TIME_BASE as f64
    } else {
        return 0;
    };
    (seconds * fps).round().max(0.0) as usize
}

/// Converts a frame number to a container timestamp in `AV_TIME_BASE` units.
fn frame_to_av_timestamp(frame_number: usize, fps: f64) -> i64 {
    if fps <= 0.0 {
        return 0;
    }
    (frame_number as f64 / fps * ffmpeg_next::ffi::AV_TIME_BASE as f64) as i64
}

/// Copies pixel data from an ffmpeg frame into a contiguous 3-channel buffer.
///
/// ffmpeg frames may have padding bytes at the end of each row (stride > width*3).
/// This function strips that padding to produce a tightly-packed pixel buffer.
fn extract_packed_pixels(frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = frame.stride(0);
    let data = frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
