use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use crate::engine::engine_error::EngineError;
use crate::engine::engine_events::{
    EngineEvent, FrameHandler, PlaybackHandler, PlaybackState, PositionHandler,
};
use crate::engine::video_engine::{EngineConfig, EngineInfo, VideoEngine};
use crate::shared::crop_rect::{CropRect, CropUpdate};
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_source::VideoSource;

/// Commands marshalled onto the engine thread.
enum Command {
    SetCrop(CropUpdate),
    SeekTo(i64),
    SeekRelative(i64),
    Play(bool, Sender<Result<bool, EngineError>>),
    Save(PathBuf, Sender<Result<PathBuf, EngineError>>),
    Info(Sender<EngineInfo>),
    Register(Registration, Sender<()>),
    Stop(Sender<()>),
}

enum Registration {
    FrameReady(FrameHandler),
    PositionChanged(PositionHandler),
    PlaybackChanged(PlaybackHandler),
    Forward(Sender<EngineEvent>),
}

/// Runs a [`VideoEngine`] on a dedicated thread.
///
/// Layout: `caller → command queue → engine thread [decode/crop/publish]`
///
/// The engine thread serialises commands and playback ticks, so the source
/// is never touched from two places at once. Observers run on the engine
/// thread. Seeks and crop updates are fire-and-forget; everything else waits
/// for the engine's reply.
pub struct EngineHandle {
    commands: Option<Sender<Command>>,
    worker: Option<JoinHandle<()>>,
    metadata: VideoMetadata,
}

impl EngineHandle {
    /// Opens `path` on the calling thread, then hands the engine to a new
    /// engine thread.
    pub fn open(
        path: &Path,
        source: Box<dyn VideoSource>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let engine = VideoEngine::open(path, source, config)?;
        Ok(Self::spawn(engine))
    }

    pub fn spawn(engine: VideoEngine) -> Self {
        let metadata = engine.metadata().clone();
        let (tx, rx) = crossbeam_channel::unbounded::<Command>();
        let worker = thread::spawn(move || run_engine(engine, rx));

        Self {
            commands: Some(tx),
            worker: Some(worker),
            metadata,
        }
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    pub fn set_crop(&self, update: CropUpdate) -> Result<(), EngineError> {
        self.send(Command::SetCrop(update))
    }

    pub fn seek_to(&self, frame_number: i64) -> Result<(), EngineError> {
        self.send(Command::SeekTo(frame_number))
    }

    pub fn seek_relative(&self, delta: i64) -> Result<(), EngineError> {
        self.send(Command::SeekRelative(delta))
    }

    /// Starts or pauses playback. Returns whether the state changed.
    ///
    /// When this returns after `play(false)`, the playback timer is gone and
    /// no further tick will decode.
    pub fn play(&self, playing: bool) -> Result<bool, EngineError> {
        self.request(|reply| Command::Play(playing, reply))?
    }

    pub fn save(&self, dir: &Path) -> Result<PathBuf, EngineError> {
        let dir = dir.to_path_buf();
        self.request(|reply| Command::Save(dir, reply))?
    }

    pub fn info(&self) -> Result<EngineInfo, EngineError> {
        self.request(Command::Info)
    }

    pub fn crop(&self) -> Result<CropRect, EngineError> {
        Ok(self.info()?.crop)
    }

    pub fn position(&self) -> Result<usize, EngineError> {
        Ok(self.info()?.position)
    }

    pub fn playback_state(&self) -> Result<PlaybackState, EngineError> {
        Ok(self.info()?.playback)
    }

    pub fn on_frame_ready(
        &self,
        handler: impl Fn(&Frame) + Send + 'static,
    ) -> Result<(), EngineError> {
        self.register(Registration::FrameReady(Box::new(handler)))
    }

    pub fn on_position_changed(
        &self,
        handler: impl Fn(usize) + Send + 'static,
    ) -> Result<(), EngineError> {
        self.register(Registration::PositionChanged(Box::new(handler)))
    }

    pub fn on_playback_changed(
        &self,
        handler: impl Fn(PlaybackState) + Send + 'static,
    ) -> Result<(), EngineError> {
        self.register(Registration::PlaybackChanged(Box::new(handler)))
    }

    /// Returns a queue receiving every notification published from now on.
    pub fn subscribe(&self) -> Result<Receiver<EngineEvent>, EngineError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.register(Registration::Forward(tx))?;
        Ok(rx)
    }

    /// Stops playback, releases the source and joins the engine thread.
    ///
    /// Idempotent; also performed on drop.
    pub fn stop(&mut self) {
        let Some(commands) = self.commands.take() else {
            return;
        };

        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        if commands.send(Command::Stop(reply_tx)).is_ok() {
            let _ = reply_rx.recv();
        }
        drop(commands);

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Engine thread panicked");
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.commands.is_none()
    }

    fn register(&self, registration: Registration) -> Result<(), EngineError> {
        self.request(|reply| Command::Register(registration, reply))
    }

    fn send(&self, command: Command) -> Result<(), EngineError> {
        self.commands
            .as_ref()
            .ok_or(EngineError::Stopped)?
            .send(command)
            .map_err(|_| EngineError::Stopped)
    }

    fn request<T>(
        &self,
        command: impl FnOnce(Sender<T>) -> Command,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.send(command(reply_tx))?;
        reply_rx.recv().map_err(|_| EngineError::Stopped)
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Recurring playback tick, armed only while the engine is playing.
struct PlaybackTimer {
    ticks: Receiver<Instant>,
    armed: bool,
}

impl PlaybackTimer {
    fn new() -> Self {
        Self {
            ticks: crossbeam_channel::never(),
            armed: false,
        }
    }

    /// Arms or disarms the timer to match the engine's playback state.
    ///
    /// Disarming drops the ticker, discarding any tick already queued.
    fn sync(&mut self, engine: &VideoEngine) {
        let playing = engine.playback_state() == PlaybackState::Playing;
        if playing && !self.armed {
            let interval = engine.tick_interval();
            log::debug!("Playback timer armed: {} ms", interval.as_millis());
            self.ticks = crossbeam_channel::tick(interval);
            self.armed = true;
        } else if !playing && self.armed {
            log::debug!("Playback timer disarmed");
            self.ticks = crossbeam_channel::never();
            self.armed = false;
        }
    }
}

fn run_engine(mut engine: VideoEngine, commands: Receiver<Command>) {
    let mut timer = PlaybackTimer::new();

    loop {
        let ticks = timer.ticks.clone();
        crossbeam_channel::select! {
            recv(commands) -> message => {
                let Ok(command) = message else {
                    break;
                };
                if !handle_command(&mut engine, &mut timer, command) {
                    break;
                }
            }
            recv(ticks) -> _ => {
                log::trace!("Playback tick at position {}", engine.position());
                if let Err(e) = engine.tick() {
                    log::error!("Playback stopped: {e}");
                }
                timer.sync(&engine);
            }
        }
    }

    engine.stop();
}

/// Applies one command. Returns `false` when the engine thread should exit.
fn handle_command(
    engine: &mut VideoEngine,
    timer: &mut PlaybackTimer,
    command: Command,
) -> bool {
    match command {
        Command::SetCrop(update) => engine.set_crop(update),
        Command::SeekTo(frame_number) => {
            if let Err(e) = engine.seek_to(frame_number) {
                log::warn!("Seek to {frame_number} failed: {e}");
            }
        }
        Command::SeekRelative(delta) => {
            if let Err(e) = engine.seek_relative(delta) {
                log::warn!("Relative seek by {delta} failed: {e}");
            }
        }
        Command::Play(playing, reply) => {
            let result = engine.play(playing);
            timer.sync(engine);
            let _ = reply.send(result);
        }
        Command::Save(dir, reply) => {
            let _ = reply.send(engine.save(&dir));
        }
        Command::Info(reply) => {
            let _ = reply.send(engine.info());
        }
        Command::Register(registration, reply) => {
            let subscribers = engine.subscribers_mut();
            match registration {
                Registration::FrameReady(handler) => subscribers.on_frame_ready(handler),
                Registration::PositionChanged(handler) => {
                    subscribers.on_position_changed(handler)
                }
                Registration::PlaybackChanged(handler) => {
                    subscribers.on_playback_changed(handler)
                }
                Registration::Forward(tx) => subscribers.forward_to(tx),
            }
            let _ = reply.send(());
        }
        Command::Stop(reply) => {
            engine.stop();
            timer.sync(engine);
            let _ = reply.send(());
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::test_support::{video_file, FakeSource, SourceProbe};

    fn open_handle(dir: &Path, total_frames: usize, fps: f64) -> (EngineHandle, SourceProbe) {
        let source = FakeSource::new(total_frames, 8, 6, fps);
        let probe = source.probe();
        let handle = EngineHandle::open(
            &video_file(dir),
            Box::new(source),
            EngineConfig::default(),
        )
        .unwrap();
        (handle, probe)
    }

    fn wait_for_stop(rx: &Receiver<EngineEvent>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(EngineEvent::PlaybackChanged(PlaybackState::Stopped)) => return,
                Ok(_) => continue,
                Err(_) => panic!("playback did not stop in time"),
            }
        }
    }

    #[test]
    fn test_open_missing_path_fails() {
        let result = EngineHandle::open(
            Path::new("/nonexistent/clip.mp4"),
            Box::new(FakeSource::new(1, 1, 1, 30.0)),
            EngineConfig::default(),
        );
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[test]
    fn test_commands_are_serialised() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, _) = open_handle(dir.path(), 200, 30.0);

        handle.seek_to(42).unwrap();
        handle.seek_relative(-2).unwrap();
        handle
            .set_crop(CropUpdate {
                left: Some(2),
                ..Default::default()
            })
            .unwrap();

        let info = handle.info().unwrap();
        assert_eq!(info.position, 41);
        assert_eq!(info.active_frame_index, Some(40));
        assert_eq!(info.crop.left, 2);
        assert_eq!(handle.metadata().total_frames, 200);
    }

    #[test]
    fn test_extreme_relative_seek_keeps_engine_alive() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, probe) = open_handle(dir.path(), 200, 30.0);
        handle.seek_to(5).unwrap();
        let seeks_before = probe.seeks();

        handle.seek_relative(i64::MAX).unwrap();
        handle.seek_relative(i64::MIN).unwrap();

        let info = handle.info().unwrap();
        assert_eq!(info.position, 6);
        assert_eq!(info.active_frame_index, Some(5));
        assert_eq!(probe.seeks(), seeks_before);
    }

    #[test]
    fn test_observers_run_on_engine_thread() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, _) = open_handle(dir.path(), 10, 30.0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let observer_thread = Arc::new(Mutex::new(None));

        let frames = seen.clone();
        handle
            .on_frame_ready(move |frame| {
                frames.lock().unwrap().push(format!("frame:{}", frame.index()));
            })
            .unwrap();
        let positions = seen.clone();
        let thread_slot = observer_thread.clone();
        handle
            .on_position_changed(move |p| {
                positions.lock().unwrap().push(format!("position:{p}"));
                *thread_slot.lock().unwrap() = Some(thread::current().id());
            })
            .unwrap();

        handle.seek_to(3).unwrap();
        handle.info().unwrap();

        assert_eq!(*seen.lock().unwrap(), ["frame:3", "position:4"]);
        let observed = observer_thread.lock().unwrap().unwrap();
        assert_ne!(observed, thread::current().id());
    }

    #[test]
    fn test_playback_ticks_at_frame_rate_and_pause_is_final() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, probe) = open_handle(dir.path(), 10_000, 30.0);
        let rx = handle.subscribe().unwrap();

        let started = Instant::now();
        assert!(handle.play(true).unwrap());
        thread::sleep(Duration::from_millis(250));
        assert!(handle.play(false).unwrap());
        let elapsed = started.elapsed();
        let reads_at_pause = probe.reads();

        thread::sleep(Duration::from_millis(150));
        assert_eq!(probe.reads(), reads_at_pause);

        // one decode per ~33 ms tick
        let max_expected = (elapsed.as_millis() / 33 + 1) as usize;
        assert!(reads_at_pause >= 2, "only {reads_at_pause} ticks");
        assert!(
            reads_at_pause <= max_expected,
            "{reads_at_pause} ticks in {elapsed:?}"
        );

        let positions: Vec<_> = rx
            .try_iter()
            .filter_map(|e| match e {
                EngineEvent::PositionChanged(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(positions, (1..=reads_at_pause).collect::<Vec<_>>());
    }

    #[test]
    fn test_playback_stops_itself_at_end_of_stream() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, probe) = open_handle(dir.path(), 5, 1000.0);
        let rx = handle.subscribe().unwrap();

        handle.play(true).unwrap();
        wait_for_stop(&rx);

        let info = handle.info().unwrap();
        assert_eq!(info.playback, PlaybackState::Stopped);
        assert_eq!(info.position, 5);
        assert_eq!(probe.reads(), 5);
    }

    #[test]
    fn test_playback_from_last_frame_decodes_once() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, probe) = open_handle(dir.path(), 200, 100.0);
        handle.seek_to(198).unwrap();
        assert_eq!(handle.position().unwrap(), 199);
        let reads_before = probe.reads();
        let rx = handle.subscribe().unwrap();

        handle.play(true).unwrap();
        wait_for_stop(&rx);
        thread::sleep(Duration::from_millis(50));

        assert_eq!(probe.reads() - reads_before, 1);
        assert_eq!(handle.playback_state().unwrap(), PlaybackState::Stopped);
    }

    #[test]
    fn test_save_and_errors_cross_the_thread() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let (handle, _) = open_handle(dir.path(), 20, 30.0);

        assert!(matches!(
            handle.save(out.path()),
            Err(EngineError::NoFrame)
        ));
        assert!(matches!(
            handle.save(&out.path().join("missing")),
            Err(EngineError::InvalidPath(_))
        ));

        handle.seek_to(7).unwrap();
        let path = handle.save(out.path()).unwrap();
        assert_eq!(path, out.path().join("clip_Frame-8.jpg"));
    }

    #[test]
    fn test_stop_while_playing_releases_once() {
        let dir = tempfile::tempdir().unwrap();
        let (mut handle, probe) = open_handle(dir.path(), 10_000, 100.0);
        handle.play(true).unwrap();
        thread::sleep(Duration::from_millis(30));

        handle.stop();
        let reads_after_stop = probe.reads();
        handle.stop();
        thread::sleep(Duration::from_millis(50));

        assert!(handle.is_stopped());
        assert_eq!(probe.releases(), 1);
        assert_eq!(probe.reads(), reads_after_stop);
        assert!(matches!(handle.seek_to(1), Err(EngineError::Stopped)));
        assert!(matches!(handle.info(), Err(EngineError::Stopped)));
        assert!(matches!(handle.play(true), Err(EngineError::Stopped)));
    }

    #[test]
    fn test_drop_releases_source() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, probe) = open_handle(dir.path(), 10, 30.0);
        drop(handle);
        assert_eq!(probe.releases(), 1);
    }
}
