use crossbeam_channel::Sender;

use crate::shared::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
}

/// Notifications published by the engine, for subscribers that prefer a queue.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// A decoded, cropped frame in display (RGB) order.
    FrameReady(Frame),
    /// Source cursor after a decode or seek.
    PositionChanged(usize),
    PlaybackChanged(PlaybackState),
}

pub type FrameHandler = Box<dyn Fn(&Frame) + Send>;
pub type PositionHandler = Box<dyn Fn(usize) + Send>;
pub type PlaybackHandler = Box<dyn Fn(PlaybackState) + Send>;

/// Registered observers, invoked synchronously in registration order.
///
/// Handlers run on the engine's own execution context; a UI must hop to its
/// event loop itself.
#[derive(Default)]
pub struct Subscribers {
    frame_ready: Vec<FrameHandler>,
    position_changed: Vec<PositionHandler>,
    playback_changed: Vec<PlaybackHandler>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_frame_ready(&mut self, handler: FrameHandler) {
        self.frame_ready.push(handler);
    }

    pub fn on_position_changed(&mut self, handler: PositionHandler) {
        self.position_changed.push(handler);
    }

    pub fn on_playback_changed(&mut self, handler: PlaybackHandler) {
        self.playback_changed.push(handler);
    }

    /// Registers handlers that forward every notification into `tx`.
    ///
    /// Sends after the receiver is gone are dropped silently.
    pub fn forward_to(&mut self, tx: Sender<EngineEvent>) {
        let frame_tx = tx.clone();
        self.on_frame_ready(Box::new(move |frame| {
            let _ = frame_tx.send(EngineEvent::FrameReady(frame.clone()));
        }));
        let position_tx = tx.clone();
        self.on_position_changed(Box::new(move |position| {
            let _ = position_tx.send(EngineEvent::PositionChanged(position));
        }));
        self.on_playback_changed(Box::new(move |state| {
            let _ = tx.send(EngineEvent::PlaybackChanged(state));
        }));
    }

    pub fn publish_frame(&self, frame: &Frame) {
        for handler in &self.frame_ready {
            handler(frame);
        }
    }

    pub fn publish_position(&self, position: usize) {
        for handler in &self.position_changed {
            handler(position);
        }
    }

    pub fn publish_playback(&self, state: PlaybackState) {
        for handler in &self.playback_changed {
            handler(state);
        }
    }

    pub fn clear(&mut self) {
        self.frame_ready.clear();
        self.position_changed.clear();
        self.playback_changed.clear();
    }
}
