pub mod engine_error;
pub mod engine_events;
pub mod infrastructure;
pub mod video_engine;
