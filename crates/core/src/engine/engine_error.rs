use std::path::PathBuf;

use thiserror::Error;

use crate::video::domain::video_source::SourceError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("video file does not exist: {0}")]
    NotFound(PathBuf),
    #[error("unable to open video file {path}: {source}")]
    Unopenable {
        path: PathBuf,
        #[source]
        source: SourceError,
    },
    #[error("output path does not exist: {0}")]
    InvalidPath(PathBuf),
    #[error("no frame available")]
    NoFrame,
    #[error("decode failed: {0}")]
    Decode(#[source] SourceError),
    #[error("failed to write frame to {path}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("engine has been stopped")]
    Stopped,
}
