use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MacroError {
    #[error("a recording is already in progress")]
    AlreadyRecording,
    #[error("a recording is in progress")]
    RecordingInProgress,
    #[error("playback is in progress")]
    PlaybackInProgress,
    #[error("no macro loaded")]
    EmptyMacro,
    #[error("playback speed must be positive, got {0}")]
    InvalidSpeed(f64),
    #[error("global input hook unavailable: {0}")]
    HookUnavailable(String),
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not a valid macro file: {source}")]
    MalformedMacro {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
