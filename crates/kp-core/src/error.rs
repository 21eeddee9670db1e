//! Error types for kartpad

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for kartpad
#[derive(Error, Debug)]
pub enum KartpadError {
    #[error("Ghost error: {0}")]
    Ghost(#[from] GhostError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to load {}: {source}", .path.display())]
    FileLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid input state on frame {frame}")]
    InvalidFrame { frame: u32 },
}

/// Ghost recording errors
///
/// Every variant means the recording cannot be replayed in sync, so none of
/// them are recoverable for the race that tried to load it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GhostError {
    #[error("Input section too short: {len} bytes, need at least {needed}")]
    SectionTooShort { len: usize, needed: usize },

    #[error("Input section too large: {len} bytes, limit is {limit}")]
    SectionTooLarge { len: usize, limit: usize },

    #[error("{stream} stream overruns the input section: ends at 0x{end:x}, section is 0x{len:x} bytes")]
    StreamOverrun {
        stream: &'static str,
        end: usize,
        len: usize,
    },

    #[error("Invalid {stream} tuple #{index}: 0x{value:02x}")]
    InvalidTuple {
        stream: &'static str,
        index: usize,
        value: u8,
    },
}

/// Errors raised when externally supplied input is rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("Invalid button mask: 0x{0:04x}")]
    InvalidButtons(u16),

    #[error("Stick out of range: ({x}, {y})")]
    StickOutOfRange { x: f32, y: f32 },

    #[error("Raw stick out of range: ({x}, {y})")]
    RawStickOutOfRange { x: u8, y: u8 },

    #[error("Centered stick out of range: ({x}, {y})")]
    CenteredStickOutOfRange { x: i8, y: i8 },

    #[error("Invalid trick: {0}")]
    InvalidTrick(u8),
}

/// Result type alias for kartpad operations
pub type Result<T> = std::result::Result<T, KartpadError>;
