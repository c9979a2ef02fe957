//! Error types for the Launchpad driver.

use thiserror::Error;

/// Errors raised while mapping addresses or talking to the device.
#[derive(Debug, Error)]
pub enum LaunchpadError {
    #[error("no MIDI output configured")]
    NoOutput,

    #[error("no MIDI input available")]
    NoInput,

    #[error("button ({row}, {column}) is outside the addressable grid")]
    OutOfRange { row: u8, column: u8 },

    #[error("status {status} position {position} does not map to a button")]
    UnmappedPosition { status: u8, position: u8 },

    #[error("MIDI message too short: {0} bytes")]
    ShortMessage(usize),

    #[error("unknown color code {0}")]
    UnknownColor(u8),

    #[error("MIDI device not found: {0}")]
    DeviceNotFound(String),

    #[error("MIDI init failed: {0}")]
    Init(String),

    #[error("MIDI connect failed: {0}")]
    Connect(String),

    #[error("MIDI send failed: {0}")]
    Send(String),

    #[error("MIDI transport error: {0}")]
    Transport(String),

    #[error("listener requires a running tokio runtime")]
    NoRuntime,

    #[error("listener task panicked")]
    ListenerPanicked,
}

impl From<midir::InitError> for LaunchpadError {
    fn from(e: midir::InitError) -> Self {
        LaunchpadError::Init(e.to_string())
    }
}

impl From<midir::SendError> for LaunchpadError {
    fn from(e: midir::SendError) -> Self {
        LaunchpadError::Send(e.to_string())
    }
}

impl From<midir::PortInfoError> for LaunchpadError {
    fn from(e: midir::PortInfoError) -> Self {
        LaunchpadError::Transport(e.to_string())
    }
}

/// Errors raised while loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to serialize config: {0}")]
    SerializeError(String),

    #[error("Config validation errors: {}", .0.join(", "))]
    ValidationError(Vec<String>),
}
