//! Values passed across the driver boundary.

use crate::color::Color;
use crate::error::LaunchpadError;

/// One buffered short message as read from the input port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMidiEvent {
    pub status: u8,
    /// First data byte (note or controller number)
    pub position: u8,
    /// Second data byte
    pub velocity: u8,
    /// Third data byte, always 0 for short messages
    pub reserved: u8,
    /// Transport timestamp in microseconds
    pub timestamp: u64,
}

impl RawMidiEvent {
    pub const fn new(status: u8, position: u8, velocity: u8) -> Self {
        Self {
            status,
            position,
            velocity,
            reserved: 0,
            timestamp: 0,
        }
    }

    /// Build an event from raw bytes delivered by the transport.
    pub fn from_bytes(timestamp: u64, bytes: &[u8]) -> Result<Self, LaunchpadError> {
        match bytes {
            [status, position, velocity, rest @ ..] => Ok(Self {
                status: *status,
                position: *position,
                velocity: *velocity,
                reserved: rest.first().copied().unwrap_or(0),
                timestamp,
            }),
            _ => Err(LaunchpadError::ShortMessage(bytes.len())),
        }
    }
}

/// A decoded button press or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonEvent {
    /// 0 is the top control row, 1-8 the main grid
    pub row: u8,
    pub column: u8,
    pub pressed: bool,
}

/// What a pad should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightState {
    Switch(bool),
    Color(Color),
}

impl From<bool> for LightState {
    fn from(on: bool) -> Self {
        LightState::Switch(on)
    }
}

impl From<Color> for LightState {
    fn from(color: Color) -> Self {
        LightState::Color(color)
    }
}
