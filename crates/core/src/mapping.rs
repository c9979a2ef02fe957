//! Launchpad MIDI address mapping.
//!
//! Translates between grid coordinates and MIDI short messages.
//!
//! # Layout
//!
//! ```text
//! Row 0 (CC 104-111, status 176): top control row
//! Row 1 (notes   0-8,  status 144): grid row 1, column 8 is the side button
//! Row 2 (notes  16-24, status 144)
//! ...
//! Row 8 (notes 112-120, status 144)
//! ```
//!
//! Grid rows are 16 notes apart, so notes 9-15 of each row are addressable
//! but have no pad behind them.

use crate::error::LaunchpadError;
use crate::event::{ButtonEvent, LightState, RawMidiEvent};

/// Launchpad MIDI mapping constants and translation.
pub struct LaunchpadMapping;

impl LaunchpadMapping {
    /// Control Change on channel 1, used by the top row
    pub const TOP_ROW_STATUS: u8 = 176;
    /// Note On on channel 1, used by the grid
    pub const GRID_STATUS: u8 = 144;

    pub const TOP_ROW_OFFSET: u8 = 104;
    pub const GRID_STRIDE: u8 = 16;
    pub const MAX_ROW: u8 = 8;

    pub const PRESSED_VELOCITY: u8 = 127;
    pub const LIGHT_ON: u8 = 127;
    pub const LIGHT_OFF: u8 = 0;

    /// Rows covered by the reset and test sweeps
    pub const SWEEP_ROWS: u8 = 9;
    /// Columns covered by the reset and test sweeps (two past the last pad)
    pub const SWEEP_COLUMNS: u8 = 10;

    /// Translate a grid coordinate to `(status, position)`.
    ///
    /// Rejects coordinates that would not fit in a 7-bit data byte.
    pub fn encode_position(row: u8, column: u8) -> Result<(u8, u8), LaunchpadError> {
        if row > Self::MAX_ROW {
            return Err(LaunchpadError::OutOfRange { row, column });
        }

        let (status, position) = if row == 0 {
            (
                Self::TOP_ROW_STATUS,
                column as u16 + Self::TOP_ROW_OFFSET as u16,
            )
        } else {
            (
                Self::GRID_STATUS,
                (row as u16 - 1) * Self::GRID_STRIDE as u16 + column as u16,
            )
        };

        if position > 127 {
            return Err(LaunchpadError::OutOfRange { row, column });
        }

        Ok((status, position as u8))
    }

    /// Decode a raw input message into a button event.
    ///
    /// Only velocity 127 counts as pressed; every other velocity is a release.
    pub fn decode(raw: &RawMidiEvent) -> Result<ButtonEvent, LaunchpadError> {
        let top_row = raw.status == Self::TOP_ROW_STATUS;

        let (row, column) = if top_row {
            let column = raw.position.checked_sub(Self::TOP_ROW_OFFSET).ok_or(
                LaunchpadError::UnmappedPosition {
                    status: raw.status,
                    position: raw.position,
                },
            )?;
            (0, column)
        } else {
            (
                raw.position / Self::GRID_STRIDE + 1,
                raw.position % Self::GRID_STRIDE,
            )
        };

        Ok(ButtonEvent {
            row,
            column,
            pressed: raw.velocity == Self::PRESSED_VELOCITY,
        })
    }

    /// Velocity byte for a light state.
    pub fn encode_light_value(state: LightState) -> u8 {
        match state {
            LightState::Switch(true) => Self::LIGHT_ON,
            LightState::Switch(false) => Self::LIGHT_OFF,
            LightState::Color(color) => color.code(),
        }
    }

    /// Full short message for lighting a pad.
    pub fn light_message(
        row: u8,
        column: u8,
        state: LightState,
    ) -> Result<[u8; 3], LaunchpadError> {
        let (status, position) = Self::encode_position(row, column)?;
        Ok([status, position, Self::encode_light_value(state)])
    }

    /// Every coordinate visited by the reset and test sweeps, row-major.
    pub fn sweep() -> impl Iterator<Item = (u8, u8)> {
        (0..Self::SWEEP_ROWS).flat_map(|row| (0..Self::SWEEP_COLUMNS).map(move |col| (row, col)))
    }

    /// Get the Launchpad device name for MIDI port matching.
    pub fn device_name() -> &'static str {
        "Launchpad"
    }
}
