//! Launchpad pad color palette.
//!
//! The Launchpad encodes color in the note velocity. The low nibble is the red
//! level and the high nibble the green level, each 0-3, so mixed colors land on
//! sparse codes.

use crate::error::LaunchpadError;

/// Named palette entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Color {
    Gray = 0,
    Red1 = 1,
    Red2 = 2,
    Red3 = 3,

    Green1 = 16,
    Green2 = 32,
    Green3 = 48,

    Yellow1 = 17,
    Yellow2 = 33,
    Yellow3 = 50,
    YellowGreen = 49,

    Orange1 = 18,
    Orange2 = 19,
    Orange3 = 34,
    Orange4 = 35,
    Orange5 = 51,
}

impl Color {
    pub const ALL: [Color; 16] = [
        Color::Gray,
        Color::Red1,
        Color::Red2,
        Color::Red3,
        Color::Green1,
        Color::Green2,
        Color::Green3,
        Color::Yellow1,
        Color::Yellow2,
        Color::Yellow3,
        Color::YellowGreen,
        Color::Orange1,
        Color::Orange2,
        Color::Orange3,
        Color::Orange4,
        Color::Orange5,
    ];

    /// Velocity byte sent to light a pad in this color.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Look a color up by its lowercase name, e.g. `"yellowgreen"` or `"red2"`.
    pub fn from_name(name: &str) -> Option<Color> {
        let name = name.to_ascii_lowercase().replace(['_', '-'], "");
        Color::ALL
            .iter()
            .copied()
            .find(|c| format!("{:?}", c).to_ascii_lowercase() == name)
    }
}

impl TryFrom<u8> for Color {
    type Error = LaunchpadError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Color::ALL
            .iter()
            .copied()
            .find(|c| c.code() == code)
            .ok_or(LaunchpadError::UnknownColor(code))
    }
}
