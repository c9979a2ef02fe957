//! Launchpad grid controller driver.
//!
//! This crate provides:
//! - Address mapping between grid coordinates and MIDI short messages
//! - Pad lighting with on/off or palette colors
//! - A polling button listener that dispatches to registered handlers
//!
//! # Grid Layout
//!
//! Row 0 is the top control row (CC 104-111). Rows 1-8 are the main grid
//! (notes `(row - 1) * 16 + column`), with column 8 being the round side
//! button of each row.

pub use color::Color;
pub use config::{ConfigFile, ConfigManager, LaunchpadConfig, DEFAULT_CONFIG_PATH};
pub use controller::{
    Launchpad, ListenerHandle, DEFAULT_POLL_INTERVAL, DEFAULT_TEST_HOLD, MIN_POLL_INTERVAL,
};
pub use error::{ConfigError, LaunchpadError};
pub use event::{ButtonEvent, LightState, RawMidiEvent};
pub use listener::{ButtonHandler, HandlerRegistry};
pub use mapping::LaunchpadMapping;
pub use transport::{
    list_devices, DeviceSelector, MemoryTransport, MidiDeviceInfo, MidiSink, MidiSource,
    MidirInput, MidirOutput, PortDirection, INPUT_BUFFER_SIZE,
};

mod color;
mod config;
mod controller;
mod error;
mod event;
mod listener;
pub mod mapping;
pub mod transport;
