//! MIDI transport seam.
//!
//! The controller only needs to poll one input message at a time and write
//! short messages, so the transport is reduced to two traits. `midir` backs
//! them for real hardware and [`MemoryTransport`] backs them in tests.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use midir::{MidiIO, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

use crate::error::LaunchpadError;
use crate::event::RawMidiEvent;

/// Client name registered with the system MIDI service.
const CLIENT_NAME: &str = "launchpad";

/// A source of buffered input messages.
pub trait MidiSource: Send {
    /// Take the next pending message, or `None` if nothing is buffered.
    fn poll(&mut self) -> Result<Option<RawMidiEvent>, LaunchpadError>;
}

/// A sink for outgoing short messages.
pub trait MidiSink: Send {
    fn send(&mut self, message: &[u8]) -> Result<(), LaunchpadError>;
}

/// How to pick a MIDI port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceSelector {
    /// Position in the port list
    Index(usize),
    /// Substring of the port name
    Name(String),
}

impl FromStr for DeviceSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<usize>() {
            Ok(index) => DeviceSelector::Index(index),
            Err(_) => DeviceSelector::Name(s.to_string()),
        })
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::Index(index) => write!(f, "#{}", index),
            DeviceSelector::Name(name) => write!(f, "\"{}\"", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// An enumerated MIDI port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiDeviceInfo {
    pub index: usize,
    pub name: String,
    pub direction: PortDirection,
}

/// List every input and output port currently visible.
pub fn list_devices() -> Result<Vec<MidiDeviceInfo>, LaunchpadError> {
    let midi_in = MidiInput::new(CLIENT_NAME)?;
    let midi_out = MidiOutput::new(CLIENT_NAME)?;

    let mut devices = Vec::new();
    for (index, port) in midi_in.ports().iter().enumerate() {
        devices.push(MidiDeviceInfo {
            index,
            name: midi_in.port_name(port)?,
            direction: PortDirection::Input,
        });
    }
    for (index, port) in midi_out.ports().iter().enumerate() {
        devices.push(MidiDeviceInfo {
            index,
            name: midi_out.port_name(port)?,
            direction: PortDirection::Output,
        });
    }

    Ok(devices)
}

fn find_port<T: MidiIO>(io: &T, selector: &DeviceSelector) -> Result<T::Port, LaunchpadError> {
    let ports = io.ports();
    let port = match selector {
        DeviceSelector::Index(index) => ports.get(*index).cloned(),
        DeviceSelector::Name(name) => ports.into_iter().find(|p| {
            io.port_name(p)
                .map(|n| n.contains(name.as_str()))
                .unwrap_or(false)
        }),
    };

    port.ok_or_else(|| LaunchpadError::DeviceNotFound(selector.to_string()))
}

/// Messages buffered between the midir callback and the listener.
pub const INPUT_BUFFER_SIZE: usize = 1024;

type InputQueue = mpsc::Sender<(u64, Vec<u8>)>;

/// Queue one message from the midir callback. Returns false when it was dropped.
///
/// Messages shorter than a short message (clock, active sensing) never enter
/// the queue, and a full queue drops the newest message.
fn queue_message(tx: &InputQueue, timestamp: u64, message: &[u8]) -> bool {
    if message.len() < 3 {
        return false;
    }

    match tx.try_send((timestamp, message.to_vec())) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::trace!("MIDI input buffer full, dropping message");
            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

/// Input port backed by `midir`.
///
/// `midir` delivers input on its own callback thread; messages are queued
/// there, up to [`INPUT_BUFFER_SIZE`], and handed out one per
/// [`MidiSource::poll`].
pub struct MidirInput {
    port_name: String,
    _connection: MidiInputConnection<InputQueue>,
    rx: mpsc::Receiver<(u64, Vec<u8>)>,
}

impl MidirInput {
    pub fn open(selector: &DeviceSelector) -> Result<Self, LaunchpadError> {
        let midi_in = MidiInput::new(CLIENT_NAME)?;
        let port = find_port(&midi_in, selector)?;
        let port_name = midi_in.port_name(&port)?;

        let (tx, rx) = mpsc::channel(INPUT_BUFFER_SIZE);

        let connection = midi_in
            .connect(
                &port,
                "launchpad-input",
                move |timestamp, message, tx| {
                    queue_message(tx, timestamp, message);
                },
                tx,
            )
            .map_err(|e| LaunchpadError::Connect(e.to_string()))?;

        Ok(Self {
            port_name,
            _connection: connection,
            rx,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl MidiSource for MidirInput {
    fn poll(&mut self) -> Result<Option<RawMidiEvent>, LaunchpadError> {
        match self.rx.try_recv() {
            Ok((timestamp, bytes)) => RawMidiEvent::from_bytes(timestamp, &bytes).map(Some),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LaunchpadError::Transport(format!(
                "{} disconnected",
                self.port_name
            ))),
        }
    }
}

/// Output port backed by `midir`.
pub struct MidirOutput {
    port_name: String,
    connection: MidiOutputConnection,
}

impl MidirOutput {
    pub fn open(selector: &DeviceSelector) -> Result<Self, LaunchpadError> {
        let midi_out = MidiOutput::new(CLIENT_NAME)?;
        let port = find_port(&midi_out, selector)?;
        let port_name = midi_out.port_name(&port)?;

        let connection = midi_out
            .connect(&port, "launchpad-output")
            .map_err(|e| LaunchpadError::Connect(e.to_string()))?;

        Ok(Self {
            port_name,
            connection,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl MidiSink for MidirOutput {
    fn send(&mut self, message: &[u8]) -> Result<(), LaunchpadError> {
        self.connection.send(message)?;
        Ok(())
    }
}

#[derive(Default)]
struct MemoryState {
    input: VecDeque<RawMidiEvent>,
    sent: Vec<Vec<u8>>,
    polls: usize,
    fail_next_send: bool,
    fail_next_poll: bool,
}

/// In-memory loopback transport.
///
/// Clones share state, so a test keeps one handle while the controller owns
/// the source and sink.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&self) -> Box<dyn MidiSource> {
        Box::new(MemorySource {
            state: self.state.clone(),
        })
    }

    pub fn sink(&self) -> Box<dyn MidiSink> {
        Box::new(MemorySink {
            state: self.state.clone(),
        })
    }

    /// Queue a message for the source to hand out.
    pub fn push_input(&self, event: RawMidiEvent) {
        self.state.lock().input.push_back(event);
    }

    pub fn pending_input(&self) -> usize {
        self.state.lock().input.len()
    }

    /// Every message written to the sink so far.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state.lock().sent.clone()
    }

    /// Number of times the source was polled.
    pub fn polls(&self) -> usize {
        self.state.lock().polls
    }

    pub fn fail_next_send(&self) {
        self.state.lock().fail_next_send = true;
    }

    pub fn fail_next_poll(&self) {
        self.state.lock().fail_next_poll = true;
    }
}

struct MemorySource {
    state: Arc<Mutex<MemoryState>>,
}

impl MidiSource for MemorySource {
    fn poll(&mut self) -> Result<Option<RawMidiEvent>, LaunchpadError> {
        let mut state = self.state.lock();
        state.polls += 1;
        if std::mem::take(&mut state.fail_next_poll) {
            return Err(LaunchpadError::Transport("injected poll failure".to_string()));
        }
        Ok(state.input.pop_front())
    }
}

struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
}

impl MidiSink for MemorySink {
    fn send(&mut self, message: &[u8]) -> Result<(), LaunchpadError> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_send) {
            return Err(LaunchpadError::Send("injected send failure".to_string()));
        }
        state.sent.push(message.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_parsing() {
        assert_eq!(
            "3".parse::<DeviceSelector>().unwrap(),
            DeviceSelector::Index(3)
        );
        assert_eq!(
            "Launchpad Mini".parse::<DeviceSelector>().unwrap(),
            DeviceSelector::Name("Launchpad Mini".to_string())
        );
    }

    #[test]
    fn test_input_queue_is_bounded() {
        let (tx, mut rx) = mpsc::channel(2);

        assert!(queue_message(&tx, 1, &[144, 0, 127]));
        assert!(queue_message(&tx, 2, &[144, 1, 127]));
        assert!(!queue_message(&tx, 3, &[144, 2, 127]));

        assert_eq!(rx.try_recv().unwrap(), (1, vec![144, 0, 127]));
        assert_eq!(rx.try_recv().unwrap(), (2, vec![144, 1, 127]));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_input_queue_skips_system_messages() {
        let (tx, mut rx) = mpsc::channel(INPUT_BUFFER_SIZE);

        assert!(!queue_message(&tx, 0, &[0xF8]));
        assert!(!queue_message(&tx, 0, &[0xFE]));
        assert!(queue_message(&tx, 0, &[176, 104, 127]));

        assert_eq!(rx.try_recv().unwrap().1, vec![176, 104, 127]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_memory_source_hands_out_one_message_per_poll() {
        let transport = MemoryTransport::new();
        let mut source = transport.source();

        transport.push_input(RawMidiEvent::new(144, 0, 127));
        transport.push_input(RawMidiEvent::new(144, 0, 0));

        assert_eq!(source.poll().unwrap().unwrap().velocity, 127);
        assert_eq!(transport.pending_input(), 1);
        assert_eq!(source.poll().unwrap().unwrap().velocity, 0);
        assert!(source.poll().unwrap().is_none());
        assert_eq!(transport.polls(), 3);
    }

    #[test]
    fn test_memory_sink_records_and_fails_on_request() {
        let transport = MemoryTransport::new();
        let mut sink = transport.sink();

        sink.send(&[144, 1, 127]).unwrap();
        transport.fail_next_send();
        assert!(matches!(
            sink.send(&[144, 2, 127]),
            Err(LaunchpadError::Send(_))
        ));
        sink.send(&[144, 3, 127]).unwrap();

        assert_eq!(transport.sent(), vec![vec![144, 1, 127], vec![144, 3, 127]]);
    }
}
