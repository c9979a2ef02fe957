//! Launchpad controller.
//!
//! Owns the input and output ports, sets pad lights and runs the button
//! listener on a tokio task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};

use crate::config::LaunchpadConfig;
use crate::error::LaunchpadError;
use crate::event::LightState;
use crate::listener::{ButtonHandler, HandlerRegistry};
use crate::mapping::LaunchpadMapping;
use crate::transport::{MidiSink, MidiSource, MidirInput, MidirOutput};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shorter intervals are raised to this so the listener never spins.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// How long `test_lights` keeps every pad lit.
pub const DEFAULT_TEST_HOLD: Duration = Duration::from_secs(1);

/// A Launchpad with an optional input and an optional output.
pub struct Launchpad {
    /// Taken by the listener task while it runs
    input: Option<Box<dyn MidiSource>>,
    output: Option<Box<dyn MidiSink>>,
    handlers: HandlerRegistry,
}

impl Launchpad {
    pub fn new(input: Option<Box<dyn MidiSource>>, output: Option<Box<dyn MidiSink>>) -> Self {
        Self {
            input,
            output,
            handlers: HandlerRegistry::new(),
        }
    }

    /// Open the ports named in the config through `midir`.
    pub fn connect(config: &LaunchpadConfig) -> Result<Self, LaunchpadError> {
        let input = match &config.input {
            Some(selector) => {
                let input = MidirInput::open(selector)?;
                tracing::info!("MIDI input connected: {}", input.port_name());
                Some(Box::new(input) as Box<dyn MidiSource>)
            }
            None => None,
        };
        let output = match &config.output {
            Some(selector) => {
                let output = MidirOutput::open(selector)?;
                tracing::info!("MIDI output connected: {}", output.port_name());
                Some(Box::new(output) as Box<dyn MidiSink>)
            }
            None => None,
        };

        Ok(Self::new(input, output))
    }

    pub fn has_input(&self) -> bool {
        self.input.is_some()
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    /// Register a handler. Handlers are called in registration order, and
    /// may be added while the listener is running.
    pub fn add_handler<H>(&self, handler: H)
    where
        H: ButtonHandler + 'static,
    {
        self.handlers.register(Arc::new(handler));
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Light a single pad.
    pub fn set_button_light(
        &mut self,
        row: u8,
        column: u8,
        state: impl Into<LightState>,
    ) -> Result<(), LaunchpadError> {
        let output = self.output.as_mut().ok_or(LaunchpadError::NoOutput)?;
        let message = LaunchpadMapping::light_message(row, column, state.into())?;

        tracing::debug!("Sending {:?}", message);
        output.send(&message)
    }

    /// Switch every pad off.
    pub fn reset_lights(&mut self) -> Result<(), LaunchpadError> {
        self.sweep(false)
    }

    /// Light every pad for one second, then switch them all off.
    pub async fn test_lights(&mut self) -> Result<(), LaunchpadError> {
        self.test_lights_for(DEFAULT_TEST_HOLD).await
    }

    pub async fn test_lights_for(&mut self, hold: Duration) -> Result<(), LaunchpadError> {
        self.sweep(true)?;
        tokio::time::sleep(hold).await;
        self.sweep(false)
    }

    fn sweep(&mut self, on: bool) -> Result<(), LaunchpadError> {
        for (row, col) in LaunchpadMapping::sweep() {
            self.set_button_light(row, col, on)?;
        }
        Ok(())
    }

    /// Start polling the input on a background task.
    ///
    /// The input moves to the task until [`ListenerHandle::stop`] hands it
    /// back. Dropping the handle also stops the task, but the input is lost.
    /// Intervals below [`MIN_POLL_INTERVAL`] are raised to it.
    pub fn start_listening(
        &mut self,
        poll_interval: Duration,
    ) -> Result<ListenerHandle, LaunchpadError> {
        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| LaunchpadError::NoRuntime)?;
        let source = self.input.take().ok_or(LaunchpadError::NoInput)?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = runtime.spawn(listen(
            source,
            self.handlers.clone(),
            poll_interval,
            stop_rx,
        ));

        tracing::info!("Listening for button events every {:?}", poll_interval);

        Ok(ListenerHandle {
            stop: Some(stop_tx),
            task,
            outcome: None,
        })
    }

    /// Stop a listener and take its input back.
    pub async fn stop_listening(&mut self, handle: ListenerHandle) -> Result<(), LaunchpadError> {
        let source = handle.stop().await?;
        self.restore_input(source);
        Ok(())
    }

    pub fn restore_input(&mut self, input: Box<dyn MidiSource>) {
        self.input = Some(input);
    }
}

type ListenerResult = (Box<dyn MidiSource>, Result<(), LaunchpadError>);

/// Handle to a running listener task.
pub struct ListenerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<ListenerResult>,
    /// Set once `finished` has observed the task ending
    outcome: Option<Result<ListenerResult, JoinError>>,
}

impl ListenerHandle {
    pub fn is_running(&self) -> bool {
        self.outcome.is_none() && !self.task.is_finished()
    }

    /// Wait for the task to end on its own, without asking it to stop.
    ///
    /// Only a transport error (or a panicking handler) ends the task, so this
    /// is the way to notice a dead input. Cancel safe.
    pub async fn finished(&mut self) {
        if self.outcome.is_none() {
            let joined = (&mut self.task).await;
            self.outcome = Some(joined);
        }
    }

    /// Signal the task, wait for it and return its input.
    ///
    /// If the task already ended on a transport error, that error is returned.
    pub async fn stop(mut self) -> Result<Box<dyn MidiSource>, LaunchpadError> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }

        let joined = match self.outcome.take() {
            Some(joined) => joined,
            None => self.task.await,
        };
        let (source, result) = joined.map_err(|_| LaunchpadError::ListenerPanicked)?;
        result.map(|_| source)
    }
}

async fn listen(
    mut source: Box<dyn MidiSource>,
    handlers: HandlerRegistry,
    poll_interval: Duration,
    mut stop: oneshot::Receiver<()>,
) -> ListenerResult {
    loop {
        match source.poll() {
            Ok(Some(raw)) => match LaunchpadMapping::decode(&raw) {
                Ok(event) => {
                    tracing::debug!(
                        "Button ({}, {}) {}",
                        event.row,
                        event.column,
                        if event.pressed { "pressed" } else { "released" }
                    );
                    handlers.dispatch(&event);
                }
                Err(e) => tracing::warn!("Ignoring MIDI message: {}", e),
            },
            Ok(None) => {}
            Err(e) => {
                tracing::error!("Button listener stopped: {}", e);
                return (source, Err(e));
            }
        }

        tokio::select! {
            _ = &mut stop => break,
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }

    tracing::info!("Button listener stopped");
    (source, Ok(()))
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::color::Color;
    use crate::event::{ButtonEvent, RawMidiEvent};
    use crate::transport::MemoryTransport;

    fn launchpad() -> (Launchpad, MemoryTransport) {
        let transport = MemoryTransport::new();
        let launchpad = Launchpad::new(Some(transport.source()), Some(transport.sink()));
        (launchpad, transport)
    }

    fn recorder(launchpad: &Launchpad) -> Arc<Mutex<Vec<ButtonEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        launchpad.add_handler(move |event: &ButtonEvent| sink.lock().push(*event));
        events
    }

    #[test]
    fn test_set_button_light_grid() {
        let (mut launchpad, transport) = launchpad();

        launchpad.set_button_light(1, 0, true).unwrap();
        launchpad.set_button_light(1, 0, false).unwrap();

        assert_eq!(transport.sent(), vec![vec![144, 0, 127], vec![144, 0, 0]]);
    }

    #[test]
    fn test_set_button_light_top_row() {
        let (mut launchpad, transport) = launchpad();

        launchpad.set_button_light(0, 3, true).unwrap();

        assert_eq!(transport.sent(), vec![vec![176, 107, 127]]);
    }

    #[test]
    fn test_set_button_light_color() {
        let (mut launchpad, transport) = launchpad();

        launchpad.set_button_light(8, 7, Color::Orange4).unwrap();

        assert_eq!(transport.sent(), vec![vec![144, 119, 35]]);
    }

    #[test]
    fn test_set_button_light_without_output() {
        let transport = MemoryTransport::new();
        let mut launchpad = Launchpad::new(Some(transport.source()), None);

        assert!(!launchpad.has_output());
        assert!(matches!(
            launchpad.set_button_light(1, 1, true),
            Err(LaunchpadError::NoOutput)
        ));
    }

    #[test]
    fn test_set_button_light_out_of_range() {
        let (mut launchpad, transport) = launchpad();

        assert!(matches!(
            launchpad.set_button_light(9, 0, true),
            Err(LaunchpadError::OutOfRange { row: 9, column: 0 })
        ));
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_reset_lights() {
        let (mut launchpad, transport) = launchpad();

        launchpad.reset_lights().unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 90);
        assert!(sent.iter().all(|message| message[2] == 0));
        assert_eq!(sent[0], vec![176, 104, 0]);
        assert_eq!(sent[89], vec![144, 121, 0]);
    }

    #[test]
    fn test_reset_lights_stops_on_send_error() {
        let (mut launchpad, transport) = launchpad();

        transport.fail_next_send();
        assert!(matches!(
            launchpad.reset_lights(),
            Err(LaunchpadError::Send(_))
        ));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_test_lights() {
        let (mut launchpad, transport) = launchpad();

        let started = tokio::time::Instant::now();
        launchpad.test_lights().await.unwrap();

        assert!(started.elapsed() >= DEFAULT_TEST_HOLD);
        let sent = transport.sent();
        assert_eq!(sent.len(), 180);
        assert!(sent[..90].iter().all(|message| message[2] == 127));
        assert!(sent[90..].iter().all(|message| message[2] == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_dispatches_events() {
        let (mut launchpad, transport) = launchpad();
        let events = recorder(&launchpad);

        transport.push_input(RawMidiEvent::new(144, 16, 127));
        transport.push_input(RawMidiEvent::new(176, 106, 0));

        let handle = launchpad
            .start_listening(Duration::from_millis(10))
            .unwrap();
        assert!(!launchpad.has_input());

        tokio::time::sleep(Duration::from_millis(50)).await;
        launchpad.stop_listening(handle).await.unwrap();

        assert!(launchpad.has_input());
        assert_eq!(
            *events.lock(),
            vec![
                ButtonEvent {
                    row: 2,
                    column: 0,
                    pressed: true
                },
                ButtonEvent {
                    row: 0,
                    column: 2,
                    pressed: false
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_reads_one_message_per_interval() {
        let (mut launchpad, transport) = launchpad();
        let events = recorder(&launchpad);

        for position in 0..3 {
            transport.push_input(RawMidiEvent::new(144, position, 127));
        }

        let handle = launchpad
            .start_listening(Duration::from_millis(10))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(15)).await;

        assert_eq!(events.lock().len(), 2);
        assert_eq!(transport.pending_input(), 1);

        handle.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_calls_handlers_in_order() {
        let (mut launchpad, transport) = launchpad();
        let order = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second"] {
            let order = order.clone();
            launchpad.add_handler(move |_: &ButtonEvent| order.lock().push(name));
        }
        assert_eq!(launchpad.handler_count(), 2);

        transport.push_input(RawMidiEvent::new(144, 0, 127));
        let handle = launchpad.start_listening(DEFAULT_POLL_INTERVAL).unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.stop().await.unwrap();

        assert_eq!(*order.lock(), vec!["first", "second"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_skips_unmapped_messages() {
        let (mut launchpad, transport) = launchpad();
        let events = recorder(&launchpad);

        transport.push_input(RawMidiEvent::new(176, 5, 127));
        transport.push_input(RawMidiEvent::new(144, 33, 127));

        let handle = launchpad
            .start_listening(Duration::from_millis(10))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop().await.unwrap();

        assert_eq!(
            *events.lock(),
            vec![ButtonEvent {
                row: 3,
                column: 1,
                pressed: true
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_surfaces_transport_errors() {
        let (mut launchpad, transport) = launchpad();

        transport.fail_next_poll();
        let handle = launchpad
            .start_listening(Duration::from_millis(10))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!handle.is_running());
        assert!(matches!(
            handle.stop().await,
            Err(LaunchpadError::Transport(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_long_interval() {
        let (mut launchpad, transport) = launchpad();

        let handle = launchpad
            .start_listening(Duration::from_secs(3600))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(handle.is_running());

        let started = tokio::time::Instant::now();
        launchpad.stop_listening(handle).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(transport.polls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_resolves_on_transport_error() {
        let (mut launchpad, transport) = launchpad();

        let mut handle = launchpad
            .start_listening(Duration::from_millis(10))
            .unwrap();

        // Still running: nothing ends the task on its own yet.
        let waited = tokio::time::timeout(Duration::from_millis(50), handle.finished()).await;
        assert!(waited.is_err());
        assert!(handle.is_running());

        transport.fail_next_poll();
        tokio::time::timeout(Duration::from_secs(1), handle.finished())
            .await
            .unwrap();

        assert!(!handle.is_running());
        assert!(matches!(
            handle.stop().await,
            Err(LaunchpadError::Transport(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_added_while_listening() {
        let (mut launchpad, transport) = launchpad();

        let handle = launchpad
            .start_listening(Duration::from_millis(10))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;

        let events = recorder(&launchpad);
        transport.push_input(RawMidiEvent::new(144, 50, 127));
        tokio::time::sleep(Duration::from_millis(25)).await;
        handle.stop().await.unwrap();

        assert_eq!(
            *events.lock(),
            vec![ButtonEvent {
                row: 4,
                column: 2,
                pressed: true
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_listener() {
        let (mut launchpad, transport) = launchpad();

        let handle = launchpad
            .start_listening(Duration::from_millis(10))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        drop(handle);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let polls = transport.polls();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(transport.polls(), polls);
        assert!(!launchpad.has_input());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_raised_to_minimum() {
        let (mut launchpad, transport) = launchpad();

        let handle = launchpad.start_listening(Duration::ZERO).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.stop().await.unwrap();

        // One poll per millisecond, plus the first one at start.
        let polls = transport.polls();
        assert!((10..=12).contains(&polls), "polled {} times", polls);
    }

    #[tokio::test]
    async fn test_start_listening_requires_input() {
        let transport = MemoryTransport::new();
        let mut launchpad = Launchpad::new(None, Some(transport.sink()));

        assert!(matches!(
            launchpad.start_listening(DEFAULT_POLL_INTERVAL),
            Err(LaunchpadError::NoInput)
        ));
    }

    #[tokio::test]
    async fn test_input_is_exclusive_to_one_listener() {
        let (mut launchpad, _transport) = launchpad();

        let handle = launchpad.start_listening(DEFAULT_POLL_INTERVAL).unwrap();
        assert!(matches!(
            launchpad.start_listening(DEFAULT_POLL_INTERVAL),
            Err(LaunchpadError::NoInput)
        ));

        launchpad.stop_listening(handle).await.unwrap();
        let handle = launchpad.start_listening(DEFAULT_POLL_INTERVAL).unwrap();
        handle.stop().await.unwrap();
    }

    #[test]
    fn test_start_listening_outside_runtime() {
        let (mut launchpad, _transport) = launchpad();

        assert!(matches!(
            launchpad.start_listening(DEFAULT_POLL_INTERVAL),
            Err(LaunchpadError::NoRuntime)
        ));
        assert!(launchpad.has_input());
    }
}
