use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use launchpad_core::{
    list_devices, ButtonEvent, Color, ConfigError, ConfigManager, DeviceSelector, Launchpad,
    LaunchpadConfig, LaunchpadMapping, LightState, PortDirection,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Drive a Launchpad grid controller from the command line.
#[derive(Parser, Debug)]
#[command(name = "launchpad")]
#[command(about = "Launchpad grid controller driver")]
struct Args {
    /// Configuration file (default: launchpad.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Input port index or name substring
    #[arg(long)]
    input: Option<DeviceSelector>,

    /// Output port index or name substring
    #[arg(long)]
    output: Option<DeviceSelector>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List MIDI input and output ports
    Devices,

    /// Light every pad, hold, then switch everything off
    TestLights {
        #[arg(long, default_value = "1000")]
        hold_ms: u64,
    },

    /// Switch every pad off
    Reset,

    /// Set one pad to on, off, or a palette color (name or code)
    Set {
        row: u8,
        column: u8,
        #[arg(value_parser = parse_light)]
        state: LightState,
    },

    /// Print button events until Ctrl-C
    Listen {
        /// Poll interval in milliseconds (default from config)
        #[arg(long)]
        poll_ms: Option<u64>,

        /// Light pads while they are held
        #[arg(long, default_value = "false")]
        echo: bool,
    },
}

fn parse_light(s: &str) -> Result<LightState, String> {
    match s.to_ascii_lowercase().as_str() {
        "on" | "true" => return Ok(LightState::Switch(true)),
        "off" | "false" => return Ok(LightState::Switch(false)),
        _ => {}
    }

    if let Ok(code) = s.parse::<u8>() {
        return Color::try_from(code)
            .map(LightState::Color)
            .map_err(|e| e.to_string());
    }

    Color::from_name(s)
        .map(LightState::Color)
        .ok_or_else(|| format!("Invalid light state: {}", s))
}

/// Fall back to the first port named like a Launchpad.
fn or_default_device(selector: Option<DeviceSelector>) -> Option<DeviceSelector> {
    selector.or_else(|| Some(DeviceSelector::Name(LaunchpadMapping::device_name().to_string())))
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut manager = ConfigManager::new(args.config);
    let mut config = apply_overrides(manager.load()?, args.input, args.output)?;

    match args.command {
        Command::Devices => {
            for device in list_devices()? {
                let direction = match device.direction {
                    PortDirection::Input => "in ",
                    PortDirection::Output => "out",
                };
                println!("{} {:>2}: {}", direction, device.index, device.name);
            }
        }

        Command::TestLights { hold_ms } => {
            let mut launchpad = connect_output(&config)?;
            launchpad
                .test_lights_for(Duration::from_millis(hold_ms))
                .await?;
        }

        Command::Reset => {
            connect_output(&config)?.reset_lights()?;
        }

        Command::Set { row, column, state } => {
            connect_output(&config)?.set_button_light(row, column, state)?;
        }

        Command::Listen { poll_ms, echo } => {
            if let Some(poll_ms) = poll_ms {
                config.poll_interval_ms = poll_ms;
                ConfigManager::validate(&config)?;
            }
            listen(config, echo).await?;
        }
    }

    Ok(())
}

/// Apply command line port choices over the file config and validate the result.
fn apply_overrides(
    mut config: LaunchpadConfig,
    input: Option<DeviceSelector>,
    output: Option<DeviceSelector>,
) -> Result<LaunchpadConfig, ConfigError> {
    if input.is_some() {
        config.input = input;
    }
    if output.is_some() {
        config.output = output;
    }
    ConfigManager::validate(&config)?;
    Ok(config)
}

fn connect_output(config: &LaunchpadConfig) -> Result<Launchpad, anyhow::Error> {
    let config = LaunchpadConfig {
        input: None,
        output: or_default_device(config.output.clone()),
        ..config.clone()
    };
    Ok(Launchpad::connect(&config)?)
}

async fn listen(mut config: LaunchpadConfig, echo: bool) -> Result<(), anyhow::Error> {
    config.input = or_default_device(config.input);
    if echo {
        config.output = or_default_device(config.output);
    }

    let mut launchpad = Launchpad::connect(&config)?;
    println!("Listening, press Ctrl-C to stop");

    run_listener(&mut launchpad, config.poll_interval(), echo, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

/// Print button events until `shutdown` resolves or the listener dies.
async fn run_listener(
    launchpad: &mut Launchpad,
    poll_interval: Duration,
    echo: bool,
    shutdown: impl Future<Output = ()>,
) -> Result<(), anyhow::Error> {
    // Lights are written from here, not from the listener task.
    let (tx, mut rx) = mpsc::unbounded_channel();
    launchpad.add_handler(move |event: &ButtonEvent| {
        let _ = tx.send(*event);
    });

    let mut handle = launchpad.start_listening(poll_interval)?;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = handle.finished() => break,
            Some(event) = rx.recv() => {
                println!(
                    "row {} column {} {}",
                    event.row,
                    event.column,
                    if event.pressed { "pressed" } else { "released" }
                );
                if echo {
                    let state: LightState = if event.pressed {
                        Color::Green3.into()
                    } else {
                        false.into()
                    };
                    if let Err(e) = launchpad.set_button_light(event.row, event.column, state) {
                        tracing::warn!("Echo failed: {}", e);
                    }
                }
            }
        }
    }

    launchpad.stop_listening(handle).await?;
    if echo {
        launchpad.reset_lights()?;
    }
    Ok(())
}
