//! Wall remote: command-line client for the wall display.
//!
//! Opens the wall's control WebSocket, sends one command (or streams input),
//! prints whatever the wall replies, and exits.
//!
//! # Usage
//!
//! ```text
//! wall-remote [OPTIONS] <COMMAND>
//!
//! Commands:
//!   send      Send any command: `send "shader read" id=3`
//!   shader    list | read <ID> | activate <ID> | remove <ID>
//!   emulator  list | start <ROM> | input <KEY> [--release] | turnoff
//!   video     Play a video URL
//!   poetry    Show a poem
//!   tox       start | message <TEXT>
//!   turnoff   Blank the wall
//!   watch     Print messages the wall pushes without being asked
//!   joypad    Forward key and gamepad events read from stdin
//!
//! Options:
//!   --origin <URL>               Page origin [default: http://localhost:1337]
//!   --ws-path <PATH>             WebSocket path [default: /blinkenwall]
//!   --ws-port <PORT>             Override the origin's port
//!   --reconnect-delay-ms <MS>    Delay before reconnecting [default: 2000]
//!   --request-timeout-ms <MS>    Give up on a reply after this long
//!   --config <FILE>              TOML config file
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                   | Option                   |
//! |----------------------------|--------------------------|
//! | `WALL_ORIGIN`              | `--origin`               |
//! | `WALL_WS_PATH`             | `--ws-path`              |
//! | `WALL_WS_PORT`             | `--ws-port`              |
//! | `WALL_RECONNECT_DELAY_MS`  | `--reconnect-delay-ms`   |
//! | `WALL_REQUEST_TIMEOUT_MS`  | `--request-timeout-ms`   |
//! | `WALL_CONFIG`              | `--config`               |
//!
//! Precedence, highest first: command line, environment, config file,
//! built-in defaults.
//!
//! # Joypad input format
//!
//! `wall-remote joypad` reads one event per line:
//!
//! ```text
//! key KeyW down          keyboard press (DOM key code)
//! key KeyW up            keyboard release
//! key KeyW down repeat   auto-repeat, ignored
//! pad 0 1000000000 -1 0  gamepad 0: button bits, then axis values
//! unplug 0               gamepad 0 disconnected
//! ```
//!
//! At end of input the command waits until every event has been sent to the
//! wall before exiting, so `printf 'key KeyW down\nkey KeyW up\n' |
//! wall-remote joypad` works against a wall that is still coming up.  Ctrl+C
//! exits without waiting.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use wall_core::keymap::from_key_code;
use wall_core::{Command, DeviceId, DeviceSample, EmulatorKey, GamepadMapping, OutboundMessage};
use wall_remote::application::JoypadBridge;
use wall_remote::domain::{load_config_file, RemoteConfig};
use wall_remote::infrastructure::{
    spawn_frame_loop, ConnectionHandle, ConnectionManager, SharedGamepads, WsConnector,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Remote control for the wall display.
#[derive(Debug, Parser)]
#[command(
    name = "wall-remote",
    about = "Send commands to the wall display over its WebSocket control channel",
    version
)]
struct Cli {
    /// Origin of the page that would host the remote, e.g. `https://wall.example`.
    ///
    /// `https` origins connect with `wss`, everything else with `ws`.
    #[arg(long, global = true, env = "WALL_ORIGIN")]
    origin: Option<String>,

    /// Path of the WebSocket endpoint.
    #[arg(long, global = true, env = "WALL_WS_PATH")]
    ws_path: Option<String>,

    /// Port of the WebSocket endpoint, if it differs from the origin's.
    #[arg(long, global = true, env = "WALL_WS_PORT")]
    ws_port: Option<u16>,

    /// Milliseconds to wait before reconnecting after the connection drops.
    #[arg(long, global = true, env = "WALL_RECONNECT_DELAY_MS")]
    reconnect_delay_ms: Option<u64>,

    /// Milliseconds to wait for a reply before giving up.  Waits forever when
    /// unset.
    #[arg(long, global = true, env = "WALL_REQUEST_TIMEOUT_MS")]
    request_timeout_ms: Option<u64>,

    /// TOML config file.  Command-line options override its values.
    #[arg(long, global = true, env = "WALL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Send any command.  FIELD=VALUE pairs are parsed as JSON when possible,
    /// otherwise taken as strings.
    Send {
        /// Value of the `cmd` field, e.g. "shader read".
        cmd: String,
        /// Extra fields, e.g. `id=3` or `title="hello"`.
        fields: Vec<String>,
        /// Exit once the message is written instead of waiting for a reply.
        #[arg(long)]
        no_wait: bool,
    },
    /// Shader management.
    #[command(subcommand)]
    Shader(ShaderCommand),
    /// The wall's game emulator.
    #[command(subcommand)]
    Emulator(EmulatorCommand),
    /// Play a video.
    Video { url: String },
    /// Show a poem.
    Poetry { text: String },
    /// Tox chat.
    #[command(subcommand)]
    Tox(ToxCommand),
    /// Blank the wall.
    Turnoff,
    /// Print unsolicited messages until Ctrl+C.
    Watch,
    /// Forward key and gamepad events read from stdin as emulator input.
    Joypad,
}

#[derive(Debug, Subcommand)]
enum ShaderCommand {
    List,
    Read { id: String },
    Activate { id: String },
    Remove { id: String },
}

#[derive(Debug, Subcommand)]
enum EmulatorCommand {
    List,
    Start {
        rom: String,
    },
    /// Press (or release) one key.  Accepts a key name (`start`, `a`, ...)
    /// or a DOM key code (`KeyW`, `ArrowUp`, ...).
    Input {
        key: String,
        #[arg(long)]
        release: bool,
    },
    Turnoff,
}

#[derive(Debug, Subcommand)]
enum ToxCommand {
    Start,
    Message { text: String },
}

impl Cli {
    /// Builds the runtime configuration: defaults, then the config file, then
    /// command-line and environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    fn remote_config(&self) -> anyhow::Result<RemoteConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_file(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?
                .into(),
            None => RemoteConfig::default(),
        };

        if let Some(origin) = &self.origin {
            config.origin = origin.clone();
        }
        if let Some(path) = &self.ws_path {
            config.ws_path = path.clone();
        }
        if let Some(port) = self.ws_port {
            config.ws_port = Some(port);
        }
        if let Some(ms) = self.reconnect_delay_ms {
            config.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.request_timeout_ms {
            config.request_timeout = Some(Duration::from_millis(ms));
        }
        Ok(config)
    }
}

// ── Requests ──────────────────────────────────────────────────────────────────

/// A one-shot message and whether to wait for its reply.
#[derive(Debug)]
struct Request {
    message: OutboundMessage,
    wait: bool,
}

/// What `main` does once the connection is open.
#[derive(Debug)]
enum Action {
    Request(Request),
    Watch,
    Joypad,
}

impl CliCommand {
    /// Resolves the subcommand into the message it sends, or into one of the
    /// streaming modes.
    fn into_action(self) -> anyhow::Result<Action> {
        let (command, wait) = match self {
            CliCommand::Send {
                cmd,
                fields,
                no_wait,
            } => {
                let mut message = OutboundMessage::command(cmd);
                for field in &fields {
                    let (key, value) = parse_field(field)?;
                    message.insert(key, value);
                }
                return Ok(Action::Request(Request {
                    message,
                    wait: !no_wait,
                }));
            }
            CliCommand::Shader(ShaderCommand::List) => (Command::ShaderList, true),
            CliCommand::Shader(ShaderCommand::Read { id }) => (Command::ShaderRead { id }, true),
            CliCommand::Shader(ShaderCommand::Activate { id }) => {
                (Command::ShaderActivate { id }, true)
            }
            CliCommand::Shader(ShaderCommand::Remove { id }) => {
                (Command::ShaderRemove { id }, true)
            }
            CliCommand::Emulator(EmulatorCommand::List) => (Command::EmulatorList, true),
            CliCommand::Emulator(EmulatorCommand::Start { rom }) => {
                (Command::EmulatorStart { rom }, true)
            }
            CliCommand::Emulator(EmulatorCommand::Input { key, release }) => {
                let key = parse_emulator_key(&key)?;
                (
                    Command::EmulatorInput {
                        key,
                        press: !release,
                    },
                    false,
                )
            }
            CliCommand::Emulator(EmulatorCommand::Turnoff) => (Command::EmulatorTurnOff, true),
            CliCommand::Video { url } => (Command::VideoPlay { url }, true),
            CliCommand::Poetry { text } => (Command::ShowPoetry { text }, true),
            CliCommand::Tox(ToxCommand::Start) => (Command::ToxStart, true),
            CliCommand::Tox(ToxCommand::Message { text }) => (Command::ToxMessage { text }, true),
            CliCommand::Turnoff => (Command::TurnOff, true),
            CliCommand::Watch => return Ok(Action::Watch),
            CliCommand::Joypad => return Ok(Action::Joypad),
        };
        let message = command
            .into_message()
            .context("failed to encode command")?;
        Ok(Action::Request(Request { message, wait }))
    }
}

/// Splits `FIELD=VALUE`.  The value is JSON if it parses as JSON, otherwise
/// a plain string.
fn parse_field(field: &str) -> anyhow::Result<(String, Value)> {
    let (key, raw) = field
        .split_once('=')
        .ok_or_else(|| anyhow!("expected FIELD=VALUE, got {field:?}"))?;
    if key.is_empty() {
        bail!("empty field name in {field:?}");
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

fn parse_emulator_key(key: &str) -> anyhow::Result<EmulatorKey> {
    key.parse::<EmulatorKey>()
        .ok()
        .or_else(|| from_key_code(key))
        .with_context(|| format!("unknown emulator key {key:?}"))
}

// ── Joypad input ──────────────────────────────────────────────────────────────

/// One line of `joypad` input.
#[derive(Debug, PartialEq)]
enum JoypadLine {
    Key {
        code: String,
        pressed: bool,
        repeat: bool,
    },
    Pad {
        device: DeviceId,
        sample: DeviceSample,
    },
    Unplug(DeviceId),
}

impl JoypadLine {
    /// Parses one line.  Blank lines and `#` comments yield `None`.
    fn parse(line: &str) -> anyhow::Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        if verb.starts_with('#') {
            return Ok(None);
        }

        let parsed = match verb {
            "key" => {
                let code = words.next().context("key: missing key code")?.to_string();
                let pressed = match words.next() {
                    Some("down") => true,
                    Some("up") => false,
                    other => bail!("key: expected down or up, got {other:?}"),
                };
                let repeat = matches!(words.next(), Some("repeat"));
                JoypadLine::Key {
                    code,
                    pressed,
                    repeat,
                }
            }
            "pad" => {
                let device = parse_device(words.next())?;
                let buttons = words
                    .next()
                    .unwrap_or("")
                    .chars()
                    .map(|c| match c {
                        '0' => Ok(false),
                        '1' => Ok(true),
                        other => Err(anyhow!("pad: button bits must be 0 or 1, got {other:?}")),
                    })
                    .collect::<anyhow::Result<Vec<bool>>>()?;
                let axes = words
                    .map(|w| {
                        w.parse::<f32>()
                            .with_context(|| format!("pad: invalid axis value {w:?}"))
                    })
                    .collect::<anyhow::Result<Vec<f32>>>()?;
                JoypadLine::Pad {
                    device,
                    sample: DeviceSample::new(buttons, axes),
                }
            }
            "unplug" => JoypadLine::Unplug(parse_device(words.next())?),
            other => bail!("unknown joypad event {other:?}"),
        };
        Ok(Some(parsed))
    }
}

fn parse_device(word: Option<&str>) -> anyhow::Result<DeviceId> {
    let word = word.context("missing gamepad index")?;
    let index = word
        .parse::<u32>()
        .with_context(|| format!("invalid gamepad index {word:?}"))?;
    Ok(DeviceId(index))
}

// ── Subcommand runners ────────────────────────────────────────────────────────

async fn run_request(remote: &ConnectionHandle, request: Request) -> anyhow::Result<()> {
    let Request { message, wait } = request;
    let name = message.command_name().unwrap_or("?").to_string();

    if !wait {
        // The message must leave the queue before dispose drops it.
        remote.send(message);
        tokio::select! {
            flushed = remote.flush() => {
                if !flushed {
                    bail!("connection closed before {name:?} was sent");
                }
            }
            _ = tokio::signal::ctrl_c() => bail!("interrupted before {name:?} was sent"),
        }
        info!("sent {name:?}");
        return Ok(());
    }

    let reply = tokio::select! {
        reply = remote.request(message) => {
            reply.with_context(|| format!("no reply to {name:?}"))?
        }
        _ = tokio::signal::ctrl_c() => bail!("interrupted while waiting for {name:?}"),
    };
    let reply = reply.into_result()?;
    println!("{}", serde_json::to_string_pretty(&reply.into_value())?);
    Ok(())
}

async fn run_watch(remote: &ConnectionHandle) -> anyhow::Result<()> {
    let mut messages = remote.subscribe();
    info!("watching for messages; Ctrl+C to stop");
    loop {
        tokio::select! {
            message = messages.recv() => match message {
                Ok(reply) => println!("{}", serde_json::to_string(&reply.into_value())?),
                Err(RecvError::Lagged(skipped)) => warn!("skipped {skipped} message(s)"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

async fn run_joypad(remote: &ConnectionHandle, config: &RemoteConfig) -> anyhow::Result<()> {
    let pads = SharedGamepads::new();
    let poller = spawn_frame_loop(pads.clone(), config.frame_period, config.axis_tolerance);
    let keyboard = JoypadBridge::new(remote.clone(), GamepadMapping::standard());
    poller
        .add_listener(JoypadBridge::new(remote.clone(), GamepadMapping::standard()).into_listener())
        .await
        .context("frame loop stopped unexpectedly")?;

    let mut known = std::collections::HashSet::new();
    let mut interrupted = false;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => {
                interrupted = true;
                None
            }
        };
        let Some(line) = line else { break };

        match JoypadLine::parse(&line) {
            Ok(Some(JoypadLine::Key {
                code,
                pressed,
                repeat,
            })) => {
                keyboard.on_key(&code, pressed, repeat);
            }
            Ok(Some(JoypadLine::Pad { device, sample })) => {
                if known.insert(device) {
                    poller.device_connected(device, sample.clone());
                }
                pads.set(device, sample);
            }
            Ok(Some(JoypadLine::Unplug(device))) => {
                known.remove(&device);
                pads.remove(device);
                poller.device_disconnected(device);
            }
            Ok(None) => {}
            Err(e) => warn!("ignoring input line {line:?}: {e:#}"),
        }
    }

    poller.shutdown().await;

    // End of input: everything read so far must reach the wall before
    // `dispose` drops the queue.
    if !interrupted {
        tokio::select! {
            flushed = remote.flush() => {
                if !flushed {
                    bail!("connection closed before queued input was sent");
                }
            }
            _ = tokio::signal::ctrl_c() => warn!("interrupted before queued input was sent"),
        }
    }
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `RUST_LOG` controls verbosity; default to `info`.  Logs go to stderr so
    // replies on stdout stay machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.remote_config()?;
    let action = cli.command.into_action()?;

    let remote = ConnectionManager::open(&config, WsConnector::default())
        .with_context(|| format!("invalid wall origin {:?}", config.origin))?;
    info!("wall-remote connecting via origin {}", config.origin);

    let result = match action {
        Action::Request(request) => run_request(&remote, request).await,
        Action::Watch => run_watch(&remote).await,
        Action::Joypad => run_joypad(&remote, &config).await,
    };

    remote.dispose().await;
    result
}

// ── Tests ─────────────────────────────────────────────────────────────────────
