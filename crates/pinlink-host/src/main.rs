//! pinlink command-line front end.
//!
//! Drives a single pin (or a NeoPixel strip) on a device reachable over
//! WebSocket, then disconnects.  `watch` keeps running and prints every
//! change of an input pin as a JSON line until Ctrl+C.
//!
//! # Usage
//!
//! ```text
//! pinlink [OPTIONS] <COMMAND>
//!
//! Commands:
//!   digital <PIN> <LEVEL>           Set a digital output (0 or 1)
//!   analog  <PIN> <VALUE>           Set a PWM output (0-255)
//!   watch   <PIN> [--analog]        Print readings as JSON lines
//!   pixels  <PIN> <COUNT> <COLOR>   Fill a NeoPixel strip (COLOR is RRGGBB hex)
//!
//! Options:
//!   --device  <URL>    WebSocket URL of the device
//!   --config  <PATH>   TOML config file
//!   --timeout <SECS>   How long to wait for the link [default: 10]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable          | Description                 |
//! |-------------------|-----------------------------|
//! | `PINLINK_DEVICE`  | WebSocket URL of the device |
//! | `PINLINK_CONFIG`  | Path of the TOML config     |
//!
//! Pins are given as plain numbers or with a board prefix: `13`, `D13`, `A0`.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use pinlink_core::{protocol::pins, ConnectionState, PinId, PinMode, SessionConfig};
use pinlink_host::extensions::{NeoPixel, PixelColor};
use pinlink_host::infrastructure::ConfigFile;
use pinlink_host::Session;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Time given to the socket task to write the last frames and the close
/// handshake before the process exits.
const LINGER: Duration = Duration::from_millis(250);

const POLL: Duration = Duration::from_millis(20);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Drive microcontroller pins over WebSocket.
#[derive(Debug, Parser)]
#[command(name = "pinlink", version)]
struct Cli {
    /// WebSocket URL of the device, e.g. `ws://192.168.4.1:81`.
    ///
    /// Overrides `[device] address` from the config file.
    #[arg(long, env = "PINLINK_DEVICE")]
    device: Option<String>,

    /// TOML config file with throttle and reconnect settings.
    #[arg(long, env = "PINLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds to wait for the link to come up.
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Set a digital output.
    Digital {
        #[arg(value_parser = parse_pin)]
        pin: PinId,
        level: u8,
    },
    /// Set a PWM output.
    Analog {
        #[arg(value_parser = parse_pin)]
        pin: PinId,
        value: f64,
    },
    /// Print readings of an input pin until Ctrl+C.
    Watch {
        #[arg(value_parser = parse_pin)]
        pin: PinId,
        /// Read the pin as analog instead of digital.
        #[arg(long)]
        analog: bool,
        /// Report interval requested from the device, in milliseconds.
        #[arg(long, default_value_t = 200)]
        interval_ms: u64,
    },
    /// Fill a NeoPixel strip with one colour.
    Pixels {
        #[arg(value_parser = parse_pin)]
        pin: PinId,
        count: u16,
        #[arg(value_parser = parse_hex_color)]
        color: u32,
        #[arg(long)]
        brightness: Option<u8>,
    },
}

/// Accepts `13`, `D13` or `A0`.
fn parse_pin(s: &str) -> Result<PinId, String> {
    let s = s.trim();
    let (base, digits) = match s.chars().next() {
        Some('A' | 'a') => (pins::A0, &s[1..]),
        Some('D' | 'd') => (pins::D0, &s[1..]),
        _ => (0, s),
    };
    let n: PinId = digits.parse().map_err(|_| format!("invalid pin '{s}'"))?;
    base.checked_add(n).ok_or_else(|| format!("pin '{s}' out of range"))
}

/// Parses `RRGGBB` or `WWRRGGBB`, with or without a leading `#`.
fn parse_hex_color(s: &str) -> Result<u32, String> {
    let hex = s.trim().trim_start_matches('#');
    if !matches!(hex.len(), 6 | 8) {
        return Err(format!("colour '{s}' must be RRGGBB or WWRRGGBB"));
    }
    u32::from_str_radix(hex, 16).map_err(|_| format!("invalid colour '{s}'"))
}

impl Cli {
    /// Resolves the session config and device address from the CLI and the
    /// optional config file.
    fn resolve(&self) -> anyhow::Result<(SessionConfig, String)> {
        let file = match &self.config {
            Some(path) => ConfigFile::load(path)
                .with_context(|| format!("failed to load config '{}'", path.display()))?,
            None => ConfigFile::default(),
        };

        let address = self
            .device
            .clone()
            .or_else(|| file.device.address.clone())
            .context("no device address: pass --device or set [device] address in the config")?;

        Ok((file.into_session_config(), address))
    }
}

// ── Session helpers ───────────────────────────────────────────────────────────

async fn wait_connected(session: &Session, timeout: Duration) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let status = session.status();
        if status.connected {
            return Ok(());
        }
        if status.state == ConnectionState::GaveUp {
            bail!("gave up connecting after {} attempts", status.attempts);
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("device did not connect within {}s", timeout.as_secs());
        }
        tokio::time::sleep(POLL).await;
    }
}

/// Waits for queued envelopes to go out, then closes the link.
async fn finish(session: &Session) {
    while session.pending_len() > 0 && session.status().connected {
        tokio::time::sleep(POLL).await;
    }
    session.disconnect();
    tokio::time::sleep(LINGER).await;
}

async fn watch(session: &Session, pin: PinId, analog: bool, interval: Duration, running: Arc<AtomicBool>) {
    let mode = if analog {
        PinMode::AnalogInput
    } else {
        PinMode::Input
    };
    session.configure_pin(pin, mode, Some(interval));

    let mut last = None;
    while running.load(Ordering::Relaxed) {
        let value = if analog {
            session.analog_read_every(pin, interval)
        } else {
            session.digital_read_every(pin, interval)
        };
        if last != Some(value) {
            println!("{}", serde_json::json!({ "pin": pin, "value": value }));
            last = Some(value);
        }
        tokio::time::sleep(interval / 2).await;
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let (config, address) = cli.resolve()?;

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    let session = Session::new(config);
    info!(session = %session.id(), "connecting to {address}");
    session.connect(&address);
    wait_connected(&session, Duration::from_secs(cli.timeout)).await?;

    match cli.command {
        Command::Digital { pin, level } => {
            session.configure_pin(pin, PinMode::Output, None);
            session.digital_write(pin, i32::from(level != 0));
        }
        Command::Analog { pin, value } => {
            session.configure_pin(pin, PinMode::AnalogOutput, None);
            session.analog_write(pin, value);
        }
        Command::Watch {
            pin,
            analog,
            interval_ms,
        } => {
            watch(&session, pin, analog, Duration::from_millis(interval_ms), running).await;
        }
        Command::Pixels {
            pin,
            count,
            color,
            brightness,
        } => {
            let strip = session.attach("strip", NeoPixel::new())?;
            let mut strip = strip.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            strip.init(pin, count);
            if let Some(b) = brightness {
                strip.set_brightness(b);
            }
            strip.fill(PixelColor::Packed(color), 0, 0);
            strip.show();
        }
    }

    if session.pending_len() > 0 {
        warn!("{} envelope(s) still queued at exit", session.pending_len());
    }
    finish(&session).await;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pin_plain_number() {
        assert_eq!(parse_pin("13"), Ok(13));
    }

    #[test]
    fn test_parse_pin_analog_prefix_offsets_from_a0() {
        assert_eq!(parse_pin("A0"), Ok(14));
        assert_eq!(parse_pin("a5"), Ok(19));
    }

    #[test]
    fn test_parse_pin_digital_prefix() {
        assert_eq!(parse_pin("D6"), Ok(6));
    }

    #[test]
    fn test_parse_pin_rejects_garbage() {
        assert!(parse_pin("X1").is_err());
        assert!(parse_pin("A").is_err());
    }

    #[test]
    fn test_parse_hex_color_with_hash() {
        assert_eq!(parse_hex_color("#ff8000"), Ok(0x00FF_8000));
        assert_eq!(parse_hex_color("10ffffff"), Ok(0x10FF_FFFF));
    }

    #[test]
    fn test_parse_hex_color_rejects_wrong_length() {
        assert!(parse_hex_color("fff").is_err());
    }

    #[test]
    fn test_cli_digital_subcommand() {
        // Arrange
        let cli = Cli::parse_from(["pinlink", "--device", "ws://dev:81", "digital", "D13", "1"]);

        // Assert
        assert_eq!(cli.device.as_deref(), Some("ws://dev:81"));
        assert!(matches!(cli.command, Command::Digital { pin: 13, level: 1 }));
    }

    #[test]
    fn test_cli_watch_defaults() {
        let cli = Cli::parse_from(["pinlink", "watch", "A0"]);
        match cli.command {
            Command::Watch {
                pin,
                analog,
                interval_ms,
            } => {
                assert_eq!(pin, 14);
                assert!(!analog);
                assert_eq!(interval_ms, 200);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_default_timeout() {
        let cli = Cli::parse_from(["pinlink", "analog", "6", "128"]);
        assert_eq!(cli.timeout, 10);
    }

    #[test]
    fn test_resolve_prefers_device_flag() {
        let cli = Cli::parse_from(["pinlink", "--device", "ws://a:81", "digital", "2", "0"]);
        let (config, address) = cli.resolve().unwrap();
        assert_eq!(address, "ws://a:81");
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_resolve_without_address_is_error() {
        let cli = Cli {
            device: None,
            config: None,
            timeout: 10,
            command: Command::Digital { pin: 2, level: 0 },
        };
        assert!(cli.resolve().is_err());
    }

    #[test]
    fn test_resolve_reads_address_from_config_file() {
        let path = std::env::temp_dir().join(format!("pinlink-cli-{}.toml", std::process::id()));
        std::fs::write(&path, "[device]\naddress = \"ws://from-file:81\"\n").unwrap();

        let cli = Cli {
            device: None,
            config: Some(path.clone()),
            timeout: 10,
            command: Command::Digital { pin: 2, level: 0 },
        };
        let (_, address) = cli.resolve().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(address, "ws://from-file:81");
    }
}
