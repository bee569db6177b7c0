//! All pinlink wire message types.
//!
//! One transmission is one [`Envelope`]: a small header plus an ordered list of
//! [`Update`]s.  Every update is self-contained, so the order inside an
//! envelope carries no meaning beyond "last update for a pin wins".
//!
//! ```json
//! { "header": { "version": 1 },
//!   "data": [ { "id": 13, "action": 2, "params": [1] } ] }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::event::PinId;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Protocol version written into every envelope header.
pub const PROTOCOL_VERSION: u32 = 1;

/// Highest id that maps directly onto a physical pin.
pub const PHYSICAL_PIN_MAX: PinId = 99;

/// First id of the band reserved for future core use.
pub const RESERVED_ID_START: PinId = 100;

/// Last id of the band reserved for future core use.
pub const RESERVED_ID_END: PinId = 199;

/// First id available to extension devices (NeoPixel strips use 200).
pub const EXTENSION_ID_START: PinId = 200;

/// Which part of the id space an update addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdBand {
    /// `0..=PHYSICAL_PIN_MAX`
    Physical,
    /// `RESERVED_ID_START..=RESERVED_ID_END`; nothing answers here yet.
    Reserved,
    /// `EXTENSION_ID_START..`
    Extension,
}

impl IdBand {
    pub fn of(id: PinId) -> Self {
        match id {
            0..=PHYSICAL_PIN_MAX => IdBand::Physical,
            RESERVED_ID_START..=RESERVED_ID_END => IdBand::Reserved,
            _ => IdBand::Extension,
        }
    }
}

/// Digital low level.
pub const LOW: i32 = 0;

/// Digital high level.
pub const HIGH: i32 = 1;

// ── Actions ───────────────────────────────────────────────────────────────────

/// The action carried by an [`Update`].
///
/// The six core actions have fixed codes.  Every other code belongs to an
/// extension and is carried through untouched as [`Action::Extension`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Action {
    /// Configure a pin; `params = [mode]`.
    PinMode,
    /// Drive a digital output; `params = [level]`.
    DigitalWrite,
    /// Register (host → device) or report (device → host) a digital input.
    DigitalRead,
    /// Drive a PWM/DAC output; `params = [value]`.
    AnalogWrite,
    /// Register (host → device) or report (device → host) an analog input.
    AnalogRead,
    /// Stop a registered action on the device.
    Stop,
    /// Extension-defined action code.
    Extension(u8),
}

impl Action {
    /// Returns the numeric wire code for this action.
    pub fn code(self) -> u8 {
        match self {
            Action::PinMode => 1,
            Action::DigitalWrite => 2,
            Action::DigitalRead => 3,
            Action::AnalogWrite => 4,
            Action::AnalogRead => 5,
            Action::Stop => 6,
            Action::Extension(code) => code,
        }
    }

    /// Returns `true` for the six actions defined by the core protocol.
    pub fn is_core(self) -> bool {
        !matches!(self, Action::Extension(_))
    }
}

impl From<u8> for Action {
    fn from(code: u8) -> Self {
        match code {
            1 => Action::PinMode,
            2 => Action::DigitalWrite,
            3 => Action::DigitalRead,
            4 => Action::AnalogWrite,
            5 => Action::AnalogRead,
            6 => Action::Stop,
            other => Action::Extension(other),
        }
    }
}

impl From<Action> for u8 {
    fn from(action: Action) -> Self {
        action.code()
    }
}

// ── Pin modes ─────────────────────────────────────────────────────────────────

/// Pin mode codes accepted by [`Action::PinMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PinMode {
    Input = 0,
    Output = 1,
    InputPullup = 2,
    InputPulldown = 3,
    OutputOpenDrain = 4,
    AnalogInput = 8,
    AnalogOutput = 10,
}

impl PinMode {
    /// Returns `true` for modes whose pin is read by the host.
    pub fn is_input(self) -> bool {
        matches!(
            self,
            PinMode::Input | PinMode::InputPullup | PinMode::InputPulldown | PinMode::AnalogInput
        )
    }
}

impl TryFrom<u8> for PinMode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PinMode::Input),
            1 => Ok(PinMode::Output),
            2 => Ok(PinMode::InputPullup),
            3 => Ok(PinMode::InputPulldown),
            4 => Ok(PinMode::OutputOpenDrain),
            8 => Ok(PinMode::AnalogInput),
            10 => Ok(PinMode::AnalogOutput),
            _ => Err(()),
        }
    }
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// Envelope header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub version: u32,
}

/// One transmitted protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub header: Header,
    /// Updates in submission order.
    #[serde(default)]
    pub data: Vec<Update>,
}

impl Envelope {
    /// Wraps `data` in an envelope tagged with `version`.
    pub fn new(version: u32, data: Vec<Update>) -> Self {
        Self {
            header: Header { version },
            data,
        }
    }

    /// Wraps a single update.
    pub fn single(version: u32, update: Update) -> Self {
        Self::new(version, vec![update])
    }
}

/// A single pin or device update, outbound or inbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    /// Pin number (0–99) or extension device id (200+).
    pub id: PinId,
    pub action: Action,
    /// Action-specific integer parameters.
    #[serde(default)]
    pub params: Vec<i32>,
}

impl Update {
    pub fn new(id: PinId, action: Action, params: Vec<i32>) -> Self {
        Self { id, action, params }
    }

    /// Pin configuration request.  Reporting for input pins is requested
    /// separately by the first read.
    pub fn pin_mode(pin: PinId, mode: PinMode) -> Self {
        Self::new(pin, Action::PinMode, vec![mode as i32])
    }

    pub fn digital_write(pin: PinId, level: i32) -> Self {
        Self::new(pin, Action::DigitalWrite, vec![level])
    }

    pub fn analog_write(pin: PinId, value: i32) -> Self {
        Self::new(pin, Action::AnalogWrite, vec![value])
    }

    /// Asks the device to report `pin` every `interval`.
    pub fn digital_read(pin: PinId, interval: Duration) -> Self {
        Self::new(pin, Action::DigitalRead, vec![duration_to_ms(interval)])
    }

    /// Asks the device to report `pin` every `interval`.
    pub fn analog_read(pin: PinId, interval: Duration) -> Self {
        Self::new(pin, Action::AnalogRead, vec![duration_to_ms(interval)])
    }

    pub fn stop(pin: PinId) -> Self {
        Self::new(pin, Action::Stop, Vec::new())
    }

    /// The value carried by an inbound state report (first parameter).
    pub fn value(&self) -> Option<i32> {
        self.params.first().copied()
    }
}

/// Converts a duration to whole milliseconds, saturating at `i32::MAX`.
fn duration_to_ms(interval: Duration) -> i32 {
    i32::try_from(interval.as_millis()).unwrap_or(i32::MAX)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
