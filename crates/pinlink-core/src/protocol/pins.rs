//! Arduino UNO R4 pin numbering.
//!
//! Analog inputs follow the digital pins, so `A0` is pin 14.

use crate::domain::event::PinId;

pub const D0: PinId = 0;
pub const D1: PinId = 1;
pub const D2: PinId = 2;
pub const D3: PinId = 3;
pub const D4: PinId = 4;
pub const D5: PinId = 5;
pub const D6: PinId = 6;
pub const D7: PinId = 7;
pub const D8: PinId = 8;
pub const D9: PinId = 9;
pub const D10: PinId = 10;
pub const D11: PinId = 11;
pub const D12: PinId = 12;
pub const D13: PinId = 13;
pub const A0: PinId = 14;
pub const A1: PinId = 15;
pub const A2: PinId = 16;
pub const A3: PinId = 17;
pub const A4: PinId = 18;
pub const A5: PinId = 19;
