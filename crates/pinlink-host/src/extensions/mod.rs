//! Bundled extension devices.

pub mod neopixel;

pub use neopixel::{color, wheel, NeoPixel, PixelColor, Rgbw, NEOPIXEL_DEVICE_ID};
