//! NeoPixel (WS2812/SK6812) strip extension.
//!
//! Mirrors the Adafruit NeoPixel library API.  All commands address device
//! id 200 with these actions:
//!
//! | Action       | Code | Params                              |
//! |--------------|------|-------------------------------------|
//! | `INIT`       | 10   | `[pin, count, pixel_type]`          |
//! | `SET_PIXEL`  | 11   | `[index, r, g, b]` or `[index, r, g, b, w]` |
//! | `FILL`       | 12   | `[packed_color, first, count]`      |
//! | `CLEAR`      | 13   | `[]`                                |
//! | `BRIGHTNESS` | 14   | `[value]`                           |
//! | `SHOW`       | 15   | `[]`                                |
//!
//! Like pin writes, pixel writes are deduplicated: a pixel is only re-sent
//! when its colour moves more than the threshold (Euclidean distance over
//! r, g, b, w), and brightness only when it moves by at least the threshold.

use std::collections::HashMap;

use pinlink_core::{Action, PinId, Update};
use tracing::debug;

use crate::application::extension::{Extension, SessionLink};

/// Device id of the NeoPixel extension.
pub const NEOPIXEL_DEVICE_ID: PinId = 200;

pub const NEO_INIT: u8 = 10;
pub const NEO_SET_PIXEL: u8 = 11;
pub const NEO_FILL: u8 = 12;
pub const NEO_CLEAR: u8 = 13;
pub const NEO_BRIGHTNESS: u8 = 14;
pub const NEO_SHOW: u8 = 15;

// Pixel colour order, as in Adafruit_NeoPixel.h.
pub const NEO_RGB: u16 = 0x06;
pub const NEO_RBG: u16 = 0x09;
pub const NEO_GRB: u16 = 0x52;
pub const NEO_GBR: u16 = 0xA1;
pub const NEO_BRG: u16 = 0x58;
pub const NEO_BGR: u16 = 0xA4;

// Data rate.
pub const NEO_KHZ800: u16 = 0x0000;
pub const NEO_KHZ400: u16 = 0x0100;

/// Most common strips: GRB order at 800 kHz.
pub const DEFAULT_PIXEL_TYPE: u16 = NEO_GRB + NEO_KHZ800;

pub const DEFAULT_COLOR_THRESHOLD: u32 = 5;

const FULL_BRIGHTNESS: u8 = 255;

/// One pixel's colour channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgbw {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub w: u8,
}

impl Rgbw {
    pub const BLACK: Rgbw = Rgbw { r: 0, g: 0, b: 0, w: 0 };

    /// `0xWWRRGGBB`, as `strip.Color()` packs it.
    pub fn pack(self) -> u32 {
        (u32::from(self.w) << 24) | (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
    }

    pub fn unpack(color: u32) -> Self {
        Self {
            w: (color >> 24) as u8,
            r: (color >> 16) as u8,
            g: (color >> 8) as u8,
            b: color as u8,
        }
    }

    fn distance(self, other: Rgbw) -> f64 {
        let d = |a: u8, b: u8| {
            let diff = f64::from(a) - f64::from(b);
            diff * diff
        };
        (d(self.r, other.r) + d(self.g, other.g) + d(self.b, other.b) + d(self.w, other.w)).sqrt()
    }
}

/// A colour given either packed or by channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelColor {
    Packed(u32),
    Components { r: u8, g: u8, b: u8, w: Option<u8> },
}

impl PixelColor {
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        PixelColor::Components { r, g, b, w: None }
    }

    pub fn rgbw(r: u8, g: u8, b: u8, w: u8) -> Self {
        PixelColor::Components { r, g, b, w: Some(w) }
    }

    pub fn resolve(self) -> Rgbw {
        match self {
            PixelColor::Packed(color) => Rgbw::unpack(color),
            PixelColor::Components { r, g, b, w } => Rgbw {
                r,
                g,
                b,
                w: w.unwrap_or(0),
            },
        }
    }
}

impl From<u32> for PixelColor {
    fn from(color: u32) -> Self {
        PixelColor::Packed(color)
    }
}

impl From<(u8, u8, u8)> for PixelColor {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        PixelColor::rgb(r, g, b)
    }
}

impl From<Rgbw> for PixelColor {
    fn from(c: Rgbw) -> Self {
        PixelColor::rgbw(c.r, c.g, c.b, c.w)
    }
}

/// Packs channels into `0xWWRRGGBB`.
pub fn color(r: u8, g: u8, b: u8, w: u8) -> u32 {
    Rgbw { r, g, b, w }.pack()
}

/// Colour wheel: 0–255 walks red → green → blue → red.
pub fn wheel(pos: u8) -> u32 {
    match pos {
        0..=84 => color(pos * 3, 255 - pos * 3, 0, 0),
        85..=169 => {
            let p = pos - 85;
            color(255 - p * 3, 0, p * 3, 0)
        }
        _ => {
            let p = pos - 170;
            color(0, p * 3, 255 - p * 3, 0)
        }
    }
}

/// Host-side model of a NeoPixel strip.
pub struct NeoPixel {
    link: SessionLink,
    pixels: HashMap<u16, Rgbw>,
    num_pixels: u16,
    brightness: u8,
    threshold: u32,
}

impl Default for NeoPixel {
    fn default() -> Self {
        Self::new()
    }
}

impl NeoPixel {
    pub fn new() -> Self {
        Self {
            link: SessionLink::detached(),
            pixels: HashMap::new(),
            num_pixels: 0,
            brightness: FULL_BRIGHTNESS,
            threshold: DEFAULT_COLOR_THRESHOLD,
        }
    }

    fn send(&self, action: u8, params: Vec<i32>) {
        self.link
            .send(vec![Update::new(NEOPIXEL_DEVICE_ID, Action::Extension(action), params)]);
    }

    /// Declares a strip of `count` pixels on `pin` with [`DEFAULT_PIXEL_TYPE`].
    pub fn init(&mut self, pin: PinId, count: u16) {
        self.init_with_type(pin, count, DEFAULT_PIXEL_TYPE);
    }

    pub fn init_with_type(&mut self, pin: PinId, count: u16, pixel_type: u16) {
        self.num_pixels = count;
        self.pixels.clear();
        debug!("neopixel: init pin {pin}, {count} pixels, type {pixel_type:#06x}");
        self.send(NEO_INIT, vec![i32::from(pin), i32::from(count), i32::from(pixel_type)]);
    }

    /// Sets one pixel in the device buffer.  Returns `true` if the change was
    /// large enough to be sent.
    pub fn set_pixel_color(&mut self, index: u16, color: impl Into<PixelColor>) -> bool {
        let next = color.into().resolve();
        let last = self.pixels.get(&index).copied().unwrap_or(Rgbw::BLACK);
        if next.distance(last) <= f64::from(self.threshold) {
            return false;
        }

        let mut params = vec![
            i32::from(index),
            i32::from(next.r),
            i32::from(next.g),
            i32::from(next.b),
        ];
        if next.w > 0 {
            params.push(i32::from(next.w));
        }
        self.send(NEO_SET_PIXEL, params);
        self.pixels.insert(index, next);
        true
    }

    /// Fills `count` pixels from `first`; `count == 0` fills to the end.
    pub fn fill(&mut self, color: impl Into<PixelColor>, first: u16, count: u16) {
        let rgbw = color.into().resolve();
        // The firmware reads the packed colour back as unsigned 32-bit.
        let packed = rgbw.pack() as i32;
        self.send(NEO_FILL, vec![packed, i32::from(first), i32::from(count)]);

        let span = if count == 0 {
            self.num_pixels.saturating_sub(first)
        } else {
            count
        };
        let end = first.saturating_add(span).min(self.num_pixels);
        for i in first..end {
            self.pixels.insert(i, rgbw);
        }
    }

    /// Turns every pixel off in the device buffer.
    pub fn clear(&mut self) {
        self.send(NEO_CLEAR, Vec::new());
        self.pixels = (0..self.num_pixels).map(|i| (i, Rgbw::BLACK)).collect();
    }

    /// Returns `true` if the new brightness was sent.
    pub fn set_brightness(&mut self, value: u8) -> bool {
        if u32::from(value.abs_diff(self.brightness)) < self.threshold {
            return false;
        }
        self.send(NEO_BRIGHTNESS, vec![i32::from(value)]);
        self.brightness = value;
        true
    }

    /// Pushes the device buffer to the LEDs.
    pub fn show(&self) {
        self.send(NEO_SHOW, Vec::new());
    }

    /// Last colour set for `index`, packed; `0` outside the strip.
    pub fn pixel_color(&self, index: u16) -> u32 {
        if index >= self.num_pixels {
            return 0;
        }
        self.pixels.get(&index).copied().unwrap_or(Rgbw::BLACK).pack()
    }

    pub fn num_pixels(&self) -> u16 {
        self.num_pixels
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Change-detection sensitivity for pixels and brightness.
    pub fn set_threshold(&mut self, threshold: u32) {
        self.threshold = threshold;
    }
}

impl Extension for NeoPixel {
    fn device_id(&self) -> PinId {
        NEOPIXEL_DEVICE_ID
    }

    fn attached(&mut self, link: SessionLink) {
        self.link = link;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
