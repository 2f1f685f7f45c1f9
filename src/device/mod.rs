//! In-memory pixel buffers and per-device color correction.

use crate::client::{OpcError, OpcResult, Transport};
use crate::opc;

/// A single 24-bit RGB pixel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);

    pub const fn new(red: u8, green: u8, blue: u8) -> Color {
        Color { red, green, blue }
    }

    /// Unpack a `0xAARRGGBB` / `0xRRGGBB` value. The alpha byte is ignored.
    pub const fn from_rgb24(packed: u32) -> Color {
        Color {
            red: (packed >> 16) as u8,
            green: (packed >> 8) as u8,
            blue: packed as u8,
        }
    }

    pub const fn to_rgb24(self) -> u32 {
        ((self.red as u32) << 16) | ((self.green as u32) << 8) | self.blue as u32
    }
}

/// Global color correction applied by the server to a device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorCorrection {
    pub gamma: f32,
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl ColorCorrection {
    /// Same scale on all three channels, i.e. a plain brightness value.
    pub fn uniform(gamma: f32, scale: f32) -> ColorCorrection {
        ColorCorrection {
            gamma,
            red: scale,
            green: scale,
            blue: scale,
        }
    }

    /// Uniform correction for a brightness percentage (clamped to 100).
    pub fn from_brightness(gamma: f32, percent: u32) -> ColorCorrection {
        ColorCorrection::uniform(gamma, percent.min(100) as f32 / 100.0)
    }
}

impl Default for ColorCorrection {
    fn default() -> ColorCorrection {
        ColorCorrection::uniform(opc::DEFAULT_GAMMA, 1.0)
    }
}

/// An ordered run of pixels mapped to one output channel.
#[derive(Debug, Clone)]
pub struct PixelStrip {
    channel: u8,
    pixels: Vec<Color>,
}

impl PixelStrip {
    pub fn new(channel: u8, count: usize) -> OpcResult<PixelStrip> {
        if count == 0 || count > opc::MAX_PIXELS {
            return Err(OpcError::PixelCount(count));
        }
        Ok(PixelStrip {
            channel,
            pixels: vec![Color::BLACK; count],
        })
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    /// Set a single pixel. Out-of-range indexes are ignored.
    pub fn set_pixel_color(&mut self, index: usize, color: Color) {
        if let Some(pixel) = self.pixels.get_mut(index) {
            *pixel = color;
        }
    }

    /// Set a pixel with the index taken modulo the strip length.
    pub fn set_pixel_color_wrapping(&mut self, index: usize, color: Color) {
        let len = self.pixels.len();
        self.pixels[index % len] = color;
    }

    pub fn fill(&mut self, color: Color) {
        for pixel in self.pixels.iter_mut() {
            *pixel = color;
        }
    }

    pub fn clear(&mut self) {
        self.fill(Color::BLACK);
    }
}

/// A logical OPC device made of one or more strips.
#[derive(Debug, Clone)]
pub struct Device {
    /// Channel used for system exclusive messages addressed to this device.
    channel: u8,
    strips: Vec<PixelStrip>,
    correction: ColorCorrection,
}

impl Device {
    pub fn new(channel: u8) -> Device {
        Device {
            channel,
            strips: vec![],
            correction: ColorCorrection::default(),
        }
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn add_pixel_strip(&mut self, channel: u8, count: usize) -> OpcResult<&mut PixelStrip> {
        self.strips.push(PixelStrip::new(channel, count)?);
        let last = self.strips.len() - 1;
        Ok(&mut self.strips[last])
    }

    pub fn strips(&self) -> &[PixelStrip] {
        &self.strips
    }

    pub fn strips_mut(&mut self) -> &mut [PixelStrip] {
        &mut self.strips
    }

    pub fn color_correction(&self) -> ColorCorrection {
        self.correction
    }

    /// Store a new correction and send it to the server right away.
    pub fn set_color_correction(
        &mut self,
        transport: &mut dyn Transport,
        correction: ColorCorrection,
    ) -> OpcResult<()> {
        self.correction = correction;
        let frame = opc::encode_set_color_correction(self.channel, &correction)?;
        transport.send(&frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb24_ignores_alpha() {
        let color = Color::from_rgb24(0xAA12_3456);
        assert_eq!(color, Color::new(0x12, 0x34, 0x56));
        assert_eq!(color.to_rgb24(), 0x12_3456);
    }

    #[test]
    fn strip_rejects_bad_counts() {
        assert!(matches!(PixelStrip::new(0, 0), Err(OpcError::PixelCount(0))));
        assert!(matches!(PixelStrip::new(0, 513), Err(OpcError::PixelCount(513))));
        assert_eq!(PixelStrip::new(0, 512).unwrap().pixel_count(), 512);
    }

    #[test]
    fn wrapping_index_stays_on_strip() {
        let mut strip = PixelStrip::new(0, 10).unwrap();
        strip.set_pixel_color_wrapping(23, Color::new(1, 2, 3));
        assert_eq!(strip.pixels()[3], Color::new(1, 2, 3));

        strip.set_pixel_color(42, Color::new(9, 9, 9));
        assert!(strip.pixels().iter().all(|p| *p != Color::new(9, 9, 9)));

        strip.clear();
        assert!(strip.pixels().iter().all(|p| *p == Color::BLACK));
    }

    #[test]
    fn device_keeps_strips_in_order() {
        let mut device = Device::new(0);
        device.add_pixel_strip(0, 4).unwrap();
        device.add_pixel_strip(1, 8).unwrap().fill(Color::new(0, 0, 255));
        assert_eq!(device.strips().len(), 2);
        assert_eq!(device.strips()[1].channel(), 1);
        assert_eq!(device.strips()[1].pixels()[7], Color::new(0, 0, 255));
        assert!(device.add_pixel_strip(2, 0).is_err());
        assert_eq!(device.strips().len(), 2);
    }
}
