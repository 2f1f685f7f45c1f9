//! A moving spark with a solid trail.

use log::info;
use std::time::Duration;

use super::{pause, Animation, LiveParams};
use crate::client::{OpcClient, OpcResult};
use crate::device::{Color, ColorCorrection, PixelStrip};

/// Trail colors: `span` pixels of `color`, then one black pixel that erases
/// the end of the trail as the spark moves on.
pub fn build_colors(color: Color, span: usize) -> Vec<Color> {
    let mut colors = vec![color; span + 1];
    colors[span] = Color::BLACK;
    colors
}

/// Frame delay for a speed setting (1 = slowest, 100 = fastest).
pub fn convert_speed(speed: u32) -> Duration {
    let speed = speed.clamp(1, 100);
    if speed == 100 {
        Duration::from_millis(5)
    } else {
        Duration::from_millis(u64::from(100 - speed))
    }
}

/// Trail length in pixels for a span given in percent of the strip.
pub fn trail_length(led_count: usize, span_percent: u32) -> usize {
    led_count * span_percent.min(100) as usize / 100
}

/// Spark animation state: the trail and the position of its head.
pub struct Spark {
    colors: Vec<Color>,
    current: usize,
}

impl Spark {
    pub fn new(colors: Vec<Color>) -> Spark {
        Spark { colors, current: 0 }
    }

    /// Swap the trail without moving the head.
    pub fn set_colors(&mut self, colors: Vec<Color>) {
        self.colors = colors;
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }
}

impl Animation for Spark {
    fn draw(&mut self, strip: &mut PixelStrip) {
        let count = strip.pixel_count();
        let head = self.current % count;
        for (i, color) in self.colors.iter().enumerate() {
            // i steps behind the head
            strip.set_pixel_color_wrapping(head + count - i % count, *color);
        }
    }

    fn step(&mut self) {
        self.current = self.current.wrapping_add(1);
    }
}

fn longest_strip(client: &OpcClient) -> usize {
    client
        .devices()
        .iter()
        .flat_map(|device| device.strips())
        .map(|strip| strip.pixel_count())
        .max()
        .unwrap_or(0)
}

fn trail(client: &OpcClient, params: &dyn LiveParams) -> Vec<Color> {
    build_colors(params.color(), trail_length(longest_strip(client), params.spark_span()))
}

/// Run the spark until the running flag clears or a send fails.
pub fn run(client: &mut OpcClient, params: &dyn LiveParams) -> OpcResult<()> {
    let mut spark = Spark::new(trail(client, params));
    params.take_span_update();
    params.take_color_update();

    info!(
        "[spark] Running, trail of {} on {} leds",
        spark.colors().len() - 1,
        longest_strip(client)
    );

    while params.is_animating() {
        client.animate(&mut spark)?;

        if params.take_brightness_update() {
            let correction = ColorCorrection::from_brightness(params.gamma(), params.brightness());
            client.set_color_correction(correction)?;
        }

        let span_changed = params.take_span_update();
        let color_changed = params.take_color_update();
        if span_changed || color_changed {
            client.clear();
            spark.set_colors(trail(client, params));
        }

        pause(convert_speed(params.speed()));
    }

    info!("[spark] Stopped");
    Ok(())
}
