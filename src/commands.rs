//! One-shot requests, each on its own short-lived connection.
//!
//! A request only succeeds once the server has closed its side after
//! reading everything, so a server that hangs up early is reported.

use log::debug;

use crate::client::{OpcClient, OpcResult};
use crate::config;
use crate::device::{Color, ColorCorrection};

fn single_strip(server: &config::Server, strip_count: usize) -> OpcResult<OpcClient> {
    let mut client = OpcClient::connect(server)?;
    client.add_device().add_pixel_strip(0, strip_count)?;
    Ok(client)
}

/// Set `strip_count` pixels to one color with a single frame.
pub fn set_full_color(server: &config::Server, strip_count: usize, color: Color) -> OpcResult<()> {
    let mut client = single_strip(server, strip_count)?;
    client.fill(color);
    client.show()?;
    client.finish()?;
    debug!("[client] Full color {:06x} on {} leds", color.to_rgb24(), strip_count);
    Ok(())
}

/// Send one color correction message.
pub fn set_brightness(server: &config::Server, correction: ColorCorrection) -> OpcResult<()> {
    let mut client = OpcClient::connect(server)?;
    client.add_device();
    client.set_color_correction(correction)?;
    client.finish()
}

/// Turn `strip_count` pixels off.
pub fn clear(server: &config::Server, strip_count: usize) -> OpcResult<()> {
    let mut client = single_strip(server, strip_count)?;
    client.show()?;
    client.finish()
}
