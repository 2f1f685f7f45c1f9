//! Open Pixel Control message encoding.
//!
//! Every message is `channel, command, length (u16, big endian), payload`.

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

use crate::client::{OpcError, OpcResult};
use crate::device::{Color, ColorCorrection};

pub mod parser;

/// Set pixel colors. Payload is R, G, B per pixel.
pub const CMD_SET_PIXEL_COLORS: u8 = 0x00;
/// System exclusive. Used here to carry a color correction JSON document.
pub const CMD_SYSTEM_EXCLUSIVE: u8 = 0xFF;

pub const HEADER_LEN: usize = 4;
pub const MAX_PIXELS: usize = 512;
pub const DEFAULT_GAMMA: f32 = 2.5;
pub const DEFAULT_PORT: u16 = 7890;

/// JSON body of a color correction message.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub(crate) struct CorrectionPayload {
    pub gamma: f32,
    pub whitepoint: [f32; 3],
}

impl From<&ColorCorrection> for CorrectionPayload {
    fn from(correction: &ColorCorrection) -> CorrectionPayload {
        CorrectionPayload {
            gamma: correction.gamma,
            whitepoint: [correction.red, correction.green, correction.blue],
        }
    }
}

fn frame(channel: u8, command: u8, payload_len: usize) -> Vec<u8> {
    let mut buf = vec![0; HEADER_LEN + payload_len];
    buf[0] = channel;
    buf[1] = command;
    BigEndian::write_u16(&mut buf[2..HEADER_LEN], payload_len as u16);
    buf
}

/// Build a "set pixel colors" message for one strip.
pub fn encode_set_pixels(channel: u8, pixels: &[Color]) -> OpcResult<Vec<u8>> {
    let count = pixels.len();
    if count == 0 || count > MAX_PIXELS {
        return Err(OpcError::PixelCount(count));
    }

    let mut buf = frame(channel, CMD_SET_PIXEL_COLORS, count * 3);
    for (chunk, pixel) in buf[HEADER_LEN..].chunks_exact_mut(3).zip(pixels) {
        chunk[0] = pixel.red;
        chunk[1] = pixel.green;
        chunk[2] = pixel.blue;
    }
    Ok(buf)
}

/// Build a color correction message.
pub fn encode_set_color_correction(channel: u8, correction: &ColorCorrection) -> OpcResult<Vec<u8>> {
    let json = serde_json::to_vec(&CorrectionPayload::from(correction))?;
    let mut buf = frame(channel, CMD_SYSTEM_EXCLUSIVE, json.len());
    buf[HEADER_LEN..].copy_from_slice(&json);
    Ok(buf)
}
