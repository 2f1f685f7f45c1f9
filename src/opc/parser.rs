//! Open Pixel Control message parser.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{self, Read};

use super::{CorrectionPayload, CMD_SET_PIXEL_COLORS, CMD_SYSTEM_EXCLUSIVE};
use crate::device::{Color, ColorCorrection};

/// A decoded OPC message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub channel: u8,
    pub command: Command,
}

/// Commands recognized by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Pixel colors in strip order.
    SetPixels(Vec<Color>),
    /// Color correction carried by a system exclusive message.
    ColorCorrection(ColorCorrection),
    /// Anything else, kept raw.
    Unknown { command: u8, data: Vec<u8> },
}

pub type ParserResult<T> = Result<T, ParserError>;

#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    #[error("stream ended in the middle of a message")]
    Truncated,
    #[error("pixel payload of {0} bytes is not a whole number of pixels")]
    PartialPixel(usize),
    #[error("invalid color correction payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("i/o error: {0}")]
    IoError(io::Error),
}

impl From<io::Error> for ParserError {
    fn from(err: io::Error) -> ParserError {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => ParserError::Truncated,
            _ => ParserError::IoError(err),
        }
    }
}

/// Reads OPC messages from a byte stream.
pub struct MessageParser {
    /// Payload buffer reused between messages.
    data: Vec<u8>,
}

impl Default for MessageParser {
    fn default() -> MessageParser {
        MessageParser::new()
    }
}

impl MessageParser {
    pub fn new() -> MessageParser {
        MessageParser { data: vec![] }
    }

    /// Read the next message. Returns Ok(None) on end-of-data between messages.
    pub fn read_message(&mut self, buf: &mut dyn Read) -> ParserResult<Option<Message>> {
        let channel = match buf.read_u8() {
            Ok(channel) => channel,
            Err(io_error) => match io_error.kind() {
                // Running out of data right before a header is ok.
                io::ErrorKind::UnexpectedEof => return Ok(None),
                _ => return Err(ParserError::IoError(io_error)),
            },
        };
        let command = buf.read_u8()?;
        let len = buf.read_u16::<BigEndian>()? as usize;

        self.data.resize(len, 0);
        buf.read_exact(&mut self.data)?;

        let command = match command {
            CMD_SET_PIXEL_COLORS => {
                if len % 3 != 0 {
                    return Err(ParserError::PartialPixel(len));
                }
                Command::SetPixels(
                    self.data
                        .chunks_exact(3)
                        .map(|rgb| Color::new(rgb[0], rgb[1], rgb[2]))
                        .collect(),
                )
            }
            CMD_SYSTEM_EXCLUSIVE => {
                let payload: CorrectionPayload = serde_json::from_slice(&self.data)?;
                Command::ColorCorrection(ColorCorrection {
                    gamma: payload.gamma,
                    red: payload.whitepoint[0],
                    green: payload.whitepoint[1],
                    blue: payload.whitepoint[2],
                })
            }
            other => Command::Unknown {
                command: other,
                data: self.data.clone(),
            },
        };

        Ok(Some(Message { channel, command }))
    }

    /// Read every message in the stream.
    pub fn read_all(&mut self, buf: &mut dyn Read) -> ParserResult<Vec<Message>> {
        let mut messages = vec![];
        while let Some(message) = self.read_message(buf)? {
            messages.push(message);
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc::{encode_set_color_correction, encode_set_pixels};

    #[test]
    fn decodes_pixels_in_order() {
        let pixels: Vec<Color> = (0..30u8).map(|i| Color::new(i, 255 - i, i / 2)).collect();
        let buf = encode_set_pixels(3, &pixels).unwrap();

        let mut parser = MessageParser::new();
        let message = parser.read_message(&mut buf.as_slice()).unwrap().unwrap();
        assert_eq!(message.channel, 3);
        assert_eq!(message.command, Command::SetPixels(pixels));
    }

    #[test]
    fn decodes_a_stream_of_mixed_messages() {
        let mut stream = encode_set_color_correction(0, &ColorCorrection::uniform(2.5, 0.25)).unwrap();
        stream.extend(encode_set_pixels(0, &[Color::new(255, 0, 0)]).unwrap());

        let messages = MessageParser::new().read_all(&mut stream.as_slice()).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0].command,
            Command::ColorCorrection(ColorCorrection::uniform(2.5, 0.25))
        );
        assert_eq!(messages[1].command, Command::SetPixels(vec![Color::new(255, 0, 0)]));
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let buf = encode_set_pixels(0, &[Color::new(1, 2, 3); 4]).unwrap();
        let result = MessageParser::new().read_message(&mut &buf[..buf.len() - 1]);
        assert!(matches!(result, Err(ParserError::Truncated)));
    }

    #[test]
    fn pixel_payload_must_be_whole_pixels() {
        let buf = [0u8, CMD_SET_PIXEL_COLORS, 0, 4, 1, 2, 3, 4];
        let result = MessageParser::new().read_message(&mut &buf[..]);
        assert!(matches!(result, Err(ParserError::PartialPixel(4))));
    }

    #[test]
    fn unknown_commands_are_kept_raw() {
        let buf = [1u8, 0x42, 0, 2, 9, 8];
        let message = MessageParser::new().read_message(&mut &buf[..]).unwrap().unwrap();
        assert_eq!(
            message.command,
            Command::Unknown {
                command: 0x42,
                data: vec![9, 8]
            }
        );
    }
}
