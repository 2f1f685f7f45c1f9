//! OPC client session: one transport plus the devices it drives.

use std::io;
use thiserror::Error;

use crate::animation::Animation;
use crate::config;
use crate::device::{Color, ColorCorrection, Device};
use crate::opc;

mod connection;
#[cfg(test)]
pub(crate) mod testing;

pub use connection::{Connector, TcpConnection, TcpConnector, Transport};

/// Result type for anything that touches the connection.
pub type OpcResult<T> = Result<T, OpcError>;

#[derive(Debug, Error)]
pub enum OpcError {
    /// The socket could not be established.
    #[error("unable to connect to {addr}: {source}")]
    Connection { addr: String, source: io::Error },
    /// Write failure in the middle of a session.
    #[error("send failed: {0}")]
    Send(#[source] io::Error),
    /// The transport was already closed.
    #[error("connection is closed")]
    Closed,
    #[error("pixel count {0} is outside 1..=512")]
    PixelCount(usize),
    #[error("unable to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Integer status for a result: `0` on success, `-1` on any failure.
pub fn status_code<T>(result: &OpcResult<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(_) => -1,
    }
}

/// Owns one connection and every device registered on it.
pub struct OpcClient {
    transport: Box<dyn Transport>,
    devices: Vec<Device>,
}

impl OpcClient {
    pub fn new(transport: Box<dyn Transport>) -> OpcClient {
        OpcClient {
            transport,
            devices: vec![],
        }
    }

    /// Open a TCP connection to the configured server.
    pub fn connect(server: &config::Server) -> OpcResult<OpcClient> {
        Ok(OpcClient::new(Box::new(TcpConnection::open(server)?)))
    }

    /// Register a new device on channel 0.
    pub fn add_device(&mut self) -> &mut Device {
        self.devices.push(Device::new(0));
        let last = self.devices.len() - 1;
        &mut self.devices[last]
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut [Device] {
        &mut self.devices
    }

    /// Set every pixel of every strip to one color. No I/O.
    pub fn fill(&mut self, color: Color) {
        for device in &mut self.devices {
            for strip in device.strips_mut() {
                strip.fill(color);
            }
        }
    }

    pub fn clear(&mut self) {
        self.fill(Color::BLACK);
    }

    /// Send one pixel frame per strip of every device.
    pub fn show(&mut self) -> OpcResult<()> {
        for device in &self.devices {
            for strip in device.strips() {
                let frame = opc::encode_set_pixels(strip.channel(), strip.pixels())?;
                self.transport.send(&frame)?;
            }
        }
        Ok(())
    }

    /// Draw the next animation step into every strip, then show it.
    pub fn animate(&mut self, animation: &mut dyn Animation) -> OpcResult<()> {
        for device in &mut self.devices {
            for strip in device.strips_mut() {
                animation.draw(strip);
            }
        }
        animation.step();
        self.show()
    }

    /// Apply and send the same correction to every device.
    pub fn set_color_correction(&mut self, correction: ColorCorrection) -> OpcResult<()> {
        for device in &mut self.devices {
            device.set_color_correction(self.transport.as_mut(), correction)?;
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    pub fn close(&mut self) {
        self.transport.close();
    }

    /// Close after the server confirms it took everything sent.
    pub fn finish(&mut self) -> OpcResult<()> {
        self.transport.finish()
    }
}

impl Drop for OpcClient {
    fn drop(&mut self) {
        self.transport.close();
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Wire;
    use super::*;
    use crate::opc::parser::Command;

    #[test]
    fn show_sends_one_frame_per_strip() {
        let wire = Wire::default();
        let mut client = OpcClient::new(wire.transport());
        let device = client.add_device();
        device.add_pixel_strip(0, 3).unwrap();
        device.add_pixel_strip(1, 2).unwrap();
        client.fill(Color::new(0, 255, 0));

        client.show().unwrap();

        let messages = wire.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].channel, 0);
        assert_eq!(messages[0].command, Command::SetPixels(vec![Color::new(0, 255, 0); 3]));
        assert_eq!(messages[1].channel, 1);
        assert_eq!(messages[1].command, Command::SetPixels(vec![Color::new(0, 255, 0); 2]));
    }

    #[test]
    fn mutations_do_not_touch_the_wire() {
        let wire = Wire::default();
        let mut client = OpcClient::new(wire.transport());
        client.add_device().add_pixel_strip(0, 8).unwrap();
        client.fill(Color::new(1, 1, 1));
        client.clear();
        assert!(wire.frames().is_empty());
    }

    #[test]
    fn failed_send_closes_and_stays_failed() {
        let wire = Wire::default();
        wire.fail_at(1);
        let mut client = OpcClient::new(wire.transport());
        client.add_device().add_pixel_strip(0, 4).unwrap();

        client.show().unwrap();
        assert!(matches!(client.show(), Err(OpcError::Send(_))));
        assert!(!client.is_open());
        assert!(matches!(client.show(), Err(OpcError::Closed)));
        assert_eq!(wire.frames().len(), 1);
    }

    #[test]
    fn correction_is_stored_and_sent() {
        let wire = Wire::default();
        let mut client = OpcClient::new(wire.transport());
        client.add_device().add_pixel_strip(0, 4).unwrap();

        let correction = ColorCorrection::uniform(opc::DEFAULT_GAMMA, 0.5);
        client.set_color_correction(correction).unwrap();

        assert_eq!(client.devices()[0].color_correction(), correction);
        assert_eq!(wire.messages()[0].command, Command::ColorCorrection(correction));
    }

    #[test]
    fn status_codes() {
        assert_eq!(status_code(&Ok::<(), OpcError>(())), 0);
        assert_eq!(status_code::<()>(&Err(OpcError::Closed)), -1);
    }
}
