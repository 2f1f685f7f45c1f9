//! In-memory transports for unit tests.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{Connector, OpcError, OpcResult, Transport};
use crate::config;
use crate::opc::parser::{Command, Message, MessageParser};

/// Shared record of everything written, with an optional failure point.
#[derive(Clone, Default)]
pub(crate) struct Wire {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
    /// Send number (0-based) that fails with a broken pipe.
    fail_at: Arc<Mutex<Option<usize>>>,
}

impl Wire {
    pub(crate) fn transport(&self) -> Box<dyn Transport> {
        Box::new(RecordingTransport {
            wire: self.clone(),
            open: true,
        })
    }

    pub(crate) fn fail_at(&self, send: usize) {
        *self.fail_at.lock().unwrap() = Some(send);
    }

    pub(crate) fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().unwrap().clone()
    }

    pub(crate) fn messages(&self) -> Vec<Message> {
        let bytes: Vec<u8> = self.frames().concat();
        MessageParser::new().read_all(&mut bytes.as_slice()).unwrap()
    }

    pub(crate) fn pixel_frames(&self) -> usize {
        self.messages()
            .iter()
            .filter(|m| matches!(m.command, Command::SetPixels(_)))
            .count()
    }
}

struct RecordingTransport {
    wire: Wire,
    open: bool,
}

impl Transport for RecordingTransport {
    fn send(&mut self, buf: &[u8]) -> OpcResult<()> {
        if !self.open {
            return Err(OpcError::Closed);
        }
        let mut frames = self.wire.frames.lock().unwrap();
        if *self.wire.fail_at.lock().unwrap() == Some(frames.len()) {
            self.open = false;
            return Err(OpcError::Send(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        frames.push(buf.to_vec());
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Connector handing out transports on one shared wire.
#[derive(Default)]
pub(crate) struct WireConnector {
    pub(crate) wire: Wire,
    pub(crate) connects: AtomicUsize,
    pub(crate) refuse: AtomicBool,
}

impl Connector for WireConnector {
    fn connect(&self, server: &config::Server) -> OpcResult<Box<dyn Transport>> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(OpcError::Connection {
                addr: server.addr(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            });
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.wire.transport())
    }
}
