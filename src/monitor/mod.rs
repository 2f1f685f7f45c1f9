//! A TCP sink that decodes incoming OPC messages and passes them on.
//!
//! Nothing is rendered; this is for watching what a client sends.

use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, info, warn};
use std::io::{self, BufReader};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

use crate::opc::parser::{Message, MessageParser};

/// Messages produced by the monitor.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorMessage {
    Connected { peer: SocketAddr },
    Opc { peer: SocketAddr, message: Message },
    Closed { peer: SocketAddr },
}

/// A running monitor.
pub struct Monitor {
    local_addr: SocketAddr,
    receiver: Receiver<MonitorMessage>,
    _accept_handle: JoinHandle<()>,
}

impl Monitor {
    /// Bind and start accepting connections.
    pub fn bind(addr: &str) -> io::Result<Monitor> {
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        info!("[monitor] Listening on {}", local_addr);

        let (sender, receiver) = channel::unbounded::<MonitorMessage>();
        let accept_handle = thread::spawn(move || accept_loop(listener, sender));

        Ok(Monitor {
            local_addr,
            receiver,
            _accept_handle: accept_handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn receiver(&self) -> &Receiver<MonitorMessage> {
        &self.receiver
    }
}

fn accept_loop(listener: TcpListener, sender: Sender<MonitorMessage>) {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let sender = sender.clone();
                thread::spawn(move || read_connection(stream, sender));
            }
            Err(err) => warn!("[monitor] Accept failed: {}", err),
        }
    }
}

fn read_connection(stream: TcpStream, sender: Sender<MonitorMessage>) {
    let peer = match stream.peer_addr() {
        Ok(peer) => peer,
        Err(err) => {
            warn!("[monitor] Connection without a peer address: {}", err);
            return;
        }
    };
    debug!("[monitor] {} connected", peer);
    if sender.send(MonitorMessage::Connected { peer }).is_err() {
        return;
    }

    let mut reader = BufReader::new(stream);
    let mut parser = MessageParser::new();
    loop {
        match parser.read_message(&mut reader) {
            Ok(Some(message)) => {
                if sender.send(MonitorMessage::Opc { peer, message }).is_err() {
                    // nobody is listening anymore
                    return;
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!("[monitor] {} sent a bad message: {}", peer, err);
                break;
            }
        }
    }

    debug!("[monitor] {} closed", peer);
    sender.send(MonitorMessage::Closed { peer }).ok();
}
