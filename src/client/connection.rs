//! TCP transport to the pixel server.

use log::{debug, warn};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::{OpcError, OpcResult};
use crate::config;

/// Something that frames can be written to.
pub trait Transport: Send {
    /// Write a whole message. A failed send leaves the transport closed.
    fn send(&mut self, buf: &[u8]) -> OpcResult<()>;
    /// Release the connection. Safe to call more than once.
    fn close(&mut self);
    fn is_open(&self) -> bool;
    /// Close once the peer has taken everything sent so far. An error means
    /// the last messages may not have arrived.
    fn finish(&mut self) -> OpcResult<()> {
        self.close();
        Ok(())
    }
}

/// Opens transports for a server configuration.
pub trait Connector: Send + Sync {
    fn connect(&self, server: &config::Server) -> OpcResult<Box<dyn Transport>>;
}

/// Connector for plain TCP connections.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect(&self, server: &config::Server) -> OpcResult<Box<dyn Transport>> {
        Ok(Box::new(TcpConnection::open(server)?))
    }
}

fn nonzero(duration: Duration) -> Option<Duration> {
    if duration.is_zero() {
        None
    } else {
        Some(duration)
    }
}

/// Wait after our FIN when no read timeout is configured.
const FINISH_TIMEOUT: Duration = Duration::from_secs(1);

/// Fails if the server has already closed its side.
fn check_peer(stream: &TcpStream) -> io::Result<()> {
    let mut byte = [0u8; 1];
    stream.set_nonblocking(true)?;
    let peeked = stream.peek(&mut byte);
    stream.set_nonblocking(false)?;
    match peeked {
        Ok(0) => Err(io::Error::new(
            io::ErrorKind::ConnectionAborted,
            "server closed the connection",
        )),
        Ok(_) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(()),
        Err(err) => Err(err),
    }
}

/// Half-close, then read until the server closes too. A reset on the way
/// means it dropped data we sent.
fn drain(stream: &mut TcpStream) -> io::Result<()> {
    stream.shutdown(Shutdown::Write)?;
    if stream.read_timeout()?.is_none() {
        stream.set_read_timeout(Some(FINISH_TIMEOUT))?;
    }

    let mut buf = [0u8; 256];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                debug!("[client] Server kept the connection open");
                break;
            }
            Err(err) => return Err(err),
        }
    }

    match stream.take_error()? {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// One TCP connection to an OPC server.
pub struct TcpConnection {
    /// Target address as configured, for logging.
    addr: String,
    /// None once closed.
    stream: Option<TcpStream>,
}

impl TcpConnection {
    /// Connect to the configured server, trying each resolved address in turn.
    pub fn open(server: &config::Server) -> OpcResult<TcpConnection> {
        let addr = server.addr();
        let targets = match addr.to_socket_addrs() {
            Ok(targets) => targets,
            Err(source) => return Err(OpcError::Connection { addr, source }),
        };

        let mut last_error = None;
        for target in targets {
            match Self::connect_one(target, server) {
                Ok(stream) => {
                    debug!("[client] Connected to {} ({})", addr, target);
                    return Ok(TcpConnection {
                        addr,
                        stream: Some(stream),
                    });
                }
                Err(err) => {
                    debug!("[client] Connecting to {} failed: {}", target, err);
                    last_error = Some(err);
                }
            }
        }

        let source = last_error
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "host did not resolve"));
        Err(OpcError::Connection { addr, source })
    }

    fn connect_one(target: SocketAddr, server: &config::Server) -> io::Result<TcpStream> {
        let socket = Socket::new(Domain::for_address(target), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(server.reuse_address)?;
        match nonzero(server.connect_timeout()) {
            Some(timeout) => socket.connect_timeout(&target.into(), timeout)?,
            None => socket.connect(&target.into())?,
        }

        let stream: TcpStream = socket.into();
        stream.set_read_timeout(nonzero(server.read_timeout()))?;
        stream.set_write_timeout(nonzero(server.read_timeout()))?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

impl Transport for TcpConnection {
    fn send(&mut self, buf: &[u8]) -> OpcResult<()> {
        let stream = self.stream.as_mut().ok_or(OpcError::Closed)?;
        let result = check_peer(stream).and_then(|()| stream.write_all(buf));
        if let Err(err) = result {
            warn!("[client] Write to {} failed: {}", self.addr, err);
            self.close();
            return Err(OpcError::Send(err));
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.shutdown(Shutdown::Both).ok();
            debug!("[client] Closed connection to {}", self.addr);
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn finish(&mut self) -> OpcResult<()> {
        let stream = self.stream.as_mut().ok_or(OpcError::Closed)?;
        let result = drain(stream);
        if let Err(err) = &result {
            warn!("[client] {} did not take every message: {}", self.addr, err);
        }
        self.close();
        result.map_err(OpcError::Send)
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        self.close();
    }
}
