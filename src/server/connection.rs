use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::Instant;

use netbuf::Buf;

use websocket::{Codec, Config, Packet};
use server::ClientId;


/// Position of a connection in its lifecycle
///
/// Ordering follows the lifecycle, a connection never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    /// Waiting for the upgrade request
    Connecting,
    /// Handshake is done
    Open,
    /// Close frame is sent, waiting for the reply
    Closing,
    /// Torn down
    Closed,
}

/// Result of draining readable socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// Some bytes are read into the input buffer
    Data(usize),
    /// Nothing to read right now
    WouldBlock,
    /// Peer has shut down the connection
    Eof,
}

/// State of a single client connection
pub struct Connection<S> {
    id: ClientId,
    key: usize,
    socket: S,
    state: ReadyState,
    peer_addr: SocketAddr,
    pub(crate) in_buf: Buf,
    out_buf: Buf,
    pub(crate) codec: Codec,
    pub(crate) last_recv: Instant,
    pub(crate) ping_sent: Option<Instant>,
    pub(crate) close_sent: Option<Instant>,
    pub(crate) close_status: u16,
}

impl<S: Read + Write> Connection<S> {
    pub fn new(id: ClientId, key: usize, socket: S, peer_addr: SocketAddr,
               config: &Config, now: Instant)
        -> Connection<S>
    {
        Connection {
            id: id,
            key: key,
            socket: socket,
            state: ReadyState::Connecting,
            peer_addr: peer_addr,
            in_buf: Buf::new(),
            out_buf: Buf::new(),
            codec: Codec::new(config),
            last_recv: now,
            ping_sent: None,
            close_sent: None,
            close_status: 0,
        }
    }
    pub fn id(&self) -> ClientId {
        self.id
    }
    /// Index of the connection in the token table
    pub fn key(&self) -> usize {
        self.key
    }
    pub fn state(&self) -> ReadyState {
        self.state
    }
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
    /// Move the connection forward in its lifecycle
    pub fn set_state(&mut self, state: ReadyState) {
        debug_assert!(state >= self.state,
            "connection {} moves from {:?} to {:?}", self.id, self.state, state);
        self.state = state;
    }
    /// Whether `open` callback has been called for this connection
    pub fn was_open(&self) -> bool {
        self.state == ReadyState::Open || self.state == ReadyState::Closing
    }

    /// Read a chunk of data from the socket into input buffer
    pub fn read(&mut self) -> io::Result<Input> {
        loop {
            match self.in_buf.read_from(&mut self.socket) {
                Ok(0) => return Ok(Input::Eof),
                Ok(n) => return Ok(Input::Data(n)),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(Input::WouldBlock);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Put packet to the output buffer and try to write it
    pub fn send(&mut self, packet: &Packet) -> io::Result<()> {
        Codec::encode(packet, &mut self.out_buf);
        self.flush()
    }

    /// Output buffer for writing raw bytes, call `flush` afterwards
    pub fn out_buf(&mut self) -> &mut Buf {
        &mut self.out_buf
    }

    /// Number of bytes that are not written to the socket yet
    pub fn pending(&self) -> usize {
        self.out_buf.len()
    }

    /// Write as much of the output buffer as the socket accepts
    pub fn flush(&mut self) -> io::Result<()> {
        while self.out_buf.len() > 0 {
            match self.out_buf.write_to(&mut self.socket) {
                Ok(0) => {
                    return Err(io::Error::new(io::ErrorKind::WriteZero,
                                              "connection closed"));
                }
                Ok(_) => continue,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(());
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
