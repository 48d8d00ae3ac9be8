//! Websocket protocol pieces
//!
//! Frame codec, handshake processing and the types shared with the server.
//! None of this touches sockets, everything works on buffers.

use std::time::Duration;

mod error;
mod zero_copy;
mod alloc;
mod codec;
mod config;
mod keys;
mod handshake;

pub use self::error::Error;
pub use self::alloc::{Packet, Message};
pub use self::codec::{Codec, FrameProgress};
pub use self::keys::{Accept, GUID};
pub use self::zero_copy::{Head, parse_head, unmask, write_packet, write_close};
pub use self::handshake::{Handshake, parse_handshake};
pub use self::handshake::{write_response, write_bad_request};


pub const OP_CONTINUATION: u8 = 0x0;
pub const OP_TEXT: u8 = 0x1;
pub const OP_BINARY: u8 = 0x2;
pub const OP_CLOSE: u8 = 0x8;
pub const OP_PING: u8 = 0x9;
pub const OP_PONG: u8 = 0xA;

/// Normal closure
pub const NORMAL_CLOSE: u16 = 1000;
/// Peer went away (or the server is shutting down)
pub const GONE_AWAY: u16 = 1001;
/// Protocol violation
pub const PROTOCOL_ERROR: u16 = 1002;
/// Connection dropped without a close frame, never sent on the wire
pub const ABNORMAL_CLOSE: u16 = 1006;
/// Message is too big to process
pub const MESSAGE_TOO_BIG: u16 = 1009;
/// No pong (or close reply) in time
pub const TIMEOUT: u16 = 3000;


/// Fine-grained configuration of the websocket server
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) recv_timeout: Duration,
    pub(crate) pong_timeout: Duration,
    pub(crate) poll_interval: Duration,
    pub(crate) max_packet_size: usize,
    pub(crate) max_message_size: usize,
    pub(crate) max_handshake_size: usize,
    pub(crate) strict_key: bool,
}
