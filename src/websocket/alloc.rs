use websocket::{OP_PING, OP_PONG, OP_TEXT, OP_BINARY};


/// A websocket packet
///
/// This is what a connection decodes from the wire: either a control
/// frame or a whole (possibly reassembled) data message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Ping packet (with data)
    Ping(Vec<u8>),
    /// Pong packet (with data)
    Pong(Vec<u8>),
    /// Text (utf-8) messsage
    Text(String),
    /// Binary message
    Binary(Vec<u8>),
    /// Close message
    Close(u16, String),
}

/// A data message exchanged with the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Text (utf-8) message
    Text(String),
    /// Binary message
    Binary(Vec<u8>),
}

impl Message {
    /// Opcode and payload as written on the wire
    pub fn as_parts(&self) -> (u8, &[u8]) {
        match *self {
            Message::Text(ref x) => (OP_TEXT, x.as_bytes()),
            Message::Binary(ref x) => (OP_BINARY, x),
        }
    }
}

impl Packet {
    /// Opcode of the frame this packet is encoded into
    pub fn opcode(&self) -> u8 {
        use self::Packet::*;
        use websocket::OP_CLOSE;
        match *self {
            Ping(_) => OP_PING,
            Pong(_) => OP_PONG,
            Text(_) => OP_TEXT,
            Binary(_) => OP_BINARY,
            Close(..) => OP_CLOSE,
        }
    }
}
