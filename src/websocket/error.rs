use std::io;
use std::str::{Utf8Error};

use httparse;

use websocket::{PROTOCOL_ERROR, ABNORMAL_CLOSE, MESSAGE_TOO_BIG};


quick_error! {
    /// Websocket protocol error
    ///
    /// Any of these errors is fatal for the single connection it happened
    /// on. The server never propagates them further than that.
    #[derive(Debug)]
    pub enum Error {
        /// Socket IO error
        Io(err: io::Error) {
            description("IO error")
            display("IO error: {}", err)
            from()
        }
        /// Text frame or close reason can't be decoded
        InvalidUtf8(err: Utf8Error) {
            description("Error decoding text frame")
            display("Error decoding text frame: {}", err)
            from()
        }
        /// Got websocket message with wrong opcode
        InvalidOpcode(code: u8) {
            description("Opcode of the frame is invalid")
            display("Opcode of the frame is invalid: {}", code)
        }
        /// Reserved bits are set but no extension was negotiated
        ReservedBits {
            description("Reserved bits are set in a frame header")
        }
        /// Got unmasked frame from a client
        Unmasked {
            description("Received unmasked frame")
        }
        /// Control frame without FIN bit
        FragmentedControl {
            description("Received fragmented control frame")
        }
        /// Control frame with payload larger than 125 bytes
        ControlTooLong {
            description("Control frame payload is too long")
        }
        /// 64-bit length with the most significant bit set
        InvalidLength {
            description("Invalid frame length")
        }
        /// Received frame that is longer than configured limit
        TooLong {
            description("Received frame that is too long")
        }
        /// Reassembled message exceeds configured limit
        MessageTooLong {
            description("Received message that is too long")
        }
        /// Continuation frame with no fragmented message started
        UnexpectedContinuation {
            description("Continuation frame without a message to continue")
        }
        /// New data frame while previous message is still fragmented
        UnfinishedMessage {
            description("Data frame inside of a fragmented message")
        }
        /// Close frame with one-byte payload or a status that must not
        /// appear on the wire
        BadClose {
            description("Malformed close frame")
        }
        /// Error parsing http headers
        HeaderError(err: httparse::Error) {
            description("parse error")
            display("parse error: {:?}", err)
            from()
        }
        /// Handshake request does not fit into configured limit
        HandshakeTooLong {
            description("Handshake request is too long")
        }
        /// Handshake request method is not GET
        BadMethod {
            description("Handshake request method is not GET")
        }
        /// No `Upgrade: websocket` header
        NotUpgrade {
            description("Not a websocket upgrade request")
        }
        /// No `Sec-WebSocket-Key` header
        MissingKey {
            description("No Sec-WebSocket-Key header")
        }
        /// Duplicate `Sec-WebSocket-Key` header
        DuplicateKey {
            description("Duplicate Sec-WebSocket-Key header")
        }
        /// Key is not a base64-encoded 16-byte value (strict mode only)
        InvalidKey {
            description("Invalid Sec-WebSocket-Key header")
        }
        /// `Sec-WebSocket-Version` is something other than 13
        BadVersion {
            description("Unsupported websocket version")
        }
    }
}

impl Error {
    /// Status code sent in the close frame and passed to the `close`
    /// callback when this error kills a connection
    pub fn close_code(&self) -> u16 {
        match *self {
            Error::Io(..) => ABNORMAL_CLOSE,
            Error::TooLong | Error::MessageTooLong => MESSAGE_TOO_BIG,
            _ => PROTOCOL_ERROR,
        }
    }
    /// Whether error happened before the websocket was established
    pub fn is_handshake(&self) -> bool {
        use self::Error::*;
        matches!(*self, HeaderError(_) | HandshakeTooLong | BadMethod |
                        NotUpgrade | MissingKey | DuplicateKey |
                        InvalidKey | BadVersion)
    }
}

#[test]
fn send_sync() {
    fn send_sync<T: Send+Sync>(_: T) {}
    send_sync(Error::TooLong);
}

#[test]
fn handshake_errors() {
    assert!(Error::MissingKey.is_handshake());
    assert!(!Error::Unmasked.is_handshake());
    assert_eq!(Error::Unmasked.close_code(), 1002);
    assert_eq!(Error::BadClose.close_code(), 1002);
}

#[test]
fn size_limit_codes() {
    assert_eq!(Error::TooLong.close_code(), 1009);
    assert_eq!(Error::MessageTooLong.close_code(), 1009);
}
