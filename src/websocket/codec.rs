use std::cmp::min;
use std::str::from_utf8;

use netbuf::Buf;
use byteorder::{BigEndian, ByteOrder};

use websocket::{Packet, Error, Config, NORMAL_CLOSE};
use websocket::{OP_CONTINUATION, OP_TEXT, OP_CLOSE, OP_PING, OP_PONG};
use websocket::zero_copy::{Head, parse_head, unmask, write_packet, write_close};


/// What has been parsed of the frame currently being received
#[derive(Debug)]
pub struct FrameProgress {
    head: Head,
    payload: Vec<u8>,
}

/// First frames of a fragmented message
#[derive(Debug)]
struct Partial {
    opcode: u8,
    data: Vec<u8>,
}

/// Resumable websocket decoder
///
/// Bytes may arrive in arbitrary chunks: the codec consumes whatever is in
/// the buffer, keeps frame and message progress internally, and yields a
/// packet each time a control frame or a whole data message is complete.
#[derive(Debug)]
pub struct Codec {
    max_packet_size: usize,
    max_message_size: usize,
    frame: Option<FrameProgress>,
    message: Option<Partial>,
}

impl FrameProgress {
    fn new(head: Head) -> FrameProgress {
        FrameProgress {
            head: head,
            // don't trust declared length for preallocation
            payload: Vec::with_capacity(min(head.len, 65536)),
        }
    }
    /// Declared header of the frame
    pub fn head(&self) -> &Head {
        &self.head
    }
    /// Number of payload bytes received so far
    pub fn bytes_read(&self) -> usize {
        self.payload.len()
    }
    fn is_complete(&self) -> bool {
        self.payload.len() == self.head.len
    }
    fn fill(&mut self, buf: &mut Buf) {
        let offset = self.payload.len();
        let nbytes = min(self.head.len - offset, buf.len());
        self.payload.extend_from_slice(&buf[..nbytes]);
        buf.consume(nbytes);
        if let Some(mask) = self.head.mask {
            unmask(&mut self.payload[offset..], mask, offset);
        }
    }
}

impl Codec {
    /// Create a decoder with limits from config
    pub fn new(config: &Config) -> Codec {
        Codec {
            max_packet_size: config.max_packet_size,
            max_message_size: config.max_message_size,
            frame: None,
            message: None,
        }
    }

    /// Frame that is received partially, if any
    pub fn frame_progress(&self) -> Option<&FrameProgress> {
        self.frame.as_ref()
    }

    /// Opcode and length of a fragmented message being reassembled
    pub fn message_progress(&self) -> Option<(u8, usize)> {
        self.message.as_ref().map(|m| (m.opcode, m.data.len()))
    }

    /// Decode next packet consuming bytes from the buffer
    ///
    /// Returns `Ok(None)` when all the input is consumed and more bytes are
    /// needed. Any error means the connection must be dropped.
    pub fn decode(&mut self, buf: &mut Buf) -> Result<Option<Packet>, Error> {
        loop {
            let mut frame = match self.frame.take() {
                Some(frame) => frame,
                None => {
                    match parse_head(&buf[..], self.max_packet_size)? {
                        Some((head, nbytes)) => {
                            self.check_head(&head)?;
                            buf.consume(nbytes);
                            FrameProgress::new(head)
                        }
                        None => return Ok(None),
                    }
                }
            };
            frame.fill(buf);
            if !frame.is_complete() {
                self.frame = Some(frame);
                return Ok(None);
            }
            trace!("Frame {:?}, {} bytes", frame.head, frame.payload.len());
            if let Some(packet) = self.frame_complete(frame)? {
                return Ok(Some(packet));
            }
        }
    }

    /// Encode a packet as a single unmasked frame
    pub fn encode(packet: &Packet, buf: &mut Buf) {
        use websocket::Packet::*;
        match *packet {
            Ping(ref data) | Pong(ref data) | Binary(ref data)
            => write_packet(buf, packet.opcode(), data),
            Text(ref data) => write_packet(buf, packet.opcode(),
                                           data.as_bytes()),
            Close(c, ref t) => write_close(buf, c, t),
        }
    }

    fn check_head(&self, head: &Head) -> Result<(), Error> {
        if head.mask.is_none() {
            return Err(Error::Unmasked);
        }
        if head.is_control() {
            return Ok(());
        }
        match (head.opcode, &self.message) {
            (OP_CONTINUATION, &None) => Err(Error::UnexpectedContinuation),
            (OP_CONTINUATION, &Some(ref msg)) => {
                if message_fits(msg.data.len(), head.len,
                                self.max_message_size)
                {
                    Ok(())
                } else {
                    Err(Error::MessageTooLong)
                }
            }
            (_, &Some(_)) => Err(Error::UnfinishedMessage),
            (_, &None) if head.len > self.max_message_size => {
                Err(Error::MessageTooLong)
            }
            (_, &None) => Ok(()),
        }
    }

    fn frame_complete(&mut self, frame: FrameProgress)
        -> Result<Option<Packet>, Error>
    {
        let FrameProgress { head, payload } = frame;
        match head.opcode {
            OP_PING => Ok(Some(Packet::Ping(payload))),
            OP_PONG => Ok(Some(Packet::Pong(payload))),
            OP_CLOSE => parse_close(&payload).map(Some),
            OP_CONTINUATION => {
                let mut msg = match self.message.take() {
                    Some(msg) => msg,
                    None => return Err(Error::UnexpectedContinuation),
                };
                msg.data.extend_from_slice(&payload);
                if head.fin {
                    data_packet(msg.opcode, msg.data).map(Some)
                } else {
                    self.message = Some(msg);
                    Ok(None)
                }
            }
            opcode => {
                if head.fin {
                    data_packet(opcode, payload).map(Some)
                } else {
                    self.message = Some(Partial {
                        opcode: opcode,
                        data: payload,
                    });
                    Ok(None)
                }
            }
        }
    }
}

fn message_fits(received: usize, more: usize, limit: usize) -> bool {
    match received.checked_add(more) {
        Some(total) => total <= limit,
        None => false,
    }
}

fn data_packet(opcode: u8, data: Vec<u8>) -> Result<Packet, Error> {
    if opcode == OP_TEXT {
        String::from_utf8(data)
            .map(Packet::Text)
            .map_err(|e| Error::InvalidUtf8(e.utf8_error()))
    } else {
        Ok(Packet::Binary(data))
    }
}

/// Status codes a peer is allowed to put into a close frame
///
/// 1004 is reserved, 1005, 1006 and 1015 are for local use only.
fn valid_close_code(code: u16) -> bool {
    matches!(code, 1000..=1003 | 1007..=1014 | 3000..=4999)
}

fn parse_close(data: &[u8]) -> Result<Packet, Error> {
    match data.len() {
        0 => Ok(Packet::Close(NORMAL_CLOSE, String::new())),
        1 => Err(Error::BadClose),
        _ => {
            let code = BigEndian::read_u16(&data[..2]);
            if !valid_close_code(code) {
                return Err(Error::BadClose);
            }
            let reason = from_utf8(&data[2..])?;
            Ok(Packet::Close(code, reason.to_string()))
        }
    }
}

#[cfg(test)]
mod test {
    use netbuf::Buf;
    use websocket::{Config, Codec, Packet, Error};

    fn masked(first: u8, data: &[u8]) -> Vec<u8> {
        let mask = [0x37, 0xfa, 0x21, 0x3d];
        assert!(data.len() < 126);
        let mut res = vec![first, 0x80 | data.len() as u8];
        res.extend_from_slice(&mask);
        res.extend(data.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));
        res
    }

    fn codec() -> Codec {
        Codec::new(&Config::new())
    }

    #[test]
    fn rfc_single_frame() {
        let mut buf = Buf::new();
        buf.extend(b"\x81\x85\x37\xfa\x21\x3d\x7f\x9f\x4d\x51\x58");
        let mut codec = codec();
        assert_eq!(codec.decode(&mut buf).unwrap(),
                   Some(Packet::Text("Hello".to_string())));
        assert_eq!(buf.len(), 0);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn byte_by_byte() {
        let frame = masked(0x82, b"binary payload");
        let mut buf = Buf::new();
        let mut codec = codec();
        for (idx, byte) in frame.iter().enumerate() {
            buf.extend(&[*byte]);
            let res = codec.decode(&mut buf).unwrap();
            if idx + 1 < frame.len() {
                assert!(res.is_none());
            } else {
                assert_eq!(res, Some(Packet::Binary(b"binary payload".to_vec())));
            }
        }
        assert!(codec.frame_progress().is_none());
    }

    #[test]
    fn partial_payload_progress() {
        let frame = masked(0x81, b"Hello");
        let mut buf = Buf::new();
        buf.extend(&frame[..8]);
        let mut codec = codec();
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(codec.frame_progress().unwrap().bytes_read(), 2);
        assert_eq!(codec.frame_progress().unwrap().head().len, 5);
        buf.extend(&frame[8..]);
        assert_eq!(codec.decode(&mut buf).unwrap(),
                   Some(Packet::Text("Hello".to_string())));
    }

    #[test]
    fn fragmented_message() {
        let mut buf = Buf::new();
        buf.extend(&masked(0x01, b"Hel"));
        buf.extend(&masked(0x00, b"lo, "));
        buf.extend(&masked(0x80, b"world"));
        let mut codec = codec();
        assert_eq!(codec.decode(&mut buf).unwrap(),
                   Some(Packet::Text("Hello, world".to_string())));
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(codec.message_progress().is_none());
    }

    #[test]
    fn control_inside_fragmented() {
        let mut buf = Buf::new();
        buf.extend(&masked(0x02, b"ab"));
        buf.extend(&masked(0x89, b"ping"));
        buf.extend(&masked(0x80, b"cd"));
        let mut codec = codec();
        assert_eq!(codec.decode(&mut buf).unwrap(),
                   Some(Packet::Ping(b"ping".to_vec())));
        assert_eq!(codec.message_progress(), Some((2, 2)));
        assert_eq!(codec.decode(&mut buf).unwrap(),
                   Some(Packet::Binary(b"abcd".to_vec())));
    }

    #[test]
    fn close_frames() {
        let mut buf = Buf::new();
        buf.extend(&masked(0x88, b"\x03\xE9bye"));
        buf.extend(&masked(0x88, b""));
        let mut codec = codec();
        assert_eq!(codec.decode(&mut buf).unwrap(),
                   Some(Packet::Close(1001, "bye".to_string())));
        assert_eq!(codec.decode(&mut buf).unwrap(),
                   Some(Packet::Close(1000, String::new())));

        let mut buf = Buf::new();
        buf.extend(&masked(0x88, b"\x03"));
        assert!(matches!(codec.decode(&mut buf), Err(Error::BadClose)));
    }

    #[test]
    fn reserved_close_codes() {
        for &code in &[0u16, 999, 1004, 1005, 1006, 1015, 1016, 2999, 5000] {
            let mut buf = Buf::new();
            buf.extend(&masked(0x88, &[(code >> 8) as u8, code as u8]));
            assert!(matches!(codec().decode(&mut buf), Err(Error::BadClose)),
                    "code {} is accepted", code);
        }
        for &code in &[1000u16, 1003, 1007, 1011, 3000, 4999] {
            let mut buf = Buf::new();
            buf.extend(&masked(0x88, &[(code >> 8) as u8, code as u8]));
            assert_eq!(codec().decode(&mut buf).unwrap(),
                       Some(Packet::Close(code, String::new())));
        }
    }

    #[test]
    fn message_size_overflow() {
        use super::message_fits;
        let max = usize::max_value();
        assert!(message_fits(3, max - 3, max));
        assert!(!message_fits(3, max - 2, max));
        assert!(!message_fits(max, max, max));
        assert!(!message_fits(10, 11, 20));
    }

    #[test]
    fn unmasked_frame() {
        let mut buf = Buf::new();
        buf.extend(b"\x81\x05Hello");
        assert!(matches!(codec().decode(&mut buf), Err(Error::Unmasked)));
    }

    #[test]
    fn continuation_without_start() {
        let mut buf = Buf::new();
        buf.extend(&masked(0x80, b"x"));
        assert!(matches!(codec().decode(&mut buf),
                         Err(Error::UnexpectedContinuation)));
    }

    #[test]
    fn data_inside_fragmented() {
        let mut buf = Buf::new();
        buf.extend(&masked(0x01, b"a"));
        buf.extend(&masked(0x81, b"b"));
        assert!(matches!(codec().decode(&mut buf),
                         Err(Error::UnfinishedMessage)));
    }

    #[test]
    fn invalid_utf8() {
        let mut buf = Buf::new();
        buf.extend(&masked(0x81, b"\xff\xfe"));
        assert!(matches!(codec().decode(&mut buf),
                         Err(Error::InvalidUtf8(_))));
    }

    #[test]
    fn message_limit() {
        let mut codec = Codec::new(Config::new().max_message_size(4));
        let mut buf = Buf::new();
        buf.extend(&masked(0x01, b"abc"));
        buf.extend(&masked(0x80, b"de"));
        assert!(matches!(codec.decode(&mut buf),
                         Err(Error::MessageTooLong)));
    }

    #[test]
    fn frame_limit() {
        let mut codec = Codec::new(Config::new().max_packet_size(4));
        let mut buf = Buf::new();
        buf.extend(&masked(0x82, b"abcde"));
        assert!(matches!(codec.decode(&mut buf), Err(Error::TooLong)));
    }

    #[test]
    fn encode_text() {
        let mut buf = Buf::new();
        Codec::encode(&Packet::Text("Hello".to_string()), &mut buf);
        assert_eq!(&buf[..], b"\x81\x05Hello");
        let mut buf = Buf::new();
        Codec::encode(&Packet::Close(3000, String::new()), &mut buf);
        assert_eq!(&buf[..], b"\x88\x02\x0B\xB8");
    }
}
