use netbuf::Buf;
use byteorder::{BigEndian, ByteOrder};

use super::{Error};


/// Decoded frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Head {
    /// Final fragment of a message
    pub fin: bool,
    /// One of the `OP_*` constants
    pub opcode: u8,
    /// Masking key, clients must always send one
    pub mask: Option<[u8; 4]>,
    /// Declared payload length
    pub len: usize,
}

impl Head {
    /// Frame is one of close, ping or pong
    pub fn is_control(&self) -> bool {
        self.opcode & 0x8 != 0
    }
}

/// Parse a frame header from the start of `buf`
///
/// Returns the header and the number of bytes it occupies, or `None` if
/// more bytes are needed. Payload is not required to be in the buffer.
pub fn parse_head(buf: &[u8], limit: usize)
    -> Result<Option<(Head, usize)>, Error>
{
    if buf.len() < 2 {
        return Ok(None);
    }
    let fin = buf[0] & 0x80 != 0;
    if buf[0] & 0x70 != 0 {
        return Err(Error::ReservedBits);
    }
    let opcode = buf[0] & 0x0F;
    match opcode {
        0x0 | 0x1 | 0x2 | 0x8 | 0x9 | 0xA => {}
        x => return Err(Error::InvalidOpcode(x)),
    }
    let masked = buf[1] & 0x80 != 0;
    let (size, fsize) = {
        match buf[1] & 0x7F {
            126 => {
                if buf.len() < 4 {
                    return Ok(None);
                }
                (BigEndian::read_u16(&buf[2..4]) as u64, 4)
            }
            127 => {
                if buf.len() < 10 {
                    return Ok(None);
                }
                let size = BigEndian::read_u64(&buf[2..10]);
                if size & (1 << 63) != 0 {
                    return Err(Error::InvalidLength);
                }
                (size, 10)
            }
            size => (size as u64, 2),
        }
    };
    if opcode & 0x8 != 0 {
        if !fin {
            return Err(Error::FragmentedControl);
        }
        if size > 125 {
            return Err(Error::ControlTooLong);
        }
    }
    if size > limit as u64 {
        return Err(Error::TooLong);
    }
    let start = if masked { fsize + 4 } else { fsize };
    if buf.len() < start {
        return Ok(None);
    }
    let mask = if masked {
        Some([buf[fsize], buf[fsize+1], buf[fsize+2], buf[fsize+3]])
    } else {
        None
    };
    Ok(Some((Head {
        fin: fin,
        opcode: opcode,
        mask: mask,
        len: size as usize,
    }, start)))
}

/// Unmask a chunk of payload that starts at `offset` within the frame
pub fn unmask(data: &mut [u8], mask: [u8; 4], offset: usize) {
    for (idx, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[(offset + idx) % 4];
    }
}

/// Write a single unmasked frame with FIN bit set
pub fn write_packet(buf: &mut Buf, opcode: u8, data: &[u8]) {
    debug_assert!(opcode & 0xF0 == 0);
    let first_byte = opcode | 0x80;  // always fin
    let mut head = [0u8; 10];
    head[0] = first_byte;
    let hlen = match data.len() {
        len @ 0..=125 => {
            head[1] = len as u8;
            2
        }
        len @ 126..=65535 => {
            head[1] = 126;
            BigEndian::write_u16(&mut head[2..4], len as u16);
            4
        }
        len => {
            head[1] = 127;
            BigEndian::write_u64(&mut head[2..10], len as u64);
            10
        }
    };
    buf.extend(&head[..hlen]);
    buf.extend(data);
}

/// Write close message to websocket
pub fn write_close(buf: &mut Buf, code: u16, reason: &str) {
    let data = reason.as_bytes();
    assert!(data.len() <= 123);
    buf.extend(&[0x88, (data.len() + 2) as u8,
                  (code >> 8) as u8, (code & 0xFF) as u8]);
    buf.extend(data);
}
