use std::fmt;
use std::str::{from_utf8_unchecked};

use sha1::Sha1;


/// WebSocket GUID constant from RFC6455
pub const GUID: &'static str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

const CHARS: &'static[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ\
                              abcdefghijklmnopqrstuvwxyz\
                              0123456789+/";

/// The `Sec-WebSocket-Accept` header value
///
/// Use anything that supports `Display` to put it into a response.
pub struct Accept([u8; 20]);

impl Accept {
    /// Create an Accept header value from a key received in header
    ///
    /// Note: key here is a key as passed in header value (base64-encoded)
    /// despite that it's accepted as bytes (not as 16 decoded bytes)
    ///
    /// Note 2: this does not validate a key, see `is_valid_key`
    pub fn from_key_bytes(key: &[u8]) -> Accept {
        let mut sha1 = Sha1::new();
        sha1.update(key);
        sha1.update(GUID.as_bytes());
        Accept(sha1.digest().bytes())
    }
}

/// Checks that the key is a base64 encoding of exactly 16 bytes
///
/// The last character before padding carries only two bits of data, so in
/// canonical encoding it's one of `A`, `Q`, `g`, `w`.
pub fn is_valid_key(key: &[u8]) -> bool {
    key.len() == 24 &&
        key[..21].iter().all(|c| CHARS.contains(c)) &&
        matches!(key[21], b'A' | b'Q' | b'g' | b'w') &&
        &key[22..] == b"=="
}

impl fmt::Display for Accept {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut buf = [0u8; 28];
        for i in 0..6 {
            let n = ((self.0[i*3+0] as usize) << 16) |
                    ((self.0[i*3+1] as usize) <<  8) |
                     (self.0[i*3+2] as usize) ;
            buf[i*4+0] = CHARS[(n >> 18) & 63];
            buf[i*4+1] = CHARS[(n >> 12) & 63];
            buf[i*4+2] = CHARS[(n >>  6) & 63];
            buf[i*4+3] = CHARS[(n >>  0) & 63];
        }
        let n = ((self.0[18] as usize) << 16) |
                ((self.0[19] as usize) <<  8);
        buf[24] = CHARS[(n >> 18) & 63];
        buf[25] = CHARS[(n >> 12) & 63];
        buf[26] = CHARS[(n >> 6) & 63];
        buf[27] = b'=';
        fmt::Write::write_str(f, unsafe {
            from_utf8_unchecked(&buf)
        })
    }
}

impl fmt::Debug for Accept {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "websocket::Accept({})", self)
    }
}
