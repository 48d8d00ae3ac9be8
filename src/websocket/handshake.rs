use std::io::Write;

use httparse;
use netbuf::Buf;

use websocket::{Error, Config};
use websocket::keys::{Accept, is_valid_key};


/// Number of headers to allocate on a stack
const MIN_HEADERS: usize = 16;
/// A hard limit on the number of headers
const MAX_HEADERS: usize = 1024;

const BAD_REQUEST: &'static str = "Request is not allowed";


/// A successfully parsed websocket upgrade request
#[derive(Debug)]
pub struct Handshake {
    /// The destination value of `Sec-WebSocket-Accept`
    pub accept: Accept,
    /// Number of bytes the request occupies in the input buffer
    pub bytes: usize,
}

fn bytes_trim(mut x: &[u8]) -> &[u8] {
    while x.len() > 0 && matches!(x[0], b'\r' | b'\n' | b' ' | b'\t') {
        x = &x[1..];
    }
    while x.len() > 0 && matches!(x[x.len()-1],  b'\r' | b'\n' | b' ' | b'\t')
    {
        x = &x[..x.len()-1];
    }
    return x;
}

fn scan_headers(req: &httparse::Request, config: &Config)
    -> Result<Accept, Error>
{
    if req.method != Some("GET") {
        return Err(Error::BadMethod);
    }
    let mut upgrade = false;
    let mut accept = None;
    for h in req.headers.iter() {
        if h.name.eq_ignore_ascii_case("Sec-WebSocket-Key") {
            if accept.is_some() {
                return Err(Error::DuplicateKey);
            }
            let key = bytes_trim(h.value);
            if key.len() == 0 || config.strict_key && !is_valid_key(key) {
                return Err(Error::InvalidKey);
            }
            accept = Some(Accept::from_key_bytes(key));
        } else if h.name.eq_ignore_ascii_case("Sec-WebSocket-Version") {
            // Only version 13 is supported
            if bytes_trim(h.value) != b"13" {
                return Err(Error::BadVersion);
            }
        } else if h.name.eq_ignore_ascii_case("Upgrade") {
            if bytes_trim(h.value).eq_ignore_ascii_case(b"websocket") {
                upgrade = true;
            }
        }
    }
    if !upgrade {
        return Err(Error::NotUpgrade);
    }
    accept.ok_or(Error::MissingKey)
}

/// Parse the upgrade request from the start of the buffer
///
/// Returns `Ok(None)` if the request is not complete yet. The buffer is
/// not consumed, use `Handshake::bytes` for that.
pub fn parse_handshake(buf: &Buf, config: &Config)
    -> Result<Option<Handshake>, Error>
{
    let mut vec;
    let mut headers = [httparse::EMPTY_HEADER; MIN_HEADERS];
    let mut raw = httparse::Request::new(&mut headers);
    let mut result = raw.parse(&buf[..]);
    if matches!(result, Err(httparse::Error::TooManyHeaders)) {
        vec = vec![httparse::EMPTY_HEADER; MAX_HEADERS];
        raw = httparse::Request::new(&mut vec);
        result = raw.parse(&buf[..]);
    }
    match result? {
        httparse::Status::Complete(bytes) => {
            if bytes > config.max_handshake_size {
                return Err(Error::HandshakeTooLong);
            }
            let accept = scan_headers(&raw, config)?;
            Ok(Some(Handshake {
                accept: accept,
                bytes: bytes,
            }))
        }
        httparse::Status::Partial => {
            if buf.len() > config.max_handshake_size {
                return Err(Error::HandshakeTooLong);
            }
            Ok(None)
        }
    }
}

/// Write `101 Switching Protocols` response
pub fn write_response(buf: &mut Buf, accept: &Accept) {
    write!(buf, "HTTP/1.1 101 Switching Protocols\r\n\
                 Upgrade: websocket\r\n\
                 Connection: Upgrade\r\n\
                 Sec-WebSocket-Accept: {}\r\n\
                 \r\n", accept)
        .expect("writing to a buffer never fails");
}

/// Write a response for a request that can't be upgraded
pub fn write_bad_request(buf: &mut Buf) {
    write!(buf, "HTTP/1.1 400 Bad Request\r\n\
                 Content-Type: text/plain\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\
                 \r\n\
                 {}", BAD_REQUEST.len(), BAD_REQUEST)
        .expect("writing to a buffer never fails");
}

#[cfg(test)]
mod test {
    use netbuf::Buf;
    use websocket::{Config, Error};
    use super::{parse_handshake, write_response};

    const REQUEST: &'static [u8] = b"GET /chat HTTP/1.1\r\n\
        Host: server.example.com\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\
        \r\n";

    fn parse(data: &[u8]) -> Result<Option<super::Handshake>, Error> {
        let mut buf = Buf::new();
        buf.extend(data);
        parse_handshake(&buf, &Config::new())
    }

    #[test]
    fn rfc_request() {
        let hs = parse(REQUEST).unwrap().unwrap();
        assert_eq!(hs.bytes, REQUEST.len());
        assert_eq!(hs.accept.to_string(), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");

        let mut buf = Buf::new();
        write_response(&mut buf, &hs.accept);
        assert_eq!(&buf[..], &b"HTTP/1.1 101 Switching Protocols\r\n\
            Upgrade: websocket\r\n\
            Connection: Upgrade\r\n\
            Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\
            \r\n"[..]);
    }

    #[test]
    fn partial_request() {
        assert!(parse(&REQUEST[..40]).unwrap().is_none());
    }

    #[test]
    fn missing_key() {
        assert!(matches!(parse(b"GET / HTTP/1.1\r\n\
            Upgrade: websocket\r\n\r\n"), Err(Error::MissingKey)));
    }

    #[test]
    fn missing_upgrade() {
        assert!(matches!(parse(b"GET / HTTP/1.1\r\n\
            Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n"),
            Err(Error::NotUpgrade)));
    }

    #[test]
    fn bad_version() {
        assert!(matches!(parse(b"GET / HTTP/1.1\r\n\
            Upgrade: websocket\r\n\
            Sec-WebSocket-Version: 8\r\n\
            Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n"),
            Err(Error::BadVersion)));
    }

    #[test]
    fn malformed() {
        assert!(matches!(parse(b"GET / HTTP/1.1\r\nBad Header\r\n\r\n"),
                         Err(Error::HeaderError(_))));
        assert!(matches!(parse(b"POST / HTTP/1.1\r\n\
            Upgrade: websocket\r\n\
            Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n"),
            Err(Error::BadMethod)));
    }

    #[test]
    fn permissive_key() {
        let req = b"GET / HTTP/1.1\r\n\
            Upgrade: WebSocket\r\n\
            Sec-WebSocket-Key: short\r\n\r\n";
        assert!(parse(req).unwrap().is_some());
        let mut buf = Buf::new();
        buf.extend(req);
        assert!(matches!(
            parse_handshake(&buf, Config::new().strict_key(true)),
            Err(Error::InvalidKey)));
    }

    #[test]
    fn too_long() {
        let mut buf = Buf::new();
        buf.extend(b"GET / HTTP/1.1\r\nX-Junk: ");
        buf.extend(&[b'a'; 100]);
        assert!(matches!(
            parse_handshake(&buf, Config::new().max_handshake_size(64)),
            Err(Error::HandshakeTooLong)));
    }
}
