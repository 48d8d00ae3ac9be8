extern crate netbuf;
extern crate rand;
extern crate ws_loop;

use netbuf::Buf;
use rand::Rng;

use ws_loop::websocket::{Codec, Config, Packet, Error};
use ws_loop::websocket::{parse_head, write_packet};


fn frame(fin: bool, opcode: u8, data: &[u8]) -> Vec<u8> {
    let mask: [u8; 4] = rand::thread_rng().gen();
    let mut res = vec![if fin { 0x80 | opcode } else { opcode }];
    if data.len() < 126 {
        res.push(0x80 | data.len() as u8);
    } else if data.len() <= 0xFFFF {
        res.push(0x80 | 126);
        res.push((data.len() >> 8) as u8);
        res.push(data.len() as u8);
    } else {
        res.push(0x80 | 127);
        for i in (0..8).rev() {
            res.push((data.len() as u64 >> (i*8)) as u8);
        }
    }
    res.extend_from_slice(&mask);
    res.extend(data.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));
    res
}

/// Feeds the data in random chunks, collecting all the packets
fn decode_chunked(codec: &mut Codec, data: &[u8])
    -> Result<Vec<Packet>, Error>
{
    let mut rng = rand::thread_rng();
    let mut buf = Buf::new();
    let mut result = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let end = ::std::cmp::min(data.len(), pos + rng.gen_range(1, 300));
        buf.extend(&data[pos..end]);
        pos = end;
        while let Some(packet) = codec.decode(&mut buf)? {
            result.push(packet);
        }
    }
    assert_eq!(buf.len(), 0);
    Ok(result)
}

#[test]
fn medium_message() {
    let text = "x".repeat(1000);
    let mut codec = Codec::new(&Config::new());
    let packets = decode_chunked(&mut codec,
        &frame(true, 1, text.as_bytes())).unwrap();
    assert_eq!(packets, vec![Packet::Text(text)]);
}

#[test]
fn large_binary() {
    let data = (0..70000).map(|x| x as u8).collect::<Vec<_>>();
    let mut codec = Codec::new(&Config::new());
    let packets = decode_chunked(&mut codec, &frame(true, 2, &data)).unwrap();
    assert_eq!(packets, vec![Packet::Binary(data)]);
}

#[test]
fn conversation() {
    let mut stream = Vec::new();
    stream.extend(frame(true, 1, b"first"));
    stream.extend(frame(false, 2, &[1, 2, 3]));
    stream.extend(frame(true, 9, b"are you there?"));
    stream.extend(frame(false, 0, &[4, 5]));
    stream.extend(frame(true, 0, &[6]));
    stream.extend(frame(true, 10, b""));
    stream.extend(frame(true, 8, b"\x03\xe8bye"));
    let mut codec = Codec::new(&Config::new());
    let packets = decode_chunked(&mut codec, &stream).unwrap();
    assert_eq!(packets, vec![
        Packet::Text("first".to_string()),
        Packet::Ping(b"are you there?".to_vec()),
        Packet::Binary(vec![1, 2, 3, 4, 5, 6]),
        Packet::Pong(Vec::new()),
        Packet::Close(1000, "bye".to_string()),
    ]);
}

#[test]
fn utf8_split_between_fragments() {
    let text = "привет";
    let bytes = text.as_bytes();
    let mut stream = frame(false, 1, &bytes[..3]);
    stream.extend(frame(true, 0, &bytes[3..]));
    let mut codec = Codec::new(&Config::new());
    let packets = decode_chunked(&mut codec, &stream).unwrap();
    assert_eq!(packets, vec![Packet::Text(text.to_string())]);
}

#[test]
fn message_size_limit() {
    let mut cfg = Config::new();
    cfg.max_message_size(1500);
    let mut codec = Codec::new(&cfg);
    let mut stream = frame(false, 2, &[0; 1000]);
    stream.extend(frame(true, 0, &[0; 1000]));
    match decode_chunked(&mut codec, &stream) {
        Err(Error::MessageTooLong) => {}
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn bad_close_payload() {
    let mut codec = Codec::new(&Config::new());
    match decode_chunked(&mut codec, &frame(true, 8, b"\x03")) {
        Err(Error::BadClose) => {}
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn server_frames_parse_back() {
    for &size in &[0, 1, 125, 126, 65535, 65536] {
        let data = (0..size).map(|x| (x % 251) as u8).collect::<Vec<_>>();
        let mut buf = Buf::new();
        write_packet(&mut buf, 2, &data);
        let (head, hlen) = parse_head(&buf[..], 1 << 20).unwrap().unwrap();
        assert!(head.fin);
        assert_eq!(head.opcode, 2);
        assert_eq!(head.mask, None);
        assert_eq!(head.len, size);
        assert_eq!(&buf[hlen..], &data[..]);
    }
}

#[test]
fn length_boundaries() {
    for &size in &[0, 1, 125, 126, 65535, 65536] {
        let data = (0..size).map(|x| (x % 253) as u8).collect::<Vec<_>>();
        let mut codec = Codec::new(&Config::new());
        let packets = decode_chunked(&mut codec, &frame(true, 2, &data))
            .unwrap();
        assert_eq!(packets, vec![Packet::Binary(data)], "size {}", size);
    }
}
