use std::io::{Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use websocket::{Config, Error, Packet, Message};
use websocket::{parse_handshake, write_response, write_bad_request};
use websocket::{write_close, GONE_AWAY, NORMAL_CLOSE, ABNORMAL_CLOSE};
use websocket::{TIMEOUT};
use server::{ClientId, Handler, StopHandle};
use server::table::Table;
use server::connection::{Connection, ReadyState, Input};


/// Drives websocket connections of a server
///
/// This is the event-loop logic without the event loop: it knows nothing
/// about socket readiness, the caller tells it which client is readable and
/// when to do the periodic work. Sockets are expected to be non-blocking.
pub struct Proto<S, H> {
    config: Arc<Config>,
    table: Table<S>,
    handler: H,
}

enum Step {
    Wait,
    Open,
    Packet(Packet),
    Fail(Error),
}

enum Expire {
    Handshake,
    Pong,
    Close(u16),
    Broken,
}

fn next_step<S: Read + Write>(conn: &mut Connection<S>, config: &Config)
    -> Step
{
    if conn.state() == ReadyState::Connecting {
        match parse_handshake(&conn.in_buf, config) {
            Ok(Some(hs)) => {
                conn.in_buf.consume(hs.bytes);
                write_response(conn.out_buf(), &hs.accept);
                if let Err(e) = conn.flush() {
                    return Step::Fail(e.into());
                }
                conn.set_state(ReadyState::Open);
                Step::Open
            }
            Ok(None) => Step::Wait,
            Err(e) => Step::Fail(e),
        }
    } else {
        match conn.codec.decode(&mut conn.in_buf) {
            Ok(Some(packet)) => Step::Packet(packet),
            Ok(None) => Step::Wait,
            Err(e) => Step::Fail(e),
        }
    }
}

impl<S: Read + Write, H: Handler> Proto<S, H> {
    /// Create a connection driver with no connections
    pub fn new(handler: H, config: &Arc<Config>) -> Proto<S, H> {
        Proto {
            config: config.clone(),
            table: Table::new(config),
            handler: handler,
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// The connection table, it also implements `Clients`
    pub fn table(&self) -> &Table<S> {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut Table<S> {
        &mut self.table
    }

    /// Handle that stops the server from other threads
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.table.stop_flag().clone())
    }

    pub fn is_stopped(&self) -> bool {
        self.table.is_stopped()
    }

    /// The key that the next accepted socket will be registered with
    pub fn vacant_key(&self) -> usize {
        self.table.vacant_key()
    }

    /// Find a client by the key of its socket
    pub fn client_by_key(&self, key: usize) -> Option<ClientId> {
        self.table.client_id(key)
    }

    /// Add accepted socket, the client is expected to send handshake
    pub fn accept(&mut self, socket: S, addr: SocketAddr, now: Instant)
        -> ClientId
    {
        let id = self.table.insert(socket, addr, now);
        debug!("Client {} connected from {}", id, addr);
        id
    }

    /// Read everything available from the client's socket and process it
    pub fn readable(&mut self, id: ClientId, now: Instant) {
        self.table.now = now;
        loop {
            let input = match self.table.get_mut(id) {
                Some(conn) => match conn.read() {
                    Ok(Input::Data(n)) => {
                        trace!("Read {} bytes from {}", n, id);
                        conn.last_recv = now;
                        Ok(Input::Data(n))
                    }
                    other => other,
                },
                None => break,
            };
            match input {
                Ok(Input::Data(_)) => self.process(id),
                Ok(Input::WouldBlock) => break,
                Ok(Input::Eof) => {
                    self.disconnected(id);
                    break;
                }
                Err(e) => {
                    debug!("Error reading from client {}: {}", id, e);
                    self.table.remove(id, ABNORMAL_CLOSE);
                    break;
                }
            }
        }
        self.reap();
    }

    /// Write pending output of all the connections
    pub fn flush(&mut self, now: Instant) {
        self.table.now = now;
        let mut broken = Vec::new();
        for conn in self.table.connections_mut() {
            if conn.pending() > 0 {
                if let Err(e) = conn.flush() {
                    debug!("Error writing to client {}: {}", conn.id(), e);
                    broken.push(conn.id());
                }
            }
        }
        for id in broken {
            self.table.remove(id, ABNORMAL_CLOSE);
        }
        self.reap();
    }

    /// Send keepalive pings and drop connections which timed out
    pub fn sweep(&mut self, now: Instant) {
        self.table.now = now;
        let recv_timeout = self.config.recv_timeout;
        let pong_timeout = self.config.pong_timeout;
        let mut expired = Vec::new();
        for conn in self.table.connections_mut() {
            let id = conn.id();
            match conn.state() {
                ReadyState::Connecting => {
                    if now.saturating_duration_since(conn.last_recv)
                        >= recv_timeout
                    {
                        expired.push((id, Expire::Handshake));
                    }
                }
                ReadyState::Open => match conn.ping_sent {
                    Some(sent) => {
                        if now.saturating_duration_since(sent) >= pong_timeout {
                            expired.push((id, Expire::Pong));
                        }
                    }
                    None => {
                        if now.saturating_duration_since(conn.last_recv)
                            >= recv_timeout
                        {
                            trace!("Client {} is idle, sending ping", id);
                            conn.ping_sent = Some(now);
                            if conn.send(&Packet::Ping(Vec::new())).is_err() {
                                expired.push((id, Expire::Broken));
                            }
                        }
                    }
                },
                ReadyState::Closing => {
                    let sent = conn.close_sent.unwrap_or(conn.last_recv);
                    if now.saturating_duration_since(sent) >= pong_timeout {
                        expired.push((id, Expire::Close(conn.close_status)));
                    }
                }
                ReadyState::Closed => {}
            }
        }
        for (id, reason) in expired {
            match reason {
                Expire::Handshake => {
                    debug!("Client {} did not finish handshake", id);
                    self.table.remove(id, TIMEOUT);
                }
                Expire::Pong => {
                    debug!("Client {} did not answer ping", id);
                    if let Some(conn) = self.table.get_mut(id) {
                        write_close(conn.out_buf(), TIMEOUT, "");
                    }
                    self.table.remove(id, TIMEOUT);
                }
                Expire::Close(status) => {
                    debug!("Client {} did not answer close", id);
                    self.table.remove(id, status);
                }
                Expire::Broken => {
                    self.table.remove(id, ABNORMAL_CLOSE);
                }
            }
        }
        self.reap();
    }

    /// Call periodic handler
    pub fn periodic(&mut self, now: Instant) {
        self.table.now = now;
        self.handler.periodic(&mut self.table);
        self.reap();
    }

    /// Drop all the connections
    ///
    /// Open clients are sent a close frame with `GONE_AWAY` status, the
    /// `close` callback is called for each of them.
    pub fn shutdown(&mut self) {
        for id in self.table.all_ids() {
            if let Some(conn) = self.table.get_mut(id) {
                if conn.state() == ReadyState::Open {
                    write_close(conn.out_buf(), GONE_AWAY, "");
                }
            }
            self.table.remove(id, GONE_AWAY);
        }
        self.reap();
    }

    fn process(&mut self, id: ClientId) {
        loop {
            let step = match self.table.get_mut(id) {
                Some(conn) => next_step(conn, &self.config),
                None => return,
            };
            match step {
                Step::Wait => return,
                Step::Open => {
                    debug!("Client {} handshake complete", id);
                    self.handler.open(&mut self.table, id);
                }
                Step::Packet(packet) => self.packet(id, packet),
                Step::Fail(e) => {
                    self.fail(id, e);
                    return;
                }
            }
        }
    }

    fn packet(&mut self, id: ClientId, packet: Packet) {
        match packet {
            Packet::Ping(data) => {
                trace!("Received ping {:?}", data);
                let result = match self.table.get_mut(id) {
                    Some(conn) if conn.state() == ReadyState::Open => {
                        conn.send(&Packet::Pong(data))
                    }
                    _ => return,
                };
                if let Err(e) = result {
                    debug!("Error writing to client {}: {}", id, e);
                    self.table.remove(id, ABNORMAL_CLOSE);
                }
            }
            Packet::Pong(data) => {
                trace!("Received pong {:?}", data);
                if let Some(conn) = self.table.get_mut(id) {
                    conn.ping_sent = None;
                }
            }
            Packet::Close(code, reason) => {
                debug!("Websocket {} closed by peer [{}]{:?}",
                    id, code, reason);
                self.close_received(id, code);
            }
            Packet::Text(text) => {
                self.handler.message(&mut self.table, id, Message::Text(text));
            }
            Packet::Binary(data) => {
                self.handler.message(&mut self.table, id,
                                     Message::Binary(data));
            }
        }
    }

    fn close_received(&mut self, id: ClientId, code: u16) {
        let status = match self.table.get_mut(id) {
            Some(conn) => match conn.state() {
                ReadyState::Open => {
                    conn.set_state(ReadyState::Closing);
                    conn.close_status = code;
                    write_close(conn.out_buf(), code, "");
                    code
                }
                ReadyState::Closing => conn.close_status,
                _ => return,
            },
            None => return,
        };
        self.table.remove(id, status);
    }

    fn disconnected(&mut self, id: ClientId) {
        let status = match self.table.get(id) {
            Some(conn) if conn.state() == ReadyState::Closing => {
                if conn.close_sent.is_some() {
                    conn.close_status
                } else {
                    NORMAL_CLOSE
                }
            }
            Some(_) => GONE_AWAY,
            None => return,
        };
        debug!("Client {} disconnected", id);
        self.table.remove(id, status);
    }

    fn fail(&mut self, id: ClientId, err: Error) {
        debug!("Client {} error: {}", id, err);
        if let Some(conn) = self.table.get_mut(id) {
            match conn.state() {
                ReadyState::Connecting if err.is_handshake() => {
                    write_bad_request(conn.out_buf());
                }
                ReadyState::Open if !matches!(err, Error::Io(..)) => {
                    write_close(conn.out_buf(), err.close_code(), "");
                }
                _ => {}
            }
        }
        self.table.remove(id, err.close_code());
    }

    fn reap(&mut self) {
        while let Some((id, status)) = self.table.take_closed() {
            self.handler.close(&mut self.table, id, status);
        }
    }
}
