use std::collections::{HashMap, VecDeque};
use std::collections::hash_map::ValuesMut;
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use slab::Slab;

use websocket::{Config, Message, NORMAL_CLOSE, ABNORMAL_CLOSE};
use websocket::{write_packet, write_close};
use server::{ClientId, Clients};
use server::connection::{Connection, ReadyState};


/// All live connections of a server
///
/// Connections are indexed by client id. There is also a secondary index
/// by a small integer key, which is what the event loop registers sockets
/// with. Both indexes are always updated together.
pub struct Table<S> {
    config: Arc<Config>,
    next_id: u64,
    clients: HashMap<ClientId, Connection<S>>,
    keys: Slab<ClientId>,
    closed: VecDeque<(ClientId, u16)>,
    stop: Arc<AtomicBool>,
    pub(crate) now: Instant,
}

impl<S: Read + Write> Table<S> {
    pub fn new(config: &Arc<Config>) -> Table<S> {
        Table {
            config: config.clone(),
            next_id: 0,
            clients: HashMap::new(),
            keys: Slab::new(),
            closed: VecDeque::new(),
            stop: Arc::new(AtomicBool::new(false)),
            now: Instant::now(),
        }
    }

    /// The key that the next inserted connection will get
    pub fn vacant_key(&self) -> usize {
        self.keys.vacant_key()
    }

    /// Add freshly accepted connection, it's in `Connecting` state
    pub fn insert(&mut self, socket: S, peer_addr: SocketAddr, now: Instant)
        -> ClientId
    {
        self.next_id += 1;
        let id = ClientId(self.next_id);
        let key = self.keys.insert(id);
        let conn = Connection::new(id, key, socket, peer_addr,
                                   &self.config, now);
        self.clients.insert(id, conn);
        id
    }

    /// Find a client by the key its socket is registered with
    pub fn client_id(&self, key: usize) -> Option<ClientId> {
        self.keys.get(key).cloned()
    }

    pub fn get(&self, id: ClientId) -> Option<&Connection<S>> {
        self.clients.get(&id)
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut Connection<S>> {
        self.clients.get_mut(&id)
    }

    pub(crate) fn connections_mut(&mut self)
        -> ValuesMut<ClientId, Connection<S>>
    {
        self.clients.values_mut()
    }

    /// All connections regardless of their state, in order of creation
    pub fn all_ids(&self) -> Vec<ClientId> {
        let mut ids = self.clients.keys().cloned().collect::<Vec<_>>();
        ids.sort();
        ids
    }

    /// Number of live connections (including the ones not open yet)
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Drop the connection
    ///
    /// Pending output is written if socket accepts it without blocking,
    /// the rest is discarded. If the connection has been open, it's queued
    /// for the `close` notification with the given status.
    pub fn remove(&mut self, id: ClientId, status: u16) -> bool {
        let mut conn = match self.clients.remove(&id) {
            Some(conn) => conn,
            None => return false,
        };
        if self.keys.contains(conn.key()) {
            self.keys.remove(conn.key());
        }
        conn.flush().ok();
        if conn.was_open() {
            debug!("Client {} closed with status {}", id, status);
            self.closed.push_back((id, status));
        } else {
            debug!("Client {} dropped before handshake", id);
        }
        conn.set_state(ReadyState::Closed);
        true
    }

    /// Next connection that needs `close` notification
    pub fn take_closed(&mut self) -> Option<(ClientId, u16)> {
        self.closed.pop_front()
    }

    pub(crate) fn stop_flag(&self) -> &Arc<AtomicBool> {
        &self.stop
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

impl<S: Read + Write> Clients for Table<S> {
    fn send(&mut self, id: ClientId, message: &Message) -> bool {
        let result = match self.clients.get_mut(&id) {
            Some(conn) if conn.state() == ReadyState::Open => {
                let (opcode, data) = message.as_parts();
                write_packet(conn.out_buf(), opcode, data);
                conn.flush()
            }
            _ => return false,
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                debug!("Error writing to client {}: {}", id, e);
                self.remove(id, ABNORMAL_CLOSE);
                false
            }
        }
    }

    fn close(&mut self, id: ClientId, status: Option<u16>) -> bool {
        let status = status.unwrap_or(NORMAL_CLOSE);
        let now = self.now;
        let result = match self.clients.get_mut(&id) {
            Some(conn) => match conn.state() {
                ReadyState::Connecting => None,
                ReadyState::Open => {
                    conn.set_state(ReadyState::Closing);
                    conn.close_status = status;
                    conn.close_sent = Some(now);
                    write_close(conn.out_buf(), status, "");
                    Some(conn.flush())
                }
                ReadyState::Closing | ReadyState::Closed => return false,
            },
            None => return false,
        };
        match result {
            None => {
                self.remove(id, status);
            }
            Some(Ok(())) => {}
            Some(Err(e)) => {
                debug!("Error writing to client {}: {}", id, e);
                self.remove(id, ABNORMAL_CLOSE);
            }
        }
        true
    }

    fn client_ids(&self) -> Vec<ClientId> {
        let mut ids = self.clients.values()
            .filter(|c| c.was_open())
            .map(|c| c.id())
            .collect::<Vec<_>>();
        ids.sort();
        ids
    }

    fn peer_addr(&self, id: ClientId) -> Option<SocketAddr> {
        self.clients.get(&id).map(|c| c.peer_addr())
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}
