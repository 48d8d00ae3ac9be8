use std::fmt;
use std::net::SocketAddr;

use websocket::{Message};


/// Opaque identifier of a client connection
///
/// Identifiers are allocated from a monotonic counter and are never reused
/// during the lifetime of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub(crate) u64);

/// Operations the application may perform on connected clients
///
/// This is passed to every `Handler` callback.
pub trait Clients {
    /// Send a message to a client
    ///
    /// Returns `false` if there is no such client or the client is not in
    /// the open state. A write error closes the connection, the `close`
    /// callback for it is called after the current callback returns.
    fn send(&mut self, id: ClientId, message: &Message) -> bool;

    /// Start a close handshake with the client
    ///
    /// `NORMAL_CLOSE` is used when no status is given. Returns `false` if
    /// there is no such client or it's already closing.
    fn close(&mut self, id: ClientId, status: Option<u16>) -> bool;

    /// Identifiers of all live connections
    fn client_ids(&self) -> Vec<ClientId>;

    /// Address of the peer
    fn peer_addr(&self, id: ClientId) -> Option<SocketAddr>;

    /// Stop the server after the current loop iteration
    fn stop(&mut self);

    /// Send a text message, see `send`
    fn send_text(&mut self, id: ClientId, text: &str) -> bool {
        self.send(id, &Message::Text(text.to_string()))
    }
}

/// Dispatches events of websocket connections to the application
///
/// All methods are called from the event loop thread. Only `message` is
/// required, default implementations of the others do nothing.
pub trait Handler {
    /// Handshake is complete and the client may be sent messages
    fn open(&mut self, _clients: &mut dyn Clients, _id: ClientId) {}

    /// A whole text or binary message is received
    fn message(&mut self, clients: &mut dyn Clients, id: ClientId,
               message: Message);

    /// Connection is torn down
    ///
    /// Called once for every connection for which `open` has been called.
    /// The client is already removed from the table when this is called.
    fn close(&mut self, _clients: &mut dyn Clients, _id: ClientId,
             _status: u16)
    {}

    /// Called once per event loop iteration
    fn periodic(&mut self, _clients: &mut dyn Clients) {}
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
