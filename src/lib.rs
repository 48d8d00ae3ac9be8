//! Websocket server over non-blocking sockets
//!
//! The `websocket` module contains the protocol: frame codec and the
//! upgrade handshake. The `server` module runs a single-threaded event loop
//! over many client connections and calls into a user-supplied `Handler`.

extern crate httparse;
extern crate netbuf;
extern crate sha1;
extern crate byteorder;
extern crate mio;
extern crate slab;
#[macro_use(quick_error)] extern crate quick_error;
#[macro_use] extern crate matches;
#[macro_use] extern crate log;


pub mod websocket;
pub mod server;

pub use server::{Server, Handler, Clients, ClientId, StopHandle};
pub use websocket::{Config, Message};
