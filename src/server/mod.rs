//! Websocket server
//!
//! A single thread runs a loop which waits for socket readiness, accepts
//! clients, reads and processes their input, and then does timeout
//! bookkeeping. The application is notified through a `Handler`.
//!
//! ```rust,no_run
//! # use ws_loop::server::{Server, Handler, Clients, ClientId};
//! # use ws_loop::websocket::{Config, Message};
//! struct Echo;
//!
//! impl Handler for Echo {
//!     fn message(&mut self, clients: &mut dyn Clients, id: ClientId,
//!                message: Message)
//!     {
//!         clients.send(id, &message);
//!     }
//! }
//!
//! Server::start(8080, Echo, &Config::new().done()).unwrap();
//! ```
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use mio::{Events, Interest, Poll, Token};
use mio::net::{TcpListener, TcpStream};

use websocket::Config;

mod connection;
mod dispatcher;
mod error;
mod proto;
mod table;

pub use self::connection::{Connection, ReadyState, Input};
pub use self::dispatcher::{ClientId, Clients, Handler};
pub use self::error::Error;
pub use self::proto::Proto;
pub use self::table::Table;


const LISTENER: Token = Token(0);

/// Stops the server from any thread
///
/// The loop notices the request within `poll_interval`, closes all the
/// connections and returns from `Server::run`.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

/// Websocket server listening on a TCP port
pub struct Server<H> {
    config: Arc<Config>,
    poll: Poll,
    events: Events,
    listener: TcpListener,
    proto: Proto<TcpStream, H>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl<H: Handler> Server<H> {
    /// Bind a listening socket, use `run` to start serving
    pub fn bind(addr: &SocketAddr, handler: H, config: &Arc<Config>)
        -> Result<Server<H>, Error>
    {
        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(*addr)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        Ok(Server {
            config: config.clone(),
            poll: poll,
            events: Events::with_capacity(1024),
            listener: listener,
            proto: Proto::new(handler, config),
        })
    }

    /// Listen on all interfaces and serve until stopped
    pub fn start(port: u16, handler: H, config: &Arc<Config>)
        -> Result<(), Error>
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        Server::bind(&addr, handler, config)?.run()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.proto.stop_handle()
    }

    pub fn handler(&self) -> &H {
        self.proto.handler()
    }

    /// Run the loop until stopped
    ///
    /// All the connections are closed before this method returns.
    pub fn run(&mut self) -> Result<(), Error> {
        info!("Serving websockets on {}", self.local_addr()?);
        while !self.proto.is_stopped() {
            self.turn()?;
        }
        info!("Server stopped, closing {} connections",
            self.proto.table().len());
        self.proto.shutdown();
        Ok(())
    }

    /// A single iteration of the loop
    ///
    /// Waits for socket events at most `poll_interval`, processes them,
    /// checks timeouts and calls periodic handler.
    pub fn turn(&mut self) -> Result<(), Error> {
        match self.poll.poll(&mut self.events, Some(self.config.poll_interval)) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
        let now = Instant::now();
        let tokens = self.events.iter()
            .map(|ev| ev.token())
            .collect::<Vec<_>>();
        for token in tokens {
            match token {
                LISTENER => self.accept(now),
                Token(n) => {
                    if let Some(id) = self.proto.client_by_key(n - 1) {
                        self.proto.readable(id, now);
                    }
                }
            }
        }
        self.proto.flush(now);
        self.proto.sweep(now);
        self.proto.periodic(now);
        Ok(())
    }

    fn accept(&mut self, now: Instant) {
        loop {
            match self.listener.accept() {
                Ok((mut socket, addr)) => {
                    let token = Token(self.proto.vacant_key() + 1);
                    if let Err(e) = self.poll.registry()
                        .register(&mut socket, token, Interest::READABLE)
                    {
                        error!("Can't register connection from {}: {}",
                            addr, e);
                        continue;
                    }
                    self.proto.accept(socket, addr, now);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {
                    continue;
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                    break;
                }
            }
        }
    }
}
