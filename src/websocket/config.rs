use std::time::Duration;
use std::sync::Arc;

use websocket::{Config};

impl Config {
    /// Create a config with defaults
    pub fn new() -> Config {
        Config {
            recv_timeout: Duration::new(10, 0),
            pong_timeout: Duration::new(5, 0),
            poll_interval: Duration::from_millis(100),
            max_packet_size: 10 << 20,
            max_message_size: 10 << 20,
            max_handshake_size: 8192,
            strict_key: false,
        }
    }
    /// Set receive idle timeout
    ///
    /// Default is 10 seconds.
    ///
    /// If nothing has been received from the client within this interval,
    /// we send a ping message. Any received bytes reset the timer, even if
    /// they don't make up a full frame.
    ///
    /// Connections that did not complete a handshake within this interval
    /// are dropped.
    pub fn recv_timeout(&mut self, dur: Duration) -> &mut Self {
        self.recv_timeout = dur;
        self
    }

    /// Set pong timeout
    ///
    /// Default is 5 seconds.
    ///
    /// A connection is shut down with the `TIMEOUT` status if no pong is
    /// received within this interval after a ping. The same interval is
    /// given to a peer to reply on a close frame sent by the server.
    pub fn pong_timeout(&mut self, dur: Duration) -> &mut Self {
        self.pong_timeout = dur;
        self
    }

    /// Maximum time to wait for socket events in a single loop iteration
    ///
    /// Default is 100 milliseconds. This is the granularity of timeouts
    /// and of the periodic callback.
    pub fn poll_interval(&mut self, dur: Duration) -> &mut Self {
        self.poll_interval = dur;
        self
    }

    /// Maximum packet size
    ///
    /// If some frame declares size larger than this, we immediately abort
    /// the connection
    pub fn max_packet_size(&mut self, size: usize) -> &mut Self {
        self.max_packet_size = size;
        self
    }

    /// Maximum size of a message reassembled from fragments
    pub fn max_message_size(&mut self, size: usize) -> &mut Self {
        self.max_message_size = size;
        self
    }

    /// Maximum size of the upgrade request including headers
    pub fn max_handshake_size(&mut self, size: usize) -> &mut Self {
        self.max_handshake_size = size;
        self
    }

    /// Require `Sec-WebSocket-Key` to be a base64-encoded 16-byte value
    ///
    /// Disabled by default: any non-empty key is accepted.
    pub fn strict_key(&mut self, value: bool) -> &mut Self {
        self.strict_key = value;
        self
    }

    /// Create a Arc'd config clone to pass to the constructor
    ///
    /// This is just a convenience method.
    pub fn done(&mut self) -> Arc<Config> {
        Arc::new(self.clone())
    }
}
