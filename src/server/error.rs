use std::io;


quick_error! {
    /// Websocket server error
    ///
    /// Errors of individual connections never get here, these are failures
    /// of the listening socket or the poller.
    #[derive(Debug)]
    pub enum Error {
        /// Socket IO error
        Io(err: io::Error) {
            description("I/O error")
            display("I/O error: {}", err)
            from()
        }
    }
}
