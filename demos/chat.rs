extern crate ws_loop;
extern crate argparse;
extern crate env_logger;
#[macro_use] extern crate log;

use std::env;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use argparse::{ArgumentParser, Store, StoreTrue};

use ws_loop::{Server, Handler, Clients, ClientId, Config, Message};


struct Chat {
    announce_time: bool,
    next_announce: Instant,
}

impl Chat {
    fn tell_others(&self, clients: &mut dyn Clients, me: ClientId,
                   text: &str)
    {
        for id in clients.client_ids() {
            if id != me {
                clients.send_text(id, text);
            }
        }
    }
}

impl Handler for Chat {
    fn open(&mut self, clients: &mut dyn Clients, id: ClientId) {
        info!("Stranger {} from {:?}", id, clients.peer_addr(id));
        self.tell_others(clients, id,
            &format!("Stranger {} has joined.", id));
        clients.send_text(id, "Welcome!");
    }
    fn message(&mut self, clients: &mut dyn Clients, id: ClientId,
               message: Message)
    {
        let text = match message {
            Message::Text(text) => text,
            Message::Binary(_) => {
                warn!("Binary message from {} is ignored", id);
                return;
            }
        };
        self.tell_others(clients, id,
            &format!("Stranger {} says: {}", id, text));
    }
    fn close(&mut self, clients: &mut dyn Clients, id: ClientId,
             status: u16)
    {
        info!("Stranger {} left with status {}", id, status);
        self.tell_others(clients, id,
            &format!("Stranger {} has left.", id));
    }
    fn periodic(&mut self, clients: &mut dyn Clients) {
        if !self.announce_time || Instant::now() < self.next_announce {
            return;
        }
        self.next_announce = Instant::now() + Duration::new(10, 0);
        let secs = SystemTime::now().duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs()).unwrap_or(0);
        let text = format!("Server time: {}", secs);
        for id in clients.client_ids() {
            clients.send_text(id, &text);
        }
    }
}


fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init().unwrap();

    let mut port = 8000u16;
    let mut announce_time = false;
    {
        let mut ap = ArgumentParser::new();
        ap.set_description("Websocket chat room");
        ap.refer(&mut port)
            .add_option(&["-p", "--port"], Store,
                "Port to listen on (default 8000)");
        ap.refer(&mut announce_time)
            .add_option(&["--announce-time"], StoreTrue,
                "Send server time to everyone every 10 seconds");
        ap.parse_args_or_exit();
    }

    let chat = Chat {
        announce_time: announce_time,
        next_announce: Instant::now() + Duration::new(10, 0),
    };
    Server::start(port, chat, &Config::new().done())
        .expect("server failed");
}
