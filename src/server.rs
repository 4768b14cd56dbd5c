use crate::config::Config;
use crate::http::{ParseState, Parser};
use crate::router::Router;
use log::{debug, info, warn};
use mio::event::Event;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_secs(1);
// Connection tokens start here; lower values are listeners.
const FIRST_CONNECTION_TOKEN: usize = 1024;

pub struct Server {
    poll: Poll,
    listeners: Vec<TcpListener>,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    router: Router,
}

struct Connection {
    socket: TcpStream,
    parser: Parser,
    response_buf: Vec<u8>,
    is_closing: bool,
    last_activity: Instant,
}

impl Server {
    pub fn new(config: &Config, router: Router) -> io::Result<Self> {
        let poll = Poll::new()?;
        let mut listeners = Vec::new();

        for server_cfg in &config.servers {
            for port in &server_cfg.ports {
                let addr: SocketAddr = format!("{}:{}", server_cfg.host, port)
                    .parse()
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

                let mut listener = TcpListener::bind(addr)?;
                poll.registry()
                    .register(&mut listener, Token(listeners.len()), Interest::READABLE)?;
                listeners.push(listener);
                info!("Listening on {}", addr);
            }
        }

        if listeners.len() >= FIRST_CONNECTION_TOKEN {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "too many listeners"));
        }

        Ok(Server {
            poll,
            listeners,
            connections: HashMap::new(),
            next_token: FIRST_CONNECTION_TOKEN,
            router,
        })
    }

    pub fn run(&mut self) -> io::Result<()> {
        let mut events = Events::with_capacity(1024);

        loop {
            self.poll.poll(&mut events, Some(POLL_INTERVAL))?;

            for event in events.iter() {
                let token = event.token();
                if token.0 < self.listeners.len() {
                    self.accept(token.0);
                } else if let Some(connection) = self.connections.get_mut(&token) {
                    connection.on_event(event, &self.router);
                }
            }

            let now = Instant::now();
            self.connections.retain(|_, conn| {
                let done = conn.is_closing && conn.response_buf.is_empty();
                !done && now.duration_since(conn.last_activity) <= TIMEOUT
            });
        }
    }

    fn accept(&mut self, listener: usize) {
        loop {
            match self.listeners[listener].accept() {
                Ok((mut socket, peer)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;

                    debug!("Accepted connection from {}", peer);
                    if let Err(e) = self.poll.registry().register(
                        &mut socket,
                        token,
                        Interest::READABLE | Interest::WRITABLE,
                    ) {
                        warn!("Failed to register connection from {}: {}", peer, e);
                        continue;
                    }

                    self.connections.insert(
                        token,
                        Connection {
                            socket,
                            parser: Parser::new(),
                            response_buf: Vec::new(),
                            is_closing: false,
                            last_activity: Instant::now(),
                        },
                    );
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!("Accept error: {}", e);
                    return;
                }
            }
        }
    }
}

impl Connection {
    fn on_event(&mut self, event: &Event, router: &Router) {
        self.last_activity = Instant::now();
        if event.is_readable() {
            self.read_requests(router);
        }
        // Edge-triggered: write whatever is pending rather than waiting for
        // another writable event.
        self.flush();
    }

    fn read_requests(&mut self, router: &Router) {
        let mut buffer = [0; 4096];

        loop {
            match self.socket.read(&mut buffer) {
                Ok(0) => {
                    self.is_closing = true;
                    return;
                }
                Ok(n) => {
                    self.parser.parse(&buffer[..n]);
                    if !self.respond(router) {
                        return;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!("Read error on connection: {}", e);
                    self.is_closing = true;
                    return;
                }
            }
        }
    }

    /// Answers every complete request in the parser's buffer. Returns
    /// `false` once the connection must close.
    fn respond(&mut self, router: &Router) -> bool {
        loop {
            match self.parser.state {
                ParseState::Done => {
                    let request = &self.parser.request;
                    let response = router.handle(request);
                    info!("{} {} {}", request.method.as_str(), request.path, response.status_code);
                    self.response_buf.extend_from_slice(&response.to_bytes());
                    self.parser.reset();
                }
                ParseState::Error => {
                    let response = router.error_response(400, "The request could not be parsed.");
                    self.response_buf.extend_from_slice(&response.to_bytes());
                    self.is_closing = true;
                    return false;
                }
                _ => return true,
            }
        }
    }

    fn flush(&mut self) {
        while !self.response_buf.is_empty() {
            match self.socket.write(&self.response_buf) {
                Ok(0) => {
                    self.is_closing = true;
                    self.response_buf.clear();
                    return;
                }
                Ok(n) => {
                    self.response_buf.drain(..n);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!("Write error on connection: {}", e);
                    self.is_closing = true;
                    self.response_buf.clear();
                    return;
                }
            }
        }
    }
}
