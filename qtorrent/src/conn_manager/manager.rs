use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use super::conn_handle::{ConnCommand, ConnHandle, ConnId};

const READ_CHUNK_SIZE: usize = 4096;
const EVENT_POLL_TIMEOUT: Duration = Duration::from_millis(250);

/// One lifecycle event of a peer connection.
///
/// For a given connection, `Connected` always precedes the first
/// `DataReceived`, and `ConnectionLost` (or `ConnectionFailed`, if the
/// dial never succeeded) is the last event emitted.
#[derive(Debug)]
pub enum NetEvent {
    Connected { conn: ConnId, handle: ConnHandle },
    ConnectionFailed { conn: ConnId },
    DataReceived { conn: ConnId, data: Vec<u8> },
    ConnectionLost { conn: ConnId },
}

impl NetEvent {
    pub fn conn(&self) -> ConnId {
        match self {
            NetEvent::Connected { conn, .. }
            | NetEvent::ConnectionFailed { conn }
            | NetEvent::DataReceived { conn, .. }
            | NetEvent::ConnectionLost { conn } => *conn,
        }
    }
}

/// Capability interface of the connection manager, as seen by the
/// torrent code: dial peers and stop the loop. The handle side of the
/// contract lives in `ConnHandle`.
pub trait ConnManager {
    /// Starts a non-blocking dial to `addr`. The outcome arrives later
    /// as a `Connected` or `ConnectionFailed` event for the returned id.
    fn connect_peer(&mut self, addr: SocketAddr) -> ConnId;

    /// Makes `start_event_loop` return after the current dispatch and
    /// close every socket.
    fn stop_event_loop(&mut self);
}

/// Consumer of connection events. Callbacks run to completion before the
/// next event is dispatched, so handler state needs no further
/// synchronization.
pub trait EventHandler {
    fn handle_event(&mut self, event: NetEvent, conn_manager: &mut dyn ConnManager);
}

/// Connection manager backed by blocking sockets and per-connection I/O
/// threads feeding one event queue.
///
/// Each dial spawns a thread that connects with a timeout, emits
/// `Connected`, forks a writer thread draining the connection's command
/// channel, and then reads the socket in chunks until EOF or error. The
/// single consumer loop in `start_event_loop` serializes all callbacks.
#[derive(Debug)]
pub struct ThreadedConnManager {
    event_sender: Sender<NetEvent>,
    event_receiver: Option<Receiver<NetEvent>>,
    connections: HashMap<ConnId, Sender<ConnCommand>>,
    next_conn: usize,
    connect_timeout: Duration,
    stopped: bool,
}

impl ThreadedConnManager {
    pub fn new(connect_timeout: Duration) -> Self {
        let (event_sender, event_receiver) = channel();
        Self {
            event_sender,
            event_receiver: Some(event_receiver),
            connections: HashMap::new(),
            next_conn: 0,
            connect_timeout,
            stopped: false,
        }
    }

    /// Runs the event loop until `stop_event_loop` is called, dispatching
    /// every connection event to `handler`.
    pub fn start_event_loop(&mut self, handler: &mut dyn EventHandler) {
        let receiver = match self.event_receiver.take() {
            Some(receiver) => receiver,
            None => return,
        };

        while !self.stopped {
            let event = match receiver.recv_timeout(EVENT_POLL_TIMEOUT) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            self.track_connection(&event);
            handler.handle_event(event, self);
        }

        self.event_receiver = Some(receiver);
        self.close_all();
    }

    fn track_connection(&mut self, event: &NetEvent) {
        match event {
            NetEvent::Connected { conn, handle } => {
                self.connections.insert(*conn, handle.commands_sender());
            }
            NetEvent::ConnectionLost { conn } | NetEvent::ConnectionFailed { conn } => {
                self.connections.remove(conn);
            }
            NetEvent::DataReceived { .. } => {}
        }
    }

    fn close_all(&mut self) {
        for (_, commands) in self.connections.drain() {
            let _ = commands.send(ConnCommand::Close);
        }
    }
}

impl ConnManager for ThreadedConnManager {
    fn connect_peer(&mut self, addr: SocketAddr) -> ConnId {
        let conn = ConnId(self.next_conn);
        self.next_conn += 1;

        let events = self.event_sender.clone();
        let timeout = self.connect_timeout;
        let builder = thread::Builder::new().name(format!("peer-conn-{}", conn.0));
        let spawned = builder.spawn(move || match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => run_connection(conn, stream, events),
            Err(err) => {
                debug!("Dial to {} failed: {}", addr, err);
                let _ = events.send(NetEvent::ConnectionFailed { conn });
            }
        });

        if spawned.is_err() {
            warn!("Could not spawn a dial thread for {}", addr);
            let _ = self.event_sender.send(NetEvent::ConnectionFailed { conn });
        }
        conn
    }

    fn stop_event_loop(&mut self) {
        self.stopped = true;
    }
}

/// Dial succeeded: announce the connection, start the writer, then keep
/// this thread as the reader until the peer goes away.
fn run_connection(conn: ConnId, stream: TcpStream, events: Sender<NetEvent>) {
    let write_stream = match stream.try_clone() {
        Ok(write_stream) => write_stream,
        Err(err) => {
            warn!("Could not clone the stream for {:?}: {}", conn, err);
            let _ = events.send(NetEvent::ConnectionFailed { conn });
            return;
        }
    };

    let (commands_sender, commands) = channel();
    let handle = ConnHandle::new(conn, commands_sender);
    if events.send(NetEvent::Connected { conn, handle }).is_err() {
        return;
    }

    let writer = thread::Builder::new()
        .name(format!("peer-write-{}", conn.0))
        .spawn(move || run_writer(write_stream, commands));
    if writer.is_err() {
        let _ = events.send(NetEvent::ConnectionLost { conn });
        return;
    }

    run_reader(conn, stream, events);
}

fn run_reader(conn: ConnId, mut stream: TcpStream, events: Sender<NetEvent>) {
    let mut buffer = [0; READ_CHUNK_SIZE];
    loop {
        match stream.read(&mut buffer) {
            Ok(0) | Err(_) => {
                let _ = events.send(NetEvent::ConnectionLost { conn });
                return;
            }
            Ok(n) => {
                let data = buffer[..n].to_vec();
                if events.send(NetEvent::DataReceived { conn, data }).is_err() {
                    return;
                }
            }
        }
    }
}

fn run_writer(mut stream: TcpStream, commands: Receiver<ConnCommand>) {
    while let Ok(command) = commands.recv() {
        match command {
            ConnCommand::Send(data) => {
                if stream.write_all(&data).is_err() {
                    break;
                }
            }
            ConnCommand::Close => break,
        }
    }
    // Wakes the reader with EOF, which reports the loss.
    let _ = stream.shutdown(Shutdown::Both);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    struct RecordingHandler {
        events: Vec<String>,
        reply: Vec<u8>,
    }

    impl EventHandler for RecordingHandler {
        fn handle_event(&mut self, event: NetEvent, conn_manager: &mut dyn ConnManager) {
            match event {
                NetEvent::Connected { handle, .. } => {
                    self.events.push("connected".to_string());
                    handle.write(self.reply.clone());
                }
                NetEvent::DataReceived { data, .. } => {
                    self.events.push(format!("data:{}", String::from_utf8_lossy(&data)));
                }
                NetEvent::ConnectionLost { .. } => {
                    self.events.push("lost".to_string());
                    conn_manager.stop_event_loop();
                }
                NetEvent::ConnectionFailed { .. } => {
                    self.events.push("failed".to_string());
                    conn_manager.stop_event_loop();
                }
            }
        }
    }

    #[test]
    fn test_connect_exchange_and_eof() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        // Peer side: accept, read our greeting, answer, close.
        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut greeting = [0; 5];
            socket.read_exact(&mut greeting).unwrap();
            assert_eq!(&greeting, b"hello");
            socket.write_all(b"world").unwrap();
        });

        let mut manager = ThreadedConnManager::new(Duration::from_secs(3));
        manager.connect_peer(addr);

        let mut handler = RecordingHandler {
            events: vec![],
            reply: b"hello".to_vec(),
        };
        manager.start_event_loop(&mut handler);
        server.join().unwrap();

        assert_eq!(handler.events[0], "connected");
        assert_eq!(handler.events.last().unwrap(), "lost");
        // The reply may arrive in one or more reads.
        let received: String = handler
            .events
            .iter()
            .filter_map(|event| event.strip_prefix("data:"))
            .collect();
        assert_eq!(received, "world");
    }

    #[test]
    fn test_failed_dial_reports_connection_failed() {
        // A port nobody listens on: reserved port 1 on localhost.
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();

        let mut manager = ThreadedConnManager::new(Duration::from_secs(3));
        manager.connect_peer(addr);

        let mut handler = RecordingHandler {
            events: vec![],
            reply: vec![],
        };
        manager.start_event_loop(&mut handler);

        assert_eq!(handler.events, vec!["failed"]);
    }

    #[test]
    fn test_conn_ids_are_unique() {
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let mut manager = ThreadedConnManager::new(Duration::from_millis(100));

        let first = manager.connect_peer(addr);
        let second = manager.connect_peer(addr);

        assert_ne!(first, second);
    }
}
