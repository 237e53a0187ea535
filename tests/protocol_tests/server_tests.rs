use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use segmentkv::network::{Server, ShutdownHandle};
use segmentkv::protocol::{read_response, write_command, Command, Response, Status};
use segmentkv::{Config, Engine};
use tempfile::TempDir;

struct Running {
    addr: SocketAddr,
    shutdown: ShutdownHandle,
    handle: Option<JoinHandle<()>>,
    engine: Arc<Engine>,
    _temp: TempDir,
}

impl Drop for Running {
    fn drop(&mut self) {
        self.shutdown.shutdown();
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
    }
}

fn start(max_connections: usize) -> Running {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp.path())
        .listen_addr("127.0.0.1:0")
        .max_connections(max_connections)
        .build();
    let engine = Arc::new(Engine::open(config.clone()).unwrap());

    let server = Server::bind(config, Arc::clone(&engine)).unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = server.shutdown_handle();
    let handle = thread::spawn(move || server.run().unwrap());

    Running {
        addr,
        shutdown,
        handle: Some(handle),
        engine,
        _temp: temp,
    }
}

fn connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream
}

fn request(stream: &mut TcpStream, command: Command) -> Response {
    write_command(stream, &command).unwrap();
    read_response(stream).unwrap()
}

fn put(stream: &mut TcpStream, key: &str, value: &str) {
    let command = Command::Put {
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    };
    let response = request(stream, command);
    assert_eq!(response.status, Status::Ok, "PUT {} {}: {}", key, value, response.payload_text());
}

#[test]
fn test_put_get_over_tcp() {
    let server = start(8);
    let mut stream = connect(server.addr);

    put(&mut stream, "mario", "caster");

    let get = request(&mut stream, Command::Get { key: b"mario".to_vec() });
    assert_eq!(get.payload.as_deref(), Some(&b"caster"[..]));

    let missing = request(&mut stream, Command::Get { key: b"luigi".to_vec() });
    assert_eq!(missing.status, Status::NotFound);

    assert_eq!(server.engine.get("mario").unwrap(), Some(b"caster".to_vec()));
}

#[test]
fn test_flush_compact_ping_over_tcp() {
    let server = start(8);
    let mut stream = connect(server.addr);

    assert_eq!(request(&mut stream, Command::Ping).payload_text(), "PONG");

    put(&mut stream, "a", "one");
    let flush = request(&mut stream, Command::Flush);
    assert_eq!(flush.status, Status::Ok);
    assert_eq!(flush.payload_text(), "1 segment(s) written");

    put(&mut stream, "b", "two");
    assert_eq!(request(&mut stream, Command::Flush).status, Status::Ok);
    let compact = request(&mut stream, Command::Compact);
    assert_eq!(compact.payload_text(), "2 segment(s) merged into 1");
    assert_eq!(server.engine.segment_count(), 1);
    assert_eq!(server.engine.get("a").unwrap(), Some(b"one".to_vec()));
    assert_eq!(server.engine.get("b").unwrap(), Some(b"two".to_vec()));
}

#[test]
fn test_invalid_put_returns_error_and_keeps_connection() {
    let server = start(8);
    let mut stream = connect(server.addr);

    let bad = request(&mut stream, Command::Put { key: b"two words".to_vec(), value: b"v".to_vec() });
    assert_eq!(bad.status, Status::Error);

    assert_eq!(request(&mut stream, Command::Ping).status, Status::Ok);
}

#[test]
fn test_connections_over_limit_are_refused() {
    let server = start(1);
    let mut first = connect(server.addr);
    // make sure the first connection is being served
    assert_eq!(request(&mut first, Command::Ping).status, Status::Ok);

    let mut second = connect(server.addr);
    let refused = read_response(&mut second).unwrap();
    assert_eq!(refused.status, Status::Error);
    assert_eq!(refused.payload_text(), "too many connections");
}

#[test]
fn test_many_clients() {
    let server = start(16);

    let clients: Vec<_> = (0..4)
        .map(|c| {
            let addr = server.addr;
            thread::spawn(move || {
                let mut stream = connect(addr);
                for i in 0..20 {
                    let key = format!("c{}k{}", c, i);
                    put(&mut stream, &key, "v1");
                    let get = request(&mut stream, Command::Get { key: key.into_bytes() });
                    assert_eq!(get.payload.as_deref(), Some(&b"v1"[..]));
                }
            })
        })
        .collect();

    for client in clients {
        client.join().unwrap();
    }
    assert_eq!(server.engine.memtable_entry_count(), 80);
}
