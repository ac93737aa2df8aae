use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Handle;
use tokio::time::timeout;
use writegate::channel::{Channel, TokioDispatch, WritabilityListener};
use writegate::config::{ChannelConfig, Config};
use writegate::error::ChannelError;
use writegate::server::listener::serve;
use writegate::transport::{TcpTransport, Transport};

fn test_config(body_chunks: usize, chunk_size: usize) -> Config {
    let mut cfg = Config::default();
    cfg.server.listen_addr = "127.0.0.1:0".to_string();
    cfg.server.body_chunks = body_chunks;
    cfg.server.chunk_size = chunk_size;
    cfg.channel = ChannelConfig::default().with_buffer_capacity(4096);
    cfg
}

async fn fetch(addr: std::net::SocketAddr) -> Vec<u8> {
    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let mut response = Vec::new();
    timeout(Duration::from_secs(10), client.read_to_end(&mut response))
        .await
        .expect("response timed out")
        .unwrap();
    response
}

fn split_head(response: &[u8]) -> (String, &[u8]) {
    let end = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("missing head terminator");
    let head = String::from_utf8(response[..end].to_vec()).unwrap();
    (head, &response[end + 4..])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_streams_full_body() {
    let cfg = Arc::new(test_config(256, 512));
    let listener = TcpListener::bind(&cfg.server.listen_addr).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, Arc::clone(&cfg)));

    let response = fetch(addr).await;
    let (head, body) = split_head(&response);

    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert!(head.contains("Content-Length: 131072"));
    assert!(head.contains("Connection: close"));
    assert_eq!(body.len(), 256 * 512);
    assert!(body.chunks(512).all(|chunk| chunk[0] == b'a' && chunk[25] == b'z'));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_empty_body() {
    let cfg = Arc::new(test_config(0, 512));
    let listener = TcpListener::bind(&cfg.server.listen_addr).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, Arc::clone(&cfg)));

    let response = fetch(addr).await;
    let (head, body) = split_head(&response);
    assert!(head.contains("Content-Length: 0"));
    assert!(body.is_empty());
}

struct Ignore;

impl WritabilityListener for Ignore {
    fn on_write_possible(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_error(&self, _error: &ChannelError) {}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tcp_transport_nonblocking_write() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).await.unwrap();
    let (mut server_side, _) = listener.accept().await.unwrap();

    let handle = Handle::current();
    let channel = Channel::new(
        TcpTransport::new(client, handle.clone()),
        Arc::new(TokioDispatch::new(handle)),
        &ChannelConfig::default(),
    );
    channel.set_writability_listener(Arc::new(Ignore)).unwrap();

    channel.write(b"over the wire").unwrap();
    assert!(channel.is_ready());
    channel.finish().unwrap();

    let mut received = Vec::new();
    timeout(Duration::from_secs(5), server_side.read_to_end(&mut received))
        .await
        .expect("peer never closed")
        .unwrap();
    assert_eq!(received, b"over the wire");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_closes_connection_when_body_cannot_start() {
    // Chunks twice the buffer size; built directly, so from_yaml's check is
    // bypassed and the first write fails.
    let cfg = Arc::new(test_config(4, 8192));
    let listener = TcpListener::bind(&cfg.server.listen_addr).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, Arc::clone(&cfg)));

    let response = fetch(addr).await;
    let (head, body) = split_head(&response);
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert!(body.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tcp_close_cancels_pending_writable_wait() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).await.unwrap();
    let (mut server_side, _) = listener.accept().await.unwrap();

    let transport = TcpTransport::new(client, Handle::current());
    let chunk = vec![b'q'; 64 * 1024];
    let mut filled = false;
    for _ in 0..4096 {
        if transport.try_send(&chunk).unwrap().would_block {
            filled = true;
            break;
        }
    }
    assert!(filled, "socket never filled up");

    let woke = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&woke);
    transport.on_writable(Arc::new(move || flag.store(true, Ordering::SeqCst)));
    transport.close();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The peer only sees EOF once every handle on the socket is gone.
    let mut received = Vec::new();
    timeout(Duration::from_secs(5), server_side.read_to_end(&mut received))
        .await
        .expect("socket was not released by close")
        .unwrap();
    assert!(!received.is_empty());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!woke.load(Ordering::SeqCst));
}
