//! End-to-end tests for the session server.
//!
//! The first group drives the dispatcher directly with in-memory player
//! handles; the second goes through a real socket, the upgrade handshake and
//! the frame codec.

use game_server::connection::{Outgoing, PlayerHandle};
use game_server::protocol::handshake::CIPHER_PROTOCOL;
use game_server::protocol::{derive_key, Frame, OpCode, PayloadCipher, Role};
use game_server::session::SessionRegistry;
use game_server::{Dispatcher, GameServer, GameSettings, MemoryStore, ServerConfig, UserProfile};
use go_logic::{BoardSnapshot, Marker, LIVE_SEPARATOR};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{timeout, Duration};

const SAMPLE_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

fn users() -> Vec<UserProfile> {
    ["ann", "bob"]
        .into_iter()
        .map(|name| UserProfile {
            token: format!("tok-{name}"),
            name: name.to_string(),
            rating: 1500,
        })
        .collect()
}

fn drain(receiver: &mut UnboundedReceiver<Outgoing>) -> Vec<String> {
    let mut texts = Vec::new();
    while let Ok(message) = receiver.try_recv() {
        if let Outgoing::Text(text) = message {
            texts.push(text);
        }
    }
    texts
}

#[tokio::test]
async fn test_full_game_capture_double_pass_and_rating() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let store = Arc::new(MemoryStore::with_users(users()));
    let dispatcher = Dispatcher::new(
        Arc::new(SessionRegistry::new()),
        store.clone(),
        GameSettings::default(),
    );
    let (ann, mut ann_rx) = PlayerHandle::channel();
    let (bob, mut bob_rx) = PlayerHandle::channel();

    dispatcher.dispatch(&ann, "Create_custom/0/tok-ann,9,area").await;
    dispatcher.dispatch(&bob, "Join_custom/1/tok-bob").await;
    assert_eq!(drain(&mut ann_rx), vec!["1/Created:custom", "1/Start:bob:Black"]);
    assert_eq!(drain(&mut bob_rx), vec!["1/Joined", "1/Start:ann:White"]);
    assert_eq!(store.game_count(), 1);

    dispatcher.dispatch(&ann, "Place_custom/1/1,0").await;
    dispatcher.dispatch(&bob, "Place_custom/1/0,0").await;
    dispatcher.dispatch(&ann, "Place_custom/1/0,1").await;

    let moves = drain(&mut bob_rx);
    assert_eq!(moves.len(), 3);
    assert_eq!(moves, drain(&mut ann_rx));

    let capture = moves[2].strip_prefix("1/Move:").unwrap();
    let (millis, board) = capture.split_once(LIVE_SEPARATOR).unwrap();
    assert!(millis.parse::<u64>().unwrap() <= 600_000);
    let snapshot = BoardSnapshot::decode(board, LIVE_SEPARATOR).unwrap();
    assert_eq!(snapshot.captured_by_black, 1);
    assert_eq!(snapshot.marker(0, 0), Some(Marker::Empty));
    assert_eq!(snapshot.marker(0, 1), Some(Marker::Black));

    dispatcher.dispatch(&bob, "Skip_custom/1/").await;
    dispatcher.dispatch(&ann, "Skip_custom/1/").await;

    let ann_texts = drain(&mut ann_rx);
    let bob_texts = drain(&mut bob_rx);
    assert!(ann_texts[0].starts_with("1/Skip:"));
    assert_eq!(ann_texts.last().unwrap(), "1/EndOfGame:81-0|true");
    assert_eq!(bob_texts.last().unwrap(), "1/EndOfGame:0-81|false");

    assert_eq!(
        store.rating_updates().await,
        vec![("tok-ann".to_string(), 1516), ("tok-bob".to_string(), 1484)]
    );

    dispatcher.dispatch(&bob, "Place_custom/1/5,5").await;
    assert!(drain(&mut bob_rx)[0].starts_with("1/Error:GameOver:"));
    assert_eq!(store.rating_updates().await.len(), 2);
}

#[tokio::test]
async fn test_clock_watchdog_ends_idle_game() {
    let store = Arc::new(MemoryStore::with_users(users()));
    let settings = GameSettings {
        main_time: Duration::from_millis(50),
        ..GameSettings::default()
    };
    let dispatcher = Dispatcher::new(Arc::new(SessionRegistry::new()), store.clone(), settings);
    let (ann, mut ann_rx) = PlayerHandle::channel();
    let (bob, mut bob_rx) = PlayerHandle::channel();

    dispatcher.dispatch(&ann, "Create_matchmaking/0/tok-ann,13,territory").await;
    dispatcher.dispatch(&bob, "Create_matchmaking/0/tok-bob,13,territory").await;
    drain(&mut ann_rx);
    drain(&mut bob_rx);

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(drain(&mut ann_rx), vec!["1/Timeout:Black", "1/EndOfGame:0-0|false"]);
    assert_eq!(drain(&mut bob_rx), vec!["1/Timeout:Black", "1/EndOfGame:0-0|true"]);
    assert_eq!(store.rating_updates().await[0], ("tok-bob".to_string(), 1516));
}

async fn spawn_server(shared_secret: Option<&str>) -> (Arc<GameServer>, SocketAddr) {
    let mut config = ServerConfig {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        ..ServerConfig::default()
    };
    config.protocol.shared_secret = shared_secret.map(str::to_string);

    let server = Arc::new(GameServer::new(config, Arc::new(MemoryStore::with_users(users()))));
    let runner = server.clone();
    tokio::spawn(async move { runner.start().await });

    let addr = timeout(Duration::from_secs(5), server.local_addr())
        .await
        .unwrap()
        .unwrap();
    (server, addr)
}

async fn read_head(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte).await.unwrap() == 0 {
            break;
        }
        head.push(byte[0]);
    }
    String::from_utf8(head).unwrap()
}

async fn read_frame(stream: &mut TcpStream, buffer: &mut Vec<u8>) -> Frame {
    let mut chunk = [0u8; 1024];
    loop {
        if let Some((frame, used)) = Frame::decode(buffer, 1 << 20, false).unwrap() {
            buffer.drain(..used);
            return frame;
        }
        let read = timeout(Duration::from_secs(5), stream.read(&mut chunk))
            .await
            .unwrap()
            .unwrap();
        assert!(read > 0, "server closed the socket early");
        buffer.extend_from_slice(&chunk[..read]);
    }
}

async fn connect(addr: SocketAddr, protocol: Option<&str>) -> (TcpStream, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut request = format!(
        "GET /game HTTP/1.1\r\nHost: {addr}\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
         Sec-WebSocket-Key: {SAMPLE_KEY}\r\nSec-WebSocket-Version: 13\r\n"
    );
    if let Some(protocol) = protocol {
        request.push_str(&format!("Sec-WebSocket-Protocol: {protocol}\r\n"));
    }
    request.push_str("\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let head = read_head(&mut stream).await;
    (stream, head)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_socket_handshake_command_and_close() {
    let (server, addr) = spawn_server(None).await;
    let (mut stream, head) = connect(addr, None).await;
    assert!(head.starts_with("HTTP/1.1 101 Switching Protocols"));
    assert!(head.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));

    let mut buffer = Vec::new();
    let command = Frame::text("Create_custom/0/tok-ann,9,area");
    stream.write_all(&command.encode_masked([7, 1, 9, 3])).await.unwrap();
    let reply = read_frame(&mut stream, &mut buffer).await;
    assert_eq!(reply.opcode, OpCode::Text);
    assert_eq!(reply.payload, b"1/Created:custom");

    let ping = Frame::new(OpCode::Ping, b"hi".to_vec());
    stream.write_all(&ping.encode_masked([1, 2, 3, 4])).await.unwrap();
    let pong = read_frame(&mut stream, &mut buffer).await;
    assert_eq!(pong.opcode, OpCode::Pong);
    assert_eq!(pong.payload, b"hi");

    stream.write_all(&Frame::close(Some(1000)).encode_masked([0, 0, 0, 1])).await.unwrap();
    let close = read_frame(&mut stream, &mut buffer).await;
    assert_eq!(close.opcode, OpCode::Close);
    assert_eq!(close.close_code(), Some(1000));

    // The waiting seat was freed when the connection closed.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let session = server
        .registry()
        .get(game_server::session::SessionKind::Custom, 1)
        .unwrap();
    assert!(session.lock().await.user(0).is_none());
    server.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unmasked_client_frame_is_rejected() {
    let (server, addr) = spawn_server(None).await;
    let (mut stream, _) = connect(addr, None).await;

    stream.write_all(&Frame::text("States_custom/1/").encode()).await.unwrap();
    let mut buffer = Vec::new();
    let close = read_frame(&mut stream, &mut buffer).await;
    assert_eq!(close.close_code(), Some(1002));
    server.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_non_upgrade_request_gets_bad_request() {
    let (server, addr) = spawn_server(None).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"POST / HTTP/1.1\r\n\r\n").await.unwrap();

    let head = read_head(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 400 Bad Request"));
    server.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_encrypted_session() {
    let secret = "correct horse battery staple";
    let (server, addr) = spawn_server(Some(secret)).await;
    let (mut stream, head) = connect(addr, Some(CIPHER_PROTOCOL)).await;
    assert!(head.contains(&format!("Sec-WebSocket-Protocol: {CIPHER_PROTOCOL}")));

    let (mut outbound, mut inbound) = PayloadCipher::pair(Role::Client, &derive_key(secret, SAMPLE_KEY));
    let sealed = outbound.seal("Create_matchmaking/0/tok-bob,19,area").unwrap();
    assert!(!sealed.contains("Create"));
    stream.write_all(&Frame::text(&sealed).encode_masked([9, 9, 9, 9])).await.unwrap();

    let mut buffer = Vec::new();
    let reply = read_frame(&mut stream, &mut buffer).await;
    let text = String::from_utf8(reply.payload).unwrap();
    assert_eq!(inbound.open(&text).unwrap(), "1/Created:matchmaking");
    server.shutdown().await.unwrap();
}
