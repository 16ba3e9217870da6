//! Byte-exact protocol scenarios against a started server, driven over a
//! raw TCP stream.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use resp_server::server::{Config, Server};
use resp_server::store::Store;

/// Starts a store-backed server on an ephemeral port. The server is
/// returned so it stays alive for the duration of the test.
async fn start_server() -> (Server, TcpStream) {
    let mut server = Server::new(Config {
        addr: "127.0.0.1".to_string(),
        port: 0,
        ..Config::default()
    });
    server.set_command_handler(Arc::new(Store::new()));
    server.start().await.unwrap();

    let addr = server.local_addr().unwrap();
    let stream = TcpStream::connect(addr).await.unwrap();

    (server, stream)
}

/// Encodes a command as the array-of-bulk-strings request clients send.
fn encode_command(parts: &[&str]) -> Vec<u8> {
    let mut bytes = format!("*{}\r\n", parts.len()).into_bytes();
    for part in parts {
        bytes.extend_from_slice(format!("${}\r\n", part.len()).as_bytes());
        bytes.extend_from_slice(part.as_bytes());
        bytes.extend_from_slice(b"\r\n");
    }
    bytes
}

async fn send(stream: &mut TcpStream, bytes: &[u8]) {
    stream.write_all(bytes).await.unwrap();
}

/// Reads exactly as many bytes as the expectation and compares them.
async fn expect_reply(stream: &mut TcpStream, expected: &[u8]) {
    let mut actual = vec![0u8; expected.len()];
    stream.read_exact(&mut actual).await.unwrap();

    assert_eq!(
        actual,
        expected,
        "expected {:?}, got {:?}",
        String::from_utf8_lossy(expected),
        String::from_utf8_lossy(&actual)
    );
}

#[tokio::test]
async fn echo_replies_with_the_payload() {
    let (_server, mut stream) = start_server().await;

    send(&mut stream, b"*2\r\n$4\r\nECHO\r\n$12\r\nHello World!\r\n").await;
    expect_reply(&mut stream, b"$12\r\nHello World!\r\n").await;
}

#[tokio::test]
async fn set_then_get_round_trips() {
    let (_server, mut stream) = start_server().await;

    send(&mut stream, &encode_command(&["SET", "key_set", "value2"])).await;
    expect_reply(&mut stream, b"+OK\r\n").await;

    send(&mut stream, &encode_command(&["GET", "key_set"])).await;
    expect_reply(&mut stream, b"$6\r\nvalue2\r\n").await;
}

#[tokio::test]
async fn setnx_writes_only_the_first_value() {
    let (_server, mut stream) = start_server().await;

    send(&mut stream, &encode_command(&["SETNX", "key_setnx", "value0"])).await;
    expect_reply(&mut stream, b":1\r\n").await;

    send(&mut stream, &encode_command(&["SETNX", "key_setnx", "value1"])).await;
    expect_reply(&mut stream, b":0\r\n").await;

    send(&mut stream, &encode_command(&["GET", "key_setnx"])).await;
    expect_reply(&mut stream, b"$6\r\nvalue0\r\n").await;
}

#[tokio::test]
async fn getset_on_absent_key_returns_null_bulk() {
    let (_server, mut stream) = start_server().await;

    send(&mut stream, &encode_command(&["GETSET", "key_getset", "value0"])).await;
    expect_reply(&mut stream, b"$-1\r\n").await;

    send(&mut stream, &encode_command(&["GETSET", "key_getset", "value1"])).await;
    expect_reply(&mut stream, b"$6\r\nvalue0\r\n").await;
}

#[tokio::test]
async fn mset_then_mget_preserves_order() {
    let (_server, mut stream) = start_server().await;

    send(
        &mut stream,
        &encode_command(&["MSET", "key1_mset", "Hello", "key2_mset", "World"]),
    )
    .await;
    expect_reply(&mut stream, b"+OK\r\n").await;

    send(&mut stream, &encode_command(&["MGET", "key1_mset", "key2_mset"])).await;
    expect_reply(&mut stream, b"*2\r\n$5\r\nHello\r\n$5\r\nWorld\r\n").await;
}

#[tokio::test]
async fn hset_then_hget_round_trips() {
    let (_server, mut stream) = start_server().await;

    send(&mut stream, &encode_command(&["HSET", "key_hset", "key1", "Hello"])).await;
    expect_reply(&mut stream, b":1\r\n").await;

    send(&mut stream, &encode_command(&["HGET", "key_hset", "key1"])).await;
    expect_reply(&mut stream, b"$5\r\nHello\r\n").await;
}

#[tokio::test]
async fn quit_replies_then_closes_the_connection() {
    let (_server, mut stream) = start_server().await;

    send(&mut stream, &encode_command(&["QUIT"])).await;
    expect_reply(&mut stream, b"+OK\r\n").await;

    // Subsequent reads observe EOF.
    let mut rest = Vec::new();
    let n = stream.read_to_end(&mut rest).await.unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn unknown_command_keeps_the_connection_open() {
    let (_server, mut stream) = start_server().await;

    send(&mut stream, b"*1\r\n$6\r\nNOSUCH\r\n").await;
    expect_reply(&mut stream, b"-ERR unknown command 'NOSUCH'\r\n").await;

    send(&mut stream, &encode_command(&["PING"])).await;
    expect_reply(&mut stream, b"+PONG\r\n").await;
}

#[tokio::test]
async fn missing_argument_names_the_verb_and_parameter() {
    let (_server, mut stream) = start_server().await;

    send(&mut stream, &encode_command(&["SET", "key"])).await;
    expect_reply(&mut stream, b"-ERR missing argument 'value' for 'SET' command\r\n").await;
}

#[tokio::test]
async fn non_array_frames_are_dropped_silently() {
    let (_server, mut stream) = start_server().await;

    // A top-level simple string produces no response; the next command
    // still works.
    send(&mut stream, b"+hello\r\n").await;
    send(&mut stream, &encode_command(&["PING"])).await;
    expect_reply(&mut stream, b"+PONG\r\n").await;
}

#[tokio::test]
async fn fragmented_request_is_reassembled() {
    let (_server, mut stream) = start_server().await;

    let request = encode_command(&["ECHO", "Hello World!"]);
    for chunk in request.chunks(3) {
        send(&mut stream, chunk).await;
        stream.flush().await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
    }

    expect_reply(&mut stream, b"$12\r\nHello World!\r\n").await;
}

#[tokio::test]
async fn pipelined_requests_are_answered_in_order() {
    let (_server, mut stream) = start_server().await;

    let mut batch = Vec::new();
    batch.extend_from_slice(&encode_command(&["SET", "k", "v"]));
    batch.extend_from_slice(&encode_command(&["GET", "k"]));
    batch.extend_from_slice(&encode_command(&["PING"]));
    send(&mut stream, &batch).await;

    expect_reply(&mut stream, b"+OK\r\n$1\r\nv\r\n+PONG\r\n").await;
}

#[tokio::test]
async fn select_scopes_keys_to_a_database() {
    let (_server, mut stream) = start_server().await;

    send(&mut stream, &encode_command(&["SELECT", "1"])).await;
    expect_reply(&mut stream, b"+OK\r\n").await;

    send(&mut stream, &encode_command(&["SET", "key", "db1"])).await;
    expect_reply(&mut stream, b"+OK\r\n").await;

    send(&mut stream, &encode_command(&["SELECT", "0"])).await;
    expect_reply(&mut stream, b"+OK\r\n").await;

    send(&mut stream, &encode_command(&["GET", "key"])).await;
    expect_reply(&mut stream, b"$-1\r\n").await;
}

#[tokio::test]
async fn set_family_counts_members() {
    let (_server, mut stream) = start_server().await;

    send(&mut stream, &encode_command(&["SADD", "s", "a", "b", "a"])).await;
    expect_reply(&mut stream, b":2\r\n").await;

    send(&mut stream, &encode_command(&["SMEMBERS", "s"])).await;
    expect_reply(&mut stream, b"*2\r\n$1\r\na\r\n$1\r\nb\r\n").await;

    send(&mut stream, &encode_command(&["SREM", "s", "a", "z"])).await;
    expect_reply(&mut stream, b":1\r\n").await;

    send(&mut stream, &encode_command(&["SMEMBERS", "s"])).await;
    expect_reply(&mut stream, b"*1\r\n$1\r\nb\r\n").await;
}

#[tokio::test]
async fn nested_request_arrays_are_unwrapped() {
    let (_server, mut stream) = start_server().await;

    // The ECHO request wrapped in an outer array dispatches normally.
    let inner = encode_command(&["ECHO", "nested"]);
    let mut request = b"*1\r\n".to_vec();
    request.extend_from_slice(&inner);
    send(&mut stream, &request).await;

    expect_reply(&mut stream, b"$6\r\nnested\r\n").await;
}

#[tokio::test]
async fn stop_lets_sessions_finish_their_current_request() {
    let (mut server, mut stream) = start_server().await;

    send(&mut stream, &encode_command(&["PING"])).await;
    expect_reply(&mut stream, b"+PONG\r\n").await;

    server.stop().await.unwrap();

    // The shutdown signal closes the idle session; reads observe EOF.
    let mut rest = Vec::new();
    let n = stream.read_to_end(&mut rest).await.unwrap();
    assert_eq!(n, 0);
}
