//! End-to-end tests over real Unix sockets: connect, echo, limits,
//! timeouts, reconnects and multi-client fan-in.

#![cfg(unix)]

use std::path::PathBuf;
use std::time::Duration;

use latch_core::{
    message, Client, ClientConfig, Connection, Error, Message, PskConfig, Server, ServerConfig,
    Status,
};

const READ_TIMEOUT: Duration = Duration::from_secs(10);

fn psk() -> PskConfig {
    PskConfig::fixed("hello", b"world".to_vec())
}

fn server_config(dir: &PathBuf) -> ServerConfig {
    let mut config = ServerConfig::with_psk(psk());
    config.socket_directory = Some(dir.clone());
    config
}

fn client_config(dir: &PathBuf) -> ClientConfig {
    let mut config = ClientConfig::with_psk(psk());
    config.socket_directory = Some(dir.clone());
    config
}

async fn server_read(server: &Server) -> Result<Message, Error> {
    tokio::time::timeout(READ_TIMEOUT, server.read())
        .await
        .expect("server read timed out")
}

async fn client_read(client: &Client) -> Result<Message, Error> {
    tokio::time::timeout(READ_TIMEOUT, client.read())
        .await
        .expect("client read timed out")
}

/// Read server messages until a `Connected` connection event arrives and
/// return its handle.
async fn accept_connection(server: &Server) -> Connection {
    loop {
        let m = server_read(server).await.unwrap();
        if m.msg_type == message::EVENT && m.status == Status::Connected {
            return m.connection.expect("connection event without handle");
        }
    }
}

/// Read client messages until the given status is announced.
async fn await_status(client: &Client, status: Status) {
    loop {
        let m = client_read(client).await.unwrap();
        if m.msg_type == message::STATUS_UPDATE && m.status == status {
            return;
        }
    }
}

#[tokio::test]
async fn connect_echo_close() {
    let dir = tempfile::tempdir().unwrap();
    let dir = dir.path().to_path_buf();

    let server = Server::start("t1", server_config(&dir)).unwrap();
    let client = Client::start("t1", client_config(&dir)).unwrap();

    let connection = accept_connection(&server).await;
    await_status(&client, Status::Connected).await;

    // Client -> server.
    client.write(5, b"ping").await.unwrap();
    let m = loop {
        let m = server_read(&server).await.unwrap();
        if m.msg_type > 0 {
            break m;
        }
    };
    assert_eq!(m.msg_type, 5);
    assert_eq!(m.data, b"ping");
    assert!(m.connection.is_some());
    assert_eq!(m.status, Status::Connected);

    // Server -> client.
    connection.write(7, b"pong").await.unwrap();
    let m = loop {
        let m = client_read(&client).await.unwrap();
        if m.msg_type > 0 {
            break m;
        }
    };
    assert_eq!(m.msg_type, 7);
    assert_eq!(m.data, b"pong");

    // Client close: the server observes the connection going down.
    client.close();
    loop {
        let m = server_read(&server).await.unwrap();
        if m.msg_type == message::STATUS_UPDATE && m.status == Status::Closed {
            assert!(m.connection.is_some());
            break;
        }
    }
}

#[tokio::test]
async fn reserved_type_is_rejected_locally() {
    let dir = tempfile::tempdir().unwrap();
    let dir = dir.path().to_path_buf();

    let server = Server::start("t2", server_config(&dir)).unwrap();
    let client = Client::start("t2", client_config(&dir)).unwrap();

    let connection = accept_connection(&server).await;
    await_status(&client, Status::Connected).await;

    let err = client.write(0, &[0x01]).await.unwrap_err();
    assert_eq!(err.to_string(), "Message type 0 is reserved");
    let err = connection.write(0, &[0x01]).await.unwrap_err();
    assert_eq!(err.to_string(), "Message type 0 is reserved");

    // Nothing reached the peer: a real message arrives first.
    client.write(3, b"after").await.unwrap();
    let m = loop {
        let m = server_read(&server).await.unwrap();
        if m.msg_type > 0 {
            break m;
        }
    };
    assert_eq!(m.msg_type, 3);
    assert_eq!(m.data, b"after");
}

#[tokio::test]
async fn oversize_write_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let dir = dir.path().to_path_buf();

    let server = Server::start("t3", server_config(&dir)).unwrap();
    let client = Client::start("t3", client_config(&dir)).unwrap();

    let connection = accept_connection(&server).await;
    await_status(&client, Status::Connected).await;

    // The client adopted the server's advertised maximum at handshake.
    let body = vec![0u8; latch_core::DEFAULT_MAX_MSG_SIZE + 5];
    let err = client.write(2, &body).await.unwrap_err();
    assert_eq!(err.to_string(), "Message exceeds maximum message length");
    let err = connection.write(2, &body).await.unwrap_err();
    assert_eq!(err.to_string(), "Message exceeds maximum message length");
}

#[tokio::test]
async fn configured_max_msg_size_is_adopted_by_client() {
    let dir = tempfile::tempdir().unwrap();
    let dir = dir.path().to_path_buf();

    let mut config = server_config(&dir);
    config.max_msg_size = 2048;
    let server = Server::start("t3b", config).unwrap();
    let client = Client::start("t3b", client_config(&dir)).unwrap();

    accept_connection(&server).await;
    await_status(&client, Status::Connected).await;

    client.write(2, &vec![0u8; 2048]).await.unwrap();
    let err = client.write(2, &vec![0u8; 2049]).await.unwrap_err();
    assert_eq!(err.to_string(), "Message exceeds maximum message length");
}

#[tokio::test]
async fn connect_timeout_without_server() {
    let dir = tempfile::tempdir().unwrap();
    let dir = dir.path().to_path_buf();

    let mut config = client_config(&dir);
    config.timeout = Some(Duration::from_secs(2));
    config.retry_timer = Duration::from_secs(1);

    let client = Client::start("t4", config).unwrap();

    let err = loop {
        match client_read(&client).await {
            Ok(m) => assert!(m.is_synthetic()),
            Err(err) => break err,
        }
    };
    assert_eq!(err.to_string(), "Timed out trying to connect");

    // Terminal: the channel is now closed.
    let err = client_read(&client).await.unwrap_err();
    assert_eq!(err.to_string(), "the recieve channel has been closed");
}

#[tokio::test]
async fn client_reconnects_when_server_returns() {
    let dir = tempfile::tempdir().unwrap();
    let dir = dir.path().to_path_buf();

    let server = Server::start("t5", server_config(&dir)).unwrap();
    let client = Client::start("t5", client_config(&dir)).unwrap();

    let connection = accept_connection(&server).await;
    await_status(&client, Status::Connected).await;

    // Tear the server down; the client observes EOF and starts dialing.
    server.close();
    connection.close().await;
    await_status(&client, Status::ReConnecting).await;

    tokio::time::sleep(Duration::from_millis(250)).await;
    let server = Server::start("t5", server_config(&dir)).unwrap();
    let connection = accept_connection(&server).await;
    await_status(&client, Status::Connected).await;

    // Frames flow again after the reconnect.
    connection.write(3, b"back").await.unwrap();
    let m = loop {
        let m = client_read(&client).await.unwrap();
        if m.msg_type > 0 {
            break m;
        }
    };
    assert_eq!(m.msg_type, 3);
    assert_eq!(m.data, b"back");
}

#[tokio::test]
async fn reconnect_times_out_without_server() {
    let dir = tempfile::tempdir().unwrap();
    let dir = dir.path().to_path_buf();

    let server = Server::start("t6", server_config(&dir)).unwrap();
    let mut config = client_config(&dir);
    config.timeout = Some(Duration::from_secs(2));
    config.retry_timer = Duration::from_secs(1);
    let client = Client::start("t6", config).unwrap();

    let connection = accept_connection(&server).await;
    await_status(&client, Status::Connected).await;

    server.close();
    connection.close().await;

    let mut saw_reconnecting = false;
    let mut saw_timeout = false;
    let err = loop {
        match client_read(&client).await {
            Ok(m) => {
                if m.status == Status::ReConnecting {
                    saw_reconnecting = true;
                }
                if m.status == Status::Timeout {
                    saw_timeout = true;
                }
            }
            Err(err) => break err,
        }
    };
    assert!(saw_reconnecting);
    assert!(saw_timeout);
    assert_eq!(err.to_string(), "Timed out trying to re-connect");

    let err = client_read(&client).await.unwrap_err();
    assert_eq!(err.to_string(), "the recieve channel has been closed");
}

#[tokio::test]
async fn local_close_is_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let dir = dir.path().to_path_buf();

    let server = Server::start("t7", server_config(&dir)).unwrap();
    let client = Client::start("t7", client_config(&dir)).unwrap();

    accept_connection(&server).await;
    await_status(&client, Status::Connected).await;

    client.close();
    await_status(&client, Status::Closed).await;

    let err = client_read(&client).await.unwrap_err();
    assert_eq!(err.to_string(), "Client has closed the Connection");

    // Every read after the failure yields the sentinel.
    for _ in 0..2 {
        let err = client_read(&client).await.unwrap_err();
        assert_eq!(err.to_string(), "the recieve channel has been closed");
    }

    let err = client.write(1, b"x").await.unwrap_err();
    assert_eq!(err.to_string(), "Closed");
}

#[tokio::test]
async fn two_clients_fan_into_one_channel() {
    let dir = tempfile::tempdir().unwrap();
    let dir = dir.path().to_path_buf();

    let server = Server::start("t8", server_config(&dir)).unwrap();

    let client_a = Client::start("t8", client_config(&dir)).unwrap();
    accept_connection(&server).await;
    await_status(&client_a, Status::Connected).await;

    let client_b = Client::start("t8", client_config(&dir)).unwrap();
    accept_connection(&server).await;
    await_status(&client_b, Status::Connected).await;

    client_a.write(1, &[1]).await.unwrap();
    client_b.write(1, &[2]).await.unwrap();

    let mut bodies = Vec::new();
    while bodies.len() < 2 {
        let m = server_read(&server).await.unwrap();
        if m.msg_type == 1 {
            assert!(m.connection.is_some());
            bodies.push(m.data[0]);
        }
    }
    bodies.sort_unstable();
    assert_eq!(bodies, [1, 2]);
}

#[tokio::test]
async fn messages_preserve_wire_order() {
    let dir = tempfile::tempdir().unwrap();
    let dir = dir.path().to_path_buf();

    let server = Server::start("t9", server_config(&dir)).unwrap();
    let client = Client::start("t9", client_config(&dir)).unwrap();

    accept_connection(&server).await;
    await_status(&client, Status::Connected).await;

    for i in 0..20u8 {
        client.write(9, &[i]).await.unwrap();
    }

    let mut next = 0u8;
    while next < 20 {
        let m = server_read(&server).await.unwrap();
        if m.msg_type == 9 {
            assert_eq!(m.data, [next]);
            next += 1;
        }
    }
}

#[tokio::test]
async fn mismatched_keys_fail_both_sides() {
    let dir = tempfile::tempdir().unwrap();
    let dir = dir.path().to_path_buf();

    let server = Server::start("t10", server_config(&dir)).unwrap();

    let mut config = client_config(&dir);
    config.psk_config = Some(PskConfig::fixed("hello", b"wrong".to_vec()));
    let client = Client::start("t10", config).unwrap();

    let server_err = loop {
        match server_read(&server).await {
            Ok(m) => assert!(m.is_synthetic()),
            Err(err) => break err,
        }
    };
    assert!(matches!(server_err, Error::Tls(_)));

    let client_err = loop {
        match client_read(&client).await {
            Ok(m) => assert!(m.is_synthetic()),
            Err(err) => break err,
        }
    };
    assert!(matches!(client_err, Error::Tls(_)));

    // The server endpoint survives a rejected peer.
    assert_eq!(server.status(), Status::Listening);
}
