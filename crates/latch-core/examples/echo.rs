//! Echo demo.
//!
//! Run the server in one terminal and any number of clients in others:
//!
//! ```text
//! cargo run --example echo -- server
//! cargo run --example echo -- client
//! ```
//!
//! Both sides authenticate with the demo identity `hello` / key `world`.

use std::time::Duration;

use latch_core::{Client, ClientConfig, PskConfig, Server, ServerConfig, Status};

const ENDPOINT: &str = "latch-echo";

fn psk() -> PskConfig {
    PskConfig::fixed("hello", b"world".to_vec())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    match std::env::args().nth(1).as_deref() {
        Some("server") => run_server().await,
        Some("client") => run_client().await,
        _ => {
            eprintln!("usage: echo <server|client>");
            std::process::exit(2);
        }
    }
}

async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    let server = Server::start(ENDPOINT, ServerConfig::with_psk(psk()))?;

    loop {
        let message = server.read().await?;
        if message.msg_type > 0 {
            println!(
                "server received type {}: {}",
                message.msg_type,
                String::from_utf8_lossy(&message.data)
            );
            if let Some(connection) = &message.connection {
                connection.write(message.msg_type, &message.data).await?;
            }
        } else {
            println!("server event: {}", message.status);
        }
    }
}

async fn run_client() -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::start(ENDPOINT, ClientConfig::with_psk(psk()))?;

    loop {
        let message = client.read().await?;
        if message.status == Status::Connected {
            break;
        }
    }

    for i in 1..=5u32 {
        let payload = format!("ping {i}");
        client.write(5, payload.as_bytes()).await?;

        let message = client.read().await?;
        if message.msg_type > 0 {
            println!(
                "client received type {}: {}",
                message.msg_type,
                String::from_utf8_lossy(&message.data)
            );
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    client.close();
    Ok(())
}
