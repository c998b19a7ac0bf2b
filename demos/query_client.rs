//! Query client for the provider server
//!
//! Walks through the command set: capability query, one-shot GET, a short
//! stream, and a request for a type nobody provides.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example provider_server
//! # in another terminal
//! cargo run --example query_client
//! cargo run --example query_client -- 192.168.1.100:18944
//! ```

use openigtlink_provider::error::{IgtlError, Result};
use openigtlink_provider::io::{DeviceBuilder, IgtlDevice};
use openigtlink_provider::protocol::message::{IgtlMessage, Message};
use openigtlink_provider::protocol::types::{
    CapabilityMessage, GetCapabilityMessage, StartTransformMessage, StopTransformMessage,
    TransformMessage,
};
use openigtlink_provider::protocol::RawMessage;
use std::env;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    if let Err(e) = run().await {
        match e {
            IgtlError::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::ConnectionRefused => {
                eprintln!("[ERROR] Connection refused, start the provider first:");
                eprintln!("  cargo run --example provider_server");
            }
            _ => eprintln!("[ERROR] {}", e),
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let addr = env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:18944".to_string());

    let device = DeviceBuilder::new()
        .tcp(addr.as_str())
        .client()
        .name("QueryClient")
        .connect()
        .await?;
    println!("[1] Connected to {}", addr);

    device.send(&IgtlMessage::new(GetCapabilityMessage, "QueryClient")?).await?;
    let reply = next_reply(&device).await?;
    let caps = reply.decode::<CapabilityMessage>()?;
    println!("[2] Provider supports: {}", caps.content.types.join(", "));

    device.send_message(&RawMessage::empty("GET_TRANS", "")).await?;
    print_transform("[3] Current pose", &next_reply(&device).await?)?;

    let start = StartTransformMessage {
        resolution: 100,
        coordinate_name: "RAS".to_string(),
    };
    device.send(&IgtlMessage::new(start, "QueryClient")?).await?;
    println!("[4] Streaming:");
    for _ in 0..10 {
        print_transform("    pose", &next_reply(&device).await?)?;
    }
    device.send(&IgtlMessage::new(StopTransformMessage, "QueryClient")?).await?;

    // skip poses that were already on the way
    device.send_message(&RawMessage::empty("GET_IMAGE", "")).await?;
    loop {
        let reply = next_reply(&device).await?;
        if reply.type_name() != TransformMessage::message_type() {
            println!("[5] GET_IMAGE answered with {}", reply.type_name());
            break;
        }
    }

    device.close().await;
    info!("Done");
    Ok(())
}

async fn next_reply(device: &IgtlDevice) -> Result<RawMessage> {
    tokio::time::timeout(REPLY_TIMEOUT, device.recv_message())
        .await
        .map_err(|_| IgtlError::Io(std::io::ErrorKind::TimedOut.into()))?
}

fn print_transform(label: &str, msg: &RawMessage) -> Result<()> {
    let transform = msg.decode::<TransformMessage>()?;
    let [x, y, z] = transform.content.position();
    println!("{label}: ({x:7.2}, {y:7.2}, {z:7.2}) from {}", msg.device_name());
    Ok(())
}
