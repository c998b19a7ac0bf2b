//! OpenIGTLink provider server
//!
//! Publishes a simulated tracker, a status source and the capability list,
//! then answers GET_/STT_/STP_ commands from every navigation application
//! that connects.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: 0.0.0.0:18944, 100 ms streaming period
//! cargo run --example provider_server
//!
//! # With a TOML configuration file
//! cargo run --example provider_server -- provider.toml
//!
//! # More detail from the transport
//! RUST_LOG=openigtlink_provider=trace cargo run --example provider_server
//! ```
//!
//! Then connect with `cargo run --example query_client` or 3D Slicer.

use openigtlink_provider::config::{ProviderConfig, Role};
use openigtlink_provider::error::Result;
use openigtlink_provider::io::{DeviceListener, IgtlDevice};
use openigtlink_provider::protocol::types::{StatusMessage, TransformMessage};
use openigtlink_provider::protocol::{MessageFactory, RawMessage};
use openigtlink_provider::provider::{
    CapabilitySource, LatestMessageSource, MessageProvider, PollingSource, SourceRegistry,
};
use std::env;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "Provider failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = match env::args().nth(1) {
        Some(path) => ProviderConfig::load(&path)?,
        None => ProviderConfig::default(),
    };
    if config.role == Role::Client {
        warn!("Client role is not supported by this demo, listening instead");
    }

    let registry = Arc::new(SourceRegistry::new());
    let factory = Arc::new(MessageFactory::with_standard_types());

    // Tool moving on a circle of 50 mm
    let started = Instant::now();
    let tracker = Arc::new(PollingSource::new("Tool", "TRANSFORM", move || {
        let t = started.elapsed().as_secs_f32();
        let pose = TransformMessage::translation(50.0 * t.cos(), 50.0 * t.sin(), 0.0);
        Ok(Some(RawMessage::from_content(&pose, "Tool")?))
    }));
    let status = Arc::new(LatestMessageSource::with_content(
        "Robot",
        &StatusMessage::ok("Ready"),
    )?);
    let capability = Arc::new(CapabilitySource::new(
        config.name.as_str(),
        Arc::clone(&registry),
    ));

    let _registrations = [
        registry.publish(&tracker),
        registry.publish(&status),
        registry.publish(&capability),
    ];
    info!(device_types = ?registry.device_types(), "Sources published");

    let listener = DeviceListener::bind(config.address.as_str(), config.device.clone()).await?;

    loop {
        let device = listener.accept().await?;
        let provider = MessageProvider::from_config(&config, Arc::clone(&registry), Arc::clone(&factory));
        tokio::spawn(serve_peer(provider, device));
    }
}

async fn serve_peer(provider: MessageProvider, device: IgtlDevice) {
    let peer = device.peer_addr();
    if let Err(e) = provider.serve(&device).await {
        warn!(peer_addr = ?peer, error = %e, "Serving peer failed");
    }
    device.close().await;
    info!(
        peer_addr = ?peer,
        frames = device.frame_stats().frames,
        corrupt = device.frame_stats().corrupt_frames,
        "Peer done"
    );
}
