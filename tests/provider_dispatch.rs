//! End-to-end command handling
//!
//! A provider serves one side of an in-memory stream; the test plays the
//! navigation application on the other side.

use openigtlink_provider::io::{DeviceConfig, IgtlDevice};
use openigtlink_provider::protocol::types::{
    CapabilityMessage, RtsStatusMessage, StatusMessage, TransformMessage, RTS_NOT_AVAILABLE,
};
use openigtlink_provider::protocol::{MessageFactory, RawMessage};
use openigtlink_provider::provider::{
    CapabilitySource, Dispatch, LatestMessageSource, MessageProvider, SourceRegistry,
};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    registry: Arc<SourceRegistry>,
    provider: Arc<MessageProvider>,
    server: Arc<IgtlDevice>,
    peer: IgtlDevice,
}

fn harness() -> Harness {
    let registry = Arc::new(SourceRegistry::new());
    let factory = Arc::new(MessageFactory::with_standard_types());
    let provider = Arc::new(
        MessageProvider::new(Arc::clone(&registry), factory)
            .with_name("Provider")
            .with_stream_interval(Duration::from_millis(10)),
    );

    let (a, b) = tokio::io::duplex(64 * 1024);
    let server = Arc::new(IgtlDevice::from_io(
        a,
        DeviceConfig {
            name: "Provider".to_string(),
            ..DeviceConfig::default()
        },
    ));
    let peer = IgtlDevice::from_io(
        b,
        DeviceConfig {
            name: "Navigation".to_string(),
            ..DeviceConfig::default()
        },
    );

    Harness {
        registry,
        provider,
        server,
        peer,
    }
}

impl Harness {
    fn serve(&self) -> tokio::task::JoinHandle<()> {
        let provider = Arc::clone(&self.provider);
        let server = Arc::clone(&self.server);
        tokio::spawn(async move {
            provider.serve(&server).await.unwrap();
        })
    }

    async fn ask(&self, type_name: &str) {
        self.peer
            .send_message(&RawMessage::empty(type_name, ""))
            .await
            .unwrap();
    }

    async fn reply(&self) -> RawMessage {
        tokio::time::timeout(WAIT, self.peer.recv_message())
            .await
            .expect("no reply in time")
            .unwrap()
    }

    async fn any_reply(&self) -> Option<RawMessage> {
        tokio::time::timeout(Duration::from_millis(200), self.peer.recv_message())
            .await
            .ok()
            .and_then(|r| r.ok())
    }
}

#[tokio::test]
async fn test_get_with_valid_source() {
    let h = harness();
    let tracker = Arc::new(
        LatestMessageSource::with_content("Tool", &TransformMessage::translation(1.0, 2.0, 3.0))
            .unwrap(),
    );
    let _reg = h.registry.publish(&tracker);
    let task = h.serve();

    h.ask("GET_TRANSFORM").await;
    let reply = h.reply().await;

    assert_eq!(reply.type_name(), "TRANSFORM");
    assert_eq!(reply.device_name(), "Tool");
    let transform = reply.decode::<TransformMessage>().unwrap();
    assert_eq!(transform.content.position(), [1.0, 2.0, 3.0]);

    h.peer.close().await;
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_get_without_source_sends_rts() {
    let h = harness();
    let task = h.serve();

    h.ask("GET_STATUS").await;
    let reply = h.reply().await;

    assert_eq!(reply.type_name(), "RTS_STATUS");
    assert_eq!(reply.device_name(), "Provider");
    let rts = reply.decode::<RtsStatusMessage>().unwrap();
    assert_eq!(rts.content.status, RTS_NOT_AVAILABLE);

    h.peer.close().await;
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unknown_type_gets_no_reply() {
    let h = harness();
    let status =
        Arc::new(LatestMessageSource::with_content("Robot", &StatusMessage::ok("idle")).unwrap());
    let _reg = h.registry.publish(&status);
    let task = h.serve();

    h.ask("GET_FOO").await;
    // a reply that is answered proves GET_FOO was processed first
    h.ask("GET_STATUS").await;

    let reply = h.reply().await;
    assert_eq!(reply.type_name(), "STATUS");
    assert!(h.any_reply().await.is_none());

    h.peer.close().await;
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unrecognized_prefix_is_handled_like_unknown_type() {
    let h = harness();
    assert_eq!(
        h.provider.dispatch(&RawMessage::empty("XYZ_THING", "Navigation")),
        Dispatch::Unsupported
    );

    // on the wire it is plain data and never reaches the command queue
    let task = h.serve();
    h.ask("XYZ_THING").await;
    let data = tokio::time::timeout(WAIT, h.server.recv_message())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(data.type_name(), "XYZ_THING");
    assert!(h.any_reply().await.is_none());

    h.peer.close().await;
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_inbound_rts_follows_the_source_lookup() {
    let h = harness();
    let status =
        Arc::new(LatestMessageSource::with_content("Robot", &StatusMessage::ok("idle")).unwrap());
    let _reg = h.registry.publish(&status);
    let task = h.serve();

    // a source exists: nothing is sent back
    h.peer
        .send_message(&RawMessage::from_content(&RtsStatusMessage::ok(), "").unwrap())
        .await
        .unwrap();
    assert!(h.any_reply().await.is_none());

    // no source for TRANSFORM: the RTS type is echoed
    h.ask("RTS_TRANS").await;
    let reply = h.reply().await;
    assert_eq!(reply.type_name(), "RTS_TRANS");
    assert_eq!(reply.device_name(), "Provider");

    // no source and no RTS type: silence
    h.ask("RTS_FOO").await;
    assert!(h.any_reply().await.is_none());
    assert_eq!(h.server.command_queue_stats().dequeued, 3);

    h.peer.close().await;
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_streaming_start_and_stop() {
    let h = harness();
    let tracker =
        Arc::new(LatestMessageSource::with_content("Tool", &TransformMessage::identity()).unwrap());
    let _reg = h.registry.publish(&tracker);
    let task = h.serve();

    h.ask("STT_TRANS").await;
    for _ in 0..3 {
        assert_eq!(h.reply().await.type_name(), "TRANSFORM");
    }
    assert!(h.provider.is_streaming("TRANSFORM"));

    h.ask("STP_TRANS").await;
    tokio::time::timeout(WAIT, async {
        while h.provider.has_streams() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    // drain what was in flight, then nothing more arrives
    while h.any_reply().await.is_some() {}
    assert!(h.any_reply().await.is_none());

    h.peer.close().await;
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_capability_reflects_registry() {
    let h = harness();
    let tracker = Arc::new(LatestMessageSource::new("Tool", "TRANSFORM"));
    let capability = Arc::new(CapabilitySource::new("Provider", Arc::clone(&h.registry)));
    let _a = h.registry.publish(&tracker);
    let _b = h.registry.publish(&capability);
    let task = h.serve();

    h.ask("GET_CAPABIL").await;
    let reply = h.reply().await;
    let caps = reply.decode::<CapabilityMessage>().unwrap();
    assert!(caps.content.supports("TRANSFORM"));
    assert!(caps.content.supports("CAPABILITY"));

    h.peer.close().await;
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_handle_next_command_polls() {
    let h = harness();
    assert!(h.provider.handle_next_command(&h.server).await.unwrap().is_none());

    h.ask("GET_STATUS").await;
    let dispatch = tokio::time::timeout(WAIT, async {
        loop {
            if let Some(d) = h.provider.handle_next_command(&h.server).await.unwrap() {
                return d;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert!(matches!(dispatch, Dispatch::Reply(ref m) if m.type_name() == "RTS_STATUS"));
    assert_eq!(h.reply().await.type_name(), "RTS_STATUS");
}
