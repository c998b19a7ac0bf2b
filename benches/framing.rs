//! Framing and dispatch benchmarks
//!
//! Measures frame encode/decode by body size, the incremental decoder on a
//! stream of small frames, and the cost of dispatching one GET request.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use openigtlink_provider::protocol::frame::{decode_frame, FrameDecoder, FrameOptions};
use openigtlink_provider::protocol::types::TransformMessage;
use openigtlink_provider::protocol::{MessageFactory, RawMessage};
use openigtlink_provider::provider::{LatestMessageSource, MessageProvider, SourceRegistry};
use std::sync::Arc;

fn bench_frame_by_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");

    for size in [0usize, 64, 4 * 1024, 256 * 1024] {
        let msg = RawMessage::new("NDARRAY", "Benchmark", vec![0x5au8; size]);
        let data = msg.encode().unwrap();
        group.throughput(Throughput::Bytes(data.len() as u64));

        group.bench_with_input(BenchmarkId::new("encode", size), &msg, |b, msg| {
            b.iter(|| black_box(msg.encode().unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &data, |b, data| {
            let options = FrameOptions::default();
            b.iter(|| black_box(decode_frame(data, &options)));
        });
    }

    group.finish();
}

fn bench_stream_decoder(c: &mut Criterion) {
    let msg = RawMessage::from_content(&TransformMessage::identity(), "Tool").unwrap();
    let frame = msg.encode().unwrap();
    let stream: Vec<u8> = frame.iter().copied().cycle().take(frame.len() * 100).collect();

    let mut group = c.benchmark_group("decoder");
    group.throughput(Throughput::Elements(100));
    group.bench_function("100_transforms_in_1k_chunks", |b| {
        b.iter(|| {
            let mut decoder = FrameDecoder::new(FrameOptions::default());
            let mut count = 0;
            for chunk in stream.chunks(1024) {
                decoder.extend_from_slice(chunk);
                while decoder.next_frame().is_some() {
                    count += 1;
                }
            }
            black_box(count)
        });
    });
    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let registry = Arc::new(SourceRegistry::new());
    let tracker =
        Arc::new(LatestMessageSource::with_content("Tool", &TransformMessage::identity()).unwrap());
    let _registration = registry.publish(&tracker);
    let provider = MessageProvider::new(registry, Arc::new(MessageFactory::with_standard_types()));

    let get = RawMessage::empty("GET_TRANS", "Navigation");
    let missing = RawMessage::empty("GET_STATUS", "Navigation");

    c.bench_function("dispatch_get_with_source", |b| {
        b.iter(|| black_box(provider.dispatch(&get)))
    });
    c.bench_function("dispatch_get_rts", |b| {
        b.iter(|| black_box(provider.dispatch(&missing)))
    });
}

criterion_group!(benches, bench_frame_by_size, bench_stream_decoder, bench_dispatch);

criterion_main!(benches);
