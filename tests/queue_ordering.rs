//! FIFO ordering of the device queues under randomized interleaving
//!
//! One producer and one consumer run on separate threads, each pausing at
//! random points, the way the receive task and a dispatch loop do.

use openigtlink_provider::io::{DeviceConfig, IgtlDevice, MessageQueue, QueueConfig};
use openigtlink_provider::protocol::RawMessage;
use openigtlink_provider::IgtlError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const ITEMS: u32 = 2_000;

fn jitter(rng: &mut StdRng) {
    match rng.gen_range(0..10) {
        0 => std::thread::sleep(Duration::from_micros(rng.gen_range(1..50))),
        1..=3 => std::thread::yield_now(),
        _ => {}
    }
}

#[test]
fn test_polling_consumer_sees_fifo_order() {
    for seed in 0..8u64 {
        let queue = Arc::new(MessageQueue::with_config(QueueConfig::unbounded()));

        let producer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                for i in 0..ITEMS {
                    queue.enqueue(i).unwrap();
                    jitter(&mut rng);
                }
                queue.close();
            })
        };

        let mut rng = StdRng::seed_from_u64(seed.wrapping_mul(31).wrapping_add(7));
        let mut received = Vec::with_capacity(ITEMS as usize);
        loop {
            match queue.try_dequeue() {
                Ok(Some(item)) => received.push(item),
                Ok(None) => jitter(&mut rng),
                Err(IgtlError::Disconnected) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        producer.join().unwrap();

        assert_eq!(received, (0..ITEMS).collect::<Vec<_>>(), "seed {seed}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_awaiting_consumer_sees_fifo_order() {
    for seed in 0..4u64 {
        let queue = Arc::new(MessageQueue::with_config(QueueConfig::bounded(ITEMS as usize)));

        let producer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                for i in 0..ITEMS {
                    queue.enqueue(i).unwrap();
                    jitter(&mut rng);
                }
                queue.close();
            })
        };

        let mut received = Vec::with_capacity(ITEMS as usize);
        while let Ok(item) = queue.dequeue().await {
            received.push(item);
        }
        producer.join().unwrap();

        assert_eq!(received, (0..ITEMS).collect::<Vec<_>>(), "seed {seed}");
        assert_eq!(queue.stats().dequeued, u64::from(ITEMS));
    }
}

#[tokio::test]
async fn test_device_keeps_arrival_order_per_queue() {
    let (local, mut remote) = tokio::io::duplex(256 * 1024);
    let device = IgtlDevice::from_io(local, DeviceConfig::default());

    let mut rng = StdRng::seed_from_u64(42);
    let mut expected_data = Vec::new();
    let mut expected_commands = Vec::new();
    let mut wire = Vec::new();
    for i in 0..200u32 {
        let body = i.to_be_bytes().to_vec();
        let msg = if rng.gen_bool(0.3) {
            expected_commands.push(i);
            RawMessage::new("GET_STATUS", "Nav", body)
        } else {
            expected_data.push(i);
            RawMessage::new("STATUS", "Robot", body)
        };
        wire.extend_from_slice(&msg.encode().unwrap());
    }

    // random split points so frames straddle reads
    let mut rest = wire.as_slice();
    while !rest.is_empty() {
        let n = rng.gen_range(1..=rest.len().min(300));
        remote.write_all(&rest[..n]).await.unwrap();
        rest = &rest[n..];
    }
    drop(remote);

    let body_index = |m: RawMessage| {
        let b = m.body();
        u32::from_be_bytes([b[0], b[1], b[2], b[3]])
    };

    let mut commands = Vec::new();
    while let Ok(msg) = device.recv_command().await {
        commands.push(body_index(msg));
    }
    let mut data = Vec::new();
    while let Ok(msg) = device.recv_message().await {
        data.push(body_index(msg));
    }

    assert_eq!(commands, expected_commands);
    assert_eq!(data, expected_data);
}
