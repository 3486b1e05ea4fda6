use std::time::Duration;

use camfeed_config::PortRangeSettings;
use camfeed_core::error::CoreError;
use camfeed_core::{PortAllocator, SsrcCapture};
use uuid::Uuid;

/// With nothing sending RTP to the allocated port, capture gives up at the
/// deadline instead of hanging forever.
#[tokio::test]
async fn ssrc_capture_times_out_without_a_sender() {
    let stream_id = Uuid::new_v4();
    let port = 41500;

    let result = SsrcCapture::capture(stream_id, port, Duration::from_millis(100)).await;

    match result {
        Err(CoreError::SsrcCaptureFailed { stream_id: sid }) => assert_eq!(sid, stream_id),
        other => panic!("expected SsrcCaptureFailed, got {other:?}"),
    }
}

/// SSRC is read from bytes 8..12 of the RTP header, big-endian.
#[tokio::test]
async fn ssrc_capture_reads_the_rtp_header_field() {
    let stream_id = Uuid::new_v4();
    let port = 41501;

    let sender = tokio::net::UdpSocket::bind("0.0.0.0:0").await.unwrap();
    let mut packet = vec![0x80, 0x60, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
    packet.extend_from_slice(&0xAABBCCDDu32.to_be_bytes());
    packet.extend_from_slice(&[0u8; 4]);

    let send_task = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        sender
            .send_to(&packet, ("127.0.0.1", port))
            .await
            .unwrap();
    });

    let ssrc = SsrcCapture::capture(stream_id, port, Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(ssrc, 0xAABBCCDD);
    send_task.await.unwrap();
}

/// Two distinct cameras land on different ports, and collisions fall back
/// to a linear probe rather than erroring immediately.
#[test]
fn port_allocator_avoids_handing_out_the_same_port_twice() {
    let allocator = PortAllocator::new(PortRangeSettings { start: 42000, end: 42003 });

    let a = allocator.allocate(Uuid::new_v4()).unwrap();
    let b = allocator.allocate(Uuid::new_v4()).unwrap();
    let c = allocator.allocate(Uuid::new_v4()).unwrap();
    let d = allocator.allocate(Uuid::new_v4()).unwrap();

    let ports = [a, b, c, d];
    for port in ports {
        assert!((42000..=42003).contains(&port));
    }
    assert_eq!(
        ports.iter().collect::<std::collections::HashSet<_>>().len(),
        4,
        "a 4-port range fully allocated must hand out 4 distinct ports"
    );

    assert!(allocator.allocate(Uuid::new_v4()).is_err());
}

/// Releasing a port makes it available for reuse.
#[test]
fn port_allocator_reuses_released_ports() {
    let allocator = PortAllocator::new(PortRangeSettings { start: 42100, end: 42100 });
    let camera = Uuid::new_v4();

    let port = allocator.allocate(camera).unwrap();
    assert_eq!(port, 42100);
    assert!(allocator.allocate(Uuid::new_v4()).is_err());

    allocator.release(port);
    assert!(allocator.allocate(Uuid::new_v4()).is_ok());
}
