//! Shared fixtures for integration tests

#![allow(dead_code)]

use xbee_core::protocol::{Connection, ConnectionConfig, FrameBuilder, MemoryChannel};

/// Install a test subscriber honouring RUST_LOG; safe to call repeatedly
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Connection over an in-memory channel plus the handle driving it
pub fn memory_connection(timeout_ms: u64) -> (Connection, MemoryChannel) {
    init_tracing();
    let handle = MemoryChannel::new();
    let config = ConnectionConfig {
        timeout_ms,
        poll_interval_ms: 1,
        ..ConnectionConfig::default()
    };
    (
        Connection::with_channel(Box::new(handle.clone()), config),
        handle,
    )
}

pub fn local_response(id: u8, code: &[u8; 2], status: u8, data: &[u8]) -> Vec<u8> {
    FrameBuilder::new(0x88)
        .byte(id)
        .bytes(code)
        .byte(status)
        .bytes(data)
        .build()
        .to_bytes()
}

pub fn remote_response(id: u8, source: u64, code: &[u8; 2], status: u8, data: &[u8]) -> Vec<u8> {
    FrameBuilder::new(0x97)
        .byte(id)
        .u64_be(source)
        .u16_be(0x4A21)
        .bytes(code)
        .byte(status)
        .bytes(data)
        .build()
        .to_bytes()
}

pub fn rx_packet(source: u64, rssi: u8, options: u8, data: &[u8]) -> Vec<u8> {
    FrameBuilder::new(0x80)
        .u64_be(source)
        .byte(rssi)
        .byte(options)
        .bytes(data)
        .build()
        .to_bytes()
}

/// ND response data for one node
pub fn discovery_record(address: u64, identifier: &str, parent: u16, device_type: u8) -> Vec<u8> {
    let mut record = vec![0x12, 0x34];
    record.extend_from_slice(&address.to_be_bytes());
    record.extend_from_slice(identifier.as_bytes());
    record.push(0x00);
    record.extend_from_slice(&parent.to_be_bytes());
    record.push(device_type);
    record.push(0x00);
    record.extend_from_slice(&0xC105u16.to_be_bytes());
    record.extend_from_slice(&0x101Eu16.to_be_bytes());
    record
}

/// Split captured outbound bytes into frame payloads
pub fn split_frames(mut bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    while bytes.len() >= 4 {
        assert_eq!(bytes[0], 0x7E, "outbound frame must start with delimiter");
        let len = u16::from_be_bytes([bytes[1], bytes[2]]) as usize;
        frames.push(bytes[3..3 + len].to_vec());
        bytes = &bytes[3 + len + 1..];
    }
    assert!(bytes.is_empty(), "trailing bytes after last frame");
    frames
}
