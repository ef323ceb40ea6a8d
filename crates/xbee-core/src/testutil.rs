//! Wire-level fixtures shared by unit tests

use crate::protocol::{
    Frame, FrameBuilder, FRAME_AT_RESPONSE, FRAME_REMOTE_AT_RESPONSE, FRAME_RX_PACKET,
};

/// Encoded local AT response frame
pub(crate) fn local_response(id: u8, code: &[u8; 2], status: u8, data: &[u8]) -> Vec<u8> {
    FrameBuilder::new(FRAME_AT_RESPONSE)
        .byte(id)
        .bytes(code)
        .byte(status)
        .bytes(data)
        .build()
        .to_bytes()
}

/// Encoded remote AT response frame
pub(crate) fn remote_response(
    id: u8,
    source: u64,
    network: u16,
    code: &[u8; 2],
    status: u8,
    data: &[u8],
) -> Vec<u8> {
    FrameBuilder::new(FRAME_REMOTE_AT_RESPONSE)
        .byte(id)
        .u64_be(source)
        .u16_be(network)
        .bytes(code)
        .byte(status)
        .bytes(data)
        .build()
        .to_bytes()
}

/// Encoded receive packet frame
pub(crate) fn rx_packet(source: u64, rssi: u8, options: u8, data: &[u8]) -> Vec<u8> {
    FrameBuilder::new(FRAME_RX_PACKET)
        .u64_be(source)
        .byte(rssi)
        .byte(options)
        .bytes(data)
        .build()
        .to_bytes()
}

/// Discovery record as carried in an ND response's data
pub(crate) fn discovery_record(
    network: u16,
    address: u64,
    identifier: &str,
    parent: u16,
    device_type: u8,
    profile: u16,
    mfg: u16,
) -> Vec<u8> {
    let mut record = Vec::new();
    record.extend_from_slice(&network.to_be_bytes());
    record.extend_from_slice(&address.to_be_bytes());
    record.extend_from_slice(identifier.as_bytes());
    record.push(0);
    record.extend_from_slice(&parent.to_be_bytes());
    record.push(device_type);
    record.push(0);
    record.extend_from_slice(&profile.to_be_bytes());
    record.extend_from_slice(&mfg.to_be_bytes());
    record
}

/// Encoded frame around an arbitrary payload
pub(crate) fn frame(payload: &[u8]) -> Vec<u8> {
    Frame::new(payload.to_vec()).to_bytes()
}
