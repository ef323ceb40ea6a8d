//! Framing and command correlation over an in-memory channel

mod common;

use common::{local_response, memory_connection, remote_response, rx_packet, split_frames};
use pretty_assertions::assert_eq;
use xbee_core::protocol::{
    checksum, AtCode, AtCommand, CommandStatus, ConnectionConfig, ErrorKind, Frame, ProtocolError,
    RemoteAtRequest, Target,
};

#[test]
fn test_frame_encoding_matches_wire_format() {
    let bytes = AtCommand::new(AtCode::NI).to_local_frame(0x01).to_bytes();
    assert_eq!(bytes, vec![0x7E, 0x00, 0x04, 0x08, 0x01, b'N', b'I', 0x5F]);
    assert_eq!(checksum(&bytes[3..7]), 0x5F);
}

#[test]
fn test_frame_decoding_accepts_own_encoding() {
    for payload in [vec![0x88], vec![0x80; 40], (0..=255u8).collect::<Vec<_>>()] {
        let frame = Frame::new(payload.clone());
        let decoded = Frame::from_bytes(&frame.to_bytes()).unwrap();
        assert_eq!(decoded.payload, payload);
    }
}

#[test]
fn test_corrupted_checksum_is_rejected() {
    let mut bytes = Frame::new(vec![0x88, 0x01, b'N', b'I', 0x00]).to_bytes();
    *bytes.last_mut().unwrap() ^= 0x01;
    let err = Frame::from_bytes(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Checksum);
}

#[test]
fn test_local_command_round_trip() {
    let (mut conn, handle) = memory_connection(200);
    handle.push_inbound(&local_response(1, b"NI", 0x00, b"GATEWAY"));

    assert_eq!(conn.node_identifier().unwrap(), "GATEWAY");
    let sent = split_frames(&handle.take_outbound());
    assert_eq!(sent, vec![vec![0x08, 0x01, b'N', b'I']]);
    assert_eq!(conn.in_flight(), 0);
}

#[test]
fn test_local_command_reports_status() {
    let (mut conn, handle) = memory_connection(200);
    handle.push_inbound(&local_response(1, b"ZZ", 0x02, &[]));

    let err = conn.local_command(AtCode::new("ZZ").unwrap()).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::AtStatus {
            status: CommandStatus::InvalidCommand,
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::AtStatus(CommandStatus::InvalidCommand));
}

#[test]
fn test_command_times_out_without_response() {
    let (mut conn, _handle) = memory_connection(30);
    let err = conn.local_command(AtCode::NI).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(err.is_transient());
    assert_eq!(conn.in_flight(), 0);
}

#[test]
fn test_junk_before_response_is_skipped() {
    let (mut conn, handle) = memory_connection(200);
    handle.push_inbound(&[0x00, 0x13, 0xFF]);
    handle.push_inbound(&local_response(1, b"NI", 0x00, b"A"));
    assert_eq!(conn.node_identifier().unwrap(), "A");
}

#[test]
fn test_remote_command_frame_layout() {
    let (mut conn, handle) = memory_connection(200);
    let target = 0x0013_A200_4052_9F01;
    handle.push_inbound(&remote_response(1, target, b"AC", 0x00, &[]));

    conn.apply_changes(Target::Remote(target)).unwrap();

    let sent = split_frames(&handle.take_outbound());
    let mut expected = vec![0x17, 0x01];
    expected.extend_from_slice(&target.to_be_bytes());
    expected.extend_from_slice(&[0xFF, 0xFE, 0x00]);
    expected.extend_from_slice(b"AC");
    assert_eq!(sent, vec![expected]);
}

#[test]
fn test_remote_request_with_explicit_routing() {
    let (mut conn, handle) = memory_connection(200);
    let target = 0x0013_A200_4052_9F01;
    handle.push_inbound(&remote_response(1, target, b"NI", 0x00, b"PUMP"));

    let request = RemoteAtRequest::new(target, AtCode::NI)
        .network_address(0x4A21)
        .options(RemoteAtRequest::OPTION_APPLY_CHANGES);
    let response = conn.remote_request(&request).unwrap();
    assert_eq!(response.source_address, target);
    assert_eq!(response.source_network_address, 0x4A21);
    assert_eq!(response.response.data, b"PUMP".to_vec());

    let sent = split_frames(&handle.take_outbound());
    assert_eq!(&sent[0][10..13], &[0x4A, 0x21, 0x02]);
}

#[test]
fn test_concurrent_requests_resolve_out_of_order() {
    let (mut conn, handle) = memory_connection(200);
    let first = conn.submit_local(&AtCommand::new(AtCode::NI)).unwrap();
    let second = conn.submit_local(&AtCommand::new(AtCode::NT)).unwrap();
    assert_ne!(first, second);
    assert_eq!(conn.in_flight(), 2);

    // the radio answers the later request first, with a data packet between
    handle.push_inbound(&local_response(second, b"NT", 0x00, &[0x00, 0x3C]));
    handle.push_inbound(&rx_packet(7, 40, 0, b"hi"));
    handle.push_inbound(&local_response(first, b"NI", 0x00, b"ONE"));

    assert_eq!(conn.await_local(first).unwrap().data, b"ONE".to_vec());
    assert_eq!(conn.await_local(second).unwrap().data, vec![0x00, 0x3C]);
    assert_eq!(conn.in_flight(), 0);

    let packet = conn.poll_once().unwrap().unwrap();
    assert_eq!(packet.source_address, 7);
    assert_eq!(packet.payload, b"hi".to_vec());
}

#[test]
fn test_stale_response_is_dropped() {
    let (mut conn, handle) = memory_connection(200);
    handle.push_inbound(&local_response(9, b"NI", 0x00, b"OLD"));
    handle.push_inbound(&local_response(1, b"NI", 0x00, b"NEW"));
    assert_eq!(conn.node_identifier().unwrap(), "NEW");
    assert_eq!(conn.poll_once().unwrap(), None);
}

#[test]
fn test_counters_track_traffic() {
    let (mut conn, handle) = memory_connection(200);
    handle.push_inbound(&local_response(1, b"NI", 0x00, b"X"));
    conn.node_identifier().unwrap();

    let (tx_frames, rx_frames, tx_bytes, rx_bytes) = conn.counters();
    assert_eq!((tx_frames, rx_frames), (1, 1));
    assert_eq!(tx_bytes, 8);
    assert_eq!(rx_bytes, 10);
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("radio.json");

    let mut config = ConnectionConfig::for_port("/dev/ttyUSB1");
    config.baud_rate = 115200;
    config.max_discovery_ms = Some(5000);
    config.save(&path).unwrap();

    let loaded = ConnectionConfig::load(&path).unwrap();
    assert_eq!(loaded.port_name, "/dev/ttyUSB1");
    assert_eq!(loaded.baud_rate, 115200);
    assert_eq!(loaded.max_discovery_ms, Some(5000));
}

#[test]
fn test_config_file_missing_fields_use_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("radio.json");
    std::fs::write(&path, r#"{ "port_name": "COM4" }"#).unwrap();

    let loaded = ConnectionConfig::load(&path).unwrap();
    let defaults = ConnectionConfig::default();
    assert_eq!(loaded.port_name, "COM4");
    assert_eq!(loaded.baud_rate, defaults.baud_rate);
    assert_eq!(loaded.timeout_ms, defaults.timeout_ms);
}

#[test]
fn test_config_file_invalid_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("radio.json");
    std::fs::write(&path, "not json").unwrap();
    assert!(matches!(
        ConnectionConfig::load(&path),
        Err(ProtocolError::Config(_))
    ));
}
