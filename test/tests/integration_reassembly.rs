/// Integration tests for the response reassembly path: block framing,
/// continuation markers, partial arrival, and desync recovery.
use depot_client::{SessionStatus, SyncSession};
use depot_shared::Priority;

use depot_test::helpers::{
    MemoryTransport, RecordingArchive, ResponseBuilder, TransportController,
};

fn attached_session() -> (SyncSession, TransportController) {
    let mut session = SyncSession::new();
    let (transport, controller) = MemoryTransport::pair();
    session.attach(transport, true);
    controller.take_outbound();
    (session, controller)
}

#[test]
fn multi_block_response_reassembles() {
    let (mut session, controller) = attached_session();
    let archive = RecordingArchive::new();

    let body: Vec<u8> = (0..1200u32).map(|value| value as u8).collect();
    let response = ResponseBuilder::new(6, 100, body.clone());
    session.enqueue_file_request(Priority::Standard, 6, 100, 0, response.expected_crc(), archive.clone());
    session.poll();

    let stream = response.build();
    // 8-byte header + 504 + marker + 511 + marker + 185
    assert_eq!(stream.len(), 8 + 1200 + 2);
    controller.feed(&stream);
    assert_eq!(session.poll(), SessionStatus::Connected);

    let deliveries = archive.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(&deliveries[0].bytes[5..], &body[..]);
    assert_eq!(session.desync_count(), 0);
}

#[test]
fn body_filling_the_first_block_exactly_needs_no_marker() {
    let (mut session, controller) = attached_session();
    let archive = RecordingArchive::new();

    // 504 body bytes land exactly on the 512-byte block boundary
    let body = vec![0xaau8; 504];
    let response = ResponseBuilder::new(1, 2, body.clone());
    session.enqueue_file_request(Priority::Standard, 1, 2, 0, response.expected_crc(), archive.clone());
    session.poll();

    let stream = response.build();
    assert_eq!(stream.len(), 8 + 504);
    controller.feed(&stream);
    session.poll();
    assert_eq!(archive.delivery_count(), 1);
}

#[test]
fn body_one_past_the_block_boundary_needs_a_marker() {
    let (mut session, controller) = attached_session();
    let archive = RecordingArchive::new();

    let body = vec![0xbbu8; 505];
    let response = ResponseBuilder::new(1, 3, body.clone());
    session.enqueue_file_request(Priority::Standard, 1, 3, 0, response.expected_crc(), archive.clone());
    session.poll();

    let stream = response.build();
    assert_eq!(stream.len(), 8 + 504 + 1 + 1);
    assert_eq!(stream[8 + 504], 0xff);
    controller.feed(&stream);
    session.poll();

    let deliveries = archive.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(&deliveries[0].bytes[5..], &body[..]);
}

#[test]
fn response_split_across_many_polls_still_completes() {
    let (mut session, controller) = attached_session();
    let archive = RecordingArchive::new();

    let body: Vec<u8> = (0..600u32).map(|value| (value * 3) as u8).collect();
    let response = ResponseBuilder::new(2, 9, body.clone());
    session.enqueue_file_request(Priority::Standard, 2, 9, 0, response.expected_crc(), archive.clone());
    session.poll();

    // dribble the stream three bytes at a time
    for chunk in response.build().chunks(3) {
        assert_eq!(archive.delivery_count(), 0);
        controller.feed(chunk);
        assert_eq!(session.poll(), SessionStatus::Connected);
    }
    let deliveries = archive.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(&deliveries[0].bytes[5..], &body[..]);
}

#[test]
fn bad_continuation_marker_abandons_and_resynchronizes() {
    let (mut session, controller) = attached_session();
    let abandoned = RecordingArchive::new();
    let rescued = RecordingArchive::new();

    // response A spans two blocks; response B is small and self-contained
    let body_a = vec![0x11u8; 600];
    let response_a = ResponseBuilder::new(1, 1, body_a);
    let body_b: Vec<u8> = (0..20).collect();
    let response_b = ResponseBuilder::new(1, 2, body_b.clone());

    session.enqueue_file_request(Priority::Standard, 1, 1, 0, response_a.expected_crc(), abandoned.clone());
    session.enqueue_file_request(Priority::Standard, 1, 2, 0, response_b.expected_crc(), rescued.clone());
    session.poll();

    // A's header and first block arrive, but where A's continuation marker
    // belongs, B's response begins instead — the stream lost A's tail
    let mut stream = response_a.build()[..8 + 504].to_vec();
    stream.extend_from_slice(&response_b.build());
    controller.feed(&stream);

    assert_eq!(session.poll(), SessionStatus::Connected);

    // A is abandoned silently (counted), B survives the resynchronization
    assert_eq!(session.desync_count(), 1);
    assert_eq!(abandoned.delivery_count(), 0);
    let deliveries = rescued.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(&deliveries[0].bytes[5..], &body_b[..]);

    // A's request still occupies its in-flight slot until a reconnect
    assert_eq!(session.active_task_count(true, true), 1);
}

#[test]
fn compressed_responses_carry_the_size_trailer() {
    let (mut session, controller) = attached_session();
    let archive = RecordingArchive::new();

    // compressed payload plus the 4-byte uncompressed-size trailer
    let mut body = vec![0x5au8; 40];
    body.extend_from_slice(&100u32.to_be_bytes());
    let response = ResponseBuilder::new(3, 4, body.clone()).compression(1);
    session.enqueue_file_request(Priority::Standard, 3, 4, 0, response.expected_crc(), archive.clone());
    session.poll();

    controller.feed(&response.build());
    session.poll();

    let deliveries = archive.deliveries();
    assert_eq!(deliveries.len(), 1);
    // prefix records the compression method and the compressed size
    assert_eq!(deliveries[0].bytes[0], 1);
    assert_eq!(&deliveries[0].bytes[1..5], &40u32.to_be_bytes());
    assert_eq!(&deliveries[0].bytes[5..], &body[..]);
}
