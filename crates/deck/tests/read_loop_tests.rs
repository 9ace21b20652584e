//! Read Loop Integration Tests
//!
//! Drives per-device read loops against the in-memory bus.
//!
//! # Test Scenarios
//! - Key decoding, remap and suppression rules
//! - Error recovery and single teardown
//! - Stop/close while a read is in flight
//! - Isolation between devices sharing one transport
//!
//! Run with: `cargo test -p deck --test read_loop_tests`

use common::test_utils::{
    DEFAULT_TEST_TIMEOUT, create_mock_listing, create_mock_report, wait_until, with_timeout,
};
use deck::test_utils::MockTransport;
use deck::{DeviceFamily, DeviceHandle, LoopState};
use protocol::DeviceError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const TICK: Duration = Duration::from_millis(5);

async fn open_decks(count: u32) -> (Arc<MockTransport>, Vec<DeviceHandle>) {
    let bus = Arc::new(MockTransport::new());
    let mut handles = Vec::new();
    for i in 1..=count {
        let info = create_mock_listing(i, 0x5500, 0x1001);
        bus.attach(info.clone());
        let handle =
            DeviceHandle::with_read_interval(info.identity, DeviceFamily::Sd293, bus.clone(), TICK);
        handle.open().await.expect("open");
        handles.push(handle);
    }
    (bus, handles)
}

type Events = mpsc::UnboundedReceiver<(String, u8, u8)>;

async fn listen(handle: &DeviceHandle) -> Events {
    let (tx, rx) = mpsc::unbounded_channel();
    handle
        .set_key_callback(move |deck, key, state| {
            let _ = tx.send((deck.path().to_string(), key, state));
        })
        .await
        .expect("start read loop");
    rx
}

async fn next(rx: &mut Events) -> (String, u8, u8) {
    with_timeout(DEFAULT_TEST_TIMEOUT, rx.recv())
        .await
        .expect("key event in time")
        .expect("channel open")
}

// ============================================================================
// Decoding Tests
// ============================================================================

#[tokio::test]
async fn test_keys_are_remapped() {
    let (bus, decks) = open_decks(1).await;
    let deck = &decks[0];
    for raw in [1u8, 11, 6, 99] {
        bus.push_report(deck.path(), create_mock_report(raw, 1));
    }

    let mut rx = listen(deck).await;
    let mut keys = Vec::new();
    for _ in 0..4 {
        keys.push(next(&mut rx).await.1);
    }
    assert_eq!(keys, vec![11, 1, 6, 99]);
    deck.close().await;
}

#[tokio::test]
async fn test_sentinel_never_reaches_callback() {
    let (bus, decks) = open_decks(1).await;
    let deck = &decks[0];
    for state in [0u8, 1, 2, 255] {
        bus.push_report(deck.path(), create_mock_report(255, state));
    }
    bus.push_report(deck.path(), create_mock_report(7, 1));

    let mut rx = listen(deck).await;
    assert_eq!(next(&mut rx).await.1, 7);
    assert!(rx.try_recv().is_err());
    deck.close().await;
}

#[tokio::test]
async fn test_short_frames_are_discarded() {
    let (bus, decks) = open_decks(1).await;
    let deck = &decks[0];
    let mut short = create_mock_report(3, 1);
    short.truncate(9);
    bus.push_report(deck.path(), short);
    bus.push_report(deck.path(), Vec::new());
    bus.push_report(deck.path(), create_mock_report(8, 0));

    let mut rx = listen(deck).await;
    let (path, key, state) = next(&mut rx).await;
    assert_eq!(path, deck.path());
    assert_eq!((key, state), (8, 0));
    deck.close().await;
}

// ============================================================================
// Error Recovery Tests
// ============================================================================

#[tokio::test]
async fn test_read_error_tears_down_once_and_stays_stopped() {
    let (bus, decks) = open_decks(1).await;
    let deck = &decks[0];
    bus.push_read_error(deck.path(), DeviceError::failed("io"));

    let _rx = listen(deck).await;
    assert!(
        wait_until(DEFAULT_TEST_TIMEOUT, || {
            deck.read_state() == LoopState::Stopped && deck.is_closed()
        })
        .await
    );

    let reads = bus.read_count(deck.path());
    tokio::time::sleep(TICK * 10).await;
    assert_eq!(bus.read_count(deck.path()), reads, "loop must not restart");

    assert_eq!(bus.count("key_all_clear", deck.path()), 1);
    assert_eq!(bus.count("disconnected", deck.path()), 1);
    assert_eq!(bus.count("close", deck.path()), 1);
    assert!(!bus.is_open(deck.path()));

    // A later explicit close is a no-op
    deck.close().await;
    assert_eq!(bus.count("close", deck.path()), 1);
}

#[tokio::test]
async fn test_error_in_one_deck_does_not_stop_another() {
    let (bus, decks) = open_decks(2).await;
    let (a, b) = (&decks[0], &decks[1]);
    bus.set_read_delay(a.path(), TICK);
    bus.push_read_error(a.path(), DeviceError::Connection("unplugged".into()));
    for key in 1..=5u8 {
        bus.push_report(b.path(), create_mock_report(key, 1));
    }

    let _rx_a = listen(a).await;
    let mut rx_b = listen(b).await;

    let mut keys = Vec::new();
    for _ in 0..5 {
        keys.push(next(&mut rx_b).await.1);
    }
    assert_eq!(keys, vec![11, 12, 13, 14, 15]);

    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || a.is_closed()).await);
    assert!(b.is_reading());
    assert!(!b.is_closed());
    b.close().await;
}

#[tokio::test]
async fn test_read_on_closed_handle_is_refused() {
    let (_bus, decks) = open_decks(1).await;
    let deck = &decks[0];
    deck.close().await;

    let err = deck.set_key_callback(|_, _, _| {}).await.unwrap_err();
    assert!(matches!(err, DeviceError::NotOpen(_)));
    assert!(!deck.is_reading());
}

// ============================================================================
// Cancellation Tests
// ============================================================================

#[tokio::test]
async fn test_stop_waits_for_in_flight_read() {
    let (bus, decks) = open_decks(1).await;
    let deck = &decks[0];
    bus.set_read_delay(deck.path(), Duration::from_millis(100));

    let _rx = listen(deck).await;
    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || bus.reads_in_flight() == 1).await);

    deck.stop_reading().await;
    assert_eq!(bus.reads_in_flight(), 0);
    assert_eq!(deck.read_state(), LoopState::Stopped);
    assert_eq!(bus.calls_for(deck.path()).last(), Some(&"read_end"));

    // Stopping again is a no-op
    deck.stop_reading().await;
    assert!(!deck.is_closed());
}

#[tokio::test]
async fn test_close_while_polling_releases_after_read() {
    let (bus, decks) = open_decks(1).await;
    let deck = &decks[0];
    bus.set_read_delay(deck.path(), Duration::from_millis(50));

    let _rx = listen(deck).await;
    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || bus.reads_in_flight() == 1).await);
    deck.close().await;

    let calls = bus.calls_for(deck.path());
    let last_read = calls.iter().rposition(|op| *op == "read_end").unwrap();
    let close = calls.iter().position(|op| *op == "close").unwrap();
    assert!(last_read < close);
}

#[tokio::test]
async fn test_concurrent_close_tears_down_once() {
    let (bus, decks) = open_decks(1).await;
    let deck = decks[0].clone();
    bus.set_read_delay(deck.path(), Duration::from_millis(20));
    let _rx = listen(&deck).await;

    let other = deck.clone();
    tokio::join!(deck.close(), other.close(), deck.close());

    assert_eq!(bus.count("close", deck.path()), 1);
    assert_eq!(bus.count("key_all_clear", deck.path()), 1);
    assert_eq!(bus.count("disconnected", deck.path()), 1);
    assert!(deck.is_closed() && other.is_closed());
}

#[tokio::test]
async fn test_close_racing_read_error_tears_down_once() {
    let (bus, decks) = open_decks(1).await;
    let deck = &decks[0];
    bus.set_read_delay(deck.path(), Duration::from_millis(30));
    bus.push_read_error(deck.path(), DeviceError::failed("io"));

    let _rx = listen(deck).await;
    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || bus.reads_in_flight() == 1).await);
    deck.close().await;

    assert_eq!(bus.count("close", deck.path()), 1);
    assert_eq!(deck.read_state(), LoopState::Stopped);
}

#[tokio::test]
async fn test_restart_replaces_previous_loop() {
    let (bus, decks) = open_decks(1).await;
    let deck = &decks[0];

    let mut first = listen(deck).await;
    let mut second = listen(deck).await;
    bus.push_report(deck.path(), create_mock_report(6, 1));

    assert_eq!(next(&mut second).await.1, 6);
    assert!(first.recv().await.is_none(), "old callback must be dropped");
    deck.close().await;
}

#[tokio::test]
async fn test_async_callback_errors_do_not_stop_loop() {
    let (bus, decks) = open_decks(1).await;
    let deck = &decks[0];
    bus.push_report(deck.path(), create_mock_report(1, 1));
    bus.push_report(deck.path(), create_mock_report(2, 1));

    let (tx, mut rx) = mpsc::unbounded_channel();
    deck.set_key_callback_async(move |_deck, key, _state| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(key);
            if key == 11 {
                Err("first key rejected")
            } else {
                Ok(())
            }
        }
    })
    .await
    .unwrap();

    let first = with_timeout(DEFAULT_TEST_TIMEOUT, rx.recv()).await.unwrap();
    let second = with_timeout(DEFAULT_TEST_TIMEOUT, rx.recv()).await.unwrap();
    assert_eq!((first, second), (Some(11), Some(12)));
    assert!(deck.is_reading());
    deck.close().await;
}
