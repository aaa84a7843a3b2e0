//! Integration tests for the connection manager actor.
//!
//! Every test runs on a paused tokio clock and a [`MockConnector`], so the
//! reconnect timer and request timeouts are exercised without real sleeping
//! and without a network.  The connector exposes each connect attempt by
//! index: attempt 0 is the one `open_with` starts, attempt 1 is the first
//! reconnect, and so on.
//!
//! `settle()` yields enough times for the actor to drain its channels; it is
//! needed after every scripted transport event because the actor runs on its
//! own task.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio_test::{assert_pending, assert_ready, task};
use url::Url;
use wall_core::{ExponentialBackoff, FixedDelay, LinkState, OutboundMessage, RequestId};
use wall_remote::infrastructure::transport::mock::MockConnector;
use wall_remote::infrastructure::{ConnectionHandle, ConnectionManager, RequestError};

const RECONNECT: Duration = Duration::from_millis(2000);

fn endpoint() -> Url {
    Url::parse("ws://wall.test:1337/blinkenwall").unwrap()
}

fn open_manager(connector: &MockConnector, timeout: Option<Duration>) -> ConnectionHandle {
    ConnectionManager::open_with(endpoint(), connector.clone(), FixedDelay(RECONNECT), timeout)
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

fn parsed(frames: &[String]) -> Vec<Value> {
    frames
        .iter()
        .map(|f| serde_json::from_str(f).unwrap())
        .collect()
}

fn msg(cmd: &str) -> OutboundMessage {
    OutboundMessage::command(cmd)
}

// ── Queueing and ordering ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_sends_before_open_flush_in_order_exactly_once() {
    // Arrange
    let connector = MockConnector::new();
    let remote = open_manager(&connector, None);
    for n in 0..3 {
        remote.send(msg("tox message").with("text", n));
    }
    settle().await;
    assert!(connector.written(0).is_empty(), "nothing is written before open");

    // Act
    connector.open(0);
    settle().await;

    // Assert
    let frames = parsed(&connector.written(0));
    assert_eq!(frames.len(), 3);
    for (n, frame) in frames.iter().enumerate() {
        assert_eq!(frame["req"], json!((n + 1).to_string()));
        assert_eq!(frame["text"], json!(n));
    }
}

#[tokio::test(start_paused = true)]
async fn test_sends_while_open_go_straight_out() {
    let connector = MockConnector::new();
    let remote = open_manager(&connector, None);
    settle().await;
    connector.open(0);
    settle().await;

    remote.send(msg("turnoff"));
    settle().await;

    let frames = parsed(&connector.written(0));
    assert_eq!(frames, vec![json!({"req": "1", "cmd": "turnoff"})]);
}

#[tokio::test(start_paused = true)]
async fn test_request_ids_keep_increasing_across_reconnects() {
    // Arrange
    let connector = MockConnector::new();
    let remote = open_manager(&connector, None);
    settle().await;
    connector.open(0);
    remote.send(msg("a"));
    remote.send(msg("b"));
    settle().await;

    // Act: drop the link, send while down, reconnect.
    connector.close(0);
    settle().await;
    remote.send(msg("c"));
    tokio::time::sleep(RECONNECT).await;
    settle().await;
    connector.open(1);
    settle().await;

    // Assert
    let first: Vec<Value> = parsed(&connector.written(0))
        .into_iter()
        .map(|f| f["req"].clone())
        .collect();
    let second: Vec<Value> = parsed(&connector.written(1))
        .into_iter()
        .map(|f| f["req"].clone())
        .collect();
    assert_eq!(first, vec![json!("1"), json!("2")]);
    assert_eq!(second, vec![json!("3")]);
}

// ── Reconnect ─────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_error_and_close_schedule_exactly_one_reconnect() {
    // Arrange
    let connector = MockConnector::new();
    let remote = open_manager(&connector, None);
    settle().await;
    connector.open(0);
    settle().await;

    // Act: both error and close fire for the same transport.
    connector.fail(0, "connection reset");
    connector.close(0);
    settle().await;

    // Assert: nothing before the delay, one attempt at the delay, no more after.
    tokio::time::sleep(RECONNECT - Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(connector.attempts(), 1);
    assert_eq!(remote.link_state(), LinkState::Disconnected);

    tokio::time::sleep(Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(connector.attempts(), 2);
    assert_eq!(remote.link_state(), LinkState::Connecting);

    tokio::time::sleep(RECONNECT * 5).await;
    settle().await;
    assert_eq!(connector.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_handshake_retries_until_open() {
    let connector = MockConnector::new();
    let remote = open_manager(&connector, None);
    settle().await;

    for attempt in 0..3 {
        connector.fail(attempt, "connection refused");
        connector.close(attempt);
        settle().await;
        tokio::time::sleep(RECONNECT).await;
        settle().await;
    }
    connector.open(3);
    settle().await;

    assert_eq!(connector.attempts(), 4);
    assert_eq!(remote.link_state(), LinkState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_events_from_superseded_transport_are_ignored() {
    // Arrange: attempt 0 closes and attempt 1 is under way.
    let connector = MockConnector::new();
    let remote = open_manager(&connector, None);
    settle().await;
    connector.close(0);
    settle().await;
    tokio::time::sleep(RECONNECT).await;
    settle().await;
    assert_eq!(connector.attempts(), 2);

    // Act: late events from attempt 0.
    connector.open(0);
    connector.fail(0, "late");
    connector.close(0);
    settle().await;
    tokio::time::sleep(RECONNECT * 3).await;
    settle().await;

    // Assert
    assert_eq!(connector.attempts(), 2);
    assert_eq!(remote.link_state(), LinkState::Connecting);
}

#[tokio::test(start_paused = true)]
async fn test_replaced_transport_link_is_dropped() {
    let connector = MockConnector::new();
    let _remote = open_manager(&connector, None);
    settle().await;
    connector.open(0);
    settle().await;

    connector.close(0);
    settle().await;

    assert!(connector.link_dropped(0));
}

#[tokio::test(start_paused = true)]
async fn test_exponential_backoff_spaces_attempts_out() {
    // Arrange
    let connector = MockConnector::new();
    let policy = ExponentialBackoff {
        initial: Duration::from_secs(1),
        max: Duration::from_secs(10),
        factor: 2.0,
    };
    let _remote = ConnectionManager::open_with(endpoint(), connector.clone(), policy, None);
    settle().await;

    // Act / Assert: first retry after 1s
    connector.close(0);
    settle().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    settle().await;
    assert_eq!(connector.attempts(), 2);

    // second consecutive failure waits 2s
    connector.close(1);
    settle().await;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    settle().await;
    assert_eq!(connector.attempts(), 2);
    tokio::time::sleep(Duration::from_millis(500)).await;
    settle().await;
    assert_eq!(connector.attempts(), 3);
}

// ── Correlation ───────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_reply_invokes_callback_exactly_once() {
    // Arrange
    let connector = MockConnector::new();
    let remote = open_manager(&connector, None);
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(std::sync::Mutex::new(None));
    {
        let calls = Arc::clone(&calls);
        let seen = Arc::clone(&seen);
        remote.send_with(msg("x"), move |reply| {
            calls.fetch_add(1, Ordering::SeqCst);
            *seen.lock().unwrap() = reply.get("result").cloned();
        });
    }
    let mut unsolicited = remote.subscribe();
    settle().await;
    connector.open(0);
    settle().await;

    // Act: the reply arrives twice.
    connector.deliver(0, r#"{"req":"1","result":42}"#);
    connector.deliver(0, r#"{"req":"1","result":43}"#);
    settle().await;

    // Assert
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*seen.lock().unwrap(), Some(json!(42)));
    let duplicate = unsolicited.try_recv().expect("duplicate is unsolicited");
    assert_eq!(duplicate.get("result"), Some(&json!(43)));
}

#[tokio::test(start_paused = true)]
async fn test_replies_out_of_order_reach_their_requests() {
    let connector = MockConnector::new();
    let remote = open_manager(&connector, None);
    settle().await;
    connector.open(0);
    settle().await;

    let mut first = task::spawn(remote.request(msg("shader list")));
    let mut second = task::spawn(remote.request(msg("emulator list")));
    settle().await;

    connector.deliver(0, r#"{"req":"2","roms":["tetris"],"status":"ok"}"#);
    connector.deliver(0, r#"{"req":"1","ids":[1,2]}"#);
    settle().await;

    let first = assert_ready!(first.poll()).unwrap();
    let second = assert_ready!(second.poll()).unwrap();
    assert_eq!(first.get("ids"), Some(&json!([1, 2])));
    assert_eq!(second.get("roms"), Some(&json!(["tetris"])));
}

#[tokio::test(start_paused = true)]
async fn test_unmatched_reply_is_broadcast_and_leaves_pending_requests() {
    // Arrange
    let connector = MockConnector::new();
    let remote = open_manager(&connector, None);
    let mut unsolicited = remote.subscribe();
    let mut pending = task::spawn(remote.request(msg("shader list")));
    settle().await;
    connector.open(0);
    settle().await;

    // Act
    connector.deliver(0, r#"{"req":"99","status":"ok"}"#);
    connector.deliver(0, r#"{"poem":"pushed by the wall"}"#);
    settle().await;

    // Assert
    assert_pending!(pending.poll());
    let stray = unsolicited.try_recv().unwrap();
    let pushed = unsolicited.try_recv().unwrap();
    assert_eq!(stray.request_id(), Some(RequestId::new(99)));
    assert_eq!(pushed.get("poem"), Some(&json!("pushed by the wall")));

    connector.deliver(0, r#"{"req":"1","ids":[]}"#);
    settle().await;
    assert!(assert_ready!(pending.poll()).is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_is_dropped_and_receiving_continues() {
    let connector = MockConnector::new();
    let remote = open_manager(&connector, None);
    let mut pending = task::spawn(remote.request(msg("shader list")));
    settle().await;
    connector.open(0);
    settle().await;

    connector.deliver(0, "not json at all");
    connector.deliver(0, "[1,2,3]");
    connector.deliver(0, r#"{"req":"1","ids":[5]}"#);
    settle().await;

    let reply = assert_ready!(pending.poll()).unwrap();
    assert_eq!(reply.get("ids"), Some(&json!([5])));
    assert_eq!(remote.link_state(), LinkState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_pending_request_survives_reconnect() {
    // Arrange: request written on attempt 0, which then drops.
    let connector = MockConnector::new();
    let remote = open_manager(&connector, None);
    settle().await;
    connector.open(0);
    let mut pending = task::spawn(remote.request(msg("shader read").with("id", "4")));
    settle().await;
    connector.close(0);
    settle().await;

    // Act: reconnect and answer on the new transport.
    tokio::time::sleep(RECONNECT).await;
    settle().await;
    connector.open(1);
    settle().await;
    connector.deliver(1, r#"{"req":"1","title":"t","description":"d","source":"s","commit":"c"}"#);
    settle().await;

    // Assert
    let reply = assert_ready!(pending.poll()).unwrap();
    assert_eq!(reply.get("commit"), Some(&json!("c")));
    assert!(connector.written(1).is_empty(), "the request is not resent");
}

// ── Timeouts and dispose ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_request_without_timeout_waits_indefinitely() {
    let connector = MockConnector::new();
    let remote = open_manager(&connector, None);
    let mut pending = task::spawn(remote.request(msg("shader list")));
    settle().await;

    tokio::time::sleep(Duration::from_secs(3600)).await;
    settle().await;

    assert_pending!(pending.poll());
}

#[tokio::test(start_paused = true)]
async fn test_configured_timeout_fails_request() {
    // Arrange
    let connector = MockConnector::new();
    let remote = open_manager(&connector, Some(Duration::from_secs(5)));
    let mut unsolicited = remote.subscribe();
    settle().await;
    connector.open(0);
    let mut pending = task::spawn(remote.request(msg("shader list")));
    settle().await;

    // Act
    tokio::time::sleep(Duration::from_secs(5)).await;
    settle().await;

    // Assert
    let result = assert_ready!(pending.poll());
    assert_eq!(result.unwrap_err(), RequestError::TimedOut(RequestId::new(1)));

    // A late reply no longer matches anything.
    connector.deliver(0, r#"{"req":"1","ids":[]}"#);
    settle().await;
    assert!(unsolicited.try_recv().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_dispose_fails_pending_and_closes_transport() {
    // Arrange
    let connector = MockConnector::new();
    let remote = open_manager(&connector, None);
    settle().await;
    connector.open(0);
    let mut pending = task::spawn(remote.request(msg("shader list")));
    settle().await;

    // Act
    remote.dispose().await;
    settle().await;

    // Assert
    assert_eq!(assert_ready!(pending.poll()).unwrap_err(), RequestError::Disposed);
    assert!(connector.link_dropped(0));
    assert_eq!(remote.link_state(), LinkState::Disconnected);
    let late = remote.request(msg("turnoff")).await;
    assert_eq!(late.unwrap_err(), RequestError::Disposed);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_cancels_scheduled_reconnect() {
    let connector = MockConnector::new();
    let remote = open_manager(&connector, None);
    settle().await;
    connector.close(0);
    settle().await;

    remote.dispose().await;
    tokio::time::sleep(RECONNECT * 3).await;
    settle().await;

    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_wait_open_resolves_on_open() {
    let connector = MockConnector::new();
    let remote = open_manager(&connector, None);
    let mut opened = task::spawn(remote.wait_open());
    settle().await;
    assert_pending!(opened.poll());

    connector.open(0);
    settle().await;

    assert!(assert_ready!(opened.poll()));
}

#[tokio::test(start_paused = true)]
async fn test_flush_waits_for_queue_to_drain_on_open() {
    // Arrange
    let connector = MockConnector::new();
    let remote = open_manager(&connector, None);
    remote.send(msg("emulator input").with("key", "up").with("press", true));
    remote.send(msg("emulator input").with("key", "up").with("press", false));
    let mut flushed = task::spawn(remote.flush());
    assert_pending!(flushed.poll());
    settle().await;

    // Act
    connector.open(0);
    settle().await;

    // Assert
    assert!(assert_ready!(flushed.poll()));
    let frames = parsed(&connector.written(0));
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0]["press"], json!(true));
    assert_eq!(frames[1]["press"], json!(false));
}

#[tokio::test(start_paused = true)]
async fn test_flush_completes_at_once_when_open_and_idle() {
    let connector = MockConnector::new();
    let remote = open_manager(&connector, None);
    settle().await;
    connector.open(0);
    settle().await;

    let mut flushed = task::spawn(remote.flush());
    assert_pending!(flushed.poll());
    settle().await;

    assert!(assert_ready!(flushed.poll()));
}

#[tokio::test(start_paused = true)]
async fn test_flush_stays_pending_across_failed_attempts() {
    // Arrange
    let connector = MockConnector::new();
    let remote = open_manager(&connector, None);
    remote.send(msg("turnoff"));
    let mut flushed = task::spawn(remote.flush());
    assert_pending!(flushed.poll());
    settle().await;

    // Act: the first attempt fails; the reconnect succeeds.
    connector.fail(0, "refused");
    connector.close(0);
    settle().await;
    assert_pending!(flushed.poll());
    tokio::time::sleep(RECONNECT).await;
    settle().await;
    connector.open(1);
    settle().await;

    // Assert
    assert!(assert_ready!(flushed.poll()));
    assert_eq!(parsed(&connector.written(1))[0]["cmd"], json!("turnoff"));
}

#[tokio::test(start_paused = true)]
async fn test_dispose_releases_flush_waiters() {
    let connector = MockConnector::new();
    let remote = open_manager(&connector, None);
    remote.send(msg("turnoff"));
    let mut flushed = task::spawn(remote.flush());
    assert_pending!(flushed.poll());
    settle().await;

    remote.dispose().await;
    settle().await;

    assert!(!assert_ready!(flushed.poll()));
    assert!(!remote.flush().await);
}
