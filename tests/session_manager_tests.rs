// Session state machine tests against mocked collaborators, driving the
// timers on tokio's paused test clock.

mod common;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{advance_ms, harness, settle, MockBackend};
use taperd::session::{KeepAlive, NotificationPresenter, SessionManager, StateSnapshot, WakeLock};

#[tokio::test(start_paused = true)]
async fn start_twice_allocates_one_resource() {
    let h = harness(MockBackend::new());

    assert!(h.manager.start("a.m4a", None).await.unwrap());
    assert!(!h.manager.start("b.m4a", None).await.unwrap());

    assert_eq!(h.backend.opens(), 1);
    let snapshot = h.manager.snapshot().await;
    assert_eq!(snapshot.output_path.as_deref(), Some("a_0001.m4a"));

    assert!(h.manager.stop().await);
    assert_eq!(h.backend.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn rotation_produces_contiguous_chunks() {
    let h = harness(MockBackend::new());

    assert!(h.manager.start("b.m4a", Some(1000)).await.unwrap());
    advance_ms(2500).await;

    // Two full periods elapsed: index went 1 -> 2 -> 3.
    assert_eq!(h.backend.opens(), 3);
    assert_eq!(h.backend.stops(), 2);
    assert_eq!(
        h.backend.paths(),
        vec![
            PathBuf::from("b_0001.m4a"),
            PathBuf::from("b_0002.m4a"),
            PathBuf::from("b_0003.m4a"),
        ]
    );

    let snapshot = h.manager.snapshot().await;
    assert_eq!(snapshot.output_path.as_deref(), Some("b_0003.m4a"));

    assert!(h.manager.stop().await);
    assert_eq!(h.backend.stops(), 3);
}

#[tokio::test(start_paused = true)]
async fn no_rotation_without_chunk_duration() {
    let h = harness(MockBackend::new());

    assert!(h.manager.start("single.m4a", None).await.unwrap());
    advance_ms(5000).await;

    assert_eq!(h.backend.opens(), 1);
    let snapshot = h.manager.snapshot().await;
    assert_eq!(snapshot.output_path.as_deref(), Some("single_0001.m4a"));
}

#[tokio::test(start_paused = true)]
async fn pause_freezes_rotation() {
    let h = harness(MockBackend::new());

    assert!(h.manager.start("p.m4a", Some(1000)).await.unwrap());
    assert!(h.manager.pause().await);
    assert_eq!(h.backend.pauses(), 1);

    // Several full periods elapse while paused: no rotation occurs.
    advance_ms(3500).await;
    assert_eq!(h.backend.opens(), 1);

    let snapshot = h.manager.snapshot().await;
    assert!(snapshot.is_recording);
    assert!(snapshot.is_paused);
    assert_eq!(snapshot.output_path.as_deref(), Some("p_0001.m4a"));
}

#[tokio::test(start_paused = true)]
async fn resume_restarts_timer_at_full_period() {
    let h = harness(MockBackend::new());

    assert!(h.manager.start("r.m4a", Some(1000)).await.unwrap());
    // 600ms into the first period, pause; the remaining 400ms must not
    // carry over across the resume.
    advance_ms(600).await;
    assert!(h.manager.pause().await);
    advance_ms(10_000).await;
    assert!(h.manager.resume().await);

    advance_ms(999).await;
    assert_eq!(h.backend.opens(), 1, "rotated before a full period elapsed");

    advance_ms(1).await;
    assert_eq!(h.backend.opens(), 2);
    let snapshot = h.manager.snapshot().await;
    assert_eq!(snapshot.output_path.as_deref(), Some("r_0002.m4a"));
}

#[tokio::test(start_paused = true)]
async fn stop_releases_everything_exactly_once() {
    let h = harness(MockBackend::new());

    assert!(h.manager.start("s.m4a", Some(1000)).await.unwrap());
    assert_eq!(h.wake.acquired.load(Ordering::SeqCst), 1);

    assert!(h.manager.stop().await);
    assert_eq!(h.backend.stops(), 1);
    assert_eq!(h.wake.released.load(Ordering::SeqCst), 1);
    assert_eq!(h.notifier.cancels.load(Ordering::SeqCst), 1);

    // Stop and teardown stay idempotent.
    assert!(!h.manager.stop().await);
    h.manager.teardown().await;
    h.manager.teardown().await;
    assert_eq!(h.backend.stops(), 1);
    assert_eq!(h.wake.released.load(Ordering::SeqCst), 1);
    assert_eq!(h.notifier.cancels.load(Ordering::SeqCst), 1);

    // No stray rotations after teardown.
    advance_ms(3000).await;
    assert_eq!(h.backend.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_holds_the_sequencer_until_the_resource_is_released() {
    let h = harness(MockBackend::with_slow_close(Duration::from_millis(200)));

    assert!(h.manager.start("s.m4a", None).await.unwrap());

    let manager = Arc::clone(&h.manager);
    let stop = tokio::spawn(async move { manager.stop().await });
    settle().await;

    // The stop is mid-close. A start arriving now must wait its turn, not
    // open a second capture resource.
    let manager = Arc::clone(&h.manager);
    let restart = tokio::spawn(async move { manager.start("t.m4a", None).await });
    settle().await;
    assert_eq!(h.backend.opens(), 1);

    advance_ms(300).await;
    assert!(stop.await.unwrap());
    assert!(restart.await.unwrap().unwrap());

    assert_eq!(h.backend.overlapping_opens(), 0);
    assert_eq!(h.backend.opens(), 2);
    assert_eq!(h.backend.stops(), 1);
    let snapshot = h.manager.snapshot().await;
    assert_eq!(snapshot.output_path.as_deref(), Some("t_0001.m4a"));

    assert!(h.manager.stop().await);
    assert_eq!(h.backend.stops(), 2);
}

#[tokio::test(start_paused = true)]
async fn pause_unsupported_is_a_noop() {
    let h = harness(MockBackend::without_pause());

    assert!(h.manager.start("u.m4a", None).await.unwrap());
    assert!(!h.manager.pause().await);

    let snapshot = h.manager.snapshot().await;
    assert!(snapshot.is_recording);
    assert!(!snapshot.is_paused);
}

#[tokio::test(start_paused = true)]
async fn commands_while_idle_are_noops() {
    let h = harness(MockBackend::new());

    assert!(!h.manager.pause().await);
    assert!(!h.manager.resume().await);
    assert!(!h.manager.stop().await);
    assert_eq!(h.manager.snapshot().await, StateSnapshot::idle());
    assert_eq!(h.wake.acquired.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_start_rolls_back_to_idle() {
    let h = harness(MockBackend::failing_open_at(1));

    assert!(h.manager.start("f.m4a", Some(1000)).await.is_err());

    assert_eq!(h.manager.snapshot().await, StateSnapshot::idle());
    assert_eq!(h.wake.acquired.load(Ordering::SeqCst), 0);
    assert!(h.notifier.shown.lock().unwrap().is_empty());
    assert!(!h.manager.stop().await);

    // The worker stays usable: a later start succeeds.
    assert!(h.manager.start("f.m4a", None).await.unwrap());
    assert!(h.manager.stop().await);
}

#[tokio::test(start_paused = true)]
async fn failed_rotation_abandons_rotation_but_session_survives() {
    let h = harness(MockBackend::failing_open_at(2));

    assert!(h.manager.start("g.m4a", Some(1000)).await.unwrap());
    advance_ms(1000).await;

    // The finished chunk was finalized, the new open failed.
    assert_eq!(h.backend.stops(), 1);
    assert_eq!(h.backend.opens(), 2);

    // No retries for the remainder of the session.
    advance_ms(5000).await;
    assert_eq!(h.backend.opens(), 2);

    let snapshot = h.manager.snapshot().await;
    assert!(snapshot.is_recording);
    assert_eq!(snapshot.output_path.as_deref(), Some("g_0001.m4a"));

    // Stop still tears down cleanly; the sink is already released.
    assert!(h.manager.stop().await);
    assert_eq!(h.backend.stops(), 1);
    assert_eq!(h.wake.released.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn pause_after_abandoned_rotation_is_refused() {
    let h = harness(MockBackend::failing_open_at(2));

    assert!(h.manager.start("g.m4a", Some(1000)).await.unwrap());
    advance_ms(1000).await;

    // There is no open sink left to pause, so the command is refused
    // without touching the recorder.
    assert!(!h.manager.pause().await);
    assert_eq!(h.backend.pauses(), 0);
    assert!(!h.manager.resume().await);

    let snapshot = h.manager.snapshot().await;
    assert!(snapshot.is_recording);
    assert!(!snapshot.is_paused);

    assert!(h.manager.stop().await);
}

#[tokio::test(start_paused = true)]
async fn scenario_walkthrough_without_chunking() {
    let h = harness(MockBackend::new());

    assert!(h.manager.start("a.m4a", None).await.unwrap());
    let s = h.manager.snapshot().await;
    assert!(s.is_recording && !s.is_paused);
    assert_eq!(s.output_path.as_deref(), Some("a_0001.m4a"));

    assert!(h.manager.pause().await);
    let s = h.manager.snapshot().await;
    assert!(s.is_recording && s.is_paused);
    assert_eq!(s.output_path.as_deref(), Some("a_0001.m4a"));

    assert!(h.manager.resume().await);
    let s = h.manager.snapshot().await;
    assert!(s.is_recording && !s.is_paused);

    assert!(h.manager.stop().await);
    assert_eq!(h.manager.snapshot().await, StateSnapshot::idle());
}

#[tokio::test(start_paused = true)]
async fn heartbeat_refreshes_notification_with_pause_state() {
    let backend = MockBackend::new();
    let wake = Arc::new(common::MockWakeLock::default());
    let notifier = Arc::new(common::MockNotifier::default());
    let keepalive = Arc::new(KeepAlive::new(
        Arc::clone(&wake) as Arc<dyn WakeLock>,
        Arc::clone(&notifier) as Arc<dyn NotificationPresenter>,
    ));
    let manager = Arc::new(SessionManager::with_heartbeat_interval(
        backend,
        keepalive,
        Duration::from_millis(500),
    ));

    assert!(manager.start("h.m4a", None).await.unwrap());
    advance_ms(1000).await;

    {
        let shown = notifier.shown.lock().unwrap();
        // Initial show on engage plus two heartbeats.
        assert!(shown.len() >= 3, "expected heartbeat refreshes, got {shown:?}");
        assert!(shown.last().unwrap().contains("Recording: h_0001.m4a"));
    }

    assert!(manager.pause().await);
    advance_ms(500).await;
    {
        let shown = notifier.shown.lock().unwrap();
        assert!(shown.last().unwrap().contains("paused"));
    }

    assert!(manager.stop().await);
    let count_after_stop = notifier.shown.lock().unwrap().len();
    advance_ms(2000).await;
    assert_eq!(notifier.shown.lock().unwrap().len(), count_after_stop);
}
