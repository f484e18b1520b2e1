//! End-to-end engine scenarios on a paused tokio clock

use async_trait::async_trait;
use faultline_common::{EngineConfig, ErrorEvent, ErrorKind};
use faultlined::{
    recovery_fn, ErrorEngine, Notification, RecoveryAction, RecoveryPhase, ReportOutcome,
    Subsystem,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

const POLL: Duration = Duration::from_millis(10);

fn config() -> EngineConfig {
    EngineConfig::default()
}

/// Records when it was called, relative to `start`, and always fails
struct TimedFailure {
    start: Instant,
    calls: Mutex<Vec<Duration>>,
}

impl TimedFailure {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            start: Instant::now(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_secs(&self) -> Vec<u64> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.as_secs_f64().round() as u64)
            .collect()
    }
}

#[async_trait]
impl RecoveryAction for TimedFailure {
    async fn recover(&self, _event: &ErrorEvent) -> anyhow::Result<bool> {
        self.calls.lock().unwrap().push(self.start.elapsed());
        Ok(false)
    }
}

fn collect(engine: &ErrorEngine) -> Arc<Mutex<Vec<Notification>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    engine.add_observer(Arc::new(move |n: &Notification| {
        sink.lock().unwrap().push(n.clone());
    }));
    seen
}

fn count(seen: &Mutex<Vec<Notification>>, name: &str) -> usize {
    seen.lock()
        .unwrap()
        .iter()
        .filter(|n| n.name() == name)
        .count()
}

struct Effects {
    enabled: AtomicBool,
}

impl Subsystem for Effects {
    fn name(&self) -> &str {
        "effects"
    }

    fn enable(&self) -> anyhow::Result<()> {
        self.enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disable(&self) -> anyhow::Result<()> {
        self.enabled.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn duplicate_within_cooldown_is_suppressed() {
    let engine = ErrorEngine::new(EngineConfig {
        enable_auto_recovery: false,
        ..config()
    })
    .unwrap();

    assert!(engine.report(ErrorKind::AnchorFailure, "first").is_accepted());
    assert_eq!(
        engine.report(ErrorKind::AnchorFailure, "burst"),
        ReportOutcome::Suppressed
    );
    assert!(engine.report(ErrorKind::AssetLoadFailure, "other kind").is_accepted());
    assert_eq!(engine.history().len(), 2);

    tokio::time::advance(Duration::from_millis(2100)).await;
    assert!(engine.report(ErrorKind::AnchorFailure, "later").is_accepted());

    let anchors = engine
        .history()
        .iter()
        .filter(|r| r.event.kind == ErrorKind::AnchorFailure)
        .count();
    assert_eq!(anchors, 2);
}

#[tokio::test(start_paused = true)]
async fn suppressed_report_emits_nothing() {
    let engine = ErrorEngine::new(config()).unwrap();
    engine.register_recovery(ErrorKind::ProcessingFailure, recovery_fn(|_| true));
    let seen = collect(&engine);

    engine.report(ErrorKind::ProcessingFailure, "shader failed");
    let after_first = seen.lock().unwrap().len();
    engine.report(ErrorKind::ProcessingFailure, "shader failed again");

    assert_eq!(seen.lock().unwrap().len(), after_first);
    assert_eq!(engine.history().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn ledger_holds_at_most_capacity() {
    let engine = ErrorEngine::new(EngineConfig {
        enable_auto_recovery: false,
        error_cooldown_secs: 0.0,
        max_error_history_size: 100,
        ..config()
    })
    .unwrap();

    for i in 1..=101 {
        engine.report(ErrorKind::ThroughputDegradation, format!("dip #{}", i));
    }

    let history = engine.history();
    assert_eq!(history.len(), 100);
    assert_eq!(history[0].event.message, "dip #2");
    assert_eq!(history[99].event.message, "dip #101");
    assert_eq!(engine.recent_errors(1)[0].event.message, "dip #101");
}

#[tokio::test(start_paused = true)]
async fn failing_asset_load_backs_off_then_gives_up() {
    let engine = ErrorEngine::new(config()).unwrap();
    let action = TimedFailure::new();
    engine.register_recovery(ErrorKind::AssetLoadFailure, action.clone());
    let seen = collect(&engine);

    let outcome = engine.report(ErrorKind::AssetLoadFailure, "texture missing");
    assert_eq!(
        outcome,
        ReportOutcome::Accepted {
            recovery_scheduled: true
        }
    );
    assert_eq!(
        engine.recovery_state(ErrorKind::AssetLoadFailure).phase,
        RecoveryPhase::Scheduled
    );

    engine.wait_idle(POLL).await;

    // Delays of 1s, 2s, 4s after the report
    assert_eq!(action.call_secs(), vec![1, 3, 7]);
    assert_eq!(engine.recovery_state(ErrorKind::AssetLoadFailure).attempts, 3);
    assert_eq!(count(&seen, "unrecoverable"), 1);
    assert_eq!(count(&seen, "error_recovered"), 0);
    assert!(!engine.is_safe_mode());
    assert_eq!(count(&seen, "safe_mode_entered"), 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_kind_is_not_rescheduled() {
    let engine = ErrorEngine::new(config()).unwrap();
    let action = TimedFailure::new();
    engine.register_recovery(ErrorKind::AssetLoadFailure, action.clone());

    engine.report(ErrorKind::AssetLoadFailure, "texture missing");
    engine.wait_idle(POLL).await;

    let outcome = engine.report(ErrorKind::AssetLoadFailure, "texture missing again");
    assert_eq!(
        outcome,
        ReportOutcome::Accepted {
            recovery_scheduled: false
        }
    );
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(action.call_secs().len(), 3);
    assert_eq!(engine.recovery_state(ErrorKind::AssetLoadFailure).attempts, 3);
    let history = engine.history();
    assert!(history[0].recovery_attempted);
    assert!(!history[1].recovery_attempted);
}

#[tokio::test(start_paused = true)]
async fn unrecoverable_critical_enters_safe_mode_once() {
    let engine = ErrorEngine::new(EngineConfig {
        max_recovery_attempts: 1,
        ..config()
    })
    .unwrap();
    engine.register_recovery(ErrorKind::TrackingLoss, recovery_fn(|_| false));
    engine.register_recovery(ErrorKind::CaptureDeviceFailure, recovery_fn(|_| false));
    let effects = Arc::new(Effects {
        enabled: AtomicBool::new(true),
    });
    engine.register_subsystem(effects.clone(), false);
    let seen = collect(&engine);

    engine.report(ErrorKind::TrackingLoss, "tracking lost");
    engine.wait_idle(POLL).await;

    assert!(engine.is_safe_mode());
    assert!(!effects.enabled.load(Ordering::SeqCst));
    assert_eq!(engine.safe_mode_status().disabled, vec!["effects"]);

    // A second critical exhaustion does not re-enter
    engine.report(ErrorKind::CaptureDeviceFailure, "camera gone");
    engine.wait_idle(POLL).await;

    assert_eq!(count(&seen, "unrecoverable"), 2);
    assert_eq!(count(&seen, "safe_mode_entered"), 1);

    assert!(engine.exit_safe_mode());
    assert!(effects.enabled.load(Ordering::SeqCst));
    assert_eq!(count(&seen, "safe_mode_exited"), 1);
}

#[tokio::test(start_paused = true)]
async fn success_resets_attempts_and_notifies_once() {
    let engine = ErrorEngine::new(config()).unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    // Fails once, then recovers
    engine.register_recovery(
        ErrorKind::AnchorFailure,
        recovery_fn(move |_| counter.fetch_add(1, Ordering::SeqCst) >= 1),
    );
    let seen = collect(&engine);

    engine.report(ErrorKind::AnchorFailure, "anchor drifted");
    let reported_id = engine.history()[0].event.id;
    engine.wait_idle(POLL).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(engine.recovery_state(ErrorKind::AnchorFailure).attempts, 0);

    let recovered: Vec<_> = seen
        .lock()
        .unwrap()
        .iter()
        .filter_map(|n| match n {
            Notification::ErrorRecovered(event) => Some(event.id),
            _ => None,
        })
        .collect();
    assert_eq!(recovered, vec![reported_id]);

    let record = &engine.history()[0];
    assert!(record.recovery_successful);

    let stats = engine.statistics();
    assert_eq!(stats.total_recovery_attempts, 1);
    assert_eq!(stats.successful_recoveries, 1);
    assert_eq!(stats.success_rate, 1.0);
}

#[tokio::test(start_paused = true)]
async fn clear_history_resets_everything() {
    let engine = ErrorEngine::new(config()).unwrap();
    engine.register_recovery(ErrorKind::AssetLoadFailure, recovery_fn(|_| false));

    engine.report(ErrorKind::AssetLoadFailure, "texture missing");
    engine.report(ErrorKind::InteractionFailure, "tap ignored");
    engine.wait_idle(POLL).await;
    assert_eq!(engine.recovery_state(ErrorKind::AssetLoadFailure).attempts, 3);

    engine.clear_history();

    assert!(engine.history().is_empty());
    assert_eq!(engine.recovery_state(ErrorKind::AssetLoadFailure).attempts, 0);
    let stats = engine.statistics();
    assert_eq!(stats.total_errors, 0);
    assert_eq!(stats.total_recovery_attempts, 0);
    assert_eq!(stats.successful_recoveries, 0);
    assert_eq!(stats.success_rate, 0.0);
    assert!(stats.by_kind.is_empty());

    // Budget is available again
    tokio::time::advance(Duration::from_secs(3)).await;
    let outcome = engine.report(ErrorKind::AssetLoadFailure, "texture missing");
    assert_eq!(
        outcome,
        ReportOutcome::Accepted {
            recovery_scheduled: true
        }
    );
    engine.shutdown();
}

#[tokio::test(start_paused = true)]
async fn force_recovery_leaves_attempts_alone() {
    let engine = ErrorEngine::new(EngineConfig {
        enable_auto_recovery: false,
        ..config()
    })
    .unwrap();
    engine.register_recovery(ErrorKind::ResourcePressure, recovery_fn(|_| true));

    assert!(engine.force_recovery(ErrorKind::ResourcePressure).await);
    assert_eq!(engine.recovery_state(ErrorKind::ResourcePressure).attempts, 0);

    // Nothing registered
    assert!(!engine.force_recovery(ErrorKind::DataCorruption).await);
}

#[tokio::test(start_paused = true)]
async fn force_recovery_keeps_exhausted_counter() {
    let engine = ErrorEngine::new(EngineConfig {
        max_recovery_attempts: 1,
        ..config()
    })
    .unwrap();
    let fixed = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fixed);
    engine.register_recovery(
        ErrorKind::AssetLoadFailure,
        recovery_fn(move |_| flag.load(Ordering::SeqCst)),
    );

    engine.report(ErrorKind::AssetLoadFailure, "texture missing");
    engine.wait_idle(POLL).await;
    assert_eq!(engine.recovery_state(ErrorKind::AssetLoadFailure).attempts, 1);

    fixed.store(true, Ordering::SeqCst);
    assert!(engine.force_recovery(ErrorKind::AssetLoadFailure).await);
    assert_eq!(engine.recovery_state(ErrorKind::AssetLoadFailure).attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_pending_recovery() {
    let engine = ErrorEngine::new(config()).unwrap();
    let action = TimedFailure::new();
    engine.register_recovery(ErrorKind::AssetLoadFailure, action.clone());

    engine.report(ErrorKind::AssetLoadFailure, "texture missing");
    assert!(engine.cancel_recovery(ErrorKind::AssetLoadFailure));
    assert!(!engine.cancel_recovery(ErrorKind::AssetLoadFailure));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(action.call_secs().is_empty());
    assert_eq!(
        engine.recovery_state(ErrorKind::AssetLoadFailure).phase,
        RecoveryPhase::Idle
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_mid_backoff() {
    let engine = ErrorEngine::new(config()).unwrap();
    let action = TimedFailure::new();
    engine.register_recovery(ErrorKind::AssetLoadFailure, action.clone());

    engine.report(ErrorKind::AssetLoadFailure, "texture missing");
    // First attempt at 1s, next would be at 3s
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(action.call_secs(), vec![1]);

    engine.shutdown();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(action.call_secs(), vec![1]);
    assert!(engine.recovery_state(ErrorKind::AssetLoadFailure).attempts <= 3);
}

#[tokio::test(start_paused = true)]
async fn platform_log_lines_drive_recovery() {
    let engine = ErrorEngine::new(config()).unwrap();
    engine.register_recovery(ErrorKind::CaptureDeviceFailure, recovery_fn(|_| true));

    let lines = [
        "AVCaptureSession: camera was interrupted",
        "",
        "AVCaptureSession: camera was interrupted",
        "Vision: colour histogram analysis failed",
    ];
    let accepted = lines
        .iter()
        .filter_map(|l| engine.ingest_log_line(l))
        .filter(|o| o.is_accepted())
        .count();
    assert_eq!(accepted, 2);

    engine.wait_idle(POLL).await;

    let stats = engine.statistics();
    assert_eq!(stats.by_kind.get(&ErrorKind::CaptureDeviceFailure), Some(&1));
    assert_eq!(stats.by_kind.get(&ErrorKind::AnalysisFailure), Some(&1));
    assert!(!engine.is_safe_mode());
}

#[tokio::test(start_paused = true)]
async fn broadcast_subscriber_sees_report_then_message() {
    let engine = ErrorEngine::new(EngineConfig {
        enable_auto_recovery: false,
        ..config()
    })
    .unwrap();
    let mut rx = engine.subscribe();

    engine.report(ErrorKind::DataCorruption, "bad blob");

    match rx.recv().await.unwrap() {
        Notification::ErrorOccurred(event) => assert_eq!(event.kind, ErrorKind::DataCorruption),
        other => panic!("unexpected {:?}", other),
    }
    match rx.recv().await.unwrap() {
        Notification::UserMessage { kind, text, .. } => {
            assert_eq!(kind, ErrorKind::DataCorruption);
            assert!(!text.is_empty());
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn panicking_observer_does_not_break_report() {
    let engine = ErrorEngine::new(config()).unwrap();
    engine.register_recovery(ErrorKind::AssetLoadFailure, recovery_fn(|_| true));
    engine.add_observer(Arc::new(|_: &Notification| panic!("observer bug")));
    let seen = collect(&engine);

    let outcome = engine.report(ErrorKind::AssetLoadFailure, "texture missing");
    assert_eq!(
        outcome,
        ReportOutcome::Accepted {
            recovery_scheduled: true
        }
    );
    assert_eq!(
        engine.recovery_state(ErrorKind::AssetLoadFailure).phase,
        RecoveryPhase::Scheduled
    );

    engine.wait_idle(POLL).await;
    assert_eq!(count(&seen, "error_recovered"), 1);
    assert!(engine.history()[0].recovery_successful);
}

#[tokio::test(start_paused = true)]
async fn panicking_observer_does_not_block_safe_mode() {
    let engine = ErrorEngine::new(EngineConfig {
        max_recovery_attempts: 1,
        ..config()
    })
    .unwrap();
    engine.register_recovery(ErrorKind::TrackingLoss, recovery_fn(|_| false));
    engine.add_observer(Arc::new(|n: &Notification| {
        if let Notification::Unrecoverable { .. } = n {
            panic!("observer bug");
        }
    }));

    engine.report(ErrorKind::TrackingLoss, "tracking lost");
    engine.wait_idle(POLL).await;

    assert_eq!(engine.recovery_state(ErrorKind::TrackingLoss).attempts, 1);
    assert!(engine.is_safe_mode());
}

#[tokio::test(start_paused = true)]
async fn repeat_report_joins_the_running_recovery() {
    let engine = ErrorEngine::new(EngineConfig {
        error_cooldown_secs: 0.0,
        ..config()
    })
    .unwrap();
    let action = TimedFailure::new();
    engine.register_recovery(ErrorKind::AssetLoadFailure, action.clone());

    let first = engine.report(ErrorKind::AssetLoadFailure, "texture missing");
    let second = engine.report(ErrorKind::AssetLoadFailure, "texture still missing");
    assert_eq!(
        first,
        ReportOutcome::Accepted {
            recovery_scheduled: true
        }
    );
    assert_eq!(
        second,
        ReportOutcome::Accepted {
            recovery_scheduled: false
        }
    );

    // Mid-run, between the first and second attempts
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let third = engine.report(ErrorKind::AssetLoadFailure, "texture gone");
    assert_eq!(
        third,
        ReportOutcome::Accepted {
            recovery_scheduled: false
        }
    );

    engine.wait_idle(POLL).await;
    assert_eq!(action.call_secs(), vec![1, 3, 7]);
    assert_eq!(engine.history().len(), 3);
}
