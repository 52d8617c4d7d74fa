//! Monitor loop behaviour with fake source and display

use alarm_monitor::core::DisplayAction;
use alarm_monitor::{
    AlarmSource, DeviceError, FilterEngine, FilterFile, FilterRule, LinkError, Monitor, SourceError, TvController,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Source whose answer the test can swap between cycles
#[derive(Clone, Default)]
struct ScriptedSource {
    answer: Arc<Mutex<Option<Vec<Value>>>>,
    fetches: Arc<Mutex<usize>>,
}

impl ScriptedSource {
    fn set(&self, records: Vec<Value>) {
        *self.answer.lock() = Some(records);
    }

    fn fail(&self) {
        *self.answer.lock() = None;
    }
}

#[async_trait]
impl AlarmSource for ScriptedSource {
    async fn fetch(&self) -> Result<Vec<Value>, SourceError> {
        *self.fetches.lock() += 1;
        self.answer
            .lock()
            .clone()
            .ok_or_else(|| SourceError::Status { status: 503 })
    }
}

#[derive(Clone, Default)]
struct RecordingTv {
    on: Arc<Mutex<bool>>,
    status_fails: Arc<Mutex<bool>>,
    unreachable: Arc<Mutex<bool>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingTv {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl TvController for RecordingTv {
    fn name(&self) -> &str {
        "recording"
    }

    async fn connect(&self) -> Result<(), DeviceError> {
        self.calls.lock().push("connect".into());
        Ok(())
    }

    async fn is_screen_on(&self) -> Result<bool, DeviceError> {
        if *self.status_fails.lock() {
            return Err(DeviceError::Command {
                command: "pow 0".into(),
                reason: "no power status in output".into(),
            });
        }
        Ok(*self.on.lock())
    }

    async fn turn_on(&self) -> Result<(), DeviceError> {
        *self.on.lock() = true;
        self.calls.lock().push("on".into());
        Ok(())
    }

    async fn turn_off(&self) -> Result<(), DeviceError> {
        self.calls.lock().push("off".into());
        if *self.unreachable.lock() {
            return Err(LinkError::Connection("ws://tv:3000/: connection refused".into()).into());
        }
        *self.on.lock() = false;
        Ok(())
    }

    async fn disconnect(&self) {
        self.calls.lock().push("disconnect".into());
    }
}

fn alarm(id: i64, kind: &str, at: DateTime<Utc>) -> Value {
    json!({"id": id.to_string(), "originatedAt": at.to_rfc3339(), "keywords": [{"name": kind}]})
}

fn monitor(source: &ScriptedSource, tv: &RecordingTv) -> Monitor {
    Monitor::new(
        Box::new(source.clone()),
        Box::new(tv.clone()),
        FilterEngine::new(chrono::Duration::minutes(10)),
        FilterFile::fixed(vec![
            FilterRule::exclude("keywords.name", "exercise"),
            FilterRule::include("keywords.name", "rescue"),
        ]),
        Duration::from_millis(20),
    )
}

#[tokio::test]
async fn test_display_follows_alarm_lifetime() {
    let source = ScriptedSource::default();
    let tv = RecordingTv::default();
    let mut monitor = monitor(&source, &tv);
    let start = Utc::now();

    source.set(vec![alarm(1, "Rescue", start), alarm(2, "Exercise", start)]);
    let report = monitor.run_cycle(start).await;
    assert_eq!(report.new_alarms, 1);
    assert_eq!(report.action, DisplayAction::TurnedOn);
    assert!(monitor.alarms().get(1).is_some());
    assert!(monitor.alarms().get(2).is_none());

    let report = monitor.run_cycle(start + chrono::Duration::minutes(5)).await;
    assert_eq!(report.action, DisplayAction::KeptOn);

    source.set(vec![]);
    let report = monitor.run_cycle(start + chrono::Duration::minutes(11)).await;
    assert_eq!(report.expired, 1);
    assert_eq!(report.action, DisplayAction::TurnedOff);

    let report = monitor.run_cycle(start + chrono::Duration::minutes(12)).await;
    assert_eq!(report.action, DisplayAction::Idle);

    assert_eq!(tv.calls(), vec!["on", "off"]);
    assert!(!monitor.state().display_claimed);
}

#[tokio::test]
async fn test_unclaimed_display_is_left_alone() {
    let source = ScriptedSource::default();
    let tv = RecordingTv::default();
    *tv.on.lock() = true;
    let mut monitor = monitor(&source, &tv);

    source.set(vec![alarm(5, "exercise", Utc::now())]);
    let report = monitor.run_cycle(Utc::now()).await;

    assert_eq!(report.detected, 0);
    assert_eq!(report.action, DisplayAction::Idle);
    assert!(tv.calls().is_empty());
    assert!(*tv.on.lock());
}

#[tokio::test]
async fn test_source_failure_counts_as_no_alarms() {
    let source = ScriptedSource::default();
    let tv = RecordingTv::default();
    let mut monitor = monitor(&source, &tv);
    let start = Utc::now();

    source.set(vec![alarm(3, "rescue", start)]);
    monitor.run_cycle(start).await;

    // active alarms survive a failing source until they expire
    source.fail();
    let report = monitor.run_cycle(start + chrono::Duration::minutes(1)).await;
    assert_eq!(report.fetched, 0);
    assert_eq!(report.active, 1);
    assert_eq!(monitor.state().source_errors, 1);

    let report = monitor.run_cycle(start + chrono::Duration::minutes(20)).await;
    assert_eq!(report.action, DisplayAction::TurnedOff);
}

#[tokio::test]
async fn test_failed_status_check_still_turns_on() {
    let source = ScriptedSource::default();
    let tv = RecordingTv::default();
    *tv.status_fails.lock() = true;
    let mut monitor = monitor(&source, &tv);

    source.set(vec![alarm(4, "rescue", Utc::now())]);
    let report = monitor.run_cycle(Utc::now()).await;

    assert_eq!(report.action, DisplayAction::TurnedOn);
    assert_eq!(tv.calls(), vec!["on"]);
}

#[tokio::test]
async fn test_unreachable_display_releases_claim() {
    let source = ScriptedSource::default();
    let tv = RecordingTv::default();
    let mut monitor = monitor(&source, &tv);
    let start = Utc::now();

    source.set(vec![alarm(6, "rescue", start)]);
    monitor.run_cycle(start).await;
    assert!(monitor.state().display_claimed);

    // switched off by hand, so the socket is gone
    *tv.unreachable.lock() = true;
    source.set(vec![]);
    let report = monitor.run_cycle(start + chrono::Duration::minutes(11)).await;
    assert_eq!(report.action, DisplayAction::TurnedOff);
    assert!(!monitor.state().display_claimed);
    assert_eq!(monitor.state().controller_errors, 0);

    let report = monitor.run_cycle(start + chrono::Duration::minutes(12)).await;
    assert_eq!(report.action, DisplayAction::Idle);
    assert_eq!(tv.calls(), vec!["on", "off"]);
}

#[tokio::test]
async fn test_shutdown_stops_loop_and_disconnects() {
    let source = ScriptedSource::default();
    source.set(vec![]);
    let tv = RecordingTv::default();
    let mut monitor = monitor(&source, &tv);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(async move {
        monitor.run(shutdown_rx).await.unwrap();
        monitor
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.send(()).unwrap();

    let monitor = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("monitor did not stop")
        .unwrap();

    assert!(!monitor.state().running);
    assert!(monitor.state().cycles >= 2);
    assert!(*source.fetches.lock() >= 2);

    let calls = tv.calls();
    assert_eq!(calls.first().map(String::as_str), Some("connect"));
    assert_eq!(calls.last().map(String::as_str), Some("disconnect"));
}

#[tokio::test]
async fn test_pending_shutdown_skips_cycle() {
    let source = ScriptedSource::default();
    source.set(vec![]);
    let tv = RecordingTv::default();
    let mut monitor = monitor(&source, &tv);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    shutdown_tx.send(()).unwrap();
    monitor.run(shutdown_rx).await.unwrap();

    assert_eq!(monitor.state().cycles, 0);
    assert_eq!(*source.fetches.lock(), 0);
    assert_eq!(tv.calls(), vec!["connect", "disconnect"]);
}
