// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarm-monitor

//! Monitor - polls alarms and keeps the display on while any are active

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, error, info, warn};

use super::MonitorState;
use crate::alarms::AlarmSet;
use crate::config::Config;
use crate::dashboard::DashboardCheck;
use crate::device::{build_controller, TvController};
use crate::error::{DeviceError, LinkError};
use crate::filter::{FilterEngine, FilterFile};
use crate::source::{AlarmSource, HttpAlarmSource};

/// What a cycle did to the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayAction {
    /// No alarms and nothing claimed
    Idle,
    /// Alarms active, display already on
    KeptOn,
    /// Alarms active and the display was switched on
    TurnedOn,
    /// Alarms gone and the display was switched off
    TurnedOff,
    /// The controller call failed; retried next cycle
    Failed,
}

/// Outcome of one poll cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Raw records returned by the source
    pub fetched: usize,
    /// Records that passed the filter
    pub detected: usize,
    /// Alarms not seen before
    pub new_alarms: usize,
    /// Alarms pruned this cycle
    pub expired: usize,
    /// Alarms still active
    pub active: usize,
    /// What happened to the display
    pub action: DisplayAction,
}

/// Polls the alarm source and switches the display
pub struct Monitor {
    source: Box<dyn AlarmSource>,
    controller: Box<dyn TvController>,
    engine: FilterEngine,
    filters: FilterFile,
    alarms: AlarmSet,
    dashboard: Option<DashboardCheck>,
    toast_on_alarm: bool,
    poll_interval: Duration,
    state: MonitorState,
}

impl Monitor {
    /// Monitor over the given parts with no dashboard check and no toasts.
    pub fn new(
        source: Box<dyn AlarmSource>,
        controller: Box<dyn TvController>,
        engine: FilterEngine,
        filters: FilterFile,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            controller,
            engine,
            filters,
            alarms: AlarmSet::new(),
            dashboard: None,
            toast_on_alarm: false,
            poll_interval,
            state: MonitorState::default(),
        }
    }

    /// Wire up the HTTP source, configured controller and optional dashboard check.
    pub fn from_config(config: &Config, filter_path: PathBuf) -> Result<Self> {
        let source = HttpAlarmSource::new(
            config.source.clone(),
            chrono::Duration::seconds(config.alarm.lookback_secs as i64),
        )
        .context("creating alarm source client")?;

        let controller = build_controller(&config.device);
        let engine = FilterEngine::new(chrono::Duration::seconds(config.alarm.keep_active_secs as i64));

        let mut monitor = Self::new(
            Box::new(source),
            controller,
            engine,
            FilterFile::new(filter_path),
            Duration::from_secs(config.alarm.poll_interval_secs),
        )
        .with_toasts(config.toast_on_alarm);

        if config.dashboard.enabled {
            let check = DashboardCheck::new(config.dashboard.clone()).context("creating dashboard client")?;
            monitor = monitor.with_dashboard(check);
        }

        Ok(monitor)
    }

    /// Check the dashboard tab every cycle.
    pub fn with_dashboard(mut self, check: DashboardCheck) -> Self {
        self.dashboard = Some(check);
        self
    }

    /// Toast each new alarm on the display.
    pub fn with_toasts(mut self, enabled: bool) -> Self {
        self.toast_on_alarm = enabled;
        self
    }

    /// Counters so far
    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Currently active alarms
    pub fn alarms(&self) -> &AlarmSet {
        &self.alarms
    }

    /// Display controller in use
    pub fn controller(&self) -> &dyn TvController {
        self.controller.as_ref()
    }

    /// One poll: refresh rules, fetch, filter, merge, prune, then drive the display.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleReport {
        match self.filters.refresh() {
            Ok(true) => info!("Applied {} filter rules", self.filters.rules().len()),
            Ok(false) => {}
            Err(e) => warn!("Keeping previous filter rules: {:#}", e),
        }

        let records = match self.source.fetch().await {
            Ok(records) => records,
            Err(e) => {
                warn!("Alarm source unavailable, treating as no alarms: {}", e);
                self.state.source_errors += 1;
                Vec::new()
            }
        };

        let detected = self.engine.filter_at(&records, self.filters.rules(), now);
        let detected_count = detected.len();
        let fresh = self.alarms.add(detected);
        let expired = self.alarms.prune_expired(now);

        let fresh: Vec<_> = fresh.into_iter().filter(|a| !a.is_expired(now)).collect();
        for alarm in &fresh {
            info!("New alarm {} (originated {}, active until {})", alarm.id, alarm.alarm_time, alarm.expiration_time);
        }
        if expired > 0 {
            info!("{} alarms expired", expired);
        }

        if self.toast_on_alarm {
            for alarm in &fresh {
                let message = format!("Alarm {} active until {}", alarm.id, alarm.expiration_time.format("%H:%M"));
                if let Err(e) = self.controller.notify(&message).await {
                    warn!("Toast for alarm {} failed: {}", alarm.id, e);
                }
            }
        }

        let action = self.drive_display().await;

        if let Some(check) = &self.dashboard {
            if !check.is_expected_url_open().await {
                warn!("Dashboard {} is not open in the browser", check.config().expected_url);
            }
        }

        self.state.cycles += 1;
        self.state.last_poll = Some(now);
        self.state.active_alarms = self.alarms.len();
        self.state.total_detected += fresh.len() as u64;
        if !fresh.is_empty() {
            self.state.last_detection = Some(now);
        }

        CycleReport {
            fetched: records.len(),
            detected: detected_count,
            new_alarms: fresh.len(),
            expired,
            active: self.alarms.len(),
            action,
        }
    }

    async fn drive_display(&mut self) -> DisplayAction {
        let controller = self.controller.name().to_string();

        if !self.alarms.is_empty() {
            self.state.display_claimed = true;

            let on = match self.controller.is_screen_on().await {
                Ok(on) => on,
                Err(e) => {
                    warn!("[{}] Status check failed, assuming off: {}", controller, e);
                    false
                }
            };
            if on {
                return DisplayAction::KeptOn;
            }

            return match self.controller.turn_on().await {
                Ok(()) => {
                    info!("[{}] Display on for {} active alarms", controller, self.alarms.len());
                    DisplayAction::TurnedOn
                }
                Err(e) => {
                    error!("[{}] Turn on failed: {}", controller, e);
                    self.state.controller_errors += 1;
                    DisplayAction::Failed
                }
            };
        }

        if !self.state.display_claimed {
            return DisplayAction::Idle;
        }

        match self.controller.turn_off().await {
            Ok(()) => {
                info!("[{}] All alarms expired, display off", controller);
                self.state.display_claimed = false;
                DisplayAction::TurnedOff
            }
            Err(DeviceError::Link(LinkError::Connection(reason))) => {
                info!("[{}] Display unreachable, taking it as already off: {}", controller, reason);
                self.state.display_claimed = false;
                DisplayAction::TurnedOff
            }
            Err(e) => {
                error!("[{}] Turn off failed: {}", controller, e);
                self.state.controller_errors += 1;
                DisplayAction::Failed
            }
        }
    }

    async fn connect_controller(&self) {
        match self.controller.connect().await {
            Ok(()) => info!("Connected to display via {}", self.controller.name()),
            Err(e) => warn!("Display not reachable yet ({}): {}", self.controller.name(), e),
        }
    }

    /// Run a single cycle and release the display connection.
    pub async fn run_once(&mut self) -> CycleReport {
        self.connect_controller().await;
        let report = self.run_cycle(Utc::now()).await;
        self.controller.disconnect().await;
        report
    }

    /// Poll until `shutdown` fires, then disconnect the controller.
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        info!(
            "Starting monitor: every {:?}, {} filter rules, controller {}",
            self.poll_interval,
            self.filters.rules().len(),
            self.controller.name()
        );

        self.connect_controller().await;
        self.state.running = true;

        loop {
            if !matches!(shutdown.try_recv(), Err(TryRecvError::Empty)) {
                info!("Monitor shutting down...");
                break;
            }

            let report = self.run_cycle(Utc::now()).await;
            debug!("Cycle {}: {:?}", self.state.cycles, report);

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown.recv() => {
                    info!("Monitor shutting down...");
                    break;
                }
            }
        }

        self.state.running = false;
        self.controller.disconnect().await;
        info!("Monitor stopped after {} cycles", self.state.cycles);
        Ok(())
    }
}
