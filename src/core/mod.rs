//! Core module - the monitor loop tying source, filter and display together

mod monitor;

pub use monitor::{CycleReport, DisplayAction, Monitor};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monitor-wide counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorState {
    /// Inside `Monitor::run`
    pub running: bool,
    /// Completed poll cycles
    pub cycles: u64,
    /// Alarms active after the last cycle
    pub active_alarms: usize,
    /// Alarms seen for the first time, over all cycles
    pub total_detected: u64,
    /// Polls where the source failed
    pub source_errors: u64,
    /// Failed turn on/off calls
    pub controller_errors: u64,
    /// The monitor turned the display on and owes it a turn-off
    pub display_claimed: bool,
    /// Time of the last poll
    pub last_poll: Option<DateTime<Utc>>,
    /// Last poll that found a new alarm
    pub last_detection: Option<DateTime<Utc>>,
}
