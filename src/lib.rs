// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarm-monitor

//! Alarm Monitor - keeps a dashboard display awake while alarms are live
//!
//! Polls an alarm feed, filters the raw records with ordered include/exclude
//! rules and switches a TV on while any matching alarm is active:
//! - Path-based rule matching over heterogeneous JSON records
//! - Expiring alarm set keyed by alarm id
//! - LG webOS control over a correlated websocket RPC link, with Wake-on-LAN
//! - HDMI-CEC control through `cec-client`
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                         Monitor                          │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌──────────────┐   ┌──────────┐          │
//! │  │  Alarm   │ → │ FilterEngine │ → │ AlarmSet │          │
//! │  │  Source  │   │ + FilterFile │   │          │          │
//! │  └──────────┘   └──────────────┘   └──────────┘          │
//! │                                         ↓                │
//! │                 ┌──────────────────────────────────┐     │
//! │                 │          TvController            │     │
//! │                 ├────────────────┬─────────────────┤     │
//! │                 │ webOS + WoL    │  cec-client     │     │
//! │                 │ (DeviceLink)   │                 │     │
//! │                 └────────────────┴─────────────────┘     │
//! └──────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod filter;
pub mod alarms;
pub mod device;
pub mod source;
pub mod dashboard;
pub mod core;
pub mod config;

// Re-exports for convenience
pub use config::Config;
pub use core::{Monitor, MonitorState};
pub use alarms::{AlarmSet, DetectedAlarm};
pub use filter::{FilterEngine, FilterFile, FilterRule};
pub use device::{build_controller, DeviceLink, TvController};
pub use source::{AlarmSource, HttpAlarmSource};
pub use error::{DataError, DeviceError, LinkError, SourceError};

/// Alarm Monitor version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Alarm Monitor name
pub const NAME: &str = "AlarmMonitor";
