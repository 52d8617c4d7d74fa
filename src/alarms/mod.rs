// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarm-monitor

//! Detected alarms and the active alarm set

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::DataError;

/// A normalized, time-bounded alarm that keeps the display awake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedAlarm {
    /// Alarm id, unique per source
    pub id: i64,
    /// When the alarm originated
    pub alarm_time: DateTime<Utc>,
    /// When this monitor first saw it
    pub received_time: DateTime<Utc>,
    /// `alarm_time` plus the keep-active duration
    pub expiration_time: DateTime<Utc>,
}

impl DetectedAlarm {
    /// Build from a raw record's `id` and `originatedAt` fields.
    ///
    /// `id` may be a string or a number; `originatedAt` is RFC 3339, or an
    /// ISO 8601 local time which is taken as UTC.
    pub fn from_record(
        record: &Value,
        keep_active: Duration,
        received_time: DateTime<Utc>,
    ) -> Result<Self, DataError> {
        let id = parse_id(record.get("id").ok_or(DataError::MissingField { field: "id" })?)?;

        let originated = record
            .get("originatedAt")
            .ok_or(DataError::MissingField { field: "originatedAt" })?;
        let alarm_time = originated
            .as_str()
            .and_then(parse_timestamp)
            .ok_or_else(|| DataError::InvalidTimestamp {
                id,
                value: originated.to_string(),
            })?;

        Ok(Self {
            id,
            alarm_time,
            received_time,
            expiration_time: alarm_time + keep_active,
        })
    }

    /// Expired once `expiration_time` is at or before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_time <= now
    }
}

fn parse_id(value: &Value) -> Result<i64, DataError> {
    let parsed = match value {
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    };

    parsed.ok_or_else(|| DataError::InvalidId {
        value: match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    })
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Alarms currently keeping the display active, keyed by id
#[derive(Debug, Clone, Default)]
pub struct AlarmSet {
    alarms: HashMap<i64, DetectedAlarm>,
}

impl AlarmSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch; an alarm with a known id replaces the stored one.
    ///
    /// Returns the alarms whose id was not in the set before.
    pub fn add<I>(&mut self, batch: I) -> Vec<DetectedAlarm>
    where
        I: IntoIterator<Item = DetectedAlarm>,
    {
        let mut fresh = Vec::new();
        for alarm in batch {
            if self.alarms.insert(alarm.id, alarm.clone()).is_none() {
                fresh.push(alarm);
            }
        }
        fresh
    }

    /// Drop every alarm with `expiration_time <= now`, returning how many went.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.alarms.len();
        self.alarms.retain(|_, alarm| !alarm.is_expired(now));
        before - self.alarms.len()
    }

    /// No alarm is active
    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    /// Number of active alarms
    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    /// Alarm with the given id
    pub fn get(&self, id: i64) -> Option<&DetectedAlarm> {
        self.alarms.get(&id)
    }

    /// Active alarms in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &DetectedAlarm> {
        self.alarms.values()
    }

    /// Latest expiration among the stored alarms
    pub fn active_until(&self) -> Option<DateTime<Utc>> {
        self.alarms.values().map(|a| a.expiration_time).max()
    }
}
