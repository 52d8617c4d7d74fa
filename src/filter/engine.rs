// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarm-monitor

//! Include/exclude evaluation of raw alarm records

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::{path, FilterRule};
use crate::alarms::DetectedAlarm;

/// Outcome of evaluating one record against the rule list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Rule at this position fired and is an include rule
    Included(usize),
    /// Rule at this position fired and is an exclude rule
    Excluded(usize),
    /// Rule list is empty
    IncludedByDefault,
    /// No rule fired and the rule list is not empty
    ExcludedByDefault,
}

impl Decision {
    /// Whether the record is kept
    pub fn is_included(self) -> bool {
        matches!(self, Decision::Included(_) | Decision::IncludedByDefault)
    }
}

/// First firing rule wins; with no firing rule the record is kept only when
/// there are no rules at all.
pub fn evaluate(record: &Value, rules: &[FilterRule]) -> Decision {
    if rules.is_empty() {
        return Decision::IncludedByDefault;
    }

    for (position, rule) in rules.iter().enumerate() {
        if path::matches(record, &rule.property_path, &rule.expected_value) {
            return if rule.is_include {
                Decision::Included(position)
            } else {
                Decision::Excluded(position)
            };
        }
    }

    Decision::ExcludedByDefault
}

/// Turns raw record batches into detected alarms
#[derive(Debug, Clone)]
pub struct FilterEngine {
    keep_active: Duration,
}

impl FilterEngine {
    /// Engine keeping alarms active for `keep_active` after they originate
    pub fn new(keep_active: Duration) -> Self {
        Self { keep_active }
    }

    /// How long an alarm stays active
    pub fn keep_active(&self) -> Duration {
        self.keep_active
    }

    /// Filter `records` and convert the survivors, received now.
    pub fn filter(&self, records: &[Value], rules: &[FilterRule]) -> Vec<DetectedAlarm> {
        self.filter_at(records, rules, Utc::now())
    }

    /// Same as [`filter`](Self::filter) with an explicit receive time.
    pub fn filter_at(
        &self,
        records: &[Value],
        rules: &[FilterRule],
        received: DateTime<Utc>,
    ) -> Vec<DetectedAlarm> {
        let mut detected = Vec::new();

        for record in records {
            let decision = evaluate(record, rules);
            trace!("Record {} -> {:?}", record_label(record), decision);

            if !decision.is_included() {
                continue;
            }

            match DetectedAlarm::from_record(record, self.keep_active, received) {
                Ok(alarm) => detected.push(alarm),
                Err(e) => warn!("Dropping alarm record {}: {}", record_label(record), e),
            }
        }

        debug!("{} of {} records passed the filter", detected.len(), records.len());
        detected
    }
}

fn record_label(record: &Value) -> String {
    path::resolve(record, "id").unwrap_or_else(|| "<no id>".to_string())
}
