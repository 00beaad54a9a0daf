//! Lookback windows, derived metrics and the filter -> derive -> rank -> truncate pipeline that
//! every admin operation is built from.

use crate::error::{AdminBridgeError, Result, ensure_positive};
use chrono::{DateTime, Duration, TimeZone, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Trailing time span `[end - span, end]`. `end` is captured once at construction so every
/// record in a call is judged against the same "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl LookbackWindow {
    pub fn hours(name: &str, hours: f64) -> Result<Self> {
        Self::hours_ending_at(name, hours, Utc::now())
    }

    pub fn hours_ending_at(name: &str, hours: f64, now: DateTime<Utc>) -> Result<Self> {
        ensure_positive(name, hours)?;
        let millis = (hours * MILLIS_PER_HOUR).round();
        // `as` saturates, so anything past i64 range must be caught before the cast
        let span = if millis.is_finite() && millis < i64::MAX as f64 {
            Duration::try_milliseconds(millis as i64)
        } else {
            None
        };
        Self::ending_at(name, now, span)
    }

    pub fn days(name: &str, days: i64) -> Result<Self> {
        Self::days_ending_at(name, days, Utc::now())
    }

    pub fn days_ending_at(name: &str, days: i64, now: DateTime<Utc>) -> Result<Self> {
        ensure_positive(name, days as f64)?;
        Self::ending_at(name, now, Duration::try_days(days))
    }

    fn ending_at(name: &str, end: DateTime<Utc>, span: Option<Duration>) -> Result<Self> {
        let start = span
            .and_then(|span| end.checked_sub_signed(span))
            .ok_or_else(|| AdminBridgeError::Validation(format!("{} is too large", name)))?;
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }

    pub fn start_millis(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn end_millis(&self) -> i64 {
        self.end.timestamp_millis()
    }

    pub fn span_days(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / (24.0 * MILLIS_PER_HOUR)
    }

    /// `YYYY-MM-DD HH:MM:SS` in UTC, the literal format SQL warehouses accept.
    pub fn start_sql_literal(&self) -> String {
        self.start.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit(usize);

impl Limit {
    pub fn new(value: i64) -> Result<Self> {
        if value <= 0 {
            return Err(AdminBridgeError::Validation(
                "limit must be positive".to_string(),
            ));
        }
        Ok(Self(value as usize))
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

/// A derived value that is either read from the platform or approximated locally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Metric {
    Measured(f64),
    Estimated(f64),
}

impl Metric {
    pub fn value(&self) -> f64 {
        match self {
            Self::Measured(v) | Self::Estimated(v) => *v,
        }
    }

    pub fn is_estimated(&self) -> bool {
        matches!(self, Self::Estimated(_))
    }
}

pub fn from_epoch_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}

pub fn seconds_to_hours(seconds: f64) -> f64 {
    round2(seconds / 3600.0)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `end - start`, or `now - start` while the record is still running. A missing end time on a
/// record that is no longer running cannot be measured and yields `None`.
pub fn duration_seconds(
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    still_running: bool,
    now: DateTime<Utc>,
) -> Option<f64> {
    match (end, still_running) {
        (Some(end), _) => Some(seconds_between(start, end)),
        (None, true) => Some(seconds_between(start, now)),
        (None, false) => None,
    }
}

/// Time since last activity, falling back to the start time.
pub fn idle_seconds(
    last_activity: Option<DateTime<Utc>>,
    start: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<f64> {
    last_activity
        .or(start)
        .map(|reference| seconds_between(reference, now))
}

/// Lag approximated as time since the reference point. Always estimated.
pub fn proxy_lag_seconds(reference: DateTime<Utc>, now: DateTime<Utc>) -> Metric {
    Metric::Estimated(seconds_between(reference, now))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Descending,
    Ascending,
}

/// Records flowing through the filter and derive stages.
pub struct Selection<T> {
    items: Vec<T>,
}

impl<T> Selection<T> {
    pub fn from_records(records: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: records.into_iter().collect(),
        }
    }

    /// Keep records whose key lies in the window. Records without a key are dropped.
    pub fn within<F>(self, window: &LookbackWindow, key: F) -> Self
    where
        F: Fn(&T) -> Option<DateTime<Utc>>,
    {
        let items = self
            .items
            .into_iter()
            .filter(|item| key(item).is_some_and(|ts| window.contains(ts)))
            .collect();
        Self { items }
    }

    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool,
    {
        Self {
            items: self.items.into_iter().filter(|item| predicate(item)).collect(),
        }
    }

    pub fn filter_map<U, F>(self, f: F) -> Selection<U>
    where
        F: FnMut(T) -> Option<U>,
    {
        Selection {
            items: self.items.into_iter().filter_map(f).collect(),
        }
    }

    pub fn map<U, F>(self, f: F) -> Selection<U>
    where
        F: FnMut(T) -> U,
    {
        Selection {
            items: self.items.into_iter().map(f).collect(),
        }
    }

    /// Stable sort on the key; equal keys keep their input order.
    pub fn rank_by<K, F>(self, key: F, order: Order) -> Ranked<T>
    where
        K: PartialOrd,
        F: Fn(&T) -> K,
    {
        let mut items = self.items;
        items.sort_by(|a, b| {
            let ordering = key(a).partial_cmp(&key(b)).unwrap_or(Ordering::Equal);
            match order {
                Order::Ascending => ordering,
                Order::Descending => ordering.reverse(),
            }
        });
        Ranked { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

/// Sorted records. Truncation is only available once ranking has happened.
pub struct Ranked<T> {
    items: Vec<T>,
}

impl<T> Ranked<T> {
    pub fn take(self, limit: Limit) -> Vec<T> {
        let mut items = self.items;
        items.truncate(limit.get());
        items
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}
