use chrono::{DateTime, Duration, Utc};

/// A pair of adjacent windows ending at a single captured instant.
///
/// current:  `[now - days, now)`
/// previous: `[now - 2*days, now - days)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendWindow {
    now: DateTime<Utc>,
    days: i64,
}

/// Widest span `TrendWindow::new` will hold. Keeps `2 * days` well inside
/// chrono's range.
pub const MAX_SPAN_DAYS: i64 = 36_500;

impl TrendWindow {
    /// `days` is clamped to `1..=MAX_SPAN_DAYS`. Callers that need the
    /// configured 7..=365 bounds run `config::validate_window` first.
    pub fn new(now: DateTime<Utc>, days: i64) -> Self {
        Self {
            now,
            days: days.clamp(1, MAX_SPAN_DAYS),
        }
    }

    pub fn ending_now(days: i64) -> Self {
        Self::new(Utc::now(), days)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn days(&self) -> i64 {
        self.days
    }

    pub fn current_start(&self) -> DateTime<Utc> {
        self.now - Duration::days(self.days)
    }

    pub fn previous_start(&self) -> DateTime<Utc> {
        self.now - Duration::days(self.days * 2)
    }

    pub fn in_current(&self, ts: &DateTime<Utc>) -> bool {
        *ts >= self.current_start() && *ts < self.now
    }

    pub fn in_previous(&self, ts: &DateTime<Utc>) -> bool {
        *ts >= self.previous_start() && *ts < self.current_start()
    }
}

/// Percentage change from `previous` to `current`, unrounded.
///
/// With no previous occurrences the rate is the raw current count, but only
/// when that count exceeds `noise_threshold`; otherwise 0.
pub fn growth_rate(current: usize, previous: usize, noise_threshold: usize) -> f64 {
    if previous == 0 {
        if current > noise_threshold {
            current as f64
        } else {
            0.0
        }
    } else {
        (current as f64 - previous as f64) / previous as f64 * 100.0
    }
}
