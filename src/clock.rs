use chrono::{DateTime, Utc};

pub const SECONDS_PER_DAY: u64 = 86_400;

pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        Utc::now().timestamp().max(0) as u64
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

/// Unix seconds as a UTC timestamp, saturating at chrono's upper bound.
pub fn to_datetime(secs: u64) -> DateTime<Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}
