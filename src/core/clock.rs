use std::sync::Mutex;

use time::{Duration, OffsetDateTime, format_description::FormatItem, macros::format_description};

/// Fixed-width so string order matches time order.
const RECORD_TIMESTAMP: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]");

/// Hands out record timestamps that never repeat or go backwards within one
/// process, even when the wall clock does.
#[derive(Debug, Default)]
pub struct RecordClock {
    last: Mutex<Option<OffsetDateTime>>,
}

impl RecordClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_timestamp(&self) -> anyhow::Result<String> {
        self.next_after(OffsetDateTime::now_utc())
    }

    fn next_after(&self, now: OffsetDateTime) -> anyhow::Result<String> {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let now = now.replace_nanosecond(now.microsecond() * 1_000)?;
        let next = match *last {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(next);
        Ok(next.format(RECORD_TIMESTAMP)?)
    }
}
