use std::{sync::Arc, time::Duration};

use crate::config::PollerSettings;
use crate::core::db::ResultTable;
use crate::models::DetectionRecord;

/// Result of waiting for an upload to settle
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Detection finished and found no plate.
    NoPlate(DetectionRecord),
    /// A plate was found and OCR has written its reading.
    Recognized(DetectionRecord),
    /// Attempts ran out before either stage reached a terminal state. This is
    /// an infrastructure timeout, not a negative detection.
    TimedOut { attempts: u32 },
}

/// Bridges the asynchronous stages into one blocking-style lookup for a
/// client that just uploaded an image.
pub struct RetrievalPoller<T> {
    table: Arc<T>,
    max_attempts: u32,
    delay: Duration,
}

impl<T: ResultTable> RetrievalPoller<T> {
    pub fn new(table: Arc<T>, max_attempts: u32, delay: Duration) -> Self {
        Self {
            table,
            max_attempts,
            delay,
        }
    }

    pub fn from_settings(table: Arc<T>, settings: &PollerSettings) -> Self {
        Self::new(table, settings.max_attempts, settings.delay())
    }

    /// Wait for the latest record of `object_key` to settle. Total waiting is
    /// bounded by `(max_attempts - 1) * delay`; table errors end the wait.
    pub async fn fetch(&self, object_key: &str) -> anyhow::Result<PollOutcome> {
        for attempt in 1..=self.max_attempts {
            if let Some(record) = self.table.latest_for_key(object_key).await? {
                if !record.detected {
                    return Ok(PollOutcome::NoPlate(record));
                }
                if record.reading.is_some() {
                    return Ok(PollOutcome::Recognized(record));
                }
                log::debug!("{} detected, waiting for OCR (attempt {})", object_key, attempt);
            } else {
                log::debug!("No record for {} yet (attempt {})", object_key, attempt);
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.delay).await;
            }
        }

        log::warn!(
            "Gave up waiting for {} after {} attempts",
            object_key,
            self.max_attempts
        );
        Ok(PollOutcome::TimedOut {
            attempts: self.max_attempts,
        })
    }
}
