use std::sync::Arc;

use tokio::{sync::mpsc::UnboundedReceiver, task::JoinSet};

use crate::config::StorageSettings;
use crate::core::db::ResultTable;
use crate::core::storage::{ObjectStore, StorageEvent};
use crate::detection::{DetectionStage, DetectionSummary, PlateDetector};
use crate::models::MetadataSidecar;
use crate::ocr::{OcrOutcome, OcrStage, TextRecognizer};

/// Which stage, if any, an object-created event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Detection,
    Ocr,
    Ignore,
}

/// Raw uploads go to detection; sidecars in the plate bucket go to OCR. The
/// cropped JPEGs land in the plate bucket too and must not trigger anything.
///
/// Raw keys must be flat: sidecars only carry the key's last segment, so a
/// record written for `dir/car.jpg` could never receive its OCR reading.
pub fn route(event: &StorageEvent, storage: &StorageSettings) -> Route {
    if event.bucket == storage.raw_bucket {
        if event.key.contains('/') {
            log::warn!(
                "Ignoring {}/{}: raw uploads must not be nested under a prefix",
                event.bucket,
                event.key
            );
            return Route::Ignore;
        }
        Route::Detection
    } else if event.bucket == storage.plate_bucket && MetadataSidecar::is_sidecar_key(&event.key) {
        Route::Ocr
    } else {
        Route::Ignore
    }
}

/// What handling one event produced
#[derive(Debug, Clone)]
pub enum StageReport {
    Detection(DetectionSummary),
    Ocr(OcrOutcome),
    Ignored,
}

/// Local stand-in for the platform that invokes each stage per storage event.
///
/// Every event runs in its own task; a failed invocation is logged and not
/// retried.
pub struct EventDispatcher<S, T, D, R> {
    detection: DetectionStage<S, T, D>,
    ocr: OcrStage<S, T, R>,
    storage: StorageSettings,
}

impl<S, T, D, R> EventDispatcher<S, T, D, R>
where
    S: ObjectStore,
    T: ResultTable,
    D: PlateDetector,
    R: TextRecognizer,
{
    pub fn new(
        detection: DetectionStage<S, T, D>,
        ocr: OcrStage<S, T, R>,
        storage: StorageSettings,
    ) -> Self {
        Self {
            detection,
            ocr,
            storage,
        }
    }

    pub async fn dispatch(&self, event: &StorageEvent) -> anyhow::Result<StageReport> {
        match route(event, &self.storage) {
            Route::Detection => {
                log::info!("detectPlate {}/{}", event.bucket, event.key);
                let summary = self.detection.process_image(&event.bucket, &event.key).await?;
                Ok(StageReport::Detection(summary))
            }
            Route::Ocr => {
                log::info!("OCR plate triggered for {}/{}", event.bucket, event.key);
                let outcome = self.ocr.process_image(&event.bucket, &event.key).await?;
                Ok(StageReport::Ocr(outcome))
            }
            Route::Ignore => {
                log::debug!("Ignoring {}/{}", event.bucket, event.key);
                Ok(StageReport::Ignored)
            }
        }
    }

    /// Consume events until every sender is gone, then wait for in-flight
    /// invocations to finish.
    pub async fn run(self: Arc<Self>, mut events: UnboundedReceiver<StorageEvent>) {
        let mut tasks = JoinSet::new();
        while let Some(event) = events.recv().await {
            let this = Arc::clone(&self);
            tasks.spawn(async move {
                if let Err(e) = this.dispatch(&event).await {
                    log::error!(
                        "Invocation failed for {}/{}: {:#}",
                        event.bucket,
                        event.key,
                        e
                    );
                }
            });
            while let Some(done) = tasks.try_join_next() {
                log_join(done);
            }
        }
        while let Some(done) = tasks.join_next().await {
            log_join(done);
        }
    }
}

fn log_join(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        log::error!("Invocation task aborted: {}", e);
    }
}
