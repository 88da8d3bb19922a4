pub mod classify;
pub mod engine;
pub mod preprocessing;

use std::sync::Arc;

use crate::core::db::ResultTable;
use crate::core::storage::ObjectStore;
use crate::error::PipelineError;
use crate::models::{Confidence, MetadataSidecar, PlateReading, RecognizedText, RecordKey};
use classify::{classify, clean_text};

pub use engine::{OcrsRecognizer, TextRecognizer};
pub use preprocessing::preprocess_image;

/// How one OCR invocation ended
#[derive(Debug, Clone, PartialEq)]
pub enum OcrOutcome {
    /// The reading was written onto the detection record.
    Updated { key: RecordKey, reading: PlateReading },
    /// The engine ran but found no text; the record is untouched.
    NothingRecognized { key: RecordKey },
    /// Sidecar lacked `timestamp` or `image_name`; dropped.
    MalformedSidecar,
    /// The engine returned an error; the record is untouched.
    EngineFailed { key: RecordKey },
    /// No record has the sidecar's key; nothing was inserted.
    RecordMissing { key: RecordKey },
}

/// Second pipeline stage: read the plate text for a sidecar and attach it to
/// the record the detection stage wrote.
pub struct OcrStage<S, T, R> {
    store: Arc<S>,
    table: Arc<T>,
    recognizer: R,
}

impl<S: ObjectStore, T: ResultTable, R: TextRecognizer> OcrStage<S, T, R> {
    pub fn new(store: Arc<S>, table: Arc<T>, recognizer: R) -> Self {
        Self {
            store,
            table,
            recognizer,
        }
    }

    /// Handle one sidecar-created event.
    ///
    /// Redelivery of the same sidecar recomputes the reading and overwrites
    /// the previous one.
    pub async fn process_image(&self, bucket: &str, metadata_key: &str) -> anyhow::Result<OcrOutcome> {
        let body = self.store.get(bucket, metadata_key).await?;
        let Some(sidecar) = MetadataSidecar::parse(&body) else {
            log::warn!(
                "Invalid metadata format in {}/{}: missing 'timestamp' or 'image_name'",
                bucket,
                metadata_key
            );
            return Ok(OcrOutcome::MalformedSidecar);
        };
        log::info!("OCR for {} at {}", sidecar.image_name, sidecar.timestamp);
        let key = RecordKey {
            pk: sidecar.image_name,
            timestamp: sidecar.timestamp,
        };

        let bytes = self.store.get(bucket, &key.pk).await?;
        let img = image::load_from_memory(&bytes).map_err(|source| PipelineError::Decode {
            bucket: bucket.to_string(),
            key: key.pk.clone(),
            source,
        })?;
        // The engine works on RGB byte order.
        let rgb = img.to_rgb8();
        log::debug!("Plate crop {}: {}x{}", key.pk, rgb.width(), rgb.height());

        let items = match self.recognizer.recognize(&rgb) {
            Ok(items) => items,
            Err(e) => {
                log::error!("Error during OCR of {}: {:#}", key.pk, e);
                return Ok(OcrOutcome::EngineFailed { key });
            }
        };

        let Some(reading) = read_plate(items) else {
            log::info!("No text detected in {}", key.pk);
            return Ok(OcrOutcome::NothingRecognized { key });
        };
        log::info!(
            "Plate {} read as {:?} ({}, letters={}, numbers={}, characters={})",
            key.pk,
            reading.detected_text,
            reading.type_plate.as_str(),
            reading.num_letters,
            reading.num_numbers,
            reading.amount_characters
        );

        if !self.table.update_item(&key, &reading).await? {
            log::warn!("No detection record for {} at {}", key.pk, key.timestamp);
            return Ok(OcrOutcome::RecordMissing { key });
        }
        log::info!("OCR plate saved for {} at {}", key.pk, key.timestamp);
        Ok(OcrOutcome::Updated { key, reading })
    }
}

/// Clean and classify raw engine output. `None` when nothing usable came back.
fn read_plate(items: Vec<RecognizedText>) -> Option<PlateReading> {
    let mut detected_text = Vec::with_capacity(items.len());
    let mut plate_accuracy = Vec::with_capacity(items.len());
    for item in items {
        let Some(confidence) = Confidence::from_score(item.confidence) else {
            log::warn!("Skipping OCR item {:?} with invalid confidence {}", item.text, item.confidence);
            continue;
        };
        detected_text.push(clean_text(&item.text));
        plate_accuracy.push(confidence);
    }
    if detected_text.is_empty() {
        return None;
    }

    let classification = classify(&detected_text);
    Some(PlateReading {
        detected_text,
        plate_accuracy,
        type_plate: classification.type_plate,
        error_type_plate: classification.error_type_plate,
        num_letters: classification.num_letters,
        num_numbers: classification.num_numbers,
        amount_characters: classification.amount_characters,
    })
}
