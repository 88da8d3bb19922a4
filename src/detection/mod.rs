pub mod detector;

use std::{io::Cursor, sync::Arc};

use image::{DynamicImage, ImageFormat};

use crate::core::clock::RecordClock;
use crate::core::db::ResultTable;
use crate::core::storage::{JPEG_CONTENT_TYPE, JSON_CONTENT_TYPE, ObjectStore};
use crate::error::PipelineError;
use crate::models::{BoundingBox, DetectionRecord, MetadataSidecar, RecordKey, basename};

pub use detector::{PlateDetector, YoloPlateDetector};

/// What one detection pass wrote
#[derive(Debug, Clone)]
pub struct DetectionSummary {
    pub image_key: String,
    /// One key per plate region, or a single key for the no-plate record
    pub records: Vec<RecordKey>,
    pub plates: usize,
}

impl DetectionSummary {
    pub fn detected(&self) -> bool {
        self.plates > 0
    }
}

/// First pipeline stage: find plates in a raw upload, publish each crop with
/// a sidecar for the OCR stage, and record the outcome.
pub struct DetectionStage<S, T, D> {
    store: Arc<S>,
    table: Arc<T>,
    detector: D,
    plate_bucket: String,
    target_label: String,
    clock: RecordClock,
}

impl<S: ObjectStore, T: ResultTable, D: PlateDetector> DetectionStage<S, T, D> {
    pub fn new(
        store: Arc<S>,
        table: Arc<T>,
        detector: D,
        plate_bucket: impl Into<String>,
        target_label: impl Into<String>,
    ) -> Self {
        Self {
            store,
            table,
            detector,
            plate_bucket: plate_bucket.into(),
            target_label: target_label.into(),
            clock: RecordClock::new(),
        }
    }

    /// Handle one raw-image-created event.
    ///
    /// Undecodable objects fail with [`PipelineError::Decode`] before anything
    /// is written; the invoker owns retry and dead-lettering for that case.
    pub async fn process_image(&self, bucket: &str, image_key: &str) -> anyhow::Result<DetectionSummary> {
        let bytes = self.store.get(bucket, image_key).await?;
        let img = image::load_from_memory(&bytes).map_err(|source| PipelineError::Decode {
            bucket: bucket.to_string(),
            key: image_key.to_string(),
            source,
        })?;
        log::debug!("Decoded {}/{}: {}x{}", bucket, image_key, img.width(), img.height());

        let regions = self.detector.detect(&img)?;
        let image_path = self.store.object_uri(bucket, image_key);
        let plate_key = basename(image_key);

        let mut records = Vec::new();
        for region in regions.iter().filter(|r| r.label == self.target_label) {
            log::info!(
                "Plate detected in {} (confidence {:.2})",
                image_key,
                region.confidence
            );
            let crop = region.crop_box(img.width(), img.height());
            let jpeg = encode_crop(&img, crop)?;
            self.store
                .put(&self.plate_bucket, plate_key, jpeg, JPEG_CONTENT_TYPE)
                .await?;

            let cropped_path = self.store.object_uri(&self.plate_bucket, plate_key);
            let key = self
                .save_record(image_key, &image_path, cropped_path, true)
                .await?;
            self.save_metadata(plate_key, &key.timestamp).await?;
            records.push(key);
        }

        let plates = records.len();
        if plates == 0 {
            log::info!("No plate detected in {}", image_key);
            records.push(
                self.save_record(image_key, &image_path, String::new(), false)
                    .await?,
            );
        }

        Ok(DetectionSummary {
            image_key: image_key.to_string(),
            records,
            plates,
        })
    }

    async fn save_record(
        &self,
        image_key: &str,
        image_path: &str,
        cropped_image_path: String,
        detected: bool,
    ) -> anyhow::Result<RecordKey> {
        let record = DetectionRecord {
            pk: image_key.to_string(),
            timestamp: self.clock.next_timestamp()?,
            image_path: image_path.to_string(),
            cropped_image_path,
            detected,
            reading: None,
        };
        self.table.put_item(&record).await?;
        Ok(record.key())
    }

    async fn save_metadata(&self, plate_key: &str, timestamp: &str) -> anyhow::Result<()> {
        let sidecar = MetadataSidecar::new(timestamp, plate_key);
        let metadata_key = MetadataSidecar::object_key(plate_key);
        self.store
            .put(&self.plate_bucket, &metadata_key, sidecar.to_json()?, JSON_CONTENT_TYPE)
            .await?;
        log::info!("Metadata saved: {}/{}", self.plate_bucket, metadata_key);
        Ok(())
    }
}

/// Crop and re-encode as JPEG. JPEG has no alpha, so the crop is flattened
/// to RGB first.
fn encode_crop(img: &DynamicImage, crop: BoundingBox) -> anyhow::Result<Vec<u8>> {
    let plate = img.crop_imm(crop.x, crop.y, crop.width, crop.height).to_rgb8();
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(plate).write_to(&mut buf, ImageFormat::Jpeg)?;
    Ok(buf.into_inner())
}
