use anyhow::Context;
use sqlx::FromRow;

use crate::models::{Confidence, DetectionRecord, PlateReading, PlateType};

/// Raw `detection_record` row; list attributes are JSON text.
#[derive(Debug, FromRow)]
pub(super) struct RecordRow {
    pk: String,
    timestamp: String,
    image_path: String,
    cropped_image_path: String,
    detected: i64,
    detected_text: Option<String>,
    plate_accuracy: Option<String>,
    type_plate: Option<String>,
    error_type_plate: Option<i64>,
    num_letters: Option<i64>,
    num_numbers: Option<i64>,
    amount_characters: Option<i64>,
}

impl RecordRow {
    pub(super) fn into_record(self) -> anyhow::Result<DetectionRecord> {
        let reading = match self.detected_text {
            Some(text_json) => {
                let detected_text: Vec<String> = serde_json::from_str(&text_json)
                    .with_context(|| format!("Corrupt detected_text for {}", self.pk))?;
                let accuracy: Vec<String> =
                    serde_json::from_str(self.plate_accuracy.as_deref().unwrap_or("[]"))
                        .with_context(|| format!("Corrupt plate_accuracy for {}", self.pk))?;
                let plate_accuracy = accuracy
                    .into_iter()
                    .map(Confidence::try_from)
                    .collect::<anyhow::Result<Vec<_>>>()?;
                let type_plate = PlateType::try_from(
                    self.type_plate.as_deref().unwrap_or(PlateType::NotDetected.as_str()),
                )?;
                Some(PlateReading {
                    detected_text,
                    plate_accuracy,
                    type_plate,
                    error_type_plate: self.error_type_plate.unwrap_or(0) != 0,
                    num_letters: count(self.num_letters, "num_letters")?,
                    num_numbers: count(self.num_numbers, "num_numbers")?,
                    amount_characters: count(self.amount_characters, "amount_characters")?,
                })
            }
            None => None,
        };

        Ok(DetectionRecord {
            pk: self.pk,
            timestamp: self.timestamp,
            image_path: self.image_path,
            cropped_image_path: self.cropped_image_path,
            detected: self.detected != 0,
            reading,
        })
    }
}

fn count(value: Option<i64>, column: &str) -> anyhow::Result<u32> {
    u32::try_from(value.unwrap_or(0)).with_context(|| format!("Invalid {} value", column))
}

pub(super) fn texts_json(reading: &PlateReading) -> anyhow::Result<String> {
    Ok(serde_json::to_string(&reading.detected_text)?)
}

pub(super) fn accuracy_json(reading: &PlateReading) -> anyhow::Result<String> {
    let values: Vec<&str> = reading.plate_accuracy.iter().map(Confidence::as_str).collect();
    Ok(serde_json::to_string(&values)?)
}
