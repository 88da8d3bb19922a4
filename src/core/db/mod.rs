mod record;
mod state;

use std::{future::Future, path::Path, sync::Arc};

use record::{RecordRow, accuracy_json, texts_json};
use state::DbState;

use crate::models::{DetectionRecord, PlateReading, RecordKey};

/// Result table keyed by (PK, timestamp)
pub trait ResultTable: Send + Sync + 'static {
    /// Insert a record, replacing any row with the same key.
    fn put_item(&self, record: &DetectionRecord) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Write the OCR fields onto an existing row in a single statement.
    /// Returns `false` when no row has that key; nothing is inserted.
    fn update_item(
        &self,
        key: &RecordKey,
        reading: &PlateReading,
    ) -> impl Future<Output = anyhow::Result<bool>> + Send;

    /// Every row, in key order
    fn scan(&self) -> impl Future<Output = anyhow::Result<Vec<DetectionRecord>>> + Send;

    /// Row with the greatest timestamp for `pk`
    fn latest_for_key(
        &self,
        pk: &str,
    ) -> impl Future<Output = anyhow::Result<Option<DetectionRecord>>> + Send;
}

/// SQLite implementation of [`ResultTable`]
#[derive(Debug, Clone)]
pub struct ResultDb {
    state: Arc<DbState>,
}

impl ResultDb {
    pub async fn open<P: AsRef<Path>>(db_file: P) -> anyhow::Result<Self> {
        Ok(Self {
            state: Arc::new(DbState::new(db_file).await?),
        })
    }

    pub fn db_file(&self) -> &Path {
        self.state.db_file()
    }
}

const SELECT_RECORD: &str = r#"SELECT
        pk, timestamp, image_path, cropped_image_path, detected,
        detected_text, plate_accuracy, type_plate, error_type_plate,
        num_letters, num_numbers, amount_characters
    FROM detection_record"#;

impl ResultTable for ResultDb {
    async fn put_item(&self, record: &DetectionRecord) -> anyhow::Result<()> {
        let mut conn = self.state.conn().await?;
        let (texts, accuracy) = match &record.reading {
            Some(reading) => (Some(texts_json(reading)?), Some(accuracy_json(reading)?)),
            None => (None, None),
        };
        let reading = record.reading.as_ref();
        sqlx::query(
            r#"INSERT OR REPLACE INTO detection_record (
                pk, timestamp, image_path, cropped_image_path, detected,
                detected_text, plate_accuracy, type_plate, error_type_plate,
                num_letters, num_numbers, amount_characters
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"#,
        )
        .bind(&record.pk)
        .bind(&record.timestamp)
        .bind(&record.image_path)
        .bind(&record.cropped_image_path)
        .bind(i64::from(record.detected))
        .bind(texts)
        .bind(accuracy)
        .bind(reading.map(|r| r.type_plate.as_str()))
        .bind(reading.map(|r| i64::from(r.error_type_plate)))
        .bind(reading.map(|r| i64::from(r.num_letters)))
        .bind(reading.map(|r| i64::from(r.num_numbers)))
        .bind(reading.map(|r| i64::from(r.amount_characters)))
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn update_item(&self, key: &RecordKey, reading: &PlateReading) -> anyhow::Result<bool> {
        let mut conn = self.state.conn().await?;
        let result = sqlx::query(
            r#"UPDATE detection_record SET
                detected_text = $1,
                plate_accuracy = $2,
                type_plate = $3,
                error_type_plate = $4,
                num_letters = $5,
                num_numbers = $6,
                amount_characters = $7
            WHERE pk = $8 AND timestamp = $9"#,
        )
        .bind(texts_json(reading)?)
        .bind(accuracy_json(reading)?)
        .bind(reading.type_plate.as_str())
        .bind(i64::from(reading.error_type_plate))
        .bind(i64::from(reading.num_letters))
        .bind(i64::from(reading.num_numbers))
        .bind(i64::from(reading.amount_characters))
        .bind(&key.pk)
        .bind(&key.timestamp)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn scan(&self) -> anyhow::Result<Vec<DetectionRecord>> {
        let mut conn = self.state.conn().await?;
        let rows: Vec<RecordRow> =
            sqlx::query_as(&format!("{} ORDER BY pk ASC, timestamp ASC", SELECT_RECORD))
                .fetch_all(&mut *conn)
                .await?;
        rows.into_iter().map(RecordRow::into_record).collect()
    }

    async fn latest_for_key(&self, pk: &str) -> anyhow::Result<Option<DetectionRecord>> {
        let mut conn = self.state.conn().await?;
        let row: Option<RecordRow> = sqlx::query_as(&format!(
            "{} WHERE pk = $1 ORDER BY timestamp DESC LIMIT 1",
            SELECT_RECORD
        ))
        .bind(pk)
        .fetch_optional(&mut *conn)
        .await?;
        row.map(RecordRow::into_record).transpose()
    }
}
