use serde::Deserialize;

/// A newly created object, as delivered by a storage notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub bucket: String,
    pub key: String,
}

#[derive(Deserialize)]
struct Notification {
    #[serde(rename = "Records")]
    records: Vec<NotificationRecord>,
}

#[derive(Deserialize)]
struct NotificationRecord {
    s3: S3Entity,
}

#[derive(Deserialize)]
struct S3Entity {
    bucket: NamedEntity,
    object: KeyedEntity,
}

#[derive(Deserialize)]
struct NamedEntity {
    name: String,
}

#[derive(Deserialize)]
struct KeyedEntity {
    key: String,
}

impl StorageEvent {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Flatten an S3-style notification document into one event per record.
    pub fn from_notification(body: &str) -> anyhow::Result<Vec<Self>> {
        let notification: Notification = serde_json::from_str(body)
            .map_err(|e| anyhow::anyhow!("Malformed storage notification: {}", e))?;
        Ok(notification
            .records
            .into_iter()
            .map(|r| Self {
                bucket: r.s3.bucket.name,
                key: r.s3.object.key,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_s3_notification() {
        let body = r#"{
            "Records": [
                {"eventName": "ObjectCreated:Put",
                 "s3": {"bucket": {"name": "raw", "arn": "x"},
                        "object": {"key": "1700000000_car.jpg", "size": 10}}}
            ]
        }"#;
        let events = StorageEvent::from_notification(body).unwrap();
        assert_eq!(events, vec![StorageEvent::new("raw", "1700000000_car.jpg")]);
    }

    #[test]
    fn rejects_missing_records() {
        assert!(StorageEvent::from_notification(r#"{"foo": 1}"#).is_err());
    }
}
