use std::path::Path;

use anyhow::Context;
use time::OffsetDateTime;

use crate::core::storage::{ObjectStore, content_type_for};
use crate::error::PipelineError;

/// Object key for an uploaded file: the upload time in Unix nanoseconds, then
/// the original file name.
pub fn object_key_for(file_name: &str, uploaded_at: OffsetDateTime) -> String {
    format!("{}_{}", uploaded_at.unix_timestamp_nanos(), file_name)
}

/// Push a local jpg/jpeg/png into the raw bucket under a fresh key and
/// return that key.
pub async fn upload_image<S: ObjectStore>(store: &S, raw_bucket: &str, path: &Path) -> anyhow::Result<String> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PipelineError::UnsupportedUpload(path.display().to_string()))?;
    let content_type = content_type_for(file_name)
        .ok_or_else(|| PipelineError::UnsupportedUpload(file_name.to_string()))?;

    let body = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read upload {:?}", path))?;
    let key = object_key_for(file_name, OffsetDateTime::now_utc());

    store.put(raw_bucket, &key, body, content_type).await?;
    log::info!("Upload complete: {}", key);
    Ok(key)
}
