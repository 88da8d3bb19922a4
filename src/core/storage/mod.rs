mod event;
mod fs;
mod notify;

use std::future::Future;

pub use event::StorageEvent;
pub use fs::FsObjectStore;
pub use notify::NotifyingStore;

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";
pub const PNG_CONTENT_TYPE: &str = "image/png";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Bucket/key blob storage shared by both pipeline stages
pub trait ObjectStore: Send + Sync + 'static {
    /// Fetch an object's bytes. Missing objects fail with
    /// [`PipelineError::ObjectNotFound`](crate::error::PipelineError::ObjectNotFound).
    fn get(&self, bucket: &str, key: &str) -> impl Future<Output = anyhow::Result<Vec<u8>>> + Send;

    /// Store an object, replacing any previous one under the same key.
    fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Address other components can use to reach the object
    fn object_uri(&self, bucket: &str, key: &str) -> String;
}

/// Content type for an upload, judged by file extension
pub fn content_type_for(name: &str) -> Option<&'static str> {
    let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some(JPEG_CONTENT_TYPE),
        "png" => Some(PNG_CONTENT_TYPE),
        _ => None,
    }
}
