use std::sync::Mutex;

use tokio::sync::mpsc::UnboundedSender;

use super::{ObjectStore, StorageEvent};

/// Wraps a store and announces every successful `put` on a channel, standing
/// in for the platform's object-created notifications.
#[derive(Debug)]
pub struct NotifyingStore<S> {
    inner: S,
    events: Mutex<Option<UnboundedSender<StorageEvent>>>,
}

impl<S: ObjectStore> NotifyingStore<S> {
    pub fn new(inner: S, events: UnboundedSender<StorageEvent>) -> Self {
        Self {
            inner,
            events: Mutex::new(Some(events)),
        }
    }

    /// Stop announcing writes. Once queued events are consumed the receiver
    /// sees the channel end, even while stages still hold this store.
    pub fn close_events(&self) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    fn announce(&self, bucket: &str, key: &str) {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        let sent = events
            .as_ref()
            .is_some_and(|tx| tx.send(StorageEvent::new(bucket, key)).is_ok());
        if !sent {
            log::warn!("No listener for storage events, dropped {}/{}", bucket, key);
        }
    }
}

impl<S: ObjectStore> ObjectStore for NotifyingStore<S> {
    async fn get(&self, bucket: &str, key: &str) -> anyhow::Result<Vec<u8>> {
        self.inner.get(bucket, key).await
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> anyhow::Result<()> {
        self.inner.put(bucket, key, body, content_type).await?;
        self.announce(bucket, key);
        Ok(())
    }

    fn object_uri(&self, bucket: &str, key: &str) -> String {
        self.inner.object_uri(bucket, key)
    }
}
