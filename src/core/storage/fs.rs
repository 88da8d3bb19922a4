use std::{
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use tokio::fs as async_fs;

use super::ObjectStore;
use crate::error::PipelineError;

/// Object store backed by a directory tree: `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &str) -> anyhow::Result<PathBuf> {
        check_key(bucket)?;
        check_key(key)?;
        let mut path = self.root.join(bucket);
        for segment in key.split('/') {
            path.push(segment);
        }
        Ok(path)
    }
}

fn check_key(key: &str) -> Result<(), PipelineError> {
    if key.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
        return Err(PipelineError::InvalidKey(key.to_string()));
    }
    Ok(())
}

impl ObjectStore for FsObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> anyhow::Result<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        match async_fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(PipelineError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }
            .into()),
            Err(e) => Err(e).with_context(|| format!("Failed to read object {:?}", path)),
        }
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> anyhow::Result<()> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create bucket directory {:?}", parent))?;
        }

        // Stage under a unique name beside the target and rename into place, so
        // concurrent writers of one key never share a staging file and readers
        // never see a partial object.
        let target = path;
        let len = body.len();
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let dir = target.parent().unwrap_or(Path::new("."));
            let mut staging = tempfile::Builder::new()
                .prefix(".staging-")
                .tempfile_in(dir)
                .with_context(|| format!("Failed to stage object in {:?}", dir))?;
            staging
                .write_all(&body)
                .with_context(|| format!("Failed to write object {:?}", staging.path()))?;
            staging
                .persist(&target)
                .map_err(|e| e.error)
                .with_context(|| format!("Failed to move staged object to {:?}", target))?;
            Ok(())
        })
        .await??;

        log::debug!("Stored {}/{} ({} bytes, {})", bucket, key, len, content_type);
        Ok(())
    }

    fn object_uri(&self, bucket: &str, key: &str) -> String {
        let path = self.root.join(bucket).join(key);
        format!("file://{}", path.display())
    }
}
