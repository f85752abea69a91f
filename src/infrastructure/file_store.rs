// File-backed key-value store, one JSON file per key
use crate::application::key_value_store::KeyValueStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create storage dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", key)),
        }
    }

    /// Written to a uniquely named sibling temp file, then renamed over the
    /// target, so concurrent writers of one key never share a staging file.
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let dir = self.dir.clone();
        let target = self.path(key);
        let value = value.to_owned();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut staging = tempfile::NamedTempFile::new_in(&dir)
                .with_context(|| format!("Failed to stage write in {}", dir.display()))?;
            staging
                .write_all(value.as_bytes())
                .with_context(|| format!("Failed to write {}", staging.path().display()))?;
            staging
                .persist(&target)
                .map_err(|e| e.error)
                .with_context(|| format!("Failed to replace {}", target.display()))?;
            Ok(())
        })
        .await
        .context("Storage write task failed")?
    }
}
