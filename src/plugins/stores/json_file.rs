use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::models::{Listing, Snapshot};
use crate::plugins::traits::SnapshotStore;
use crate::utils::error::StoreError;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    source_group: String,
    saved_at: DateTime<Utc>,
    listings: Vec<Listing>,
}

/// One JSON document per source group inside a directory.
pub struct JsonFileSnapshotStore {
    directory: PathBuf,
}

impl JsonFileSnapshotStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn file_path(&self, source_group: &str) -> PathBuf {
        self.directory.join(format!("{}.json", file_stem(source_group)))
    }
}

/// `"Bol.com"` -> `"bol-com"`.
fn file_stem(source_group: &str) -> String {
    let mut stem = String::with_capacity(source_group.len());
    for c in source_group.trim().chars() {
        if c.is_alphanumeric() {
            stem.extend(c.to_lowercase());
        } else if !stem.ends_with('-') {
            stem.push('-');
        }
    }

    let stem = stem.trim_matches('-');
    if stem.is_empty() {
        "default".to_string()
    } else {
        stem.to_string()
    }
}

#[async_trait]
impl SnapshotStore for JsonFileSnapshotStore {
    fn name(&self) -> &'static str {
        "json_file"
    }

    async fn load(&self, source_group: &str) -> Result<Snapshot, StoreError> {
        let path = self.file_path(source_group);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Snapshot::empty(source_group)),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<SnapshotFile>(&bytes) {
            Ok(file) => Ok(Snapshot::new(source_group, file.listings)),
            Err(e) => {
                tracing::warn!(
                    source_group,
                    path = %path.display(),
                    error = %e,
                    "Snapshot file is unreadable, starting from an empty snapshot"
                );
                Ok(Snapshot::empty(source_group))
            }
        }
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.directory).await?;

        let file = SnapshotFile {
            source_group: snapshot.source_group().to_string(),
            saved_at: Utc::now(),
            listings: snapshot.listings().to_vec(),
        };
        let json = serde_json::to_vec_pretty(&file)?;

        // Readers only ever see the old or the new file, never a partial one
        let path = self.file_path(snapshot.source_group());
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        tracing::debug!(
            source_group = snapshot.source_group(),
            listings = snapshot.len(),
            path = %path.display(),
            "Snapshot saved"
        );
        Ok(())
    }
}
