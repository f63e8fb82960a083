//! Storage metadata index (`metadata.json`)
//!
//! One entry per stored profile recording when it was last saved, how large
//! the written file is, its hex-MD5 checksum and a monotonically increasing
//! version. The index is advisory for listing/stats and drives checksum
//! verification on load; the profile files themselves remain authoritative.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Per-profile bookkeeping recorded at save time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileMeta {
    pub last_saved: DateTime<Utc>,
    pub file_size: u64,
    /// Hex-MD5 over the bytes as written (post-compression)
    pub checksum: String,
    pub version: u32,
}

/// Contents of `<storage_dir>/metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageMetadata {
    #[serde(default)]
    pub profiles: HashMap<String, ProfileMeta>,
    pub last_cleanup: DateTime<Utc>,
}

impl Default for StorageMetadata {
    fn default() -> Self {
        Self {
            profiles: HashMap::new(),
            last_cleanup: Utc::now(),
        }
    }
}

impl StorageMetadata {
    /// Load the index from disk. A missing file yields a fresh index; a
    /// corrupt one is logged and replaced rather than blocking startup.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read(path)
            .context("reading metadata file")
            .and_then(|bytes| {
                serde_json::from_slice(&bytes).context("parsing metadata file")
            }) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::error!(
                    path = %path.display(),
                    error = %e,
                    "Failed to load storage metadata, starting fresh"
                );
                Self::default()
            }
        }
    }

    /// Persist the index as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self).context("serializing metadata")?;
        fs::write(path, bytes)
            .with_context(|| format!("writing metadata to {}", path.display()))?;
        Ok(())
    }
}
