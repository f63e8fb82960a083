//! Configuration for the profile memory manager
//!
//! All configurable parameters in one place with environment variable
//! overrides. Sensible defaults, configurable in production.

use std::env;
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_BACKUP_COUNT, DEFAULT_CACHE_SIZE, DEFAULT_CACHE_TTL_HOURS,
};

/// Memory manager configuration
#[derive(Debug, Clone)]
pub struct MemoryManagerConfig {
    /// Base directory for profile storage (`profiles/`, `backups/`,
    /// `indexes/` and `metadata.json` live underneath)
    pub storage_dir: PathBuf,

    /// Maximum number of profiles kept in the in-process cache
    pub cache_size: usize,

    /// Cache entry time-to-live in hours
    pub cache_ttl_hours: i64,

    /// Whether profile files are gzip-compressed (`.gz` vs `.json`)
    pub compression: bool,

    /// Number of rotating backups kept per profile id
    pub backup_count: usize,
}

impl Default for MemoryManagerConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("./consumer_profiles"),
            cache_size: DEFAULT_CACHE_SIZE,
            cache_ttl_hours: DEFAULT_CACHE_TTL_HOURS,
            compression: true,
            backup_count: DEFAULT_BACKUP_COUNT,
        }
    }
}

impl MemoryManagerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    ///
    /// Recognized variables:
    /// - `PROFILE_MEMORY_DIR`
    /// - `PROFILE_MEMORY_CACHE_SIZE`
    /// - `PROFILE_MEMORY_CACHE_TTL_HOURS`
    /// - `PROFILE_MEMORY_COMPRESSION` (true/false/1/0)
    /// - `PROFILE_MEMORY_BACKUP_COUNT`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = env::var("PROFILE_MEMORY_DIR") {
            if !dir.trim().is_empty() {
                config.storage_dir = PathBuf::from(dir);
            }
        }

        if let Ok(val) = env::var("PROFILE_MEMORY_CACHE_SIZE") {
            if let Ok(n) = val.parse() {
                config.cache_size = n;
            }
        }

        if let Ok(val) = env::var("PROFILE_MEMORY_CACHE_TTL_HOURS") {
            if let Ok(n) = val.parse() {
                config.cache_ttl_hours = n;
            }
        }

        if let Ok(val) = env::var("PROFILE_MEMORY_COMPRESSION") {
            let v = val.to_lowercase();
            config.compression = v == "true" || v == "1";
        }

        if let Ok(val) = env::var("PROFILE_MEMORY_BACKUP_COUNT") {
            if let Ok(n) = val.parse() {
                config.backup_count = n;
            }
        }

        tracing::debug!(
            storage_dir = %config.storage_dir.display(),
            cache_size = config.cache_size,
            cache_ttl_hours = config.cache_ttl_hours,
            compression = config.compression,
            backup_count = config.backup_count,
            "Loaded memory manager configuration"
        );

        config
    }

    /// Cache TTL as a duration.
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cache_ttl_hours)
    }

    /// File extension for stored profiles under the current compression
    /// setting.
    pub fn profile_extension(&self) -> &'static str {
        if self.compression {
            "gz"
        } else {
            "json"
        }
    }
}
