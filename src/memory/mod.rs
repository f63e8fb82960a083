//! Profile persistence and caching
//!
//! Durable CRUD over consumer profiles on the local filesystem, fronted by a
//! bounded LRU+TTL cache, with MD5 integrity tracking in a metadata index and
//! rotating per-profile backups.
//!
//! Layout under the configured storage directory:
//! - `profiles/<id>.{json|gz}` — one file per profile
//! - `backups/<id>_<YYYYmmdd_HHMMSS>.{json|gz}` — rotating backups
//! - `metadata.json` — per-profile checksums, sizes and versions
//! - `indexes/` — reserved
//!
//! The manager is a passive, synchronous library component: every call blocks
//! only on local file I/O. Concurrent writers to the *same* profile id
//! (across threads or processes) are an unsynchronized race at the filesystem
//! level; callers needing multi-writer semantics must serialize externally.
//! Access to different ids is always safe.

pub mod cache;
pub mod metadata;
pub mod types;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use md5::{Digest, Md5};
use serde::Serialize;
use std::cmp::Ordering;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::config::MemoryManagerConfig;
use crate::errors::MemoryManagerError;
pub use cache::ProfileCache;
pub use metadata::{ProfileMeta, StorageMetadata};
pub use types::*;

/// External file format for export/import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Plain canonical JSON
    Json,
    /// Gzip-compressed canonical JSON
    JsonGz,
}

/// One row of `list_profiles`, sourced from the metadata index.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub profile_id: String,
    pub last_saved: DateTime<Utc>,
    pub file_size: u64,
    pub version: u32,
}

/// Metadata merged with live file and cache state.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileStats {
    pub profile_id: String,
    pub exists: bool,
    pub last_saved: DateTime<Utc>,
    pub file_size: u64,
    pub version: u32,
    pub checksum: String,
    pub cached: bool,
    /// Size on disk right now, if the file exists
    pub actual_file_size: Option<u64>,
}

/// Outcome counters for `cleanup_storage`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupStats {
    pub profiles_removed: usize,
    pub backups_removed: usize,
    pub errors: usize,
}

/// Durable storage and retrieval of consumer profiles.
///
/// Construct one explicitly and pass it by reference; there is no process
/// singleton. The in-process cache is internally synchronized, but the
/// manager's own state (metadata index) follows ordinary `&mut` sequencing
/// and is not designed for concurrent mutation from multiple threads.
pub struct MemoryManager {
    config: MemoryManagerConfig,
    metadata: StorageMetadata,
    metadata_path: PathBuf,
    cache: ProfileCache,
}

impl MemoryManager {
    /// Open (creating if needed) a storage directory and load its metadata
    /// index.
    pub fn new(config: MemoryManagerConfig) -> Result<Self> {
        for sub in ["profiles", "backups", "indexes"] {
            let dir = config.storage_dir.join(sub);
            fs::create_dir_all(&dir)
                .with_context(|| format!("creating storage subdirectory {}", dir.display()))?;
        }

        let metadata_path = config.storage_dir.join("metadata.json");
        let metadata = StorageMetadata::load(&metadata_path);
        let cache = ProfileCache::new(config.cache_size, config.cache_ttl());

        tracing::info!(
            storage_dir = %config.storage_dir.display(),
            known_profiles = metadata.profiles.len(),
            "Memory manager initialized"
        );

        Ok(Self {
            config,
            metadata,
            metadata_path,
            cache,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &MemoryManagerConfig {
        &self.config
    }

    /// The profile cache (advisory; exposed for stats and tests).
    pub fn cache(&self) -> &ProfileCache {
        &self.cache
    }

    fn profile_path(&self, profile_id: &str) -> PathBuf {
        self.config
            .storage_dir
            .join("profiles")
            .join(format!("{profile_id}.{}", self.config.profile_extension()))
    }

    fn backup_path(&self, profile_id: &str, timestamp: DateTime<Utc>) -> PathBuf {
        self.config.storage_dir.join("backups").join(format!(
            "{profile_id}_{}.{}",
            timestamp.format("%Y%m%d_%H%M%S"),
            self.config.profile_extension()
        ))
    }

    // =========================================================================
    // Save / load
    // =========================================================================

    /// Persist a profile, optionally backing up the previous file first.
    ///
    /// Returns `false` on any I/O or serialization failure; the cause is
    /// logged, never propagated.
    pub fn save_profile(&mut self, profile: &ConsumerProfile, create_backup: bool) -> bool {
        match self.try_save_profile(profile, create_backup) {
            Ok(()) => {
                tracing::info!(profile_id = %profile.profile_id, "Profile saved");
                true
            }
            Err(e) => {
                tracing::error!(
                    profile_id = %profile.profile_id,
                    error = %e,
                    "Failed to save profile"
                );
                false
            }
        }
    }

    fn try_save_profile(&mut self, profile: &ConsumerProfile, create_backup: bool) -> Result<()> {
        let profile_path = self.profile_path(&profile.profile_id);

        // Back up the previous generation. A backup failure is logged but
        // does not block the save itself.
        if create_backup && profile_path.exists() {
            if let Err(e) = self.create_backup(&profile.profile_id) {
                tracing::warn!(
                    profile_id = %profile.profile_id,
                    error = %e,
                    "Backup before save failed, continuing"
                );
            }
        }

        let bytes = profile
            .to_json_bytes()
            .context("serializing profile")?;
        let bytes = if self.config.compression {
            gzip_compress(&bytes).context("compressing profile")?
        } else {
            bytes
        };

        fs::write(&profile_path, &bytes)
            .with_context(|| format!("writing profile to {}", profile_path.display()))?;

        let checksum = calculate_checksum(&bytes);
        let version = self
            .metadata
            .profiles
            .get(&profile.profile_id)
            .map(|m| m.version + 1)
            .unwrap_or(1);
        self.metadata.profiles.insert(
            profile.profile_id.clone(),
            ProfileMeta {
                last_saved: Utc::now(),
                file_size: bytes.len() as u64,
                checksum,
                version,
            },
        );
        self.metadata.save(&self.metadata_path)?;

        self.cache.put(profile);
        Ok(())
    }

    /// Load a profile, consulting the cache first when `use_cache` is set.
    ///
    /// Returns `None` if no file exists or the content cannot be decoded
    /// (logged). A checksum mismatch against the metadata index is logged as
    /// a warning but does not block the load.
    pub fn load_profile(&self, profile_id: &str, use_cache: bool) -> Option<ConsumerProfile> {
        if use_cache {
            if let Some(profile) = self.cache.get(profile_id) {
                tracing::debug!(profile_id = profile_id, "Profile loaded from cache");
                return Some(profile);
            }
        }

        let profile_path = self.profile_path(profile_id);
        if !profile_path.exists() {
            tracing::warn!(profile_id = profile_id, "Profile not found");
            return None;
        }

        match self.try_load_profile(profile_id, &profile_path) {
            Ok(profile) => {
                if use_cache {
                    self.cache.put(&profile);
                }
                tracing::info!(profile_id = profile_id, "Profile loaded from storage");
                Some(profile)
            }
            Err(e) => {
                tracing::error!(
                    profile_id = profile_id,
                    error = %e,
                    "Failed to load profile"
                );
                None
            }
        }
    }

    fn try_load_profile(&self, profile_id: &str, path: &Path) -> Result<ConsumerProfile> {
        let bytes =
            fs::read(path).with_context(|| format!("reading profile {}", path.display()))?;

        // Integrity check is advisory: availability wins over rejection.
        if let Some(meta) = self.metadata.profiles.get(profile_id) {
            let current = calculate_checksum(&bytes);
            if current != meta.checksum {
                tracing::warn!(
                    profile_id = profile_id,
                    expected = %meta.checksum,
                    actual = %current,
                    "Checksum mismatch, loading anyway"
                );
            }
        }

        let bytes = if self.config.compression {
            gzip_decompress(&bytes).context("decompressing profile")?
        } else {
            bytes
        };

        ConsumerProfile::from_json_bytes(&bytes).context("deserializing profile")
    }

    // =========================================================================
    // Backups
    // =========================================================================

    fn create_backup(&self, profile_id: &str) -> Result<bool> {
        let source = self.profile_path(profile_id);
        if !source.exists() {
            return Ok(false);
        }

        let backup = self.backup_path(profile_id, Utc::now());
        fs::copy(&source, &backup)
            .with_context(|| format!("copying profile to backup {}", backup.display()))?;

        self.prune_backups(profile_id)?;
        tracing::debug!(profile_id = profile_id, backup = %backup.display(), "Backup created");
        Ok(true)
    }

    /// Delete this id's oldest backups beyond the retention count.
    fn prune_backups(&self, profile_id: &str) -> Result<()> {
        let backups_dir = self.config.storage_dir.join("backups");
        let prefix = format!("{profile_id}_");

        let mut backups: Vec<(PathBuf, DateTime<Utc>)> = Vec::new();
        for entry in fs::read_dir(&backups_dir).context("listing backups")? {
            let entry = entry.context("reading backup entry")?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(&prefix) {
                continue;
            }
            if let Some(mtime) = file_mtime(&entry.path()) {
                backups.push((entry.path(), mtime));
            }
        }

        if backups.len() <= self.config.backup_count {
            return Ok(());
        }

        // Oldest first; filename (which embeds the timestamp) breaks mtime ties
        backups.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        let excess = backups.len() - self.config.backup_count;
        for (path, _) in backups.into_iter().take(excess) {
            fs::remove_file(&path)
                .with_context(|| format!("removing old backup {}", path.display()))?;
            tracing::debug!(backup = %path.display(), "Removed old backup");
        }
        Ok(())
    }

    // =========================================================================
    // Delete / list / stats
    // =========================================================================

    /// Remove a profile's file, cache entry and metadata, optionally backing
    /// it up first. Returns `false` if the profile does not exist or removal
    /// fails.
    pub fn delete_profile(&mut self, profile_id: &str, create_backup: bool) -> bool {
        let profile_path = self.profile_path(profile_id);
        if !profile_path.exists() {
            tracing::warn!(profile_id = profile_id, "Profile not found for deletion");
            return false;
        }

        if create_backup {
            if let Err(e) = self.create_backup(profile_id) {
                tracing::warn!(
                    profile_id = profile_id,
                    error = %e,
                    "Backup before delete failed, continuing"
                );
            }
        }

        if let Err(e) = fs::remove_file(&profile_path) {
            tracing::error!(
                profile_id = profile_id,
                error = %e,
                "Failed to delete profile file"
            );
            return false;
        }

        self.cache.remove(profile_id);
        if self.metadata.profiles.remove(profile_id).is_some() {
            if let Err(e) = self.metadata.save(&self.metadata_path) {
                tracing::error!(error = %e, "Failed to persist metadata after delete");
            }
        }

        tracing::info!(profile_id = profile_id, "Profile deleted");
        true
    }

    /// All known profiles, from the metadata index.
    pub fn list_profiles(&self) -> Vec<ProfileSummary> {
        self.metadata
            .profiles
            .iter()
            .map(|(profile_id, meta)| ProfileSummary {
                profile_id: profile_id.clone(),
                last_saved: meta.last_saved,
                file_size: meta.file_size,
                version: meta.version,
            })
            .collect()
    }

    /// Metadata for one profile merged with live file-existence and
    /// cache-membership checks. `None` if the id is unknown to the index.
    pub fn get_profile_stats(&self, profile_id: &str) -> Option<ProfileStats> {
        let meta = self.metadata.profiles.get(profile_id)?;
        let profile_path = self.profile_path(profile_id);
        let exists = profile_path.exists();

        Some(ProfileStats {
            profile_id: profile_id.to_string(),
            exists,
            last_saved: meta.last_saved,
            file_size: meta.file_size,
            version: meta.version,
            checksum: meta.checksum.clone(),
            cached: self.cache.contains(profile_id),
            actual_file_size: if exists {
                fs::metadata(&profile_path).ok().map(|m| m.len())
            } else {
                None
            },
        })
    }

    // =========================================================================
    // Memory optimization
    // =========================================================================

    /// Trim a profile's memories to at most `max_memories`, preferring
    /// important entries.
    ///
    /// Every memory at or above `importance_threshold` is kept; if that set
    /// leaves room, the remainder is filled with the most recent of the rest.
    /// Deterministic order: importance descending, ties broken by more
    /// recent `created_at`.
    pub fn optimize_memory(
        &self,
        profile: &mut ConsumerProfile,
        max_memories: usize,
        importance_threshold: f64,
    ) {
        if profile.memories.len() <= max_memories {
            return;
        }
        let original_count = profile.memories.len();

        let mut memories = std::mem::take(&mut profile.memories);
        memories.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        let (mut kept, rest): (Vec<_>, Vec<_>) = memories
            .into_iter()
            .partition(|m| m.importance >= importance_threshold);

        if kept.len() < max_memories {
            let mut rest = rest;
            rest.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            kept.extend(rest.into_iter().take(max_memories - kept.len()));
        }

        profile.memories = kept;
        tracing::info!(
            profile_id = %profile.profile_id,
            kept = profile.memories.len(),
            original = original_count,
            "Optimized profile memories"
        );
    }

    // =========================================================================
    // Storage cleanup
    // =========================================================================

    /// Remove profile and backup files older than `days_threshold` days
    /// (by modification time). Profiles are removed without a further backup.
    /// Failures are counted, not propagated.
    pub fn cleanup_storage(&mut self, days_threshold: i64) -> CleanupStats {
        let mut stats = CleanupStats::default();
        let cutoff = Utc::now() - Duration::days(days_threshold);

        let profiles_dir = self.config.storage_dir.join("profiles");
        match fs::read_dir(&profiles_dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let path = entry.path();
                    let Some(mtime) = file_mtime(&path) else {
                        stats.errors += 1;
                        continue;
                    };
                    if mtime >= cutoff {
                        continue;
                    }
                    let profile_id = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .and_then(|n| n.split('.').next())
                        .unwrap_or_default()
                        .to_string();
                    match fs::remove_file(&path) {
                        Ok(()) => {
                            self.cache.remove(&profile_id);
                            self.metadata.profiles.remove(&profile_id);
                            stats.profiles_removed += 1;
                        }
                        Err(e) => {
                            tracing::error!(
                                path = %path.display(),
                                error = %e,
                                "Failed to remove old profile"
                            );
                            stats.errors += 1;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to scan profiles directory");
                stats.errors += 1;
            }
        }

        let backups_dir = self.config.storage_dir.join("backups");
        match fs::read_dir(&backups_dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let path = entry.path();
                    let Some(mtime) = file_mtime(&path) else {
                        stats.errors += 1;
                        continue;
                    };
                    if mtime >= cutoff {
                        continue;
                    }
                    match fs::remove_file(&path) {
                        Ok(()) => stats.backups_removed += 1,
                        Err(e) => {
                            tracing::error!(
                                path = %path.display(),
                                error = %e,
                                "Failed to remove old backup"
                            );
                            stats.errors += 1;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to scan backups directory");
                stats.errors += 1;
            }
        }

        self.metadata.last_cleanup = Utc::now();
        if let Err(e) = self.metadata.save(&self.metadata_path) {
            tracing::error!(error = %e, "Failed to persist metadata after cleanup");
            stats.errors += 1;
        }

        tracing::info!(
            profiles_removed = stats.profiles_removed,
            backups_removed = stats.backups_removed,
            errors = stats.errors,
            "Storage cleanup completed"
        );
        stats
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Scoped profile mutation with a guaranteed save.
    ///
    /// Loads the profile (creating a fresh one when `create_if_missing` is
    /// set), hands it to `f`, then saves exactly once before returning
    /// whatever `f` produced — including a caller `Err` carried in `T`. This
    /// is the only method that returns an error of its own:
    /// [`MemoryManagerError::ProfileNotFound`] when the profile is required
    /// to exist and does not.
    pub fn profile_session<T>(
        &mut self,
        profile_id: &str,
        create_if_missing: bool,
        f: impl FnOnce(&mut ConsumerProfile) -> T,
    ) -> Result<T, MemoryManagerError> {
        let mut profile = match self.load_profile(profile_id, true) {
            Some(profile) => profile,
            None if create_if_missing => {
                tracing::info!(profile_id = profile_id, "Created new profile for session");
                ConsumerProfile::new(profile_id)
            }
            None => {
                return Err(MemoryManagerError::ProfileNotFound {
                    profile_id: profile_id.to_string(),
                })
            }
        };

        let result = f(&mut profile);

        if !self.save_profile(&profile, true) {
            tracing::error!(profile_id = profile_id, "Session auto-save failed");
        }
        Ok(result)
    }

    // =========================================================================
    // Export / import
    // =========================================================================

    /// Write a profile's canonical form to an external path. Returns `false`
    /// if the profile is unknown or the write fails.
    pub fn export_profile(&self, profile_id: &str, export_path: &Path, format: ExportFormat) -> bool {
        match self.try_export_profile(profile_id, export_path, format) {
            Ok(()) => {
                tracing::info!(
                    profile_id = profile_id,
                    path = %export_path.display(),
                    "Profile exported"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    profile_id = profile_id,
                    error = %e,
                    "Failed to export profile"
                );
                false
            }
        }
    }

    fn try_export_profile(
        &self,
        profile_id: &str,
        export_path: &Path,
        format: ExportFormat,
    ) -> Result<()> {
        let profile = self
            .load_profile(profile_id, true)
            .with_context(|| format!("profile {profile_id} not found for export"))?;

        if let Some(parent) = export_path.parent() {
            fs::create_dir_all(parent).context("creating export directory")?;
        }

        let bytes = profile.to_json_bytes().context("serializing profile")?;
        let bytes = match format {
            ExportFormat::Json => bytes,
            ExportFormat::JsonGz => gzip_compress(&bytes).context("compressing export")?,
        };
        fs::write(export_path, bytes)
            .with_context(|| format!("writing export to {}", export_path.display()))?;
        Ok(())
    }

    /// Read a profile from an external file, re-validate it through the
    /// canonical deserialization path and persist it. Returns the imported
    /// profile id.
    pub fn import_profile(&mut self, import_path: &Path, format: ExportFormat) -> Option<String> {
        match self.try_import_profile(import_path, format) {
            Ok(profile_id) => {
                tracing::info!(
                    profile_id = %profile_id,
                    path = %import_path.display(),
                    "Profile imported"
                );
                Some(profile_id)
            }
            Err(e) => {
                tracing::error!(
                    path = %import_path.display(),
                    error = %e,
                    "Failed to import profile"
                );
                None
            }
        }
    }

    fn try_import_profile(&mut self, import_path: &Path, format: ExportFormat) -> Result<String> {
        let bytes = fs::read(import_path)
            .with_context(|| format!("reading import file {}", import_path.display()))?;
        let bytes = match format {
            ExportFormat::Json => bytes,
            ExportFormat::JsonGz => gzip_decompress(&bytes).context("decompressing import")?,
        };

        let profile = ConsumerProfile::from_json_bytes(&bytes).context("validating import")?;
        anyhow::ensure!(
            self.save_profile(&profile, true),
            "failed to persist imported profile {}",
            profile.profile_id
        );
        Ok(profile.profile_id)
    }
}

/// Hex-MD5 over the bytes as written to disk.
fn calculate_checksum(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn gzip_compress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

fn gzip_decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

fn file_mtime(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}
