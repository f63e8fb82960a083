//! # profile-memory
//!
//! Durable storage of per-user consumer profiles, fronted by a bounded
//! in-memory cache, with checksum integrity tracking and rotating backups.
//!
//! The subsystem is a passive, synchronous library: every operation blocks
//! only on local file I/O and returns on the calling thread. Construct a
//! [`MemoryManager`] explicitly and pass it by reference; there is no
//! process-wide singleton.
//!
//! ```no_run
//! use profile_memory::{MemoryManager, MemoryManagerConfig, RecommendationCategory};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut manager = MemoryManager::new(MemoryManagerConfig::default())?;
//!
//! manager.profile_session("user-42", true, |profile| {
//!     profile.add_memory(
//!         "Booked a cabin near Mt. Rainier",
//!         "episodic",
//!         Some(RecommendationCategory::Travel),
//!         0.8,
//!         vec!["trip".to_string()],
//!         Default::default(),
//!     );
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod errors;
pub mod memory;

pub use config::MemoryManagerConfig;
pub use errors::MemoryManagerError;
pub use memory::{
    BehaviorPattern, CategoryProfile, CleanupStats, ConfidenceLevel, ConsumerProfile,
    ExportFormat, Insight, MemoryEntry, MemoryManager, ProfileCache, ProfileStats,
    ProfileSummary, RecommendationCategory,
};

// Re-export dependencies so downstream tests use the same versions
pub use chrono;
pub use parking_lot;
pub use uuid;
