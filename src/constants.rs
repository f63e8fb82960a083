//! Documented constants for the profile persistence subsystem
//!
//! This module contains all tunable parameters with justification for their values.
//! Centralizing constants prevents magic numbers and makes tuning easier.

// =============================================================================
// CACHE CONSTANTS
// =============================================================================

/// Default maximum number of profiles held in the in-process cache
///
/// Profiles are a few KB to a few hundred KB each; 100 entries keeps the
/// cache well under typical heap budgets while covering the working set of
/// an analysis batch.
pub const DEFAULT_CACHE_SIZE: usize = 100;

/// Default cache entry time-to-live in hours
///
/// Profiles change only when an analysis run saves them, so a long TTL is
/// safe. 24 hours bounds staleness for deployments where a second process
/// writes to the same storage directory out of band.
pub const DEFAULT_CACHE_TTL_HOURS: i64 = 24;

// =============================================================================
// BACKUP / RETENTION CONSTANTS
// =============================================================================

/// Default number of rotating backups kept per profile id
///
/// Five generations is enough to recover from a bad analysis run while
/// keeping `backups/` growth linear in profile count, not save count.
pub const DEFAULT_BACKUP_COUNT: usize = 5;

/// Default age threshold (days) for `cleanup_storage`
pub const DEFAULT_CLEANUP_DAYS: i64 = 90;

// =============================================================================
// MEMORY OPTIMIZATION CONSTANTS
// =============================================================================

/// Default cap on memories retained by `optimize_memory`
pub const DEFAULT_MAX_MEMORIES: usize = 1000;

/// Default importance threshold for `optimize_memory`
///
/// Memories at or above this importance are always kept regardless of age.
pub const DEFAULT_IMPORTANCE_THRESHOLD: f64 = 0.3;

/// Importance assigned to a memory entry when the caller does not specify one
pub const DEFAULT_MEMORY_IMPORTANCE: f64 = 0.5;

/// Importance boost applied each time a memory entry is accessed
///
/// Small enough that a memory needs ~50 accesses to travel half the
/// importance range; importance is capped at 1.0.
pub const IMPORTANCE_ACCESS_BOOST: f64 = 0.01;

// =============================================================================
// CONFIDENCE CONSTANTS
// =============================================================================

/// Confidence at or above which an insight is VeryHigh
pub const CONFIDENCE_VERY_HIGH: f64 = 0.9;

/// Confidence at or above which an insight is High
pub const CONFIDENCE_HIGH: f64 = 0.7;

/// Confidence at or above which an insight is Medium; below is Low
pub const CONFIDENCE_MEDIUM: f64 = 0.5;

/// Base weight applied to a category's mean insight confidence
///
/// Profile confidence weights each category by
/// `ENGAGEMENT_WEIGHT_BASE + ENGAGEMENT_WEIGHT_SPAN * engagement_score`,
/// so a fully disengaged category still contributes 70% of its evidence.
pub const ENGAGEMENT_WEIGHT_BASE: f64 = 0.7;

/// Span of the engagement weighting (see [`ENGAGEMENT_WEIGHT_BASE`])
pub const ENGAGEMENT_WEIGHT_SPAN: f64 = 0.3;
