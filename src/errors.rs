//! Error types for the profile persistence subsystem
//!
//! `MemoryManager` converts internal failures (I/O, serialization) into
//! boolean/`Option` results and logs the cause, so most public methods never
//! raise. The one documented exception is [`MemoryManagerError`], returned by
//! `profile_session` when a profile is required to exist and does not.

use thiserror::Error;

/// The single error surfaced by the memory manager itself.
#[derive(Debug, Clone, Error)]
pub enum MemoryManagerError {
    /// A session was opened with `create_if_missing = false` and no stored
    /// profile exists for the id.
    #[error("profile {profile_id} not found")]
    ProfileNotFound { profile_id: String },
}
