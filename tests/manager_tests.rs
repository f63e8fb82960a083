//! End-to-end integration suite for the profile persistence subsystem
//!
//! Exercises the full lifecycle across process boundaries (fresh manager
//! instances over the same storage directory), cache interaction, backup
//! retention and export/import.
//!
//! Run with: cargo test --test manager_tests

use std::collections::HashMap;

use tempfile::TempDir;

use profile_memory::{
    ConsumerProfile, ExportFormat, Insight, MemoryManager, MemoryManagerConfig,
    MemoryManagerError, RecommendationCategory,
};

/// Route manager logs through the test harness; honors RUST_LOG.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config_for(dir: &TempDir, compression: bool) -> MemoryManagerConfig {
    init_logging();
    MemoryManagerConfig {
        storage_dir: dir.path().to_path_buf(),
        cache_size: 4,
        cache_ttl_hours: 1,
        compression,
        backup_count: 2,
    }
}

fn build_profile(id: &str) -> ConsumerProfile {
    let mut profile = ConsumerProfile::new(id);
    profile.add_insight(
        RecommendationCategory::Restaurants,
        Insight::new(
            "cuisine_preference",
            "Orders ramen frequently",
            vec!["receipt #88".to_string()],
            0.9,
        ),
    );
    profile
        .category_mut(RecommendationCategory::Restaurants)
        .update_engagement_score(0.6);
    profile.add_memory(
        "Visited Ramen Alley",
        "episodic",
        Some(RecommendationCategory::Restaurants),
        0.7,
        vec!["dining".to_string()],
        HashMap::new(),
    );
    profile.update_confidence_score();
    profile
}

#[test]
fn full_lifecycle_across_manager_instances() {
    let dir = TempDir::new().unwrap();
    let original = build_profile("lifecycle-user");

    {
        let mut manager = MemoryManager::new(config_for(&dir, true)).unwrap();
        assert!(manager.save_profile(&original, true));
    }

    // A brand-new manager over the same directory sees the profile, its
    // metadata and a clean cache.
    let manager = MemoryManager::new(config_for(&dir, true)).unwrap();
    assert!(!manager.cache().contains("lifecycle-user"));

    let loaded = manager.load_profile("lifecycle-user", true).unwrap();
    assert_eq!(loaded, original);
    // Load populated the cache
    assert!(manager.cache().contains("lifecycle-user"));

    let summaries = manager.list_profiles();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].profile_id, "lifecycle-user");
    assert_eq!(summaries[0].version, 1);
}

#[test]
fn confidence_score_persists_through_storage() {
    let dir = TempDir::new().unwrap();
    let mut manager = MemoryManager::new(config_for(&dir, false)).unwrap();

    let profile = build_profile("conf-user");
    // One populated category: 0.9 * (0.7 + 0.3 * 0.6)
    let expected = 0.9 * (0.7 + 0.3 * 0.6);
    assert!((profile.confidence_score - expected).abs() < 1e-9);

    manager.save_profile(&profile, false);
    let loaded = manager.load_profile("conf-user", false).unwrap();
    assert!((loaded.confidence_score - expected).abs() < 1e-9);
}

#[test]
fn sessions_accumulate_mutations() {
    let dir = TempDir::new().unwrap();
    let mut manager = MemoryManager::new(config_for(&dir, false)).unwrap();

    for i in 0..3 {
        manager
            .profile_session("session-user", true, |profile| {
                profile.add_memory(
                    format!("event {i}"),
                    "episodic",
                    None,
                    0.5,
                    vec![],
                    HashMap::new(),
                );
            })
            .unwrap();
    }

    let loaded = manager.load_profile("session-user", false).unwrap();
    assert_eq!(loaded.memories.len(), 3);

    // Each session saved once: version tracked every generation
    let stats = manager.get_profile_stats("session-user").unwrap();
    assert_eq!(stats.version, 3);
}

#[test]
fn missing_profile_session_is_the_only_error_path() {
    let dir = TempDir::new().unwrap();
    let mut manager = MemoryManager::new(config_for(&dir, false)).unwrap();

    let err = manager
        .profile_session("absent", false, |_p| ())
        .unwrap_err();
    match err {
        MemoryManagerError::ProfileNotFound { profile_id } => {
            assert_eq!(profile_id, "absent");
        }
    }
}

#[test]
fn cache_eviction_under_pressure_does_not_lose_data() {
    let dir = TempDir::new().unwrap();
    let mut manager = MemoryManager::new(config_for(&dir, false)).unwrap();

    // Save more profiles than the cache holds (cache_size = 4)
    for i in 0..6 {
        manager.save_profile(&build_profile(&format!("user-{i}")), false);
    }
    assert_eq!(manager.cache().len(), 4);

    // Evicted profiles still load from disk
    for i in 0..6 {
        let id = format!("user-{i}");
        assert!(manager.load_profile(&id, true).is_some(), "lost {id}");
    }
}

#[test]
fn export_moves_profiles_between_stores() {
    let source_dir = TempDir::new().unwrap();
    let target_dir = TempDir::new().unwrap();
    let export_path = source_dir.path().join("handoff/profile.json.gz");

    let profile = build_profile("portable-user");
    {
        let mut source = MemoryManager::new(config_for(&source_dir, true)).unwrap();
        source.save_profile(&profile, false);
        assert!(source.export_profile("portable-user", &export_path, ExportFormat::JsonGz));
    }

    // Import into a store with different compression settings
    let mut target = MemoryManager::new(config_for(&target_dir, false)).unwrap();
    let id = target
        .import_profile(&export_path, ExportFormat::JsonGz)
        .unwrap();
    assert_eq!(id, "portable-user");

    let imported = target.load_profile("portable-user", false).unwrap();
    assert_eq!(imported, profile);
}

#[test]
fn optimize_then_save_round_trips() {
    let dir = TempDir::new().unwrap();
    let mut manager = MemoryManager::new(config_for(&dir, false)).unwrap();

    let mut profile = ConsumerProfile::new("opt-user");
    for i in 0..10 {
        let importance = if i < 3 { 0.9 } else { 0.1 };
        profile.add_memory(
            format!("memory {i}"),
            "episodic",
            None,
            importance,
            vec![],
            HashMap::new(),
        );
    }

    manager.optimize_memory(&mut profile, 5, 0.5);
    assert_eq!(profile.memories.len(), 5);
    // All three important memories survived
    assert_eq!(
        profile.memories.iter().filter(|m| m.importance >= 0.5).count(),
        3
    );

    manager.save_profile(&profile, false);
    let loaded = manager.load_profile("opt-user", false).unwrap();
    assert_eq!(loaded.memories.len(), 5);
}

#[test]
fn corrupt_profile_file_is_absent_not_fatal() {
    let dir = TempDir::new().unwrap();
    let mut manager = MemoryManager::new(config_for(&dir, false)).unwrap();
    manager.save_profile(&build_profile("corrupt-user"), false);

    std::fs::write(
        dir.path().join("profiles/corrupt-user.json"),
        b"this is not json",
    )
    .unwrap();

    // Cache still has the good copy; a cold read reports absent
    assert!(manager.load_profile("corrupt-user", true).is_some());
    assert!(manager.load_profile("corrupt-user", false).is_none());
}
