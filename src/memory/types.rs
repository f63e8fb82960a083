//! Domain model for consumer profiles
//!
//! The structs here are the serializable unit of state the manager persists.
//! `ConsumerProfile` owns everything beneath it; category profiles, insights,
//! behavior patterns and memory entries are never referenced independently.
//!
//! Serialization is the canonical contract: `to_json_value`/`from_json_value`
//! (and the byte-level variants the storage layer uses) are the only
//! (de)serialization boundary, and `from(to(p))` reproduces `p` exactly.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::constants::{
    CONFIDENCE_HIGH, CONFIDENCE_MEDIUM, CONFIDENCE_VERY_HIGH, DEFAULT_MEMORY_IMPORTANCE,
    ENGAGEMENT_WEIGHT_BASE, ENGAGEMENT_WEIGHT_SPAN, IMPORTANCE_ACCESS_BOOST,
};

/// Fixed set of recommendation categories tracked per profile.
///
/// Serialized as snake_case strings; used as the key of the profile's
/// category map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    Shopping,
    Travel,
    Entertainment,
    Health,
    Restaurants,
    Recipes,
}

impl RecommendationCategory {
    /// All category variants, in declaration order.
    pub const ALL: [RecommendationCategory; 6] = [
        RecommendationCategory::Shopping,
        RecommendationCategory::Travel,
        RecommendationCategory::Entertainment,
        RecommendationCategory::Health,
        RecommendationCategory::Restaurants,
        RecommendationCategory::Recipes,
    ];
}

/// Discrete confidence bands derived from a numeric confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceLevel {
    /// Band for a numeric confidence. This is the only way a level is ever
    /// produced; it is never set independently of the number.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= CONFIDENCE_VERY_HIGH {
            ConfidenceLevel::VeryHigh
        } else if confidence >= CONFIDENCE_HIGH {
            ConfidenceLevel::High
        } else if confidence >= CONFIDENCE_MEDIUM {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// A derived observation with supporting evidence and a confidence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub insight_type: String,
    pub description: String,
    pub evidence: Vec<String>,
    pub confidence: f64,
    /// Derived from `confidence`; kept in the serialized form so consumers
    /// can filter without re-deriving.
    pub confidence_level: ConfidenceLevel,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Insight {
    pub fn new(
        insight_type: impl Into<String>,
        description: impl Into<String>,
        evidence: Vec<String>,
        confidence: f64,
    ) -> Self {
        let confidence = confidence.clamp(0.0, 1.0);
        let now = Utc::now();
        Self {
            insight_type: insight_type.into(),
            description: description.into(),
            evidence,
            confidence,
            confidence_level: ConfidenceLevel::from_confidence(confidence),
            created_at: now,
            last_updated: now,
        }
    }

    /// Update confidence, re-derive the level and refresh the timestamp.
    pub fn update_confidence(&mut self, new_confidence: f64) {
        self.confidence = new_confidence.clamp(0.0, 1.0);
        self.confidence_level = ConfidenceLevel::from_confidence(self.confidence);
        self.last_updated = Utc::now();
    }
}

/// A recurring, evidenced activity signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorPattern {
    pub pattern_id: String,
    pub pattern_type: String,
    pub description: String,
    /// Number of supporting observations; only ever grows.
    pub frequency: u32,
    /// Timestamp of the most recent supporting evidence.
    pub recency: DateTime<Utc>,
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl BehaviorPattern {
    pub fn new(
        pattern_type: impl Into<String>,
        description: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            pattern_id: Uuid::new_v4().to_string(),
            pattern_type: pattern_type.into(),
            description: description.into(),
            frequency: 1,
            recency: Utc::now(),
            confidence: confidence.clamp(0.0, 1.0),
            evidence: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Record a new supporting observation: evidence grows, frequency bumps,
    /// recency refreshes.
    pub fn add_evidence(&mut self, evidence_item: impl Into<String>) {
        self.evidence.push(evidence_item.into());
        self.frequency += 1;
        self.recency = Utc::now();
    }
}

/// Per-category slice of a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryProfile {
    pub category: RecommendationCategory,
    #[serde(default)]
    pub insights: Vec<Insight>,
    #[serde(default)]
    pub behavior_patterns: Vec<BehaviorPattern>,
    #[serde(default)]
    pub preferences: HashMap<String, serde_json::Value>,
    pub engagement_score: f64,
    pub last_analyzed: Option<DateTime<Utc>>,
    pub analysis_count: u32,
}

impl CategoryProfile {
    pub fn new(category: RecommendationCategory) -> Self {
        Self {
            category,
            insights: Vec::new(),
            behavior_patterns: Vec::new(),
            preferences: HashMap::new(),
            engagement_score: 0.0,
            last_analyzed: None,
            analysis_count: 0,
        }
    }

    /// Record a new insight for this category.
    pub fn add_insight(&mut self, insight: Insight) {
        self.insights.push(insight);
        self.last_analyzed = Some(Utc::now());
        self.analysis_count += 1;
    }

    /// Insights in the High or VeryHigh confidence bands.
    pub fn high_confidence_insights(&self) -> Vec<&Insight> {
        self.insights
            .iter()
            .filter(|i| {
                matches!(
                    i.confidence_level,
                    ConfidenceLevel::High | ConfidenceLevel::VeryHigh
                )
            })
            .collect()
    }

    pub fn update_engagement_score(&mut self, new_score: f64) {
        self.engagement_score = new_score.clamp(0.0, 1.0);
        self.last_analyzed = Some(Utc::now());
    }
}

/// An atomic fact recorded against a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub memory_id: String,
    pub content: String,
    /// episodic, semantic or procedural
    pub memory_type: String,
    pub category: Option<RecommendationCategory>,
    pub created_at: DateTime<Utc>,
    pub accessed_count: u32,
    pub last_accessed: Option<DateTime<Utc>>,
    pub importance: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
}

impl MemoryEntry {
    pub fn new(
        content: impl Into<String>,
        memory_type: impl Into<String>,
        category: Option<RecommendationCategory>,
    ) -> Self {
        Self {
            memory_id: Uuid::new_v4().to_string(),
            content: content.into(),
            memory_type: memory_type.into(),
            category,
            created_at: Utc::now(),
            accessed_count: 0,
            last_accessed: None,
            importance: DEFAULT_MEMORY_IMPORTANCE,
            tags: Vec::new(),
            context: HashMap::new(),
        }
    }

    /// Record a retrieval of this memory. Importance gets a small boost on
    /// each access, capped at 1.0.
    pub fn access(&mut self) {
        self.accessed_count += 1;
        self.last_accessed = Some(Utc::now());
        self.importance = (self.importance + IMPORTANCE_ACCESS_BOOST).min(1.0);
    }
}

/// The durable per-user aggregate of category insights, behavior patterns
/// and memories.
///
/// Invariant: `categories` contains an entry for every
/// [`RecommendationCategory`] variant. Construction and deserialization both
/// enforce this, so callers never null-check a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerProfile {
    pub profile_id: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,

    /// Private so external code cannot remove a variant and break the
    /// completeness invariant; read via [`ConsumerProfile::categories`],
    /// mutate via [`ConsumerProfile::category_mut`].
    categories: HashMap<RecommendationCategory, CategoryProfile>,

    /// Cross-category behavior patterns
    #[serde(default)]
    pub behavioral_patterns: Vec<BehaviorPattern>,
    #[serde(default)]
    pub demographic_insights: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub temporal_patterns: HashMap<String, serde_json::Value>,

    #[serde(default)]
    pub memories: Vec<MemoryEntry>,

    #[serde(default)]
    pub data_sources: Vec<String>,
    #[serde(default)]
    pub analysis_history: Vec<serde_json::Value>,
    pub confidence_score: f64,
}

impl ConsumerProfile {
    /// New empty profile with the given id and all categories seeded.
    pub fn new(profile_id: impl Into<String>) -> Self {
        let now = Utc::now();
        let categories = RecommendationCategory::ALL
            .iter()
            .map(|&c| (c, CategoryProfile::new(c)))
            .collect();
        Self {
            profile_id: profile_id.into(),
            created_at: now,
            last_updated: now,
            categories,
            behavioral_patterns: Vec::new(),
            demographic_insights: HashMap::new(),
            temporal_patterns: HashMap::new(),
            memories: Vec::new(),
            data_sources: Vec::new(),
            analysis_history: Vec::new(),
            confidence_score: 0.0,
        }
    }

    /// New profile with a generated UUID id.
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    /// Backfill any category variant missing from the map.
    ///
    /// Older serialized profiles may predate a category; the completeness
    /// invariant is restored here rather than pushed onto every caller.
    fn ensure_categories(&mut self) {
        for &category in RecommendationCategory::ALL.iter() {
            self.categories
                .entry(category)
                .or_insert_with(|| CategoryProfile::new(category));
        }
    }

    /// All category slices, keyed by category.
    pub fn categories(&self) -> &HashMap<RecommendationCategory, CategoryProfile> {
        &self.categories
    }

    /// Category slice, infallible thanks to the completeness invariant.
    pub fn category(&self, category: RecommendationCategory) -> &CategoryProfile {
        self.categories
            .get(&category)
            .expect("category map is always fully populated")
    }

    /// Mutable category slice.
    pub fn category_mut(&mut self, category: RecommendationCategory) -> &mut CategoryProfile {
        self.categories
            .get_mut(&category)
            .expect("category map is always fully populated")
    }

    /// Record an insight against a category and touch the profile.
    pub fn add_insight(&mut self, category: RecommendationCategory, insight: Insight) {
        self.category_mut(category).add_insight(insight);
        self.last_updated = Utc::now();
    }

    /// Append a new memory entry, returning its id.
    #[allow(clippy::too_many_arguments)]
    pub fn add_memory(
        &mut self,
        content: impl Into<String>,
        memory_type: impl Into<String>,
        category: Option<RecommendationCategory>,
        importance: f64,
        tags: Vec<String>,
        context: HashMap<String, serde_json::Value>,
    ) -> String {
        let mut entry = MemoryEntry::new(content, memory_type, category);
        entry.importance = importance.clamp(0.0, 1.0);
        entry.tags = tags;
        entry.context = context;
        let memory_id = entry.memory_id.clone();
        self.memories.push(entry);
        self.last_updated = Utc::now();
        memory_id
    }

    pub fn memories_by_category(
        &self,
        category: RecommendationCategory,
    ) -> Vec<&MemoryEntry> {
        self.memories
            .iter()
            .filter(|m| m.category == Some(category))
            .collect()
    }

    /// Memories created within the last `days` days.
    pub fn recent_memories(&self, days: i64) -> Vec<&MemoryEntry> {
        let cutoff = Utc::now() - Duration::days(days);
        self.memories
            .iter()
            .filter(|m| m.created_at >= cutoff)
            .collect()
    }

    pub fn high_importance_memories(&self, threshold: f64) -> Vec<&MemoryEntry> {
        self.memories
            .iter()
            .filter(|m| m.importance >= threshold)
            .collect()
    }

    /// Recompute overall profile confidence from category insights.
    ///
    /// Each category with at least one insight contributes its mean insight
    /// confidence weighted by `0.7 + 0.3 * engagement_score`; the profile
    /// score is the mean of those contributions. Categories without insights
    /// are excluded entirely rather than counted as zero.
    pub fn update_confidence_score(&mut self) {
        let mut category_scores = Vec::new();
        for category_profile in self.categories.values() {
            if category_profile.insights.is_empty() {
                continue;
            }
            let avg_confidence = category_profile
                .insights
                .iter()
                .map(|i| i.confidence)
                .sum::<f64>()
                / category_profile.insights.len() as f64;
            let weight =
                ENGAGEMENT_WEIGHT_BASE + ENGAGEMENT_WEIGHT_SPAN * category_profile.engagement_score;
            category_scores.push(avg_confidence * weight);
        }

        self.confidence_score = if category_scores.is_empty() {
            0.0
        } else {
            category_scores.iter().sum::<f64>() / category_scores.len() as f64
        };
        self.last_updated = Utc::now();
    }

    /// Record an analysis run in the profile's history.
    pub fn add_analysis_record(
        &mut self,
        analysis_type: impl Into<String>,
        results: serde_json::Value,
    ) {
        self.analysis_history.push(serde_json::json!({
            "timestamp": Utc::now(),
            "analysis_type": analysis_type.into(),
            "results": results,
        }));
        self.last_updated = Utc::now();
    }

    // =========================================================================
    // Canonical serialization boundary
    // =========================================================================

    /// Canonical JSON form of the profile.
    pub fn to_json_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    /// Rebuild a profile from its canonical JSON form.
    ///
    /// Restores the category-completeness invariant after deserialization.
    pub fn from_json_value(value: serde_json::Value) -> serde_json::Result<Self> {
        let mut profile: ConsumerProfile = serde_json::from_value(value)?;
        profile.ensure_categories();
        Ok(profile)
    }

    /// Canonical pretty-printed JSON bytes (the on-disk representation
    /// before optional compression).
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    /// Rebuild a profile from canonical JSON bytes.
    pub fn from_json_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        let mut profile: ConsumerProfile = serde_json::from_slice(bytes)?;
        profile.ensure_categories();
        Ok(profile)
    }
}
