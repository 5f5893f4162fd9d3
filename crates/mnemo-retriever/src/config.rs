use mnemo_core::gate::NoiseFilterConfig;

/// Whether the hybrid (vector + BM25) path is attempted at all. The
/// retriever always falls back to vector-only when the store reports no
/// FTS support, regardless of this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
    Hybrid,
    VectorOnly,
}

/// Tunable knobs for the `retrieve` pipeline. Defaults are opinionated,
/// chosen to match the worked examples in the scoring functions they feed
/// (`mnemo_core::score`); callers needing different behavior adjust the
/// relevant field and call `Retriever::update_config`.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub mode: RetrievalMode,

    /// Candidate pool size per source before fusion; the effective pool is
    /// `max(pool_size, 2 * limit)`.
    pub pool_size: usize,

    /// Fusion-stage drop threshold (step 5): candidates with `fused <
    /// min_score` never reach post-processing.
    pub min_score: f32,

    /// Final drop threshold (step 8), applied after all post-processing.
    pub hard_min_score: f32,

    pub rerank_enabled: bool,

    pub recency_half_life_days: f32,
    pub recency_weight: f32,
    pub time_decay_half_life_days: f32,
    /// Character-length anchor for `length_norm`; texts shorter than this
    /// are left unchanged.
    pub length_anchor_chars: f32,

    /// Cosine-similarity threshold above which MMR defers a candidate in
    /// favor of diversity.
    pub mmr_threshold: f32,

    pub noise_filter_enabled: bool,
    pub noise_filter: NoiseFilterConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            mode: RetrievalMode::Hybrid,
            pool_size: 20,
            min_score: 0.15,
            hard_min_score: 0.3,
            rerank_enabled: true,
            recency_half_life_days: 7.0,
            recency_weight: 0.1,
            time_decay_half_life_days: 30.0,
            length_anchor_chars: 200.0,
            mmr_threshold: 0.85,
            noise_filter_enabled: true,
            noise_filter: NoiseFilterConfig::default(),
        }
    }
}
