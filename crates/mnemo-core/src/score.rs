//! Pure scoring math shared by the memory store's candidate ranking and the
//! retriever's fusion/post-processing/diversification stages. Every
//! function here is a pure function of its numeric inputs so each stage is
//! independently unit-testable, per the "numerical pipeline" design note.

/// Clamp `value` into `[0, 1]`.
#[must_use]
pub fn clamp01(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// `clamp01(new)`, but never below `old * floor_ratio`. Used by every
/// post-processing stage to prevent a single factor from collapsing a
/// candidate's score to near zero.
#[must_use]
pub fn clamp01_with_floor(new: f32, old: f32, floor_ratio: f32) -> f32 {
    let floor = (old * floor_ratio).clamp(0.0, 1.0);
    new.clamp(floor, 1.0)
}

/// Cosine similarity of two equal-length vectors. Returns `None` on a
/// length mismatch rather than panicking; callers that reach a mismatch
/// have already violated the store's dimension invariant.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return Some(0.0);
    }
    Some(dot / denom)
}

// --- Fusion (spec §4.3 step 5) -------------------------------------------

/// A candidate present only in the vector search results.
#[must_use]
pub fn fuse_vector_only(vector_score: f32) -> f32 {
    vector_score.max(0.1)
}

/// A candidate present in both the vector and BM25 results: an additive
/// 15% lift per lexical confirmation, proportional to the BM25 score.
#[must_use]
pub fn fuse_both(vector_score: f32, bm25_score: f32) -> f32 {
    clamp01(vector_score + 0.15 * vector_score * bm25_score)
}

/// A candidate present only in the BM25 results: floored at 0.5 so
/// lexical-only matches are demoted relative to dense hits.
#[must_use]
pub fn fuse_bm25_only(bm25_score: f32) -> f32 {
    bm25_score.max(0.5)
}

/// Converts a raw full-text engine score into `[0, 1]` via a sigmoid; zero
/// or missing raw scores become 0.5 (a lexical hit present but unranked).
#[must_use]
pub fn normalize_bm25_raw(raw: Option<f32>) -> f32 {
    match raw {
        None => 0.5,
        Some(r) if r == 0.0 => 0.5,
        Some(r) => 1.0 / (1.0 + (-r / 5.0).exp()),
    }
}

/// Converts an ANN distance into a similarity score.
#[must_use]
pub fn distance_to_similarity(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

// --- Rerank blending (spec §4.3 step 6) -----------------------------------

/// Blend a cross-encoder reranker score with the pre-rerank fused score.
#[must_use]
pub fn blend_reranked(reranker_score: f32, fused_score: f32) -> f32 {
    clamp01_with_floor(
        0.6 * reranker_score + 0.4 * fused_score,
        fused_score,
        0.5,
    )
}

/// Lightweight fallback blend used when the cross-encoder reranker is
/// unavailable: a weighted combination of the fused score and query/vector
/// cosine similarity.
#[must_use]
pub fn blend_lightweight(fused_score: f32, cosine: f32) -> f32 {
    0.7 * fused_score + 0.3 * cosine
}

/// Decay applied to a candidate the reranker did not return a score for.
#[must_use]
pub fn unranked_penalty(score: f32) -> f32 {
    score * 0.8
}

// --- Post-processing pipeline (spec §4.3 step 7) --------------------------

const MS_PER_DAY: f32 = 1000.0 * 60.0 * 60.0 * 24.0;

/// Age in days, given millisecond epoch timestamps; missing timestamps are
/// treated as "now" (age 0) by callers passing `now_ms` as the timestamp.
#[must_use]
pub fn age_days(now_ms: i64, timestamp_ms: i64) -> f32 {
    ((now_ms - timestamp_ms).max(0) as f32) / MS_PER_DAY
}

/// Additive recency boost: `clamp01(score + exp(-age/halfLife) * weight)`.
#[must_use]
pub fn recency_boost(score: f32, age_days: f32, half_life_days: f32, weight: f32) -> f32 {
    let boost = (-age_days / half_life_days.max(1e-6)).exp() * weight;
    clamp01(score + boost)
}

/// Importance weight: `score * (0.7 + 0.3 * importance)`, floor 70%.
#[must_use]
pub fn importance_weight(score: f32, importance: f32) -> f32 {
    let new = score * (0.7 + 0.3 * importance.clamp(0.0, 1.0));
    clamp01_with_floor(new, score, 0.7)
}

/// Length normalization: longer-than-anchor texts are smoothly penalized,
/// floor 30%. Shorter-than-anchor texts are unchanged.
#[must_use]
pub fn length_norm(score: f32, char_len: usize, anchor: f32) -> f32 {
    let ratio = (char_len as f32 / anchor.max(1e-6)).max(1.0);
    let new = score / (1.0 + 0.5 * ratio.log2());
    clamp01_with_floor(new, score, 0.3)
}

/// Time decay: `score * (0.5 + 0.5 * exp(-age/halfLife))`, floor 50%.
#[must_use]
pub fn time_decay(score: f32, age_days: f32, half_life_days: f32) -> f32 {
    let factor = 0.5 + 0.5 * (-age_days / half_life_days.max(1e-6)).exp();
    let new = score * factor;
    clamp01_with_floor(new, score, 0.5)
}

// --- MMR diversity (spec §4.3 step 10) ------------------------------------

/// Greedy maximal-marginal-relevance ordering: candidates are visited in
/// their existing (score-descending) order; a candidate is deferred if its
/// vector has cosine similarity greater than `threshold` to any
/// already-selected candidate. Returns a permutation of `0..vectors.len()`
/// with selected indices first, then deferred indices, each group
/// preserving relative order. Callers truncate the result to the retrieval
/// limit. O(n^2) in the candidate pool size, which the caller bounds to
/// `2 * limit`.
#[must_use]
pub fn mmr_order(vectors: &[Vec<f32>], threshold: f32) -> Vec<usize> {
    let mut selected: Vec<usize> = Vec::new();
    let mut deferred: Vec<usize> = Vec::new();
    for (i, candidate) in vectors.iter().enumerate() {
        let too_similar = selected.iter().any(|&j| {
            cosine_similarity(candidate, &vectors[j]).is_some_and(|sim| sim > threshold)
        });
        if too_similar {
            deferred.push(i);
        } else {
            selected.push(i);
        }
    }
    selected.into_iter().chain(deferred).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_mismatched_lengths_is_none() {
        assert!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]).is_none());
    }

    #[test]
    fn fuse_vector_only_has_floor() {
        assert_eq!(fuse_vector_only(0.02), 0.1);
        assert_eq!(fuse_vector_only(0.5), 0.5);
    }

    #[test]
    fn fuse_both_lifts_vector_score() {
        let fused = fuse_both(0.6, 0.8);
        assert!(fused > 0.6);
        assert!((fused - (0.6 + 0.15 * 0.6 * 0.8)).abs() < 1e-6);
    }

    #[test]
    fn fuse_bm25_only_has_floor() {
        assert_eq!(fuse_bm25_only(0.2), 0.5);
        assert_eq!(fuse_bm25_only(0.9), 0.9);
    }

    #[test]
    fn blend_reranked_respects_floor() {
        let blended = blend_reranked(0.0, 0.8);
        assert!(blended >= 0.8 * 0.5);
    }

    #[test]
    fn importance_weight_floor_is_seventy_percent() {
        let score = 1.0;
        let out = importance_weight(score, 0.0);
        assert!((out - 0.7).abs() < 1e-6);
    }

    #[test]
    fn length_norm_leaves_short_text_unchanged() {
        let score = 0.8;
        assert!((length_norm(score, 50, 200.0) - score).abs() < 1e-6);
    }

    #[test]
    fn length_norm_penalizes_long_text_with_floor() {
        let score = 0.8;
        let out = length_norm(score, 8000, 200.0);
        assert!(out < score);
        assert!(out >= score * 0.3 - 1e-6);
    }

    #[test]
    fn time_decay_asymptotic_floor_is_fifty_percent() {
        let score = 1.0;
        let out = time_decay(score, 100_000.0, 30.0);
        assert!((out - 0.5).abs() < 1e-3);
    }

    #[test]
    fn recency_boost_never_decreases_score() {
        let score = 0.5;
        assert!(recency_boost(score, 0.0, 7.0, 0.1) >= score);
        assert!(recency_boost(score, 365.0, 7.0, 0.1) >= score);
    }

    #[test]
    fn mmr_defers_near_duplicate_vectors() {
        let vectors = vec![vec![1.0, 0.0], vec![0.99, 0.02], vec![0.0, 1.0]];
        let order = mmr_order(&vectors, 0.85);
        assert_eq!(order, vec![0, 2, 1]);
    }

    #[test]
    fn mmr_every_adjacent_selected_pair_is_below_threshold() {
        let vectors = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.9, 0.1, 0.0],
        ];
        let order = mmr_order(&vectors, 0.85);
        let mut selected = Vec::new();
        for &i in &order {
            let vi = vectors.get(i).unwrap();
            let too_close = selected
                .iter()
                .any(|&j: &usize| cosine_similarity(vi, vectors.get(j).unwrap()).unwrap_or(0.0) > 0.85);
            if !too_close {
                selected.push(i);
            }
        }
        for pair in selected.windows(2) {
            let a = vectors.get(*pair.first().unwrap()).unwrap();
            let b = vectors.get(*pair.get(1).unwrap()).unwrap();
            let sim = cosine_similarity(a, b).unwrap_or(0.0);
            assert!(sim <= 0.85);
        }
    }
}
