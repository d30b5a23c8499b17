//! Similarity computation and exact top-k ranking.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::store::VectorStore;

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means same direction
/// - 0.0 means orthogonal, or that either vector is all zeros
/// - -1.0 means opposite direction
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    Ok(cosine_from_parts(dot(a, b), l2_norm(a), l2_norm(b)))
}

pub(crate) fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn cosine_from_parts(dot: f32, norm_a: f32, norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let score = dot / (norm_a * norm_b);
    // Overflow in the products leaves no usable direction.
    if !score.is_finite() {
        return 0.0;
    }
    score.clamp(-1.0, 1.0)
}

/// A chunk paired with its similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredChunk<'a> {
    /// Position of the chunk in the store.
    pub index: usize,

    /// The chunk's text.
    pub text: &'a str,

    /// Cosine similarity to the query.
    pub score: f32,
}

/// Ranking key: higher score wins, then lower store index.
#[derive(Debug, PartialEq, Eq)]
struct RankKey {
    score: OrderedFloat<f32>,
    index: usize,
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find the `k` chunks most similar to `query`.
///
/// Every chunk is scored; nothing is skipped or approximated. Results are
/// ordered by descending score, and chunks with equal scores keep their
/// store order. Asking for more chunks than the store holds returns all of
/// them.
pub fn find_top_k<'a>(
    query: &[f32],
    store: &'a VectorStore,
    k: usize,
) -> Result<Vec<ScoredChunk<'a>>> {
    if k == 0 {
        return Err(EmbeddingError::ZeroTopK);
    }
    if query.len() != store.dimension() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: store.dimension(),
            actual: query.len(),
        });
    }

    let query_norm = l2_norm(query);
    let limit = k.min(store.len());

    // Min-heap of the best `limit` keys seen so far; the root is the weakest.
    let mut heap: BinaryHeap<Reverse<RankKey>> = BinaryHeap::with_capacity(limit + 1);
    for (index, chunk) in store.chunks().iter().enumerate() {
        let score = cosine_from_parts(dot(query, chunk.embedding()), query_norm, chunk.norm());
        let key = RankKey {
            score: OrderedFloat(score),
            index,
        };

        if heap.len() < limit {
            heap.push(Reverse(key));
        } else if heap.peek().is_some_and(|Reverse(weakest)| key > *weakest) {
            heap.pop();
            heap.push(Reverse(key));
        }
    }

    let mut ranked: Vec<RankKey> = heap.into_iter().map(|Reverse(key)| key).collect();
    ranked.sort_unstable();
    ranked.reverse();

    let chunks = store.chunks();
    Ok(ranked
        .into_iter()
        .map(|key| ScoredChunk {
            index: key.index,
            text: chunks[key.index].text(),
            score: key.score.into_inner(),
        })
        .collect())
}

/// Normalize an embedding to unit length.
pub fn normalize(embedding: &mut [f32]) {
    let magnitude = l2_norm(embedding);
    if magnitude > 0.0 {
        for x in embedding.iter_mut() {
            *x /= magnitude;
        }
    }
}

/// Average token-level vectors into a single sentence vector.
pub fn mean_pool(token_vectors: &[Embedding]) -> Result<Embedding> {
    let Some(first) = token_vectors.first() else {
        return Err(EmbeddingError::EmptyInput);
    };

    let dim = first.len();
    let mut pooled = vec![0.0f32; dim];
    for vector in token_vectors {
        if vector.len() != dim {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dim,
                actual: vector.len(),
            });
        }
        for (acc, val) in pooled.iter_mut().zip(vector) {
            *acc += val;
        }
    }

    let n = token_vectors.len() as f32;
    for acc in pooled.iter_mut() {
        *acc /= n;
    }

    Ok(pooled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Chunk;
    use pretty_assertions::assert_eq;

    fn store(entries: &[(&str, Vec<f32>)]) -> VectorStore {
        VectorStore::new(
            entries
                .iter()
                .map(|(text, embedding)| Chunk::new(*text, embedding.clone()))
                .collect(),
        )
        .unwrap()
    }

    fn texts<'a>(results: &[ScoredChunk<'a>]) -> Vec<&'a str> {
        results.iter().map(|r| r.text).collect()
    }

    /// Deterministic pseudo-random vectors in [-1, 1).
    fn pseudo_random_vectors(count: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut state = seed;
        let mut next = move || {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
        };
        (0..count)
            .map(|_| (0..dim).map(|_| next()).collect())
            .collect()
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&a, &a).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).unwrap();
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[-1.0, 0.0, 0.0]).unwrap();
        assert!((sim - (-1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 1.0], &[0.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_cosine_similarity_is_bounded() {
        let vectors = pseudo_random_vectors(32, 16, 7);
        for a in &vectors {
            for b in &vectors {
                let sim = cosine_similarity(a, b).unwrap();
                assert!((-1.0..=1.0).contains(&sim), "score {sim} out of range");
            }
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        assert!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_mean_pool() {
        let pooled = mean_pool(&[vec![1.0, 2.0], vec![3.0, 6.0]]).unwrap();
        assert_eq!(pooled, vec![2.0, 4.0]);
    }

    #[test]
    fn test_mean_pool_rejects_bad_input() {
        assert!(matches!(mean_pool(&[]), Err(EmbeddingError::EmptyInput)));
        assert!(matches!(
            mean_pool(&[vec![1.0, 2.0], vec![1.0]]),
            Err(EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_find_top_k_single_best() {
        let store = store(&[("A", vec![1.0, 0.0]), ("B", vec![0.0, 1.0])]);

        let results = find_top_k(&[1.0, 0.0], &store, 1).unwrap();
        assert_eq!(texts(&results), vec!["A"]);
        assert_eq!(results[0].score, 1.0);
        assert_eq!(results[0].index, 0);
    }

    #[test]
    fn test_find_top_k_orders_by_score() {
        let store = store(&[
            ("a", vec![1.0, 0.0, 0.0]),
            ("b", vec![0.0, 1.0, 0.0]),
            ("c", vec![0.7, 0.7, 0.0]),
        ]);

        let results = find_top_k(&[1.0, 0.0, 0.0], &store, 2).unwrap();
        assert_eq!(texts(&results), vec!["a", "c"]);
    }

    #[test]
    fn test_find_top_k_larger_than_store() {
        let store = store(&[("A", vec![0.0, 1.0]), ("B", vec![1.0, 0.2])]);

        let results = find_top_k(&[1.0, 0.0], &store, 4).unwrap();
        assert_eq!(texts(&results), vec!["B", "A"]);
    }

    #[test]
    fn test_zero_query_keeps_store_order() {
        let store = store(&[
            ("first", vec![1.0, 0.0]),
            ("second", vec![-1.0, 0.0]),
            ("third", vec![0.5, 0.5]),
        ]);

        let results = find_top_k(&[0.0, 0.0], &store, 3).unwrap();
        assert_eq!(texts(&results), vec!["first", "second", "third"]);
        assert!(results.iter().all(|r| r.score == 0.0));
    }

    #[test]
    fn test_zero_chunk_scores_zero_between_signed_chunks() {
        let store = store(&[
            ("against", vec![-1.0, 0.0]),
            ("empty", vec![0.0, 0.0]),
            ("along", vec![1.0, 0.0]),
        ]);

        let results = find_top_k(&[1.0, 0.0], &store, 3).unwrap();
        assert_eq!(texts(&results), vec!["along", "empty", "against"]);
        assert_eq!(results[1].index, 1);
        assert_eq!(results[1].score, 0.0);
        assert_eq!(results[0].score, 1.0);
        assert_eq!(results[2].score, -1.0);
    }

    #[test]
    fn test_ties_keep_store_order() {
        let store = store(&[
            ("low", vec![0.0, 1.0]),
            ("tie-1", vec![2.0, 0.0]),
            ("tie-2", vec![1.0, 0.0]),
            ("tie-3", vec![5.0, 0.0]),
        ]);

        let results = find_top_k(&[1.0, 0.0], &store, 2).unwrap();
        assert_eq!(texts(&results), vec!["tie-1", "tie-2"]);

        let results = find_top_k(&[1.0, 0.0], &store, 4).unwrap();
        assert_eq!(texts(&results), vec!["tie-1", "tie-2", "tie-3", "low"]);
    }

    #[test]
    fn test_find_top_k_matches_brute_force() {
        let vectors = pseudo_random_vectors(200, 24, 42);
        let names: Vec<String> = (0..vectors.len()).map(|i| format!("chunk-{i}")).collect();
        let store = VectorStore::new(
            names
                .iter()
                .zip(&vectors)
                .map(|(name, v)| Chunk::new(name.clone(), v.clone()))
                .collect(),
        )
        .unwrap();
        let query = pseudo_random_vectors(1, 24, 99).remove(0);

        let mut expected: Vec<(usize, f32)> = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(&query, v).unwrap()))
            .collect();
        expected.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        for k in [1, 4, 17, 200, 500] {
            let results = find_top_k(&query, &store, k).unwrap();
            assert_eq!(results.len(), k.min(200));
            let got: Vec<(usize, f32)> = results.iter().map(|r| (r.index, r.score)).collect();
            assert_eq!(got, expected[..k.min(200)].to_vec());
        }
    }

    #[test]
    fn test_find_top_k_is_deterministic() {
        let vectors = pseudo_random_vectors(64, 8, 3);
        let store = VectorStore::new(
            vectors
                .into_iter()
                .enumerate()
                .map(|(i, v)| Chunk::new(format!("c{i}"), v))
                .collect(),
        )
        .unwrap();
        let query = pseudo_random_vectors(1, 8, 11).remove(0);

        let first = find_top_k(&query, &store, 10).unwrap();
        for _ in 0..5 {
            assert_eq!(find_top_k(&query, &store, 10).unwrap(), first);
        }
    }

    #[test]
    fn test_find_top_k_rejects_bad_arguments() {
        let store = store(&[("A", vec![1.0, 0.0])]);

        assert!(matches!(
            find_top_k(&[1.0, 0.0, 0.0], &store, 1),
            Err(EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
        assert!(matches!(
            find_top_k(&[1.0, 0.0], &store, 0),
            Err(EmbeddingError::ZeroTopK)
        ));
    }
}
