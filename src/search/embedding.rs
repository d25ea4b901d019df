//! Text embedding for the product index.
//!
//! The default embedder is a deterministic feature hasher: character
//! trigrams of the lowercased input are hashed into a fixed-dimension
//! accumulator with alternating sign, then L2-normalized. Two texts sharing
//! many trigrams land close under inner product, which is what the index
//! scan needs; no model weights or external services are involved.

use ahash::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};

pub const DEFAULT_DIMENSION: usize = 256;

const TRIGRAM: usize = 3;

/// Fixed seeds keep the hashing stable across processes, so a persisted
/// index snapshot stays queryable after a restart.
const HASH_SEEDS: (u64, u64, u64, u64) = (
    0x9e37_79b9_7f4a_7c15,
    0x2545_f491_4f6c_dd1d,
    0x27d4_eb2f_1656_67c5,
    0x1656_67b1_9e37_79f9,
);

/// Produces normalized fixed-dimension vectors from text.
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    /// Embed `text` into a vector of `dimension()` components with unit L2
    /// norm (or all zeros when the text carries no signal).
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Deterministic trigram-hashing embedder.
#[derive(Debug, Clone)]
pub struct HashedTextEmbedder {
    dimension: usize,
    hasher: RandomState,
}

impl HashedTextEmbedder {
    pub fn new(dimension: usize) -> Self {
        let (a, b, c, d) = HASH_SEEDS;
        Self {
            dimension,
            hasher: RandomState::with_seeds(a, b, c, d),
        }
    }
}

impl Default for HashedTextEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl Embedder for HashedTextEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut components = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        for window in chars.windows(TRIGRAM) {
            let mut hasher = self.hasher.build_hasher();
            window.hash(&mut hasher);
            let hash = hasher.finish();
            let bucket = (hash as usize) % self.dimension;
            // Sign bit from the high half spreads collisions apart.
            let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
            components[bucket] += sign;
        }

        l2_normalize(&mut components);
        components
    }
}

/// Scale the vector to unit L2 norm; zero vectors stay zero.
pub fn l2_normalize(components: &mut [f32]) {
    let norm = components.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for component in components.iter_mut() {
            *component /= norm;
        }
    }
}

/// Inner product; cosine similarity when both inputs are normalized.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeddings_are_deterministic() {
        let embedder = HashedTextEmbedder::default();
        assert_eq!(
            embedder.embed("wireless headphones"),
            embedder.embed("wireless headphones")
        );
    }

    #[test]
    fn embeddings_are_unit_length() {
        let embedder = HashedTextEmbedder::default();
        let vector = embedder.embed("mechanical keyboard with rgb lighting");
        let norm = dot(&vector, &vector).sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm was {norm}");
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let embedder = HashedTextEmbedder::default();
        let vector = embedder.embed("");
        assert!(vector.iter().all(|v| *v == 0.0));
        assert_eq!(vector.len(), DEFAULT_DIMENSION);
    }

    #[test]
    fn case_does_not_change_the_embedding() {
        let embedder = HashedTextEmbedder::default();
        assert_eq!(embedder.embed("Coffee Maker"), embedder.embed("coffee maker"));
    }

    #[test]
    fn similar_texts_score_higher_than_unrelated_ones() {
        let embedder = HashedTextEmbedder::default();
        let query = embedder.embed("wireless bluetooth headphones");
        let close = embedder.embed("bluetooth headphones with noise cancelling");
        let far = embedder.embed("stainless steel kitchen knife set");
        assert!(dot(&query, &close) > dot(&query, &far));
    }
}
