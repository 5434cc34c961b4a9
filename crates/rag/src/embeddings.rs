//! EmbeddingProvider (C1): text → unit-norm dense vector, memoised in a
//! bounded most-recently-used cache.

use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::RagError;

/// Embedding configuration.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Embedding dimension (F). Default matches qwen3-embedding:0.6b.
    pub dim: usize,
    /// Maximum number of distinct inputs held in the MRU cache.
    pub cache_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        use ragqa_config::constants::rag;
        Self {
            dim: rag::DEFAULT_EMBEDDING_DIM,
            cache_size: rag::DEFAULT_EMBEDDING_CACHE_SIZE,
        }
    }
}

/// Observable cache counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

struct Cache {
    // Front = most recently used.
    order: VecDeque<String>,
    entries: std::collections::HashMap<String, Vec<f32>>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl Cache {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            entries: std::collections::HashMap::with_capacity(capacity),
            capacity,
            hits: 0,
            misses: 0,
        }
    }

    fn get(&mut self, key: &str) -> Option<Vec<f32>> {
        if let Some(value) = self.entries.get(key).cloned() {
            self.hits += 1;
            self.promote(key);
            Some(value)
        } else {
            self.misses += 1;
            None
        }
    }

    fn promote(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_front(key.to_string());
    }

    fn insert(&mut self, key: String, value: Vec<f32>) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            if let Some(evicted) = self.order.pop_back() {
                self.entries.remove(&evicted);
            }
        }
        self.order.push_front(key.clone());
        self.entries.insert(key, value);
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            size: self.entries.len(),
        }
    }
}

/// Deterministic, model-free text embedder with an MRU memoisation cache.
///
/// Generalises the teacher's `SimpleEmbedder` hash-based embedding (no ONNX
/// model download required) with the cache the specification requires.
pub struct EmbeddingProvider {
    config: EmbeddingConfig,
    cache: Mutex<Cache>,
}

impl EmbeddingProvider {
    pub fn new(config: EmbeddingConfig) -> Self {
        let cache = Cache::new(config.cache_size);
        Self {
            config,
            cache: Mutex::new(cache),
        }
    }

    pub fn dim(&self) -> usize {
        self.config.dim
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    /// `embed(text) -> unit-norm vector of F floats`. Same input always
    /// produces a byte-identical output.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        if let Some(hit) = self.cache.lock().get(text) {
            return Ok(hit);
        }

        let vector = self.compute(text);
        self.cache.lock().insert(text.to_string(), vector.clone());
        Ok(vector)
    }

    fn compute(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.config.dim];

        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % self.config.dim;
            embedding[idx] += 1.0;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeddings_are_unit_norm() {
        let provider = EmbeddingProvider::new(EmbeddingConfig::default());
        let embedding = provider.embed("Hello world").unwrap();
        assert_eq!(embedding.len(), 1024);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6 || norm == 0.0);
    }

    #[test]
    fn same_input_yields_identical_output() {
        let provider = EmbeddingProvider::new(EmbeddingConfig::default());
        let a = provider.embed("consistent text").unwrap();
        let b = provider.embed("consistent text").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn cache_promotes_on_hit_and_tracks_stats() {
        let provider = EmbeddingProvider::new(EmbeddingConfig {
            dim: 16,
            cache_size: 2,
        });
        provider.embed("a").unwrap();
        provider.embed("b").unwrap();
        let stats = provider.cache_stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits, 0);

        provider.embed("a").unwrap();
        let stats = provider.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.size, 2);
    }

    #[test]
    fn cache_evicts_least_recently_used() {
        let provider = EmbeddingProvider::new(EmbeddingConfig {
            dim: 16,
            cache_size: 2,
        });
        provider.embed("a").unwrap();
        provider.embed("b").unwrap();
        // Touch "a" so "b" becomes least-recently-used.
        provider.embed("a").unwrap();
        provider.embed("c").unwrap();

        let stats_before = provider.cache_stats();
        assert_eq!(stats_before.size, 2);

        // "b" should have been evicted; re-embedding it is a miss.
        let misses_before = provider.cache_stats().misses;
        provider.embed("b").unwrap();
        assert_eq!(provider.cache_stats().misses, misses_before + 1);
    }
}
