//! Cached evidence verification over an immutable capsule snapshot.
//!
//! ## Purpose
//!
//! Audit tools re-verify the same evidence many times (once per bundle,
//! once per replay, once per dashboard refresh). Hash re-derivation is cheap
//! but not free for large artifacts, so results are memoized per snapshot.
//!
//! ## Cache Key Design
//!
//! The key covers every field that affects the outcome:
//! - `evidence_kind` (selects the hashing domain)
//! - `evidence_ref`
//! - `evidence_hash`
//! - `generation_method` (scan evidence checks it)
//!
//! `evidence_data` is deliberately absent: it never affects verification.
//! The capsule is held behind an `Arc` and never mutated, so a cached result
//! stays valid for the verifier's lifetime.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::RwLock;

use crate::types::{Evidence, EvidenceKind, VerificationResult};

use super::capsule::Capsule;
use super::verifier::ProofVerifier;

/// Configuration for the verification cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_entries: usize,
    /// Whether to enable the cache.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    kind: EvidenceKind,
    reference: String,
    expected_hash: String,
    generation_method: String,
}

impl CacheKey {
    fn for_evidence(evidence: &Evidence) -> Self {
        Self {
            kind: evidence.evidence_kind,
            reference: evidence.evidence_ref.clone(),
            expected_hash: evidence.evidence_hash.clone(),
            generation_method: evidence.generation_method.clone(),
        }
    }
}

/// Result of a cached verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedVerification {
    /// The verification result.
    pub result: VerificationResult,
    /// Whether this result came from cache.
    pub cache_hit: bool,
}

/// Cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently cached.
    pub entries: usize,
    /// Maximum entries.
    pub capacity: usize,
}

/// Evidence verifier with an optional LRU cache.
///
/// Thread-safe: the capsule snapshot is immutable and the cache is behind a lock.
pub struct CachedProofVerifier {
    capsule: Arc<Capsule>,
    cache: Option<RwLock<LruCache<CacheKey, VerificationResult>>>,
}

impl CachedProofVerifier {
    /// Create a verifier with the default cache configuration.
    pub fn new(capsule: Arc<Capsule>) -> Self {
        Self::with_config(capsule, CacheConfig::default())
    }

    /// Create a verifier with a custom cache configuration.
    pub fn with_config(capsule: Arc<Capsule>, config: CacheConfig) -> Self {
        let cache = config.enabled.then(|| {
            let size = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
            RwLock::new(LruCache::new(size))
        });
        Self { capsule, cache }
    }

    /// The capsule snapshot this verifier reads.
    pub fn capsule(&self) -> &Arc<Capsule> {
        &self.capsule
    }

    /// Verify one evidence record, consulting the cache first.
    pub fn verify(&self, evidence: &Evidence) -> CachedVerification {
        let key = CacheKey::for_evidence(evidence);

        if let Some(cache) = &self.cache {
            // Read lock only: peek does not touch recency.
            if let Some(result) = cache.read().peek(&key) {
                return CachedVerification {
                    result: result.clone(),
                    cache_hit: true,
                };
            }
        }

        let result = ProofVerifier::new(&self.capsule).verify_evidence(evidence);

        if let Some(cache) = &self.cache {
            cache.write().put(key, result.clone());
        }

        CachedVerification {
            result,
            cache_hit: false,
        }
    }

    /// Verify one evidence record, returning only the result.
    pub fn verify_evidence(&self, evidence: &Evidence) -> VerificationResult {
        self.verify(evidence).result
    }

    /// Cache occupancy, or `None` when caching is disabled.
    pub fn stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| {
            let cache = cache.read();
            CacheStats {
                entries: cache.len(),
                capacity: cache.cap().get(),
            }
        })
    }

    /// Drop all cached results.
    pub fn clear(&self) {
        if let Some(cache) = &self.cache {
            cache.write().clear();
        }
    }
}
