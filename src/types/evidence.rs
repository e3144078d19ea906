//! Evidence records, verification results and negative-authority proofs.
//!
//! ## Trust Boundary
//!
//! An [`Evidence`] record never carries authority by itself. It names a
//! canonical artifact by reference (`evidence_ref`) and commits to its hash
//! (`evidence_hash`). The artifact lives in a capsule supplied by the caller,
//! and verification re-derives the hash from that capsule content only.
//! `evidence_data` is a convenience copy for humans and tools; verifiers
//! must never read it.

use serde::{Deserialize, Serialize};

use crate::canonical::{CanonicalValue, CanonicalizationError};
use crate::hashing::{domain, hash_canonical, hash_serializable};

/// Kind of evidence artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceKind {
    /// Result of scanning for a capability or authority.
    Scan,
    /// Declared manifest.
    Manifest,
    /// Log excerpt.
    Log,
    /// Static-analysis proof.
    StaticProof,
}

impl EvidenceKind {
    /// Domain tag under which artifacts of this kind are hashed.
    pub fn domain_tag(&self) -> &'static str {
        match self {
            Self::Scan => domain::SCAN_EVIDENCE,
            Self::Manifest => domain::MANIFEST_EVIDENCE,
            Self::Log => domain::LOG_EVIDENCE,
            Self::StaticProof => domain::STATIC_PROOF_EVIDENCE,
        }
    }

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scan => "SCAN",
            Self::Manifest => "MANIFEST",
            Self::Log => "LOG",
            Self::StaticProof => "STATIC_PROOF",
        }
    }
}

impl std::fmt::Display for EvidenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scope an evidence artifact speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceScope {
    /// One tick.
    Tick,
    /// One session.
    Session,
    /// One asset.
    Asset,
    /// The whole fleet.
    Fleet,
}

/// Reference to a capsule-resident artifact plus its expected hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Kind of artifact; selects the hashing domain.
    pub evidence_kind: EvidenceKind,
    /// Capsule key of the artifact.
    pub evidence_ref: String,
    /// Expected hash of the artifact.
    pub evidence_hash: String,
    /// Scope of the claim.
    pub evidence_scope: EvidenceScope,
    /// How the artifact was produced.
    pub generation_method: String,
    /// Non-authoritative copy of the artifact. Ignored by verification.
    #[serde(default)]
    pub evidence_data: Option<CanonicalValue>,
}

impl Evidence {
    /// Commit to an artifact by hashing it under the kind's domain tag.
    pub fn for_artifact(
        kind: EvidenceKind,
        evidence_ref: impl Into<String>,
        artifact: &CanonicalValue,
        scope: EvidenceScope,
        generation_method: impl Into<String>,
    ) -> Self {
        Self {
            evidence_kind: kind,
            evidence_ref: evidence_ref.into(),
            evidence_hash: hash_canonical(artifact, Some(kind.domain_tag())),
            evidence_scope: scope,
            generation_method: generation_method.into(),
            evidence_data: None,
        }
    }

    /// Attach a convenience copy of the artifact.
    pub fn with_data_copy(mut self, data: CanonicalValue) -> Self {
        self.evidence_data = Some(data);
        self
    }
}

/// Outcome of verifying one evidence record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Whether the recomputed hash matched.
    pub valid: bool,
    /// Why verification failed, if it did.
    pub failure_reason: Option<String>,
    /// Hash re-derived from capsule content, when it could be computed.
    pub recomputed_hash: Option<String>,
    /// Hash the evidence record committed to.
    pub expected_hash: String,
}

impl VerificationResult {
    /// Compare a recomputed hash against the expected one.
    pub fn compared(recomputed: String, expected: &str) -> Self {
        let valid = recomputed == expected;
        Self {
            valid,
            failure_reason: (!valid).then(|| "Hash mismatch".to_string()),
            recomputed_hash: Some(recomputed),
            expected_hash: expected.to_string(),
        }
    }

    /// A failure where no hash could be recomputed.
    pub fn failed(reason: impl Into<String>, expected: &str) -> Self {
        Self {
            valid: false,
            failure_reason: Some(reason.into()),
            recomputed_hash: None,
            expected_hash: expected.to_string(),
        }
    }
}

/// One asserted absence: a claim paired with the evidence backing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertedAbsence {
    /// Human-readable statement of what did not exist.
    pub claim: String,
    /// Evidence backing the claim.
    pub evidence: Evidence,
}

/// Structured "absence of authority" artifact.
///
/// Not self-verifying: the capsule returned alongside it at generation time
/// must accompany it for any later verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegativeAuthorityProof {
    /// Tick the proof speaks for.
    pub tick: u64,
    /// Claims and their evidence.
    pub asserted_absences: Vec<AssertedAbsence>,
    /// Hash of `{tick, asserted_absences}`.
    pub proof_hash: String,
}

#[derive(Serialize)]
struct ProofBody<'a> {
    tick: u64,
    asserted_absences: &'a [AssertedAbsence],
}

impl NegativeAuthorityProof {
    /// Recompute the proof hash from the body.
    pub fn compute_hash(&self) -> Result<String, CanonicalizationError> {
        Self::hash_body(self.tick, &self.asserted_absences)
    }

    pub(crate) fn hash_body(
        tick: u64,
        asserted_absences: &[AssertedAbsence],
    ) -> Result<String, CanonicalizationError> {
        let body = ProofBody {
            tick,
            asserted_absences,
        };
        hash_serializable(&body, domain::NEGATIVE_AUTHORITY_PROOF)
    }

    /// Claims asserted by this proof.
    pub fn claims(&self) -> impl Iterator<Item = &str> {
        self.asserted_absences.iter().map(|a| a.claim.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn artifact() -> CanonicalValue {
        CanonicalValue::from_json(json!({"entries": ["a", "b"]})).unwrap()
    }

    #[test]
    fn test_kind_domains_are_distinct() {
        let a = artifact();
        let kinds = [
            EvidenceKind::Scan,
            EvidenceKind::Manifest,
            EvidenceKind::Log,
            EvidenceKind::StaticProof,
        ];
        let hashes: std::collections::BTreeSet<String> = kinds
            .iter()
            .map(|k| Evidence::for_artifact(*k, "r", &a, EvidenceScope::Tick, "m").evidence_hash)
            .collect();
        assert_eq!(hashes.len(), kinds.len());
    }

    #[test]
    fn test_evidence_wire_shape() {
        let e = Evidence::for_artifact(
            EvidenceKind::StaticProof,
            "ref",
            &artifact(),
            EvidenceScope::Session,
            "method",
        );
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["evidence_kind"], "STATIC_PROOF");
        assert_eq!(json["evidence_scope"], "SESSION");
        assert!(json["evidence_data"].is_null());

        let back: Evidence = serde_json::from_value(json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn test_verification_result_constructors() {
        let ok = VerificationResult::compared("h".into(), "h");
        assert!(ok.valid);
        assert!(ok.failure_reason.is_none());

        let bad = VerificationResult::compared("x".into(), "h");
        assert!(!bad.valid);
        assert_eq!(bad.failure_reason.as_deref(), Some("Hash mismatch"));
        assert_eq!(bad.recomputed_hash.as_deref(), Some("x"));

        let missing = VerificationResult::failed("gone", "h");
        assert!(!missing.valid);
        assert!(missing.recomputed_hash.is_none());
    }
}
