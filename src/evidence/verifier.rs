//! Capsule-backed evidence verifier.
//!
//! TRUST BOUNDARY: verification loads canonical artifacts from the capsule
//! only. `evidence_data` is never read.

use serde_json::Value as Json;

use crate::canonical::CanonicalValue;
use crate::hashing::{display_prefix, hash_canonical};
use crate::types::{Evidence, EvidenceKind, VerificationResult};

use super::capsule::Capsule;
use super::{EvidenceVerificationError, SCAN_METHOD};

const EVIDENCE_DATA_FIELD: &str = "evidence_data";

/// Verifies evidence records against a borrowed capsule snapshot.
///
/// Read-only with respect to the capsule; independent records may be
/// verified in parallel against the same snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ProofVerifier<'a> {
    capsule: &'a Capsule,
}

impl<'a> ProofVerifier<'a> {
    /// Create a verifier over a capsule.
    pub fn new(capsule: &'a Capsule) -> Self {
        Self { capsule }
    }

    /// Verify one evidence record.
    ///
    /// Always returns a result; failures are reported through
    /// `valid == false` and `failure_reason`.
    pub fn verify_evidence(&self, evidence: &Evidence) -> VerificationResult {
        let outcome = match evidence.evidence_kind {
            EvidenceKind::Scan => self.verify_scan(evidence),
            EvidenceKind::Manifest => self.verify_manifest(evidence),
            EvidenceKind::Log => self.verify_log(evidence),
            EvidenceKind::StaticProof => self.verify_static_proof(evidence),
        };

        let result = outcome.unwrap_or_else(|e| {
            VerificationResult::failed(e.to_string(), &evidence.evidence_hash)
        });
        log_outcome(evidence, &result);
        result
    }

    /// Verify a batch of records, preserving order.
    pub fn verify_all(&self, evidence: &[Evidence]) -> Vec<VerificationResult> {
        evidence.iter().map(|e| self.verify_evidence(e)).collect()
    }

    /// Verify an evidence record received as raw JSON.
    ///
    /// Unknown kinds and malformed records become invalid results. The
    /// `evidence_data` copy is dropped before parsing, so its content cannot
    /// affect the outcome.
    pub fn verify_untrusted(&self, raw: &Json) -> VerificationResult {
        let expected = raw
            .get("evidence_hash")
            .and_then(Json::as_str)
            .unwrap_or_default();

        let mut record = raw.clone();
        if let Some(fields) = record.as_object_mut() {
            fields.remove(EVIDENCE_DATA_FIELD);
        }

        match serde_json::from_value::<Evidence>(record) {
            Ok(evidence) => self.verify_evidence(&evidence),
            Err(e) => {
                let err = match raw.get("evidence_kind") {
                    Some(kind)
                        if serde_json::from_value::<EvidenceKind>(kind.clone()).is_err() =>
                    {
                        EvidenceVerificationError::UnknownKind(kind.to_string())
                    }
                    _ => EvidenceVerificationError::Malformed(e.to_string()),
                };
                tracing::warn!(error = %err, "untrusted evidence rejected");
                VerificationResult::failed(err.to_string(), expected)
            }
        }
    }

    fn verify_scan(&self, evidence: &Evidence) -> Result<VerificationResult, EvidenceVerificationError> {
        if evidence.generation_method != SCAN_METHOD {
            return Err(EvidenceVerificationError::UnknownScanMethod(
                evidence.generation_method.clone(),
            ));
        }
        let canonical = self.load_canonical(evidence)?;
        Ok(recompute(canonical, EvidenceKind::Scan, evidence))
    }

    fn verify_manifest(&self, evidence: &Evidence) -> Result<VerificationResult, EvidenceVerificationError> {
        let canonical = self.load_canonical(evidence)?;
        Ok(recompute(canonical, EvidenceKind::Manifest, evidence))
    }

    fn verify_log(&self, evidence: &Evidence) -> Result<VerificationResult, EvidenceVerificationError> {
        let canonical = self.load_canonical(evidence)?;
        Ok(recompute(canonical, EvidenceKind::Log, evidence))
    }

    fn verify_static_proof(&self, evidence: &Evidence) -> Result<VerificationResult, EvidenceVerificationError> {
        let canonical = self.load_canonical(evidence)?;
        Ok(recompute(canonical, EvidenceKind::StaticProof, evidence))
    }

    fn load_canonical(&self, evidence: &Evidence) -> Result<&'a CanonicalValue, EvidenceVerificationError> {
        self.capsule
            .get(&evidence.evidence_ref)
            .ok_or_else(|| EvidenceVerificationError::ReferenceNotFound(evidence.evidence_ref.clone()))
    }
}

fn recompute(canonical: &CanonicalValue, kind: EvidenceKind, evidence: &Evidence) -> VerificationResult {
    let recomputed = hash_canonical(canonical, Some(kind.domain_tag()));
    VerificationResult::compared(recomputed, &evidence.evidence_hash)
}

fn log_outcome(evidence: &Evidence, result: &VerificationResult) {
    if result.valid {
        tracing::debug!(
            evidence_ref = %evidence.evidence_ref,
            kind = %evidence.evidence_kind,
            "evidence verified"
        );
    } else {
        tracing::warn!(
            evidence_ref = %evidence.evidence_ref,
            kind = %evidence.evidence_kind,
            expected = display_prefix(&result.expected_hash),
            reason = result.failure_reason.as_deref().unwrap_or_default(),
            "evidence verification failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EvidenceScope;
    use serde_json::json;

    fn artifact() -> CanonicalValue {
        CanonicalValue::from_json(json!({"manifest": ["pkg_a", "pkg_b"], "version": 3})).unwrap()
    }

    fn setup(kind: EvidenceKind, method: &str) -> (Capsule, Evidence) {
        let mut capsule = Capsule::new();
        capsule.insert("artifact_1", artifact()).unwrap();
        let evidence = Evidence::for_artifact(kind, "artifact_1", &artifact(), EvidenceScope::Asset, method)
            .with_data_copy(artifact());
        (capsule, evidence)
    }

    #[test]
    fn test_valid_evidence() {
        for kind in [EvidenceKind::Manifest, EvidenceKind::Log, EvidenceKind::StaticProof] {
            let (capsule, evidence) = setup(kind, "any");
            let result = ProofVerifier::new(&capsule).verify_evidence(&evidence);
            assert!(result.valid, "{kind} should verify");
            assert_eq!(result.recomputed_hash.as_deref(), Some(evidence.evidence_hash.as_str()));
        }
    }

    #[test]
    fn test_data_copy_is_ignored() {
        let (capsule, mut evidence) = setup(EvidenceKind::Log, "log_export");
        evidence.evidence_data = Some(CanonicalValue::from_json(json!({"forged": true})).unwrap());
        assert!(ProofVerifier::new(&capsule).verify_evidence(&evidence).valid);
    }

    #[test]
    fn test_capsule_tamper_detected() {
        let (_, evidence) = setup(EvidenceKind::Manifest, "m");
        let mut tampered = Capsule::new();
        tampered
            .insert("artifact_1", CanonicalValue::from_json(json!({"manifest": [], "version": 3})).unwrap())
            .unwrap();

        let result = ProofVerifier::new(&tampered).verify_evidence(&evidence);
        assert!(!result.valid);
        assert_eq!(result.failure_reason.as_deref(), Some("Hash mismatch"));
        assert!(result.recomputed_hash.is_some());
    }

    #[test]
    fn test_missing_reference_is_soft_failure() {
        let (_, evidence) = setup(EvidenceKind::Log, "m");
        let empty = Capsule::new();
        let result = ProofVerifier::new(&empty).verify_evidence(&evidence);
        assert!(!result.valid);
        assert_eq!(
            result.failure_reason.as_deref(),
            Some("Evidence ref not found in capsule: artifact_1")
        );
        assert_eq!(result.expected_hash, evidence.evidence_hash);
    }

    #[test]
    fn test_kind_domain_matters() {
        // Evidence committed as LOG but relabelled MANIFEST must not verify.
        let (capsule, mut evidence) = setup(EvidenceKind::Log, "m");
        evidence.evidence_kind = EvidenceKind::Manifest;
        assert!(!ProofVerifier::new(&capsule).verify_evidence(&evidence).valid);
    }

    #[test]
    fn test_scan_method_checked() {
        let (capsule, evidence) = setup(EvidenceKind::Scan, SCAN_METHOD);
        assert!(ProofVerifier::new(&capsule).verify_evidence(&evidence).valid);

        let (capsule, evidence) = setup(EvidenceKind::Scan, "heuristic_scan");
        let result = ProofVerifier::new(&capsule).verify_evidence(&evidence);
        assert!(!result.valid);
        assert_eq!(result.failure_reason.as_deref(), Some("Unknown scan method: heuristic_scan"));
        assert!(result.recomputed_hash.is_none());
    }

    #[test]
    fn test_untrusted_unknown_kind() {
        let (capsule, evidence) = setup(EvidenceKind::Log, "m");
        let mut raw = serde_json::to_value(&evidence).unwrap();
        raw["evidence_kind"] = json!("ORACLE");

        let result = ProofVerifier::new(&capsule).verify_untrusted(&raw);
        assert!(!result.valid);
        assert_eq!(result.failure_reason.as_deref(), Some("Unknown evidence kind: \"ORACLE\""));
        assert_eq!(result.expected_hash, evidence.evidence_hash);
    }

    #[test]
    fn test_untrusted_ignores_data_copy() {
        let (capsule, evidence) = setup(EvidenceKind::Manifest, "manifest_export");
        let verifier = ProofVerifier::new(&capsule);

        for forged in [
            json!({"n": 9223372036854775808u64}),
            json!({"manifest": ["pkg_evil"], "version": 4}),
            json!("not even a mapping"),
            json!([1.5, null, {"deep": [true]}]),
        ] {
            let mut raw = serde_json::to_value(&evidence).unwrap();
            raw["evidence_data"] = forged.clone();
            let result = verifier.verify_untrusted(&raw);
            assert!(result.valid, "data copy {forged} changed the verdict");
            assert_eq!(result.recomputed_hash.as_deref(), Some(evidence.evidence_hash.as_str()));
        }

        // The capsule still decides.
        let mut tampered = Capsule::new();
        tampered
            .insert("artifact_1", CanonicalValue::from_json(json!({"manifest": []})).unwrap())
            .unwrap();
        let mut raw = serde_json::to_value(&evidence).unwrap();
        raw["evidence_data"] = serde_json::to_value(artifact()).unwrap();
        assert!(!ProofVerifier::new(&tampered).verify_untrusted(&raw).valid);
    }

    #[test]
    fn test_untrusted_malformed_and_valid() {
        let (capsule, evidence) = setup(EvidenceKind::Log, "m");
        let raw = serde_json::to_value(&evidence).unwrap();
        assert!(ProofVerifier::new(&capsule).verify_untrusted(&raw).valid);

        let result = ProofVerifier::new(&capsule).verify_untrusted(&json!({"evidence_kind": "LOG"}));
        assert!(!result.valid);
        assert!(result.failure_reason.unwrap().starts_with("Malformed evidence"));
        assert_eq!(result.expected_hash, "");
    }
}
