//! Standalone verifier for audit capsules.
//!
//! An audit capsule is received as untrusted JSON. Every check re-derives
//! hashes from the capsule's own content or fails. A check that cannot be
//! completed reports [`CapsuleCheckFailure::Incomplete`]; incomplete is
//! never coerced into success.
//!
//! Checks run in a fixed order and the first failure stops verification:
//!
//! | # | Check | Outcome today |
//! |---|-------|---------------|
//! | 1 | Governance spec hash | re-derived |
//! | 2 | Negative-authority proof | re-derived against bundled evidence |
//! | 3 | Authority claim ids | always incomplete |
//! | 4 | Event chain | always incomplete |

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::canonical::CanonicalValue;
use crate::evidence::{Capsule, ProofVerifier};
use crate::hashing::{domain, hash_canonical};
use crate::types::{GovernanceEvent, NegativeAuthorityProof, ProofBundle};

/// Governance section of an audit capsule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceSection {
    /// Governance specification.
    pub spec: CanonicalValue,
    /// Its hash under `GovernanceSpec`.
    pub spec_hash: String,
}

/// Negative-authority section of an audit capsule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegativeAuthoritySection {
    /// The proof.
    pub proof: NegativeAuthorityProof,
    /// Capsule backing the proof's evidence.
    pub evidence: Capsule,
}

/// Self-contained audit artifact handed to independent verifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditCapsule {
    /// Governance specification and hash.
    pub governance: GovernanceSection,
    /// Normalized authority claims.
    pub authority_claims: Vec<CanonicalValue>,
    /// Claim identifiers.
    pub authority_claim_ids: Vec<String>,
    /// Negative-authority proof with its evidence capsule.
    pub negative_authority: NegativeAuthoritySection,
    /// Exported event chain slice.
    pub events: Vec<GovernanceEvent>,
}

impl AuditCapsule {
    /// Assemble from a bundle and the evidence capsule of its negative-authority proof.
    pub fn from_bundle(bundle: &ProofBundle, evidence: Capsule) -> Self {
        Self {
            governance: GovernanceSection {
                spec: bundle.governance_spec.clone(),
                spec_hash: bundle.governance_spec_hash.clone(),
            },
            authority_claims: bundle.authority_claims.clone(),
            authority_claim_ids: bundle.authority_claim_ids.clone(),
            negative_authority: NegativeAuthoritySection {
                proof: bundle.negative_authority_proof.clone(),
                evidence,
            },
            events: bundle.event_chain_slice.clone(),
        }
    }
}

/// One step of capsule verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapsuleCheck {
    /// Governance spec hash re-derivation.
    GovernanceSpec,
    /// Negative-authority proof and evidence re-derivation.
    NegativeAuthority,
    /// Authority claim id verification.
    AuthorityClaimIds,
    /// Event chain replay.
    EventChain,
}

impl CapsuleCheck {
    /// All checks in execution order.
    pub const ORDER: [CapsuleCheck; 4] = [
        Self::GovernanceSpec,
        Self::NegativeAuthority,
        Self::AuthorityClaimIds,
        Self::EventChain,
    ];
}

/// Why a capsule check did not pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapsuleCheckFailure {
    /// Insufficiently proven. Distinct from disproven, still a failure.
    #[error("verification_incomplete: {0}")]
    Incomplete(String),
    /// Proven false, or the capsule is malformed.
    #[error("verification_invalid: {0}")]
    Invalid(String),
}

/// Outcome of [`CapsuleVerifier::verify_capsule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapsuleReport {
    /// The first failing check, if any.
    pub failed_check: Option<CapsuleCheck>,
    /// Why it failed.
    pub failure: Option<CapsuleCheckFailure>,
    /// One line per passed check.
    pub verification_log: Vec<String>,
}

impl CapsuleReport {
    /// True only when every check completed and passed.
    pub fn is_valid(&self) -> bool {
        self.failure.is_none()
    }

    /// True when the failure is an incomplete signal.
    pub fn is_incomplete(&self) -> bool {
        matches!(self.failure, Some(CapsuleCheckFailure::Incomplete(_)))
    }

    /// `"VALID"` or `"INVALID: <reason>"`.
    pub fn summary(&self) -> String {
        match &self.failure {
            None => "VALID".to_string(),
            Some(failure) => format!("INVALID: {}", failure),
        }
    }
}

/// Verifies an audit capsule received as JSON.
#[derive(Debug, Clone)]
pub struct CapsuleVerifier {
    capsule: Json,
}

impl CapsuleVerifier {
    /// Verifier over untrusted JSON.
    pub fn new(capsule: Json) -> Self {
        Self { capsule }
    }

    /// Verifier over a typed capsule.
    pub fn from_capsule(capsule: &AuditCapsule) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::to_value(capsule)?))
    }

    /// Run every check in order, stopping at the first failure.
    pub fn verify_capsule(&self) -> CapsuleReport {
        let mut verification_log = Vec::new();

        for check in CapsuleCheck::ORDER {
            let outcome = match check {
                CapsuleCheck::GovernanceSpec => self.verify_governance_spec(),
                CapsuleCheck::NegativeAuthority => self.verify_negative_authority_proof(),
                CapsuleCheck::AuthorityClaimIds => self.verify_authority_claim_ids(),
                CapsuleCheck::EventChain => self.verify_event_chain(),
            };

            match outcome {
                Ok(line) => verification_log.push(line),
                Err(failure) => {
                    tracing::warn!(check = ?check, failure = %failure, "capsule verification failed");
                    return CapsuleReport {
                        failed_check: Some(check),
                        failure: Some(failure),
                        verification_log,
                    };
                }
            }
        }

        tracing::debug!(checks = verification_log.len(), "capsule verified");
        CapsuleReport {
            failed_check: None,
            failure: None,
            verification_log,
        }
    }

    fn verify_governance_spec(&self) -> Result<String, CapsuleCheckFailure> {
        let governance = self.capsule.get("governance");
        let spec = governance.and_then(|g| g.get("spec")).filter(|s| !is_empty(s));
        let expected = governance
            .and_then(|g| g.get("spec_hash"))
            .and_then(Json::as_str)
            .filter(|h| !h.is_empty());

        let (Some(spec), Some(expected)) = (spec, expected) else {
            return Err(CapsuleCheckFailure::Incomplete(
                "Missing governance spec or hash".to_string(),
            ));
        };

        let spec = CanonicalValue::from_json(spec.clone())
            .map_err(|e| CapsuleCheckFailure::Invalid(format!("Governance spec not canonicalizable: {}", e)))?;
        if hash_canonical(&spec, Some(domain::GOVERNANCE_SPEC)) != expected {
            return Err(CapsuleCheckFailure::Invalid("Governance spec hash mismatch".to_string()));
        }

        Ok("Governance spec hash verified".to_string())
    }

    fn verify_negative_authority_proof(&self) -> Result<String, CapsuleCheckFailure> {
        let section = self.capsule.get("negative_authority");
        let (Some(raw_proof), Some(raw_evidence)) = (
            section.and_then(|s| s.get("proof")),
            section.and_then(|s| s.get("evidence")),
        ) else {
            return Err(CapsuleCheckFailure::Incomplete(
                "Missing negative authority proof or evidence capsule".to_string(),
            ));
        };

        let proof: NegativeAuthorityProof = serde_json::from_value(raw_proof.clone())
            .map_err(|e| CapsuleCheckFailure::Invalid(format!("Malformed negative authority proof: {}", e)))?;
        let evidence: Capsule = serde_json::from_value(raw_evidence.clone())
            .map_err(|e| CapsuleCheckFailure::Invalid(format!("Malformed evidence capsule: {}", e)))?;

        if proof.asserted_absences.is_empty() {
            return Err(CapsuleCheckFailure::Incomplete(
                "Negative authority proof asserts no absences".to_string(),
            ));
        }

        let recomputed = proof
            .compute_hash()
            .map_err(|e| CapsuleCheckFailure::Invalid(e.to_string()))?;
        if recomputed != proof.proof_hash {
            return Err(CapsuleCheckFailure::Invalid(
                "Negative authority proof hash mismatch".to_string(),
            ));
        }

        let verifier = ProofVerifier::new(&evidence);
        for absence in &proof.asserted_absences {
            let result = verifier.verify_evidence(&absence.evidence);
            if !result.valid {
                return Err(CapsuleCheckFailure::Invalid(format!(
                    "Evidence for '{}' failed: {}",
                    absence.claim,
                    result.failure_reason.unwrap_or_default()
                )));
            }
        }

        Ok(format!(
            "Negative authority proof verified ({} absences)",
            proof.asserted_absences.len()
        ))
    }

    fn verify_authority_claim_ids(&self) -> Result<String, CapsuleCheckFailure> {
        Err(CapsuleCheckFailure::Incomplete(
            "Authority claim ID verification not implemented".to_string(),
        ))
    }

    fn verify_event_chain(&self) -> Result<String, CapsuleCheckFailure> {
        match self.capsule.get("events") {
            Some(events) if !is_empty(events) => Err(CapsuleCheckFailure::Incomplete(
                "Event chain replay verification not implemented".to_string(),
            )),
            _ => Err(CapsuleCheckFailure::Incomplete(
                "No governance events present".to_string(),
            )),
        }
    }
}

fn is_empty(value: &Json) -> bool {
    match value {
        Json::Null => true,
        Json::Object(map) => map.is_empty(),
        Json::Array(items) => items.is_empty(),
        Json::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::Value;
    use crate::clock::DeterministicClock;
    use crate::evidence::generate;
    use crate::governance::GovernanceStateMachine;
    use crate::proof::export_bundle;
    use crate::types::{GovernanceEventType, GovernanceState};
    use serde_json::json;

    fn audit_capsule() -> AuditCapsule {
        let mut machine = GovernanceStateMachine::new(DeterministicClock::new("capsule_test"));
        machine
            .transition(
                GovernanceEventType::AssessmentCompleted,
                1,
                &Value::empty_map(),
                "tester",
                GovernanceState::Assessed,
            )
            .unwrap();
        let (proof, evidence) = generate(1, &[]).unwrap();
        let spec = Value::map([("policy", "symbolic_only".into())]);
        let bundle = export_bundle(&spec, machine.events(), &[], &proof, None).unwrap();
        AuditCapsule::from_bundle(&bundle, evidence)
    }

    fn verify(raw: Json) -> CapsuleReport {
        CapsuleVerifier::new(raw).verify_capsule()
    }

    #[test]
    fn test_complete_capsule_is_still_incomplete() {
        let report = CapsuleVerifier::from_capsule(&audit_capsule()).unwrap().verify_capsule();
        assert!(!report.is_valid());
        assert!(report.is_incomplete());
        assert_eq!(report.failed_check, Some(CapsuleCheck::AuthorityClaimIds));
        assert_eq!(
            report.verification_log,
            vec![
                "Governance spec hash verified".to_string(),
                "Negative authority proof verified (2 absences)".to_string(),
            ]
        );
        assert_eq!(
            report.summary(),
            "INVALID: verification_incomplete: Authority claim ID verification not implemented"
        );
    }

    #[test]
    fn test_missing_spec_is_incomplete() {
        let report = verify(json!({}));
        assert_eq!(report.failed_check, Some(CapsuleCheck::GovernanceSpec));
        assert!(report.is_incomplete());
        assert!(report.verification_log.is_empty());
    }

    #[test]
    fn test_spec_mismatch_is_invalid() {
        let mut raw = serde_json::to_value(audit_capsule()).unwrap();
        raw["governance"]["spec"]["policy"] = json!("numeric_allowed");
        let report = verify(raw);
        assert_eq!(report.failed_check, Some(CapsuleCheck::GovernanceSpec));
        assert_eq!(
            report.failure,
            Some(CapsuleCheckFailure::Invalid("Governance spec hash mismatch".to_string()))
        );
    }

    #[test]
    fn test_tampered_evidence_capsule_is_invalid() {
        let mut raw = serde_json::to_value(audit_capsule()).unwrap();
        raw["negative_authority"]["evidence"]["refusal_decision_ast"]["verified"] = json!(false);
        let report = verify(raw);
        assert_eq!(report.failed_check, Some(CapsuleCheck::NegativeAuthority));
        assert!(matches!(report.failure, Some(CapsuleCheckFailure::Invalid(_))));
        assert_eq!(report.verification_log.len(), 1);
    }

    #[test]
    fn test_tampered_proof_hash_is_invalid() {
        let mut raw = serde_json::to_value(audit_capsule()).unwrap();
        raw["negative_authority"]["proof"]["proof_hash"] = json!("0".repeat(64));
        let report = verify(raw);
        assert_eq!(
            report.failure,
            Some(CapsuleCheckFailure::Invalid("Negative authority proof hash mismatch".to_string()))
        );
    }

    #[test]
    fn test_missing_negative_authority_is_incomplete() {
        let mut raw = serde_json::to_value(audit_capsule()).unwrap();
        raw.as_object_mut().unwrap().remove("negative_authority");
        let report = verify(raw);
        assert_eq!(report.failed_check, Some(CapsuleCheck::NegativeAuthority));
        assert!(report.is_incomplete());
    }

    #[test]
    fn test_event_chain_check_never_passes() {
        let verifier = CapsuleVerifier::new(json!({"events": []}));
        assert_eq!(
            verifier.verify_event_chain(),
            Err(CapsuleCheckFailure::Incomplete("No governance events present".to_string()))
        );
        let verifier = CapsuleVerifier::from_capsule(&audit_capsule()).unwrap();
        assert!(matches!(
            verifier.verify_event_chain(),
            Err(CapsuleCheckFailure::Incomplete(_))
        ));
    }
}
