//! Deterministic hashing with domain separation.
//!
//! Canonical bytes are a minimal JSON encoding of a [`CanonicalValue`]:
//! no whitespace, keys sorted, every non-ASCII character escaped as `\uXXXX`.
//! The digest is SHA-256 over those bytes, rendered as lowercase hex.
//!
//! Supplying a domain tag wraps the value as
//! `{"__data__": value, "__type__": tag}` before encoding, so the same payload
//! used in two semantic roles never produces the same digest.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::{Map, Serializer, Value as Json};
use sha2::{Digest, Sha256};

use crate::canonical::{canonicalize, CanonicalValue, CanonicalizationError, Value};

/// Number of hex characters of a hash used in derived identifiers.
pub const HASH_REFERENCE_LENGTH: usize = 16;

/// Number of hex characters shown in human-facing displays.
pub const HASH_DISPLAY_LENGTH: usize = 8;

/// Domain tags used across the kernel.
pub mod domain {
    /// Governance event body.
    pub const GOVERNANCE_EVENT: &str = "GovernanceEvent";
    /// Governance event payload.
    pub const EVENT_PAYLOAD: &str = "EventPayload";
    /// Governance specification.
    pub const GOVERNANCE_SPEC: &str = "GovernanceSpec";
    /// Derived admissibility view.
    pub const ADMISSIBILITY_REPORT: &str = "AdmissibilityReport";
    /// Normalized authority claim.
    pub const AUTHORITY_CLAIM: &str = "AuthorityClaim";
    /// Negative-authority proof body.
    pub const NEGATIVE_AUTHORITY_PROOF: &str = "NegativeAuthorityProof";
    /// Symbolic causal DAG.
    pub const CAUSAL_DAG: &str = "CausalDAG";
    /// Exported proof bundle.
    pub const PROOF_BUNDLE: &str = "MinimalProofBundle";
    /// Scan evidence artifact.
    pub const SCAN_EVIDENCE: &str = "MLScanEvidence";
    /// Manifest evidence artifact.
    pub const MANIFEST_EVIDENCE: &str = "ManifestEvidence";
    /// Log evidence artifact.
    pub const LOG_EVIDENCE: &str = "LogEvidence";
    /// Static proof evidence artifact.
    pub const STATIC_PROOF_EVIDENCE: &str = "StaticProofEvidence";
}

/// Encode a canonical value as canonical bytes.
pub fn canonical_value_bytes(value: &CanonicalValue) -> Vec<u8> {
    to_ascii_json(value.as_json())
}

/// Canonicalize a value and encode it as canonical bytes.
pub fn canonical_bytes(value: &Value) -> Result<Vec<u8>, CanonicalizationError> {
    Ok(canonical_value_bytes(&canonicalize(value)?))
}

/// Hash a value, optionally under a domain tag.
pub fn deterministic_hash(
    value: &Value,
    domain: Option<&str>,
) -> Result<String, CanonicalizationError> {
    Ok(hash_canonical(&canonicalize(value)?, domain))
}

/// Hash a value under a domain tag.
pub fn domain_hash(value: &Value, domain: &str) -> Result<String, CanonicalizationError> {
    deterministic_hash(value, Some(domain))
}

/// Hash an already canonical value, optionally under a domain tag.
///
/// Infallible: the domain wrapper of a canonical value is itself canonical.
pub fn hash_canonical(value: &CanonicalValue, domain: Option<&str>) -> String {
    let bytes = match domain {
        Some(tag) => {
            let mut wrapper = Map::new();
            wrapper.insert("__data__".to_string(), value.as_json().clone());
            wrapper.insert("__type__".to_string(), Json::String(tag.to_string()));
            to_ascii_json(&Json::Object(wrapper))
        }
        None => to_ascii_json(value.as_json()),
    };
    sha256_hex(&bytes)
}

/// Hash any serde-serializable record under a domain tag.
pub fn hash_serializable<T: Serialize + ?Sized>(
    value: &T,
    domain: &str,
) -> Result<String, CanonicalizationError> {
    domain_hash(&Value::from_serialize(value)?, domain)
}

/// The identifier prefix of a hash.
pub fn reference_prefix(hash: &str) -> &str {
    hash.get(..HASH_REFERENCE_LENGTH).unwrap_or(hash)
}

/// The display prefix of a hash.
pub fn display_prefix(hash: &str) -> &str {
    hash.get(..HASH_DISPLAY_LENGTH).unwrap_or(hash)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Compact JSON output that escapes every non-ASCII character as `\uXXXX`
/// (UTF-16 code units, surrogate pairs above the BMP).
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W: ?Sized + Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            if c.is_ascii() {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[start..i])?;
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + c.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }
}

/// Serialize a JSON tree with [`AsciiFormatter`].
///
/// Objects come out key-sorted because `serde_json::Map` is a `BTreeMap`
/// without the `preserve_order` feature.
fn to_ascii_json(value: &Json) -> Vec<u8> {
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, AsciiFormatter);
    // A JSON tree written into a Vec has no failure path.
    value
        .serialize(&mut serializer)
        .expect("Canonical serialization failed");
    out
}
