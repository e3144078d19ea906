//! Canonicalization of structured values for deterministic hashing.
//!
//! Every value that participates in a hash is first normalized into a
//! [`CanonicalValue`]: a JSON tree with a single, deterministic shape.
//!
//! ## Determinism Guarantees
//!
//! - Floats are rounded to [`CANON_FLOAT_DIGITS`] decimal digits
//! - Mapping keys are sorted ascending (insertion order is irrelevant)
//! - Sequences keep their order, sets are re-sorted after canonicalization
//! - Tagged scalars collapse to their underlying scalar
//! - Bytes become lowercase hex, date-times become ISO-8601 strings
//!
//! ## Closed World
//!
//! [`Value`] is a closed set of variant kinds. Canonicalization walks them in a
//! fixed order and fails with [`CanonicalizationError`] on any shape it has no
//! rule for. Nothing is ever stringified implicitly.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value as Json};

/// Number of decimal digits kept when canonicalizing floats.
pub const CANON_FLOAT_DIGITS: usize = 6;

/// Error raised when a value cannot be canonicalized.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CanonicalizationError {
    /// NaN or infinity has no canonical form.
    #[error("Cannot canonicalize non-finite float: {0}")]
    NonFiniteFloat(f64),
    /// The same key appeared twice in one mapping.
    #[error("Duplicate mapping key: {0}")]
    DuplicateKey(String),
    /// Set elements do not share a comparable kind.
    #[error("Set elements are not mutually orderable")]
    UnorderableSet,
    /// A tagged value wrapped something other than a scalar.
    #[error("Tagged value must wrap a scalar")]
    TaggedNotScalar,
    /// A record's canonical view was not a mapping.
    #[error("Record canonical view must be a mapping, got {0}")]
    RecordNotMapping(&'static str),
    /// A serde value could not be lifted into the closed world.
    #[error("Cannot canonicalize value: {0} (explicit canonical view required)")]
    Unsupported(String),
}

/// Capability implemented by records that expose a canonical mapping view.
///
/// The returned value must be a [`Value::Map`]; anything else fails closed.
pub trait ToCanonical {
    /// Produce the canonical mapping view of this record.
    fn to_canonical(&self) -> Result<Value, CanonicalizationError>;
}

/// Shared handle to a record with a canonical view.
#[derive(Clone)]
pub struct RecordRef(Arc<dyn ToCanonical + Send + Sync>);

impl RecordRef {
    /// Wrap a record.
    pub fn new<R: ToCanonical + Send + Sync + 'static>(record: R) -> Self {
        Self(Arc::new(record))
    }
}

impl fmt::Debug for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecordRef(..)")
    }
}

/// A structured value accepted by the canonicalizer.
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer; values above `i64::MAX` only fit here.
    UInt(u64),
    /// Floating-point number (rounded during canonicalization).
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Raw bytes (hex-encoded during canonicalization).
    Bytes(Vec<u8>),
    /// Calendar instant (ISO-8601 during canonicalization).
    DateTime(DateTime<Utc>),
    /// Ordered mapping; keys are re-sorted during canonicalization.
    Map(Vec<(String, Value)>),
    /// Ordered sequence.
    List(Vec<Value>),
    /// Unordered collection; re-sorted during canonicalization.
    Set(Vec<Value>),
    /// Enumerated scalar; reduced to the wrapped scalar.
    Tagged(Box<Value>),
    /// Record reduced through its [`ToCanonical`] view.
    Record(RecordRef),
}

impl Value {
    /// Build a mapping from key/value pairs.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// An empty mapping.
    pub fn empty_map() -> Self {
        Self::Map(Vec::new())
    }

    /// Build a sequence.
    pub fn list<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Wrap an enumerated scalar.
    pub fn tagged(scalar: impl Into<Value>) -> Self {
        Self::Tagged(Box::new(scalar.into()))
    }

    /// Wrap a record exposing a canonical view.
    pub fn record<R: ToCanonical + Send + Sync + 'static>(record: R) -> Self {
        Self::Record(RecordRef::new(record))
    }

    /// Lift any serde-serializable value into the closed world.
    ///
    /// Serde maps with non-string keys are rejected. Note that `serde_json`
    /// serializes non-finite floats as `null`; pass such values as
    /// [`Value::Float`] to have them rejected instead.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, CanonicalizationError> {
        let json = serde_json::to_value(value)
            .map_err(|e| CanonicalizationError::Unsupported(e.to_string()))?;
        Self::try_from(json)
    }

    /// Look up a key in a mapping (last occurrence wins).
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Map(entries) => entries.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Borrow the string content, looking through tags.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Tagged(inner) => inner.as_str(),
            _ => None,
        }
    }

    fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Null
                | Self::Bool(_)
                | Self::Int(_)
                | Self::UInt(_)
                | Self::Float(_)
                | Self::Str(_)
        )
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl TryFrom<Json> for Value {
    type Error = CanonicalizationError;

    fn try_from(json: Json) -> Result<Self, Self::Error> {
        Ok(match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
                (Some(i), _, _) => Self::Int(i),
                (None, Some(u), _) => Self::UInt(u),
                (None, None, Some(f)) => Self::Float(f),
                _ => return Err(CanonicalizationError::Unsupported(n.to_string())),
            },
            Json::String(s) => Self::Str(s),
            Json::Array(items) => Self::List(
                items
                    .into_iter()
                    .map(Self::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Json::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| Ok((k, Self::try_from(v)?)))
                    .collect::<Result<_, CanonicalizationError>>()?,
            ),
        })
    }
}

/// A value in canonical form.
///
/// Only produced by [`canonicalize`] (or by deserialization, which
/// re-canonicalizes its input), so holding one is proof of canonical shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CanonicalValue(Json);

impl CanonicalValue {
    /// Borrow the underlying JSON tree.
    pub fn as_json(&self) -> &Json {
        &self.0
    }

    /// Consume into the underlying JSON tree.
    pub fn into_json(self) -> Json {
        self.0
    }

    /// Look up a top-level key when this value is a mapping.
    pub fn get(&self, key: &str) -> Option<&Json> {
        self.0.get(key)
    }

    /// Canonicalize an arbitrary JSON tree.
    pub fn from_json(json: Json) -> Result<Self, CanonicalizationError> {
        canonicalize(&Value::try_from(json)?)
    }
}

impl ToCanonical for CanonicalValue {
    fn to_canonical(&self) -> Result<Value, CanonicalizationError> {
        Value::try_from(self.0.clone())
    }
}

impl ToCanonical for Value {
    fn to_canonical(&self) -> Result<Value, CanonicalizationError> {
        Ok(self.clone())
    }
}

impl<'de> Deserialize<'de> for CanonicalValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        Self::from_json(json).map_err(serde::de::Error::custom)
    }
}

/// Canonicalize a value.
///
/// Rules are applied in a fixed order over the closed set of [`Value`]
/// kinds; unsupported shapes return an error instead of being coerced.
pub fn canonicalize(value: &Value) -> Result<CanonicalValue, CanonicalizationError> {
    canonical_json(value).map(CanonicalValue)
}

fn canonical_json(value: &Value) -> Result<Json, CanonicalizationError> {
    match value {
        Value::Float(f) => round_float(*f),
        Value::Map(entries) => {
            let mut sorted: Vec<&(String, Value)> = entries.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));

            let mut map = Map::new();
            for pair in sorted.windows(2) {
                if pair[0].0 == pair[1].0 {
                    return Err(CanonicalizationError::DuplicateKey(pair[0].0.clone()));
                }
            }
            for (key, v) in sorted {
                map.insert(key.clone(), canonical_json(v)?);
            }
            Ok(Json::Object(map))
        }
        Value::List(items) => items
            .iter()
            .map(canonical_json)
            .collect::<Result<Vec<_>, _>>()
            .map(Json::Array),
        Value::Set(items) => {
            let mut canon = items
                .iter()
                .map(canonical_json)
                .collect::<Result<Vec<_>, _>>()?;

            // A comparison sort compares every adjacent output pair, so an
            // unorderable pair cannot slip through unnoticed.
            let mut unorderable = false;
            canon.sort_by(|a, b| {
                canonical_order(a, b).unwrap_or_else(|| {
                    unorderable = true;
                    Ordering::Equal
                })
            });
            if unorderable {
                return Err(CanonicalizationError::UnorderableSet);
            }
            Ok(Json::Array(canon))
        }
        Value::Tagged(inner) => {
            if !inner.is_scalar() {
                return Err(CanonicalizationError::TaggedNotScalar);
            }
            canonical_json(inner)
        }
        Value::Record(record) => {
            let view = record.0.to_canonical()?;
            match view {
                Value::Map(_) => canonical_json(&view),
                other => Err(CanonicalizationError::RecordNotMapping(kind_name(&other))),
            }
        }
        Value::Bytes(bytes) => Ok(Json::String(hex::encode(bytes))),
        Value::DateTime(dt) => Ok(Json::String(dt.to_rfc3339())),
        Value::Null => Ok(Json::Null),
        Value::Bool(b) => Ok(Json::Bool(*b)),
        Value::Int(i) => Ok(Json::Number(Number::from(*i))),
        Value::UInt(u) => Ok(Json::Number(Number::from(*u))),
        Value::Str(s) => Ok(Json::String(s.clone())),
    }
}

fn round_float(f: f64) -> Result<Json, CanonicalizationError> {
    if !f.is_finite() {
        return Err(CanonicalizationError::NonFiniteFloat(f));
    }
    // Decimal formatting rounds the exact binary value, so the result does
    // not depend on platform float arithmetic.
    let rounded: f64 = format!("{:.*}", CANON_FLOAT_DIGITS, f)
        .parse()
        .map_err(|_| CanonicalizationError::NonFiniteFloat(f))?;
    Number::from_f64(rounded)
        .map(Json::Number)
        .ok_or(CanonicalizationError::NonFiniteFloat(f))
}

/// Ordering between canonical values of the same kind; `None` across kinds.
fn canonical_order(a: &Json, b: &Json) -> Option<Ordering> {
    match (a, b) {
        (Json::Null, Json::Null) => Some(Ordering::Equal),
        (Json::Bool(x), Json::Bool(y)) => Some(x.cmp(y)),
        (Json::Number(x), Json::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                Some(x.cmp(&y))
            } else if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                Some(x.cmp(&y))
            } else {
                x.as_f64()?.partial_cmp(&y.as_f64()?)
            }
        }
        (Json::String(x), Json::String(y)) => Some(x.cmp(y)),
        (Json::Array(x), Json::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                match canonical_order(l, r)? {
                    Ordering::Equal => continue,
                    ord => return Some(ord),
                }
            }
            Some(x.len().cmp(&y.len()))
        }
        _ => None,
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Int(_) => "int",
        Value::UInt(_) => "uint",
        Value::Float(_) => "float",
        Value::Str(_) => "string",
        Value::Bytes(_) => "bytes",
        Value::DateTime(_) => "datetime",
        Value::Map(_) => "map",
        Value::List(_) => "list",
        Value::Set(_) => "set",
        Value::Tagged(_) => "tagged",
        Value::Record(_) => "record",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    struct Sample {
        name: &'static str,
        weight: f64,
    }

    impl ToCanonical for Sample {
        fn to_canonical(&self) -> Result<Value, CanonicalizationError> {
            Ok(Value::map([
                ("name", Value::from(self.name)),
                ("weight", Value::from(self.weight)),
            ]))
        }
    }

    struct NotAMap;

    impl ToCanonical for NotAMap {
        fn to_canonical(&self) -> Result<Value, CanonicalizationError> {
            Ok(Value::list([Value::from(1)]))
        }
    }

    #[test]
    fn test_map_keys_sorted() {
        let v = Value::map([("b", Value::from(1)), ("a", Value::from(2))]);
        let canon = canonicalize(&v).unwrap();
        let keys: Vec<&String> = canon.as_json().as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_float_rounding() {
        let canon = canonicalize(&Value::from(0.1 + 0.2)).unwrap();
        assert_eq!(canon.as_json(), &json!(0.3));

        let canon = canonicalize(&Value::from(1.23456789)).unwrap();
        assert_eq!(canon.as_json(), &json!(1.234568));
    }

    #[test]
    fn test_non_finite_float_rejected() {
        assert_eq!(
            canonicalize(&Value::from(f64::NAN)).unwrap_err().to_string(),
            "Cannot canonicalize non-finite float: NaN"
        );
        assert!(canonicalize(&Value::from(f64::INFINITY)).is_err());
    }

    #[test]
    fn test_set_sorted() {
        let v = Value::Set(vec![Value::from("c"), Value::from("a"), Value::from("b")]);
        assert_eq!(canonicalize(&v).unwrap().as_json(), &json!(["a", "b", "c"]));

        let v = Value::Set(vec![Value::from(3), Value::from(1.5), Value::from(2)]);
        assert_eq!(canonicalize(&v).unwrap().as_json(), &json!([1.5, 2, 3]));
    }

    #[test]
    fn test_mixed_set_fails_closed() {
        let v = Value::Set(vec![Value::from(1), Value::from("a")]);
        assert_eq!(canonicalize(&v), Err(CanonicalizationError::UnorderableSet));

        let v = Value::Set(vec![Value::empty_map(), Value::empty_map()]);
        assert_eq!(canonicalize(&v), Err(CanonicalizationError::UnorderableSet));
    }

    #[test]
    fn test_list_order_preserved() {
        let v = Value::list([Value::from(3), Value::from(1), Value::from(2)]);
        assert_eq!(canonicalize(&v).unwrap().as_json(), &json!([3, 1, 2]));
    }

    #[test]
    fn test_bytes_and_datetime() {
        let v = Value::from(vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(canonicalize(&v).unwrap().as_json(), &json!("deadbeef"));

        let dt = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            canonicalize(&Value::from(dt)).unwrap().as_json(),
            &json!("2024-01-02T03:04:05+00:00")
        );
    }

    #[test]
    fn test_tagged_and_records() {
        let v = Value::tagged("ASSESSED");
        assert_eq!(canonicalize(&v).unwrap().as_json(), &json!("ASSESSED"));

        let bad = Value::Tagged(Box::new(Value::empty_map()));
        assert_eq!(canonicalize(&bad), Err(CanonicalizationError::TaggedNotScalar));

        let rec = Value::record(Sample { name: "sensor", weight: 2.0000004 });
        assert_eq!(
            canonicalize(&rec).unwrap().as_json(),
            &json!({"name": "sensor", "weight": 2.0})
        );

        assert_eq!(
            canonicalize(&Value::record(NotAMap)),
            Err(CanonicalizationError::RecordNotMapping("list"))
        );
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let v = Value::map([("k", Value::from(1)), ("k", Value::from(2))]);
        assert_eq!(
            canonicalize(&v),
            Err(CanonicalizationError::DuplicateKey("k".to_string()))
        );
    }

    #[test]
    fn test_idempotence() {
        let v = Value::map([
            ("z", Value::Set(vec![Value::from(2), Value::from(1)])),
            ("a", Value::from(vec![1u8, 2])),
            ("m", Value::from(0.1234567)),
        ]);
        let once = canonicalize(&v).unwrap();
        let twice = CanonicalValue::from_json(once.clone().into_json()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unsigned_range_canonicalizes() {
        let above_signed = 1u64 << 63;
        let canon = canonicalize(&Value::from(above_signed)).unwrap();
        assert_eq!(canon.as_json(), &json!(above_signed));

        let lifted = Value::from_serialize(&json!({ "tick": u64::MAX })).unwrap();
        assert_eq!(
            canonicalize(&lifted).unwrap().as_json(),
            &json!({ "tick": u64::MAX })
        );

        let v = Value::Set(vec![Value::from(u64::MAX), Value::from(-1), Value::from(above_signed)]);
        assert_eq!(
            canonicalize(&v).unwrap().as_json(),
            &json!([-1, above_signed, u64::MAX])
        );
    }

    #[test]
    fn test_deserialize_recanonicalizes() {
        let canon: CanonicalValue = serde_json::from_str(r#"{"x": 0.1234567}"#).unwrap();
        assert_eq!(canon.as_json(), &json!({"x": 0.123457}));
    }
}
