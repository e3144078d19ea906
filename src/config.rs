//! Kernel configuration.
//!
//! ## Environment variables
//!
//! - `KERNEL_SESSION_ID`: session id stamped into the logical clock (default: `default_session`)
//! - `KERNEL_EVENT_SLICE_SIZE`: trailing events exported per bundle (default: 5)
//! - `KERNEL_VERIFY_CACHE_ENTRIES`: capacity of the verification cache (default: 10000)
//! - `LOG_FORMAT`: `json` for structured logs, `pretty` for development (default: json)
//!
//! Hashing constants are not configurable; changing them would break replay.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::clock::DeterministicClock;
use crate::evidence::CacheConfig;
use crate::proof::{BundleExporter, DEFAULT_EVENT_SLICE_SIZE};

/// Default logical-clock session id.
pub const DEFAULT_SESSION_ID: &str = "default_session";

/// Default verification cache capacity.
pub const DEFAULT_VERIFY_CACHE_ENTRIES: usize = 10_000;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Structured JSON, one object per line.
    #[default]
    Json,
    /// Human-readable output for development.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

/// Runtime configuration of the kernel's collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Session id of the logical clock.
    pub session_id: String,
    /// Trailing events kept in a proof bundle.
    pub event_slice_size: usize,
    /// Verification cache capacity; zero disables the cache.
    pub verification_cache_entries: usize,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            session_id: DEFAULT_SESSION_ID.to_string(),
            event_slice_size: DEFAULT_EVENT_SLICE_SIZE,
            verification_cache_entries: DEFAULT_VERIFY_CACHE_ENTRIES,
            log_format: LogFormat::Json,
        }
    }
}

impl KernelConfig {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Invalid values keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            session_id: lookup("KERNEL_SESSION_ID")
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.session_id),
            event_slice_size: parse_or(
                &lookup,
                "KERNEL_EVENT_SLICE_SIZE",
                defaults.event_slice_size,
            ),
            verification_cache_entries: parse_or(
                &lookup,
                "KERNEL_VERIFY_CACHE_ENTRIES",
                defaults.verification_cache_entries,
            ),
            log_format: parse_or(&lookup, "LOG_FORMAT", defaults.log_format),
        }
    }

    /// Logical clock for this session.
    pub fn clock(&self) -> DeterministicClock {
        DeterministicClock::new(self.session_id.clone())
    }

    /// Bundle exporter with the configured slice size.
    pub fn exporter(&self) -> BundleExporter {
        BundleExporter::new(self.event_slice_size)
    }

    /// Verification cache settings.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_entries: self.verification_cache_entries,
            enabled: self.verification_cache_entries > 0,
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            tracing::warn!(key, value = %raw, error = %e, "invalid configuration value, using default");
            default
        }),
    }
}
