//! Governance Audit CLI
//!
//! Commands:
//!   1) verify-chain <events.json>
//!      - Replays a JSON array of governance events and prints the chain summary.
//!   2) verify-evidence <capsule.json> <evidence.json>
//!      - Verifies one evidence record (or an array of them) against a capsule.
//!   3) verify-capsule <audit_capsule.json>
//!      - Runs the standalone audit capsule verifier.
//!   4) demo
//!      - Drives one OBSERVED → CLOSED cycle with a refusal, then prints the
//!        proof bundle and the capsule verification report.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `KERNEL_SESSION_ID`, `KERNEL_EVENT_SLICE_SIZE`, `KERNEL_VERIFY_CACHE_ENTRIES`
//! - `RUST_LOG`: Log level filter (default: warn)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! Exit status is 1 when a `verify-*` command reports a failed verification.
//! `demo` exits 0 once its cycle completes; the capsule report it prints is
//! informational and currently always incomplete.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value as Json};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use governance_kernel::evidence::{generate, Capsule, ProofVerifier};
use governance_kernel::{
    canonicalize, replay_chain, AuditCapsule, AuthorityClaim, AuthorityGrant, CapsuleVerifier,
    GovernanceEvent, GovernanceEventType, GovernanceState, GovernanceStateMachine, KernelConfig,
    LogFormat, RefusalDecisionBuilder, SymbolicRefusalReason, Value, KERNEL_VERSION,
};

/// CLI definition
#[derive(Parser)]
#[command(name = "governance_audit", version)]
struct Cli {
    /// Log output format (overrides LOG_FORMAT)
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Replay an event chain and print its summary
    VerifyChain {
        /// JSON array of governance events
        events: PathBuf,
    },

    /// Verify evidence records against a capsule
    VerifyEvidence {
        /// JSON object mapping reference to canonical artifact
        capsule: PathBuf,
        /// One evidence record, or an array of them
        evidence: PathBuf,
    },

    /// Verify an audit capsule
    VerifyCapsule {
        /// Audit capsule JSON
        capsule: PathBuf,
    },

    /// Run a full governance cycle and print the resulting proof bundle
    Demo,
}

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into());

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .flatten_event(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = KernelConfig::from_env();
    if let Some(raw) = &cli.log_format {
        config.log_format = raw.parse().map_err(anyhow::Error::msg)?;
    }
    init_tracing(config.log_format);
    info!(version = KERNEL_VERSION, session = %config.session_id, "governance audit starting");

    let ok = match cli.cmd {
        Cmd::VerifyChain { events } => cmd_verify_chain(&events)?,
        Cmd::VerifyEvidence { capsule, evidence } => cmd_verify_evidence(&capsule, &evidence)?,
        Cmd::VerifyCapsule { capsule } => cmd_verify_capsule(&capsule)?,
        Cmd::Demo => cmd_demo(&config)?,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn read_json(path: &Path) -> Result<Json> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn print_json(value: &Json) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_verify_chain(path: &Path) -> Result<bool> {
    let events: Vec<GovernanceEvent> = serde_json::from_value(read_json(path)?)
        .with_context(|| format!("decoding events in {}", path.display()))?;

    match replay_chain(&events) {
        Ok(summary) => {
            print_json(&json!({
                "valid": true,
                "event_count": summary.event_count,
                "final_state": summary.final_state,
                "head_hash": summary.head_hash,
            }))?;
            Ok(true)
        }
        Err(err) => {
            print_json(&json!({
                "valid": false,
                "error": err.to_string(),
                "event_id": err.event_id(),
            }))?;
            Ok(false)
        }
    }
}

fn cmd_verify_evidence(capsule_path: &Path, evidence_path: &Path) -> Result<bool> {
    let capsule: Capsule = serde_json::from_value(read_json(capsule_path)?)
        .with_context(|| format!("decoding capsule {}", capsule_path.display()))?;
    let records = match read_json(evidence_path)? {
        Json::Array(items) => items,
        single => vec![single],
    };

    let verifier = ProofVerifier::new(&capsule);
    let results: Vec<_> = records.iter().map(|raw| verifier.verify_untrusted(raw)).collect();
    let all_valid = results.iter().all(|r| r.valid);

    print_json(&serde_json::to_value(&results)?)?;
    Ok(all_valid)
}

fn cmd_verify_capsule(path: &Path) -> Result<bool> {
    let report = CapsuleVerifier::new(read_json(path)?).verify_capsule();
    print_json(&json!({
        "valid": report.is_valid(),
        "status": report.summary(),
        "failed_check": report.failed_check,
        "verification_log": report.verification_log,
    }))?;
    Ok(report.is_valid())
}

fn cmd_demo(config: &KernelConfig) -> Result<bool> {
    use GovernanceEventType::*;
    use GovernanceState::*;

    let mut machine = GovernanceStateMachine::new(config.clock());
    machine.block_workflow("fleet_ack_tick_3");

    let refuse = Value::map([("decision", "refuse".into())]);
    machine.transition(ObservationRecorded, 1, &Value::map([("signal", "anomaly".into())]), "sensor", Assessed)?;
    machine.transition(DecisionMade, 2, &refuse, "operator", Decided)?;
    machine.transition(DecisionCommitted, 3, &Value::empty_map(), "operator", Committed)?;

    if let Err(err) = machine.transition(CycleClosed, 3, &Value::empty_map(), "operator", Closed) {
        info!(error = %err, "closure held by outstanding acknowledgment");
    }
    machine.transition(AcknowledgmentReceived, 4, &Value::empty_map(), "fleet", Acked)?;
    machine.release_workflow("fleet_ack_tick_3");
    machine.transition(CycleClosed, 5, &Value::empty_map(), "operator", Closed)?;
    machine.verify_chain()?;

    let mut builder = RefusalDecisionBuilder::new();
    builder
        .add_symbolic_cause("unacked", SymbolicRefusalReason::AcknowledgmentPending, vec!["fleet_ack_tick_3".into()])?
        .add_symbolic_cause("policy", SymbolicRefusalReason::PolicyProhibited, vec!["governance_spec".into()])?
        .add_causal_edge("unacked", "policy");
    let dag = builder.build()?;

    let grant = AuthorityGrant {
        claim_id: "operator_refusal_authority".to_string(),
        holder: "operator".to_string(),
        scope: "refusal".to_string(),
        ml_authorize: false,
    };
    let claims: [&dyn AuthorityClaim; 1] = [&grant];
    let (proof, evidence) = generate(5, &claims)?;

    let spec = Value::map([
        ("name", "symbolic_refusal_governance".into()),
        ("schema", governance_kernel::GOVERNANCE_SCHEMA_VERSION.into()),
        ("refusal_requires", GovernanceState::Assessed.into()),
    ]);
    let dag_view = canonicalize(&Value::from_serialize(&dag)?)?;
    let bundle = config
        .exporter()
        .export(&spec, machine.events(), &claims, &proof, Some(vec![dag_view]))?;

    let report = CapsuleVerifier::from_capsule(&AuditCapsule::from_bundle(&bundle, evidence))?.verify_capsule();

    print_json(&json!({
        "bundle": bundle,
        "capsule_verification": {
            "valid": report.is_valid(),
            "status": report.summary(),
            "verification_log": report.verification_log,
        },
    }))?;

    Ok(true)
}
