//! Report and Fix Packet files written at the project root.

use std::path::Path;

use anyhow::{Context, Result, bail};
use jsonschema::Draft;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::packet::FixPacket;
use crate::core::types::Report;
use crate::io::store::write_json_atomic;

const FIX_PACKET_SCHEMA: &str = include_str!("../../schemas/fix_packet.v2.schema.json");

#[instrument(skip_all, fields(path = %path.display(), status = %report.status))]
pub fn write_report(path: &Path, report: &Report) -> Result<()> {
    write_json_atomic(path, report).with_context(|| format!("write report {}", path.display()))?;
    debug!("report written");
    Ok(())
}

/// Validate `packet` against the embedded v2 schema, then write it.
#[instrument(skip_all, fields(path = %path.display(), violations = packet.violations.len()))]
pub fn write_fix_packet(path: &Path, packet: &FixPacket) -> Result<()> {
    let instance = serde_json::to_value(packet).context("serialize fix packet")?;
    validate_fix_packet(&instance)?;
    write_json_atomic(path, packet)
        .with_context(|| format!("write fix packet {}", path.display()))?;
    debug!("fix packet written");
    Ok(())
}

/// Validate a JSON instance against the Fix Packet schema (Draft 2020-12).
pub fn validate_fix_packet(instance: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(FIX_PACKET_SCHEMA).context("parse fix packet schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile fix packet schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("fix packet schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}
