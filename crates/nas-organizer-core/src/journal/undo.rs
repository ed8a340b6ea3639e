//! Conservative inverse plans for journaled runs.
//!
//! Only moves and renames are reversed. Directory creation is left in place,
//! and links or copies are never deleted automatically.

use tracing::debug;

use super::record::JournalRecord;
use crate::error::{Error, Result};
use crate::plan::{Operation, OperationKind, Plan};
use crate::script::{parse_ops_from_script, OnExists};

/// Undo scripts never skip over an occupied destination.
pub const UNDO_ON_EXISTS: OnExists = OnExists::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoReadiness {
    Ready,
    /// The run exited non-zero; part of it may never have happened.
    FailedRun(i32),
}

/// Dry-run records are refused since nothing was changed. Failed runs need
/// the caller's confirmation.
pub fn undo_readiness(record: &JournalRecord) -> Result<UndoReadiness> {
    if record.dry_run {
        return Err(Error::Other(format!(
            "Run {} {} was a dry run; there is nothing to undo",
            record.tab, record.timestamp_utc
        )));
    }
    if record.exit_code != 0 {
        return Ok(UndoReadiness::FailedRun(record.exit_code));
    }
    Ok(UndoReadiness::Ready)
}

/// Operations a record executed: its `ops` list when present and non-empty,
/// otherwise whatever can be parsed back out of its script.
pub fn ops_from_record(record: &JournalRecord) -> Vec<Operation> {
    match &record.ops {
        Some(ops) if !ops.is_empty() => ops.iter().filter_map(|op| op.to_operation()).collect(),
        _ => {
            debug!("Record {} has no ops; parsing script", record.timestamp_utc);
            parse_ops_from_script(&record.script)
        }
    }
}

fn endpoint(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Build the inverse of `executed_ops`, last operation first.
///
/// Returns the plan and the messages for every operation that was not
/// reversed. The messages are also added as plan warnings. `strict` reports
/// links and copies as unsupported instead of skipped.
pub fn build_undo_plan(executed_ops: &[Operation], title: &str, strict: bool) -> (Plan, Vec<String>) {
    let mut undo_ops = Vec::new();
    let mut skipped = Vec::new();

    for op in executed_ops.iter().rev() {
        let src = endpoint(op.src.as_deref());
        let dst = endpoint(op.dst.as_deref());
        match op.kind {
            OperationKind::Move | OperationKind::Rename => match (src, dst) {
                (Some(src), Some(dst)) => {
                    let detail = format!("UNDO {}", op.detail).trim().to_string();
                    undo_ops.push(Operation::move_to(dst, src, detail));
                }
                _ => skipped.push(format!(
                    "Skip undo for {}: {} -> {}",
                    op.kind,
                    src.unwrap_or(""),
                    dst.unwrap_or("")
                )),
            },
            OperationKind::Mkdir => {}
            OperationKind::Link | OperationKind::Copy => {
                if strict {
                    skipped.push(format!("Unsupported undo op: {}", op.kind));
                } else {
                    skipped.push(format!(
                        "Skip undo for {}: {} -> {}",
                        op.kind,
                        src.unwrap_or(""),
                        dst.unwrap_or("")
                    ));
                }
            }
        }
    }

    let mut plan = Plan::with_operations(title, undo_ops);
    plan.apply_collision_warnings();
    for message in &skipped {
        plan.add_warning(message.clone());
    }
    (plan, skipped)
}

/// Undo plan for a journal record, titled `Undo <tab> <timestamp>`.
pub fn build_undo_plan_for_record(record: &JournalRecord, strict: bool) -> (Plan, Vec<String>) {
    let title = format!("Undo {} {}", record.tab, record.timestamp_utc);
    build_undo_plan(&ops_from_record(record), &title, strict)
}
