use tracing::debug;

use crate::plan::{Operation, OperationKind};
use crate::quoting::split_shell_words;

/// Recover operations from a previously generated script.
///
/// Only the guarded call lines (`safe_mv`, `safe_ln`, `safe_cp`,
/// `safe_mkdir`) are recognized; helper definitions and everything else are
/// ignored. Used for journal records that predate the stored `ops` field.
pub fn parse_ops_from_script(script: &str) -> Vec<Operation> {
    let mut ops = Vec::new();
    for raw in script.lines() {
        let line = raw.trim();
        if !line.starts_with("safe_") {
            continue;
        }
        let Some(parts) = split_shell_words(line) else {
            debug!("Skipping unparsable script line: {}", line);
            continue;
        };
        let op = match parts.as_slice() {
            [cmd, src, dst, ..] if cmd == "safe_mv" => Operation::move_to(src.as_str(), dst.as_str(), ""),
            [cmd, src, dst, ..] if cmd == "safe_ln" => Operation::link(src.as_str(), dst.as_str(), ""),
            [cmd, src, dst, ..] if cmd == "safe_cp" => Operation::copy(src.as_str(), dst.as_str(), ""),
            [cmd, dir, ..] if cmd == "safe_mkdir" => Operation::mkdir(dir.as_str(), ""),
            _ => continue,
        };
        ops.push(op);
    }
    ops
}
