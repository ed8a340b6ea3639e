use std::fmt::Write as _;

use crate::error::Result;
use crate::quoting::bash_quote;

pub const SCAN_BEGIN_MARKER: &str = "JFO_SCAN_BEGIN";
pub const SCAN_END_MARKER: &str = "JFO_SCAN_END";

/// Build a read-only script listing files below `root`, bracketed by the scan
/// markers. With `all_files` the extension filter is dropped.
pub fn build_scan_script<S: AsRef<str>>(root: &str, exts: &[S], all_files: bool) -> Result<String> {
    let mut patterns = Vec::new();
    for ext in exts {
        let ext = ext.as_ref().trim().trim_start_matches('.').to_lowercase();
        if ext.is_empty() {
            continue;
        }
        patterns.push(format!("-iname {}", bash_quote(&format!("*.{}", ext))?));
    }

    let find = if all_files || patterns.is_empty() {
        "find \"$ROOT\" -type f -print".to_string()
    } else {
        format!("find \"$ROOT\" -type f '(' {} ')' -print", patterns.join(" -o "))
    };

    let mut out = String::new();
    out.push_str("#!/usr/bin/env bash\nset -euo pipefail\nIFS=$'\\n\\t'\nset -f\n\n");
    let _ = writeln!(out, "ROOT={}", bash_quote(root)?);
    out.push_str("echo '[scan] root='\"$ROOT\"\n");
    let _ = writeln!(out, "echo '{}'", SCAN_BEGIN_MARKER);
    let _ = writeln!(out, "{}", find);
    let _ = writeln!(out, "echo '{}'", SCAN_END_MARKER);
    Ok(out)
}

/// Classification of one stdout line of a scan run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanLine {
    Marker,
    Path(String),
    Diagnostic(String),
}

/// Demultiplexes scan stdout: lines between the markers are paths, anything
/// else is a diagnostic.
#[derive(Debug, Default)]
pub struct ScanCollector {
    active: bool,
    paths: Vec<String>,
}

impl ScanCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &str) -> ScanLine {
        match line.trim() {
            SCAN_BEGIN_MARKER => {
                self.active = true;
                return ScanLine::Marker;
            }
            SCAN_END_MARKER => {
                self.active = false;
                return ScanLine::Marker;
            }
            _ => {}
        }
        let path = line.trim_end_matches(['\r', '\n']);
        if self.active {
            if path.is_empty() {
                return ScanLine::Diagnostic(String::new());
            }
            self.paths.push(path.to_string());
            ScanLine::Path(path.to_string())
        } else {
            ScanLine::Diagnostic(path.to_string())
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn into_paths(self) -> Vec<String> {
        self.paths
    }
}
