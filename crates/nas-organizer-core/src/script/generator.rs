use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::plan::{Operation, OperationKind, Plan};
use crate::quoting::{bash_array_literal, bash_quote};
use crate::sandbox::Sandbox;

/// What a guarded call does when its destination already exists and
/// `no_overwrite` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnExists {
    #[default]
    Skip,
    Error,
}

impl OnExists {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnExists::Skip => "skip",
            OnExists::Error => "error",
        }
    }
}

impl std::str::FromStr for OnExists {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(OnExists::Skip),
            "error" => Ok(OnExists::Error),
            other => Err(Error::Other(format!("Unknown on-exists policy: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOptions {
    pub allowed_roots: Vec<String>,
    pub dry_run: bool,
    pub no_overwrite: bool,
    pub on_exists: OnExists,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            allowed_roots: Vec::new(),
            dry_run: true,
            no_overwrite: true,
            on_exists: OnExists::Skip,
        }
    }
}

const HELPERS: &str = r#"log() { printf '%s\n' "$1"; }
die() { printf 'ERROR: %s\n' "$1" >&2; exit 1; }

check_path() {
  local p="$1" root
  case "$p" in
    /*) ;;
    *) die "not an absolute path: $p" ;;
  esac
  case "$p/" in
    */../*) die "path contains '..': $p" ;;
  esac
  for root in "${ALLOWED_ROOTS[@]}"; do
    case "$p" in
      "$root"*) return 0 ;;
    esac
  done
  die "path outside allowed roots: $p"
}

exists() { [ -e "$1" ] || [ -L "$1" ]; }

safe_mkdir() {
  local dir="$1"
  check_path "$dir"
  if [ "$DRY_RUN" = 1 ]; then
    log "DRY: mkdir -p $dir"
    return 0
  fi
  mkdir -p -- "$dir"
  log "OK: mkdir $dir"
}

transfer() {
  local op="$1" src="$2" dst="$3"
  check_path "$src"
  check_path "$dst"
  if [ "$NO_OVERWRITE" = 1 ] && exists "$dst"; then
    if [ "$ON_EXISTS" = skip ]; then
      log "SKIP (exists): $op $src -> $dst"
      return 0
    fi
    die "destination exists: $op $src -> $dst"
  fi
  if [ "$DRY_RUN" = 1 ]; then
    log "DRY: $op $src $dst"
    return 0
  fi
  exists "$src" || die "source missing: $src"
  mkdir -p -- "$(dirname -- "$dst")"
  case "$op" in
    mv) if [ "$NO_OVERWRITE" = 1 ]; then mv -n -- "$src" "$dst"; else mv -f -- "$src" "$dst"; fi ;;
    ln) if [ "$NO_OVERWRITE" = 1 ]; then ln -- "$src" "$dst"; else ln -f -- "$src" "$dst"; fi ;;
    cp) if [ "$NO_OVERWRITE" = 1 ]; then cp -p -- "$src" "$dst"; else cp -pf -- "$src" "$dst"; fi ;;
    *) die "unknown operation: $op" ;;
  esac
  log "OK: $op $src -> $dst"
}

safe_mv() { transfer mv "$1" "$2"; }
safe_ln() { transfer ln "$1" "$2"; }
safe_cp() { transfer cp "$1" "$2"; }
"#;

fn flag(value: bool) -> u8 {
    u8::from(value)
}

/// Header comment text: control characters would break the comment line.
fn comment_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

fn require<'a>(op: &'a Operation, value: Option<&'a str>, what: &str) -> Result<&'a str> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| {
        Error::ScriptGeneration(format!("{} operation #{} has no {}", op.kind, op.id, what))
    })
}

fn guarded_call(op: &Operation) -> Result<String> {
    let line = match op.kind {
        OperationKind::Mkdir => {
            let dir = require(op, op.dst.as_deref(), "destination")?;
            format!("safe_mkdir {}", bash_quote(dir)?)
        }
        OperationKind::Move | OperationKind::Rename | OperationKind::Link | OperationKind::Copy => {
            let helper = match op.kind {
                OperationKind::Link => "safe_ln",
                OperationKind::Copy => "safe_cp",
                _ => "safe_mv",
            };
            let src = require(op, op.src.as_deref(), "source")?;
            let dst = require(op, op.dst.as_deref(), "destination")?;
            format!("{} {} {}", helper, bash_quote(src)?, bash_quote(dst)?)
        }
    };
    Ok(line)
}

/// Compile the selected operations of `plan` into a self-contained bash
/// script. The root list is embedded and every guarded call re-validates its
/// paths against it on the remote side.
pub fn generate_bash_script(plan: &Plan, options: &ScriptOptions) -> Result<String> {
    let roots = Sandbox::new(&options.allowed_roots).normalized_roots();
    if roots.is_empty() {
        return Err(Error::ScriptGeneration(
            "No allowed roots configured; refusing to generate a script".to_string(),
        ));
    }

    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "#!/usr/bin/env bash");
    let _ = writeln!(out, "# Plan: {}", comment_text(&plan.title));
    let _ = writeln!(
        out,
        "# Operations: {} selected of {}",
        plan.count_selected(),
        plan.len()
    );
    out.push_str("set -euo pipefail\nIFS=$'\\n\\t'\nset -f\n\n");
    let _ = writeln!(out, "DRY_RUN={}", flag(options.dry_run));
    let _ = writeln!(out, "NO_OVERWRITE={}", flag(options.no_overwrite));
    let _ = writeln!(out, "ON_EXISTS={}", bash_quote(options.on_exists.as_str())?);
    let _ = writeln!(out, "ALLOWED_ROOTS={}", bash_array_literal(&roots)?);
    out.push('\n');
    out.push_str(HELPERS);
    out.push('\n');

    let mut count = 0usize;
    for op in plan.selected_operations() {
        out.push_str(&guarded_call(op)?);
        out.push('\n');
        count += 1;
    }
    let _ = writeln!(out, "log {}", bash_quote(&format!("DONE: {} operation(s)", count))?);

    debug!(
        "Generated script for plan '{}' ({} ops, dry_run={})",
        plan.title, count, options.dry_run
    );
    Ok(out)
}
