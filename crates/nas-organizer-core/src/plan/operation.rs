use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);

/// The closed set of filesystem operations a plan can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Mkdir,
    #[serde(rename = "mv")]
    Move,
    Rename,
    #[serde(rename = "ln")]
    Link,
    #[serde(rename = "cp")]
    Copy,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Mkdir => "mkdir",
            OperationKind::Move => "mv",
            OperationKind::Rename => "rename",
            OperationKind::Link => "ln",
            OperationKind::Copy => "cp",
        }
    }

    /// Lenient lookup used when reading journal records, which may spell kinds
    /// either by short command name or by long name.
    pub fn from_journal_str(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "mkdir" | "create_dir" | "create-directory" => Some(OperationKind::Mkdir),
            "mv" | "move" => Some(OperationKind::Move),
            "rename" => Some(OperationKind::Rename),
            "ln" | "link" | "hardlink" => Some(OperationKind::Link),
            "cp" | "copy" => Some(OperationKind::Copy),
            _ => None,
        }
    }

    /// Move and rename share the same remote semantics.
    pub fn is_move(&self) -> bool {
        matches!(self, OperationKind::Move | OperationKind::Rename)
    }

    /// Kinds that take a source and a destination.
    pub fn is_transfer(&self) -> bool {
        !matches!(self, OperationKind::Mkdir)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One filesystem action. `selected` and `warning` are the only fields meant
/// to change after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub id: u64,
    pub kind: OperationKind,
    pub src: Option<String>,
    pub dst: Option<String>,
    pub detail: String,
    pub selected: bool,
    pub warning: String,
}

impl Operation {
    pub fn new(
        kind: OperationKind,
        src: Option<String>,
        dst: Option<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            src,
            dst,
            detail: detail.into(),
            selected: true,
            warning: String::new(),
        }
    }

    pub fn mkdir(dir: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(OperationKind::Mkdir, None, Some(dir.into()), detail)
    }

    pub fn transfer(
        kind: OperationKind,
        src: impl Into<String>,
        dst: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::new(kind, Some(src.into()), Some(dst.into()), detail)
    }

    pub fn move_to(src: impl Into<String>, dst: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::transfer(OperationKind::Move, src, dst, detail)
    }

    pub fn rename(src: impl Into<String>, dst: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::transfer(OperationKind::Rename, src, dst, detail)
    }

    pub fn link(src: impl Into<String>, dst: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::transfer(OperationKind::Link, src, dst, detail)
    }

    pub fn copy(src: impl Into<String>, dst: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::transfer(OperationKind::Copy, src, dst, detail)
    }

    pub fn deselected(mut self) -> Self {
        self.selected = false;
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.add_warning(&warning.into());
        self
    }

    /// Append to the warning with `; `, skipping a message already present.
    pub fn add_warning(&mut self, message: &str) {
        if message.is_empty() || self.has_warning(message) {
            return;
        }
        if self.warning.is_empty() {
            self.warning = message.to_string();
        } else {
            self.warning = format!("{}; {}", self.warning, message);
        }
    }

    /// Whole-message match; the message itself may contain `; `.
    fn has_warning(&self, message: &str) -> bool {
        let w = self.warning.as_str();
        w == message
            || w.starts_with(&format!("{}; ", message))
            || w.ends_with(&format!("; {}", message))
            || w.contains(&format!("; {}; ", message))
    }

    /// Destination path when it is non-empty.
    pub fn destination(&self) -> Option<&str> {
        self.dst.as_deref().filter(|d| !d.is_empty())
    }

    /// Remote paths this operation touches.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.src.as_deref().into_iter().chain(self.dst.as_deref())
    }

    pub fn summary(&self) -> String {
        match (self.kind, self.src.as_deref(), self.dst.as_deref()) {
            (OperationKind::Mkdir, _, Some(dst)) => format!("mkdir {}", dst),
            (kind, Some(src), Some(dst)) => format!("{} {} -> {}", kind, src, dst),
            (kind, src, dst) => format!("{} {} -> {}", kind, src.unwrap_or("?"), dst.unwrap_or("?")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings() {
        assert_eq!(OperationKind::Move.as_str(), "mv");
        assert_eq!(OperationKind::from_journal_str("MOVE"), Some(OperationKind::Move));
        assert_eq!(OperationKind::from_journal_str("ln"), Some(OperationKind::Link));
        assert_eq!(OperationKind::from_journal_str("chmod"), None);
        assert_eq!(serde_json::to_string(&OperationKind::Copy).unwrap(), "\"cp\"");
        assert_eq!(
            serde_json::from_str::<OperationKind>("\"rename\"").unwrap(),
            OperationKind::Rename
        );
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Operation::mkdir("/a", "");
        let b = Operation::mkdir("/a", "");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_add_warning_never_duplicates() {
        let mut op = Operation::move_to("/a", "/b", "");
        op.add_warning("first");
        op.add_warning("second");
        op.add_warning("first");
        assert_eq!(op.warning, "first; second");
    }

    #[test]
    fn test_summary() {
        assert_eq!(Operation::link("/a", "/b", "").summary(), "ln /a -> /b");
        assert_eq!(Operation::mkdir("/d", "").summary(), "mkdir /d");
    }
}
