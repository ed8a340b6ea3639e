use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::plan::{Operation, OperationKind};

/// An executed operation as stored in the journal. `kind` stays a string so
/// that records written by other versions still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpRecord {
    pub kind: String,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub dst: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub warning: Option<String>,
}

impl From<&Operation> for OpRecord {
    fn from(op: &Operation) -> Self {
        Self {
            kind: op.kind.as_str().to_string(),
            src: op.src.clone(),
            dst: op.dst.clone(),
            detail: Some(op.detail.clone()),
            warning: Some(op.warning.clone()),
        }
    }
}

impl OpRecord {
    /// `None` for kinds this version does not know.
    pub fn to_operation(&self) -> Option<Operation> {
        let kind = OperationKind::from_journal_str(&self.kind)?;
        let mut op = Operation::new(
            kind,
            self.src.clone(),
            self.dst.clone(),
            self.detail.clone().unwrap_or_default(),
        );
        op.warning = self.warning.clone().unwrap_or_default();
        Some(op)
    }
}

/// Identifies the run an undo run reverses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UndoRef {
    pub timestamp_utc: String,
    pub tab: String,
    pub host: String,
    pub username: String,
}

/// One line of the journal. Unknown keys (feature flags such as
/// `skip_existing` or `swap_files`) are kept in `flags`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalRecord {
    /// Feature that produced the run (`move`, `rename`, `history_undo`, ...).
    pub tab: String,
    pub plan_title: String,
    pub host: String,
    pub username: String,
    pub dry_run: bool,
    pub ops_total: usize,
    pub ops_selected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ops: Option<Vec<OpRecord>>,
    pub script: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timestamp_utc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub undo_of: Option<UndoRef>,
    #[serde(flatten)]
    pub flags: BTreeMap<String, Value>,
}

impl JournalRecord {
    pub fn undo_ref(&self) -> UndoRef {
        UndoRef {
            timestamp_utc: self.timestamp_utc.clone(),
            tab: self.tab.clone(),
            host: self.host.clone(),
            username: self.username.clone(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    pub fn flag(&self, name: &str) -> Option<&Value> {
        self.flags.get(name)
    }
}
