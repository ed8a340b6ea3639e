//! Append-only run history and undo reconstruction.

pub mod record;
pub mod store;
pub mod undo;

pub use record::{JournalRecord, OpRecord, UndoRef};
pub use store::Journal;
pub use undo::{
    build_undo_plan, build_undo_plan_for_record, ops_from_record, undo_readiness, UndoReadiness, UNDO_ON_EXISTS,
};
