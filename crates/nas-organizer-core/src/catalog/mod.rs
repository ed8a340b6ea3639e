//! Keeps the local path catalog in step with completed runs.

pub mod index_sync;

pub use index_sync::{apply_plan_to_index, IndexUpdateStats};
