//! Bash script synthesis and parsing.

pub mod generator;
pub mod parse;
pub mod scan;

pub use generator::{generate_bash_script, OnExists, ScriptOptions};
pub use parse::parse_ops_from_script;
pub use scan::{build_scan_script, ScanCollector, ScanLine};
