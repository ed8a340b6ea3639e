/// Callbacks for plan and scan runs.
///
/// The CLI implements this with a spinner and colored output. All methods
/// have default no-op implementations.
pub trait RunReporter {
    fn on_run_start(&self, _title: &str, _selected: usize, _dry_run: bool) {}
    fn on_stdout_line(&self, _line: &str) {}
    fn on_stderr_line(&self, _line: &str) {}
    fn on_scan_progress(&self, _paths_found: usize) {}
    fn on_run_complete(&self, _exit_code: i32, _duration_secs: f64) {}
    fn on_index_updated(&self, _inserted: usize, _deleted: usize, _updated_prefix: usize) {}
}

/// No-op reporter for silent operation.
pub struct SilentReporter;

impl RunReporter for SilentReporter {}
