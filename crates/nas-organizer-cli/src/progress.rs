use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use nas_organizer_core::RunReporter;
use std::sync::Mutex;

/// CLI reporter: a spinner while a script runs, with every streamed line
/// printed above it.
///
/// - Plan run: spinner labelled with the plan title
/// - Scan: spinner counting indexed paths
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }

    fn print_line(&self, line: String) {
        let guard = self.bar.lock().unwrap();
        match guard.as_ref() {
            Some(pb) => pb.println(line),
            None => eprintln!("{}", line),
        }
    }

    fn spinner(message: String) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.set_message(message);
        pb.enable_steady_tick(std::time::Duration::from_millis(80));
        pb
    }
}

fn colorize(line: &str) -> ColoredString {
    if line.starts_with("OK:") {
        line.green()
    } else if line.starts_with("SKIP") {
        line.yellow()
    } else if line.starts_with("DRY:") {
        line.cyan()
    } else if line.starts_with("DONE:") {
        line.bold()
    } else {
        line.normal()
    }
}

impl RunReporter for CliReporter {
    fn on_run_start(&self, title: &str, selected: usize, dry_run: bool) {
        let mode = if dry_run { "dry-run" } else { "REAL" };
        self.set_bar(Self::spinner(format!(
            "Running '{}' ({} ops, {})...",
            title, selected, mode
        )));
    }

    fn on_stdout_line(&self, line: &str) {
        self.print_line(format!("  {}", colorize(line)));
    }

    fn on_stderr_line(&self, line: &str) {
        self.print_line(format!("  {} {}", "STDERR:".red(), line.red()));
    }

    fn on_scan_progress(&self, paths_found: usize) {
        let mut guard = self.bar.lock().unwrap();
        let pb = guard.get_or_insert_with(|| Self::spinner(String::new()));
        pb.set_message(format!("Scanning... {} paths found", paths_found));
    }

    fn on_run_complete(&self, exit_code: i32, duration_secs: f64) {
        self.finish_bar();
        if exit_code == 0 {
            eprintln!(
                "  {} Finished with exit code 0 in {:.2}s",
                "✓".green(),
                duration_secs
            );
        } else {
            eprintln!(
                "  {} Finished with exit code {} in {:.2}s",
                "✗".red(),
                exit_code,
                duration_secs
            );
        }
    }

    fn on_index_updated(&self, inserted: usize, deleted: usize, updated_prefix: usize) {
        eprintln!(
            "  {} Catalog updated: {} inserted, {} deleted, {} rewritten",
            "✓".green(),
            inserted,
            deleted,
            updated_prefix
        );
    }
}
