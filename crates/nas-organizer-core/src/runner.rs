use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::catalog::{apply_plan_to_index, IndexUpdateStats};
use crate::error::{Error, Result};
use crate::journal::{Journal, JournalRecord, OpRecord, UndoRef};
use crate::plan::Plan;
use crate::progress::RunReporter;
use crate::remote::{CancellationToken, RemoteChannel, UNKNOWN_EXIT_STATUS};
use crate::script::{build_scan_script, generate_bash_script, ScanCollector, ScanLine, ScriptOptions};
use crate::storage::Database;

const SCAN_PROGRESS_EVERY: usize = 500;

/// Who ran what, recorded alongside the plan in the journal.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    /// Feature name stored as the record's `tab`.
    pub feature: String,
    /// Feature-specific switches (`swap_files`, `sidecar_policy`, ...).
    pub flags: BTreeMap<String, Value>,
    pub undo_of: Option<UndoRef>,
    /// Extra root markers for catalog sync.
    pub roots_hint: Vec<String>,
}

impl RunContext {
    pub fn new(feature: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            ..Default::default()
        }
    }

    pub fn with_flag(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.flags.insert(name.to_string(), value.into());
        self
    }

    pub fn with_undo_of(mut self, undo_of: UndoRef) -> Self {
        self.undo_of = Some(undo_of);
        self
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    pub exit_code: i32,
    pub script: String,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub duration: Duration,
    pub journaled: bool,
    /// Set only for real runs that exited 0 and synced successfully.
    pub index_stats: Option<IndexUpdateStats>,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes plans: script generation, streaming, journaling and catalog sync.
pub struct PlanRunner<'a> {
    journal: &'a Journal,
    catalog: Option<&'a Database>,
}

impl<'a> PlanRunner<'a> {
    pub fn new(journal: &'a Journal) -> Self {
        Self { journal, catalog: None }
    }

    pub fn with_catalog(mut self, db: &'a Database) -> Self {
        self.catalog = Some(db);
        self
    }

    /// Run the selected operations of `plan` through `channel`.
    ///
    /// Exactly one journal record is appended once the script has been
    /// handed to the channel, whatever the outcome. The catalog is updated
    /// only after a real run that exited 0; a sync failure is logged and does
    /// not fail the run.
    pub fn run(
        &self,
        plan: &Plan,
        options: &ScriptOptions,
        context: &RunContext,
        channel: &dyn RemoteChannel,
        reporter: &dyn RunReporter,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        let script = generate_bash_script(plan, options)?;
        let selected = plan.count_selected();
        info!(
            "Running plan '{}' ({} ops selected, dry_run={})",
            plan.title, selected, options.dry_run
        );
        reporter.on_run_start(&plan.title, selected, options.dry_run);

        let start = Instant::now();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let result = channel.exec_script_streaming(
            &script,
            &mut |line| {
                reporter.on_stdout_line(line);
                stdout.push(line.to_string());
            },
            &mut |line| {
                reporter.on_stderr_line(line);
                stderr.push(line.to_string());
            },
            cancel,
        );
        let duration = start.elapsed();

        let (exit_code, channel_error) = match result {
            Ok(code) => (code, None),
            Err(e) => {
                stderr.push(e.to_string());
                (UNKNOWN_EXIT_STATUS, Some(e))
            }
        };
        reporter.on_run_complete(exit_code, duration.as_secs_f64());

        let record = self.build_record(plan, options, context, channel, &script, exit_code, &stdout, &stderr);
        let journaled = match self.journal.append(&record) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to write journal record: {}", e);
                false
            }
        };

        if let Some(e) = channel_error {
            error!("Plan '{}' could not be executed: {}", plan.title, e);
            return Err(e);
        }
        if exit_code != 0 {
            warn!("Plan '{}' exited with status {}", plan.title, exit_code);
        }

        let index_stats = match self.catalog {
            Some(db) if exit_code == 0 && !options.dry_run => {
                match apply_plan_to_index(db, plan, &context.roots_hint) {
                    Ok(stats) => {
                        reporter.on_index_updated(stats.inserted, stats.deleted, stats.updated_prefix);
                        Some(stats)
                    }
                    Err(e) => {
                        warn!("Catalog update failed (run itself succeeded): {}", e);
                        None
                    }
                }
            }
            _ => None,
        };

        Ok(RunOutcome {
            exit_code,
            script,
            stdout,
            stderr,
            duration,
            journaled,
            index_stats,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn build_record(
        &self,
        plan: &Plan,
        options: &ScriptOptions,
        context: &RunContext,
        channel: &dyn RemoteChannel,
        script: &str,
        exit_code: i32,
        stdout: &[String],
        stderr: &[String],
    ) -> JournalRecord {
        let mut flags = context.flags.clone();
        flags.insert("no_overwrite".to_string(), Value::Bool(options.no_overwrite));
        flags.insert("on_exists".to_string(), Value::String(options.on_exists.as_str().to_string()));

        JournalRecord {
            tab: context.feature.clone(),
            plan_title: plan.title.clone(),
            host: channel.host(),
            username: channel.username(),
            dry_run: options.dry_run,
            ops_total: plan.len(),
            ops_selected: plan.count_selected(),
            ops: Some(plan.selected_operations().map(OpRecord::from).collect()),
            script: script.to_string(),
            exit_code,
            stdout: stdout.join("\n"),
            stderr: stderr.join("\n"),
            timestamp_utc: String::new(),
            undo_of: context.undo_of.clone(),
            flags,
        }
    }
}

#[derive(Debug)]
pub struct ScanOutcome {
    pub exit_code: i32,
    pub paths_found: usize,
    /// Rows written to the catalog; zero unless the scan exited 0.
    pub indexed: usize,
    pub duration: Duration,
}

/// List media files below `root` on the remote side and upsert them into the
/// catalog under that root marker. A failed scan leaves the catalog untouched.
pub fn scan_into_catalog<S: AsRef<str>>(
    root: &str,
    exts: &[S],
    all_files: bool,
    channel: &dyn RemoteChannel,
    db: &Database,
    reporter: &dyn RunReporter,
    cancel: &CancellationToken,
) -> Result<ScanOutcome> {
    let script = build_scan_script(root, exts, all_files)?;
    info!("Scanning {} on {}", root, channel.host());

    let start = Instant::now();
    let mut collector = ScanCollector::new();
    let exit_code = channel.exec_script_streaming(
        &script,
        &mut |line| match collector.push_line(line) {
            ScanLine::Path(_) => {
                if collector.len() % SCAN_PROGRESS_EVERY == 0 {
                    reporter.on_scan_progress(collector.len());
                }
            }
            ScanLine::Diagnostic(text) if !text.is_empty() => reporter.on_stdout_line(&text),
            _ => {}
        },
        &mut |line| reporter.on_stderr_line(line),
        cancel,
    )?;
    let duration = start.elapsed();
    reporter.on_run_complete(exit_code, duration.as_secs_f64());

    let paths = collector.into_paths();
    let paths_found = paths.len();
    if exit_code != 0 {
        warn!("Scan of {} exited with status {}; catalog not updated", root, exit_code);
        return Ok(ScanOutcome { exit_code, paths_found, indexed: 0, duration });
    }
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let indexed = db.upsert_paths(&paths, root)?;
    debug!("Scan of {} indexed {} paths in {:.2}s", root, indexed, duration.as_secs_f64());
    Ok(ScanOutcome { exit_code, paths_found, indexed, duration })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Operation;
    use crate::progress::SilentReporter;
    use crate::remote::ExecResult;
    use std::cell::RefCell;

    /// Replays canned output and records the last script.
    struct FakeChannel {
        stdout: Vec<&'static str>,
        exit_code: i32,
        last_script: RefCell<String>,
    }

    impl FakeChannel {
        fn new(stdout: Vec<&'static str>, exit_code: i32) -> Self {
            Self { stdout, exit_code, last_script: RefCell::new(String::new()) }
        }
    }

    impl RemoteChannel for FakeChannel {
        fn exec_command(&self, _command: &str) -> Result<ExecResult> {
            Ok(ExecResult { exit_status: 0, stdout: String::new(), stderr: String::new() })
        }

        fn exec_script_streaming(
            &self,
            script: &str,
            on_stdout: &mut dyn FnMut(&str),
            on_stderr: &mut dyn FnMut(&str),
            _cancel: &CancellationToken,
        ) -> Result<i32> {
            *self.last_script.borrow_mut() = script.to_string();
            for line in &self.stdout {
                on_stdout(line);
            }
            on_stderr("warning line");
            Ok(self.exit_code)
        }

        fn host(&self) -> String {
            "fake".to_string()
        }

        fn username(&self) -> String {
            "tester".to_string()
        }
    }

    fn options(dry_run: bool) -> ScriptOptions {
        ScriptOptions {
            allowed_roots: vec!["/r".to_string()],
            dry_run,
            ..ScriptOptions::default()
        }
    }

    #[test]
    fn test_real_run_journals_and_syncs_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().join("journal.jsonl"));
        let db = Database::open_in_memory().unwrap();
        db.upsert_paths(&["/r/a.mkv"], "/r").unwrap();

        let plan = Plan::with_operations("Move", vec![Operation::move_to("/r/a.mkv", "/r/b.mkv", "")]);
        let channel = FakeChannel::new(vec!["OK: mv /r/a.mkv -> /r/b.mkv"], 0);
        let context = RunContext::new("move").with_flag("skip_existing", true);
        let outcome = PlanRunner::new(&journal)
            .with_catalog(&db)
            .run(&plan, &options(false), &context, &channel, &SilentReporter, &CancellationToken::new())
            .unwrap();

        assert!(outcome.success());
        assert!(outcome.journaled);
        assert_eq!(outcome.stderr, vec!["warning line".to_string()]);
        assert_eq!(outcome.index_stats, Some(IndexUpdateStats { inserted: 1, deleted: 1, updated_prefix: 0 }));
        assert!(channel.last_script.borrow().contains("safe_mv '/r/a.mkv' '/r/b.mkv'"));

        let records = journal.read_records().unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.tab, "move");
        assert_eq!(record.host, "fake");
        assert_eq!(record.username, "tester");
        assert_eq!(record.ops.as_ref().map(Vec::len), Some(1));
        assert_eq!(record.flag("skip_existing"), Some(&Value::Bool(true)));
        assert_eq!(record.flag("on_exists"), Some(&Value::String("skip".into())));
        assert_eq!(record.stdout, "OK: mv /r/a.mkv -> /r/b.mkv");
    }

    #[test]
    fn test_dry_run_and_failures_skip_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().join("journal.jsonl"));
        let db = Database::open_in_memory().unwrap();
        db.upsert_paths(&["/r/a.mkv"], "/r").unwrap();
        let plan = Plan::with_operations("Move", vec![Operation::move_to("/r/a.mkv", "/r/b.mkv", "")]);
        let runner = PlanRunner::new(&journal).with_catalog(&db);
        let cancel = CancellationToken::new();

        let dry = FakeChannel::new(vec![], 0);
        let outcome = runner
            .run(&plan, &options(true), &RunContext::new("move"), &dry, &SilentReporter, &cancel)
            .unwrap();
        assert!(outcome.index_stats.is_none());

        let failing = FakeChannel::new(vec![], 1);
        let outcome = runner
            .run(&plan, &options(false), &RunContext::new("move"), &failing, &SilentReporter, &cancel)
            .unwrap();
        assert_eq!(outcome.exit_code, 1);
        assert!(outcome.index_stats.is_none());

        assert!(db.get_row("/r/a.mkv").unwrap().is_some());
        assert_eq!(journal.read_records().unwrap().len(), 2);
    }

    #[test]
    fn test_generation_error_is_not_journaled() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().join("journal.jsonl"));
        let plan = Plan::with_operations("Move", vec![Operation::move_to("/r/a", "/r/b", "")]);
        let result = PlanRunner::new(&journal).run(
            &plan,
            &ScriptOptions::default(),
            &RunContext::new("move"),
            &FakeChannel::new(vec![], 0),
            &SilentReporter,
            &CancellationToken::new(),
        );
        assert!(result.is_err());
        assert!(journal.read_records().unwrap().is_empty());
    }

    #[test]
    fn test_scan_into_catalog() {
        let db = Database::open_in_memory().unwrap();
        let channel = FakeChannel::new(
            vec!["[scan] root=/r", "JFO_SCAN_BEGIN", "/r/a.mkv", "/r/sub/b.srt", "JFO_SCAN_END"],
            0,
        );
        let outcome = scan_into_catalog(
            "/r",
            &["mkv", "srt"],
            false,
            &channel,
            &db,
            &SilentReporter,
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(outcome.paths_found, 2);
        assert_eq!(outcome.indexed, 2);
        assert_eq!(db.get_row("/r/sub/b.srt").unwrap().unwrap().dir, "/r/sub");

        let failed = FakeChannel::new(vec!["JFO_SCAN_BEGIN", "/r/c.mkv"], 2);
        let outcome = scan_into_catalog("/r", &["mkv"], false, &failed, &db, &SilentReporter, &CancellationToken::new())
            .unwrap();
        assert_eq!(outcome.indexed, 0);
        assert!(db.get_row("/r/c.mkv").unwrap().is_none());
    }
}
