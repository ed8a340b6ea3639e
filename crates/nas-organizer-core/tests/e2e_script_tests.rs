use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use tempfile::tempdir;

use nas_organizer_core::journal::{build_undo_plan_for_record, undo_readiness, UndoReadiness, UNDO_ON_EXISTS};
use nas_organizer_core::media::GroupingRules;
use nas_organizer_core::plan::builders::{build_swap_plan, SwapFolder, SwapOptions};
use nas_organizer_core::{
    generate_bash_script, scan_into_catalog, CancellationToken, Database, Journal, OnExists, Operation, Plan,
    PlanRunner, ProcessChannel, RemoteChannel, RunContext, Sandbox, ScriptOptions, SilentReporter,
};

struct Captured {
    exit_code: i32,
    stdout: Vec<String>,
    stderr: Vec<String>,
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn options(root: &Path) -> ScriptOptions {
    ScriptOptions {
        allowed_roots: vec![path_str(root)],
        dry_run: false,
        ..ScriptOptions::default()
    }
}

fn run_plan(plan: &Plan, options: &ScriptOptions) -> Captured {
    let script = generate_bash_script(plan, options).unwrap();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let exit_code = ProcessChannel::local()
        .exec_script_streaming(
            &script,
            &mut |line| stdout.push(line.to_string()),
            &mut |line| stderr.push(line.to_string()),
            &CancellationToken::new(),
        )
        .unwrap();
    Captured { exit_code, stdout, stderr }
}

/// Layout:
///   root/
///     in/a.mkv        ("video a")
///     in/a.srt        ("subs a")
///     out/
fn create_tree(root: &Path) {
    fs::create_dir_all(root.join("in")).unwrap();
    fs::create_dir_all(root.join("out")).unwrap();
    fs::write(root.join("in/a.mkv"), "video a").unwrap();
    fs::write(root.join("in/a.srt"), "subs a").unwrap();
}

#[test]
fn test_real_move_creates_parent_and_moves() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    create_tree(root);

    let plan = Plan::with_operations(
        "Move",
        vec![Operation::move_to(
            path_str(&root.join("in/a.mkv")),
            path_str(&root.join("out/nested/a.mkv")),
            "",
        )],
    );
    let out = run_plan(&plan, &options(root));

    assert_eq!(out.exit_code, 0, "stderr: {:?}", out.stderr);
    assert!(!root.join("in/a.mkv").exists());
    assert_eq!(fs::read_to_string(root.join("out/nested/a.mkv")).unwrap(), "video a");
    assert!(out.stdout.iter().any(|l| l.starts_with("OK: mv ")));
    assert_eq!(out.stdout.last().map(String::as_str), Some("DONE: 1 operation(s)"));
}

#[test]
fn test_dry_run_changes_nothing() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    create_tree(root);

    let plan = Plan::with_operations(
        "Move",
        vec![
            Operation::mkdir(path_str(&root.join("new")), ""),
            Operation::move_to(path_str(&root.join("in/a.mkv")), path_str(&root.join("out/a.mkv")), ""),
        ],
    );
    let opts = ScriptOptions { dry_run: true, ..options(root) };
    let out = run_plan(&plan, &opts);

    assert_eq!(out.exit_code, 0);
    assert!(root.join("in/a.mkv").exists());
    assert!(!root.join("out/a.mkv").exists());
    assert!(!root.join("new").exists());
    assert!(out.stdout.iter().any(|l| l.starts_with("DRY: mkdir -p ")));
    assert!(out.stdout.iter().any(|l| l.starts_with("DRY: mv ")));
}

#[test]
fn test_existing_destination_skip_and_error() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    create_tree(root);
    fs::write(root.join("out/a.mkv"), "already here").unwrap();

    let plan = Plan::with_operations(
        "Move",
        vec![Operation::move_to(path_str(&root.join("in/a.mkv")), path_str(&root.join("out/a.mkv")), "")],
    );

    let skipped = run_plan(&plan, &options(root));
    assert_eq!(skipped.exit_code, 0);
    assert!(skipped.stdout.iter().any(|l| l.starts_with("SKIP (exists): mv ")));
    assert_eq!(fs::read_to_string(root.join("out/a.mkv")).unwrap(), "already here");
    assert!(root.join("in/a.mkv").exists());

    let strict = ScriptOptions { on_exists: OnExists::Error, ..options(root) };
    let failed = run_plan(&plan, &strict);
    assert_ne!(failed.exit_code, 0);
    assert!(failed.stderr.iter().any(|l| l.contains("destination exists")));
    assert!(root.join("in/a.mkv").exists());
}

#[test]
fn test_script_rejects_paths_outside_roots() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("allowed");
    let outside = dir.path().join("outside");
    fs::create_dir_all(&root).unwrap();
    fs::create_dir_all(&outside).unwrap();
    fs::write(outside.join("x.mkv"), "x").unwrap();

    let plan = Plan::with_operations(
        "Move",
        vec![Operation::move_to(path_str(&outside.join("x.mkv")), path_str(&root.join("x.mkv")), "")],
    );
    let out = run_plan(&plan, &options(&root));

    assert_ne!(out.exit_code, 0);
    assert!(out.stderr.iter().any(|l| l.contains("path outside allowed roots")));
    assert!(outside.join("x.mkv").exists());
    assert!(!root.join("x.mkv").exists());
}

#[test]
fn test_hardlink_and_copy() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    create_tree(root);

    let plan = Plan::with_operations(
        "Hardlinks",
        vec![
            Operation::link(path_str(&root.join("in/a.mkv")), path_str(&root.join("lib/Movies/a.mkv")), "Movies"),
            Operation::copy(path_str(&root.join("in/a.srt")), path_str(&root.join("lib/Movies/a.srt")), "Movies"),
        ],
    );
    let out = run_plan(&plan, &options(root));

    assert_eq!(out.exit_code, 0, "stderr: {:?}", out.stderr);
    let original = fs::metadata(root.join("in/a.mkv")).unwrap();
    let linked = fs::metadata(root.join("lib/Movies/a.mkv")).unwrap();
    assert_eq!(original.ino(), linked.ino());
    assert_eq!(original.nlink(), 2);

    let copied = fs::metadata(root.join("lib/Movies/a.srt")).unwrap();
    assert_ne!(copied.ino(), fs::metadata(root.join("in/a.srt")).unwrap().ino());
    assert_eq!(fs::read_to_string(root.join("lib/Movies/a.srt")).unwrap(), "subs a");
}

#[test]
fn test_swap_then_undo_restores_layout() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("Movies");
    fs::create_dir_all(root.join("Alpha")).unwrap();
    fs::create_dir_all(root.join("Beta")).unwrap();
    fs::write(root.join("Alpha/Alpha.mkv"), "alpha video").unwrap();
    fs::write(root.join("Alpha/Alpha.en.srt"), "alpha subs").unwrap();
    fs::write(root.join("Beta/Beta.mkv"), "beta video").unwrap();

    let folder_a = SwapFolder {
        path: path_str(&root.join("Alpha")),
        files: vec![path_str(&root.join("Alpha/Alpha.mkv")), path_str(&root.join("Alpha/Alpha.en.srt"))],
    };
    let folder_b = SwapFolder {
        path: path_str(&root.join("Beta")),
        files: vec![path_str(&root.join("Beta/Beta.mkv"))],
    };
    let sandbox = Sandbox::new(&[path_str(&root)]);
    let plan = build_swap_plan(
        &folder_a,
        &folder_b,
        SwapOptions { swap_files: true, swap_folders: true },
        &GroupingRules::default(),
        &sandbox,
        "t1",
    )
    .unwrap();
    assert_eq!(plan.len(), 6);

    let journal = Journal::new(dir.path().join("state/journal.jsonl"));
    let channel = ProcessChannel::local();
    let runner = PlanRunner::new(&journal);
    let opts = options(&root);
    let cancel = CancellationToken::new();

    let outcome = runner
        .run(&plan, &opts, &RunContext::new("swap"), &channel, &SilentReporter, &cancel)
        .unwrap();
    assert!(outcome.success(), "stderr: {:?}", outcome.stderr);

    // Folder names are swapped and each video carries its new folder's name.
    assert_eq!(fs::read_to_string(root.join("Alpha/Alpha.mkv")).unwrap(), "beta video");
    assert_eq!(fs::read_to_string(root.join("Beta/Beta.mkv")).unwrap(), "alpha video");
    assert_eq!(fs::read_to_string(root.join("Beta/Beta.en.srt")).unwrap(), "alpha subs");

    let record = journal.read_records().unwrap().remove(0);
    assert_eq!(undo_readiness(&record).unwrap(), UndoReadiness::Ready);
    let (undo, skipped) = build_undo_plan_for_record(&record, false);
    assert!(skipped.is_empty());
    assert_eq!(undo.len(), 6);

    let undo_opts = ScriptOptions { on_exists: UNDO_ON_EXISTS, ..opts.clone() };
    let context = RunContext::new("history_undo").with_undo_of(record.undo_ref());
    let undone = runner.run(&undo, &undo_opts, &context, &channel, &SilentReporter, &cancel).unwrap();
    assert!(undone.success(), "stderr: {:?}", undone.stderr);

    assert_eq!(fs::read_to_string(root.join("Alpha/Alpha.mkv")).unwrap(), "alpha video");
    assert_eq!(fs::read_to_string(root.join("Alpha/Alpha.en.srt")).unwrap(), "alpha subs");
    assert_eq!(fs::read_to_string(root.join("Beta/Beta.mkv")).unwrap(), "beta video");
    let leftovers: Vec<_> = fs::read_dir(&root).unwrap().flatten().collect();
    assert_eq!(leftovers.len(), 2);

    let records = journal.read_records().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().any(|r| r.tab == "history_undo" && r.undo_of.is_some()));
}

#[test]
fn test_scan_then_move_keeps_catalog_in_step() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("media");
    create_tree(&root);
    let root_str = path_str(&root);

    let db = Database::open_in_memory().unwrap();
    let channel = ProcessChannel::local();
    let cancel = CancellationToken::new();
    let scan = scan_into_catalog(&root_str, &["mkv", "srt"], false, &channel, &db, &SilentReporter, &cancel).unwrap();
    assert_eq!(scan.exit_code, 0);
    assert_eq!(scan.indexed, 2);

    let journal = Journal::new(dir.path().join("journal.jsonl"));
    let plan = Plan::with_operations(
        "Move",
        vec![Operation::rename(path_str(&root.join("in")), path_str(&root.join("renamed")), "")],
    );
    let outcome = PlanRunner::new(&journal)
        .with_catalog(&db)
        .run(&plan, &options(&root), &RunContext::new("move"), &channel, &SilentReporter, &cancel)
        .unwrap();

    assert!(outcome.success(), "stderr: {:?}", outcome.stderr);
    assert_eq!(outcome.index_stats.map(|s| s.updated_prefix), Some(2));
    let moved = db.get_row(&path_str(&root.join("renamed/a.mkv"))).unwrap().unwrap();
    assert_eq!(moved.dir, path_str(&root.join("renamed")));
    assert_eq!(moved.root, root_str);
    assert!(db.get_row(&path_str(&root.join("in/a.mkv"))).unwrap().is_none());
}
