mod commands;
mod logging;
mod progress;

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, HistoryCommand, RunArgs};
use dotenv::dotenv;
use nas_organizer_core::journal::{build_undo_plan_for_record, undo_readiness, UndoReadiness, UNDO_ON_EXISTS};
use nas_organizer_core::media::{group_media_files, parse_nfo, NfoInfo};
use nas_organizer_core::plan::builders::{
    build_library_link_plan, build_mkdirs_plan, build_move_plan, build_rename_plan, build_swap_plan,
    parse_directory_entries, resolve_metadata, MetadataOverrides, RenameOptions, RenameRequest, SidecarPolicy,
    SwapFolder, SwapOptions,
};
use nas_organizer_core::{
    generate_bash_script, scan_into_catalog, AppConfig, CancellationToken, Database, Journal, OnExists, Plan,
    PlanRunner, ProcessChannel, RemoteChannel, RunContext,
};
use progress::CliReporter;
use tracing::{error, info, warn};

/// Upper bound for catalog reads that feed a plan.
const PLAN_SOURCE_LIMIT: i64 = 1_000_000;
const MASS_CONFIRM_WORD: &str = "YES";

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match nas_organizer_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        warn!("Ctrl-C handler not installed: {}", e);
    }

    match args.command {
        Some(Commands::Scan { root, all_files }) => run_scan(&config, &root, all_files, &cancel)?,
        Some(Commands::Search { term, root, exts, limit }) => {
            let db = open_catalog(&config)?;
            let rows = db.search_files(root.as_deref(), &term, &exts, limit)?;
            for row in &rows {
                println!("{}  {}", row.path, format!("[{}]", row.root).dimmed());
            }
            info!("{} match(es) for '{}'", rows.len(), term);
        }
        Some(Commands::Export { root, out, format }) => {
            let db = open_catalog(&config)?;
            let count = match format.as_str() {
                "jsonl" => db.export_root_jsonl(&root, &out)?,
                _ => db.export_root_csv(&root, &out)?,
            };
            info!("Exported {} rows of {} to {}", count, root, out.display());
        }
        Some(Commands::Move { src_dir, dst_dir, root, run }) => {
            let sandbox = config.sandbox();
            sandbox.check(&src_dir)?;
            sandbox.check(&dst_dir)?;
            let db = open_catalog(&config)?;
            let paths = db.files_under_dir(root.as_deref(), &src_dir, &[], PLAN_SOURCE_LIMIT)?;
            let plan = build_move_plan(&paths, &src_dir, &dst_dir);
            let mut context = RunContext::new("move").with_flag("skip_existing", run.on_exists == "skip");
            context.roots_hint.extend(root);
            finish_plan(&config, plan, &run, context, Some(&db), &cancel)?;
        }
        Some(Commands::Rename { dir, title, year, imdbid, rename_folder, template, run }) => {
            let overrides = MetadataOverrides { title, year, imdb_id: imdbid };
            let options = RenameOptions {
                naming_template: template.unwrap_or_else(|| config.naming_template.clone()),
                rename_folder,
            };
            let plan = plan_rename(&config, &dir, &overrides, &options)?;
            let context = RunContext::new("rename")
                .with_flag("rename_folder", rename_folder)
                .with_flag("naming_template", options.naming_template.clone());
            let db = open_catalog(&config)?;
            finish_plan(&config, plan, &run, context, Some(&db), &cancel)?;
        }
        Some(Commands::Swap { a, b, no_files, no_folders, run }) => {
            let channel = open_channel(&config)?;
            let folder_a = SwapFolder { files: channel.list_files(&a)?, path: a };
            let folder_b = SwapFolder { files: channel.list_files(&b)?, path: b };
            let options = SwapOptions { swap_files: !no_files, swap_folders: !no_folders };
            let tmp_token = chrono::Utc::now().format("%Y%m%d%H%M%S").to_string();
            let plan = build_swap_plan(
                &folder_a,
                &folder_b,
                options,
                &config.grouping_rules(),
                &config.sandbox(),
                &tmp_token,
            )?;
            let context = RunContext::new("swap")
                .with_flag("swap_files", options.swap_files)
                .with_flag("swap_folders", options.swap_folders);
            let db = open_catalog(&config)?;
            finish_plan(&config, plan, &run, context, Some(&db), &cancel)?;
        }
        Some(Commands::Mkdirs { list_file, remote_root, run }) => {
            let plan = plan_mkdirs(&config, &list_file, &remote_root)?;
            let context = RunContext::new("create_dirs").with_flag("remote_root", remote_root);
            finish_plan(&config, plan, &run, context, None, &cancel)?;
        }
        Some(Commands::Link { master_root, lib_root, categories, sidecars, run }) => {
            let policy: SidecarPolicy = sidecars.parse()?;
            let sandbox = config.sandbox();
            sandbox.check(&master_root)?;
            sandbox.check(&lib_root)?;
            let db = open_catalog(&config)?;
            let paths = db.files_under_dir(None, &master_root, &config.media_exts(), PLAN_SOURCE_LIMIT)?;
            let groups = group_media_files(&paths, &config.grouping_rules());
            let plan = build_library_link_plan(&groups, &master_root, &lib_root, &categories, policy, &sandbox);
            let mut context = RunContext::new("hardlinks")
                .with_flag("categories", categories.clone())
                .with_flag("sidecar_policy", sidecars);
            context.roots_hint.push(lib_root);
            finish_plan(&config, plan, &run, context, Some(&db), &cancel)?;
        }
        Some(Commands::History { command }) => run_history(&config, command, &cancel)?,
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", config);
        }
        None => {
            let _ = Cli::command().print_long_help();
        }
    }

    Ok(())
}

fn open_catalog(config: &AppConfig) -> anyhow::Result<Database> {
    Database::open(&config.db_path).with_context(|| format!("opening catalog {}", config.db_path))
}

fn open_channel(config: &AppConfig) -> anyhow::Result<ProcessChannel> {
    if config.connection.local {
        return Ok(ProcessChannel::local());
    }
    Ok(ProcessChannel::from_profile(&config.connection)?)
}

fn run_scan(config: &AppConfig, root: &str, all_files: bool, cancel: &CancellationToken) -> anyhow::Result<()> {
    config.sandbox().check(root)?;
    let channel = open_channel(config)?;
    let db = open_catalog(config)?;
    let reporter = CliReporter::new();

    let outcome = scan_into_catalog(root, &config.media_exts(), all_files, &channel, &db, &reporter, cancel)?;
    if outcome.exit_code != 0 {
        bail!("Scan of {} exited with status {}", root, outcome.exit_code);
    }
    info!(
        "Indexed {} paths under {} in {}",
        format!("{}", outcome.indexed).green(),
        root,
        format!("{:.2}s", outcome.duration.as_secs_f64()).green(),
    );
    Ok(())
}

fn plan_rename(
    config: &AppConfig,
    dir: &str,
    overrides: &MetadataOverrides,
    options: &RenameOptions,
) -> anyhow::Result<Plan> {
    let channel = open_channel(config)?;
    let files = channel.list_files(dir)?;
    let groups = group_media_files(&files, &config.grouping_rules());
    if groups.is_empty() {
        warn!("No media groups found in {}", dir);
    }

    let mut requests = Vec::with_capacity(groups.len());
    for group in groups {
        let nfo = match &group.nfo {
            Some(file) => match read_nfo(&channel, file.path()) {
                Ok(info) => Some(info),
                Err(e) => {
                    warn!("Ignoring NFO {}: {}", file.path(), e);
                    None
                }
            },
            None => None,
        };
        let metadata = resolve_metadata(overrides, nfo.as_ref());
        requests.push(RenameRequest { group, metadata });
    }
    Ok(build_rename_plan(&requests, &config.sandbox(), options))
}

fn read_nfo(channel: &ProcessChannel, path: &str) -> anyhow::Result<NfoInfo> {
    let text = channel.read_text(path)?;
    Ok(parse_nfo(&text)?)
}

fn plan_mkdirs(config: &AppConfig, list_file: &Path, remote_root: &str) -> anyhow::Result<Plan> {
    config.sandbox().check(remote_root)?;
    let text = fs::read_to_string(list_file).with_context(|| format!("reading {}", list_file.display()))?;
    let entries = parse_directory_entries(&text)?;
    Ok(build_mkdirs_plan(&entries, remote_root, &config.sandbox()))
}

fn run_history(config: &AppConfig, command: HistoryCommand, cancel: &CancellationToken) -> anyhow::Result<()> {
    let journal = Journal::new(&config.journal_path);
    let records = journal.read_records()?;

    match command {
        HistoryCommand::List { limit } => {
            if records.is_empty() {
                println!("No runs recorded in {}", journal.path().display());
            }
            for (index, record) in records.iter().take(limit).enumerate() {
                let mode = if record.dry_run { "dry".cyan() } else { "REAL".magenta() };
                let status = if record.succeeded() {
                    "ok".green()
                } else {
                    format!("exit {}", record.exit_code).red()
                };
                let undo = if record.undo_of.is_some() { " (undo)" } else { "" };
                println!(
                    "{:>3}  {}  {:<12} {:<5} {:<8} {:>4} ops  {}{}",
                    index, record.timestamp_utc, record.tab, mode, status, record.ops_selected, record.plan_title, undo
                );
            }
        }
        HistoryCommand::Show { index } => {
            let Some(record) = records.get(index) else {
                bail!("No journal record at index {}", index);
            };
            println!("{} {}", "Run:".bold(), record.plan_title);
            println!("  feature:   {}", record.tab);
            println!("  time:      {}", record.timestamp_utc);
            println!("  target:    {}@{}", record.username, record.host);
            println!("  dry run:   {}", record.dry_run);
            println!("  exit code: {}", record.exit_code);
            println!("  ops:       {} selected of {}", record.ops_selected, record.ops_total);
            if let Some(undo_of) = &record.undo_of {
                println!("  undoes:    {} {}", undo_of.tab, undo_of.timestamp_utc);
            }
            for (name, value) in &record.flags {
                println!("  {}: {}", name, value);
            }
            for op in nas_organizer_core::journal::ops_from_record(record) {
                println!("    {}", op.summary());
            }
            if !record.stdout.is_empty() {
                println!("{}\n{}", "stdout:".bold(), record.stdout);
            }
            if !record.stderr.is_empty() {
                println!("{}\n{}", "stderr:".bold(), record.stderr.red());
            }
        }
        HistoryCommand::Undo { index, strict, run } => {
            let Some(record) = records.get(index) else {
                bail!("No journal record at index {}", index);
            };
            if let UndoReadiness::FailedRun(code) = undo_readiness(record)? {
                let prompt = format!("Run {} exited with status {}. Build an undo plan anyway?", index, code);
                if !prompt_confirm(&prompt, Some(false))? {
                    info!("Cancelled");
                    return Ok(());
                }
            }
            if run.on_exists != "error" {
                info!("Undo scripts always stop on an existing destination");
            }
            let (plan, skipped) = build_undo_plan_for_record(record, strict);
            for message in &skipped {
                println!("{}", message.yellow());
            }
            if plan.is_empty() {
                println!("Nothing to undo.");
                return Ok(());
            }
            let context = RunContext::new("history_undo").with_undo_of(record.undo_ref());
            let db = open_catalog(config)?;
            finish_plan_with(config, plan, &run, UNDO_ON_EXISTS, context, Some(&db), cancel)?;
        }
    }
    Ok(())
}

fn print_plan(plan: &Plan) {
    println!(
        "{} {} ({} of {} selected)",
        "Plan:".bold(),
        plan.title,
        plan.count_selected(),
        plan.len()
    );
    for warning in &plan.warnings {
        println!("  {} {}", "!".yellow(), warning.yellow());
    }
    for (index, op) in plan.operations.iter().enumerate() {
        let mark = if op.selected { "[x]".green() } else { "[ ]".dimmed() };
        println!("{:>4} {} {}", index, mark, op.summary());
        if !op.warning.is_empty() {
            println!("         {}", op.warning.yellow());
        }
    }
}

fn finish_plan(
    config: &AppConfig,
    plan: Plan,
    run: &RunArgs,
    context: RunContext,
    catalog: Option<&Database>,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let on_exists: OnExists = run.on_exists.parse()?;
    finish_plan_with(config, plan, run, on_exists, context, catalog, cancel)
}

/// Print the plan and its script, then run it when `--execute` is given and
/// every confirmation passes.
fn finish_plan_with(
    config: &AppConfig,
    mut plan: Plan,
    run: &RunArgs,
    on_exists: OnExists,
    context: RunContext,
    catalog: Option<&Database>,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    for &index in &run.skip {
        if !plan.set_selected(index, false) {
            warn!("--skip {}: no such operation", index);
        }
    }

    let dry_run = !run.real && config.default_dry_run;
    let options = config.script_options(dry_run, on_exists);

    print_plan(&plan);
    let script = generate_bash_script(&plan, &options)?;
    println!("\n{}\n{}", "Script:".bold(), script.dimmed());

    let channel = open_channel(config)?;
    if run.powershell {
        println!("{}\n{}", "PowerShell:".bold(), channel.powershell_preview(&script));
    }

    if !run.execute {
        info!("Not executed; pass --execute to run this plan");
        return Ok(());
    }
    let selected = plan.count_selected();
    if selected == 0 {
        warn!("No operations selected; nothing to run");
        return Ok(());
    }
    if plan.has_collisions()
        && !prompt_confirm("The plan has destination collisions. Run anyway?", Some(false))?
    {
        info!("Cancelled");
        return Ok(());
    }
    if !dry_run && selected >= config.mass_confirm_threshold {
        let prompt = format!(
            "About to run {} operations for real. Type {} to continue",
            selected, MASS_CONFIRM_WORD
        );
        if prompt_text(&prompt)? != MASS_CONFIRM_WORD {
            info!("Cancelled by mass confirmation");
            return Ok(());
        }
    }

    let journal = Journal::new(&config.journal_path);
    let mut runner = PlanRunner::new(&journal);
    if let Some(db) = catalog {
        runner = runner.with_catalog(db);
    }
    let reporter = CliReporter::new();
    cancel.reset();
    let outcome = runner.run(&plan, &options, &context, &channel, &reporter, cancel)?;

    if !outcome.journaled {
        warn!("Run was not written to {}", journal.path().display());
    }
    if !outcome.success() {
        bail!("Script exited with status {}", outcome.exit_code);
    }
    info!(
        "{} operation(s) {} in {}",
        selected,
        if dry_run { "simulated" } else { "executed" },
        format!("{:.2}s", outcome.duration.as_secs_f64()).green(),
    );
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}

fn prompt_text(prompt: &str) -> io::Result<String> {
    let mut input = String::new();
    print!("{}: ", prompt);
    io::stdout().flush()?;
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
