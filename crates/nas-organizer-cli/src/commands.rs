use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "nas-organizer")]
#[command(about = "Plan, review and run file reorganizations on a NAS over SSH", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options shared by every command that produces a plan.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Run the generated script instead of only printing it
    #[arg(long)]
    pub execute: bool,
    /// Disable dry-run for this execution
    #[arg(long)]
    pub real: bool,
    /// Behaviour when a destination already exists
    #[arg(long, default_value = "skip", value_parser = ["skip", "error"])]
    pub on_exists: String,
    /// Deselect the operation at this plan index (repeatable)
    #[arg(long = "skip", value_name = "INDEX")]
    pub skip: Vec<usize>,
    /// Also print a PowerShell command that pipes the script to the NAS
    #[arg(long)]
    pub powershell: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Index media files below a remote root into the local catalog
    Scan {
        root: String,
        /// Index every file, not only configured media extensions
        #[arg(long)]
        all_files: bool,
    },
    /// Search the catalog by substring
    Search {
        term: String,
        #[arg(long)]
        root: Option<String>,
        /// Extension filter (repeatable)
        #[arg(long = "ext")]
        exts: Vec<String>,
        #[arg(long, default_value_t = 200)]
        limit: i64,
    },
    /// Export every cataloged row of a root
    Export {
        root: String,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value = "csv", value_parser = ["csv", "jsonl"])]
        format: String,
    },
    /// Move cataloged files below one directory into another
    Move {
        src_dir: String,
        dst_dir: String,
        #[arg(long)]
        root: Option<String>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Rename the media groups of a folder to the naming template
    Rename {
        dir: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        year: Option<String>,
        #[arg(long)]
        imdbid: Option<String>,
        /// Also rename the folder when its name matches the old stem
        #[arg(long)]
        rename_folder: bool,
        /// Override the configured naming template
        #[arg(long)]
        template: Option<String>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Swap the names of two sibling folders and their media files
    Swap {
        a: String,
        b: String,
        /// Do not swap file stems
        #[arg(long)]
        no_files: bool,
        /// Do not swap folder names
        #[arg(long)]
        no_folders: bool,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Create directories listed in a local text or CSV file
    Mkdirs {
        list_file: PathBuf,
        remote_root: String,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Hardlink cataloged videos into library category folders
    Link {
        master_root: String,
        lib_root: String,
        /// Category folder below the library root (repeatable)
        #[arg(long = "category", required = true)]
        categories: Vec<String>,
        #[arg(long, default_value = "none", value_parser = ["none", "link", "copy"])]
        sidecars: String,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Inspect past runs and undo them
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// List journal records, newest first
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show one record with its operations and output
    Show { index: usize },
    /// Build and optionally run the inverse of a record. Dry-run records are
    /// refused and the script always stops on an existing destination.
    Undo {
        index: usize,
        /// Report links and copies as unsupported instead of skipped
        #[arg(long)]
        strict: bool,
        #[command(flatten)]
        run: RunArgs,
    },
}
