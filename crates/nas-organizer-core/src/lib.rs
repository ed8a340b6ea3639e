pub mod catalog;
pub mod config;
pub mod error;
pub mod journal;
pub mod media;
pub mod paths;
pub mod plan;
pub mod progress;
pub mod quoting;
pub mod remote;
pub mod runner;
pub mod sandbox;
pub mod script;
pub mod storage;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use journal::{Journal, JournalRecord};
pub use plan::{Operation, OperationKind, Plan};
pub use progress::{RunReporter, SilentReporter};
pub use remote::{CancellationToken, ProcessChannel, RemoteChannel};
pub use runner::{scan_into_catalog, PlanRunner, RunContext, RunOutcome, ScanOutcome};
pub use sandbox::Sandbox;
pub use script::{generate_bash_script, OnExists, ScriptOptions};
pub use storage::Database;
