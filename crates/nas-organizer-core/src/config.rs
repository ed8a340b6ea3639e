use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::path::Path;

use crate::media::grouping::{GroupingRules, DEFAULT_SIDECAR_EXTS, DEFAULT_VIDEO_EXTS};
use crate::media::naming::DEFAULT_NAMING_TEMPLATE;
use crate::sandbox::Sandbox;
use crate::script::{OnExists, ScriptOptions};

const ENV_PREFIX: &str = "NAS_ORGANIZER";
const LIST_KEYS: &[&str] = &["allowed_roots", "video_exts", "sidecar_exts"];

/// How to reach the host that owns the files.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectionProfile {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub key_path: Option<String>,
    /// Run scripts with a local `bash` instead of `ssh`.
    pub local: bool,
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 22,
            username: String::new(),
            key_path: None,
            local: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub allowed_roots: Vec<String>,
    pub default_dry_run: bool,
    pub no_overwrite: bool,
    pub mass_confirm_threshold: usize,
    pub naming_template: String,
    pub video_exts: Vec<String>,
    pub sidecar_exts: Vec<String>,
    pub db_path: String,
    pub journal_path: String,
    pub connection: ConnectionProfile,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            allowed_roots: Vec::new(),
            default_dry_run: true,
            no_overwrite: true,
            mass_confirm_threshold: 200,
            naming_template: DEFAULT_NAMING_TEMPLATE.to_string(),
            video_exts: DEFAULT_VIDEO_EXTS.iter().map(|s| s.to_string()).collect(),
            sidecar_exts: DEFAULT_SIDECAR_EXTS.iter().map(|s| s.to_string()).collect(),
            db_path: "nas_organizer.db".to_string(),
            journal_path: "journal.jsonl".to_string(),
            connection: ConnectionProfile::default(),
        }
    }
}

impl AppConfig {
    pub fn sandbox(&self) -> Sandbox {
        Sandbox::new(&self.allowed_roots)
    }

    pub fn grouping_rules(&self) -> GroupingRules {
        GroupingRules::new(&self.video_exts, &self.sidecar_exts)
    }

    /// Video and sidecar extensions together, for catalog filters and scans.
    pub fn media_exts(&self) -> Vec<String> {
        let mut exts: Vec<String> = self
            .video_exts
            .iter()
            .chain(self.sidecar_exts.iter())
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        exts.sort();
        exts.dedup();
        exts
    }

    pub fn script_options(&self, dry_run: bool, on_exists: OnExists) -> ScriptOptions {
        ScriptOptions {
            allowed_roots: self.allowed_roots.clone(),
            dry_run,
            no_overwrite: self.no_overwrite,
            on_exists,
        }
    }
}

fn environment() -> Environment {
    let mut env = Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",");
    for key in LIST_KEYS {
        env = env.with_list_parse_key(key);
    }
    env
}

/// Load `Config.{toml,json,...}` from the working directory (optional), then
/// `NAS_ORGANIZER__*` environment overrides.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(environment())
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// Load from an explicit file, without environment overrides.
pub fn load_configuration_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::from(path).required(true))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
