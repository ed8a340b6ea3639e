use serde::{Deserialize, Serialize};

use crate::paths::split_remote_path;

/// One cataloged remote file. `root` is the scan root that discovered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRow {
    pub path: String,
    pub dir: String,
    pub name: String,
    pub ext: String,
    pub root: String,
    pub scanned_at: String,
}

impl CatalogRow {
    pub fn from_path(path: &str, root: &str, scanned_at: &str) -> Self {
        let (dir, name, ext) = split_remote_path(path);
        Self {
            path: path.to_string(),
            dir,
            name,
            ext,
            root: root.to_string(),
            scanned_at: scanned_at.to_string(),
        }
    }
}

/// Timestamp format stored in `scanned_at` and journal records.
pub fn utc_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
