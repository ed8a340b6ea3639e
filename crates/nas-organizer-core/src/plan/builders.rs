//! Plan construction for each reorganization workflow.
//!
//! Builders are pure: callers fetch file lists (from the catalog or a remote
//! listing) and pass them in. Every builder applies collision warnings before
//! returning.

use std::collections::HashSet;

use tracing::{debug, info};

use super::{Operation, OperationKind, Plan};
use crate::error::{Error, Result};
use crate::media::grouping::{group_media_files, GroupingRules, MediaGroup};
use crate::media::naming::{
    first_year, is_valid_imdb_id, render_stem, sanitize_title, sidecar_suffix,
    DEFAULT_NAMING_TEMPLATE,
};
use crate::media::nfo::NfoInfo;
use crate::paths::{file_name, join_posix, normalize_posix_path, parent_dir, relative_to};
use crate::sandbox::Sandbox;

pub const SWAP_TMP_MARKER: &str = "__JFO_SWAP_TMP__";
pub const SWAP_PLAN_WARNING: &str =
    "Swap operations must be executed together; deselecting single rows can leave folders inconsistent";
const UNRECOGNIZED_SIDECAR: &str = "Unrecognized sidecar name; skipped";
const ALREADY_MATCHES: &str = "Already matches; skipped";

// ── Move ────────────────────────────────────────────────────────

/// Move every path below `src_dir` to the same relative location under
/// `dst_dir`. Paths outside `src_dir` are ignored.
pub fn build_move_plan<S: AsRef<str>>(paths: &[S], src_dir: &str, dst_dir: &str) -> Plan {
    let src_prefix = normalize_posix_path(src_dir);
    let dst_prefix = normalize_posix_path(dst_dir);

    let mut plan = Plan::new("Move");
    for path in paths {
        let path = path.as_ref();
        if let Some(rel) = relative_to(path, &src_prefix) {
            plan.push(Operation::move_to(path, join_posix(&dst_prefix, rel), ""));
        }
    }
    plan.apply_collision_warnings();
    info!("Move plan: {} ops from {} to {}", plan.len(), src_prefix, dst_prefix);
    plan
}

// ── Rename ──────────────────────────────────────────────────────

/// User-supplied values that take precedence over NFO metadata.
#[derive(Debug, Clone, Default)]
pub struct MetadataOverrides {
    pub title: Option<String>,
    pub year: Option<String>,
    pub imdb_id: Option<String>,
}

/// Fully resolved naming inputs for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    pub title: String,
    pub year: i32,
    pub imdb_id: String,
}

/// Merge manual overrides with NFO metadata. Overrides win field by field; the
/// NFO fills whatever is missing. `Err` carries the warning for the group.
pub fn resolve_metadata(
    overrides: &MetadataOverrides,
    nfo: Option<&NfoInfo>,
) -> std::result::Result<ResolvedName, String> {
    let mut title = overrides
        .title
        .as_deref()
        .map(sanitize_title)
        .filter(|t| !t.is_empty());
    let mut year = overrides.year.as_deref().and_then(first_year);
    let mut imdb_id = overrides
        .imdb_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    if let Some(info) = nfo {
        if title.is_none() {
            title = info.preferred_title().map(sanitize_title).filter(|t| !t.is_empty());
        }
        if year.is_none() {
            year = info.year;
        }
        if imdb_id.is_none() {
            imdb_id = info.imdb_id.clone();
        }
    }

    match (title, year, imdb_id) {
        (Some(title), Some(year), Some(imdb_id)) => {
            if is_valid_imdb_id(&imdb_id) {
                Ok(ResolvedName { title, year, imdb_id })
            } else {
                Err("Invalid imdbid".to_string())
            }
        }
        _ => Err("Missing title/year/imdbid".to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct RenameOptions {
    pub naming_template: String,
    /// Also rename the containing folder when its name matches the old stem.
    pub rename_folder: bool,
}

impl Default for RenameOptions {
    fn default() -> Self {
        Self {
            naming_template: DEFAULT_NAMING_TEMPLATE.to_string(),
            rename_folder: false,
        }
    }
}

/// One media group and the outcome of resolving its metadata.
#[derive(Debug, Clone)]
pub struct RenameRequest {
    pub group: MediaGroup,
    pub metadata: std::result::Result<ResolvedName, String>,
}

fn sandboxed(sandbox: &Sandbox, op: Operation) -> Operation {
    let violation = op.paths().find_map(|p| sandbox.check(p).err());
    match violation {
        Some(violation) => op.deselected().with_warning(violation.to_string()),
        None => op,
    }
}

/// Rename every member of a group from `old_stem` to `new_stem` in place,
/// keeping each member's suffix.
fn stem_rename_ops(group: &MediaGroup, old_stem: &str, new_stem: &str, sandbox: &Sandbox) -> Vec<Operation> {
    let mut ops = Vec::new();
    for file in group.all_files() {
        let src = file.path();
        let Some(suffix) = sidecar_suffix(file.name(), old_stem) else {
            ops.push(Operation::rename(src, src, "").deselected().with_warning(UNRECOGNIZED_SIDECAR));
            continue;
        };
        let dst = join_posix(&group.directory, &format!("{}{}", new_stem, suffix));
        if dst == src {
            ops.push(Operation::rename(src, dst, "").deselected().with_warning(ALREADY_MATCHES));
            continue;
        }
        ops.push(sandboxed(sandbox, Operation::rename(src, dst, "")));
    }
    ops
}

fn folder_matches_stem(dir_name: &str, stem: &str) -> bool {
    let dir_low = dir_name.to_lowercase();
    let stem_low = stem.to_lowercase();
    dir_low == stem_low || stem_low.starts_with(&dir_low) || dir_low.starts_with(&stem_low)
}

/// Rename media groups to the naming template. Groups whose metadata could
/// not be resolved contribute a plan warning and no operations. Folder
/// renames, when enabled, are appended after all file renames.
pub fn build_rename_plan(requests: &[RenameRequest], sandbox: &Sandbox, options: &RenameOptions) -> Plan {
    let mut plan = Plan::new("Rename");
    let mut dir_ops = Vec::new();
    let mut dirs_renamed: HashSet<String> = HashSet::new();

    for request in requests {
        let group = &request.group;
        let Some(video) = &group.video else {
            continue;
        };
        let resolved = match &request.metadata {
            Ok(resolved) => resolved,
            Err(warning) => {
                plan.add_warning(format!("{}: {}", group.display_name(), warning));
                continue;
            }
        };

        let new_stem = render_stem(&options.naming_template, &resolved.title, resolved.year, &resolved.imdb_id);
        let old_stem = video.stem();
        debug!("Renaming group '{}' to '{}'", old_stem, new_stem);
        plan.extend(stem_rename_ops(group, old_stem, &new_stem, sandbox));

        if options.rename_folder && !dirs_renamed.contains(&group.directory) {
            let dir_name = file_name(&group.directory);
            if folder_matches_stem(dir_name, old_stem) {
                let new_dir = join_posix(&parent_dir(&group.directory), &new_stem);
                if new_dir != group.directory {
                    dir_ops.push(sandboxed(
                        sandbox,
                        Operation::rename(group.directory.clone(), new_dir, "folder"),
                    ));
                    dirs_renamed.insert(group.directory.clone());
                }
            }
        }
    }

    plan.extend(dir_ops);
    plan.apply_collision_warnings();
    if plan.count_selected() == 0 && !plan.is_empty() {
        plan.add_warning("Plan has 0 selected ops; see operation warnings");
    }
    info!("Rename plan: {} ops ({} selected)", plan.len(), plan.count_selected());
    plan
}

// ── Swap ────────────────────────────────────────────────────────

/// A folder taking part in a swap and the files it contains.
#[derive(Debug, Clone)]
pub struct SwapFolder {
    pub path: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SwapOptions {
    pub swap_files: bool,
    pub swap_folders: bool,
}

fn single_video_group(folder: &SwapFolder, rules: &GroupingRules) -> Result<MediaGroup> {
    let mut groups: Vec<MediaGroup> = group_media_files(&folder.files, rules)
        .into_iter()
        .filter(|g| g.video.is_some() && g.directory == folder.path)
        .collect();
    if groups.len() != 1 {
        return Err(Error::Other(format!(
            "Expected 1 video group in {}, got {}",
            folder.path,
            groups.len()
        )));
    }
    Ok(groups.remove(0))
}

/// Swap the names of two sibling folders and/or the stems of the single video
/// group inside each. File renames come first, then the three-step folder
/// swap through `<A>.__JFO_SWAP_TMP__<tmp_token>`.
pub fn build_swap_plan(
    a: &SwapFolder,
    b: &SwapFolder,
    options: SwapOptions,
    rules: &GroupingRules,
    sandbox: &Sandbox,
    tmp_token: &str,
) -> Result<Plan> {
    if !options.swap_files && !options.swap_folders {
        return Err(Error::Other("Nothing to swap: enable file or folder swapping".to_string()));
    }
    let a_path = normalize_posix_path(&a.path);
    let b_path = normalize_posix_path(&b.path);
    sandbox.check(&a_path)?;
    sandbox.check(&b_path)?;
    if a_path == b_path {
        return Err(Error::Other("Cannot swap a folder with itself".to_string()));
    }
    let parent = parent_dir(&a_path);
    if parent != parent_dir(&b_path) {
        return Err(Error::Other(format!(
            "Folders must share a parent to swap names (A parent: {}, B parent: {})",
            parent,
            parent_dir(&b_path)
        )));
    }

    let name_a = file_name(&a_path).to_string();
    let name_b = file_name(&b_path).to_string();

    let mut plan = Plan::new("Swap");
    plan.add_warning(SWAP_PLAN_WARNING);

    if options.swap_files {
        let folder_a = SwapFolder { path: a_path.clone(), files: a.files.clone() };
        let folder_b = SwapFolder { path: b_path.clone(), files: b.files.clone() };
        let group_a = single_video_group(&folder_a, rules)?;
        let group_b = single_video_group(&folder_b, rules)?;
        let stem_a = group_a.base_stem.clone();
        let stem_b = group_b.base_stem.clone();
        plan.extend(stem_rename_ops(&group_a, &stem_a, &name_b, sandbox));
        plan.extend(stem_rename_ops(&group_b, &stem_b, &name_a, sandbox));
    }

    if options.swap_folders {
        let tmp = join_posix(&parent, &format!("{}.{}{}", name_a, SWAP_TMP_MARKER, tmp_token));
        plan.push(Operation::rename(a_path.clone(), tmp.clone(), "swap: A -> tmp"));
        plan.push(Operation::rename(b_path.clone(), a_path.clone(), "swap: B -> A"));
        plan.push(Operation::rename(tmp, b_path.clone(), "swap: tmp -> B"));
    }

    plan.apply_collision_warnings();
    info!("Swap plan: {} <-> {} ({} ops)", a_path, b_path, plan.len());
    Ok(plan)
}

// ── Create directories ──────────────────────────────────────────

/// Parse directory entries from a list file. When any of the first five
/// non-empty lines contains `;` the input is read as CSV and the first column
/// is used. Blank lines and `#` comments are skipped.
pub fn parse_directory_entries(text: &str) -> Result<Vec<String>> {
    let is_csv = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(5)
        .any(|l| l.contains(';'));

    let mut entries = Vec::new();
    if is_csv {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .from_reader(text.as_bytes());
        for record in reader.records() {
            let record = record?;
            if let Some(first) = record.get(0).map(str::trim).filter(|s| !s.is_empty()) {
                entries.push(first.to_string());
            }
        }
    } else {
        entries.extend(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_string),
        );
    }
    Ok(entries)
}

/// One `mkdir` per relative entry under `remote_root`. Entries failing the
/// sandbox are kept deselected with the violation as warning.
pub fn build_mkdirs_plan<S: AsRef<str>>(entries: &[S], remote_root: &str, sandbox: &Sandbox) -> Plan {
    let mut plan = Plan::new("Create directories");
    for entry in entries {
        let rel = entry.as_ref().trim().trim_start_matches('/');
        if rel.is_empty() {
            continue;
        }
        let dst = normalize_posix_path(&join_posix(remote_root, rel));
        plan.push(sandboxed(sandbox, Operation::mkdir(dst, "")));
    }
    plan.apply_collision_warnings();
    plan
}

// ── Library hardlinks ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SidecarPolicy {
    #[default]
    None,
    Link,
    Copy,
}

impl std::str::FromStr for SidecarPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Ok(SidecarPolicy::None),
            "link" | "hardlink" => Ok(SidecarPolicy::Link),
            "copy" => Ok(SidecarPolicy::Copy),
            other => Err(Error::Other(format!("Unknown sidecar policy: {}", other))),
        }
    }
}

fn library_destination(path: &str, master_root: &str, lib_root: &str, category: &str) -> String {
    let rel = relative_to(path, master_root).unwrap_or_else(|| file_name(path));
    join_posix(&join_posix(lib_root, category), rel)
}

/// Hardlink each group's video into `lib_root/<category>/<path relative to
/// master_root>` for every category. Category directories are created first.
/// Operations failing the sandbox are kept deselected with the violation as
/// warning.
pub fn build_library_link_plan(
    groups: &[MediaGroup],
    master_root: &str,
    lib_root: &str,
    categories: &[String],
    policy: SidecarPolicy,
    sandbox: &Sandbox,
) -> Plan {
    let master_root = normalize_posix_path(master_root);
    let lib_root = normalize_posix_path(lib_root);
    let mut plan = Plan::new("Hardlinks");

    for category in categories {
        plan.push(sandboxed(sandbox, Operation::mkdir(join_posix(&lib_root, category), "category")));
    }

    for group in groups {
        let Some(video) = &group.video else {
            continue;
        };
        for category in categories {
            let dst = library_destination(video.path(), &master_root, &lib_root, category);
            plan.push(sandboxed(sandbox, Operation::link(video.path(), dst, category.clone())));

            let sidecar_kind = match policy {
                SidecarPolicy::None => continue,
                SidecarPolicy::Link => OperationKind::Link,
                SidecarPolicy::Copy => OperationKind::Copy,
            };
            for sidecar in &group.sidecars {
                let dst = library_destination(sidecar.path(), &master_root, &lib_root, category);
                plan.push(sandboxed(
                    sandbox,
                    Operation::transfer(sidecar_kind, sidecar.path(), dst, category.clone()),
                ));
            }
        }
    }

    plan.apply_collision_warnings();
    info!("Hardlink plan: {} groups into {} categories", groups.len(), categories.len());
    plan
}
