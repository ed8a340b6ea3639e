//! Remote POSIX path helpers.
//!
//! Remote paths are plain `String`s: they never touch the local filesystem, so
//! `std::path` (which follows the *local* platform rules) is deliberately not
//! used here.

/// Collapse empty and `.` components. `..` components are kept so that callers
/// can reject them explicitly.
pub fn normalize_posix_path(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let absolute = trimmed.starts_with('/');
    let parts: Vec<&str> = trimmed
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();
    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Returns true when any component of the path is `..`.
pub fn has_parent_component(path: &str) -> bool {
    path.split('/').any(|c| c == "..")
}

/// Split a remote path into `(dir, name, ext)`. The extension is lowercase and
/// empty when the name carries no dot.
pub fn split_remote_path(path: &str) -> (String, String, String) {
    let (dir, name) = match path.rsplit_once('/') {
        Some(("", name)) => ("/".to_string(), name.to_string()),
        Some((dir, name)) => (dir.to_string(), name.to_string()),
        None => ("/".to_string(), path.to_string()),
    };
    let ext = extension_of(&name);
    (dir, name, ext)
}

/// Lowercase extension of a file name (text after the last dot).
pub fn extension_of(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => String::new(),
    }
}

/// File name without its final extension. Hidden files such as `.nfo` keep
/// their full name.
pub fn stem_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

pub fn parent_dir(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((dir, _)) => dir.to_string(),
    }
}

/// Join a relative tail onto a base directory.
pub fn join_posix(base: &str, tail: &str) -> String {
    let base = base.trim_end_matches('/');
    let tail = tail.trim_start_matches('/');
    if tail.is_empty() {
        return if base.is_empty() { "/".to_string() } else { base.to_string() };
    }
    format!("{}/{}", base, tail)
}

/// Path of `path` relative to `base`, if `path` lies strictly below it.
pub fn relative_to<'a>(path: &'a str, base: &str) -> Option<&'a str> {
    let base = base.trim_end_matches('/');
    path.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|rest| !rest.is_empty())
}
