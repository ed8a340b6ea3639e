use thiserror::Error;

use crate::paths::{has_parent_component, normalize_posix_path};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SandboxViolation {
    #[error("Remote path must be absolute: {0}")]
    NotAbsolute(String),
    #[error("Remote path contains '..' traversal: {0}")]
    Traversal(String),
    #[error("No allowed roots configured; set at least one sandbox root")]
    NoRoots,
    #[error("Path is outside allowed roots: {0}")]
    OutsideRoots(String),
}

/// Client-side root sandbox for remote POSIX paths.
///
/// This check is preventive only. Generated scripts re-validate every path
/// against the same roots on the remote host.
#[derive(Debug, Clone, Default)]
pub struct Sandbox {
    allowed_roots: Vec<String>,
}

impl Sandbox {
    pub fn new<S: AsRef<str>>(allowed_roots: &[S]) -> Self {
        Self {
            allowed_roots: allowed_roots.iter().map(|r| r.as_ref().to_string()).collect(),
        }
    }

    /// Absolute, trailing-slash-terminated roots. Relative or empty entries are
    /// dropped.
    pub fn normalized_roots(&self) -> Vec<String> {
        let mut roots = Vec::new();
        for root in &self.allowed_roots {
            let normalized = normalize_posix_path(root);
            if !normalized.starts_with('/') {
                continue;
            }
            let with_slash = if normalized.ends_with('/') {
                normalized
            } else {
                format!("{}/", normalized)
            };
            if !roots.contains(&with_slash) {
                roots.push(with_slash);
            }
        }
        roots
    }

    pub fn check(&self, path: &str) -> Result<(), SandboxViolation> {
        let normalized = normalize_posix_path(path);
        if !normalized.starts_with('/') {
            return Err(SandboxViolation::NotAbsolute(path.to_string()));
        }
        // Traversal is rejected before any root matching.
        if has_parent_component(&normalized) {
            return Err(SandboxViolation::Traversal(path.to_string()));
        }

        let roots = self.normalized_roots();
        if roots.is_empty() {
            return Err(SandboxViolation::NoRoots);
        }
        if roots.iter().any(|root| normalized.starts_with(root.as_str())) {
            Ok(())
        } else {
            Err(SandboxViolation::OutsideRoots(path.to_string()))
        }
    }

    pub fn check_all<'a, I>(&self, paths: I) -> Result<(), SandboxViolation>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for path in paths {
            self.check(path)?;
        }
        Ok(())
    }
}
