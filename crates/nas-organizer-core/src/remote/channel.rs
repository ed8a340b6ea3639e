use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::quoting::bash_quote;

/// Exit status reported when the real one cannot be determined, e.g. after a
/// forced cancellation.
pub const UNKNOWN_EXIT_STATUS: i32 = 255;

/// Shared cooperative cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

/// Captured result of a short, non-streaming command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    pub exit_status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// An established session to the host that owns the files.
///
/// Implementations must invoke the line callbacks on the calling thread, flush
/// a trailing line without newline when a stream closes, and return
/// [`UNKNOWN_EXIT_STATUS`] promptly once `cancel` is set.
pub trait RemoteChannel {
    fn exec_command(&self, command: &str) -> Result<ExecResult>;

    fn exec_script_streaming(
        &self,
        script: &str,
        on_stdout: &mut dyn FnMut(&str),
        on_stderr: &mut dyn FnMut(&str),
        cancel: &CancellationToken,
    ) -> Result<i32>;

    /// Host label recorded in the journal.
    fn host(&self) -> String;

    /// Remote user recorded in the journal.
    fn username(&self) -> String;

    /// Read a small remote text file, e.g. an `.nfo`.
    fn read_text(&self, path: &str) -> Result<String> {
        let result = self.exec_command(&format!("cat -- {}", bash_quote(path)?))?;
        if !result.success() {
            return Err(Error::Channel(format!(
                "cat {} exited {}: {}",
                path,
                result.exit_status,
                result.stderr.trim()
            )));
        }
        Ok(result.stdout)
    }

    /// Non-recursive file listing of a remote directory.
    fn list_files(&self, dir: &str) -> Result<Vec<String>> {
        let command = format!(
            "find {} -mindepth 1 -maxdepth 1 -type f -print",
            bash_quote(dir)?
        );
        let result = self.exec_command(&command)?;
        if !result.success() {
            return Err(Error::Channel(format!(
                "listing {} exited {}: {}",
                dir,
                result.exit_status,
                result.stderr.trim()
            )));
        }
        let mut files: Vec<String> = result
            .stdout
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!clone.is_cancelled());
    }
}
