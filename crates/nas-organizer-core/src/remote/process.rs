//! [`RemoteChannel`] backed by a child process: the system `ssh` client, or a
//! local `bash` when the files live on this machine.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::channel::{CancellationToken, ExecResult, RemoteChannel, UNKNOWN_EXIT_STATUS};
use crate::config::ConnectionProfile;
use crate::error::{Error, Result};
use crate::quoting::powershell_here_string;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Local,
    Ssh {
        host: String,
        port: u16,
        username: String,
        key_path: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone)]
pub struct ProcessChannel {
    transport: Transport,
}

impl ProcessChannel {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub fn local() -> Self {
        Self::new(Transport::Local)
    }

    pub fn from_profile(profile: &ConnectionProfile) -> Result<Self> {
        if profile.local {
            return Ok(Self::local());
        }
        if profile.host.trim().is_empty() {
            return Err(Error::Channel(
                "No host configured; set connection.host or connection.local".to_string(),
            ));
        }
        Ok(Self::new(Transport::Ssh {
            host: profile.host.trim().to_string(),
            port: profile.port,
            username: profile.username.trim().to_string(),
            key_path: profile.key_path.clone().filter(|k| !k.trim().is_empty()),
        }))
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    fn ssh_args(&self) -> Vec<String> {
        match &self.transport {
            Transport::Local => Vec::new(),
            Transport::Ssh { host, port, username, key_path } => {
                let mut args = vec![
                    "-p".to_string(),
                    port.to_string(),
                    "-o".to_string(),
                    "BatchMode=yes".to_string(),
                ];
                if let Some(key) = key_path {
                    args.push("-i".to_string());
                    args.push(key.clone());
                }
                if username.is_empty() {
                    args.push(host.clone());
                } else {
                    args.push(format!("{}@{}", username, host));
                }
                args
            }
        }
    }

    /// Command running `remote` through `bash -c` on the target.
    fn command_for(&self, remote: &str) -> Command {
        match &self.transport {
            Transport::Local => {
                let mut cmd = Command::new("bash");
                cmd.arg("-c").arg(remote);
                cmd
            }
            Transport::Ssh { .. } => {
                let mut cmd = Command::new("ssh");
                cmd.args(self.ssh_args()).arg("--").arg(remote);
                cmd
            }
        }
    }

    /// Command reading a script from stdin.
    fn script_command(&self) -> Command {
        match &self.transport {
            Transport::Local => {
                let mut cmd = Command::new("bash");
                cmd.arg("-s");
                cmd
            }
            Transport::Ssh { .. } => {
                let mut cmd = Command::new("ssh");
                cmd.args(self.ssh_args()).arg("--").arg("bash -s");
                cmd
            }
        }
    }

    /// Equivalent PowerShell invocation for copy-paste. Display only.
    pub fn powershell_preview(&self, script: &str) -> String {
        let target = match &self.transport {
            Transport::Local => "bash -s".to_string(),
            Transport::Ssh { .. } => format!("ssh {} -- 'bash -s'", self.ssh_args().join(" ")),
        };
        format!(
            "$script = {}\n$script | {}",
            powershell_here_string(script),
            target
        )
    }
}

fn spawn_reader<R>(source: R, stream: Stream, tx: Sender<(Stream, String)>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(source);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                // A final line without newline is returned before EOF.
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf);
                    let line = text.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send((stream, line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!("{:?} reader stopped: {}", stream, e);
                    break;
                }
            }
        }
    })
}

fn kill_child(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("kill after cancel: {}", e);
    }
    if let Err(e) = child.wait() {
        debug!("wait after cancel: {}", e);
    }
}

impl RemoteChannel for ProcessChannel {
    fn exec_command(&self, command: &str) -> Result<ExecResult> {
        debug!("exec: {}", command);
        let output = self
            .command_for(command)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::Channel(format!("failed to start command: {}", e)))?;
        Ok(ExecResult {
            exit_status: output.status.code().unwrap_or(UNKNOWN_EXIT_STATUS),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn exec_script_streaming(
        &self,
        script: &str,
        on_stdout: &mut dyn FnMut(&str),
        on_stderr: &mut dyn FnMut(&str),
        cancel: &CancellationToken,
    ) -> Result<i32> {
        let mut child = self
            .script_command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Channel(format!("failed to start script: {}", e)))?;
        info!("Streaming script ({} bytes) to {}", script.len(), self.host());

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Channel("stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Channel("stderr not captured".to_string()))?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Channel("stdin not captured".to_string()))?;

        let (tx, rx) = mpsc::channel();
        let readers = [
            spawn_reader(stdout, Stream::Stdout, tx.clone()),
            spawn_reader(stderr, Stream::Stderr, tx),
        ];

        let payload = script.as_bytes().to_vec();
        // Dropping stdin at the end of the thread signals EOF to bash.
        let writer = thread::spawn(move || {
            if let Err(e) = stdin.write_all(&payload) {
                warn!("Writing script to stdin failed: {}", e);
            }
        });

        // Drain both streams until they close.
        loop {
            if cancel.is_cancelled() {
                warn!("Cancellation requested; killing script");
                kill_child(&mut child);
                return Ok(UNKNOWN_EXIT_STATUS);
            }
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok((Stream::Stdout, line)) => on_stdout(&line),
                Ok((Stream::Stderr, line)) => on_stderr(&line),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        for reader in readers {
            if reader.join().is_err() {
                warn!("Output reader thread panicked");
            }
        }
        if writer.join().is_err() {
            warn!("Stdin writer thread panicked");
        }

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if cancel.is_cancelled() {
                kill_child(&mut child);
                return Ok(UNKNOWN_EXIT_STATUS);
            }
            thread::sleep(POLL_INTERVAL);
        };

        let code = status.code().unwrap_or(UNKNOWN_EXIT_STATUS);
        info!("Script finished with exit status {}", code);
        Ok(code)
    }

    fn host(&self) -> String {
        match &self.transport {
            Transport::Local => "localhost".to_string(),
            Transport::Ssh { host, port, .. } => format!("{}:{}", host, port),
        }
    }

    fn username(&self) -> String {
        match &self.transport {
            Transport::Local => std::env::var("USER").unwrap_or_default(),
            Transport::Ssh { username, .. } => username.clone(),
        }
    }
}
