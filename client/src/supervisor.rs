//! Owns the analysis server child process.
//!
//! There is at most one live process. It is spawned lazily on the first
//! command, replaced on explicit restart or flag changes, and dropped when
//! its pipe breaks so that the next command starts a fresh one. Every
//! successful spawn bumps [`Supervisor::generation`].

use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use tokio::process::{Child, ChildStdin, ChildStdout, Command as ProcessCommand};

use crate::client::{Client, Transport};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::protocol::{Command, Outcome};

const SHUTDOWN_TIMEOUT_SECS: u64 = 2;

struct RunningProcess {
    child: Child,
    client: Client<ChildStdout, ChildStdin>,
}

pub struct Supervisor {
    executable: String,
    flags: Vec<String>,
    process: Option<RunningProcess>,
    generation: u64,
    /// Set after a failed spawn; cleared only by an explicit restart.
    spawn_failed: bool,
}

impl Supervisor {
    pub fn new(executable: impl Into<String>, flags: Vec<String>) -> Self {
        Self {
            executable: executable.into(),
            flags,
            process: None,
            generation: 0,
            spawn_failed: false,
        }
    }

    #[must_use]
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.executable.clone(), config.expanded_flags())
    }

    #[must_use]
    pub fn executable(&self) -> &str {
        &self.executable
    }

    #[must_use]
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    /// Whether a process has been spawned and not yet dropped.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.process.is_some()
    }

    /// Start the server unless one is already alive.
    pub fn ensure_running(&mut self) -> Result<(), BridgeError> {
        if let Some(process) = self.process.as_mut() {
            match process.child.try_wait() {
                Ok(None) => return Ok(()),
                Ok(Some(status)) => {
                    tracing::info!(generation = self.generation, %status, "server exited");
                    self.process = None;
                }
                Err(err) => {
                    tracing::warn!(generation = self.generation, "failed to poll server: {err}");
                    self.process = None;
                }
            }
        }

        if self.spawn_failed {
            return Err(BridgeError::RestartRequired);
        }
        self.spawn()
    }

    /// Terminate the current process (if any) and start a new one.
    pub async fn restart(&mut self) -> Result<(), BridgeError> {
        self.spawn_failed = false;
        self.terminate().await;
        self.spawn()
    }

    /// Terminate the current process without starting another.
    pub async fn shutdown(&mut self) {
        self.terminate().await;
    }

    pub async fn add_flags<I, S>(&mut self, flags: I) -> Result<(), BridgeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags.extend(flags.into_iter().map(Into::into));
        self.restart().await
    }

    pub async fn clear_flags(&mut self) -> Result<(), BridgeError> {
        self.flags.clear();
        self.restart().await
    }

    fn spawn(&mut self) -> Result<(), BridgeError> {
        match self.start_process() {
            Ok(process) => {
                self.generation += 1;
                tracing::info!(
                    executable = %self.executable,
                    flags = ?self.flags,
                    generation = self.generation,
                    "server started"
                );
                self.process = Some(process);
                Ok(())
            }
            Err(source) => {
                self.spawn_failed = true;
                tracing::warn!(executable = %self.executable, "failed to start server: {source:#}");
                Err(BridgeError::Spawn {
                    executable: self.executable.clone(),
                    source,
                })
            }
        }
    }

    fn start_process(&self) -> anyhow::Result<RunningProcess> {
        let resolved = which::which(&self.executable)
            .with_context(|| format!("{} not found in PATH", self.executable))?;

        let mut child = ProcessCommand::new(&resolved)
            .args(&self.flags)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning {}", resolved.display()))?;

        let stdout = child.stdout.take().context("no stdout from child")?;
        let stdin = child.stdin.take().context("no stdin from child")?;

        Ok(RunningProcess {
            child,
            client: Client::new(stdout, stdin),
        })
    }

    /// Close the pipes, kill the child and reap it.
    async fn terminate(&mut self) {
        let Some(RunningProcess { mut child, client }) = self.process.take() else {
            return;
        };
        drop(client);

        if let Err(err) = child.start_kill() {
            tracing::debug!("server already gone: {err}");
        }
        let waited =
            tokio::time::timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), child.wait()).await;
        match waited {
            Ok(Ok(status)) => {
                tracing::debug!(generation = self.generation, %status, "server stopped");
            }
            Ok(Err(err)) => tracing::debug!("failed to reap server: {err}"),
            Err(_) => {
                tracing::debug!("server didn't exit in time, killing");
                if let Err(err) = child.kill().await {
                    tracing::debug!("failed to kill server: {err}");
                }
            }
        }
    }
}

impl Transport for Supervisor {
    async fn call(&mut self, command: &Command) -> Result<Outcome, BridgeError> {
        self.ensure_running()?;
        let Some(process) = self.process.as_mut() else {
            return Err(BridgeError::Closed);
        };

        match process.client.call(command).await {
            Err(err @ (BridgeError::Closed | BridgeError::Transport(_))) => {
                tracing::warn!(
                    command = %command.label(),
                    generation = self.generation,
                    "dropping server after pipe failure: {err}"
                );
                self.terminate().await;
                Err(err)
            }
            other => other,
        }
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}
