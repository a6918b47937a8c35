// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Process supervisor
//!
//! Runs one command as a child process, streams its output and, when the run
//! is stopped, terminates it: SIGTERM to the process group, a bounded grace
//! period, then SIGKILL.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::CommandLine;
use crate::cancel::{send_kill, send_terminate, CancellationController};
use crate::errors::{PipewrightError, PipewrightResult};

/// Everything needed to run one command
pub struct CommandRequest<'a> {
    /// Step the command belongs to (for logs and the process registry)
    pub step: &'a str,
    pub command: &'a str,
    /// Variables merged over the ambient environment
    pub env: &'a HashMap<String, String>,
    pub working_dir: &'a Path,
    pub controller: &'a CancellationController,
    /// Cleanup commands run to completion even after a stop request
    pub cancellable: bool,
}

/// Captured result of one command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was ended by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// The process was terminated because the run was stopped
    pub terminated: bool,
    pub duration: Duration,
}

impl CommandOutput {
    /// Whether the command exited on its own with code 0
    pub fn success(&self) -> bool {
        !self.terminated && self.exit_code == Some(0)
    }
}

/// Trait for command runners
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion (or termination)
    ///
    /// Errors are reserved for commands that could not be started at all.
    async fn run(&self, request: CommandRequest<'_>) -> PipewrightResult<CommandOutput>;
}

/// Runs commands as real child processes
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    grace_period: Duration,
    shell: String,
}

impl ProcessSupervisor {
    /// Time a process gets to exit after SIGTERM before it is killed
    pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

    /// Create a new supervisor
    pub fn new() -> Self {
        Self {
            grace_period: Self::DEFAULT_GRACE_PERIOD,
            shell: "sh".to_string(),
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    fn build_command(&self, line: &CommandLine) -> PipewrightResult<Command> {
        match line {
            CommandLine::Simple(argv) => {
                let (program, args) = argv.split_first().ok_or(PipewrightError::EmptyCommand)?;
                let mut cmd = Command::new(program);
                cmd.args(args);
                Ok(cmd)
            }
            CommandLine::Shell(raw) => Ok(self.shell_command(raw)),
        }
    }

    #[cfg(unix)]
    fn shell_command(&self, raw: &str) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(raw);
        cmd
    }

    #[cfg(not(unix))]
    fn shell_command(&self, raw: &str) -> Command {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(raw);
        cmd
    }

    /// Terminate-then-kill. Never fails; problems are logged.
    async fn terminate(&self, child: &mut Child, pid: Option<u32>, step: &str) -> Option<ExitStatus> {
        info!(step, ?pid, "Terminating process");
        send_terminate(pid);

        match tokio::time::timeout(self.grace_period, child.wait()).await {
            Ok(Ok(status)) => return Some(status),
            Ok(Err(e)) => warn!(step, "Failed to wait for terminated process: {}", e),
            Err(_) => warn!(
                step,
                "Process did not exit within {:?}, killing it", self.grace_period
            ),
        }

        send_kill(pid);
        if let Err(e) = child.kill().await {
            warn!(step, "Failed to kill process: {}", e);
        }
        child.wait().await.ok()
    }

    /// Wait up to the grace period for the output readers after a termination
    async fn drain_within_grace(
        &self,
        drain: &mut BoxFuture<'static, (String, String)>,
        step: &str,
    ) -> (String, String) {
        match tokio::time::timeout(self.grace_period, drain).await {
            Ok(output) => output,
            Err(_) => {
                warn!(step, "Output still open {:?} after termination, giving up", self.grace_period);
                (String::new(), String::new())
            }
        }
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

enum Waited {
    Exited(std::io::Result<ExitStatus>),
    Stopped,
}

enum Drained {
    Done((String, String)),
    Stopped,
}

#[async_trait]
impl CommandRunner for ProcessSupervisor {
    async fn run(&self, request: CommandRequest<'_>) -> PipewrightResult<CommandOutput> {
        let line = CommandLine::parse(request.command);
        if line.is_empty() {
            return Err(PipewrightError::EmptyCommand);
        }

        let mut cmd = self.build_command(&line)?;
        cmd.current_dir(request.working_dir)
            .envs(request.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group, so signals reach everything the command starts
        #[cfg(unix)]
        cmd.process_group(0);

        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| PipewrightError::launch_failed(request.command, &e))?;
        let pid = child.id();
        debug!(step = request.step, ?pid, command = %line, "Spawned process");

        let stdout = child
            .stdout
            .take()
            .map(|s| spawn_reader(s, request.step.to_string(), "stdout"));
        let stderr = child
            .stderr
            .take()
            .map(|s| spawn_reader(s, request.step.to_string(), "stderr"));

        // Held until the output is drained: a background child can keep the
        // pipes open after the leader exits and must stay reachable by a stop
        let registration = request
            .cancellable
            .then(|| request.controller.register(request.step, pid));

        let waited = match &registration {
            Some(registration) if registration.stopped_on_arrival() => Waited::Stopped,
            Some(_) => tokio::select! {
                status = child.wait() => Waited::Exited(status),
                _ = request.controller.cancelled() => Waited::Stopped,
            },
            None => Waited::Exited(child.wait().await),
        };

        let (status, mut terminated) = match waited {
            Waited::Exited(status) => (status.ok(), false),
            Waited::Stopped => (self.terminate(&mut child, pid, request.step).await, true),
        };

        let mut drain = async move { (collect(stdout).await, collect(stderr).await) }.boxed();

        let (stdout, stderr) = if terminated {
            self.drain_within_grace(&mut drain, request.step).await
        } else if registration.is_some() {
            let drained = tokio::select! {
                biased;
                output = &mut drain => Drained::Done(output),
                _ = request.controller.cancelled() => Drained::Stopped,
            };

            match drained {
                Drained::Done(output) => output,
                Drained::Stopped => {
                    info!(step = request.step, ?pid, "Stopping processes still holding output");
                    terminated = true;
                    send_terminate(pid);
                    match tokio::time::timeout(self.grace_period, &mut drain).await {
                        Ok(output) => output,
                        Err(_) => {
                            send_kill(pid);
                            self.drain_within_grace(&mut drain, request.step).await
                        }
                    }
                }
            }
        } else {
            drain.await
        };
        drop(registration);

        let exit_code = status.and_then(|s| s.code());
        debug!(step = request.step, ?exit_code, terminated, "Process finished");

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
            terminated,
            duration: start.elapsed(),
        })
    }
}

/// Read a child stream line by line, logging and capturing each line
fn spawn_reader<R>(stream: R, step: String, name: &'static str) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut captured = String::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    debug!(step = %step, stream = name, "{}", line.trim_end());
                    captured.push_str(&line);
                }
                Err(e) => {
                    warn!(step = %step, stream = name, "Failed to read output: {}", e);
                    break;
                }
            }
        }

        captured
    })
}

async fn collect(task: Option<JoinHandle<String>>) -> String {
    match task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    }
}
