// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Cooperative cancellation
//!
//! A run has a single, one-way stop flag and a registry of the processes that
//! are currently running. Phase runners and step executors read the flag
//! before starting new work; process supervisors wait on the flag while their
//! child runs and perform the terminate-then-kill sequence when it flips.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why a run stopped issuing work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Someone called `request_stop`
    UserRequested,
    /// A concurrent step failed and the run does not continue on error
    Halted { step: String },
}

/// Shared stop flag plus the registry of running processes
///
/// Cloning is cheap; all clones observe the same state.
#[derive(Clone, Default)]
pub struct CancellationController {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    token: CancellationToken,
    next_id: AtomicU64,
}

#[derive(Default)]
struct State {
    reason: Option<StopReason>,
    active: HashMap<u64, ActiveProcess>,
}

#[derive(Debug, Clone)]
struct ActiveProcess {
    step: String,
    pid: Option<u32>,
}

impl CancellationController {
    /// Create an armed controller
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a stop (or halt) has been requested
    pub fn is_stop_requested(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// The reason for the stop, if one was requested
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.lock().reason.clone()
    }

    /// Request a stop on behalf of the user
    ///
    /// Returns `true` if this call performed the transition.
    pub fn request_stop(&self) -> bool {
        self.transition(StopReason::UserRequested)
    }

    /// Stop issuing work because `step` failed
    pub fn halt(&self, step: &str) -> bool {
        self.transition(StopReason::Halted {
            step: step.to_string(),
        })
    }

    fn transition(&self, reason: StopReason) -> bool {
        let mut state = self.lock();
        if state.reason.is_some() {
            debug!("Stop already requested, ignoring {:?}", reason);
            return false;
        }

        info!(?reason, active = state.active.len(), "Stop requested");
        state.reason = Some(reason);
        self.inner.token.cancel();

        for process in state.active.values() {
            info!(step = %process.step, pid = ?process.pid, "Terminating running process");
            send_terminate(process.pid);
        }

        true
    }

    /// SIGKILL every registered process group, skipping the grace period
    ///
    /// Also sets the stop flag. Returns the number of processes signalled.
    pub fn kill_active(&self) -> usize {
        self.request_stop();
        let state = self.lock();
        for process in state.active.values() {
            warn!(step = %process.step, pid = ?process.pid, "Killing running process");
            send_kill(process.pid);
        }
        state.active.len()
    }

    /// Register a running process
    ///
    /// The returned registration removes the entry when dropped. If a stop was
    /// already requested, [`ProcessRegistration::stopped_on_arrival`] is set
    /// and the caller must terminate the process itself.
    pub fn register(&self, step: &str, pid: Option<u32>) -> ProcessRegistration {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut state = self.lock();
        state.active.insert(
            id,
            ActiveProcess {
                step: step.to_string(),
                pid,
            },
        );

        ProcessRegistration {
            controller: self.clone(),
            id,
            stopped_on_arrival: state.reason.is_some(),
        }
    }

    /// Steps whose processes are currently registered
    pub fn active_steps(&self) -> Vec<String> {
        let mut steps: Vec<String> = self
            .lock()
            .active
            .values()
            .map(|p| p.step.clone())
            .collect();
        steps.sort();
        steps
    }

    /// Resolves once a stop has been requested
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await;
    }

    fn deregister(&self, id: u64) {
        self.lock().active.remove(&id);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registration of one running process; deregisters on drop
pub struct ProcessRegistration {
    controller: CancellationController,
    id: u64,
    stopped_on_arrival: bool,
}

impl ProcessRegistration {
    /// Whether the stop flag was already set when the process registered
    pub fn stopped_on_arrival(&self) -> bool {
        self.stopped_on_arrival
    }
}

impl Drop for ProcessRegistration {
    fn drop(&mut self) {
        self.controller.deregister(self.id);
    }
}

/// Ask a process group to exit (SIGTERM). Best effort.
#[cfg(unix)]
pub(crate) fn send_terminate(pid: Option<u32>) {
    send_signal(pid, nix::sys::signal::Signal::SIGTERM);
}

/// Force a process group to exit (SIGKILL). Best effort.
#[cfg(unix)]
pub(crate) fn send_kill(pid: Option<u32>) {
    send_signal(pid, nix::sys::signal::Signal::SIGKILL);
}

#[cfg(unix)]
fn send_signal(pid: Option<u32>, signal: nix::sys::signal::Signal) {
    use nix::errno::Errno;
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };

    // Children are spawned as process group leaders, so the group id is the pid
    match nix::sys::signal::killpg(Pid::from_raw(pid), signal) {
        Ok(()) => debug!(pid, %signal, "Signal sent"),
        Err(Errno::ESRCH) => debug!(pid, %signal, "Process already exited"),
        Err(e) => warn!(pid, %signal, "Failed to signal process: {}", e),
    }
}

#[cfg(not(unix))]
pub(crate) fn send_terminate(_pid: Option<u32>) {}

#[cfg(not(unix))]
pub(crate) fn send_kill(_pid: Option<u32>) {}
