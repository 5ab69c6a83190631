//! `pidkill`: terminate processes by PID.
//!
//! Input: `{"<logical name>": [<pid>, ...], ...}`. Every PID must be in
//! `[2, 65535]`; the first out-of-range value aborts the call before any
//! process is signalled. Each PID is then looked up and killed, and its
//! outcome is recorded under its logical name: the lookup error, the kill
//! error, or `"killed"`.

use std::collections::BTreeMap;

use mig_core::module::{Module, ModuleResults};
use mig_core::ModuleError;
use serde::Deserialize;
use tracing::debug;

pub const NAME: &str = "pidkill";
pub const MIN_PID: i64 = 2;
pub const MAX_PID: i64 = 65535;

/// Status recorded for a PID that was successfully killed.
pub const KILLED: &str = "killed";

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// PIDs grouped by a caller-chosen logical name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Parameters {
    pub elements: BTreeMap<String, Vec<i64>>,
}

impl Parameters {
    /// Reject the first PID outside `[MIN_PID, MAX_PID]`, naming its group.
    pub fn validate(&self) -> Result<(), ModuleError> {
        for (name, pids) in &self.elements {
            if let Some(pid) = pids.iter().find(|p| !(MIN_PID..=MAX_PID).contains(*p)) {
                return Err(ModuleError::InvalidParameter {
                    name: name.clone(),
                    value: pid.to_string(),
                    reason: format!("is not a PID in the range [{MIN_PID}:{MAX_PID}]"),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ProcessTable
// ---------------------------------------------------------------------------

/// Host process operations used by [`PidKill`].
pub trait ProcessTable: Send + Sync {
    /// Confirm a process with `pid` exists.
    fn find(&self, pid: i32) -> Result<(), String>;

    /// Forcefully terminate `pid`.
    fn kill(&self, pid: i32) -> Result<(), String>;
}

/// The operating system's process table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcesses;

#[cfg(unix)]
impl ProcessTable for SystemProcesses {
    fn find(&self, pid: i32) -> Result<(), String> {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        // Signal 0 probes for existence. EPERM still means the process exists;
        // the kill itself will report the permission error.
        match kill(Pid::from_raw(pid), None) {
            Ok(()) | Err(Errno::EPERM) => Ok(()),
            Err(e) => Err(format!("find process {pid}: {}", e.desc())),
        }
    }

    fn kill(&self, pid: i32) -> Result<(), String> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        kill(Pid::from_raw(pid), Signal::SIGKILL)
            .map_err(|e| format!("kill process {pid}: {}", e.desc()))
    }
}

#[cfg(not(unix))]
impl ProcessTable for SystemProcesses {
    fn find(&self, pid: i32) -> Result<(), String> {
        Err(format!(
            "find process {pid}: process lookup is not supported on this platform"
        ))
    }

    fn kill(&self, pid: i32) -> Result<(), String> {
        Err(format!(
            "kill process {pid}: process termination is not supported on this platform"
        ))
    }
}

// ---------------------------------------------------------------------------
// PidKill
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PidKill<P = SystemProcesses> {
    processes: P,
}

impl PidKill<SystemProcesses> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: ProcessTable> PidKill<P> {
    pub fn with_processes(processes: P) -> Self {
        Self { processes }
    }

    fn terminate(&self, pid: i32) -> Result<String, String> {
        self.processes.find(pid)?;
        self.processes.kill(pid)?;
        Ok(KILLED.to_string())
    }
}

impl<P: ProcessTable> Module for PidKill<P> {
    type Parameters = Parameters;

    fn name(&self) -> &'static str {
        NAME
    }

    fn check(&self, params: &Parameters) -> Result<(), ModuleError> {
        params.validate()
    }

    fn execute(&self, params: Parameters) -> ModuleResults {
        let mut results = ModuleResults::new();
        for (name, pids) in &params.elements {
            for &pid in pids {
                // validate() bounds every pid to [2, 65535]
                let outcome = i32::try_from(pid)
                    .map_err(|e| e.to_string())
                    .and_then(|pid| self.terminate(pid));
                debug!(group = %name, pid, ?outcome, "pidkill target");
                results.record(name, pid.to_string(), outcome);
            }
        }
        results
    }
}
