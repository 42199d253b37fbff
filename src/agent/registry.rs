use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use sysinfo::{get_current_pid, Signal, System};
use tracing::info;

/// Lets a freshly started agent take over from older instances.
#[cfg_attr(test, mockall::automock)]
pub trait AgentRegistry {
    /// Supersedes any previously running agent right away, without waiting for open windows to
    /// close. Returns how many instances were replaced.
    fn skip_waiting(&mut self) -> Result<usize>;
}

/// Replaces agents found in the process table that run the same executable.
pub struct ProcessRegistry {
    agent_exe: PathBuf,
}

impl ProcessRegistry {
    pub fn new(agent_exe: PathBuf) -> Self {
        Self { agent_exe }
    }
}

impl AgentRegistry for ProcessRegistry {
    fn skip_waiting(&mut self) -> Result<usize> {
        terminate_processes(&self.agent_exe)
    }
}

/// Terminates every process running `exe` except the current one and its children.
pub fn terminate_processes(exe: &Path) -> Result<usize> {
    let system = System::new_all();
    let current_id = get_current_pid().map_err(|e| anyhow!("can't get current pid: {e}"))?;
    let mut terminated = 0;

    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }
        if matches!(process.parent(), Some(p) if p == current_id) {
            continue;
        }

        if process.exe().filter(|v| *v == exe).is_some() {
            info!("Terminating agent with pid {pid}");
            // This will forcefully terminate the process on Windows. Anything better will require a
            // lot more work.
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
            // Waiting for the old agent to exit, it holds the port.
            process.wait();
            terminated += 1;
        }
    }
    Ok(terminated)
}
