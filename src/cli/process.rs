use std::{
    env,
    path::{Path, PathBuf},
    process::Stdio,
};

use anyhow::{anyhow, Context, Result};
use tracing::info;

use crate::agent::{agent_path, registry::terminate_processes};

fn current_agent_path() -> Result<PathBuf> {
    // The program uses the executable passed into the process. It's not the best option but it
    // will do the job in most cases.
    let client = env::current_exe().context("can't locate the dalos executable")?;
    Ok(agent_path(&client))
}

/// Stops every running agent.
pub fn stop_agents() -> Result<usize> {
    terminate_processes(&current_agent_path()?)
}

/// Starts a new agent in the background. The agent detaches by itself and replaces any older
/// instance while installing.
pub fn spawn_agent(dir: &Path, config: Option<&Path>) -> Result<()> {
    let agent = current_agent_path()?;
    let mut command = std::process::Command::new(&agent);
    command.arg("--dir").arg(dir);
    if let Some(config) = config {
        command.arg("--config").arg(config);
    }
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    info!("Spawning agent {agent:?}");
    // The agent forks and the parent returns right away.
    let status = command
        .status()
        .with_context(|| format!("failed to start {agent:?}"))?;
    if !status.success() {
        return Err(anyhow!("agent exited with {status}"));
    }
    Ok(())
}
