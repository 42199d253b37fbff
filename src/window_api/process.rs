use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use sysinfo::{get_current_pid, System};
use tracing::{debug, info};

use super::{
    command::command_from_template, window_title, WindowClient, WindowHost, WINDOW_TITLE,
};

/// Flags of the foreground client that take a value, so that the value isn't mistaken for a
/// subcommand.
const VALUE_FLAGS: [&str; 3] = ["--dir", "--config", "--endpoint"];
const WINDOW_COMMAND: &str = "checkin";

/// Finds application windows in the process table. A window is a `dalos` process running the
/// wizard, either through `dalos checkin` or through plain `dalos`.
pub struct ProcessWindowHost {
    client_exe: PathBuf,
    open_command: Vec<String>,
    focus_command: Vec<String>,
}

impl ProcessWindowHost {
    pub fn new(client_exe: PathBuf, open_command: Vec<String>, focus_command: Vec<String>) -> Self {
        Self {
            client_exe,
            open_command,
            focus_command,
        }
    }
}

/// Checks whether the arguments of a `dalos` process start the wizard.
pub fn is_window_command(cmd: &[OsString]) -> bool {
    let mut args = cmd.iter().skip(1).map(|v| v.to_string_lossy());
    while let Some(arg) = args.next() {
        if VALUE_FLAGS.contains(&arg.as_ref()) {
            args.next();
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        return arg == WINDOW_COMMAND;
    }
    true
}

fn same_exe(exe: Option<&Path>, expected: &Path) -> bool {
    exe.is_some_and(|v| v == expected)
}

impl ProcessWindowHost {
    fn focus_command_for(&self, client: &WindowClient) -> Result<tokio::process::Command> {
        let pid = client.pid.to_string();
        let title = window_title(client.pid);
        command_from_template(&self.focus_command, &[("title", &title), ("pid", &pid)])
    }
}

impl WindowHost for ProcessWindowHost {
    fn match_all(&mut self) -> Result<Vec<WindowClient>> {
        let system = System::new_all();
        let current = get_current_pid().ok();

        let mut clients = system
            .processes()
            .values()
            .filter(|p| Some(p.pid()) != current)
            .filter(|p| same_exe(p.exe(), &self.client_exe))
            .filter(|p| is_window_command(p.cmd()))
            .map(|p| WindowClient {
                pid: p.pid().as_u32(),
                started_at: p.start_time(),
            })
            .collect::<Vec<_>>();
        clients.sort_by_key(|c| (c.started_at, c.pid));
        debug!("Found windows {clients:?}");
        Ok(clients)
    }

    fn focus(&mut self, client: &WindowClient) -> Result<()> {
        let mut command = self.focus_command_for(client)?;
        command.spawn().context("failed to run focus command")?;
        info!("Focused {client}");
        Ok(())
    }

    fn open_window(&mut self, path: &str) -> Result<()> {
        let exe = self.client_exe.to_string_lossy();
        let mut command = command_from_template(
            &self.open_command,
            &[("title", WINDOW_TITLE), ("exe", &exe)],
        )?;
        command.spawn().context("failed to run open command")?;
        info!("Opened a new window at {path}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{ffi::OsString, path::PathBuf};

    use anyhow::Result;

    use crate::window_api::WindowClient;

    use super::{is_window_command, ProcessWindowHost};

    fn cmd(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn wizard_invocations_are_windows() {
        assert!(is_window_command(&cmd(&["/usr/bin/dalos"])));
        assert!(is_window_command(&cmd(&["dalos", "checkin"])));
        assert!(is_window_command(&cmd(&["dalos", "--log", "checkin", "--notes", "stop"])));
        assert!(is_window_command(&cmd(&["dalos", "--dir", "/tmp/stop"])));
    }

    #[test]
    fn other_commands_are_not_windows() {
        assert!(!is_window_command(&cmd(&["dalos", "stop"])));
        assert!(!is_window_command(&cmd(&["dalos", "--endpoint", "checkin", "click", "x"])));
        assert!(!is_window_command(&cmd(&["dalos", "remind"])));
    }

    #[test]
    fn focus_targets_the_window_of_that_process() -> Result<()> {
        let host = ProcessWindowHost::new(
            PathBuf::from("/usr/bin/dalos"),
            vec![],
            vec!["wmctrl".into(), "-a".into(), "{title}".into()],
        );
        let oldest = WindowClient {
            pid: 4100,
            started_at: 10,
        };
        let newer = WindowClient {
            pid: 4200,
            started_at: 20,
        };

        let oldest_command = host.focus_command_for(&oldest)?;
        let newer_command = host.focus_command_for(&newer)?;
        let args = |c: &tokio::process::Command| {
            c.as_std()
                .get_args()
                .map(|v| v.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
        };

        assert_eq!(args(&oldest_command), vec!["-a", "Dalos check-in [4100]"]);
        assert_ne!(args(&oldest_command), args(&newer_command));
        Ok(())
    }
}
