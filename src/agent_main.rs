// This runs the agent on windows without creating a console. Disable during development to see
// stdout.
#![windows_subsystem = "windows"]

use std::env::args;

use anyhow::Result;
use clap::Parser;
use dalos::{
    agent::{args::AgentArgs, start_agent},
    config::{AppConfig, CONFIG_FILE_NAME},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, AGENT_PREFIX},
        runtime::single_thread_runtime,
    },
};

fn main() {
    if let Err(e) = run_service(args().collect::<Vec<_>>()) {
        eprintln!("dalos-agent failed: {e:?}");
        std::process::exit(1);
    }
}

fn run_service(command_args: Vec<String>) -> Result<()> {
    let args = AgentArgs::parse_from(&command_args);

    if !args.force {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const DETACHED_PROCESS: u32 = 0x0000_0008;

            let mut command_args = command_args;
            command_args.push("--force".into());
            let process_name = std::env::current_exe()?;
            let mut command = std::process::Command::new(process_name);
            command.args(command_args.into_iter().skip(1));
            command.creation_flags(DETACHED_PROCESS);
            command.stdin(std::process::Stdio::null());
            command.stdout(std::process::Stdio::null());
            command.stderr(std::process::Stdio::null());
            #[allow(clippy::zombie_processes)]
            command.spawn()?;
            return Ok(());
        }
        #[cfg(unix)]
        {
            use daemonize::Daemonize;
            use tracing::error;

            let daemonize = Daemonize::new()
                .stdout(daemonize::Stdio::devnull())
                .stderr(daemonize::Stdio::devnull())
                // stdin is redirected to /dev/null by Daemonize::new() by default
                .execute();
            match daemonize {
                daemonize::Outcome::Parent(parent) => {
                    parent
                        .inspect_err(|e| error!("Failed to create agent on parent side {e:?}"))?;
                    return Ok(());
                }
                daemonize::Outcome::Child(child) => {
                    child?;
                }
            }
        }
    }

    run(args)
}

fn run(args: AgentArgs) -> Result<()> {
    let app_dir = args.dir.map_or_else(create_application_default_path, Ok)?;
    enable_logging(AGENT_PREFIX, &app_dir.join("logs"), args.log, args.log_console)?;
    let config_path = args
        .config
        .unwrap_or_else(|| app_dir.join(CONFIG_FILE_NAME));
    let config = AppConfig::load(&config_path, None)?;
    single_thread_runtime()?.block_on(async move { start_agent(config).await })?;
    Ok(())
}
