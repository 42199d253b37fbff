pub mod checkin;
pub mod process;
pub mod registration;
pub mod screen;

use std::path::PathBuf;

use anyhow::Result;
use checkin::{process_checkin_command, CheckinCommand};
use clap::{Parser, Subcommand};
use registration::{register_agent, register_on_start, Registration};
use tracing::level_filters::LevelFilter;

use crate::{
    agent::ipc::{send_message, AgentMessage},
    config::{AppConfig, CONFIG_FILE_NAME},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "dalos", version, long_about = None)]
#[command(about = "Daily resolution check-in", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Option<Commands>,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        help = "Application directory. By default uses $XDG_STATE_HOME/dalos or $HOME/.local/state/dalos"
    )]
    dir: Option<PathBuf>,
    #[arg(long, help = "Config file. By default config.toml in the application directory")]
    config: Option<PathBuf>,
    #[arg(long, help = "Ledger endpoint, overrides the config file and DALOS_ENDPOINT")]
    endpoint: Option<String>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Check in for today. This is the default command")]
    Checkin {
        #[command(flatten)]
        command: CheckinCommand,
    },
    #[command(about = "Start the background agent, replacing an older one")]
    Init {},
    #[command(about = "Stop the background agent")]
    Stop {},
    #[command(about = "Ask the agent for a reminder notification")]
    Remind {
        #[arg(long, help = "Delay in seconds. By default uses the configured reminder delay")]
        after: Option<u64>,
    },
    #[command(about = "Deliver a notification click to the agent")]
    Click {
        #[arg(help = "Notification id")]
        id: String,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Checkin {
            command: CheckinCommand::default(),
        }
    }
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();
    let app_dir = args
        .dir
        .clone()
        .map_or_else(create_application_default_path, Ok)?;

    let logging_level = args.log.then_some(LevelFilter::TRACE);
    enable_logging(CLI_PREFIX, &app_dir.join("logs"), logging_level, args.log)?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| app_dir.join(CONFIG_FILE_NAME));
    let config = AppConfig::load(&config_path, args.endpoint.clone())?;

    match args.commands.unwrap_or_default() {
        Commands::Checkin { command } => {
            register_on_start(&app_dir, args.config.as_deref(), &config.agent).await;
            process_checkin_command(command, &config).await
        }
        Commands::Init {} => {
            let registration =
                register_agent(&app_dir, args.config.as_deref(), &config.agent).await?;
            match registration {
                Registration::Current => println!("Agent is already running"),
                Registration::Upgraded { from } => println!("Replaced agent {from}"),
                Registration::Started | Registration::Skipped => println!("Started agent"),
            }
            Ok(())
        }
        Commands::Stop {} => {
            let stopped = process::stop_agents()?;
            println!("Stopped {stopped} agent(s)");
            Ok(())
        }
        Commands::Remind { after } => {
            let delay_secs = after.unwrap_or(config.agent.reminder_delay_secs);
            send_message(
                config.agent.port,
                &AgentMessage::ScheduleReminder { delay_secs },
            )
            .await?;
            println!("Reminder scheduled in {delay_secs}s");
            Ok(())
        }
        Commands::Click { id } => {
            send_message(config.agent.port, &AgentMessage::NotificationClick { id }).await?;
            Ok(())
        }
    }
}
