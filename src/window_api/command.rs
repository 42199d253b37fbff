use std::{collections::HashMap, process::Stdio};

use anyhow::{anyhow, Context, Result};
use tokio::{
    io::AsyncReadExt,
    process::{Child, Command},
    sync::mpsc,
};
use tracing::{debug, info, warn};

use crate::agent::AgentEvent;

use super::{Notification, NotificationCenter};

/// What `notify-send --action=default=...` prints when the notification body is clicked.
const DEFAULT_ACTION: &str = "default";

/// Builds a command from an argument template, replacing `{name}` placeholders.
pub fn command_from_template(template: &[String], vars: &[(&str, &str)]) -> Result<Command> {
    let mut parts = template.iter().map(|part| {
        vars.iter()
            .fold(part.clone(), |acc, (name, value)| {
                acc.replace(&format!("{{{name}}}"), value)
            })
    });
    let program = parts
        .next()
        .ok_or_else(|| anyhow!("command template is empty"))?;
    let mut command = Command::new(program);
    command.args(parts);
    Ok(command)
}

/// Shows notifications by running an external notifier. If the notifier reports the default
/// action on stdout the click is sent back to the agent.
pub struct CommandNotificationCenter {
    template: Vec<String>,
    events: mpsc::Sender<AgentEvent>,
    shown: HashMap<String, Child>,
}

impl CommandNotificationCenter {
    pub fn new(template: Vec<String>, events: mpsc::Sender<AgentEvent>) -> Self {
        Self {
            template,
            events,
            shown: HashMap::new(),
        }
    }

    fn forget_finished(&mut self) {
        self.shown
            .retain(|_, child| matches!(child.try_wait(), Ok(None)));
    }
}

impl NotificationCenter for CommandNotificationCenter {
    fn show(&mut self, notification: &Notification) -> Result<()> {
        self.forget_finished();
        let mut command = command_from_template(
            &self.template,
            &[("title", &notification.title), ("body", &notification.body)],
        )?;
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("failed to run notifier")?;

        if let Some(mut stdout) = child.stdout.take() {
            let id = notification.id.clone();
            let events = self.events.clone();
            tokio::spawn(async move {
                let mut output = String::new();
                if let Err(e) = stdout.read_to_string(&mut output).await {
                    warn!("Couldn't read notifier output for {id}: {e:?}");
                    return;
                }
                if output.trim() == DEFAULT_ACTION {
                    debug!("Notification {id} was clicked");
                    let _ = events.send(AgentEvent::NotificationClick { id }).await;
                }
            });
        }

        info!("Showing notification {}", notification.id);
        self.shown.insert(notification.id.clone(), child);
        Ok(())
    }

    fn close(&mut self, id: &str) -> Result<()> {
        let Some(mut child) = self.shown.remove(id) else {
            debug!("Notification {id} is not shown anymore");
            return Ok(());
        };
        if matches!(child.try_wait(), Ok(None)) {
            child.start_kill()?;
        }
        Ok(())
    }
}
