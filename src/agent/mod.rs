//! The background agent. It keeps one instance of itself running, takes over windows when it
//! starts and routes notification clicks back into an application window. It shares no state
//! with the wizard, the two only meet through the window being focused or opened.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::AppConfig,
    utils::{
        clock::{Clock, DefaultClock},
        dir::sibling_binary,
    },
    window_api::{
        command::CommandNotificationCenter, process::ProcessWindowHost, Notification,
        NotificationCenter, WindowClient, WindowHost, ROOT_PATH,
    },
};

use registry::{AgentRegistry, ProcessRegistry};

pub mod args;
pub mod ipc;
pub mod registry;
pub mod shutdown;

pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CLIENT_BINARY: &str = "dalos";
pub const AGENT_BINARY: &str = "dalos-agent";

const EVENT_BUFFER: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    NotificationClick { id: String },
    ScheduleReminder { delay: Duration },
    /// A scheduled reminder is due.
    ShowReminder(Notification),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPhase {
    Installing,
    Activated,
    Listening,
}

pub struct InstallabilityAgent<W, N, R> {
    phase: AgentPhase,
    installed: bool,
    windows: W,
    notifications: N,
    registry: R,
    controlled: Vec<WindowClient>,
    /// Keeps reminder ids unique when several come due in the same second.
    reminders_scheduled: u64,
    clock: Arc<dyn Clock>,
    events: mpsc::Sender<AgentEvent>,
}

impl<W: WindowHost, N: NotificationCenter, R: AgentRegistry> InstallabilityAgent<W, N, R> {
    pub fn new(
        windows: W,
        notifications: N,
        registry: R,
        clock: Arc<dyn Clock>,
        events: mpsc::Sender<AgentEvent>,
    ) -> Self {
        Self {
            phase: AgentPhase::Installing,
            installed: false,
            windows,
            notifications,
            registry,
            controlled: vec![],
            reminders_scheduled: 0,
            clock,
            events,
        }
    }

    pub fn phase(&self) -> AgentPhase {
        self.phase
    }

    pub fn controlled(&self) -> &[WindowClient] {
        &self.controlled
    }

    /// One-time setup. Replaces older agents immediately instead of waiting for them to go away.
    pub fn install(&mut self) -> Result<()> {
        let replaced = self.registry.skip_waiting()?;
        info!("Agent {AGENT_VERSION} installed, replaced {replaced} older instance(s)");
        self.installed = true;
        Ok(())
    }

    /// Takes control of every window that is already open.
    pub fn activate(&mut self) -> Result<()> {
        if !self.installed {
            self.install()?;
        }
        self.controlled = self.windows.match_all()?;
        self.phase = AgentPhase::Activated;
        info!("Agent activated, claimed {} window(s)", self.controlled.len());
        Ok(())
    }

    /// Dismisses the notification, then brings the first window forward or opens a new one.
    pub fn handle_notification_click(&mut self, id: &str) -> Result<()> {
        if let Err(e) = self.notifications.close(id) {
            warn!("Couldn't dismiss notification {id} {e:?}");
        }

        let clients = self.windows.match_all()?;
        match clients.first() {
            Some(client) => self.windows.focus(client),
            None => self.windows.open_window(ROOT_PATH),
        }
    }

    fn schedule_reminder(&mut self, delay: Duration) {
        self.reminders_scheduled += 1;
        let sequence = self.reminders_scheduled;
        let clock = self.clock.clone();
        let events = self.events.clone();
        info!("Reminder scheduled in {delay:?}");
        tokio::spawn(async move {
            clock.sleep(delay).await;
            let notification = Notification {
                id: format!("reminder-{}-{sequence}", clock.time().timestamp()),
                title: "Daily check-in".into(),
                body: "Time to check in for today.".into(),
            };
            if events
                .send(AgentEvent::ShowReminder(notification))
                .await
                .is_err()
            {
                debug!("Agent stopped before the reminder was due");
            }
        });
    }

    pub fn handle_event(&mut self, event: AgentEvent) -> Result<()> {
        match event {
            AgentEvent::NotificationClick { id } => self.handle_notification_click(&id),
            AgentEvent::ScheduleReminder { delay } => {
                self.schedule_reminder(delay);
                Ok(())
            }
            AgentEvent::ShowReminder(notification) => self.notifications.show(&notification),
        }
    }

    /// Activates if needed and then processes events one at a time until shutdown. Events that
    /// arrive early wait in the channel, so none is handled before windows are claimed.
    pub async fn run(
        mut self,
        mut receiver: mpsc::Receiver<AgentEvent>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        if self.phase == AgentPhase::Installing {
            self.activate()?;
        }
        self.phase = AgentPhase::Listening;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                event = receiver.recv() => {
                    let Some(event) = event else {
                        return Ok(());
                    };
                    debug!("Handling {event:?}");
                    if let Err(e) = self.handle_event(event) {
                        error!("Error handling agent event {e:?}");
                    }
                }
            }
        }
    }
}

/// Represents the starting point for the agent process.
pub async fn start_agent(config: AppConfig) -> Result<()> {
    let agent_exe = std::env::current_exe().context("can't locate the agent executable")?;
    let client_exe = sibling_binary(&agent_exe, CLIENT_BINARY);

    let (sender, receiver) = mpsc::channel::<AgentEvent>(EVENT_BUFFER);
    let shutdown_token = CancellationToken::new();

    let windows = ProcessWindowHost::new(
        client_exe,
        config.agent.open_command.clone(),
        config.agent.focus_command.clone(),
    );
    let notifications =
        CommandNotificationCenter::new(config.agent.notify_command.clone(), sender.clone());
    let mut agent = InstallabilityAgent::new(
        windows,
        notifications,
        ProcessRegistry::new(agent_exe),
        Arc::new(DefaultClock),
        sender.clone(),
    );

    // The previous agent holds the port until it's replaced.
    agent.install()?;
    let listener = ipc::bind(config.agent.port).await?;

    let (_, serve_result, agent_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        ipc::serve(listener, sender, shutdown_token.clone()),
        async {
            let result = agent.run(receiver, shutdown_token.clone()).await;
            shutdown_token.cancel();
            result
        },
    );

    if let Err(serve_result) = serve_result {
        error!("Listener got an error {:?}", serve_result);
    }

    if let Err(agent_result) = agent_result {
        error!("Agent got an error {:?}", agent_result);
    }

    Ok(())
}

/// Location of the agent binary next to the given client binary.
pub fn agent_path(client_exe: &Path) -> PathBuf {
    sibling_binary(client_exe, AGENT_BINARY)
}
