use std::{
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};

use anyhow::Result;
use tracing::{debug, error, info};

use crate::{
    agent::{
        ipc::{send_message, AgentMessage, AgentReply},
        AGENT_VERSION,
    },
    config::AgentSettings,
};

use super::process::spawn_agent;

static REGISTERED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// An agent of this version is already running.
    Current,
    Started,
    /// An agent of another version was running and is being replaced.
    Upgraded { from: String },
    /// Registration already happened in this process.
    Skipped,
}

/// What to do given the answer to a ping.
pub fn registration_for(reply: Result<AgentReply>) -> Registration {
    match reply {
        Ok(reply) if reply.version == AGENT_VERSION => Registration::Current,
        Ok(reply) => Registration::Upgraded {
            from: reply.version,
        },
        Err(e) => {
            debug!("No agent answered: {e:?}");
            Registration::Started
        }
    }
}

/// Makes sure the background agent of this version is running. Runs once per process, later
/// calls return [Registration::Skipped].
pub async fn register_agent(
    dir: &Path,
    config: Option<&Path>,
    settings: &AgentSettings,
) -> Result<Registration> {
    if REGISTERED.swap(true, Ordering::SeqCst) {
        return Ok(Registration::Skipped);
    }

    let registration =
        registration_for(send_message(settings.port, &AgentMessage::Ping).await);
    if registration != Registration::Current {
        spawn_agent(dir, config)?;
    }
    info!("Agent registration: {registration:?}");
    Ok(registration)
}

/// Application start hook. Registration problems are logged, the wizard works without an agent.
pub async fn register_on_start(dir: &Path, config: Option<&Path>, settings: &AgentSettings) {
    if let Err(e) = register_agent(dir, config, settings).await {
        error!("Agent registration failed {e:?}");
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use crate::agent::{ipc::AgentReply, AGENT_VERSION};

    use super::{registration_for, Registration};

    #[test]
    fn same_version_is_left_alone() {
        let reply = Ok(AgentReply {
            version: AGENT_VERSION.into(),
        });
        assert_eq!(registration_for(reply), Registration::Current);
    }

    #[test]
    fn other_version_is_replaced() {
        let reply = Ok(AgentReply {
            version: "0.0.1-old".into(),
        });
        assert_eq!(
            registration_for(reply),
            Registration::Upgraded {
                from: "0.0.1-old".into()
            }
        );
    }

    #[test]
    fn missing_agent_is_started() {
        assert_eq!(
            registration_for(Err(anyhow!("connection refused"))),
            Registration::Started
        );
    }
}
