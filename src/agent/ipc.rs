//! Loopback channel between foreground clients and the agent. One JSON message per line, every
//! message gets a [AgentReply] line back.

use std::{net::Ipv4Addr, time::Duration};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{AgentEvent, AGENT_VERSION};

const CLIENT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    Ping,
    NotificationClick { id: String },
    ScheduleReminder { delay_secs: u64 },
}

impl AgentMessage {
    fn into_event(self) -> Option<AgentEvent> {
        match self {
            AgentMessage::Ping => None,
            AgentMessage::NotificationClick { id } => Some(AgentEvent::NotificationClick { id }),
            AgentMessage::ScheduleReminder { delay_secs } => Some(AgentEvent::ScheduleReminder {
                delay: Duration::from_secs(delay_secs),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReply {
    pub version: String,
}

pub async fn bind(port: u16) -> Result<TcpListener> {
    TcpListener::bind((Ipv4Addr::LOCALHOST, port))
        .await
        .with_context(|| format!("can't listen on port {port}"))
}

/// Accepts clients until shutdown and forwards their messages to the agent.
pub async fn serve(
    listener: TcpListener,
    events: mpsc::Sender<AgentEvent>,
    shutdown: CancellationToken,
) -> Result<()> {
    info!("Listening on {}", listener.local_addr()?);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            accepted = listener.accept() => {
                let (stream, address) = accepted?;
                debug!("Client connected from {address}");
                let events = events.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, events).await {
                        error!("Client {address} failed {e:?}");
                    }
                });
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, events: mpsc::Sender<AgentEvent>) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    let reply = serde_json::to_string(&AgentReply {
        version: AGENT_VERSION.into(),
    })?;

    while let Some(line) = lines.next_line().await? {
        let message = match serde_json::from_str::<AgentMessage>(&line) {
            Ok(v) => v,
            Err(e) => {
                warn!("Ignoring malformed message {line:?}: {e}");
                continue;
            }
        };
        debug!("Received {message:?}");
        if let Some(event) = message.into_event() {
            events.send(event).await?;
        }
        write.write_all(reply.as_bytes()).await?;
        write.write_all(b"\n").await?;
    }
    Ok(())
}

/// Sends one message to the agent listening on `port` and waits for its reply.
pub async fn send_message(port: u16, message: &AgentMessage) -> Result<AgentReply> {
    tokio::time::timeout(CLIENT_TIMEOUT, exchange(port, message))
        .await
        .map_err(|_| anyhow!("agent on port {port} didn't answer in time"))?
}

async fn exchange(port: u16, message: &AgentMessage) -> Result<AgentReply> {
    let stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port))
        .await
        .with_context(|| format!("no agent is listening on port {port}"))?;
    let (read, mut write) = stream.into_split();

    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    write.write_all(line.as_bytes()).await?;

    let reply = BufReader::new(read)
        .lines()
        .next_line()
        .await?
        .ok_or_else(|| anyhow!("agent closed the connection"))?;
    Ok(serde_json::from_str(&reply)?)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::agent::{AgentEvent, AGENT_VERSION};

    use super::{bind, send_message, serve, AgentMessage};

    #[test]
    fn messages_use_snake_case_tags() {
        assert_eq!(
            serde_json::to_value(AgentMessage::ScheduleReminder { delay_secs: 60 }).unwrap(),
            json!({"type": "schedule_reminder", "delay_secs": 60})
        );
        assert_eq!(
            serde_json::from_value::<AgentMessage>(json!({"type": "ping"})).unwrap(),
            AgentMessage::Ping
        );
    }

    #[tokio::test]
    async fn messages_reach_the_agent() -> Result<()> {
        let listener = bind(0).await?;
        let port = listener.local_addr()?.port();
        let (sender, mut receiver) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve(listener, sender, shutdown.clone()));

        let reply = send_message(port, &AgentMessage::Ping).await?;
        assert_eq!(reply.version, AGENT_VERSION);

        send_message(
            port,
            &AgentMessage::NotificationClick {
                id: "reminder-7".into(),
            },
        )
        .await?;
        send_message(port, &AgentMessage::ScheduleReminder { delay_secs: 30 }).await?;

        assert_eq!(
            receiver.recv().await,
            Some(AgentEvent::NotificationClick {
                id: "reminder-7".into()
            })
        );
        assert_eq!(
            receiver.recv().await,
            Some(AgentEvent::ScheduleReminder {
                delay: Duration::from_secs(30)
            })
        );

        shutdown.cancel();
        server.await??;
        Ok(())
    }

    #[tokio::test]
    async fn missing_agent_is_an_error() -> Result<()> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        drop(listener);

        assert!(send_message(port, &AgentMessage::Ping).await.is_err());
        Ok(())
    }
}
