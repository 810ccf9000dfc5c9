use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::events::DispatchError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
    #[error("malformed socket frame: {0}")]
    Frame(String),
    #[error("server requested reconnect: {0}")]
    Reconnect(String),
}

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("socket mode gave up after {attempts} failed connection attempts: {last}")]
    RetriesExhausted { attempts: u32, last: TransportError },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    EventsApi,
    SlashCommands,
    Interactive,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub kind: EnvelopeKind,
    pub payload: serde_json::Value,
}

/// One text frame received over a Socket Mode connection.
#[derive(Clone, Debug, PartialEq)]
pub enum SocketFrame {
    Hello,
    Disconnect { reason: Option<String> },
    Envelope(SlackEnvelope),
    Unknown { frame_type: String },
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    frame_type: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Option<serde_json::Value>,
    #[serde(default)]
    reason: Option<String>,
}

pub fn parse_frame(text: &str) -> Result<SocketFrame, TransportError> {
    let raw: RawFrame =
        serde_json::from_str(text).map_err(|error| TransportError::Frame(error.to_string()))?;

    let kind = match raw.frame_type.as_str() {
        "hello" => return Ok(SocketFrame::Hello),
        "disconnect" => return Ok(SocketFrame::Disconnect { reason: raw.reason }),
        "events_api" => EnvelopeKind::EventsApi,
        "slash_commands" => EnvelopeKind::SlashCommands,
        "interactive" => EnvelopeKind::Interactive,
        _ => return Ok(SocketFrame::Unknown { frame_type: raw.frame_type }),
    };

    let envelope_id = raw.envelope_id.ok_or_else(|| {
        TransportError::Frame(format!("{} frame has no envelope_id", raw.frame_type))
    })?;

    Ok(SocketFrame::Envelope(SlackEnvelope {
        envelope_id,
        kind,
        payload: raw.payload.unwrap_or(serde_json::Value::Null),
    }))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// A Socket Mode connection. `next_envelope` returning `Ok(None)` ends the
/// session; [`TransportError::Reconnect`] asks the runner to connect again.
#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopSocketTransport;

#[async_trait]
impl SocketTransport for NoopSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[async_trait]
pub trait EnvelopeHandler: Send + Sync {
    async fn handle(&self, envelope: SlackEnvelope) -> Result<(), DispatchError>;
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    handler: Arc<dyn EnvelopeHandler>,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        handler: Arc<dyn EnvelopeHandler>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, handler, reconnect_policy }
    }

    /// Runs sessions until the transport's stream ends or retries run out,
    /// then waits for in-flight envelope tasks.
    pub async fn start(&self) -> Result<(), SocketError> {
        let mut tasks = JoinSet::new();
        let outcome = self.run_sessions(&mut tasks).await;

        let in_flight = tasks.len();
        if in_flight > 0 {
            info!(in_flight, "waiting for in-flight envelope tasks");
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(error) = joined {
                warn!(error = %error, "envelope task did not complete");
            }
        }

        outcome
    }

    async fn run_sessions(&self, tasks: &mut JoinSet<()>) -> Result<(), SocketError> {
        let mut attempt = 0;

        loop {
            match self.connect_and_pump(&mut attempt, tasks).await {
                Ok(()) => return Ok(()),
                Err(TransportError::Reconnect(reason)) => {
                    info!(reason = %reason, "slack requested reconnect; reconnecting");
                }
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "socket mode transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted"
                        );
                        return Err(SocketError::RetriesExhausted {
                            attempts: attempt + 1,
                            last: transport_error,
                        });
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// A successful connect resets `attempt`, so only back-to-back failures
    /// count against the retry budget.
    async fn connect_and_pump(
        &self,
        attempt: &mut u32,
        tasks: &mut JoinSet<()>,
    ) -> Result<(), TransportError> {
        info!(attempt = *attempt, "opening socket mode transport connection");
        self.transport.connect().await?;
        info!(attempt = *attempt, "socket mode transport connected");
        *attempt = 0;

        match self.pump(tasks).await {
            Ok(()) => {
                info!("socket mode transport stream closed");
                self.transport.disconnect().await
            }
            Err(error) => {
                if let Err(disconnect_error) = self.transport.disconnect().await {
                    debug!(error = %disconnect_error, "disconnect after transport failure also failed");
                }
                Err(error)
            }
        }
    }

    async fn pump(&self, tasks: &mut JoinSet<()>) -> Result<(), TransportError> {
        loop {
            while let Some(joined) = tasks.try_join_next() {
                if let Err(error) = joined {
                    warn!(error = %error, "envelope task did not complete");
                }
            }

            let Some(envelope) = self.transport.next_envelope().await? else {
                return Ok(());
            };

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                kind = ?envelope.kind,
                correlation_id = %envelope.envelope_id,
                "received slack envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    "acknowledged slack envelope"
                );
            }

            let handler = self.handler.clone();
            tasks.spawn(async move {
                let envelope_id = envelope.envelope_id.clone();
                if let Err(error) = handler.handle(envelope).await {
                    warn!(
                        envelope_id = %envelope_id,
                        correlation_id = %envelope_id,
                        error = %error,
                        "envelope handling failed; continuing socket loop"
                    );
                }
            });
        }
    }
}
