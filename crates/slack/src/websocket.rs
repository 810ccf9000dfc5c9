//! [`SocketTransport`] over a real Socket Mode WebSocket.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use secrecy::SecretString;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::client::SlackWebClient;
use crate::socket::{parse_frame, SlackEnvelope, SocketFrame, SocketTransport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WebSocketTransport {
    client: SlackWebClient,
    app_token: SecretString,
    reader: Mutex<Option<SplitStream<WsStream>>>,
    writer: Mutex<Option<SplitSink<WsStream, WsMessage>>>,
}

impl WebSocketTransport {
    pub fn new(client: SlackWebClient, app_token: SecretString) -> Self {
        Self { client, app_token, reader: Mutex::new(None), writer: Mutex::new(None) }
    }

    async fn send(&self, message: WsMessage) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or_else(|| TransportError::Acknowledge("not connected".to_owned()))?;
        sink.send(message).await.map_err(|error| TransportError::Acknowledge(error.to_string()))
    }
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport").field("client", &self.client).finish_non_exhaustive()
    }
}

#[async_trait]
impl SocketTransport for WebSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = self
            .client
            .connections_open(&self.app_token)
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        info!("websocket connected to slack socket mode");

        let (write, read) = stream.split();
        *self.writer.lock().await = Some(write);
        *self.reader.lock().await = Some(read);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut reader = self.reader.lock().await;
        let stream =
            reader.as_mut().ok_or_else(|| TransportError::Receive("not connected".to_owned()))?;

        loop {
            let Some(message) = stream.next().await else {
                return Err(TransportError::Reconnect("websocket stream ended".to_owned()));
            };

            match message.map_err(|error| TransportError::Receive(error.to_string()))? {
                WsMessage::Text(text) => match parse_frame(text.as_str())? {
                    SocketFrame::Hello => debug!("socket mode hello received"),
                    SocketFrame::Disconnect { reason } => {
                        return Err(TransportError::Reconnect(
                            reason.unwrap_or_else(|| "disconnect".to_owned()),
                        ));
                    }
                    SocketFrame::Envelope(envelope) => return Ok(Some(envelope)),
                    SocketFrame::Unknown { frame_type } => {
                        debug!(frame_type = %frame_type, "ignoring unknown socket frame");
                    }
                },
                WsMessage::Ping(data) => self.send(WsMessage::Pong(data)).await?,
                WsMessage::Close(_) => {
                    return Err(TransportError::Reconnect("websocket closed by peer".to_owned()));
                }
                _ => {}
            }
        }
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let ack = serde_json::json!({ "envelope_id": envelope_id });
        self.send(WsMessage::Text(ack.to_string().into())).await
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.reader.lock().await.take();
        let Some(mut writer) = self.writer.lock().await.take() else {
            return Ok(());
        };
        writer.close().await.map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}
