//! Transport-Abstraktion und WebSocket-Implementierung

use futures_util::{SinkExt, StreamExt};
use plauder_core::types::UserId;
use plauder_protocol::frame::DEFAULT_MAX_FRAME_SIZE;
use plauder_protocol::{ClientFrame, ServerFrame};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::{ClientError, ClientResult};

/// Bidirektionaler Frame-Kanal zum Server
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn senden(&mut self, frame: &ClientFrame) -> ClientResult<()>;

    /// Naechster Frame vom Server, `None` wenn die Verbindung zu ist
    async fn empfangen(&mut self) -> ClientResult<Option<ServerFrame>>;
}

/// WebSocket-Verbindung zum Plauder-Server
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    max_frame_groesse: usize,
}

impl WsTransport {
    /// Verbindet sich mit `url` (z.B. `ws://localhost:3001/ws`) als `user_id`
    pub async fn verbinden(url: &str, user_id: UserId) -> ClientResult<Self> {
        let adresse = format!("{url}?userId={}", user_id.inner());
        tracing::info!(url, user_id = %user_id, "Verbinde mit Server");

        let (stream, _) = connect_async(adresse.as_str())
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        tracing::info!(url, "WebSocket-Verbindung hergestellt");
        Ok(Self {
            stream,
            max_frame_groesse: DEFAULT_MAX_FRAME_SIZE,
        })
    }

    pub async fn schliessen(mut self) -> ClientResult<()> {
        self.stream
            .close(None)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }
}

impl Transport for WsTransport {
    async fn senden(&mut self, frame: &ClientFrame) -> ClientResult<()> {
        let json = frame
            .to_json()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        self.stream
            .send(Message::Text(json))
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    async fn empfangen(&mut self) -> ClientResult<Option<ServerFrame>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    match ServerFrame::from_json(&text, self.max_frame_groesse) {
                        Ok(frame) => return Ok(Some(frame)),
                        Err(e) => {
                            tracing::warn!(fehler = %e, "Unbekannter Frame vom Server ignoriert");
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Pong beantwortet tungstenite selbst
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(ClientError::Transport(e.to_string())),
            }
        }
    }
}
