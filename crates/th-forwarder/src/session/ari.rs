//! REST Interface session
//!
//! Registers the Stasis application over HTTP, then subscribes to its event
//! WebSocket. Each text message is one frame.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use th_core::config::{AriConfig, LivenessConfig, RelayConfig};
use th_core::{ConnectError, FrameSource, SessionState, StreamError};

use super::Liveness;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Create or confirm the application registration
///
/// `PUT /ari/applications/<app>` with basic credentials. Only 200 and 201
/// count as success.
pub async fn register_application(
    client: &reqwest::Client,
    ari: &AriConfig,
    timeout: Duration,
) -> Result<(), ConnectError> {
    let url = ari.application_url()?;
    tracing::debug!("Registering ARI application at {}", url);

    let response = client
        .put(url)
        .basic_auth(&ari.username, Some(&ari.password))
        .timeout(timeout)
        .send()
        .await
        .map_err(ConnectError::Registration)?;

    match response.status().as_u16() {
        200 | 201 => {
            tracing::info!("Successfully registered ARI application: {}", ari.app_name);
            Ok(())
        }
        status => Err(ConnectError::RegistrationRejected { status }),
    }
}

/// A subscribed ARI event stream
pub struct AriSession {
    ws: WsStream,
    state: SessionState,
    liveness: Liveness,
    close_grace: Duration,
}

impl AriSession {
    /// Register the application and open its event stream
    pub async fn connect(config: &RelayConfig) -> Result<Self, ConnectError> {
        let mut state = SessionState::default();
        state.transition(SessionState::Connecting)?;
        state.transition(SessionState::Authenticating)?;

        let client = reqwest::Client::new();
        let registered = register_application(&client, &config.ari, config.connect_timeout).await;
        if let Err(e) = registered {
            state.transition(SessionState::Disconnected)?;
            return Err(e);
        }

        let url = config.ari.events_url()?;
        Self::open_stream(url.as_str(), &config.ari, &config.liveness).await
    }

    /// Open the event WebSocket at `url`
    pub async fn open_stream(
        url: &str,
        ari: &AriConfig,
        liveness: &LivenessConfig,
    ) -> Result<Self, ConnectError> {
        tracing::info!("Connecting to ARI WebSocket for application '{}'", ari.app_name);

        let (ws, _response) = tokio::time::timeout(ari.handshake_timeout, connect_async(url))
            .await
            .map_err(|_| ConnectError::TimedOut {
                address: format!("{}:{}", ari.host, ari.port),
                timeout: ari.handshake_timeout,
            })?
            .map_err(|e| ConnectError::WebSocket(e.to_string()))?;

        tracing::info!("Successfully connected to Asterisk ARI");

        let mut state = SessionState::Authenticating;
        state.transition(SessionState::Active)?;

        Ok(Self {
            ws,
            state,
            liveness: Liveness::new(liveness.read_timeout),
            close_grace: ari.close_grace,
        })
    }

    fn mark_ended(&mut self) {
        if self.state.is_active() {
            self.state = SessionState::Closing;
        }
        if self.state == SessionState::Closing {
            self.state = SessionState::Disconnected;
        }
    }
}

#[async_trait]
impl FrameSource for AriSession {
    async fn next_frame(&mut self) -> Result<Option<String>, StreamError> {
        if !self.state.is_active() {
            return Ok(None);
        }

        loop {
            let message = match self.liveness.guard(self.ws.next()).await {
                Ok(Some(Ok(message))) => message,
                Ok(Some(Err(e))) => {
                    self.mark_ended();
                    return Err(StreamError::WebSocket(e.to_string()));
                }
                Ok(None) => {
                    self.mark_ended();
                    return Ok(None);
                }
                Err(e) => {
                    self.mark_ended();
                    return Err(e);
                }
            };
            self.liveness.touch();

            match message {
                Message::Text(text) => return Ok(Some(text.to_string())),
                Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Ok(Some(text)),
                    Err(_) => tracing::warn!("Dropping non-UTF-8 binary ARI message"),
                },
                Message::Close(frame) => {
                    tracing::info!(?frame, "ARI closed the event stream");
                    self.mark_ended();
                    return Ok(None);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    fn state(&self) -> SessionState {
        self.state
    }

    fn last_activity(&self) -> Instant {
        self.liveness.last_activity()
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        if !self.state.is_active() {
            return Ok(());
        }
        self.state = SessionState::Closing;

        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        if let Err(e) = self.ws.send(Message::Close(Some(frame))).await {
            tracing::debug!("Failed to send close frame: {}", e);
        }

        // Give the peer a moment to answer the close handshake
        let ws = &mut self.ws;
        let answered = tokio::time::timeout(self.close_grace, async {
            while let Some(message) = ws.next().await {
                if matches!(message, Ok(Message::Close(_)) | Err(_)) {
                    break;
                }
            }
        })
        .await;
        if answered.is_err() {
            tracing::debug!(
                "ARI did not finish the close handshake within {:?}",
                self.close_grace
            );
        }

        self.state = SessionState::Disconnected;
        Ok(())
    }
}
