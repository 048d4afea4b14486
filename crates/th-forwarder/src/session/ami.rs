//! Manager Interface session
//!
//! Connects over TCP, logs in with the configured account and then yields
//! event blocks. Non-event blocks (action responses, stray blank lines) are
//! dropped here but still count as activity.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_util::codec::Framed;

use th_core::config::{AmiConfig, LivenessConfig, RelayConfig};
use th_core::{ConnectError, FrameSource, SessionState, StreamError};
use th_protocol::ami::{self, LoginOutcome};
use th_protocol::{AmiAction, AmiCodec, AmiFrame};

use super::Liveness;

/// An authenticated AMI connection
pub struct AmiSession<T = TcpStream> {
    frames: Framed<T, AmiCodec>,
    state: SessionState,
    liveness: Liveness,
    banner: Option<String>,
}

impl AmiSession<TcpStream> {
    /// Connect to the manager interface and log in
    ///
    /// Authentication failures are returned as
    /// [`ConnectError::AuthenticationFailed`] and are not retried.
    pub async fn connect(config: &RelayConfig) -> Result<Self, ConnectError> {
        let mut state = SessionState::default();
        state.transition(SessionState::Connecting)?;

        let address = config.ami.address();
        tracing::info!("Connecting to AMI at {}", address);

        let stream = match tokio::time::timeout(
            config.connect_timeout,
            TcpStream::connect(&address),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                state.transition(SessionState::Disconnected)?;
                return Err(ConnectError::Unreachable { address, source });
            }
            Err(_) => {
                state.transition(SessionState::Disconnected)?;
                return Err(ConnectError::TimedOut {
                    address,
                    timeout: config.connect_timeout,
                });
            }
        };

        Self::handshake(stream, &config.ami, &config.liveness).await
    }
}

impl<T> AmiSession<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Log in over an already established transport
    pub async fn handshake(
        io: T,
        ami: &AmiConfig,
        liveness: &LivenessConfig,
    ) -> Result<Self, ConnectError> {
        let mut session = Self {
            frames: Framed::new(io, AmiCodec::new()),
            state: SessionState::Connecting,
            liveness: Liveness::new(liveness.read_timeout),
            banner: None,
        };
        session.state.transition(SessionState::Authenticating)?;

        match session.login(ami).await {
            Ok(()) => {
                session.state.transition(SessionState::Active)?;
                Ok(session)
            }
            Err(e) => {
                session.state.transition(SessionState::Disconnected)?;
                Err(e)
            }
        }
    }

    /// Greeting line sent by the server, if one was received
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    async fn login(&mut self, ami: &AmiConfig) -> Result<(), ConnectError> {
        match self.read_handshake_frame().await? {
            AmiFrame::Banner(banner) => {
                tracing::info!("AMI Welcome: {}", banner);
                self.banner = Some(banner);
            }
            AmiFrame::Block(block) => {
                return Err(ConnectError::Handshake(format!(
                    "expected greeting, got block {block:?}"
                )));
            }
        }

        tracing::debug!("Logging in as '{}'", ami.username);
        self.frames
            .send(AmiAction::login(&ami.username, &ami.secret))
            .await
            .map_err(|e| ConnectError::Handshake(format!("failed to send login: {e}")))?;

        let AmiFrame::Block(response) = self.read_handshake_frame().await? else {
            return Err(ConnectError::Handshake("unexpected second greeting".into()));
        };

        match ami::login_outcome(&response) {
            LoginOutcome::Accepted => {
                tracing::info!("Successfully authenticated with AMI");
                Ok(())
            }
            LoginOutcome::Rejected => Err(ConnectError::AuthenticationFailed),
            LoginOutcome::Implicit => {
                tracing::debug!("Login response carried no authentication marker, continuing");
                Ok(())
            }
        }
    }

    async fn read_handshake_frame(&mut self) -> Result<AmiFrame, ConnectError> {
        match self.liveness.guard(self.frames.next()).await {
            Ok(Some(Ok(frame))) => {
                self.liveness.touch();
                Ok(frame)
            }
            Ok(Some(Err(e))) => Err(ConnectError::Handshake(e.to_string())),
            Ok(None) => Err(ConnectError::Handshake(
                "connection closed during login".into(),
            )),
            Err(e) => Err(ConnectError::Handshake(e.to_string())),
        }
    }

    /// Tear the session down after the stream ended on its own
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
impl<T> FrameSource for AmiSession<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn next_frame(&mut self) -> Result<Option<String>, StreamError> {
        if !self.state.is_active() {
            return Ok(None);
        }

        loop {
            let frame = match self.liveness.guard(self.frames.next()).await {
                Ok(Some(Ok(frame))) => frame,
                Ok(Some(Err(e))) => {
                    self.mark_ended();
                    return Err(e.into());
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

            match frame {
                AmiFrame::Block(block) if ami::is_event_block(&block) => return Ok(Some(block)),
                AmiFrame::Block(block) => {
                    if !block.is_empty() {
                        tracing::trace!("Discarding non-event AMI block");
                    }
                }
                AmiFrame::Banner(_) => {}
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
        tracing::debug!("Closing AMI connection");

        let result = self.frames.get_mut().shutdown().await;
        self.state = SessionState::Disconnected;
        result.map_err(StreamError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, DuplexStream};

    const BANNER: &[u8] = b"Asterisk Call Manager/5.0.1\r\n";

    /// Read until the login action's terminating blank line
    async fn read_login(server: &mut DuplexStream) -> String {
        let mut received = Vec::new();
        let mut buf = [0u8; 256];
        while !received.ends_with(b"\r\n\r\n") {
            let n = server.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed before sending login");
            received.extend_from_slice(&buf[..n]);
        }
        String::from_utf8(received).unwrap()
    }

    type LoginResult = (Result<AmiSession<DuplexStream>, ConnectError>, DuplexStream, String);

    async fn login_with_response(response: &'static [u8]) -> LoginResult {
        let (client, mut server) = duplex(4096);

        let server_task = tokio::spawn(async move {
            server.write_all(BANNER).await.unwrap();
            let login = read_login(&mut server).await;
            server.write_all(response).await.unwrap();
            (server, login)
        });

        let ami = AmiConfig {
            username: "relay".into(),
            secret: "hunter2".into(),
            ..AmiConfig::default()
        };
        let result = AmiSession::handshake(client, &ami, &LivenessConfig::default()).await;
        let (server, login) = server_task.await.unwrap();
        (result, server, login)
    }

    #[tokio::test]
    async fn test_login_accepted() {
        let (result, _server, login) =
            login_with_response(b"Response: Success\r\nMessage: Authentication accepted\r\n\r\n")
                .await;

        let session = result.unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.banner(), Some("Asterisk Call Manager/5.0.1"));
        assert_eq!(
            login,
            "Action: Login\r\nUsername: relay\r\nSecret: hunter2\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let (result, _server, _) =
            login_with_response(b"Response: Error\r\nMessage: Authentication failed\r\n\r\n").await;

        assert!(matches!(result, Err(ConnectError::AuthenticationFailed)));
    }

    #[tokio::test]
    async fn test_login_without_marker_is_accepted() {
        let (result, _server, _) = login_with_response(b"Response: Success\r\n\r\n").await;

        assert_eq!(result.unwrap().state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_bare_blank_line_counts_as_success() {
        let (result, _server, _) = login_with_response(b"\r\n").await;

        assert_eq!(result.unwrap().state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_connection_closed_during_login() {
        let (client, mut server) = duplex(4096);
        tokio::spawn(async move {
            server.write_all(BANNER).await.unwrap();
            let _ = read_login(&mut server).await;
            drop(server);
        });

        let result =
            AmiSession::handshake(client, &AmiConfig::default(), &LivenessConfig::default()).await;
        assert!(matches!(result, Err(ConnectError::Handshake(_))));
    }

    #[tokio::test]
    async fn test_only_event_blocks_are_frames() {
        let (result, mut server, _) = login_with_response(b"\r\n").await;
        let mut session = result.unwrap();

        server
            .write_all(
                b"Response: Success\r\nPing: Pong\r\n\r\n\
                  \r\n\r\n\
                  Event: Hangup\r\nCause: 16\r\n\r\n",
            )
            .await
            .unwrap();
        drop(server);

        let frame = session.next_frame().await.unwrap();
        assert_eq!(frame.as_deref(), Some("Event: Hangup\r\nCause: 16\r\n"));

        assert!(session.next_frame().await.unwrap().is_none());
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_transport_hits_read_deadline() {
        let (result, _server, _) = login_with_response(b"\r\n").await;
        let mut session = result.unwrap();
        let started = Instant::now();

        let err = session.next_frame().await.unwrap_err();

        assert!(matches!(err, StreamError::Timeout(_)));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(60) && elapsed < Duration::from_secs(61));
        assert!(!session.state().is_active());
    }

    #[tokio::test]
    async fn test_close_shuts_transport() {
        let (result, mut server, _) = login_with_response(b"\r\n").await;
        let mut session = result.unwrap();

        session.close().await.unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);

        let mut buf = [0u8; 16];
        assert_eq!(server.read(&mut buf).await.unwrap(), 0);
    }
}
