//! Relay wiring
//!
//! Picks the session and adapter for the configured protocol and keeps the
//! forwarding loop running until shutdown, the session ending, or (with
//! reconnect enabled) a non-retryable connect failure.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use th_core::config::{Protocol, RelayConfig};
use th_core::{ConfigError, ConnectError, FrameSource, RelayError, StreamError};
use th_protocol::{AmiAdapter, AriAdapter, ProtocolAdapter};

use crate::forward::{ExitReason, Forwarder};
use crate::reconnect::ExponentialBackoff;
use crate::session::{AmiSession, AriSession};
use crate::webhook::WebhookDispatcher;

/// Adapter for a protocol, chosen once per process
pub fn adapter_for(protocol: Protocol) -> Arc<dyn ProtocolAdapter> {
    match protocol {
        Protocol::Ami => Arc::new(AmiAdapter),
        Protocol::Ari => Arc::new(AriAdapter),
    }
}

/// Establish an authenticated session for the configured protocol
pub async fn connect_source(config: &RelayConfig) -> Result<Box<dyn FrameSource>, ConnectError> {
    let source: Box<dyn FrameSource> = match config.protocol {
        Protocol::Ami => Box::new(AmiSession::connect(config).await?),
        Protocol::Ari => Box::new(AriSession::connect(config).await?),
    };
    Ok(source)
}

/// Whether a connect error can go away by trying again
fn is_retryable(err: &ConnectError) -> bool {
    !matches!(
        err,
        ConnectError::AuthenticationFailed
            | ConnectError::RegistrationRejected { .. }
            | ConnectError::InvalidAddress(_)
    )
}

/// A configured relay, ready to run against a connected session
pub struct Relay {
    config: RelayConfig,
    adapter: Arc<dyn ProtocolAdapter>,
    dispatcher: WebhookDispatcher,
}

impl Relay {
    /// Create a relay for the configured protocol and webhook
    pub fn new(config: RelayConfig) -> Result<Self, ConfigError> {
        let adapter = adapter_for(config.protocol);
        let dispatcher = WebhookDispatcher::new(&config.webhook, adapter.user_agent())?;
        Ok(Self {
            config,
            adapter,
            dispatcher,
        })
    }

    /// Forward events from `source` until shutdown or the session ends
    ///
    /// Returns `Ok` only on shutdown. Without reconnect, a session ending on
    /// its own is an error so the process exits non-zero.
    pub async fn run(
        self,
        source: Box<dyn FrameSource>,
        cancel: CancellationToken,
    ) -> Result<(), RelayError> {
        let Relay {
            config,
            adapter,
            dispatcher,
        } = self;

        let mut forwarder = Forwarder::new(adapter, dispatcher, &config.liveness);
        let mut backoff = ExponentialBackoff::from_config(&config.reconnect);
        let mut source = source;

        loop {
            let exit = forwarder.run(source.as_mut(), &cancel).await;

            let err = match exit.reason {
                ExitReason::Shutdown => {
                    tracing::info!(
                        count = exit.forwarded,
                        "Relay stopped after {} events",
                        exit.forwarded
                    );
                    return Ok(());
                }
                ExitReason::EndOfStream => {
                    tracing::warn!("{} session ended by peer", config.protocol);
                    StreamError::Closed
                }
                ExitReason::ReadError(e) => {
                    tracing::error!("{} session read failed: {}", config.protocol, e);
                    e
                }
            };

            if !config.reconnect.enabled {
                return Err(err.into());
            }

            source = match reconnect(&config, &mut backoff, &cancel).await? {
                Some(source) => source,
                None => return Ok(()),
            };
        }
    }
}

/// Keep connecting until a session is up
///
/// `Ok(None)` means shutdown was requested while waiting.
async fn reconnect(
    config: &RelayConfig,
    backoff: &mut ExponentialBackoff,
    cancel: &CancellationToken,
) -> Result<Option<Box<dyn FrameSource>>, ConnectError> {
    loop {
        let delay = backoff.next_delay();
        tracing::info!("Reconnecting in {:?} (attempt {})", delay, backoff.attempts());

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            _ = tokio::time::sleep(delay) => {}
        }

        let attempt = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            attempt = connect_source(config) => attempt,
        };

        match attempt {
            Ok(source) => {
                tracing::info!("Reconnected to {}", config.protocol);
                backoff.reset();
                return Ok(Some(source));
            }
            Err(e) if is_retryable(&e) => {
                tracing::warn!("Reconnect failed: {}", e);
            }
            Err(e) => {
                tracing::error!("Reconnect failed, giving up: {}", e);
                return Err(e);
            }
        }
    }
}
