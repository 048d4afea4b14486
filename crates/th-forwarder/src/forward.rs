//! Forwarding loop
//!
//! Pulls frames from a [`FrameSource`], turns them into events with the
//! session's adapter and delivers the ones that pass the classifier. Frame
//! and delivery failures are logged and skipped; only the session ending or
//! a shutdown request stops the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use th_core::config::LivenessConfig;
use th_core::{DeliveryError, FrameSource, StreamError};
use th_protocol::{DeliveryEnvelope, ProtocolAdapter};

use crate::webhook::WebhookDispatcher;

/// Periodic progress line, independent of the read deadline
#[derive(Debug, Clone)]
pub struct Heartbeat {
    interval: Duration,
    last_log: Instant,
}

impl Heartbeat {
    /// Start the interval from now
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_log: Instant::now(),
        }
    }

    /// Log the forwarded count if more than one interval has passed
    ///
    /// Returns whether a line was emitted.
    pub fn observe(&mut self, now: Instant, forwarded: u64) -> bool {
        if now.saturating_duration_since(self.last_log) <= self.interval {
            return false;
        }
        tracing::info!(count = forwarded, "Heartbeat: forwarded {} events so far", forwarded);
        self.last_log = now;
        true
    }
}

/// Why the loop stopped
#[derive(Debug)]
pub enum ExitReason {
    /// Shutdown was requested; the session has been closed
    Shutdown,
    /// The peer ended the stream
    EndOfStream,
    /// Reading failed
    ReadError(StreamError),
}

/// Result of one [`Forwarder::run`]
#[derive(Debug)]
pub struct LoopExit {
    /// Events that passed the classifier, across all runs of this forwarder
    pub forwarded: u64,
    pub reason: ExitReason,
}

/// What happened to a single frame
#[derive(Debug)]
pub enum FrameOutcome {
    /// Frame could not be parsed
    Rejected,
    /// Event parsed but not selected for delivery
    Filtered,
    /// Event delivered
    Delivered,
    /// Event selected but the delivery failed
    Failed(DeliveryError),
}

/// Drives frames from a session to the webhook
pub struct Forwarder {
    adapter: Arc<dyn ProtocolAdapter>,
    dispatcher: WebhookDispatcher,
    heartbeat: Heartbeat,
    forwarded: u64,
}

impl Forwarder {
    /// Create a forwarder sending the adapter's events through `dispatcher`
    pub fn new(
        adapter: Arc<dyn ProtocolAdapter>,
        dispatcher: WebhookDispatcher,
        liveness: &LivenessConfig,
    ) -> Self {
        Self {
            adapter,
            dispatcher,
            heartbeat: Heartbeat::new(liveness.heartbeat_interval),
            forwarded: 0,
        }
    }

    /// Events selected for delivery so far
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    /// Run until the stream ends, a read fails or `cancel` fires
    ///
    /// On cancellation the session is closed before returning. A delivery
    /// already in progress is allowed to finish.
    pub async fn run(
        &mut self,
        source: &mut dyn FrameSource,
        cancel: &CancellationToken,
    ) -> LoopExit {
        tracing::info!(source = self.adapter.source(), "Listening for events");

        let reason = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = source.next_frame() => Some(next),
            };

            let Some(next) = next else {
                tracing::info!("Shutdown requested, closing session");
                if let Err(e) = source.close().await {
                    tracing::debug!("Error while closing session: {}", e);
                }
                break ExitReason::Shutdown;
            };

            match next {
                Ok(Some(frame)) => {
                    self.handle_frame(&frame).await;
                }
                Ok(None) => break ExitReason::EndOfStream,
                Err(e) => break ExitReason::ReadError(e),
            }
        };

        LoopExit {
            forwarded: self.forwarded,
            reason,
        }
    }

    /// Parse, classify and deliver one frame
    pub async fn handle_frame(&mut self, frame: &str) -> FrameOutcome {
        self.heartbeat.observe(Instant::now(), self.forwarded);

        let event = match self.adapter.parse(frame) {
            Ok(event) => event,
            Err(e) if e.is_recoverable() => {
                tracing::warn!("Skipping unparsable frame: {}", e);
                return FrameOutcome::Rejected;
            }
            Err(e) => {
                tracing::debug!("Skipping frame: {}", e);
                return FrameOutcome::Rejected;
            }
        };

        if !self.adapter.should_forward(&event) {
            tracing::trace!(event_type = event.event_type(), "Filtered event");
            return FrameOutcome::Filtered;
        }

        self.forwarded += 1;
        tracing::info!(
            event_type = event.event_type(),
            count = self.forwarded,
            "Received {} event #{}",
            event.event_type(),
            self.forwarded
        );

        let envelope = DeliveryEnvelope::new(self.adapter.source(), &event);
        match self.dispatcher.deliver(&envelope).await {
            Ok(()) => {
                tracing::info!(
                    event_type = envelope.event_type.as_str(),
                    "Successfully forwarded event '{}' to webhook",
                    envelope.event_type
                );
                FrameOutcome::Delivered
            }
            Err(e) => {
                tracing::warn!(
                    event_type = envelope.event_type.as_str(),
                    status = e.status(),
                    "Failed to send event '{}' to webhook: {}",
                    envelope.event_type,
                    e
                );
                FrameOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use th_core::config::WebhookConfig;
    use th_core::SessionState;
    use th_protocol::{AmiAdapter, AriAdapter};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Scripted source: yields the queued frames, then ends or fails
    struct FakeSource {
        frames: VecDeque<Result<String, StreamError>>,
        state: SessionState,
        closed: bool,
    }

    impl FakeSource {
        fn new(frames: &[&str]) -> Self {
            Self {
                frames: frames.iter().map(|f| Ok(f.to_string())).collect(),
                state: SessionState::Active,
                closed: false,
            }
        }
    }

    #[async_trait]
    impl FrameSource for FakeSource {
        async fn next_frame(&mut self) -> Result<Option<String>, StreamError> {
            match self.frames.pop_front() {
                Some(Ok(frame)) => Ok(Some(frame)),
                Some(Err(e)) => {
                    self.state = SessionState::Disconnected;
                    Err(e)
                }
                None => {
                    self.state = SessionState::Disconnected;
                    Ok(None)
                }
            }
        }

        fn state(&self) -> SessionState {
            self.state
        }

        fn last_activity(&self) -> Instant {
            Instant::now()
        }

        async fn close(&mut self) -> Result<(), StreamError> {
            self.closed = true;
            self.state = SessionState::Disconnected;
            Ok(())
        }
    }

    async fn forwarder(server: &MockServer, adapter: Arc<dyn ProtocolAdapter>) -> Forwarder {
        let config = WebhookConfig {
            url: server.uri(),
            timeout: Duration::from_secs(5),
        };
        let dispatcher = WebhookDispatcher::new(&config, adapter.user_agent()).unwrap();
        Forwarder::new(adapter, dispatcher, &LivenessConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_logs_once_per_interval() {
        let mut heartbeat = Heartbeat::new(Duration::from_secs(60));
        let start = Instant::now();

        assert!(!heartbeat.observe(start + Duration::from_secs(30), 1));
        assert!(!heartbeat.observe(start + Duration::from_secs(60), 2));
        assert!(heartbeat.observe(start + Duration::from_secs(61), 3));
        assert!(!heartbeat.observe(start + Duration::from_secs(90), 4));
        assert!(heartbeat.observe(start + Duration::from_secs(122), 5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_checked_for_rejected_frames() {
        let adapter: Arc<dyn ProtocolAdapter> = Arc::new(AriAdapter);
        let config = WebhookConfig {
            url: "http://127.0.0.1:9/webhook".into(),
            timeout: Duration::from_secs(5),
        };
        let dispatcher = WebhookDispatcher::new(&config, adapter.user_agent()).unwrap();
        let mut forwarder = Forwarder::new(adapter, dispatcher, &LivenessConfig::default());
        let started = forwarder.heartbeat.last_log;

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(matches!(forwarder.handle_frame("not json").await, FrameOutcome::Rejected));

        assert_eq!(forwarder.heartbeat.last_log, started + Duration::from_secs(61));
    }

    #[tokio::test]
    async fn test_counts_only_classified_events() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let mut forwarder = forwarder(&server, Arc::new(AmiAdapter)).await;
        let mut source = FakeSource::new(&[
            "Event: Hangup\r\nCause: 16\r\n",
            "Event: FullyBooted\r\n",
            "Event: Newchannel\r\nChannel: PJSIP/1001\r\n",
        ]);

        let exit = forwarder.run(&mut source, &CancellationToken::new()).await;

        assert!(matches!(exit.reason, ExitReason::EndOfStream));
        assert_eq!(exit.forwarded, 2);
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_reading() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let mut forwarder = forwarder(&server, Arc::new(AmiAdapter)).await;

        let outcome = forwarder.handle_frame("Event: Hangup\r\n").await;
        assert!(matches!(outcome, FrameOutcome::Failed(DeliveryError::Status(500))));

        let mut source = FakeSource::new(&["Event: Dial\r\n", "Event: Hold\r\n"]);
        let exit = forwarder.run(&mut source, &CancellationToken::new()).await;

        assert!(matches!(exit.reason, ExitReason::EndOfStream));
        assert_eq!(exit.forwarded, 3);
        assert!(source.frames.is_empty());
    }

    #[tokio::test]
    async fn test_unparsable_frames_are_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut forwarder = forwarder(&server, Arc::new(AriAdapter)).await;

        assert!(matches!(forwarder.handle_frame("not json").await, FrameOutcome::Rejected));
        assert!(matches!(forwarder.handle_frame("[1, 2]").await, FrameOutcome::Rejected));
        assert!(matches!(
            forwarder.handle_frame(r#"{"channel": {}}"#).await,
            FrameOutcome::Rejected
        ));
        assert!(matches!(
            forwarder.handle_frame(r#"{"type": "ChannelDtmfReceived", "digit": "5"}"#).await,
            FrameOutcome::Delivered
        ));
        assert_eq!(forwarder.forwarded(), 1);
    }

    #[tokio::test]
    async fn test_read_error_ends_loop() {
        let server = MockServer::start().await;
        let mut forwarder = forwarder(&server, Arc::new(AmiAdapter)).await;
        let mut source = FakeSource::new(&[]);
        source
            .frames
            .push_back(Err(StreamError::Timeout(Duration::from_secs(60))));

        let exit = forwarder.run(&mut source, &CancellationToken::new()).await;

        assert!(matches!(exit.reason, ExitReason::ReadError(StreamError::Timeout(_))));
        assert_eq!(exit.forwarded, 0);
    }

    #[tokio::test]
    async fn test_cancel_closes_source() {
        let server = MockServer::start().await;
        let mut forwarder = forwarder(&server, Arc::new(AmiAdapter)).await;
        let mut source = FakeSource::new(&["Event: Hangup\r\n"]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let exit = forwarder.run(&mut source, &cancel).await;

        assert!(matches!(exit.reason, ExitReason::Shutdown));
        assert!(source.closed);
        assert_eq!(source.frames.len(), 1);
    }
}
