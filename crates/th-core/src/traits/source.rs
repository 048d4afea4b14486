//! Frame source trait

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::StreamError;
use crate::session::SessionState;

/// Read side of a session, as seen by the forwarding loop
///
/// The session manager owns the transport and its state; the loop can only
/// pull frames, query liveness and ask for a close.
#[async_trait]
pub trait FrameSource: Send {
    /// Read the next frame
    ///
    /// Returns `Ok(None)` at end of stream. Any error ends the session.
    async fn next_frame(&mut self) -> Result<Option<String>, StreamError>;

    /// Current session state
    fn state(&self) -> SessionState;

    /// Time of the last successful read
    fn last_activity(&self) -> Instant;

    /// Close the transport gracefully
    async fn close(&mut self) -> Result<(), StreamError>;
}
