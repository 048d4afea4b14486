//! Session managers for the two event sources
//!
//! Each session owns its transport for its whole lifetime and exposes only
//! the [`FrameSource`](th_core::FrameSource) capability to the forwarding
//! loop. Sessions never reconnect on their own.

pub mod ami;
pub mod ari;
mod liveness;

pub use ami::AmiSession;
pub use ari::{register_application, AriSession};
pub use liveness::Liveness;
