//! th-core: Core abstractions and configuration for Telehook
//!
//! This crate provides the configuration model, the error taxonomy and the
//! session abstractions shared by the forwarder's session managers and its
//! forwarding loop.

pub mod config;
pub mod error;
pub mod session;
pub mod traits;

pub use error::{ConfigError, ConnectError, DeliveryError, RelayError, StreamError};
pub use session::SessionState;
pub use traits::FrameSource;
