//! th-forwarder: Asterisk event to webhook relay
//!
//! Connects to Asterisk over the Manager Interface (AMI) or the REST
//! Interface (ARI), turns each event into a JSON envelope and POSTs the
//! selected ones to a single webhook.

pub mod forward;
pub mod reconnect;
pub mod relay;
pub mod session;
pub mod webhook;

pub use forward::{ExitReason, Forwarder, Heartbeat, LoopExit};
pub use reconnect::ExponentialBackoff;
pub use relay::{adapter_for, connect_source, Relay};
pub use webhook::WebhookDispatcher;
