//! th-protocol: Wire protocols and event model for Telehook
//!
//! This crate turns raw Asterisk control-channel traffic into canonical
//! [`Event`]s. It covers the line-oriented Manager Interface (AMI) and the
//! JSON event stream of the REST Interface (ARI), the allow-set used to
//! filter AMI chatter, and the envelope delivered to webhooks.

pub mod adapter;
pub mod ami;
pub mod ari;
pub mod classify;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod event;

pub use adapter::ProtocolAdapter;
pub use ami::AmiAdapter;
pub use ari::AriAdapter;
pub use codec::{AmiAction, AmiCodec, AmiFrame, MAX_LINE_LENGTH};
pub use envelope::DeliveryEnvelope;
pub use error::ProtocolError;
pub use event::{Attributes, Event};
