//! IPC bridge between a UI-hosted terminal widget and the session manager.
//!
//! Adapts the UI's two primitives (an input command and an output event
//! stream) onto session-manager operations. The bridge is byte
//! transparent: it never interprets the bytes flowing in either
//! direction.

pub mod bridge;
pub mod errors;
pub mod message;
pub mod pump;
pub mod sink;

pub use bridge::{is_kind_allowed, TerminalBridge};
pub use errors::BridgeError;
pub use message::{IpcMessage, IpcPayload};
pub use sink::{EventSink, SinkError};
