//! Session manager for pty-backed interactive processes.
//!
//! Owns one [`termbridge_pty::PtyHost`] per session id, drives a read
//! loop per running session, and emits a per-session-ordered stream of
//! [`termbridge_common::SessionEvent`]s over a bounded channel.

pub mod errors;
pub mod manager;
pub mod session;

pub use errors::SessionError;
pub use manager::{EventStream, SessionManager};
pub use session::SessionState;
