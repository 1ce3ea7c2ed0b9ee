//! Pseudo-terminal process host.
//!
//! Owns one OS process attached to a pty pair and exposes raw byte-level
//! read/write access to it: input goes to the pty master, output comes
//! back through a background reader thread, geometry changes propagate
//! to the child via the kernel.

pub mod host;
pub mod shell;

pub use host::{OutputReceiver, PtyError, PtyHost, PtyKiller, ReadOutcome, SpawnSpec};
pub use shell::default_shell;
