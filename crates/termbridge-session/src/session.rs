//! Per-session bookkeeping: lifecycle state and the owned host handle.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use termbridge_pty::{PtyHost, PtyKiller};

/// Session lifecycle. `Created` becomes `Running` as soon as the spawn
/// completes; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Running,
    Closed,
}

/// One entry in the session map.
///
/// The host mutex serializes write, resize, and reap against each other.
/// The killer is deliberately outside it: close must be able to signal
/// the child while a backpressured write still holds the host.
pub(crate) struct Session {
    pub(crate) state: SessionState,
    pub(crate) host: Arc<Mutex<PtyHost>>,
    pub(crate) killer: Arc<Mutex<PtyKiller>>,
    /// Tells the read loop to stop delivering chunks while it drains
    /// toward disconnect during an explicit close.
    pub(crate) cancel: Arc<AtomicBool>,
}
