//! The session manager: spawn, write, resize, close, and the per-session
//! read loop that stamps sequence numbers and feeds the event stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tokio::sync::mpsc;

use termbridge_common::{OutputChunk, SessionEvent, SessionId};
use termbridge_pty::{OutputReceiver, PtyHost, SpawnSpec};

use crate::errors::SessionError;
use crate::session::{Session, SessionState};

/// Receiving end of the manager's ordered event stream.
pub type EventStream = mpsc::Receiver<SessionEvent>;

struct Inner {
    /// The only structure shared between the command path and the read
    /// loops. Insert on spawn, remove on finalize, both under the lock.
    sessions: Mutex<HashMap<SessionId, Session>>,
    events_tx: mpsc::Sender<SessionEvent>,
}

/// Manages all interactive process sessions, keyed by session id.
///
/// Cloning the manager clones a handle to the same session map and
/// event stream.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Create a manager and the event stream it feeds.
    ///
    /// `output_capacity` bounds the event channel in chunks; a full
    /// channel back-pressures the read loops instead of dropping output.
    pub fn new(output_capacity: usize) -> (Self, EventStream) {
        let (events_tx, events_rx) = mpsc::channel(output_capacity.max(1));
        let manager = Self {
            inner: Arc::new(Inner {
                sessions: Mutex::new(HashMap::new()),
                events_tx,
            }),
        };
        (manager, events_rx)
    }

    /// Spawn a new session running `spec` with the given geometry.
    ///
    /// On success the session is `Running` and its read loop is live.
    /// On failure nothing is retained.
    pub fn spawn_session(
        &self,
        spec: &SpawnSpec,
        rows: u16,
        cols: u16,
    ) -> Result<SessionId, SessionError> {
        let mut host =
            PtyHost::spawn(spec, rows, cols).map_err(|e| SessionError::Spawn(e.to_string()))?;

        let reader = host
            .take_reader()
            .ok_or_else(|| SessionError::Spawn("pty output stream unavailable".into()))?;

        let id = SessionId::new();
        let killer = Arc::new(Mutex::new(host.clone_killer()));
        let host = Arc::new(Mutex::new(host));
        let cancel = Arc::new(AtomicBool::new(false));

        {
            let mut sessions = self.inner.sessions.lock().unwrap();
            sessions.insert(
                id.clone(),
                Session {
                    state: SessionState::Created,
                    host: Arc::clone(&host),
                    killer,
                    cancel: Arc::clone(&cancel),
                },
            );
        }

        let inner = Arc::clone(&self.inner);
        let loop_id = id.clone();
        let loop_host = Arc::clone(&host);
        let spawned = thread::Builder::new()
            .name("session-read".to_string())
            .spawn(move || read_loop(inner, loop_id, reader, loop_host, cancel));

        if let Err(e) = spawned {
            self.inner.sessions.lock().unwrap().remove(&id);
            host.lock().unwrap().terminate();
            return Err(SessionError::Spawn(format!(
                "failed to start read loop: {e}"
            )));
        }

        {
            let mut sessions = self.inner.sessions.lock().unwrap();
            if let Some(session) = sessions.get_mut(&id) {
                // Spawn succeeded; the session is live. The guard keeps a
                // session whose child exited instantly from reviving.
                if session.state == SessionState::Created {
                    session.state = SessionState::Running;
                }
            }
        }

        tracing::info!(session_id = %id, rows, cols, program = %spec.program, "session spawned");
        Ok(id)
    }

    /// Write raw input bytes to a running session's process.
    ///
    /// The per-session host mutex serializes concurrent writers, so one
    /// caller's bytes are never interleaved with another's. May block
    /// briefly when the kernel pty buffer is full.
    pub fn write_input(&self, id: &SessionId, data: &[u8]) -> Result<(), SessionError> {
        let host = self.running_host(id)?;
        let mut host = host.lock().unwrap();
        host.write(data).map_err(|e| {
            tracing::warn!(session_id = %id, error = %e, "session write failed");
            SessionError::Io(e.to_string())
        })
    }

    /// Propagate a geometry change to a session's process.
    ///
    /// Resizing a `Closed` session is a reported no-op, not an error;
    /// an unknown id is.
    pub fn resize(&self, id: &SessionId, rows: u16, cols: u16) -> Result<(), SessionError> {
        let host = {
            let sessions = self.inner.sessions.lock().unwrap();
            let session = sessions
                .get(id)
                .ok_or_else(|| SessionError::NotFound(id.clone()))?;
            match session.state {
                SessionState::Running => Arc::clone(&session.host),
                _ => {
                    tracing::warn!(session_id = %id, "resize on closed session ignored");
                    return Ok(());
                }
            }
        };

        let mut host = host.lock().unwrap();
        host.resize(rows, cols).map_err(|e| {
            tracing::warn!(session_id = %id, error = %e, "session resize failed");
            SessionError::Io(e.to_string())
        })?;
        tracing::debug!(session_id = %id, rows, cols, "session resized");
        Ok(())
    }

    /// Close a session: transition it to `Closed`, stop its read loop,
    /// and release the process exactly once.
    ///
    /// The read loop emits the terminal `Ended` event after the last
    /// chunk it delivered. Idempotent: closing an unknown or already
    /// closed session has no observable effect.
    pub fn close(&self, id: &SessionId) {
        let killer = {
            let mut sessions = self.inner.sessions.lock().unwrap();
            match sessions.get_mut(id) {
                None => return,
                Some(session) if session.state == SessionState::Closed => return,
                Some(session) => {
                    // Exclusive state transition before the resources go:
                    // any write_input racing with this close either got
                    // the host before us (and completes or fails with a
                    // pipe error) or sees `Closed` and never touches it.
                    session.state = SessionState::Closed;
                    session.cancel.store(true, Ordering::SeqCst);
                    Arc::clone(&session.killer)
                }
            }
        };

        tracing::info!(session_id = %id, "session close requested");

        // The kill handle bypasses the host mutex, so close stays prompt
        // even while a backpressured write holds the host. The dying
        // child closes the pty, which unblocks the read loop; the loop
        // then finalizes and emits `Ended`.
        killer.lock().unwrap().kill();
    }

    /// Close every session. Used during graceful shutdown.
    pub fn close_all(&self) {
        let ids: Vec<SessionId> = {
            let sessions = self.inner.sessions.lock().unwrap();
            sessions.keys().cloned().collect()
        };
        let count = ids.len();
        for id in ids {
            self.close(&id);
        }
        if count > 0 {
            tracing::info!(count, "all sessions closed");
        }
    }

    /// Lifecycle state of a session, `None` once it has been torn down.
    pub fn state(&self, id: &SessionId) -> Option<SessionState> {
        let sessions = self.inner.sessions.lock().unwrap();
        sessions.get(id).map(|s| s.state)
    }

    /// Current recorded geometry of a session as `(rows, cols)`.
    pub fn geometry(&self, id: &SessionId) -> Option<(u16, u16)> {
        let host = {
            let sessions = self.inner.sessions.lock().unwrap();
            sessions.get(id).map(|s| Arc::clone(&s.host))?
        };
        let host = host.lock().unwrap();
        Some(host.geometry())
    }

    /// Number of sessions currently tracked.
    pub fn session_count(&self) -> usize {
        self.inner.sessions.lock().unwrap().len()
    }

    fn running_host(&self, id: &SessionId) -> Result<Arc<Mutex<PtyHost>>, SessionError> {
        let sessions = self.inner.sessions.lock().unwrap();
        let session = sessions
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;
        match session.state {
            SessionState::Running => Ok(Arc::clone(&session.host)),
            _ => Err(SessionError::Closed(id.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// Read loop
// ---------------------------------------------------------------------------

/// One per running session. Blocks on the host's output channel, stamps
/// each chunk with the next sequence number (this loop is the counter's
/// sole writer), and forwards it with backpressure. Exits when the
/// channel disconnects (child exit, pty error, or close-kill) and then
/// finalizes the session.
fn read_loop(
    inner: Arc<Inner>,
    id: SessionId,
    reader: OutputReceiver,
    host: Arc<Mutex<PtyHost>>,
    cancel: Arc<AtomicBool>,
) {
    let mut seq: u64 = 0;

    while let Ok(data) = reader.recv() {
        if cancel.load(Ordering::SeqCst) {
            // Closing: drain the channel toward disconnect without
            // delivering for a session that is no longer alive.
            continue;
        }
        if data.is_empty() {
            continue;
        }

        let chunk = OutputChunk {
            session_id: id.clone(),
            seq,
            payload: data,
        };
        seq += 1;

        if inner
            .events_tx
            .blocking_send(SessionEvent::Output(chunk))
            .is_err()
        {
            // The event stream consumer is gone; no one left to deliver to.
            break;
        }
    }

    finalize(&inner, &id, &host);
}

/// Tear a session down exactly once: mark `Closed`, reap the child,
/// remove the entry, and emit `Ended` as the session's last event.
fn finalize(inner: &Inner, id: &SessionId, host: &Mutex<PtyHost>) {
    {
        let mut sessions = inner.sessions.lock().unwrap();
        if let Some(session) = sessions.get_mut(id) {
            session.state = SessionState::Closed;
        }
    }

    let code = host.lock().unwrap().terminate().unwrap_or(0);

    inner.sessions.lock().unwrap().remove(id);
    tracing::info!(session_id = %id, code, "session ended");

    let _ = inner.events_tx.blocking_send(SessionEvent::Ended {
        session_id: id.clone(),
        code,
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
