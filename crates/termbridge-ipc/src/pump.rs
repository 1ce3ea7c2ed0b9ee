//! Event pump: delivers session-manager events to the UI sink.

use termbridge_common::SessionEvent;
use termbridge_session::EventStream;

use crate::bridge::TerminalBridge;

impl TerminalBridge {
    /// Consume the manager's event stream until it closes, emitting one
    /// UI event per chunk.
    ///
    /// Run exactly one pump per stream: the single consumer preserves
    /// channel order, which is sequence order within a session. The pump
    /// is byte-transparent: payloads go out as the process produced
    /// them, converted to text for the JSON wire.
    pub async fn run_event_pump(&self, mut events: EventStream) {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Output(chunk) => {
                    let text = String::from_utf8_lossy(&chunk.payload);
                    let payload = serde_json::json!({ "payload": text });
                    if let Err(e) = self.sink.emit("terminal_output", &payload) {
                        tracing::warn!(
                            session_id = %chunk.session_id,
                            seq = chunk.seq,
                            error = %e,
                            "failed to deliver terminal output"
                        );
                    }
                }
                SessionEvent::Ended { session_id, code } => {
                    tracing::info!(session_id = %session_id, code, "delivering session end");
                    let payload = serde_json::json!({ "code": code });
                    if let Err(e) = self.sink.emit("terminal_exit", &payload) {
                        tracing::warn!(
                            session_id = %session_id,
                            error = %e,
                            "failed to deliver terminal exit"
                        );
                    }

                    // Drop the stale current-session id so the next
                    // terminal_ready spawns afresh
                    let mut current = self.current.lock().unwrap();
                    if current.as_ref() == Some(&session_id) {
                        *current = None;
                    }
                }
            }
        }
        tracing::debug!("event stream closed, pump exiting");
    }
}
