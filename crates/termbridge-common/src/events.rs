use serde::{Deserialize, Serialize};

use crate::id::SessionId;

/// One ordered unit of raw bytes captured from a session's process output.
///
/// `seq` is stamped by the session's read loop and is strictly increasing
/// with no gaps for the lifetime of the session. Chunks are transient:
/// they are handed to the IPC bridge for delivery and not retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputChunk {
    pub session_id: SessionId,
    pub seq: u64,
    pub payload: Vec<u8>,
}

/// Events produced by the session manager's read loops.
///
/// Within one session, `Output` events arrive in `seq` order and `Ended`
/// arrives exactly once, after the last delivered chunk. Across sessions
/// there is no ordering guarantee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionEvent {
    #[serde(rename = "output")]
    Output(OutputChunk),

    #[serde(rename = "ended")]
    Ended { session_id: SessionId, code: u32 },
}

impl SessionEvent {
    /// The session this event belongs to.
    pub fn session_id(&self) -> &SessionId {
        match self {
            SessionEvent::Output(chunk) => &chunk.session_id,
            SessionEvent::Ended { session_id, .. } => session_id,
        }
    }
}
