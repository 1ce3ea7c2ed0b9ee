use termbridge_common::SessionId;

/// Errors reported by session-manager operations.
///
/// `NotFound` and `Closed` are local misuse errors: they are returned to
/// the caller synchronously and never reach the child process.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to spawn session: {0}")]
    Spawn(String),

    #[error("session io error: {0}")]
    Io(String),

    #[error("no such session: {0}")]
    NotFound(SessionId),

    #[error("session closed: {0}")]
    Closed(SessionId),
}
