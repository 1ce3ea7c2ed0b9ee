use termbridge_session::SessionError;

/// Errors reported by the IPC bridge to its host runtime.
///
/// All of these are local: they go back to the caller (and the log),
/// never to the child process.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("malformed ipc message")]
    Malformed,

    #[error("ipc kind not allowed: {0}")]
    KindNotAllowed(String),

    #[error("missing or invalid field '{0}'")]
    MissingField(&'static str),

    #[error("no running session")]
    NoActiveSession,

    #[error(transparent)]
    Session(#[from] SessionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(BridgeError::Malformed.to_string(), "malformed ipc message");
        assert_eq!(
            BridgeError::KindNotAllowed("eval".into()).to_string(),
            "ipc kind not allowed: eval"
        );
        assert_eq!(
            BridgeError::MissingField("key").to_string(),
            "missing or invalid field 'key'"
        );
        assert_eq!(
            BridgeError::NoActiveSession.to_string(),
            "no running session"
        );
    }

    #[test]
    fn session_error_passes_through() {
        let err: BridgeError = SessionError::Spawn("denied".into()).into();
        assert!(err.to_string().contains("denied"));
    }
}
