//! Line-delimited JSON event sink over stdout.
//!
//! Each emitted event becomes one `{"kind":...,"payload":...}` line.
//! stdout carries only the event stream; logs go to stderr.

use std::io::{self, Write};
use std::sync::Mutex;

use termbridge_ipc::{EventSink, SinkError};

pub struct StdioSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl StdioSink {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }
}

impl EventSink for StdioSink {
    fn emit(&self, kind: &str, payload: &serde_json::Value) -> Result<(), SinkError> {
        let line = serde_json::json!({ "kind": kind, "payload": payload });
        // The mutex keeps concurrent emitters from interleaving lines
        let mut out = self.out.lock().unwrap();
        writeln!(out, "{line}").map_err(|e| SinkError(e.to_string()))?;
        out.flush().map_err(|e| SinkError(e.to_string()))
    }
}
