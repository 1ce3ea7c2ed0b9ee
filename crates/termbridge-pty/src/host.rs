//! PTY process host built on the `portable-pty` crate.
//!
//! [`PtyHost`] owns the master side of one pty pair and the child process
//! spawned onto its slave. Output is read on a background thread and
//! buffered in a channel, so reads never block the caller; the channel
//! receiver can be taken by a session read loop that wants to block on
//! data availability instead of polling.

use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use crate::shell::{build_command, default_shell};

/// Default maximum bytes per pty read.
pub const DEFAULT_READ_CHUNK: usize = 8_192;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors originating from pty operations.
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    #[error("failed to spawn process: {0}")]
    SpawnFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to resize pty: {0}")]
    ResizeFailed(String),
}

// ---------------------------------------------------------------------------
// Spawn spec
// ---------------------------------------------------------------------------

/// What to run inside the pty and how.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    /// Program to execute.
    pub program: String,
    /// Arguments passed after any login-shell flag.
    pub args: Vec<String>,
    /// Working directory; `None` inherits the host's.
    pub cwd: Option<PathBuf>,
    /// Extra environment variables, applied after sanitization.
    pub env: Vec<(String, String)>,
    /// Value of `TERM` inside the child.
    pub term: String,
    /// Pass `-l` on unix so shells load the user's profile.
    pub login_shell: bool,
    /// Maximum bytes per read on the reader thread.
    pub read_chunk: usize,
}

impl SpawnSpec {
    /// Spec for the user's default interactive shell.
    pub fn shell() -> Self {
        Self {
            program: default_shell(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            term: "xterm-256color".into(),
            login_shell: true,
            read_chunk: DEFAULT_READ_CHUNK,
        }
    }

    /// Spec for an arbitrary command (no login-shell flag).
    pub fn command(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            term: "xterm-256color".into(),
            login_shell: false,
            read_chunk: DEFAULT_READ_CHUNK,
        }
    }
}

// ---------------------------------------------------------------------------
// Read outcome
// ---------------------------------------------------------------------------

/// Outcome of a non-blocking read against the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Output bytes currently available.
    Data(Vec<u8>),
    /// Nothing available right now; poll again later.
    WouldBlock,
    /// The child exited and the output stream is fully drained.
    Eof,
}

/// Receiving end of the host's output channel. `recv()` on it blocks
/// until the child produces output or exits.
pub type OutputReceiver = mpsc::Receiver<Vec<u8>>;

/// Handle that can signal the child without holding the host.
///
/// Lets a close path kill the process while a backpressured write still
/// holds the host; the dying child breaks the pipe and the write fails
/// cleanly instead of blocking teardown.
pub struct PtyKiller(Box<dyn ChildKiller + Send + Sync>);

impl PtyKiller {
    /// Send the termination signal. The process may already be gone.
    pub fn kill(&mut self) {
        if let Err(e) = self.0.kill() {
            tracing::debug!("pty kill error (may already be dead): {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// PtyHost
// ---------------------------------------------------------------------------

/// Owns one pty pair and the child process spawned onto it.
///
/// The host's OS resources (process + pty descriptors) are released
/// exactly once, by [`PtyHost::terminate`] or on drop.
pub struct PtyHost {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    output_rx: Option<OutputReceiver>,
    size: PtySize,
    exit_status: Option<u32>,
}

impl PtyHost {
    /// Allocate a pty pair, spawn `spec` onto the slave with the given
    /// initial geometry, and start the background reader thread.
    pub fn spawn(spec: &SpawnSpec, rows: u16, cols: u16) -> Result<Self, PtyError> {
        let pty_system = native_pty_system();

        let size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };

        let pair = pty_system
            .openpty(size)
            .map_err(|e| PtyError::SpawnFailed(format!("failed to open pty: {e}")))?;

        let cmd: CommandBuilder = build_command(spec);

        let child = pair.slave.spawn_command(cmd).map_err(|e| {
            PtyError::SpawnFailed(format!("failed to spawn '{}': {e}", spec.program))
        })?;

        // Only the master side is needed from here on
        drop(pair.slave);

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::SpawnFailed(format!("failed to take pty writer: {e}")))?;

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::SpawnFailed(format!("failed to clone pty reader: {e}")))?;

        // Background thread reads pty output into the channel; it exits
        // on child exit (read returns 0), read error, or a dropped
        // receiver.
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let read_chunk = spec.read_chunk.max(1);

        thread::Builder::new()
            .name("pty-reader".to_string())
            .spawn(move || {
                let mut buf = vec![0u8; read_chunk];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            if tx.send(buf[..n].to_vec()).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::debug!("pty reader error: {e}");
                            break;
                        }
                    }
                }
            })
            .map_err(|e| PtyError::SpawnFailed(format!("failed to spawn reader thread: {e}")))?;

        Ok(Self {
            master: pair.master,
            writer,
            child,
            output_rx: Some(rx),
            size,
            exit_status: None,
        })
    }

    /// Write raw input bytes to the pty master, delivering them to the
    /// child's stdin-equivalent.
    ///
    /// May block briefly when the kernel pty buffer is full; fails with
    /// an I/O error once the child has exited and the pipe is broken.
    pub fn write(&mut self, data: &[u8]) -> Result<(), PtyError> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Return any output bytes currently available, without blocking.
    ///
    /// Reports [`ReadOutcome::Eof`] once the child has exited and the
    /// buffered output is fully drained. After [`PtyHost::take_reader`]
    /// the stream belongs to the taken receiver and this always reports
    /// `WouldBlock`.
    pub fn try_read(&mut self) -> ReadOutcome {
        match self.output_rx {
            Some(ref rx) => match rx.try_recv() {
                Ok(data) => ReadOutcome::Data(data),
                Err(mpsc::TryRecvError::Empty) => ReadOutcome::WouldBlock,
                Err(mpsc::TryRecvError::Disconnected) => ReadOutcome::Eof,
            },
            None => ReadOutcome::WouldBlock,
        }
    }

    /// Hand the output channel receiver to a read loop. Returns `None`
    /// after the first call.
    pub fn take_reader(&mut self) -> Option<OutputReceiver> {
        self.output_rx.take()
    }

    /// Inform the kernel (and thus the child, via SIGWINCH) that the
    /// terminal geometry changed.
    pub fn resize(&mut self, rows: u16, cols: u16) -> Result<(), PtyError> {
        let new_size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        self.master
            .resize(new_size)
            .map_err(|e| PtyError::ResizeFailed(e.to_string()))?;
        self.size = new_size;
        Ok(())
    }

    /// Current recorded geometry as `(rows, cols)`.
    pub fn geometry(&self) -> (u16, u16) {
        (self.size.rows, self.size.cols)
    }

    /// A kill handle independent of this host object.
    pub fn clone_killer(&self) -> PtyKiller {
        PtyKiller(self.child.clone_killer())
    }

    /// Returns `true` while the child process is still running.
    pub fn is_alive(&mut self) -> bool {
        if self.exit_status.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exit_status = Some(status.exit_code());
                false
            }
            Ok(None) => true,
            Err(_) => false,
        }
    }

    /// Kill the child and reap it, returning the exit code when the OS
    /// reports one. Idempotent: repeat calls return the cached code and
    /// touch nothing.
    pub fn terminate(&mut self) -> Option<u32> {
        if let Some(code) = self.exit_status {
            return Some(code);
        }

        if let Err(e) = self.child.kill() {
            tracing::debug!("pty kill error (may already be dead): {e}");
        }

        match self.child.wait() {
            Ok(status) => {
                let code = status.exit_code();
                self.exit_status = Some(code);
                Some(code)
            }
            Err(e) => {
                tracing::debug!("pty wait error: {e}");
                None
            }
        }
    }
}

impl Drop for PtyHost {
    fn drop(&mut self) {
        // Kill the child so the pty fd closes and the reader thread
        // exits naturally. The process may already be gone.
        if self.exit_status.is_none() {
            let _ = self.child.kill();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn drain_until(host: &mut PtyHost, deadline: Duration, marker: &str) -> String {
        let mut output = String::new();
        let end = Instant::now() + deadline;
        while Instant::now() < end {
            match host.try_read() {
                ReadOutcome::Data(data) => {
                    output.push_str(&String::from_utf8_lossy(&data));
                    if output.contains(marker) {
                        break;
                    }
                }
                ReadOutcome::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(10));
                }
                ReadOutcome::Eof => break,
            }
        }
        output
    }

    #[test]
    fn spawn_shell_records_geometry() {
        let mut host = PtyHost::spawn(&SpawnSpec::shell(), 24, 80).expect("spawn shell");
        assert_eq!(host.geometry(), (24, 80));
        host.terminate();
    }

    #[test]
    fn spawn_unknown_program_fails() {
        let spec = SpawnSpec::command("/definitely/not/a/real/binary");
        let result = PtyHost::spawn(&spec, 24, 80);
        assert!(matches!(result, Err(PtyError::SpawnFailed(_))));
    }

    #[test]
    #[cfg(unix)]
    fn write_and_read_echo() {
        let mut host = PtyHost::spawn(&SpawnSpec::command("/bin/sh"), 24, 80).expect("spawn sh");

        host.write(b"echo PTY_TEST_MARKER_12345\n").expect("write");

        let output = drain_until(&mut host, Duration::from_secs(5), "PTY_TEST_MARKER_12345");
        assert!(
            output.contains("PTY_TEST_MARKER_12345"),
            "expected marker in output, got: {output:?}"
        );

        host.terminate();
    }

    #[test]
    #[cfg(unix)]
    fn eof_after_child_exits() {
        let mut spec = SpawnSpec::command("/bin/sh");
        spec.args = vec!["-c".into(), "exit 0".into()];
        let mut host = PtyHost::spawn(&spec, 24, 80).expect("spawn");

        let end = Instant::now() + Duration::from_secs(5);
        loop {
            match host.try_read() {
                ReadOutcome::Eof => break,
                ReadOutcome::Data(_) => {}
                ReadOutcome::WouldBlock => std::thread::sleep(Duration::from_millis(10)),
            }
            assert!(Instant::now() < end, "no EOF within deadline");
        }

        assert!(!host.is_alive());
    }

    #[test]
    fn resize_updates_geometry() {
        let mut host = PtyHost::spawn(&SpawnSpec::shell(), 24, 80).expect("spawn shell");
        assert_eq!(host.geometry(), (24, 80));

        host.resize(40, 120).expect("resize");
        assert_eq!(host.geometry(), (40, 120));

        host.terminate();
    }

    #[test]
    fn terminate_is_idempotent() {
        let mut host = PtyHost::spawn(&SpawnSpec::shell(), 24, 80).expect("spawn shell");

        let first = host.terminate();
        let second = host.terminate();
        assert_eq!(first, second);
        assert!(!host.is_alive());
    }

    #[test]
    fn take_reader_returns_once() {
        let mut host = PtyHost::spawn(&SpawnSpec::shell(), 24, 80).expect("spawn shell");

        assert!(host.take_reader().is_some());
        assert!(host.take_reader().is_none());
        // With the receiver gone, the host itself has nothing to report
        assert_eq!(host.try_read(), ReadOutcome::WouldBlock);

        host.terminate();
    }
}
