//! Shell detection and sanitized command construction.

use portable_pty::CommandBuilder;

use crate::host::SpawnSpec;

/// Get the user's default shell.
///
/// - Unix: reads `$SHELL`, falls back to `/bin/sh`
/// - Windows: reads `$COMSPEC`, falls back to `cmd.exe`
pub fn default_shell() -> String {
    #[cfg(unix)]
    {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
    }
    #[cfg(windows)]
    {
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    }
}

/// Allowed environment variables to inherit.
///
/// The child gets a minimal set so host-process secrets (API keys,
/// tokens) never leak into the interactive session's environment.
const ALLOWED_ENV_VARS: &[&str] = &[
    "HOME",
    "USER",
    "LOGNAME",
    "SHELL",
    "PATH",
    "TERM",
    "LANG",
    "LC_ALL",
    "LC_CTYPE",
    "DISPLAY",
    "WAYLAND_DISPLAY",
    "XDG_RUNTIME_DIR",
    "TMPDIR",
    "TMP",
    "TEMP",
    // Windows-specific
    "USERPROFILE",
    "APPDATA",
    "LOCALAPPDATA",
    "SYSTEMROOT",
    "COMSPEC",
    "HOMEDRIVE",
    "HOMEPATH",
];

/// Build a sanitized `CommandBuilder` for a spawn spec.
///
/// Clears the inherited environment, re-adds the allowlist, then applies
/// the spec's own variables and `TERM` value on top.
pub(crate) fn build_command(spec: &SpawnSpec) -> CommandBuilder {
    let mut cmd = CommandBuilder::new(&spec.program);

    cmd.env_clear();
    for key in ALLOWED_ENV_VARS {
        if let Ok(val) = std::env::var(key) {
            cmd.env(key, val);
        }
    }

    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    // Always set TERM so the child behaves like an interactive terminal
    cmd.env("TERM", &spec.term);

    // `-l` makes unix shells load the user's profile
    #[cfg(unix)]
    if spec.login_shell {
        cmd.arg("-l");
    }

    for arg in &spec.args {
        cmd.arg(arg);
    }

    if let Some(ref cwd) = spec.cwd {
        cmd.cwd(cwd);
    }

    cmd
}
