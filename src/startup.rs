//! One-time startup steps run before the monitoring loop.

use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::{ConfigError, RuntimeConfig, WmBackend};
use crate::hyprland::{self, CommandSource, SocketSource, WindowCountSource};

/// Interval between checks while waiting for the mpv socket
const SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Pre-0.40 Hyprland socket directory
const LEGACY_HYPR_DIR: &str = "/tmp/hypr";

#[derive(Debug, Error)]
#[error("socket {path:?} not available after waiting {waited:?}")]
pub struct SocketTimeout {
    pub path: std::path::PathBuf,
    pub waited: Duration,
}

/// Block until `path` exists, checking every 100ms for at most `timeout`.
/// The path is always checked at least once.
pub fn wait_for_socket(path: &Path, timeout: Duration) -> Result<(), SocketTimeout> {
    let deadline = Instant::now() + timeout;
    loop {
        if path.exists() {
            log::debug!("Socket {:?} is available", path);
            return Ok(());
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(SocketTimeout {
                path: path.to_path_buf(),
                waited: timeout,
            });
        }

        log::debug!("Socket {:?} not available, sleeping...", path);
        thread::sleep(SOCKET_POLL_INTERVAL.min(deadline - now));
    }
}

/// Build the configured window count source.
///
/// The socket backend needs Hyprland's environment and an existing socket;
/// the command backend defers all checks to the first poll.
pub fn window_source(config: &RuntimeConfig) -> Result<Box<dyn WindowCountSource>, ConfigError> {
    match config.wm_backend {
        WmBackend::Socket => {
            let path = hyprland::resolve_socket_path(
                |key| std::env::var(key).ok(),
                Path::new(LEGACY_HYPR_DIR),
            )?;
            log::debug!("Using Hyprland socket {:?}", path);
            Ok(Box::new(SocketSource::new(path)))
        }
        WmBackend::Command => {
            log::debug!("Using `{} activeworkspace -j`", config.hyprctl);
            Ok(Box::new(CommandSource::new(config.hyprctl.clone())))
        }
    }
}

/// Fork into the background. The parent exits with status 0; the child
/// continues in a new session without a controlling terminal.
///
/// Must be called while the process is still single-threaded.
pub fn detach() -> io::Result<()> {
    // SAFETY: no other threads exist yet, so the child inherits no locks
    match unsafe { libc::fork() } {
        -1 => Err(io::Error::last_os_error()),
        0 => {
            // SAFETY: plain syscall with no pointer arguments
            if unsafe { libc::setsid() } < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }
        _ => std::process::exit(0),
    }
}
