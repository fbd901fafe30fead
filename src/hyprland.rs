//! Active workspace window count from Hyprland.
//!
//! Two interchangeable sources produce the same number:
//! - [`SocketSource`] talks to Hyprland's request socket directly
//! - [`CommandSource`] runs `hyprctl activeworkspace -j`

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Deserializer};

use crate::config::ConfigError;
use crate::ipc::{self, IpcError};

/// Request understood by Hyprland's `.socket.sock`
pub const ACTIVE_WORKSPACE_REQUEST: &str = "j/activeworkspace";

/// Anything that can report how many windows the active workspace holds.
pub trait WindowCountSource {
    fn active_workspace_window_count(&mut self) -> Result<u32, IpcError>;
}

impl<T: WindowCountSource + ?Sized> WindowCountSource for Box<T> {
    fn active_workspace_window_count(&mut self) -> Result<u32, IpcError> {
        (**self).active_workspace_window_count()
    }
}

/// The part of Hyprland's `activeworkspace` reply we care about
#[derive(Debug, Default, Deserialize)]
pub struct ActiveWorkspace {
    /// Missing or non-numeric counts decode as zero
    #[serde(default, deserialize_with = "lenient_count")]
    pub windows: u32,
}

impl ActiveWorkspace {
    pub fn parse(reply: &str) -> Result<Self, IpcError> {
        Ok(serde_json::from_str(reply)?)
    }
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let count = match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        _ => 0,
    };
    Ok(u32::try_from(count).unwrap_or(u32::MAX))
}

/// Locate Hyprland's request socket.
///
/// Tries `$XDG_RUNTIME_DIR/hypr/$HYPRLAND_INSTANCE_SIGNATURE/.socket.sock`
/// first, then the pre-0.40 location under `/tmp/hypr`.
pub fn resolve_socket_path(
    env: impl Fn(&str) -> Option<String>,
    tmp_root: &Path,
) -> Result<PathBuf, ConfigError> {
    let runtime_dir = env("XDG_RUNTIME_DIR").ok_or(ConfigError::MissingEnv("XDG_RUNTIME_DIR"))?;
    let signature = env("HYPRLAND_INSTANCE_SIGNATURE")
        .ok_or(ConfigError::MissingEnv("HYPRLAND_INSTANCE_SIGNATURE"))?;

    let primary = PathBuf::from(runtime_dir)
        .join("hypr")
        .join(&signature)
        .join(".socket.sock");
    if primary.exists() {
        return Ok(primary);
    }

    log::warn!(
        "Hyprland socket not found at {:?}, falling back to {:?}",
        primary,
        tmp_root
    );

    let fallback = tmp_root.join(&signature).join(".socket.sock");
    if fallback.exists() {
        return Ok(fallback);
    }

    Err(ConfigError::WmSocketNotFound { primary, fallback })
}

/// Queries the request socket, reconnecting for every poll
pub struct SocketSource {
    path: PathBuf,
}

impl SocketSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl WindowCountSource for SocketSource {
    fn active_workspace_window_count(&mut self) -> Result<u32, IpcError> {
        let reply = ipc::query_once(&self.path, ACTIVE_WORKSPACE_REQUEST.as_bytes())?;
        Ok(ActiveWorkspace::parse(&reply)?.windows)
    }
}

/// Runs `hyprctl activeworkspace -j` on every poll
pub struct CommandSource {
    program: String,
}

impl CommandSource {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl WindowCountSource for CommandSource {
    fn active_workspace_window_count(&mut self) -> Result<u32, IpcError> {
        let output = Command::new(&self.program)
            .args(["activeworkspace", "-j"])
            .output()
            .map_err(|source| IpcError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            log::debug!("{} stderr: {}", self.program, stderr.trim_end());
        }

        let reply = String::from_utf8_lossy(&output.stdout);
        if reply.trim().is_empty() {
            return Err(IpcError::EmptyReply);
        }
        Ok(ActiveWorkspace::parse(&reply)?.windows)
    }
}
