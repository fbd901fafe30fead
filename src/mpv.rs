//! mpv JSON IPC client.
//!
//! mpvpaper forwards `--input-ipc-server` to mpv, so the wallpaper player
//! speaks mpv's protocol: one JSON object per line, each command answered by
//! an object carrying `error` and optionally `data`. mpv also pushes event
//! objects (`{"event": "..."}`) on the same stream; those are skipped.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::ipc::{IpcError, LineChannel};

/// Default socket mpvpaper is started with (`-o "input-ipc-server=/tmp/mpvsocket"`)
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/mpvsocket";

/// The value mpv puts in `error` when a command succeeded
const SUCCESS: &str = "success";

/// Playback control the monitor needs from the player.
pub trait PlayerControl {
    /// Read the `pause` property
    fn query_paused(&mut self) -> Result<bool, IpcError>;
    /// Write the `pause` property; the reply is read and discarded
    fn set_paused(&mut self, paused: bool) -> Result<(), IpcError>;
    /// Save the current frame. `None` means mpv produced no new file.
    fn take_screenshot(&mut self) -> Result<Option<PathBuf>, MpvError>;
}

#[derive(Debug, Error)]
pub enum MpvError {
    #[error(transparent)]
    Ipc(#[from] IpcError),
    #[error("mpv rejected `{command}`: {error}")]
    Rejected { command: &'static str, error: String },
}

/// Commands sent to mpv
#[derive(Debug, Clone, PartialEq)]
pub enum MpvCommand {
    GetPause,
    SetPause(bool),
    Screenshot,
    SetScreenshotDir(PathBuf),
}

#[derive(Serialize)]
struct Request {
    command: Vec<Value>,
}

impl MpvCommand {
    fn name(&self) -> &'static str {
        match self {
            MpvCommand::GetPause => "get_property pause",
            MpvCommand::SetPause(_) => "set_property pause",
            MpvCommand::Screenshot => "screenshot",
            MpvCommand::SetScreenshotDir(_) => "set_property screenshot-dir",
        }
    }

    /// Serialize as a single request line (without the trailing newline)
    pub fn to_line(&self) -> String {
        let command = match self {
            MpvCommand::GetPause => vec!["get_property".into(), "pause".into()],
            MpvCommand::SetPause(paused) => {
                vec!["set_property".into(), "pause".into(), Value::Bool(*paused)]
            }
            MpvCommand::Screenshot => vec!["screenshot".into()],
            MpvCommand::SetScreenshotDir(dir) => vec![
                "set_property".into(),
                "screenshot-dir".into(),
                dir.to_string_lossy().into_owned().into(),
            ],
        };
        // Serializing strings and bools cannot fail
        serde_json::to_string(&Request { command }).unwrap_or_default()
    }
}

/// Reply to `get_property pause`
#[derive(Debug, Default, Deserialize)]
struct PauseReply {
    /// Anything but a JSON bool reads as "not paused"
    #[serde(default, deserialize_with = "lenient_bool")]
    data: bool,
}

/// Reply carrying only a status
#[derive(Debug, Default, Deserialize)]
struct StatusReply {
    #[serde(default)]
    error: Option<String>,
}

/// Reply to `screenshot`
#[derive(Debug, Default, Deserialize)]
struct ScreenshotReply {
    #[serde(default)]
    error: Option<String>,
    #[serde(default, deserialize_with = "lenient_screenshot")]
    data: Option<ScreenshotData>,
}

#[derive(Debug, Default, Deserialize)]
struct ScreenshotData {
    #[serde(default, deserialize_with = "lenient_string")]
    filename: Option<String>,
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(matches!(Value::deserialize(deserializer)?, Value::Bool(true)))
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

fn lenient_screenshot<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<ScreenshotData>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// True for command replies, false for pushed events.
fn is_command_reply(line: &str) -> bool {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(map)) => !map.contains_key("event"),
        // Let the caller's decoder report it
        _ => true,
    }
}

fn check_status(command: &'static str, error: Option<String>) -> Result<(), MpvError> {
    match error {
        Some(e) if e == SUCCESS => Ok(()),
        Some(e) => Err(MpvError::Rejected { command, error: e }),
        None => Err(MpvError::Rejected {
            command,
            error: "no status in reply".to_string(),
        }),
    }
}

/// Client for mpv's IPC socket
pub struct MpvClient {
    channel: LineChannel,
}

impl MpvClient {
    pub fn connect(path: &Path) -> Result<Self, IpcError> {
        let channel = LineChannel::connect(path)?;
        log::debug!("Connected to mpv at {:?}", path);
        Ok(Self { channel })
    }

    /// Send a command and return its raw reply line
    pub fn send(&mut self, command: &MpvCommand) -> Result<String, IpcError> {
        self.channel.request(&command.to_line(), is_command_reply)
    }

    /// Point mpv's screenshots at `dir`. mpv must answer with success.
    pub fn set_screenshot_directory(&mut self, dir: &Path) -> Result<(), MpvError> {
        let command = MpvCommand::SetScreenshotDir(dir.to_path_buf());
        let reply = self.send(&command)?;
        let status: StatusReply = serde_json::from_str(&reply).map_err(IpcError::from)?;
        check_status(command.name(), status.error)
    }
}

impl PlayerControl for MpvClient {
    fn query_paused(&mut self) -> Result<bool, IpcError> {
        let reply = self.send(&MpvCommand::GetPause)?;
        let parsed: PauseReply = serde_json::from_str(&reply)?;
        Ok(parsed.data)
    }

    fn set_paused(&mut self, paused: bool) -> Result<(), IpcError> {
        self.send(&MpvCommand::SetPause(paused)).map(|_| ())
    }

    fn take_screenshot(&mut self) -> Result<Option<PathBuf>, MpvError> {
        let command = MpvCommand::Screenshot;
        let reply = self.send(&command)?;
        let parsed: ScreenshotReply = serde_json::from_str(&reply).map_err(IpcError::from)?;
        check_status(command.name(), parsed.error)?;
        Ok(parsed
            .data
            .and_then(|d| d.filename)
            .map(PathBuf::from))
    }
}
