//! Unix socket transport shared by the Hyprland and mpv clients.
//!
//! Two shapes of exchange are supported:
//! - one-shot: connect, write a request, read until the peer hangs up
//!   (Hyprland's request socket closes after every reply)
//! - line channel: a long-lived stream carrying newline-delimited JSON in
//!   both directions (mpv's `--input-ipc-server`)
//!
//! All operations block. There are no read/write timeouts, so a hung peer
//! stalls the caller.

use std::io::{BufRead, BufReader, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failure talking to a peer. Every variant means "unavailable for now".
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("failed to connect to {path:?}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write request: {0}")]
    Write(#[source] std::io::Error),
    #[error("failed to read reply: {0}")]
    Read(#[source] std::io::Error),
    #[error("peer closed the connection without replying")]
    EmptyReply,
    #[error("failed to decode reply: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Open a stream to the socket at `path`.
pub fn connect(path: &Path) -> Result<UnixStream, IpcError> {
    UnixStream::connect(path).map_err(|source| IpcError::Connect {
        path: path.to_path_buf(),
        source,
    })
}

/// Send `request` on a fresh connection and return everything the peer writes
/// before closing its end.
pub fn query_once(path: &Path, request: &[u8]) -> Result<String, IpcError> {
    let mut stream = connect(path)?;
    stream.write_all(request).map_err(IpcError::Write)?;
    stream.flush().map_err(IpcError::Write)?;

    let mut reply = String::new();
    stream.read_to_string(&mut reply).map_err(IpcError::Read)?;

    if reply.trim().is_empty() {
        return Err(IpcError::EmptyReply);
    }
    Ok(reply)
}

/// A persistent newline-delimited channel.
///
/// After any transport failure the stream is dropped; the next request
/// reconnects once and reports `IpcError::Connect` if that fails.
pub struct LineChannel {
    path: PathBuf,
    stream: Option<BufReader<UnixStream>>,
}

impl LineChannel {
    /// Connect eagerly. Used at startup, where a failure is fatal.
    pub fn connect(path: &Path) -> Result<Self, IpcError> {
        let stream = connect(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            stream: Some(BufReader::new(stream)),
        })
    }

    /// Whether a stream is currently open.
    #[allow(dead_code)]
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Write one request line and return the first reply line accepted by
    /// `is_reply`. Lines it rejects (unsolicited events) are discarded.
    pub fn request(
        &mut self,
        line: &str,
        is_reply: impl Fn(&str) -> bool,
    ) -> Result<String, IpcError> {
        let result = self.exchange(line, is_reply);
        if result.is_err() {
            // Considered dead; reopened on next use
            self.stream = None;
        }
        result
    }

    fn exchange(&mut self, line: &str, is_reply: impl Fn(&str) -> bool) -> Result<String, IpcError> {
        if self.stream.is_none() {
            log::debug!("Reconnecting to {:?}", self.path);
            self.stream = Some(BufReader::new(connect(&self.path)?));
        }
        let Some(reader) = self.stream.as_mut() else {
            return Err(IpcError::EmptyReply);
        };

        let stream = reader.get_mut();
        stream.write_all(line.as_bytes()).map_err(IpcError::Write)?;
        if !line.ends_with('\n') {
            stream.write_all(b"\n").map_err(IpcError::Write)?;
        }
        stream.flush().map_err(IpcError::Write)?;

        loop {
            let mut reply = String::new();
            let n = reader.read_line(&mut reply).map_err(IpcError::Read)?;
            if n == 0 {
                return Err(IpcError::EmptyReply);
            }
            if reply.trim().is_empty() {
                continue;
            }
            if is_reply(&reply) {
                return Ok(reply);
            }
            log::debug!("Skipping unsolicited message: {}", reply.trim_end());
        }
    }
}
