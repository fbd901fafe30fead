//! Color scheme regeneration from a paused wallpaper frame.
//!
//! Supports pywal (`wal`) and matugen. Tool output is appended to a log
//! file in the scratch directory rather than the daemon's own output.

use std::ffi::OsStr;
use std::fs::{DirBuilder, File, OpenOptions};
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use clap::ValueEnum;
use serde::Deserialize;
use thiserror::Error;

use crate::mpv::{MpvClient, MpvError};

/// An external color scheme generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorBackend {
    Pywal,
    Matugen,
}

impl ColorBackend {
    pub fn name(&self) -> &'static str {
        match self {
            ColorBackend::Pywal => "pywal",
            ColorBackend::Matugen => "matugen",
        }
    }

    /// Executable looked up on `PATH`
    pub fn program(&self) -> &'static str {
        match self {
            ColorBackend::Pywal => "wal",
            ColorBackend::Matugen => "matugen",
        }
    }

    fn probe_args(&self) -> &'static [&'static str] {
        match self {
            ColorBackend::Pywal => &["-v"],
            ColorBackend::Matugen => &["--version"],
        }
    }

    fn generate_args<'a>(&self, image: &'a Path) -> Vec<&'a OsStr> {
        match self {
            ColorBackend::Pywal => vec![OsStr::new("-i"), image.as_os_str()],
            ColorBackend::Matugen => vec![
                OsStr::new("image"),
                image.as_os_str(),
                OsStr::new("-m"),
                OsStr::new("dark"),
            ],
        }
    }

    fn log_file_name(&self) -> &'static str {
        match self {
            ColorBackend::Pywal => "last_wal.log",
            ColorBackend::Matugen => "last_matugen.log",
        }
    }
}

#[derive(Debug, Error)]
pub enum ColorError {
    #[error("cannot run {backend}: {source}")]
    Probe {
        backend: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{backend} is not usable ({status})")]
    ProbeFailed {
        backend: &'static str,
        status: ExitStatus,
    },
    #[error("failed to create {path:?}: {source}")]
    TempDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to set screenshot directory: {0}")]
    ScreenshotDir(#[source] MpvError),
    #[error("failed to take screenshot: {0}")]
    Screenshot(#[source] MpvError),
    #[error("failed to open log file {path:?}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to run {backend}: {source}")]
    Spawn {
        backend: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{backend} failed on {image:?} ({status})")]
    ToolFailed {
        backend: &'static str,
        image: PathBuf,
        status: ExitStatus,
    },
    #[error("cannot remove screenshot {path:?}: {source}")]
    RemoveScreenshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Turns a screenshot into a new color scheme.
pub trait SchemeGenerator {
    fn generate(&mut self, image: &Path) -> Result<(), ColorError>;
}

struct Tool {
    backend: ColorBackend,
    program: String,
}

/// Runs every enabled backend against a screenshot, then deletes it
pub struct ColorRunner {
    tools: Vec<Tool>,
    temp_dir: PathBuf,
}

impl ColorRunner {
    pub fn new(backends: &[ColorBackend], temp_dir: &Path) -> Self {
        Self {
            tools: backends
                .iter()
                .map(|&backend| Tool {
                    backend,
                    program: backend.program().to_string(),
                })
                .collect(),
            temp_dir: temp_dir.to_path_buf(),
        }
    }

    #[allow(dead_code)]
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Startup checks: every tool answers its version probe, the scratch
    /// directory exists, and mpv saves screenshots into it.
    pub fn prepare(&self, mpv: &mut MpvClient) -> Result<(), ColorError> {
        self.probe()?;
        self.create_temp_dir()?;
        mpv.set_screenshot_directory(&self.temp_dir)
            .map_err(ColorError::ScreenshotDir)?;
        log::debug!("Screenshot directory set to {:?}", self.temp_dir);
        Ok(())
    }

    fn probe(&self) -> Result<(), ColorError> {
        for tool in &self.tools {
            let backend = tool.backend.name();
            let status = Command::new(&tool.program)
                .args(tool.backend.probe_args())
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map_err(|source| ColorError::Probe { backend, source })?;
            if !status.success() {
                return Err(ColorError::ProbeFailed { backend, status });
            }
            log::debug!("{} is available", backend);
        }
        Ok(())
    }

    fn create_temp_dir(&self) -> Result<(), ColorError> {
        DirBuilder::new()
            .recursive(true)
            .mode(0o755)
            .create(&self.temp_dir)
            .map_err(|source| ColorError::TempDir {
                path: self.temp_dir.clone(),
                source,
            })
    }

    fn open_log(&self, backend: ColorBackend) -> Result<File, ColorError> {
        let path = self.temp_dir.join(backend.log_file_name());
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| ColorError::Log { path, source })
    }

    fn run_tool(&self, tool: &Tool, image: &Path) -> Result<(), ColorError> {
        let backend = tool.backend.name();
        let log = self.open_log(tool.backend)?;
        let log_err = log.try_clone().map_err(|source| ColorError::Log {
            path: self.temp_dir.join(tool.backend.log_file_name()),
            source,
        })?;

        let args = tool.backend.generate_args(image);
        log::debug!("Running {}: {} {:?}", backend, tool.program, args);

        let status = Command::new(&tool.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .status()
            .map_err(|source| ColorError::Spawn { backend, source })?;

        if !status.success() {
            return Err(ColorError::ToolFailed {
                backend,
                image: image.to_path_buf(),
                status,
            });
        }
        log::debug!("{} ran successfully", backend);
        Ok(())
    }
}

impl SchemeGenerator for ColorRunner {
    fn generate(&mut self, image: &Path) -> Result<(), ColorError> {
        for tool in &self.tools {
            self.run_tool(tool, image)?;
        }

        log::debug!("Removing screenshot {:?}", image);
        std::fs::remove_file(image).map_err(|source| ColorError::RemoveScreenshot {
            path: image.to_path_buf(),
            source,
        })
    }
}
