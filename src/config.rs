//! Configuration for mpvpaper-stop.
//!
//! Settings come from three layers, later ones winning:
//! built-in defaults, `~/.config/mpvpaper-stop/config.toml`, command-line flags.
//! The merged result is a [`RuntimeConfig`] that is fixed for the life of
//! the process.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::Deserialize;
use thiserror::Error;

use crate::colors::ColorBackend;
use crate::mpv::DEFAULT_SOCKET_PATH;

/// Default polling period in milliseconds
pub const DEFAULT_PERIOD_MS: u64 = 1000;
/// Default time to wait for the mpv socket to appear, in milliseconds
pub const DEFAULT_SOCKET_WAIT_MS: u64 = 5000;
/// Scratch directory for screenshots and color tool logs
pub const DEFAULT_TEMP_DIR: &str = "/tmp/mpvpaper-stop";
/// Program used by the command window-manager backend
pub const DEFAULT_HYPRCTL: &str = "hyprctl";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    MissingEnv(&'static str),
    #[error("hyprland socket not found at {primary:?} or {fallback:?}")]
    WmSocketNotFound { primary: PathBuf, fallback: PathBuf },
    #[error("period must be greater than 0")]
    InvalidPeriod,
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// How the active workspace's window count is obtained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WmBackend {
    /// Hyprland's request socket
    #[default]
    Socket,
    /// `hyprctl activeworkspace -j`
    Command,
}

// =============================================================================
// File-based Configuration (TOML parsing)
// =============================================================================

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub verbose: Option<bool>,
    pub socket_path: Option<String>,
    pub socket_wait_time: Option<u64>,
    pub period: Option<i64>,
    pub color_backends: Vec<ColorBackend>,
    pub temp_dir: Option<String>,
    pub wm_backend: Option<WmBackend>,
    pub hyprctl: Option<String>,
}

impl FileConfig {
    /// Default config file path (~/.config/mpvpaper-stop/config.toml)
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mpvpaper-stop")
            .join("config.toml")
    }

    /// Load the config file.
    ///
    /// A missing file at the default location means "no overrides"; an
    /// explicitly requested file must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match explicit {
            Some(p) => (expand_path(&p.to_string_lossy()), true),
            None => (Self::default_path(), false),
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let config = Self::parse(&contents, &path)?;
                log::debug!("Loaded config from {:?}", path);
                Ok(config)
            }
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config file found at {:?}, using defaults", path);
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }

    pub fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

// =============================================================================
// Command-line overrides
// =============================================================================

/// Values supplied on the command line. `None`/`false` means "not given".
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub verbose: bool,
    pub fork: bool,
    pub socket_path: Option<PathBuf>,
    pub socket_wait_time: Option<u64>,
    /// Signed so that negative values reach validation
    pub period: Option<i64>,
    pub color_backends: Vec<ColorBackend>,
    pub wm_backend: Option<WmBackend>,
}

// =============================================================================
// Runtime Configuration (resolved values)
// =============================================================================

/// Resolved settings, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub verbose: bool,
    /// Detach from the terminal before monitoring
    pub fork: bool,
    /// Enabled color backends, deduplicated, in selection order
    pub color_backends: Vec<ColorBackend>,
    /// mpv IPC socket
    pub socket_path: PathBuf,
    /// How long to wait for `socket_path` to appear
    pub socket_wait_time: Duration,
    /// Delay between polls
    pub period: Duration,
    pub temp_dir: PathBuf,
    pub wm_backend: WmBackend,
    pub hyprctl: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            fork: false,
            color_backends: Vec::new(),
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            socket_wait_time: Duration::from_millis(DEFAULT_SOCKET_WAIT_MS),
            period: Duration::from_millis(DEFAULT_PERIOD_MS),
            temp_dir: PathBuf::from(DEFAULT_TEMP_DIR),
            wm_backend: WmBackend::Socket,
            hyprctl: DEFAULT_HYPRCTL.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Merge defaults, the config file and command-line overrides
    pub fn resolve(file: FileConfig, cli: Overrides) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let period_ms = match cli.period.or(file.period) {
            Some(ms) => u64::try_from(ms)
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or(ConfigError::InvalidPeriod)?,
            None => DEFAULT_PERIOD_MS,
        };

        let wait_ms = cli
            .socket_wait_time
            .or(file.socket_wait_time)
            .unwrap_or(DEFAULT_SOCKET_WAIT_MS);

        let socket_path = match (cli.socket_path, file.socket_path) {
            (Some(p), _) => expand_path(&p.to_string_lossy()),
            (None, Some(p)) => expand_path(&p),
            (None, None) => defaults.socket_path,
        };

        let temp_dir = file
            .temp_dir
            .map(|p| expand_path(&p))
            .unwrap_or(defaults.temp_dir);

        let mut color_backends = Vec::new();
        for backend in file.color_backends.into_iter().chain(cli.color_backends) {
            if !color_backends.contains(&backend) {
                color_backends.push(backend);
            }
        }

        Ok(Self {
            verbose: cli.verbose || file.verbose.unwrap_or(false),
            fork: cli.fork,
            color_backends,
            socket_path,
            socket_wait_time: Duration::from_millis(wait_ms),
            period: Duration::from_millis(period_ms),
            temp_dir,
            wm_backend: cli.wm_backend.or(file.wm_backend).unwrap_or_default(),
            hyprctl: file.hyprctl.unwrap_or(defaults.hyprctl),
        })
    }

    /// Whether any color backend runs on pause
    pub fn colors_enabled(&self) -> bool {
        !self.color_backends.is_empty()
    }
}

/// Expand a leading `~` and environment variables, leaving the path as-is
/// if expansion fails
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => {
            log::warn!("Failed to expand {:?}: {}", raw, e);
            PathBuf::from(shellexpand::tilde(raw).as_ref())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::resolve(FileConfig::default(), Overrides::default()).unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.socket_path, PathBuf::from("/tmp/mpvsocket"));
        assert_eq!(config.period, Duration::from_millis(1000));
        assert_eq!(config.socket_wait_time, Duration::from_millis(5000));
        assert!(!config.colors_enabled());
    }

    #[test]
    fn test_parse_file() {
        let toml = r#"
            verbose = true
            socket_path = "/run/user/1000/mpv.sock"
            period = 250
            color_backends = ["matugen"]
            wm_backend = "command"
            hyprctl = "/usr/bin/hyprctl"
        "#;
        let file = FileConfig::parse(toml, Path::new("config.toml")).unwrap();
        let config = RuntimeConfig::resolve(file, Overrides::default()).unwrap();

        assert!(config.verbose);
        assert_eq!(config.socket_path, PathBuf::from("/run/user/1000/mpv.sock"));
        assert_eq!(config.period, Duration::from_millis(250));
        assert_eq!(config.socket_wait_time, Duration::from_millis(5000));
        assert_eq!(config.color_backends, vec![ColorBackend::Matugen]);
        assert_eq!(config.wm_backend, WmBackend::Command);
        assert_eq!(config.hyprctl, "/usr/bin/hyprctl");
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = FileConfig {
            period: Some(250),
            socket_wait_time: Some(100),
            socket_path: Some("/a.sock".to_string()),
            wm_backend: Some(WmBackend::Command),
            ..Default::default()
        };
        let cli = Overrides {
            period: Some(2000),
            socket_path: Some(PathBuf::from("/b.sock")),
            wm_backend: Some(WmBackend::Socket),
            ..Default::default()
        };
        let config = RuntimeConfig::resolve(file, cli).unwrap();

        assert_eq!(config.period, Duration::from_millis(2000));
        assert_eq!(config.socket_wait_time, Duration::from_millis(100));
        assert_eq!(config.socket_path, PathBuf::from("/b.sock"));
        assert_eq!(config.wm_backend, WmBackend::Socket);
    }

    #[test]
    fn test_wait_time_and_period_are_independent() {
        let cli = Overrides {
            socket_wait_time: Some(750),
            ..Default::default()
        };
        let config = RuntimeConfig::resolve(FileConfig::default(), cli).unwrap();
        assert_eq!(config.socket_wait_time, Duration::from_millis(750));
        assert_eq!(config.period, Duration::from_millis(DEFAULT_PERIOD_MS));

        let cli = Overrides {
            period: Some(30),
            wm_backend: Some(WmBackend::Command),
            ..Default::default()
        };
        let config = RuntimeConfig::resolve(FileConfig::default(), cli).unwrap();
        assert_eq!(config.period, Duration::from_millis(30));
        assert_eq!(config.socket_wait_time, Duration::from_millis(DEFAULT_SOCKET_WAIT_MS));
    }

    #[test]
    fn test_zero_period_rejected() {
        let cli = Overrides {
            period: Some(0),
            ..Default::default()
        };
        let err = RuntimeConfig::resolve(FileConfig::default(), cli).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPeriod));

        let file = FileConfig {
            period: Some(0),
            ..Default::default()
        };
        assert!(RuntimeConfig::resolve(file, Overrides::default()).is_err());
    }

    #[test]
    fn test_negative_period_rejected() {
        let cli = Overrides {
            period: Some(-5),
            ..Default::default()
        };
        let err = RuntimeConfig::resolve(FileConfig::default(), cli).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPeriod));

        let file = FileConfig::parse("period = -1", Path::new("config.toml")).unwrap();
        let err = RuntimeConfig::resolve(file, Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPeriod));
    }

    #[test]
    fn test_color_backends_are_unioned() {
        let file = FileConfig {
            color_backends: vec![ColorBackend::Pywal],
            ..Default::default()
        };
        let cli = Overrides {
            color_backends: vec![ColorBackend::Matugen, ColorBackend::Pywal, ColorBackend::Matugen],
            ..Default::default()
        };
        let config = RuntimeConfig::resolve(file, cli).unwrap();
        assert_eq!(
            config.color_backends,
            vec![ColorBackend::Pywal, ColorBackend::Matugen]
        );
        assert!(config.colors_enabled());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = FileConfig::parse("perod = 5", Path::new("config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_missing_default_is_ok_but_explicit_is_not() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let err = FileConfig::load(Some(missing.as_path())).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));

        let present = dir.path().join("config.toml");
        std::fs::write(&present, "period = 42\n").unwrap();
        let file = FileConfig::load(Some(present.as_path())).unwrap();
        assert_eq!(file.period, Some(42));
    }

    #[test]
    fn test_expand_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~/mpv.sock"), home.join("mpv.sock"));
        }
        assert_eq!(expand_path("/tmp/mpvsocket"), PathBuf::from("/tmp/mpvsocket"));
    }
}
