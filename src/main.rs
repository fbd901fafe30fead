//! mpvpaper-stop - pause the wallpaper while you work
//!
//! Polls Hyprland for the number of windows on the active workspace and
//! pauses mpvpaper (through mpv's IPC socket) whenever that number is
//! non-zero, resuming it when the workspace empties. Optionally regenerates
//! the desktop color scheme from the paused frame with pywal or matugen.
//!
//! # Examples
//!
//! ```bash
//! # mpvpaper must expose its IPC socket
//! mpvpaper -o "input-ipc-server=/tmp/mpvsocket" '*' ~/wallpaper.mp4 &
//!
//! # Pause/resume in the background, regenerating colors with matugen
//! mpvpaper-stop --fork --matugen
//!
//! # Faster polling with debug output
//! mpvpaper-stop -v -t 250
//! ```

mod colors;
mod config;
mod hyprland;
mod ipc;
mod monitor;
mod mpv;
mod startup;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use colors::{ColorBackend, ColorRunner};
use config::{FileConfig, Overrides, RuntimeConfig, WmBackend};
use monitor::Monitor;
use mpv::MpvClient;

/// Pause mpvpaper while windows are open on the active Hyprland workspace
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, args_override_self = true)]
struct Cli {
    /// Enables verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Forks the process into the background
    #[arg(short, long)]
    fork: bool,

    /// Path to the mpvpaper socket [default: /tmp/mpvsocket]
    #[arg(short = 'p', long, value_name = "PATH")]
    socket_path: Option<PathBuf>,

    /// Wait time for the socket in milliseconds [default: 5000]
    #[arg(short = 'w', long, value_name = "TIME")]
    socket_wait_time: Option<u64>,

    /// Polling period in milliseconds [default: 1000]
    #[arg(short = 't', long, value_name = "TIME", allow_negative_numbers = true)]
    period: Option<i64>,

    /// Color backend to run on pause (may be repeated)
    #[arg(short = 'c', value_enum, value_name = "COLOR_BACKEND")]
    color_backend: Vec<ColorBackend>,

    /// Runs pywal on pause
    #[arg(long)]
    pywal: bool,

    /// Runs matugen on pause
    #[arg(long)]
    matugen: bool,

    /// How to query Hyprland [default: socket]
    #[arg(long, value_enum, value_name = "BACKEND")]
    wm_backend: Option<WmBackend>,

    /// Config file [default: ~/.config/mpvpaper-stop/config.toml]
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        let mut color_backends = self.color_backend.clone();
        if self.pywal {
            color_backends.push(ColorBackend::Pywal);
        }
        if self.matugen {
            color_backends.push(ColorBackend::Matugen);
        }

        Overrides {
            verbose: self.verbose,
            fork: self.fork,
            socket_path: self.socket_path.clone(),
            socket_wait_time: self.socket_wait_time,
            period: self.period,
            color_backends,
            wm_backend: self.wm_backend,
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let file = FileConfig::load(cli.config.as_deref())?;
    let config = RuntimeConfig::resolve(file, cli.overrides())?;

    init_logging(config.verbose);
    log::debug!("Configuration: {:?}", config);

    let windows = startup::window_source(&config)?;

    startup::wait_for_socket(&config.socket_path, config.socket_wait_time)?;

    if config.fork {
        startup::detach().context("Failed to detach from terminal")?;
    }

    let mut mpv = MpvClient::connect(&config.socket_path)
        .with_context(|| format!("Failed to connect to mpv at {:?}", config.socket_path))?;

    let colors = if config.colors_enabled() {
        let runner = ColorRunner::new(&config.color_backends, &config.temp_dir);
        runner
            .prepare(&mut mpv)
            .context("Failed to set up color scheme generation")?;
        Some(runner)
    } else {
        None
    };

    let mut monitor = Monitor::new(windows, mpv, colors);
    let never = monitor.run(config.period).context("Monitoring stopped")?;
    match never {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from([
            "mpvpaper-stop", "-v", "-f", "-p", "/run/mpv.sock", "-w", "200", "-t", "50", "-c", "pywal",
        ])
        .unwrap();
        let o = cli.overrides();

        assert!(o.verbose);
        assert!(o.fork);
        assert_eq!(o.socket_path, Some(PathBuf::from("/run/mpv.sock")));
        assert_eq!(o.socket_wait_time, Some(200));
        assert_eq!(o.period, Some(50));
        assert_eq!(o.color_backends, vec![ColorBackend::Pywal]);
    }

    #[test]
    fn test_color_flags_combine() {
        let cli = Cli::try_parse_from(["mpvpaper-stop", "-c", "matugen", "--pywal", "--matugen"]).unwrap();
        let config = RuntimeConfig::resolve(FileConfig::default(), cli.overrides()).unwrap();
        assert_eq!(
            config.color_backends,
            vec![ColorBackend::Matugen, ColorBackend::Pywal]
        );
    }

    #[test]
    fn test_long_flags() {
        let cli = Cli::try_parse_from([
            "mpvpaper-stop",
            "--socket-path",
            "/tmp/other",
            "--socket-wait-time",
            "10",
            "--period",
            "20",
            "--wm-backend",
            "command",
        ])
        .unwrap();
        let o = cli.overrides();
        assert_eq!(o.socket_path, Some(PathBuf::from("/tmp/other")));
        assert_eq!(o.socket_wait_time, Some(10));
        assert_eq!(o.period, Some(20));
        assert_eq!(o.wm_backend, Some(WmBackend::Command));
    }

    #[test]
    fn test_negative_period_parses() {
        let cli = Cli::try_parse_from(["mpvpaper-stop", "-t", "-5"]).unwrap();
        assert_eq!(cli.overrides().period, Some(-5));
        assert!(RuntimeConfig::resolve(FileConfig::default(), cli.overrides()).is_err());
    }

    #[test]
    fn test_rejects_unknown_backend() {
        assert!(Cli::try_parse_from(["mpvpaper-stop", "-c", "wpgtk"]).is_err());
    }
}
