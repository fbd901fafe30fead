//! The polling loop that keeps mpv's pause state in step with the workspace.
//!
//! Each tick samples `(window_count, is_paused)` and acts only when that pair
//! differs from the previous successful sample:
//!
//! ```text
//!   windows == 0 && paused   ──► resume
//!   windows  > 0 && !paused  ──► pause (+ color scheme from a screenshot)
//!   anything else            ──► nothing
//! ```
//!
//! Decisions read the player's *current* pause flag, so a manual pause or
//! resume is corrected on the next tick that sees a change.

use std::convert::Infallible;
use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::colors::{ColorError, SchemeGenerator};
use crate::hyprland::WindowCountSource;
use crate::mpv::PlayerControl;

/// What a tick asks the player to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Pause,
    Resume,
}

/// Pure transition rule
pub fn decide(windows: u32, paused: bool) -> Action {
    match (windows, paused) {
        (0, true) => Action::Resume,
        (n, false) if n > 0 => Action::Pause,
        _ => Action::None,
    }
}

/// Last successful sample. `None` until the first poll succeeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObservedState {
    last: Option<(u32, bool)>,
}

#[allow(dead_code)]
impl ObservedState {
    pub fn windows(&self) -> Option<u32> {
        self.last.map(|(w, _)| w)
    }

    pub fn paused(&self) -> Option<bool> {
        self.last.map(|(_, p)| p)
    }

    /// Record a sample, returning whether it differs from the previous one
    fn update(&mut self, windows: u32, paused: bool) -> bool {
        let sample = Some((windows, paused));
        if self.last == sample {
            return false;
        }
        self.last = sample;
        true
    }

    fn forget(&mut self) {
        self.last = None;
    }
}

/// Result of a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Window count unavailable; nothing sampled or sent
    Skipped,
    /// Same sample as last time
    Unchanged,
    /// New sample; `Action::None` when no command was needed
    Acted(Action),
    /// The pause/resume command could not be delivered
    CommandFailed(Action),
}

pub struct Monitor<W, P, G> {
    windows: W,
    player: P,
    colors: Option<G>,
    observed: ObservedState,
}

impl<W, P, G> Monitor<W, P, G>
where
    W: WindowCountSource,
    P: PlayerControl,
    G: SchemeGenerator,
{
    pub fn new(windows: W, player: P, colors: Option<G>) -> Self {
        Self {
            windows,
            player,
            colors,
            observed: ObservedState::default(),
        }
    }

    #[allow(dead_code)]
    pub fn observed(&self) -> ObservedState {
        self.observed
    }

    /// Poll forever. Only color scheme failures end the loop.
    pub fn run(&mut self, period: Duration) -> Result<Infallible, ColorError> {
        log::info!("Starting monitoring loop (period {:?})", period);
        loop {
            self.tick()?;
            thread::sleep(period);
        }
    }

    /// Sample both peers once and act on any change
    pub fn tick(&mut self) -> Result<TickOutcome, ColorError> {
        let windows = match self.windows.active_workspace_window_count() {
            Ok(n) => n,
            Err(e) => {
                log::warn!("Failed to query active workspace: {}", e);
                return Ok(TickOutcome::Skipped);
            }
        };

        let paused = self.player.query_paused().unwrap_or_else(|e| {
            log::warn!("Failed to query pause status: {}", e);
            false
        });

        if !self.observed.update(windows, paused) {
            return Ok(TickOutcome::Unchanged);
        }
        log::debug!("{{windows: {}, paused: {}}}", windows, paused);

        let action = decide(windows, paused);
        let delivered = match action {
            Action::None => true,
            Action::Resume => self.resume(),
            Action::Pause => self.pause()?,
        };

        if delivered {
            Ok(TickOutcome::Acted(action))
        } else {
            // Retry on the next tick even if the sample is unchanged
            self.observed.forget();
            Ok(TickOutcome::CommandFailed(action))
        }
    }

    fn resume(&mut self) -> bool {
        log::info!("Resuming");
        match self.player.set_paused(false) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to resume playback: {}", e);
                false
            }
        }
    }

    fn pause(&mut self) -> Result<bool, ColorError> {
        log::info!("Pausing");
        if let Err(e) = self.player.set_paused(true) {
            log::warn!("Failed to pause playback: {}", e);
            return Ok(false);
        }

        if let Some(colors) = self.colors.as_mut() {
            log::debug!("Taking screenshot for color scheme");
            match self.player.take_screenshot().map_err(ColorError::Screenshot)? {
                Some(image) => regenerate(colors, &image)?,
                None => log::debug!("Screenshot already exists, skipping"),
            }
        }
        Ok(true)
    }
}

fn regenerate<G: SchemeGenerator>(colors: &mut G, image: &Path) -> Result<(), ColorError> {
    log::debug!("Generating color scheme from {:?}", image);
    colors.generate(image)
}
