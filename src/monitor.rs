//! Sync loop: capture -> recognize -> change detection -> analyze -> publish.
//! Runs on one dedicated worker while the monitoring flag is set. The flag is
//! checked at the top of every iteration only; an iteration already in flight
//! always runs to completion. Failures inside an iteration are logged and the
//! loop carries on with the next tick.

use crate::assistant::Event;
use crate::capture::BoardCapture;
use crate::engine::EngineSession;
use crate::geometry::{Orientation, Region};
use crate::ocr::BoardRecognizer;
use anyhow::{Context, Result};
use shakmaty::uci::UciMove;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300);
pub const DEFAULT_SUGGESTION_MOVETIME: Duration = Duration::from_millis(500);

/// Anything that can suggest a move for a position.
pub trait Analyzer: Send + Sync {
    fn best_move(&self, fen: &str, budget: Duration) -> Option<UciMove>;
}

impl Analyzer for EngineSession {
    fn best_move(&self, fen: &str, budget: Duration) -> Option<UciMove> {
        EngineSession::best_move(self, fen, budget)
    }
}

impl<A: Analyzer + ?Sized> Analyzer for Arc<A> {
    fn best_move(&self, fen: &str, budget: Duration) -> Option<UciMove> {
        (**self).best_move(fen, budget)
    }
}

/// Fixed parameters of one monitoring session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonitorSettings {
    pub region: Region,
    pub orientation: Orientation,
    pub interval: Duration,
    pub movetime: Duration,
}

impl MonitorSettings {
    pub fn new(region: Region, orientation: Orientation) -> Self {
        Self {
            region,
            orientation,
            interval: DEFAULT_POLL_INTERVAL,
            movetime: DEFAULT_SUGGESTION_MOVETIME,
        }
    }
}

/// A newly observed position and the engine's answer to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Suggestion {
    pub fen: String,
    pub best_move: Option<UciMove>,
}

pub struct SyncLoop<C, A> {
    capture: C,
    analyzer: A,
    recognizer: BoardRecognizer,
    settings: MonitorSettings,
    last_published: Option<String>,
    last_rejected: Option<String>,
}

impl<C: BoardCapture, A: Analyzer> SyncLoop<C, A> {
    pub fn new(capture: C, analyzer: A, settings: MonitorSettings) -> Self {
        Self {
            capture,
            analyzer,
            recognizer: BoardRecognizer::new(settings.orientation),
            settings,
            last_published: None,
            last_rejected: None,
        }
    }

    /// One iteration. `Ok(None)` when nothing new was seen.
    ///
    /// A changed board normally costs exactly one analysis request. The one
    /// exception is a board without exactly one king per side: it is logged and
    /// skipped with no request at all, since engines crash or hang on such positions.
    pub fn tick(&mut self) -> Result<Option<Suggestion>> {
        let image = self
            .capture
            .capture(&self.settings.region)
            .context("Failed to capture board region")?;

        if !self.recognizer.is_calibrated() {
            self.recognizer
                .calibrate(&image)
                .context("Failed to calibrate on the starting layout")?;
        }

        let Some(placement) = self.recognizer.read_placement(&image) else {
            return Ok(None);
        };
        let fen = placement.fen();
        if self.last_published.as_deref() == Some(fen.as_str()) {
            return Ok(None);
        }

        if !placement.is_plausible() {
            if self.last_rejected.as_deref() != Some(fen.as_str()) {
                log::warn!("ignoring implausible board (king count): {fen}");
                self.last_rejected = Some(fen);
            }
            return Ok(None);
        }

        log::debug!("position changed: {fen}");
        self.last_published = Some(fen.clone());
        let best_move = self.analyzer.best_move(&fen, self.settings.movetime);
        Ok(Some(Suggestion { fen, best_move }))
    }

    /// Ticks until `active` is cleared or the event consumer goes away.
    pub fn run(mut self, active: &AtomicBool, events: &UnboundedSender<Event>) {
        log::info!(
            "monitoring region {} ({:?})",
            self.settings.region,
            self.settings.orientation
        );
        while active.load(Ordering::SeqCst) {
            match self.tick() {
                Ok(Some(suggestion)) => {
                    if events.send(Event::Suggestion(suggestion)).is_err() {
                        log::info!("event consumer gone, ending monitor");
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => log::warn!("monitor tick failed: {e:#}"),
            }
            thread::sleep(self.settings.interval);
        }
        log::info!("monitoring stopped");
    }
}
