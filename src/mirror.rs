//! Mirror module: replays a move on the external board with a simulated drag.
//! Uses `rdev` to synthesize pointer events; on macOS the terminal needs
//! Accessibility permission for this to work.
//! Promotions get one extra click on the destination square, which picks the
//! first entry of the site's promotion menu (queen on the common sites).
//! Other promotion choices cannot be expressed.

use crate::geometry::{Orientation, Region, center};
use crate::position::Placement;
use rdev::{Button, EventType, simulate};
use shakmaty::uci::UciMove;
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Pause before the promotion click, letting the site open its menu.
pub const PROMOTION_CLICK_DELAY: Duration = Duration::from_millis(100);

/// New boards tolerated while waiting for a mirrored move to show up.
pub const ECHO_PATIENCE: u32 = 3;

#[derive(Debug, Error)]
pub enum ActuationError {
    #[error("could not simulate {0}")]
    Simulate(String),
    #[error("move {0} cannot be played by dragging")]
    Unsupported(String),
}

/// Pointer automation backend.
pub trait PointerDriver: Send + Sync {
    fn move_to(&self, x: f64, y: f64) -> Result<(), ActuationError>;
    /// Press at `from`, move to `to`, release.
    fn drag(&self, from: (f64, f64), to: (f64, f64)) -> Result<(), ActuationError>;
    /// Left click at the current pointer position.
    fn click(&self) -> Result<(), ActuationError>;
}

/// Drives moves on the screen board.
pub struct MoveActuator {
    pointer: Box<dyn PointerDriver>,
}

impl MoveActuator {
    pub fn new(pointer: Box<dyn PointerDriver>) -> Self {
        Self { pointer }
    }

    /// Drags the piece for `mv`. Pointer failures are returned as-is.
    pub fn execute(
        &self,
        mv: &UciMove,
        region: &Region,
        orientation: Orientation,
    ) -> Result<(), ActuationError> {
        let &UciMove::Normal {
            from,
            to,
            promotion,
        } = mv
        else {
            return Err(ActuationError::Unsupported(mv.to_string()));
        };

        let source = center(from, region, orientation);
        let target = center(to, region, orientation);
        log::debug!("mirroring {mv}: {source:?} -> {target:?}");

        self.pointer.move_to(source.0, source.1)?;
        self.pointer.drag(source, target)?;

        if promotion.is_some() {
            thread::sleep(PROMOTION_CLICK_DELAY);
            self.pointer.click()?;
        }
        Ok(())
    }
}

/// Keeps mirror mode from answering its own moves.
/// After a move is mirrored, suggestions are held back until the board shows
/// the result of that move; the position after it is the opponent's reply.
/// The wait ends early when the drag failed ([`EchoGuard::clear`]) or after
/// [`ECHO_PATIENCE`] boards that never showed the move (the site refused it).
#[derive(Debug, Default)]
pub struct EchoGuard {
    pending: Option<String>,
    unmatched: u32,
}

impl EchoGuard {
    /// Whether a suggestion for `fen` may be mirrored. Call once per new board.
    pub fn admit(&mut self, fen: &str) -> bool {
        let Some(expected) = &self.pending else {
            return true;
        };
        let landed = fen.split_whitespace().next() == Some(expected.as_str());
        if landed {
            self.clear();
            return false;
        }

        self.unmatched += 1;
        if self.unmatched >= ECHO_PATIENCE {
            log::warn!("mirrored move never appeared on the board, mirroring resumes");
            self.clear();
            return true;
        }
        false
    }

    /// Records the board expected once `mv` lands on `fen`.
    pub fn expect_after(&mut self, fen: &str, mv: &UciMove) {
        self.unmatched = 0;
        self.pending = Placement::from_board_field(fen).and_then(|mut placement| {
            placement.apply(mv).then(|| placement.board_field())
        });
    }

    /// Stops waiting, e.g. after the drag itself failed.
    pub fn clear(&mut self) {
        self.pending = None;
        self.unmatched = 0;
    }

    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }
}

/// `rdev`-backed pointer.
#[derive(Debug, Clone)]
pub struct RdevPointer {
    /// Pause after each synthesized event; some platforms drop events sent back to back.
    pub event_delay: Duration,
    /// Intermediate moves during a drag, so sites register it as a drag.
    pub drag_steps: u32,
}

impl Default for RdevPointer {
    fn default() -> Self {
        Self {
            event_delay: Duration::from_millis(20),
            drag_steps: 10,
        }
    }
}

impl RdevPointer {
    fn send(&self, event: &EventType) -> Result<(), ActuationError> {
        simulate(event).map_err(|e| ActuationError::Simulate(format!("{event:?}: {e:?}")))?;
        thread::sleep(self.event_delay);
        Ok(())
    }
}

impl PointerDriver for RdevPointer {
    fn move_to(&self, x: f64, y: f64) -> Result<(), ActuationError> {
        self.send(&EventType::MouseMove { x, y })
    }

    fn drag(&self, from: (f64, f64), to: (f64, f64)) -> Result<(), ActuationError> {
        self.move_to(from.0, from.1)?;
        self.send(&EventType::ButtonPress(Button::Left))?;
        let steps = self.drag_steps.max(1);
        for step in 1..=steps {
            let t = f64::from(step) / f64::from(steps);
            self.move_to(from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t)?;
        }
        self.send(&EventType::ButtonRelease(Button::Left))
    }

    fn click(&self) -> Result<(), ActuationError> {
        self.send(&EventType::ButtonPress(Button::Left))?;
        self.send(&EventType::ButtonRelease(Button::Left))
    }
}
