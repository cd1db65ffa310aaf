//! Screen-board chess assistant.
//! Watches a chessboard drawn by another program, reads the position by
//! template matching, asks a UCI engine for the best move and can replay it
//! with simulated pointer input.

pub mod assistant;
pub mod calibrate;
pub mod capture;
pub mod config;
pub mod engine;
pub mod geometry;
pub mod mirror;
pub mod monitor;
pub mod ocr;
pub mod position;
pub mod uci;

pub use assistant::{Assistant, Event};
pub use engine::{EngineError, EngineSession, SessionState};
pub use geometry::{Orientation, Region};
pub use ocr::BoardRecognizer;
