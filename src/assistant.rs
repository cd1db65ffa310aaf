//! Task orchestration.
//! The assistant owns the engine handle, at most one sync-loop worker, and the
//! one-shot tasks (engine start, analysis, engine move, mirrored move).
//! Workers never touch presentation state: each posts an [`Event`] on a single
//! channel and the consumer applies it.

use crate::capture::BoardCapture;
use crate::engine::{EngineError, EngineSession};
use crate::geometry::{Orientation, Region};
use crate::mirror::{ActuationError, MoveActuator};
use crate::monitor::{MonitorSettings, Suggestion, SyncLoop};
use crate::uci::AnalysisLine;
use shakmaty::uci::UciMove;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::{self, JoinHandle};

/// Results posted back to the consumer.
#[derive(Debug)]
pub enum Event {
    EngineStarted(Result<PathBuf, EngineError>),
    Suggestion(Suggestion),
    Analysis {
        fen: String,
        lines: Vec<AnalysisLine>,
    },
    EngineMove {
        fen: String,
        best_move: Option<UciMove>,
    },
    MirrorDone {
        mv: UciMove,
        result: Result<(), ActuationError>,
    },
}

struct Monitor {
    active: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

pub struct Assistant {
    engine: Arc<EngineSession>,
    actuator: Arc<MoveActuator>,
    events: UnboundedSender<Event>,
    monitor: Option<Monitor>,
}

impl Assistant {
    pub fn new(engine: Arc<EngineSession>, actuator: MoveActuator) -> (Self, UnboundedReceiver<Event>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let assistant = Self {
            engine,
            actuator: Arc::new(actuator),
            events,
            monitor: None,
        };
        (assistant, receiver)
    }

    pub fn engine(&self) -> &Arc<EngineSession> {
        &self.engine
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor
            .as_ref()
            .is_some_and(|m| m.active.load(Ordering::SeqCst) && !m.worker.is_finished())
    }

    /// Starts (or restarts) the engine in the background; posts [`Event::EngineStarted`].
    pub fn start_engine(&self, path: PathBuf) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let events = self.events.clone();
        task::spawn_blocking(move || {
            let result = engine.start(&path);
            if let Err(e) = &result {
                log::error!("engine start failed: {e}");
            }
            let _ = events.send(Event::EngineStarted(result));
        })
    }

    /// Multi-line analysis of one position; posts [`Event::Analysis`].
    pub fn request_analysis(&self, fen: String, limit: usize, budget: Duration) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let events = self.events.clone();
        task::spawn_blocking(move || {
            let lines = engine.top_moves(&fen, limit, budget);
            let _ = events.send(Event::Analysis { fen, lines });
        })
    }

    /// Asks the engine to pick a move; posts [`Event::EngineMove`].
    pub fn request_engine_move(&self, fen: String, budget: Duration) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let events = self.events.clone();
        task::spawn_blocking(move || {
            let best_move = engine.best_move(&fen, budget);
            let _ = events.send(Event::EngineMove { fen, best_move });
        })
    }

    /// Plays `mv` on the screen board; posts [`Event::MirrorDone`].
    pub fn mirror_move(&self, mv: UciMove, region: Region, orientation: Orientation) -> JoinHandle<()> {
        let actuator = Arc::clone(&self.actuator);
        let events = self.events.clone();
        task::spawn_blocking(move || {
            let result = actuator.execute(&mv, &region, orientation);
            if let Err(e) = &result {
                log::warn!("could not mirror {mv}: {e}");
            }
            let _ = events.send(Event::MirrorDone { mv, result });
        })
    }

    /// Starts a monitoring session, stopping the previous one first.
    pub async fn start_monitoring<C>(&mut self, capture: C, settings: MonitorSettings)
    where
        C: BoardCapture + Send + 'static,
    {
        self.stop_monitoring().await;

        let active = Arc::new(AtomicBool::new(true));
        let sync = SyncLoop::new(capture, Arc::clone(&self.engine), settings);
        let events = self.events.clone();
        let flag = Arc::clone(&active);
        let worker = task::spawn_blocking(move || sync.run(&flag, &events));
        self.monitor = Some(Monitor { active, worker });
    }

    /// Clears the monitoring flag and waits for the in-flight iteration to finish.
    pub async fn stop_monitoring(&mut self) {
        let Some(monitor) = self.monitor.take() else {
            return;
        };
        monitor.active.store(false, Ordering::SeqCst);
        if let Err(e) = monitor.worker.await {
            log::error!("monitor worker panicked: {e}");
        }
    }

    /// Stops monitoring and the engine.
    pub async fn shutdown(&mut self) {
        self.stop_monitoring().await;
        let engine = Arc::clone(&self.engine);
        if let Err(e) = task::spawn_blocking(move || engine.stop()).await {
            log::error!("engine shutdown panicked: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::{Reply, START_FEN, ScriptedLauncher, scripted_session};
    use crate::mirror::tests::{Gesture, RecordingPointer};
    use crate::ocr::tests::render_board;
    use crate::position::STARTING_BOARD_FIELD;
    use anyhow::Result;
    use image::RgbImage;
    use std::sync::atomic::AtomicUsize;

    struct StaticBoard {
        frame: RgbImage,
        captures: Arc<AtomicUsize>,
    }

    impl BoardCapture for StaticBoard {
        fn capture(&mut self, _region: &Region) -> Result<RgbImage> {
            self.captures.fetch_add(1, Ordering::SeqCst);
            Ok(self.frame.clone())
        }
    }

    fn region() -> Region {
        Region::new(0, 0, 320, 320).unwrap()
    }

    fn assistant_with(
        engine: EngineSession,
        pointer: RecordingPointer,
    ) -> (Assistant, UnboundedReceiver<Event>) {
        Assistant::new(Arc::new(engine), MoveActuator::new(Box::new(pointer)))
    }

    #[tokio::test]
    async fn engine_start_failure_is_posted() {
        let engine = EngineSession::with_launcher(Box::new(ScriptedLauncher::default()));
        let (assistant, mut events) = assistant_with(engine, RecordingPointer::default());
        assistant
            .start_engine(PathBuf::from("/missing/stockfish"))
            .await
            .unwrap();
        match events.recv().await {
            Some(Event::EngineStarted(Err(EngineError::NotFound(_)))) => {}
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn analysis_results_come_back_through_the_channel() {
        let (engine, launcher, _dir) = scripted_session();
        launcher.push(Reply::Lines(vec![
            "info depth 9 multipv 1 score cp 20 pv e2e4",
            "info depth 9 multipv 2 score cp 15 pv d2d4",
            "bestmove e2e4",
        ]));
        launcher.push(Reply::Lines(vec!["bestmove g1f3"]));
        let (assistant, mut events) = assistant_with(engine, RecordingPointer::default());

        let budget = Duration::from_millis(10);
        assistant
            .request_analysis(START_FEN.to_string(), 2, budget)
            .await
            .unwrap();
        match events.recv().await {
            Some(Event::Analysis { fen, lines }) => {
                assert_eq!(fen, START_FEN);
                assert_eq!(lines.len(), 2);
            }
            other => panic!("unexpected event {other:?}"),
        }

        assistant
            .request_engine_move(START_FEN.to_string(), budget)
            .await
            .unwrap();
        match events.recv().await {
            Some(Event::EngineMove { best_move, .. }) => {
                assert_eq!(best_move.map(|m| m.to_string()).as_deref(), Some("g1f3"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn mirror_failures_are_reported() {
        let engine = EngineSession::with_launcher(Box::new(ScriptedLauncher::default()));
        let pointer = RecordingPointer {
            fail_drags: true,
            ..RecordingPointer::default()
        };
        let (assistant, mut events) = assistant_with(engine, pointer.clone());
        assistant
            .mirror_move("e2e4".parse().unwrap(), region(), Orientation::Standard)
            .await
            .unwrap();
        assert_eq!(
            *pointer.gestures.lock().unwrap(),
            vec![Gesture::MoveTo(180.0, 260.0)]
        );
        match events.recv().await {
            Some(Event::MirrorDone { mv, result }) => {
                assert_eq!(mv.to_string(), "e2e4");
                assert!(matches!(result, Err(ActuationError::Simulate(_))));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn mirror_success_is_reported() {
        let engine = EngineSession::with_launcher(Box::new(ScriptedLauncher::default()));
        let pointer = RecordingPointer::default();
        let (assistant, mut events) = assistant_with(engine, pointer.clone());
        assistant
            .mirror_move("g1f3".parse().unwrap(), region(), Orientation::Standard)
            .await
            .unwrap();
        assert!(matches!(
            events.recv().await,
            Some(Event::MirrorDone { result: Ok(()), .. })
        ));
        assert_eq!(pointer.gestures.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn monitoring_publishes_and_stops_cleanly() {
        let (engine, launcher, _dir) = scripted_session();
        launcher.push(Reply::Lines(vec!["bestmove e2e4"]));
        let (mut assistant, mut events) = assistant_with(engine, RecordingPointer::default());

        let captures = Arc::new(AtomicUsize::new(0));
        let board = StaticBoard {
            frame: render_board(STARTING_BOARD_FIELD, Orientation::Standard),
            captures: Arc::clone(&captures),
        };
        let settings = MonitorSettings {
            interval: Duration::from_millis(2),
            ..MonitorSettings::new(region(), Orientation::Standard)
        };
        assistant.start_monitoring(board, settings).await;
        assert!(assistant.is_monitoring());

        match events.recv().await {
            Some(Event::Suggestion(suggestion)) => {
                assert!(suggestion.fen.starts_with(STARTING_BOARD_FIELD));
                assert_eq!(
                    suggestion.best_move.map(|m| m.to_string()).as_deref(),
                    Some("e2e4")
                );
            }
            other => panic!("unexpected event {other:?}"),
        }

        assistant.stop_monitoring().await;
        assert!(!assistant.is_monitoring());
        let after_stop = captures.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(captures.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn new_session_replaces_the_old_one() {
        let (engine, _launcher, _dir) = scripted_session();
        let (mut assistant, _events) = assistant_with(engine, RecordingPointer::default());

        let first = Arc::new(AtomicUsize::new(0));
        let frame = render_board(STARTING_BOARD_FIELD, Orientation::Standard);
        let settings = MonitorSettings {
            interval: Duration::from_millis(2),
            ..MonitorSettings::new(region(), Orientation::Standard)
        };
        assistant
            .start_monitoring(
                StaticBoard {
                    frame: frame.clone(),
                    captures: Arc::clone(&first),
                },
                settings,
            )
            .await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = Arc::new(AtomicUsize::new(0));
        assistant
            .start_monitoring(
                StaticBoard {
                    frame,
                    captures: Arc::clone(&second),
                },
                settings,
            )
            .await;
        let first_total = first.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(first.load(Ordering::SeqCst), first_total);
        assert!(second.load(Ordering::SeqCst) > 0);

        assistant.shutdown().await;
        assert_eq!(
            assistant.engine().state(),
            crate::engine::SessionState::Stopped
        );
    }
}
