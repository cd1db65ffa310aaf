//! Engine module.
//! Owns one external UCI engine process (Stockfish or compatible) behind a mutex,
//! so at most one request is ever in flight.
//! State machine: Unstarted -> Ready -> (Failed -> Ready on restart) -> Stopped.
//! A failed request restarts the engine once from the last resolved path and
//! yields nothing for that call; the next call runs against the fresh process.

use crate::position;
use crate::uci::{self, AnalysisLine, InfoLine, SearchLimit};
use shakmaty::uci::UciMove;
use std::fs;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Name fragment looked for (case-insensitively) when `start` is pointed at a directory.
pub const ENGINE_BINARY_NAME: &str = "stockfish";
/// Fixed depth used by [`EngineSession::evaluate`].
pub const EVALUATION_DEPTH: u32 = 15;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine not found at {}", .0.display())]
    NotFound(PathBuf),
    #[error("permission denied launching {}", .0.display())]
    PermissionDenied(PathBuf),
    #[error("failed to launch engine: {0}")]
    LaunchFailed(String),
    #[error("engine protocol error: {0}")]
    Protocol(String),
    #[error("engine i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("engine session was stopped")]
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Unstarted,
    Ready,
    Failed,
    Stopped,
}

/// Line-oriented pipe to a running engine.
pub trait EngineLink: Send {
    fn send(&mut self, command: &str) -> io::Result<()>;
    /// Next output line without its terminator; `None` once the engine closed its output.
    fn read_line(&mut self) -> io::Result<Option<String>>;
    fn terminate(&mut self);
}

/// Spawns engine processes.
pub trait EngineLauncher: Send + Sync {
    fn launch(&self, path: &Path) -> Result<Box<dyn EngineLink>, EngineError>;
}

/// Launches real subprocesses with piped stdin/stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl EngineLauncher for ProcessLauncher {
    fn launch(&self, path: &Path) -> Result<Box<dyn EngineLink>, EngineError> {
        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::PermissionDenied => EngineError::PermissionDenied(path.to_path_buf()),
                io::ErrorKind::NotFound => EngineError::NotFound(path.to_path_buf()),
                _ => EngineError::LaunchFailed(e.to_string()),
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::LaunchFailed("no stdin handle".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::LaunchFailed("no stdout handle".into()))?;

        Ok(Box::new(ProcessLink {
            child,
            stdin: BufWriter::new(stdin),
            stdout: BufReader::new(stdout),
        }))
    }
}

struct ProcessLink {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl EngineLink for ProcessLink {
    fn send(&mut self, command: &str) -> io::Result<()> {
        log::trace!("engine <- {command}");
        writeln!(self.stdin, "{command}")?;
        self.stdin.flush()
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let line = line.trim_end().to_string();
        log::trace!("engine -> {line}");
        Ok(Some(line))
    }

    fn terminate(&mut self) {
        let _ = self.send("quit");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for ProcessLink {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            self.terminate();
        }
    }
}

/// Resolves an executable path, searching directories for an executable whose
/// name contains [`ENGINE_BINARY_NAME`] (on Windows: an `.exe`).
/// A bare program name that is not a local file is left for `PATH` lookup at spawn time.
pub fn resolve_engine_path(path: &Path) -> Result<PathBuf, EngineError> {
    if !path.exists() {
        if path.components().count() == 1 && path.is_relative() {
            return Ok(path.to_path_buf());
        }
        return Err(EngineError::NotFound(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Ok(fs::canonicalize(path)?);
    }
    find_engine_in(path)?.ok_or_else(|| EngineError::NotFound(path.to_path_buf()))
}

fn find_engine_in(dir: &Path) -> Result<Option<PathBuf>, EngineError> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort();

    if let Some(found) = entries.iter().find(|entry| is_engine_binary(entry)) {
        return Ok(Some(found.clone()));
    }
    for entry in entries.iter().filter(|e| e.is_dir()) {
        if let Some(found) = find_engine_in(entry)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

fn is_engine_binary(path: &Path) -> bool {
    let named = path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().to_lowercase().contains(ENGINE_BINARY_NAME));
    named && is_executable(path)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(windows)]
fn is_executable(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"))
}

#[cfg(not(any(unix, windows)))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

struct Inner {
    state: SessionState,
    link: Option<Box<dyn EngineLink>>,
    path: Option<PathBuf>,
}

/// The single shared handle to the analysis engine.
pub struct EngineSession {
    launcher: Box<dyn EngineLauncher>,
    inner: Mutex<Inner>,
}

impl EngineSession {
    pub fn new() -> Self {
        Self::with_launcher(Box::new(ProcessLauncher))
    }

    pub fn with_launcher(launcher: Box<dyn EngineLauncher>) -> Self {
        Self {
            launcher,
            inner: Mutex::new(Inner {
                state: SessionState::Unstarted,
                link: None,
                path: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Launches the engine at `path` (an executable, or a directory to search).
    /// Replaces a running engine. Fails for good once the session is stopped.
    pub fn start(&self, path: &Path) -> Result<PathBuf, EngineError> {
        let resolved = resolve_engine_path(path)?;
        let mut inner = self.lock();
        if inner.state == SessionState::Stopped {
            return Err(EngineError::Stopped);
        }
        if let Some(mut old) = inner.link.take() {
            old.terminate();
        }

        match self.launch_ready(&resolved) {
            Ok(link) => {
                inner.link = Some(link);
                inner.path = Some(resolved.clone());
                inner.state = SessionState::Ready;
                log::info!("engine ready: {}", resolved.display());
                Ok(resolved)
            }
            Err(e) => {
                inner.state = match inner.state {
                    SessionState::Unstarted => SessionState::Unstarted,
                    _ => SessionState::Failed,
                };
                Err(e)
            }
        }
    }

    fn launch_ready(&self, path: &Path) -> Result<Box<dyn EngineLink>, EngineError> {
        let mut link = self.launcher.launch(path)?;
        if let Err(e) = handshake(link.as_mut()) {
            link.terminate();
            return Err(EngineError::LaunchFailed(e.to_string()));
        }
        Ok(link)
    }

    /// Runs `request` against the ready engine. On failure the engine is
    /// restarted once and the call yields `None`.
    fn with_engine<T>(
        &self,
        what: &str,
        request: impl FnOnce(&mut dyn EngineLink) -> Result<T, EngineError>,
    ) -> Option<T> {
        let mut inner = self.lock();
        if inner.state != SessionState::Ready {
            return None;
        }
        let link = inner.link.as_mut()?;

        match request(link.as_mut()) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("engine {what} failed, restarting: {e}");
                inner.state = SessionState::Failed;
                if let Some(mut dead) = inner.link.take() {
                    dead.terminate();
                }
                let relaunched = inner.path.clone().map(|path| self.launch_ready(&path));
                match relaunched {
                    Some(Ok(link)) => {
                        inner.link = Some(link);
                        inner.state = SessionState::Ready;
                        log::info!("engine restarted");
                    }
                    Some(Err(e)) => log::error!("engine restart failed: {e}"),
                    None => log::error!("engine restart impossible: no known path"),
                }
                None
            }
        }
    }

    /// Best move within `budget`. `None` when not ready, on failure, or when
    /// the engine reports no move.
    pub fn best_move(&self, fen: &str, budget: Duration) -> Option<UciMove> {
        self.with_engine("best move", |link| {
            search(link, fen, 1, SearchLimit::MoveTime(budget)).map(|(_, best)| best)
        })
        .flatten()
    }

    /// Top `limit` distinct lines in the order the engine ranks them.
    pub fn top_moves(&self, fen: &str, limit: usize, budget: Duration) -> Vec<AnalysisLine> {
        let limit = limit.max(1);
        self.with_engine("multi-line analysis", |link| {
            let (lines, _) = search(link, fen, limit, SearchLimit::MoveTime(budget))?;
            Ok(lines.into_iter().flatten().map(AnalysisLine::from).collect())
        })
        .unwrap_or_default()
    }

    /// Score of the position at [`EVALUATION_DEPTH`], relative to the side to move.
    pub fn evaluate(&self, fen: &str) -> Option<i32> {
        self.with_engine("evaluation", |link| {
            let (lines, _) = search(link, fen, 1, SearchLimit::Depth(EVALUATION_DEPTH))?;
            Ok(lines.into_iter().next().flatten().map(|info| info.score))
        })
        .flatten()
    }

    /// Terminates the engine. Safe to call more than once.
    pub fn stop(&self) {
        let mut inner = self.lock();
        if let Some(mut link) = inner.link.take() {
            link.terminate();
            log::info!("engine stopped");
        }
        inner.state = SessionState::Stopped;
    }
}

impl Default for EngineSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn expect_line(link: &mut dyn EngineLink) -> Result<String, EngineError> {
    link.read_line()?
        .ok_or_else(|| EngineError::Protocol("engine closed its output".into()))
}

fn wait_for(link: &mut dyn EngineLink, token: &str) -> Result<(), EngineError> {
    while expect_line(link)?.trim() != token {}
    Ok(())
}

fn handshake(link: &mut dyn EngineLink) -> Result<(), EngineError> {
    link.send("uci")?;
    wait_for(link, "uciok")?;
    link.send("isready")?;
    wait_for(link, "readyok")
}

/// Runs one search. Returns the latest `info` per multipv slot and the best move.
fn search(
    link: &mut dyn EngineLink,
    fen: &str,
    lines: usize,
    limit: SearchLimit,
) -> Result<(Vec<Option<InfoLine>>, Option<UciMove>), EngineError> {
    link.send(&format!("setoption name MultiPV value {lines}"))?;
    link.send(&format!("position fen {}", position::with_valid_castling(fen)))?;
    link.send("isready")?;
    wait_for(link, "readyok")?;
    link.send(&limit.go_command())?;

    let mut slots: Vec<Option<InfoLine>> = vec![None; lines];
    loop {
        let line = expect_line(link)?;
        if let Some(best) = uci::parse_bestmove(&line).map_err(EngineError::Protocol)? {
            return Ok((slots, best));
        }
        if let Some(info) = uci::parse_info(&line).map_err(EngineError::Protocol)? {
            if (1..=lines).contains(&info.multipv) {
                let index = info.multipv - 1;
                slots[index] = Some(info);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// How the scripted engine answers a `go`.
    #[derive(Clone)]
    pub(crate) enum Reply {
        Lines(Vec<&'static str>),
        Crash,
    }

    /// In-memory UCI engine replaying scripted search output.
    pub(crate) struct ScriptedEngine {
        replies: Arc<Mutex<VecDeque<Reply>>>,
        pending: VecDeque<String>,
        crashed: bool,
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl EngineLink for ScriptedEngine {
        fn send(&mut self, command: &str) -> io::Result<()> {
            if self.crashed {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "engine crashed"));
            }
            self.sent.lock().unwrap().push(command.to_string());
            match command.split_whitespace().next() {
                Some("uci") => self
                    .pending
                    .extend(["id name Scripted", "uciok"].map(String::from)),
                Some("isready") => self.pending.push_back("readyok".into()),
                Some("go") => match self.replies.lock().unwrap().pop_front() {
                    Some(Reply::Lines(lines)) => {
                        self.pending.extend(lines.into_iter().map(String::from))
                    }
                    Some(Reply::Crash) => self.crashed = true,
                    None => self.pending.push_back("bestmove (none)".into()),
                },
                _ => {}
            }
            Ok(())
        }

        fn read_line(&mut self) -> io::Result<Option<String>> {
            if self.crashed {
                return Ok(None);
            }
            Ok(self.pending.pop_front())
        }

        fn terminate(&mut self) {
            self.crashed = true;
        }
    }

    /// Hands out scripted engines sharing one reply queue, counting launches.
    #[derive(Clone, Default)]
    pub(crate) struct ScriptedLauncher {
        pub(crate) replies: Arc<Mutex<VecDeque<Reply>>>,
        pub(crate) launches: Arc<AtomicUsize>,
        pub(crate) sent: Arc<Mutex<Vec<String>>>,
        /// Makes every later launch fail.
        pub(crate) refuse_launch: Arc<AtomicBool>,
    }

    impl ScriptedLauncher {
        pub(crate) fn push(&self, reply: Reply) {
            self.replies.lock().unwrap().push_back(reply);
        }
    }

    impl EngineLauncher for ScriptedLauncher {
        fn launch(&self, _path: &Path) -> Result<Box<dyn EngineLink>, EngineError> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            if self.refuse_launch.load(Ordering::SeqCst) {
                return Err(EngineError::LaunchFailed("scripted launch refused".into()));
            }
            Ok(Box::new(ScriptedEngine {
                replies: Arc::clone(&self.replies),
                pending: VecDeque::new(),
                crashed: false,
                sent: Arc::clone(&self.sent),
            }))
        }
    }

    pub(crate) const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    const BUDGET: Duration = Duration::from_millis(50);

    /// Session started against a scripted engine, plus the dir keeping its path alive.
    pub(crate) fn scripted_session() -> (EngineSession, ScriptedLauncher, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("stockfish");
        fs::write(&exe, b"").unwrap();
        let launcher = ScriptedLauncher::default();
        let session = EngineSession::with_launcher(Box::new(launcher.clone()));
        session.start(&exe).unwrap();
        (session, launcher, dir)
    }

    #[test]
    fn nothing_answers_before_start() {
        let session = EngineSession::with_launcher(Box::new(ScriptedLauncher::default()));
        assert_eq!(session.state(), SessionState::Unstarted);
        assert_eq!(session.best_move(START_FEN, BUDGET), None);
        assert!(session.top_moves(START_FEN, 3, BUDGET).is_empty());
        assert_eq!(session.evaluate(START_FEN), None);
    }

    #[test]
    fn missing_path_is_not_found() {
        let session = EngineSession::with_launcher(Box::new(ScriptedLauncher::default()));
        let err = session.start(Path::new("/definitely/not/here/stockfish")).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
        assert!(err.to_string().contains("not found"));
        assert_eq!(session.state(), SessionState::Unstarted);

        // bare names are looked up on PATH when spawned
        assert_eq!(
            resolve_engine_path(Path::new("no-such-engine-xyz")).unwrap(),
            PathBuf::from("no-such-engine-xyz")
        );
    }

    #[cfg(unix)]
    fn write_executable(path: &Path, contents: &str) {
        use std::os::unix::fs::PermissionsExt;
        fs::write(path, contents).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn directory_search_finds_engine_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README.txt"), b"").unwrap();
        // names match but these are not programs
        fs::write(dir.path().join("stockfish.txt"), b"notes").unwrap();
        fs::write(dir.path().join("stockfish.zip"), b"").unwrap();
        let nested = dir.path().join("bin");
        fs::create_dir(&nested).unwrap();
        write_executable(&nested.join("StockFish-17"), "");
        assert_eq!(
            resolve_engine_path(dir.path()).unwrap(),
            nested.join("StockFish-17")
        );

        let empty = tempfile::tempdir().unwrap();
        assert!(matches!(
            resolve_engine_path(empty.path()),
            Err(EngineError::NotFound(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_file_is_permission_denied() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("stockfish");
        fs::write(&exe, b"not a program").unwrap();
        let session = EngineSession::new();
        assert!(matches!(
            session.start(&exe),
            Err(EngineError::PermissionDenied(_))
        ));
    }

    #[test]
    fn best_move_runs_a_timed_search() {
        let (session, launcher, _dir) = scripted_session();
        launcher.push(Reply::Lines(vec![
            "info depth 10 score cp 30 pv e2e4 e7e5",
            "bestmove e2e4 ponder e7e5",
        ]));
        let best = session.best_move(START_FEN, Duration::from_millis(500));
        assert_eq!(best.map(|m| m.to_string()).as_deref(), Some("e2e4"));

        let sent = launcher.sent.lock().unwrap();
        assert!(sent.contains(&format!("position fen {START_FEN}")));
        assert!(sent.contains(&"go movetime 500".to_string()));
        assert!(sent.contains(&"setoption name MultiPV value 1".to_string()));
    }

    #[test]
    fn top_moves_keeps_engine_order_and_scores() {
        let (session, launcher, _dir) = scripted_session();
        launcher.push(Reply::Lines(vec![
            "info depth 1 multipv 1 score cp 10 pv d2d4",
            "info depth 12 multipv 1 score cp 35 pv e2e4 e7e5 g1f3",
            "info depth 12 multipv 2 score cp 40 pv d2d4 d7d5",
            "info depth 12 multipv 3 score mate -4 pv g2g4",
            "bestmove e2e4",
        ]));
        let lines = session.top_moves(START_FEN, 3, BUDGET);
        assert_eq!(lines.len(), 3);
        let summary: Vec<_> = lines
            .iter()
            .map(|l| (l.rank, l.best_move.to_string(), l.score))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, "e2e4".to_string(), 35),
                (2, "d2d4".to_string(), 40),
                (3, "g2g4".to_string(), -9996),
            ]
        );
        assert_eq!(lines[0].pv.len(), 3);
        assert!(
            launcher
                .sent
                .lock()
                .unwrap()
                .contains(&"setoption name MultiPV value 3".to_string())
        );
    }

    #[test]
    fn evaluate_searches_to_fixed_depth() {
        let (session, launcher, _dir) = scripted_session();
        launcher.push(Reply::Lines(vec![
            "info depth 15 score cp -42 pv e7e5",
            "bestmove e7e5",
        ]));
        assert_eq!(session.evaluate(START_FEN), Some(-42));
        assert!(launcher.sent.lock().unwrap().contains(&"go depth 15".to_string()));
    }

    #[test]
    fn crash_restarts_once_and_next_call_succeeds() {
        let (session, launcher, _dir) = scripted_session();
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);

        launcher.push(Reply::Crash);
        launcher.push(Reply::Lines(vec!["bestmove g1f3"]));

        assert_eq!(session.best_move(START_FEN, BUDGET), None);
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
        assert_eq!(session.state(), SessionState::Ready);

        let best = session.best_move(START_FEN, BUDGET);
        assert_eq!(best.map(|m| m.to_string()).as_deref(), Some("g1f3"));
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_relaunch_leaves_session_failed() {
        let (session, launcher, _dir) = scripted_session();
        launcher.push(Reply::Crash);
        launcher.refuse_launch.store(true, Ordering::SeqCst);

        assert_eq!(session.best_move(START_FEN, BUDGET), None);
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);

        // no further restart attempts until `start` is called again
        assert_eq!(session.best_move(START_FEN, BUDGET), None);
        assert!(session.top_moves(START_FEN, 2, BUDGET).is_empty());
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn castling_rights_are_checked_before_sending() {
        let (session, launcher, _dir) = scripted_session();
        launcher.push(Reply::Lines(vec!["bestmove e1e2"]));
        session.best_move("4k3/8/8/8/8/8/8/4K3 w KQkq - 0 1", BUDGET);
        assert!(
            launcher
                .sent
                .lock()
                .unwrap()
                .contains(&"position fen 4k3/8/8/8/8/8/8/4K3 w - - 0 1".to_string())
        );
    }

    #[cfg(unix)]
    #[test]
    fn shell_script_engine_runs_through_real_pipes() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("stockfish");
        write_executable(
            &exe,
            r#"#!/bin/sh
while read -r line; do
  case "$line" in
    uci) echo "id name ShellFish"; echo "uciok" ;;
    isready) echo "readyok" ;;
    go*) echo "info depth 1 score cp 12 pv e2e4"; echo "bestmove e2e4" ;;
    quit) exit 0 ;;
  esac
done
"#,
        );

        let session = EngineSession::new();
        session.start(&exe).unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        let best = session.best_move(START_FEN, BUDGET);
        assert_eq!(best.map(|m| m.to_string()).as_deref(), Some("e2e4"));
        assert_eq!(session.evaluate(START_FEN), Some(12));
        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn garbled_output_counts_as_failure() {
        let (session, launcher, _dir) = scripted_session();
        launcher.push(Reply::Lines(vec!["bestmove ???"]));
        assert!(session.top_moves(START_FEN, 2, BUDGET).is_empty());
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn no_legal_move_is_not_a_failure() {
        let (session, launcher, _dir) = scripted_session();
        launcher.push(Reply::Lines(vec!["info depth 0 score mate 0", "bestmove (none)"]));
        assert_eq!(session.best_move(START_FEN, BUDGET), None);
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_is_terminal_and_idempotent() {
        let (session, _launcher, dir) = scripted_session();
        session.stop();
        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.best_move(START_FEN, BUDGET), None);
        assert!(matches!(
            session.start(&dir.path().join("stockfish")),
            Err(EngineError::Stopped)
        ));
    }
}
