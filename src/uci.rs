//! UCI wire format: commands we send and the `info` / `bestmove` lines we read.
//! Scores are kept as single integers relative to the side to move. Mate
//! distances are folded into that integer as ±(MATE_SCORE − n), and only
//! [`encode_mate`] / [`decode_score`] know about the fold.

use shakmaty::uci::UciMove;
use std::fmt;
use std::time::Duration;

pub const MATE_SCORE: i32 = 10_000;
/// Any score at or beyond this magnitude is a mate line.
pub const MATE_THRESHOLD: i32 = 9_000;

/// Folds a UCI `score mate n` into the centipawn scale.
pub fn encode_mate(moves: i32) -> i32 {
    if moves > 0 {
        MATE_SCORE - moves
    } else {
        -MATE_SCORE - moves
    }
}

pub fn is_mate(score: i32) -> bool {
    score.abs() >= MATE_THRESHOLD
}

/// Decoded view of a raw score.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    /// Side to move mates in this many moves.
    MateIn(u32),
    /// Side to move gets mated in this many moves.
    MatedIn(u32),
}

pub fn decode_score(raw: i32) -> Score {
    if !is_mate(raw) {
        return Score::Centipawns(raw);
    }
    let distance = (MATE_SCORE - raw.abs()).max(0) as u32;
    if raw > 0 {
        Score::MateIn(distance)
    } else {
        Score::MatedIn(distance)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Centipawns(cp) => write!(f, "{:+.2}", f64::from(*cp) / 100.0),
            Score::MateIn(n) => write!(f, "mate in {n}"),
            Score::MatedIn(n) => write!(f, "mated in {n}"),
        }
    }
}

/// How long a search may run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchLimit {
    MoveTime(Duration),
    Depth(u32),
}

impl SearchLimit {
    pub fn go_command(self) -> String {
        match self {
            SearchLimit::MoveTime(budget) => format!("go movetime {}", budget.as_millis().max(1)),
            SearchLimit::Depth(depth) => format!("go depth {depth}"),
        }
    }
}

/// One scored line from an `info` report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InfoLine {
    /// 1-based `multipv` index, 1 when the engine omits it.
    pub multipv: usize,
    pub score: i32,
    pub pv: Vec<UciMove>,
}

/// Parses an `info` line carrying both a score and a principal variation.
/// Other `info` lines (currmove, string, hashfull...) give `Ok(None)`.
pub fn parse_info(line: &str) -> Result<Option<InfoLine>, String> {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("info") {
        return Ok(None);
    }

    let mut multipv = 1;
    let mut score = None;
    let mut pv = Vec::new();
    while let Some(token) = tokens.next() {
        match token {
            "multipv" => {
                multipv = tokens
                    .next()
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(|| format!("bad multipv in `{line}`"))?;
            }
            "score" => {
                let kind = tokens.next();
                let value: i32 = tokens
                    .next()
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(|| format!("bad score in `{line}`"))?;
                score = match kind {
                    Some("cp") => Some(value),
                    Some("mate") => Some(encode_mate(value)),
                    _ => return Err(format!("unknown score kind in `{line}`")),
                };
            }
            "pv" => {
                for mv in tokens.by_ref() {
                    pv.push(
                        mv.parse::<UciMove>()
                            .map_err(|_| format!("bad move `{mv}` in pv"))?,
                    );
                }
            }
            "string" => break,
            _ => {}
        }
    }

    match score {
        Some(score) if !pv.is_empty() => Ok(Some(InfoLine { multipv, score, pv })),
        _ => Ok(None),
    }
}

/// Parses `bestmove <move> [ponder <move>]`. The outer `None` means the line
/// is something else; `Some(None)` is a reported absence of moves.
pub fn parse_bestmove(line: &str) -> Result<Option<Option<UciMove>>, String> {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("bestmove") {
        return Ok(None);
    }
    match tokens.next() {
        None | Some("(none)") | Some("0000") => Ok(Some(None)),
        Some(mv) => mv
            .parse::<UciMove>()
            .map(|mv| Some(Some(mv)))
            .map_err(|_| format!("bad bestmove `{mv}`")),
    }
}

/// One ranked line of a multi-line analysis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisLine {
    pub rank: usize,
    pub best_move: UciMove,
    pub score: i32,
    pub pv: Vec<UciMove>,
}

impl AnalysisLine {
    pub fn decoded_score(&self) -> Score {
        decode_score(self.score)
    }
}

impl From<InfoLine> for AnalysisLine {
    fn from(info: InfoLine) -> Self {
        Self {
            rank: info.multipv,
            best_move: info.pv[0],
            score: info.score,
            pv: info.pv,
        }
    }
}
