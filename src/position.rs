//! Piece placement as read off the screen.
//! Only the board field is observable; side to move, castling rights and clocks
//! are never recovered from pixels, so every position string gets the fixed
//! `DEFAULT_FEN_SUFFIX`.

use shakmaty::uci::UciMove;
use shakmaty::{Color, File, Piece, Rank, Role, Square};
use std::fmt;

/// Side-to-move, castling, en passant and clock fields appended to every board field.
pub const DEFAULT_FEN_SUFFIX: &str = "w KQkq - 0 1";

/// Board field of the standard starting position.
pub const STARTING_BOARD_FIELD: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR";

const WHITE_KING: Piece = Piece {
    color: Color::White,
    role: Role::King,
};
const BLACK_KING: Piece = Piece {
    color: Color::Black,
    role: Role::King,
};

/// Castling flag, side, king home, rook home.
const CASTLING_HOMES: [(char, Color, Square, Square); 4] = [
    ('K', Color::White, Square::E1, Square::H1),
    ('Q', Color::White, Square::E1, Square::A1),
    ('k', Color::Black, Square::E8, Square::H8),
    ('q', Color::Black, Square::E8, Square::A8),
];

/// Rewrites the castling field of `fen` so it only claims rights the board can still have.
/// Engines trust that field and go looking for rooks that may no longer exist.
/// Strings that do not parse are returned unchanged.
pub fn with_valid_castling(fen: &str) -> String {
    let fields: Vec<&str> = fen.split_whitespace().collect();
    let Some(placement) = Placement::from_board_field(fen) else {
        return fen.to_string();
    };
    if fields.len() < 3 {
        return fen.to_string();
    }
    let castling = placement.castling_field(fields[2]);
    [&fields[..2], &[castling.as_str()], &fields[3..]].concat().join(" ")
}

/// 64 optional pieces indexed by square (a1 = 0, h8 = 63).
#[derive(Clone, PartialEq, Eq)]
pub struct Placement {
    squares: [Option<Piece>; 64],
}

impl Placement {
    pub fn empty() -> Self {
        Self {
            squares: [None; 64],
        }
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.squares[square as usize]
    }

    pub fn set(&mut self, square: Square, piece: Option<Piece>) {
        self.squares[square as usize] = piece;
    }

    /// Parses a board field (the first FEN field; any trailing fields are ignored).
    pub fn from_board_field(fen: &str) -> Option<Self> {
        let board = fen.split_whitespace().next()?;
        let ranks: Vec<&str> = board.split('/').collect();
        if ranks.len() != 8 {
            return None;
        }

        let mut placement = Self::empty();
        for (i, text) in ranks.iter().enumerate() {
            let rank = Rank::new(7 - i as u32);
            let mut file = 0u32;
            for c in text.chars() {
                if let Some(run) = c.to_digit(10) {
                    file += run;
                } else {
                    if file >= 8 {
                        return None;
                    }
                    let piece = Piece::from_char(c)?;
                    placement.set(Square::from_coords(File::new(file), rank), Some(piece));
                    file += 1;
                }
            }
            if file != 8 {
                return None;
            }
        }
        Some(placement)
    }

    /// Encodes the board field, ranks 8 to 1, runs of empty squares as digits.
    pub fn board_field(&self) -> String {
        let mut out = String::with_capacity(71);
        for rank in (0..8).rev() {
            let mut empty_run = 0;
            for file in 0..8 {
                let square = Square::from_coords(File::new(file), Rank::new(rank));
                match self.piece_at(square) {
                    Some(piece) => {
                        if empty_run > 0 {
                            out.push(char::from(b'0' + empty_run));
                            empty_run = 0;
                        }
                        out.push(piece.char());
                    }
                    None => empty_run += 1,
                }
            }
            if empty_run > 0 {
                out.push(char::from(b'0' + empty_run));
            }
            if rank > 0 {
                out.push('/');
            }
        }
        out
    }

    /// Board field plus the fixed default suffix.
    pub fn fen(&self) -> String {
        format!("{} {}", self.board_field(), DEFAULT_FEN_SUFFIX)
    }

    pub fn count(&self, piece: Piece) -> usize {
        self.squares.iter().filter(|p| **p == Some(piece)).count()
    }

    /// Exactly one king per color. Engines tend to crash or hang on anything else.
    pub fn is_plausible(&self) -> bool {
        self.count(WHITE_KING) == 1 && self.count(BLACK_KING) == 1
    }

    /// Castling flags from `requested` whose king and rook still stand on their home squares.
    /// `"-"` when none survive.
    pub fn castling_field(&self, requested: &str) -> String {
        let kept: String = requested
            .chars()
            .filter(|&flag| {
                CASTLING_HOMES
                    .iter()
                    .find(|(f, ..)| *f == flag)
                    .is_some_and(|&(_, color, king, rook)| {
                        self.piece_at(king) == Some(Piece { color, role: Role::King })
                            && self.piece_at(rook) == Some(Piece { color, role: Role::Rook })
                    })
            })
            .collect();
        if kept.is_empty() { "-".to_string() } else { kept }
    }

    /// Moves pieces as `mv` would on the board, without legality checks.
    /// Handles the castling rook hop, en passant capture and promotion.
    pub fn apply(&mut self, mv: &UciMove) -> bool {
        let &UciMove::Normal {
            from,
            to,
            promotion,
        } = mv
        else {
            return false;
        };
        let Some(piece) = self.piece_at(from) else {
            return false;
        };

        let file_step = to.file() as i32 - from.file() as i32;
        if piece.role == Role::King && file_step.abs() == 2 {
            let (rook_from, rook_to) = if file_step > 0 {
                (File::H, File::F)
            } else {
                (File::A, File::D)
            };
            let rook_from = Square::from_coords(rook_from, from.rank());
            let rook_to = Square::from_coords(rook_to, from.rank());
            let rook = self.piece_at(rook_from);
            self.set(rook_from, None);
            self.set(rook_to, rook);
        }

        if piece.role == Role::Pawn && file_step != 0 && self.piece_at(to).is_none() {
            self.set(Square::from_coords(to.file(), from.rank()), None);
        }

        let landed = match promotion {
            Some(role) => Piece {
                color: piece.color,
                role,
            },
            None => piece,
        };
        self.set(from, None);
        self.set(to, Some(landed));
        true
    }
}

impl fmt::Debug for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Placement").field(&self.board_field()).finish()
    }
}
