//! Board geometry shared by recognition and actuation.
//! Maps squares to visual cells and pixel centers inside a screen `Region`.
//! Both the recognizer and the mirror go through `cell_of`, so a flipped board
//! is addressed the same way when reading pixels and when clicking them.

use serde::{Deserialize, Serialize};
use shakmaty::{File, Rank, Square};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Smallest accepted selection side, in pixels.
pub const MIN_REGION_SIDE: u32 = 50;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegionError {
    #[error("selection {width}x{height} is smaller than {min}x{min}", min = MIN_REGION_SIDE)]
    TooSmall { width: u32, height: u32 },
    #[error("expected `left,top,width,height`, got `{0}`")]
    Malformed(String),
}

/// Screen rectangle holding the board, in screen pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Result<Self, RegionError> {
        if width < MIN_REGION_SIDE || height < MIN_REGION_SIDE {
            return Err(RegionError::TooSmall { width, height });
        }
        Ok(Self {
            left,
            top,
            width,
            height,
        })
    }

    /// Normalizes a drag gesture (any two opposite corners) into a region.
    pub fn from_drag(start: (i32, i32), end: (i32, i32)) -> Result<Self, RegionError> {
        let left = start.0.min(end.0);
        let top = start.1.min(end.1);
        let width = start.0.abs_diff(end.0);
        let height = start.1.abs_diff(end.1);
        Self::new(left, top, width, height)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.left, self.top, self.width, self.height)
    }
}

impl FromStr for Region {
    type Err = RegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || RegionError::Malformed(s.to_string());
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [left, top, width, height] = parts.as_slice() else {
            return Err(malformed());
        };
        Region::new(
            left.parse().map_err(|_| malformed())?,
            top.parse().map_err(|_| malformed())?,
            width.parse().map_err(|_| malformed())?,
            height.parse().map_err(|_| malformed())?,
        )
    }
}

/// Which way up the external board is drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// White at the bottom, a1 in the lower-left corner.
    #[default]
    Standard,
    /// Black at the bottom, the board rotated 180 degrees.
    Flipped,
}

impl Orientation {
    pub fn from_flipped(flipped: bool) -> Self {
        if flipped {
            Orientation::Flipped
        } else {
            Orientation::Standard
        }
    }

    pub fn is_flipped(self) -> bool {
        self == Orientation::Flipped
    }
}

/// Visual `(col, row)` of a square, counted from the top-left cell.
pub fn cell_of(square: Square, orientation: Orientation) -> (u32, u32) {
    let file = square.file() as u32;
    let rank = square.rank() as u32;
    match orientation {
        Orientation::Standard => (file, 7 - rank),
        Orientation::Flipped => (7 - file, rank),
    }
}

/// Inverse of [`cell_of`].
pub fn square_at(col: u32, row: u32, orientation: Orientation) -> Square {
    debug_assert!(col < 8 && row < 8);
    let (file, rank) = match orientation {
        Orientation::Standard => (col, 7 - row),
        Orientation::Flipped => (7 - col, row),
    };
    Square::from_coords(File::new(file), Rank::new(rank))
}

/// Pixel center of `square` on the screen.
pub fn center(square: Square, region: &Region, orientation: Orientation) -> (f64, f64) {
    let (col, row) = cell_of(square, orientation);
    let cell_w = f64::from(region.width) / 8.0;
    let cell_h = f64::from(region.height) / 8.0;
    (
        f64::from(region.left) + (f64::from(col) + 0.5) * cell_w,
        f64::from(region.top) + (f64::from(row) + 0.5) * cell_h,
    )
}
