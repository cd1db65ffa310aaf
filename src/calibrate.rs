//! Calibration module.
//! Slices a capture into 64 grayscale cells and, once per session, stores one
//! exemplar per piece label taken from the starting layout.
//! Exemplar squares are fixed; the orientation decides which visual cell each one is read from.
//! Single exemplars are theme-sensitive: a piece standing on the other square
//! color than its exemplar still matches by shape, but nothing more robust is attempted.

use crate::geometry::{Orientation, cell_of};
use image::{GrayImage, RgbImage, imageops};
use shakmaty::{Color, Piece, Role, Square};
use thiserror::Error;

/// Inward margin per cell side, as a fraction `1/CELL_MARGIN_DIVISOR` of the cell.
pub const CELL_MARGIN_DIVISOR: u32 = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("capture is {width}x{height}, too small to hold a board")]
    EmptyCapture { width: u32, height: u32 },
    #[error("recognizer is already calibrated for this session")]
    AlreadyCalibrated,
}

const fn piece(color: Color, role: Role) -> Option<Piece> {
    Some(Piece { color, role })
}

/// Label and source square of every exemplar, in matching order.
/// The first label wins when two exemplars score the same error.
pub const EXEMPLAR_SQUARES: [(Option<Piece>, Square); 13] = [
    (None, Square::A3),
    (piece(Color::White, Role::Pawn), Square::A2),
    (piece(Color::White, Role::Knight), Square::B1),
    (piece(Color::White, Role::Bishop), Square::C1),
    (piece(Color::White, Role::Rook), Square::A1),
    (piece(Color::White, Role::Queen), Square::D1),
    (piece(Color::White, Role::King), Square::E1),
    (piece(Color::Black, Role::Pawn), Square::A7),
    (piece(Color::Black, Role::Knight), Square::B8),
    (piece(Color::Black, Role::Bishop), Square::C8),
    (piece(Color::Black, Role::Rook), Square::A8),
    (piece(Color::Black, Role::Queen), Square::D8),
    (piece(Color::Black, Role::King), Square::E8),
];

/// 8x8 grid of cropped grayscale cells, row-major from the top-left cell.
#[derive(Debug, Clone)]
pub struct BoardSample {
    cells: Vec<GrayImage>,
    cell_width: u32,
    cell_height: u32,
}

impl BoardSample {
    pub fn slice(capture: &RgbImage) -> Result<Self, CalibrationError> {
        let (width, height) = capture.dimensions();
        let too_small = CalibrationError::EmptyCapture { width, height };

        let (pitch_w, pitch_h) = (width / 8, height / 8);
        let (margin_w, margin_h) = (pitch_w / CELL_MARGIN_DIVISOR, pitch_h / CELL_MARGIN_DIVISOR);
        let cell_width = pitch_w.saturating_sub(2 * margin_w);
        let cell_height = pitch_h.saturating_sub(2 * margin_h);
        if cell_width == 0 || cell_height == 0 {
            return Err(too_small);
        }

        let gray = imageops::grayscale(capture);
        let mut cells = Vec::with_capacity(64);
        for row in 0..8 {
            for col in 0..8 {
                let x = col * pitch_w + margin_w;
                let y = row * pitch_h + margin_h;
                cells.push(imageops::crop_imm(&gray, x, y, cell_width, cell_height).to_image());
            }
        }

        Ok(Self {
            cells,
            cell_width,
            cell_height,
        })
    }

    pub fn cell_size(&self) -> (u32, u32) {
        (self.cell_width, self.cell_height)
    }

    pub fn cell(&self, col: u32, row: u32) -> &GrayImage {
        &self.cells[(row * 8 + col) as usize]
    }

    pub fn square(&self, square: Square, orientation: Orientation) -> &GrayImage {
        let (col, row) = cell_of(square, orientation);
        self.cell(col, row)
    }
}

/// One exemplar per label, in [`EXEMPLAR_SQUARES`] order.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    exemplars: Vec<(Option<Piece>, GrayImage)>,
}

impl TemplateSet {
    /// Captures exemplars from a board showing the starting layout.
    pub fn from_starting_layout(
        capture: &RgbImage,
        orientation: Orientation,
    ) -> Result<Self, CalibrationError> {
        let sample = BoardSample::slice(capture)?;
        let exemplars = EXEMPLAR_SQUARES
            .iter()
            .map(|&(label, square)| (label, sample.square(square, orientation).clone()))
            .collect();
        log::debug!(
            "calibrated {} exemplars at {}x{}",
            EXEMPLAR_SQUARES.len(),
            sample.cell_width,
            sample.cell_height
        );
        Ok(Self { exemplars })
    }

    pub fn exemplars(&self) -> &[(Option<Piece>, GrayImage)] {
        &self.exemplars
    }

    /// Exemplars scaled to a runtime cell size; unchanged when the size already matches.
    pub fn resized(&self, width: u32, height: u32) -> Vec<(Option<Piece>, GrayImage)> {
        self.exemplars
            .iter()
            .map(|(label, exemplar)| {
                let scaled = if exemplar.dimensions() == (width, height) {
                    exemplar.clone()
                } else {
                    imageops::resize(exemplar, width, height, imageops::FilterType::Triangle)
                };
                (*label, scaled)
            })
            .collect()
    }
}
