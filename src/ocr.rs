//! Board recognition by nearest-exemplar template matching.
//! Every cell is compared against the 13 calibrated exemplars (12 pieces plus empty)
//! using mean squared error on grayscale pixels; the lowest error wins.
//! There is no confidence threshold: an unfamiliar shape is forced into the
//! closest label rather than reported as unknown.

use crate::calibrate::{BoardSample, CalibrationError, TemplateSet};
use crate::geometry::{Orientation, square_at};
use crate::position::Placement;
use image::{GrayImage, RgbImage};
use imageproc::template_matching::{MatchTemplateMethod, match_template};
use shakmaty::Piece;
use std::time::Instant;

/// Mean per-pixel squared error between two equally sized grayscale images.
pub fn mean_squared_error(cell: &GrayImage, exemplar: &GrayImage) -> f32 {
    debug_assert_eq!(cell.dimensions(), exemplar.dimensions());
    let (width, height) = cell.dimensions();
    // same-size template: the score map is a single pixel
    let sse = match_template(cell, exemplar, MatchTemplateMethod::SumOfSquaredErrors);
    sse.get_pixel(0, 0).0[0] / (width * height) as f32
}

/// Picks the label whose exemplar is closest to `cell`. Earlier exemplars win ties.
pub fn classify(cell: &GrayImage, exemplars: &[(Option<Piece>, GrayImage)]) -> Option<Piece> {
    let mut best: Option<(Option<Piece>, f32)> = None;
    for (label, exemplar) in exemplars {
        let error = mean_squared_error(cell, exemplar);
        if best.is_none_or(|(_, lowest)| error < lowest) {
            best = Some((*label, error));
        }
    }
    best.and_then(|(label, _)| label)
}

/// Turns board captures into position strings. Calibrate once, then recognize.
#[derive(Debug)]
pub struct BoardRecognizer {
    orientation: Orientation,
    templates: Option<TemplateSet>,
}

impl BoardRecognizer {
    pub fn new(orientation: Orientation) -> Self {
        Self {
            orientation,
            templates: None,
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn is_calibrated(&self) -> bool {
        self.templates.is_some()
    }

    /// Stores exemplars from a capture of the starting layout.
    /// On error the recognizer stays uncalibrated.
    pub fn calibrate(&mut self, capture: &RgbImage) -> Result<(), CalibrationError> {
        if self.templates.is_some() {
            return Err(CalibrationError::AlreadyCalibrated);
        }
        self.templates = Some(TemplateSet::from_starting_layout(capture, self.orientation)?);
        log::info!("board calibrated ({:?} orientation)", self.orientation);
        Ok(())
    }

    /// Reads the piece placement. `None` before calibration or for unusable captures.
    pub fn read_placement(&self, capture: &RgbImage) -> Option<Placement> {
        let templates = self.templates.as_ref()?;
        let start = Instant::now();

        let sample = match BoardSample::slice(capture) {
            Ok(sample) => sample,
            Err(e) => {
                log::warn!("cannot recognize capture: {e}");
                return None;
            }
        };
        let (width, height) = sample.cell_size();
        let exemplars = templates.resized(width, height);

        let mut placement = Placement::empty();
        for row in 0..8 {
            for col in 0..8 {
                let label = classify(sample.cell(col, row), &exemplars);
                placement.set(square_at(col, row, self.orientation), label);
            }
        }

        log::debug!("recognition latency: {:?}", start.elapsed());
        Some(placement)
    }

    /// Full position string: observed board field plus the fixed default suffix.
    pub fn recognize(&self, capture: &RgbImage) -> Option<String> {
        self.read_placement(capture).map(|placement| placement.fen())
    }
}
