//! Screen capture module
//! Uses `xcap` to grab the primary display and crops it to the board region.
//! Region coordinates are relative to the primary monitor's top-left corner.
//! Debug: set `DEBUG_CAPTURE=1` to save each crop to `screenshots/debug_board.png`.
//! Permissions note: on macOS, grant "Screen & System Audio Recording" to the terminal in
//! System Settings > Privacy & Security.

use crate::geometry::Region;
use anyhow::{Context, Result, bail};
use image::{DynamicImage, GenericImageView, RgbImage};
use std::env;
use std::fs;
use std::time::Instant;
use xcap::Monitor;

/// Source of board images.
pub trait BoardCapture {
    /// Returns a `width x height` three-channel image of `region`.
    fn capture(&mut self, region: &Region) -> Result<RgbImage>;
}

/// Captures from the primary monitor.
#[derive(Debug)]
pub struct ScreenCapture {
    debug_dump: bool,
}

impl ScreenCapture {
    pub fn new() -> Self {
        Self {
            debug_dump: env::var_os("DEBUG_CAPTURE").is_some(),
        }
    }
}

impl Default for ScreenCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardCapture for ScreenCapture {
    fn capture(&mut self, region: &Region) -> Result<RgbImage> {
        let start = Instant::now();

        let monitors = Monitor::all().context("Failed to enumerate monitors")?;
        let primary_monitor = monitors.first().context("No monitors found")?;

        let screenshot_raw = primary_monitor
            .capture_image()
            .context("Failed to capture image. On macOS, ensure the terminal has Screen Recording permission")?;

        let screenshot = DynamicImage::ImageRgba8(screenshot_raw);
        if screenshot.dimensions() == (0, 0) {
            bail!("Captured empty screenshot - possible permission issue or no display");
        }

        let cropped = crop_to_region(&screenshot, region)?;
        if self.debug_dump {
            fs::create_dir_all("screenshots")
                .context("Failed to create screenshots/ debug directory")?;
            cropped
                .save("screenshots/debug_board.png")
                .context("Failed to save debug board image to screenshots/")?;
        }

        log::debug!("capture + crop latency: {:?}", start.elapsed());
        Ok(cropped)
    }
}

/// Crops `screenshot` to `region`, failing when the region leaves the screen.
pub fn crop_to_region(screenshot: &DynamicImage, region: &Region) -> Result<RgbImage> {
    let (screen_w, screen_h) = screenshot.dimensions();
    let (Ok(left), Ok(top)) = (u32::try_from(region.left), u32::try_from(region.top)) else {
        bail!("Region {region} starts off-screen");
    };
    if left.saturating_add(region.width) > screen_w || top.saturating_add(region.height) > screen_h {
        bail!("Region {region} exceeds screenshot dimensions {screen_w}x{screen_h}");
    }
    Ok(screenshot
        .crop_imm(left, top, region.width, region.height)
        .to_rgb8())
}
