//! Config module.
//! Optional JSON file (`--config`) holding the engine path, board region,
//! orientation and timings. Every field has a default; CLI flags override the file.

use crate::geometry::{Orientation, Region};
use crate::monitor::{DEFAULT_POLL_INTERVAL, DEFAULT_SUGGESTION_MOVETIME, MonitorSettings};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine executable, or a directory to search for one.
    pub engine_path: PathBuf,
    pub region: Option<Region>,
    pub orientation: Orientation,
    pub poll_interval_ms: u64,
    pub movetime_ms: u64,
    /// Lines shown per position; above 1 triggers a multi-line analysis.
    pub analysis_lines: usize,
    /// Replay suggested moves on the screen board.
    pub mirror: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine_path: PathBuf::from("stockfish"),
            region: None,
            orientation: Orientation::Standard,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            movetime_ms: DEFAULT_SUGGESTION_MOVETIME.as_millis() as u64,
            analysis_lines: 1,
            mirror: false,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(region) = self.region {
            // re-run the constructor checks for regions that came from a file
            Region::new(region.left, region.top, region.width, region.height)
                .with_context(|| format!("Invalid region {region}"))?;
        }
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be positive");
        }
        if self.movetime_ms == 0 {
            bail!("movetime_ms must be positive");
        }
        if self.analysis_lines == 0 {
            bail!("analysis_lines must be at least 1");
        }
        Ok(())
    }

    pub fn movetime(&self) -> Duration {
        Duration::from_millis(self.movetime_ms)
    }

    pub fn monitor_settings(&self, region: Region) -> MonitorSettings {
        MonitorSettings {
            region,
            orientation: self.orientation,
            interval: Duration::from_millis(self.poll_interval_ms),
            movetime: self.movetime(),
        }
    }
}
