use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::generate::Limits;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("board must be at least 1x1, got {columns}x{rows}")]
    ZeroDimension { columns: usize, rows: usize },
    #[error("wall percent must be at most 100, got {0}")]
    WallPercent(u8),
    #[error("invalid settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// How a new game is set up. Every field falls back to its default when left
/// out of the JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub columns: usize,
    pub rows: usize,
    /// upper bound on the share of wall cells in a generated board
    pub wall_percent: u8,
    pub overflow: bool,
    /// fixed rng seed; `None` seeds from entropy
    pub seed: Option<u64>,
    pub limits: Limits,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            columns: 6,
            rows: 6,
            wall_percent: 20,
            overflow: false,
            seed: None,
            limits: Limits::default(),
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.columns == 0 || self.rows == 0 {
            return Err(SettingsError::ZeroDimension {
                columns: self.columns,
                rows: self.rows,
            });
        }
        if self.wall_percent > 100 {
            return Err(SettingsError::WallPercent(self.wall_percent));
        }
        Ok(())
    }
}
