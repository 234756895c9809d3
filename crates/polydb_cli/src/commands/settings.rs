//! Settings command implementation.

use crate::error::{CliError, CliResult};
use crate::model::{Catalogue, PodcastSettings};
use std::path::Path;

/// Requested changes to the settings document. `None` leaves a field as is.
#[derive(Debug, Default, Clone)]
pub struct SettingsChange {
    /// New download directory.
    pub download_dir: Option<String>,
    /// New split length in seconds.
    pub split_secs: Option<u64>,
    /// New tempo multiplier.
    pub tempo: Option<f64>,
}

impl SettingsChange {
    /// Whether any field is set.
    pub fn is_empty(&self) -> bool {
        self.download_dir.is_none() && self.split_secs.is_none() && self.tempo.is_none()
    }
}

/// Applies `change` to the stored settings and saves them.
///
/// An empty change only reads.
pub fn apply(catalogue: &Catalogue, change: SettingsChange) -> CliResult<PodcastSettings> {
    let mut settings = catalogue.settings()?;
    if change.is_empty() {
        return Ok(settings);
    }

    if let Some(dir) = change.download_dir {
        if dir.trim().is_empty() {
            return Err(CliError::invalid_argument("download dir must not be empty"));
        }
        settings.download_dir = dir;
    }
    if let Some(secs) = change.split_secs {
        if secs == 0 {
            return Err(CliError::invalid_argument("split length must be positive"));
        }
        settings.split_secs = secs;
    }
    if let Some(tempo) = change.tempo {
        if !(tempo.is_finite() && tempo > 0.0) {
            return Err(CliError::invalid_argument("tempo must be a positive number"));
        }
        settings.tempo = tempo;
    }

    catalogue.db.save(&mut settings)?;
    Ok(settings)
}

/// Runs the settings command.
pub fn run(path: &Path, change: SettingsChange) -> Result<(), Box<dyn std::error::Error>> {
    let catalogue = Catalogue::open(path)?;
    let settings = apply(&catalogue, change)?;
    println!("Download dir: {}", settings.download_dir);
    println!("Split length: {}s", settings.split_secs);
    println!("Tempo:        {:.2}x", settings.tempo);
    Ok(())
}
