//! Remove command implementation.

use crate::error::{CliError, CliResult};
use crate::model::{Catalogue, Podcast};
use std::path::Path;
use tracing::info;

/// Unsubscribes the podcast with identity `id` and returns it.
pub fn remove(catalogue: &Catalogue, id: &str) -> CliResult<Podcast> {
    let podcast = catalogue
        .db
        .load::<Podcast>(id)?
        .ok_or_else(|| CliError::UnknownPodcast { id: id.to_string() })?;
    catalogue.db.delete::<Podcast>(id)?;
    info!(id, "podcast removed");
    Ok(podcast)
}

/// Runs the remove command.
pub fn run(path: &Path, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let catalogue = Catalogue::open(path)?;
    let podcast = remove(&catalogue, id)?;
    println!("Removed {}", podcast.title);
    Ok(())
}
