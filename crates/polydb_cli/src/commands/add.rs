//! Add command implementation.

use crate::error::{CliError, CliResult};
use crate::model::{Catalogue, Podcast};
use std::path::Path;
use tracing::info;

/// Subscribes to `feed_url` unless the catalogue already holds it.
pub fn add(catalogue: &Catalogue, feed_url: &str, title: Option<String>) -> CliResult<Podcast> {
    let feed_url = feed_url.trim();
    if feed_url.is_empty() {
        return Err(CliError::invalid_argument("feed url must not be empty"));
    }
    if let Some(existing) = catalogue.find_feed(feed_url)? {
        return Err(CliError::DuplicateFeed {
            url: feed_url.to_string(),
            id: existing.id,
        });
    }

    let mut podcast = Podcast::new(feed_url, title);
    catalogue.db.save(&mut podcast)?;
    info!(id = %podcast.id, feed = %podcast.feed_url, "podcast added");
    Ok(podcast)
}

/// Runs the add command.
pub fn run(
    path: &Path,
    feed_url: &str,
    title: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let catalogue = Catalogue::open(path)?;
    let podcast = add(&catalogue, feed_url, title)?;
    println!("{}  {}", podcast.id, podcast.title);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn add_assigns_an_id() {
        let dir = tempdir().unwrap();
        let catalogue = Catalogue::open(dir.path()).unwrap();

        let podcast = add(&catalogue, "http://example.com/feed", Some("Show".into())).unwrap();
        assert!(!podcast.id.is_empty());
        assert_eq!(podcast.title, "Show");
        assert_eq!(
            catalogue.db.load::<Podcast>(&podcast.id).unwrap(),
            Some(podcast)
        );
    }

    #[test]
    fn duplicate_feed_is_rejected_regardless_of_case() {
        let dir = tempdir().unwrap();
        let catalogue = Catalogue::open(dir.path()).unwrap();
        let first = add(&catalogue, "http://example.com/feed", None).unwrap();

        let err = add(&catalogue, "HTTP://EXAMPLE.COM/FEED", None).unwrap_err();
        match err {
            CliError::DuplicateFeed { id, .. } => assert_eq!(id, first.id),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(catalogue.db.count::<Podcast>().unwrap(), 1);
    }

    #[test]
    fn blank_feed_is_rejected() {
        let dir = tempdir().unwrap();
        let catalogue = Catalogue::open(dir.path()).unwrap();
        assert!(matches!(
            add(&catalogue, "   ", None),
            Err(CliError::InvalidArgument { .. })
        ));
    }
}
