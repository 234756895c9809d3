//! The podcast catalogue's documents and how they are opened.

use crate::error::CliResult;
use polydb_core::{CaseInsensitive, Config, Database, Document, SecondaryIndex, TypeUniverse};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Identity of the single settings document.
pub const SETTINGS_ID: &str = "podcast-settings";

/// A subscribed feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Podcast {
    /// Document identity. Assigned on first save.
    #[serde(default)]
    pub id: String,
    /// Feed address.
    pub feed_url: String,
    /// Display title.
    pub title: String,
}

impl Podcast {
    /// A podcast not yet saved. The title falls back to the feed URL.
    pub fn new(feed_url: impl Into<String>, title: Option<String>) -> Self {
        let feed_url = feed_url.into();
        let title = title.unwrap_or_else(|| feed_url.clone());
        Self {
            id: String::new(),
            feed_url,
            title,
        }
    }
}

impl Document for Podcast {
    const TYPE_NAME: &'static str = "catalogue.Podcast";
    type Id = String;

    fn id_field(&self) -> Option<&String> {
        Some(&self.id)
    }

    fn id_field_mut(&mut self) -> Option<&mut String> {
        Some(&mut self.id)
    }
}

/// Download preferences shared by every podcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodcastSettings {
    /// Always [`SETTINGS_ID`].
    pub id: String,
    /// Where downloaded episodes land.
    pub download_dir: String,
    /// Length of each split chunk, in seconds.
    pub split_secs: u64,
    /// Playback tempo multiplier.
    pub tempo: f64,
}

impl Default for PodcastSettings {
    fn default() -> Self {
        Self {
            id: SETTINGS_ID.to_string(),
            download_dir: "download".to_string(),
            split_secs: 45,
            tempo: 1.25,
        }
    }
}

impl Document for PodcastSettings {
    const TYPE_NAME: &'static str = "catalogue.PodcastSettings";
    type Id = String;

    fn id_field(&self) -> Option<&String> {
        Some(&self.id)
    }

    fn id_field_mut(&mut self) -> Option<&mut String> {
        Some(&mut self.id)
    }
}

/// Feed URL index. Lookups ignore case.
pub type FeedIndex = SecondaryIndex<Podcast, String, CaseInsensitive>;

/// An open catalogue: the database plus its feed index.
pub struct Catalogue {
    /// The underlying database.
    pub db: Database,
    /// Podcasts by feed URL.
    pub feeds: Arc<FeedIndex>,
}

impl Catalogue {
    /// Opens (or creates) the catalogue stored under `root`.
    pub fn open(root: &Path) -> CliResult<Self> {
        let universe = TypeUniverse::builder()
            .register::<Podcast>()
            .register::<PodcastSettings>()
            .build()?;
        let feeds = Arc::new(
            SecondaryIndex::builder("podcast_by_feed", |p: &Podcast| p.feed_url.clone())
                .comparer(CaseInsensitive)
                .build(),
        );
        let db = Database::builder(universe)
            .file_system(root)
            .index(feeds.clone())
            .config(Config::new().pretty_payloads(true))
            .open()?;
        Ok(Self { db, feeds })
    }

    /// Finds the podcast subscribed to `feed_url`, ignoring case.
    pub fn find_feed(&self, feed_url: &str) -> CliResult<Option<Podcast>> {
        let mut hits = self
            .db
            .query(&self.feeds)?
            .keys(|url| url == feed_url)
            .fetch()?;
        Ok(hits.pop())
    }

    /// The stored settings, or the defaults when none were saved yet.
    pub fn settings(&self) -> CliResult<PodcastSettings> {
        Ok(self
            .db
            .load::<PodcastSettings>(SETTINGS_ID)?
            .unwrap_or_default())
    }
}
