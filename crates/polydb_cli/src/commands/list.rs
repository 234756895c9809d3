//! List command implementation.

use crate::error::CliResult;
use crate::model::{Catalogue, Podcast};
use std::path::Path;

/// Every podcast, ordered by title.
pub fn podcasts(catalogue: &Catalogue) -> CliResult<Vec<Podcast>> {
    let mut podcasts = catalogue.db.all::<Podcast>()?;
    podcasts.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
    Ok(podcasts)
}

/// Runs the list command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let catalogue = Catalogue::open(path)?;
    let podcasts = podcasts(&catalogue)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&podcasts)?),
        _ => {
            if podcasts.is_empty() {
                println!("No podcasts.");
            }
            for podcast in &podcasts {
                println!("{}  {}", podcast.id, podcast.title);
                println!("    {}", podcast.feed_url);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::add::add;
    use tempfile::tempdir;

    #[test]
    fn lists_by_title() {
        let dir = tempdir().unwrap();
        let catalogue = Catalogue::open(dir.path()).unwrap();
        add(&catalogue, "http://b.example/feed", Some("Herding Code".into())).unwrap();
        add(&catalogue, "http://a.example/feed", Some(".NET Rocks".into())).unwrap();

        let titles: Vec<_> = podcasts(&catalogue)
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec![".NET Rocks", "Herding Code"]);
    }

    #[test]
    fn settings_are_not_listed() {
        let dir = tempdir().unwrap();
        let catalogue = Catalogue::open(dir.path()).unwrap();
        let mut settings = catalogue.settings().unwrap();
        catalogue.db.save(&mut settings).unwrap();

        assert!(podcasts(&catalogue).unwrap().is_empty());
    }
}
