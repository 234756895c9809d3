//! Stats command implementation.

use crate::error::CliResult;
use crate::model::Catalogue;
use polydb_core::StatsSnapshot;
use serde::Serialize;
use std::path::Path;

/// Catalogue statistics.
#[derive(Debug, Serialize)]
pub struct StatsReport {
    /// Database root.
    pub path: String,
    /// Stored documents per type name.
    pub types: Vec<TypeCount>,
    /// Entries per attached index.
    pub indexes: Vec<TypeCount>,
    /// Engine counters for this process.
    pub counters: StatsSnapshot,
}

/// A named count.
#[derive(Debug, Serialize)]
pub struct TypeCount {
    /// Type or index name.
    pub name: String,
    /// Number of entries.
    pub count: usize,
}

/// Collects the report for an open catalogue.
pub fn collect(path: &Path, catalogue: &Catalogue) -> CliResult<StatsReport> {
    let named = |(name, count): (String, usize)| TypeCount { name, count };
    Ok(StatsReport {
        path: path.display().to_string(),
        types: catalogue
            .db
            .type_counts()?
            .into_iter()
            .map(named)
            .collect(),
        indexes: catalogue.db.indexes().into_iter().map(named).collect(),
        counters: catalogue.db.stats().snapshot(),
    })
}

/// Runs the stats command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let catalogue = Catalogue::open(path)?;
    let report = collect(path, &catalogue)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => {
            println!("Database: {}", report.path);
            println!("Documents:");
            for entry in &report.types {
                println!("  {:<32} {}", entry.name, entry.count);
            }
            println!("Indexes:");
            for entry in &report.indexes {
                println!("  {:<32} {}", entry.name, entry.count);
            }
            println!("Saves:           {}", report.counters.saves);
            println!("Loads:           {}", report.counters.loads);
            println!("Index seed time: {}us", report.counters.index_seed_micros);
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
    fn counts_documents_and_index_entries() {
        let dir = tempdir().unwrap();
        let catalogue = Catalogue::open(dir.path()).unwrap();
        add(&catalogue, "http://a.example/feed", None).unwrap();
        add(&catalogue, "http://b.example/feed", None).unwrap();

        let report = collect(dir.path(), &catalogue).unwrap();
        let podcasts = report
            .types
            .iter()
            .find(|t| t.name == "catalogue.Podcast")
            .unwrap();
        assert_eq!(podcasts.count, 2);
        assert_eq!(report.indexes[0].name, "podcast_by_feed");
        assert_eq!(report.indexes[0].count, 2);
        assert_eq!(report.counters.saves, 2);
    }

    #[test]
    fn report_serializes() {
        let dir = tempdir().unwrap();
        let catalogue = Catalogue::open(dir.path()).unwrap();
        let report = collect(dir.path(), &catalogue).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["counters"]["saves"].is_u64());
    }
}
