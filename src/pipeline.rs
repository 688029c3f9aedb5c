//! One full run: fetch, resolve, aggregate, render.

use crate::aggregate::{aggregate, Aggregate};
use crate::config::Config;
use crate::error::Result;
use crate::export;
use crate::fetcher::CitationFetcher;
use crate::record::CitationRecord;
use crate::reference::ReferenceTable;
use crate::render;
use crate::resolver::resolve_all;
use std::path::PathBuf;
use tracing::info;

/// What a run produced
#[derive(Debug)]
pub struct RunReport {
    pub output_folder: PathBuf,
    pub aggregate: Aggregate,
    pub ranking: String,
}

/// Fetch citations for `config.author_id` and write every artifact.
///
/// The reference table is loaded before any request so a bad table fails
/// fast; fetcher errors abort the run before anything is aggregated.
pub async fn run(config: &Config) -> Result<RunReport> {
    config.validate()?;
    let table = ReferenceTable::from_path(&config.affiliations_path)?;

    println!("\n--- Stage 1: Fetching citations ---");
    let fetcher = CitationFetcher::new(config)?;
    let records = fetcher.fetch(&config.author_id).await?;
    println!("Found {} unique citing works.", records.len());

    let output_folder = export::create_output_folder(&config.output_dir, &config.author_id)?;
    report(config, records, &table, output_folder)
}

/// Resolve, aggregate and render already fetched records into `output_folder`.
pub fn report(config: &Config, records: Vec<CitationRecord>, table: &ReferenceTable, output_folder: PathBuf) -> Result<RunReport> {
    println!("\n--- Stage 2: Resolving affiliations ---");
    let resolved = resolve_all(records.clone(), table);
    let aggregate = aggregate(&resolved);
    println!(
        "Resolved {} / {} citing works ({} unknown).",
        aggregate.resolved,
        aggregate.total(),
        aggregate.unresolved
    );

    println!("\n--- Stage 3: Rendering ---");
    export::write_all(&output_folder, &records, &resolved, &aggregate)?;
    render::write_map(&aggregate, &config.map, &output_folder.join("map.html"))?;

    let ranking = render::render_ranking(&aggregate, config.top_n);
    info!(
        folder = %output_folder.display(),
        institutions = aggregate.institutions.len(),
        resolved = aggregate.resolved,
        unresolved = aggregate.unresolved,
        "Run complete"
    );

    Ok(RunReport {
        output_folder,
        aggregate,
        ranking,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::AffiliationEntry;
    use tempfile::TempDir;

    fn record(id: &str, affiliation: &str) -> CitationRecord {
        CitationRecord {
            source_id: id.to_string(),
            title: format!("Work {}", id),
            affiliation: affiliation.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_report_scenario() -> Result<()> {
        let temp = TempDir::new()?;
        let table = ReferenceTable::new(vec![
            AffiliationEntry::new("MIT", "US", 42.36, -71.09),
            AffiliationEntry::new("Stanford", "US", 37.43, -122.17),
        ]);
        let records = vec![
            record("1", "MIT Computer Science Dept"),
            record("2", "Stanford University"),
            record("3", "Unknown Lab"),
        ];

        let config = Config::new("key", "author");
        let report = report(&config, records, &table, temp.path().to_path_buf())?;

        let counts: Vec<(&str, usize)> = report
            .aggregate
            .institutions
            .iter()
            .map(|i| (i.name.as_str(), i.count))
            .collect();
        assert_eq!(counts, vec![("MIT", 1), ("Stanford", 1)]);
        assert_eq!(report.aggregate.unresolved, 1);
        assert!(report.ranking.contains("Unknown: 1"));
        assert!(temp.path().join("map.html").exists());
        assert!(temp.path().join("1_citations.csv").exists());
        Ok(())
    }

    #[test]
    fn test_report_empty() -> Result<()> {
        let temp = TempDir::new()?;
        let config = Config::new("key", "author");
        let report = report(&config, Vec::new(), &ReferenceTable::default(), temp.path().to_path_buf())?;

        assert!(report.aggregate.is_empty());
        let html = std::fs::read_to_string(temp.path().join("map.html"))?;
        assert!(html.contains("const markers = [];"));
        Ok(())
    }
}
