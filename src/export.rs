//! CSV and JSON exports of a run.

use crate::aggregate::Aggregate;
use crate::error::Result;
use crate::record::CitationRecord;
use crate::resolver::{MatchMethod, Resolution, ResolvedCitation};
use chrono::Local;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Flat row for `1_citations.csv`
#[derive(Debug, Serialize)]
pub struct CitationRow {
    pub source_id: String,
    pub title: String,
    pub authors: String,
    pub affiliation: String,
    pub email_domain: String,
    pub year: String,
    pub cited_by: String,
    pub cited_articles: String,
}

impl From<&CitationRecord> for CitationRow {
    fn from(r: &CitationRecord) -> Self {
        Self {
            source_id: r.source_id.clone(),
            title: r.title.clone(),
            authors: r.author_names(),
            affiliation: r.affiliation.clone(),
            email_domain: r.email_domain.clone().unwrap_or_default(),
            year: r.year.map(|y| y.to_string()).unwrap_or_default(),
            cited_by: r.cited_by.map(|c| c.to_string()).unwrap_or_default(),
            cited_articles: r.cited_articles.join(" | "),
        }
    }
}

/// One citing author of one citing work, for `1_authors.csv`
#[derive(Debug, Serialize)]
pub struct AuthorRow {
    pub source_id: String,
    pub title: String,
    pub position: usize,
    pub name: String,
    pub author_id: String,
    pub affiliation: String,
    pub email_domain: String,
    pub cited_by: Option<u64>,
}

impl AuthorRow {
    /// Rows for every author of `record`, in listed order
    pub fn for_record(record: &CitationRecord) -> impl Iterator<Item = AuthorRow> + '_ {
        record.authors.iter().enumerate().map(move |(idx, author)| AuthorRow {
            source_id: record.source_id.clone(),
            title: record.title.clone(),
            position: idx + 1,
            name: author.name.clone(),
            author_id: author.author_id.clone().unwrap_or_default(),
            affiliation: author.affiliation.clone().unwrap_or_default(),
            email_domain: author.email_domain.clone().unwrap_or_default(),
            cited_by: author.cited_by,
        })
    }
}

/// Flat row for `2_resolved.csv`
#[derive(Debug, Serialize)]
pub struct ResolvedRow {
    pub source_id: String,
    pub title: String,
    pub affiliation: String,
    pub institution: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub matched_by: String,
}

impl From<&ResolvedCitation> for ResolvedRow {
    fn from(c: &ResolvedCitation) -> Self {
        let entry = c.resolution.entry();
        let matched_by = match &c.resolution {
            Resolution::Matched { method: MatchMethod::EmailDomain, .. } => "email_domain",
            Resolution::Matched { method: MatchMethod::Name, .. } => "name",
            Resolution::Unresolved => "unresolved",
        };
        Self {
            source_id: c.record.source_id.clone(),
            title: c.record.title.clone(),
            affiliation: c.record.affiliation.clone(),
            institution: entry.map(|e| e.name.clone()).unwrap_or_default(),
            country: entry.map(|e| e.country.clone()).unwrap_or_default(),
            latitude: entry.map(|e| e.latitude),
            longitude: entry.map(|e| e.longitude),
            matched_by: matched_by.to_string(),
        }
    }
}

/// Create `<output_dir>/<timestamp>_<author_id>` and return it.
pub fn create_output_folder(output_dir: &Path, author_id: &str) -> Result<PathBuf> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let safe_id: String = author_id
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    let folder = output_dir.join(format!("{}_{}", timestamp, safe_id));
    std::fs::create_dir_all(&folder)?;
    Ok(folder)
}

/// Save data to CSV file; an empty slice writes nothing.
pub fn save_csv<T: Serialize>(path: &Path, data: &[T]) -> Result<()> {
    if data.is_empty() {
        info!("No data to save to {:?}", path);
        return Ok(());
    }

    let mut wtr = csv::WriterBuilder::new().has_headers(true).from_path(path)?;

    for item in data {
        wtr.serialize(item)?;
    }

    wtr.flush()?;
    info!("Saved: {:?}", path);
    Ok(())
}

/// Write every stage of a run into `folder`.
pub fn write_all(folder: &Path, records: &[CitationRecord], resolved: &[ResolvedCitation], aggregate: &Aggregate) -> Result<()> {
    let citation_rows: Vec<CitationRow> = records.iter().map(CitationRow::from).collect();
    save_csv(&folder.join("1_citations.csv"), &citation_rows)?;

    let author_rows: Vec<AuthorRow> = records.iter().flat_map(AuthorRow::for_record).collect();
    save_csv(&folder.join("1_authors.csv"), &author_rows)?;

    let resolved_rows: Vec<ResolvedRow> = resolved.iter().map(ResolvedRow::from).collect();
    save_csv(&folder.join("2_resolved.csv"), &resolved_rows)?;

    save_csv(&folder.join("3_institutions.csv"), &aggregate.institutions)?;
    save_csv(&folder.join("3_countries.csv"), &aggregate.countries)?;
    save_csv(&folder.join("3_authors.csv"), &aggregate.authors)?;

    std::fs::write(folder.join("summary.json"), serde_json::to_string_pretty(aggregate)?)?;
    Ok(())
}
