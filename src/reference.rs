//! Static reference table of institutions.
//!
//! The table is a CSV maintained by hand. Required columns are `name`,
//! `country`, `latitude` and `longitude`. Optional columns:
//!
//! - `country_name`: display name for the country code
//! - `domain`, `alt_domain`: e-mail domains of the institution
//! - `aliases`: other names, separated by `;`
//!
//! The older `affil_name` / `affil_country` / `affil_country_name` headers
//! are accepted too.

use crate::error::{Result, ScholarMapError};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Second-level labels that sit under a country code (`ox.ac.uk`, `unimelb.edu.au`).
const SECOND_LEVEL_LABELS: &[&str] = &["ac", "co", "com", "edu", "gov", "net", "org", "or", "ne", "go", "res"];

/// One institution with its location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AffiliationEntry {
    #[serde(alias = "affil_name")]
    pub name: String,
    #[serde(alias = "affil_country")]
    pub country: String,
    #[serde(default, alias = "affil_country_name")]
    pub country_name: Option<String>,
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lon", alias = "lng")]
    pub longitude: f64,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub alt_domain: Option<String>,
    #[serde(default)]
    pub aliases: Option<String>,
}

impl AffiliationEntry {
    /// Entry without domains
    pub fn new(name: &str, country: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.to_string(),
            country: country.to_string(),
            country_name: None,
            latitude,
            longitude,
            domain: None,
            alt_domain: None,
            aliases: None,
        }
    }

    /// Country name when the table has one, else the code
    pub fn country_label(&self) -> &str {
        self.country_name.as_deref().unwrap_or(&self.country)
    }

    /// The entry name followed by its aliases
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        std::iter::once(self.name.as_str()).chain(
            self.aliases
                .as_deref()
                .unwrap_or_default()
                .split(';')
                .map(str::trim)
                .filter(|a| !a.is_empty()),
        )
    }

    /// Registrable forms of `domain` and `alt_domain`
    pub fn domains(&self) -> impl Iterator<Item = String> + '_ {
        [self.domain.as_deref(), self.alt_domain.as_deref()]
            .into_iter()
            .flatten()
            .filter_map(registrable_domain)
    }
}

/// Immutable lookup table loaded once per run
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    entries: Vec<AffiliationEntry>,
}

impl ReferenceTable {
    pub fn new(entries: Vec<AffiliationEntry>) -> Self {
        Self { entries }
    }

    /// Load the table from a CSV file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            ScholarMapError::Reference(format!("Cannot open {}: {}", path.display(), e))
        })?;
        let table = Self::from_reader(file)?;
        info!(path = %path.display(), entries = table.len(), "Loaded reference table");
        Ok(table)
    }

    /// Load the table from any CSV reader with a header row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = Vec::new();
        for (idx, row) in rdr.deserialize::<AffiliationEntry>().enumerate() {
            let mut entry = row.map_err(|e| ScholarMapError::Reference(format!("row {}: {}", idx + 1, e)))?;

            if !(-90.0..=90.0).contains(&entry.latitude) || !(-180.0..=180.0).contains(&entry.longitude) {
                return Err(ScholarMapError::Reference(format!(
                    "row {}: coordinates out of range for '{}'",
                    idx + 1,
                    entry.name
                )));
            }

            entry.domain = entry.domain.filter(|d| !d.trim().is_empty());
            entry.alt_domain = entry.alt_domain.filter(|d| !d.trim().is_empty());
            entry.country_name = entry.country_name.filter(|c| !c.trim().is_empty());
            entry.aliases = entry.aliases.filter(|a| !a.trim().is_empty());

            if entry.name.trim().is_empty() {
                debug!(row = idx + 1, "Skipping reference row without a name");
                continue;
            }
            entries.push(entry);
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[AffiliationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reduce a host, URL or e-mail address to its registrable domain.
///
/// `https://www.cs.ox.ac.uk/people` becomes `ox.ac.uk`, `cs.mit.edu` becomes `mit.edu`.
pub fn registrable_domain(input: &str) -> Option<String> {
    let mut host = input.trim().to_lowercase();
    if let Some((_, rest)) = host.split_once("://") {
        host = rest.to_string();
    }
    if let Some((_, rest)) = host.rsplit_once('@') {
        host = rest.to_string();
    }
    let host = host
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .split(':')
        .next()
        .unwrap_or_default()
        .trim_matches('.');

    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() < 2 {
        return None;
    }

    let n = labels.len();
    let keep = if n >= 3 && labels[n - 1].len() == 2 && SECOND_LEVEL_LABELS.contains(&labels[n - 2]) {
        3
    } else {
        2
    };

    Some(labels[n - keep..].join("."))
}

/// Extract the registrable domain from Scholar's "Verified email at ..." line.
pub fn email_domain(verified: &str) -> Option<String> {
    let tail = verified.rsplit("at ").next()?;
    let host = tail.split_whitespace().next()?;
    registrable_domain(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
name,country,latitude,longitude,domain,alt_domain
MIT,US,42.36,-71.09,mit.edu,
Stanford,US,37.43,-122.17,https://www.stanford.edu/,
University of Oxford,GB,51.75,-1.25,ox.ac.uk,
";

    #[test]
    fn test_load_from_reader() {
        let table = ReferenceTable::from_reader(CSV.as_bytes()).expect("valid csv");
        assert_eq!(table.len(), 3);
        let mit = &table.entries()[0];
        assert_eq!(mit.name, "MIT");
        assert_eq!(mit.domain.as_deref(), Some("mit.edu"));
        assert!(mit.alt_domain.is_none());
        let stanford_domains: Vec<String> = table.entries()[1].domains().collect();
        assert_eq!(stanford_domains, vec!["stanford.edu"]);
    }

    #[test]
    fn test_load_legacy_headers_without_domains() {
        let csv = "affil_name,affil_country,lat,lon\nETH Zurich,CH,47.38,8.55\n";
        let table = ReferenceTable::from_reader(csv.as_bytes()).expect("valid csv");
        assert_eq!(table.entries()[0].name, "ETH Zurich");
        assert_eq!(table.entries()[0].country, "CH");
        assert!(table.entries()[0].domain.is_none());
    }

    #[test]
    fn test_aliases_and_country_name() {
        let csv = "\
name,country,country_name,latitude,longitude,aliases
Max Planck Society,DE,Germany,48.14,11.58,Max Planck Institute; MPI
Stanford,US,,37.43,-122.17,
";
        let table = ReferenceTable::from_reader(csv.as_bytes()).expect("valid csv");
        let mpg = &table.entries()[0];
        assert_eq!(mpg.names().collect::<Vec<_>>(), vec!["Max Planck Society", "Max Planck Institute", "MPI"]);
        assert_eq!(mpg.country_label(), "Germany");

        let stanford = &table.entries()[1];
        assert_eq!(stanford.names().collect::<Vec<_>>(), vec!["Stanford"]);
        assert_eq!(stanford.country_label(), "US");
    }

    #[test]
    fn test_shipped_table_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/affiliations.csv");
        let table = ReferenceTable::from_path(&path).expect("shipped table");
        assert!(table.len() > 20);
        assert!(table.entries().iter().all(|e| e.country_name.is_some()));
    }

    #[test]
    fn test_bad_coordinates_rejected() {
        let csv = "name,country,latitude,longitude\nNowhere,XX,not-a-number,0\n";
        assert!(matches!(
            ReferenceTable::from_reader(csv.as_bytes()),
            Err(ScholarMapError::Reference(_))
        ));

        let csv = "name,country,latitude,longitude\nNowhere,XX,95.0,0\n";
        assert!(matches!(
            ReferenceTable::from_reader(csv.as_bytes()),
            Err(ScholarMapError::Reference(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = ReferenceTable::from_path(Path::new("/nonexistent/affiliations.csv"));
        assert!(matches!(result, Err(ScholarMapError::Reference(_))));
    }

    #[test]
    fn test_registrable_domain() {
        assert_eq!(registrable_domain("cs.mit.edu").as_deref(), Some("mit.edu"));
        assert_eq!(registrable_domain("https://www.cs.ox.ac.uk/people").as_deref(), Some("ox.ac.uk"));
        assert_eq!(registrable_domain("student.unimelb.edu.au").as_deref(), Some("unimelb.edu.au"));
        assert_eq!(registrable_domain("tum.de").as_deref(), Some("tum.de"));
        assert_eq!(registrable_domain("someone@ethz.ch").as_deref(), Some("ethz.ch"));
        assert_eq!(registrable_domain("localhost"), None);
        assert_eq!(registrable_domain(""), None);
    }

    #[test]
    fn test_email_domain() {
        assert_eq!(email_domain("Verified email at csail.mit.edu").as_deref(), Some("mit.edu"));
        assert_eq!(email_domain("Verified email at stanford.edu - Homepage").as_deref(), Some("stanford.edu"));
        assert_eq!(email_domain("No verified email"), None);
    }
}
