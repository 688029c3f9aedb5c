//! Counting resolved citations by institution, country and author.

use crate::resolver::ResolvedCitation;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Citations attributed to one institution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstitutionCount {
    pub name: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub count: usize,
}

/// Citations attributed to one country or author
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NameCount {
    pub name: String,
    pub count: usize,
}

/// Aggregated view of one run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Aggregate {
    pub institutions: Vec<InstitutionCount>,
    pub countries: Vec<NameCount>,
    pub authors: Vec<NameCount>,
    /// Citations matched to an institution
    pub resolved: usize,
    /// Citations kept out of the map
    pub unresolved: usize,
}

impl Aggregate {
    pub fn total(&self) -> usize {
        self.resolved + self.unresolved
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Group citations; every list is sorted by count descending, then name.
///
/// Institution and country counts include matched citations only. Author
/// counts include every citation, each author at most once per citation.
pub fn aggregate(citations: &[ResolvedCitation]) -> Aggregate {
    let mut institutions: HashMap<&str, InstitutionCount> = HashMap::new();
    let mut countries: HashMap<&str, usize> = HashMap::new();
    let mut authors: HashMap<&str, usize> = HashMap::new();
    let mut resolved = 0;
    let mut unresolved = 0;

    for citation in citations {
        match citation.resolution.entry() {
            Some(entry) => {
                resolved += 1;
                institutions
                    .entry(entry.name.as_str())
                    .or_insert_with(|| InstitutionCount {
                        name: entry.name.clone(),
                        country: entry.country.clone(),
                        latitude: entry.latitude,
                        longitude: entry.longitude,
                        count: 0,
                    })
                    .count += 1;
                let country = entry.country_label();
                if !country.is_empty() {
                    *countries.entry(country).or_default() += 1;
                }
            }
            None => unresolved += 1,
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for author in &citation.record.authors {
            let name = author.name.trim();
            if !name.is_empty() && seen.insert(name) {
                *authors.entry(name).or_default() += 1;
            }
        }
    }

    let mut institutions: Vec<InstitutionCount> = institutions.into_values().collect();
    institutions.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

    Aggregate {
        institutions,
        countries: ranked(countries),
        authors: ranked(authors),
        resolved,
        unresolved,
    }
}

fn ranked(counts: HashMap<&str, usize>) -> Vec<NameCount> {
    let mut out: Vec<NameCount> = counts
        .into_iter()
        .map(|(name, count)| NameCount {
            name: name.to_string(),
            count,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    out
}
