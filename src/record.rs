//! Citation records produced by the fetcher.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One author of a citing work
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CitingAuthor {
    /// Display name as shown by Google Scholar
    pub name: String,
    /// Google Scholar profile id, when the author has one
    pub author_id: Option<String>,
    /// Free-text affiliation from the profile
    pub affiliation: Option<String>,
    /// Registrable domain of the verified e-mail
    pub email_domain: Option<String>,
    /// Total citations of the author
    pub cited_by: Option<u64>,
}

impl CitingAuthor {
    /// Author known only by name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// One work citing the tracked author
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CitationRecord {
    /// Upstream identifier (`result_id`); unique per run
    pub source_id: String,
    /// Title of the citing work
    pub title: String,
    /// Citing authors in listed order
    pub authors: Vec<CitingAuthor>,
    /// Raw affiliation used for resolution (may be empty)
    pub affiliation: String,
    /// E-mail domain belonging to the same author as `affiliation`
    pub email_domain: Option<String>,
    /// Publication year, when the summary carries one
    pub year: Option<i32>,
    /// Citation count of the citing work itself
    pub cited_by: Option<u64>,
    /// Titles of the tracked author's articles this work cites
    pub cited_articles: Vec<String>,
}

impl CitationRecord {
    /// Fill `affiliation` / `email_domain` from the first author that has
    /// profile data. Leaves existing values alone if no author has any.
    pub fn adopt_lead_affiliation(&mut self) {
        let lead = self
            .authors
            .iter()
            .find(|a| a.affiliation.as_deref().is_some_and(|s| !s.trim().is_empty()) || a.email_domain.is_some());

        if let Some(author) = lead {
            self.affiliation = author.affiliation.clone().unwrap_or_default();
            self.email_domain = author.email_domain.clone();
        }
    }

    /// Author names joined for flat exports
    pub fn author_names(&self) -> String {
        self.authors
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Keep the first record for every `source_id`, preserving order.
///
/// Later duplicates contribute their cited article titles to the kept record.
pub fn dedup_by_source_id(records: Vec<CitationRecord>) -> Vec<CitationRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<CitationRecord> = Vec::with_capacity(records.len());

    for record in records {
        if seen.insert(record.source_id.clone()) {
            out.push(record);
        } else if let Some(kept) = out.iter_mut().find(|r| r.source_id == record.source_id) {
            for article in record.cited_articles {
                if !kept.cited_articles.contains(&article) {
                    kept.cited_articles.push(article);
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, cited: &str) -> CitationRecord {
        CitationRecord {
            source_id: id.to_string(),
            title: format!("Paper {}", id),
            cited_articles: vec![cited.to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_dedup_keeps_unique_ids() {
        let records = vec![
            record("a", "X"),
            record("b", "X"),
            record("a", "Y"),
            record("c", "Y"),
            record("b", "X"),
        ];
        let deduped = dedup_by_source_id(records);

        let ids: Vec<&str> = deduped.iter().map(|r| r.source_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let unique: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());

        assert_eq!(deduped[0].cited_articles, vec!["X", "Y"]);
        assert_eq!(deduped[1].cited_articles, vec!["X"]);
    }

    #[test]
    fn test_dedup_empty() {
        assert!(dedup_by_source_id(Vec::new()).is_empty());
    }

    #[test]
    fn test_adopt_lead_affiliation() {
        let mut rec = CitationRecord {
            source_id: "r".into(),
            authors: vec![
                CitingAuthor::named("No Profile"),
                CitingAuthor {
                    name: "J Doe".into(),
                    affiliation: Some("MIT CSAIL".into()),
                    email_domain: Some("mit.edu".into()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        rec.adopt_lead_affiliation();
        assert_eq!(rec.affiliation, "MIT CSAIL");
        assert_eq!(rec.email_domain.as_deref(), Some("mit.edu"));
        assert_eq!(rec.author_names(), "No Profile, J Doe");
    }

    #[test]
    fn test_adopt_keeps_existing_without_profiles() {
        let mut rec = CitationRecord {
            affiliation: "Stanford University".into(),
            authors: vec![CitingAuthor::named("A")],
            ..Default::default()
        };
        rec.adopt_lead_affiliation();
        assert_eq!(rec.affiliation, "Stanford University");
    }
}
