//! Affiliation resolution against the reference table.
//!
//! Resolution is a pure lookup: the same affiliation string, e-mail domain
//! and table always give the same answer. E-mail domains are tried first
//! since they are exact; names are matched token-wise, case-insensitively.

use crate::record::CitationRecord;
use crate::reference::{registrable_domain, AffiliationEntry, ReferenceTable};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Connecting words an affiliation may omit or reorder freely.
const STOPWORDS: &[&str] = &["of", "the", "and", "for", "de", "di", "du", "la", "at", "in"];

/// How a match was found
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    EmailDomain,
    Name,
}

/// Outcome of resolving one affiliation
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Matched {
        entry: AffiliationEntry,
        method: MatchMethod,
    },
    /// No entry matched; the citation is kept out of the map
    Unresolved,
}

impl Resolution {
    pub fn entry(&self) -> Option<&AffiliationEntry> {
        match self {
            Resolution::Matched { entry, .. } => Some(entry),
            Resolution::Unresolved => None,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, Resolution::Matched { .. })
    }
}

/// A citation with its resolved institution
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCitation {
    pub record: CitationRecord,
    pub resolution: Resolution,
}

/// Resolve a raw affiliation (and optional e-mail domain) to a table entry.
pub fn resolve(affiliation: &str, email_domain: Option<&str>, table: &ReferenceTable) -> Resolution {
    if let Some(entry) = email_domain.and_then(|d| match_domain(d, table)) {
        return Resolution::Matched {
            entry: entry.clone(),
            method: MatchMethod::EmailDomain,
        };
    }

    match match_name(affiliation, table) {
        Some(entry) => Resolution::Matched {
            entry: entry.clone(),
            method: MatchMethod::Name,
        },
        None => Resolution::Unresolved,
    }
}

/// Resolve every record, logging the ones left unresolved.
pub fn resolve_all(records: Vec<CitationRecord>, table: &ReferenceTable) -> Vec<ResolvedCitation> {
    records
        .into_iter()
        .map(|record| {
            let resolution = resolve(&record.affiliation, record.email_domain.as_deref(), table);
            if !resolution.is_matched() {
                debug!(
                    source_id = %record.source_id,
                    affiliation = %record.affiliation,
                    "Unresolved affiliation"
                );
            }
            ResolvedCitation { record, resolution }
        })
        .collect()
}

/// Exact registrable-domain match; retries with dashes stripped from the
/// table side since scraped e-mail domains lose their dashes.
fn match_domain<'a>(domain: &str, table: &'a ReferenceTable) -> Option<&'a AffiliationEntry> {
    let domain = registrable_domain(domain)?;

    table
        .entries()
        .iter()
        .find(|e| e.domains().any(|d| d == domain))
        .or_else(|| {
            table
                .entries()
                .iter()
                .find(|e| e.domains().any(|d| d.replace('-', "") == domain))
        })
}

/// Best name match, or `None`.
///
/// A name (the entry name or one of its aliases) is a candidate when every
/// token except stopwords occurs in the affiliation. Candidates are ranked
/// by the longest contiguous run of name tokens found in the affiliation;
/// the earlier row wins a tie.
fn match_name<'a>(affiliation: &str, table: &'a ReferenceTable) -> Option<&'a AffiliationEntry> {
    let affil_tokens = tokenize(affiliation);
    if affil_tokens.is_empty() {
        return None;
    }
    let affil_set: HashSet<&str> = affil_tokens.iter().map(String::as_str).collect();

    let mut best: Option<(usize, &AffiliationEntry)> = None;

    for entry in table.entries() {
        for name in entry.names() {
            let name_tokens = tokenize(name);
            let mut required = name_tokens
                .iter()
                .map(String::as_str)
                .filter(|t| !STOPWORDS.contains(t))
                .peekable();
            if required.peek().is_none() || !required.all(|t| affil_set.contains(t)) {
                continue;
            }

            let score = longest_common_run(&name_tokens, &affil_tokens);
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, entry));
            }
        }
    }

    best.map(|(_, entry)| entry)
}

/// Lowercased alphanumeric tokens
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Length of the longest contiguous token sequence shared by `a` and `b`.
fn longest_common_run(a: &[String], b: &[String]) -> usize {
    let mut best = 0;
    let mut prev = vec![0usize; b.len() + 1];

    for token_a in a {
        let mut cur = vec![0usize; b.len() + 1];
        for (j, token_b) in b.iter().enumerate() {
            if token_a == token_b {
                cur[j + 1] = prev[j] + 1;
                best = best.max(cur[j + 1]);
            }
        }
        prev = cur;
    }

    best
}
