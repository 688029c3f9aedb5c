//! Citation fetcher: from an author id to deduplicated citation records.
//!
//! The flow is strictly sequential: the author's articles, then the works
//! citing each article, then (optionally) full author lists and citing
//! authors' profiles. Authentication, quota and network failures abort the
//! run; they are never retried here.
//!
//! With author expansion on, a citing work whose full result disagrees with
//! the preview (title, or a previewed author missing from the full list) is
//! dropped unless `keep_warnings` is set.

use crate::authors::{authors_agree, parse_first_result, titles_agree};
use crate::config::Config;
use crate::error::{Result, ScholarMapError};
use crate::record::{dedup_by_source_id, CitationRecord, CitingAuthor};
use crate::reference::email_domain;
use crate::serpapi::{OrganicResult, SerpApiClient};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static YEAR_REGEX: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").ok());

/// Drives the SerpApi client for one run
pub struct CitationFetcher {
    client: SerpApiClient,
    fetch_profiles: bool,
    full_authors: bool,
    keep_warnings: bool,
}

impl CitationFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: SerpApiClient::new(config)?,
            fetch_profiles: config.fetch_profiles,
            full_authors: config.full_authors,
            keep_warnings: config.keep_warnings,
        })
    }

    pub fn client(&self) -> &SerpApiClient {
        &self.client
    }

    /// Every work citing the author, unique by source id.
    pub async fn fetch(&self, author_id: &str) -> Result<Vec<CitationRecord>> {
        info!(author_id, "Fetching articles");
        let articles = self.client.articles(author_id).collect_all().await?;
        println!("Found {} articles.", articles.len());

        let mut records = Vec::new();

        for (idx, article) in articles.iter().enumerate() {
            let Some(cites_id) = article.cites_id() else {
                debug!(title = %article.title, "Article has no citations");
                continue;
            };

            let results = self.client.citations(cites_id).collect_all().await?;
            info!(
                article = idx + 1,
                total = articles.len(),
                title = %article.title,
                citations = results.len(),
                "Fetched citing works"
            );

            if let Some(expected) = article.citation_count() {
                if expected as usize != results.len() {
                    warn!(
                        title = %article.title,
                        expected,
                        fetched = results.len(),
                        "Citation count mismatch"
                    );
                }
            }

            records.extend(results.into_iter().map(|r| record_from_result(r, &article.title)));
        }

        let before = records.len();
        let records = dedup_by_source_id(records);
        info!(fetched = before, unique = records.len(), "Deduplicated citing works");

        let total = records.len();
        let mut enriched = Vec::with_capacity(total);
        let mut dropped = 0;

        for (idx, mut record) in records.into_iter().enumerate() {
            if self.full_authors && !self.expand_authors(&mut record).await? && !self.keep_warnings {
                dropped += 1;
                continue;
            }
            if self.fetch_profiles {
                self.attach_profiles(&mut record).await?;
            }
            record.adopt_lead_affiliation();
            enriched.push(record);

            if (idx + 1) % 50 == 0 {
                println!("  Enriched {}/{} citing works...", idx + 1, total);
            }
        }

        if dropped > 0 {
            info!(dropped, "Dropped citing works with mismatched results (use --keep-warnings to keep them)");
        }
        Ok(enriched)
    }

    /// Replace the preview author list with the full one from the raw page.
    ///
    /// Returns `false` when the page disagrees with the preview; the record
    /// then keeps its preview authors. Lookup failures that are not fatal
    /// leave the record as is and count as agreement.
    async fn expand_authors(&self, record: &mut CitationRecord) -> Result<bool> {
        let preview: Vec<&str> = record.authors.iter().map(|a| a.name.as_str()).collect();
        let query = format!("{} {}", record.title, preview.join(" "));

        let html = match self.client.raw_html_for_query(&query).await {
            Ok(html) => html,
            Err(e) if is_fatal(&e) => return Err(e),
            Err(e) => {
                warn!(title = %record.title, error = %e, "Could not fetch author list");
                return Ok(true);
            }
        };

        let parsed = match parse_first_result(&html) {
            Ok(Some(parsed)) if !parsed.authors.is_empty() => parsed,
            Ok(_) => {
                warn!(title = %record.title, "No authors on result page");
                return Ok(true);
            }
            Err(e) => {
                warn!(title = %record.title, error = %e, "Could not parse result page");
                return Ok(true);
            }
        };

        if !titles_agree(&record.title, &parsed.title) {
            warn!(expected = %record.title, found = %parsed.title, "Title mismatch");
            return Ok(false);
        }
        if !authors_agree(&record.authors, &parsed.authors) {
            warn!(title = %record.title, preview = %record.author_names(), "Author mismatch");
            return Ok(false);
        }

        let mut authors = parsed.authors;
        for author in &mut authors {
            if author.author_id.is_none() {
                author.author_id = record
                    .authors
                    .iter()
                    .find(|p| p.name.eq_ignore_ascii_case(&author.name))
                    .and_then(|p| p.author_id.clone());
            }
        }
        debug!(title = %record.title, preview = record.authors.len(), full = authors.len(), "Expanded author list");
        record.authors = authors;
        Ok(true)
    }

    /// Fill affiliation, e-mail domain and citation totals from profiles.
    async fn attach_profiles(&self, record: &mut CitationRecord) -> Result<()> {
        for author in &mut record.authors {
            let Some(author_id) = author.author_id.clone() else {
                continue;
            };

            match self.client.author_profile(&author_id).await {
                Ok(profile) => {
                    author.affiliation = profile.affiliations;
                    author.email_domain = profile.email.as_deref().and_then(email_domain);
                    author.cited_by = profile.cited_by;
                    if !profile.name.is_empty() {
                        author.name = profile.name;
                    }
                }
                Err(e) if is_fatal(&e) => return Err(e),
                Err(e) => warn!(author_id = %author_id, error = %e, "Skipping author profile"),
            }
        }
        Ok(())
    }
}

/// Errors that end the run rather than one lookup
fn is_fatal(e: &ScholarMapError) -> bool {
    e.is_transient() || matches!(e, ScholarMapError::Authentication(_))
}

/// Convert one organic result into a record without profile data.
pub fn record_from_result(result: OrganicResult, cited_article: &str) -> CitationRecord {
    let summary = result.publication_info.summary.unwrap_or_default();
    let linked = result.publication_info.authors;

    // The summary starts with the previewed names: "J Doe, A Smith… - Venue, 2021 - host"
    let mut authors: Vec<CitingAuthor> = summary
        .split(" - ")
        .next()
        .unwrap_or_default()
        .split(", ")
        .map(|n| n.replace('…', "").trim().to_string())
        .filter(|n| !n.is_empty())
        .map(|name| CitingAuthor {
            author_id: linked.iter().find(|a| a.name == name).and_then(|a| a.author_id.clone()),
            ..CitingAuthor::named(name)
        })
        .collect();

    for author in &linked {
        if !authors.iter().any(|a| a.name == author.name) {
            authors.push(CitingAuthor {
                author_id: author.author_id.clone(),
                ..CitingAuthor::named(author.name.clone())
            });
        }
    }

    CitationRecord {
        source_id: result.result_id,
        title: result.title,
        authors,
        year: parse_year(&summary),
        cited_by: result.inline_links.cited_by.and_then(|c| c.total),
        cited_articles: vec![cited_article.to_string()],
        ..Default::default()
    }
}

/// Year from the venue part of a publication summary
fn parse_year(summary: &str) -> Option<i32> {
    let regex = YEAR_REGEX.as_ref()?;
    let venue = summary.split(" - ").nth(1)?;
    regex.find_iter(venue).last()?.as_str().parse().ok()
}
