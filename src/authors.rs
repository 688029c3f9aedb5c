//! Full author lists from raw Google Scholar result HTML.
//!
//! SerpApi only previews the first few authors of a result. The raw page it
//! stores for a search carries the complete list, with links to the profiles
//! of authors that have one.

use crate::error::{Result, ScholarMapError};
use crate::record::CitingAuthor;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};

/// Title and authors of the first result on a page
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResult {
    pub title: String,
    pub authors: Vec<CitingAuthor>,
}

/// Parse the first result of a Google Scholar results page.
///
/// Returns `Ok(None)` when the page has no result block.
pub fn parse_first_result(html: &str) -> Result<Option<ParsedResult>> {
    let document = Html::parse_document(html);

    let item_selector = Selector::parse("div.gs_ri").map_err(|e| ScholarMapError::Parse(e.to_string()))?;
    let title_selector = Selector::parse("h3.gs_rt").map_err(|e| ScholarMapError::Parse(e.to_string()))?;
    let full_selector = Selector::parse("div.gs_fmaa").map_err(|e| ScholarMapError::Parse(e.to_string()))?;
    let meta_selector = Selector::parse("div.gs_a").map_err(|e| ScholarMapError::Parse(e.to_string()))?;
    let link_selector = Selector::parse("a").map_err(|e| ScholarMapError::Parse(e.to_string()))?;
    let user_regex = Regex::new(r"[?&]user=([\w-]+)").map_err(|e| ScholarMapError::Parse(e.to_string()))?;

    let Some(item) = document.select(&item_selector).next() else {
        return Ok(None);
    };

    let title = item
        .select(&title_selector)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    // The full list only exists when Scholar grouped several versions;
    // otherwise the names are the part of the meta line before " - ".
    let (block, names) = match item.select(&full_selector).next() {
        Some(full) => (full, full.text().collect::<String>()),
        None => match item.select(&meta_selector).next() {
            Some(meta) => {
                let text = meta.text().collect::<String>();
                let names = text.split("- ").next().unwrap_or_default().to_string();
                (meta, names)
            }
            None => return Ok(Some(ParsedResult { title, authors: Vec::new() })),
        },
    };

    let linked: HashMap<String, String> = block
        .select(&link_selector)
        .filter_map(|a| {
            let name = a.text().collect::<String>().trim().to_string();
            let href = a.value().attr("href")?;
            let id = user_regex.captures(href)?.get(1)?.as_str().to_string();
            Some((name, id))
        })
        .collect();

    let authors = names
        .split(", ")
        .map(|n| n.replace('…', "").trim().to_string())
        .filter(|n| !n.is_empty())
        .map(|name| CitingAuthor {
            author_id: linked.get(&name).cloned(),
            ..CitingAuthor::named(name)
        })
        .collect();

    Ok(Some(ParsedResult { title, authors }))
}

/// Whether two titles plausibly name the same work.
///
/// SerpApi truncates long titles with an ellipsis, so containment is enough.
pub fn titles_agree(serp_title: &str, page_title: &str) -> bool {
    let needle = serp_title.replace('…', "").trim().to_lowercase();
    !needle.is_empty() && page_title.to_lowercase().contains(&needle)
}

/// Whether every previewed author appears in the full list (case-insensitive).
pub fn authors_agree(preview: &[CitingAuthor], full: &[CitingAuthor]) -> bool {
    let full: HashSet<String> = full.iter().map(|a| a.name.trim().to_lowercase()).collect();
    preview
        .iter()
        .map(|a| a.name.replace('…', "").trim().to_lowercase())
        .filter(|n| !n.is_empty())
        .all(|n| full.contains(&n))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUPED: &str = r#"
        <html><body>
        <div class="gs_r gs_or gs_scl"><div class="gs_ri">
          <h3 class="gs_rt"><a href="https://example.org/p">Deep Maps of Citations</a></h3>
          <div class="gs_a">J Doe, A Smith… - Nature, 2021 - nature.com</div>
          <div class="gs_fmaa"><a href="/citations?user=JD123abcdEF&amp;hl=en">J Doe</a>, A Smith, <a href="/citations?user=CL-456xyzAB&amp;hl=en">C Lee</a>, D Park</div>
        </div></div>
        </body></html>"#;

    const PLAIN: &str = r#"
        <html><body>
        <div class="gs_r gs_or gs_scl"><div class="gs_ri">
          <h3 class="gs_rt"><span>[PDF]</span> Short Title</h3>
          <div class="gs_a"><a href="/citations?user=AAA111bbbCC&amp;hl=en">E Ng</a>, F Ross… - arXiv preprint, 2020 - arxiv.org</div>
        </div></div>
        </body></html>"#;

    #[test]
    fn test_parse_grouped_authors() {
        let parsed = parse_first_result(GROUPED).expect("parse").expect("result");
        assert_eq!(parsed.title, "Deep Maps of Citations");
        let names: Vec<&str> = parsed.authors.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["J Doe", "A Smith", "C Lee", "D Park"]);
        assert_eq!(parsed.authors[0].author_id.as_deref(), Some("JD123abcdEF"));
        assert_eq!(parsed.authors[2].author_id.as_deref(), Some("CL-456xyzAB"));
        assert!(parsed.authors[1].author_id.is_none());
    }

    #[test]
    fn test_parse_meta_line_authors() {
        let parsed = parse_first_result(PLAIN).expect("parse").expect("result");
        let names: Vec<&str> = parsed.authors.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["E Ng", "F Ross"]);
        assert_eq!(parsed.authors[0].author_id.as_deref(), Some("AAA111bbbCC"));
    }

    #[test]
    fn test_parse_empty_page() {
        assert!(parse_first_result("<html><body></body></html>").expect("parse").is_none());
    }

    #[test]
    fn test_titles_agree() {
        assert!(titles_agree("Deep Maps of Cit…", "Deep Maps of Citations"));
        assert!(!titles_agree("Another paper", "Deep Maps of Citations"));
        assert!(!titles_agree("…", "Anything"));
    }

    #[test]
    fn test_authors_agree() {
        let full = parse_first_result(GROUPED).expect("parse").expect("result").authors;
        let preview = vec![CitingAuthor::named("j doe"), CitingAuthor::named("A Smith…")];
        assert!(authors_agree(&preview, &full));
        assert!(authors_agree(&[], &full));

        let stranger = vec![CitingAuthor::named("J Doe"), CitingAuthor::named("Z Zhu")];
        assert!(!authors_agree(&stranger, &full));
    }
}
