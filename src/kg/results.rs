//! Typed search payload and result normalization
//!
//! The MediaWiki response is decoded into explicit records with optional
//! fields; a missing key is an absent value, never a silent default. The
//! normalizers then reshape each hit into a [`KgSearchResult`], extracting
//! the knowledge-graph QID from the snippet (arXiv mode) or from the page
//! title (DOI mode).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// Opening highlight marker the search API injects into snippets
const HIGHLIGHT_OPEN: &str = "<span class=\"searchmatch\">";
/// Closing highlight marker
const HIGHLIGHT_CLOSE: &str = "</span>";

/// Title shown when a hit carries no title field
const NO_TITLE: &str = "(no title)";

static QID_IN_SNIPPET: Lazy<Regex> = Lazy::new(|| Regex::new(r"QID(Q\d+)").unwrap());
static PUBLICATION_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Publication:(\d+)$").unwrap());

/// Raw response body of a `list=search` query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchPayload {
    pub query: Option<QuerySection>,
}

/// The `query` section of the payload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuerySection {
    #[serde(default)]
    pub search: Vec<SearchHit>,
}

/// One raw search hit
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchHit {
    pub title: Option<String>,
    pub snippet: Option<String>,
}

/// A normalized search result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KgSearchResult {
    /// Knowledge-graph entity identifier, when one could be extracted
    pub qid: Option<String>,
    /// Page title, `"(no title)"` when the hit had none
    pub title: String,
    /// Snippet with the highlight markers stripped
    pub snippet: String,
}

/// Search string for looking up pages that mention an arXiv id
pub fn arxiv_search_string(arxiv_id: &str) -> String {
    format!("arXiv{}MaRDI", arxiv_id)
}

/// Search string for looking up pages that cite a DOI (quoted literal)
pub fn doi_search_string(doi: &str) -> String {
    format!("\"doi.org/{}\"", doi)
}

/// Strip the two highlight markers from a snippet.
///
/// Literal substring removal, not HTML parsing; nothing else is touched.
pub fn clean_snippet(snippet: &str) -> String {
    snippet.replace(HIGHLIGHT_OPEN, "").replace(HIGHLIGHT_CLOSE, "")
}

/// Extract a QID embedded in a cleaned snippet as `QIDQ<digits>`
pub fn qid_from_snippet(snippet: &str) -> Option<String> {
    QID_IN_SNIPPET
        .captures(snippet)
        .map(|caps| caps[1].to_string())
}

/// Derive a QID from a `Publication:<digits>` page title
pub fn qid_from_title(title: &str) -> Option<String> {
    PUBLICATION_TITLE
        .captures(title)
        .map(|caps| format!("Q{}", &caps[1]))
}

/// Normalize arXiv-mode hits: the QID is taken from the snippet text
pub fn normalize_arxiv_results(payload: &SearchPayload) -> Vec<KgSearchResult> {
    normalize(payload, |_, snippet| qid_from_snippet(snippet))
}

/// Normalize DOI-mode hits: the QID is derived from the page title
pub fn normalize_doi_results(payload: &SearchPayload) -> Vec<KgSearchResult> {
    normalize(payload, |title, _| qid_from_title(title))
}

fn normalize(
    payload: &SearchPayload,
    extract: impl Fn(&str, &str) -> Option<String>,
) -> Vec<KgSearchResult> {
    let hits = match &payload.query {
        Some(section) => section.search.as_slice(),
        None => &[],
    };

    hits.iter()
        .map(|hit| {
            let title = hit.title.clone().unwrap_or_else(|| NO_TITLE.to_string());
            let snippet = clean_snippet(hit.snippet.as_deref().unwrap_or(""));
            let qid = extract(&title, &snippet);
            KgSearchResult {
                qid,
                title,
                snippet,
            }
        })
        .collect()
}
