//! Knowledge-graph search module
//!
//! Queries the MaRDI knowledge graph through its MediaWiki search API and
//! normalizes the hits into typed records. The query executor retries a
//! bounded number of times with a constant delay and, once exhausted,
//! surfaces the final transport error together with a curl command that
//! reproduces the failing request.

mod client;
mod results;

pub use client::{KgClient, QueryError};
pub use results::{
    arxiv_search_string, clean_snippet, doi_search_string, normalize_arxiv_results,
    normalize_doi_results, qid_from_snippet, qid_from_title, KgSearchResult, QuerySection,
    SearchHit, SearchPayload,
};
