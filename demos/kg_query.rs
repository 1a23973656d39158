//! Ad hoc knowledge-graph query demo
//!
//! Looks up publications in the MaRDI knowledge graph by arXiv id and by
//! DOI and prints the extracted QIDs.

use anyhow::Result;
use mardi_workflowtools::{HttpClient, KgClient, Settings};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let settings = Settings::default();
    let kg = KgClient::new(HttpClient::with_settings(&settings.outgoing)?, &settings.kg);

    info!("Querying by arXiv id...");
    for result in kg.search_arxiv("2104.06175").await? {
        println!(
            "{} | {} | {}",
            result.qid.as_deref().unwrap_or("-"),
            result.title,
            result.snippet
        );
    }

    info!("Querying by DOI...");
    for result in kg.search_doi("10.1007/s40305-018-0210-x").await? {
        println!(
            "{} | {}",
            result.qid.as_deref().unwrap_or("-"),
            result.title
        );
    }

    Ok(())
}
