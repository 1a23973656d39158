//! Ad hoc IPFS tour
//!
//! Uploads a file, pins and tags it, then downloads it back by CID and
//! by tag. Credentials come from the environment or `secrets.conf`.

use anyhow::{bail, Result};
use mardi_workflowtools::{CredentialChain, CredentialProvider, IpfsClient, Settings};
use std::path::Path;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!("Getting credentials...");
    let creds = match CredentialChain::standard("secrets.conf").lookup("ipfs") {
        Some(creds) => creds,
        None => bail!("No valid credentials found. Please check 'secrets.conf'"),
    };

    let settings = Settings::default();
    let client = IpfsClient::new(&settings.ipfs.api_url, &creds.user, &creds.password)?;

    if let Some(pins) = client.list_pins("recursive").await {
        for pin in pins {
            println!("{} ({})", pin.cid, pin.pin_type);
        }
    }

    if let Some(tags) = client.list_tags("/tags").await {
        for tag in tags {
            println!(
                "{} -> CID: {}, Size: {} bytes, Modified: {}",
                tag.path, tag.cid, tag.size, tag.mtime
            );
        }
    }

    let Some(cid) = client.add_file(Path::new("README.md"), 1, true).await else {
        bail!("upload failed");
    };
    info!("Public URL: {}", client.gateway_url(&cid, None));

    let tag_path = "/tags/readme-latest.md";
    if client.tag_file(&cid, tag_path, true).await {
        info!("Tagged {} as {}", cid, tag_path);
    }

    client
        .download_file(&cid, Path::new("downloaded-by-cid.md"), None)
        .await;
    client
        .download_by_tag(tag_path, Path::new("downloaded-by-tag.md"))
        .await;

    Ok(())
}
