//! Ad hoc lakeFS tour
//!
//! Health check plus a short object listing against the sandbox
//! repository. Credentials come from the environment or `secrets.conf`.

use anyhow::{bail, Result};
use mardi_workflowtools::lakefs::DEFAULT_LIST_AMOUNT;
use mardi_workflowtools::{CredentialChain, CredentialProvider, LakeClient, Settings};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!("Getting credentials...");
    let creds = match CredentialChain::standard("secrets.conf").lookup("lakefs") {
        Some(creds) => creds,
        None => bail!("No valid credentials found. Please check 'secrets.conf'"),
    };

    let settings = Settings::default();
    let client = LakeClient::new(&settings.lakefs.endpoint, &creds.user, &creds.password)?;

    client.health_check().await;

    if let Some(files) = client
        .list_objects("sandbox", "main", DEFAULT_LIST_AMOUNT)
        .await
    {
        println!("First 5 files:");
        for file in files.iter().take(5) {
            println!("{} ({} bytes)", file.path, file.size_bytes);
        }
    }

    Ok(())
}
