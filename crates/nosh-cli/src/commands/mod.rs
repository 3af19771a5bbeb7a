//! CLI command implementations.

pub mod jobs;

use anyhow::Result;

pub async fn health(api_url: &str) -> Result<()> {
    let body: serde_json::Value = reqwest::get(format!("{api_url}/health"))
        .await?
        .error_for_status()?
        .json()
        .await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
