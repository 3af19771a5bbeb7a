//! Job commands.

use anyhow::{Context, Result};
use nosh_core::JobPayload;

pub async fn enqueue(api_url: &str, payload: &str) -> Result<()> {
    // Parse locally so a typo fails here, not at the server.
    let payload: JobPayload =
        serde_json::from_str(payload).context("payload is not a valid job")?;

    let client = reqwest::Client::new();
    let body: serde_json::Value = client
        .post(format!("{api_url}/api/v1/jobs"))
        .json(&payload)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

pub async fn show(api_url: &str, id: &str) -> Result<()> {
    let body: serde_json::Value = reqwest::get(format!("{api_url}/api/v1/jobs/{id}"))
        .await?
        .error_for_status()?
        .json()
        .await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

pub async fn tick(api_url: &str) -> Result<()> {
    let client = reqwest::Client::new();
    let body: serde_json::Value = client
        .post(format!("{api_url}/api/v1/jobs/tick"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
