mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result};

/// Fetches a URL through the given client and returns the response body.
///
/// Non-2xx statuses are errors here rather than downstream, so a feed
/// outage surfaces as one data-unavailable condition.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client
        .execute(req)
        .await
        .with_context(|| format!("fetching {url}"))?;
    let resp = resp
        .error_for_status()
        .with_context(|| format!("feed endpoint rejected request to {url}"))?;
    Ok(resp.bytes().await?.to_vec())
}
