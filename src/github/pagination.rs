use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;

use super::USER_AGENT;

/// Hard cap on pages fetched from one listing endpoint
pub const MAX_PAGES: u32 = 100;

/// Fetch one page of a paginated GitHub listing
///
/// Holds no pagination state; the caller owns the page counter. `params`
/// are extra query parameters appended before the `page` parameter.
pub async fn fetch_page(
    client: &Client,
    url: &str,
    token: &str,
    params: &[(&str, &str)],
    page: u32,
) -> Result<Vec<Value>, ApiError> {
    let page_value = page.to_string();
    let mut query: Vec<(&str, &str)> = params.to_vec();
    query.push(("page", page_value.as_str()));

    let response = client
        .get(url)
        .header("Accept", "application/vnd.github+json")
        .header("User-Agent", USER_AGENT)
        .header("Authorization", format!("Bearer {}", token))
        .query(&query)
        .send()
        .await
        .map_err(|e| ApiError::Transport {
            url: url.to_string(),
            source: e,
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    response.json().await.map_err(|e| ApiError::Transport {
        url: url.to_string(),
        source: e,
    })
}

/// Fetch every page of a listing until one comes back empty
///
/// Pages are requested starting at 1 and concatenated in order, capped at
/// `MAX_PAGES`. Any page-level failure aborts the whole listing.
pub async fn fetch_all(
    client: &Client,
    url: &str,
    token: &str,
    params: &[(&str, &str)],
) -> Result<Vec<Value>, ApiError> {
    let mut items = Vec::new();

    for page in 1..=MAX_PAGES {
        let batch = fetch_page(client, url, token, params, page).await?;
        if batch.is_empty() {
            break;
        }
        debug!(url, page, count = batch.len(), "Fetched listing page");
        items.extend(batch);
    }

    Ok(items)
}
