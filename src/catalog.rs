//! Catalog Client (SPEC_FULL.md §4.G).
//!
//! Fetches the supported-platforms list and a platform's BenchmarkPlan
//! from a remote catalog over HTTP, and best-effort posts the finished
//! report back. Grounded in original_source/pytab/api.py's
//! `getPlatform`/`getTestData` two-step flow, reimplemented with
//! `reqwest` and `Result` instead of `requests` and `exit()` — HTTP
//! failures, a non-200 reply, or an unsupported platform id all surface
//! as a `CatalogError` the CLI front end turns into a non-zero exit
//! (spec.md §6 "Exit behavior (collaborator)").

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::model::BenchmarkPlan;
use crate::report::Report;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Platform {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub supported: bool,
}

#[derive(Debug, Deserialize)]
struct PlatformsResponse {
    platforms: Vec<Platform>,
}

#[derive(Debug, Deserialize)]
struct TestDataResponse {
    token: String,
    plan: BenchmarkPlan,
}

/// `GET {base_url}/api/v1/platforms` — mirrors the original's
/// `TestDataApi/Platforms` call.
pub async fn fetch_platforms(
    client: &reqwest::Client,
    base_url: &str,
) -> Result<Vec<Platform>, CatalogError> {
    let url = format!("{base_url}/api/v1/platforms");
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|source| CatalogError::Unreachable { url: url.clone(), source })?;

    if !response.status().is_success() {
        return Err(CatalogError::BadStatus(response.status()));
    }

    let parsed: PlatformsResponse = response.json().await.map_err(CatalogError::Decode)?;
    Ok(parsed.platforms)
}

/// `GET {base_url}/api/v1/tests?platform_id=...` — mirrors the original's
/// `TestDataApi?platformId=...` call. Returns the opaque submission token
/// alongside the BenchmarkPlan.
pub async fn fetch_plan(
    client: &reqwest::Client,
    base_url: &str,
    platform_id: &str,
) -> Result<(BenchmarkPlan, String), CatalogError> {
    let platforms = fetch_platforms(client, base_url).await?;
    let supported = platforms
        .iter()
        .any(|p| p.id == platform_id && p.supported);
    if !supported {
        return Err(CatalogError::UnsupportedPlatform(platform_id.to_string()));
    }

    let url = format!("{base_url}/api/v1/tests?platform_id={platform_id}");
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|source| CatalogError::Unreachable { url: url.clone(), source })?;

    if !response.status().is_success() {
        return Err(CatalogError::BadStatus(response.status()));
    }

    let parsed: TestDataResponse = response.json().await.map_err(CatalogError::Decode)?;
    Ok((parsed.plan, parsed.token))
}

/// `POST {base_url}/api/v1/results` — best-effort. The engine's contract
/// does not depend on this succeeding (persistent result storage is an
/// explicit Non-goal owned by the catalog server, spec.md §1); a failure
/// is logged, not propagated.
pub async fn submit_report(client: &reqwest::Client, base_url: &str, report: &Report) {
    let url = format!("{base_url}/api/v1/results");
    match client.post(&url).json(report).send().await {
        Ok(response) if response.status().is_success() => {
            tracing::info!("report submitted to catalog");
        }
        Ok(response) => {
            tracing::warn!(status = %response.status(), "catalog rejected report submission");
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to submit report to catalog");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platforms_response_deserializes() {
        let body = r#"{"platforms":[{"id":"linux-x86_64","type":"linux","supported":true}]}"#;
        let parsed: PlatformsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.platforms.len(), 1);
        assert_eq!(parsed.platforms[0].id, "linux-x86_64");
        assert!(parsed.platforms[0].supported);
    }

    #[test]
    fn test_data_response_deserializes_empty_plan() {
        let body = r#"{"token":"tok-123","plan":{"files":[]}}"#;
        let parsed: TestDataResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.token, "tok-123");
        assert!(parsed.plan.files.is_empty());
    }
}
