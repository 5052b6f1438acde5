use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use gantry_common::error::{GantryError, Result};
use reqwest::header::{HeaderMap, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use tokio::fs::File as TokioFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};

use crate::validation::verify_checksum;

const DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const CONNECT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT_STRING: &str = "gantry resolver (Rust; +https://github.com/gantry-build/gantry)";

pub fn build_http_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        USER_AGENT_STRING
            .parse()
            .map_err(|_| GantryError::ValidationError("invalid user agent header".into()))?,
    );
    headers.insert(
        ACCEPT,
        "*/*"
            .parse()
            .map_err(|_| GantryError::ValidationError("invalid accept header".into()))?,
    );
    Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .gzip(true)
        .build()
        .map_err(|e| GantryError::ValidationError(format!("Failed to build HTTP client: {e}")))
}

fn map_request_error(url: &str, err: reqwest::Error) -> GantryError {
    if err.is_timeout() || err.is_connect() {
        GantryError::Timeout(format!("request to {url}: {err}"))
    } else {
        GantryError::Http(Arc::new(err))
    }
}

fn map_status(url: &str, name: &str, status: StatusCode) -> GantryError {
    match status {
        StatusCode::NOT_FOUND => GantryError::NotFound(format!("{url} (404)")),
        StatusCode::FORBIDDEN => GantryError::DownloadError(
            name.to_string(),
            url.to_string(),
            "Access forbidden (403)".to_string(),
        ),
        other => GantryError::DownloadError(
            name.to_string(),
            url.to_string(),
            format!("HTTP error {other}"),
        ),
    }
}

/// GETs a small text resource such as a descriptor, metadata document or
/// checksum side file.
pub async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    debug!("Fetching text resource: {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| map_request_error(url, e))?;
    let status = response.status();
    if !status.is_success() {
        debug!("HTTP status {} for {}", status, url);
        return Err(map_status(url, url, status));
    }
    response.text().await.map_err(|e| map_request_error(url, e))
}

/// Downloads `url` into `final_path` through a temporary sibling file.
/// When a digest is given the payload is verified before it becomes
/// visible under its final name; without one the caller is expected to
/// run its own payload checks.
pub async fn download_and_verify(
    client: &Client,
    url: &str,
    final_path: &Path,
    sha256_expected: Option<&str>,
) -> Result<PathBuf> {
    let file_name = final_path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp_path = final_path.with_file_name(format!(
        ".{}.{:08x}.download",
        file_name,
        rand::random::<u32>()
    ));
    debug!("Downloading {} to temporary path {}", url, temp_path.display());

    let response = client.get(url).send().await.map_err(|e| {
        debug!("HTTP request failed for {url}: {e}");
        map_request_error(url, e)
    })?;
    let status = response.status();
    debug!("Received HTTP status: {} for {}", status, url);
    if !status.is_success() {
        return Err(map_status(url, &file_name, status));
    }

    let content = response
        .bytes()
        .await
        .map_err(|e| map_request_error(url, e))?;
    let mut temp_file = TokioFile::create(&temp_path).await?;
    temp_file.write_all(&content).await?;
    temp_file.flush().await?;
    drop(temp_file);
    debug!("Finished writing download stream to temp file.");

    if let Some(expected) = sha256_expected {
        if let Err(e) = verify_checksum(&temp_path, expected) {
            error!("Checksum verification failed for {}: {}", url, e);
            if let Err(remove_err) = fs::remove_file(&temp_path) {
                warn!(
                    "Could not remove rejected temporary file {}: {}",
                    temp_path.display(),
                    remove_err
                );
            }
            return Err(e);
        }
        debug!("Checksum verified for temporary file: {}", temp_path.display());
    } else {
        debug!(
            "No digest available for {}; deferring payload checks to the caller.",
            url
        );
    }

    fs::rename(&temp_path, final_path)?;
    debug!("Moved verified file to final location: {}", final_path.display());
    Ok(final_path.to_path_buf())
}
