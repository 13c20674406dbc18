//! Source adapters: each resolves one class of locator to bytes on disk.
//!
//! All adapters share the [`SourceFetcher`] contract and differ only in how
//! they turn the locator into a byte stream:
//! - [`HttpFetcher`] streams the resource directly.
//! - [`ShareLinkFetcher`] first resolves an indirect share link to a direct
//!   resource URL, then streams it. Two network phases; a resolve failure
//!   aborts before any streaming starts.
//! - [`MegaFetcher`] authenticates with a fixed credential pair and streams
//!   through the provider's API. Auth and quota exhaustion are reported
//!   distinctly from network failures.
//! - [`FallbackFetcher`] is the secondary downloader invoked after a primary
//!   failure; one whole-body request, no streaming.
//!
//! Downloads land in a staging temp file and are persisted into the download
//! directory only on completion, so an aborted transfer leaves nothing
//! behind.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::CloudCredentials;
use crate::contract::{Artifact, DownloadError, SourceFetcher};

/// Whole-request ceiling per network phase. Surfaced as a network failure
/// with a timeout cause when exceeded.
const FETCH_TIMEOUT: Duration = Duration::from_secs(600);
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(60);

pub const MEGA_API_BASE: &str = "https://g.api.mega.co.nz";

/// Streams the resource directly over HTTP(S).
pub struct HttpFetcher {
    client: reqwest::Client,
    download_dir: PathBuf,
}

impl HttpFetcher {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            download_dir: download_dir.into(),
        }
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, locator: &str) -> Result<Artifact, DownloadError> {
        info!(locator, "direct download starting");
        let resp = self
            .client
            .get(locator)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(network_error)?;
        stream_response(check_status(resp)?, &self.download_dir).await
    }
}

/// Two-phase retrieval for indirect share links: resolve first, then stream.
pub struct ShareLinkFetcher {
    client: reqwest::Client,
    download_dir: PathBuf,
}

impl ShareLinkFetcher {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            download_dir: download_dir.into(),
        }
    }

    /// Rewrite a share URL into its direct-content form: swap the share host
    /// for the content host and drop the download-suppressing query flag.
    pub fn direct_url(share_url: &str) -> String {
        let mut direct = share_url.replace("www.dropbox.com", "dl.dropboxusercontent.com");
        if !direct.contains("dl.dropboxusercontent.com") {
            direct = direct.replace("dropbox.com", "dl.dropboxusercontent.com");
        }
        direct.replace("?dl=0", "").replace("&dl=0", "")
    }
}

#[async_trait]
impl SourceFetcher for ShareLinkFetcher {
    async fn fetch(&self, locator: &str) -> Result<Artifact, DownloadError> {
        let direct = Self::direct_url(locator);
        info!(locator, direct = %direct, "resolving share link");

        // Phase one: confirm the direct URL and follow its redirects. A
        // failure here aborts before any bytes are streamed.
        let head = self
            .client
            .head(&direct)
            .timeout(RESOLVE_TIMEOUT)
            .send()
            .await
            .map_err(network_error)?;
        let resolved = check_status(head)?.url().clone();
        debug!(resolved = %resolved, "share link resolved");

        // Phase two: stream the resolved resource.
        let resp = self
            .client
            .get(resolved)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(network_error)?;
        stream_response(check_status(resp)?, &self.download_dir).await
    }
}

/// Authenticated cloud retrieval: session login with a fixed credential
/// pair, then an API download.
pub struct MegaFetcher {
    client: reqwest::Client,
    download_dir: PathBuf,
    credentials: CloudCredentials,
    api_base: String,
}

impl MegaFetcher {
    pub fn new(download_dir: impl Into<PathBuf>, credentials: CloudCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            download_dir: download_dir.into(),
            credentials,
            api_base: MEGA_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn login(&self) -> Result<String, DownloadError> {
        #[derive(serde::Serialize)]
        struct LoginRequest<'a> {
            email: &'a str,
            password: &'a str,
        }
        #[derive(serde::Deserialize)]
        struct LoginResponse {
            session: String,
        }

        let resp = self
            .client
            .post(format!("{}/login", self.api_base))
            .json(&LoginRequest {
                email: &self.credentials.email,
                password: &self.credentials.password,
            })
            .timeout(RESOLVE_TIMEOUT)
            .send()
            .await
            .map_err(network_error)?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DownloadError::ProviderAuth(format!(
                "login rejected with status {status}"
            )));
        }
        if !status.is_success() {
            return Err(DownloadError::Network(format!(
                "login returned status {status}"
            )));
        }
        resp.json::<LoginResponse>()
            .await
            .map(|r| r.session)
            .map_err(|e| DownloadError::Network(format!("malformed login response: {e}")))
    }
}

#[async_trait]
impl SourceFetcher for MegaFetcher {
    async fn fetch(&self, locator: &str) -> Result<Artifact, DownloadError> {
        info!(locator, "mega download starting");
        let session = self.login().await?;

        let resp = self
            .client
            .get(format!("{}/download", self.api_base))
            .query(&[("link", locator), ("session", session.as_str())])
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(network_error)?;

        let status = resp.status();
        // 509 is the provider's bandwidth-quota status; 429 the generic one.
        if status.as_u16() == 509 || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(DownloadError::ProviderQuota(format!(
                "transfer quota exhausted (status {status})"
            )));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DownloadError::ProviderAuth(format!(
                "download rejected with status {status}"
            )));
        }
        stream_response(check_status(resp)?, &self.download_dir).await
    }
}

/// Secondary downloader for primary-adapter failures: a single whole-body
/// request written to disk in one step.
pub struct FallbackFetcher {
    client: reqwest::Client,
    download_dir: PathBuf,
}

impl FallbackFetcher {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            download_dir: download_dir.into(),
        }
    }
}

#[async_trait]
impl SourceFetcher for FallbackFetcher {
    async fn fetch(&self, locator: &str) -> Result<Artifact, DownloadError> {
        info!(locator, "fallback download starting");
        let resp = self
            .client
            .get(locator)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(network_error)?;
        let resp = check_status(resp)?;

        let display_name = response_display_name(&resp);
        let bytes = resp.bytes().await.map_err(network_error)?;

        std::fs::create_dir_all(&self.download_dir).map_err(io_error)?;
        let final_path = unique_path(&self.download_dir, &display_name);
        std::fs::write(&final_path, &bytes).map_err(io_error)?;

        debug!(path = %final_path.display(), size_bytes = bytes.len(), "fallback download written");
        Ok(Artifact {
            local_path: final_path,
            size_bytes: bytes.len() as u64,
            display_name,
        })
    }
}

fn network_error(e: reqwest::Error) -> DownloadError {
    if e.is_timeout() {
        DownloadError::Network(format!("timed out: {e}"))
    } else {
        DownloadError::Network(e.to_string())
    }
}

fn io_error(e: std::io::Error) -> DownloadError {
    DownloadError::Network(format!("download i/o failed: {e}"))
}

fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, DownloadError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        warn!(status = %status, url = %resp.url(), "download request rejected");
        Err(DownloadError::Network(format!("unexpected status {status}")))
    }
}

/// Stream a successful response into the download directory through a
/// staging temp file, persisting it under its display name on completion.
async fn stream_response(resp: reqwest::Response, dir: &Path) -> Result<Artifact, DownloadError> {
    let display_name = response_display_name(&resp);

    std::fs::create_dir_all(dir).map_err(io_error)?;
    let mut staging = tempfile::Builder::new()
        .prefix(".part-")
        .tempfile_in(dir)
        .map_err(io_error)?;

    let mut size_bytes: u64 = 0;
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(network_error)?;
        size_bytes += chunk.len() as u64;
        staging.write_all(&chunk).map_err(io_error)?;
    }

    let final_path = unique_path(dir, &display_name);
    staging
        .persist(&final_path)
        .map_err(|e| io_error(e.error))?;

    debug!(path = %final_path.display(), size_bytes, "download streamed to disk");
    Ok(Artifact {
        local_path: final_path,
        size_bytes,
        display_name,
    })
}

fn response_display_name(resp: &reqwest::Response) -> String {
    header_filename(resp).unwrap_or_else(|| url_filename(resp.url()))
}

fn header_filename(resp: &reqwest::Response) -> Option<String> {
    let value = resp
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)?
        .to_str()
        .ok()?;
    parse_content_disposition(value)
}

fn parse_content_disposition(value: &str) -> Option<String> {
    let name = value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))?
        .trim_matches('"')
        .trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn url_filename(url: &reqwest::Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .map(str::to_string)
        .unwrap_or_else(|| format!("download-{}", Uuid::new_v4().simple()))
}

/// Concurrent requests may fetch resources with the same name; never
/// overwrite an existing artifact.
fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let id = Uuid::new_v4().simple().to_string();
    dir.join(format!("{}-{}", &id[..8], name))
}
