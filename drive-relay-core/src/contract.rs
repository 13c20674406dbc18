//! # contract: trait seams and shared types for the transfer pipeline
//!
//! This module defines the data types that flow through the pipeline and the
//! traits at every external seam: source retrieval, drive upload, token
//! exchange, credential persistence and status reporting.
//!
//! ## Interface & Extensibility
//! - Implement [`SourceFetcher`] to add a new retrieval strategy for a class
//!   of locator.
//! - Implement [`DriveClient`] to target a different storage provider.
//! - All async methods return explicit error variants; the dispatcher matches
//!   exhaustively over them and never lets one escape past its boundary.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall` so consumers can generate
//!   deterministic mocks for unit/integration tests (enabled through the
//!   `test-export-mocks` feature, on by default).

use std::fmt;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque stable identifier for one chat participant. Keys all per-user state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted OAuth token material for one user. At most one record per
/// identity; presence in the [`CredentialStore`] implies "potentially
/// authorized", absence implies "unauthorized".
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthorizationRecord {
    pub user_id: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Unix timestamp when the access token expires. `None` means the
    /// provider did not report an expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl AuthorizationRecord {
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expiry) => unix_now() >= expiry,
            None => false,
        }
    }
}

impl fmt::Debug for AuthorizationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationRecord")
            .field("user_id", &self.user_id)
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token material returned by a [`TokenExchanger`] grant.
#[derive(Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<u64>,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// A locally downloaded resource, exclusively owned by the dispatcher until
/// handed to the uploader, then deleted regardless of upload outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub local_path: PathBuf,
    pub size_bytes: u64,
    pub display_name: String,
}

/// Shareable reference to the uploaded file at the storage destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink(pub String);

impl fmt::Display for ShareLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One transfer request, ephemeral for the lifetime of a single handling
/// cycle. Never persisted.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub request_id: Uuid,
    pub user_id: UserId,
    pub locator: String,
    pub requested_at: SystemTime,
}

impl TransferRequest {
    pub fn new(user_id: UserId, locator: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            user_id,
            locator: locator.into(),
            requested_at: SystemTime::now(),
        }
    }
}

/// Why a download failed. Provider auth/quota exhaustion is kept distinct
/// from plain network failure: it usually indicates the configured provider
/// account is the problem, not the locator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DownloadError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("source not supported: {0}")]
    SourceUnsupported(String),
    #[error("provider authentication failed: {0}")]
    ProviderAuth(String),
    #[error("provider quota exceeded: {0}")]
    ProviderQuota(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("provider rejected upload: {0}")]
    ProviderRejected(String),
    #[error("network failure: {0}")]
    Network(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The submitted text does not look like an authorization code; no
    /// exchange was attempted.
    #[error("text does not look like an authorization code")]
    TokenInvalid,
    /// No authorization record exists for this user.
    #[error("no authorization record for this user")]
    NotFound,
    #[error("token exchange failed: {0}")]
    Exchange(String),
    #[error("token refresh failed: {0}")]
    Refresh(String),
    #[error("credential store failure: {0}")]
    Store(String),
}

#[derive(Debug, thiserror::Error)]
#[error("credential store i/o failure: {0}")]
pub struct StoreError(pub String);

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::Store(e.0)
    }
}

/// Terminal value surfaced to the status reporter for one transfer request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Success {
        link: ShareLink,
        size_bytes: u64,
        display_name: String,
    },
    DownloadFailed {
        cause: DownloadError,
    },
    UploadFailed {
        cause: UploadError,
    },
    Unauthorized,
}

/// Retrieval strategy for one class of locator: resolve the locator to bytes
/// on the local filesystem.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch the resource behind `locator` into a local file, returning the
    /// resulting artifact.
    async fn fetch(&self, locator: &str) -> Result<Artifact, DownloadError>;
}

/// Storage-provider client: uploads one local file into a destination folder
/// and returns a shareable link. Transport and provider protocol are
/// implementation details behind this seam.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DriveClient: Send + Sync {
    async fn upload_file(
        &self,
        artifact: &Artifact,
        folder_name: &str,
        access_token: &str,
    ) -> Result<ShareLink, UploadError>;
}

/// OAuth negotiation with the storage provider: authorization URL, code
/// exchange and refresh grants.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// URL the user must visit to obtain an authorization code.
    fn authorization_url(&self) -> String;

    /// Exchange an authorization code for token material.
    async fn exchange(&self, code: &str) -> Result<TokenGrant, AuthError>;

    /// Trade a refresh token for fresh token material.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError>;
}

/// Per-user persistence of authorization records. Each operation is an
/// atomic single-record load/save/delete; cross-identity operations are
/// independent.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait CredentialStore: Send + Sync {
    fn load(&self, user: &UserId) -> Result<Option<AuthorizationRecord>, StoreError>;

    fn save(&self, record: &AuthorizationRecord) -> Result<(), StoreError>;

    /// Remove the record. Returns `false` when none existed.
    fn delete(&self, user: &UserId) -> Result<bool, StoreError>;
}

/// External collaborator rendering lifecycle updates back to the user. The
/// core only calls it and never owns its transport.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn report(&self, user: &UserId, request_id: Uuid, message: &str);
}
