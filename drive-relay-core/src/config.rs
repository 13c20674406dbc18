use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Settings consumed by the core pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Directory artifacts are downloaded into before upload.
    pub download_dir: PathBuf,
    /// Directory holding one authorization record file per user.
    pub credentials_dir: PathBuf,
    /// Destination folder name at the storage provider.
    pub drive_folder_name: String,
    /// Whether the secondary downloader runs after a primary failure.
    pub fallback_enabled: bool,
    /// Fixed credential pair for the authenticated cloud source.
    pub cloud_source: CloudCredentials,
}

impl RelayConfig {
    pub fn trace_loaded(&self) {
        info!(
            download_dir = %self.download_dir.display(),
            credentials_dir = %self.credentials_dir.display(),
            drive_folder_name = %self.drive_folder_name,
            fallback_enabled = self.fallback_enabled,
            "Loaded RelayConfig"
        );
        debug!(?self, "RelayConfig loaded (full debug)");
    }
}

/// Fixed email/password pair used by the authenticated cloud adapter.
#[derive(Clone, Serialize, Deserialize)]
pub struct CloudCredentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for CloudCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudCredentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
