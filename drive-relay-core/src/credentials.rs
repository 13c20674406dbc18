//! File-backed credential store: one JSON record file per user identity.
//!
//! Record presence is the single source of truth for "potentially
//! authorized"; there is no separate marker. Load tolerates a missing file
//! (that user is simply unauthorized) but surfaces read and parse failures
//! to the caller.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::contract::{AuthorizationRecord, CredentialStore, StoreError, UserId};

/// Stores each user's [`AuthorizationRecord`] as `<dir>/<user_id>.json`.
/// Single-record operations are atomic at the filesystem level: saves write
/// to a temp file and rename into place.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn record_path(&self, user: &UserId) -> PathBuf {
        // User ids come from the messaging front end; keep only filename-safe
        // characters so an identity can never escape the store directory.
        let safe: String = user
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self, user: &UserId) -> Result<Option<AuthorizationRecord>, StoreError> {
        let path = self.record_path(user);
        let data = match fs::read_to_string(&path) {
            Ok(d) => d,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(user = %user, path = %path.display(), "no credential record");
                return Ok(None);
            }
            Err(e) => {
                warn!(user = %user, path = %path.display(), error = %e, "credential record read failed");
                return Err(StoreError(e.to_string()));
            }
        };

        match serde_json::from_str::<AuthorizationRecord>(&data) {
            Ok(record) => {
                debug!(user = %user, "credential record loaded");
                Ok(Some(record))
            }
            Err(e) => {
                warn!(user = %user, path = %path.display(), error = %e, "credential record parse failed");
                Err(StoreError(format!("corrupt record: {e}")))
            }
        }
    }

    fn save(&self, record: &AuthorizationRecord) -> Result<(), StoreError> {
        let user = UserId::new(record.user_id.clone());
        let path = self.record_path(&user);
        fs::create_dir_all(&self.dir).map_err(|e| StoreError(e.to_string()))?;

        let data = serde_json::to_string_pretty(record).map_err(|e| StoreError(e.to_string()))?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &data).map_err(|e| StoreError(e.to_string()))?;

        // Tokens only readable by the owning process.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))
                .map_err(|e| StoreError(e.to_string()))?;
        }

        fs::rename(&tmp, &path).map_err(|e| StoreError(e.to_string()))?;
        info!(user = %user, path = %path.display(), "credential record saved");
        Ok(())
    }

    fn delete(&self, user: &UserId) -> Result<bool, StoreError> {
        let path = self.record_path(user);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(user = %user, path = %path.display(), "credential record deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => {
                warn!(user = %user, path = %path.display(), error = %e, "credential record delete failed");
                Err(StoreError(e.to_string()))
            }
        }
    }
}
