//! Upload handoff: re-checks authorization at call time and delegates the
//! actual transfer to the storage-provider client behind [`DriveClient`].

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::AuthorizationFlow;
use crate::contract::{Artifact, DriveClient, ShareLink, UploadError, UserId};

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// Authorization was missing, or stale and unrefreshable, at call time.
    #[error("user is not authorized at upload time")]
    Unauthorized,
    #[error(transparent)]
    Provider(#[from] UploadError),
}

pub struct Uploader {
    client: Arc<dyn DriveClient>,
    auth: Arc<AuthorizationFlow>,
    folder_name: String,
}

impl Uploader {
    pub fn new(
        client: Arc<dyn DriveClient>,
        auth: Arc<AuthorizationFlow>,
        folder_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            auth,
            folder_name: folder_name.into(),
        }
    }

    /// Push a local artifact to the authorized destination.
    ///
    /// Authorization is re-checked here rather than carried over from
    /// classification time: it can expire between the two on long
    /// downloads. Retries are the caller's policy decision, not this
    /// component's.
    pub async fn push(&self, artifact: &Artifact, user: &UserId) -> Result<ShareLink, PushError> {
        let token = match self.auth.authorized_access_token(user).await {
            Ok(Some(token)) => token,
            Ok(None) => return Err(PushError::Unauthorized),
            Err(e) => {
                warn!(user = %user, error = %e, "authorization check failed at upload time");
                return Err(PushError::Unauthorized);
            }
        };

        info!(
            user = %user,
            file = %artifact.display_name,
            size_mb = size_in_megabytes(artifact.size_bytes),
            folder = %self.folder_name,
            "uploading artifact"
        );
        let link = self
            .client
            .upload_file(artifact, &self.folder_name, &token)
            .await?;
        info!(user = %user, link = %link, "upload complete");
        Ok(link)
    }
}

/// Human-readable size rounded to whole megabytes, half up.
pub fn size_in_megabytes(bytes: u64) -> u64 {
    (bytes + 1_048_576 / 2) / 1_048_576
}

#[cfg(test)]
mod tests {
    use super::size_in_megabytes;

    #[test]
    fn size_rounds_to_whole_megabytes() {
        assert_eq!(size_in_megabytes(0), 0);
        assert_eq!(size_in_megabytes(2 * 1_048_576), 2);
        assert_eq!(size_in_megabytes(524_288), 1);
        assert_eq!(size_in_megabytes(524_287), 0);
        assert_eq!(size_in_megabytes(3 * 1_048_576 + 700_000), 4);
    }
}
