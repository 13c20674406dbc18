//! High-level pipeline: orchestrates one transfer request end to end.
//!
//! The dispatcher classifies the incoming locator, drives the selected
//! source adapter (with a single optional fallback attempt), hands the
//! downloaded artifact to the uploader and owns the request's status
//! lifecycle: queued → downloading → downloaded → uploading → done/failed,
//! with exactly one terminal status per request.
//!
//! # Responsibilities
//! - Rejects unauthorized users before any download is attempted
//! - Exhaustively matches every adapter and uploader error; none propagates
//!   past this boundary — each becomes one terminal [`TransferOutcome`]
//! - Deletes the local artifact after the upload handoff, whatever the
//!   outcome; a request never leaves files behind
//!
//! # Callable From
//! - The gateway wiring in the binary crate, one independent task per
//!   request; requests for different users never serialize on each other
//! - Integration tests, with every seam mocked

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::auth::AuthorizationFlow;
use crate::classify::{classify, LocatorClass};
use crate::contract::{
    Artifact, DownloadError, SourceFetcher, StatusReporter, TransferOutcome, TransferRequest,
    UserId,
};
use crate::messages;
use crate::upload::{size_in_megabytes, PushError, Uploader};

/// The adapter set the dispatcher selects from: one primary per locator
/// class plus the shared fallback.
pub struct Adapters {
    pub direct: Arc<dyn SourceFetcher>,
    pub share_redirect: Arc<dyn SourceFetcher>,
    pub cloud_drive: Arc<dyn SourceFetcher>,
    pub fallback: Arc<dyn SourceFetcher>,
}

pub struct TransferDispatcher {
    auth: Arc<AuthorizationFlow>,
    uploader: Uploader,
    reporter: Arc<dyn StatusReporter>,
    adapters: Adapters,
    fallback_enabled: bool,
}

impl TransferDispatcher {
    pub fn new(
        auth: Arc<AuthorizationFlow>,
        uploader: Uploader,
        reporter: Arc<dyn StatusReporter>,
        adapters: Adapters,
        fallback_enabled: bool,
    ) -> Self {
        Self {
            auth,
            uploader,
            reporter,
            adapters,
            fallback_enabled,
        }
    }

    /// Handle one transfer request, returning its terminal outcome.
    pub async fn handle(&self, user: &UserId, locator: &str) -> TransferOutcome {
        let request = TransferRequest::new(user.clone(), locator);
        let id = request.request_id;
        info!(user = %user, locator, request_id = %id, "[TRANSFER] request queued");
        self.reporter.report(user, id, messages::PROCESSING).await;

        // Authorization gates the whole pipeline; without it no download is
        // attempted, whatever the locator.
        match self.auth.authorized_access_token(user).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                info!(user = %user, request_id = %id, "[TRANSFER] rejected, not authorized");
                self.reporter.report(user, id, messages::NOT_AUTHORIZED).await;
                return TransferOutcome::Unauthorized;
            }
            Err(e) => {
                error!(user = %user, request_id = %id, error = %e, "[TRANSFER] authorization check failed");
                self.reporter.report(user, id, messages::NOT_AUTHORIZED).await;
                return TransferOutcome::Unauthorized;
            }
        }

        let class = classify(locator);
        debug!(request_id = %id, ?class, "[TRANSFER] locator classified");

        let (primary, downloading_msg): (&Arc<dyn SourceFetcher>, &str) = match class {
            LocatorClass::UnsupportedLegacy => {
                info!(request_id = %id, "[TRANSFER] unsupported legacy host rejected");
                self.reporter.report(user, id, messages::LEGACY_GONE).await;
                return TransferOutcome::DownloadFailed {
                    cause: DownloadError::SourceUnsupported(messages::LEGACY_GONE.to_string()),
                };
            }
            LocatorClass::ShareRedirect => {
                (&self.adapters.share_redirect, messages::SHARE_DOWNLOADING)
            }
            LocatorClass::CloudDrive => (&self.adapters.cloud_drive, messages::CLOUD_DOWNLOADING),
            LocatorClass::Direct => (&self.adapters.direct, messages::DOWNLOADING),
        };

        self.reporter.report(user, id, downloading_msg).await;
        let artifact = match primary.fetch(locator).await {
            Ok(artifact) => artifact,
            Err(primary_err) if self.fallback_enabled => {
                warn!(request_id = %id, error = %primary_err, "[TRANSFER] primary adapter failed, invoking fallback");
                self.reporter
                    .report(
                        user,
                        id,
                        &messages::fallback_starting(&primary_err.to_string()),
                    )
                    .await;
                // At most one fallback attempt per request; a second failure
                // is terminal.
                match self.adapters.fallback.fetch(locator).await {
                    Ok(artifact) => artifact,
                    Err(fallback_err) => {
                        error!(request_id = %id, error = %fallback_err, "[TRANSFER] fallback adapter failed");
                        self.reporter
                            .report(user, id, &terminal_download_message(&fallback_err))
                            .await;
                        return TransferOutcome::DownloadFailed {
                            cause: fallback_err,
                        };
                    }
                }
            }
            Err(primary_err) => {
                error!(request_id = %id, error = %primary_err, "[TRANSFER] download failed, fallback disabled");
                self.reporter
                    .report(user, id, &terminal_download_message(&primary_err))
                    .await;
                return TransferOutcome::DownloadFailed { cause: primary_err };
            }
        };

        info!(
            request_id = %id,
            file = %artifact.display_name,
            size_bytes = artifact.size_bytes,
            "[TRANSFER] download complete"
        );
        self.reporter
            .report(user, id, messages::DOWNLOAD_COMPLETE)
            .await;

        self.reporter.report(user, id, messages::UPLOADING).await;
        let outcome = match self.uploader.push(&artifact, user).await {
            Ok(link) => TransferOutcome::Success {
                link,
                size_bytes: artifact.size_bytes,
                display_name: artifact.display_name.clone(),
            },
            Err(PushError::Unauthorized) => {
                warn!(request_id = %id, "[TRANSFER] authorization lapsed before upload");
                TransferOutcome::Unauthorized
            }
            Err(PushError::Provider(cause)) => {
                error!(request_id = %id, error = %cause, "[TRANSFER] upload failed");
                TransferOutcome::UploadFailed { cause }
            }
        };

        // The artifact never outlives its request, whatever the outcome.
        cleanup_artifact(&artifact);

        let terminal = match &outcome {
            TransferOutcome::Success {
                link,
                size_bytes,
                display_name,
            } => messages::transfer_complete(display_name, size_in_megabytes(*size_bytes), &link.0),
            TransferOutcome::UploadFailed { cause } => messages::upload_failed(&cause.to_string()),
            TransferOutcome::Unauthorized => messages::NOT_AUTHORIZED.to_string(),
            TransferOutcome::DownloadFailed { cause } => {
                messages::download_failed(&cause.to_string())
            }
        };
        self.reporter.report(user, id, &terminal).await;
        info!(request_id = %id, "[TRANSFER] request finished");
        outcome
    }
}

/// Provider-side auth/quota exhaustion has its own user-appropriate text;
/// other causes get the generic download failure message.
fn terminal_download_message(cause: &DownloadError) -> String {
    match cause {
        DownloadError::ProviderAuth(_) | DownloadError::ProviderQuota(_) => {
            messages::MEGA_ERROR.to_string()
        }
        other => messages::download_failed(&other.to_string()),
    }
}

/// Best-effort, idempotent cleanup. A failed deletion is logged and
/// swallowed; it never changes the request outcome.
fn cleanup_artifact(artifact: &Artifact) {
    match std::fs::remove_file(&artifact.local_path) {
        Ok(()) => debug!(path = %artifact.local_path.display(), "[TRANSFER] artifact removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(path = %artifact.local_path.display(), error = %e, "[TRANSFER] artifact cleanup failed")
        }
    }
}
