use std::sync::{Arc, Mutex};

use tempfile::tempdir;

use drive_relay_core::auth::AuthorizationFlow;
use drive_relay_core::contract::{
    Artifact, AuthorizationRecord, CredentialStore, DownloadError, MockCredentialStore,
    MockDriveClient, MockSourceFetcher, MockStatusReporter, MockTokenExchanger, ShareLink,
    TransferOutcome, UploadError, UserId,
};
use drive_relay_core::credentials::FileCredentialStore;
use drive_relay_core::transfer::{Adapters, TransferDispatcher};
use drive_relay_core::upload::Uploader;

const FOLDER: &str = "DriveRelay";

/// Reporter that records every status message for later assertions.
fn recording_reporter() -> (MockStatusReporter, Arc<Mutex<Vec<String>>>) {
    let statuses: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = statuses.clone();
    let mut reporter = MockStatusReporter::new();
    reporter.expect_report().returning(move |_, _, message| {
        sink.lock().unwrap().push(message.to_string());
    });
    (reporter, statuses)
}

fn valid_record(user: &str) -> AuthorizationRecord {
    AuthorizationRecord {
        user_id: user.to_string(),
        access_token: "access-token".to_string(),
        refresh_token: Some("refresh-token".to_string()),
        // Far future; never expires within a test run.
        expires_at: Some(4_102_444_800),
    }
}

/// An adapter that must not be invoked: any call fails the test.
fn untouched_adapter() -> Arc<MockSourceFetcher> {
    Arc::new(MockSourceFetcher::new())
}

/// An adapter that writes a real file and returns it as the artifact.
fn succeeding_adapter(dir: &std::path::Path, name: &str, size: usize) -> Arc<MockSourceFetcher> {
    let path = dir.join(name);
    let name = name.to_string();
    let mut fetcher = MockSourceFetcher::new();
    fetcher.expect_fetch().returning(move |_| {
        std::fs::write(&path, vec![0u8; size]).unwrap();
        Ok(Artifact {
            local_path: path.clone(),
            size_bytes: size as u64,
            display_name: name.clone(),
        })
    });
    Arc::new(fetcher)
}

fn failing_adapter(cause: DownloadError) -> Arc<MockSourceFetcher> {
    let mut fetcher = MockSourceFetcher::new();
    fetcher
        .expect_fetch()
        .times(1)
        .returning(move |_| Err(cause.clone()));
    Arc::new(fetcher)
}

struct HarnessParts {
    store: Arc<dyn CredentialStore>,
    drive: MockDriveClient,
    adapters: Adapters,
    fallback_enabled: bool,
}

fn dispatcher(parts: HarnessParts) -> (TransferDispatcher, Arc<Mutex<Vec<String>>>) {
    let auth = Arc::new(AuthorizationFlow::new(
        parts.store,
        Arc::new(MockTokenExchanger::new()),
    ));
    let uploader = Uploader::new(Arc::new(parts.drive), auth.clone(), FOLDER);
    let (reporter, statuses) = recording_reporter();
    (
        TransferDispatcher::new(
            auth,
            uploader,
            Arc::new(reporter),
            parts.adapters,
            parts.fallback_enabled,
        ),
        statuses,
    )
}

// Scenario A: no stored record means Unauthorized, and no download is even
// attempted.
#[tokio::test]
async fn unauthorized_user_is_rejected_before_any_download() {
    let creds = tempdir().unwrap();
    let (dispatcher, statuses) = dispatcher(HarnessParts {
        store: Arc::new(FileCredentialStore::new(creds.path())),
        drive: MockDriveClient::new(),
        adapters: Adapters {
            direct: untouched_adapter(),
            share_redirect: untouched_adapter(),
            cloud_drive: untouched_adapter(),
            fallback: untouched_adapter(),
        },
        fallback_enabled: true,
    });

    let outcome = dispatcher
        .handle(&UserId::new("77"), "http://example.com/a.bin")
        .await;

    assert_eq!(outcome, TransferOutcome::Unauthorized);
    let statuses = statuses.lock().unwrap();
    assert!(
        !statuses.iter().any(|s| s.contains("Downloading")),
        "no downloading status may be emitted for an unauthorized user: {statuses:?}"
    );
}

// Scenario B: authorized user, direct download succeeds, upload succeeds.
#[tokio::test]
async fn direct_download_and_upload_succeed() {
    let creds = tempdir().unwrap();
    let downloads = tempdir().unwrap();

    let store = FileCredentialStore::new(creds.path());
    store.save(&valid_record("42")).unwrap();

    let size = 2 * 1_048_576;
    let artifact_path = downloads.path().join("a.bin");

    let mut drive = MockDriveClient::new();
    drive
        .expect_upload_file()
        .times(1)
        .withf(|artifact, folder, token| {
            artifact.display_name == "a.bin" && folder == FOLDER && token == "access-token"
        })
        .returning(|_, _, _| Ok(ShareLink("https://drive.example/file/abc".to_string())));

    let (dispatcher, statuses) = dispatcher(HarnessParts {
        store: Arc::new(store),
        drive,
        adapters: Adapters {
            direct: succeeding_adapter(downloads.path(), "a.bin", size),
            share_redirect: untouched_adapter(),
            cloud_drive: untouched_adapter(),
            fallback: untouched_adapter(),
        },
        fallback_enabled: true,
    });

    let outcome = dispatcher
        .handle(&UserId::new("42"), "http://example.com/a.bin")
        .await;

    assert_eq!(
        outcome,
        TransferOutcome::Success {
            link: ShareLink("https://drive.example/file/abc".to_string()),
            size_bytes: size as u64,
            display_name: "a.bin".to_string(),
        }
    );
    assert!(
        !artifact_path.exists(),
        "artifact must be removed after a successful transfer"
    );

    // Ordered lifecycle with exactly one terminal status.
    let statuses = statuses.lock().unwrap();
    assert!(statuses.first().unwrap().contains("Processing"));
    assert!(statuses.iter().any(|s| s.contains("Downloading")));
    assert!(statuses.iter().any(|s| s.contains("Download complete")));
    assert!(statuses.iter().any(|s| s.contains("Uploading")));
    assert_eq!(
        statuses
            .iter()
            .filter(|s| s.contains("Uploaded: a.bin (2 MB)"))
            .count(),
        1
    );
}

// Scenario C: cloud-drive adapter fails with quota exhaustion, fallback
// succeeds; the outcome carries the fallback's artifact.
#[tokio::test]
async fn fallback_recovers_from_primary_quota_failure() {
    let creds = tempdir().unwrap();
    let downloads = tempdir().unwrap();

    let store = FileCredentialStore::new(creds.path());
    store.save(&valid_record("42")).unwrap();

    let mut drive = MockDriveClient::new();
    drive
        .expect_upload_file()
        .times(1)
        .returning(|_, _, _| Ok(ShareLink("https://drive.example/file/fb".to_string())));

    let (dispatcher, statuses) = dispatcher(HarnessParts {
        store: Arc::new(store),
        drive,
        adapters: Adapters {
            direct: untouched_adapter(),
            share_redirect: untouched_adapter(),
            cloud_drive: failing_adapter(DownloadError::ProviderQuota(
                "transfer quota exhausted".to_string(),
            )),
            fallback: succeeding_adapter(downloads.path(), "video.mkv", 1_048_576),
        },
        fallback_enabled: true,
    });

    let outcome = dispatcher
        .handle(&UserId::new("42"), "https://mega.nz/file/abcd#key")
        .await;

    match outcome {
        TransferOutcome::Success { display_name, .. } => assert_eq!(display_name, "video.mkv"),
        other => panic!("expected success via fallback, got {other:?}"),
    }
    let statuses = statuses.lock().unwrap();
    assert!(
        statuses.iter().any(|s| s.contains("Downloader2 starting")),
        "fallback start must be announced: {statuses:?}"
    );
}

// Fallback is attempted at most once; a second failure is terminal and the
// terminal cause is the fallback's.
#[tokio::test]
async fn fallback_runs_at_most_once_and_its_failure_is_terminal() {
    let creds = tempdir().unwrap();

    let store = FileCredentialStore::new(creds.path());
    store.save(&valid_record("42")).unwrap();

    let (dispatcher, _statuses) = dispatcher(HarnessParts {
        store: Arc::new(store),
        drive: MockDriveClient::new(),
        adapters: Adapters {
            direct: failing_adapter(DownloadError::Network("connection reset".to_string())),
            share_redirect: untouched_adapter(),
            cloud_drive: untouched_adapter(),
            fallback: failing_adapter(DownloadError::Network("still unreachable".to_string())),
        },
        fallback_enabled: true,
    });

    let outcome = dispatcher
        .handle(&UserId::new("42"), "http://example.com/a.bin")
        .await;

    assert_eq!(
        outcome,
        TransferOutcome::DownloadFailed {
            cause: DownloadError::Network("still unreachable".to_string()),
        }
    );
}

// With the policy flag off, a primary failure is terminal and the fallback
// is never consulted.
#[tokio::test]
async fn fallback_disabled_means_primary_failure_is_terminal() {
    let creds = tempdir().unwrap();

    let store = FileCredentialStore::new(creds.path());
    store.save(&valid_record("42")).unwrap();

    let (dispatcher, _statuses) = dispatcher(HarnessParts {
        store: Arc::new(store),
        drive: MockDriveClient::new(),
        adapters: Adapters {
            direct: failing_adapter(DownloadError::Network("timed out".to_string())),
            share_redirect: untouched_adapter(),
            cloud_drive: untouched_adapter(),
            fallback: untouched_adapter(),
        },
        fallback_enabled: false,
    });

    let outcome = dispatcher
        .handle(&UserId::new("42"), "http://example.com/a.bin")
        .await;

    assert_eq!(
        outcome,
        TransferOutcome::DownloadFailed {
            cause: DownloadError::Network("timed out".to_string()),
        }
    );
}

// Scenario D: unsupported legacy hosts are rejected up front with the fixed
// outcome; no adapter is invoked and no downloading status is emitted.
#[tokio::test]
async fn legacy_host_is_rejected_without_invoking_any_adapter() {
    let creds = tempdir().unwrap();

    let store = FileCredentialStore::new(creds.path());
    store.save(&valid_record("42")).unwrap();

    let (dispatcher, statuses) = dispatcher(HarnessParts {
        store: Arc::new(store),
        drive: MockDriveClient::new(),
        adapters: Adapters {
            direct: untouched_adapter(),
            share_redirect: untouched_adapter(),
            cloud_drive: untouched_adapter(),
            fallback: untouched_adapter(),
        },
        fallback_enabled: true,
    });

    let outcome = dispatcher
        .handle(&UserId::new("42"), "https://openload.co/f/xyz")
        .await;

    match outcome {
        TransferOutcome::DownloadFailed {
            cause: DownloadError::SourceUnsupported(text),
        } => assert!(text.contains("no longer available")),
        other => panic!("expected the fixed legacy rejection, got {other:?}"),
    }

    let statuses = statuses.lock().unwrap();
    assert!(
        !statuses.iter().any(|s| s.contains("Downloading")),
        "no downloading status for a rejected legacy host: {statuses:?}"
    );
    assert!(statuses.iter().any(|s| s.contains("no longer available")));
}

// The artifact is removed even when the upload fails.
#[tokio::test]
async fn artifact_is_removed_after_upload_failure() {
    let creds = tempdir().unwrap();
    let downloads = tempdir().unwrap();

    let store = FileCredentialStore::new(creds.path());
    store.save(&valid_record("42")).unwrap();

    let artifact_path = downloads.path().join("a.bin");

    let mut drive = MockDriveClient::new();
    drive.expect_upload_file().times(1).returning(|_, _, _| {
        Err(UploadError::ProviderRejected("storage quota".to_string()))
    });

    let (dispatcher, statuses) = dispatcher(HarnessParts {
        store: Arc::new(store),
        drive,
        adapters: Adapters {
            direct: succeeding_adapter(downloads.path(), "a.bin", 1024),
            share_redirect: untouched_adapter(),
            cloud_drive: untouched_adapter(),
            fallback: untouched_adapter(),
        },
        fallback_enabled: true,
    });

    let outcome = dispatcher
        .handle(&UserId::new("42"), "http://example.com/a.bin")
        .await;

    assert_eq!(
        outcome,
        TransferOutcome::UploadFailed {
            cause: UploadError::ProviderRejected("storage quota".to_string()),
        }
    );
    assert!(
        !artifact_path.exists(),
        "artifact must be removed after a failed upload too"
    );
    let statuses = statuses.lock().unwrap();
    assert_eq!(
        statuses
            .iter()
            .filter(|s| s.contains("Uploading fail"))
            .count(),
        1,
        "exactly one terminal status: {statuses:?}"
    );
}

// Authorization is re-checked at upload time: a record revoked while the
// download ran means the upload is never attempted.
#[tokio::test]
async fn authorization_lapse_during_download_blocks_the_upload() {
    let downloads = tempdir().unwrap();
    let artifact_path = downloads.path().join("a.bin");

    let mut store = MockCredentialStore::new();
    let mut gate = mockall::Sequence::new();
    // The dispatcher's gate sees a valid record...
    store
        .expect_load()
        .times(1)
        .in_sequence(&mut gate)
        .returning(|_| Ok(Some(valid_record("42"))));
    // ...but by upload time the record is gone.
    store
        .expect_load()
        .times(1)
        .in_sequence(&mut gate)
        .returning(|_| Ok(None));

    // The drive client must never be called.
    let (dispatcher, _statuses) = dispatcher(HarnessParts {
        store: Arc::new(store),
        drive: MockDriveClient::new(),
        adapters: Adapters {
            direct: succeeding_adapter(downloads.path(), "a.bin", 1024),
            share_redirect: untouched_adapter(),
            cloud_drive: untouched_adapter(),
            fallback: untouched_adapter(),
        },
        fallback_enabled: true,
    });

    let outcome = dispatcher
        .handle(&UserId::new("42"), "http://example.com/a.bin")
        .await;

    assert_eq!(outcome, TransferOutcome::Unauthorized);
    assert!(
        !artifact_path.exists(),
        "artifact must be removed when authorization lapses mid-request"
    );
}
