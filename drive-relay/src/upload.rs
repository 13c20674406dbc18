//! # Drive upload client (bin <-> core)
//!
//! This module bridges the [`DriveClient`] contract in `drive-relay-core` to
//! the Google Drive REST API: destination-folder lookup/creation, multipart
//! file upload and anyone-with-link sharing.
//!
//! - All transport, serialization and error mapping is encapsulated here.
//! - The core's uploader supplies the bearer token for the requesting user;
//!   this client holds no credential state of its own.

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info};

use drive_relay_core::contract::{Artifact, DriveClient, ShareLink, UploadError};

const FILES_ENDPOINT: &str = "https://www.googleapis.com/drive/v3/files";
const UPLOAD_ENDPOINT: &str =
    "https://www.googleapis.com/upload/drive/v3/files?uploadType=multipart&fields=id,webViewLink";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

pub struct GoogleDriveClient {
    client: reqwest::Client,
}

#[derive(serde::Deserialize)]
struct FileRef {
    id: String,
}

#[derive(serde::Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
}

#[derive(serde::Deserialize)]
struct Uploaded {
    id: String,
    #[serde(rename = "webViewLink", default)]
    web_view_link: Option<String>,
}

impl GoogleDriveClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Find the destination folder by name, creating it on first use.
    async fn ensure_folder(&self, name: &str, token: &str) -> Result<String, UploadError> {
        let query = format!("name = '{name}' and mimeType = '{FOLDER_MIME}' and trashed = false");
        let resp = self
            .client
            .get(FILES_ENDPOINT)
            .query(&[("q", query.as_str()), ("fields", "files(id)")])
            .bearer_auth(token)
            .send()
            .await
            .map_err(net)?;
        let list: FileList = check(resp)
            .await?
            .json()
            .await
            .map_err(|e| UploadError::ProviderRejected(format!("malformed list response: {e}")))?;
        if let Some(found) = list.files.into_iter().next() {
            return Ok(found.id);
        }

        let resp = self
            .client
            .post(FILES_ENDPOINT)
            .bearer_auth(token)
            .json(&json!({ "name": name, "mimeType": FOLDER_MIME }))
            .send()
            .await
            .map_err(net)?;
        let created: FileRef = check(resp).await?.json().await.map_err(|e| {
            UploadError::ProviderRejected(format!("malformed folder response: {e}"))
        })?;
        info!(folder = name, folder_id = %created.id, "created destination folder");
        Ok(created.id)
    }

    /// Grant anyone-with-link read access so the returned link is shareable.
    async fn share_anyone(&self, file_id: &str, token: &str) -> Result<(), UploadError> {
        let resp = self
            .client
            .post(format!("{FILES_ENDPOINT}/{file_id}/permissions"))
            .bearer_auth(token)
            .json(&json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await
            .map_err(net)?;
        check(resp).await.map(|_| ())
    }
}

impl Default for GoogleDriveClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DriveClient for GoogleDriveClient {
    async fn upload_file(
        &self,
        artifact: &Artifact,
        folder_name: &str,
        access_token: &str,
    ) -> Result<ShareLink, UploadError> {
        info!(
            file = %artifact.display_name,
            size_bytes = artifact.size_bytes,
            folder = folder_name,
            "drive upload starting"
        );
        let folder_id = self.ensure_folder(folder_name, access_token).await?;

        let bytes = tokio::fs::read(&artifact.local_path)
            .await
            .map_err(|e| UploadError::Network(format!("artifact read failed: {e}")))?;

        let metadata = json!({ "name": artifact.display_name, "parents": [folder_id] });
        let form = reqwest::multipart::Form::new()
            .part(
                "metadata",
                reqwest::multipart::Part::text(metadata.to_string())
                    .mime_str("application/json")
                    .map_err(net)?,
            )
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(artifact.display_name.clone()),
            );

        let resp = self
            .client
            .post(UPLOAD_ENDPOINT)
            .bearer_auth(access_token)
            .multipart(form)
            .send()
            .await
            .map_err(net)?;
        let uploaded: Uploaded = check(resp).await?.json().await.map_err(|e| {
            UploadError::ProviderRejected(format!("malformed upload response: {e}"))
        })?;

        self.share_anyone(&uploaded.id, access_token).await?;

        let link = uploaded
            .web_view_link
            .unwrap_or_else(|| format!("https://drive.google.com/file/d/{}/view", uploaded.id));
        info!(link = %link, "drive upload finished");
        Ok(ShareLink(link))
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, UploadError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    error!(status = %status, "drive API rejected request");
    Err(UploadError::ProviderRejected(format!(
        "status {status}: {body}"
    )))
}

fn net(e: reqwest::Error) -> UploadError {
    UploadError::Network(e.to_string())
}
