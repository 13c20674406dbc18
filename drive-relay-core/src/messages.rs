//! User-facing status and instruction texts.
//!
//! The core never talks to the messaging transport directly; these strings
//! are what it hands to the status reporter or returns from the
//! authorization flow.

pub const PROCESSING: &str = "Processing your request...";
pub const NOT_AUTHORIZED: &str =
    "You are not authorized. Send /auth to connect your drive first.";

pub const DOWNLOADING: &str = "Downloading...";
pub const SHARE_DOWNLOADING: &str = "Resolving share link, downloading...";
pub const CLOUD_DOWNLOADING: &str = "Downloading from Mega...";
pub const DOWNLOAD_COMPLETE: &str = "Download complete.";
pub const UPLOADING: &str = "Uploading to your drive...";

pub const LEGACY_GONE: &str = "Openload is no longer available.";
pub const MEGA_ERROR: &str = "Mega downloading error!!";

pub const AUTH_SUCCESS: &str = "Authorization successful. You can send links now.";
pub const AUTH_ERROR: &str =
    "Token exchange failed. Check the code and send it again.";
pub const ALREADY_AUTHORIZED: &str = "You are already authorized.";
pub const REVOKED: &str = "Your authorization has been revoked.";
pub const REVOKE_NOTHING: &str = "There is no stored authorization to revoke.";
pub const REVOKE_FAILED: &str = "Failed to revoke authorization. Try again.";

pub fn authorization_url(url: &str) -> String {
    format!(
        "Visit this URL to authorize:\n{url}\nThen send me the code you receive."
    )
}

pub fn reauthorize(url: &str) -> String {
    format!(
        "Your authorization expired and could not be refreshed.\nVisit this URL to authorize again:\n{url}"
    )
}

pub fn fallback_starting(cause: &str) -> String {
    format!("Downloader1 error: {cause}\nDownloader2 starting...")
}

pub fn transfer_complete(display_name: &str, size_mb: u64, link: &str) -> String {
    format!("Uploaded: {display_name} ({size_mb} MB)\n{link}")
}

pub fn download_failed(cause: &str) -> String {
    format!("Downloading error: {cause}")
}

pub fn upload_failed(cause: &str) -> String {
    format!("Uploading fail: {cause}")
}

pub fn greeting(name: &str) -> String {
    format!("Hi {name}! Send /auth to connect your drive, then send me any link to mirror it.")
}

pub const HELP: &str = "Send /auth to connect your drive, paste the code you receive, \
then send any direct link, Dropbox share link or Mega link. \
Send /revoke to disconnect.";

pub const STATUS: &str = "Relay is up. Downloads and uploads are running normally.";
