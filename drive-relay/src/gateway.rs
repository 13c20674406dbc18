//! Console gateway: a line-oriented stand-in for the messaging front end.
//!
//! Each input line is `<user-id> <text>`. Routing recognizes a fixed command
//! set, a URL-looking string and a token-looking string; nothing more. All
//! real behavior lives in `drive-relay-core` — this module is wiring only.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use uuid::Uuid;

use drive_relay_core::auth::{looks_like_token, AuthorizationFlow};
use drive_relay_core::contract::{AuthError, StatusReporter, UserId};
use drive_relay_core::messages;
use drive_relay_core::transfer::TransferDispatcher;

/// Prints status updates to stdout, tagged with user and request id.
pub struct ConsoleReporter;

#[async_trait]
impl StatusReporter for ConsoleReporter {
    async fn report(&self, user: &UserId, request_id: Uuid, message: &str) {
        println!("[{user}/{}] {message}", request_id.simple());
    }
}

pub struct Gateway {
    auth: Arc<AuthorizationFlow>,
    dispatcher: Arc<TransferDispatcher>,
}

impl Gateway {
    pub fn new(auth: Arc<AuthorizationFlow>, dispatcher: Arc<TransferDispatcher>) -> Self {
        Self { auth, dispatcher }
    }

    /// Entry point for a URL-looking submission. Each request runs as its
    /// own task; requests from different users never serialize on each
    /// other.
    pub fn on_locator(&self, user: UserId, locator: String) {
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            let outcome = dispatcher.handle(&user, &locator).await;
            info!(user = %user, ?outcome, "transfer finished");
        });
    }

    /// Entry point for a token-looking submission.
    pub async fn on_auth_token(&self, user: &UserId, text: &str) -> String {
        match self.auth.complete_with_token(user, text).await {
            Ok(description) => description,
            Err(e) => {
                warn!(user = %user, error = %e, "token submission rejected");
                messages::AUTH_ERROR.to_string()
            }
        }
    }

    async fn on_command(&self, user: &UserId, command: &str) -> String {
        match command {
            "/start" => messages::greeting(user.as_str()),
            "/help" => messages::HELP.to_string(),
            "/update" => messages::STATUS.to_string(),
            "/auth" => match self.auth.begin(user).await {
                Ok(outcome) => outcome.description(),
                Err(e) => {
                    error!(user = %user, error = %e, "authorization begin failed");
                    messages::AUTH_ERROR.to_string()
                }
            },
            "/revoke" => match self.auth.revoke(user).await {
                Ok(()) => messages::REVOKED.to_string(),
                Err(AuthError::NotFound) => messages::REVOKE_NOTHING.to_string(),
                Err(e) => {
                    error!(user = %user, error = %e, "revoke failed");
                    messages::REVOKE_FAILED.to_string()
                }
            },
            _ => messages::HELP.to_string(),
        }
    }

    async fn route(&self, user: &UserId, text: &str) -> Option<String> {
        if text.starts_with('/') {
            return Some(self.on_command(user, text).await);
        }
        if text.contains("http") {
            self.on_locator(user.clone(), text.to_string());
            // Status updates arrive through the reporter.
            return None;
        }
        if looks_like_token(text) {
            return Some(self.on_auth_token(user, text).await);
        }
        Some(messages::HELP.to_string())
    }

    /// Read `(userId, text)` events from stdin until EOF.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!("console gateway ready, reading lines from stdin");
        println!("drive-relay gateway. Lines are: <user-id> <text>. Ctrl-D exits.");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((user_raw, text)) = line.split_once(char::is_whitespace) else {
                println!("usage: <user-id> <text>");
                continue;
            };
            let user = UserId::new(user_raw);
            if let Some(reply) = self.route(&user, text.trim()).await {
                println!("[{user}] {reply}");
            }
        }
        info!("stdin closed, gateway shutting down");
        Ok(())
    }
}
