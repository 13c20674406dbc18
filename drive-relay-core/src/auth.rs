//! Per-user authorization flow.
//!
//! Drives one user from unauthorized to authorized:
//! `Unauthorized → AwaitingToken → Authorized`, with `Authorized →
//! Unauthorized` on revocation or irrecoverable refresh failure. The
//! authorized state is derived from credential record presence and freshness,
//! never from a separate marker, so the two cannot drift apart.
//!
//! All state reads and writes for one identity happen under that identity's
//! own async mutex; identities never contend with each other.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::contract::{
    AuthError, AuthorizationRecord, CredentialStore, TokenExchanger, TokenGrant, UserId,
};
use crate::messages;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthorized,
    AwaitingToken,
    Authorized,
}

/// What `begin` decided for the user, with the state it moved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginOutcome {
    /// No record existed: the user must visit this URL. Now AwaitingToken.
    AuthorizationUrl(String),
    /// A valid (possibly just refreshed) record exists. Now Authorized.
    AlreadyAuthorized,
    /// The stored record was stale and refresh failed; the record was
    /// cleared. Now Unauthorized; the user must authorize from scratch.
    ReauthorizeRequired(String),
}

impl BeginOutcome {
    /// User-facing description of the transition. The flow never touches the
    /// messaging transport itself.
    pub fn description(&self) -> String {
        match self {
            BeginOutcome::AuthorizationUrl(url) => messages::authorization_url(url),
            BeginOutcome::AlreadyAuthorized => messages::ALREADY_AUTHORIZED.to_string(),
            BeginOutcome::ReauthorizeRequired(url) => messages::reauthorize(url),
        }
    }
}

pub struct AuthorizationFlow {
    store: Arc<dyn CredentialStore>,
    exchanger: Arc<dyn TokenExchanger>,
    sessions: Mutex<HashMap<UserId, Arc<Mutex<AuthState>>>>,
}

impl AuthorizationFlow {
    pub fn new(store: Arc<dyn CredentialStore>, exchanger: Arc<dyn TokenExchanger>) -> Self {
        Self {
            store,
            exchanger,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The per-identity lock. Held across every load-decide-store sequence so
    /// a concurrent transfer observes a consistent authorization snapshot.
    async fn session(&self, user: &UserId) -> Arc<Mutex<AuthState>> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(user.clone())
            .or_insert_with(|| Arc::new(Mutex::new(AuthState::Unauthorized)))
            .clone()
    }

    /// Start (or re-confirm) authorization for a user.
    pub async fn begin(&self, user: &UserId) -> Result<BeginOutcome, AuthError> {
        let session = self.session(user).await;
        let mut state = session.lock().await;

        match self.store.load(user)? {
            None => {
                let url = self.exchanger.authorization_url();
                *state = AuthState::AwaitingToken;
                info!(user = %user, "authorization started, awaiting token");
                Ok(BeginOutcome::AuthorizationUrl(url))
            }
            Some(record) if !record.is_expired() => {
                *state = AuthState::Authorized;
                debug!(user = %user, "already authorized, token unexpired");
                Ok(BeginOutcome::AlreadyAuthorized)
            }
            Some(record) => match self.refresh_record(user, &record).await {
                Ok(_) => {
                    *state = AuthState::Authorized;
                    info!(user = %user, "stale token refreshed");
                    Ok(BeginOutcome::AlreadyAuthorized)
                }
                Err(e) => {
                    warn!(user = %user, error = %e, "refresh failed, clearing record");
                    self.store.delete(user)?;
                    *state = AuthState::Unauthorized;
                    Ok(BeginOutcome::ReauthorizeRequired(
                        self.exchanger.authorization_url(),
                    ))
                }
            },
        }
    }

    /// Accept a token submission and exchange it for a credential record.
    ///
    /// The format predicate runs before any exchange attempt, so obviously
    /// malformed input never costs a network round trip. An exchange failure
    /// leaves the user in AwaitingToken: resubmitting is the recovery path.
    pub async fn complete_with_token(
        &self,
        user: &UserId,
        text: &str,
    ) -> Result<String, AuthError> {
        let code = extract_code(text).ok_or(AuthError::TokenInvalid)?;

        let session = self.session(user).await;
        let mut state = session.lock().await;

        match self.exchanger.exchange(code).await {
            Ok(grant) => {
                let record = record_from_grant(user, grant, None);
                self.store.save(&record)?;
                *state = AuthState::Authorized;
                info!(user = %user, "token exchange succeeded, authorized");
                Ok(messages::AUTH_SUCCESS.to_string())
            }
            Err(e) => {
                *state = AuthState::AwaitingToken;
                warn!(user = %user, error = %e, "token exchange failed");
                Err(e)
            }
        }
    }

    /// Delete the user's record unconditionally. `NotFound` when none
    /// existed; callers report it, it is never fatal.
    pub async fn revoke(&self, user: &UserId) -> Result<(), AuthError> {
        let session = self.session(user).await;
        let mut state = session.lock().await;

        let removed = self.store.delete(user)?;
        *state = AuthState::Unauthorized;
        if removed {
            info!(user = %user, "authorization revoked");
            Ok(())
        } else {
            debug!(user = %user, "revoke with no stored record");
            Err(AuthError::NotFound)
        }
    }

    /// One consistent authorization check: returns a currently valid access
    /// token, refreshing a stale one in place, or `None` when the user is
    /// not authorized. Both the dispatcher's gate and the uploader's
    /// call-time re-check go through here.
    pub async fn authorized_access_token(
        &self,
        user: &UserId,
    ) -> Result<Option<String>, AuthError> {
        let session = self.session(user).await;
        let mut state = session.lock().await;

        match self.store.load(user)? {
            None => {
                if *state == AuthState::Authorized {
                    *state = AuthState::Unauthorized;
                }
                Ok(None)
            }
            Some(record) if !record.is_expired() => {
                *state = AuthState::Authorized;
                Ok(Some(record.access_token))
            }
            Some(record) => match self.refresh_record(user, &record).await {
                Ok(updated) => {
                    *state = AuthState::Authorized;
                    Ok(Some(updated.access_token))
                }
                Err(e) => {
                    warn!(user = %user, error = %e, "refresh failed, clearing record");
                    self.store.delete(user)?;
                    *state = AuthState::Unauthorized;
                    Ok(None)
                }
            },
        }
    }

    /// Current state for one user. Informational; decisions go through
    /// [`Self::authorized_access_token`].
    pub async fn state(&self, user: &UserId) -> AuthState {
        *self.session(user).await.lock().await
    }

    async fn refresh_record(
        &self,
        user: &UserId,
        record: &AuthorizationRecord,
    ) -> Result<AuthorizationRecord, AuthError> {
        let refresh_token = record
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::Refresh("no refresh token stored".to_string()))?;
        let grant = self.exchanger.refresh(refresh_token).await?;
        let updated = record_from_grant(user, grant, record.refresh_token.clone());
        self.store.save(&updated)?;
        Ok(updated)
    }
}

fn record_from_grant(
    user: &UserId,
    grant: TokenGrant,
    previous_refresh: Option<String>,
) -> AuthorizationRecord {
    AuthorizationRecord {
        user_id: user.as_str().to_string(),
        access_token: grant.access_token,
        // Providers often omit the refresh token on refresh grants; keep the
        // one already stored in that case.
        refresh_token: grant.refresh_token.or(previous_refresh),
        expires_at: grant.expires_at,
    }
}

/// Recognize a token-looking submission. The authorization code is the last
/// whitespace-separated element, as in `auth 4/0Adt_abc123`.
pub fn looks_like_token(text: &str) -> bool {
    extract_code(text).is_some()
}

fn extract_code(text: &str) -> Option<&str> {
    // Anything carrying a URL scheme is a locator, not a code.
    if text.contains("://") {
        return None;
    }
    let candidate = text.split_whitespace().next_back()?;
    code_pattern().is_match(candidate).then_some(candidate)
}

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9/_.\-]{6,}$").expect("static code pattern"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_and_prefixed_codes_are_recognized() {
        assert!(looks_like_token("abc123"));
        assert!(looks_like_token("auth abc123"));
        assert!(looks_like_token("4/0Adt_xyz-ABC123"));
    }

    #[test]
    fn urls_are_not_tokens() {
        assert!(!looks_like_token("http://example.com/a.bin"));
        assert!(!looks_like_token("auth https://mega.nz/file/x"));
    }

    #[test]
    fn short_or_punctuated_text_is_not_a_token() {
        assert!(!looks_like_token("hi"));
        assert!(!looks_like_token("hello there!"));
        assert!(!looks_like_token(""));
    }

    #[test]
    fn code_is_the_last_whitespace_separated_element() {
        assert_eq!(extract_code("auth abc123"), Some("abc123"));
        assert_eq!(extract_code("  spaced   out   code-42 "), Some("code-42"));
    }
}
