//! Session lifecycle: challenge, login and transparent renewal.
//!
//! All state lives behind one async mutex. A caller that finds the session
//! expired renews it while holding the lock, so concurrent callers wait for
//! that single renewal and then reuse its result.

use std::sync::Arc;
use tokio::sync::Mutex;

use super::wire::{parse_access_key, parse_challenge, parse_login};
use crate::application::endpoint::ServiceEndpoint;
use crate::domain::foundation::{ClientError, FieldMap, StateMachine};
use crate::domain::session::{
    challenge_digest, Challenge, Credentials, LoginMode, Session, SessionState, SessionStatus,
    UserInfo,
};
use crate::ports::HttpMethod;

#[derive(Debug, Default)]
struct Inner {
    /// Credentials used for renewal; password logins store the derived key.
    credentials: Option<Credentials>,
    state: SessionState,
}

/// Owns the authentication state of one client.
#[derive(Debug)]
pub struct SessionManager {
    endpoint: Arc<ServiceEndpoint>,
    inner: Mutex<Inner>,
}

impl SessionManager {
    pub fn new(endpoint: Arc<ServiceEndpoint>) -> Self {
        Self {
            endpoint,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Creates a manager that logs in lazily with `credentials` on first use.
    pub fn with_credentials(endpoint: Arc<ServiceEndpoint>, credentials: Credentials) -> Self {
        Self {
            endpoint,
            inner: Mutex::new(Inner {
                credentials: Some(credentials),
                state: SessionState::Unauthenticated,
            }),
        }
    }

    pub async fn status(&self) -> SessionStatus {
        self.inner.lock().await.state.status()
    }

    /// The logged-in user, once a login has succeeded.
    pub async fn current_user(&self) -> Option<UserInfo> {
        self.inner.lock().await.state.session().map(UserInfo::from)
    }

    /// Web services API version reported at login.
    pub async fn api_version(&self) -> Option<String> {
        self.inner
            .lock()
            .await
            .state
            .session()
            .map(|s| s.api_version().to_string())
    }

    /// CRM version reported at login.
    pub async fn vtiger_version(&self) -> Option<String> {
        self.inner
            .lock()
            .await
            .state
            .session()
            .map(|s| s.vtiger_version().to_string())
    }

    /// Requests a challenge token for `username`.
    ///
    /// The next login for the same user answers this challenge instead of
    /// requesting a new one. Any session held so far is discarded.
    pub async fn challenge(&self, username: &str) -> Result<(), ClientError> {
        let mut inner = self.inner.lock().await;
        let challenge = self.request_challenge(username).await?;
        Self::enter_challenged(&mut inner, challenge)
    }

    /// Logs in and stores `credentials` for later renewals.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Authentication` if the password exchange, the
    /// challenge or the login fails. Previously stored credentials are kept.
    pub async fn login(&self, credentials: Credentials) -> Result<UserInfo, ClientError> {
        let mut inner = self.inner.lock().await;
        self.login_locked(&mut inner, credentials).await?;
        Self::active_session(&inner).map(UserInfo::from)
    }

    /// Returns a session name that is valid right now, renewing first if the
    /// session has expired or no login has happened yet.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Authentication` if no credentials are stored or
    /// the renewal fails. A failed renewal leaves the session `Expired`, so
    /// the next call tries again.
    pub async fn ensure_valid(&self) -> Result<String, ClientError> {
        let mut inner = self.inner.lock().await;

        if let SessionState::Active(session) = &inner.state {
            if !session.is_expired() {
                return Ok(session.session_name().to_string());
            }
        }

        let credentials = inner.credentials.clone().ok_or_else(|| {
            ClientError::authentication("not logged in and no credentials are configured")
        })?;

        if let SessionState::Active(session) = &inner.state {
            tracing::info!(
                user_id = %session.user_id(),
                expired_at = %session.expires_at(),
                "Session expired, renewing"
            );
            let expired = SessionState::Expired(session.clone());
            Self::transition(&mut inner, expired)?;
        }

        self.login_locked(&mut inner, credentials).await?;
        Ok(Self::active_session(&inner)?.session_name().to_string())
    }

    /// Runs a login and stores the credentials on success.
    ///
    /// The state only changes once the login has succeeded, so a failed or
    /// cancelled attempt leaves the previous session as it was.
    async fn login_locked(&self, inner: &mut Inner, credentials: Credentials) -> Result<(), ClientError> {
        match self.authenticate(inner, &credentials).await {
            Ok(effective) => {
                inner.credentials = Some(effective);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    username = %credentials.username(),
                    error = %err,
                    status = %inner.state.status(),
                    "Login failed"
                );
                Err(err)
            }
        }
    }

    /// Runs the login sequence and returns the credentials to store.
    async fn authenticate(
        &self,
        inner: &mut Inner,
        credentials: &Credentials,
    ) -> Result<Credentials, ClientError> {
        let effective = match credentials.mode() {
            LoginMode::AccessKey => credentials.clone(),
            LoginMode::Password => {
                let key = self.exchange_password(credentials).await?;
                credentials.with_derived_access_key(key)
            }
        };
        let username = effective.username();

        let challenge = match Self::take_pending_challenge(inner, username)? {
            Some(challenge) => challenge,
            None => self.request_challenge(username).await?,
        };

        let params = FieldMap::new()
            .with("username", username)
            .with("accessKey", challenge_digest(challenge.token(), effective.expose_secret()));
        let result = self
            .endpoint
            .call("login", &params, HttpMethod::Post)
            .await
            .map_err(|e| ClientError::authentication_caused_by("login request failed", e))?;
        let grant = parse_login(result)?;

        let session = Session::new(
            grant.session_name,
            grant.user_id,
            username,
            grant.api_version,
            grant.vtiger_version,
            challenge.expires_at(),
        );
        tracing::info!(
            user_id = %session.user_id(),
            api_version = %session.api_version(),
            vtiger_version = %session.vtiger_version(),
            expires_at = %session.expires_at(),
            "Logged in to web services"
        );
        Self::enter_active(inner, session)?;

        Ok(effective)
    }

    /// Removes a stored challenge from state. It is returned only if
    /// `username` can still answer it; either way it is never sent twice.
    fn take_pending_challenge(
        inner: &mut Inner,
        username: &str,
    ) -> Result<Option<Challenge>, ClientError> {
        let pending = match &inner.state {
            SessionState::Challenged(c) => c.is_usable_for(username).then(|| c.clone()),
            _ => return Ok(None),
        };
        Self::transition(inner, SessionState::Unauthenticated)?;
        Ok(pending)
    }

    async fn request_challenge(&self, username: &str) -> Result<Challenge, ClientError> {
        let params = FieldMap::new().with("username", username);
        let result = self
            .endpoint
            .call("getchallenge", &params, HttpMethod::Get)
            .await
            .map_err(|e| ClientError::authentication_caused_by("challenge request failed", e))?;

        let challenge = parse_challenge(username, result)?;
        tracing::debug!(
            username = %username,
            expires_at = %challenge.expires_at(),
            "Received login challenge"
        );
        Ok(challenge)
    }

    async fn exchange_password(&self, credentials: &Credentials) -> Result<String, ClientError> {
        let params = FieldMap::new()
            .with("username", credentials.username())
            .with("password", credentials.expose_secret());
        let result = self
            .endpoint
            .call("login_pwd", &params, HttpMethod::Post)
            .await
            .map_err(|e| ClientError::authentication_caused_by("password exchange failed", e))?;

        tracing::debug!(username = %credentials.username(), "Exchanged password for access key");
        parse_access_key(&result)
    }

    /// Stores a fresh challenge; an older unanswered one is simply replaced.
    fn enter_challenged(inner: &mut Inner, challenge: Challenge) -> Result<(), ClientError> {
        let next = SessionState::Challenged(challenge);
        if inner.state.status() == SessionStatus::Challenged {
            inner.state = next;
            return Ok(());
        }
        Self::transition(inner, next)
    }

    /// A login answers a challenge, so the prior status must allow passing
    /// through `Challenged` on the way to `Active`.
    fn enter_active(inner: &mut Inner, session: Session) -> Result<(), ClientError> {
        inner
            .state
            .status()
            .transition_to(SessionStatus::Challenged)?
            .transition_to(SessionStatus::Active)?;
        inner.state = SessionState::Active(session);
        Ok(())
    }

    fn transition(inner: &mut Inner, next: SessionState) -> Result<(), ClientError> {
        inner.state.status().transition_to(next.status())?;
        inner.state = next;
        Ok(())
    }

    fn active_session(inner: &Inner) -> Result<&Session, ClientError> {
        match &inner.state {
            SessionState::Active(session) => Ok(session),
            other => Err(ClientError::authentication(format!(
                "session is {} after login",
                other.status()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockReply, MockTransport};
    use crate::application::endpoint::{ServiceUrl, DEFAULT_ENDPOINT_PATH};
    use crate::domain::foundation::Timestamp;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::timeout;

    fn challenge_reply(expires_in: i64) -> MockReply {
        MockReply::success(json!({
            "token": "TOKEN",
            "serverTime": Timestamp::now().unix_seconds(),
            "expireTime": Timestamp::now().plus_seconds(expires_in).unix_seconds()
        }))
    }

    fn login_reply(session_name: &str) -> MockReply {
        MockReply::success(json!({
            "sessionName": session_name,
            "userId": "19x1",
            "version": "0.22",
            "vtigerVersion": "7.5.0"
        }))
    }

    fn manager(transport: &MockTransport) -> SessionManager {
        let url = ServiceUrl::parse("http://crm", DEFAULT_ENDPOINT_PATH).unwrap();
        SessionManager::new(Arc::new(ServiceEndpoint::new(url, Arc::new(transport.clone()))))
    }

    #[tokio::test]
    async fn login_sends_md5_digest_and_activates_session() {
        let transport = MockTransport::new()
            .on("getchallenge", challenge_reply(300))
            .on("login", login_reply("S1"));
        let manager = manager(&transport);

        let user = manager.login(Credentials::access_key("admin", "KEY")).await.unwrap();

        assert_eq!(user.user_id, "19x1");
        assert_eq!(manager.status().await, SessionStatus::Active);
        assert_eq!(manager.api_version().await.as_deref(), Some("0.22"));
        assert_eq!(manager.vtiger_version().await.as_deref(), Some("7.5.0"));

        let login = transport.last_call_for("login").unwrap();
        assert_eq!(login.method, HttpMethod::Post);
        assert_eq!(login.param("username"), Some("admin"));
        assert_eq!(
            login.param("accessKey"),
            Some(challenge_digest("TOKEN", "KEY").as_str())
        );
        let challenge = transport.last_call_for("getchallenge").unwrap();
        assert_eq!(challenge.method, HttpMethod::Get);
    }

    #[tokio::test]
    async fn explicit_challenge_is_answered_by_next_login() {
        let transport = MockTransport::new()
            .on("getchallenge", challenge_reply(300))
            .on("login", login_reply("S1"));
        let manager = manager(&transport);

        manager.challenge("admin").await.unwrap();
        assert_eq!(manager.status().await, SessionStatus::Challenged);

        manager.login(Credentials::access_key("admin", "KEY")).await.unwrap();
        assert_eq!(transport.calls_for("getchallenge"), 1);
    }

    #[tokio::test]
    async fn challenge_for_other_user_is_not_reused() {
        let transport = MockTransport::new()
            .on("getchallenge", challenge_reply(300))
            .on("login", login_reply("S1"));
        let manager = manager(&transport);

        manager.challenge("guest").await.unwrap();
        manager.login(Credentials::access_key("admin", "KEY")).await.unwrap();

        assert_eq!(transport.calls_for("getchallenge"), 2);
    }

    #[tokio::test]
    async fn failed_first_login_returns_to_unauthenticated() {
        let transport = MockTransport::new()
            .on("getchallenge", challenge_reply(300))
            .on("login", MockReply::failure("INVALID_AUTH_TOKEN", "bad key"));
        let manager = manager(&transport);

        let err = manager
            .login(Credentials::access_key("admin", "WRONG"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "AUTHENTICATION_FAILED");
        assert_eq!(manager.status().await, SessionStatus::Unauthenticated);
        assert!(manager.current_user().await.is_none());
    }

    #[tokio::test]
    async fn failed_login_keeps_active_session() {
        let transport = MockTransport::new()
            .on("getchallenge", challenge_reply(300))
            .once("login", login_reply("S1"))
            .on("login", MockReply::failure("INVALID_AUTH_TOKEN", "bad key"));
        let manager = manager(&transport);
        manager.login(Credentials::access_key("admin", "KEY")).await.unwrap();

        manager
            .login(Credentials::access_key("admin", "WRONG"))
            .await
            .unwrap_err();

        assert_eq!(manager.status().await, SessionStatus::Active);
        assert_eq!(manager.ensure_valid().await.unwrap(), "S1");
    }

    #[tokio::test]
    async fn explicit_challenge_is_spent_by_failed_login() {
        let transport = MockTransport::new()
            .on("getchallenge", challenge_reply(300))
            .once("login", MockReply::failure("INVALID_AUTH_TOKEN", "bad key"))
            .on("login", login_reply("S1"));
        let manager = manager(&transport);
        manager.challenge("admin").await.unwrap();

        manager
            .login(Credentials::access_key("admin", "WRONG"))
            .await
            .unwrap_err();
        assert_eq!(manager.status().await, SessionStatus::Unauthenticated);

        manager.login(Credentials::access_key("admin", "KEY")).await.unwrap();
        assert_eq!(transport.calls_for("getchallenge"), 2);
    }

    #[tokio::test]
    async fn cancelled_renewal_keeps_expired_session_and_next_renewal_starts_over() {
        let transport = MockTransport::new()
            .once("getchallenge", challenge_reply(-10))
            .once(
                "getchallenge",
                MockReply::success(json!({
                    "token": "SPENT",
                    "expireTime": Timestamp::now().plus_seconds(300).unix_seconds()
                })),
            )
            .on("getchallenge", challenge_reply(300))
            .once("login", login_reply("S1"))
            .on("login", login_reply("S2"))
            .with_delay(Duration::from_millis(100));
        let manager = manager(&transport);
        manager.login(Credentials::access_key("admin", "KEY")).await.unwrap();
        transport.clear_calls();

        // Cancelled while the login request is in flight.
        let cancelled = timeout(Duration::from_millis(150), manager.ensure_valid()).await;
        assert!(cancelled.is_err());
        assert_eq!(transport.calls_for("login"), 1);
        assert_eq!(manager.status().await, SessionStatus::Expired);
        assert_eq!(
            manager.current_user().await.map(|u| u.user_id),
            Some("19x1".to_string())
        );
        transport.clear_calls();

        assert_eq!(manager.ensure_valid().await.unwrap(), "S2");
        assert_eq!(transport.calls_for("getchallenge"), 1);
        let login = transport.last_call_for("login").unwrap();
        assert_eq!(
            login.param("accessKey"),
            Some(challenge_digest("TOKEN", "KEY").as_str())
        );
    }

    #[tokio::test]
    async fn ensure_valid_without_credentials_fails() {
        let transport = MockTransport::new();
        let manager = manager(&transport);

        let err = manager.ensure_valid().await.unwrap_err();

        assert!(matches!(err, ClientError::Authentication { .. }));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn ensure_valid_reuses_unexpired_session() {
        let transport = MockTransport::new()
            .on("getchallenge", challenge_reply(300))
            .on("login", login_reply("S1"));
        let manager = manager(&transport);
        manager.login(Credentials::access_key("admin", "KEY")).await.unwrap();
        transport.clear_calls();

        assert_eq!(manager.ensure_valid().await.unwrap(), "S1");
        assert_eq!(manager.ensure_valid().await.unwrap(), "S1");
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn expired_session_is_renewed_once() {
        let transport = MockTransport::new()
            .once("getchallenge", challenge_reply(-10))
            .on("getchallenge", challenge_reply(300))
            .once("login", login_reply("S1"))
            .on("login", login_reply("S2"));
        let manager = manager(&transport);
        manager.login(Credentials::access_key("admin", "KEY")).await.unwrap();
        transport.clear_calls();

        assert_eq!(manager.ensure_valid().await.unwrap(), "S2");
        assert_eq!(manager.ensure_valid().await.unwrap(), "S2");
        assert_eq!(transport.calls_for("getchallenge"), 1);
        assert_eq!(transport.calls_for("login"), 1);
    }

    #[tokio::test]
    async fn failed_renewal_leaves_session_expired() {
        let transport = MockTransport::new()
            .once("getchallenge", challenge_reply(-10))
            .on("getchallenge", MockReply::failure("INTERNAL_SERVER_ERROR", "down"))
            .on("login", login_reply("S1"));
        let manager = manager(&transport);
        manager.login(Credentials::access_key("admin", "KEY")).await.unwrap();

        let err = manager.ensure_valid().await.unwrap_err();

        assert!(matches!(err, ClientError::Authentication { .. }));
        assert_eq!(manager.status().await, SessionStatus::Expired);
        assert_eq!(
            manager.current_user().await.map(|u| u.user_id),
            Some("19x1".to_string())
        );
    }

    #[tokio::test]
    async fn password_login_exchanges_once_and_keeps_derived_key() {
        let transport = MockTransport::new()
            .on("login_pwd", MockReply::success(json!({"accesskey": "DERIVED"})))
            .once("getchallenge", challenge_reply(-10))
            .on("getchallenge", challenge_reply(300))
            .on("login", login_reply("S1"));
        let manager = manager(&transport);

        manager.login(Credentials::password("admin", "secret")).await.unwrap();
        let exchange = transport.last_call_for("login_pwd").unwrap();
        assert_eq!(exchange.method, HttpMethod::Post);
        assert_eq!(exchange.param("password"), Some("secret"));

        // First session expired immediately; renewal must use the derived key.
        manager.ensure_valid().await.unwrap();

        assert_eq!(transport.calls_for("login_pwd"), 1);
        let renewal = transport.last_call_for("login").unwrap();
        assert_eq!(
            renewal.param("accessKey"),
            Some(challenge_digest("TOKEN", "DERIVED").as_str())
        );
    }

    #[tokio::test]
    async fn malformed_challenge_is_authentication_error() {
        let transport = MockTransport::new().on("getchallenge", MockReply::success(json!({"expireTime": 1})));
        let manager = manager(&transport);

        let err = manager.challenge("admin").await.unwrap_err();

        assert!(matches!(err, ClientError::Authentication { .. }));
        assert_eq!(manager.status().await, SessionStatus::Unauthenticated);
    }
}
