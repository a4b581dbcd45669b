//! Authenticated identities
//!
//! [`SessionBootstrapper::ensure_auth`] turns credentials into a [`Session`],
//! creating the account on the fly when it does not exist yet. The setup
//! phase collects the sessions it could establish into a [`SessionPool`],
//! which every simulated user then reads without locking.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::metrics::{MetricsSink, Step, StepOutcome, StepTimer};
use crate::model::LoginResponse;
use crate::retry::RetryingExecutor;
use crate::transport::{HttpRequest, Transport};

/// Pause between a successful signup and the follow-up login
pub const SIGNUP_SETTLE: Duration = Duration::from_millis(500);

pub const DEFAULT_DISPLAY_NAME: &str = "Test User";

/// Login credentials, as listed in the users file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    #[serde(default, alias = "nombre")]
    pub name: Option<String>,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            name: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_DISPLAY_NAME)
    }
}

/// An authenticated identity. The token is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    credentials: Credentials,
    token: String,
    user_id: i64,
}

impl Session {
    /// Returns `None` for an empty token.
    pub fn new(credentials: &Credentials, token: String, user_id: i64) -> Option<Self> {
        if token.trim().is_empty() {
            return None;
        }
        Some(Self {
            credentials: credentials.clone(),
            token,
            user_id,
        })
    }

    pub fn email(&self) -> &str {
        &self.credentials.email
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }
}

/// Concurrent logins during the setup phase
pub const SETUP_CONCURRENCY: usize = 10;

/// Sessions established during setup; cheap to clone and read-only.
#[derive(Debug, Clone)]
pub struct SessionPool {
    sessions: Arc<[Session]>,
}

impl SessionPool {
    pub fn new(sessions: Vec<Session>) -> Self {
        Self {
            sessions: sessions.into(),
        }
    }

    /// Pick a session uniformly at random.
    pub fn pick<R: Rng>(&self, rng: &mut R) -> Option<&Session> {
        self.sessions.choose(rng)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }

    /// Setup phase: run [`SessionBootstrapper::ensure_auth`] for every
    /// credential, at most `concurrency` at a time, keeping the sessions
    /// that could be established. Each attempt is reported as a
    /// [`Step::Login`].
    pub async fn establish<T>(
        transport: T,
        bootstrapper: &SessionBootstrapper,
        users: &[Credentials],
        metrics: Arc<dyn MetricsSink>,
        concurrency: usize,
    ) -> Self
    where
        T: Transport + Clone + 'static,
    {
        let concurrency = concurrency.max(1);
        let mut tasks = JoinSet::new();
        let mut sessions = Vec::with_capacity(users.len());

        for credentials in users.iter().cloned() {
            let mut transport = transport.clone();
            let bootstrapper = bootstrapper.clone();
            let metrics = Arc::clone(&metrics);
            tasks.spawn(async move {
                let timer = StepTimer::start(metrics.as_ref(), Step::Login);
                let session = bootstrapper
                    .ensure_auth(&mut transport, &credentials, credentials.display_name())
                    .await;
                if session.is_some() {
                    timer.finish(StepOutcome::Success);
                } else {
                    timer.finish(StepOutcome::Failure);
                    warn!(email = %credentials.email, "login and signup failed");
                }
                session
            });

            if tasks.len() >= concurrency {
                if let Some(Ok(Some(session))) = tasks.join_next().await {
                    sessions.push(session);
                }
            }
        }
        while let Some(joined) = tasks.join_next().await {
            if let Ok(Some(session)) = joined {
                sessions.push(session);
            }
        }

        info!(
            "setup complete: {} of {} users logged in",
            sessions.len(),
            users.len()
        );
        Self::new(sessions)
    }
}

#[derive(Debug, Clone)]
pub struct SessionBootstrapper {
    executor: RetryingExecutor,
    signup_settle: Duration,
}

impl SessionBootstrapper {
    pub fn new(executor: RetryingExecutor) -> Self {
        Self {
            executor,
            signup_settle: SIGNUP_SETTLE,
        }
    }

    pub fn with_signup_settle(mut self, settle: Duration) -> Self {
        self.signup_settle = settle;
        self
    }

    /// POST /api/auth/login. `None` unless the response is a 200 carrying a
    /// non-empty token and a user id.
    pub async fn login<T>(&self, transport: &mut T, credentials: &Credentials) -> Option<Session>
    where
        T: Transport + ?Sized,
    {
        let request = HttpRequest::post_json(
            "/api/auth/login",
            "POST /api/auth/login",
            &json!({ "email": credentials.email, "password": credentials.password }),
        );
        let result = self.executor.execute(transport, &request).await;
        if !result.is_status(200) {
            return None;
        }

        let body: LoginResponse = match serde_json::from_str(result.body_str()) {
            Ok(body) => body,
            Err(e) => {
                warn!(email = %credentials.email, "error parsing login response: {e}");
                return None;
            }
        };
        match (body.token, body.id) {
            (Some(token), Some(id)) => Session::new(credentials, token, id),
            _ => {
                warn!(email = %credentials.email, "login response without token or id");
                None
            }
        }
    }

    /// POST /api/auth/signup. `true` only on 201.
    pub async fn signup<T>(&self, transport: &mut T, credentials: &Credentials, name: &str) -> bool
    where
        T: Transport + ?Sized,
    {
        let request = HttpRequest::post_json(
            "/api/auth/signup",
            "POST /api/auth/signup",
            &json!({
                "nombre": name,
                "email": credentials.email,
                "password": credentials.password,
            }),
        );
        self.executor.execute(transport, &request).await.is_status(201)
    }

    /// Login, or sign up and login once more. One signup and at most two
    /// logins per call.
    pub async fn ensure_auth<T>(
        &self,
        transport: &mut T,
        credentials: &Credentials,
        display_name: &str,
    ) -> Option<Session>
    where
        T: Transport + ?Sized,
    {
        if let Some(session) = self.login(transport, credentials).await {
            return Some(session);
        }

        info!(email = %credentials.email, "login failed, attempting signup");
        if !self.signup(transport, credentials, display_name).await {
            warn!(email = %credentials.email, "signup failed");
            return None;
        }

        info!(email = %credentials.email, "signup successful, retrying login");
        sleep(self.signup_settle).await;
        self.login(transport, credentials).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn empty_token_is_rejected() {
        let credentials = Credentials::new("a@mail.com", "pw");
        assert!(Session::new(&credentials, String::new(), 1).is_none());
        assert!(Session::new(&credentials, "  ".into(), 1).is_none());
        assert!(Session::new(&credentials, "T".into(), 1).is_some());
    }

    #[test]
    fn session_keeps_login_identity() {
        let credentials = Credentials::new("a@mail.com", "pw");
        let session = Session::new(&credentials, "T".into(), 9).unwrap();
        assert_eq!(session.email(), "a@mail.com");
        assert_eq!(session.token(), "T");
        assert_eq!(session.user_id(), 9);
    }

    #[test]
    fn empty_pool_picks_nothing() {
        let pool = SessionPool::new(Vec::new());
        let mut rng = StdRng::seed_from_u64(0);
        assert!(pool.is_empty());
        assert!(pool.pick(&mut rng).is_none());
    }

    #[test]
    fn credentials_accept_nombre_alias() {
        let raw = r#"{"email":"x@mail.com","password":"p","nombre":"Ana"}"#;
        let parsed: Credentials = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.display_name(), "Ana");
        assert_eq!(Credentials::new("y", "z").display_name(), DEFAULT_DISPLAY_NAME);
    }
}
