use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::expiry::ExpiryParser;
use super::gateway::AuthGateway;
use super::types::{BasicCredential, Token, TokenPair};
use crate::error::AuthError;

/// Outcome of one login or refresh, awaited by every caller that needed it
type Flight = Shared<BoxFuture<'static, Result<String, AuthError>>>;

/// How a missing or expired access token gets replaced
enum Grant {
    Refresh(String),
    Login,
}

impl Grant {
    fn label(&self) -> &'static str {
        match self {
            Grant::Refresh(_) => "refresh",
            Grant::Login => "login",
        }
    }
}

#[derive(Default)]
struct TokenCache {
    access: Option<Token>,
    refresh: Option<Token>,
    /// Acquisition currently running, tagged with its generation
    in_flight: Option<(u64, Flight)>,
    next_flight: u64,
}

impl TokenCache {
    /// Drop the in-flight marker if it still belongs to flight `id`
    fn retire(&mut self, id: u64) {
        if matches!(self.in_flight, Some((current, _)) if current == id) {
            self.in_flight = None;
        }
    }
}

struct Inner {
    credential: BasicCredential,
    gateway: Option<Arc<dyn AuthGateway>>,
    parser: ExpiryParser,
    cache: Mutex<TokenCache>,
}

/// Credential manager
/// Hands out bearer tokens, reusing the cached access token while it is valid
/// and otherwise refreshing or logging in. Concurrent callers share a single
/// login/refresh call and its outcome.
///
/// Cloning yields another handle to the same cache.
#[derive(Clone)]
pub struct CredentialManager {
    inner: Arc<Inner>,
}

impl CredentialManager {
    /// Create a manager bound to an auth gateway
    pub fn new(gateway: Arc<dyn AuthGateway>, credential: BasicCredential) -> Self {
        Self::from_parts(Some(gateway), credential, ExpiryParser::new())
    }

    /// Create a manager with no gateway; every token request fails with
    /// [`AuthError::Unconfigured`]
    pub fn unconfigured(credential: BasicCredential) -> Self {
        Self::from_parts(None, credential, ExpiryParser::new())
    }

    pub fn from_parts(
        gateway: Option<Arc<dyn AuthGateway>>,
        credential: BasicCredential,
        parser: ExpiryParser,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                credential,
                gateway,
                parser,
                cache: Mutex::new(TokenCache::default()),
            }),
        }
    }

    /// Seed the cache directly (tests only)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn prime_for_testing(&self, access: Option<Token>, refresh: Option<Token>) {
        let mut cache = self.inner.lock();
        cache.access = access;
        cache.refresh = refresh;
    }

    pub fn username(&self) -> &str {
        self.inner.credential.username()
    }

    pub fn is_configured(&self) -> bool {
        self.inner.gateway.is_some()
    }

    pub fn cached_access(&self) -> Option<Token> {
        self.inner.lock().access.clone()
    }

    pub fn cached_refresh(&self) -> Option<Token> {
        self.inner.lock().refresh.clone()
    }

    /// Get a bearer token valid right now, refreshing or logging in if needed
    pub async fn bearer_token(&self) -> Result<String, AuthError> {
        let gateway = self.inner.gateway.clone().ok_or(AuthError::Unconfigured)?;

        let flight = {
            let mut cache = self.inner.lock();
            let now = Utc::now();

            if let Some(access) = cache.access.as_ref().filter(|t| t.is_valid_at(now)) {
                return Ok(access.value().to_string());
            }

            let joined = cache.in_flight.as_ref().map(|(_, flight)| flight.clone());
            match joined {
                Some(flight) => {
                    tracing::debug!("Joining in-flight token acquisition");
                    flight
                }
                None => {
                    let grant = match cache.refresh.as_ref().filter(|t| t.is_valid_at(now)) {
                        Some(refresh) => Grant::Refresh(refresh.value().to_string()),
                        None => Grant::Login,
                    };

                    let id = cache.next_flight;
                    cache.next_flight += 1;

                    let flight = Inner::start(Arc::clone(&self.inner), gateway, id, grant);
                    cache.in_flight = Some((id, flight.clone()));
                    flight
                }
            }
        };

        flight.await
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, TokenCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the acquisition on its own task so that callers giving up early
    /// do not cancel it for the others
    fn start(inner: Arc<Inner>, gateway: Arc<dyn AuthGateway>, id: u64, grant: Grant) -> Flight {
        let task = tokio::spawn(async move {
            let _guard = FlightGuard { inner: &inner, id };
            inner.acquire(gateway.as_ref(), id, grant).await
        });

        async move {
            task.await
                .unwrap_or_else(|e| Err(AuthError::Aborted(e.to_string())))
        }
        .boxed()
        .shared()
    }

    async fn acquire(
        &self,
        gateway: &dyn AuthGateway,
        id: u64,
        grant: Grant,
    ) -> Result<String, AuthError> {
        let label = grant.label();
        let refreshing = matches!(grant, Grant::Refresh(_));

        let response = match grant {
            Grant::Refresh(refresh_token) => {
                tracing::debug!("Access token missing or expired, refreshing");
                gateway.refresh(&refresh_token).await.map(Some)
            }
            Grant::Login => {
                tracing::debug!(
                    username = %self.credential.username(),
                    "No usable refresh token, logging in"
                );
                gateway.login(&self.credential).await
            }
        };

        // A refresh token rotated by the service replaces the one just spent,
        // even when the rest of the response is unusable
        let rotated = match &response {
            Ok(Some(pair)) if refreshing => {
                pair.refresh().and_then(|raw| self.parser.parse(raw))
            }
            _ => None,
        };

        let outcome = response
            .map_err(AuthError::from)
            .and_then(|pair| self.parse_pair(label, pair));

        // Publish the result and retire the flight in one step
        let mut cache = self.lock();
        cache.retire(id);

        let (access, refresh) = match outcome {
            Ok(pair) => pair,
            Err(err) => {
                if let (AuthError::ProtocolViolation(_), Some(rotated)) = (&err, rotated) {
                    cache.access = None;
                    cache.refresh = Some(rotated);
                }
                return Err(err);
            }
        };

        tracing::info!(
            "Obtained new access token via {}, expires: {}",
            label,
            access.expires_at().to_rfc3339()
        );

        let bearer = access.value().to_string();
        cache.access = Some(access);
        cache.refresh = refresh;
        Ok(bearer)
    }

    /// Validate a gateway response into the pair that replaces the cache
    fn parse_pair(
        &self,
        label: &str,
        pair: Option<TokenPair>,
    ) -> Result<(Token, Option<Token>), AuthError> {
        let pair = pair.ok_or_else(|| {
            AuthError::ProtocolViolation(format!("{} response carried no token pair", label))
        })?;

        let access = pair
            .access()
            .ok_or_else(|| {
                AuthError::ProtocolViolation(format!("{} response carried no access token", label))
            })
            .and_then(|raw| {
                self.parser
                    .parse_verified(raw)
                    .map_err(|e| AuthError::ProtocolViolation(e.to_string()))
            })?
            .ok_or_else(|| {
                AuthError::ProtocolViolation(format!("{} response carried no access token", label))
            })?;

        // Refresh tokens may be opaque; they are only trusted for their expiry
        let refresh = pair.refresh().and_then(|raw| self.parser.parse(raw));

        Ok((access, refresh))
    }

    fn finish_flight(&self, id: u64) {
        self.lock().retire(id);
    }
}

/// Clears the in-flight marker if the acquisition task ends abnormally
struct FlightGuard<'a> {
    inner: &'a Inner,
    id: u64,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.inner.finish_flight(self.id);
    }
}
