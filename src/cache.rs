use crate::config::{Config, RetryPolicy};
use crate::context::Context;
use crate::error::*;
use crate::header::AuthorizationHeader;
use crate::identity::{IdentityProvider, IdentitySecret, SignedInIdentity};
use crate::payload::PayloadRef;
use crate::request::RequestBuilder;
use crate::token::Token;
use crate::tokenclient::TokenServerClient;
use crate::transport::Transport;
use futures::future::{self, AbortHandle, BoxFuture, FutureExt, Shared};
use log::{debug, error, info, warn};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;

type RefreshResult = std::result::Result<Arc<Token>, Arc<Error>>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshResult>>;

/// The condition of the cached token, as of the cache's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No token has been fetched, or the user signed out.
    Empty,
    /// A token is held and may be used.
    Valid,
    /// A token is held but its expiration has passed.
    Expired,
    /// A token is held but belongs to someone other than the signed-in user.
    Invalid,
}

/// Caches the token for the signed-in user and refreshes it when it expires.
///
/// Refreshes are coalesced: however many callers need a new token at once, the token server is
/// asked once and every caller gets that answer.  Cloning a `TokenCache` gives another handle
/// to the same cache.
#[derive(Clone)]
pub struct TokenCache {
    inner: Arc<Inner>,
}

struct Inner {
    client: TokenServerClient,
    identity: Arc<dyn IdentityProvider>,
    context: Context,
    url: Url,
    retry: RetryPolicy,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    token: Option<Arc<Token>>,
    /// Set when the held token turned out to belong to another account.
    invalidated: bool,
    /// Bumped on sign-out; a refresh started under an older generation may not store its
    /// result.
    generation: u64,
    /// Identifies each refresh so a finished one only clears its own `in_flight` entry.
    next_refresh: u64,
    in_flight: Option<InFlight>,
}

struct InFlight {
    id: u64,
    owner: String,
    future: SharedRefresh,
    abort: AbortHandle,
}

impl TokenCache {
    /// Build a cache for the configured token server.  The configured local time offset is
    /// applied to `context` for the Hawk timestamps of the headers this cache produces.
    pub fn new(
        config: &Config,
        transport: Arc<dyn Transport>,
        identity: Arc<dyn IdentityProvider>,
        context: Context,
    ) -> Result<TokenCache> {
        config.validate()?;
        let client = TokenServerClient::new(transport, context.clock(), config.request_timeout());
        let context = context.with_localtime_offset(config.localtime_offset_ms);
        Ok(TokenCache {
            inner: Arc::new(Inner {
                client,
                identity,
                context,
                url: config.token_server_url()?,
                retry: config.retry.clone(),
                state: Mutex::new(State::default()),
            }),
        })
    }

    /// Produce a Hawk `Authorization` header for the given request, using the cached token or a
    /// freshly fetched one.  When a payload is given, its hash is covered by the MAC.
    pub async fn auth_header(
        &self,
        method: &str,
        url: &Url,
        payload: Option<PayloadRef<'_>>,
    ) -> Result<AuthorizationHeader> {
        let token = self.token().await?;
        let hash = match payload {
            Some(payload) => Some(payload.hash(token.algorithm())?),
            None => None,
        };
        let header = RequestBuilder::from_url(method, url)?
            .hash(hash.as_deref())
            .request()
            .make_header(token.credentials(), &self.inner.context)?;
        Ok(header.header_value())
    }

    /// Return a valid token for the signed-in user, fetching one if needed.
    pub async fn token(&self) -> Result<Arc<Token>> {
        let identity = self.inner.signed_in_identity().await?;
        let owner = identity.normalized_email();
        if let Some(token) = self.inner.usable_token(&owner) {
            return Ok(token);
        }
        self.inner.clone().refresh_for(identity).await
    }

    /// Fetch a new token even if the current one is still valid.  Joins a refresh that is
    /// already in flight for the same user.
    pub async fn refresh(&self) -> Result<Arc<Token>> {
        let identity = self.inner.signed_in_identity().await?;
        self.inner.clone().refresh_for(identity).await
    }

    /// The held token, if any, whatever its state.
    pub fn current(&self) -> Option<Arc<Token>> {
        self.inner.lock().token.clone()
    }

    pub fn state(&self) -> CacheState {
        let now = self.inner.context.now();
        let guard = self.inner.lock();
        let state = &*guard;
        match state.token {
            None => CacheState::Empty,
            Some(_) if state.invalidated => CacheState::Invalid,
            Some(ref token) if token.is_expired(now) => CacheState::Expired,
            Some(_) => CacheState::Valid,
        }
    }

    /// Mark the held token unusable, for example after a storage server answered 401 to it.
    /// The next caller fetches a new one.
    pub fn invalidate(&self) {
        let mut state = self.inner.lock();
        if state.token.is_some() {
            debug!("Token invalidated");
            state.invalidated = true;
        }
    }

    /// Sign-out notification: cancel any refresh in flight and forget the token.  Callers
    /// waiting on the cancelled refresh fail with `NoValidToken`.
    pub fn on_sign_out(&self) {
        let mut state = self.inner.lock();
        state.generation += 1;
        state.token = None;
        state.invalidated = false;
        if let Some(in_flight) = state.in_flight.take() {
            in_flight.abort.abort();
        }
        info!("Signed out; token cache cleared");
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn signed_in_identity(&self) -> Result<SignedInIdentity> {
        match self.identity.signed_in_identity().await {
            Ok(Some(identity)) => Ok(identity),
            Ok(None) => Err(Error::NoValidToken {
                reason: "no signed-in user".to_string(),
                retryable: false,
            }),
            Err(e) => Err(Error::no_valid_token(&e)),
        }
    }

    /// The held token, if it is unexpired and belongs to `owner`.
    fn usable_token(&self, owner: &str) -> Option<Arc<Token>> {
        let now = self.context.now();
        let mut guard = self.lock();
        let state = &mut *guard;
        let token = state.token.clone()?;
        if state.invalidated {
            return None;
        }
        if token.owner() != owner {
            warn!("Signed-in user differs from the owner of the cached token");
            state.invalidated = true;
            return None;
        }
        if token.is_expired(now) {
            debug!("Cached token {} has expired", token.id());
            return None;
        }
        Some(token)
    }

    async fn refresh_for(self: Arc<Self>, identity: SignedInIdentity) -> Result<Arc<Token>> {
        let owner = identity.normalized_email();
        let assertion = match identity.secret {
            IdentitySecret::Assertion(assertion) => assertion,
            IdentitySecret::SessionToken(_) => {
                return Err(Error::NoValidToken {
                    reason: "signed-in user has no assertion for the token server".to_string(),
                    retryable: false,
                })
            }
        };

        let refresh = {
            let mut guard = self.lock();
            let state = &mut *guard;
            match state.in_flight {
                Some(ref in_flight) if in_flight.owner == owner => in_flight.future.clone(),
                _ => {
                    if let Some(stale) = state.in_flight.take() {
                        // a refresh for a different account must not land in the cache
                        stale.abort.abort();
                        state.generation += 1;
                    }
                    let generation = state.generation;
                    let id = state.next_refresh;
                    state.next_refresh += 1;

                    let inner = self.clone();
                    let run = AssertUnwindSafe(self.clone().run_refresh(
                        assertion,
                        owner.clone(),
                        generation,
                        id,
                    ))
                    .catch_unwind()
                    .map(move |result| match result {
                        Ok(result) => result,
                        Err(_) => {
                            // the next caller starts over rather than joining a poisoned refresh
                            error!("Token refresh panicked");
                            inner.clear_in_flight(id);
                            Err(Arc::new(Error::NoValidToken {
                                reason: "token refresh failed unexpectedly".to_string(),
                                retryable: false,
                            }))
                        }
                    });
                    let (refresh, abort) = future::abortable(run);
                    let refresh = refresh
                        .map(|result| match result {
                            Ok(result) => result,
                            Err(future::Aborted) => Err(Arc::new(Error::NoValidToken {
                                reason: "token refresh cancelled".to_string(),
                                retryable: false,
                            })),
                        })
                        .boxed()
                        .shared();
                    state.in_flight = Some(InFlight {
                        id,
                        owner,
                        future: refresh.clone(),
                        abort,
                    });
                    refresh
                }
            }
        };

        refresh.await.map_err(|e| match *e {
            Error::NoValidToken {
                ref reason,
                retryable,
            } => Error::NoValidToken {
                reason: reason.clone(),
                retryable,
            },
            ref cause => Error::no_valid_token(cause),
        })
    }

    async fn run_refresh(
        self: Arc<Self>,
        assertion: String,
        owner: String,
        generation: u64,
        id: u64,
    ) -> RefreshResult {
        let result = self.fetch_with_retry(&assertion, &owner).await;
        self.finish_refresh(result, generation, id)
    }

    fn clear_in_flight(&self, id: u64) {
        let mut state = self.lock();
        if state.in_flight.as_ref().map_or(false, |f| f.id == id) {
            state.in_flight = None;
        }
    }

    async fn fetch_with_retry(&self, assertion: &str, owner: &str) -> Result<Token> {
        let mut attempt = 1;
        loop {
            match self.client.fetch_token(&self.url, assertion, owner).await {
                Ok(token) => return Ok(token),
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        "Token fetch attempt {} failed: {}; retrying in {:?}",
                        attempt, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn finish_refresh(&self, result: Result<Token>, generation: u64, id: u64) -> RefreshResult {
        let mut state = self.lock();
        if state.in_flight.as_ref().map_or(false, |f| f.id == id) {
            state.in_flight = None;
        }
        if state.generation != generation {
            info!("Discarding token refresh that finished after sign-out");
            return Err(Arc::new(Error::NoValidToken {
                reason: "token refresh cancelled".to_string(),
                retryable: false,
            }));
        }
        match result {
            Ok(token) => {
                let token = Arc::new(token);
                state.token = Some(token.clone());
                state.invalidated = false;
                Ok(token)
            }
            Err(e) => {
                // the previous token, if any, stays in place
                warn!("Token refresh failed: {}", e);
                Err(Arc::new(e))
            }
        }
    }
}
