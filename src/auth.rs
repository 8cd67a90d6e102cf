use crate::cache::{CacheState, TokenCache};
use crate::context::Context;
use crate::credentials::{Credentials, SessionSecret, SESSION_TOKEN_CONTEXT};
use crate::error::*;
use crate::header::AuthorizationHeader;
use crate::identity::{IdentityProvider, IdentitySecret};
use crate::payload::PayloadRef;
use crate::request::RequestBuilder;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;

/// Whether an authenticator can sign a request right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Credentials are at hand; signing will not touch the network.
    Ready,
    /// A token has to be fetched before the next request can be signed.
    NeedsToken,
    /// There is nothing to sign with.
    SignedOut,
}

/// Something that can attach Hawk authorization to outgoing requests.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Compute the `Authorization` header value for a request.  When `payload` is given, its
    /// hash is included in the header and covered by the MAC.
    async fn auth_header(
        &self,
        method: &str,
        url: &Url,
        payload: Option<PayloadRef<'_>>,
    ) -> Result<AuthorizationHeader>;

    fn auth_state(&self) -> AuthState;
}

/// Signs with Hawk credentials known up front: either handed over directly, or derived from a
/// session token.
pub struct SharedSecretAuth {
    credentials: Mutex<Option<Arc<Credentials>>>,
    context: Context,
}

impl SharedSecretAuth {
    pub fn new(credentials: Credentials, context: Context) -> Self {
        SharedSecretAuth {
            credentials: Mutex::new(Some(Arc::new(credentials))),
            context,
        }
    }

    /// Derive credentials from a hex-encoded session token.
    pub fn from_session_token(session_token: &str, context: Context) -> Result<Self> {
        Ok(SharedSecretAuth::new(
            Credentials::from_session_token(session_token)?,
            context,
        ))
    }

    /// Replace the credentials, e.g. after a new session token arrives.
    pub fn set_credentials(&self, credentials: Credentials) {
        *self.lock() = Some(Arc::new(credentials));
    }

    /// Forget the credentials; later requests fail with `NoValidToken`.
    pub fn sign_out(&self) {
        info!("Signed out; shared-secret credentials cleared");
        *self.lock() = None;
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<Credentials>>> {
        self.credentials.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Sign a request with the given credentials.
fn signed_header(
    credentials: &Credentials,
    context: &Context,
    method: &str,
    url: &Url,
    payload: Option<PayloadRef<'_>>,
) -> Result<AuthorizationHeader> {
    let hash = match payload {
        Some(payload) => Some(payload.hash(credentials.key.algorithm())?),
        None => None,
    };
    let header = RequestBuilder::from_url(method, url)?
        .hash(hash.as_deref())
        .request()
        .make_header(credentials, context)?;
    Ok(header.header_value())
}

#[async_trait]
impl Authenticator for SharedSecretAuth {
    async fn auth_header(
        &self,
        method: &str,
        url: &Url,
        payload: Option<PayloadRef<'_>>,
    ) -> Result<AuthorizationHeader> {
        let credentials = self.lock().clone().ok_or_else(|| Error::NoValidToken {
            reason: "no credentials".to_string(),
            retryable: false,
        })?;
        signed_header(&credentials, &self.context, method, url, payload)
    }

    fn auth_state(&self) -> AuthState {
        if self.lock().is_some() {
            AuthState::Ready
        } else {
            AuthState::SignedOut
        }
    }
}

/// Signs with credentials derived from the signed-in user's session token.
///
/// The identity store is consulted on every request.  Derived credentials are reused while the
/// same account and session token stay signed in, and derived afresh when either changes.
pub struct SessionTokenAuth {
    identity: Arc<dyn IdentityProvider>,
    context: Context,
    derived: Mutex<Option<Derived>>,
}

struct Derived {
    owner: String,
    secret: SessionSecret,
    credentials: Arc<Credentials>,
}

impl SessionTokenAuth {
    pub fn new(identity: Arc<dyn IdentityProvider>, context: Context) -> Self {
        SessionTokenAuth {
            identity,
            context,
            derived: Mutex::new(None),
        }
    }

    /// Sign-out notification: forget the derived credentials.
    pub fn on_sign_out(&self) {
        info!("Signed out; derived credentials cleared");
        *self.lock() = None;
    }

    /// Credentials for the signed-in user, derived if not already held.
    pub async fn credentials(&self) -> Result<Arc<Credentials>> {
        let identity = match self.identity.signed_in_identity().await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                *self.lock() = None;
                return Err(Error::NoValidToken {
                    reason: "no signed-in user".to_string(),
                    retryable: false,
                });
            }
            Err(e) => return Err(Error::no_valid_token(&e)),
        };
        let owner = identity.normalized_email();
        let secret = match identity.secret {
            IdentitySecret::SessionToken(secret) => secret,
            IdentitySecret::Assertion(_) => {
                return Err(Error::NoValidToken {
                    reason: "signed-in user has no session token".to_string(),
                    retryable: false,
                })
            }
        };

        let mut derived = self.lock();
        match *derived {
            Some(ref d) if d.owner == owner && d.secret == secret => {
                return Ok(d.credentials.clone())
            }
            Some(ref d) if d.owner != owner => {
                warn!("Signed-in user changed; deriving new credentials");
            }
            _ => debug!("Deriving credentials from session token"),
        }
        let credentials = Arc::new(
            Credentials::derive(&secret, SESSION_TOKEN_CONTEXT)
                .map_err(|e| Error::no_valid_token(&e))?,
        );
        *derived = Some(Derived {
            owner,
            secret,
            credentials: credentials.clone(),
        });
        Ok(credentials)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Derived>> {
        self.derived.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Authenticator for SessionTokenAuth {
    async fn auth_header(
        &self,
        method: &str,
        url: &Url,
        payload: Option<PayloadRef<'_>>,
    ) -> Result<AuthorizationHeader> {
        let credentials = self.credentials().await?;
        signed_header(&credentials, &self.context, method, url, payload)
    }

    fn auth_state(&self) -> AuthState {
        if self.lock().is_some() {
            AuthState::Ready
        } else {
            AuthState::NeedsToken
        }
    }
}

/// Signs with tokens obtained from the token server in exchange for the signed-in user's
/// assertion.
#[derive(Clone)]
pub struct TokenServerAuth {
    cache: TokenCache,
}

impl TokenServerAuth {
    pub fn new(cache: TokenCache) -> Self {
        TokenServerAuth { cache }
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }
}

#[async_trait]
impl Authenticator for TokenServerAuth {
    async fn auth_header(
        &self,
        method: &str,
        url: &Url,
        payload: Option<PayloadRef<'_>>,
    ) -> Result<AuthorizationHeader> {
        self.cache.auth_header(method, url, payload).await
    }

    fn auth_state(&self) -> AuthState {
        match self.cache.state() {
            CacheState::Valid => AuthState::Ready,
            CacheState::Empty | CacheState::Expired | CacheState::Invalid => AuthState::NeedsToken,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::{FixedNonce, ManualClock};
    use crate::header::Header;
    use std::str::FromStr;
    use std::time::{Duration, UNIX_EPOCH};

    fn context() -> Context {
        Context::new(
            Arc::new(ManualClock::new(UNIX_EPOCH + Duration::from_secs(1000))),
            Arc::new(FixedNonce("nonny".to_string())),
        )
    }

    fn credentials() -> Credentials {
        Credentials::new("me", vec![99u8; 32], "sha256").unwrap()
    }

    #[tokio::test]
    async fn shared_secret_signs() {
        let auth = SharedSecretAuth::new(credentials(), context());
        assert_eq!(auth.auth_state(), AuthState::Ready);
        let url = Url::parse("https://example.com/foo").unwrap();
        let value = auth.auth_header("GET", &url, None).await.unwrap();
        let header = Header::from_str(value.field()).unwrap();
        let req = RequestBuilder::from_url("GET", &url).unwrap().request();
        assert!(req.validate_header(
            &header,
            &credentials().key,
            UNIX_EPOCH + Duration::from_secs(1000),
            Duration::from_secs(60)
        ));
    }

    #[tokio::test]
    async fn shared_secret_hashes_payload() {
        let auth = SharedSecretAuth::new(credentials(), context());
        let url = Url::parse("https://example.com/foo").unwrap();
        let payload = PayloadRef::new("text/plain", b"payload");
        let value = auth.auth_header("POST", &url, Some(payload)).await.unwrap();
        assert!(value
            .field()
            .contains("hash=\"XhAS2NNB0dCz3E04dKJH9NYKBwOcfcqu/18qQo5zZmU=\""));
    }

    #[tokio::test]
    async fn shared_secret_signed_out() {
        let auth = SharedSecretAuth::new(credentials(), context());
        auth.sign_out();
        assert_eq!(auth.auth_state(), AuthState::SignedOut);
        let url = Url::parse("https://example.com/foo").unwrap();
        match auth.auth_header("GET", &url, None).await {
            Err(Error::NoValidToken { .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
        auth.set_credentials(credentials());
        assert_eq!(auth.auth_state(), AuthState::Ready);
    }

    #[tokio::test]
    async fn session_token_credentials() {
        let auth = SharedSecretAuth::from_session_token(
            "a0a1a2a3a4a5a6a7a8a9aaabacadaeafb0b1b2b3b4b5b6b7b8b9babbbcbdbebf",
            context(),
        )
        .unwrap();
        let url = Url::parse("https://example.com/foo").unwrap();
        let value = auth.auth_header("GET", &url, None).await.unwrap();
        assert!(value.field().starts_with(
            "Hawk id=\"639503a218ffbb62983e9628be5cd64a0438d0ae81b2b9dadeb900a83470bc6b\""
        ));
    }

    #[test]
    fn bad_session_token() {
        match SharedSecretAuth::from_session_token("not hex", context()) {
            Err(Error::InvalidCredentials(_)) => {}
            Err(e) => panic!("unexpected {:?}", e),
            Ok(_) => panic!("expected an error"),
        }
    }
}
