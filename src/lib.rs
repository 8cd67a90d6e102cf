//! This crate provides Hawk request signing and token-server session management for Firefox
//! Accounts and Sync.
//!
//! It covers four concerns:
//!
//! * deriving Hawk credentials from a session secret ([`Credentials::derive`]),
//! * signing requests with the Hawk scheme ([`RequestBuilder`], [`sign`]),
//! * exchanging a BrowserID assertion for a storage token ([`TokenServerClient`]),
//! * caching that token and refreshing it when it expires ([`TokenCache`]).
//!
//! # Examples
//!
//! ## Hawk Client
//!
//! ```
//! use hawk_session::{Context, Credentials, Header, RequestBuilder};
//! use std::str::FromStr;
//! use url::Url;
//!
//! fn main() -> hawk_session::Result<()> {
//!     // provide the Hawk id and key
//!     let credentials = Credentials::new("test-client", "no-secret", "sha256")?;
//!
//!     // provide the details of the request to be authorized
//!     let url = Url::parse("https://example.com/foo?bar=1")?;
//!     let request = RequestBuilder::from_url("GET", &url)?.request();
//!
//!     // get the resulting header, including the calculated MAC; the default context uses the
//!     // system clock and random nonces
//!     let header = request.make_header(&credentials, &Context::default())?;
//!
//!     // the value to send in the Authorization header
//!     let value = header.header_value();
//!     assert!(value.field().starts_with("Hawk id=\"test-client\", ts=\""));
//!
//!     // a server parses the header and validates it against the same request
//!     let parsed = Header::from_str(value.field())?;
//!     assert!(request.validate_header(
//!         &parsed,
//!         &credentials.key,
//!         std::time::SystemTime::now(),
//!         std::time::Duration::from_secs(60),
//!     ));
//!     Ok(())
//! }
//! ```
//!
//! ## Session token credentials
//!
//! ```
//! use hawk_session::Credentials;
//!
//! let credentials = Credentials::from_session_token(
//!     "a0a1a2a3a4a5a6a7a8a9aaabacadaeafb0b1b2b3b4b5b6b7b8b9babbbcbdbebf",
//! ).unwrap();
//! assert_eq!(
//!     credentials.id,
//!     "639503a218ffbb62983e9628be5cd64a0438d0ae81b2b9dadeb900a83470bc6b",
//! );
//! ```
//!
//! ## Token server sessions
//!
//! A [`TokenCache`] is built from a [`Config`], a [`Transport`] and an [`IdentityProvider`].
//! Wrapped in a [`TokenServerAuth`] and handed to a [`RequestSigner`], it signs request
//! descriptors with a token it fetches, caches and refreshes on its own.

mod auth;
pub use crate::auth::{
    AuthState, Authenticator, SessionTokenAuth, SharedSecretAuth, TokenServerAuth,
};

mod cache;
pub use crate::cache::{CacheState, TokenCache};

mod client;
pub use crate::client::{HawkClient, HawkResponse, Payload};

mod config;
pub use crate::config::{Config, RetryPolicy, DEFAULT_TOKEN_SERVER_URL};

mod context;
pub use crate::context::{
    Clock, Context, FixedNonce, ManualClock, NonceSource, RandomNonce, SystemClock,
};

mod credentials;
pub use crate::credentials::{
    Credentials, Key, SessionSecret, KDF_INFO_PREFIX, MIN_SECRET_LENGTH, SESSION_TOKEN_CONTEXT,
};

pub mod crypto;
pub use crate::crypto::DigestAlgorithm;

mod error;
pub use crate::error::*;

mod header;
pub use crate::header::{AuthorizationHeader, Header};

mod identity;
pub use crate::identity::{normalize_email, IdentityProvider, IdentitySecret, SignedInIdentity};

mod mac;
pub use crate::mac::Mac;

mod payload;
pub use crate::payload::{PayloadHasher, PayloadRef};

mod request;
pub use crate::request::{sign, Request, RequestBuilder};

mod sign;
pub use crate::sign::{RequestDescriptor, RequestSigner, AUTHORIZATION};

mod token;
pub use crate::token::{Token, TokenResponse, Uid};

mod tokenclient;
pub use crate::tokenclient::TokenServerClient;

mod transport;
pub use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
