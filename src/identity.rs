use crate::credentials::SessionSecret;
use crate::error::*;
use async_trait::async_trait;
use std::fmt;

/// What a signed-in user can authenticate with.
#[derive(Clone, PartialEq)]
pub enum IdentitySecret {
    /// A BrowserID assertion, exchanged at the token server.
    Assertion(String),
    /// A Firefox Accounts session token, used to derive Hawk credentials directly.
    SessionToken(SessionSecret),
}

impl fmt::Debug for IdentitySecret {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IdentitySecret::Assertion(_) => f.write_str("Assertion(..)"),
            IdentitySecret::SessionToken(_) => f.write_str("SessionToken(..)"),
        }
    }
}

/// The currently signed-in user, as reported by the identity store.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedInIdentity {
    pub email: String,
    pub uid: String,
    pub secret: IdentitySecret,
}

impl SignedInIdentity {
    pub fn new<E, U>(email: E, uid: U, secret: IdentitySecret) -> Self
    where
        E: Into<String>,
        U: Into<String>,
    {
        SignedInIdentity {
            email: email.into(),
            uid: uid.into(),
            secret,
        }
    }

    /// The email, normalized for comparison.
    pub fn normalized_email(&self) -> String {
        normalize_email(&self.email)
    }
}

/// Supplier of the signed-in identity.  Returns `Ok(None)` when nobody is signed in.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn signed_in_identity(&self) -> Result<Option<SignedInIdentity>>;
}

/// Normalize an email for identity comparison: surrounding whitespace is dropped and ASCII
/// letters are lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}
