use crate::crypto::{self, DigestAlgorithm, HmacKey};
use crate::error::*;
use log::debug;
use std::fmt;
use std::str::FromStr;

/// Prefix of the HKDF `info` string used to derive Hawk credentials from Firefox Accounts
/// tokens.  The derivation context (such as `session`) is appended to this.
pub const KDF_INFO_PREFIX: &str = "identity.mozilla.com/picl/v1/";

/// Derivation context for session tokens.
pub const SESSION_TOKEN_CONTEXT: &str = "session";

/// Shortest session secret accepted for derivation, in bytes.
pub const MIN_SECRET_LENGTH: usize = 32;

// number of bytes each of the id and the key take in the derived output
const DERIVED_PART_LENGTH: usize = 32;

/// Hawk key.
///
/// While any sequence of bytes can be specified as a key, note that each digest algorithm has
/// a suggested key length, and that passwords should *not* be used as keys.  Keys of incorrect
/// length are handled according to the digest's implementation.
pub struct Key {
    key: Box<dyn HmacKey>,
    algorithm: DigestAlgorithm,
}

impl Key {
    pub fn new<B>(key: B, algorithm: DigestAlgorithm) -> Result<Key>
    where
        B: AsRef<[u8]>,
    {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(Error::InvalidCredentials("key is empty".to_string()));
        }
        Ok(Key {
            key: crypto::cryptographer().new_key(algorithm, key)?,
            algorithm,
        })
    }

    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(self.key.sign(data)?)
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Key")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// Hawk credentials: an ID and a key associated with that ID.  The digest algorithm
/// must be agreed between the server and the client, and the length of the key is
/// specific to that algorithm.
#[derive(Debug)]
pub struct Credentials {
    pub id: String,
    pub key: Key,
}

impl Credentials {
    /// Build credentials from an id, raw key bytes and an algorithm name (`sha1` or `sha256`).
    pub fn new<S, B>(id: S, key: B, algorithm: &str) -> Result<Credentials>
    where
        S: Into<String>,
        B: AsRef<[u8]>,
    {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidCredentials("id is empty".to_string()));
        }
        let algorithm = DigestAlgorithm::from_str(algorithm)?;
        Ok(Credentials {
            id,
            key: Key::new(key, algorithm)?,
        })
    }

    /// Derive credentials from a session secret under the given context.
    ///
    /// The secret is stretched with HKDF-SHA256 (empty salt, info
    /// `identity.mozilla.com/picl/v1/<context>`).  The first 32 output bytes, hex-encoded, are
    /// the id and the next 32 bytes are the SHA-256 key.  The same secret and context always
    /// give the same credentials.
    pub fn derive(secret: &SessionSecret, context: &str) -> Result<Credentials> {
        let derived = derive_bytes(secret, context)?;
        let (id, key) = derived.split_at(DERIVED_PART_LENGTH);
        debug!("derived Hawk credentials for context {:?}", context);
        Ok(Credentials {
            id: hex::encode(id),
            key: Key::new(key, DigestAlgorithm::Sha256)?,
        })
    }

    /// Derive credentials from a hex-encoded Firefox Accounts session token.
    pub fn from_session_token(token: &str) -> Result<Credentials> {
        let secret = SessionSecret::from_hex(token)?;
        Credentials::derive(&secret, SESSION_TOKEN_CONTEXT)
    }
}

/// Run the derivation and return the raw id and key bytes, concatenated.
pub(crate) fn derive_bytes(secret: &SessionSecret, context: &str) -> Result<Vec<u8>> {
    let len = secret.0.len();
    if len < MIN_SECRET_LENGTH {
        return Err(Error::InvalidSecretLength {
            min: MIN_SECRET_LENGTH,
            len,
        });
    }
    let info = format!("{}{}", KDF_INFO_PREFIX, context);
    let mut out = vec![0u8; 2 * DERIVED_PART_LENGTH];
    crypto::cryptographer().hkdf_sha256(&[], &secret.0, info.as_bytes(), &mut out)?;
    Ok(out)
}

/// A raw shared secret obtained from the identity store.
///
/// It is only ever used as input to [`Credentials::derive`] and is never transmitted.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionSecret(Vec<u8>);

impl SessionSecret {
    pub fn new<B: Into<Vec<u8>>>(bytes: B) -> Self {
        SessionSecret(bytes.into())
    }

    /// Decode a hex-encoded secret, as session tokens are delivered.
    pub fn from_hex(hex_secret: &str) -> Result<Self> {
        let bytes = hex::decode(hex_secret.trim())
            .map_err(|e| Error::InvalidCredentials(format!("session token: {}", e)))?;
        Ok(SessionSecret(bytes))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SessionSecret(<{} bytes>)", self.0.len())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const SESSION_TOKEN: &str = "a0a1a2a3a4a5a6a7a8a9aaabacadaeafb0b1b2b3b4b5b6b7b8b9babbbcbdbebf";

    #[test]
    fn test_new_sha256() {
        let key = vec![77u8; 32];
        assert!(Key::new(key, DigestAlgorithm::Sha256).is_ok());
    }

    #[test]
    fn test_new_sha256_bad_length() {
        let key = vec![0u8; 99];
        assert!(Key::new(key, DigestAlgorithm::Sha256).is_ok());
    }

    #[test]
    fn test_new_empty_key() {
        match Key::new(b"", DigestAlgorithm::Sha256) {
            Err(Error::InvalidCredentials(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_credentials_empty_id() {
        match Credentials::new("", "key", "sha256") {
            Err(Error::InvalidCredentials(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_credentials_unknown_algorithm() {
        match Credentials::new("id", "key", "md5") {
            Err(Error::UnsupportedAlgorithm(a)) => assert_eq!(a, "md5"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_session_token_vector() {
        let secret = SessionSecret::from_hex(SESSION_TOKEN).unwrap();
        let bytes = derive_bytes(&secret, SESSION_TOKEN_CONTEXT).unwrap();
        assert_eq!(
            hex::encode(&bytes[..32]),
            "639503a218ffbb62983e9628be5cd64a0438d0ae81b2b9dadeb900a83470bc6b"
        );
        assert_eq!(
            hex::encode(&bytes[32..]),
            "3a0188943837ab228fe74e759566d0e4837cbcc7494157aac4da82025b2811b2"
        );

        let creds = Credentials::from_session_token(SESSION_TOKEN).unwrap();
        assert_eq!(
            creds.id,
            "639503a218ffbb62983e9628be5cd64a0438d0ae81b2b9dadeb900a83470bc6b"
        );
        assert_eq!(creds.key.algorithm(), DigestAlgorithm::Sha256);
    }

    #[test]
    fn test_derive_deterministic() {
        let secret = SessionSecret::new(vec![7u8; 48]);
        let a = Credentials::derive(&secret, "oldsync").unwrap();
        let b = Credentials::derive(&secret, "oldsync").unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.key.sign(b"data").unwrap(), b.key.sign(b"data").unwrap());
    }

    #[test]
    fn test_derive_context_separation() {
        let secret = SessionSecret::new(vec![7u8; 32]);
        let session = derive_bytes(&secret, SESSION_TOKEN_CONTEXT).unwrap();
        let oldsync = derive_bytes(&secret, "oldsync").unwrap();
        assert!(session != oldsync);
    }

    #[test]
    fn test_derive_short_secret() {
        let secret = SessionSecret::new(vec![1u8; 16]);
        match Credentials::derive(&secret, SESSION_TOKEN_CONTEXT) {
            Err(Error::InvalidSecretLength { min, len }) => {
                assert_eq!(min, 32);
                assert_eq!(len, 16);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_derive_empty_secret() {
        let secret = SessionSecret::new(vec![]);
        assert!(secret.is_empty());
        assert!(Credentials::derive(&secret, SESSION_TOKEN_CONTEXT).is_err());
    }

    #[test]
    fn test_bad_hex_session_token() {
        match Credentials::from_session_token("not hex") {
            Err(Error::InvalidCredentials(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_secret_debug_redacted() {
        let secret = SessionSecret::from_hex(SESSION_TOKEN).unwrap();
        assert_eq!(format!("{:?}", secret), "SessionSecret(<32 bytes>)");
    }
}
