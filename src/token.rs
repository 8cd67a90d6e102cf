use crate::credentials::Credentials;
use crate::crypto::DigestAlgorithm;
use crate::error::*;
use serde::Deserialize;
use std::fmt;
use std::time::{Duration, SystemTime};
use url::Url;

/// A scoped, time-limited storage token issued by the token server.
///
/// A token is never mutated once built; the cache replaces it whole.
pub struct Token {
    credentials: Credentials,
    uid: String,
    endpoint: Option<Url>,
    duration: Duration,
    expiration: SystemTime,
    owner: String,
}

impl Token {
    /// Build a token from a token server response received at `received`, on behalf of the
    /// (normalized) email address `owner`.
    pub fn from_response(
        response: TokenResponse,
        received: SystemTime,
        owner: String,
    ) -> Result<Token> {
        let algorithm = match response.hashalg {
            Some(ref name) => name.parse()?,
            None => DigestAlgorithm::Sha256,
        };
        if response.id.is_empty() {
            return Err(Error::MalformedResponse("token id is empty".to_string()));
        }
        if response.key.is_empty() {
            return Err(Error::MalformedResponse("token key is empty".to_string()));
        }
        let credentials = Credentials::new(response.id, response.key.as_bytes(), algorithm.name())?;
        let endpoint = match response.api_endpoint.or(response.endpoint) {
            Some(ref s) => Some(Url::parse(s).map_err(|e| {
                Error::MalformedResponse(format!("invalid endpoint {:?}: {}", s, e))
            })?),
            None => None,
        };
        let duration_secs = response.duration;
        let duration = Duration::from_secs(duration_secs);
        let expiration = received.checked_add(duration).ok_or_else(|| {
            Error::MalformedResponse(format!("duration {} is out of range", duration_secs))
        })?;
        Ok(Token {
            credentials,
            uid: response.uid.to_string(),
            endpoint,
            duration,
            expiration,
            owner,
        })
    }

    /// Hawk credentials for signing requests with this token.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn id(&self) -> &str {
        &self.credentials.id
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.credentials.key.algorithm()
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// The storage endpoint this token is scoped to, if the server supplied one.
    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn expiration(&self) -> SystemTime {
        self.expiration
    }

    /// Normalized email of the identity this token was fetched for.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// A token is expired once `now` is strictly past its expiration.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expiration < now
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.credentials.id)
            .field("uid", &self.uid)
            .field("endpoint", &self.endpoint.as_ref().map(Url::as_str))
            .field("duration", &self.duration)
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// The JSON body of a successful token server response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub id: String,
    pub key: String,
    pub uid: Uid,
    pub duration: u64,
    #[serde(default)]
    pub api_endpoint: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub hashalg: Option<String>,
}

/// Token server uids have been both numbers and strings over time.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Uid {
    Number(u64),
    Text(String),
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Uid::Number(n) => write!(f, "{}", n),
            Uid::Text(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn response(json: &str) -> TokenResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn expiry_boundary() {
        let t0 = UNIX_EPOCH + Duration::from_secs(1_000_000);
        let token = Token::from_response(
            response(r#"{"id": "tid", "key": "tkey", "uid": 42, "duration": 300}"#),
            t0,
            "user@example.com".to_string(),
        )
        .unwrap();
        assert_eq!(token.expiration(), t0 + Duration::from_secs(300));
        assert!(!token.is_expired(t0 + Duration::from_secs(299)));
        assert!(!token.is_expired(t0 + Duration::from_secs(300)));
        assert!(token.is_expired(t0 + Duration::from_secs(301)));
    }

    #[test]
    fn fields() {
        let token = Token::from_response(
            response(
                r#"{"id": "tid", "key": "tkey", "uid": "abc", "duration": 60,
                    "api_endpoint": "https://db.example.com/1.5/abc", "hashalg": "sha1"}"#,
            ),
            UNIX_EPOCH,
            "u@example.com".to_string(),
        )
        .unwrap();
        assert_eq!(token.id(), "tid");
        assert_eq!(token.uid(), "abc");
        assert_eq!(token.algorithm(), DigestAlgorithm::Sha1);
        assert_eq!(
            token.endpoint().map(Url::as_str),
            Some("https://db.example.com/1.5/abc")
        );
        assert_eq!(token.owner(), "u@example.com");
        assert_eq!(token.duration(), Duration::from_secs(60));
    }

    #[test]
    fn endpoint_alias() {
        let token = Token::from_response(
            response(
                r#"{"id": "tid", "key": "tkey", "uid": 1, "duration": 60,
                    "endpoint": "https://db.example.com/"}"#,
            ),
            UNIX_EPOCH,
            String::new(),
        )
        .unwrap();
        assert_eq!(
            token.endpoint().map(Url::as_str),
            Some("https://db.example.com/")
        );
    }

    #[test]
    fn bad_hashalg() {
        let err = Token::from_response(
            response(r#"{"id": "tid", "key": "tkey", "uid": 1, "duration": 60, "hashalg": "md5"}"#),
            UNIX_EPOCH,
            String::new(),
        )
        .unwrap_err();
        match err {
            Error::UnsupportedAlgorithm(_) => {}
            e => panic!("unexpected {:?}", e),
        }
    }

    #[test]
    fn empty_key() {
        let err = Token::from_response(
            response(r#"{"id": "tid", "key": "", "uid": 1, "duration": 60}"#),
            UNIX_EPOCH,
            String::new(),
        )
        .unwrap_err();
        match err {
            Error::MalformedResponse(_) => {}
            e => panic!("unexpected {:?}", e),
        }
    }

    #[test]
    fn huge_duration() {
        let err = Token::from_response(
            response(r#"{"id": "tid", "key": "tkey", "uid": 1, "duration": 18446744073709551615}"#),
            UNIX_EPOCH + Duration::from_secs(1_000_000),
            String::new(),
        )
        .unwrap_err();
        match err {
            Error::MalformedResponse(msg) => assert!(msg.contains("out of range"), "{}", msg),
            e => panic!("unexpected {:?}", e),
        }
    }

    #[test]
    fn debug_hides_key() {
        let token = Token::from_response(
            response(r#"{"id": "tid", "key": "supersecret", "uid": 1, "duration": 60}"#),
            UNIX_EPOCH,
            String::new(),
        )
        .unwrap();
        assert!(!format!("{:?}", token).contains("supersecret"));
    }
}
