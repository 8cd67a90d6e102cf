use crate::crypto::CryptoError;
use failure::Fail;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Fail, Debug)]
pub enum Error {
    #[fail(display = "Invalid Hawk credentials: {}", _0)]
    InvalidCredentials(String),

    #[fail(display = "Unsupported digest algorithm: {}", _0)]
    UnsupportedAlgorithm(String),

    #[fail(
        display = "Session secret must be at least {} bytes, got {}",
        min, len
    )]
    InvalidSecretLength { min: usize, len: usize },

    #[fail(display = "Unparseable Hawk header: {}", _0)]
    HeaderParseError(String),

    #[fail(display = "Hawk header components cannot contain `\"` or `\\`: {}", _0)]
    HeaderComponent(String),

    #[fail(display = "Invalid url: {}", _0)]
    InvalidUrl(String),

    #[fail(display = "Transport error: {}", _0)]
    Transport(String),

    #[fail(display = "Token exchange rejected with status {}: {}", status, message)]
    TokenExchangeRejected {
        status: u16,
        message: String,
        /// HTTP status echoed in a Firefox Accounts error body.
        code: Option<i64>,
        errno: Option<i64>,
        /// Short error name, e.g. `Unauthorized`.
        error: Option<String>,
    },

    #[fail(display = "Malformed token server response: {}", _0)]
    MalformedResponse(String),

    #[fail(display = "No valid token available: {}", reason)]
    NoValidToken { reason: String, retryable: bool },

    #[fail(display = "Invalid configuration: {}", _0)]
    Config(String),

    #[fail(display = "{}", _0)]
    Crypto(#[fail(cause)] CryptoError),

    #[fail(display = "Base64 Decode error: {}", _0)]
    Decode(#[fail(cause)] base64::DecodeError),

    #[fail(display = "Hex decode error: {}", _0)]
    Hex(#[fail(cause)] hex::FromHexError),

    #[fail(display = "JSON error: {}", _0)]
    Json(#[fail(cause)] serde_json::Error),

    #[fail(display = "RNG error: {}", _0)]
    Rng(#[fail(cause)] rand::Error),

    #[fail(display = "IO error: {}", _0)]
    Io(#[fail(cause)] std::io::Error),
}

impl Error {
    /// Build a `NoValidToken` error describing why a token could not be produced.  The
    /// retryability of the underlying failure is carried over.
    pub fn no_valid_token(cause: &Error) -> Self {
        Error::NoValidToken {
            reason: cause.to_string(),
            retryable: cause.is_retryable(),
        }
    }

    /// Whether the failed operation may succeed if attempted again later.
    ///
    /// Network failures are retryable; local validation failures and server rejections are
    /// not, and generally call for re-authentication or a configuration fix.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::NoValidToken { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

impl From<CryptoError> for Error {
    fn from(e: CryptoError) -> Self {
        Error::Crypto(e)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::Decode(e)
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::Hex(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<rand::Error> for Error {
    fn from(e: rand::Error) -> Self {
        Error::Rng(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::InvalidUrl(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::Transport("request timed out".to_string())
    }
}
