use crate::context::Clock;
use crate::error::*;
use crate::token::{Token, TokenResponse};
use crate::transport::{HttpRequest, HttpResponse, Transport};
use log::{debug, info};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Client for the token server's BrowserID exchange endpoint.
///
/// A client only talks to the network; it never touches any cache.
#[derive(Clone)]
pub struct TokenServerClient {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl TokenServerClient {
    pub fn new(transport: Arc<dyn Transport>, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        TokenServerClient {
            transport,
            clock,
            timeout,
        }
    }

    /// Exchange a BrowserID assertion for a token, on behalf of `owner` (a normalized email).
    ///
    /// The token's expiration is the local time at which the response arrived plus the
    /// duration the server granted.
    pub async fn fetch_token(&self, url: &Url, assertion: &str, owner: &str) -> Result<Token> {
        info!("Fetching token from {}", url);
        let request = HttpRequest::new("GET", url.clone())
            .header("Authorization", format!("BrowserID {}", assertion))
            .header("Accept", "application/json");

        let response = tokio::time::timeout(self.timeout, self.transport.send(request)).await??;
        if response.status != 200 {
            let err = rejection(&response);
            info!("Token server rejected the assertion: {}", err);
            return Err(err);
        }

        let body: TokenResponse = serde_json::from_slice(&response.body)
            .map_err(|e| Error::MalformedResponse(e.to_string()))?;
        let token = Token::from_response(body, self.clock.now(), owner.to_string())?;
        debug!(
            "Got token {} for uid {} valid for {:?}",
            token.id(),
            token.uid(),
            token.duration()
        );
        Ok(token)
    }
}

#[derive(Debug, Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errno: Option<i64>,
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    description: Option<String>,
}

/// Build the error for a non-200 token server response.  Both the Firefox Accounts
/// (`code`/`errno`/`error`/`message`) and the token server (`errors[].description`) error
/// bodies are understood; anything else is reported verbatim.
fn rejection(response: &HttpResponse) -> Error {
    let body: ErrorBody = serde_json::from_slice(&response.body).unwrap_or_default();
    let errors = body.errors;
    let message = body
        .message
        .or_else(|| errors.into_iter().find_map(|e| e.description))
        .unwrap_or_else(|| response.text());
    Error::TokenExchangeRejected {
        status: response.status,
        message,
        code: body.code,
        errno: body.errno,
        error: body.error,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: vec![],
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn rejection_with_fxa_body() {
        match rejection(&response(
            401,
            r#"{"code": 401, "errno": 110, "error": "Unauthorized",
                "message": "Invalid authentication token"}"#,
        )) {
            Error::TokenExchangeRejected {
                status,
                message,
                code,
                errno,
                error,
            } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid authentication token");
                assert_eq!(code, Some(401));
                assert_eq!(errno, Some(110));
                assert_eq!(error.as_deref(), Some("Unauthorized"));
            }
            e => panic!("unexpected {:?}", e),
        }
    }

    #[test]
    fn rejection_with_token_server_body() {
        match rejection(&response(
            401,
            r#"{"status": "invalid-credentials", "errors": [{"location": "body", "name": "", "description": "Unauthorized"}]}"#,
        )) {
            Error::TokenExchangeRejected {
                message,
                code,
                errno,
                ..
            } => {
                assert_eq!(message, "Unauthorized");
                assert_eq!(code, None);
                assert_eq!(errno, None);
            }
            e => panic!("unexpected {:?}", e),
        }
    }

    #[test]
    fn rejection_with_plain_body() {
        match rejection(&response(503, "Service Unavailable")) {
            Error::TokenExchangeRejected {
                status, message, ..
            } => {
                assert_eq!(status, 503);
                assert_eq!(message, "Service Unavailable");
            }
            e => panic!("unexpected {:?}", e),
        }
    }
}
