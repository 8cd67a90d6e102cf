use crate::auth::Authenticator;
use crate::config::Config;
use crate::error::*;
use crate::payload::PayloadRef;
use crate::transport::HttpRequest;
use log::debug;
use std::sync::Arc;
use url::Url;

/// Name of the header carrying Hawk authorization.
pub const AUTHORIZATION: &str = "authorization";

/// A transport-agnostic description of an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub content_type: Option<String>,
}

impl RequestDescriptor {
    pub fn new<S: Into<String>>(method: S, url: Url) -> Self {
        RequestDescriptor {
            method: method.into(),
            url,
            headers: vec![],
            body: None,
            content_type: None,
        }
    }

    pub fn header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body<C, B>(mut self, content_type: C, body: B) -> Self
    where
        C: Into<String>,
        B: Into<Vec<u8>>,
    {
        self.content_type = Some(content_type.into());
        self.body = Some(body.into());
        self
    }

    /// The `authorization` header, if one has been attached.
    pub fn authorization(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(AUTHORIZATION))
            .map(|(_, v)| v.as_str())
    }

    /// Turn this into a request for a `Transport`, adding `Content-Type` when there is a body.
    pub fn into_http_request(self) -> HttpRequest {
        let mut request = HttpRequest::new(self.method, self.url);
        request.headers = self.headers;
        if let Some(content_type) = self.content_type {
            request.headers.push(("Content-Type".to_string(), content_type));
        }
        request.body = self.body;
        request
    }
}

/// Attaches Hawk authorization to request descriptors, using whichever `Authenticator` it was
/// built with.
#[derive(Clone)]
pub struct RequestSigner {
    authenticator: Arc<dyn Authenticator>,
    hash_payloads: bool,
}

impl RequestSigner {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        RequestSigner {
            authenticator,
            hash_payloads: true,
        }
    }

    /// A signer that hashes payloads as the configuration says.
    pub fn from_config(config: &Config, authenticator: Arc<dyn Authenticator>) -> Self {
        RequestSigner::new(authenticator).hash_payloads(config.hash_payloads)
    }

    /// Whether request bodies are covered by the Hawk payload hash.  On by default.
    pub fn hash_payloads(mut self, hash_payloads: bool) -> Self {
        self.hash_payloads = hash_payloads;
        self
    }

    pub fn authenticator(&self) -> &Arc<dyn Authenticator> {
        &self.authenticator
    }

    /// Return the descriptor with an `authorization` header attached, replacing any that was
    /// already there.
    pub async fn authorize(&self, mut request: RequestDescriptor) -> Result<RequestDescriptor> {
        let payload = match (self.hash_payloads, &request.body) {
            (true, Some(body)) => Some(PayloadRef::new(
                request.content_type.as_deref().unwrap_or(""),
                body,
            )),
            _ => None,
        };
        let header = self
            .authenticator
            .auth_header(&request.method, &request.url, payload)
            .await?;
        debug!("authorized {} {}", request.method, request.url);
        request
            .headers
            .retain(|(k, _)| !k.eq_ignore_ascii_case(AUTHORIZATION));
        request
            .headers
            .push((AUTHORIZATION.to_string(), header.into_string()));
        Ok(request)
    }
}
