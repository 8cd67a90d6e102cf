use crate::config::Config;
use crate::context::Context;
use crate::credentials::Credentials;
use crate::error::*;
use crate::payload::PayloadHasher;
use crate::request::RequestBuilder;
use crate::transport::{HttpRequest, HttpResponse, Transport};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use url::Url;

const JSON_CONTENT_TYPE: &str = "application/json";

/// A request body for `HawkClient::request`.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Serialized to JSON and sent as `application/json`.
    Json(serde_json::Value),
    /// Sent as-is with the given content type.
    Text { content_type: String, body: String },
}

impl Payload {
    pub fn json<T: Serialize>(value: &T) -> Result<Payload> {
        Ok(Payload::Json(serde_json::to_value(value)?))
    }

    pub fn text<C: Into<String>, B: Into<String>>(content_type: C, body: B) -> Payload {
        Payload::Text {
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    fn into_parts(self) -> Result<(String, String)> {
        match self {
            Payload::Json(value) => Ok((JSON_CONTENT_TYPE.to_string(), serde_json::to_string(&value)?)),
            Payload::Text { content_type, body } => Ok((content_type, body)),
        }
    }
}

/// A Hawk-signing HTTP client geared towards JSON APIs.
///
/// Bodies are always covered by the payload hash, and the configured local time offset is
/// applied to every timestamp.
#[derive(Clone)]
pub struct HawkClient {
    transport: Arc<dyn Transport>,
    context: Context,
    ext: Option<String>,
}

impl HawkClient {
    pub fn new(transport: Arc<dyn Transport>, context: Context) -> Self {
        HawkClient {
            transport,
            context,
            ext: None,
        }
    }

    /// Build a client whose context uses the system clock, random nonces and the configured
    /// local time offset.
    pub fn from_config(config: &Config, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let context = Context::default().with_localtime_offset(config.localtime_offset_ms);
        Ok(HawkClient::new(transport, context))
    }

    /// Application-specific data to include in every request's MAC.
    pub fn with_ext<S: Into<String>>(mut self, ext: S) -> Self {
        self.ext = Some(ext.into());
        self
    }

    /// Make a Hawk-authenticated request.
    ///
    /// Any HTTP status is returned as a `HawkResponse`; only failing to get a response is an
    /// error.
    pub async fn request(
        &self,
        url: &Url,
        method: &str,
        credentials: &Credentials,
        payload: Option<Payload>,
    ) -> Result<HawkResponse> {
        let method = method.to_ascii_uppercase();
        let mut request = HttpRequest::new(method.as_str(), url.clone());

        let body = match payload {
            Some(payload) => Some(payload.into_parts()?),
            None => None,
        };
        let hash = match body {
            Some((ref content_type, ref body)) => Some(PayloadHasher::hash(
                content_type,
                credentials.key.algorithm(),
                body,
            )?),
            None => None,
        };

        let header = RequestBuilder::from_url(&method, url)?
            .hash(hash.as_deref())
            .ext(self.ext.as_deref())
            .request()
            .make_header(credentials, &self.context)?;
        request = request.header("Authorization", header.header_value().into_string());
        if let Some((content_type, body)) = body {
            request = request.header("Content-Type", content_type).body(body);
        }

        debug!("Hawk request {} {}", method, url);
        let response = self.transport.send(request).await?;
        debug!("Hawk response {} for {} {}", response.status, method, url);
        Ok(HawkResponse(response))
    }
}

/// The response to a `HawkClient` request.
#[derive(Debug, Clone, PartialEq)]
pub struct HawkResponse(HttpResponse);

impl HawkResponse {
    pub fn status(&self) -> u16 {
        self.0.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.0.header_value(name)
    }

    pub fn text(&self) -> String {
        self.0.text()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.0.body)?)
    }

    pub fn into_inner(self) -> HttpResponse {
        self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::{FixedNonce, ManualClock};
    use crate::header::Header;
    use async_trait::async_trait;
    use serde_json::json;
    use std::str::FromStr;
    use std::sync::Mutex;
    use std::time::{Duration, UNIX_EPOCH};

    /// Records the request and echoes its body back.
    #[derive(Default)]
    struct Echo(Mutex<Option<HttpRequest>>);

    #[async_trait]
    impl Transport for Echo {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            let body = request.body.clone().unwrap_or_default();
            *self.0.lock().unwrap() = Some(request);
            Ok(HttpResponse {
                status: 200,
                headers: vec![],
                body,
            })
        }
    }

    fn client(echo: Arc<Echo>, offset_ms: i64) -> HawkClient {
        let context = Context::new(
            Arc::new(ManualClock::new(UNIX_EPOCH + Duration::from_secs(1000))),
            Arc::new(FixedNonce("nonny".to_string())),
        )
        .with_localtime_offset(offset_ms);
        HawkClient::new(echo, context)
    }

    fn credentials() -> Credentials {
        Credentials::new("me", vec![99u8; 32], "sha256").unwrap()
    }

    #[tokio::test]
    async fn json_payload() {
        let echo = Arc::new(Echo::default());
        let url = Url::parse("https://example.com/foo").unwrap();
        let res = client(echo.clone(), 0)
            .request(
                &url,
                "post",
                &credentials(),
                Some(Payload::Json(json!({"foo": "bar"}))),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
        assert!(res.is_success());
        assert_eq!(res.json::<serde_json::Value>().unwrap(), json!({"foo": "bar"}));

        let sent = echo.0.lock().unwrap().take().unwrap();
        assert_eq!(sent.method, "POST");
        assert_eq!(sent.header_value("content-type"), Some("application/json"));
        let header = Header::from_str(sent.header_value("authorization").unwrap()).unwrap();
        assert_eq!(
            header.hash,
            Some(
                PayloadHasher::hash("application/json", credentials().key.algorithm(), "{\"foo\":\"bar\"}")
                    .unwrap()
            )
        );
    }

    #[tokio::test]
    async fn text_payload_and_ext() {
        let echo = Arc::new(Echo::default());
        let url = Url::parse("https://example.com/foo").unwrap();
        let res = client(echo.clone(), 0)
            .with_ext("some-ext")
            .request(
                &url,
                "PUT",
                &credentials(),
                Some(Payload::text("text/plain", "hello")),
            )
            .await
            .unwrap();
        assert_eq!(res.text(), "hello");
        let sent = echo.0.lock().unwrap().take().unwrap();
        let header = Header::from_str(sent.header_value("authorization").unwrap()).unwrap();
        assert_eq!(header.ext.as_deref(), Some("some-ext"));
        assert!(header.hash.is_some());
    }

    #[tokio::test]
    async fn localtime_offset_applied() {
        let echo = Arc::new(Echo::default());
        let url = Url::parse("https://example.com/foo").unwrap();
        client(echo.clone(), 20_000)
            .request(&url, "GET", &credentials(), None)
            .await
            .unwrap();
        let sent = echo.0.lock().unwrap().take().unwrap();
        let header = Header::from_str(sent.header_value("authorization").unwrap()).unwrap();
        assert_eq!(header.ts, UNIX_EPOCH + Duration::from_secs(1020));
        assert_eq!(header.hash, None);
        assert_eq!(sent.body, None);
    }
}
