use crate::context::Context;
use crate::credentials::{Credentials, Key};
use crate::error::*;
use crate::header::{AuthorizationHeader, Header};
use crate::mac::Mac;
use log::debug;
use std::time::{Duration, SystemTime};
use url::{Position, Url};

/// Request represents a single HTTP request.
///
/// The structure is created using (RequestBuilder)[struct.RequestBuilder.html]. Most uses of this
/// library will hold several of the fields in this structure fixed.  Cloning the structure with
/// these fields applied is a convenient way to avoid repeating those fields.  Most fields are
/// references, since in common use the values already exist and will outlive the request.
///
/// A request can be used on the client, to generate a header, or on the server, to validate one.
#[derive(Debug, Clone)]
pub struct Request<'a> {
    method: &'a str,
    host: &'a str,
    port: u16,
    path: &'a str,
    hash: Option<&'a [u8]>,
    ext: Option<&'a str>,
    app: Option<&'a str>,
    dlg: Option<&'a str>,
}

impl<'a> Request<'a> {
    /// Create a new Header for this request, taking the timestamp and nonce from the context.
    pub fn make_header(&self, credentials: &Credentials, context: &Context) -> Result<Header> {
        let nonce = context.nonce()?;
        self.make_header_full(credentials, context.timestamp(), nonce)
    }

    /// Similar to `make_header`, but allowing specification of the timestamp
    /// and nonce.
    pub fn make_header_full<S>(
        &self,
        credentials: &Credentials,
        ts: SystemTime,
        nonce: S,
    ) -> Result<Header>
    where
        S: Into<String>,
    {
        if credentials.id.is_empty() {
            return Err(Error::InvalidCredentials("id is empty".to_string()));
        }
        let nonce = nonce.into();
        let mac = Mac::new(
            &credentials.key,
            ts,
            &nonce,
            self.method,
            self.host,
            self.port,
            self.path,
            self.hash,
            self.ext,
            self.app,
            self.dlg,
        )?;
        debug!(
            "signed {} {}:{}{} for Hawk id {}",
            self.method, self.host, self.port, self.path, credentials.id
        );
        Header::new(
            credentials.id.clone(),
            ts,
            nonce,
            mac,
            self.ext.map(|v| v.to_string()),
            self.hash.map(|v| v.to_vec()),
            self.app.map(|v| v.to_string()),
            self.dlg.map(|v| v.to_string()),
        )
    }

    /// Validate the given header.  This validates that the `mac` field matches that calculated
    /// using the other header fields and the given request information.
    ///
    /// The header's timestamp is verified to be within `ts_skew` of `now`.
    ///
    /// If the request has a hash, the header must carry the same one; if the request does not,
    /// any hash in the header is still covered by the MAC.
    ///
    /// Nonces are not checked; a server wishing to prevent replays within the skew window must
    /// remember the nonces it has seen.
    pub fn validate_header(
        &self,
        header: &Header,
        key: &Key,
        now: SystemTime,
        ts_skew: Duration,
    ) -> bool {
        let calculated_mac = match Mac::new(
            key,
            header.ts,
            &header.nonce,
            self.method,
            self.host,
            self.port,
            self.path,
            header.hash.as_deref(),
            header.ext.as_deref(),
            header.app.as_deref(),
            header.dlg.as_deref(),
        ) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        if calculated_mac != header.mac {
            debug!("Hawk MAC mismatch for id {}", header.id);
            return false;
        }

        // ..then the hashes
        if let Some(local_hash) = self.hash {
            match header.hash {
                Some(ref server_hash) if local_hash == &server_hash[..] => {}
                _ => return false,
            }
        }

        // ..then the timestamp
        let skew = if now > header.ts {
            now.duration_since(header.ts).unwrap_or_default()
        } else {
            header.ts.duration_since(now).unwrap_or_default()
        };
        if skew > ts_skew {
            debug!("Hawk timestamp out of range by {:?}", skew);
            return false;
        }

        true
    }
}

#[derive(Debug, Clone)]
pub struct RequestBuilder<'a>(Request<'a>);

impl<'a> RequestBuilder<'a> {
    /// Create a new request with the given method, host, port, and path.
    pub fn new(method: &'a str, host: &'a str, port: u16, path: &'a str) -> Self {
        RequestBuilder(Request {
            method,
            host,
            port,
            path,
            hash: None,
            ext: None,
            app: None,
            dlg: None,
        })
    }

    /// Create a new request with the host, port, and path determined from the URL.
    ///
    /// The path includes the query string, if any.
    pub fn from_url(method: &'a str, url: &'a Url) -> Result<Self> {
        let (host, port, path) = RequestBuilder::parse_url(url)?;
        Ok(RequestBuilder(Request {
            method,
            host,
            port,
            path,
            hash: None,
            ext: None,
            app: None,
            dlg: None,
        }))
    }

    /// Set the request method. This should be a capitalized string.
    pub fn method(mut self, method: &'a str) -> Self {
        self.0.method = method;
        self
    }

    /// Set the URL path for the request.
    pub fn path(mut self, path: &'a str) -> Self {
        self.0.path = path;
        self
    }

    /// Set the URL hostname for the request
    pub fn host(mut self, host: &'a str) -> Self {
        self.0.host = host;
        self
    }

    /// Set the URL port for the request
    pub fn port(mut self, port: u16) -> Self {
        self.0.port = port;
        self
    }

    /// Set the hostname, port, and path for the request, from a string URL.
    pub fn url(self, url: &'a Url) -> Result<Self> {
        let (host, port, path) = RequestBuilder::parse_url(url)?;
        Ok(self.path(path).host(host).port(port))
    }

    /// Set the content hash for the request
    pub fn hash<H: Into<Option<&'a [u8]>>>(mut self, hash: H) -> Self {
        self.0.hash = hash.into();
        self
    }

    /// Set the `ext` Hawk property for the request
    pub fn ext<S: Into<Option<&'a str>>>(mut self, ext: S) -> Self {
        self.0.ext = ext.into();
        self
    }

    /// Set the `app` Hawk property for the request
    pub fn app<S: Into<Option<&'a str>>>(mut self, app: S) -> Self {
        self.0.app = app.into();
        self
    }

    /// Set the `dlg` Hawk property for the request
    pub fn dlg<S: Into<Option<&'a str>>>(mut self, dlg: S) -> Self {
        self.0.dlg = dlg.into();
        self
    }

    /// Get the request from this builder
    pub fn request(self) -> Request<'a> {
        self.0
    }

    fn parse_url(url: &'a Url) -> Result<(&'a str, u16, &'a str)> {
        let host = url
            .host_str()
            .ok_or_else(|| Error::InvalidUrl(format!("url {} has no host", url)))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| Error::InvalidUrl(format!("url {} has no port", url)))?;
        let path = &url[Position::BeforePath..Position::AfterQuery];
        Ok((host, port, path))
    }
}

/// Sign a single request, producing the complete `Authorization` header value.
///
/// This is the one-shot form of `RequestBuilder` + `make_header_full`, with the timestamp and
/// nonce supplied by the caller.
#[allow(clippy::too_many_arguments)]
pub fn sign(
    credentials: &Credentials,
    method: &str,
    url: &Url,
    ts: SystemTime,
    nonce: &str,
    payload_hash: Option<&[u8]>,
    ext: Option<&str>,
) -> Result<AuthorizationHeader> {
    let header = RequestBuilder::from_url(method, url)?
        .hash(payload_hash)
        .ext(ext)
        .request()
        .make_header_full(credentials, ts, nonce)?;
    Ok(header.header_value())
}
