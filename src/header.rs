use crate::error::*;
use crate::mac::Mac;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Representation of a Hawk `Authorization` header value (the attribute list, without the
/// `Hawk ` scheme prefix).
///
/// Headers are produced by [`Request::make_header`](crate::Request::make_header) on the
/// client and parsed with `FromStr` on the server.
#[derive(Clone, PartialEq, Debug)]
pub struct Header {
    pub id: String,
    pub ts: SystemTime,
    pub nonce: String,
    pub mac: Mac,
    pub ext: Option<String>,
    pub hash: Option<Vec<u8>>,
    pub app: Option<String>,
    pub dlg: Option<String>,
}

impl Header {
    /// Create a new Header with the full set of Hawk fields.
    ///
    /// None of the string components can contain `"` or `\`; such values produce a
    /// `HeaderComponent` error.
    #[allow(clippy::too_many_arguments)]
    pub fn new<S>(
        id: S,
        ts: SystemTime,
        nonce: S,
        mac: Mac,
        ext: Option<S>,
        hash: Option<Vec<u8>>,
        app: Option<S>,
        dlg: Option<S>,
    ) -> Result<Header>
    where
        S: Into<String>,
    {
        Ok(Header {
            id: Header::check_component(id)?,
            ts,
            nonce: Header::check_component(nonce)?,
            mac,
            ext: Header::check_optional(ext)?,
            hash,
            app: Header::check_optional(app)?,
            dlg: Header::check_optional(dlg)?,
        })
    }

    /// Check a header component for validity.
    fn check_component<S>(value: S) -> Result<String>
    where
        S: Into<String>,
    {
        let value = value.into();
        if value.contains('"') || value.contains('\\') {
            return Err(Error::HeaderComponent(value));
        }
        Ok(value)
    }

    fn check_optional<S>(value: Option<S>) -> Result<Option<String>>
    where
        S: Into<String>,
    {
        match value {
            Some(v) => Ok(Some(Header::check_component(v)?)),
            None => Ok(None),
        }
    }

    /// Format the header for transmission in an Authorization header, including the `Hawk `
    /// prefix.
    pub fn header_value(&self) -> AuthorizationHeader {
        AuthorizationHeader(format!("Hawk {}", self))
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "id=\"{}\", ts=\"{}\", nonce=\"{}\", mac=\"{}\"",
            self.id,
            self.ts
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            self.nonce,
            base64::encode(self.mac.as_ref()),
        )?;
        if let Some(ref ext) = self.ext {
            write!(f, ", ext=\"{}\"", ext)?;
        }
        if let Some(ref hash) = self.hash {
            write!(f, ", hash=\"{}\"", base64::encode(hash))?;
        }
        if let Some(ref app) = self.app {
            write!(f, ", app=\"{}\"", app)?;
        }
        if let Some(ref dlg) = self.dlg {
            write!(f, ", dlg=\"{}\"", dlg)?;
        }
        Ok(())
    }
}

impl FromStr for Header {
    type Err = Error;
    fn from_str(s: &str) -> Result<Header> {
        let mut p = s.trim_start();

        // the scheme prefix is optional, so that both the full field and the bare attribute
        // list can be parsed
        if p.get(..5).map_or(false, |s| s.eq_ignore_ascii_case("hawk ")) {
            p = &p[5..];
        }

        // Required attributes
        let mut id: Option<&str> = None;
        let mut ts: Option<SystemTime> = None;
        let mut nonce: Option<&str> = None;
        let mut mac: Option<Vec<u8>> = None;
        // Optional attributes
        let mut hash: Option<Vec<u8>> = None;
        let mut ext: Option<&str> = None;
        let mut app: Option<&str> = None;
        let mut dlg: Option<&str> = None;

        while !p.is_empty() {
            // Skip whitespace and commas used as separators
            p = p.trim_start_matches(|c| c == ',' || char::is_whitespace(c));
            if p.is_empty() {
                break;
            }

            // Find first '=' which delimits attribute name from value
            let assign_end = p
                .find('=')
                .ok_or_else(|| Error::HeaderParseError("Expected '='".into()))?;
            let attr = &p[..assign_end].trim();
            p = p[assign_end + 1..].trim_start();

            if !p.starts_with('"') {
                return Err(Error::HeaderParseError("Expected opening quote".into()));
            }
            p = &p[1..];

            // We have poor RFC 7235 compliance here as we ought to support backslash
            // escaped characters, but hawk doesn't allow this we won't either.  All
            // strings must be surrounded by ".." and contain no such characters.
            let end = p
                .find('"')
                .ok_or_else(|| Error::HeaderParseError("Expected closing quote".into()))?;
            let val = &p[..end];
            match *attr {
                "id" => id = Some(val),
                "ts" => {
                    let epoch = u64::from_str(val)
                        .map_err(|_| Error::HeaderParseError("Invalid timestamp".into()))?;
                    ts = Some(
                        UNIX_EPOCH
                            .checked_add(Duration::from_secs(epoch))
                            .ok_or_else(|| {
                                Error::HeaderParseError("Timestamp out of range".into())
                            })?,
                    );
                }
                "mac" => mac = Some(base64::decode(val)?),
                "nonce" => nonce = Some(val),
                "ext" => ext = Some(val),
                "hash" => hash = Some(base64::decode(val)?),
                "app" => app = Some(val),
                "dlg" => dlg = Some(val),
                _ => {
                    return Err(Error::HeaderParseError(format!(
                        "Invalid Hawk field {}",
                        *attr
                    )))
                }
            };

            // Break if we are at end of string, otherwise skip separator
            if p.len() < end + 1 {
                break;
            }
            p = p[end + 1..].trim_start();
        }

        match (id, ts, nonce, mac) {
            (Some(id), Some(ts), Some(nonce), Some(mac)) => Header::new(
                id,
                ts,
                nonce,
                Mac::from(mac),
                ext,
                hash,
                app,
                dlg,
            ),
            (None, _, _, _) => Err(Error::HeaderParseError("Missing `id` attribute".into())),
            (_, None, _, _) => Err(Error::HeaderParseError("Missing `ts` attribute".into())),
            (_, _, None, _) => Err(Error::HeaderParseError("Missing `nonce` attribute".into())),
            (_, _, _, None) => Err(Error::HeaderParseError("Missing `mac` attribute".into())),
        }
    }
}

/// The complete value of an `Authorization` header, including the `Hawk ` scheme prefix.
///
/// This is a single-use artifact: produce one per request.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AuthorizationHeader(String);

impl AuthorizationHeader {
    /// The header field value, suitable for direct use as the `Authorization` header.
    pub fn field(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for AuthorizationHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Header> for AuthorizationHeader {
    fn from(header: &Header) -> Self {
        header.header_value()
    }
}
