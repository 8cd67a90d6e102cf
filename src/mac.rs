use crate::credentials::Key;
use crate::error::*;
use std::io::Write;
use std::ops::Deref;
use std::time::{SystemTime, UNIX_EPOCH};

/// A Hawk MAC.  Like a `Vec<u8>`, but compared in constant time.
#[derive(Debug, Clone)]
pub struct Mac(Vec<u8>);

impl Mac {
    /// Compute the MAC over the normalized string for a request header.
    ///
    /// Every line, including the last, is newline-terminated; the server recomputes exactly the
    /// same string, so neither the order nor the line breaks may change.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        key: &Key,
        ts: SystemTime,
        nonce: &str,
        method: &str,
        host: &str,
        port: u16,
        path: &str,
        hash: Option<&[u8]>,
        ext: Option<&str>,
        app: Option<&str>,
        dlg: Option<&str>,
    ) -> Result<Mac> {
        let mut buffer: Vec<u8> = vec![];
        write_normalized(
            &mut buffer,
            ts,
            nonce,
            method,
            host,
            port,
            path,
            hash,
            ext,
            app,
            dlg,
        )?;

        Ok(Mac(key.sign(&buffer)?))
    }
}

#[allow(clippy::too_many_arguments)]
fn write_normalized(
    buffer: &mut Vec<u8>,
    ts: SystemTime,
    nonce: &str,
    method: &str,
    host: &str,
    port: u16,
    path: &str,
    hash: Option<&[u8]>,
    ext: Option<&str>,
    app: Option<&str>,
    dlg: Option<&str>,
) -> std::io::Result<()> {
    let ts = ts.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();

    writeln!(buffer, "hawk.1.header")?;
    writeln!(buffer, "{}", ts)?;
    writeln!(buffer, "{}", nonce)?;
    writeln!(buffer, "{}", method.to_ascii_uppercase())?;
    writeln!(buffer, "{}", path)?;
    writeln!(buffer, "{}", host.to_ascii_lowercase())?;
    writeln!(buffer, "{}", port)?;

    match hash {
        Some(h) => writeln!(buffer, "{}", base64::encode(h))?,
        None => writeln!(buffer)?,
    }

    match ext {
        // backslashes and newlines in ext are escaped, as the JS Hawk library does
        Some(e) => writeln!(buffer, "{}", e.replace('\\', "\\\\").replace('\n', "\\n"))?,
        None => writeln!(buffer)?,
    }

    if let Some(app) = app {
        writeln!(buffer, "{}", app)?;
        writeln!(buffer, "{}", dlg.unwrap_or(""))?;
    }

    Ok(())
}

impl PartialEq for Mac {
    fn eq(&self, other: &Mac) -> bool {
        crate::crypto::cryptographer().constant_time_compare(&self.0, &other.0)
    }
}

impl From<Vec<u8>> for Mac {
    fn from(original: Vec<u8>) -> Self {
        Mac(original)
    }
}

impl Deref for Mac {
    type Target = Vec<u8>;
    fn deref(&self) -> &Vec<u8> {
        &self.0
    }
}

impl AsRef<[u8]> for Mac {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}
