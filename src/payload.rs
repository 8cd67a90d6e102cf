use crate::crypto::{self, DigestAlgorithm, Hasher};
use crate::error::*;

/// A utility for hashing payloads. Feed your entity body to this, then pass the `finish`
/// result to a request.
pub struct PayloadHasher {
    hasher: Box<dyn Hasher>,
}

impl PayloadHasher {
    /// Create a new PayloadHasher.  Parameters such as `charset=` are stripped from the
    /// `content_type` and it is lowercased before hashing.  The digest should be the same as
    /// the one used for the credentials in the request.
    pub fn new<B>(content_type: B, algorithm: DigestAlgorithm) -> Result<Self>
    where
        B: AsRef<[u8]>,
    {
        let mut hasher = PayloadHasher {
            hasher: crypto::cryptographer().new_hasher(algorithm)?,
        };
        hasher.update(b"hawk.1.payload\n")?;
        hasher.update(normalize_content_type(content_type.as_ref()))?;
        hasher.update(b"\n")?;
        Ok(hasher)
    }

    /// Hash a single value and return it
    pub fn hash<B1, B2>(content_type: B1, algorithm: DigestAlgorithm, payload: B2) -> Result<Vec<u8>>
    where
        B1: AsRef<[u8]>,
        B2: AsRef<[u8]>,
    {
        let mut hasher = PayloadHasher::new(content_type, algorithm)?;
        hasher.update(payload)?;
        hasher.finish()
    }

    /// Update the hash with new data.
    pub fn update<B>(&mut self, data: B) -> Result<()>
    where
        B: AsRef<[u8]>,
    {
        self.hasher.update(data.as_ref())?;
        Ok(())
    }

    /// Finish hashing and return the result
    ///
    /// Note that this appends a newline to the payload, as does the JS Hawk implementaiton.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        self.update(b"\n")?;
        Ok(self.hasher.finish()?)
    }
}

/// A request body and its content type, as covered by a Hawk payload hash.
#[derive(Debug, Clone, Copy)]
pub struct PayloadRef<'a> {
    pub content_type: &'a str,
    pub body: &'a [u8],
}

impl<'a> PayloadRef<'a> {
    pub fn new(content_type: &'a str, body: &'a [u8]) -> Self {
        PayloadRef { content_type, body }
    }

    pub fn hash(&self, algorithm: DigestAlgorithm) -> Result<Vec<u8>> {
        PayloadHasher::hash(self.content_type, algorithm, self.body)
    }
}

fn normalize_content_type(content_type: &[u8]) -> Vec<u8> {
    let end = content_type
        .iter()
        .position(|c| *c == b';')
        .unwrap_or_else(|| content_type.len());
    let mut normalized = content_type[..end].to_ascii_lowercase();
    while normalized.last().map_or(false, |c| c.is_ascii_whitespace()) {
        normalized.pop();
    }
    while normalized.first().map_or(false, |c| c.is_ascii_whitespace()) {
        normalized.remove(0);
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::PayloadHasher;
    use crate::crypto::DigestAlgorithm;
    use pretty_assertions::assert_eq;

    const PAYLOAD_HASH: [u8; 32] = [
        94, 16, 18, 216, 211, 65, 209, 208, 179, 220, 77, 56, 116, 162, 71, 244, 214, 10, 7, 3,
        156, 125, 202, 174, 255, 95, 42, 66, 142, 115, 102, 101,
    ];

    #[test]
    fn hash_consistency() -> super::Result<()> {
        let mut hasher1 = PayloadHasher::new("text/plain", DigestAlgorithm::Sha256)?;
        hasher1.update("pay")?;
        hasher1.update("load")?;
        let hash1 = hasher1.finish()?;

        let mut hasher2 = PayloadHasher::new("text/plain", DigestAlgorithm::Sha256)?;
        hasher2.update("payload")?;
        let hash2 = hasher2.finish()?;

        let hash3 = PayloadHasher::hash("text/plain", DigestAlgorithm::Sha256, "payload")?;

        // the same value as produced by the JS implementation
        let hash4 = base64::decode("XhAS2NNB0dCz3E04dKJH9NYKBwOcfcqu/18qQo5zZmU=").unwrap();

        assert_eq!(hash1, PAYLOAD_HASH.to_vec());
        assert_eq!(hash2, hash1);
        assert_eq!(hash3, hash1);
        assert_eq!(hash4, hash1);
        Ok(())
    }

    #[test]
    fn content_type_parameters_ignored() -> super::Result<()> {
        let plain = PayloadHasher::hash("text/plain", DigestAlgorithm::Sha256, "payload")?;
        let with_charset = PayloadHasher::hash(
            "Text/Plain; charset=utf-8",
            DigestAlgorithm::Sha256,
            "payload",
        )?;
        assert_eq!(plain, with_charset);
        Ok(())
    }

    #[test]
    fn sha1_payload() -> super::Result<()> {
        let hash = PayloadHasher::hash("text/plain", DigestAlgorithm::Sha1, "payload")?;
        assert_eq!(hex::encode(hash), "ae7b3b86f112c88f115f1abf450e676ff1eb601c");
        Ok(())
    }
}
