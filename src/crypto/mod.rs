//! Cryptographic primitives used for Hawk signing and credential derivation.
//!
//! All operations go through the [`Cryptographer`] trait so that the backend is isolated from
//! the rest of the crate; the only backend shipped is based on `ring`.

use failure::Fail;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

mod ring;

pub(crate) use self::ring::RingCryptographer;

/// Digest algorithms accepted for Hawk credentials.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
}

impl DigestAlgorithm {
    /// The name of the algorithm as used in Hawk credentials and token server responses.
    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha256 => "sha256",
        }
    }
}

impl Default for DigestAlgorithm {
    fn default() -> Self {
        DigestAlgorithm::Sha256
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" => Ok(DigestAlgorithm::Sha1),
            "sha256" => Ok(DigestAlgorithm::Sha256),
            _ => Err(crate::Error::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

#[derive(Debug, Fail)]
pub enum CryptoError {
    #[fail(display = "HKDF output of {} bytes is too long", _0)]
    HkdfLength(usize),

    #[fail(display = "{}", _0)]
    Other(#[fail(cause)] failure::Error),
}

pub trait HmacKey: Send + Sync + 'static {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

// Not `Clone`.
pub trait Hasher: Send + Sync + 'static {
    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError>;
    fn finish(&mut self) -> Result<Vec<u8>, CryptoError>;
}

pub trait Cryptographer: Send + Sync + 'static {
    fn new_key(
        &self,
        algorithm: DigestAlgorithm,
        key: &[u8],
    ) -> Result<Box<dyn HmacKey>, CryptoError>;
    fn new_hasher(&self, algorithm: DigestAlgorithm) -> Result<Box<dyn Hasher>, CryptoError>;
    fn constant_time_compare(&self, a: &[u8], b: &[u8]) -> bool;
    /// HKDF with SHA-256, writing `out.len()` bytes of output keying material.
    fn hkdf_sha256(
        &self,
        salt: &[u8],
        ikm: &[u8],
        info: &[u8],
        out: &mut [u8],
    ) -> Result<(), CryptoError>;
}

static RING: RingCryptographer = RingCryptographer;

pub(crate) fn cryptographer() -> &'static dyn Cryptographer {
    &RING
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn algorithm_names() {
        assert_eq!(
            DigestAlgorithm::from_str("sha256").unwrap(),
            DigestAlgorithm::Sha256
        );
        assert_eq!(
            DigestAlgorithm::from_str("SHA1").unwrap(),
            DigestAlgorithm::Sha1
        );
        assert_eq!(DigestAlgorithm::Sha256.to_string(), "sha256");
    }

    #[test]
    fn unsupported_algorithm() {
        match DigestAlgorithm::from_str("sha512") {
            Err(crate::Error::UnsupportedAlgorithm(name)) => assert_eq!(name, "sha512"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn sha256_digest() {
        let mut hasher = cryptographer()
            .new_hasher(DigestAlgorithm::Sha256)
            .unwrap();
        hasher.update(b"abc").unwrap();
        assert_eq!(
            hex::encode(hasher.finish().unwrap()),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sha1_digest() {
        let mut hasher = cryptographer().new_hasher(DigestAlgorithm::Sha1).unwrap();
        hasher.update(b"abc").unwrap();
        assert_eq!(
            hex::encode(hasher.finish().unwrap()),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn hkdf_rfc5869_case_1() {
        let ikm = [0x0bu8; 22];
        let salt = hex::decode("000102030405060708090a0b0c").unwrap();
        let info = hex::decode("f0f1f2f3f4f5f6f7f8f9").unwrap();
        let mut okm = [0u8; 42];
        cryptographer()
            .hkdf_sha256(&salt, &ikm, &info, &mut okm)
            .unwrap();
        assert_eq!(
            hex::encode(&okm[..]),
            "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf\
             34007208d5b887185865"
        );
    }

    #[test]
    fn constant_time_compare() {
        let c = cryptographer();
        assert!(c.constant_time_compare(b"abc", b"abc"));
        assert!(!c.constant_time_compare(b"abc", b"abd"));
        assert!(!c.constant_time_compare(b"abc", b"ab"));
    }
}
