use crate::dns::{Dnskey, Name};
use ring::digest;
use std::fmt;

/// DS digest type algorithms (RFC 4034, 4509, 5933, 6605)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DigestType {
    /// SHA-1 (RFC 3658)
    Sha1 = 1,
    /// SHA-256 (RFC 4509)
    Sha256 = 2,
    /// GOST R 34.11-94 (RFC 5933)
    Gost94 = 3,
    /// SHA-384 (RFC 6605)
    Sha384 = 4,
}

impl DigestType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Sha1),
            2 => Some(Self::Sha256),
            3 => Some(Self::Gost94),
            4 => Some(Self::Sha384),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Sha1 | Self::Sha256 | Self::Sha384)
    }

    pub fn digest_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Gost94 => 32,
            Self::Sha384 => 48,
        }
    }

    /// A well-formed SHA-256 or SHA-384 digest, which makes SHA-1 entries
    /// for the same delegation ignorable (RFC 4509 section 3)
    pub fn is_strong_digest(digest_type: u8, digest: &[u8]) -> bool {
        match Self::from_u8(digest_type) {
            Some(t @ (Self::Sha256 | Self::Sha384)) => digest.len() == t.digest_len(),
            _ => false,
        }
    }

    pub fn digest(&self, data: &[u8]) -> Option<Vec<u8>> {
        let algorithm = match self {
            Self::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
            Self::Sha256 => &digest::SHA256,
            Self::Sha384 => &digest::SHA384,
            Self::Gost94 => return None,
        };
        Some(digest::digest(algorithm, data).as_ref().to_vec())
    }

    /// DS digest of `key` owned by `owner`: H(owner wire || DNSKEY RDATA)
    pub fn ds_digest(&self, owner: &Name, key: &Dnskey) -> Option<Vec<u8>> {
        let mut data = owner.to_wire();
        data.extend_from_slice(&key.to_wire());
        self.digest(&data)
    }
}

impl fmt::Display for DigestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => write!(f, "SHA1"),
            Self::Sha256 => write!(f, "SHA256"),
            Self::Gost94 => write!(f, "GOST94"),
            Self::Sha384 => write!(f, "SHA384"),
        }
    }
}
