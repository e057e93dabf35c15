use thiserror::Error;

/// Reasons a single signature or digest check fails
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsSecError {
    #[error("RRSIG does not cover type {0}")]
    TypeNotCovered(u16),

    #[error("DNSKEY does not match RRSIG algorithm or protocol")]
    KeyMismatch,

    #[error("RRSIG label count {labels} exceeds owner label count {owner}")]
    InvalidLabelCount { labels: u8, owner: usize },

    #[error("DNSSEC signature has expired")]
    SignatureExpired,

    #[error("DNSSEC signature is not yet valid")]
    SignatureNotYetValid,

    #[error("Unsupported DNSSEC algorithm: {0}")]
    UnsupportedAlgorithm(u8),

    #[error("Unsupported digest type: {0}")]
    UnsupportedDigestType(u8),

    #[error("Invalid DNSKEY public key format")]
    InvalidPublicKey,

    #[error("DNSSEC signature verification failed")]
    SignatureVerificationFailed,
}

pub type Result<T> = std::result::Result<T, DnsSecError>;
