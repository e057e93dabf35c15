pub mod algorithm;
pub mod crypto;
pub mod digest;
pub mod errors;
pub mod key_tag;
pub mod nsec;
pub mod nsec3;
pub mod policy;
pub mod proofs;
pub mod trust_anchor;

pub use algorithm::DnsSecAlgorithm;
pub use crypto::RingCrypto;
pub use digest::DigestType;
pub use errors::DnsSecError;
pub use key_tag::calculate_key_tag;
pub use policy::ConfiguredPolicy;
pub use proofs::{ProofAccumulator, ProofKind, ProofKindSet, ProofNames};
pub use trust_anchor::{TrustAnchor, TrustAnchorStore};

use std::fmt;

/// Final verdict of one validation task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationResult {
    /// Chained to a trust anchor
    Secure,
    /// Proven to sit below an unsigned delegation; a success, but not secure
    ProvenInsecure,
    /// Every candidate signature failed or none applied
    NoValidSignature,
    /// A required non-existence proof could not be assembled
    NoValidDenialProof,
    /// Policy demanded security but the chain proved insecure
    MustBeSecure,
    /// A dependency failed to validate or could not be fetched
    BrokenChain,
    Canceled,
}

impl ValidationResult {
    /// Whether the caller may serve the data
    pub fn is_success(self) -> bool {
        matches!(self, Self::Secure | Self::ProvenInsecure)
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Secure => "secure",
            Self::ProvenInsecure => "insecure",
            Self::NoValidSignature => "no valid signature found",
            Self::NoValidDenialProof => "no valid non-existence proof found",
            Self::MustBeSecure => "must-be-secure",
            Self::BrokenChain => "broken trust chain",
            Self::Canceled => "canceled",
        })
    }
}

/// DNSSEC constants
pub mod constants {
    /// Ceiling on NSEC3 iterations for the largest keys (RFC 5155 section 10.3)
    pub const MAX_NSEC3_ITERATIONS: u16 = 2500;

    /// NSEC3 hash algorithm number for SHA-1
    pub const NSEC3_SHA1: u8 = 1;
}
