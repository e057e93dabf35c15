//! Collaborator seams. The engine owns no cache, network, key table or
//! crypto library; it reaches all of them through these traits so a
//! resolver can plug in its own and tests can plug in fakes.

use crate::dns::{Dnskey, Name, NegativeEntry, RecordSet, RecordType, Rrsig, SignedSet};
use async_trait::async_trait;
use thiserror::Error;

/// What the cache knows about a (name, type) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// A positive record set with its signatures, if any
    Found(SignedSet),
    /// The name owns an alias (CNAME) instead of the requested type
    Alias(SignedSet),
    /// The name exists without the requested type
    NoData(Option<NegativeEntry>),
    /// The name does not exist
    NxDomain(Option<NegativeEntry>),
    /// Nothing is cached; a fetch is needed
    NotFound,
    /// The cache marked this data as failing validation earlier
    BrokenChain,
}

/// Options a task forwards to every fetch it issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchOptions {
    pub no_cd_flag: bool,
    pub ignore_negative_anchors: bool,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("server failure")]
    ServFail,
    #[error("fetch canceled")]
    Canceled,
    #[error("fetch failed: {0}")]
    Failed(String),
}

/// Cache lookups and network fetches
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Consult the cache without suspending
    fn lookup(&self, name: &Name, rtype: RecordType) -> Lookup;

    /// Query the network; only called after `lookup` returned `NotFound`.
    /// Retries are the implementation's business.
    async fn fetch(
        &self,
        name: Name,
        rtype: RecordType,
        options: FetchOptions,
    ) -> Result<Lookup, FetchError>;

    /// The deepest known zone cut at or above `name`
    fn find_zone_cut(&self, _name: &Name) -> Option<Name> {
        None
    }
}

/// Result of checking one signature with one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid,
    /// Valid, but the set was synthesized from this wildcard owner
    FromWildcard(Name),
    Expired,
    NotYetValid,
    Bad,
}

impl VerifyResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResult::Valid | VerifyResult::FromWildcard(_))
    }

    /// Failed only on the signature validity period
    pub fn is_time_failure(&self) -> bool {
        matches!(self, VerifyResult::Expired | VerifyResult::NotYetValid)
    }
}

pub trait Crypto: Send + Sync {
    fn verify(
        &self,
        name: &Name,
        rrset: &RecordSet,
        key: &Dnskey,
        sig: &Rrsig,
        ignore_time: bool,
    ) -> VerifyResult;

    /// Digest of `key` at `owner` for a DS record of `digest_type`
    fn ds_digest(&self, owner: &Name, key: &Dnskey, digest_type: u8) -> Option<Vec<u8>>;

    /// RFC 5155 iterated hash; `None` for unknown hash algorithms
    fn nsec3_hash(&self, name: &Name, algorithm: u8, iterations: u16, salt: &[u8])
    -> Option<Vec<u8>>;

    fn nsec3_hash_supported(&self, algorithm: u8) -> bool {
        algorithm == crate::dnssec::constants::NSEC3_SHA1
    }
}

pub trait TrustAnchors: Send + Sync {
    /// The anchor at exactly `name`, as a DS set with `Trust::Ultimate`
    fn find(&self, name: &Name) -> Option<RecordSet>;

    /// The deepest anchor name at or above `name`
    fn find_deepest(&self, name: &Name) -> Option<Name>;
}

/// Per-zone policy hooks
pub trait ValidationPolicy: Send + Sync {
    fn is_algorithm_supported(&self, name: &Name, algorithm: u8) -> bool;

    fn is_digest_supported(&self, name: &Name, digest_type: u8) -> bool;

    /// Answers under `name` may never be accepted as provably insecure
    fn must_be_secure(&self, _name: &Name) -> bool {
        false
    }
}
