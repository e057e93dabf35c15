use super::{DigestType, DnsSecAlgorithm, DnsSecError, errors::Result};
use crate::dns::{Dnskey, Name, RecordSet, Rrsig};
use crate::traits::{Crypto, VerifyResult};
use ring::digest;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::trace;

const CLASS_IN: u16 = 1;

/// Default crypto collaborator backed by ring
#[derive(Debug, Clone, Default)]
pub struct RingCrypto {
    fixed_now: Option<u32>,
}

impl RingCrypto {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate signature validity periods against a fixed clock
    pub fn with_fixed_time(now: u32) -> Self {
        Self {
            fixed_now: Some(now),
        }
    }

    fn now(&self) -> u32 {
        self.fixed_now.unwrap_or_else(unix_now)
    }

    fn verify_inner(
        &self,
        name: &Name,
        rrset: &RecordSet,
        key: &Dnskey,
        sig: &Rrsig,
        ignore_time: bool,
    ) -> Result<Option<Name>> {
        if sig.type_covered != rrset.rtype {
            return Err(DnsSecError::TypeNotCovered(rrset.rtype.to_u16()));
        }
        if key.algorithm != sig.algorithm || key.protocol != 3 {
            return Err(DnsSecError::KeyMismatch);
        }
        if !ignore_time {
            let now = self.now();
            if serial_lt(now, sig.inception) {
                return Err(DnsSecError::SignatureNotYetValid);
            }
            if serial_lt(sig.expiration, now) {
                return Err(DnsSecError::SignatureExpired);
            }
        }

        let (owner, wildcard) = signature_owner(name, sig)?;
        let data = signed_data(&owner, rrset, sig);
        let algorithm = DnsSecAlgorithm::from_u8(sig.algorithm)
            .ok_or(DnsSecError::UnsupportedAlgorithm(sig.algorithm))?;
        algorithm.verify(&key.public_key, &data, &sig.signature)?;
        Ok(wildcard.then_some(owner))
    }
}

impl Crypto for RingCrypto {
    fn verify(
        &self,
        name: &Name,
        rrset: &RecordSet,
        key: &Dnskey,
        sig: &Rrsig,
        ignore_time: bool,
    ) -> VerifyResult {
        match self.verify_inner(name, rrset, key, sig, ignore_time) {
            Ok(None) => VerifyResult::Valid,
            Ok(Some(wild)) => VerifyResult::FromWildcard(wild),
            Err(DnsSecError::SignatureExpired) => VerifyResult::Expired,
            Err(DnsSecError::SignatureNotYetValid) => VerifyResult::NotYetValid,
            Err(e) => {
                trace!("RRSIG {} for {}/{} rejected: {}", sig.key_tag, name, rrset.rtype, e);
                VerifyResult::Bad
            }
        }
    }

    fn ds_digest(&self, owner: &Name, key: &Dnskey, digest_type: u8) -> Option<Vec<u8>> {
        DigestType::from_u8(digest_type)?.ds_digest(owner, key)
    }

    fn nsec3_hash(
        &self,
        name: &Name,
        algorithm: u8,
        iterations: u16,
        salt: &[u8],
    ) -> Option<Vec<u8>> {
        if !self.nsec3_hash_supported(algorithm) {
            return None;
        }
        Some(nsec3_sha1(name, iterations, salt))
    }
}

/// RFC 5155 section 5: IH(salt, x, 0) = H(x || salt), repeated `iterations` more times
pub fn nsec3_sha1(name: &Name, iterations: u16, salt: &[u8]) -> Vec<u8> {
    let mut input = name.to_wire();
    input.extend_from_slice(salt);
    let mut hash = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, &input);
    for _ in 0..iterations {
        let mut next = hash.as_ref().to_vec();
        next.extend_from_slice(salt);
        hash = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, &next);
    }
    hash.as_ref().to_vec()
}

/// The owner name the signature was generated over. A labels field shorter
/// than the owner means the set was expanded from a wildcard.
pub fn signature_owner(name: &Name, sig: &Rrsig) -> Result<(Name, bool)> {
    let owner_labels = name.label_count() - usize::from(name.is_wildcard());
    let labels = usize::from(sig.labels);
    if labels > owner_labels {
        return Err(DnsSecError::InvalidLabelCount {
            labels: sig.labels,
            owner: owner_labels,
        });
    }
    if labels < owner_labels {
        let wild = name
            .suffix(labels)
            .wildcard()
            .map_err(|_| DnsSecError::InvalidLabelCount {
                labels: sig.labels,
                owner: owner_labels,
            })?;
        return Ok((wild, true));
    }
    Ok((name.clone(), false))
}

/// RFC 4034 section 3.1.8.1 signed data: RRSIG RDATA without the signature
/// followed by the set's records in canonical form and order
pub fn signed_data(owner: &Name, rrset: &RecordSet, sig: &Rrsig) -> Vec<u8> {
    let mut data = sig.to_wire_without_signature();

    let mut rdatas: Vec<Vec<u8>> = rrset.rdata.iter().map(|rd| rd.to_wire()).collect();
    rdatas.sort();
    rdatas.dedup();

    let owner_wire = owner.to_wire();
    for rdata in rdatas {
        data.extend_from_slice(&owner_wire);
        data.extend_from_slice(&rrset.rtype.to_u16().to_be_bytes());
        data.extend_from_slice(&CLASS_IN.to_be_bytes());
        data.extend_from_slice(&sig.original_ttl.to_be_bytes());
        data.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        data.extend_from_slice(&rdata);
    }
    data
}

pub(crate) fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// RFC 1982 serial number comparison
pub(crate) fn serial_lt(a: u32, b: u32) -> bool {
    a != b && (a.wrapping_sub(b) as i32) < 0
}
