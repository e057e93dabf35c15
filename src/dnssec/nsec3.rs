//! Hashed-name denial (NSEC3, RFC 5155) interpretation.

use crate::dns::{Name, RecordSet, RecordType};
use crate::traits::Crypto;
use std::cmp::Ordering;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Nsec3Verdict {
    /// The record proves nothing about the name
    #[default]
    Ignored,
    /// `exists`/`data` carry a usable answer
    Proved,
    /// The record's iteration count is above the configured maximum
    IterationsExceeded,
}

/// Everything one NSEC3 set told us about a name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Nsec3Examination {
    pub verdict: Nsec3Verdict,
    /// Every record in the set used a hash algorithm we cannot compute
    pub unknown_hash: bool,
    pub exists: bool,
    pub data: bool,
    pub opt_out: bool,
    /// A new closest encloser candidate, if this set matched one
    pub closest: Option<Name>,
    /// A new next-closer name, if this set covered one
    pub nearest: Option<Name>,
}

/// The zone an NSEC3 owner name belongs to
pub fn owner_zone(owner: &Name) -> Option<Name> {
    owner.parent()
}

/// Decode the base32hex hash label of an NSEC3 owner name
pub fn owner_hash(owner: &Name) -> Option<Vec<u8>> {
    let label = std::str::from_utf8(owner.first_label()?).ok()?;
    base32::decode(
        base32::Alphabet::Rfc4648Hex { padding: false },
        &label.to_ascii_uppercase(),
    )
}

/// The deepest zone, among the NSEC3 owners given, that `name` sits in
pub fn deepest_zone<'a>(name: &Name, owners: impl IntoIterator<Item = &'a Name>) -> Option<Name> {
    let mut deepest: Option<Name> = None;
    for zone in owners.into_iter().filter_map(owner_zone) {
        if !name.is_subdomain_of(&zone) {
            continue;
        }
        if deepest.as_ref().is_none_or(|d| zone.is_subdomain_of(d)) {
            deepest = Some(zone);
        }
    }
    deepest
}

/// Whether the interval (owner, next) covers `hash`, wrapping at the end
/// of the hash chain
pub fn covers(owner: &[u8], next: &[u8], hash: &[u8]) -> bool {
    let after_owner = hash.cmp(owner) == Ordering::Greater;
    let before_next = hash.cmp(next) == Ordering::Less;
    match owner.cmp(next) {
        Ordering::Less => after_owner && before_next,
        _ => after_owner || before_next,
    }
}

/// Interprets NSEC3 sets for one query against one zone
pub struct Nsec3Check<'a> {
    pub crypto: &'a dyn Crypto,
    pub rtype: RecordType,
    pub name: &'a Name,
    pub zone: &'a Name,
    pub max_iterations: u16,
    /// Look for the closest encloser while walking up the name
    pub discover_closest: bool,
    /// Track the next-closer name covered by the set
    pub track_nearest: bool,
}

impl Nsec3Check<'_> {
    /// Examine `set`, given the closest encloser and next-closer name known
    /// so far.
    pub fn examine(
        &self,
        set: &RecordSet,
        closest: Option<&Name>,
        nearest: Option<&Name>,
    ) -> Nsec3Examination {
        let mut ex = Nsec3Examination::default();
        let owner = &set.name;

        match owner_zone(owner) {
            Some(zone) if &zone == self.zone => {}
            _ => {
                trace!("ignoring NSEC3 {} outside zone {}", owner, self.zone);
                return ex;
            }
        }
        let Some(nsec3) = set.nsec3_records().next() else {
            return ex;
        };
        if !self.crypto.nsec3_hash_supported(nsec3.hash_algorithm) {
            trace!("NSEC3 {} uses unknown hash algorithm {}", owner, nsec3.hash_algorithm);
            ex.unknown_hash = true;
            return ex;
        }
        let Some(owner_hash) = owner_hash(owner) else {
            trace!("ignoring NSEC3 {}: owner is not a hash", owner);
            return ex;
        };
        if owner_hash.len() != nsec3.next_hashed.len() {
            trace!("ignoring NSEC3 {}: hash length mismatch", owner);
            return ex;
        }
        if !self.name.is_subdomain_of(self.zone) {
            return ex;
        }

        let types = &nsec3.types;
        let ns = types.contains(RecordType::NS);
        let soa = types.contains(RecordType::SOA);
        let mut answer = Nsec3Verdict::Ignored;
        let mut qname = self.name.clone();
        let mut first = true;

        loop {
            if nsec3.iterations > self.max_iterations {
                trace!(
                    "NSEC3 {} has {} iterations, above {}",
                    owner,
                    nsec3.iterations,
                    self.max_iterations
                );
                ex.verdict = Nsec3Verdict::IterationsExceeded;
                return ex;
            }
            let Some(hash) = self.crypto.nsec3_hash(
                &qname,
                nsec3.hash_algorithm,
                nsec3.iterations,
                &nsec3.salt,
            ) else {
                return ex;
            };
            if hash.len() != owner_hash.len() {
                trace!("ignoring NSEC3 {}: computed hash length mismatch", owner);
                return ex;
            }
            let order = hash.cmp(&owner_hash);

            if first && order == Ordering::Equal {
                let at_parent = !qname.is_root() && self.rtype.is_at_parent();
                if ns && !soa {
                    if !at_parent {
                        trace!("ignoring parent side NSEC3 {}", owner);
                        return ex;
                    }
                } else if at_parent && soa {
                    trace!("ignoring child side NSEC3 {}", owner);
                    return ex;
                }
                let cname_exempt = matches!(
                    self.rtype,
                    RecordType::CNAME | RecordType::NSEC | RecordType::KEY
                );
                if cname_exempt || !types.contains(RecordType::CNAME) {
                    ex.exists = true;
                    ex.data = types.contains(self.rtype);
                    ex.verdict = Nsec3Verdict::Proved;
                    trace!("NSEC3 {} matches {}", owner, qname);
                    return ex;
                }
                trace!("NSEC3 {} indicates CNAME", owner);
                return ex;
            }

            if order == Ordering::Equal {
                if ns && !soa {
                    trace!("ignoring parent side NSEC3 {} for {}", owner, qname);
                    return ex;
                }
                let below_closest = closest.is_none_or(|c| qname.is_subdomain_of(c));
                if self.discover_closest
                    && below_closest
                    && !types.contains(RecordType::DS)
                    && !types.contains(RecordType::DNAME)
                    && (soa || !ns)
                {
                    trace!("NSEC3 {} indicates potential closest encloser {}", owner, qname);
                    ex.closest = Some(qname);
                }
                ex.verdict = answer;
                return ex;
            }

            if covers(&owner_hash, &nsec3.next_hashed, &hash) {
                let current = ex.nearest.as_ref().or(nearest);
                if self.track_nearest && current.is_none_or(|n| n.is_subdomain_of(&qname)) {
                    ex.nearest = Some(qname.clone());
                }
                trace!("NSEC3 {} covers {}", owner, qname);
                ex.exists = false;
                ex.data = false;
                ex.opt_out = nsec3.opt_out();
                answer = Nsec3Verdict::Proved;
            }

            if qname.label_count() <= self.zone.label_count() {
                break;
            }
            match qname.parent() {
                Some(parent) => qname = parent,
                None => break,
            }
            first = false;
        }

        ex.verdict = answer;
        ex
    }
}
