//! Ordered-name denial (NSEC, RFC 4034/4035) interpretation.

use crate::dns::{Name, NameRelation, RecordSet, RecordType};
use std::cmp::Ordering;
use tracing::trace;

/// What a single NSEC record proves about a name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsecProof {
    /// The name exists
    pub exists: bool,
    /// The name owns the queried type
    pub data: bool,
    /// The wildcard that would have matched, when non-existence was proven
    pub wildcard: Option<Name>,
}

/// Interpret the NSEC set `nsec_set` against (`name`, `rtype`).
///
/// `None` means the record says nothing usable about the name.
pub fn no_exist_no_data(
    rtype: RecordType,
    name: &Name,
    nsec_set: &RecordSet,
    want_wildcard: bool,
) -> Option<NsecProof> {
    let owner = &nsec_set.name;
    let nsec = nsec_set.nsec()?;
    let types = &nsec.types;
    let delegation = types.contains(RecordType::NS) && !types.contains(RecordType::SOA);

    match name.canonical_cmp(owner) {
        Ordering::Less => {
            trace!("NSEC at {} does not cover {}: name before owner", owner, name);
            return None;
        }
        Ordering::Equal => {
            let at_parent = !name.is_root() && rtype.is_at_parent();
            if delegation {
                if !at_parent {
                    trace!("ignoring parent side NSEC at {}", owner);
                    return None;
                }
            } else if at_parent && types.contains(RecordType::SOA) {
                trace!("ignoring child side NSEC at {}", owner);
                return None;
            }
            let cname_exempt = matches!(
                rtype,
                RecordType::CNAME | RecordType::NSEC | RecordType::KEY
            );
            if cname_exempt || !types.contains(RecordType::CNAME) {
                return Some(NsecProof {
                    exists: true,
                    data: types.contains(rtype),
                    wildcard: None,
                });
            }
            trace!("NSEC at {} indicates CNAME", owner);
            return None;
        }
        Ordering::Greater => {}
    }

    if name.relation(owner) == NameRelation::Subdomain {
        if delegation {
            trace!("ignoring parent side NSEC at {} below a delegation", owner);
            return None;
        }
        if types.contains(RecordType::DNAME) {
            trace!("NSEC at {} proves a DNAME above {}", owner, name);
            return None;
        }
    }

    match nsec.next.canonical_cmp(name) {
        Ordering::Equal => {
            trace!("ignoring NSEC at {}: next name matches {}", owner, name);
            return None;
        }
        _ if nsec.next.relation(name) == NameRelation::Subdomain => {
            trace!("{} is an empty non-terminal", name);
            return Some(NsecProof {
                exists: true,
                data: false,
                wildcard: None,
            });
        }
        Ordering::Less if !owner.is_subdomain_of(&nsec.next) => {
            trace!("ignoring NSEC at {}: {} is past the end of its range", owner, name);
            return None;
        }
        _ => {}
    }

    let wildcard = if want_wildcard {
        let common = name
            .common_suffix_len(owner)
            .max(name.common_suffix_len(&nsec.next));
        name.suffix(common).wildcard().ok()
    } else {
        None
    };
    trace!("NSEC at {} proves {} does not exist", owner, name);

    Some(NsecProof {
        exists: false,
        data: false,
        wildcard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{Nsec, RData};

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    fn nsec(owner: &str, next: &str, types: &[RecordType]) -> RecordSet {
        RecordSet::new(name(owner), RecordType::NSEC, 300).with_rdata([RData::Nsec(Nsec {
            next: name(next),
            types: types.iter().copied().collect(),
        })])
    }

    #[test]
    fn test_nodata() {
        let set = nsec(
            "a.example.com",
            "c.example.com",
            &[RecordType::A, RecordType::RRSIG, RecordType::NSEC],
        );
        let proof = no_exist_no_data(RecordType::MX, &name("a.example.com"), &set, true).unwrap();
        assert!(proof.exists);
        assert!(!proof.data);
        let proof = no_exist_no_data(RecordType::A, &name("a.example.com"), &set, true).unwrap();
        assert!(proof.data);
    }

    #[test]
    fn test_covering_nsec_yields_wildcard() {
        let set = nsec("a.example.com", "c.example.com", &[RecordType::A]);
        let proof = no_exist_no_data(RecordType::A, &name("b.example.com"), &set, true).unwrap();
        assert!(!proof.exists);
        assert_eq!(proof.wildcard, Some(name("*.example.com")));

        let deep = no_exist_no_data(RecordType::A, &name("x.b.example.com"), &set, true).unwrap();
        assert_eq!(deep.wildcard, Some(name("*.example.com")));

        let no_wild = no_exist_no_data(RecordType::A, &name("b.example.com"), &set, false).unwrap();
        assert_eq!(no_wild.wildcard, None);
    }

    #[test]
    fn test_name_outside_range() {
        let set = nsec("b.example.com", "d.example.com", &[RecordType::A]);
        assert!(no_exist_no_data(RecordType::A, &name("a.example.com"), &set, true).is_none());
        assert!(no_exist_no_data(RecordType::A, &name("e.example.com"), &set, true).is_none());
        assert!(no_exist_no_data(RecordType::A, &name("d.example.com"), &set, true).is_none());
    }

    #[test]
    fn test_last_nsec_wraps_to_apex() {
        let set = nsec("m.example.com", "example.com", &[RecordType::A]);
        let proof = no_exist_no_data(RecordType::A, &name("z.example.com"), &set, true).unwrap();
        assert!(!proof.exists);
    }

    #[test]
    fn test_empty_non_terminal() {
        let set = nsec("a.example.com", "x.b.example.com", &[RecordType::A]);
        let proof = no_exist_no_data(RecordType::A, &name("b.example.com"), &set, true).unwrap();
        assert!(proof.exists);
        assert!(!proof.data);
    }

    #[test]
    fn test_delegation_nsec() {
        let set = nsec(
            "sub.example.com",
            "t.example.com",
            &[RecordType::NS, RecordType::RRSIG, RecordType::NSEC],
        );
        let ds = no_exist_no_data(RecordType::DS, &name("sub.example.com"), &set, true).unwrap();
        assert!(ds.exists);
        assert!(!ds.data);
        assert!(no_exist_no_data(RecordType::A, &name("sub.example.com"), &set, true).is_none());
        assert!(no_exist_no_data(RecordType::A, &name("www.sub.example.com"), &set, true).is_none());
    }

    #[test]
    fn test_child_apex_nsec_ignored_for_ds() {
        let set = nsec(
            "sub.example.com",
            "a.sub.example.com",
            &[RecordType::NS, RecordType::SOA, RecordType::DNSKEY],
        );
        assert!(no_exist_no_data(RecordType::DS, &name("sub.example.com"), &set, true).is_none());
    }

    #[test]
    fn test_cname_bit() {
        let set = nsec("a.example.com", "c.example.com", &[RecordType::CNAME]);
        assert!(no_exist_no_data(RecordType::A, &name("a.example.com"), &set, true).is_none());
        assert!(no_exist_no_data(RecordType::CNAME, &name("a.example.com"), &set, true).is_some());
    }
}
