use super::{Dnskey, Ds, Name, Nsec, Nsec3, RData, RecordType, ResponseCode, Rrsig};

/// How much a record set is trusted, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Trust {
    #[default]
    None,
    PendingAdditional,
    PendingAnswer,
    Additional,
    Glue,
    Answer,
    AuthAuthority,
    AuthAnswer,
    Secure,
    Ultimate,
}

impl Trust {
    /// Received but not yet validated
    pub fn is_pending(self) -> bool {
        matches!(self, Trust::PendingAdditional | Trust::PendingAnswer)
    }

    /// Accepted as an answer without a security proof
    pub fn is_answer(self) -> bool {
        self == Trust::Answer
    }

    pub fn is_secure(self) -> bool {
        self >= Trust::Secure
    }
}

/// An RRset plus the trust level the cache attached to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSet {
    pub name: Name,
    pub rtype: RecordType,
    pub ttl: u32,
    pub trust: Trust,
    pub rdata: Vec<RData>,
}

impl RecordSet {
    /// A fresh, not yet validated set
    pub fn new(name: Name, rtype: RecordType, ttl: u32) -> Self {
        Self {
            name,
            rtype,
            ttl,
            trust: Trust::PendingAnswer,
            rdata: Vec::new(),
        }
    }

    pub fn with_trust(mut self, trust: Trust) -> Self {
        self.trust = trust;
        self
    }

    pub fn with_rdata(mut self, rdata: impl IntoIterator<Item = RData>) -> Self {
        self.rdata.extend(rdata);
        self
    }

    pub fn push(&mut self, rdata: RData) {
        self.rdata.push(rdata);
    }

    pub fn len(&self) -> usize {
        self.rdata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rdata.is_empty()
    }

    pub fn dnskeys(&self) -> impl Iterator<Item = &Dnskey> {
        self.rdata.iter().filter_map(|rd| match rd {
            RData::Dnskey(k) => Some(k),
            _ => None,
        })
    }

    pub fn ds_records(&self) -> impl Iterator<Item = &Ds> {
        self.rdata.iter().filter_map(|rd| match rd {
            RData::Ds(d) => Some(d),
            _ => None,
        })
    }

    pub fn rrsigs(&self) -> impl Iterator<Item = &Rrsig> {
        self.rdata.iter().filter_map(|rd| match rd {
            RData::Rrsig(s) => Some(s),
            _ => None,
        })
    }

    /// An NSEC set holds a single record
    pub fn nsec(&self) -> Option<&Nsec> {
        self.rdata.iter().find_map(|rd| match rd {
            RData::Nsec(n) => Some(n),
            _ => None,
        })
    }

    pub fn nsec3_records(&self) -> impl Iterator<Item = &Nsec3> {
        self.rdata.iter().filter_map(|rd| match rd {
            RData::Nsec3(n) => Some(n),
            _ => None,
        })
    }
}

/// A record set together with the RRSIG set covering it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedSet {
    pub rrset: RecordSet,
    pub sigs: Option<RecordSet>,
}

impl SignedSet {
    pub fn new(rrset: RecordSet, sigs: Option<RecordSet>) -> Self {
        Self { rrset, sigs }
    }

    /// Apply a trust level to the set and its signatures
    pub fn set_trust(&mut self, trust: Trust) {
        self.rrset.trust = trust;
        if let Some(sigs) = self.sigs.as_mut() {
            sigs.trust = trust;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegativeKind {
    NxDomain,
    NoData,
}

/// A cached negative answer and the denial records that came with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegativeEntry {
    pub name: Name,
    pub covers: RecordType,
    pub kind: NegativeKind,
    pub trust: Trust,
    pub records: Vec<SignedSet>,
}

impl NegativeEntry {
    pub fn new(name: Name, covers: RecordType, kind: NegativeKind) -> Self {
        Self {
            name,
            covers,
            kind,
            trust: Trust::PendingAnswer,
            records: Vec::new(),
        }
    }

    pub fn with_records(mut self, records: impl IntoIterator<Item = SignedSet>) -> Self {
        self.records.extend(records);
        self
    }

    pub fn with_trust(mut self, trust: Trust) -> Self {
        self.trust = trust;
        self
    }

    /// The denial set of `rtype` owned by `name`, if cached with the entry
    pub fn find(&self, name: &Name, rtype: RecordType) -> Option<&RecordSet> {
        self.records
            .iter()
            .map(|s| &s.rrset)
            .find(|rrset| rrset.rtype == rtype && &rrset.name == name)
    }
}

/// The parts of a response message the engine reads
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub rcode: ResponseCode,
    pub authority: Vec<SignedSet>,
}

impl Message {
    pub fn new(rcode: ResponseCode) -> Self {
        Self {
            rcode,
            authority: Vec::new(),
        }
    }

    pub fn with_authority(mut self, authority: impl IntoIterator<Item = SignedSet>) -> Self {
        self.authority.extend(authority);
        self
    }
}
