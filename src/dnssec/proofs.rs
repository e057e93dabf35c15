use crate::dns::Name;
use std::fmt;

/// The four facts a negative answer may need proven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProofKind {
    /// The name exists but lacks the queried type
    NoData = 0,
    /// The query name does not exist
    NoQName = 1,
    /// No wildcard could have synthesized the answer
    NoWildcard = 2,
    /// The longest existing ancestor of the query name
    ClosestEncloser = 3,
}

impl ProofKind {
    pub const ALL: [ProofKind; 4] = [
        ProofKind::NoData,
        ProofKind::NoQName,
        ProofKind::NoWildcard,
        ProofKind::ClosestEncloser,
    ];

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for ProofKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProofKind::NoData => "NODATA",
            ProofKind::NoQName => "NOQNAME",
            ProofKind::NoWildcard => "NOWILDCARD",
            ProofKind::ClosestEncloser => "CLOSEST-ENCLOSER",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProofKindSet(u8);

impl ProofKindSet {
    pub fn insert(&mut self, kind: ProofKind) {
        self.0 |= kind.bit();
    }

    pub fn contains(self, kind: ProofKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<ProofKind> for ProofKindSet {
    fn from_iter<T: IntoIterator<Item = ProofKind>>(iter: T) -> Self {
        let mut set = Self::default();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

/// Proof record owner names, indexed by `ProofKind`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProofNames([Option<Name>; 4]);

impl ProofNames {
    pub fn get(&self, kind: ProofKind) -> Option<&Name> {
        self.0[kind as usize].as_ref()
    }

    pub fn as_array(&self) -> &[Option<Name>; 4] {
        &self.0
    }
}

/// Needed/found bookkeeping for one negative-proof attempt.
///
/// A proof slot, once written, keeps its name for the rest of the attempt.
#[derive(Debug, Clone, Default)]
pub struct ProofAccumulator {
    needed: ProofKindSet,
    found: ProofKindSet,
    proofs: ProofNames,
    opt_out: bool,
    unknown_hash: bool,
}

impl ProofAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn need(&mut self, kind: ProofKind) {
        self.needed.insert(kind);
    }

    pub fn needs(&self, kind: ProofKind) -> bool {
        self.needed.contains(kind)
    }

    pub fn mark_found(&mut self, kind: ProofKind) {
        self.found.insert(kind);
    }

    pub fn found(&self, kind: ProofKind) -> bool {
        self.found.contains(kind)
    }

    /// Record the owner of the record proving `kind`. Returns false when
    /// the slot was already filled, leaving it unchanged.
    pub fn record(&mut self, kind: ProofKind, name: &Name) -> bool {
        let slot = &mut self.proofs.0[kind as usize];
        if slot.is_some() {
            return false;
        }
        *slot = Some(name.clone());
        true
    }

    pub fn proof(&self, kind: ProofKind) -> Option<&Name> {
        self.proofs.get(kind)
    }

    pub fn set_opt_out(&mut self) {
        self.opt_out = true;
    }

    pub fn opt_out(&self) -> bool {
        self.opt_out
    }

    pub fn set_unknown_hash(&mut self) {
        self.unknown_hash = true;
    }

    pub fn unknown_hash(&self) -> bool {
        self.unknown_hash
    }

    pub fn names(&self) -> ProofNames {
        self.proofs.clone()
    }
}
