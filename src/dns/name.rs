use crate::error::{DnsError, Result};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 255;

/// How one name sits relative to another in the DNS tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameRelation {
    Equal,
    /// The left-hand name is strictly below the right-hand name
    Subdomain,
    /// The left-hand name is strictly above the right-hand name
    Superdomain,
    /// The names only share an ancestor
    CommonAncestor,
}

/// An absolute domain name.
///
/// Labels are stored lowercased, most specific first, without the root
/// label. `label_count` therefore returns 0 for the root.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Name {
    labels: SmallVec<[Vec<u8>; 4]>,
}

impl Name {
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a name from raw labels, most specific first
    pub fn from_labels<I, L>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = L>,
        L: AsRef<[u8]>,
    {
        let mut out = SmallVec::new();
        let mut wire_len = 1;
        for label in labels {
            let label = label.as_ref();
            if label.is_empty() {
                return Err(DnsError::EmptyLabel);
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(DnsError::InvalidLabelLength(label.len()));
            }
            wire_len += label.len() + 1;
            if wire_len > MAX_NAME_LEN {
                return Err(DnsError::NameTooLong);
            }
            out.push(label.to_ascii_lowercase());
        }
        Ok(Self { labels: out })
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> impl Iterator<Item = &[u8]> {
        self.labels.iter().map(|l| l.as_slice())
    }

    pub fn first_label(&self) -> Option<&[u8]> {
        self.labels.first().map(|l| l.as_slice())
    }

    pub fn is_wildcard(&self) -> bool {
        self.first_label() == Some(b"*")
    }

    /// The name with its first label removed; `None` for the root
    pub fn parent(&self) -> Option<Name> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            labels: self.labels[1..].iter().cloned().collect(),
        })
    }

    /// The rightmost `count` labels of this name
    pub fn suffix(&self, count: usize) -> Name {
        let count = count.min(self.labels.len());
        let skip = self.labels.len() - count;
        Self {
            labels: self.labels[skip..].iter().cloned().collect(),
        }
    }

    pub fn prepend_label(&self, label: &[u8]) -> Result<Name> {
        Self::from_labels(std::iter::once(label).chain(self.labels()))
    }

    /// `*.<self>`
    pub fn wildcard(&self) -> Result<Name> {
        self.prepend_label(b"*")
    }

    /// Number of trailing labels both names share
    pub fn common_suffix_len(&self, other: &Name) -> usize {
        self.labels
            .iter()
            .rev()
            .zip(other.labels.iter().rev())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// True when `self` equals `other` or sits below it
    pub fn is_subdomain_of(&self, other: &Name) -> bool {
        self.label_count() >= other.label_count()
            && self.common_suffix_len(other) == other.label_count()
    }

    pub fn relation(&self, other: &Name) -> NameRelation {
        let common = self.common_suffix_len(other);
        match (common == self.label_count(), common == other.label_count()) {
            (true, true) => NameRelation::Equal,
            (false, true) => NameRelation::Subdomain,
            (true, false) => NameRelation::Superdomain,
            (false, false) => NameRelation::CommonAncestor,
        }
    }

    /// Canonical DNS name order (RFC 4034 section 6.1)
    pub fn canonical_cmp(&self, other: &Name) -> Ordering {
        for (a, b) in self.labels.iter().rev().zip(other.labels.iter().rev()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                order => return order,
            }
        }
        self.label_count().cmp(&other.label_count())
    }

    /// Uncompressed wire form
    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(self.wire_len());
        for label in &self.labels {
            wire.push(label.len() as u8);
            wire.extend_from_slice(label);
        }
        wire.push(0);
        wire
    }

    pub fn wire_len(&self) -> usize {
        self.labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1
    }
}

impl FromStr for Name {
    type Err = DnsError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.strip_suffix('.').unwrap_or(s);
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        Self::from_labels(trimmed.split('.').map(str::as_bytes))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical_cmp(other)
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }
        for label in &self.labels {
            for &byte in label {
                match byte {
                    b'.' | b'\\' => write!(f, "\\{}", byte as char)?,
                    0x21..=0x7e => write!(f, "{}", byte as char)?,
                    _ => write!(f, "\\{:03}", byte)?,
                }
            }
            f.write_str(".")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(name("Example.COM").to_string(), "example.com.");
        assert_eq!(name("example.com.").label_count(), 2);
        assert!(name(".").is_root());
        assert_eq!(Name::root().to_string(), ".");
    }

    #[test]
    fn test_invalid_names() {
        assert_eq!("a..b".parse::<Name>(), Err(DnsError::EmptyLabel));
        let long = "a".repeat(64);
        assert_eq!(long.parse::<Name>(), Err(DnsError::InvalidLabelLength(64)));
        let too_long = vec!["abcdefghi"; 30].join(".");
        assert_eq!(too_long.parse::<Name>(), Err(DnsError::NameTooLong));
    }

    #[test]
    fn test_parent_and_suffix() {
        let n = name("www.example.com");
        assert_eq!(n.parent(), Some(name("example.com")));
        assert_eq!(n.suffix(1), name("com"));
        assert_eq!(n.suffix(0), Name::root());
        assert_eq!(n.suffix(7), n);
        assert_eq!(Name::root().parent(), None);
    }

    #[test]
    fn test_relations() {
        let a = name("a.example.com");
        let b = name("b.example.com");
        let zone = name("example.com");
        assert_eq!(a.relation(&zone), NameRelation::Subdomain);
        assert_eq!(zone.relation(&a), NameRelation::Superdomain);
        assert_eq!(a.relation(&b), NameRelation::CommonAncestor);
        assert_eq!(a.relation(&a), NameRelation::Equal);
        assert!(a.is_subdomain_of(&zone));
        assert!(zone.is_subdomain_of(&zone));
        assert!(!zone.is_subdomain_of(&a));
        assert!(a.is_subdomain_of(&Name::root()));
        assert_eq!(a.common_suffix_len(&b), 2);
    }

    #[test]
    fn test_canonical_order() {
        // RFC 4034 section 6.1, minus the escaped labels
        let ordered = [
            "example",
            "a.example",
            "yljkjljk.a.example",
            "z.a.example",
            "zabc.a.example",
            "z.example",
            "*.z.example",
        ];
        for pair in ordered.windows(2) {
            assert_eq!(
                name(pair[0]).canonical_cmp(&name(pair[1])),
                Ordering::Less,
                "{} < {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_wildcard_and_wire() {
        let w = name("example.com").wildcard().unwrap();
        assert!(w.is_wildcard());
        assert_eq!(w.to_string(), "*.example.com.");
        assert_eq!(
            name("ab.c").to_wire(),
            vec![2, b'a', b'b', 1, b'c', 0]
        );
        assert_eq!(Name::root().to_wire(), vec![0]);
    }
}
