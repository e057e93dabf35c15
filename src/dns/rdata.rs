use super::{Name, RecordType};
use crate::dnssec::calculate_key_tag;
use std::collections::BTreeSet;

/// Set of types carried by NSEC and NSEC3 records (RFC 4034 section 4.1.2)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeBitmap {
    types: BTreeSet<RecordType>,
}

impl TypeBitmap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, rtype: RecordType) -> bool {
        self.types.contains(&rtype)
    }

    pub fn insert(&mut self, rtype: RecordType) {
        self.types.insert(rtype);
    }

    pub fn iter(&self) -> impl Iterator<Item = RecordType> + '_ {
        self.types.iter().copied()
    }

    /// Windowed bitmap encoding
    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire = Vec::new();
        let mut window: Option<u8> = None;
        let mut bits = [0u8; 32];
        let mut used = 0usize;

        let flush = |window: u8, bits: &[u8; 32], used: usize, wire: &mut Vec<u8>| {
            wire.push(window);
            wire.push(used as u8);
            wire.extend_from_slice(&bits[..used]);
        };

        for rtype in &self.types {
            let hi = (rtype.0 >> 8) as u8;
            let lo = (rtype.0 & 0xff) as u8;
            if window != Some(hi) {
                if let Some(w) = window {
                    flush(w, &bits, used, &mut wire);
                }
                window = Some(hi);
                bits = [0u8; 32];
                used = 0;
            }
            let byte = (lo / 8) as usize;
            bits[byte] |= 0x80 >> (lo % 8);
            used = used.max(byte + 1);
        }
        if let Some(w) = window {
            flush(w, &bits, used, &mut wire);
        }
        wire
    }
}

impl FromIterator<RecordType> for TypeBitmap {
    fn from_iter<T: IntoIterator<Item = RecordType>>(iter: T) -> Self {
        Self {
            types: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dnskey {
    pub flags: u16,
    pub protocol: u8,
    pub algorithm: u8,
    pub public_key: Vec<u8>,
}

impl Dnskey {
    pub const ZONE_KEY: u16 = 0x0100;
    pub const REVOKE: u16 = 0x0080;
    pub const SECURE_ENTRY_POINT: u16 = 0x0001;

    pub fn new(flags: u16, algorithm: u8, public_key: Vec<u8>) -> Self {
        Self {
            flags,
            protocol: 3,
            algorithm,
            public_key,
        }
    }

    pub fn is_zone_key(&self) -> bool {
        self.flags & Self::ZONE_KEY != 0
    }

    pub fn is_revoked(&self) -> bool {
        self.flags & Self::REVOKE != 0
    }

    pub fn is_sep(&self) -> bool {
        self.flags & Self::SECURE_ENTRY_POINT != 0
    }

    pub fn key_tag(&self) -> u16 {
        calculate_key_tag(self.flags, self.protocol, self.algorithm, &self.public_key)
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(4 + self.public_key.len());
        wire.extend_from_slice(&self.flags.to_be_bytes());
        wire.push(self.protocol);
        wire.push(self.algorithm);
        wire.extend_from_slice(&self.public_key);
        wire
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ds {
    pub key_tag: u16,
    pub algorithm: u8,
    pub digest_type: u8,
    pub digest: Vec<u8>,
}

impl Ds {
    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(4 + self.digest.len());
        wire.extend_from_slice(&self.key_tag.to_be_bytes());
        wire.push(self.algorithm);
        wire.push(self.digest_type);
        wire.extend_from_slice(&self.digest);
        wire
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rrsig {
    pub type_covered: RecordType,
    pub algorithm: u8,
    pub labels: u8,
    pub original_ttl: u32,
    pub expiration: u32,
    pub inception: u32,
    pub key_tag: u16,
    pub signer: Name,
    pub signature: Vec<u8>,
}

impl Rrsig {
    /// RDATA up to and including the signer name, the prefix of the signed data
    pub fn to_wire_without_signature(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(18 + self.signer.wire_len());
        wire.extend_from_slice(&self.type_covered.0.to_be_bytes());
        wire.push(self.algorithm);
        wire.push(self.labels);
        wire.extend_from_slice(&self.original_ttl.to_be_bytes());
        wire.extend_from_slice(&self.expiration.to_be_bytes());
        wire.extend_from_slice(&self.inception.to_be_bytes());
        wire.extend_from_slice(&self.key_tag.to_be_bytes());
        wire.extend_from_slice(&self.signer.to_wire());
        wire
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire = self.to_wire_without_signature();
        wire.extend_from_slice(&self.signature);
        wire
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nsec {
    pub next: Name,
    pub types: TypeBitmap,
}

impl Nsec {
    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire = self.next.to_wire();
        wire.extend_from_slice(&self.types.to_wire());
        wire
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nsec3 {
    pub hash_algorithm: u8,
    pub flags: u8,
    pub iterations: u16,
    pub salt: Vec<u8>,
    pub next_hashed: Vec<u8>,
    pub types: TypeBitmap,
}

impl Nsec3 {
    pub const OPT_OUT: u8 = 0x01;

    pub fn opt_out(&self) -> bool {
        self.flags & Self::OPT_OUT != 0
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire = Vec::new();
        wire.push(self.hash_algorithm);
        wire.push(self.flags);
        wire.extend_from_slice(&self.iterations.to_be_bytes());
        wire.push(self.salt.len() as u8);
        wire.extend_from_slice(&self.salt);
        wire.push(self.next_hashed.len() as u8);
        wire.extend_from_slice(&self.next_hashed);
        wire.extend_from_slice(&self.types.to_wire());
        wire
    }
}

/// Record data the engine understands; anything else is carried opaquely
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    Dnskey(Dnskey),
    Ds(Ds),
    Rrsig(Rrsig),
    Nsec(Nsec),
    Nsec3(Nsec3),
    Other(Vec<u8>),
}

impl RData {
    /// Canonical wire form of the RDATA
    pub fn to_wire(&self) -> Vec<u8> {
        match self {
            RData::Dnskey(k) => k.to_wire(),
            RData::Ds(d) => d.to_wire(),
            RData::Rrsig(s) => s.to_wire(),
            RData::Nsec(n) => n.to_wire(),
            RData::Nsec3(n) => n.to_wire(),
            RData::Other(bytes) => bytes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_bitmap_wire() {
        // RFC 4034 section 4.3 example: A MX RRSIG NSEC TYPE1234
        let bitmap: TypeBitmap = [
            RecordType::A,
            RecordType::MX,
            RecordType::RRSIG,
            RecordType::NSEC,
            RecordType(1234),
        ]
        .into_iter()
        .collect();
        let expected = hex::decode(
            "0006400100000003041b000000000000000000000000000000000000000000000000000020",
        )
        .unwrap();
        assert_eq!(bitmap.to_wire(), expected);
    }

    #[test]
    fn test_empty_bitmap() {
        assert!(TypeBitmap::new().to_wire().is_empty());
    }

    #[test]
    fn test_dnskey_flags() {
        let key = Dnskey::new(257, 15, vec![0; 32]);
        assert!(key.is_zone_key());
        assert!(key.is_sep());
        assert!(!key.is_revoked());
        let revoked = Dnskey::new(257 | Dnskey::REVOKE, 15, vec![0; 32]);
        assert!(revoked.is_revoked());
    }

    #[test]
    fn test_nsec3_opt_out() {
        let nsec3 = Nsec3 {
            hash_algorithm: 1,
            flags: 1,
            iterations: 0,
            salt: vec![],
            next_hashed: vec![0; 20],
            types: TypeBitmap::new(),
        };
        assert!(nsec3.opt_out());
    }
}
