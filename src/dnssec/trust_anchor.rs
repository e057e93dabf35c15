use super::DigestType;
use crate::config::{AnchorKind, TrustAnchorConfig};
use crate::dns::{Dnskey, Ds, Name, RData, RecordSet, RecordType, Trust};
use crate::error::ConfigError;
use crate::traits::TrustAnchors;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// IANA root zone KSK digests (KSK-2017 and KSK-2024)
const ROOT_ANCHORS: &[(u16, u8, u8, &str)] = &[
    (
        20326,
        8,
        2,
        "E06D44B80B8F1D39A95C0B0D7C65D08458E880409BBC683457104237C7F8EC8D",
    ),
    (
        38696,
        8,
        2,
        "683D2D0ACB8C9B712A1948B27F741219298D0A450D612C483AF444A4C0FB2B16",
    ),
];

/// A DNSSEC trust anchor. Key anchors are held as their SHA-256 DS digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchor {
    pub name: Name,
    pub ds: Ds,
}

impl TrustAnchor {
    pub fn from_ds(name: Name, ds: Ds) -> Self {
        Self { name, ds }
    }

    /// Convert a key anchor into the DS digest the chain walk matches on
    pub fn from_key(name: Name, key: &Dnskey) -> Option<Self> {
        let digest = DigestType::Sha256.ds_digest(&name, key)?;
        Some(Self {
            ds: Ds {
                key_tag: key.key_tag(),
                algorithm: key.algorithm,
                digest_type: DigestType::Sha256.to_u8(),
                digest,
            },
            name,
        })
    }

    pub fn from_config(config: &TrustAnchorConfig) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidTrustAnchor {
            name: config.name.clone(),
            reason: reason.to_string(),
        };
        let name: Name = config
            .name
            .parse()
            .map_err(|_| ConfigError::InvalidName(config.name.clone()))?;

        match config.kind {
            AnchorKind::Ds => {
                let key_tag = config.key_tag.ok_or_else(|| invalid("missing key_tag"))?;
                let digest_type = config
                    .digest_type
                    .ok_or_else(|| invalid("missing digest_type"))?;
                let digest = config
                    .digest
                    .as_deref()
                    .ok_or_else(|| invalid("missing digest"))?;
                let digest = hex::decode(digest).map_err(|_| invalid("digest is not hex"))?;
                Ok(Self::from_ds(
                    name,
                    Ds {
                        key_tag,
                        algorithm: config.algorithm,
                        digest_type,
                        digest,
                    },
                ))
            }
            AnchorKind::Key => {
                let public_key = config
                    .public_key
                    .as_deref()
                    .ok_or_else(|| invalid("missing public_key"))?;
                let public_key = base64::Engine::decode(
                    &base64::engine::general_purpose::STANDARD,
                    public_key,
                )
                .map_err(|_| invalid("public_key is not base64"))?;
                let key = Dnskey::new(config.flags.unwrap_or(257), config.algorithm, public_key);
                Self::from_key(name, &key).ok_or_else(|| invalid("cannot digest key"))
            }
        }
    }
}

/// Trust anchor store for managing DNSSEC trust anchors
#[derive(Clone)]
pub struct TrustAnchorStore {
    anchors: Arc<RwLock<HashMap<Name, Vec<Ds>>>>,
}

impl TrustAnchorStore {
    /// A store holding the root trust anchors
    pub fn new() -> Self {
        let store = Self::empty();
        store.add_root_trust_anchors();
        store
    }

    pub fn empty() -> Self {
        Self {
            anchors: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn from_config(
        anchors: &[TrustAnchorConfig],
        include_root: bool,
    ) -> Result<Self, ConfigError> {
        let store = if include_root { Self::new() } else { Self::empty() };
        for config in anchors {
            store.add_anchor(TrustAnchor::from_config(config)?);
        }
        Ok(store)
    }

    fn add_root_trust_anchors(&self) {
        for &(key_tag, algorithm, digest_type, digest) in ROOT_ANCHORS {
            match hex::decode(digest) {
                Ok(digest) => self.add_anchor(TrustAnchor::from_ds(
                    Name::root(),
                    Ds {
                        key_tag,
                        algorithm,
                        digest_type,
                        digest,
                    },
                )),
                Err(e) => warn!("Skipping root anchor {}: {}", key_tag, e),
            }
        }
    }

    pub fn add_anchor(&self, anchor: TrustAnchor) {
        debug!("Adding trust anchor {} key tag {}", anchor.name, anchor.ds.key_tag);
        let mut anchors = self.anchors.write();
        let entry = anchors.entry(anchor.name).or_default();
        if !entry.contains(&anchor.ds) {
            entry.push(anchor.ds);
        }
    }

    pub fn remove(&self, name: &Name) -> bool {
        self.anchors.write().remove(name).is_some()
    }

    /// Anchors configured at exactly `name`
    pub fn get_anchors(&self, name: &Name) -> Option<Vec<Ds>> {
        self.anchors.read().get(name).cloned()
    }

    pub fn clear(&self) {
        self.anchors.write().clear();
    }

    pub fn domain_count(&self) -> usize {
        self.anchors.read().len()
    }
}

impl Default for TrustAnchorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustAnchors for TrustAnchorStore {
    fn find(&self, name: &Name) -> Option<RecordSet> {
        let anchors = self.anchors.read();
        let ds = anchors.get(name)?;
        Some(
            RecordSet::new(name.clone(), RecordType::DS, 0)
                .with_trust(Trust::Ultimate)
                .with_rdata(ds.iter().cloned().map(RData::Ds)),
        )
    }

    fn find_deepest(&self, name: &Name) -> Option<Name> {
        let anchors = self.anchors.read();
        let mut current = Some(name.clone());
        while let Some(candidate) = current {
            if anchors.contains_key(&candidate) {
                return Some(candidate);
            }
            current = candidate.parent();
        }
        None
    }
}
