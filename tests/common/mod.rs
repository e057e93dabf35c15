//! Shared fixtures for validator tests: Ed25519-signed zones, a scripted
//! record source and a root-com-example.com chain of trust.

#![allow(dead_code)] // Each test binary uses a different subset

use async_trait::async_trait;
use heimdall_dnssec::config::ValidatorConfig;
use heimdall_dnssec::dns::{
    Dnskey, Ds, Message, Name, Nsec, Nsec3, RData, RecordSet, RecordType, ResponseCode, Rrsig,
    SignedSet, Trust, TypeBitmap,
};
use heimdall_dnssec::dnssec::crypto::{nsec3_sha1, signed_data};
use heimdall_dnssec::dnssec::{ConfiguredPolicy, DigestType, TrustAnchor, TrustAnchorStore};
use heimdall_dnssec::traits::{FetchError, FetchOptions, Lookup, RecordSource};
use heimdall_dnssec::{Collaborators, Validator};
use parking_lot::Mutex;
use ring::signature::{Ed25519KeyPair, KeyPair};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;

pub const ED25519: u8 = 15;
pub const TTL: u32 = 3600;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn name(s: &str) -> Name {
    s.parse().expect("valid test name")
}

pub fn now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs() as u32
}

/// A zone with one key-signing and one zone-signing Ed25519 key
pub struct Zone {
    pub name: Name,
    ksk: Ed25519KeyPair,
    zsk: Ed25519KeyPair,
    pub ksk_key: Dnskey,
    pub zsk_key: Dnskey,
}

impl Zone {
    pub fn new(origin: &str, seed: u8) -> Self {
        let ksk = Ed25519KeyPair::from_seed_unchecked(&[seed; 32]).expect("ksk seed");
        let zsk = Ed25519KeyPair::from_seed_unchecked(&[seed.wrapping_add(100); 32])
            .expect("zsk seed");
        let ksk_key = Dnskey::new(
            Dnskey::ZONE_KEY | Dnskey::SECURE_ENTRY_POINT,
            ED25519,
            ksk.public_key().as_ref().to_vec(),
        );
        let zsk_key = Dnskey::new(Dnskey::ZONE_KEY, ED25519, zsk.public_key().as_ref().to_vec());
        Self {
            name: name(origin),
            ksk,
            zsk,
            ksk_key,
            zsk_key,
        }
    }

    pub fn keyset(&self) -> RecordSet {
        RecordSet::new(self.name.clone(), RecordType::DNSKEY, TTL)
            .with_trust(Trust::PendingAnswer)
            .with_rdata([
                RData::Dnskey(self.ksk_key.clone()),
                RData::Dnskey(self.zsk_key.clone()),
            ])
    }

    /// The DNSKEY set signed by the KSK
    pub fn signed_keyset(&self) -> SignedSet {
        let keys = self.keyset();
        let sigs = sign_rrset(&keys, &keys.name, &self.ksk, &self.ksk_key, &self.name);
        SignedSet::new(keys, Some(sigs))
    }

    /// The parent-side DS record for the KSK
    pub fn ds(&self, digest_type: DigestType) -> Ds {
        Ds {
            key_tag: self.ksk_key.key_tag(),
            algorithm: ED25519,
            digest_type: digest_type.to_u8(),
            digest: digest_type
                .ds_digest(&self.name, &self.ksk_key)
                .expect("supported digest"),
        }
    }

    /// Sign `rrset` with the ZSK under its own owner name
    pub fn sign(&self, rrset: RecordSet) -> SignedSet {
        let owner = rrset.name.clone();
        self.sign_as(rrset, &owner)
    }

    /// Sign `rrset` as if it were owned by `owner`; a wildcard owner gives
    /// the signature of a wildcard expansion
    pub fn sign_as(&self, rrset: RecordSet, owner: &Name) -> SignedSet {
        let sigs = sign_rrset(&rrset, owner, &self.zsk, &self.zsk_key, &self.name);
        SignedSet::new(rrset, Some(sigs))
    }

    /// Sign with the ZSK over an explicit validity period
    pub fn sign_during(&self, rrset: RecordSet, inception: u32, expiration: u32) -> SignedSet {
        let owner = rrset.name.clone();
        let sigs = sign_rrset_during(
            &rrset,
            &owner,
            &self.zsk,
            &self.zsk_key,
            &self.name,
            (inception, expiration),
        );
        SignedSet::new(rrset, Some(sigs))
    }
}

pub fn sign_rrset(
    rrset: &RecordSet,
    owner: &Name,
    pair: &Ed25519KeyPair,
    key: &Dnskey,
    signer: &Name,
) -> RecordSet {
    let now = now();
    sign_rrset_during(rrset, owner, pair, key, signer, (now - 3600, now + 30 * 86_400))
}

pub fn sign_rrset_during(
    rrset: &RecordSet,
    owner: &Name,
    pair: &Ed25519KeyPair,
    key: &Dnskey,
    signer: &Name,
    (inception, expiration): (u32, u32),
) -> RecordSet {
    let labels = owner.label_count() - usize::from(owner.is_wildcard());
    let mut sig = Rrsig {
        type_covered: rrset.rtype,
        algorithm: ED25519,
        labels: labels as u8,
        original_ttl: rrset.ttl,
        expiration,
        inception,
        key_tag: key.key_tag(),
        signer: signer.clone(),
        signature: Vec::new(),
    };
    let data = signed_data(owner, rrset, &sig);
    sig.signature = pair.sign(&data).as_ref().to_vec();
    RecordSet::new(rrset.name.clone(), RecordType::RRSIG, rrset.ttl)
        .with_trust(rrset.trust)
        .with_rdata([RData::Rrsig(sig)])
}

pub fn a_record(owner: &str, addr: [u8; 4]) -> RecordSet {
    RecordSet::new(name(owner), RecordType::A, 300)
        .with_trust(Trust::PendingAnswer)
        .with_rdata([RData::Other(addr.to_vec())])
}

pub fn soa_record(owner: &str) -> RecordSet {
    RecordSet::new(name(owner), RecordType::SOA, 300)
        .with_trust(Trust::PendingAnswer)
        .with_rdata([RData::Other(b"\x02ns\x00\x05admin\x00serial".to_vec())])
}

pub fn ds_set(owner: &Name, records: impl IntoIterator<Item = Ds>) -> RecordSet {
    RecordSet::new(owner.clone(), RecordType::DS, TTL)
        .with_trust(Trust::PendingAnswer)
        .with_rdata(records.into_iter().map(RData::Ds))
}

pub fn nsec_record(owner: &str, next: &str, types: &[RecordType]) -> RecordSet {
    RecordSet::new(name(owner), RecordType::NSEC, 300)
        .with_trust(Trust::PendingAnswer)
        .with_rdata([RData::Nsec(Nsec {
            next: name(next),
            types: types.iter().copied().collect::<TypeBitmap>(),
        })])
}

/// Hashed owner name of `original` inside `zone`
pub fn nsec3_owner(original: &Name, zone: &Name, iterations: u16) -> Name {
    let hash = nsec3_sha1(original, iterations, &[]);
    let label = base32::encode(base32::Alphabet::Rfc4648Hex { padding: false }, &hash)
        .to_ascii_lowercase();
    zone.prepend_label(label.as_bytes()).expect("hash label fits")
}

/// A complete NSEC3 chain (SHA-1, empty salt) over `names`, each paired
/// with the types it owns
pub fn nsec3_chain(
    zone: &Name,
    names: &[(Name, Vec<RecordType>)],
    iterations: u16,
    flags: u8,
) -> Vec<RecordSet> {
    let mut hashed: Vec<(Vec<u8>, &Vec<RecordType>)> = names
        .iter()
        .map(|(n, types)| (nsec3_sha1(n, iterations, &[]), types))
        .collect();
    hashed.sort();
    let count = hashed.len();
    (0..count)
        .map(|i| {
            let (hash, types) = &hashed[i];
            let next = hashed[(i + 1) % count].0.clone();
            let label = base32::encode(base32::Alphabet::Rfc4648Hex { padding: false }, hash)
                .to_ascii_lowercase();
            let owner = zone.prepend_label(label.as_bytes()).expect("hash label fits");
            RecordSet::new(owner, RecordType::NSEC3, 300)
                .with_trust(Trust::PendingAnswer)
                .with_rdata([RData::Nsec3(Nsec3 {
                    hash_algorithm: 1,
                    flags,
                    iterations,
                    salt: Vec::new(),
                    next_hashed: next,
                    types: types.iter().copied().collect::<TypeBitmap>(),
                })])
        })
        .collect()
}

pub fn response(rcode: ResponseCode, authority: impl IntoIterator<Item = SignedSet>) -> Message {
    Message::new(rcode).with_authority(authority)
}

/// Record source backed by two tables: what the cache holds and what a
/// fetch returns. Unscripted fetches answer NXDOMAIN without proof.
pub struct FakeSource {
    cache: Mutex<HashMap<(Name, RecordType), Lookup>>,
    answers: Mutex<HashMap<(Name, RecordType), Result<Lookup, FetchError>>>,
    fetches: Mutex<Vec<(Name, RecordType)>>,
    zone_cuts: Mutex<Vec<Name>>,
    hang: AtomicBool,
    pub fetch_started: Notify,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            answers: Mutex::new(HashMap::new()),
            fetches: Mutex::new(Vec::new()),
            zone_cuts: Mutex::new(Vec::new()),
            hang: AtomicBool::new(false),
            fetch_started: Notify::new(),
        }
    }

    pub fn cache(&self, owner: &Name, rtype: RecordType, lookup: Lookup) {
        self.cache.lock().insert((owner.clone(), rtype), lookup);
    }

    /// Cache a positive set under its own name and type
    pub fn cache_found(&self, set: SignedSet) {
        let key = (set.rrset.name.clone(), set.rrset.rtype);
        self.cache.lock().insert(key, Lookup::Found(set));
    }

    pub fn forget(&self, owner: &Name, rtype: RecordType) {
        self.cache.lock().remove(&(owner.clone(), rtype));
    }

    pub fn answer(&self, owner: &Name, rtype: RecordType, result: Result<Lookup, FetchError>) {
        self.answers.lock().insert((owner.clone(), rtype), result);
    }

    pub fn add_zone_cut(&self, cut: Name) {
        self.zone_cuts.lock().push(cut);
    }

    /// Make every fetch wait forever
    pub fn hang_fetches(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }

    pub fn fetched(&self) -> Vec<(Name, RecordType)> {
        self.fetches.lock().clone()
    }

    pub fn was_fetched(&self, owner: &Name, rtype: RecordType) -> bool {
        self.fetches
            .lock()
            .iter()
            .any(|(n, t)| n == owner && *t == rtype)
    }
}

#[async_trait]
impl RecordSource for FakeSource {
    fn lookup(&self, owner: &Name, rtype: RecordType) -> Lookup {
        self.cache
            .lock()
            .get(&(owner.clone(), rtype))
            .cloned()
            .unwrap_or(Lookup::NotFound)
    }

    async fn fetch(
        &self,
        owner: Name,
        rtype: RecordType,
        _options: FetchOptions,
    ) -> Result<Lookup, FetchError> {
        self.fetches.lock().push((owner.clone(), rtype));
        self.fetch_started.notify_one();
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let answer = self
            .answers
            .lock()
            .get(&(owner, rtype))
            .cloned()
            .unwrap_or(Ok(Lookup::NxDomain(None)));
        answer
    }

    fn find_zone_cut(&self, owner: &Name) -> Option<Name> {
        self.zone_cuts
            .lock()
            .iter()
            .filter(|cut| owner.is_subdomain_of(cut))
            .max_by_key(|cut| cut.label_count())
            .cloned()
    }
}

/// root, com and example.com, each delegated with a SHA-256 DS and all
/// of it sitting unvalidated in the cache. The root KSK is the only anchor.
pub struct World {
    pub root: Zone,
    pub com: Zone,
    pub example: Zone,
    pub source: Arc<FakeSource>,
    pub anchors: Arc<TrustAnchorStore>,
}

impl World {
    pub fn new() -> Self {
        init_tracing();
        let root = Zone::new(".", 1);
        let com = Zone::new("com", 2);
        let example = Zone::new("example.com", 3);

        let source = Arc::new(FakeSource::new());
        source.cache_found(root.signed_keyset());
        source.cache_found(root.sign(ds_set(&com.name, [com.ds(DigestType::Sha256)])));
        source.cache_found(com.signed_keyset());
        source.cache_found(com.sign(ds_set(&example.name, [example.ds(DigestType::Sha256)])));
        source.cache_found(example.signed_keyset());

        let anchors = TrustAnchorStore::empty();
        anchors.add_anchor(TrustAnchor::from_ds(Name::root(), root.ds(DigestType::Sha256)));

        Self {
            root,
            com,
            example,
            source,
            anchors: Arc::new(anchors),
        }
    }

    /// Replace the DS set for example.com in the com zone
    pub fn set_example_ds(&self, records: impl IntoIterator<Item = Ds>) {
        self.source
            .cache_found(self.com.sign(ds_set(&self.example.name, records)));
    }

    pub fn validator(&self) -> Validator {
        self.validator_with(ValidatorConfig::default(), ConfiguredPolicy::new())
    }

    pub fn validator_with(&self, config: ValidatorConfig, policy: ConfiguredPolicy) -> Validator {
        let collaborators = Collaborators::new(self.source.clone(), self.anchors.clone())
            .with_policy(Arc::new(policy));
        Validator::new(config, collaborators)
    }
}
