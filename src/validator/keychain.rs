//! DNSKEY sets: match a key against the DS set one level up (or a trust
//! anchor) and check that it signed the set.

use super::task::{ChildRole, FetchRole, Seek, Step, Task};
use super::Engine;
use crate::dns::{Dnskey, Ds, Name, RecordSet, RecordType, SignedSet};
use crate::dnssec::{DigestType, ValidationResult};
use crate::traits::Lookup;
use tracing::{debug, info};

impl Task {
    pub(crate) fn validate_dnskey(&mut self, engine: &Engine) -> Step {
        if self.walk.dsset.is_none() {
            self.walk.dsset = engine.anchors.find(&self.name);
        }
        if self.walk.dsset.is_none() {
            if self.name.is_root() {
                if self.flags.tried_verify {
                    debug!("{}: root key failed to validate", self);
                } else {
                    debug!("{}: no trusted root key", self);
                }
                return Step::Done(ValidationResult::NoValidSignature);
            }
            let name = self.name.clone();
            if let Seek::Complete(step) = self.get_dsset(engine, &name) {
                return step;
            }
        }

        let step = self.match_ds(engine);
        self.walk.dsset = None;
        step
    }

    fn match_ds(&mut self, engine: &Engine) -> Step {
        let Some(dsset) = self.walk.dsset.clone() else {
            return Step::Done(ValidationResult::NoValidSignature);
        };
        if !dsset.trust.is_secure() {
            return self.mark_answer("validate_dnskey (2)", Some("insecure DS"));
        }

        let usable = |ds: &Ds| {
            engine.policy.is_digest_supported(&self.name, ds.digest_type)
                && engine.policy.is_algorithm_supported(&self.name, ds.algorithm)
        };
        // RFC 4509: SHA-1 entries give way to any strong digest
        let ignore_sha1 = dsset
            .ds_records()
            .filter(|ds| usable(ds))
            .any(|ds| DigestType::is_strong_digest(ds.digest_type, &ds.digest));
        let candidates: Vec<Ds> = dsset
            .ds_records()
            .filter(|ds| !(ignore_sha1 && ds.digest_type == DigestType::Sha1.to_u8()))
            .filter(|ds| usable(ds))
            .cloned()
            .collect();

        for ds in &candidates {
            let Some(key) = self.matching_key(engine, ds) else {
                debug!("{}: no DNSKEY matching DS {}", self, ds.key_tag);
                continue;
            };
            if self.check_signer(engine, &key, ds.key_tag, ds.algorithm) {
                debug!("{}: marking as secure (DS)", self);
                return self.mark_secure();
            }
            debug!("{}: no RRSIG matching DS key {}", self, ds.key_tag);
        }

        if candidates.is_empty() {
            debug!("{}: no supported algorithm/digest (DS)", self);
            return self.mark_answer(
                "validate_dnskey (3)",
                Some("no supported algorithm/digest (DS)"),
            );
        }
        info!("{}: no valid signature found (DS)", self);
        Step::Done(ValidationResult::NoValidSignature)
    }

    /// The key in the set being validated that `ds` describes
    fn matching_key(&self, engine: &Engine, ds: &Ds) -> Option<Dnskey> {
        let keys = self.rrset.as_ref()?;
        keys.dnskeys()
            .filter(|key| key.key_tag() == ds.key_tag && key.algorithm == ds.algorithm)
            .find(|key| {
                engine
                    .crypto
                    .ds_digest(&self.name, key, ds.digest_type)
                    .is_some_and(|digest| digest == ds.digest)
            })
            .cloned()
    }

    /// Get a trustworthy DS set for `name` into `walk.dsset`. `Continue`
    /// means the set is in place.
    pub(crate) fn get_dsset(&mut self, engine: &Engine, name: &Name) -> Seek {
        match engine.source.lookup(name, RecordType::DS) {
            Lookup::Found(SignedSet { rrset, sigs }) => {
                let trust = rrset.trust;
                if (trust.is_pending() || trust.is_answer()) && sigs.is_some() {
                    let request = self.child_request(SignedSet::new(rrset, sigs));
                    return Seek::Complete(self.spawn_child(engine, request, ChildRole::Ds));
                }
                if trust.is_pending() {
                    debug!("{}: unsigned DS record", self);
                    return Seek::Complete(Step::Done(ValidationResult::NoValidSignature));
                }
                self.walk.dsset = Some(rrset);
                Seek::Continue
            }
            Lookup::NotFound => Seek::Complete(self.spawn_fetch(
                engine,
                name.clone(),
                RecordType::DS,
                FetchRole::Ds,
            )),
            Lookup::NoData(_) | Lookup::NxDomain(_) | Lookup::Alias(_) => {
                debug!("{}: no DS record", self);
                Seek::Complete(Step::Done(ValidationResult::NoValidSignature))
            }
            Lookup::BrokenChain => Seek::Complete(Step::Done(ValidationResult::BrokenChain)),
        }
    }

    /// Resume key validation with a DS set validated or fetched for us
    pub(crate) fn validate_dnskey_with(&mut self, engine: &Engine, dsset: RecordSet) -> Step {
        self.walk.dsset = Some(dsset);
        self.validate_dnskey(engine)
    }
}
