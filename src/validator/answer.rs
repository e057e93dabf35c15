//! Positive answers: pick a signature, find the key that made it, verify.

use super::task::{ChildRole, FetchRole, Seek, Step, Task};
use super::Engine;
use crate::dns::{NameRelation, RecordType, Rrsig, SignedSet};
use crate::dnssec::{ProofKind, ValidationResult};
use crate::traits::Lookup;
use tracing::{debug, info};

impl Task {
    /// Try the signatures in order until one verifies. With `resume` set,
    /// continue with the signature the task was suspended on.
    pub(crate) fn validate_answer(&mut self, engine: &Engine, resume: bool) -> Step {
        let sigs: Vec<Rrsig> = self
            .sigs
            .iter()
            .flat_map(|sigs| sigs.rrsigs())
            .cloned()
            .collect();
        let mut resume = resume;
        let mut index = 0;
        if resume {
            debug!("{}: resuming validate", self);
            index = self.walk.sig_cursor;
        }

        while index < sigs.len() {
            let sig = &sigs[index];
            self.walk.sig_cursor = index;
            index += 1;
            if !resume {
                self.walk.siginfo = Some(sig.clone());
            }

            if !engine.policy.is_algorithm_supported(&self.name, sig.algorithm) {
                resume = false;
                continue;
            }

            if !resume {
                match self.seek_dnskey(engine) {
                    Seek::Continue => continue,
                    Seek::Complete(step) => return step,
                    Seek::Found => {}
                }
            }
            resume = false;

            let Some(mut key) = self.current_key() else {
                continue;
            };
            let verified = loop {
                if self.verify(engine, &key, sig) {
                    break true;
                }
                if !self.select_signing_key() {
                    break false;
                }
                match self.current_key() {
                    Some(next) => key = next,
                    None => break false,
                }
            };
            if verified {
                self.trim_ttl(engine, sig);
            }
            self.walk.key = None;
            self.walk.keyset = None;

            if self.proofs.needs(ProofKind::NoQName) {
                if !self.has_message() {
                    debug!("{}: no message available for noqname proof", self);
                    return Step::Done(ValidationResult::NoValidSignature);
                }
                debug!("{}: looking for noqname proof", self);
                return self.validate_nx(engine, false);
            }
            if verified {
                debug!("{}: marking as secure, noqname proof not needed", self);
                return self.mark_secure();
            }
            debug!("{}: verify failure: {}", self, sig.key_tag);
        }

        info!("{}: no valid signature found", self);
        Step::Done(ValidationResult::NoValidSignature)
    }

    /// Find the DNSKEY set named by the current signature's signer and
    /// select a candidate key from it
    pub(crate) fn seek_dnskey(&mut self, engine: &Engine) -> Seek {
        let Some(sig) = self.walk.siginfo.clone() else {
            return Seek::Continue;
        };
        let signer = &sig.signer;
        self.walk.key = None;

        match self.name.relation(signer) {
            NameRelation::Equal => {
                if self.rtype == RecordType::DNSKEY {
                    return Seek::Continue;
                }
                if self.rtype.is_at_parent() {
                    debug!("{}: RRSIG signer {} is on the child side of the cut", self, signer);
                    return Seek::Continue;
                }
            }
            NameRelation::Subdomain => {
                if matches!(self.rtype, RecordType::SOA | RecordType::NS) {
                    debug!("{}: signer mismatch, signed by {}", self, signer);
                    return Seek::Continue;
                }
            }
            _ => {
                debug!("{}: RRSIG signer {} is not an ancestor", self, signer);
                return Seek::Continue;
            }
        }

        match engine.source.lookup(signer, RecordType::DNSKEY) {
            Lookup::Found(SignedSet { rrset, sigs }) => {
                let trust = rrset.trust;
                self.walk.keyset = Some(rrset.clone());
                if (trust.is_pending() || trust.is_answer()) && sigs.is_some() {
                    let request = self.child_request(SignedSet::new(rrset, sigs));
                    return Seek::Complete(self.spawn_child(engine, request, ChildRole::Key));
                }
                if trust.is_pending() {
                    debug!("{}: unsigned DNSKEY set for {}", self, signer);
                    return Seek::Continue;
                }
                if !trust.is_secure() {
                    // legitimately insecure keys; nothing to verify with
                    return Seek::Found;
                }
                if self.select_signing_key() {
                    Seek::Found
                } else {
                    debug!("{}: keyset with trust {:?} has no matching key", self, trust);
                    Seek::Continue
                }
            }
            Lookup::NotFound => {
                self.walk.keyset = None;
                Seek::Complete(self.spawn_fetch(
                    engine,
                    signer.clone(),
                    RecordType::DNSKEY,
                    FetchRole::Key,
                ))
            }
            Lookup::NoData(_) | Lookup::NxDomain(_) | Lookup::Alias(_) => {
                debug!("{}: no DNSKEY set for {}", self, signer);
                Seek::Continue
            }
            Lookup::BrokenChain => Seek::Complete(Step::Done(ValidationResult::BrokenChain)),
        }
    }

    /// Whether the DNSKEY set being validated is signed by one of its own
    /// non-revoked keys, ignoring validity periods
    pub(crate) fn is_self_signed_keyset(&self, engine: &Engine) -> bool {
        let (Some(rrset), Some(sigs)) = (&self.rrset, &self.sigs) else {
            return false;
        };
        if rrset.rtype != RecordType::DNSKEY {
            return false;
        }
        rrset.dnskeys().filter(|key| !key.is_revoked()).any(|key| {
            let tag = key.key_tag();
            sigs.rrsigs().any(|sig| {
                sig.algorithm == key.algorithm
                    && sig.key_tag == tag
                    && sig.signer == self.name
                    && engine.crypto.verify(&self.name, rrset, key, sig, true).is_valid()
            })
        })
    }
}
