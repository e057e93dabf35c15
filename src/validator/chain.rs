//! Primitives shared by the chain walks.

use super::request::ValidationRequest;
use super::task::{ChildRole, Completion, FetchRole, Step, Suspension, Task};
use super::{Engine, Event};
use crate::dns::{Dnskey, Name, NegativeEntry, RecordSet, RecordType, Rrsig, SignedSet};
use crate::dnssec::crypto::{serial_lt, unix_now};
use crate::dnssec::{ProofKind, ValidationResult, nsec3};
use crate::traits::VerifyResult;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// TTL cap for answers validated with an expired signature
const EXPIRED_TTL: u32 = 120;

impl Task {
    /// Whether this task or one of its ancestors is already working on
    /// (`name`, `rtype`), so that new work for the pair would wait on itself
    pub(crate) fn would_deadlock(
        &self,
        engine: &Engine,
        name: &Name,
        rtype: RecordType,
        has_rrset: bool,
        has_sigs: bool,
    ) -> bool {
        let mut blocked = self.lineage.blocks(name, rtype, has_rrset, has_sigs);
        let mut parent = self.lineage.parent;
        while let (false, Some(id)) = (blocked, parent) {
            let Some(entry) = engine.entry(id) else {
                break;
            };
            blocked = entry.lineage.blocks(name, rtype, has_rrset, has_sigs);
            parent = entry.lineage.parent;
        }
        if blocked {
            warn!(
                "{}: continuing validation of {}/{} would lead to deadlock",
                self, name, rtype
            );
            engine.stats.record_deadlock();
        }
        blocked
    }

    /// Ask the record source for (`name`, `rtype`) and suspend
    pub(crate) fn spawn_fetch(
        &mut self,
        engine: &Engine,
        name: Name,
        rtype: RecordType,
        role: FetchRole,
    ) -> Step {
        if self.would_deadlock(engine, &name, rtype, false, false) {
            return Step::Done(ValidationResult::NoValidSignature);
        }
        debug!("{}: fetching {}/{}", self, name, rtype);

        let seq = engine.next_fetch_seq();
        let task = self.id;
        let source = Arc::clone(&engine.source);
        let events = engine.events();
        let options = self.fetch_options();
        let handle = tokio::spawn(async move {
            let result = source.fetch(name, rtype, options).await;
            let _ = events.send(Event::FetchDone { task, seq, result });
        });
        engine.stats.record_fetch();
        self.waiting = Suspension::Fetch {
            seq,
            abort: handle.abort_handle(),
            role,
        };
        Step::Wait
    }

    /// Validate `request` in a child task and suspend until it reports
    pub(crate) fn spawn_child(
        &mut self,
        engine: &Engine,
        request: ValidationRequest,
        role: ChildRole,
    ) -> Step {
        if self.would_deadlock(
            engine,
            &request.name,
            request.rtype,
            request.rrset.is_some(),
            request.sigs.is_some(),
        ) {
            return Step::Done(ValidationResult::NoValidSignature);
        }
        let (name, rtype) = (request.name.clone(), request.rtype);
        let child = match engine.insert_task(
            request,
            Some(self.id),
            self.depth + 1,
            Completion::Parent(self.id),
        ) {
            Ok(child) => child,
            Err(e) => {
                warn!("{}: cannot validate {}/{}: {}", self, name, rtype, e);
                return Step::Done(ValidationResult::BrokenChain);
            }
        };
        if engine.post(Event::Start(child)).is_err() {
            return Step::Done(ValidationResult::BrokenChain);
        }
        debug!("{}: validating {}/{} in task {}", self, name, rtype, child);
        self.waiting = Suspension::Child { id: child, role };
        Step::Wait
    }

    /// A request validating `set` on behalf of this task
    pub(crate) fn child_request(&self, set: SignedSet) -> ValidationRequest {
        ValidationRequest {
            name: set.rrset.name.clone(),
            rtype: set.rrset.rtype,
            rrset: Some(set.rrset),
            sigs: set.sigs,
            denial: None,
            options: self.child_options(),
        }
    }

    /// A request validating a cached negative answer on behalf of this task
    pub(crate) fn child_negative_request(&self, entry: NegativeEntry) -> ValidationRequest {
        ValidationRequest::cached_negative(entry).with_options(self.child_options())
    }

    /// Advance to the next zone key in the keyset that could have made the
    /// current signature
    pub(crate) fn select_signing_key(&mut self) -> bool {
        let (Some(sig), Some(keyset)) = (&self.walk.siginfo, &self.walk.keyset) else {
            self.walk.key = None;
            return false;
        };
        let start = self.walk.key.map_or(0, |index| index + 1);
        let found = keyset
            .dnskeys()
            .enumerate()
            .skip(start)
            .find(|(_, key)| {
                key.algorithm == sig.algorithm && key.key_tag() == sig.key_tag && key.is_zone_key()
            })
            .map(|(index, _)| index);
        self.walk.key = found;
        found.is_some()
    }

    /// Check `sig` over the task's record set with `key`
    pub(crate) fn verify(&mut self, engine: &Engine, key: &Dnskey, sig: &Rrsig) -> bool {
        let Some(rrset) = self.rrset.as_ref() else {
            return false;
        };
        let mut ignore_time = false;
        let result = loop {
            let result = engine.crypto.verify(&self.name, rrset, key, sig, ignore_time);
            if !ignore_time && engine.config.accept_expired && result.is_time_failure() {
                ignore_time = true;
                continue;
            }
            break result;
        };
        self.flags.tried_verify = true;

        match result {
            VerifyResult::Valid => {}
            VerifyResult::FromWildcard(wild) => {
                if wild != self.name {
                    self.walk.closest = wild.parent();
                    self.proofs.need(ProofKind::NoQName);
                }
            }
            other => {
                debug!(
                    "{}: verify rdataset (keyid={}): {:?}",
                    self, sig.key_tag, other
                );
                return false;
            }
        }
        if ignore_time {
            info!("{}: accepted expired RRSIG (keyid={})", self, sig.key_tag);
        }
        debug!("{}: verify rdataset (keyid={}): success", self, sig.key_tag);
        true
    }

    /// Cap the TTLs of the validated set by what `sig` allows
    pub(crate) fn trim_ttl(&mut self, engine: &Engine, sig: &Rrsig) {
        let now = unix_now();
        let mut ttl = sig.original_ttl;
        if serial_lt(now, sig.expiration) {
            ttl = ttl.min(sig.expiration.wrapping_sub(now));
        } else if engine.config.accept_expired {
            ttl = ttl.min(EXPIRED_TTL);
        }
        for set in [self.rrset.as_mut(), self.sigs.as_mut()].into_iter().flatten() {
            set.ttl = set.ttl.min(ttl);
        }
    }

    /// Whether a signature by (`key_tag`, `algorithm`) made with `key`
    /// verifies the task's record set
    pub(crate) fn check_signer(
        &mut self,
        engine: &Engine,
        key: &Dnskey,
        key_tag: u16,
        algorithm: u8,
    ) -> bool {
        let candidates: Vec<Rrsig> = self
            .sigs
            .iter()
            .flat_map(|sigs| sigs.rrsigs())
            .filter(|sig| sig.key_tag == key_tag && sig.algorithm == algorithm)
            .cloned()
            .collect();
        candidates.iter().any(|sig| self.verify(engine, key, sig))
    }

    /// Whether some DS in `dsset` uses an algorithm and digest we support
    pub(crate) fn check_ds_algs(&self, engine: &Engine, name: &Name, dsset: &RecordSet) -> bool {
        dsset.ds_records().any(|ds| {
            engine.policy.is_digest_supported(name, ds.digest_type)
                && engine.policy.is_algorithm_supported(name, ds.algorithm)
        })
    }

    /// Whether the denial records of a DS NODATA answer show `name` to be a
    /// delegation: an NSEC at `name` with the NS bit, or an NSEC3 matching
    /// `name` with the NS bit or an opt-out span covering it
    pub(crate) fn is_delegation(
        &self,
        engine: &Engine,
        name: &Name,
        entry: Option<&NegativeEntry>,
    ) -> bool {
        let Some(entry) = entry else {
            return false;
        };
        if let Some(set) = entry.find(name, RecordType::NSEC) {
            return set.nsec().is_some_and(|nsec| nsec.types.contains(RecordType::NS));
        }

        for set in entry.records.iter().map(|s| &s.rrset) {
            if set.rtype != RecordType::NSEC3 {
                continue;
            }
            let Some(zone) = nsec3::owner_zone(&set.name) else {
                continue;
            };
            if !name.is_subdomain_of(&zone) {
                continue;
            }
            let Some(owner) = nsec3::owner_hash(&set.name) else {
                continue;
            };
            for record in set.nsec3_records() {
                if !engine.crypto.nsec3_hash_supported(record.hash_algorithm)
                    || record.iterations > engine.config.max_nsec3_iterations
                {
                    continue;
                }
                let Some(hash) = engine.crypto.nsec3_hash(
                    name,
                    record.hash_algorithm,
                    record.iterations,
                    &record.salt,
                ) else {
                    continue;
                };
                if hash.len() != owner.len() {
                    continue;
                }
                if hash == owner {
                    return record.types.contains(RecordType::NS);
                }
                if record.opt_out() && nsec3::covers(&owner, &record.next_hashed, &hash) {
                    return true;
                }
            }
        }
        false
    }
}
