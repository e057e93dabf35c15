//! Negative answers: validate the denial records one set at a time, then
//! assemble NODATA, NOQNAME, NOWILDCARD and closest-encloser proofs from
//! the ones that came out secure.

use super::request::{DenialSource, Outcome};
use super::task::{ChildRole, Seek, Step, Task};
use super::Engine;
use crate::dns::{Name, RecordSet, RecordType, Trust};
use crate::dnssec::nsec3::{self, Nsec3Check, Nsec3Verdict};
use crate::dnssec::{ProofKind, ValidationResult, nsec};
use tracing::debug;

impl Task {
    pub(crate) fn validate_nx(&mut self, engine: &Engine, resume: bool) -> Step {
        if resume {
            debug!("{}: resuming validate_nx", self);
        }
        if let Seek::Complete(step) = self.validate_denial_sets(engine, resume) {
            return step;
        }

        let proofs = &self.proofs;
        if !proofs.needs(ProofKind::NoData)
            && !proofs.needs(ProofKind::NoWildcard)
            && proofs.needs(ProofKind::NoQName)
        {
            return self.finish_noqname_only(engine);
        }

        if !self.proofs.found(ProofKind::NoQName)
            && !self.proofs.found(ProofKind::NoData)
            && self.find_nsec3_proofs(engine)
        {
            debug!("{}: NSEC3 iterations exceed the maximum", self);
            return self.mark_answer("validate_nx (4)", None);
        }

        if self.closest_proven() && self.wildcard_check_needed() {
            self.check_wildcard(engine, RecordType::NSEC, None);
        }

        let proofs = &self.proofs;
        let nodata = proofs.needs(ProofKind::NoData)
            && (proofs.found(ProofKind::NoData) || proofs.opt_out());
        let nxdomain = proofs.needs(ProofKind::NoQName)
            && proofs.found(ProofKind::NoQName)
            && proofs.needs(ProofKind::NoWildcard)
            && proofs.found(ProofKind::NoWildcard)
            && proofs.found(ProofKind::ClosestEncloser);
        if nodata || nxdomain {
            if self.proofs.opt_out() {
                self.opt_out = true;
            }
            debug!("{}: nonexistence proof(s) found", self);
            return self.mark_denial_secure();
        }

        if self.walk.auth_fail != 0 && self.walk.auth_count == self.walk.auth_fail {
            debug!("{}: authority section validation failed", self);
            return Step::Done(ValidationResult::BrokenChain);
        }

        debug!("{}: nonexistence proof(s) not found", self);
        self.insecurity_failure = ValidationResult::NoValidDenialProof;
        self.prove_unsecure(engine, false, false)
    }

    /// A wildcard-expanded positive answer only needs its NOQNAME proof
    fn finish_noqname_only(&mut self, engine: &Engine) -> Step {
        if !self.proofs.found(ProofKind::NoQName) && self.find_nsec3_proofs(engine) {
            debug!("{}: NSEC3 iterations exceed the maximum", self);
            return self.mark_answer("validate_nx (3)", None);
        }
        if self.proofs.found(ProofKind::NoQName)
            && self.proofs.found(ProofKind::ClosestEncloser)
            && !self.proofs.opt_out()
        {
            debug!("{}: marking as secure, noqname proof found", self);
            return self.mark_denial_secure();
        }
        if self.proofs.opt_out() && self.walk.wild.is_some() {
            debug!("{}: optout proof found", self);
            self.opt_out = true;
            return self.mark_answer("validate_nx (1)", None);
        }
        if self.proofs.unknown_hash() {
            debug!("{}: unknown NSEC3 hash algorithm found", self);
            return self.mark_answer("validate_nx (2)", None);
        }
        debug!("{}: noqname proof not found", self);
        Step::Done(ValidationResult::NoValidDenialProof)
    }

    fn closest_proven(&self) -> bool {
        self.proofs.found(ProofKind::NoQName) && self.proofs.found(ProofKind::ClosestEncloser)
    }

    fn wildcard_check_needed(&self) -> bool {
        (self.proofs.needs(ProofKind::NoData) && !self.proofs.found(ProofKind::NoData))
            || self.proofs.needs(ProofKind::NoWildcard)
    }

    /// Secure result for a negative answer, or for a wildcard answer whose
    /// NOQNAME proof checked out
    fn mark_denial_secure(&mut self) -> Step {
        if self.rrset.is_some() || matches!(self.denial, Some(DenialSource::Cached(_))) {
            return self.mark_secure();
        }
        self.secure = true;
        Step::Done(ValidationResult::Secure)
    }

    /// Validate the next denial record set in a child task. `Continue` means
    /// every set has been seen.
    fn validate_denial_sets(&mut self, engine: &Engine, resume: bool) -> Seek {
        let start = if resume { self.walk.auth_cursor + 1 } else { 0 };
        for index in start..self.denial_sets().len() {
            let set = self.denial_sets()[index].clone();
            let rtype = set.rrset.rtype;
            if rtype == RecordType::RRSIG {
                continue;
            }
            // a zone missing its own key would otherwise have us fetch that
            // key again to check the apex NSEC
            if self.rtype == RecordType::DNSKEY
                && rtype == RecordType::NSEC
                && set.rrset.name == self.name
                && set
                    .rrset
                    .nsec()
                    .is_some_and(|nsec| nsec.types.contains(RecordType::SOA))
            {
                continue;
            }

            self.walk.auth_cursor = index;
            let request = self.child_request(set);
            let step = self.spawn_child(engine, request, ChildRole::Denial);
            if step == Step::Wait {
                self.walk.auth_count += 1;
            }
            return Seek::Complete(step);
        }
        Seek::Continue
    }

    /// A denial record set came back from its child task
    pub(crate) fn on_denial_validated(&mut self, engine: &Engine, outcome: Outcome) -> Step {
        if self.flags.canceled {
            return Step::Done(ValidationResult::Canceled);
        }
        let trust = outcome.rrset.as_ref().map_or(Trust::None, |r| r.trust);
        let cursor = self.walk.auth_cursor;
        if let Some(set) = self.denial_sets_mut().get_mut(cursor) {
            set.set_trust(trust);
        }

        if outcome.result.is_success() {
            debug!("{}: authority set {}/{} validated", self, outcome.name, outcome.rtype);
            if outcome.rtype == RecordType::NSEC && trust.is_secure() {
                if let Some(rrset) = outcome.rrset.as_ref() {
                    self.record_nsec_proofs(rrset);
                }
            }
        } else {
            debug!(
                "{}: authority set {}/{} failed: {}",
                self, outcome.name, outcome.rtype, outcome.result
            );
            if outcome.result == ValidationResult::BrokenChain {
                self.walk.auth_fail += 1;
            }
        }
        self.validate_nx(engine, true)
    }

    /// Note what a secure NSEC says about the query name
    fn record_nsec_proofs(&mut self, rrset: &RecordSet) {
        let proofs = &self.proofs;
        let wanted = proofs.needs(ProofKind::NoData) || proofs.needs(ProofKind::NoQName);
        if !wanted || proofs.found(ProofKind::NoData) || proofs.found(ProofKind::NoQName) {
            return;
        }
        let Some(proof) = nsec::no_exist_no_data(self.rtype, &self.name, rrset, true) else {
            return;
        };
        if proof.exists {
            if !proof.data {
                self.proofs.mark_found(ProofKind::NoData);
                if self.proofs.needs(ProofKind::NoData) {
                    self.proofs.record(ProofKind::NoData, &rrset.name);
                }
            }
            return;
        }
        self.proofs.mark_found(ProofKind::NoQName);
        if self.proofs.needs(ProofKind::NoQName) {
            self.proofs.record(ProofKind::NoQName, &rrset.name);
        }
        let Some(wild) = proof.wildcard else {
            return;
        };
        let closest_ok = self
            .walk
            .closest
            .as_ref()
            .is_none_or(|closest| wild.label_count() == closest.label_count() + 1);
        if closest_ok {
            self.proofs.mark_found(ProofKind::ClosestEncloser);
        }
        self.walk.wild = Some(wild);
    }

    /// Look for a record proving the wildcard at `walk.wild` does not exist
    /// (or lacks the type), among the secure denial sets of `kind`
    fn check_wildcard(&mut self, engine: &Engine, kind: RecordType, zone: Option<&Name>) {
        let Some(wild) = self.walk.wild.clone() else {
            debug!("{}: in checkwildcard: no wildcard to check", self);
            return;
        };
        debug!("{}: in checkwildcard: {}", self, wild);

        let sets: Vec<RecordSet> = self
            .denial_sets()
            .iter()
            .map(|s| &s.rrset)
            .filter(|r| r.rtype == kind && r.trust.is_secure())
            .cloned()
            .collect();

        for set in &sets {
            if self.proofs.found(ProofKind::NoData) || self.proofs.found(ProofKind::NoWildcard) {
                return;
            }
            let (exists, data) = if kind == RecordType::NSEC {
                match nsec::no_exist_no_data(self.rtype, &wild, set, false) {
                    Some(proof) => (proof.exists, proof.data),
                    None => continue,
                }
            } else {
                let Some(zone) = zone else {
                    return;
                };
                let check = Nsec3Check {
                    crypto: engine.crypto.as_ref(),
                    rtype: self.rtype,
                    name: &wild,
                    zone,
                    max_iterations: engine.config.max_nsec3_iterations,
                    discover_closest: false,
                    track_nearest: false,
                };
                let ex = check.examine(set, None, None);
                if ex.verdict != Nsec3Verdict::Proved {
                    continue;
                }
                (ex.exists, ex.data)
            };

            if exists && !data {
                self.proofs.mark_found(ProofKind::NoData);
                if self.proofs.needs(ProofKind::NoData) {
                    self.proofs.record(ProofKind::NoData, &set.name);
                }
            }
            if !exists {
                self.proofs.mark_found(ProofKind::NoWildcard);
                if self.proofs.needs(ProofKind::NoQName) {
                    self.proofs.record(ProofKind::NoWildcard, &set.name);
                }
            }
            return;
        }
    }

    /// Work through the secure NSEC3 sets of the deepest zone the query
    /// name sits in. Returns true when a set's iteration count was over the
    /// limit, which makes the answer insecure rather than bogus.
    fn find_nsec3_proofs(&mut self, engine: &Engine) -> bool {
        let sets: Vec<RecordSet> = self
            .denial_sets()
            .iter()
            .map(|s| &s.rrset)
            .filter(|r| r.rtype == RecordType::NSEC3 && r.trust.is_secure())
            .cloned()
            .collect();
        let Some(zone) = nsec3::deepest_zone(&self.name, sets.iter().map(|s| &s.name)) else {
            debug!("{}: no usable NSEC3 records", self);
            return false;
        };

        let check = Nsec3Check {
            crypto: engine.crypto.as_ref(),
            rtype: self.rtype,
            name: &self.name,
            zone: &zone,
            max_iterations: engine.config.max_nsec3_iterations,
            discover_closest: self.walk.closest.is_none(),
            track_nearest: true,
        };
        let mut closest = self.walk.closest.clone();
        let mut closest_owner: Option<Name> = None;
        let mut nearest: Option<Name> = None;
        let mut nearest_owner: Option<Name> = None;
        let mut opt_out = false;
        let mut nodata: Option<Name> = None;

        for set in &sets {
            let ex = check.examine(set, closest.as_ref(), nearest.as_ref());
            if ex.unknown_hash {
                self.proofs.set_unknown_hash();
            }
            if ex.verdict == Nsec3Verdict::IterationsExceeded {
                let kind = if self.proofs.needs(ProofKind::NoQName)
                    && self.proofs.proof(ProofKind::NoQName).is_none()
                {
                    Some(ProofKind::NoQName)
                } else if ex.closest.is_some() {
                    Some(ProofKind::ClosestEncloser)
                } else if self.proofs.needs(ProofKind::NoData) {
                    Some(ProofKind::NoData)
                } else if self.proofs.needs(ProofKind::NoWildcard) {
                    Some(ProofKind::NoWildcard)
                } else {
                    None
                };
                if let Some(kind) = kind {
                    self.proofs.record(kind, &set.name);
                }
                return true;
            }
            if let Some(found) = ex.closest {
                closest = Some(found);
                closest_owner = Some(set.name.clone());
            }
            if ex.verdict != Nsec3Verdict::Proved {
                continue;
            }
            if ex.exists && !ex.data && self.proofs.needs(ProofKind::NoData) && nodata.is_none() {
                nodata = Some(set.name.clone());
            }
            if !ex.exists {
                if let Some(found) = ex.nearest {
                    nearest = Some(found);
                    nearest_owner = Some(set.name.clone());
                    opt_out |= ex.opt_out;
                }
            }
        }

        if let Some(owner) = nodata {
            self.proofs.mark_found(ProofKind::NoData);
            self.proofs.record(ProofKind::NoData, &owner);
        }

        match (&closest, &nearest) {
            (Some(c), Some(n)) if n.label_count() == c.label_count() + 1 && n.is_subdomain_of(c) => {
                self.proofs.mark_found(ProofKind::ClosestEncloser);
                if let Some(owner) = &closest_owner {
                    self.proofs.record(ProofKind::ClosestEncloser, owner);
                }
                if let Some(owner) = &nearest_owner {
                    self.proofs.mark_found(ProofKind::NoQName);
                    self.proofs.record(ProofKind::NoQName, owner);
                    if opt_out {
                        self.proofs.set_opt_out();
                    }
                }
                self.walk.wild = c.wildcard().ok();
            }
            _ => debug!("{}: closest encloser proof not found", self),
        }

        if self.closest_proven() && self.wildcard_check_needed() {
            self.check_wildcard(engine, RecordType::NSEC3, Some(&zone));
        }
        false
    }
}
