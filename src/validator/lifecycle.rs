//! Entry point of a task and the handlers that resume it after a fetch or
//! a child task completes.

use super::request::{DenialSource, Outcome};
use super::task::{ChildRole, Fetched, FetchRole, Step, Suspension, Task};
use super::Engine;
use crate::dns::{NegativeKind, RecordType, ResponseCode, SignedSet};
use crate::dnssec::{ProofKind, ValidationResult};
use crate::traits::{FetchError, Lookup};
use tracing::{debug, trace};

impl Task {
    pub(crate) fn start(&mut self, engine: &Engine) -> Step {
        if self.flags.canceled {
            return Step::Done(ValidationResult::Canceled);
        }
        debug!("{}: starting", self);

        if self.rrset.is_some() && self.sigs.is_some() {
            let step = if self.is_self_signed_keyset(engine) {
                debug!("{}: attempting positive response validation via trust anchor", self);
                self.validate_dnskey(engine)
            } else {
                debug!("{}: attempting positive response validation", self);
                self.validate_answer(engine, false)
            };
            return self.fall_back_to_insecurity(engine, step);
        }

        if self.rrset.is_some() {
            debug!("{}: attempting insecurity proof", self);
            self.insecurity_failure = ValidationResult::NoValidSignature;
            return self.prove_unsecure(engine, false, false);
        }

        let nxdomain = match &self.denial {
            Some(DenialSource::Message(message)) => message.rcode == ResponseCode::NxDomain,
            Some(DenialSource::Cached(entry)) => entry.kind == NegativeKind::NxDomain,
            None => return Step::Done(ValidationResult::NoValidDenialProof),
        };
        if nxdomain {
            debug!("{}: attempting NXDOMAIN validation", self);
            self.proofs.need(ProofKind::NoQName);
            self.proofs.need(ProofKind::NoWildcard);
        } else {
            debug!("{}: attempting NODATA validation", self);
            self.proofs.need(ProofKind::NoData);
        }
        self.validate_nx(engine, false)
    }

    /// A signed answer with no usable signature may still be provably
    /// insecure, as long as no signature was actually checked
    fn fall_back_to_insecurity(&mut self, engine: &Engine, step: Step) -> Step {
        if step != Step::Done(ValidationResult::NoValidSignature) || self.flags.tried_verify {
            return step;
        }
        debug!("{}: falling back to insecurity proof", self);
        self.insecurity_failure = ValidationResult::NoValidSignature;
        self.prove_unsecure(engine, false, false)
    }

    pub(crate) fn on_fetch_done(
        &mut self,
        engine: &Engine,
        seq: u64,
        result: Result<Lookup, FetchError>,
    ) -> Step {
        let role = match &self.waiting {
            Suspension::Fetch { seq: current, role, .. } if *current == seq => *role,
            _ => {
                trace!("{}: ignoring stale fetch result", self);
                return Step::Wait;
            }
        };
        self.waiting = Suspension::Idle;
        if self.flags.canceled {
            return Step::Done(ValidationResult::Canceled);
        }
        match role {
            FetchRole::Key => self.on_key_fetched(engine, result),
            FetchRole::Ds => self.on_ds_fetched(engine, result),
        }
    }

    pub(crate) fn on_child_done(&mut self, engine: &Engine, outcome: Outcome) -> Step {
        let role = match &self.waiting {
            Suspension::Child { id, role } if *id == outcome.id => *role,
            _ => {
                trace!("{}: ignoring stale child outcome", self);
                return Step::Wait;
            }
        };
        self.waiting = Suspension::Idle;
        engine.destroy(outcome.id);
        match role {
            ChildRole::Key => self.on_key_validated(engine, outcome),
            ChildRole::Ds => self.on_ds_validated(engine, outcome),
            ChildRole::Alias => self.on_alias_validated(engine, outcome),
            ChildRole::Denial => self.on_denial_validated(engine, outcome),
        }
    }

    fn on_key_fetched(&mut self, engine: &Engine, result: Result<Lookup, FetchError>) -> Step {
        debug!("{}: in fetch_callback_dnskey", self);
        match result {
            Ok(Lookup::Found(SignedSet { rrset, .. })) => {
                let secure = rrset.trust.is_secure();
                self.walk.keyset = Some(rrset);
                self.walk.key = None;
                if secure {
                    self.select_signing_key();
                }
                let step = self.validate_answer(engine, true);
                self.fall_back_to_insecurity(engine, step)
            }
            Ok(Lookup::NoData(_)) => {
                self.walk.keyset = None;
                self.walk.key = None;
                let step = self.validate_answer(engine, true);
                self.fall_back_to_insecurity(engine, step)
            }
            Err(FetchError::Canceled) => Step::Done(ValidationResult::Canceled),
            other => {
                debug!("{}: fetch_callback_dnskey: got {:?}", self, other);
                Step::Done(ValidationResult::BrokenChain)
            }
        }
    }

    fn on_ds_fetched(&mut self, engine: &Engine, result: Result<Lookup, FetchError>) -> Step {
        debug!("{}: in fetch_callback_ds", self);
        let trustchain = !self.flags.insecurity;
        match result {
            Ok(Lookup::Found(set)) => {
                if trustchain {
                    debug!("{}: dsset with trust {:?}", self, set.rrset.trust);
                    return self.validate_dnskey_with(engine, set.rrset);
                }
                self.walk.fetched = Some(Fetched::Positive(set));
                self.prove_unsecure(engine, true, true)
            }
            Ok(Lookup::NxDomain(entry)) => {
                if trustchain {
                    debug!("{}: unexpected NXDOMAIN for DS", self);
                    return Step::Done(ValidationResult::BrokenChain);
                }
                self.walk.fetched = Some(Fetched::Negative(entry));
                self.prove_unsecure(engine, false, true)
            }
            Ok(Lookup::NoData(entry)) => {
                if trustchain {
                    debug!("{}: falling back to insecurity proof", self);
                    self.insecurity_failure = ValidationResult::NoValidSignature;
                    return self.prove_unsecure(engine, false, false);
                }
                let fname = self.walk.fname.clone();
                let delegation = fname
                    .as_ref()
                    .is_some_and(|name| self.is_delegation(engine, name, entry.as_ref()));
                self.walk.fetched = Some(Fetched::Negative(entry));
                if delegation {
                    return self.mark_answer(
                        "fetch_callback_ds",
                        Some("no DS and this is a delegation"),
                    );
                }
                self.prove_unsecure(engine, false, true)
            }
            Ok(Lookup::Alias(_)) => {
                if trustchain {
                    self.insecurity_failure = ValidationResult::NoValidSignature;
                    return self.prove_unsecure(engine, false, false);
                }
                self.prove_unsecure(engine, false, true)
            }
            Err(FetchError::ServFail) if trustchain => {
                debug!("{}: falling back to insecurity proof", self);
                self.insecurity_failure = ValidationResult::NoValidSignature;
                self.prove_unsecure(engine, false, false)
            }
            Err(FetchError::Canceled) => Step::Done(ValidationResult::Canceled),
            other => {
                debug!("{}: fetch_callback_ds: got {:?}", self, other);
                Step::Done(ValidationResult::BrokenChain)
            }
        }
    }

    fn on_key_validated(&mut self, engine: &Engine, outcome: Outcome) -> Step {
        debug!("{}: in validator_callback_dnskey", self);
        if self.flags.canceled {
            return Step::Done(ValidationResult::Canceled);
        }
        if !outcome.result.is_success() {
            debug!("{}: validator_callback_dnskey: got {}", self, outcome.result);
            return Step::Done(ValidationResult::BrokenChain);
        }
        if let Some(keyset) = outcome.rrset {
            debug!("{}: keyset with trust {:?}", self, keyset.trust);
            let secure = keyset.trust.is_secure();
            self.walk.keyset = Some(keyset);
            self.walk.key = None;
            if secure {
                self.select_signing_key();
            }
        }
        let step = self.validate_answer(engine, true);
        self.fall_back_to_insecurity(engine, step)
    }

    fn on_ds_validated(&mut self, engine: &Engine, outcome: Outcome) -> Step {
        debug!("{}: in validator_callback_ds", self);
        if self.flags.canceled {
            return Step::Done(ValidationResult::Canceled);
        }
        if !outcome.result.is_success() {
            debug!("{}: validator_callback_ds: got {}", self, outcome.result);
            return Step::Done(ValidationResult::BrokenChain);
        }

        let have_dsset = outcome
            .rrset
            .as_ref()
            .is_some_and(|rrset| rrset.rtype == RecordType::DS);
        if !self.flags.insecurity {
            let Some(dsset) = outcome.rrset.filter(|_| have_dsset) else {
                return Step::Done(ValidationResult::NoValidSignature);
            };
            debug!("{}: dsset with trust {:?}", self, dsset.trust);
            return self.validate_dnskey_with(engine, dsset);
        }

        if have_dsset {
            if let Some(rrset) = outcome.rrset {
                self.walk.fetched = Some(Fetched::Positive(SignedSet::new(rrset, outcome.sigs)));
            }
            return self.prove_unsecure(engine, true, true);
        }

        let entry = match outcome.denial {
            Some(DenialSource::Cached(entry)) => Some(entry),
            _ => None,
        };
        let delegation = entry.as_ref().is_some_and(|e| {
            e.covers == RecordType::DS && self.is_delegation(engine, &e.name, Some(e))
        });
        self.walk.fetched = Some(Fetched::Negative(entry));
        if delegation {
            return self.mark_answer(
                "validator_callback_ds",
                Some("no DS and this is a delegation"),
            );
        }
        self.prove_unsecure(engine, false, true)
    }

    fn on_alias_validated(&mut self, engine: &Engine, outcome: Outcome) -> Step {
        debug!("{}: in validator_callback_cname", self);
        if self.flags.canceled {
            return Step::Done(ValidationResult::Canceled);
        }
        if !outcome.result.is_success() {
            debug!("{}: validator_callback_cname: got {}", self, outcome.result);
            return Step::Done(ValidationResult::BrokenChain);
        }
        self.prove_unsecure(engine, false, true)
    }
}
