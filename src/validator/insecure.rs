//! Insecurity proofs: walk down from the deepest trust anchor looking for
//! a delegation that provably has no DS.

use super::task::{ChildRole, Fetched, FetchRole, Seek, Step, Task};
use super::Engine;
use crate::dns::{RecordType, SignedSet};
use crate::dnssec::ValidationResult;
use crate::traits::Lookup;
use tracing::{debug, warn};

impl Task {
    /// Prove that the data sits below an unsigned delegation. With `resume`
    /// set, continue after the DS answer stored in `walk.fetched`, which is
    /// positive when `have_ds` is.
    pub(crate) fn prove_unsecure(&mut self, engine: &Engine, have_ds: bool, resume: bool) -> Step {
        self.flags.insecurity = true;

        let mut secroot = self.name.clone();
        if self.rtype == RecordType::DS {
            if let Some(parent) = secroot.parent() {
                secroot = parent;
            }
        }
        let Some(anchor) = engine.anchors.find_deepest(&secroot) else {
            debug!("{}: not beneath secure root", self);
            return self.mark_answer("proveunsecure (1)", Some("not beneath secure root"));
        };

        if !resume {
            self.walk.labels = anchor.label_count() + 1;
        } else {
            debug!("{}: resuming proveunsecure", self);
            if have_ds {
                if let (Some(Fetched::Positive(set)), Some(fname)) =
                    (&self.walk.fetched, &self.walk.fname)
                {
                    if set.rrset.trust.is_secure() && !self.check_ds_algs(engine, fname, &set.rrset) {
                        debug!("{}: no supported algorithm/digest ({}/DS)", self, fname);
                        return self.mark_answer(
                            "proveunsecure (2)",
                            Some("no supported algorithm/digest (DS)"),
                        );
                    }
                }
            }
            self.walk.labels += 1;
        }

        while self.walk.labels <= self.name.label_count() {
            match self.seek_ds(engine) {
                Seek::Complete(step) => return step,
                Seek::Continue | Seek::Found => self.walk.labels += 1,
            }
        }

        debug!("{}: insecurity proof failed", self);
        Step::NotInsecure
    }

    /// Look at the DS for the name with `walk.labels` labels. `Continue`
    /// means the chain of trust goes on below it.
    pub(crate) fn seek_ds(&mut self, engine: &Engine) -> Seek {
        let tname = self.name.suffix(self.walk.labels);
        debug!("{}: checking existence of DS at '{}'", self, tname);
        self.walk.fname = Some(tname.clone());

        match engine.source.lookup(&tname, RecordType::DS) {
            Lookup::NotFound => {
                Seek::Complete(self.spawn_fetch(engine, tname, RecordType::DS, FetchRole::Ds))
            }
            Lookup::NoData(entry) => {
                if let Some(entry) = entry.as_ref().filter(|e| e.trust.is_pending() || e.trust.is_answer()) {
                    let request = self.child_negative_request(entry.clone());
                    return Seek::Complete(self.spawn_child(engine, request, ChildRole::Ds));
                }
                let Some(entry) = entry else {
                    if engine.source.find_zone_cut(&tname).as_ref() == Some(&tname) {
                        return Seek::Complete(
                            self.mark_answer("proveunsecure (3)", Some("no DS at zone cut")),
                        );
                    }
                    warn!("{}: can't validate existing negative responses (no DS)", self);
                    return Seek::Complete(Step::Done(ValidationResult::MustBeSecure));
                };
                if !entry.trust.is_secure() {
                    warn!("{}: can't validate existing negative responses (no DS)", self);
                    return Seek::Complete(Step::Done(ValidationResult::MustBeSecure));
                }
                if self.is_delegation(engine, &tname, Some(&entry)) {
                    return Seek::Complete(
                        self.mark_answer("proveunsecure (4)", Some("this is a delegation")),
                    );
                }
                Seek::Continue
            }
            Lookup::NxDomain(entry) => {
                let Some(entry) = entry else {
                    return Seek::Complete(Step::Done(ValidationResult::NoValidDenialProof));
                };
                if entry.trust.is_pending() || entry.trust.is_answer() {
                    let request = self.child_negative_request(entry);
                    return Seek::Complete(self.spawn_child(engine, request, ChildRole::Ds));
                }
                if !entry.trust.is_secure() {
                    warn!("{}: can't validate existing negative responses (not a zone cut)", self);
                    return Seek::Complete(Step::Done(ValidationResult::NoValidSignature));
                }
                Seek::Continue
            }
            Lookup::Alias(set) => {
                let trust = set.rrset.trust;
                if trust.is_pending() || trust.is_answer() {
                    let request = self.child_request(set);
                    return Seek::Complete(self.spawn_child(engine, request, ChildRole::Alias));
                }
                Seek::Continue
            }
            Lookup::Found(SignedSet { rrset, sigs }) => {
                if rrset.trust.is_secure() {
                    if !self.check_ds_algs(engine, &tname, &rrset) {
                        debug!("{}: no supported algorithm/digest ({}/DS)", self, tname);
                        return Seek::Complete(self.mark_answer(
                            "proveunsecure (5)",
                            Some("no supported algorithm/digest (DS)"),
                        ));
                    }
                    return Seek::Continue;
                }
                if sigs.is_none() {
                    debug!("{}: unsigned DS record", self);
                    return Seek::Complete(Step::Done(ValidationResult::NoValidSignature));
                }
                let request = self.child_request(SignedSet::new(rrset, sigs));
                Seek::Complete(self.spawn_child(engine, request, ChildRole::Ds))
            }
            Lookup::BrokenChain => Seek::Complete(Step::Done(ValidationResult::BrokenChain)),
        }
    }
}
