use super::request::{DenialSource, Outcome, TaskId, ValidationRequest, ValidatorOptions};
use super::{Engine, Event};
use crate::dns::{Dnskey, Name, NegativeEntry, RecordSet, RecordType, Rrsig, SignedSet, Trust};
use crate::dnssec::{ProofAccumulator, ValidationResult};
use crate::traits::{FetchError, FetchOptions};
use std::fmt;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// What a handler asks the event loop to do with its task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Suspended on a fetch or a child task
    Wait,
    Done(ValidationResult),
    /// The insecurity proof failed; finish with the task's saved failure
    NotInsecure,
}

/// Result of one probe in a chain walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Seek {
    /// Nothing usable here, try the next candidate
    Continue,
    /// A usable key (or an insecure keyset) is in place
    Found,
    /// The walk ends with this step
    Complete(Step),
}

/// Where a finished task's outcome goes
pub(crate) enum Completion {
    Callback(Box<dyn FnOnce(Outcome) + Send>),
    Parent(TaskId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FetchRole {
    Key,
    Ds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChildRole {
    /// Validating the DNSKEY set a signature needs
    Key,
    /// Validating a DS set or its absence
    Ds,
    /// Validating a CNAME met during the insecurity walk
    Alias,
    /// Validating one record set of a negative answer
    Denial,
}

/// The single thing a task may be suspended on
pub(crate) enum Suspension {
    Idle,
    Fetch {
        seq: u64,
        abort: AbortHandle,
        role: FetchRole,
    },
    Child {
        id: TaskId,
        role: ChildRole,
    },
}

/// Immutable facts about a task that descendants read without locking it
#[derive(Debug, Clone)]
pub(crate) struct Lineage {
    pub name: Name,
    pub rtype: RecordType,
    pub parent: Option<TaskId>,
    pub has_rrset: bool,
    pub has_sigs: bool,
    pub has_message: bool,
}

impl Lineage {
    pub fn of(request: &ValidationRequest, parent: Option<TaskId>) -> Self {
        Self {
            name: request.name.clone(),
            rtype: request.rtype,
            parent,
            has_rrset: request.rrset.is_some(),
            has_sigs: request.sigs.is_some(),
            has_message: matches!(request.denial, Some(DenialSource::Message(_))),
        }
    }

    /// Whether a task in this position would end up waiting on new work for
    /// (`name`, `rtype`).
    pub fn blocks(&self, name: &Name, rtype: RecordType, has_rrset: bool, has_sigs: bool) -> bool {
        if self.rtype != rtype || &self.name != name {
            return false;
        }
        // a negative response's task checks its own NSEC3 sets
        let nsec3_from_response = rtype == RecordType::NSEC3
            && has_rrset
            && has_sigs
            && self.has_message
            && !self.has_rrset
            && !self.has_sigs;
        !nsec3_from_response
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TaskFlags {
    pub canceled: bool,
    pub shutdown: bool,
    /// Created with `defer` and not started yet
    pub deferred: bool,
    /// A signature check was attempted
    pub tried_verify: bool,
    /// Walking down from a trust anchor looking for an unsigned delegation
    pub insecurity: bool,
}

/// A fetched DS answer kept for the insecurity walk
#[derive(Debug, Clone)]
pub(crate) enum Fetched {
    Positive(SignedSet),
    Negative(Option<NegativeEntry>),
}

impl Fetched {
    pub fn trust(&self) -> Trust {
        match self {
            Fetched::Positive(set) => set.rrset.trust,
            Fetched::Negative(entry) => entry.as_ref().map_or(Trust::None, |e| e.trust),
        }
    }
}

/// Cursors and scratch state of the chain walks
#[derive(Debug, Default)]
pub(crate) struct WalkState {
    /// The signature currently being checked
    pub siginfo: Option<Rrsig>,
    pub sig_cursor: usize,
    /// Index of the selected key among the keyset's DNSKEYs
    pub key: Option<usize>,
    pub keyset: Option<RecordSet>,
    pub dsset: Option<RecordSet>,
    pub fetched: Option<Fetched>,
    /// Name probed by the insecurity walk
    pub fname: Option<Name>,
    /// Labels of the name probed so far by the insecurity walk
    pub labels: usize,
    pub auth_cursor: usize,
    pub auth_count: u32,
    pub auth_fail: u32,
    pub wild: Option<Name>,
    pub closest: Option<Name>,
}

pub(crate) struct Task {
    pub id: TaskId,
    pub lineage: Lineage,
    pub depth: u32,
    pub name: Name,
    pub rtype: RecordType,
    pub rrset: Option<RecordSet>,
    pub sigs: Option<RecordSet>,
    pub denial: Option<DenialSource>,
    pub options: ValidatorOptions,
    pub must_be_secure: bool,
    pub flags: TaskFlags,
    pub walk: WalkState,
    pub proofs: ProofAccumulator,
    pub waiting: Suspension,
    /// Verdict used when the insecurity walk ends without a proof
    pub insecurity_failure: ValidationResult,
    pub secure: bool,
    pub opt_out: bool,
    completion: Option<Completion>,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.rtype)
    }
}

impl Task {
    pub fn new(
        id: TaskId,
        request: ValidationRequest,
        parent: Option<TaskId>,
        depth: u32,
        must_be_secure: bool,
        completion: Completion,
    ) -> Self {
        let lineage = Lineage::of(&request, parent);
        let flags = TaskFlags {
            deferred: request.options.defer,
            ..TaskFlags::default()
        };
        Self {
            id,
            lineage,
            depth,
            name: request.name,
            rtype: request.rtype,
            rrset: request.rrset,
            sigs: request.sigs,
            denial: request.denial,
            options: request.options,
            must_be_secure,
            flags,
            walk: WalkState::default(),
            proofs: ProofAccumulator::new(),
            waiting: Suspension::Idle,
            insecurity_failure: ValidationResult::NoValidSignature,
            secure: false,
            opt_out: false,
            completion: Some(completion),
        }
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            no_cd_flag: self.options.no_cd_flag,
            ignore_negative_anchors: self.options.ignore_negative_anchors,
        }
    }

    /// Options handed down to child tasks
    pub fn child_options(&self) -> ValidatorOptions {
        ValidatorOptions {
            defer: false,
            ..self.options
        }
    }

    /// The record sets of the negative answer, in the order supplied
    pub fn denial_sets(&self) -> &[SignedSet] {
        match &self.denial {
            Some(DenialSource::Message(message)) => &message.authority,
            Some(DenialSource::Cached(entry)) => &entry.records,
            None => &[],
        }
    }

    pub fn denial_sets_mut(&mut self) -> &mut [SignedSet] {
        match &mut self.denial {
            Some(DenialSource::Message(message)) => &mut message.authority,
            Some(DenialSource::Cached(entry)) => &mut entry.records,
            None => &mut [],
        }
    }

    pub fn has_message(&self) -> bool {
        matches!(self.denial, Some(DenialSource::Message(_)))
    }

    /// The key currently selected from the keyset
    pub fn current_key(&self) -> Option<Dnskey> {
        let index = self.walk.key?;
        self.walk.keyset.as_ref()?.dnskeys().nth(index).cloned()
    }

    /// Everything the task validates becomes secure
    pub fn mark_secure(&mut self) -> Step {
        debug!("{}: marking as secure", self);
        if let Some(rrset) = self.rrset.as_mut() {
            rrset.trust = Trust::Secure;
        }
        if let Some(sigs) = self.sigs.as_mut() {
            sigs.trust = Trust::Secure;
        }
        if let Some(DenialSource::Cached(entry)) = self.denial.as_mut() {
            entry.trust = Trust::Secure;
        }
        self.secure = true;
        Step::Done(ValidationResult::Secure)
    }

    /// Accept the data as an insecure answer. With `must_be_secure` set and
    /// a `reason` given, fail instead.
    pub fn mark_answer(&mut self, context: &str, reason: Option<&str>) -> Step {
        if self.must_be_secure {
            if let Some(reason) = reason {
                warn!("{}: must be secure failure, {}", self, reason);
                return Step::Done(ValidationResult::MustBeSecure);
            }
        }
        debug!("{}: marking as answer ({})", self, context);
        if let Some(rrset) = self.rrset.as_mut() {
            rrset.trust = Trust::Answer;
        }
        if let Some(sigs) = self.sigs.as_mut() {
            sigs.trust = Trust::Answer;
        }
        if let Some(DenialSource::Cached(entry)) = self.denial.as_mut() {
            entry.trust = Trust::Answer;
        }
        Step::Done(ValidationResult::ProvenInsecure)
    }

    /// Turn a handler's step into the completion event, if the task is done
    pub fn settle(&mut self, engine: &Engine, step: Step) -> Option<Event> {
        match step {
            Step::Wait => None,
            Step::Done(result) => self.finish(engine, result),
            Step::NotInsecure => {
                info!("{}: insecurity proof failed", self);
                let result = self.insecurity_failure;
                self.finish(engine, result)
            }
        }
    }

    pub fn finish(&mut self, engine: &Engine, result: ValidationResult) -> Option<Event> {
        let completion = self.completion.take()?;
        self.flags.deferred = false;
        self.walk.keyset = None;
        self.walk.dsset = None;
        self.walk.fetched = None;
        debug!("{}: validation complete: {}", self, result);
        engine.stats.record_result(result);
        let outcome = Outcome {
            id: self.id,
            result,
            name: self.name.clone(),
            rtype: self.rtype,
            rrset: self.rrset.clone(),
            sigs: self.sigs.clone(),
            denial: self.denial.clone(),
            proofs: self.proofs.names(),
            opt_out: self.opt_out,
            secure: self.secure,
        };
        Some(Event::Deliver {
            completion,
            outcome,
        })
    }

    pub fn is_removable(&self) -> bool {
        self.flags.shutdown && self.completion.is_none() && matches!(self.waiting, Suspension::Idle)
    }

    /// Mark the task canceled and cancel what it waits on. A deferred task
    /// that never started completes right away.
    pub fn cancel(&mut self, engine: &Engine) -> Option<Event> {
        if self.flags.canceled {
            return None;
        }
        self.flags.canceled = true;
        if self.completion.is_none() {
            return None;
        }
        debug!("{}: canceling", self);
        match &self.waiting {
            Suspension::Fetch { seq, abort, .. } => {
                abort.abort();
                let event = Event::FetchDone {
                    task: self.id,
                    seq: *seq,
                    result: Err(FetchError::Canceled),
                };
                if engine.post(event).is_err() {
                    warn!("{}: event queue closed while canceling fetch", self);
                }
            }
            Suspension::Child { id, .. } => engine.cancel(*id),
            Suspension::Idle => {}
        }
        if self.flags.deferred {
            return self.finish(engine, ValidationResult::Canceled);
        }
        None
    }
}
