use crate::dns::{Message, Name, NegativeEntry, RecordSet, RecordType};
use crate::dnssec::{ProofNames, ValidationResult};
use crate::error::ValidatorError;
use std::fmt;

/// Handle for a task in the validator's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidatorOptions {
    /// Register the task without starting it; see `Validator::start`
    pub defer: bool,
    /// Forwarded to fetches
    pub no_cd_flag: bool,
    /// Forwarded to fetches
    pub ignore_negative_anchors: bool,
}

/// Where a negative answer's denial records come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialSource {
    /// The authority section of a response
    Message(Message),
    /// A negative cache entry
    Cached(NegativeEntry),
}

/// What to validate.
///
/// A positive request carries `rrset` (and usually `sigs`); a negative one
/// carries only a denial source. A positive answer synthesized from a
/// wildcard also carries the response message for its NOQNAME proof.
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub name: Name,
    pub rtype: RecordType,
    pub rrset: Option<RecordSet>,
    pub sigs: Option<RecordSet>,
    pub denial: Option<DenialSource>,
    pub options: ValidatorOptions,
}

impl ValidationRequest {
    pub fn positive(rrset: RecordSet, sigs: RecordSet) -> Self {
        Self {
            name: rrset.name.clone(),
            rtype: rrset.rtype,
            rrset: Some(rrset),
            sigs: Some(sigs),
            denial: None,
            options: ValidatorOptions::default(),
        }
    }

    /// A positive answer that arrived without signatures
    pub fn unsigned(rrset: RecordSet) -> Self {
        Self {
            name: rrset.name.clone(),
            rtype: rrset.rtype,
            rrset: Some(rrset),
            sigs: None,
            denial: None,
            options: ValidatorOptions::default(),
        }
    }

    /// A negative response for (`name`, `rtype`)
    pub fn negative(name: Name, rtype: RecordType, message: Message) -> Self {
        Self {
            name,
            rtype,
            rrset: None,
            sigs: None,
            denial: Some(DenialSource::Message(message)),
            options: ValidatorOptions::default(),
        }
    }

    pub fn cached_negative(entry: NegativeEntry) -> Self {
        Self {
            name: entry.name.clone(),
            rtype: entry.covers,
            rrset: None,
            sigs: None,
            denial: Some(DenialSource::Cached(entry)),
            options: ValidatorOptions::default(),
        }
    }

    /// Attach the response message of a positive answer
    pub fn with_message(mut self, message: Message) -> Self {
        self.denial = Some(DenialSource::Message(message));
        self
    }

    pub fn with_options(mut self, options: ValidatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn is_negative(&self) -> bool {
        self.rrset.is_none()
    }

    pub(crate) fn check(&self) -> Result<(), ValidatorError> {
        match (&self.rrset, &self.sigs, &self.denial) {
            (None, Some(_), _) => Err(ValidatorError::InvalidRequest(
                "signatures without a record set",
            )),
            (None, None, None) => Err(ValidatorError::InvalidRequest(
                "neither a record set nor a negative answer",
            )),
            (Some(_), _, Some(DenialSource::Cached(_))) => Err(ValidatorError::InvalidRequest(
                "a positive answer cannot carry a negative cache entry",
            )),
            (Some(rrset), _, _) if rrset.name != self.name || rrset.rtype != self.rtype => Err(
                ValidatorError::InvalidRequest("record set does not match the query"),
            ),
            _ => Ok(()),
        }
    }
}

/// Final report of a task, handed to its completion exactly once
#[derive(Debug, Clone)]
pub struct Outcome {
    pub id: TaskId,
    pub result: ValidationResult,
    pub name: Name,
    pub rtype: RecordType,
    /// The validated set with its trust updated
    pub rrset: Option<RecordSet>,
    pub sigs: Option<RecordSet>,
    /// The denial source, with the trust of its records updated
    pub denial: Option<DenialSource>,
    /// Owners of the records behind each non-existence proof
    pub proofs: ProofNames,
    /// The answer relied on an opt-out span
    pub opt_out: bool,
    /// A negative answer was proven secure
    pub secure: bool,
}

impl Outcome {
    /// The negative cache entry, when the task validated one
    pub fn negative_entry(&self) -> Option<&NegativeEntry> {
        match &self.denial {
            Some(DenialSource::Cached(entry)) => Some(entry),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{NegativeKind, ResponseCode};

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    #[test]
    fn test_request_shapes() {
        let rrset = RecordSet::new(name("www.example.com"), RecordType::A, 300);
        let sigs = RecordSet::new(name("www.example.com"), RecordType::RRSIG, 300);
        assert!(ValidationRequest::positive(rrset.clone(), sigs).check().is_ok());
        assert!(ValidationRequest::unsigned(rrset.clone()).check().is_ok());

        let negative = ValidationRequest::negative(
            name("nx.example.com"),
            RecordType::A,
            Message::new(ResponseCode::NxDomain),
        );
        assert!(negative.is_negative());
        assert!(negative.check().is_ok());

        let entry = NegativeEntry::new(name("nx.example.com"), RecordType::A, NegativeKind::NxDomain);
        let cached = ValidationRequest::cached_negative(entry.clone());
        assert_eq!(cached.rtype, RecordType::A);
        assert!(cached.check().is_ok());

        let mut bad = ValidationRequest::unsigned(rrset);
        bad.denial = Some(DenialSource::Cached(entry));
        assert!(matches!(bad.check(), Err(ValidatorError::InvalidRequest(_))));
    }

    #[test]
    fn test_empty_request_rejected() {
        let mut request = ValidationRequest::negative(
            name("example.com"),
            RecordType::A,
            Message::default(),
        );
        request.denial = None;
        assert!(request.check().is_err());
    }

    #[test]
    fn test_mismatched_rrset_rejected() {
        let rrset = RecordSet::new(name("www.example.com"), RecordType::A, 300);
        let mut request = ValidationRequest::unsigned(rrset);
        request.rtype = RecordType::AAAA;
        assert!(request.check().is_err());
    }
}
