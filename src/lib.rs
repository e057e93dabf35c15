//! DNSSEC chain-of-trust validation.
//!
//! The [`Validator`] decides whether a record set, or a negative answer,
//! chains to a configured trust anchor, is provably insecure, or is bogus.
//! It owns no cache, network or key material of its own; those come in
//! through the traits in [`traits`].

pub mod config;
pub mod dns;
pub mod dnssec;
pub mod error;
pub mod traits;
pub mod validator;

pub use config::ValidatorConfig;
pub use dnssec::ValidationResult;
pub use error::{ConfigError, ValidatorError};
pub use validator::{Collaborators, Outcome, TaskId, ValidationRequest, Validator};
