//! Record model consumed by the validator: names, types, record data and
//! the cached record sets the engine decorates with trust.

pub mod name;
pub mod rdata;
pub mod rrset;
pub mod types;

pub use name::{Name, NameRelation};
pub use rdata::{Dnskey, Ds, Nsec, Nsec3, RData, Rrsig, TypeBitmap};
pub use rrset::{Message, NegativeEntry, NegativeKind, RecordSet, SignedSet, Trust};
pub use types::{RecordType, ResponseCode};
