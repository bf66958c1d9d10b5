//! SQLite-backed audit trail of authorization decisions.
//!
//! Deny reasons are never shown to requesters. They are recorded here so
//! operators can answer "why was this write rejected?" after the fact.
//!
//! # Example
//!
//! ```no_run
//! use audit::{AuditRecord, AuditStore};
//! use chrono::Utc;
//! use rules::{Operation, Principal, Resource, Ruleset};
//!
//! let store = AuditStore::open("audit.db")?;
//! let principal = Principal::worker("u1", "c1");
//! let resource = Resource::new("jobs", "j1", Utc::now());
//! let decision = Ruleset::sierra().evaluate(&principal, Operation::Read, &resource);
//!
//! store.record(&AuditRecord::new(&principal, Operation::Read, &resource, &decision))?;
//!
//! for record in store.denials(20)? {
//!     println!("{} {} {}", record.timestamp, record.collection, record.reason);
//! }
//! # Ok::<(), audit::Error>(())
//! ```

mod error;
mod record;
mod store;

pub use error::{Error, Result};
pub use record::AuditRecord;
pub use store::{AuditCounts, AuditStore};
