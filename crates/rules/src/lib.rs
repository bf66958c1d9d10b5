//! Document access rules for the Sierra Painting data store.
//!
//! Every read and write against the document store is checked here before
//! the store applies it. A check is a pure function of its inputs: the
//! authenticated [`Principal`], the [`Operation`], the target [`Resource`]
//! and the collection's [`Schema`]. It never fails; it returns a
//! [`Decision`] that is either an allow or a deny with a [`DenyReason`].
//!
//! # Evaluation
//!
//! 1. Unauthenticated principals are denied.
//! 2. Creates and updates are validated against the schema: required
//!    fields, field types, immutable fields and server-controlled
//!    timestamps.
//! 3. The operation's rule decides from the principal's [`Scope`]
//!    (owner, same organization, admin).
//! 4. Anything not granted is denied.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use rules::{Operation, Principal, Resource, Ruleset, document};
//!
//! let rules = Ruleset::sierra();
//! let principal = Principal::worker("u1", "c1");
//! let job = Resource::new("jobs", "j1", Utc::now())
//!     .with_proposed(document([("ownerId", "u1"), ("orgId", "c1"), ("status", "open")]));
//!
//! assert!(rules.evaluate(&principal, Operation::Create, &job).is_allowed());
//! ```

pub mod decision;
mod error;
mod model;
pub mod ruleset;
pub mod schema;
pub mod scope;
pub mod suite;

pub use decision::{Decision, DenyReason, Grant, decide};
pub use error::{Error, Result};
pub use model::{
    Claims, Document, FieldType, Operation, Principal, Request, Resource, Role, Value, document,
};
pub use ruleset::{CollectionRules, Ruleset};
pub use schema::{Schema, ValidationResult, validate};
pub use scope::{Scope, resolve_scope};
pub use suite::{CaseOutcome, Expect, Suite, SuiteReport};
