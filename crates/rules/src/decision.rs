//! Policy evaluation: turns a request into an allow/deny [`Decision`].
//!
//! Evaluation order, first match wins:
//!
//! 1. unauthenticated principals are denied;
//! 2. creates and updates must pass schema validation;
//! 3. the per-operation rule in [`RULES`] must grant access;
//! 4. anything else is denied by default.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::validate;
use crate::scope::{Scope, resolve_scope};
use crate::{Operation, Principal, Resource, Schema};

/// Which rule clause allowed a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grant {
    OwnerInOrg,
    Owner,
    SameOrg,
    Admin,
}

impl Grant {
    pub fn as_str(self) -> &'static str {
        match self {
            Grant::OwnerInOrg => "owner_in_org",
            Grant::Owner => "owner",
            Grant::SameOrg => "same_org",
            Grant::Admin => "admin",
        }
    }
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a request was denied.
///
/// Reasons are for audit and tests; requesters only ever see a generic
/// permission error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenyReason {
    Unauthenticated,
    SchemaViolation {
        missing_fields: BTreeSet<String>,
        type_errors: BTreeSet<String>,
    },
    RequiredFieldNull {
        fields: BTreeSet<String>,
    },
    ImmutableFieldModified {
        fields: BTreeSet<String>,
    },
    ServerFieldForged {
        fields: BTreeSet<String>,
    },
    ScopeDenied,
    DefaultDenied,
}

impl DenyReason {
    /// Stable identifier used by suites and the audit trail.
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::Unauthenticated => "unauthenticated",
            DenyReason::SchemaViolation { .. } => "schema_violation",
            DenyReason::RequiredFieldNull { .. } => "required_field_null",
            DenyReason::ImmutableFieldModified { .. } => "immutable_field_modified",
            DenyReason::ServerFieldForged { .. } => "server_field_forged",
            DenyReason::ScopeDenied => "scope_denied",
            DenyReason::DefaultDenied => "default_denied",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Unauthenticated => f.write_str("unauthenticated"),
            DenyReason::SchemaViolation {
                missing_fields,
                type_errors,
            } => {
                if missing_fields.is_empty() {
                    write!(f, "field type mismatch: {}", join(type_errors))
                } else {
                    write!(f, "required field missing: {}", join(missing_fields))
                }
            }
            DenyReason::RequiredFieldNull { fields } => {
                write!(f, "required field null: {}", join(fields))
            }
            DenyReason::ImmutableFieldModified { fields } => {
                write!(f, "immutable field modified: {}", join(fields))
            }
            DenyReason::ServerFieldForged { fields } => {
                write!(f, "server field forged: {}", join(fields))
            }
            DenyReason::ScopeDenied => f.write_str("scope denied"),
            DenyReason::DefaultDenied => f.write_str("default deny"),
        }
    }
}

fn join(fields: &BTreeSet<String>) -> String {
    fields.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Result of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Allow { grant: Grant },
    Deny { reason: DenyReason },
}

impl Decision {
    pub fn deny(reason: DenyReason) -> Self {
        Decision::Deny { reason }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow { .. })
    }

    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Decision::Allow { .. } => None,
            Decision::Deny { reason } => Some(reason),
        }
    }

    /// `"allowed"` or the deny reason's code.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Decision::Allow { .. } => "allowed",
            Decision::Deny { reason } => reason.code(),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow { grant } => write!(f, "ALLOW ({grant})"),
            Decision::Deny { reason } => write!(f, "DENY ({reason})"),
        }
    }
}

/// One row of the rule table.
pub struct Rule {
    pub operation: Operation,
    pub condition: fn(Scope) -> Option<Grant>,
}

/// Per-operation allow conditions.
pub const RULES: [Rule; 5] = [
    Rule {
        operation: Operation::Create,
        condition: |s| (s.is_owner && s.same_org).then_some(Grant::OwnerInOrg),
    },
    Rule {
        operation: Operation::Read,
        condition: |s| owner(s).or_else(|| org(s)).or_else(|| admin(s)),
    },
    Rule {
        operation: Operation::Update,
        condition: |s| {
            (s.is_owner && s.same_org)
                .then_some(Grant::OwnerInOrg)
                .or_else(|| admin(s))
        },
    },
    Rule {
        operation: Operation::Delete,
        condition: |s| owner(s).or_else(|| admin(s)),
    },
    Rule {
        operation: Operation::List,
        condition: |s| org(s).or_else(|| admin(s)),
    },
];

fn owner(s: Scope) -> Option<Grant> {
    s.is_owner.then_some(Grant::Owner)
}

fn org(s: Scope) -> Option<Grant> {
    s.same_org.then_some(Grant::SameOrg)
}

fn admin(s: Scope) -> Option<Grant> {
    s.is_admin.then_some(Grant::Admin)
}

/// Decide whether `principal` may perform `operation` on `resource`.
///
/// Pure and deterministic: the same inputs always give the same decision.
pub fn decide(
    principal: &Principal,
    operation: Operation,
    resource: &Resource,
    schema: &Schema,
) -> Decision {
    let decision = evaluate(principal, operation, resource, schema);
    tracing::debug!(
        collection = %resource.collection,
        document = %resource.document_id,
        %operation,
        allowed = decision.is_allowed(),
        reason = decision.reason_code(),
        "authorization decision"
    );
    decision
}

fn evaluate(
    principal: &Principal,
    operation: Operation,
    resource: &Resource,
    schema: &Schema,
) -> Decision {
    if !principal.authenticated {
        return Decision::deny(DenyReason::Unauthenticated);
    }

    if operation.is_write() {
        let mut validation = validate(schema, operation, resource);
        if schema.admin_may_modify_immutable
            && principal.is_admin()
            && !validation.immutable_violations.is_empty()
        {
            tracing::debug!(
                subject = %principal.subject_id,
                fields = ?validation.immutable_violations,
                "admin override of immutable fields"
            );
            validation.immutable_violations.clear();
        }
        if let Some(reason) = validation.failure() {
            return Decision::deny(reason);
        }
    }

    let Some(rule) = RULES.iter().find(|r| r.operation == operation) else {
        return Decision::deny(DenyReason::DefaultDenied);
    };

    match (rule.condition)(resolve_scope(principal, operation, resource)) {
        Some(grant) => Decision::Allow { grant },
        None => Decision::deny(DenyReason::ScopeDenied),
    }
}
