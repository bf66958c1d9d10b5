//! Ownership and organization attributes of a request.
//!
//! Only extracts attributes; combining them is left to the rule table in
//! [`crate::decision`].

use crate::{Document, Operation, Principal, Resource};

/// Document field naming the owning user.
pub const OWNER_FIELD: &str = "ownerId";

/// Document field naming the owning organization.
pub const ORG_FIELD: &str = "orgId";

/// Relationship between a principal and a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scope {
    pub is_owner: bool,
    pub same_org: bool,
    pub is_admin: bool,
}

/// Resolve the [`Scope`] of a request.
///
/// Creates are judged by the proposed document; every other operation by
/// the stored one.
pub fn resolve_scope(principal: &Principal, operation: Operation, resource: &Resource) -> Scope {
    let data = match operation {
        Operation::Create => resource.proposed_data.as_ref(),
        _ => resource.existing_data.as_ref(),
    };

    Scope {
        is_owner: field_equals(data, OWNER_FIELD, &principal.subject_id),
        same_org: field_equals(data, ORG_FIELD, &principal.company_id),
        is_admin: principal.is_admin(),
    }
}

// Empty identities never match, even against an empty stored string.
fn field_equals(data: Option<&Document>, field: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    data.and_then(|d| d.get(field))
        .and_then(|v| v.as_str())
        .is_some_and(|actual| actual == expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Value, document};
    use chrono::Utc;

    fn resource() -> Resource {
        Resource::new("jobs", "j1", Utc::now())
    }

    #[test]
    fn test_create_uses_proposed_data() {
        let res = resource()
            .with_existing(document([("ownerId", "u9"), ("orgId", "c9")]))
            .with_proposed(document([("ownerId", "u1"), ("orgId", "c1")]));
        let scope = resolve_scope(&Principal::worker("u1", "c1"), Operation::Create, &res);
        assert!(scope.is_owner);
        assert!(scope.same_org);
        assert!(!scope.is_admin);
    }

    #[test]
    fn test_update_uses_existing_data() {
        let res = resource()
            .with_existing(document([("ownerId", "u9"), ("orgId", "c1")]))
            .with_proposed(document([("ownerId", "u1")]));
        let scope = resolve_scope(&Principal::worker("u1", "c1"), Operation::Update, &res);
        assert!(!scope.is_owner);
        assert!(scope.same_org);
    }

    #[test]
    fn test_missing_document_matches_nothing() {
        let scope = resolve_scope(&Principal::admin("u1", "c1"), Operation::Read, &resource());
        assert_eq!(
            scope,
            Scope {
                is_owner: false,
                same_org: false,
                is_admin: true
            }
        );
    }

    #[test]
    fn test_empty_company_never_matches() {
        let res = resource().with_existing(document([("ownerId", "u1"), ("orgId", "")]));
        let scope = resolve_scope(&Principal::worker("u1", ""), Operation::Read, &res);
        assert!(scope.is_owner);
        assert!(!scope.same_org);
    }

    #[test]
    fn test_non_string_owner_never_matches() {
        let mut data = document([("orgId", "c1")]);
        data.insert("ownerId".into(), Value::Number(1.0));
        let res = resource().with_existing(data);
        let scope = resolve_scope(&Principal::worker("1", "c1"), Operation::Delete, &res);
        assert!(!scope.is_owner);
    }
}
