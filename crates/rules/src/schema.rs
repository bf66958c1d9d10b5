//! Per-collection document schemas and write validation.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{DenyReason, Document, FieldType, Operation, Resource, Value};

/// Structural rules for the documents of one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Fields that must be present and non-null on create.
    #[serde(default)]
    pub required_fields: BTreeSet<String>,

    /// Declared type of each known field.
    #[serde(default)]
    pub field_types: BTreeMap<String, FieldType>,

    /// Fields only the request clock may write.
    #[serde(default)]
    pub server_controlled_fields: BTreeSet<String>,

    /// Fields that keep their stored value across updates.
    #[serde(default)]
    pub immutable_fields: BTreeSet<String>,

    /// Let admins change immutable fields (e.g. reassign a document).
    #[serde(default)]
    pub admin_may_modify_immutable: bool,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a required field of the given type.
    pub fn require(mut self, field: &str, ty: FieldType) -> Self {
        self.required_fields.insert(field.to_string());
        self.field(field, ty)
    }

    /// Declare an optional field of the given type.
    pub fn field(mut self, field: &str, ty: FieldType) -> Self {
        self.field_types.insert(field.to_string(), ty);
        self
    }

    pub fn immutable(mut self, field: &str) -> Self {
        self.immutable_fields.insert(field.to_string());
        self
    }

    /// Declare a timestamp field that only the request clock may write.
    pub fn server_controlled(mut self, field: &str) -> Self {
        self.server_controlled_fields.insert(field.to_string());
        self.field(field, FieldType::Timestamp)
    }

    pub fn admin_override(mut self) -> Self {
        self.admin_may_modify_immutable = true;
        self
    }
}

/// Outcome of validating a write against a [`Schema`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub missing_fields: BTreeSet<String>,
    pub null_fields: BTreeSet<String>,
    pub type_errors: BTreeSet<String>,
    pub immutable_violations: BTreeSet<String>,
    pub forged_fields: BTreeSet<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.failure().is_none()
    }

    /// The deny reason for this result, if any.
    ///
    /// Precedence: missing, null, type, immutable, forged.
    pub fn failure(&self) -> Option<DenyReason> {
        if !self.missing_fields.is_empty() {
            return Some(DenyReason::SchemaViolation {
                missing_fields: self.missing_fields.clone(),
                type_errors: self.type_errors.clone(),
            });
        }
        if !self.null_fields.is_empty() {
            return Some(DenyReason::RequiredFieldNull {
                fields: self.null_fields.clone(),
            });
        }
        if !self.type_errors.is_empty() {
            return Some(DenyReason::SchemaViolation {
                missing_fields: BTreeSet::new(),
                type_errors: self.type_errors.clone(),
            });
        }
        if !self.immutable_violations.is_empty() {
            return Some(DenyReason::ImmutableFieldModified {
                fields: self.immutable_violations.clone(),
            });
        }
        if !self.forged_fields.is_empty() {
            return Some(DenyReason::ServerFieldForged {
                fields: self.forged_fields.clone(),
            });
        }
        None
    }
}

/// Validate the proposed data of a write.
///
/// Reads and deletes carry nothing to validate and always pass.
pub fn validate(schema: &Schema, operation: Operation, resource: &Resource) -> ValidationResult {
    let mut result = ValidationResult::default();
    if !operation.is_write() {
        return result;
    }

    let empty = Document::new();
    let proposed = resource.proposed_data.as_ref().unwrap_or(&empty);

    for field in &schema.required_fields {
        match proposed.get(field) {
            None if operation == Operation::Create => {
                result.missing_fields.insert(field.clone());
            }
            Some(Value::Null) => {
                result.null_fields.insert(field.clone());
            }
            _ => {}
        }
    }

    // Server-controlled fields are judged only against the request clock.
    for (field, value) in proposed {
        if schema.server_controlled_fields.contains(field) {
            continue;
        }
        let Some(actual) = value.field_type() else {
            continue;
        };
        if let Some(expected) = schema.field_types.get(field) {
            if actual != *expected {
                result.type_errors.insert(field.clone());
            }
        }
    }

    if operation == Operation::Update {
        let existing = resource.existing_data.as_ref();
        for field in &schema.immutable_fields {
            let Some(value) = proposed.get(field) else {
                continue;
            };
            if existing.and_then(|d| d.get(field)) != Some(value) {
                result.immutable_violations.insert(field.clone());
            }
        }
    }

    let stamp = Value::timestamp(resource.request_time);
    for field in &schema.server_controlled_fields {
        if proposed.get(field).is_some_and(|value| *value != stamp) {
            result.forged_fields.insert(field.clone());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document;
    use chrono::{TimeZone, Utc};

    fn jobs() -> Schema {
        Schema::new()
            .require("ownerId", FieldType::String)
            .require("orgId", FieldType::String)
            .require("status", FieldType::String)
            .field("notes", FieldType::String)
            .immutable("ownerId")
            .server_controlled("updatedAt")
    }

    fn create(data: Document) -> Resource {
        Resource::new("jobs", "j1", Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap())
            .with_proposed(data)
    }

    fn stored() -> Document {
        document([("ownerId", "u1"), ("orgId", "c1"), ("status", "open")])
    }

    #[test]
    fn test_create_complete_document_passes() {
        let result = validate(&jobs(), Operation::Create, &create(stored()));
        assert!(result.is_ok());
    }

    #[test]
    fn test_create_missing_field() {
        let data = document([("ownerId", "u1"), ("orgId", "c1")]);
        let result = validate(&jobs(), Operation::Create, &create(data));
        assert!(result.missing_fields.contains("status"));
        assert_eq!(
            result.failure().map(|r| r.to_string()),
            Some("required field missing: status".to_string())
        );
    }

    #[test]
    fn test_create_null_is_not_missing() {
        let mut data = stored();
        data.insert("status".into(), Value::Null);
        let result = validate(&jobs(), Operation::Create, &create(data));
        assert!(result.missing_fields.is_empty());
        assert!(matches!(
            result.failure(),
            Some(DenyReason::RequiredFieldNull { .. })
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let mut data = stored();
        data.insert("status".into(), Value::Number(3.0));
        let result = validate(&jobs(), Operation::Create, &create(data));
        assert!(result.type_errors.contains("status"));
        assert!(matches!(
            result.failure(),
            Some(DenyReason::SchemaViolation { ref missing_fields, .. }) if missing_fields.is_empty()
        ));
    }

    #[test]
    fn test_optional_null_accepted() {
        let mut data = stored();
        data.insert("notes".into(), Value::Null);
        assert!(validate(&jobs(), Operation::Create, &create(data)).is_ok());
    }

    #[test]
    fn test_update_delta_need_not_repeat_required_fields() {
        let resource = create(document([("status", "closed")])).with_existing(stored());
        assert!(validate(&jobs(), Operation::Update, &resource).is_ok());
    }

    #[test]
    fn test_update_nulling_required_field() {
        let mut delta = Document::new();
        delta.insert("status".into(), Value::Null);
        let resource = create(delta).with_existing(stored());
        let result = validate(&jobs(), Operation::Update, &resource);
        assert_eq!(result.null_fields.len(), 1);
        assert!(!result.is_ok());
    }

    #[test]
    fn test_immutable_same_value_allowed() {
        let resource = create(document([("ownerId", "u1"), ("status", "closed")]))
            .with_existing(stored());
        assert!(validate(&jobs(), Operation::Update, &resource).is_ok());
    }

    #[test]
    fn test_immutable_changed_value_rejected() {
        let resource = create(document([("ownerId", "u2")])).with_existing(stored());
        let result = validate(&jobs(), Operation::Update, &resource);
        assert!(result.immutable_violations.contains("ownerId"));
        assert_eq!(
            result.failure().map(|r| r.code()),
            Some("immutable_field_modified")
        );
    }

    #[test]
    fn test_server_field_must_match_request_time() {
        let resource = create(stored());
        let mut data = stored();
        data.insert("updatedAt".into(), Value::timestamp(resource.request_time));
        let resource = resource.with_proposed(data);
        assert!(validate(&jobs(), Operation::Create, &resource).is_ok());
    }

    #[test]
    fn test_server_field_forged() {
        let mut data = stored();
        data.insert(
            "updatedAt".into(),
            Value::timestamp(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()),
        );
        let result = validate(&jobs(), Operation::Create, &create(data));
        assert!(result.forged_fields.contains("updatedAt"));
        assert_eq!(
            result.failure().map(|r| r.to_string()),
            Some("server field forged: updatedAt".to_string())
        );
    }

    #[test]
    fn test_server_field_wrong_type_is_forged() {
        for value in [Value::from("2024-03-01T08:00:00Z"), Value::Number(0.0)] {
            let mut data = stored();
            data.insert("updatedAt".into(), value);
            let result = validate(&jobs(), Operation::Create, &create(data));
            assert!(result.type_errors.is_empty());
            assert_eq!(
                result.failure().map(|r| r.code()),
                Some("server_field_forged")
            );
        }
    }

    #[test]
    fn test_reads_are_not_validated() {
        let resource = create(Document::new());
        assert!(validate(&jobs(), Operation::Read, &resource).is_ok());
        assert!(validate(&jobs(), Operation::Delete, &resource).is_ok());
    }
}
