//! Request inputs: principals, operations, documents and resources.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Role carried in the `role` custom claim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Worker,
    Admin,
}

impl Role {
    /// Map a raw claim value to a role. Anything but exactly `admin` is a
    /// worker.
    pub fn from_claim(raw: &str) -> Self {
        if raw == "admin" {
            Role::Admin
        } else {
            Role::Worker
        }
    }
}

/// Custom claims attached to a verified auth token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
}

/// The actor making a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    #[serde(default)]
    pub subject_id: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub company_id: String,
    #[serde(default)]
    pub authenticated: bool,
}

impl Principal {
    pub fn authenticated(
        subject_id: impl Into<String>,
        role: Role,
        company_id: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            role,
            company_id: company_id.into(),
            authenticated: true,
        }
    }

    pub fn worker(subject_id: impl Into<String>, company_id: impl Into<String>) -> Self {
        Self::authenticated(subject_id, Role::Worker, company_id)
    }

    pub fn admin(subject_id: impl Into<String>, company_id: impl Into<String>) -> Self {
        Self::authenticated(subject_id, Role::Admin, company_id)
    }

    /// A request without a verified token.
    pub fn anonymous() -> Self {
        Self {
            subject_id: String::new(),
            role: Role::Worker,
            company_id: String::new(),
            authenticated: false,
        }
    }

    /// Build a principal from a verified token's subject and custom claims.
    ///
    /// A missing role falls back to [`Role::Worker`]; a missing company id
    /// leaves the principal without an organization, which never matches a
    /// document's `orgId`.
    pub fn from_claims(subject_id: impl Into<String>, claims: &Claims) -> Self {
        Self {
            subject_id: subject_id.into(),
            role: claims.role.as_deref().map(Role::from_claim).unwrap_or_default(),
            company_id: claims.company_id.clone().unwrap_or_default(),
            authenticated: true,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A document operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Create,
        Operation::Read,
        Operation::Update,
        Operation::Delete,
        Operation::List,
    ];

    /// Whether the operation carries proposed data that must be validated.
    pub fn is_write(self) -> bool {
        matches!(self, Operation::Create | Operation::Update)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::List => "list",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| Error::UnknownOperation(s.to_string()))
    }
}

/// Declared type of a document field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Timestamp,
    Boolean,
    Map,
}

/// A document field value.
///
/// Timestamps are written as `{"$timestamp": "<RFC 3339>"}` so they stay
/// distinct from plain strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Timestamp {
        #[serde(rename = "$timestamp")]
        at: DateTime<Utc>,
    },
    String(String),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn timestamp(at: DateTime<Utc>) -> Self {
        Value::Timestamp { at }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The field type this value satisfies. `None` for null.
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(FieldType::Boolean),
            Value::Number(_) => Some(FieldType::Number),
            Value::Timestamp { .. } => Some(FieldType::Timestamp),
            Value::String(_) => Some(FieldType::String),
            Value::Map(_) => Some(FieldType::Map),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(at: DateTime<Utc>) -> Self {
        Value::Timestamp { at }
    }
}

/// Document fields by name.
pub type Document = BTreeMap<String, Value>;

/// Build a [`Document`] from `(field, value)` pairs.
pub fn document<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Document
where
    K: Into<String>,
    V: Into<Value>,
{
    fields
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// The document targeted by a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub collection: String,
    pub document_id: String,
    /// Stored document; absent on create.
    #[serde(default)]
    pub existing_data: Option<Document>,
    /// Incoming write; the full document on create, the changed fields on
    /// update, absent on read, list and delete.
    #[serde(default)]
    pub proposed_data: Option<Document>,
    /// Trusted request-time clock reading supplied by the document store.
    pub request_time: DateTime<Utc>,
}

impl Resource {
    pub fn new(
        collection: impl Into<String>,
        document_id: impl Into<String>,
        request_time: DateTime<Utc>,
    ) -> Self {
        Self {
            collection: collection.into(),
            document_id: document_id.into(),
            existing_data: None,
            proposed_data: None,
            request_time,
        }
    }

    pub fn with_existing(mut self, data: Document) -> Self {
        self.existing_data = Some(data);
        self
    }

    pub fn with_proposed(mut self, data: Document) -> Self {
        self.proposed_data = Some(data);
        self
    }
}

/// A complete request as handed over by the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub principal: Principal,
    pub operation: Operation,
    pub resource: Resource,
}

impl Request {
    /// Decode a request fixture from JSON.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_without_role_are_worker() {
        let claims = Claims {
            role: None,
            company_id: Some("c1".into()),
        };
        let principal = Principal::from_claims("u1", &claims);
        assert_eq!(principal.role, Role::Worker);
        assert_eq!(principal.company_id, "c1");
        assert!(principal.authenticated);
    }

    #[test]
    fn test_claims_unknown_role_is_worker() {
        assert_eq!(Role::from_claim("superuser"), Role::Worker);
        assert_eq!(Role::from_claim("admin"), Role::Admin);
        assert_eq!(Role::from_claim("Admin"), Role::Worker);
        assert_eq!(Role::from_claim("ADMIN"), Role::Worker);
    }

    #[test]
    fn test_claims_json_keys() {
        let claims: Claims =
            serde_json::from_str(r#"{"role": "admin", "companyId": "c9"}"#).unwrap();
        let principal = Principal::from_claims("u7", &claims);
        assert!(principal.is_admin());
        assert_eq!(principal.company_id, "c9");
    }

    #[test]
    fn test_operation_parse() {
        assert_eq!("update".parse::<Operation>().unwrap(), Operation::Update);
        assert!(matches!(
            "upsert".parse::<Operation>(),
            Err(Error::UnknownOperation(_))
        ));
    }

    #[test]
    fn test_value_json_shapes() {
        let doc: Document = serde_json::from_str(
            r#"{
                "status": "open",
                "amount": 12,
                "paid": false,
                "note": null,
                "createdAt": {"$timestamp": "2024-03-01T08:00:00Z"},
                "address": {"city": "Reno"}
            }"#,
        )
        .unwrap();

        assert_eq!(doc["status"].field_type(), Some(FieldType::String));
        assert_eq!(doc["amount"], Value::Number(12.0));
        assert_eq!(doc["paid"].field_type(), Some(FieldType::Boolean));
        assert!(doc["note"].is_null());
        assert_eq!(doc["createdAt"].field_type(), Some(FieldType::Timestamp));
        assert_eq!(doc["address"].field_type(), Some(FieldType::Map));
    }

    #[test]
    fn test_request_fixture() {
        let request = Request::from_json(
            r#"{
                "principal": {"subjectId": "u1", "role": "worker", "companyId": "c1", "authenticated": true},
                "operation": "create",
                "resource": {
                    "collection": "jobs",
                    "documentId": "j1",
                    "proposedData": {"ownerId": "u1", "orgId": "c1", "status": "open"},
                    "requestTime": "2024-03-01T08:00:00Z"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(request.operation, Operation::Create);
        assert!(request.resource.existing_data.is_none());
        assert_eq!(
            request.resource.proposed_data.unwrap()["ownerId"].as_str(),
            Some("u1")
        );
    }

    #[test]
    fn test_principal_defaults_unauthenticated() {
        let principal: Principal = serde_json::from_str(r#"{"subjectId": "u1"}"#).unwrap();
        assert!(!principal.authenticated);
    }
}
