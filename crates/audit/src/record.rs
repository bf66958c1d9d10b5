//! Audit record type.

use chrono::{DateTime, Utc};
use rules::{Decision, Operation, Principal, Resource};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One evaluated request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    /// The request time the decision was made for.
    pub timestamp: DateTime<Utc>,
    pub subject_id: String,
    pub collection: String,
    pub document_id: String,
    pub operation: Operation,
    pub allowed: bool,
    /// Reason code, `"allowed"` for allowed requests.
    pub reason: String,
}

impl AuditRecord {
    pub fn new(
        principal: &Principal,
        operation: Operation,
        resource: &Resource,
        decision: &Decision,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: resource.request_time,
            subject_id: principal.subject_id.clone(),
            collection: resource.collection.clone(),
            document_id: resource.document_id.clone(),
            operation,
            allowed: decision.is_allowed(),
            reason: decision.reason_code().to_string(),
        }
    }
}
