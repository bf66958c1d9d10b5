//! Collection rules: which schema and operations apply to each collection.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    Decision, DenyReason, Error, FieldType, Operation, Principal, Request, Resource, Result,
    Schema, decide,
};

/// Rules for every collection, loaded from TOML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ruleset {
    /// Rules keyed by collection name. Unlisted collections deny everything.
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionRules>,
}

/// Rules for a single collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRules {
    /// Operations the collection supports at all.
    #[serde(default = "all_operations")]
    pub operations: BTreeSet<Operation>,

    #[serde(flatten)]
    pub schema: Schema,
}

fn all_operations() -> BTreeSet<Operation> {
    Operation::ALL.into_iter().collect()
}

impl CollectionRules {
    pub fn new(schema: Schema) -> Self {
        Self {
            operations: all_operations(),
            schema,
        }
    }

    /// Restrict the collection to the given operations.
    pub fn only(mut self, operations: &[Operation]) -> Self {
        self.operations = operations.iter().copied().collect();
        self
    }
}

impl Ruleset {
    /// Load rules from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse rules from a TOML string and check them for consistency.
    pub fn parse(toml: &str) -> Result<Self> {
        let rules: Self = toml::from_str(toml).map_err(|e| Error::Parse(e.to_string()))?;
        rules.validate()?;
        Ok(rules)
    }

    /// Serialize the rules back to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Serialize(e.to_string()))
    }

    /// Built-in rules for the painting business collections.
    pub fn sierra() -> Self {
        let owned = |schema: Schema| {
            schema
                .require("ownerId", FieldType::String)
                .require("orgId", FieldType::String)
                .immutable("ownerId")
                .immutable("orgId")
                .field("createdAt", FieldType::Timestamp)
                .immutable("createdAt")
                .server_controlled("updatedAt")
                .admin_override()
        };

        let jobs = owned(Schema::new())
            .require("status", FieldType::String)
            .field("title", FieldType::String)
            .field("address", FieldType::Map)
            .field("scheduledAt", FieldType::Timestamp)
            .field("notes", FieldType::String);

        let estimates = owned(Schema::new())
            .require("jobId", FieldType::String)
            .require("amount", FieldType::Number)
            .require("status", FieldType::String)
            .field("lineItems", FieldType::Map)
            .immutable("jobId");

        let invoices = owned(Schema::new())
            .require("jobId", FieldType::String)
            .require("amount", FieldType::Number)
            .require("paid", FieldType::Boolean)
            .field("dueAt", FieldType::Timestamp)
            .immutable("jobId");

        let time_entries = owned(Schema::new())
            .require("jobId", FieldType::String)
            .require("clockIn", FieldType::Timestamp)
            .field("clockOut", FieldType::Timestamp)
            .field("notes", FieldType::String)
            .immutable("jobId");

        let mut collections = BTreeMap::new();
        collections.insert("jobs".to_string(), CollectionRules::new(jobs));
        collections.insert("estimates".to_string(), CollectionRules::new(estimates));
        collections.insert(
            "invoices".to_string(),
            CollectionRules::new(invoices).only(&[
                Operation::Create,
                Operation::Read,
                Operation::Update,
                Operation::List,
            ]),
        );
        collections.insert("time_entries".to_string(), CollectionRules::new(time_entries));

        Self { collections }
    }

    /// Check that every constrained field has a declared type and that no
    /// field is both immutable and server-controlled.
    pub fn validate(&self) -> Result<()> {
        for (name, rules) in &self.collections {
            let schema = &rules.schema;
            let constrained = schema
                .required_fields
                .iter()
                .chain(&schema.immutable_fields)
                .chain(&schema.server_controlled_fields);
            for field in constrained {
                if !schema.field_types.contains_key(field) {
                    return Err(Error::Invalid(format!(
                        "{name}: field '{field}' has no declared type"
                    )));
                }
            }
            if let Some(field) = schema
                .immutable_fields
                .intersection(&schema.server_controlled_fields)
                .next()
            {
                return Err(Error::Invalid(format!(
                    "{name}: field '{field}' is both immutable and server-controlled"
                )));
            }
            if let Some(field) = schema
                .server_controlled_fields
                .iter()
                .find(|f| schema.field_types.get(*f) != Some(&FieldType::Timestamp))
            {
                return Err(Error::Invalid(format!(
                    "{name}: server-controlled field '{field}' must be a timestamp"
                )));
            }
        }
        Ok(())
    }

    /// Evaluate a request against the rules of its collection.
    pub fn evaluate(
        &self,
        principal: &Principal,
        operation: Operation,
        resource: &Resource,
    ) -> Decision {
        match self.collections.get(&resource.collection) {
            Some(rules) if rules.operations.contains(&operation) => {
                decide(principal, operation, resource, &rules.schema)
            }
            _ if !principal.authenticated => Decision::deny(DenyReason::Unauthenticated),
            _ => {
                tracing::debug!(
                    collection = %resource.collection,
                    %operation,
                    "no rule matches"
                );
                Decision::deny(DenyReason::DefaultDenied)
            }
        }
    }

    pub fn evaluate_request(&self, request: &Request) -> Decision {
        self.evaluate(&request.principal, request.operation, &request.resource)
    }

    /// Keep only the listed documents the principal may see.
    pub fn filter_list<'a>(
        &self,
        principal: &Principal,
        resources: &'a [Resource],
    ) -> Vec<&'a Resource> {
        resources
            .iter()
            .filter(|r| self.evaluate(principal, Operation::List, r).is_allowed())
            .collect()
    }
}
