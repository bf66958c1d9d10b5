//! Scenario suites: named requests with expected outcomes.
//!
//! ```toml
//! [[case]]
//! name = "worker creates own job"
//! expect = "allow"
//!
//! [case.request]
//! operation = "create"
//! principal = { subjectId = "u1", role = "worker", companyId = "c1", authenticated = true }
//!
//! [case.request.resource]
//! collection = "jobs"
//! documentId = "j1"
//! requestTime = "2024-03-01T08:00:00Z"
//! proposedData = { ownerId = "u1", orgId = "c1", status = "open" }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Decision, Error, Request, Result, Ruleset};

/// Expected outcome of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expect {
    Allow,
    Deny,
}

/// A single scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub name: String,
    pub request: Request,
    pub expect: Expect,
    /// Expected reason code, checked only when set.
    #[serde(default)]
    pub reason: Option<String>,
}

impl Case {
    fn matches(&self, decision: &Decision) -> bool {
        let expected = match self.expect {
            Expect::Allow => true,
            Expect::Deny => false,
        };
        decision.is_allowed() == expected
            && self
                .reason
                .as_deref()
                .is_none_or(|code| code == decision.reason_code())
    }
}

/// A collection of scenarios, loaded from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suite {
    #[serde(default, rename = "case")]
    pub cases: Vec<Case>,
}

/// Result of one case.
#[derive(Debug, Clone)]
pub struct CaseOutcome {
    pub name: String,
    pub decision: Decision,
    pub passed: bool,
}

/// Results of a whole suite, in case order.
#[derive(Debug, Clone, Default)]
pub struct SuiteReport {
    pub outcomes: Vec<CaseOutcome>,
}

impl SuiteReport {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }
}

impl Suite {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    pub fn parse(toml: &str) -> Result<Self> {
        toml::from_str(toml).map_err(|e| Error::Parse(e.to_string()))
    }

    /// Run every case against `rules`.
    pub fn run(&self, rules: &Ruleset) -> SuiteReport {
        let outcomes = self
            .cases
            .iter()
            .map(|case| {
                let decision = rules.evaluate_request(&case.request);
                let passed = case.matches(&decision);
                if !passed {
                    tracing::warn!(case = %case.name, actual = %decision, "scenario failed");
                }
                CaseOutcome {
                    name: case.name.clone(),
                    decision,
                    passed,
                }
            })
            .collect();
        SuiteReport { outcomes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUITE: &str = r#"
[[case]]
name = "worker creates own job"
expect = "allow"

[case.request]
operation = "create"
principal = { subjectId = "u1", role = "worker", companyId = "c1", authenticated = true }

[case.request.resource]
collection = "jobs"
documentId = "j1"
requestTime = "2024-03-01T08:00:00Z"
proposedData = { ownerId = "u1", orgId = "c1", status = "open" }

[[case]]
name = "anonymous read"
expect = "deny"
reason = "unauthenticated"

[case.request]
operation = "read"
principal = { authenticated = false }

[case.request.resource]
collection = "jobs"
documentId = "j1"
requestTime = "2024-03-01T08:00:00Z"
existingData = { ownerId = "u1", orgId = "c1", status = "open" }

[[case]]
name = "wrong expectation"
expect = "allow"

[case.request]
operation = "delete"
principal = { subjectId = "u2", role = "worker", companyId = "c1", authenticated = true }

[case.request.resource]
collection = "jobs"
documentId = "j1"
requestTime = "2024-03-01T08:00:00Z"
existingData = { ownerId = "u1", orgId = "c1", status = "open" }
"#;

    #[test]
    fn test_parse_suite() {
        let suite = Suite::parse(SUITE).unwrap();
        assert_eq!(suite.cases.len(), 3);
        assert_eq!(suite.cases[1].reason.as_deref(), Some("unauthenticated"));
    }

    #[test]
    fn test_run_suite() {
        let suite = Suite::parse(SUITE).unwrap();
        let report = suite.run(&Ruleset::sierra());

        assert!(!report.passed());
        let failed: Vec<_> = report.failures().map(|o| o.name.as_str()).collect();
        assert_eq!(failed, ["wrong expectation"]);
        assert_eq!(report.outcomes[2].decision.reason_code(), "scope_denied");
    }

    #[test]
    fn test_reason_mismatch_fails() {
        let mut suite = Suite::parse(SUITE).unwrap();
        suite.cases.truncate(2);
        suite.cases[1].reason = Some("scope_denied".into());
        let report = suite.run(&Ruleset::sierra());
        assert_eq!(report.failures().count(), 1);
    }
}
