//! Executor contract
//!
//! The compiler never runs programs. Whatever does implements
//! `ProgramExecutor`: it receives the program text and a resolved parameter
//! map, and reports the outcome plus its log lines, which are passed on
//! verbatim.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::compile::CompiledProgram;

/// Program text plus resolved inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub program: String,
    pub params: BTreeMap<String, Value>,
}

impl ExecutionRequest {
    pub fn new(program: &CompiledProgram, params: BTreeMap<String, Value>) -> Self {
        Self {
            program: program.source.clone(),
            params,
        }
    }

    /// Secret names the caller did not supply; the program falls back to
    /// the environment for these
    pub fn unsupplied_secrets<'a>(&self, program: &'a CompiledProgram) -> Vec<&'a str> {
        program
            .secret_params
            .iter()
            .filter(|name| !self.params.contains_key(*name))
            .map(String::as_str)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExecutionOutcome {
    Success { result: Value },
    Failure { reason: String },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub outcome: ExecutionOutcome,
    /// Executor log lines, untouched
    pub logs: Vec<String>,
}

/// Runs emitted programs somewhere else
#[async_trait]
pub trait ProgramExecutor: Send + Sync {
    /// Executor name for logs
    fn name(&self) -> &str;

    async fn execute(&self, request: ExecutionRequest) -> ExecutionReport;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcome_serializes_with_status_tag() {
        let ok = ExecutionOutcome::Success { result: json!({"x": 1}) };
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"status": "success", "result": {"x": 1}}));

        let failed = ExecutionOutcome::Failure { reason: "boom".to_string() };
        assert!(!failed.is_success());
        assert_eq!(serde_json::to_value(&failed).unwrap()["status"], "failure");
    }

    #[test]
    fn unsupplied_secrets_lists_missing_names() {
        let program = CompiledProgram {
            source: String::new(),
            secret_params: ["api_key".to_string(), "db_password".to_string()].into(),
            tools: Default::default(),
            spec_hash: "0".repeat(16),
        };
        let mut params = BTreeMap::new();
        params.insert("api_key".to_string(), json!("from-vault"));
        let request = ExecutionRequest::new(&program, params);
        assert_eq!(request.unsupplied_secrets(&program), ["db_password"]);
    }
}
