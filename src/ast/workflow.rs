//! Workflow root types
//!
//! `WorkflowSpec` is the accepted, immutable form of a candidate document.
//! Serialization is canonical: serializing, re-lowering and serializing
//! again yields identical text.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, ToolflowError};

use super::node::WorkflowNode;
use super::secret::is_secret_name;

/// Declared parameter type (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub const ALL: [ParamType; 6] = [
        ParamType::String,
        ParamType::Integer,
        ParamType::Number,
        ParamType::Boolean,
        ParamType::Array,
        ParamType::Object,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }
}

/// Workflow input
///
/// `is_secret` is derived from the name when the param is built and cannot
/// be set from outside.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputParam {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Sample value for the generated usage block
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(skip)]
    is_secret: bool,
}

impl InputParam {
    pub fn new(
        name: impl Into<String>,
        param_type: ParamType,
        description: Option<String>,
        example: Option<Value>,
    ) -> Self {
        let name = name.into();
        let is_secret = is_secret_name(&name);
        Self {
            name,
            param_type,
            description,
            example,
            is_secret,
        }
    }

    pub fn is_secret(&self) -> bool {
        self.is_secret
    }
}

/// Workflow output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputParam {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Root of an accepted workflow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowSpec {
    pub name: String,
    pub description: String,
    pub version: String,
    pub inputs: Vec<InputParam>,
    pub outputs: Vec<OutputParam>,
    pub workflow: WorkflowNode,
    pub metadata: BTreeMap<String, Value>,
}

impl WorkflowSpec {
    /// Canonical pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ToolflowError::SerializeError {
            details: e.to_string(),
        })
    }

    /// 16-hex xxh3 fingerprint of the canonical compact JSON
    pub fn fingerprint(&self) -> Result<String> {
        use xxhash_rust::xxh3::xxh3_64;

        let compact = serde_json::to_string(self).map_err(|e| ToolflowError::SerializeError {
            details: e.to_string(),
        })?;
        Ok(format!("{:016x}", xxh3_64(compact.as_bytes())))
    }

    /// Names of inputs classified as secret, sorted
    pub fn secret_inputs(&self) -> BTreeSet<String> {
        self.inputs
            .iter()
            .filter(|p| p.is_secret())
            .map(|p| p.name.clone())
            .collect()
    }

    /// Distinct tool names used anywhere in the tree, sorted
    pub fn tool_names(&self) -> BTreeSet<String> {
        let mut tools = BTreeSet::new();
        self.workflow.for_each_invocation(&mut |call| {
            tools.insert(call.tool.clone());
        });
        tools
    }
}
