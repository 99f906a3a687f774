//! Candidate documents
//!
//! Workflows arrive as JSON; YAML is accepted for hand-written files and is
//! parsed into the same `serde_json::Value` model, so validation never sees
//! the difference.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::{Result, ToolflowError};

/// Source format of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// `.json` is JSON, anything else is YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }
}

pub fn parse_json(content: &str) -> Result<Value> {
    serde_json::from_str(content).map_err(|e| ToolflowError::ParseError {
        details: e.to_string(),
    })
}

pub fn parse_yaml(content: &str) -> Result<Value> {
    serde_yaml::from_str(content).map_err(|e| ToolflowError::ParseError {
        details: e.to_string(),
    })
}

pub fn parse_document(content: &str, format: DocumentFormat) -> Result<Value> {
    match format {
        DocumentFormat::Json => parse_json(content),
        DocumentFormat::Yaml => parse_yaml(content),
    }
}

/// Read and parse a document from disk
pub fn load_document(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Err(ToolflowError::DocumentNotFound {
            path: path.display().to_string(),
        });
    }
    let content = fs::read_to_string(path)?;
    parse_document(&content, DocumentFormat::from_path(path))
}
