//! AST Module - typed workflow specification
//!
//! Contains the Rust types a candidate document is lowered into:
//! - `workflow`: WorkflowSpec, InputParam, OutputParam, ParamType
//! - `node`: WorkflowNode and its five variants
//! - `ident`: restricted identifier grammar
//! - `reference`: `{{name.field}}` reference syntax
//! - `secret`: credential-name heuristic
//!
//! These types represent the "what" - static structure. They are built once
//! by `validate::lower` and never mutated afterwards.

mod ident;
mod node;
mod reference;
mod secret;
mod workflow;

// Re-export all public types
pub use ident::{validate_identifier, IdentifierProblem, MAX_IDENTIFIER_LEN};
pub use node::{Branch, Dispatcher, Fanout, JoinPolicy, RoutingRule, Sequence, ToolInvocation, WorkflowNode};
pub use reference::{
    extract_references, parse_template, references_in_value, MalformedReference, Reference,
    TextSegment, REFERENCE_PATTERN,
};
pub use secret::{env_var_name, is_secret_name};
pub use workflow::{InputParam, OutputParam, ParamType, WorkflowSpec};
