//! Toolflow - compiler for tool-orchestration workflow specs
//!
//! ## Module Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        DOMAIN MODEL                          │
//! │  ast/        JSON value → Rust types (WorkflowSpec, nodes)   │
//! │  condition   safe boolean-expression grammar                 │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        ANALYSIS                              │
//! │  validate/   lowering, report, ValidatedWorkflow             │
//! │  scope       flow-sensitive reference availability           │
//! │  limits      complexity caps                                 │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        BACKEND                               │
//! │  codegen/    ValidatedWorkflow → Python program              │
//! │  compile     pipeline (validate + generate)                  │
//! │  runtime     executor contract (implemented elsewhere)       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`ast`] | Typed workflow tree, identifiers, references, secret heuristic |
//! | [`condition`] | Deny-list then allow-list checks on condition strings |
//! | [`validate`] | Accumulating validation, `ValidationReport`, feedback text |
//! | [`scope`] | Guaranteed-binding analysis per node kind |
//! | [`limits`] | Sequence/fan-out/rule/tool-call/depth caps |
//! | [`codegen`] | Deterministic emission plus self-check |
//! | [`compile`] | `Compiler`, `CompiledProgram` |
//! | [`config`] | TOML config: limits and known-library index |
//! | [`document`] | JSON/YAML document loading |
//! | [`runtime`] | `ProgramExecutor` trait and request/report types |
//! | [`error`] | Error types with fix suggestions |

// ═══════════════════════════════════════════════════════════════
// DOMAIN MODEL
// ═══════════════════════════════════════════════════════════════
pub mod ast;
pub mod condition;

// ═══════════════════════════════════════════════════════════════
// ANALYSIS
// ═══════════════════════════════════════════════════════════════
pub mod limits;
pub mod scope;
pub mod validate;

// ═══════════════════════════════════════════════════════════════
// BACKEND
// ═══════════════════════════════════════════════════════════════
pub mod codegen;
pub mod compile;
pub mod runtime;

// ═══════════════════════════════════════════════════════════════
// CROSS-CUTTING - Error handling, configuration, input
// ═══════════════════════════════════════════════════════════════
pub mod config;
pub mod document;
pub mod error;

// ═══════════════════════════════════════════════════════════════
// PUBLIC API RE-EXPORTS
// ═══════════════════════════════════════════════════════════════

pub use ast::{WorkflowNode, WorkflowSpec};
pub use compile::{compile, CompiledProgram, Compiler};
pub use config::{CompilerConfig, LibraryEntry, LibraryIndex};
pub use error::{FixSuggestion, Result, ToolflowError};
pub use limits::Limits;
pub use runtime::{ExecutionOutcome, ExecutionReport, ExecutionRequest, ProgramExecutor};
pub use validate::{validate, ValidatedWorkflow, ValidationIssue, ValidationReport, Validator};
