//! Compile pipeline
//!
//! document → validate → generate. The only entry point that turns a
//! candidate document into program text.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::ast::is_secret_name;
use crate::codegen::Generator;
use crate::config::CompilerConfig;
use crate::error::Result;
use crate::validate::{ValidatedWorkflow, Validator};

/// What the compiler hands back for one workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledProgram {
    /// Python source text
    pub source: String,
    /// Secret inputs plus credential-named tool parameters, sorted
    pub secret_params: BTreeSet<String>,
    /// Distinct tool names, sorted
    pub tools: BTreeSet<String>,
    /// Fingerprint of the accepted spec, as written in the header
    pub spec_hash: String,
}

/// Validator plus generator, configured once
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn validator(&self) -> Validator {
        Validator::new(self.config.limits.clone())
    }

    /// Validate only
    pub fn accept(&self, doc: &Value) -> Result<ValidatedWorkflow> {
        self.validator().validate(doc)
    }

    /// Emit the program for an already accepted workflow
    #[instrument(skip_all, fields(workflow = %workflow.spec().name))]
    pub fn emit(&self, workflow: &ValidatedWorkflow) -> Result<CompiledProgram> {
        let spec = workflow.spec();
        let source = Generator::new(&self.config.library).generate(workflow)?;

        let mut secret_params = spec.secret_inputs();
        spec.workflow.for_each_invocation(&mut |call| {
            for name in call.params.keys().filter(|n| is_secret_name(n)) {
                secret_params.insert(name.clone());
            }
        });

        let program = CompiledProgram {
            source,
            secret_params,
            tools: spec.tool_names(),
            spec_hash: spec.fingerprint()?,
        };
        info!(
            tools = program.tools.len(),
            secrets = program.secret_params.len(),
            hash = %program.spec_hash,
            "workflow compiled"
        );
        Ok(program)
    }

    /// Validate then emit
    #[instrument(skip_all)]
    pub fn compile(&self, doc: &Value) -> Result<CompiledProgram> {
        let accepted = self.accept(doc)?;
        debug!(warnings = accepted.warnings().len(), "workflow accepted");
        self.emit(&accepted)
    }
}

/// Compile with default configuration
pub fn compile(doc: &Value) -> Result<CompiledProgram> {
    Compiler::default().compile(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LibraryEntry;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "name": "notify",
            "version": "0.1.0",
            "inputs": [
                {"name": "message", "type": "string"},
                {"name": "slack_token", "type": "string"}
            ],
            "workflow": {
                "type": "sequential",
                "steps": [
                    {"type": "tool_call", "tool": "format", "params": {"text": "{{message}}"}, "output": "body"},
                    {"type": "tool_call", "tool": "post", "params": {"auth_header": "{{slack_token}}", "body": "{{body}}"}}
                ]
            }
        })
    }

    #[test]
    fn compile_reports_tools_and_secrets() {
        let program = compile(&doc()).unwrap();
        assert_eq!(program.tools.iter().collect::<Vec<_>>(), ["format", "post"]);
        assert_eq!(
            program.secret_params.iter().collect::<Vec<_>>(),
            ["auth_header", "slack_token"]
        );
        assert!(program.source.contains(&program.spec_hash));
    }

    #[test]
    fn library_tools_delegate() {
        let mut config = CompilerConfig::default();
        config.library.insert(
            "format".to_string(),
            LibraryEntry {
                module: "acme.text".to_string(),
                function: "render".to_string(),
            },
        );
        let program = Compiler::new(config).compile(&doc()).unwrap();
        assert!(program.source.contains("_delegate(\"acme.text\", \"render\", kwargs)"));
        assert!(program.source.contains("\"status\": \"placeholder\""));
    }

    #[test]
    fn invalid_document_is_a_spec_defect() {
        let mut bad = doc();
        bad["workflow"]["steps"][1]["params"]["body"] = json!("{{missing}}");
        let err = compile(&bad).unwrap_err();
        assert!(err.is_specification_defect());
        assert!(err.report().unwrap().feedback().contains("missing"));
    }
}
