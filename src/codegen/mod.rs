//! Code Generation - accepted workflow to a Python 3.9+ program
//!
//! Deterministic by construction: everything iterated during emission is
//! either declared order (steps, branches, rules, params) or sorted (tools,
//! sub-workflows, credential names). No clock, no randomness.
//!
//! Emitted layout:
//! 1. header comments (generator, workflow, spec hash)
//! 2. imports, workflow constants, runtime prelude
//! 3. `tool_<name>` functions, sorted
//! 4. `_workflow(ctx)`: the tree
//! 5. `run_workflow(**inputs)`: input checks and error wrapping
//! 6. `__main__` usage block

mod check;
mod expr;
mod prelude;
mod tools;
mod writer;

use std::collections::BTreeSet;

use tracing::debug;

use crate::ast::{
    env_var_name, is_secret_name, references_in_value, Dispatcher, Fanout, JoinPolicy, ParamType,
    ToolInvocation, WorkflowNode, WorkflowSpec,
};
use crate::config::LibraryIndex;
use crate::error::{Result, ToolflowError};
use crate::validate::ValidatedWorkflow;

use expr::{condition_expr, is_py_keyword, literal, py_str, value_expr};
use writer::CodeWriter;

/// Generator name written into every header
pub const GENERATOR: &str = concat!("toolflow ", env!("CARGO_PKG_VERSION"));

/// Python generator over a read-only library index
#[derive(Debug, Clone, Copy)]
pub struct Generator<'a> {
    library: &'a LibraryIndex,
}

impl<'a> Generator<'a> {
    pub fn new(library: &'a LibraryIndex) -> Self {
        Self { library }
    }

    /// Emit and self-check the program for an accepted workflow
    pub fn generate(&self, workflow: &ValidatedWorkflow) -> Result<String> {
        let spec = workflow.spec();
        let tools = spec.tool_names();
        let credentials = tools::credential_params(&spec.workflow);

        let mut w = CodeWriter::new();
        header(&mut w, spec)?;
        w.raw(prelude::IMPORTS);
        w.blank();
        constants(&mut w, spec);
        w.blank();
        w.blank();
        w.raw(prelude::PRELUDE);
        w.blank();
        w.blank();
        if !tools.is_empty() {
            tools::emit_tools(&mut w, &tools, &credentials, self.library);
            w.blank();
            w.blank();
        }

        let mut emitter = TreeEmitter::default();
        w.block("def _workflow(ctx):", |w| emitter.node(w, &spec.workflow))?;
        w.blank();
        w.blank();
        entry_point(&mut w, spec);
        w.blank();
        w.blank();
        usage(&mut w, spec);

        let source = w.finish();
        check::check_source(&source, &tools)?;

        debug!(
            tools = tools.len(),
            delegated = tools.iter().filter(|t| self.library.contains_key(*t)).count(),
            bytes = source.len(),
            "program emitted"
        );
        Ok(source)
    }
}

fn header(w: &mut CodeWriter, spec: &WorkflowSpec) -> Result<()> {
    w.line(format!("# Generated by {}. Do not edit.", GENERATOR));
    w.line(format!("# workflow: {} {}", spec.name, spec.version));
    w.line(format!("# spec-hash: {}", spec.fingerprint()?));
    let secrets = spec.secret_inputs();
    if !secrets.is_empty() {
        let vars: Vec<String> = secrets.iter().map(|s| env_var_name(s)).collect();
        w.line(format!("# secrets are read from the environment: {}", vars.join(", ")));
    }
    w.blank();
    Ok(())
}

fn py_tuple(items: impl IntoIterator<Item = String>) -> String {
    let items: Vec<String> = items.into_iter().collect();
    match items.len() {
        0 => "()".to_string(),
        1 => format!("({},)", items[0]),
        _ => format!("({})", items.join(", ")),
    }
}

fn constants(w: &mut CodeWriter, spec: &WorkflowSpec) {
    w.line(format!(
        "WORKFLOW = {{\"name\": {}, \"version\": {}, \"description\": {}}}",
        py_str(&spec.name),
        py_str(&spec.version),
        py_str(&spec.description)
    ));
    w.line(format!(
        "INPUTS = {}",
        py_tuple(spec.inputs.iter().map(|p| py_str(&p.name)))
    ));
    w.line(format!(
        "OUTPUTS = {}",
        py_tuple(spec.outputs.iter().map(|p| py_str(&p.name)))
    ));
}

/// Keyword arguments for one invocation
fn call_expr(call: &ToolInvocation) -> Result<String> {
    let mut args = Vec::with_capacity(call.params.len());
    let mut keyword_args = Vec::new();

    for (name, value) in &call.params {
        let refs = references_in_value(value).map_err(|e| ToolflowError::GenerationError {
            reason: format!("accepted workflow carries {}", e),
        })?;
        let expr = if is_secret_name(name) && refs.is_empty() && !value.is_null() {
            format!("os.environ.get({})", py_str(&env_var_name(name)))
        } else {
            value_expr(value)?
        };

        if is_py_keyword(name) {
            keyword_args.push(format!("{}: {}", py_str(name), expr));
        } else {
            args.push(format!("{}={}", name, expr));
        }
    }
    if !keyword_args.is_empty() {
        args.push(format!("**{{{}}}", keyword_args.join(", ")));
    }
    Ok(format!("tool_{}({})", call.tool, args.join(", ")))
}

/// Emits the tree; numbers nested functions in traversal order
#[derive(Default)]
struct TreeEmitter {
    next_id: usize,
}

impl TreeEmitter {
    fn id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }

    fn node(&mut self, w: &mut CodeWriter, node: &WorkflowNode) -> Result<()> {
        match node {
            WorkflowNode::ToolInvocation(call) => {
                let expr = call_expr(call)?;
                match call.output {
                    Some(ref target) => w.line(format!("ctx.set({}, {})", py_str(target), expr)),
                    None => w.line(expr),
                }
            }
            WorkflowNode::Sequence(seq) => {
                for step in &seq.steps {
                    self.node(w, step)?;
                }
            }
            WorkflowNode::Branch(branch) => {
                w.block(format!("if {}:", condition_expr(&branch.condition)), |w| {
                    self.node(w, &branch.if_true)
                })?;
                if let Some(ref else_node) = branch.if_false {
                    w.block("else:", |w| self.node(w, else_node))?;
                }
            }
            WorkflowNode::Fanout(fanout) => self.fanout(w, fanout)?,
            WorkflowNode::Dispatcher(dispatcher) => self.dispatcher(w, dispatcher)?,
        }
        Ok(())
    }

    fn fanout(&mut self, w: &mut CodeWriter, fanout: &Fanout) -> Result<()> {
        let id = self.id();
        let mut units = Vec::with_capacity(fanout.branches.len());
        for (i, branch) in fanout.branches.iter().enumerate() {
            let unit = format!("_fanout{}_unit{}", id, i);
            w.block(format!("def {}(ctx):", unit), |w| self.node(w, branch))?;
            units.push(unit);
        }
        match fanout.join {
            JoinPolicy::WaitForAll => w.line(format!("_run_all(ctx, [{}])", units.join(", "))),
            JoinPolicy::FirstToFinish => {
                // Names a losing branch would have bound, for the lookup error
                let mut bound = BTreeSet::new();
                for branch in &fanout.branches {
                    branch.for_each_invocation(&mut |call| bound.extend(call.output.as_deref()));
                }
                if bound.is_empty() {
                    w.line(format!("_run_first(ctx, [{}])", units.join(", ")));
                } else {
                    let names: Vec<String> = bound.into_iter().map(py_str).collect();
                    w.line(format!("_run_first(ctx, [{}], [{}])", units.join(", "), names.join(", ")));
                }
            }
        }
        Ok(())
    }

    fn dispatcher(&mut self, w: &mut CodeWriter, dispatcher: &Dispatcher) -> Result<()> {
        let id = self.id();
        let route = |name: &str| format!("_route{}_{}(ctx)", id, name);

        for (name, sub) in &dispatcher.sub_workflows {
            w.block(format!("def _route{}_{}(ctx):", id, name), |w| self.node(w, sub))?;
        }

        if dispatcher.rules.is_empty() {
            match dispatcher.default {
                Some(ref default) => w.line(route(default)),
                None => {
                    return Err(ToolflowError::GenerationError {
                        reason: "orchestrator with neither rules nor default".to_string(),
                    })
                }
            }
            return Ok(());
        }

        for (i, rule) in dispatcher.rules.iter().enumerate() {
            let keyword = if i == 0 { "if" } else { "elif" };
            w.block(format!("{} {}:", keyword, condition_expr(&rule.condition)), |w| {
                w.line(route(&rule.target))
            });
        }
        w.block("else:", |w| match dispatcher.default {
            Some(ref default) => w.line(route(default)),
            None => w.line("pass"),
        });
        Ok(())
    }
}

fn entry_point(w: &mut CodeWriter, spec: &WorkflowSpec) {
    w.block("def run_workflow(**inputs):", |w| {
        w.line(py_str(&format!("Run the '{}' workflow and return the final context.", spec.name)));
        w.line("original = dict(inputs)");
        w.line("inputs = dict(inputs)");
        for param in spec.inputs.iter().filter(|p| p.is_secret()) {
            let name = py_str(&param.name);
            w.block(format!("if inputs.get({}) is None:", name), |w| {
                w.line(format!(
                    "inputs[{}] = os.environ.get({})",
                    name,
                    py_str(&env_var_name(&param.name))
                ));
            });
        }
        w.block("for name in INPUTS:", |w| {
            w.block("if inputs.get(name) is None:", |w| w.line("raise MissingInputError(name)"));
        });
        w.line("ctx = _Context(inputs)");
        w.block("try:", |w| w.line("_workflow(ctx)"));
        w.block("except Exception as exc:", |w| {
            w.line("raise WorkflowError(exc, ctx.snapshot(), original) from exc");
        });
        w.line("return ctx.snapshot()");
    });
}

fn placeholder(param_type: ParamType) -> &'static str {
    match param_type {
        ParamType::String => "\"\"",
        ParamType::Integer => "0",
        ParamType::Number => "0.0",
        ParamType::Boolean => "False",
        ParamType::Array => "[]",
        ParamType::Object => "{}",
    }
}

fn usage(w: &mut CodeWriter, spec: &WorkflowSpec) {
    w.block("if __name__ == \"__main__\":", |w| {
        w.line("import json");
        w.blank();
        if spec.inputs.is_empty() {
            w.line("example_inputs = {}");
        } else {
            w.line("example_inputs = {");
            for param in &spec.inputs {
                let value = if param.is_secret() {
                    format!("os.environ.get({})", py_str(&env_var_name(&param.name)))
                } else {
                    match param.example {
                        Some(ref example) => literal(example),
                        None => placeholder(param.param_type).to_string(),
                    }
                };
                w.line(format!("    {}: {},", py_str(&param.name), value));
            }
            w.line("}");
        }
        w.line("print(json.dumps(run_workflow(**example_inputs), indent=2, default=str))");
    });
}
