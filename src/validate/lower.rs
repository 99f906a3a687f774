//! Lowering - JSON value model to typed AST
//!
//! Walks the candidate document once and records every problem it can see
//! instead of stopping at the first one. Problems that leave the shape intact
//! (bad identifiers, bad conditions, dangling dispatcher targets) keep the
//! value so the scope analyzer can still run; shape problems make the node
//! `None`, which turns scope analysis off for the document.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use rustc_hash::FxHashSet;
use serde_json::{Map, Value};

use crate::ast::{
    is_secret_name, references_in_value, validate_identifier, Branch, Dispatcher, Fanout,
    InputParam, JoinPolicy, OutputParam, ParamType, RoutingRule, Sequence, ToolInvocation,
    WorkflowNode, WorkflowSpec,
};
use crate::condition::validate_condition;

use super::report::{IssueKind, ValidationIssue, ValidationReport};

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+$").unwrap());

const ROOT_KEYS: &[&str] = &[
    "name",
    "description",
    "version",
    "inputs",
    "outputs",
    "workflow",
    "metadata",
];
const INPUT_KEYS: &[&str] = &["name", "type", "description", "example"];
const OUTPUT_KEYS: &[&str] = &["name", "type", "description"];
const TOOL_CALL_KEYS: &[&str] = &["type", "tool", "params", "output"];
const SEQUENTIAL_KEYS: &[&str] = &["type", "steps"];
const CONDITIONAL_KEYS: &[&str] = &["type", "condition", "if_true", "if_false"];
const PARALLEL_KEYS: &[&str] = &["type", "branches", "join"];
const ORCHESTRATOR_KEYS: &[&str] = &["type", "sub_workflows", "rules", "default"];
const RULE_KEYS: &[&str] = &["condition", "target"];

const NODE_TYPES: &str = "tool_call, sequential, conditional, parallel, orchestrator";

/// Lower a whole document
///
/// Returns `Some` when every node and every input had a usable shape. The
/// spec may still carry errors recorded in `report`; the caller decides.
pub(crate) fn lower_document(doc: &Value, report: &mut ValidationReport) -> Option<WorkflowSpec> {
    Lowerer { report }.document(doc)
}

struct Lowerer<'r> {
    report: &'r mut ValidationReport,
}

fn child(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Lowerer<'_> {
    fn error(&mut self, kind: IssueKind, path: impl Into<String>, message: impl Into<String>) {
        self.report.push(ValidationIssue::error(kind, path, message));
    }

    fn warning(&mut self, kind: IssueKind, path: impl Into<String>, message: impl Into<String>) {
        self.report.push(ValidationIssue::warning(kind, path, message));
    }

    fn object<'v>(&mut self, value: &'v Value, path: &str, what: &str) -> Option<&'v Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            other => {
                self.error(
                    IssueKind::Structural,
                    path,
                    format!("{} must be an object, found {}", what, json_type(other)),
                );
                None
            }
        }
    }

    fn unknown_keys(&mut self, map: &Map<String, Value>, allowed: &[&str], path: &str) {
        for key in map.keys() {
            if !allowed.contains(&key.as_str()) {
                self.warning(
                    IssueKind::Structural,
                    child(path, key),
                    format!("unknown key '{}' is ignored", key),
                );
            }
        }
    }

    /// Required string field; `None` means an error was recorded
    fn required_str<'v>(&mut self, map: &'v Map<String, Value>, key: &str, path: &str) -> Option<&'v str> {
        match map.get(key) {
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                self.error(
                    IssueKind::Structural,
                    child(path, key),
                    format!("'{}' must be a string, found {}", key, json_type(other)),
                );
                None
            }
            None => {
                self.error(
                    IssueKind::Structural,
                    path,
                    format!("missing required key '{}'", key),
                );
                None
            }
        }
    }

    /// Optional string field; `Err` means present but not a string
    fn optional_str<'v>(
        &mut self,
        map: &'v Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Result<Option<&'v str>, ()> {
        match map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => {
                self.error(
                    IssueKind::Structural,
                    child(path, key),
                    format!("'{}' must be a string, found {}", key, json_type(other)),
                );
                Err(())
            }
        }
    }

    /// Record a naming error; the name is kept either way
    fn identifier(&mut self, name: &str, path: &str, what: &str) {
        if let Err(problem) = validate_identifier(name) {
            self.error(
                IssueKind::Naming,
                path,
                format!("{} '{}' is not a valid identifier: {}", what, name, problem),
            );
        }
    }

    fn document(&mut self, doc: &Value) -> Option<WorkflowSpec> {
        let map = self.object(doc, "", "the workflow document")?;
        self.unknown_keys(map, ROOT_KEYS, "");

        let name = self.required_str(map, "name", "").unwrap_or_default().to_string();
        if map.get("name").is_some_and(Value::is_string) {
            self.identifier(&name, "name", "workflow name");
        }

        let description = self
            .optional_str(map, "description", "")
            .ok()
            .flatten()
            .unwrap_or_default()
            .to_string();

        let version = self.required_str(map, "version", "").unwrap_or_default().to_string();
        if map.get("version").is_some_and(Value::is_string) && !VERSION_RE.is_match(&version) {
            self.error(
                IssueKind::Structural,
                "version",
                format!("version '{}' must look like X.Y.Z (e.g. 1.0.0)", version),
            );
        }

        let inputs = self.inputs(map.get("inputs"));
        let outputs = self.outputs(map.get("outputs"));
        let metadata = self.metadata(map.get("metadata"));

        let workflow = match map.get("workflow") {
            Some(node) => self.node(node, "workflow"),
            None => {
                self.error(IssueKind::Structural, "", "missing required key 'workflow'");
                None
            }
        };

        Some(WorkflowSpec {
            name,
            description,
            version,
            inputs: inputs?,
            outputs,
            workflow: workflow?,
            metadata,
        })
    }

    fn inputs(&mut self, value: Option<&Value>) -> Option<Vec<InputParam>> {
        let items = match value {
            Some(Value::Array(items)) => items,
            Some(other) => {
                self.error(
                    IssueKind::Structural,
                    "inputs",
                    format!("'inputs' must be an array, found {}", json_type(other)),
                );
                return None;
            }
            None => {
                self.error(IssueKind::Structural, "", "missing required key 'inputs'");
                return None;
            }
        };

        let mut params = Vec::with_capacity(items.len());
        let mut seen = FxHashSet::default();
        let mut shape_ok = true;

        for (i, item) in items.iter().enumerate() {
            let path = format!("inputs[{}]", i);
            let Some(map) = self.object(item, &path, "an input") else {
                shape_ok = false;
                continue;
            };
            if map.contains_key("is_secret") {
                self.warning(
                    IssueKind::Structural,
                    child(&path, "is_secret"),
                    "'is_secret' is derived from the input name and cannot be set; the value is ignored",
                );
            }
            let extra: Vec<&str> = INPUT_KEYS.iter().copied().chain(["is_secret"]).collect();
            self.unknown_keys(map, &extra, &path);

            let Some(name) = self.required_str(map, "name", &path) else {
                shape_ok = false;
                continue;
            };
            self.identifier(name, &child(&path, "name"), "input name");
            if !seen.insert(name.to_string()) {
                self.error(
                    IssueKind::Naming,
                    child(&path, "name"),
                    format!("duplicate input name '{}'", name),
                );
            }

            // An unknown type still keeps the name in scope; the document is
            // rejected on the recorded error.
            let param_type = self.param_type(map, &path).unwrap_or(ParamType::String);
            let description = self.optional_str(map, "description", &path).ok().flatten();
            let example = map.get("example").filter(|v| !v.is_null()).cloned();

            let param = InputParam::new(name, param_type, description.map(str::to_string), example);
            if param.is_secret() && param.example.is_some() {
                self.warning(
                    IssueKind::Structural,
                    child(&path, "example"),
                    format!(
                        "'{}' is a secret input; its example is never emitted (the program reads it from the environment)",
                        name
                    ),
                );
            }
            params.push(param);
        }

        shape_ok.then_some(params)
    }

    fn outputs(&mut self, value: Option<&Value>) -> Vec<OutputParam> {
        let items = match value {
            None | Some(Value::Null) => return Vec::new(),
            Some(Value::Array(items)) => items,
            Some(other) => {
                self.error(
                    IssueKind::Structural,
                    "outputs",
                    format!("'outputs' must be an array, found {}", json_type(other)),
                );
                return Vec::new();
            }
        };

        let mut params = Vec::with_capacity(items.len());
        let mut seen = FxHashSet::default();

        for (i, item) in items.iter().enumerate() {
            let path = format!("outputs[{}]", i);
            let Some(map) = self.object(item, &path, "an output") else {
                continue;
            };
            self.unknown_keys(map, OUTPUT_KEYS, &path);

            let Some(name) = self.required_str(map, "name", &path) else {
                continue;
            };
            self.identifier(name, &child(&path, "name"), "output name");
            if !seen.insert(name.to_string()) {
                self.error(
                    IssueKind::Naming,
                    child(&path, "name"),
                    format!("duplicate output name '{}'", name),
                );
            }
            let Some(param_type) = self.param_type(map, &path) else {
                continue;
            };
            let description = self.optional_str(map, "description", &path).ok().flatten();
            params.push(OutputParam {
                name: name.to_string(),
                param_type,
                description: description.map(str::to_string),
            });
        }
        params
    }

    fn param_type(&mut self, map: &Map<String, Value>, path: &str) -> Option<ParamType> {
        let raw = self.required_str(map, "type", path)?;
        match ParamType::parse(raw) {
            Some(t) => Some(t),
            None => {
                let known: Vec<&str> = ParamType::ALL.iter().map(ParamType::as_str).collect();
                self.error(
                    IssueKind::Structural,
                    child(path, "type"),
                    format!("unknown type '{}' (expected one of: {})", raw, known.join(", ")),
                );
                None
            }
        }
    }

    fn metadata(&mut self, value: Option<&Value>) -> BTreeMap<String, Value> {
        match value {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Some(other) => {
                self.error(
                    IssueKind::Structural,
                    "metadata",
                    format!("'metadata' must be an object, found {}", json_type(other)),
                );
                BTreeMap::new()
            }
        }
    }

    fn node(&mut self, value: &Value, path: &str) -> Option<WorkflowNode> {
        let map = self.object(value, path, "a workflow node")?;
        let tag = match map.get("type") {
            Some(Value::String(s)) => s.as_str(),
            Some(other) => {
                self.error(
                    IssueKind::Structural,
                    child(path, "type"),
                    format!("node 'type' must be a string, found {}", json_type(other)),
                );
                return None;
            }
            None => {
                self.error(
                    IssueKind::Structural,
                    path,
                    format!("node is missing 'type' (expected one of: {})", NODE_TYPES),
                );
                return None;
            }
        };

        match tag {
            "tool_call" => self.tool_call(map, path),
            "sequential" => self.sequential(map, path),
            "conditional" => self.conditional(map, path),
            "parallel" => self.parallel(map, path),
            "orchestrator" => self.orchestrator(map, path),
            other => {
                self.error(
                    IssueKind::Structural,
                    child(path, "type"),
                    format!("unknown node type '{}' (expected one of: {})", other, NODE_TYPES),
                );
                None
            }
        }
    }

    fn tool_call(&mut self, map: &Map<String, Value>, path: &str) -> Option<WorkflowNode> {
        self.unknown_keys(map, TOOL_CALL_KEYS, path);

        let tool = self.required_str(map, "tool", path);
        if let Some(tool) = tool {
            self.identifier(tool, &child(path, "tool"), "tool name");
        }

        let mut params = IndexMap::new();
        let mut params_ok = true;
        match map.get("params") {
            None | Some(Value::Null) => {}
            Some(Value::Object(raw)) => {
                for (key, value) in raw {
                    let param_path = format!("{}.params.{}", path, key);
                    self.identifier(key, &param_path, "parameter name");
                    match references_in_value(value) {
                        Ok(refs) => {
                            if refs.is_empty() && !value.is_null() && is_secret_name(key) {
                                self.warning(
                                    IssueKind::Structural,
                                    &param_path,
                                    format!(
                                        "'{}' looks like a credential; the literal value is not emitted and the program reads {} from the environment",
                                        key,
                                        crate::ast::env_var_name(key)
                                    ),
                                );
                            }
                        }
                        Err(malformed) => {
                            self.error(IssueKind::Structural, &param_path, malformed.to_string());
                        }
                    }
                    params.insert(key.clone(), value.clone());
                }
            }
            Some(other) => {
                self.error(
                    IssueKind::Structural,
                    child(path, "params"),
                    format!("'params' must be an object, found {}", json_type(other)),
                );
                params_ok = false;
            }
        }

        let output = match self.optional_str(map, "output", path) {
            Ok(output) => output,
            Err(()) => {
                params_ok = false;
                None
            }
        };
        if let Some(target) = output {
            self.identifier(target, &child(path, "output"), "binding target");
        }

        if !params_ok {
            return None;
        }
        Some(WorkflowNode::ToolInvocation(ToolInvocation {
            tool: tool?.to_string(),
            params,
            output: output.map(str::to_string),
        }))
    }

    fn node_list(&mut self, map: &Map<String, Value>, key: &str, path: &str) -> Option<Vec<WorkflowNode>> {
        let items = match map.get(key) {
            Some(Value::Array(items)) => items,
            Some(other) => {
                self.error(
                    IssueKind::Structural,
                    child(path, key),
                    format!("'{}' must be an array of nodes, found {}", key, json_type(other)),
                );
                return None;
            }
            None => {
                self.error(IssueKind::Structural, path, format!("missing required key '{}'", key));
                return None;
            }
        };

        // Lower every child before giving up so all of their errors surface
        let lowered: Vec<Option<WorkflowNode>> = items
            .iter()
            .enumerate()
            .map(|(i, item)| self.node(item, &format!("{}.{}[{}]", path, key, i)))
            .collect();
        lowered.into_iter().collect()
    }

    fn sequential(&mut self, map: &Map<String, Value>, path: &str) -> Option<WorkflowNode> {
        self.unknown_keys(map, SEQUENTIAL_KEYS, path);
        let steps = self.node_list(map, "steps", path)?;
        if steps.is_empty() && map.get("steps").is_some_and(Value::is_array) {
            self.error(
                IssueKind::Structural,
                child(path, "steps"),
                "sequential needs at least one step",
            );
        }
        Some(WorkflowNode::Sequence(Sequence { steps }))
    }

    fn condition(&mut self, condition: &str, path: &str) {
        if let Err(e) = validate_condition(condition) {
            self.error(IssueKind::Condition, path, e.to_string());
        }
    }

    fn conditional(&mut self, map: &Map<String, Value>, path: &str) -> Option<WorkflowNode> {
        self.unknown_keys(map, CONDITIONAL_KEYS, path);

        let condition = self.required_str(map, "condition", path);
        if let Some(condition) = condition {
            self.condition(condition, &child(path, "condition"));
        }

        let if_true = match map.get("if_true") {
            Some(node) => self.node(node, &child(path, "if_true")),
            None => {
                self.error(IssueKind::Structural, path, "missing required key 'if_true'");
                None
            }
        };

        let if_false = match map.get("if_false") {
            None | Some(Value::Null) => Some(None),
            Some(node) => self.node(node, &child(path, "if_false")).map(Some),
        };

        Some(WorkflowNode::Branch(Branch {
            condition: condition?.to_string(),
            if_true: Box::new(if_true?),
            if_false: if_false?.map(Box::new),
        }))
    }

    fn parallel(&mut self, map: &Map<String, Value>, path: &str) -> Option<WorkflowNode> {
        self.unknown_keys(map, PARALLEL_KEYS, path);

        let branches = self.node_list(map, "branches", path);
        if let Some(ref b) = branches {
            if b.len() < 2 {
                self.error(
                    IssueKind::Structural,
                    child(path, "branches"),
                    format!("parallel needs at least 2 branches, found {}", b.len()),
                );
            }
        }

        let join = match self.required_str(map, "join", path) {
            Some(raw) => match JoinPolicy::parse(raw) {
                Some(policy) => Some(policy),
                None => {
                    self.error(
                        IssueKind::Structural,
                        child(path, "join"),
                        format!(
                            "unknown join policy '{}' (expected 'wait-for-all' or 'first-to-finish')",
                            raw
                        ),
                    );
                    None
                }
            },
            None => None,
        };

        Some(WorkflowNode::Fanout(Fanout {
            branches: branches?,
            join: join?,
        }))
    }

    fn orchestrator(&mut self, map: &Map<String, Value>, path: &str) -> Option<WorkflowNode> {
        self.unknown_keys(map, ORCHESTRATOR_KEYS, path);
        let subs_path = child(path, "sub_workflows");

        let mut sub_workflows = BTreeMap::new();
        let mut subs_ok = true;
        match map.get("sub_workflows") {
            Some(Value::Object(raw)) => {
                if raw.is_empty() {
                    self.error(
                        IssueKind::Structural,
                        &subs_path,
                        "orchestrator needs at least one sub-workflow",
                    );
                }
                for (name, node) in raw {
                    let sub_path = child(&subs_path, name);
                    self.identifier(name, &sub_path, "sub-workflow name");
                    match self.node(node, &sub_path) {
                        Some(lowered) => {
                            sub_workflows.insert(name.clone(), lowered);
                        }
                        None => subs_ok = false,
                    }
                }
            }
            Some(other) => {
                self.error(
                    IssueKind::Structural,
                    &subs_path,
                    format!("'sub_workflows' must be an object, found {}", json_type(other)),
                );
                subs_ok = false;
            }
            None => {
                self.error(IssueKind::Structural, path, "missing required key 'sub_workflows'");
                subs_ok = false;
            }
        }
        let known: BTreeSet<&str> = match map.get("sub_workflows") {
            Some(Value::Object(raw)) => raw.keys().map(String::as_str).collect(),
            _ => BTreeSet::new(),
        };

        let rules = self.rules(map.get("rules"), path, &known, subs_ok);

        let default = match self.optional_str(map, "default", path) {
            Ok(default) => Some(default),
            Err(()) => None,
        };
        if let Some(Some(target)) = default {
            if subs_ok && !known.contains(target) {
                self.error(
                    IssueKind::Reference,
                    child(path, "default"),
                    format!("default '{}' is not a sub-workflow ({})", target, describe_known(&known)),
                );
            }
        }

        if let (Some(rules), Some(None)) = (&rules, default) {
            if rules.is_empty() {
                self.error(
                    IssueKind::Structural,
                    path,
                    "orchestrator needs at least one rule or a default",
                );
            }
        }

        if let (Some(rules), Some(default)) = (&rules, default) {
            let routed: BTreeSet<&str> = rules
                .iter()
                .map(|r| r.target.as_str())
                .chain(default)
                .collect();
            for name in &known {
                if !routed.is_empty() && !routed.contains(name) {
                    self.warning(
                        IssueKind::Reference,
                        child(&subs_path, name),
                        format!("sub-workflow '{}' is never routed to", name),
                    );
                }
            }
        }

        if !subs_ok {
            return None;
        }
        Some(WorkflowNode::Dispatcher(Dispatcher {
            sub_workflows,
            rules: rules?,
            default: default?.map(str::to_string),
        }))
    }

    fn rules(
        &mut self,
        value: Option<&Value>,
        path: &str,
        known: &BTreeSet<&str>,
        check_targets: bool,
    ) -> Option<Vec<RoutingRule>> {
        let items = match value {
            None | Some(Value::Null) => return Some(Vec::new()),
            Some(Value::Array(items)) => items,
            Some(other) => {
                self.error(
                    IssueKind::Structural,
                    child(path, "rules"),
                    format!("'rules' must be an array, found {}", json_type(other)),
                );
                return None;
            }
        };

        let mut rules = Vec::with_capacity(items.len());
        let mut shape_ok = true;
        for (i, item) in items.iter().enumerate() {
            let rule_path = format!("{}.rules[{}]", path, i);
            let Some(rule) = self.object(item, &rule_path, "a routing rule") else {
                shape_ok = false;
                continue;
            };
            self.unknown_keys(rule, RULE_KEYS, &rule_path);

            let condition = self.required_str(rule, "condition", &rule_path);
            if let Some(condition) = condition {
                self.condition(condition, &child(&rule_path, "condition"));
            }
            let target = self.required_str(rule, "target", &rule_path);
            if let Some(target) = target {
                if check_targets && !known.contains(target) {
                    self.error(
                        IssueKind::Reference,
                        child(&rule_path, "target"),
                        format!("target '{}' is not a sub-workflow ({})", target, describe_known(known)),
                    );
                }
            }

            match (condition, target) {
                (Some(condition), Some(target)) => rules.push(RoutingRule {
                    condition: condition.to_string(),
                    target: target.to_string(),
                }),
                _ => shape_ok = false,
            }
        }
        shape_ok.then_some(rules)
    }
}

fn describe_known(known: &BTreeSet<&str>) -> String {
    if known.is_empty() {
        "no sub-workflows are defined".to_string()
    } else {
        let names: Vec<&str> = known.iter().copied().collect();
        format!("known: {}", names.join(", "))
    }
}
