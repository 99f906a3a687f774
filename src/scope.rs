//! Scope Analyzer - flow-sensitive proof that every reference is available
//!
//! Walks the tree carrying the set of names guaranteed to be bound at each
//! point. One rule per node kind:
//!
//! | node | outgoing guaranteed set |
//! |------|-------------------------|
//! | tool_call | incoming + binding target |
//! | sequential | fold over steps |
//! | conditional | incoming + (then-new ∩ else-new); no else ⇒ incoming |
//! | parallel | incoming + (∪ branch-new), for both join policies |
//! | orchestrator | incoming (routes are not guaranteed) |
//!
//! Alongside the guaranteed set the analyzer tracks names that are bound on
//! *some* path, to tell the author why a name is missing, and names whose
//! only guarantee comes from some branches of a `first-to-finish` fan-out,
//! whose losing branches may be cancelled before they write.

use std::collections::BTreeSet;
use std::fmt;

use crate::ast::{
    extract_references, references_in_value, Fanout, JoinPolicy, Reference, WorkflowNode,
    WorkflowSpec,
};

pub type NameSet = BTreeSet<String>;

/// A reference used where its root name is not guaranteed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeError {
    pub path: String,
    pub missing: String,
    pub reference: String,
    /// Names that were guaranteed at that point, sorted
    pub available: Vec<String>,
    /// Bound on some path but not all of them
    pub partially_bound: bool,
}

impl fmt::Display for ScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' (in {}) is not guaranteed to be available here",
            self.missing, self.reference
        )?;
        if self.partially_bound {
            write!(
                f,
                "; it is only bound on some paths (a conditional arm, a conditional without else, or an orchestrator route)"
            )?;
        }
        if self.available.is_empty() {
            write!(f, "; no names are available at this point")
        } else {
            write!(f, "; available: {}", self.available.join(", "))
        }
    }
}

/// Non-fatal scope finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeWarning {
    pub path: String,
    pub name: String,
    pub message: String,
}

/// Result of analyzing a tree
#[derive(Debug, Clone, Default)]
pub struct ScopeReport {
    /// Guaranteed names after the whole tree ran
    pub available: NameSet,
    pub errors: Vec<ScopeError>,
    pub warnings: Vec<ScopeWarning>,
}

impl ScopeReport {
    pub fn is_sound(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
struct Scope {
    guaranteed: NameSet,
    possible: NameSet,
    cancellable: NameSet,
}

impl Scope {
    fn from_names(names: &NameSet) -> Self {
        Self {
            guaranteed: names.clone(),
            possible: names.clone(),
            cancellable: NameSet::new(),
        }
    }

    fn bind(&mut self, name: &str) {
        self.guaranteed.insert(name.to_string());
        self.possible.insert(name.to_string());
        self.cancellable.remove(name);
    }

    /// Both arms ran from `self`; only names bound in both survive
    fn join_arms(&self, then_out: &Scope, else_out: &Scope) -> Scope {
        let guaranteed: NameSet = then_out
            .guaranteed
            .intersection(&else_out.guaranteed)
            .cloned()
            .collect();
        let cancellable = then_out
            .cancellable
            .union(&else_out.cancellable)
            .filter(|n| guaranteed.contains(*n))
            .cloned()
            .collect();
        Scope {
            guaranteed,
            possible: then_out.possible.union(&else_out.possible).cloned().collect(),
            cancellable,
        }
    }

    /// The arm may be skipped entirely
    fn skippable(&self, arm_out: &Scope) -> Scope {
        Scope {
            guaranteed: self.guaranteed.clone(),
            possible: self.possible.union(&arm_out.possible).cloned().collect(),
            cancellable: self.cancellable.clone(),
        }
    }

    /// Every branch runs from `self`; all of their names survive
    fn join_fanout(&self, outs: &[Scope], join: JoinPolicy) -> Scope {
        let mut next = self.clone();
        for out in outs {
            next.guaranteed.extend(out.guaranteed.iter().cloned());
            next.possible.extend(out.possible.iter().cloned());
            next.cancellable.extend(out.cancellable.iter().cloned());
        }
        if join == JoinPolicy::FirstToFinish {
            // Names every branch binds survive whichever branch wins
            let fresh: Vec<String> = next
                .guaranteed
                .difference(&self.guaranteed)
                .filter(|n| !outs.iter().all(|o| o.guaranteed.contains(*n)))
                .cloned()
                .collect();
            next.cancellable.extend(fresh);
        }
        next
    }
}

/// Analyze a whole spec; inputs are available at the root
pub fn analyze_spec(spec: &WorkflowSpec) -> ScopeReport {
    let inputs: NameSet = spec.inputs.iter().map(|p| p.name.clone()).collect();
    analyze(&spec.workflow, &inputs, "workflow")
}

/// Analyze `node` starting from the `incoming` available set
pub fn analyze(node: &WorkflowNode, incoming: &NameSet, path: &str) -> ScopeReport {
    let mut analyzer = Analyzer::default();
    let out = analyzer.node(node, &Scope::from_names(incoming), path);
    ScopeReport {
        available: out.guaranteed,
        errors: analyzer.errors,
        warnings: analyzer.warnings,
    }
}

#[derive(Default)]
struct Analyzer {
    errors: Vec<ScopeError>,
    warnings: Vec<ScopeWarning>,
}

impl Analyzer {
    fn node(&mut self, node: &WorkflowNode, scope: &Scope, path: &str) -> Scope {
        match node {
            WorkflowNode::ToolInvocation(call) => {
                for (key, value) in &call.params {
                    // Malformed references are reported during lowering
                    let refs = references_in_value(value).unwrap_or_default();
                    let param_path = format!("{}.params.{}", path, key);
                    for reference in &refs {
                        self.check(reference, scope, &param_path);
                    }
                }
                let mut out = scope.clone();
                if let Some(ref target) = call.output {
                    out.bind(target);
                }
                out
            }
            WorkflowNode::Sequence(seq) => {
                let mut current = scope.clone();
                for (i, step) in seq.steps.iter().enumerate() {
                    current = self.node(step, &current, &format!("{}.steps[{}]", path, i));
                }
                current
            }
            WorkflowNode::Branch(branch) => {
                self.check_condition(&branch.condition, scope, &format!("{}.condition", path));
                let then_out = self.node(&branch.if_true, scope, &format!("{}.if_true", path));
                match branch.if_false {
                    Some(ref else_node) => {
                        let else_out = self.node(else_node, scope, &format!("{}.if_false", path));
                        scope.join_arms(&then_out, &else_out)
                    }
                    None => scope.skippable(&then_out),
                }
            }
            WorkflowNode::Fanout(fanout) => self.fanout(fanout, scope, path),
            WorkflowNode::Dispatcher(dispatcher) => {
                for (i, rule) in dispatcher.rules.iter().enumerate() {
                    self.check_condition(
                        &rule.condition,
                        scope,
                        &format!("{}.rules[{}].condition", path, i),
                    );
                }
                let mut out = scope.clone();
                for (name, sub) in &dispatcher.sub_workflows {
                    let sub_out = self.node(sub, scope, &format!("{}.sub_workflows.{}", path, name));
                    out = out.skippable(&sub_out);
                }
                out
            }
        }
    }

    fn fanout(&mut self, fanout: &Fanout, scope: &Scope, path: &str) -> Scope {
        let outs: Vec<Scope> = fanout
            .branches
            .iter()
            .enumerate()
            .map(|(i, b)| self.node(b, scope, &format!("{}.branches[{}]", path, i)))
            .collect();
        scope.join_fanout(&outs, fanout.join)
    }

    fn check_condition(&mut self, condition: &str, scope: &Scope, path: &str) {
        for reference in extract_references(condition) {
            self.check(&reference, scope, path);
        }
    }

    fn check(&mut self, reference: &Reference, scope: &Scope, path: &str) {
        let root = &reference.root;
        if !scope.guaranteed.contains(root) {
            self.errors.push(ScopeError {
                path: path.to_string(),
                missing: root.clone(),
                reference: reference.to_string(),
                available: scope.guaranteed.iter().cloned().collect(),
                partially_bound: scope.possible.contains(root),
            });
        } else if scope.cancellable.contains(root) {
            let already = self
                .warnings
                .iter()
                .any(|w| w.path == path && &w.name == root);
            if !already {
                self.warnings.push(ScopeWarning {
                    path: path.to_string(),
                    name: root.clone(),
                    message: format!(
                        "'{}' is bound inside a first-to-finish parallel; it is absent if that branch loses and is cancelled",
                        root
                    ),
                });
            }
        }
    }
}
