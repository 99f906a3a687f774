//! Workflow nodes - the closed set of tree shapes
//!
//! Each node owns its children by value. Every traversal in the crate
//! (lowering, scope analysis, limits, code generation) matches on
//! `WorkflowNode` exhaustively, so a new variant is a compile error
//! everywhere it needs handling.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// One node of the workflow tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum WorkflowNode {
    #[serde(rename = "tool_call")]
    ToolInvocation(ToolInvocation),
    #[serde(rename = "sequential")]
    Sequence(Sequence),
    #[serde(rename = "conditional")]
    Branch(Branch),
    #[serde(rename = "parallel")]
    Fanout(Fanout),
    #[serde(rename = "orchestrator")]
    Dispatcher(Dispatcher),
}

/// Leaf: call one tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInvocation {
    pub tool: String,
    /// Literals or `{{...}}` references, in declared order
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub params: IndexMap<String, Value>,
    /// Binding target for the result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sequence {
    pub steps: Vec<WorkflowNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Branch {
    pub condition: String,
    pub if_true: Box<WorkflowNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_false: Option<Box<WorkflowNode>>,
}

/// How a fan-out waits for its branches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum JoinPolicy {
    WaitForAll,
    FirstToFinish,
}

impl JoinPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "wait-for-all" => Some(JoinPolicy::WaitForAll),
            "first-to-finish" => Some(JoinPolicy::FirstToFinish),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JoinPolicy::WaitForAll => "wait-for-all",
            JoinPolicy::FirstToFinish => "first-to-finish",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fanout {
    pub branches: Vec<WorkflowNode>,
    pub join: JoinPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingRule {
    pub condition: String,
    pub target: String,
}

/// Routes to one named sub-workflow; first matching rule wins
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dispatcher {
    pub sub_workflows: BTreeMap<String, WorkflowNode>,
    pub rules: Vec<RoutingRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl WorkflowNode {
    /// Visit every tool invocation in the subtree, in document order
    ///
    /// Dispatcher sub-workflows are visited in name order.
    pub fn for_each_invocation<'a>(&'a self, f: &mut impl FnMut(&'a ToolInvocation)) {
        match self {
            WorkflowNode::ToolInvocation(call) => f(call),
            WorkflowNode::Sequence(seq) => {
                for step in &seq.steps {
                    step.for_each_invocation(f);
                }
            }
            WorkflowNode::Branch(branch) => {
                branch.if_true.for_each_invocation(f);
                if let Some(ref else_node) = branch.if_false {
                    else_node.for_each_invocation(f);
                }
            }
            WorkflowNode::Fanout(fanout) => {
                for b in &fanout.branches {
                    b.for_each_invocation(f);
                }
            }
            WorkflowNode::Dispatcher(dispatcher) => {
                for sub in dispatcher.sub_workflows.values() {
                    sub.for_each_invocation(f);
                }
            }
        }
    }
}
