//! Complexity limits for workflow trees
//!
//! Provides configurable caps for:
//! - Steps per sequence
//! - Branches per fan-out
//! - Rules per dispatcher
//! - Total tool calls
//! - Nesting depth
//!
//! Exceeding any cap is a `ComplexityError`; every violation is reported,
//! not just the first.

use serde::{Deserialize, Serialize};

use crate::ast::WorkflowNode;

/// Complexity caps applied during validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum steps in one `sequential` node
    pub max_sequence_len: usize,

    /// Maximum branches in one `parallel` node
    pub max_fanout_branches: usize,

    /// Maximum routing rules in one `orchestrator` node
    pub max_dispatch_rules: usize,

    /// Maximum `tool_call` nodes in the whole tree
    pub max_tool_calls: usize,

    /// Maximum nesting depth (root = 1)
    pub max_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_sequence_len: 50,
            max_fanout_branches: 16,
            max_dispatch_rules: 32,
            max_tool_calls: 200,
            max_depth: 24,
        }
    }
}

impl Limits {
    /// Create limits suitable for testing (more restrictive)
    pub fn testing() -> Self {
        Self {
            max_sequence_len: 4,
            max_fanout_branches: 3,
            max_dispatch_rules: 3,
            max_tool_calls: 10,
            max_depth: 4,
        }
    }
}

/// One cap violation: field path and message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitViolation {
    pub path: String,
    pub message: String,
}

/// Check a tree against the caps
pub fn check_complexity(root: &WorkflowNode, root_path: &str, limits: &Limits) -> Vec<LimitViolation> {
    let mut checker = Checker {
        limits,
        tool_calls: 0,
        depth_reported: false,
        violations: Vec::new(),
    };
    checker.visit(root, root_path, 1);

    if checker.tool_calls > limits.max_tool_calls {
        checker.violations.push(LimitViolation {
            path: root_path.to_string(),
            message: format!(
                "workflow has {} tool calls (max {})",
                checker.tool_calls, limits.max_tool_calls
            ),
        });
    }

    checker.violations
}

struct Checker<'a> {
    limits: &'a Limits,
    tool_calls: usize,
    depth_reported: bool,
    violations: Vec<LimitViolation>,
}

impl Checker<'_> {
    fn visit(&mut self, node: &WorkflowNode, path: &str, depth: usize) {
        if depth > self.limits.max_depth && !self.depth_reported {
            self.depth_reported = true;
            self.violations.push(LimitViolation {
                path: path.to_string(),
                message: format!("nesting depth exceeds {}", self.limits.max_depth),
            });
        }

        match node {
            WorkflowNode::ToolInvocation(_) => self.tool_calls += 1,
            WorkflowNode::Sequence(seq) => {
                if seq.steps.len() > self.limits.max_sequence_len {
                    self.violations.push(LimitViolation {
                        path: format!("{}.steps", path),
                        message: format!(
                            "sequential has {} steps (max {})",
                            seq.steps.len(),
                            self.limits.max_sequence_len
                        ),
                    });
                }
                for (i, step) in seq.steps.iter().enumerate() {
                    self.visit(step, &format!("{}.steps[{}]", path, i), depth + 1);
                }
            }
            WorkflowNode::Branch(branch) => {
                self.visit(&branch.if_true, &format!("{}.if_true", path), depth + 1);
                if let Some(ref else_node) = branch.if_false {
                    self.visit(else_node, &format!("{}.if_false", path), depth + 1);
                }
            }
            WorkflowNode::Fanout(fanout) => {
                if fanout.branches.len() > self.limits.max_fanout_branches {
                    self.violations.push(LimitViolation {
                        path: format!("{}.branches", path),
                        message: format!(
                            "parallel has {} branches (max {})",
                            fanout.branches.len(),
                            self.limits.max_fanout_branches
                        ),
                    });
                }
                for (i, b) in fanout.branches.iter().enumerate() {
                    self.visit(b, &format!("{}.branches[{}]", path, i), depth + 1);
                }
            }
            WorkflowNode::Dispatcher(dispatcher) => {
                if dispatcher.rules.len() > self.limits.max_dispatch_rules {
                    self.violations.push(LimitViolation {
                        path: format!("{}.rules", path),
                        message: format!(
                            "orchestrator has {} rules (max {})",
                            dispatcher.rules.len(),
                            self.limits.max_dispatch_rules
                        ),
                    });
                }
                for (name, sub) in &dispatcher.sub_workflows {
                    self.visit(sub, &format!("{}.sub_workflows.{}", path, name), depth + 1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Fanout, JoinPolicy, Sequence, ToolInvocation};
    use indexmap::IndexMap;

    fn call(tool: &str) -> WorkflowNode {
        WorkflowNode::ToolInvocation(ToolInvocation {
            tool: tool.to_string(),
            params: IndexMap::new(),
            output: None,
        })
    }

    fn nested(depth: usize) -> WorkflowNode {
        let mut node = call("leaf");
        for _ in 1..depth {
            node = WorkflowNode::Sequence(Sequence { steps: vec![node] });
        }
        node
    }

    #[test]
    fn default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_sequence_len, 50);
        assert_eq!(limits.max_fanout_branches, 16);
    }

    #[test]
    fn within_limits_is_clean() {
        let tree = WorkflowNode::Sequence(Sequence {
            steps: vec![call("a"), call("b")],
        });
        assert!(check_complexity(&tree, "workflow", &Limits::testing()).is_empty());
    }

    #[test]
    fn long_sequence_is_reported() {
        let tree = WorkflowNode::Sequence(Sequence {
            steps: (0..5).map(|_| call("a")).collect(),
        });
        let violations = check_complexity(&tree, "workflow", &Limits::testing());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "workflow.steps");
        assert!(violations[0].message.contains("5 steps"));
    }

    #[test]
    fn wide_fanout_and_tool_count_both_reported() {
        let limits = Limits {
            max_tool_calls: 3,
            ..Limits::testing()
        };
        let tree = WorkflowNode::Fanout(Fanout {
            branches: (0..4).map(|_| call("a")).collect(),
            join: JoinPolicy::WaitForAll,
        });
        let violations = check_complexity(&tree, "workflow", &limits);
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().any(|v| v.message.contains("4 branches")));
        assert!(violations.iter().any(|v| v.message.contains("4 tool calls")));
    }

    #[test]
    fn depth_reported_once() {
        let violations = check_complexity(&nested(7), "workflow", &Limits::testing());
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("depth"));
    }
}
