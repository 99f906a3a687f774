//! One Python function per distinct tool
//!
//! Known tools delegate to their library implementation. Unknown tools get
//! a stub that only checks credentials are configured and returns a
//! placeholder.

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{env_var_name, is_secret_name, WorkflowNode};
use crate::config::LibraryIndex;

use super::expr::py_str;
use super::writer::CodeWriter;

/// Credential-named parameters seen for each tool, both sorted
pub(crate) fn credential_params(root: &WorkflowNode) -> BTreeMap<String, BTreeSet<String>> {
    let mut seen: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    root.for_each_invocation(&mut |call| {
        let entry = seen.entry(call.tool.clone()).or_default();
        for name in call.params.keys().filter(|n| is_secret_name(n)) {
            entry.insert(name.clone());
        }
    });
    seen
}

pub(crate) fn emit_tools(
    w: &mut CodeWriter,
    tools: &BTreeSet<String>,
    credentials: &BTreeMap<String, BTreeSet<String>>,
    library: &LibraryIndex,
) {
    for (i, tool) in tools.iter().enumerate() {
        if i > 0 {
            w.blank();
            w.blank();
        }
        w.block(format!("def tool_{}(**kwargs):", tool), |w| match library.get(tool) {
            Some(entry) => {
                w.line(format!(
                    "return _delegate({}, {}, kwargs)",
                    py_str(&entry.module),
                    py_str(&entry.function)
                ));
            }
            None => {
                w.line(py_str(&format!("Placeholder for '{}': no library implementation configured.", tool)));
                if let Some(params) = credentials.get(tool) {
                    for param in params {
                        let var = env_var_name(param);
                        w.block(format!("if not os.environ.get({}):", py_str(&var)), |w| {
                            w.line(format!(
                                "raise ConfigurationError({})",
                                py_str(&format!(
                                    "tool '{}' needs the {} environment variable (parameter '{}')",
                                    tool, var, param
                                ))
                            ));
                        });
                    }
                }
                w.line(format!(
                    "return {{\"tool\": {}, \"status\": \"placeholder\", \"params\": sorted(kwargs)}}",
                    py_str(tool)
                ));
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Sequence, ToolInvocation};
    use crate::config::LibraryEntry;
    use indexmap::IndexMap;
    use serde_json::json;

    fn call(tool: &str, params: &[&str]) -> WorkflowNode {
        WorkflowNode::ToolInvocation(ToolInvocation {
            tool: tool.to_string(),
            params: params
                .iter()
                .map(|p| (p.to_string(), json!("x")))
                .collect::<IndexMap<_, _>>(),
            output: None,
        })
    }

    #[test]
    fn collects_credentials_across_calls() {
        let tree = WorkflowNode::Sequence(Sequence {
            steps: vec![
                call("slack", &["channel", "bot_token"]),
                call("slack", &["webhook_url"]),
                call("fetch", &["url"]),
            ],
        });
        let creds = credential_params(&tree);
        assert_eq!(
            creds["slack"].iter().collect::<Vec<_>>(),
            ["bot_token", "webhook_url"]
        );
        assert!(creds["fetch"].is_empty());
    }

    #[test]
    fn known_tool_delegates() {
        let mut library = LibraryIndex::new();
        library.insert(
            "fetch".to_string(),
            LibraryEntry {
                module: "acme.http".to_string(),
                function: "get".to_string(),
            },
        );
        let tools: BTreeSet<String> = ["fetch".to_string()].into();
        let mut w = CodeWriter::new();
        emit_tools(&mut w, &tools, &BTreeMap::new(), &library);
        let out = w.finish();
        assert_eq!(
            out,
            "def tool_fetch(**kwargs):\n    return _delegate(\"acme.http\", \"get\", kwargs)\n"
        );
    }

    #[test]
    fn unknown_tool_stub_guards_credentials() {
        let tools: BTreeSet<String> = ["slack".to_string()].into();
        let mut creds = BTreeMap::new();
        creds.insert("slack".to_string(), BTreeSet::from(["bot_token".to_string()]));
        let mut w = CodeWriter::new();
        emit_tools(&mut w, &tools, &creds, &LibraryIndex::new());
        let out = w.finish();
        assert!(out.contains("    if not os.environ.get(\"BOT_TOKEN\"):\n        raise ConfigurationError("));
        assert!(out.contains("\"status\": \"placeholder\""));
        assert!(!out.contains("raise NotImplementedError"));
    }

    #[test]
    fn plain_stub_only_returns_the_placeholder() {
        let tree = WorkflowNode::Sequence(Sequence {
            steps: vec![call("lookup", &["query", "limit"]), call("lookup", &[])],
        });
        let creds = credential_params(&tree);
        let tools: BTreeSet<String> = ["lookup".to_string()].into();
        let mut w = CodeWriter::new();
        emit_tools(&mut w, &tools, &creds, &LibraryIndex::new());
        let out = w.finish();

        assert_eq!(
            out,
            "def tool_lookup(**kwargs):\n    \"Placeholder for 'lookup': no library implementation configured.\"\n    return {\"tool\": \"lookup\", \"status\": \"placeholder\", \"params\": sorted(kwargs)}\n"
        );
        assert!(!out.contains("raise"));
    }
}
