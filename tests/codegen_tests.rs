//! Generated program shape
//!
//! Checks the emitted Python text through the public compile entry point.

use serde_json::{json, Value};

use toolflow::{compile, Compiler, CompilerConfig, LibraryEntry};

fn spec(inputs: Value, workflow: Value) -> Value {
    json!({
        "name": "shape",
        "version": "1.2.0",
        "inputs": inputs,
        "workflow": workflow
    })
}

fn position(source: &str, needle: &str) -> usize {
    source
        .find(needle)
        .unwrap_or_else(|| panic!("missing {:?} in:\n{}", needle, source))
}

#[test]
fn output_is_byte_identical_across_runs_and_key_order() {
    let doc = spec(
        json!([{"name": "q", "type": "string"}]),
        json!({"type": "tool_call", "tool": "search", "params": {"query": "{{q}}"}, "output": "hits"}),
    );
    let reordered = json!({
        "workflow": doc["workflow"].clone(),
        "inputs": doc["inputs"].clone(),
        "version": "1.2.0",
        "name": "shape"
    });

    let first = compile(&doc).unwrap();
    let second = compile(&doc).unwrap();
    let third = compile(&reordered).unwrap();

    assert_eq!(first.source, second.source);
    assert_eq!(first.source, third.source);
    assert_eq!(first.spec_hash, third.spec_hash);
}

#[test]
fn literal_credentials_never_reach_the_program() {
    let doc = spec(
        json!([]),
        json!({"type": "tool_call", "tool": "charge",
               "params": {"api_key": "sk-live-0123456789", "amount": 5}}),
    );

    let program = compile(&doc).unwrap();
    assert!(!program.source.contains("sk-live-0123456789"));
    assert!(program.source.contains("api_key=os.environ.get(\"API_KEY\")"));
    assert!(program.secret_params.contains("api_key"));
}

#[test]
fn secret_inputs_fall_back_to_environment() {
    let doc = spec(
        json!([{"name": "db_password", "type": "string"}]),
        json!({"type": "tool_call", "tool": "connect", "params": {"password": "{{db_password}}"}}),
    );

    let source = compile(&doc).unwrap().source;
    assert!(source.contains("# secrets are read from the environment: DB_PASSWORD"));
    assert!(source.contains("inputs[\"db_password\"] = os.environ.get(\"DB_PASSWORD\")"));
    assert!(source.contains("\"db_password\": os.environ.get(\"DB_PASSWORD\"),"));
}

#[test]
fn stub_tools_guard_their_credentials() {
    let doc = spec(
        json!([{"name": "token", "type": "string"}]),
        json!({"type": "tool_call", "tool": "post_message", "params": {"bot_token": "{{token}}"}}),
    );

    let source = compile(&doc).unwrap().source;
    let def = position(&source, "def tool_post_message(**kwargs):");
    let guard = position(&source, "if not os.environ.get(\"BOT_TOKEN\"):");
    let placeholder = position(&source, "\"status\": \"placeholder\"");
    assert!(def < guard && guard < placeholder);
    assert!(source.contains("raise ConfigurationError("));
}

#[test]
fn library_tools_have_no_stub() {
    let doc = spec(
        json!([]),
        json!({"type": "tool_call", "tool": "search", "params": {"query": "rust"}}),
    );
    let mut config = CompilerConfig::default();
    config.library.insert(
        "search".to_string(),
        LibraryEntry {
            module: "acme.search".to_string(),
            function: "run".to_string(),
        },
    );

    let source = Compiler::new(config).compile(&doc).unwrap().source;
    assert!(source.contains("return _delegate(\"acme.search\", \"run\", kwargs)"));
    assert!(!source.contains("Placeholder for 'search'"));
}

#[test]
fn keyword_named_params_are_passed_through_a_dict() {
    let doc = spec(
        json!([]),
        json!({"type": "tool_call", "tool": "tag", "params": {"class": "a", "label": "b"}}),
    );

    let source = compile(&doc).unwrap().source;
    assert!(source.contains("tool_tag(label=\"b\", **{\"class\": \"a\"})"));
}

#[test]
fn references_become_context_lookups() {
    let doc = spec(
        json!([{"name": "user", "type": "object"}]),
        json!({"type": "tool_call", "tool": "greet",
               "params": {"name": "{{user.name}}", "line": "Hi {{user.name}}!"}}),
    );

    let source = compile(&doc).unwrap().source;
    assert!(source.contains("name=ctx.get(\"user\", \"name\")"));
    assert!(source.contains("line=_text("));
}

#[test]
fn dispatcher_keeps_rule_order_and_default() {
    let doc = spec(
        json!([{"name": "kind", "type": "string"}]),
        json!({"type": "orchestrator",
               "sub_workflows": {
                   "billing": {"type": "tool_call", "tool": "bill"},
                   "support": {"type": "tool_call", "tool": "ticket"},
                   "other": {"type": "tool_call", "tool": "log"}
               },
               "rules": [
                   {"condition": "{{kind}} == 'support'", "target": "support"},
                   {"condition": "{{kind}} == 'billing'", "target": "billing"}
               ],
               "default": "other"}),
    );

    let source = compile(&doc).unwrap().source;
    let first = position(&source, "if ctx.get(\"kind\") == 'support':");
    let second = position(&source, "elif ctx.get(\"kind\") == 'billing':");
    let fallback = position(&source, "_route1_other(ctx)\n");
    assert!(first < second && second < fallback);

    // sub-workflow functions are emitted sorted by name
    let billing = position(&source, "def _route1_billing(ctx):");
    let other = position(&source, "def _route1_other(ctx):");
    let support = position(&source, "def _route1_support(ctx):");
    assert!(billing < other && other < support);
}

/// Non-blank lines following the first line that trims to `opener`
fn body_after<'a>(source: &'a str, opener: &str) -> Vec<&'a str> {
    let mut lines = source.lines().skip_while(|l| l.trim() != opener);
    let head = lines
        .next()
        .unwrap_or_else(|| panic!("missing {:?} in:\n{}", opener, source));
    let depth = head.len() - head.trim_start().len();
    lines
        .take_while(|l| l.trim().is_empty() || l.len() - l.trim_start().len() > depth)
        .filter(|l| !l.trim().is_empty())
        .map(str::trim)
        .collect()
}

#[test]
fn first_matching_rule_wins_even_when_rules_repeat() {
    let doc = spec(
        json!([{"name": "tier", "type": "string"}]),
        json!({"type": "orchestrator",
               "sub_workflows": {
                   "a": {"type": "tool_call", "tool": "gold_a"},
                   "b": {"type": "tool_call", "tool": "gold_b"}
               },
               "rules": [
                   {"condition": "{{tier}}=='gold'", "target": "a"},
                   {"condition": "{{tier}}=='gold'", "target": "b"}
               ]}),
    );

    let source = compile(&doc).unwrap().source;
    assert_eq!(body_after(&source, "if ctx.get(\"tier\")=='gold':"), ["_route1_a(ctx)"]);
    assert_eq!(body_after(&source, "elif ctx.get(\"tier\")=='gold':"), ["_route1_b(ctx)"]);
    assert!(position(&source, "_route1_a(ctx)\n") < position(&source, "_route1_b(ctx)\n"));
}

#[test]
fn plain_stubs_never_raise() {
    let doc = spec(
        json!([{"name": "q", "type": "string"}]),
        json!({"type": "sequential", "steps": [
            {"type": "tool_call", "tool": "lookup", "params": {"query": "{{q}}", "limit": 3}},
            {"type": "tool_call", "tool": "lookup", "params": {"flags": [true, null]}},
            {"type": "tool_call", "tool": "lookup"}
        ]}),
    );

    let source = compile(&doc).unwrap().source;
    let body = body_after(&source, "def tool_lookup(**kwargs):");
    assert!(body.iter().all(|l| !l.starts_with("raise")), "{:?}", body);
    assert_eq!(
        body.last().copied(),
        Some("return {\"tool\": \"lookup\", \"status\": \"placeholder\", \"params\": sorted(kwargs)}")
    );
}

#[test]
fn fanouts_pick_their_runner() {
    let doc = spec(
        json!([]),
        json!({"type": "sequential", "steps": [
            {"type": "parallel", "join": "wait-for-all", "branches": [
                {"type": "tool_call", "tool": "a", "output": "x"},
                {"type": "tool_call", "tool": "b", "output": "y"}
            ]},
            {"type": "parallel", "join": "first-to-finish", "branches": [
                {"type": "tool_call", "tool": "c", "output": "z"},
                {"type": "tool_call", "tool": "d", "output": "z"}
            ]}
        ]}),
    );

    let source = compile(&doc).unwrap().source;
    assert!(source.contains("_run_all(ctx, [_fanout1_unit0, _fanout1_unit1])"));
    assert!(source.contains("_run_first(ctx, [_fanout2_unit0, _fanout2_unit1], [\"z\"])"));
}

#[test]
fn names_lost_to_a_faster_branch_are_reported_as_such() {
    let doc = spec(
        json!([]),
        json!({"type": "parallel", "join": "first-to-finish", "branches": [
            {"type": "tool_call", "tool": "fast", "output": "answer"},
            {"type": "sequential", "steps": [
                {"type": "tool_call", "tool": "slow", "output": "answer"},
                {"type": "tool_call", "tool": "trace", "output": "late"}
            ]}
        ]}),
    );

    let source = compile(&doc).unwrap().source;
    assert!(source.contains("_run_first(ctx, [_fanout1_unit0, _fanout1_unit1], [\"answer\", \"late\"])"));
    assert!(source.contains("def _run_first(ctx, units, may_bind=()):"));
    assert!(source.contains("ctx._lost.update(name for name in may_bind if not ctx.has(name))"));
    assert!(source.contains("only bound by a first-to-finish branch that lost the race"));
}

#[test]
fn header_names_generator_and_hash() {
    let doc = spec(json!([]), json!({"type": "tool_call", "tool": "ping"}));
    let program = compile(&doc).unwrap();

    let mut lines = program.source.lines();
    assert!(lines.next().unwrap().starts_with("# Generated by toolflow "));
    assert_eq!(lines.next().unwrap(), "# workflow: shape 1.2.0");
    assert_eq!(lines.next().unwrap(), format!("# spec-hash: {}", program.spec_hash));
    assert!(program.source.contains("def run_workflow(**inputs):"));
    assert!(program.source.contains("if __name__ == \"__main__\":"));
}
