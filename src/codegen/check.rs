//! Structural self-check of emitted source
//!
//! Not a Python parser. It proves the properties the generator is supposed
//! to guarantee by construction; any failure here is a generator bug.
//!
//! - indentation is spaces only, in steps of four
//! - every line ending in `:` is followed by a deeper-indented line
//! - quotes and brackets balance (comments and triple quotes understood)
//! - no NUL anywhere, no other control character outside string literals
//! - one `def tool_<name>` per tool, nothing extra, one `def run_workflow`

use std::collections::BTreeSet;

use crate::error::{Result, ToolflowError};

fn fail(reason: String) -> ToolflowError {
    ToolflowError::GenerationError { reason }
}

/// Lexer state carried across lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Str {
    None,
    Triple(char),
}

/// Per-line view after lexing: whether the line starts a logical line
struct LineInfo<'a> {
    number: usize,
    text: &'a str,
    logical_start: bool,
}

pub(crate) fn check_source(source: &str, tools: &BTreeSet<String>) -> Result<()> {
    let lines = lex(source)?;
    check_indentation(&lines)?;
    check_definitions(&lines, tools)
}

fn lex(source: &str) -> Result<Vec<LineInfo<'_>>> {
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut state = Str::None;
    let mut out = Vec::new();

    for (idx, text) in source.lines().enumerate() {
        let number = idx + 1;
        out.push(LineInfo {
            number,
            text,
            logical_start: stack.is_empty() && state == Str::None,
        });

        if text.contains('\0') {
            return Err(fail(format!("line {}: NUL byte in source", number)));
        }

        let chars: Vec<char> = text.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let ch = chars[i];
            if let Str::Triple(q) = state {
                if ch == '\\' {
                    i += 2;
                    continue;
                }
                if ch == q && chars.get(i + 1) == Some(&q) && chars.get(i + 2) == Some(&q) {
                    state = Str::None;
                    i += 3;
                    continue;
                }
                i += 1;
                continue;
            }

            match ch {
                '#' => break,
                '\'' | '"' => {
                    if chars.get(i + 1) == Some(&ch) && chars.get(i + 2) == Some(&ch) {
                        state = Str::Triple(ch);
                        i += 3;
                        continue;
                    }
                    i += 1;
                    let mut closed = false;
                    while i < chars.len() {
                        if chars[i] == '\\' {
                            i += 2;
                            continue;
                        }
                        if chars[i] == ch {
                            closed = true;
                            break;
                        }
                        i += 1;
                    }
                    if !closed {
                        return Err(fail(format!("line {}: unterminated string literal", number)));
                    }
                }
                '(' | '[' | '{' => stack.push((ch, number)),
                ')' | ']' | '}' => {
                    let expected = match ch {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    match stack.pop() {
                        Some((open, _)) if open == expected => {}
                        _ => return Err(fail(format!("line {}: unmatched '{}'", number, ch))),
                    }
                }
                c if c.is_control() && c != '\t' => {
                    return Err(fail(format!(
                        "line {}: control character {} outside a string literal",
                        number,
                        c.escape_unicode()
                    )))
                }
                _ => {}
            }
            i += 1;
        }
    }

    if let Some((open, line)) = stack.last() {
        return Err(fail(format!("line {}: '{}' is never closed", line, open)));
    }
    if state != Str::None {
        return Err(fail("unterminated triple-quoted string".to_string()));
    }
    Ok(out)
}

fn indent_of(text: &str) -> usize {
    text.len() - text.trim_start_matches(' ').len()
}

fn check_indentation(lines: &[LineInfo<'_>]) -> Result<()> {
    let logical: Vec<&LineInfo<'_>> = lines
        .iter()
        .filter(|l| l.logical_start && !l.text.trim().is_empty())
        .collect();

    for (pos, line) in logical.iter().enumerate() {
        let prefix = &line.text[..line.text.len() - line.text.trim_start().len()];
        if prefix.contains(|c: char| c != ' ') {
            return Err(fail(format!("line {}: tab or non-space indentation", line.number)));
        }
        let indent = indent_of(line.text);
        if indent % 4 != 0 {
            return Err(fail(format!(
                "line {}: indentation of {} is not a multiple of 4",
                line.number, indent
            )));
        }

        let code = line.text.trim_end();
        if code.trim_start().starts_with('#') || !code.ends_with(':') {
            continue;
        }
        match logical.get(pos + 1) {
            Some(next) if indent_of(next.text) == indent + 4 => {}
            _ => {
                return Err(fail(format!(
                    "line {}: block opener is not followed by an indented body",
                    line.number
                )))
            }
        }
    }
    Ok(())
}

fn check_definitions(lines: &[LineInfo<'_>], tools: &BTreeSet<String>) -> Result<()> {
    let mut entry = 0;
    let mut defined: Vec<&str> = Vec::new();

    for line in lines.iter().filter(|l| l.logical_start) {
        if let Some(rest) = line.text.strip_prefix("def tool_") {
            let name = rest.split('(').next().unwrap_or_default();
            defined.push(name);
        } else if line.text.starts_with("def run_workflow(") {
            entry += 1;
        }
    }

    if entry != 1 {
        return Err(fail(format!("expected one run_workflow definition, found {}", entry)));
    }

    for tool in tools {
        let count = defined.iter().filter(|d| **d == tool.as_str()).count();
        if count != 1 {
            return Err(fail(format!(
                "expected one definition of tool_{}, found {}",
                tool, count
            )));
        }
    }
    if let Some(extra) = defined.iter().find(|d| !tools.contains(**d)) {
        return Err(fail(format!("tool_{} is defined but never used", extra)));
    }
    Ok(())
}
