use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::wire::GenerationKind;

pub mod extract;
pub mod fallback;

pub use extract::extract_json;
pub use fallback::{fallback_for, masks_failures};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStage {
    TrailingCommas,
    UnquotedKeys,
    BareValues,
    NumericStrings,
    ControlChars,
    UnbalancedBrackets,
}

impl fmt::Display for RepairStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepairStage::TrailingCommas => "trailing_commas",
            RepairStage::UnquotedKeys => "unquoted_keys",
            RepairStage::BareValues => "bare_values",
            RepairStage::NumericStrings => "numeric_strings",
            RepairStage::ControlChars => "control_chars",
            RepairStage::UnbalancedBrackets => "unbalanced_brackets",
        };
        f.write_str(s)
    }
}

/// Rewrites in the order they are tried. Each one runs on the previous one's output.
pub const STAGES: [(RepairStage, fn(&str) -> String); 6] = [
    (RepairStage::TrailingCommas, strip_trailing_commas),
    (RepairStage::UnquotedKeys, quote_unquoted_keys),
    (RepairStage::BareValues, quote_bare_values),
    (RepairStage::NumericStrings, unquote_numeric_strings),
    (RepairStage::ControlChars, strip_control_chars),
    (RepairStage::UnbalancedBrackets, close_unbalanced),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Strict,
    Repaired(RepairStage),
    Fallback(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Normalized {
    pub value: Value,
    pub outcome: Outcome,
}

impl Normalized {
    pub fn is_fallback(&self) -> bool {
        matches!(self.outcome, Outcome::Fallback(_))
    }
}

fn parse_object(s: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(s) {
        Ok(v @ Value::Object(_)) => Some(v),
        _ => None,
    }
}

/// Turns an extracted payload into an object. Never fails: when every rewrite is
/// exhausted the kind's fallback object is returned.
pub fn repair(extracted: &str, kind: GenerationKind) -> Normalized {
    if let Some(value) = parse_object(extracted) {
        debug!(%kind, "strict parse succeeded");
        return Normalized { value, outcome: Outcome::Strict };
    }

    let mut current = extracted.to_string();
    for (stage, rewrite) in STAGES {
        current = rewrite(&current);
        if let Some(value) = parse_object(&current) {
            debug!(%kind, %stage, "repair converged");
            return Normalized { value, outcome: Outcome::Repaired(stage) };
        }
        debug!(%kind, %stage, len = current.len(), "still unparseable after stage");
    }

    warn!(%kind, "repair cascade exhausted, using fallback object");
    Normalized {
        value: fallback_for(kind),
        outcome: Outcome::Fallback("repair cascade exhausted".into()),
    }
}

/// Extraction plus repair over raw provider text.
pub fn normalize(raw: &str, kind: GenerationKind) -> Normalized {
    match extract_json(raw) {
        Ok(extracted) => repair(&extracted, kind),
        Err(e) => {
            warn!(%kind, error = %e, "extraction failed, using fallback object");
            Normalized { value: fallback_for(kind), outcome: Outcome::Fallback(e.to_string()) }
        }
    }
}

fn re(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static repair regex"))
}

pub fn strip_trailing_commas(s: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    re(&RE, r",\s*([}\]])").replace_all(s, "$1").into_owned()
}

pub fn quote_unquoted_keys(s: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    re(&RE, r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:")
        .replace_all(s, "$1\"$2\":")
        .into_owned()
}

/// Quotes scalar values that are neither strings, numbers, literals nor structures,
/// e.g. `"goal": lose weight` becomes `"goal": "lose weight"`.
pub fn quote_bare_values(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 16);
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        i += 1;

        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
            continue;
        }
        if c != ':' {
            continue;
        }

        while i < chars.len() && chars[i].is_whitespace() {
            out.push(chars[i]);
            i += 1;
        }
        let Some(&next) = chars.get(i) else { break };
        if matches!(next, '"' | '{' | '[' | '-') || next.is_ascii_digit() {
            continue;
        }

        let start = i;
        while i < chars.len() && !matches!(chars[i], ',' | '}' | ']' | '\n') {
            i += 1;
        }
        let raw: String = chars[start..i].iter().collect();
        let word = raw.trim_end();
        let trailing = &raw[word.len()..];
        if word.is_empty() || matches!(word, "true" | "false" | "null") {
            out.push_str(&raw);
        } else {
            out.push('"');
            out.push_str(&word.replace('"', "\\\""));
            out.push('"');
            out.push_str(trailing);
        }
    }
    out
}

pub fn unquote_numeric_strings(s: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    re(&RE, r#":(\s*)"\s*(-?\d+(?:\.\d+)?)\s*""#)
        .replace_all(s, ":$1$2")
        .into_owned()
}

pub fn strip_control_chars(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_control() { ' ' } else { c })
        .collect()
}

/// Closes strings, arrays and objects left open by truncated output.
pub fn close_unbalanced(s: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in s.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    let mut out = s.to_string();
    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }
    let kept = out.trim_end().trim_end_matches(',').trim_end().len();
    out.truncate(kept);
    if out.ends_with(':') {
        out.push_str(" null");
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    strip_trailing_commas(&out)
}
