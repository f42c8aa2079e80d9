//! Response interpreter: turns one model turn into tool invocations.
//!
//! Two channels are read, in order:
//!
//! 1. **Structured**: the provider's native tool-call list on the turn.
//! 2. **Text**: the marker grammar the system prompt teaches the model:
//!
//! ```text
//! TOOL_CALL: schedule_meeting
//! ARGUMENTS: {"title": "Sync", "attendees": ["bob@example.com"]}
//! ```
//!
//! The text channel is the load-bearing one in practice; many models answer
//! with the markers even when native tool calling is offered. Anything that
//! looks like a call but cannot be extracted is reported as a
//! [`MalformedToolSyntax`] diagnostic and dropped.

use serde_json::Value;
use std::fmt;
use taskpilot_core::message::Turn;
use taskpilot_core::tool::ToolInvocation;

/// Line prefix introducing a text-channel tool call.
pub const CALL_MARKER: &str = "TOOL_CALL:";

/// Line prefix introducing the JSON arguments of a text-channel call.
pub const ARGUMENTS_MARKER: &str = "ARGUMENTS:";

/// Why a call-looking fragment was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedToolSyntax {
    /// `TOOL_CALL:` with nothing usable after it
    EmptyToolName { line: usize },

    /// No `ARGUMENTS:` line follows the call marker
    MissingArguments { tool: String },

    /// `ARGUMENTS:` present but nothing after it
    EmptyArguments { tool: String },

    /// The arguments do not start with `{`
    ArgumentsNotObject { tool: String },

    /// The braces never balance
    UnterminatedJson { tool: String },

    /// Balanced, but not valid JSON
    InvalidJson { tool: String, reason: String },

    /// A structured tool call without a name
    NamelessStructuredCall { call_id: String },
}

impl fmt::Display for MalformedToolSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyToolName { line } => write!(f, "line {line}: {CALL_MARKER} without a tool name"),
            Self::MissingArguments { tool } => write!(f, "{tool}: no {ARGUMENTS_MARKER} line"),
            Self::EmptyArguments { tool } => write!(f, "{tool}: empty arguments"),
            Self::ArgumentsNotObject { tool } => write!(f, "{tool}: arguments are not a JSON object"),
            Self::UnterminatedJson { tool } => write!(f, "{tool}: unbalanced braces in arguments"),
            Self::InvalidJson { tool, reason } => write!(f, "{tool}: invalid JSON arguments ({reason})"),
            Self::NamelessStructuredCall { call_id } => {
                write!(f, "structured tool call {call_id} has no name")
            }
        }
    }
}

/// Which channel produced the invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationSource {
    Structured,
    Text,
    None,
}

/// The outcome of interpreting one model turn.
#[derive(Debug, Clone)]
pub struct Interpretation {
    /// The turn's prose, with extracted call blocks removed
    pub text: String,

    /// Invocations in scan order
    pub invocations: Vec<ToolInvocation>,

    pub source: InvocationSource,

    pub diagnostics: Vec<MalformedToolSyntax>,
}

impl Interpretation {
    pub fn has_invocations(&self) -> bool {
        !self.invocations.is_empty()
    }
}

/// Result of scanning text for the marker grammar.
#[derive(Debug, Clone, Default)]
pub struct TextParse {
    pub invocations: Vec<ToolInvocation>,
    pub diagnostics: Vec<MalformedToolSyntax>,

    /// Input text minus every successfully extracted block, trimmed
    pub remaining: String,
}

/// Interpret a model turn. The structured channel wins when it yields at
/// least one named call; otherwise the text is scanned.
pub fn interpret(turn: &Turn) -> Interpretation {
    let mut diagnostics = Vec::new();
    let mut structured = Vec::new();

    for call in &turn.tool_calls {
        match call.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => {
                // Providers send "" for argument-less calls.
                let raw = if call.arguments.trim().is_empty() {
                    "{}".to_string()
                } else {
                    call.arguments.clone()
                };
                structured.push(ToolInvocation::new(name, raw).with_call_id(call.id.clone()));
            }
            _ => diagnostics.push(MalformedToolSyntax::NamelessStructuredCall {
                call_id: call.id.clone(),
            }),
        }
    }

    if !structured.is_empty() {
        return Interpretation {
            text: turn.content.trim().to_string(),
            invocations: structured,
            source: InvocationSource::Structured,
            diagnostics,
        };
    }

    let parsed = parse(&turn.content);
    diagnostics.extend(parsed.diagnostics);
    let source = if parsed.invocations.is_empty() {
        InvocationSource::None
    } else {
        InvocationSource::Text
    };

    Interpretation {
        text: parsed.remaining,
        invocations: parsed.invocations,
        source,
        diagnostics,
    }
}

/// Scan `text` for `TOOL_CALL:` / `ARGUMENTS:` blocks, left to right,
/// non-overlapping.
pub fn parse(text: &str) -> TextParse {
    let mut out = TextParse::default();
    let mut remaining = String::new();
    let mut kept_from = 0;
    let mut line_start = 0;
    let mut line_no = 1;

    while line_start < text.len() {
        let line_end = end_of_line(text, line_start);
        let line = &text[line_start..line_end];
        let trimmed = line.trim_start();

        let Some(after_marker) = trimmed.strip_prefix(CALL_MARKER) else {
            line_start = next_line(text, line_end);
            line_no += 1;
            continue;
        };

        let marker_end = line_end - after_marker.len();
        match parse_block(text, marker_end, line_end, line_no) {
            Ok((invocation, block_end)) => {
                remaining.push_str(&text[kept_from..line_start]);
                kept_from = block_end;
                out.invocations.push(invocation);

                // Prose after the JSON on the same line is kept but never
                // treated as the start of another block.
                let resume = next_line(text, line_end_from(text, block_end));
                line_no += text[line_start..resume].matches('\n').count();
                line_start = resume;
            }
            Err(diagnostic) => {
                out.diagnostics.push(diagnostic);
                line_start = next_line(text, line_end);
                line_no += 1;
            }
        }
    }

    if kept_from < text.len() {
        remaining.push_str(&text[kept_from..]);
    }
    out.remaining = remaining.trim().to_string();
    out
}

/// Parse one block whose call marker ends at byte `from` on a line ending at
/// `line_end`. Returns the invocation and the byte offset just past it.
fn parse_block(
    text: &str,
    from: usize,
    line_end: usize,
    line_no: usize,
) -> Result<(ToolInvocation, usize), MalformedToolSyntax> {
    let header = &text[from..line_end];
    let header_trimmed = header.trim_start();
    let name_len = header_trimmed
        .find(|c: char| c.is_whitespace())
        .unwrap_or(header_trimmed.len());
    let name = clean_name(&header_trimmed[..name_len]);
    if name.is_empty() {
        return Err(MalformedToolSyntax::EmptyToolName { line: line_no });
    }

    // `ARGUMENTS:` on the same line, or on the next non-blank line.
    let rest_of_line = header_trimmed[name_len..].trim_start();
    let args_start = if let Some(after) = rest_of_line.strip_prefix(ARGUMENTS_MARKER) {
        line_end - after.len()
    } else {
        let mut cursor = next_line(text, line_end);
        loop {
            if cursor >= text.len() {
                return Err(MalformedToolSyntax::MissingArguments { tool: name });
            }
            let end = end_of_line(text, cursor);
            let line = text[cursor..end].trim_start();
            if line.is_empty() {
                cursor = next_line(text, end);
                continue;
            }
            match line.strip_prefix(ARGUMENTS_MARKER) {
                Some(after) => break end - after.len(),
                None => return Err(MalformedToolSyntax::MissingArguments { tool: name }),
            }
        }
    };

    let (json_start, fenced) = skip_to_json(text, args_start);
    let Some(json_start) = json_start else {
        return Err(MalformedToolSyntax::EmptyArguments { tool: name });
    };
    if !text[json_start..].starts_with('{') {
        return Err(MalformedToolSyntax::ArgumentsNotObject { tool: name });
    }

    let Some(len) = find_json_end(&text[json_start..]) else {
        return Err(MalformedToolSyntax::UnterminatedJson { tool: name });
    };
    let raw = &text[json_start..json_start + len];
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(_)) => {}
        Ok(_) => return Err(MalformedToolSyntax::ArgumentsNotObject { tool: name }),
        Err(e) => {
            return Err(MalformedToolSyntax::InvalidJson {
                tool: name,
                reason: e.to_string(),
            });
        }
    }

    let mut block_end = json_start + len;
    if fenced {
        let after = &text[block_end..];
        let ws = after.len() - after.trim_start().len();
        if after.trim_start().starts_with("```") {
            block_end += ws + 3;
        }
    }
    Ok((ToolInvocation::new(name, raw), block_end))
}

/// Find where the JSON begins after `ARGUMENTS:`, skipping whitespace and an
/// optional opening code fence. Returns `None` when nothing follows before
/// the next call marker.
fn skip_to_json(text: &str, from: usize) -> (Option<usize>, bool) {
    let mut pos = from + (text[from..].len() - text[from..].trim_start().len());
    let mut fenced = false;
    if text[pos..].starts_with("```") {
        fenced = true;
        pos = next_line(text, end_of_line(text, pos));
        pos += text[pos..].len() - text[pos..].trim_start().len();
    }
    if pos >= text.len() || text[pos..].starts_with(CALL_MARKER) {
        return (None, fenced);
    }
    (Some(pos), fenced)
}

/// Byte length of the JSON object at the start of `input`, found by
/// counting braces outside string literals. A backslash escapes the next
/// character and is not itself counted.
pub fn find_json_end(input: &str) -> Option<usize> {
    if !input.starts_with('{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in input.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + ch.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}

/// Models sometimes decorate the name: `**schedule_meeting**`, `` `x` ``.
fn clean_name(raw: &str) -> String {
    raw.trim_matches(|c: char| matches!(c, '`' | '*' | '"' | '\'' | ',' | ';'))
        .chars()
        .take_while(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect()
}

fn end_of_line(text: &str, from: usize) -> usize {
    text[from..].find('\n').map_or(text.len(), |i| from + i)
}

fn line_end_from(text: &str, from: usize) -> usize {
    if from >= text.len() { text.len() } else { end_of_line(text, from) }
}

fn next_line(text: &str, line_end: usize) -> usize {
    (line_end + 1).min(text.len())
}
