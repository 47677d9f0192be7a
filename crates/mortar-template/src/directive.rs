//! Directive scanning.
//!
//! Splits a template source at `extend` and `endextend` into text segments.
//! `include` directives stay inside their segment, rewritten into a call to
//! [`INCLUDE_FUNCTION`] so minijinja evaluates them like any other
//! expression, including inside loops and conditionals. Comments and `raw`
//! blocks are left untouched.

use std::sync::LazyLock;

use regex::Regex;

/// Name of the function an `include` directive is rewritten to.
pub const INCLUDE_FUNCTION: &str = "__include";

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?s)\{#.*?#\}",
        r"|\{%-?\s*raw\s*-?%\}.*?\{%-?\s*endraw\s*-?%\}",
        r"|\{%(-?)\s*(extend|endextend|include)\b(.*?)(-?)%\}",
    ))
    .expect("directive pattern is valid")
});

static CAPTURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(.*?)(?:^|\s)as\s+([A-Za-z_][A-Za-z0-9_]*)$")
        .expect("capture pattern is valid")
});

/// A scanned piece of template source.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Template source starting at `line` of the file
    Text { source: String, line: usize },

    /// `{% extend "path" [with <map>] %}`
    Extend {
        path: String,
        bindings: Option<String>,
        line: usize,
    },

    /// `{% endextend %}`
    EndExtend { line: usize },
}

/// A malformed directive.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct SyntaxError {
    pub line: usize,
    pub message: String,
}

impl SyntaxError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Scan a template source into nodes.
pub fn parse(source: &str) -> Result<Vec<Node>, SyntaxError> {
    let mut nodes = Vec::new();
    let mut text = String::new();
    // Start of the pending text segment and of the not yet copied source
    let mut segment_start = 0;
    let mut cursor = 0;
    let mut trim_next = false;

    for caps in DIRECTIVE.captures_iter(source) {
        let (Some(whole), Some(kind)) = (caps.get(0), caps.get(2)) else {
            // Comment or raw block
            continue;
        };
        let line = line_at(source, whole.start());
        let trim_before = !caps[1].is_empty();
        let trim_after = !caps[4].is_empty();
        let args = caps[3].trim();

        text.push_str(&source[cursor..whole.start()]);

        match kind.as_str() {
            "include" => {
                let (path, bindings, capture) = parse_arguments(args, line)?;
                text.push_str(&include_call(
                    &path,
                    bindings.as_deref(),
                    capture.as_deref(),
                    line,
                    (trim_before, trim_after),
                    whole.as_str().matches('\n').count(),
                ));
            }
            directive => {
                let node = if directive == "extend" {
                    let (path, bindings, capture) = parse_arguments(args, line)?;
                    if capture.is_some() {
                        return Err(SyntaxError::new(line, "extend does not support `as`"));
                    }
                    Node::Extend {
                        path,
                        bindings,
                        line,
                    }
                } else {
                    if !args.is_empty() {
                        return Err(SyntaxError::new(line, "endextend takes no arguments"));
                    }
                    Node::EndExtend { line }
                };

                push_text(&mut nodes, source, segment_start, &text, trim_next, trim_before);
                text.clear();
                nodes.push(node);
                trim_next = trim_after;
                segment_start = whole.end();
            }
        }

        cursor = whole.end();
    }

    text.push_str(&source[cursor..]);
    push_text(&mut nodes, source, segment_start, &text, trim_next, false);

    Ok(nodes)
}

fn line_at(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

fn push_text(
    nodes: &mut Vec<Node>,
    source: &str,
    start: usize,
    text: &str,
    trim_start: bool,
    trim_end: bool,
) {
    let mut trimmed = text;
    if trim_start {
        trimmed = trimmed.trim_start();
    }
    // Lines dropped by trimming still count towards the segment's position
    let skipped = &text[..text.len() - trimmed.len()];
    if trim_end {
        trimmed = trimmed.trim_end();
    }
    if trimmed.is_empty() {
        return;
    }

    nodes.push(Node::Text {
        source: trimmed.to_string(),
        line: line_at(source, start) + skipped.matches('\n').count(),
    });
}

/// Render an `include` as a call to [`INCLUDE_FUNCTION`], keeping the
/// directive's trim markers and line count.
fn include_call(
    path: &str,
    bindings: Option<&str>,
    capture: Option<&str>,
    line: usize,
    (trim_before, trim_after): (bool, bool),
    newlines: usize,
) -> String {
    let call = format!(
        "{INCLUDE_FUNCTION}({path:?}, {line}, {}, {})",
        bindings.unwrap_or("none"),
        capture.map_or_else(|| "none".to_string(), |name| format!("{name:?}")),
    );
    let padding = "\n".repeat(newlines.saturating_sub(call.matches('\n').count()));
    let open = if trim_before { "-" } else { "" };
    let close = if trim_after { "-" } else { "" };

    match capture {
        Some(name) => format!("{{%{open} set {name} = {call}{padding} {close}%}}"),
        None => format!("{{{{{open} {call}{padding} {close}}}}}"),
    }
}

/// Split `"path" [with <expr>] [as <name>]` into its parts.
fn parse_arguments(
    args: &str,
    line: usize,
) -> Result<(String, Option<String>, Option<String>), SyntaxError> {
    let mut chars = args.chars();
    let quote = match chars.next() {
        Some(q @ ('"' | '\'')) => q,
        _ => return Err(SyntaxError::new(line, "expected a quoted path")),
    };

    let body = &args[1..];
    let Some(close) = body.find(quote) else {
        return Err(SyntaxError::new(line, "unterminated path literal"));
    };

    let path = &body[..close];
    if path.trim().is_empty() {
        return Err(SyntaxError::new(line, "empty path"));
    }

    let mut rest = body[close + 1..].trim();

    let mut capture = None;
    if let Some(caps) = CAPTURE.captures(rest) {
        capture = Some(caps[2].to_string());
        rest = caps.get(1).map_or("", |m| m.as_str()).trim();
    }

    let bindings = if rest.is_empty() {
        None
    } else {
        let Some(expr) = rest.strip_prefix("with") else {
            return Err(SyntaxError::new(
                line,
                format!("unexpected `{rest}` after path"),
            ));
        };
        if !expr.starts_with(char::is_whitespace) {
            return Err(SyntaxError::new(line, "expected whitespace after `with`"));
        }
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(SyntaxError::new(line, "`with` needs a map expression"));
        }
        Some(expr.to_string())
    };

    Ok((path.to_string(), bindings, capture))
}
