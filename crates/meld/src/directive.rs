//! Conditional-compilation directives.
//!
//! A batch can carry SQL for several engine versions and select one at
//! render time with line-oriented directives:
//!
//! ```text
//! #if 10
//! -- emitted when the engine version starts with "10"
//! #elseif 11.0
//! -- emitted when it starts with "11.0" and the "10" branch did not match
//! #else
//! -- emitted when no branch above matched
//! #endif
//! ```
//!
//! Prefixes are compared case-insensitively. Directive lines are never
//! emitted; every other line is copied verbatim, line ending included,
//! while the active branch is true. Blocks do not nest.

use std::fmt;

use crate::error::{MeldError, Result};

/// Where the preprocessor is within a conditional chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectiveState {
    NoDirective,
    IfBlock,
    ElseIfBlock,
    ElseBlock,
}

impl DirectiveState {
    /// Transition table. `None` means the directive is illegal here.
    fn next(self, directive: &Directive<'_>) -> Option<Self> {
        use DirectiveState::{ElseBlock, ElseIfBlock, IfBlock, NoDirective};

        match (self, directive) {
            (NoDirective, Directive::If(_)) => Some(IfBlock),
            (IfBlock | ElseIfBlock, Directive::ElseIf(_)) => Some(ElseIfBlock),
            (IfBlock | ElseIfBlock, Directive::Else) => Some(ElseBlock),
            (IfBlock | ElseIfBlock | ElseBlock, Directive::EndIf) => Some(NoDirective),
            _ => None,
        }
    }
}

impl fmt::Display for DirectiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoDirective => "outside a conditional block",
            Self::IfBlock => "after '#if'",
            Self::ElseIfBlock => "after '#elseif'",
            Self::ElseBlock => "after '#else'",
        };
        f.write_str(text)
    }
}

/// A parsed directive line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive<'a> {
    If(&'a str),
    ElseIf(&'a str),
    Else,
    EndIf,
}

impl<'a> Directive<'a> {
    /// Parses a trimmed line starting with `#`.
    fn parse(line: &'a str) -> Option<Self> {
        let body = line.strip_prefix('#')?;
        let (keyword, argument) = match body.find(char::is_whitespace) {
            Some(index) => (&body[..index], body[index..].trim()),
            None => (body, ""),
        };
        let has_prefix = !argument.is_empty() && !argument.contains(char::is_whitespace);

        match keyword.to_ascii_lowercase().as_str() {
            "if" if has_prefix => Some(Self::If(argument)),
            "elseif" if has_prefix => Some(Self::ElseIf(argument)),
            "else" if argument.is_empty() => Some(Self::Else),
            "endif" if argument.is_empty() => Some(Self::EndIf),
            _ => None,
        }
    }

    fn keyword(&self) -> &'static str {
        match self {
            Self::If(_) => "#if",
            Self::ElseIf(_) => "#elseif",
            Self::Else => "#else",
            Self::EndIf => "#endif",
        }
    }
}

/// Evaluates the directives in `batch` against `engine_version`.
///
/// Each call starts from a clean state, so the same text can be rendered for
/// any number of engine versions.
pub fn preprocess(batch: &str, engine_version: &str) -> Result<String> {
    let engine_version = engine_version.to_lowercase();
    let matches = |prefix: &str| engine_version.starts_with(&prefix.to_lowercase());

    let mut state = DirectiveState::NoDirective;
    let mut emitting = true;
    let mut satisfied = false;
    let mut opened_at: Option<(usize, &str)> = None;
    let mut output = String::with_capacity(batch.len());

    for (index, raw_line) in batch.split_inclusive('\n').enumerate() {
        let line = raw_line.trim();
        if !line.starts_with('#') {
            if emitting {
                output.push_str(raw_line);
            }
            continue;
        }

        let line_number = index + 1;
        let directive = Directive::parse(line)
            .ok_or_else(|| syntax_error(line_number, line, "unrecognized directive"))?;
        let next = state.next(&directive).ok_or_else(|| {
            syntax_error(
                line_number,
                line,
                format!("'{}' is not allowed {state}", directive.keyword()),
            )
        })?;

        match directive {
            Directive::If(prefix) => {
                emitting = matches(prefix);
                satisfied = emitting;
                opened_at = Some((line_number, line));
            }
            Directive::ElseIf(prefix) => {
                emitting = !satisfied && matches(prefix);
                satisfied |= emitting;
            }
            Directive::Else => {
                emitting = !satisfied;
                satisfied = true;
            }
            Directive::EndIf => {
                emitting = true;
                satisfied = false;
                opened_at = None;
            }
        }
        state = next;
    }

    if let Some((line_number, line)) = opened_at {
        return Err(syntax_error(line_number, line, "missing '#endif'"));
    }

    Ok(output)
}

fn syntax_error(line_number: usize, line: &str, reason: impl Into<String>) -> MeldError {
    MeldError::DirectiveSyntax {
        line_number,
        line: line.to_string(),
        reason: reason.into(),
    }
}
