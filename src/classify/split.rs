//! Splitting a shell command line into simple commands.

use thiserror::Error;

/// Why a command line could not be split structurally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("unbalanced quote")]
    UnbalancedQuote,
    #[error("dangling escape at end of input")]
    DanglingEscape,
    #[error("unsupported shell construct '{0}'")]
    Unsupported(&'static str),
    #[error("failed to tokenize '{segment}': {message}")]
    Tokenize { segment: String, message: String },
}

/// Split `command` on `;`, `&&`, `||`, `|`, `&` and newlines, then tokenize
/// each simple command.
///
/// Operators inside quotes are literal. Redirections such as `2>&1` and `&>`
/// stay part of their command. Command substitution, subshells, brace groups
/// and here-docs are rejected rather than guessed at.
pub fn split_commands(command: &str) -> Result<Vec<Vec<String>>, SplitError> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = command.chars().peekable();
    let mut prev: Option<char> = None;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next().ok_or(SplitError::DanglingEscape)?;
                current.push(c);
                current.push(escaped);
                prev = Some(escaped);
                continue;
            }
            '\'' => {
                current.push(c);
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(inner) => current.push(inner),
                        None => return Err(SplitError::UnbalancedQuote),
                    }
                }
                current.push('\'');
            }
            '"' => {
                current.push(c);
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => {
                            let escaped = chars.next().ok_or(SplitError::UnbalancedQuote)?;
                            current.push('\\');
                            current.push(escaped);
                        }
                        Some('`') => return Err(SplitError::Unsupported("`")),
                        Some('$') if chars.peek() == Some(&'(') => {
                            return Err(SplitError::Unsupported("$("));
                        }
                        Some(inner) => current.push(inner),
                        None => return Err(SplitError::UnbalancedQuote),
                    }
                }
                current.push('"');
            }
            '`' => return Err(SplitError::Unsupported("`")),
            '$' if chars.peek() == Some(&'(') => return Err(SplitError::Unsupported("$(")),
            '(' | ')' => return Err(SplitError::Unsupported("(")),
            '{' if current.trim().is_empty() => return Err(SplitError::Unsupported("{")),
            '<' if chars.peek() == Some(&'<') => return Err(SplitError::Unsupported("<<")),
            ';' | '\n' => push_segment(&mut segments, &mut current),
            '|' => {
                if matches!(chars.peek(), Some('|') | Some('&')) {
                    chars.next();
                }
                push_segment(&mut segments, &mut current);
            }
            '&' => {
                if chars.peek() == Some(&'&') {
                    chars.next();
                    push_segment(&mut segments, &mut current);
                } else if matches!(prev, Some('>') | Some('<')) || chars.peek() == Some(&'>') {
                    // 2>&1, >&2, &>file
                    current.push(c);
                } else {
                    push_segment(&mut segments, &mut current);
                }
            }
            _ => current.push(c),
        }
        prev = Some(c);
    }
    push_segment(&mut segments, &mut current);

    segments
        .into_iter()
        .map(|segment| {
            shell_words::split(&segment).map_err(|e| SplitError::Tokenize {
                segment: segment.clone(),
                message: e.to_string(),
            })
        })
        .filter(|argv| !matches!(argv, Ok(args) if args.is_empty()))
        .collect()
}

fn push_segment(segments: &mut Vec<String>, current: &mut String) {
    let segment = current.trim();
    if !segment.is_empty() {
        segments.push(segment.to_string());
    }
    current.clear();
}
