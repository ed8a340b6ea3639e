//! Shell literal construction for generated scripts.
//!
//! Every path that reaches a remote script goes through [`bash_quote`]. The
//! single-quote form is immune to word splitting, globbing, `$` expansion and
//! command substitution; the only character that needs care is `'` itself.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuoteError {
    #[error("{what} contains NUL byte, refusing")]
    Nul { what: String },
    #[error("{what} contains control character {code:#04x}, refusing")]
    Control { what: String, code: u32 },
}

/// Reject strings that cannot legitimately appear in a remote path.
///
/// NUL can never be part of a POSIX path; the remaining ASCII control
/// characters (including TAB, LF and CR) would corrupt scripts and logs.
pub fn assert_safe_text(value: &str, what: &str) -> Result<(), QuoteError> {
    for ch in value.chars() {
        if ch == '\0' {
            return Err(QuoteError::Nul {
                what: what.to_string(),
            });
        }
        if ch.is_ascii_control() {
            return Err(QuoteError::Control {
                what: what.to_string(),
                code: ch as u32,
            });
        }
    }
    Ok(())
}

/// Return a Bash-safe single-quoted literal: `a'b` becomes `'a'"'"'b'`.
pub fn bash_quote(arg: &str) -> Result<String, QuoteError> {
    assert_safe_text(arg, "path")?;
    if arg.is_empty() {
        return Ok("''".to_string());
    }
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('\'');
    out.push_str(&arg.replace('\'', "'\"'\"'"));
    out.push('\'');
    Ok(out)
}

/// `(item1 item2 ...)` with every item quoted, for `ARR=(...)` assignments.
pub fn bash_array_literal<S: AsRef<str>>(items: &[S]) -> Result<String, QuoteError> {
    let quoted = items
        .iter()
        .map(|item| bash_quote(item.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("({})", quoted.join(" ")))
}

/// Split a shell command line into words, undoing single quotes, double
/// quotes and backslash escapes. `None` when a quote is left open.
///
/// Covers what [`bash_quote`] emits plus ordinary hand-written quoting; no
/// expansion of any kind is performed.
pub fn split_shell_words(line: &str) -> Option<Vec<String>> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' | '\n' => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next()? {
                        '\'' => break,
                        ch => word.push(ch),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next()? {
                        '"' => break,
                        '\\' => match chars.next()? {
                            ch @ ('"' | '\\' | '$' | '`') => word.push(ch),
                            '\n' => {}
                            ch => {
                                word.push('\\');
                                word.push(ch);
                            }
                        },
                        ch => word.push(ch),
                    }
                }
            }
            '\\' => {
                in_word = true;
                match chars.next() {
                    Some('\n') | None => {}
                    Some(ch) => word.push(ch),
                }
            }
            ch => {
                in_word = true;
                word.push(ch);
            }
        }
    }
    if in_word {
        words.push(word);
    }
    Some(words)
}

/// PowerShell here-string for *displaying* an equivalent command. Never
/// executed by this crate.
pub fn powershell_here_string(text: &str) -> String {
    // The terminator must start a line; defuse any embedded one.
    let body = text.replace("\n'@", "\n' @");
    let body = body.strip_prefix("'@").map(|rest| format!("' @{}", rest)).unwrap_or(body);
    format!("@'\n{}\n'@", body)
}
