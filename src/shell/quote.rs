//! POSIX shell quoting.
//!
//! Every quoted word evaluates, under `sh` or `bash`, to exactly the input
//! string as a single argument. Words that only contain inert characters are
//! emitted bare; everything else is single-quoted, with embedded single
//! quotes spliced in as `'"'"'`.

use crate::error::{ChqError, Result};

/// Splice used to embed a single quote inside a single-quoted word.
const ESCAPED_SINGLE_QUOTE: &str = r#"'"'"'"#;

/// Returns true if `c` has no meaning to the shell anywhere in a word.
fn is_inert(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '@' | '%' | '+' | ':' | ',' | '.' | '/' | '-')
}

/// Quotes a single argument for a POSIX shell.
///
/// Fails with a quoting error if the argument contains a NUL byte, which no
/// shell word can carry. The error message never includes the argument.
pub fn quote(arg: &str) -> Result<String> {
    if arg.contains('\0') {
        return Err(ChqError::quoting("argument contains a NUL byte"));
    }

    if arg.is_empty() {
        return Ok("''".to_string());
    }

    if arg.chars().all(is_inert) {
        return Ok(arg.to_string());
    }

    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('\'');
    for c in arg.chars() {
        if c == '\'' {
            quoted.push_str(ESCAPED_SINGLE_QUOTE);
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    Ok(quoted)
}

/// Formats `template`, replacing each `%s` slot with the next argument quoted.
///
/// `%%` renders a literal `%`. The number of slots must match the number of
/// arguments. On any failure nothing is returned, so a partially quoted
/// command line can never escape.
pub fn squotef(template: &str, args: &[&str]) -> Result<String> {
    let capacity = template.len() + args.iter().map(|a| a.len() + 2).sum::<usize>();
    let mut out = String::with_capacity(capacity);
    let mut args_iter = args.iter().enumerate();
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => {
                let (index, arg) = args_iter.next().ok_or_else(|| {
                    ChqError::quoting(format!(
                        "template has more slots than the {} supplied arguments",
                        args.len()
                    ))
                })?;
                let quoted = quote(arg).map_err(|_| {
                    ChqError::quoting(format!("argument {} contains a NUL byte", index + 1))
                })?;
                out.push_str(&quoted);
            }
            Some('%') => out.push('%'),
            Some(other) => {
                return Err(ChqError::quoting(format!(
                    "unsupported template directive '%{other}'"
                )))
            }
            None => return Err(ChqError::quoting("template ends with a lone '%'")),
        }
    }

    if args_iter.next().is_some() {
        return Err(ChqError::quoting(format!(
            "template has fewer slots than the {} supplied arguments",
            args.len()
        )));
    }

    Ok(out)
}
