//! Shell-like splitting for argument templates given as a single string.
//!
//! Single quotes preserve everything literally. Double quotes group words but
//! still honour backslash escapes. Outside single quotes a backslash escapes
//! the next character.

use crate::error::{EnochError, Result};

/// Split `input` into arguments the way a POSIX shell would tokenize words,
/// without any expansion.
pub fn split_args(input: &str) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;

    for ch in input.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }

        match ch {
            '\\' if !in_single => {
                escaped = true;
                in_word = true;
            }
            '\'' if !in_double => {
                in_single = !in_single;
                in_word = true;
            }
            '"' if !in_single => {
                in_double = !in_double;
                in_word = true;
            }
            c if c.is_whitespace() && !in_single && !in_double => {
                if in_word {
                    args.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if escaped {
        return Err(EnochError::Config("unterminated escape".to_string()));
    }
    if in_single || in_double {
        return Err(EnochError::Config("unterminated quote".to_string()));
    }
    if in_word {
        args.push(current);
    }
    Ok(args)
}
