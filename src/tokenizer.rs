//! Splitting of raw input lines into an argument vector.
//!
//! Splitting is pure whitespace delimiting: there is no quoting, escaping or
//! variable expansion. A trailing `&` token requests background execution.

use crate::errors::TokenizeError;

/// Token that marks a command for background execution when it comes last.
pub const BACKGROUND_MARKER: &str = "&";

/// A non-empty command line split into words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    /// Program name followed by its arguments. Never empty.
    pub argv: Vec<String>,
    /// Set when the line ended with a standalone `&`.
    pub background: bool,
}

impl ParsedLine {
    /// The first word, matched against built-in names.
    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    /// Every word after the program name.
    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }
}

/// Split `line` into words and detect the background marker.
///
/// Returns `Ok(None)` for a line without any command words (empty,
/// whitespace only, or a lone `&`), so the caller can skip it silently.
///
/// # Errors
/// [`TokenizeError::TooManyArguments`] when more than `max_args` words remain
/// after the background marker is removed.
pub fn tokenize(line: &str, max_args: usize) -> Result<Option<ParsedLine>, TokenizeError> {
    let mut argv: Vec<String> = line.split_whitespace().map(str::to_string).collect();

    let background = argv.last().is_some_and(|last| last == BACKGROUND_MARKER);
    if background {
        argv.pop();
    }

    if argv.is_empty() {
        return Ok(None);
    }
    if argv.len() > max_args {
        return Err(TokenizeError::TooManyArguments {
            found: argv.len(),
            max: max_args,
        });
    }

    Ok(Some(ParsedLine { argv, background }))
}
