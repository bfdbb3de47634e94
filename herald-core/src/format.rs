//! Message body formatting
//!
//! Bodies are written as templates with `{}` placeholders filled left to
//! right from a slice of [`Arg`]s:
//!
//! ```
//! use herald_core::format::{format_body, Arg};
//!
//! let text = format_body("First {} Second {}", &[Arg::from(&"a"), Arg::from(&2)]);
//! assert_eq!(text, "First a Second 2");
//! ```
//!
//! `\{}` produces a literal `{}`. When the final argument is an error and no
//! placeholder is left for it, the error and its source chain are appended on
//! the following lines.

use std::error::Error as StdError;
use std::fmt::{self, Write};

/// One positional argument for a body template
#[derive(Clone, Copy)]
pub enum Arg<'a> {
    Value(&'a dyn fmt::Display),
    Error {
        type_name: &'static str,
        error: &'a (dyn StdError + 'a),
    },
}

impl<'a> Arg<'a> {
    /// An error argument; rendered as a trace when it trails the template
    pub fn error<E: StdError + 'static>(error: &'a E) -> Self {
        Arg::Error {
            type_name: std::any::type_name::<E>(),
            error,
        }
    }
}

impl<'a, T: fmt::Display> From<&'a T> for Arg<'a> {
    fn from(value: &'a T) -> Self {
        Arg::Value(value)
    }
}

impl fmt::Display for Arg<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Value(value) => fmt::Display::fmt(value, f),
            Arg::Error { error, .. } => fmt::Display::fmt(error, f),
        }
    }
}

impl fmt::Debug for Arg<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Value(value) => write!(f, "Value({})", value),
            Arg::Error { type_name, error } => write!(f, "Error({}: {})", type_name, error),
        }
    }
}

/// Fill `template` from `args`
pub fn format_body(template: &str, args: &[Arg<'_>]) -> String {
    if args.is_empty() {
        return template.to_string();
    }

    let (mut text, consumed) = substitute(template, args);

    if let Some(Arg::Error { type_name, error }) = args.last() {
        if consumed < args.len() {
            text.push('\n');
            text.push_str(&render_error(type_name, *error));
        }
    }

    text
}

/// Returns the filled text and how many args were consumed
fn substitute(template: &str, args: &[Arg<'_>]) -> (String, usize) {
    let mut out = String::with_capacity(template.len() + 16 * args.len());
    let mut rest = template;
    let mut consumed = 0;

    while consumed < args.len() {
        let Some(pos) = rest.find("{}") else {
            break;
        };
        let before = &rest[..pos];
        let escapes = before.bytes().rev().take_while(|b| *b == b'\\').count();

        if escapes % 2 == 1 {
            // `\{}` is a literal
            out.push_str(&before[..before.len() - 1]);
            out.push_str("{}");
        } else {
            // `\\{}` keeps one backslash and still substitutes
            let keep = if escapes > 0 { before.len() - 1 } else { before.len() };
            out.push_str(&before[..keep]);
            let _ = write!(out, "{}", args[consumed]);
            consumed += 1;
        }

        rest = &rest[pos + 2..];
    }

    out.push_str(rest);
    (out, consumed)
}

/// Render an error as a short trace: type, message, then each source
pub fn render_error(type_name: &str, error: &dyn StdError) -> String {
    let mut out = format!("{}: {}", type_name, error);
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(out, "\n    caused by: {}", cause);
        source = cause.source();
    }
    out
}
