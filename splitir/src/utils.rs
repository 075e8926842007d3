use strum::{EnumIs, EnumTryAs};
use thiserror::Error;

use crate::verify::VerifyIssue;

/// A single parser diagnostic, positioned by byte offsets into the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserError {
    pub file: Option<String>,
    pub start: usize,
    pub end: usize,
    pub message: String,
}

impl std::fmt::Display for ParserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}..{}: {}",
            self.file.as_deref().unwrap_or("<input>"),
            self.start,
            self.end,
            self.message
        )
    }
}

#[derive(Debug, EnumIs, EnumTryAs, Error)]
pub enum Error {
    /// The source text could not be parsed.
    #[error(
        "Failed to parse `{}`: {} error(s), first: {}",
        .file.as_deref().unwrap_or("<input>"),
        .errors.len(),
        .errors.first().map(|e| e.message.as_str()).unwrap_or("unknown")
    )]
    ParserErrors {
        file: Option<String>,
        errors: Vec<ParserError>,
    },

    /// Reading or writing a module file failed.
    #[error("I/O error on `{path}`: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Two symbols of the same module share a name.
    #[error("Symbol `@{name}` is defined more than once in the module.")]
    DuplicateSymbol { name: String },

    /// A symbol requested by name does not exist in the module.
    #[error("Symbol `@{name}` requested as {expected} does not exist in the module.")]
    UnknownSymbol { name: String, expected: String },

    /// The module violates structural invariants.
    #[error(
        "Module `{}` failed verification with {} issue(s): {}",
        .module,
        .issues.len(),
        .issues.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("; ")
    )]
    VerificationFailed {
        module: String,
        issues: Vec<VerifyIssue>,
    },
}
