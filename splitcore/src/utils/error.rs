use std::path::PathBuf;

use splitir::verify::VerifyIssue;
use strum::EnumIs;
use thiserror::Error;

use crate::linkage::LinkState;

#[derive(Debug, Error, EnumIs)]
pub enum SplitError {
    #[error(transparent)]
    Ir(#[from] splitir::utils::Error),

    #[error("I/O error on '{}': {source}", .path.display())]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file '{file}': {source}")]
    ConfigParseError {
        source: toml::de::Error,
        file: String,
    },

    #[error("No output directory given; splitting requires one")]
    MissingOutputDirectory,

    #[error("Symbol '{0}' is not defined in the module")]
    UnknownSymbol(String),

    #[error("Illegal linkage transition for '{symbol}': {from:?} -> {to:?}")]
    IllegalTransition {
        symbol: String,
        from: LinkState,
        to: LinkState,
    },

    #[error("Failed to spawn `{command}`: {source}")]
    SpawnError {
        command: String,
        source: std::io::Error,
    },

    #[error(
        "Extraction of '{symbol}' failed ({}): {command}",
        .status.map(|code| format!("exit status {code}")).unwrap_or_else(|| "terminated by signal".to_string())
    )]
    ExtractionFailure {
        symbol: String,
        command: String,
        status: Option<i32>,
    },

    #[error("Cloned module for '{symbol}' failed verification with {} issue(s)", .issues.len())]
    VerificationError {
        symbol: String,
        issues: Vec<VerifyIssue>,
    },

    #[error("Failed to build the worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl SplitError {
    /// Parse errors of an input module, as opposed to every other failure.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            SplitError::Ir(splitir::utils::Error::ParserErrors { .. })
        )
    }
}

pub type SplitResult<T> = Result<T, SplitError>;
