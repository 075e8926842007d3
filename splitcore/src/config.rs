//! Run configuration.
//!
//! A [`SplitConfig`] can be loaded from a TOML file; every field has a
//! default, so a file only needs to name what it changes. Command-line flags
//! are applied on top of the loaded values by the front end.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
    magic::{
        DEFAULT_EXTENSION, DEFAULT_EXTRACT_PROGRAM, ENV_EXTRACT_PROGRAM, PARTITION_PREFIX,
        SNAPSHOT_STEM,
    },
    utils::error::{SplitError, SplitResult},
};

/// How partitions are materialized.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Strategy {
    /// Hand a symbol list to the external extraction program.
    #[default]
    Extract,
    /// Build each partition in process with the module cloner.
    Clone,
}

/// What happens to constant globals reachable from several partitions.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConstantSharing {
    /// Every partition embeds its own copy of the constants it reads.
    /// Only exported constants get a partition of their own, and lose their
    /// initializer in the snapshot.
    #[default]
    Duplicate,
    /// Constants are treated like mutable globals: one partition each,
    /// referenced externally from everywhere else.
    Shared,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Directory receiving partitions and snapshots.
    pub output_dir: Option<PathBuf>,
    /// Extraction program. See [`SplitConfig::extractor_program`].
    pub extractor: Option<String>,
    /// Extension of every written file.
    pub extension: String,
    /// Build requests without executing or writing anything.
    pub dry_run: bool,
    /// Per-symbol diagnostic trace.
    pub verbose: bool,
    /// Only dispatch the partition rooted at this symbol.
    pub only: Option<String>,
    /// Only cut function partitions for viable functions.
    pub safe: bool,
    pub strategy: Strategy,
    pub constant_sharing: ConstantSharing,
    /// Give unreferenced, originally exported globals a partition. Off by
    /// default, which keeps the partition count at one per function
    /// definition plus one per global discovered as a dependency.
    pub keep_exported_orphans: bool,
    /// Snapshot file name, relative to the output directory.
    pub snapshot_name: Option<String>,
    /// Worker threads; 0 uses the rayon default.
    pub threads: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            extractor: None,
            extension: DEFAULT_EXTENSION.to_string(),
            dry_run: false,
            verbose: false,
            only: None,
            safe: false,
            strategy: Strategy::default(),
            constant_sharing: ConstantSharing::default(),
            keep_exported_orphans: false,
            snapshot_name: None,
            threads: 0,
        }
    }
}

impl SplitConfig {
    /// Load a configuration from a TOML file.
    pub fn load_from_toml(path: &Path) -> SplitResult<Self> {
        let toml_str = std::fs::read_to_string(path).map_err(|source| SplitError::IoError {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&toml_str).map_err(|e| SplitError::ConfigParseError {
            source: e,
            file: path.display().to_string(),
        })
    }

    /// Resolve the extraction program: the configured one, then the
    /// `IRSPLIT_EXTRACT` environment variable, then `irextract`.
    pub fn extractor_program(&self) -> String {
        if let Some(program) = &self.extractor {
            return program.clone();
        }
        std::env::var(ENV_EXTRACT_PROGRAM)
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_EXTRACT_PROGRAM.to_string())
    }

    pub fn output_dir(&self) -> SplitResult<&Path> {
        self.output_dir
            .as_deref()
            .ok_or(SplitError::MissingOutputDirectory)
    }

    /// `<outdir>/_<symbol>.<ext>`
    pub fn partition_path(&self, output_dir: &Path, symbol: &str) -> PathBuf {
        output_dir.join(format!("{PARTITION_PREFIX}{symbol}.{}", self.extension))
    }

    /// `<outdir>/_snapshot.<ext>` unless a snapshot name is configured.
    pub fn snapshot_path(&self, output_dir: &Path) -> PathBuf {
        match &self.snapshot_name {
            Some(name) => output_dir.join(name),
            None => output_dir.join(format!("{SNAPSHOT_STEM}.{}", self.extension)),
        }
    }

    /// Whether the partition rooted at `symbol` passes the single-symbol
    /// restriction.
    pub fn selects(&self, symbol: &str) -> bool {
        self.only.as_deref().is_none_or(|only| only == symbol)
    }
}
