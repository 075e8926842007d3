/// Name of the environment variable overriding the extraction program.
/// Only consulted when the configuration does not name one explicitly.
pub const ENV_EXTRACT_PROGRAM: &str = "IRSPLIT_EXTRACT";

/// Extraction program used when neither the configuration nor the
/// environment names one.
pub const DEFAULT_EXTRACT_PROGRAM: &str = "irextract";

/// Extension of partition files and snapshots.
pub const DEFAULT_EXTENSION: &str = "ir";

/// Stem of the whole-module snapshot written between normalization stages.
pub const SNAPSHOT_STEM: &str = "_snapshot";

/// Prefix of partition file names (`_<symbol>.<ext>`).
pub const PARTITION_PREFIX: &str = "_";
