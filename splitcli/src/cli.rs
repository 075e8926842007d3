use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use splitcore::{
    config::{ConstantSharing, SplitConfig, Strategy},
    utils::error::SplitResult,
};

/// Split an IR module into one partition per definition.
#[derive(Parser, Debug)]
#[command(name = "irsplit", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Print a per-symbol diagnostic trace
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Split one module into partitions
    Split(SplitArgs),
    /// List the functions of several modules that can be extracted
    Survey(SurveyArgs),
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Default)]
pub struct CommonArgs {
    /// TOML configuration file; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Only handle this symbol
    #[arg(long)]
    pub only: Option<String>,

    /// Extraction program (defaults to $IRSPLIT_EXTRACT, then `irextract`)
    #[arg(long)]
    pub extractor: Option<String>,

    /// Check viability and leave out functions that cannot be extracted
    #[arg(long, default_value_t = false)]
    pub safe: bool,
}

#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Input module
    pub input: PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,

    /// Print the extraction commands without running them or writing files
    #[arg(long, default_value_t = false)]
    pub dry: bool,

    /// How partitions are materialized (`extract` or `clone`)
    #[arg(long)]
    pub strategy: Option<Strategy>,

    /// How constants reachable from several partitions are handled
    /// (`duplicate` or `shared`)
    #[arg(long)]
    pub sharing: Option<ConstantSharing>,

    /// Also give unreferenced exported globals their own partition
    #[arg(long, default_value_t = false)]
    pub keep_orphans: bool,

    /// Worker threads (0 uses one per core)
    #[arg(long)]
    pub threads: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SurveyArgs {
    /// File listing one module path per line
    pub list: PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl CommonArgs {
    fn to_config(&self, verbose: bool) -> SplitResult<SplitConfig> {
        let mut config = match &self.config {
            Some(path) => SplitConfig::load_from_toml(path)?,
            None => SplitConfig::default(),
        };

        if let Some(output) = &self.output {
            config.output_dir = Some(output.clone());
        }
        if let Some(only) = &self.only {
            config.only = Some(only.clone());
        }
        if let Some(extractor) = &self.extractor {
            config.extractor = Some(extractor.clone());
        }
        config.safe |= self.safe;
        config.verbose |= verbose;
        Ok(config)
    }
}

impl SplitArgs {
    pub fn to_config(&self, verbose: bool) -> SplitResult<SplitConfig> {
        let mut config = self.common.to_config(verbose)?;
        config.dry_run |= self.dry;
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(sharing) = self.sharing {
            config.constant_sharing = sharing;
        }
        if self.keep_orphans {
            config.keep_exported_orphans = true;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        Ok(config)
    }
}

impl SurveyArgs {
    pub fn to_config(&self, verbose: bool) -> SplitResult<SplitConfig> {
        self.common.to_config(verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(args: &[&str]) -> (SplitArgs, bool) {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Split(split) => (split, cli.verbose),
            other => panic!("expected split, got {other:?}"),
        }
    }

    #[test]
    fn flags_override_defaults() {
        let (args, verbose) = split(&[
            "irsplit",
            "split",
            "in.ir",
            "-o",
            "out",
            "--dry",
            "-v",
            "--only",
            "main",
            "--strategy",
            "clone",
            "--sharing",
            "shared",
            "--threads",
            "3",
            "--keep-orphans",
        ]);
        let config = args.to_config(verbose).unwrap();

        assert_eq!(args.input, PathBuf::from("in.ir"));
        assert_eq!(config.output_dir, Some(PathBuf::from("out")));
        assert!(config.dry_run && config.verbose);
        assert_eq!(config.only.as_deref(), Some("main"));
        assert_eq!(config.strategy, Strategy::Clone);
        assert_eq!(config.constant_sharing, ConstantSharing::Shared);
        assert_eq!(config.threads, 3);
        assert!(config.keep_exported_orphans);
    }

    #[test]
    fn configuration_file_is_the_base_layer() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("split.toml");
        std::fs::write(
            &file,
            "output_dir = \"from-file\"\nstrategy = \"clone\"\nsafe = true\n",
        )
        .unwrap();

        let (args, verbose) = split(&[
            "irsplit",
            "split",
            "in.ir",
            "--config",
            file.to_str().unwrap(),
            "--strategy",
            "extract",
        ]);
        let config = args.to_config(verbose).unwrap();
        assert_eq!(config.output_dir, Some(PathBuf::from("from-file")));
        assert_eq!(config.strategy, Strategy::Extract);
        assert!(config.safe);
        assert!(!config.verbose);
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let result = Cli::try_parse_from(["irsplit", "split", "in.ir", "--strategy", "copy"]);
        assert!(result.is_err());
    }

    #[test]
    fn survey_takes_a_list_file() {
        let cli = Cli::try_parse_from(["irsplit", "survey", "modules.txt", "--only", "f"]).unwrap();
        let Command::Survey(survey) = cli.command else {
            panic!("expected survey");
        };
        assert_eq!(survey.list, PathBuf::from("modules.txt"));
        let config = survey.to_config(false).unwrap();
        assert_eq!(config.only.as_deref(), Some("f"));
    }
}
