//! Materialization strategies for partition specifications.
use std::{
    io::Write,
    path::{Path, PathBuf},
};

use log::{info, warn};
use parking_lot::Mutex;
use splitir::{module::Module, store::write_snapshot, symbol::SymbolKind};

use crate::{
    cloner::ModuleCloner,
    config::{SplitConfig, Strategy},
    partition::{ExtractRequest, PartitionSpec},
    utils::error::{SplitError, SplitResult},
};

/// A partition handed to a dispatcher without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub root: String,
    pub kind: SymbolKind,
    pub output: PathBuf,
    /// The extraction command line, when one was built.
    pub command: Option<String>,
    /// Whether the output file was produced (false in dry mode).
    pub written: bool,
}

impl Dispatched {
    fn new(spec: &PartitionSpec, command: Option<String>, written: bool) -> Self {
        Self {
            root: spec.root.clone(),
            kind: spec.kind,
            output: spec.output.clone(),
            command,
            written,
        }
    }
}

/// Turns a [`PartitionSpec`] into an output file. Dispatchers are shared
/// between worker threads.
pub trait Dispatcher: Send + Sync {
    /// `snapshot` is the current in-memory module; `snapshot_path` is where
    /// its printed copy lives (absent from disk in dry mode).
    fn dispatch(
        &self,
        snapshot: &Module,
        snapshot_path: &Path,
        spec: &PartitionSpec,
    ) -> SplitResult<Dispatched>;
}

/// Hands each partition to the external extraction program.
pub struct ExtractDispatcher {
    program: String,
    dry_run: bool,
    console: Mutex<Box<dyn Write + Send>>,
}

impl ExtractDispatcher {
    pub fn new(program: impl Into<String>, dry_run: bool) -> Self {
        Self {
            program: program.into(),
            dry_run,
            console: Mutex::new(Box::new(std::io::stdout())),
        }
    }

    /// Print commands to `console` instead of the standard output.
    pub fn with_console(mut self, console: Box<dyn Write + Send>) -> Self {
        self.console = Mutex::new(console);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn announce(&self, command: &str) {
        let mut console = self.console.lock();
        if let Err(e) = writeln!(console, "{}", command) {
            warn!("dispatch: failed to print command: {}", e);
        }
    }
}

impl Dispatcher for ExtractDispatcher {
    fn dispatch(
        &self,
        _snapshot: &Module,
        snapshot_path: &Path,
        spec: &PartitionSpec,
    ) -> SplitResult<Dispatched> {
        let request = ExtractRequest::new(self.program.as_str(), snapshot_path, spec);
        let command = request.to_string();
        self.announce(&command);

        if self.dry_run {
            return Ok(Dispatched::new(spec, Some(command), false));
        }

        let status = request
            .to_command()
            .status()
            .map_err(|source| SplitError::SpawnError {
                command: command.clone(),
                source,
            })?;
        if !status.success() {
            return Err(SplitError::ExtractionFailure {
                symbol: spec.root.clone(),
                command,
                status: status.code(),
            });
        }

        info!("dispatch: extracted @{} into {}", spec.root, spec.output.display());
        Ok(Dispatched::new(spec, Some(command), true))
    }
}

/// Builds each partition in process with the module cloner.
pub struct CloneDispatcher {
    dry_run: bool,
}

impl CloneDispatcher {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

impl Dispatcher for CloneDispatcher {
    fn dispatch(
        &self,
        snapshot: &Module,
        _snapshot_path: &Path,
        spec: &PartitionSpec,
    ) -> SplitResult<Dispatched> {
        let module = ModuleCloner::for_partition(snapshot, spec).clone_verified(&spec.root)?;
        if self.dry_run {
            return Ok(Dispatched::new(spec, None, false));
        }

        write_snapshot(&module, &spec.output)?;
        info!("dispatch: cloned @{} into {}", spec.root, spec.output.display());
        Ok(Dispatched::new(spec, None, true))
    }
}

/// The dispatcher selected by `config.strategy`.
pub fn dispatcher_for(config: &SplitConfig) -> Box<dyn Dispatcher> {
    match config.strategy {
        Strategy::Extract => Box::new(ExtractDispatcher::new(
            config.extractor_program(),
            config.dry_run,
        )),
        Strategy::Clone => Box::new(CloneDispatcher::new(config.dry_run)),
    }
}
