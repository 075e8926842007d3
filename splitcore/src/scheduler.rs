//! The splitting pipeline.
//!
//! A run goes through the following stages, in order:
//!
//! 1. viability of every function is computed on the untouched module;
//! 2. every symbol is externalized and a first snapshot is written;
//! 3. the closure of every function is resolved, concurrently;
//! 4. every global discovered as a dependency gets its own partition, cut
//!    from the first snapshot while initializers are still present;
//! 5. the initializers of the globals whose partition was produced are
//!    dropped and a second snapshot is written;
//! 6. every function gets its own partition, cut from the second snapshot,
//!    so no function partition embeds a copy of a global it does not own.
//!
//! Partitions within a stage are independent and dispatched concurrently.
use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    path::{Path, PathBuf},
};

use log::{debug, error, info, warn};
use rayon::prelude::*;
use splitir::{
    instructions::Instruction,
    module::Module,
    store::write_snapshot,
    symbol::{GlobalVariable, Linkage},
};

use crate::{
    callgraph::{CallGraph, Viability, check_viability},
    config::SplitConfig,
    dispatch::{Dispatched, Dispatcher, dispatcher_for},
    linkage::LinkageNormalizer,
    partition::PartitionSpec,
    resolver::{Closure, DependencyResolver},
    utils::error::{SplitError, SplitResult},
};

/// A partition that could not be produced.
#[derive(Debug)]
pub struct Failure {
    pub symbol: String,
    pub error: SplitError,
}

#[derive(Debug, Default)]
pub struct RunReport {
    /// Dispatched partitions, globals first, each group sorted by root.
    pub partitions: Vec<Dispatched>,
    pub failures: Vec<Failure>,
    /// Functions left out by the safe mode.
    pub warnings: Vec<Viability>,
    /// Snapshot path, when one was written.
    pub snapshot: Option<PathBuf>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn partition(&self, root: &str) -> Option<&Dispatched> {
        self.partitions.iter().find(|p| p.root == root)
    }
}

pub struct Scheduler {
    config: SplitConfig,
    dispatcher: Box<dyn Dispatcher>,
}

impl Scheduler {
    pub fn new(config: SplitConfig) -> Self {
        let dispatcher = dispatcher_for(&config);
        Self { config, dispatcher }
    }

    pub fn with_dispatcher(config: SplitConfig, dispatcher: Box<dyn Dispatcher>) -> Self {
        Self { config, dispatcher }
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Load `input` and split it. A parse error of the input is fatal.
    pub fn run_file(&self, input: &Path) -> SplitResult<RunReport> {
        let module = splitir::store::load(input)?;
        self.run(module)
    }

    pub fn run(&self, module: Module) -> SplitResult<RunReport> {
        if self.config.threads == 0 {
            return self.run_stages(module);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()?;
        pool.install(|| self.run_stages(module))
    }

    fn run_stages(&self, mut module: Module) -> SplitResult<RunReport> {
        let output_dir = self.config.output_dir()?.to_path_buf();
        if let Some(only) = &self.config.only {
            if !module.contains(only) {
                return Err(SplitError::UnknownSymbol(only.clone()));
            }
        }

        let mut report = RunReport::default();
        let snapshot_path = self.config.snapshot_path(&output_dir);

        let viability = self.viability(&module);

        let mut normalizer = LinkageNormalizer::new(&module, self.config.constant_sharing);
        normalizer.externalize(&mut module);
        self.persist(&module, &snapshot_path, &mut report)?;

        let closures = analyse(&module);
        let globals = self.global_partitions(&module, &normalizer, &closures, &output_dir);
        let produced = self.dispatch_all(&module, &snapshot_path, globals, &mut report);

        for root in &produced {
            let shared = module
                .global(root)
                .is_some_and(|g| normalizer.is_shared(g));
            if shared {
                normalizer.strip_initializer(&mut module, root)?;
            }
        }
        self.persist(&module, &snapshot_path, &mut report)?;

        let functions = self.function_partitions(
            &module,
            &normalizer,
            closures,
            &viability,
            &output_dir,
            &mut report,
        );
        self.dispatch_all(&module, &snapshot_path, functions, &mut report);

        info!(
            "scheduler: {} partition(s), {} failure(s), {} warning(s)",
            report.partitions.len(),
            report.failures.len(),
            report.warnings.len()
        );
        Ok(report)
    }

    fn viability(&self, module: &Module) -> BTreeMap<String, Viability> {
        if !self.config.safe && !self.config.verbose {
            return BTreeMap::new();
        }

        let graph = CallGraph::build(module);
        module
            .functions
            .par_iter()
            .filter(|f| !f.blocks.is_empty())
            .map(|f| (f.name.clone(), check_viability(module, &graph, &f.name)))
            .collect()
    }

    fn persist(&self, module: &Module, path: &Path, report: &mut RunReport) -> SplitResult<()> {
        if self.config.dry_run {
            return Ok(());
        }
        write_snapshot(module, path)?;
        report.snapshot = Some(path.to_path_buf());
        Ok(())
    }

    /// Globals discovered as dependencies, followed through the initializers
    /// of mutable globals to a fixed point.
    fn global_partitions(
        &self,
        module: &Module,
        normalizer: &LinkageNormalizer,
        closures: &[(String, Closure)],
        output_dir: &Path,
    ) -> Vec<PartitionSpec> {
        let partitionable = |name: &str| {
            module
                .global(name)
                .is_some_and(|g| is_partitionable(normalizer, g))
        };

        let mut roots: BTreeSet<String> = closures
            .iter()
            .flat_map(|(_, closure)| closure.globals())
            .filter(|name| partitionable(name.as_str()))
            .cloned()
            .collect();

        if self.config.keep_exported_orphans {
            let referenced = referenced_symbols(module);
            let orphans = module.defined_globals().filter(|g| {
                is_partitionable(normalizer, g)
                    && normalizer.original_linkage(&g.name) == Some(Linkage::External)
                    && !referenced.contains(g.name.as_str())
            });
            for orphan in orphans {
                debug!("scheduler: @{} is an exported orphan", orphan.name);
                roots.insert(orphan.name.clone());
            }
        }

        if let Some(global) = self.config.only.as_deref().and_then(|only| module.global(only)) {
            if global.has_initializer() && !global.externally_initialized {
                roots.insert(global.name.clone());
            }
        }

        let resolver = DependencyResolver::new(module);
        let mut worklist: VecDeque<String> = roots.into_iter().collect();
        let mut done = BTreeSet::new();
        let mut specs = Vec::new();

        while let Some(name) = worklist.pop_front() {
            if !done.insert(name.clone()) {
                continue;
            }
            let Some(global) = module.global(&name) else {
                continue;
            };

            let closure = resolver.resolve_global(global);
            for dependency in closure.globals() {
                if !done.contains(dependency) && partitionable(dependency.as_str()) {
                    debug!("scheduler: @{} pulls in @{}", name, dependency);
                    worklist.push_back(dependency.clone());
                }
            }

            let constants = duplicated(module, normalizer, &closure)
                .filter(|constant| *constant != name)
                .collect::<Vec<_>>();
            let output = self.config.partition_path(output_dir, &name);
            specs.push(PartitionSpec::global(name, constants, output));
        }

        specs.sort_by(|a, b| a.root.cmp(&b.root));
        specs
    }

    fn function_partitions(
        &self,
        module: &Module,
        normalizer: &LinkageNormalizer,
        closures: Vec<(String, Closure)>,
        viability: &BTreeMap<String, Viability>,
        output_dir: &Path,
        report: &mut RunReport,
    ) -> Vec<PartitionSpec> {
        let mut specs = Vec::new();

        for (name, closure) in closures {
            if let Some(verdict) = viability.get(&name).filter(|v| !v.is_viable()) {
                if self.config.safe {
                    warn!("scheduler: skipping {}", verdict);
                    report.warnings.push(verdict.clone());
                    continue;
                }
                debug!("scheduler: {}", verdict);
            }

            let constants = duplicated(module, normalizer, &closure).collect::<Vec<_>>();
            let output = self.config.partition_path(output_dir, &name);
            specs.push(PartitionSpec::function(name, constants, output));
        }

        specs
    }

    /// Dispatch `specs` concurrently and return the roots whose partition was
    /// produced.
    fn dispatch_all(
        &self,
        module: &Module,
        snapshot_path: &Path,
        specs: Vec<PartitionSpec>,
        report: &mut RunReport,
    ) -> BTreeSet<String> {
        let results: Vec<_> = specs
            .into_par_iter()
            .filter(|spec| self.config.selects(&spec.root))
            .map(|spec| {
                if self.config.verbose {
                    debug!(
                        "scheduler: @{} with {:?}",
                        spec.root,
                        spec.companions().collect::<Vec<_>>()
                    );
                }
                let result = self.dispatcher.dispatch(module, snapshot_path, &spec);
                (spec.root, result)
            })
            .collect();

        let mut produced = BTreeSet::new();
        for (symbol, result) in results {
            match result {
                Ok(dispatched) => {
                    produced.insert(symbol);
                    report.partitions.push(dispatched);
                }
                Err(e) => {
                    error!("scheduler: partition @{} failed: {}", symbol, e);
                    report.failures.push(Failure { symbol, error: e });
                }
            }
        }
        produced
    }
}

/// Globals that can own a partition: defined here, not initialized by a
/// loader, and not copied into their users.
fn is_partitionable(normalizer: &LinkageNormalizer, global: &GlobalVariable) -> bool {
    global.has_initializer() && !global.externally_initialized && normalizer.is_shared(global)
}

/// Constants of `closure` that travel with their users.
fn duplicated<'a>(
    module: &'a Module,
    normalizer: &'a LinkageNormalizer,
    closure: &'a Closure,
) -> impl Iterator<Item = String> + 'a {
    closure
        .constants
        .iter()
        .filter(|name| {
            module
                .global(name)
                .is_some_and(|g| g.has_initializer() && normalizer.is_duplicated(g))
        })
        .cloned()
}

/// Closure of every defined function, computed concurrently. Results are
/// merged by the caller; tasks share nothing mutable.
fn analyse(module: &Module) -> Vec<(String, Closure)> {
    let resolver = DependencyResolver::new(module);
    module
        .functions
        .par_iter()
        .filter(|f| !f.blocks.is_empty())
        .map(|f| (f.name.clone(), resolver.resolve_function(f)))
        .collect()
}

/// Every symbol referenced by an initializer or an instruction.
fn referenced_symbols(module: &Module) -> BTreeSet<&str> {
    let initializers = module
        .globals
        .iter()
        .filter_map(|g| g.initializer.as_ref());
    let operands = module
        .functions
        .iter()
        .flat_map(|f| f.instructions())
        .flat_map(|instr| instr.operands())
        .chain(module.functions.iter().flat_map(|f| f.terminators()).flat_map(|t| t.operands()))
        .filter_map(|operand| operand.as_const());

    initializers
        .chain(operands)
        .flat_map(|constant| constant.referenced_symbols())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use splitir::symbol::SymbolKind;

    use super::*;
    use crate::{
        config::{ConstantSharing, Strategy},
        tests_utils::{CALLS_SOURCE, parse_module},
    };

    fn dry_config() -> SplitConfig {
        SplitConfig {
            output_dir: Some(PathBuf::from("out")),
            dry_run: true,
            strategy: Strategy::Clone,
            ..Default::default()
        }
    }

    fn roots(report: &RunReport) -> Vec<&str> {
        report.partitions.iter().map(|p| p.root.as_str()).collect()
    }

    #[test]
    fn mutable_globals_come_before_functions() {
        let report = Scheduler::new(dry_config())
            .run(parse_module(CALLS_SOURCE))
            .unwrap();
        assert!(report.is_success());
        assert_eq!(roots(&report), vec!["counter", "a", "b", "cc"]);
        assert!(report.snapshot.is_none());
        assert!(report.partitions.iter().all(|p| !p.written));
    }

    #[test]
    fn output_directory_is_required() {
        let config = SplitConfig {
            output_dir: None,
            ..dry_config()
        };
        let error = Scheduler::new(config)
            .run(parse_module(CALLS_SOURCE))
            .unwrap_err();
        assert!(error.is_missing_output_directory());
    }

    #[test]
    fn single_symbol_restriction() {
        let config = SplitConfig {
            only: Some("b".to_string()),
            ..dry_config()
        };
        let report = Scheduler::new(config)
            .run(parse_module(CALLS_SOURCE))
            .unwrap();
        assert_eq!(roots(&report), vec!["b"]);

        let config = SplitConfig {
            only: Some("nope".to_string()),
            ..dry_config()
        };
        let error = Scheduler::new(config)
            .run(parse_module(CALLS_SOURCE))
            .unwrap_err();
        assert!(error.is_unknown_symbol());
    }

    #[test]
    fn safe_mode_skips_non_viable_functions() {
        let mut module = parse_module(CALLS_SOURCE);
        module.function_mut("a").unwrap().linkage = Linkage::Internal;

        let config = SplitConfig {
            safe: true,
            ..dry_config()
        };
        let report = Scheduler::new(config).run(module).unwrap();
        assert_eq!(roots(&report), vec!["counter", "a"]);
        let warned: Vec<_> = report.warnings.iter().map(|w| w.function.as_str()).collect();
        assert_eq!(warned, vec!["b", "cc"]);
    }

    #[test]
    fn shared_constants_get_their_own_partition() {
        let source = r#"
@.msg = private constant [3 x i8] c"hi\00"

define ptr @greet() {
entry:
  ret ptr @.msg
}
"#;
        let duplicated = Scheduler::new(dry_config())
            .run(parse_module(source))
            .unwrap();
        assert_eq!(roots(&duplicated), vec!["greet"]);

        let config = SplitConfig {
            constant_sharing: ConstantSharing::Shared,
            ..dry_config()
        };
        let shared = Scheduler::new(config).run(parse_module(source)).unwrap();
        assert_eq!(roots(&shared), vec![".msg", "greet"]);
    }

    /// Fails every global partition and records, for every function
    /// partition, whether `@counter` still had its initializer.
    #[derive(Default)]
    struct FailingGlobals {
        seen: Arc<Mutex<Vec<(String, bool)>>>,
    }

    impl Dispatcher for FailingGlobals {
        fn dispatch(
            &self,
            snapshot: &Module,
            _snapshot_path: &Path,
            spec: &PartitionSpec,
        ) -> SplitResult<Dispatched> {
            if spec.kind == SymbolKind::Global {
                return Err(SplitError::ExtractionFailure {
                    symbol: spec.root.clone(),
                    command: format!("false --glob={}", spec.root),
                    status: Some(1),
                });
            }
            let defined = snapshot
                .global("counter")
                .is_some_and(|g| g.has_initializer());
            self.seen.lock().push((spec.root.clone(), defined));
            Ok(Dispatched {
                root: spec.root.clone(),
                kind: spec.kind,
                output: spec.output.clone(),
                command: None,
                written: false,
            })
        }
    }

    #[test]
    fn failed_global_partition_keeps_its_initializer() {
        let dispatcher = FailingGlobals::default();
        let seen = dispatcher.seen.clone();
        let report = Scheduler::with_dispatcher(dry_config(), Box::new(dispatcher))
            .run(parse_module(CALLS_SOURCE))
            .unwrap();

        let failed: Vec<_> = report.failures.iter().map(|f| f.symbol.as_str()).collect();
        assert_eq!(failed, vec!["counter"]);
        assert_eq!(roots(&report), vec!["a", "b", "cc"]);

        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|(_, defined)| *defined));
    }

    #[test]
    fn fixed_worker_count() {
        let config = SplitConfig {
            threads: 2,
            ..dry_config()
        };
        let report = Scheduler::new(config)
            .run(parse_module(CALLS_SOURCE))
            .unwrap();
        assert_eq!(report.partitions.len(), 4);
    }
}
