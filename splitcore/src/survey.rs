//! Survey of extraction candidates across several modules.
//!
//! The survey reads a list of module files, collects the functions defined
//! in one of them and declared in none, and checks each for viability. For
//! every candidate it builds the extraction request that would move it out
//! together with its callers.
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use log::{debug, error, info};
use splitir::{
    module::Module,
    symbol::{GlobalValue, Linkage, Visibility},
};

use crate::{
    callgraph::{CallGraph, Viability, check_viability},
    config::SplitConfig,
    partition::ExtractRequest,
    resolver::DependencyResolver,
    utils::error::{SplitError, SplitResult},
};

/// A function with its link attributes, as printed by the survey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolSummary {
    pub name: String,
    pub visibility: Visibility,
    pub linkage: Linkage,
}

impl SymbolSummary {
    fn of(value: &dyn GlobalValue) -> Self {
        Self {
            name: value.name().to_string(),
            visibility: value.visibility(),
            linkage: value.linkage(),
        }
    }
}

impl std::fmt::Display for SymbolSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: ({}) ({})",
            self.name,
            self.visibility.to_str(),
            self.linkage.to_str()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyEntry {
    pub module: PathBuf,
    pub function: SymbolSummary,
    pub viability: Viability,
    pub callees: Vec<SymbolSummary>,
    pub callers: Vec<SymbolSummary>,
    /// Extracts the function together with its callers.
    pub request: ExtractRequest,
}

#[derive(Debug, Default)]
pub struct SurveyReport {
    pub entries: Vec<SurveyEntry>,
    /// Files that could not be loaded.
    pub skipped: Vec<(PathBuf, SplitError)>,
}

impl SurveyReport {
    /// Entries that can be extracted safely.
    pub fn viable(&self) -> impl Iterator<Item = &SurveyEntry> {
        self.entries.iter().filter(|e| e.viability.is_viable())
    }
}

/// Read the list file at `list` (one module path per line) and survey the
/// modules it names. A module that fails to load is reported and skipped.
pub fn survey_list(list: &Path, config: &SplitConfig) -> SplitResult<SurveyReport> {
    let content = std::fs::read_to_string(list).map_err(|source| SplitError::IoError {
        path: list.to_path_buf(),
        source,
    })?;

    let mut modules = Vec::new();
    let mut skipped = Vec::new();
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let path = PathBuf::from(line);
        match splitir::store::load(&path) {
            Ok(module) => modules.push((path, module)),
            Err(e) => {
                error!("survey: skipping {}: {}", path.display(), e);
                skipped.push((path, SplitError::from(e)));
            }
        }
    }

    let mut report = survey_modules(&modules, config);
    report.skipped = skipped;
    Ok(report)
}

/// Survey already loaded modules. Module-local functions are only listed
/// when `config.safe` asks for the viability analysis.
pub fn survey_modules(modules: &[(PathBuf, Module)], config: &SplitConfig) -> SurveyReport {
    let mut candidates: BTreeMap<&str, usize> = BTreeMap::new();
    for (index, (_, module)) in modules.iter().enumerate() {
        for function in module.defined_functions() {
            candidates.insert(&function.name, index);
        }
    }
    for (_, module) in modules {
        for function in module.functions.iter().filter(|f| f.is_declaration()) {
            if candidates.remove(function.name.as_str()).is_some() {
                debug!("survey: @{} is declared elsewhere", function.name);
            }
        }
    }

    let graphs: Vec<CallGraph> = modules.iter().map(|(_, m)| CallGraph::build(m)).collect();
    let program = config.extractor_program();

    let mut entries = Vec::new();
    for (name, index) in candidates {
        if !config.selects(name) {
            continue;
        }
        let (path, module) = &modules[index];
        let graph = &graphs[index];
        let Some(function) = module.function(name) else {
            continue;
        };
        if function.linkage.is_local() && !config.safe {
            debug!("survey: @{} is module-local", name);
            continue;
        }

        let summarize = |names: Vec<&str>| {
            names
                .into_iter()
                .filter_map(|n| module.function(n))
                .map(|f| SymbolSummary::of(f))
                .collect::<Vec<_>>()
        };
        let callees = summarize(graph.callees(name));
        let callers = summarize(graph.callers(name));

        let mut functions = vec![name.to_string()];
        functions.extend(
            callers
                .iter()
                .filter(|c| c.name != name)
                .map(|c| c.name.clone()),
        );

        let mut globals: Vec<String> = Vec::new();
        if config.only.as_deref() == Some(name) {
            let resolver = DependencyResolver::new(module);
            for caller in callers.iter().filter_map(|c| module.function(&c.name)) {
                for constant in resolver.resolve_function(caller).constants {
                    if !globals.contains(&constant) {
                        globals.push(constant);
                    }
                }
            }
        }

        let output = config.partition_path(
            config.output_dir.as_deref().unwrap_or(Path::new(".")),
            name,
        );
        entries.push(SurveyEntry {
            module: path.clone(),
            function: SymbolSummary::of(function),
            viability: check_viability(module, graph, name),
            callees,
            callers,
            request: ExtractRequest {
                program: program.clone(),
                snapshot: path.clone(),
                functions,
                globals,
                output,
            },
        });
    }

    info!(
        "survey: {} candidate(s), {} viable",
        entries.len(),
        entries.iter().filter(|e| e.viability.is_viable()).count()
    );
    SurveyReport {
        entries,
        skipped: Vec::new(),
    }
}
