//! Partition specifications and extraction requests.
use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter},
    path::PathBuf,
    process::Command,
};

use splitir::{extract::ExtractSelection, symbol::SymbolKind};

/// One partition: a root symbol, the definitions that travel with it and
/// the file it is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSpec {
    pub root: String,
    pub kind: SymbolKind,
    /// Functions whose bodies are kept.
    pub functions: BTreeSet<String>,
    /// Globals whose initializers are kept.
    pub globals: BTreeSet<String>,
    pub output: PathBuf,
}

impl PartitionSpec {
    /// A function partition: the function itself and the duplicated
    /// constants of its closure.
    pub fn function(
        root: impl Into<String>,
        constants: impl IntoIterator<Item = String>,
        output: PathBuf,
    ) -> Self {
        let root = root.into();
        Self {
            functions: BTreeSet::from([root.clone()]),
            globals: constants.into_iter().collect(),
            root,
            kind: SymbolKind::Function,
            output,
        }
    }

    /// A global partition: the global and the duplicated constants its
    /// initializer needs.
    pub fn global(
        root: impl Into<String>,
        constants: impl IntoIterator<Item = String>,
        output: PathBuf,
    ) -> Self {
        let root = root.into();
        let mut globals: BTreeSet<String> = constants.into_iter().collect();
        globals.insert(root.clone());
        Self {
            functions: BTreeSet::new(),
            globals,
            root,
            kind: SymbolKind::Global,
            output,
        }
    }

    /// Every kept definition other than the root.
    pub fn companions(&self) -> impl Iterator<Item = &String> {
        self.functions
            .iter()
            .chain(self.globals.iter())
            .filter(move |name| **name != self.root)
    }

    pub fn selection(&self) -> ExtractSelection {
        ExtractSelection {
            functions: self.functions.clone(),
            globals: self.globals.clone(),
        }
    }
}

/// Invocation of the extraction program:
/// `<program> <snapshot> [--func=<name>]* [--glob=<name>]* -o <output>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    pub program: String,
    pub snapshot: PathBuf,
    pub functions: Vec<String>,
    pub globals: Vec<String>,
    pub output: PathBuf,
}

impl ExtractRequest {
    pub fn new(program: impl Into<String>, snapshot: impl Into<PathBuf>, spec: &PartitionSpec) -> Self {
        Self {
            program: program.into(),
            snapshot: snapshot.into(),
            functions: spec.functions.iter().cloned().collect(),
            globals: spec.globals.iter().cloned().collect(),
            output: spec.output.clone(),
        }
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = vec![self.snapshot.display().to_string()];
        args.extend(self.functions.iter().map(|name| format!("--func={name}")));
        args.extend(self.globals.iter().map(|name| format!("--glob={name}")));
        args.push("-o".to_string());
        args.push(self.output.display().to_string());
        args
    }

    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.args());
        command
    }
}

impl Display for ExtractRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in self.args() {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_partition_command_line() {
        let spec = PartitionSpec::function(
            "lookup",
            [".name".to_string(), "names".to_string()],
            PathBuf::from("out/_lookup.ir"),
        );
        assert_eq!(spec.companions().collect::<Vec<_>>(), vec![".name", "names"]);

        let request = ExtractRequest::new("irextract", "out/_snapshot.ir", &spec);
        assert_eq!(
            request.to_string(),
            "irextract out/_snapshot.ir --func=lookup --glob=.name --glob=names -o out/_lookup.ir"
        );
        assert_eq!(request.to_command().get_args().count(), 6);
    }

    #[test]
    fn global_partition_keeps_its_root() {
        let spec = PartitionSpec::global("counter", Vec::new(), PathBuf::from("_counter.ir"));
        assert!(spec.functions.is_empty());
        assert!(spec.selection().contains("counter"));
        assert_eq!(spec.companions().count(), 0);
    }
}
