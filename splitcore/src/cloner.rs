//! In-process partition construction.
//!
//! The cloner builds a new module out of a source module according to a
//! per-symbol [`Classification`], without going through the extraction
//! program. Every operand of every copied body and initializer is rewritten
//! through a correspondence map from source names to names in the new
//! module; a reference that has no counterpart is left dangling and makes
//! verification fail, so nothing links back to the source module silently.
use std::collections::{BTreeMap, BTreeSet};

use log::{debug, trace};
use splitir::{
    constant::Constant,
    instructions::Instruction,
    module::{Module, SymbolRef},
    operand::Operand,
    symbol::{Function, GlobalValue, GlobalVariable, Linkage, SymbolKind, Visibility},
    verify::verify_issues,
};
use strum::EnumIs;

use crate::{
    partition::PartitionSpec,
    utils::error::{SplitError, SplitResult},
};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIs)]
pub enum Classification {
    /// Full copy with the original link attributes.
    Public,
    /// Full copy, then external linkage with hidden visibility: true
    /// module-private linkage cannot survive a split.
    Private,
    /// Declaration only.
    ReferenceOnly,
    /// Not present in the new module.
    Skip,
}

pub struct ModuleCloner<'m> {
    source: &'m Module,
    classes: BTreeMap<String, Classification>,
    renames: BTreeMap<String, String>,
}

impl<'m> ModuleCloner<'m> {
    pub fn new(source: &'m Module) -> Self {
        Self {
            source,
            classes: BTreeMap::new(),
            renames: BTreeMap::new(),
        }
    }

    pub fn classify(mut self, name: impl Into<String>, class: Classification) -> Self {
        self.classes.insert(name.into(), class);
        self
    }

    /// Give `from` a different name in the new module.
    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.insert(from.into(), to.into());
        self
    }

    /// Classification of one partition: kept definitions are public, every
    /// symbol they reference is reference-only, everything else is skipped.
    pub fn for_partition(source: &'m Module, spec: &PartitionSpec) -> Self {
        let mut referenced: BTreeSet<&str> = BTreeSet::new();
        for global in source.globals.iter().filter(|g| spec.globals.contains(&g.name)) {
            referenced.extend(global.initializer.iter().flat_map(Constant::referenced_symbols));
        }
        for function in source
            .functions
            .iter()
            .filter(|f| spec.functions.contains(&f.name))
        {
            referenced.extend(
                function
                    .operands()
                    .filter_map(Operand::as_const)
                    .flat_map(Constant::referenced_symbols),
            );
        }

        let mut cloner = Self::new(source);
        for symbol in source.symbols() {
            let name = symbol.name();
            let class = if spec.functions.contains(name) || spec.globals.contains(name) {
                Classification::Public
            } else if referenced.contains(name) {
                Classification::ReferenceOnly
            } else {
                Classification::Skip
            };
            cloner.classes.insert(name.to_string(), class);
        }
        cloner
    }

    /// Functions absent from the map are skipped; globals absent from the
    /// map are copied in full.
    pub fn classification(&self, symbol: SymbolRef<'_>) -> Classification {
        match self.classes.get(symbol.name()) {
            Some(class) => *class,
            None => match symbol.kind() {
                SymbolKind::Function => Classification::Skip,
                SymbolKind::Global => Classification::Public,
            },
        }
    }

    fn target_name(&self, name: &str) -> String {
        self.renames
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    fn hide(value: &mut dyn GlobalValue) {
        value.set_linkage(Linkage::External);
        value.set_visibility(Visibility::Hidden);
        value.set_dso_local(false);
    }

    fn clone_global(&self, global: &GlobalVariable, class: Classification) -> Option<GlobalVariable> {
        let mut copy = match class {
            Classification::Skip => return None,
            Classification::ReferenceOnly => GlobalVariable {
                visibility: global.visibility,
                externally_initialized: global.externally_initialized,
                source: global.source.clone(),
                ..GlobalVariable::declaration(
                    global.name.clone(),
                    global.is_constant,
                    global.ty.clone(),
                )
            },
            Classification::Public | Classification::Private => global.clone(),
        };
        if class.is_private() {
            Self::hide(&mut copy);
        }
        copy.name = self.target_name(&global.name);
        Some(copy)
    }

    fn clone_function(&self, function: &Function, class: Classification) -> Option<Function> {
        let mut copy = match class {
            Classification::Skip => return None,
            Classification::ReferenceOnly => function.to_declaration(),
            Classification::Public | Classification::Private => function.clone(),
        };
        if class.is_private() {
            Self::hide(&mut copy);
        }
        copy.name = self.target_name(&function.name);
        Some(copy)
    }

    /// Build the new module. The result is not verified.
    pub fn clone_module(&self) -> Module {
        let mut out = self.source.empty_like();
        let mut mapping: BTreeMap<String, String> = BTreeMap::new();

        for global in &self.source.globals {
            let class = self.classification(SymbolRef::Global(global));
            if let Some(copy) = self.clone_global(global, class) {
                trace!("cloner: @{} as {:?}", global.name, class);
                mapping.insert(global.name.clone(), copy.name.clone());
                out.globals.push(copy);
            }
        }
        for function in &self.source.functions {
            let class = self.classification(SymbolRef::Function(function));
            if let Some(copy) = self.clone_function(function, class) {
                trace!("cloner: @{} as {:?}", function.name, class);
                mapping.insert(function.name.clone(), copy.name.clone());
                out.functions.push(copy);
            }
        }

        let remap = |name: &str| mapping.get(name).cloned();
        for initializer in out.globals.iter_mut().filter_map(|g| g.initializer.as_mut()) {
            initializer.remap_symbols(&remap);
        }
        for block in out.functions.iter_mut().flat_map(|f| f.blocks.iter_mut()) {
            let operands = block
                .instructions
                .iter_mut()
                .flat_map(|instr| instr.operands_mut())
                .chain(block.terminator.operands_mut());
            for operand in operands {
                if let Operand::Const(constant) = operand {
                    constant.remap_symbols(&remap);
                }
            }
        }

        debug!(
            "cloner: built module with {} global(s) and {} function(s)",
            out.globals.len(),
            out.functions.len()
        );
        out
    }

    /// Build the new module and verify it; a module that fails verification
    /// is never returned. `symbol` names the partition in diagnostics.
    pub fn clone_verified(&self, symbol: &str) -> SplitResult<Module> {
        let module = self.clone_module();
        let issues = verify_issues(&module);
        if !issues.is_empty() {
            return Err(SplitError::VerificationError {
                symbol: symbol.to_string(),
                issues,
            });
        }
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use splitir::verify::VerifyIssue;

    use super::*;
    use crate::tests_utils::{CALLS_SOURCE, parse_module};

    #[test]
    fn private_and_public_functions_round_trip() {
        let source = parse_module(CALLS_SOURCE);

        let lib = ModuleCloner::new(&source)
            .classify("a", Classification::Private)
            .classify("b", Classification::Public)
            .classify("counter", Classification::Private)
            .clone_verified("lib")
            .unwrap();
        let a = lib.function("a").unwrap();
        assert!(!a.is_declaration());
        assert_eq!(
            (a.linkage, a.visibility),
            (Linkage::External, Visibility::Hidden)
        );
        assert_eq!(lib.function("b").unwrap(), source.function("b").unwrap());
        assert!(lib.function("cc").is_none());
        let counter = lib.global("counter").unwrap();
        assert!(counter.has_initializer());
        assert_eq!(counter.linkage, Linkage::External);

        let main = ModuleCloner::new(&source)
            .classify("cc", Classification::Public)
            .classify("a", Classification::ReferenceOnly)
            .classify("counter", Classification::ReferenceOnly)
            .clone_verified("main")
            .unwrap();
        assert!(main.function("a").unwrap().is_declaration());
        assert!(main.global("counter").unwrap().is_declaration());

        for declared in main.symbols().filter(|s| s.as_global_value().is_declaration()) {
            let definition = lib.symbol(declared.name()).unwrap();
            assert!(!definition.as_global_value().is_declaration());
        }
    }

    #[test]
    fn skipped_callee_fails_verification() {
        let source = parse_module(CALLS_SOURCE);
        let error = ModuleCloner::new(&source)
            .classify("b", Classification::Public)
            .clone_verified("b")
            .unwrap_err();

        let SplitError::VerificationError { symbol, issues } = error else {
            panic!("expected a verification error");
        };
        assert_eq!(symbol, "b");
        assert_eq!(
            issues,
            vec![VerifyIssue::UnresolvedSymbol {
                user: "b".to_string(),
                name: "a".to_string(),
            }]
        );
    }

    #[test]
    fn renamed_symbols_are_rewritten_everywhere() {
        let source = parse_module(CALLS_SOURCE);
        let module = ModuleCloner::new(&source)
            .classify("a", Classification::Public)
            .classify("cc", Classification::Public)
            .rename("counter", "cc.counter")
            .clone_verified("cc")
            .unwrap();

        assert!(module.global("counter").is_none());
        let cc = module.function("cc").unwrap();
        let referenced: Vec<_> = cc
            .operands()
            .filter_map(Operand::as_const)
            .flat_map(Constant::referenced_symbols)
            .collect();
        assert_eq!(referenced, vec!["cc.counter", "a", "cc.counter"]);
    }

    #[test]
    fn partition_classification_declares_what_it_references() {
        let source = parse_module(CALLS_SOURCE);
        let spec = PartitionSpec::function("cc", Vec::new(), PathBuf::from("_cc.ir"));
        let cloner = ModuleCloner::for_partition(&source, &spec);

        let module = cloner.clone_verified("cc").unwrap();
        assert!(!module.function("cc").unwrap().is_declaration());
        assert!(module.function("a").unwrap().is_declaration());
        assert!(module.function("b").is_none());
        assert!(module.global("counter").unwrap().is_declaration());
    }
}
