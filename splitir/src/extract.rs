//! Named-symbol extraction.
//!
//! Extraction keeps the definitions of the selected symbols and turns every
//! other symbol they reference into an external declaration. Everything else
//! is dropped. This is how a partition file is materialized from a snapshot.
use std::collections::BTreeSet;

use log::{debug, trace};

use crate::{
    module::Module,
    symbol::{GlobalVariable, Linkage, SymbolKind},
    utils::Error,
};

/// Symbols whose definitions are kept by [`extract`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSelection {
    pub functions: BTreeSet<String>,
    pub globals: BTreeSet<String>,
}

impl ExtractSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_function(mut self, name: impl Into<String>) -> Self {
        self.functions.insert(name.into());
        self
    }

    pub fn with_global(mut self, name: impl Into<String>) -> Self {
        self.globals.insert(name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.globals.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains(name) || self.globals.contains(name)
    }
}

fn check_selected(module: &Module, name: &str, expected: SymbolKind) -> Result<(), Error> {
    match module.symbol(name) {
        Some(symbol) if symbol.kind() == expected => Ok(()),
        _ => Err(Error::UnknownSymbol {
            name: name.to_string(),
            expected: expected.to_string(),
        }),
    }
}

/// Materialize the closure of `selection` out of `module`.
///
/// Module metadata is carried over. Selected symbols keep their link
/// attributes; referenced companions become external declarations with their
/// original visibility.
pub fn extract(module: &Module, selection: &ExtractSelection) -> Result<Module, Error> {
    for name in &selection.functions {
        check_selected(module, name, SymbolKind::Function)?;
    }
    for name in &selection.globals {
        check_selected(module, name, SymbolKind::Global)?;
    }

    let mut referenced: BTreeSet<&str> = BTreeSet::new();
    for global in module.globals.iter().filter(|g| selection.globals.contains(&g.name)) {
        if let Some(initializer) = &global.initializer {
            referenced.extend(initializer.referenced_symbols());
        }
    }
    for function in module
        .functions
        .iter()
        .filter(|f| selection.functions.contains(&f.name))
    {
        referenced.extend(
            function
                .operands()
                .filter_map(|operand| operand.as_const())
                .flat_map(|constant| constant.referenced_symbols()),
        );
    }

    let mut out = module.empty_like();

    for global in &module.globals {
        if selection.globals.contains(&global.name) {
            out.globals.push(global.clone());
        } else if referenced.contains(global.name.as_str()) {
            trace!("extract: declaring global @{}", global.name);
            out.globals.push(GlobalVariable {
                linkage: Linkage::External,
                visibility: global.visibility,
                externally_initialized: global.externally_initialized,
                source: global.source.clone(),
                ..GlobalVariable::declaration(global.name.clone(), global.is_constant, global.ty.clone())
            });
        }
    }

    for function in &module.functions {
        if selection.functions.contains(&function.name) {
            out.functions.push(function.clone());
        } else if referenced.contains(function.name.as_str()) {
            trace!("extract: declaring function @{}", function.name);
            out.functions.push(function.to_declaration());
        }
    }

    debug!(
        "extract: kept {} definition(s), {} symbol(s) in total",
        selection.functions.len() + selection.globals.len(),
        out.globals.len() + out.functions.len()
    );
    Ok(out)
}
