//! The module: the compilation unit boundary for symbol visibility.
use log::trace;

use crate::{
    symbol::{Function, GlobalValue, GlobalVariable, SymbolKind},
    utils::Error,
};

/// A reference to any global symbol of a module.
#[derive(Debug, Clone, Copy)]
pub enum SymbolRef<'a> {
    Function(&'a Function),
    Global(&'a GlobalVariable),
}

impl<'a> SymbolRef<'a> {
    pub fn as_global_value(&self) -> &'a dyn GlobalValue {
        match self {
            SymbolRef::Function(function) => *function as &'a dyn GlobalValue,
            SymbolRef::Global(global) => *global as &'a dyn GlobalValue,
        }
    }

    pub fn name(&self) -> &'a str {
        self.as_global_value().name()
    }

    pub fn kind(&self) -> SymbolKind {
        self.as_global_value().kind()
    }
}

/// A module containing global variables and functions, both defined and
/// declared, plus the metadata needed to re-emit it faithfully.
///
/// Symbols are kept in declaration order; names are unique across both lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    /// `source_filename`
    pub name: Option<String>,
    /// Target data layout descriptor.
    pub data_layout: Option<String>,
    pub target_triple: Option<String>,
    /// Module-level inline assembly, one line per entry.
    pub inline_asm: Vec<String>,
    pub globals: Vec<GlobalVariable>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Copy layout, triple and inline assembly into an otherwise empty module.
    pub fn empty_like(&self) -> Self {
        Self {
            name: self.name.clone(),
            data_layout: self.data_layout.clone(),
            target_triple: self.target_triple.clone(),
            inline_asm: self.inline_asm.clone(),
            globals: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    pub fn global(&self, name: &str) -> Option<&GlobalVariable> {
        self.globals.iter().find(|g| g.name == name)
    }

    pub fn global_mut(&mut self, name: &str) -> Option<&mut GlobalVariable> {
        self.globals.iter_mut().find(|g| g.name == name)
    }

    pub fn symbol(&self, name: &str) -> Option<SymbolRef<'_>> {
        self.global(name)
            .map(SymbolRef::Global)
            .or_else(|| self.function(name).map(SymbolRef::Function))
    }

    pub fn symbol_mut(&mut self, name: &str) -> Option<&mut dyn GlobalValue> {
        if let Some(index) = self.globals.iter().position(|g| g.name == name) {
            return Some(&mut self.globals[index] as &mut dyn GlobalValue);
        }
        self.function_mut(name).map(|f| f as &mut dyn GlobalValue)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbol(name).is_some()
    }

    /// All symbols, globals first, each list in declaration order.
    pub fn symbols(&self) -> impl Iterator<Item = SymbolRef<'_>> {
        self.globals
            .iter()
            .map(SymbolRef::Global)
            .chain(self.functions.iter().map(SymbolRef::Function))
    }

    /// Functions with a body, in declaration order.
    pub fn defined_functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(|f| !f.is_declaration())
    }

    pub fn defined_functions_mut(&mut self) -> impl Iterator<Item = &mut Function> {
        self.functions.iter_mut().filter(|f| !f.is_declaration())
    }

    /// Global variables with an initializer, in declaration order.
    pub fn defined_globals(&self) -> impl Iterator<Item = &GlobalVariable> {
        self.globals.iter().filter(|g| !g.is_declaration())
    }

    pub fn add_global(&mut self, global: GlobalVariable) -> Result<(), Error> {
        if self.contains(&global.name) {
            return Err(Error::DuplicateSymbol { name: global.name });
        }
        trace!("module: adding global @{}", global.name);
        self.globals.push(global);
        Ok(())
    }

    pub fn add_function(&mut self, function: Function) -> Result<(), Error> {
        if self.contains(&function.name) {
            return Err(Error::DuplicateSymbol {
                name: function.name,
            });
        }
        trace!("module: adding function @{}", function.name);
        self.functions.push(function);
        Ok(())
    }
}
