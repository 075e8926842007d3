//! Staged rewriting of link attributes.
//!
//! Every symbol moves through [`LinkState::Original`] ->
//! [`LinkState::Externalized`] and, for globals owned by their own
//! partition, on to [`LinkState::DeclarationOnly`] once that partition has
//! been cut. Transitions are only ever forward.
use std::collections::BTreeMap;

use log::{debug, trace};
use splitir::{
    module::Module,
    symbol::{GlobalValue, GlobalVariable, Linkage, Visibility},
};

use crate::{
    config::ConstantSharing,
    utils::error::{SplitError, SplitResult},
};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum LinkState {
    Original,
    Externalized,
    DeclarationOnly,
}

pub struct LinkageNormalizer {
    sharing: ConstantSharing,
    states: BTreeMap<String, LinkState>,
    original: BTreeMap<String, Linkage>,
}

impl LinkageNormalizer {
    /// Track every symbol of `module`, all in the original state.
    pub fn new(module: &Module, sharing: ConstantSharing) -> Self {
        let mut states = BTreeMap::new();
        let mut original = BTreeMap::new();
        for symbol in module.symbols() {
            let value = symbol.as_global_value();
            states.insert(value.name().to_string(), LinkState::Original);
            original.insert(value.name().to_string(), value.linkage());
        }
        Self {
            sharing,
            states,
            original,
        }
    }

    pub fn state(&self, name: &str) -> Option<LinkState> {
        self.states.get(name).copied()
    }

    /// Linkage the symbol had before any rewriting.
    pub fn original_linkage(&self, name: &str) -> Option<Linkage> {
        self.original.get(name).copied()
    }

    /// A constant that may be copied into every partition reading it: a
    /// constant that was module-local to begin with, under the duplicate
    /// policy. Exported constants would collide at link time if copied.
    pub fn is_duplicated(&self, global: &GlobalVariable) -> bool {
        global.is_constant
            && self.sharing == ConstantSharing::Duplicate
            && self
                .original_linkage(&global.name)
                .unwrap_or(global.linkage)
                .is_local()
    }

    /// A global that lives in a single partition and is referenced
    /// externally from every other one. Under `ConstantSharing::Duplicate`
    /// this still holds for constants that were exported in the input: they
    /// get their own partition and their initializer is stripped from the
    /// snapshot like any mutable global.
    pub fn is_shared(&self, global: &GlobalVariable) -> bool {
        !self.is_duplicated(global)
    }

    /// Make every symbol resolvable from outside its original module.
    ///
    /// Defined functions and shared globals get external linkage; duplicated
    /// constants keep their module-local linkage. All of them get default
    /// visibility and lose the resolves-locally flag. Symbols already past
    /// the original state are left alone, so calling this twice is the same
    /// as calling it once.
    pub fn externalize(&mut self, module: &mut Module) {
        let mut changed = 0usize;

        for global in &mut module.globals {
            if self.state(&global.name) != Some(LinkState::Original) {
                continue;
            }
            if !self.is_duplicated(global) {
                global.set_linkage(Linkage::External);
            }
            global.set_visibility(Visibility::Default);
            global.set_dso_local(false);
            self.states
                .insert(global.name.clone(), LinkState::Externalized);
            changed += 1;
        }

        for function in module.defined_functions_mut() {
            if self.state(&function.name) != Some(LinkState::Original) {
                continue;
            }
            function.set_linkage(Linkage::External);
            function.set_visibility(Visibility::Default);
            function.set_dso_local(false);
            self.states
                .insert(function.name.clone(), LinkState::Externalized);
            changed += 1;
        }

        debug!("linkage: externalized {} symbol(s)", changed);
    }

    /// Drop the initializer of the shared global `name`, leaving an external
    /// declaration. Only legal once the global is externalized.
    pub fn strip_initializer(&mut self, module: &mut Module, name: &str) -> SplitResult<()> {
        let from = self
            .state(name)
            .ok_or_else(|| SplitError::UnknownSymbol(name.to_string()))?;
        let illegal = || SplitError::IllegalTransition {
            symbol: name.to_string(),
            from,
            to: LinkState::DeclarationOnly,
        };
        if from != LinkState::Externalized {
            return Err(illegal());
        }

        let shared = match module.global(name) {
            Some(global) => self.is_shared(global),
            None => return Err(SplitError::UnknownSymbol(name.to_string())),
        };
        if !shared {
            return Err(illegal());
        }

        if let Some(global) = module.global_mut(name) {
            global.initializer = None;
            global.linkage = Linkage::External;
        }
        self.states
            .insert(name.to_string(), LinkState::DeclarationOnly);
        trace!("linkage: @{} is now declaration-only", name);
        Ok(())
    }
}
