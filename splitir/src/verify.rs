//! Structural verification of a module.
//!
//! The verifier checks that a module is self-contained: every symbol it
//! references is declared or defined in it, every local operand names a value
//! of the enclosing function, and link attributes are consistent.
use std::collections::BTreeSet;

use log::debug;
use thiserror::Error;

use crate::{
    instructions::Instruction,
    module::Module,
    symbol::{Function, Linkage, Visibility},
    utils::Error,
};

/// A single verification failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyIssue {
    #[error("symbol `@{name}` is defined more than once")]
    DuplicateSymbol { name: String },

    #[error("`@{user}` references `@{name}`, which is not part of the module")]
    UnresolvedSymbol { user: String, name: String },

    #[error("`%{name}` used in `@{function}` is neither an argument nor an instruction result")]
    UnresolvedLocal { function: String, name: String },

    #[error("`%{name}` is defined more than once in `@{function}`")]
    RedefinedLocal { function: String, name: String },

    #[error("`@{function}` branches to unknown block `%{label}`")]
    UnknownLabel { function: String, label: String },

    #[error("declaration `@{name}` has `{}` linkage; declarations must be external", .linkage.to_str())]
    DeclarationLinkage { name: String, linkage: Linkage },

    #[error("`@{name}` has {} linkage but `{}` visibility", .linkage.to_str(), .visibility.to_str())]
    LocalVisibility {
        name: String,
        linkage: Linkage,
        visibility: Visibility,
    },
}

fn verify_function(module: &Module, function: &Function, issues: &mut Vec<VerifyIssue>) {
    let mut locals = BTreeSet::new();
    let defined = function
        .params
        .iter()
        .filter_map(|param| param.name.as_ref())
        .chain(function.instructions().filter_map(|instr| instr.destination()));
    for name in defined {
        if !locals.insert(name.as_str()) {
            issues.push(VerifyIssue::RedefinedLocal {
                function: function.name.clone(),
                name: name.clone(),
            });
        }
    }

    let labels: BTreeSet<&str> = function.blocks.iter().map(|b| b.label.as_str()).collect();

    for operand in function.operands() {
        if let Some(name) = operand.as_local() {
            if !locals.contains(name) {
                issues.push(VerifyIssue::UnresolvedLocal {
                    function: function.name.clone(),
                    name: name.to_string(),
                });
            }
        }

        for symbol in operand.as_const().into_iter().flat_map(|c| c.referenced_symbols()) {
            if !module.contains(symbol) {
                issues.push(VerifyIssue::UnresolvedSymbol {
                    user: function.name.clone(),
                    name: symbol.to_string(),
                });
            }
        }
    }

    let phi_labels = function
        .instructions()
        .filter_map(|instr| instr.try_as_phi_ref())
        .flat_map(|phi| phi.incoming.iter().map(|(_, label)| label));
    let branch_labels = function.terminators().flat_map(|term| term.targets());
    for label in phi_labels.chain(branch_labels) {
        if !labels.contains(label.as_str()) {
            issues.push(VerifyIssue::UnknownLabel {
                function: function.name.clone(),
                label: label.clone(),
            });
        }
    }
}

/// Collect every structural issue of `module`.
pub fn verify_issues(module: &Module) -> Vec<VerifyIssue> {
    let mut issues = Vec::new();

    let mut names = BTreeSet::new();
    for symbol in module.symbols() {
        if !names.insert(symbol.name()) {
            issues.push(VerifyIssue::DuplicateSymbol {
                name: symbol.name().to_string(),
            });
        }

        let value = symbol.as_global_value();
        if value.is_declaration() && value.linkage() != Linkage::External {
            issues.push(VerifyIssue::DeclarationLinkage {
                name: value.name().to_string(),
                linkage: value.linkage(),
            });
        }
        if value.linkage().is_local() && value.visibility() != Visibility::Default {
            issues.push(VerifyIssue::LocalVisibility {
                name: value.name().to_string(),
                linkage: value.linkage(),
                visibility: value.visibility(),
            });
        }
    }

    for global in &module.globals {
        let referenced = global
            .initializer
            .iter()
            .flat_map(|init| init.referenced_symbols());
        for symbol in referenced {
            if !module.contains(symbol) {
                issues.push(VerifyIssue::UnresolvedSymbol {
                    user: global.name.clone(),
                    name: symbol.to_string(),
                });
            }
        }
    }

    for function in module.defined_functions() {
        verify_function(module, function, &mut issues);
    }

    issues
}

/// Verify `module`, failing with every issue found.
pub fn verify(module: &Module) -> Result<(), Error> {
    let issues = verify_issues(module);
    if issues.is_empty() {
        return Ok(());
    }

    debug!("verify: {} issue(s) found", issues.len());
    Err(Error::VerificationFailed {
        module: module.name.clone().unwrap_or_else(|| "<anonymous>".to_string()),
        issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constant::Constant, symbol::GlobalVariable, types::Type};

    #[test]
    fn dangling_symbol_reference_is_reported() {
        let mut module = Module::new("m");
        module
            .add_global(GlobalVariable::new("p", true, Constant::symbol("missing")))
            .unwrap();

        let issues = verify_issues(&module);
        assert_eq!(
            issues,
            vec![VerifyIssue::UnresolvedSymbol {
                user: "p".to_string(),
                name: "missing".to_string(),
            }]
        );
        assert!(verify(&module).unwrap_err().is_verification_failed());
    }

    #[test]
    fn local_linkage_requires_default_visibility() {
        let mut module = Module::new("m");
        let mut global = GlobalVariable::new("g", false, Constant::int(Type::I32, 0));
        global.linkage = Linkage::Internal;
        global.visibility = Visibility::Hidden;
        module.add_global(global).unwrap();

        assert!(matches!(
            verify_issues(&module).as_slice(),
            [VerifyIssue::LocalVisibility { .. }]
        ));
    }
}
