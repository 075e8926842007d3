//! Call graph and extraction viability.
//!
//! A function is *viable* when it can be moved into its own partition
//! without breaking the visibility assumptions of its callers and callees:
//! it only calls externally visible functions, it is only ever used as the
//! callee of direct calls, and none of those calls comes from a module-local
//! function. Viability is advisory; it filters the safe mode and the survey
//! but never stops a split.
use std::collections::BTreeMap;

use log::trace;
use petgraph::{
    Direction,
    graph::{DiGraph, NodeIndex},
};
use splitir::{
    instructions::{Instr, Instruction},
    module::Module,
    operand::Operand,
    symbol::{Function, GlobalValue, Linkage},
};
use strum::EnumIs;
use thiserror::Error;

/// Direct call edges between the functions of a module, keyed by name.
#[derive(Debug, Clone)]
pub struct CallGraph {
    graph: DiGraph<String, ()>,
    nodes: BTreeMap<String, NodeIndex>,
}

impl CallGraph {
    /// Build the graph once for `module`. Declarations are nodes without
    /// outgoing edges; indirect calls add no edge.
    pub fn build(module: &Module) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = BTreeMap::new();
        for function in &module.functions {
            nodes.insert(function.name.clone(), graph.add_node(function.name.clone()));
        }

        for caller in module.defined_functions() {
            let from = nodes[&caller.name];
            let callees = caller
                .instructions()
                .filter_map(|instr| instr.try_as_call_ref())
                .filter_map(|call| call.direct_callee());
            for callee in callees {
                if let Some(&to) = nodes.get(callee) {
                    graph.update_edge(from, to, ());
                }
            }
        }

        Self { graph, nodes }
    }

    fn neighbors(&self, function: &str, direction: Direction) -> Vec<&str> {
        let Some(&node) = self.nodes.get(function) else {
            return Vec::new();
        };
        let mut out: Vec<&str> = self
            .graph
            .neighbors_directed(node, direction)
            .map(|n| self.graph[n].as_str())
            .collect();
        out.sort_unstable();
        out
    }

    /// Functions `function` calls directly, sorted by name.
    pub fn callees(&self, function: &str) -> Vec<&str> {
        self.neighbors(function, Direction::Outgoing)
    }

    /// Functions calling `function` directly, sorted by name.
    pub fn callers(&self, function: &str) -> Vec<&str> {
        self.neighbors(function, Direction::Incoming)
    }
}

/// One use of a function symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Use<'m> {
    /// The function is the callee of a direct call in `caller`.
    DirectCall { caller: &'m str },
    /// A bare operand of an instruction or terminator of `function` other
    /// than a callee position: an argument, a stored value, a cast input...
    Operand { function: &'m str, opcode: String },
    /// Nested inside a constant expression or aggregate used by `function`.
    NestedConstant { function: &'m str },
    /// The initializer of `global` is the function's address.
    GlobalInitializer { global: &'m str },
    /// Nested inside the initializer of `global`.
    NestedInitializer { global: &'m str },
}

fn uses_in_operand<'m>(
    name: &str,
    function: &'m Function,
    opcode: &str,
    operand: &Operand,
    out: &mut Vec<Use<'m>>,
) {
    let Some(constant) = operand.as_const() else {
        return;
    };
    if constant.as_symbol() == Some(name) {
        out.push(Use::Operand {
            function: &function.name,
            opcode: opcode.to_string(),
        });
    } else if constant.referenced_symbols().contains(&name) {
        out.push(Use::NestedConstant {
            function: &function.name,
        });
    }
}

fn uses_in_instruction<'m>(
    name: &str,
    function: &'m Function,
    instr: &Instr,
    out: &mut Vec<Use<'m>>,
) {
    let opcode = match instr {
        Instr::Binary(binary) => binary.op.opname(),
        Instr::Cast(cast) => cast.op.opname(),
        other => other.op().opname(),
    };

    match instr {
        Instr::Call(call) => {
            if call.direct_callee() == Some(name) {
                out.push(Use::DirectCall {
                    caller: &function.name,
                });
            } else {
                uses_in_operand(name, function, opcode, &call.callee, out);
            }
            for arg in &call.args {
                uses_in_operand(name, function, opcode, arg, out);
            }
        }
        other => {
            for operand in other.operands() {
                uses_in_operand(name, function, opcode, operand, out);
            }
        }
    }
}

/// Every use of the function `name` in `module`, in declaration order.
pub fn uses_of<'m>(module: &'m Module, name: &str) -> Vec<Use<'m>> {
    let mut out = Vec::new();

    for global in &module.globals {
        let Some(initializer) = &global.initializer else {
            continue;
        };
        if initializer.as_symbol() == Some(name) {
            out.push(Use::GlobalInitializer {
                global: &global.name,
            });
        } else if initializer.referenced_symbols().contains(&name) {
            out.push(Use::NestedInitializer {
                global: &global.name,
            });
        }
    }

    for function in module.defined_functions() {
        for instr in function.instructions() {
            uses_in_instruction(name, function, instr, &mut out);
        }
        for terminator in function.terminators() {
            for operand in terminator.operands() {
                uses_in_operand(name, function, "ret", operand, &mut out);
            }
        }
    }

    out
}

/// One reason a function is not viable.
#[derive(Debug, Clone, PartialEq, Eq, Error, EnumIs)]
pub enum ViabilityIssue {
    #[error("calls `@{callee}`, which has {} linkage", .linkage.to_str())]
    LocalCallee { callee: String, linkage: Linkage },

    #[error("address taken by `{opcode}` in `@{function}`")]
    AddressTaken { function: String, opcode: String },

    #[error("called from `@{caller}`, which has {} linkage", .linkage.to_str())]
    LocalCaller { caller: String, linkage: Linkage },

    #[error("referenced from a constant expression in `@{user}`")]
    ConstantUse { user: String },

    #[error("referenced by the initializer of `@{global}`")]
    GlobalUse { global: String },
}

/// Outcome of [`check_viability`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viability {
    pub function: String,
    pub issues: Vec<ViabilityIssue>,
}

impl Viability {
    pub fn is_viable(&self) -> bool {
        self.issues.is_empty()
    }
}

impl std::fmt::Display for Viability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_viable() {
            return write!(f, "`@{}` is viable", self.function);
        }
        write!(f, "`@{}` is not viable: ", self.function)?;
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", issue)?;
        }
        Ok(())
    }
}

/// Evaluate whether `function` can be extracted on its own.
///
/// Private and internal linkage are both treated as module-local: neither
/// can be referenced from another partition once the function moves out.
pub fn check_viability(module: &Module, graph: &CallGraph, function: &str) -> Viability {
    let mut issues = Vec::new();
    let linkage_of = |name: &str| module.function(name).map(|f| f.linkage());

    for callee in graph.callees(function) {
        if let Some(linkage) = linkage_of(callee).filter(Linkage::is_local) {
            issues.push(ViabilityIssue::LocalCallee {
                callee: callee.to_string(),
                linkage,
            });
        }
    }

    for used in uses_of(module, function) {
        let issue = match used {
            Use::DirectCall { caller } => match linkage_of(caller).filter(Linkage::is_local) {
                Some(linkage) => ViabilityIssue::LocalCaller {
                    caller: caller.to_string(),
                    linkage,
                },
                None => continue,
            },
            Use::Operand { function, opcode } => ViabilityIssue::AddressTaken {
                function: function.to_string(),
                opcode,
            },
            Use::NestedConstant { function: user } | Use::NestedInitializer { global: user } => {
                ViabilityIssue::ConstantUse {
                    user: user.to_string(),
                }
            }
            Use::GlobalInitializer { global } => ViabilityIssue::GlobalUse {
                global: global.to_string(),
            },
        };
        if !issues.contains(&issue) {
            issues.push(issue);
        }
    }

    let viability = Viability {
        function: function.to_string(),
        issues,
    };
    trace!("callgraph: {}", viability);
    viability
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_utils::{CALLS_SOURCE, parse_module};

    #[test]
    fn callees_and_callers() {
        let module = parse_module(CALLS_SOURCE);
        let graph = CallGraph::build(&module);
        assert_eq!(graph.callees("b"), vec!["a"]);
        assert_eq!(graph.callees("cc"), vec!["a"]);
        assert_eq!(graph.callers("a"), vec!["b", "cc"]);
        assert!(graph.callers("missing").is_empty());
    }

    #[test]
    fn leaf_called_directly_from_external_callers_is_viable() {
        let module = parse_module(CALLS_SOURCE);
        let graph = CallGraph::build(&module);
        for name in ["a", "b", "cc"] {
            assert!(check_viability(&module, &graph, name).is_viable(), "{name}");
        }
    }

    #[test]
    fn internal_leaf_poisons_its_callers() {
        let mut module = parse_module(CALLS_SOURCE);
        module.function_mut("a").unwrap().linkage = Linkage::Internal;
        let graph = CallGraph::build(&module);

        assert!(check_viability(&module, &graph, "a").is_viable());
        for name in ["b", "cc"] {
            let viability = check_viability(&module, &graph, name);
            assert_eq!(
                viability.issues,
                vec![ViabilityIssue::LocalCallee {
                    callee: "a".to_string(),
                    linkage: Linkage::Internal,
                }]
            );
        }
    }

    #[test]
    fn internal_caller_makes_callee_non_viable() {
        let mut module = parse_module(CALLS_SOURCE);
        module.function_mut("cc").unwrap().linkage = Linkage::Private;
        let graph = CallGraph::build(&module);

        let viability = check_viability(&module, &graph, "a");
        assert!(viability.issues.iter().any(|i| i.is_local_caller()));
    }

    #[test]
    fn address_taken_functions_are_rejected() {
        let source = r#"
@handler = global ptr null
@table = constant [1 x ptr] [ptr @on_table]
@direct = constant ptr @on_direct

define void @on_store() {
entry:
  ret void
}

define void @on_arg() {
entry:
  ret void
}

define void @on_table() {
entry:
  ret void
}

define void @on_direct() {
entry:
  ret void
}

define void @install() {
entry:
  store ptr @on_store, ptr @handler
  call void @register(ptr @on_arg)
  call void @on_arg()
  ret void
}

declare void @register(ptr)
"#;
        let module = parse_module(source);
        let graph = CallGraph::build(&module);

        let stored = check_viability(&module, &graph, "on_store");
        assert_eq!(
            stored.issues,
            vec![ViabilityIssue::AddressTaken {
                function: "install".to_string(),
                opcode: "store".to_string(),
            }]
        );

        let passed = check_viability(&module, &graph, "on_arg");
        assert_eq!(
            passed.issues,
            vec![ViabilityIssue::AddressTaken {
                function: "install".to_string(),
                opcode: "call".to_string(),
            }]
        );

        let tabled = check_viability(&module, &graph, "on_table");
        assert!(matches!(
            tabled.issues.as_slice(),
            [ViabilityIssue::ConstantUse { user }] if user == "table"
        ));

        let direct = check_viability(&module, &graph, "on_direct");
        assert!(matches!(
            direct.issues.as_slice(),
            [ViabilityIssue::GlobalUse { global }] if global == "direct"
        ));

        assert!(check_viability(&module, &graph, "install").is_viable());
    }
}
