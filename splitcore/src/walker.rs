//! Operand graph traversal.
//!
//! The walker starts at a user (an instruction, a terminator or a constant)
//! and follows constant operands down to the global symbols they reference.
//! It never crosses into another instruction: local operands are leaves, and
//! operands naming a `phi` result are skipped outright since they only encode
//! control-flow merges. Initializers of the globals it meets are not followed
//! either; that is the job of [`crate::resolver`].
use std::collections::{BTreeSet, HashSet};

use log::trace;
use splitir::{
    constant::{ConstKind, Constant},
    instructions::{Instr, Instruction},
    module::{Module, SymbolRef},
    operand::Operand,
    symbol::Function,
    terminator::Terminator,
};

/// Global symbols reachable from a user, split by what they are.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reachable {
    /// Read-only globals; these may travel with the user.
    pub constants: BTreeSet<String>,
    /// Mutable globals; these must remain external to the user's partition.
    pub mutable: BTreeSet<String>,
    /// Functions referenced as values (called or address-taken).
    pub functions: BTreeSet<String>,
}

impl Reachable {
    pub fn is_empty(&self) -> bool {
        self.constants.is_empty() && self.mutable.is_empty() && self.functions.is_empty()
    }

    /// Union `other` into `self`.
    pub fn merge(&mut self, other: Reachable) {
        self.constants.extend(other.constants);
        self.mutable.extend(other.mutable);
        self.functions.extend(other.functions);
    }

    /// Constant and mutable globals together.
    pub fn globals(&self) -> impl Iterator<Item = &String> {
        self.constants.iter().chain(self.mutable.iter())
    }
}

pub struct OperandWalker<'m> {
    module: &'m Module,
    joins: BTreeSet<&'m str>,
}

impl<'m> OperandWalker<'m> {
    /// Walker for users that do not live in a function (initializers).
    pub fn new(module: &'m Module) -> Self {
        Self {
            module,
            joins: BTreeSet::new(),
        }
    }

    /// Walker for instructions of `function`; operands naming one of its
    /// `phi` results are skipped.
    pub fn in_function(module: &'m Module, function: &'m Function) -> Self {
        Self {
            module,
            joins: function.join_names().map(String::as_str).collect(),
        }
    }

    pub fn walk_instruction(&self, instr: &Instr) -> Reachable {
        self.walk_operands(instr.operands())
    }

    pub fn walk_terminator(&self, terminator: &Terminator) -> Reachable {
        self.walk_operands(terminator.operands())
    }

    pub fn walk_constant(&self, constant: &Constant) -> Reachable {
        let mut out = Reachable::default();
        self.visit(constant, &mut HashSet::new(), &mut out);
        out
    }

    /// Walk every operand of the sequence with one shared visited set.
    pub fn walk_operands<'a>(&self, operands: impl Iterator<Item = &'a Operand>) -> Reachable {
        let mut visited = HashSet::new();
        let mut out = Reachable::default();

        for operand in operands {
            match operand {
                Operand::Local(name, _) if self.joins.contains(name.as_str()) => {
                    trace!("walker: skipping join value %{}", name);
                }
                Operand::Local(..) => {}
                Operand::Const(constant) => self.visit(constant, &mut visited, &mut out),
            }
        }
        out
    }

    fn visit<'a>(
        &self,
        root: &'a Constant,
        visited: &mut HashSet<*const Constant>,
        out: &mut Reachable,
    ) {
        let mut stack = vec![root];
        while let Some(constant) = stack.pop() {
            if !visited.insert(constant as *const Constant) {
                continue;
            }

            match &constant.kind {
                ConstKind::Null | ConstKind::Undef | ConstKind::Zero => {}
                ConstKind::Symbol(name) => self.classify(name, out),
                _ => stack.extend(constant.operands()),
            }
        }
    }

    fn classify(&self, name: &str, out: &mut Reachable) {
        match self.module.symbol(name) {
            Some(SymbolRef::Global(global)) if global.is_constant => {
                out.constants.insert(name.to_string());
            }
            Some(SymbolRef::Global(_)) => {
                out.mutable.insert(name.to_string());
            }
            Some(SymbolRef::Function(_)) => {
                out.functions.insert(name.to_string());
            }
            None => trace!("walker: `@{}` is not part of the module", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_utils::parse_module;

    const SOURCE: &str = r#"
@msg = private constant [3 x i8] c"hi\00"
@state = global i32 0
@pair = constant { ptr, ptr } { ptr @msg, ptr @state }

define ptr @pick(i1 %c) {
entry:
  br i1 %c, label %left, label %right

left:
  br label %done

right:
  br label %done

done:
  %p = phi ptr [ @msg, %left ], [ null, %right ]
  %q = getelementptr i8, ptr %p, i64 1
  %r = select i1 %c, ptr %q, ptr getelementptr ([3 x i8], ptr @msg, i64 0, i64 1)
  store i32 1, ptr @state
  call void @sink(ptr @pick)
  ret ptr %r
}

declare void @sink(ptr)
"#;

    fn names(set: &BTreeSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn nested_constant_expressions_are_followed() {
        let module = parse_module(SOURCE);
        let pick = module.function("pick").unwrap();
        let walker = OperandWalker::in_function(&module, pick);

        let select = pick.instructions().find(|i| i.is_select()).unwrap();
        let reachable = walker.walk_instruction(select);
        assert_eq!(names(&reachable.constants), vec!["msg"]);
        assert!(reachable.mutable.is_empty());
    }

    #[test]
    fn join_operands_are_skipped_but_the_join_itself_is_walked() {
        let module = parse_module(SOURCE);
        let pick = module.function("pick").unwrap();
        let walker = OperandWalker::in_function(&module, pick);

        let gep = pick
            .instructions()
            .find(|i| i.is_get_element_ptr())
            .unwrap();
        assert!(walker.walk_instruction(gep).is_empty());

        let phi = pick.instructions().find(|i| i.is_phi()).unwrap();
        assert_eq!(names(&walker.walk_instruction(phi).constants), vec!["msg"]);
    }

    #[test]
    fn mutable_globals_and_functions_are_recorded_separately() {
        let module = parse_module(SOURCE);
        let pick = module.function("pick").unwrap();
        let walker = OperandWalker::in_function(&module, pick);

        let reachable = walker.walk_operands(pick.operands());
        assert_eq!(names(&reachable.constants), vec!["msg"]);
        assert_eq!(names(&reachable.mutable), vec!["state"]);
        assert_eq!(names(&reachable.functions), vec!["pick", "sink"]);
    }

    #[test]
    fn initializers_are_not_followed() {
        let module = parse_module(SOURCE);
        let walker = OperandWalker::new(&module);

        let user = Constant::symbol("pair");
        let reachable = walker.walk_constant(&user);
        assert_eq!(names(&reachable.constants), vec!["pair"]);
        assert!(reachable.mutable.is_empty());

        let initializer = module.global("pair").unwrap().initializer.as_ref().unwrap();
        let reachable = walker.walk_constant(initializer);
        assert_eq!(names(&reachable.constants), vec!["msg"]);
        assert_eq!(names(&reachable.mutable), vec!["state"]);
    }

    #[test]
    fn null_and_zero_leaves_reach_nothing() {
        let module = parse_module(SOURCE);
        let walker = OperandWalker::new(&module);
        assert!(walker.walk_constant(&Constant::null()).is_empty());
    }
}
