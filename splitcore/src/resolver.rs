//! Dependency closures.
//!
//! A closure is everything a root needs to stand alone in its own partition:
//! the constant globals it reads, directly or through the initializers of
//! other constants, plus the mutable globals and functions it merely
//! references. Only constant initializers are followed; mutable globals are
//! owned by their own partition and stay external.
use std::collections::VecDeque;

use log::trace;
use splitir::{
    constant::Constant,
    instructions::Instr,
    module::Module,
    symbol::{Function, GlobalVariable},
    terminator::Terminator,
};

use crate::walker::{OperandWalker, Reachable};

/// The transitive dependencies of a root, as computed by [`DependencyResolver`].
pub type Closure = Reachable;

/// Where a resolution starts.
#[derive(Debug, Clone, Copy)]
pub enum Root<'m> {
    /// A single instruction of `function`.
    Instruction {
        function: &'m Function,
        instr: &'m Instr,
    },
    Terminator {
        function: &'m Function,
        terminator: &'m Terminator,
    },
    /// A free-standing constant, e.g. an initializer.
    Constant(&'m Constant),
    /// Every instruction and terminator of a function.
    Function(&'m Function),
    /// The initializer of a global.
    Global(&'m GlobalVariable),
}

pub struct DependencyResolver<'m> {
    module: &'m Module,
}

impl<'m> DependencyResolver<'m> {
    pub fn new(module: &'m Module) -> Self {
        Self { module }
    }

    /// Operands reachable from the root itself, before following initializers.
    fn direct(&self, root: Root<'m>) -> Reachable {
        match root {
            Root::Instruction { function, instr } => {
                OperandWalker::in_function(self.module, function).walk_instruction(instr)
            }
            Root::Terminator {
                function,
                terminator,
            } => OperandWalker::in_function(self.module, function).walk_terminator(terminator),
            Root::Constant(constant) => OperandWalker::new(self.module).walk_constant(constant),
            Root::Function(function) => {
                OperandWalker::in_function(self.module, function).walk_operands(function.operands())
            }
            Root::Global(global) => match &global.initializer {
                Some(initializer) => OperandWalker::new(self.module).walk_constant(initializer),
                None => Reachable::default(),
            },
        }
    }

    /// Breadth-first closure over constant initializers.
    pub fn resolve(&self, root: Root<'m>) -> Closure {
        let mut closure = self.direct(root);
        let mut frontier: VecDeque<String> = closure.constants.iter().cloned().collect();
        let walker = OperandWalker::new(self.module);

        while let Some(name) = frontier.pop_front() {
            let Some(initializer) = self
                .module
                .global(&name)
                .and_then(|global| global.initializer.as_ref())
            else {
                continue;
            };

            let found = walker.walk_constant(initializer);
            for constant in found.constants.difference(&closure.constants) {
                trace!("resolver: @{} pulls in @{}", name, constant);
                frontier.push_back(constant.clone());
            }
            closure.merge(found);
        }

        closure
    }

    pub fn resolve_function(&self, function: &'m Function) -> Closure {
        self.resolve(Root::Function(function))
    }

    pub fn resolve_global(&self, global: &'m GlobalVariable) -> Closure {
        self.resolve(Root::Global(global))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::tests_utils::parse_module;

    const SOURCE: &str = r#"
@.name.a = private constant [2 x i8] c"a\00"
@.name.b = private constant [2 x i8] c"b\00"
@names = constant [2 x ptr] [ptr @.name.a, ptr @.name.b]
@loop.x = constant ptr @loop.y
@loop.y = constant ptr @loop.x
@hits = global i32 0
@meta = constant { ptr, ptr } { ptr @names, ptr @hits }

define ptr @lookup(i64 %i) {
entry:
  %slot = getelementptr [2 x ptr], ptr @names, i64 0, i64 %i
  %p = load ptr, ptr %slot
  ret ptr %p
}

define ptr @spin() {
entry:
  ret ptr @loop.x
}

define ptr @describe() {
entry:
  ret ptr @meta
}
"#;

    fn names(set: &BTreeSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn closure_follows_constant_initializers() {
        let module = parse_module(SOURCE);
        let resolver = DependencyResolver::new(&module);
        let closure = resolver.resolve_function(module.function("lookup").unwrap());
        assert_eq!(names(&closure.constants), vec![".name.a", ".name.b", "names"]);
        assert!(closure.mutable.is_empty());
    }

    #[test]
    fn cyclic_initializers_terminate() {
        let module = parse_module(SOURCE);
        let resolver = DependencyResolver::new(&module);
        let closure = resolver.resolve_function(module.function("spin").unwrap());
        assert_eq!(names(&closure.constants), vec!["loop.x", "loop.y"]);
    }

    #[test]
    fn mutable_globals_are_recorded_but_not_followed() {
        let module = parse_module(SOURCE);
        let resolver = DependencyResolver::new(&module);
        let closure = resolver.resolve_function(module.function("describe").unwrap());
        assert_eq!(
            names(&closure.constants),
            vec![".name.a", ".name.b", "meta", "names"]
        );
        assert_eq!(names(&closure.mutable), vec!["hits"]);
    }

    #[test]
    fn closure_is_a_fixed_point() {
        let module = parse_module(SOURCE);
        let resolver = DependencyResolver::new(&module);

        for function in module.defined_functions() {
            let closure = resolver.resolve_function(function);
            for member in &closure.constants {
                let again = resolver.resolve(Root::Constant(&Constant::symbol(member.as_str())));
                assert!(
                    again.constants.is_subset(&closure.constants),
                    "@{} grows the closure of @{}",
                    member,
                    function.name
                );
            }
        }
    }

    #[test]
    fn single_instruction_root() {
        let module = parse_module(SOURCE);
        let lookup = module.function("lookup").unwrap();
        let instr = lookup.instructions().next().unwrap();
        let resolver = DependencyResolver::new(&module);
        let closure = resolver.resolve(Root::Instruction {
            function: lookup,
            instr,
        });
        assert_eq!(names(&closure.constants), vec![".name.a", ".name.b", "names"]);
    }
}
