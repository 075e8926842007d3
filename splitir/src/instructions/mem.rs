//! Memory operations
//!
//! Stack allocation, loads, stores and address computation. Every access
//! goes through an opaque pointer operand; the accessed type is carried by
//! the instruction itself.
use crate::{
    instructions::Instruction,
    operand::{Name, Operand},
    types::Type,
};

/// Allocate a stack slot of the given type.
#[derive(Debug, Clone, PartialEq)]
pub struct Alloca {
    pub dest: Name,
    pub ty: Type,
}

impl Instruction for Alloca {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::empty()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::empty()
    }

    fn destination(&self) -> Option<&Name> {
        Some(&self.dest)
    }

}

/// Load a value of type `ty` from `addr`.
#[derive(Debug, Clone, PartialEq)]
pub struct Load {
    pub dest: Name,
    pub ty: Type,
    pub addr: Operand,
}

impl Instruction for Load {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.addr)
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.addr)
    }

    fn destination(&self) -> Option<&Name> {
        Some(&self.dest)
    }

}

/// Store `value` to `addr`.
#[derive(Debug, Clone, PartialEq)]
pub struct Store {
    pub value: Operand,
    pub addr: Operand,
}

impl Instruction for Store {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        [&self.value, &self.addr].into_iter()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        [&mut self.value, &mut self.addr].into_iter()
    }
}

/// Address computation relative to `base`, stepping through `source_ty`.
#[derive(Debug, Clone, PartialEq)]
pub struct GetElementPtr {
    pub dest: Name,
    pub source_ty: Type,
    pub base: Operand,
    pub indices: Vec<Operand>,
}

impl Instruction for GetElementPtr {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.base).chain(self.indices.iter())
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.base).chain(self.indices.iter_mut())
    }

    fn destination(&self) -> Option<&Name> {
        Some(&self.dest)
    }

}
