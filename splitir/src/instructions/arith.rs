//! Integer arithmetic, bitwise and comparison instructions.
use strum::{EnumIter, IntoEnumIterator};

use crate::{
    instructions::Instruction,
    operand::{Name, Operand},
    types::Type,
};

/// Operator of a [`Binary`] instruction.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
}

impl BinaryOp {
    pub fn opname(&self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::SDiv => "sdiv",
            BinaryOp::UDiv => "udiv",
            BinaryOp::SRem => "srem",
            BinaryOp::URem => "urem",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Shl => "shl",
            BinaryOp::LShr => "lshr",
            BinaryOp::AShr => "ashr",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        BinaryOp::iter().find(|op| op.opname() == s)
    }
}

/// Two-operand integer instruction, `%d = add i32 %a, %b`.
#[derive(Debug, Clone, PartialEq)]
pub struct Binary {
    pub dest: Name,
    pub op: BinaryOp,
    pub ty: Type,
    pub lhs: Operand,
    pub rhs: Operand,
}

impl Instruction for Binary {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        [&self.lhs, &self.rhs].into_iter()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        [&mut self.lhs, &mut self.rhs].into_iter()
    }

    fn destination(&self) -> Option<&Name> {
        Some(&self.dest)
    }

}

/// Integer comparison predicate.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
pub enum ICmpPred {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

impl ICmpPred {
    pub fn to_str(&self) -> &'static str {
        match self {
            ICmpPred::Eq => "eq",
            ICmpPred::Ne => "ne",
            ICmpPred::Ugt => "ugt",
            ICmpPred::Uge => "uge",
            ICmpPred::Ult => "ult",
            ICmpPred::Ule => "ule",
            ICmpPred::Sgt => "sgt",
            ICmpPred::Sge => "sge",
            ICmpPred::Slt => "slt",
            ICmpPred::Sle => "sle",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        ICmpPred::iter().find(|pred| pred.to_str() == s)
    }
}

/// Integer comparison producing an `i1`.
#[derive(Debug, Clone, PartialEq)]
pub struct ICmp {
    pub dest: Name,
    pub pred: ICmpPred,
    /// Type of the compared operands.
    pub ty: Type,
    pub lhs: Operand,
    pub rhs: Operand,
}

impl Instruction for ICmp {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        [&self.lhs, &self.rhs].into_iter()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        [&mut self.lhs, &mut self.rhs].into_iter()
    }

    fn destination(&self) -> Option<&Name> {
        Some(&self.dest)
    }

}
