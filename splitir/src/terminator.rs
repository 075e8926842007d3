//! Control flow terminators.
//!
//! Every basic block ends with exactly one terminator. Labels may not cross
//! function boundaries; they name blocks of the enclosing function only.
use strum::EnumIs;

use crate::operand::{Label, Operand};

/// Conditional branch on an `i1` operand.
#[derive(Debug, Clone, PartialEq)]
pub struct CondBr {
    pub cond: Operand,
    pub target_true: Label,
    pub target_false: Label,
}

/// Control flow terminator instructions
#[derive(Debug, Clone, PartialEq, EnumIs)]
pub enum Terminator {
    /// Return from the function, optionally with a value.
    Ret(Option<Operand>),
    /// Unconditional branch.
    Br(Label),
    CondBr(CondBr),
    Unreachable,
}

impl Terminator {
    /// Input operands of the terminator.
    pub fn operands(&self) -> impl Iterator<Item = &Operand> {
        let operand = match self {
            Terminator::Ret(value) => value.as_ref(),
            Terminator::CondBr(cbr) => Some(&cbr.cond),
            Terminator::Br(_) | Terminator::Unreachable => None,
        };
        operand.into_iter()
    }

    pub fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        let operand = match self {
            Terminator::Ret(value) => value.as_mut(),
            Terminator::CondBr(cbr) => Some(&mut cbr.cond),
            Terminator::Br(_) | Terminator::Unreachable => None,
        };
        operand.into_iter()
    }

    /// Successor block labels.
    pub fn targets(&self) -> Vec<&Label> {
        match self {
            Terminator::Br(target) => vec![target],
            Terminator::CondBr(cbr) => vec![&cbr.target_true, &cbr.target_false],
            Terminator::Ret(_) | Terminator::Unreachable => Vec::new(),
        }
    }
}
