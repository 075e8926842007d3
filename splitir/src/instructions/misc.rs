use strum::{EnumIter, IntoEnumIterator};

use crate::{
    instructions::{Instruction, InstructionFlags},
    operand::{Label, Name, Operand},
    types::Type,
};

/// Function call instruction
///
/// `callee` is usually a direct reference to a function symbol, but any
/// pointer-typed operand is accepted to allow indirect calls through
/// function pointer tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// The destination SSA name for the return value, if any.
    pub dest: Option<Name>,
    /// The return type of the callee. [`Type::Void`] for calls without result.
    pub ret_ty: Type,
    /// The called value.
    pub callee: Operand,
    /// The argument operands to pass to the function.
    pub args: Vec<Operand>,
}

impl Call {
    /// Name of the called function when the call is direct.
    pub fn direct_callee(&self) -> Option<&str> {
        self.callee.as_symbol()
    }
}

impl Instruction for Call {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.callee).chain(self.args.iter())
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.callee).chain(self.args.iter_mut())
    }

    fn destination(&self) -> Option<&Name> {
        self.dest.as_ref()
    }

}

/// Phi instruction
///
/// Selects a value based on the predecessor block control came from. It
/// should always be placed at the beginning of a basic block.
#[derive(Debug, Clone, PartialEq)]
pub struct Phi {
    pub dest: Name,
    pub ty: Type,
    /// The incoming values and their corresponding predecessor basic blocks.
    pub incoming: Vec<(Operand, Label)>,
}

impl Instruction for Phi {
    fn flags(&self) -> InstructionFlags {
        InstructionFlags::JOIN
    }

    fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.incoming.iter().map(|(op, _)| op)
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        self.incoming.iter_mut().map(|(op, _)| op)
    }

    fn destination(&self) -> Option<&Name> {
        Some(&self.dest)
    }

}

/// Select one of two values based on an `i1` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub dest: Name,
    pub condition: Operand,
    pub true_value: Operand,
    pub false_value: Operand,
}

impl Instruction for Select {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        [&self.condition, &self.true_value, &self.false_value].into_iter()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        [
            &mut self.condition,
            &mut self.true_value,
            &mut self.false_value,
        ]
        .into_iter()
    }

    fn destination(&self) -> Option<&Name> {
        Some(&self.dest)
    }

}

/// Conversion operator of a [`Cast`] instruction.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
pub enum CastOp {
    BitCast,
    PtrToInt,
    IntToPtr,
    ZExt,
    SExt,
    Trunc,
}

impl CastOp {
    pub fn opname(&self) -> &'static str {
        match self {
            CastOp::BitCast => "bitcast",
            CastOp::PtrToInt => "ptrtoint",
            CastOp::IntToPtr => "inttoptr",
            CastOp::ZExt => "zext",
            CastOp::SExt => "sext",
            CastOp::Trunc => "trunc",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        CastOp::iter().find(|op| op.opname() == s)
    }
}

/// Convert `value` to type `ty`, `%d = zext i8 %v to i32`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cast {
    pub dest: Name,
    pub op: CastOp,
    pub value: Operand,
    pub ty: Type,
}

impl Instruction for Cast {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.value)
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.value)
    }

    fn destination(&self) -> Option<&Name> {
        Some(&self.dest)
    }

}
