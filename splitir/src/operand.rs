//! Shared operand types for instructions.
//!
//! An instruction operand is either a reference to a local SSA value (an
//! argument or the result of another instruction of the same function) or a
//! constant, which may itself reference global symbols.
use strum::EnumIs;

use crate::{constant::Constant, types::Type};

/// Local SSA value identifier (`%name`).
pub type Name = String;

/// Basic block label (`%label` in branch position).
pub type Label = String;

/// Instruction operand.
#[derive(Debug, Clone, PartialEq, EnumIs)]
pub enum Operand {
    /// Reference to an argument or instruction result of the enclosing function.
    Local(Name, Type),
    /// Constant value, possibly referencing global symbols.
    Const(Constant),
}

impl Operand {
    pub fn local(name: impl Into<Name>, ty: Type) -> Self {
        Operand::Local(name.into(), ty)
    }

    /// Type of the value this operand denotes.
    pub fn ty(&self) -> &Type {
        match self {
            Operand::Local(_, ty) => ty,
            Operand::Const(constant) => &constant.ty,
        }
    }

    /// Name of the local value, if this operand is one.
    pub fn as_local(&self) -> Option<&str> {
        match self {
            Operand::Local(name, _) => Some(name.as_str()),
            Operand::Const(_) => None,
        }
    }

    pub fn as_const(&self) -> Option<&Constant> {
        match self {
            Operand::Local(..) => None,
            Operand::Const(constant) => Some(constant),
        }
    }

    /// Name of the global symbol when the operand is a bare symbol reference.
    pub fn as_symbol(&self) -> Option<&str> {
        self.as_const().and_then(Constant::as_symbol)
    }
}

impl From<Constant> for Operand {
    fn from(value: Constant) -> Self {
        Operand::Const(value)
    }
}
