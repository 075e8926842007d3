use auto_enums::auto_enum;
use bitflags::bitflags;
use strum::{EnumDiscriminants, EnumIs, EnumTryAs};

use crate::operand::{Name, Operand};

pub mod arith;
pub mod mem;
pub mod misc;

bitflags! {
    /// Flags providing additional information about instructions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InstructionFlags: u32 {
        /// The instruction merges values flowing in from predecessor blocks.
        ///
        /// Its operands encode control-flow merges; they are not data
        /// dependencies of the block it lives in.
        const JOIN = 1 << 0;
    }
}

/// Common interface implemented by every instruction node.
///
/// This trait provides lightweight, zero-allocation iteration over an
/// instruction's input operands and exposes its optional destination SSA
/// name when present.
pub trait Instruction {
    fn flags(&self) -> InstructionFlags {
        InstructionFlags::empty()
    }

    /// Returns true if this instruction is a control-flow join (`phi`).
    #[inline]
    fn is_join(&self) -> bool {
        self.flags().contains(InstructionFlags::JOIN)
    }

    /// Iterate over all input operands for this instruction.
    fn operands(&self) -> impl Iterator<Item = &Operand>;

    /// Mutably iterate over all input operands for this instruction.
    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand>;

    /// Return the destination SSA name if the instruction produces a result.
    fn destination(&self) -> Option<&Name> {
        None
    }
}

/// Discriminated union covering all instruction kinds.
///
/// The generated [`InstrOp`] discriminant (via `strum`) is used for fast
/// classification and for diagnostics.
#[derive(Debug, Clone, PartialEq, EnumIs, EnumTryAs, EnumDiscriminants)]
#[strum_discriminants(name(InstrOp), derive(Hash))]
pub enum Instr {
    Binary(arith::Binary),
    ICmp(arith::ICmp),

    Alloca(mem::Alloca),
    Load(mem::Load),
    Store(mem::Store),
    GetElementPtr(mem::GetElementPtr),

    Call(misc::Call),
    Phi(misc::Phi),
    Select(misc::Select),
    Cast(misc::Cast),
}

impl InstrOp {
    /// Return the canonical mnemonic used when printing this instruction.
    ///
    /// Binary and cast instructions print their own operator instead.
    pub fn opname(&self) -> &'static str {
        match self {
            InstrOp::Binary => "binary",
            InstrOp::ICmp => "icmp",
            InstrOp::Alloca => "alloca",
            InstrOp::Load => "load",
            InstrOp::Store => "store",
            InstrOp::GetElementPtr => "getelementptr",
            InstrOp::Call => "call",
            InstrOp::Phi => "phi",
            InstrOp::Select => "select",
            InstrOp::Cast => "cast",
        }
    }
}

impl Instr {
    /// Return the discriminant for this instruction value.
    pub fn op(&self) -> InstrOp {
        self.into()
    }
}

macro_rules! define_instr_any_instr {
    (
        $($variant:ident),* $(,)?
    ) => {
        impl Instruction for Instr {
            fn flags(&self) -> InstructionFlags {
                match self {
                    $(
                        Instr::$variant(instr) => instr.flags(),
                    )*
                }
            }

            #[auto_enum(Iterator)]
            fn operands(&self) -> impl Iterator<Item = &Operand> {
                match self {
                    $(
                        Instr::$variant(instr) => instr.operands(),
                    )*
                }
            }

            #[auto_enum(Iterator)]
            fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
                match self {
                    $(
                        Instr::$variant(instr) => instr.operands_mut(),
                    )*
                }
            }

            fn destination(&self) -> Option<&Name> {
                match self {
                    $(
                        Instr::$variant(instr) => instr.destination(),
                    )*
                }
            }
        }

        $(
            impl From<$variant> for Instr {
                fn from(inst: $variant) -> Self {
                    Instr::$variant(inst)
                }
            }
        )*
    };
}

use arith::{Binary, ICmp};
use mem::{Alloca, GetElementPtr, Load, Store};
use misc::{Call, Cast, Phi, Select};

define_instr_any_instr! {
    Binary,
    ICmp,
    Alloca,
    Load,
    Store,
    GetElementPtr,
    Call,
    Phi,
    Select,
    Cast,
}
