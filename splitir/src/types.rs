//! Types module
//!
//! The type system is intentionally small: integers of arbitrary width, the
//! two common floating-point formats, an opaque pointer, fixed-size arrays and
//! literal structures. Types are plain values; two types are equal when they
//! are structurally equal.
use strum::EnumIs;

/// A first-class type of the IR.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIs)]
pub enum Type {
    /// Absence of a value (function return type only).
    Void,
    /// Integer of the given bit width (`i1`, `i8`, `i32`, ...).
    Int(u32),
    /// 32-bit IEEE floating point.
    Float,
    /// 64-bit IEEE floating point.
    Double,
    /// Opaque pointer.
    Ptr,
    /// Fixed-size array `[len x elem]`.
    Array { len: u64, elem: Box<Type> },
    /// Literal structure `{ T0, T1, ... }`.
    Struct(Vec<Type>),
}

impl Type {
    /// Smallest accepted integer width.
    pub const MIN_INT_BITS: u32 = 1;
    /// Largest accepted integer width.
    pub const MAX_INT_BITS: u32 = 128;

    pub const I1: Type = Type::Int(1);
    pub const I8: Type = Type::Int(8);
    pub const I32: Type = Type::Int(32);
    pub const I64: Type = Type::Int(64);

    /// Build an array type.
    pub fn array(len: u64, elem: Type) -> Self {
        Type::Array {
            len,
            elem: Box::new(elem),
        }
    }

    /// Returns true for types that are built out of other types.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Type::Array { .. } | Type::Struct(_))
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int(bits) => write!(f, "i{}", bits),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::Ptr => write!(f, "ptr"),
            Type::Array { len, elem } => write!(f, "[{} x {}]", len, elem),
            Type::Struct(fields) => {
                write!(f, "{{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, " }}")
            }
        }
    }
}
