//! Constant values and constant expressions.
//!
//! Constants form trees: aggregates and constant expressions own their
//! operands, and references to other symbols are expressed by name through
//! [`ConstKind::Symbol`]. Initializer graphs between globals therefore only
//! cycle through symbol names, never through shared nodes.
use strum::{EnumDiscriminants, EnumIs, EnumIter, IntoEnumIterator};

use crate::types::Type;

/// A typed constant.
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub ty: Type,
    pub kind: ConstKind,
}

/// The value part of a [`Constant`].
#[derive(Debug, Clone, PartialEq, EnumIs, EnumDiscriminants)]
#[strum_discriminants(name(ConstKindTag))]
pub enum ConstKind {
    /// Integer literal; booleans are `i1` integers.
    Int(i128),
    /// Floating-point literal.
    Float(f64),
    /// The null pointer.
    Null,
    /// An unspecified value.
    Undef,
    /// `zeroinitializer`
    Zero,
    /// Byte string literal (`c"..."`).
    Bytes(Vec<u8>),
    /// Array or structure literal.
    Aggregate(Vec<Constant>),
    /// Address of a global variable or function.
    Symbol(String),
    /// Constant expression over other constants.
    Expr(ConstExpr),
}

/// Constant expression, e.g. `getelementptr ([4 x i8], ptr @str, i64 0, i64 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstExpr {
    pub op: ConstOp,
    /// Element type used to compute offsets (`getelementptr` only).
    pub source_ty: Option<Type>,
    pub operands: Vec<Constant>,
}

/// Opcodes accepted inside constant expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum ConstOp {
    GetElementPtr,
    BitCast,
    PtrToInt,
    IntToPtr,
    Add,
    Sub,
}

impl ConstOp {
    /// Canonical mnemonic.
    pub fn opname(&self) -> &'static str {
        match self {
            ConstOp::GetElementPtr => "getelementptr",
            ConstOp::BitCast => "bitcast",
            ConstOp::PtrToInt => "ptrtoint",
            ConstOp::IntToPtr => "inttoptr",
            ConstOp::Add => "add",
            ConstOp::Sub => "sub",
        }
    }

    /// Casts carry a single operand and a destination type.
    pub fn is_cast(&self) -> bool {
        matches!(
            self,
            ConstOp::BitCast | ConstOp::PtrToInt | ConstOp::IntToPtr
        )
    }

    pub fn from_str(s: &str) -> Option<Self> {
        ConstOp::iter().find(|op| op.opname() == s)
    }
}

impl Constant {
    pub fn new(ty: Type, kind: ConstKind) -> Self {
        Self { ty, kind }
    }

    pub fn int(ty: Type, value: i128) -> Self {
        Self::new(ty, ConstKind::Int(value))
    }

    /// Pointer to the named global value.
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::new(Type::Ptr, ConstKind::Symbol(name.into()))
    }

    pub fn null() -> Self {
        Self::new(Type::Ptr, ConstKind::Null)
    }

    /// Byte string `[N x i8] c"..."`.
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        Self::new(Type::array(data.len() as u64, Type::I8), ConstKind::Bytes(data))
    }

    pub fn aggregate(ty: Type, elements: Vec<Constant>) -> Self {
        Self::new(ty, ConstKind::Aggregate(elements))
    }

    /// Name of the referenced symbol when this constant is a bare symbol reference.
    pub fn as_symbol(&self) -> Option<&str> {
        match &self.kind {
            ConstKind::Symbol(name) => Some(name.as_str()),
            _ => None,
        }
    }

    /// Direct sub-constants (elements of aggregates, operands of expressions).
    pub fn operands(&self) -> std::slice::Iter<'_, Constant> {
        match &self.kind {
            ConstKind::Aggregate(elements) => elements.iter(),
            ConstKind::Expr(expr) => expr.operands.iter(),
            _ => Default::default(),
        }
    }

    pub fn operands_mut(&mut self) -> std::slice::IterMut<'_, Constant> {
        match &mut self.kind {
            ConstKind::Aggregate(elements) => elements.iter_mut(),
            ConstKind::Expr(expr) => expr.operands.iter_mut(),
            _ => Default::default(),
        }
    }

    /// Names of every symbol referenced anywhere inside this constant tree,
    /// in depth-first order (duplicates preserved).
    pub fn referenced_symbols(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(current) = stack.pop() {
            if let Some(name) = current.as_symbol() {
                out.push(name);
            }
            stack.extend(current.operands().rev());
        }
        out
    }

    /// Rename every symbol reference for which `mapping` returns a new name.
    pub fn remap_symbols(&mut self, mapping: &impl Fn(&str) -> Option<String>) {
        if let ConstKind::Symbol(name) = &mut self.kind {
            if let Some(new_name) = mapping(name) {
                *name = new_name;
            }
        }
        for operand in self.operands_mut() {
            operand.remap_symbols(mapping);
        }
    }
}
