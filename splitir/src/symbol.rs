//! Global symbols of a module and their link attributes.
//!
//! Global variables and functions are both *global values*: they have a
//! unique name, a [`Linkage`], a [`Visibility`] and a resolves-locally
//! (`dso_local`) flag. The [`GlobalValue`] trait exposes these attributes
//! uniformly so link rewriting can treat both kinds alike.
use strum::{EnumIs, EnumIter, IntoEnumIterator};

use crate::{
    constant::Constant,
    instructions::{Instr, Instruction},
    operand::{Label, Name, Operand},
    terminator::Terminator,
    types::Type,
};

/// All global variables and functions have one of the following types of linkage.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, EnumIs, EnumIter)]
pub enum Linkage {
    /// Global values with `External` linkage may be referenced by other modules,
    /// and may also be defined in other modules.
    #[default]
    External,

    /// The definition is available for inspection and inlining but is never
    /// emitted; a copy exists elsewhere at link time.
    AvailableExternally,

    /// Similar to `Private`, but the value shows as a local symbol (STB_LOCAL in
    /// the case of ELF) in the object file.
    ///
    /// This corresponds to the notion of the `static` keyword in C.
    Internal,

    /// Global values with `Private` linkage are only directly accessible by objects
    /// in the current module.
    ///
    /// This doesn't show up in any symbol table in the object file.
    Private,
}

impl Linkage {
    pub fn to_str(&self) -> &'static str {
        match self {
            Linkage::External => "external",
            Linkage::AvailableExternally => "available_externally",
            Linkage::Internal => "internal",
            Linkage::Private => "private",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Linkage::iter().find(|linkage| linkage.to_str() == s)
    }

    /// Returns true when the symbol cannot be referenced from another module.
    pub fn is_local(&self) -> bool {
        matches!(self, Linkage::Internal | Linkage::Private)
    }
}

/// All global variables and functions have one of the following visibility styles.
///
/// Note: A symbol with internal or private linkage must have default visibility.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, EnumIs, EnumIter)]
pub enum Visibility {
    /// The declaration is visible to other modules and, in shared libraries,
    /// may be overridden.
    #[default]
    Default,

    /// Two declarations of an object with hidden visibility refer to the same
    /// object if they are in the same shared object. The symbol is not placed
    /// into the dynamic symbol table.
    Hidden,

    /// The symbol is placed in the dynamic symbol table, but references within
    /// the defining module bind to the local symbol.
    Protected,
}

impl Visibility {
    pub fn to_str(&self) -> &'static str {
        match self {
            Visibility::Default => "default",
            Visibility::Hidden => "hidden",
            Visibility::Protected => "protected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Visibility::iter().find(|visibility| visibility.to_str() == s)
    }
}

/// Kind of a global symbol.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum SymbolKind {
    Function,
    Global,
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolKind::Function => write!(f, "function"),
            SymbolKind::Global => write!(f, "global"),
        }
    }
}

/// Link attributes shared by functions and global variables.
pub trait GlobalValue {
    fn name(&self) -> &str;
    fn kind(&self) -> SymbolKind;
    fn linkage(&self) -> Linkage;
    fn set_linkage(&mut self, linkage: Linkage);
    fn visibility(&self) -> Visibility;
    fn set_visibility(&mut self, visibility: Visibility);
    /// The resolves-locally flag.
    fn dso_local(&self) -> bool;
    fn set_dso_local(&mut self, dso_local: bool);
    /// A declaration has no body (functions) or no initializer (globals).
    fn is_declaration(&self) -> bool;
    /// Source file the symbol was compiled from, when known.
    fn source(&self) -> Option<&str>;
}

macro_rules! impl_global_value {
    ($ty:ty, $kind:expr, $is_declaration:expr) => {
        impl GlobalValue for $ty {
            fn name(&self) -> &str {
                &self.name
            }

            fn kind(&self) -> SymbolKind {
                $kind
            }

            fn linkage(&self) -> Linkage {
                self.linkage
            }

            fn set_linkage(&mut self, linkage: Linkage) {
                self.linkage = linkage;
            }

            fn visibility(&self) -> Visibility {
                self.visibility
            }

            fn set_visibility(&mut self, visibility: Visibility) {
                self.visibility = visibility;
            }

            fn dso_local(&self) -> bool {
                self.dso_local
            }

            fn set_dso_local(&mut self, dso_local: bool) {
                self.dso_local = dso_local;
            }

            fn is_declaration(&self) -> bool {
                ($is_declaration)(self)
            }

            fn source(&self) -> Option<&str> {
                self.source.as_deref()
            }
        }
    };
}

/// A global variable. `is_constant` separates read-only data, which may be
/// duplicated across partitions, from mutable state, which must stay singular.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVariable {
    pub name: String,
    pub linkage: Linkage,
    pub visibility: Visibility,
    pub dso_local: bool,
    pub is_constant: bool,
    /// The variable is initialized outside of this module (e.g. by a loader).
    pub externally_initialized: bool,
    pub ty: Type,
    pub initializer: Option<Constant>,
    pub source: Option<String>,
}

impl GlobalVariable {
    /// New definition with external linkage and default visibility.
    pub fn new(name: impl Into<String>, is_constant: bool, initializer: Constant) -> Self {
        Self {
            name: name.into(),
            linkage: Linkage::External,
            visibility: Visibility::Default,
            dso_local: false,
            is_constant,
            externally_initialized: false,
            ty: initializer.ty.clone(),
            initializer: Some(initializer),
            source: None,
        }
    }

    /// New external declaration of type `ty`.
    pub fn declaration(name: impl Into<String>, is_constant: bool, ty: Type) -> Self {
        Self {
            name: name.into(),
            linkage: Linkage::External,
            visibility: Visibility::Default,
            dso_local: false,
            is_constant,
            externally_initialized: false,
            ty,
            initializer: None,
            source: None,
        }
    }

    pub fn has_initializer(&self) -> bool {
        self.initializer.is_some()
    }
}

impl_global_value!(GlobalVariable, SymbolKind::Global, |g: &GlobalVariable| g
    .initializer
    .is_none());

/// A function parameter. Declarations may omit parameter names.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Option<Name>,
    pub ty: Type,
}

/// A basic block: a label, straight-line instructions and a terminator.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub label: Label,
    pub instructions: Vec<Instr>,
    pub terminator: Terminator,
}

/// A function made of basic blocks. The first block is the entry block.
/// A function without blocks is a declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub linkage: Linkage,
    pub visibility: Visibility,
    pub dso_local: bool,
    pub ret_ty: Type,
    pub params: Vec<Param>,
    pub variadic: bool,
    pub blocks: Vec<BasicBlock>,
    pub source: Option<String>,
}

impl Function {
    /// New external declaration with the given signature.
    pub fn declaration(name: impl Into<String>, ret_ty: Type, params: Vec<Type>) -> Self {
        Self {
            name: name.into(),
            linkage: Linkage::External,
            visibility: Visibility::Default,
            dso_local: false,
            ret_ty,
            params: params
                .into_iter()
                .map(|ty| Param { name: None, ty })
                .collect(),
            variadic: false,
            blocks: Vec::new(),
            source: None,
        }
    }

    /// Declaration carrying the same signature and link attributes as `self`.
    pub fn to_declaration(&self) -> Self {
        Self {
            name: self.name.clone(),
            linkage: Linkage::External,
            visibility: self.visibility,
            dso_local: false,
            ret_ty: self.ret_ty.clone(),
            params: self
                .params
                .iter()
                .map(|param| Param {
                    name: None,
                    ty: param.ty.clone(),
                })
                .collect(),
            variadic: self.variadic,
            blocks: Vec::new(),
            source: self.source.clone(),
        }
    }

    pub fn block(&self, label: &str) -> Option<&BasicBlock> {
        self.blocks.iter().find(|block| block.label == label)
    }

    /// Iterate over every instruction of every block, in block order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instr> {
        self.blocks.iter().flat_map(|block| block.instructions.iter())
    }

    pub fn terminators(&self) -> impl Iterator<Item = &Terminator> {
        self.blocks.iter().map(|block| &block.terminator)
    }

    /// Every operand of every instruction and terminator.
    pub fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.instructions()
            .flat_map(|instr| instr.operands())
            .chain(self.terminators().flat_map(Terminator::operands))
    }

    /// Names of the values produced by join (`phi`) instructions.
    pub fn join_names(&self) -> impl Iterator<Item = &Name> {
        self.instructions()
            .filter(|instr| instr.is_join())
            .filter_map(|instr| instr.destination())
    }
}

impl_global_value!(Function, SymbolKind::Function, |f: &Function| f
    .blocks
    .is_empty());
