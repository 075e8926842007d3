//! Pretty-print helpers for constants, instructions, functions and modules.
//!
//! The output is the textual format accepted by [`crate::parser`]; printing a
//! module and parsing the result yields an equal module.
use std::fmt::{Display, Formatter, Result};

use crate::{
    constant::{ConstKind, Constant},
    instructions::{Instr, Instruction},
    module::Module,
    operand::Operand,
    symbol::{BasicBlock, Function, GlobalVariable, Linkage, Param, Visibility},
    terminator::Terminator,
    types::Type,
};

/// Escape a byte sequence for a double-quoted literal. Quotes, backslashes
/// and non-printable bytes are written as `\XX`.
pub fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &byte in bytes {
        if byte.is_ascii_graphic() && byte != b'"' && byte != b'\\' || byte == b' ' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("\\{:02X}", byte));
        }
    }
    out
}

impl Constant {
    /// Build a formatting helper that renders only the value part of the constant
    /// (the type prefix is omitted).
    pub fn value(&self) -> impl Display + '_ {
        pub struct Fmt<'a> {
            constant: &'a Constant,
        }

        impl<'a> Display for Fmt<'a> {
            fn fmt(&self, f: &mut Formatter<'_>) -> Result {
                let constant = self.constant;
                match &constant.kind {
                    ConstKind::Int(0) if constant.ty == Type::I1 => write!(f, "false"),
                    ConstKind::Int(1) if constant.ty == Type::I1 => write!(f, "true"),
                    ConstKind::Int(value) => write!(f, "{}", value),
                    ConstKind::Float(value) => write!(f, "{:?}", value),
                    ConstKind::Null => write!(f, "null"),
                    ConstKind::Undef => write!(f, "undef"),
                    ConstKind::Zero => write!(f, "zeroinitializer"),
                    ConstKind::Bytes(bytes) => write!(f, "c\"{}\"", escape_bytes(bytes)),
                    ConstKind::Aggregate(elements) => {
                        let (open, close) = match constant.ty {
                            Type::Struct(_) => ('{', '}'),
                            _ => ('[', ']'),
                        };
                        if elements.is_empty() {
                            return write!(f, "{}{}", open, close);
                        }
                        write!(f, "{} ", open)?;
                        for (i, element) in elements.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{}", element)?;
                        }
                        write!(f, " {}", close)
                    }
                    ConstKind::Symbol(name) => write!(f, "@{}", name),
                    ConstKind::Expr(expr) => {
                        write!(f, "{} (", expr.op.opname())?;
                        if expr.op.is_cast() {
                            for operand in &expr.operands {
                                write!(f, "{}", operand)?;
                            }
                            return write!(f, " to {})", constant.ty);
                        }
                        let mut first = true;
                        if let Some(source_ty) = &expr.source_ty {
                            write!(f, "{}", source_ty)?;
                            first = false;
                        }
                        for operand in &expr.operands {
                            if !first {
                                write!(f, ", ")?;
                            }
                            write!(f, "{}", operand)?;
                            first = false;
                        }
                        write!(f, ")")
                    }
                }
            }
        }

        Fmt { constant: self }
    }
}

impl Display for Constant {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{} {}", self.ty, self.value())
    }
}

impl Operand {
    /// Render the operand without its type, e.g. `%x` or `@g`.
    pub fn value(&self) -> impl Display + '_ {
        pub struct Fmt<'a> {
            operand: &'a Operand,
        }

        impl<'a> Display for Fmt<'a> {
            fn fmt(&self, f: &mut Formatter<'_>) -> Result {
                match self.operand {
                    Operand::Local(name, _) => write!(f, "%{}", name),
                    Operand::Const(constant) => write!(f, "{}", constant.value()),
                }
            }
        }

        Fmt { operand: self }
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{} {}", self.ty(), self.value())
    }
}

impl Display for Instr {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        if let Some(dest) = self.destination() {
            write!(f, "%{} = ", dest)?;
        }

        match self {
            Instr::Binary(binary) => write!(
                f,
                "{} {} {}, {}",
                binary.op.opname(),
                binary.ty,
                binary.lhs.value(),
                binary.rhs.value()
            ),
            Instr::ICmp(icmp) => write!(
                f,
                "icmp {} {} {}, {}",
                icmp.pred.to_str(),
                icmp.ty,
                icmp.lhs.value(),
                icmp.rhs.value()
            ),
            Instr::Alloca(alloca) => write!(f, "alloca {}", alloca.ty),
            Instr::Load(load) => write!(f, "load {}, {}", load.ty, load.addr),
            Instr::Store(store) => write!(f, "store {}, {}", store.value, store.addr),
            Instr::GetElementPtr(gep) => {
                write!(f, "getelementptr {}, {}", gep.source_ty, gep.base)?;
                for index in &gep.indices {
                    write!(f, ", {}", index)?;
                }
                Ok(())
            }
            Instr::Call(call) => {
                write!(f, "call {} {}(", call.ret_ty, call.callee.value())?;
                for (i, arg) in call.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Instr::Phi(phi) => {
                write!(f, "phi {} ", phi.ty)?;
                for (i, (value, label)) in phi.incoming.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "[ {}, %{} ]", value.value(), label)?;
                }
                Ok(())
            }
            Instr::Select(select) => write!(
                f,
                "select {}, {}, {}",
                select.condition, select.true_value, select.false_value
            ),
            Instr::Cast(cast) => write!(f, "{} {} to {}", cast.op.opname(), cast.value, cast.ty),
        }
    }
}

impl Display for Terminator {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Terminator::Ret(None) => write!(f, "ret void"),
            Terminator::Ret(Some(value)) => write!(f, "ret {}", value),
            Terminator::Br(target) => write!(f, "br label %{}", target),
            Terminator::CondBr(cbr) => write!(
                f,
                "br {}, label %{}, label %{}",
                cbr.cond, cbr.target_true, cbr.target_false
            ),
            Terminator::Unreachable => write!(f, "unreachable"),
        }
    }
}

impl Display for BasicBlock {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f, "{}:", self.label)?;
        for instr in &self.instructions {
            writeln!(f, "  {}", instr)?;
        }
        writeln!(f, "  {}", self.terminator)
    }
}

fn write_attributes(
    f: &mut Formatter<'_>,
    linkage: Option<Linkage>,
    visibility: Visibility,
    dso_local: bool,
) -> Result {
    if let Some(linkage) = linkage {
        write!(f, "{} ", linkage.to_str())?;
    }
    if visibility != Visibility::Default {
        write!(f, "{} ", visibility.to_str())?;
    }
    if dso_local {
        write!(f, "dso_local ")?;
    }
    Ok(())
}

fn write_params(f: &mut Formatter<'_>, params: &[Param], variadic: bool) -> Result {
    write!(f, "(")?;
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", param.ty)?;
        if let Some(name) = &param.name {
            write!(f, " %{}", name)?;
        }
    }
    if variadic {
        if !params.is_empty() {
            write!(f, ", ")?;
        }
        write!(f, "...")?;
    }
    write!(f, ")")
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let keyword = if self.blocks.is_empty() {
            "declare"
        } else {
            "define"
        };
        write!(f, "{} ", keyword)?;

        let linkage = (self.linkage != Linkage::External).then_some(self.linkage);
        write_attributes(f, linkage, self.visibility, self.dso_local)?;
        write!(f, "{} @{}", self.ret_ty, self.name)?;
        write_params(f, &self.params, self.variadic)?;

        if let Some(source) = &self.source {
            write!(f, " source \"{}\"", escape_bytes(source.as_bytes()))?;
        }

        if self.blocks.is_empty() {
            return writeln!(f);
        }

        writeln!(f, " {{")?;
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", block)?;
        }
        writeln!(f, "}}")
    }
}

impl Display for GlobalVariable {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "@{} = ", self.name)?;

        let linkage = match &self.initializer {
            None => Some(Linkage::External),
            Some(_) => (self.linkage != Linkage::External).then_some(self.linkage),
        };
        write_attributes(f, linkage, self.visibility, self.dso_local)?;
        if self.externally_initialized {
            write!(f, "externally_initialized ")?;
        }

        let keyword = if self.is_constant { "constant" } else { "global" };
        write!(f, "{} {}", keyword, self.ty)?;
        if let Some(initializer) = &self.initializer {
            write!(f, " {}", initializer.value())?;
        }

        if let Some(source) = &self.source {
            write!(f, ", source \"{}\"", escape_bytes(source.as_bytes()))?;
        }
        writeln!(f)
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let mut header = false;
        if let Some(name) = &self.name {
            writeln!(f, "source_filename = \"{}\"", escape_bytes(name.as_bytes()))?;
            header = true;
        }
        if let Some(layout) = &self.data_layout {
            writeln!(f, "target datalayout = \"{}\"", escape_bytes(layout.as_bytes()))?;
            header = true;
        }
        if let Some(triple) = &self.target_triple {
            writeln!(f, "target triple = \"{}\"", escape_bytes(triple.as_bytes()))?;
            header = true;
        }
        for line in &self.inline_asm {
            writeln!(f, "module asm \"{}\"", escape_bytes(line.as_bytes()))?;
            header = true;
        }

        if !self.globals.is_empty() {
            if header {
                writeln!(f)?;
            }
            for global in &self.globals {
                write!(f, "{}", global)?;
            }
            header = true;
        }

        for function in &self.functions {
            if header {
                writeln!(f)?;
            }
            write!(f, "{}", function)?;
            header = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::{ConstExpr, ConstOp};

    #[test]
    fn escapes_quotes_and_control_bytes() {
        assert_eq!(escape_bytes(b"hi\n\0"), "hi\\0A\\00");
        assert_eq!(escape_bytes(b"a\"b\\"), "a\\22b\\5C");
    }

    #[test]
    fn prints_booleans_and_aggregates() {
        assert_eq!(Constant::int(Type::I1, 1).to_string(), "i1 true");
        let pair = Constant::aggregate(
            Type::Struct(vec![Type::array(2, Type::I8), Type::Ptr]),
            vec![Constant::bytes(*b"a\0"), Constant::symbol("f")],
        );
        assert_eq!(pair.value().to_string(), "{ [2 x i8] c\"a\\00\", ptr @f }");
    }

    #[test]
    fn prints_cast_expression_with_destination_type() {
        let cast = Constant::new(
            Type::I64,
            ConstKind::Expr(ConstExpr {
                op: ConstOp::PtrToInt,
                source_ty: None,
                operands: vec![Constant::symbol("g")],
            }),
        );
        assert_eq!(cast.to_string(), "i64 ptrtoint (ptr @g to i64)");
    }
}
