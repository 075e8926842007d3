//! Textual module parser built on `chumsky`.
//!
//! Parsers are small functions returning `impl Parser`, combined bottom-up:
//! types, constants, operands, instructions, blocks, then module items. Value
//! literals are parsed untyped first and resolved against the type written in
//! front of them, so the same literal grammar serves constants, initializers
//! and instruction operands.
use std::path::Path;

use chumsky::{prelude::*, text::digits};
use log::debug;

use crate::{
    constant::{ConstExpr, ConstKind, ConstOp, Constant},
    instructions::{
        Instr,
        arith::{Binary, BinaryOp, ICmp, ICmpPred},
        mem::{Alloca, GetElementPtr, Load, Store},
        misc::{Call, Cast, CastOp, Phi, Select},
    },
    module::Module,
    operand::{Name, Operand},
    symbol::{BasicBlock, Function, GlobalVariable, Linkage, Param, Visibility},
    terminator::{CondBr, Terminator},
    types::Type,
    utils::{Error, ParserError},
};

type Extra<'src> = extra::Err<Rich<'src, char>>;

pub fn whitespace<'src>() -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    any()
        .filter(|c: &char| c.is_whitespace())
        .repeated()
        .at_least(1)
        .ignored()
        .labelled("whitespace")
}

/// `;` up to the end of the line.
pub fn comment<'src>() -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    just(';')
        .then(any().and_is(just('\n').not()).repeated())
        .ignored()
        .labelled("comment")
}

/// Any amount of whitespace and comments, possibly none.
pub fn trivia<'src>() -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    choice((whitespace(), comment())).repeated().ignored()
}

fn keyword<'src>(kw: &'static str) -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    just(kw).then_ignore(whitespace()).ignored().labelled(kw)
}

fn mnemonic<'src>() -> impl Parser<'src, &'src str, &'src str, Extra<'src>> + Clone {
    any()
        .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_')
        .repeated()
        .at_least(1)
        .to_slice()
}

pub fn ident_parser<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    any()
        .filter(|c: &char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$'))
        .repeated()
        .at_least(1)
        .to_slice()
        .map(str::to_string)
        .labelled("identifier")
}

/// `@name`
pub fn global_name_parser<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    just('@')
        .ignore_then(ident_parser())
        .labelled("global name")
}

/// `%name`
pub fn local_name_parser<'src>() -> impl Parser<'src, &'src str, Name, Extra<'src>> + Clone {
    just('%')
        .ignore_then(ident_parser())
        .labelled("local name")
}

fn unescape(text: &str) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buffer = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buffer).as_bytes());
            continue;
        }

        let hex: String = chars.by_ref().take(2).collect();
        let byte = u8::from_str_radix(&hex, 16)
            .map_err(|_| format!("invalid escape sequence `\\{}`", hex))?;
        out.push(byte);
    }
    Ok(out)
}

fn quoted_bytes_parser<'src>() -> impl Parser<'src, &'src str, Vec<u8>, Extra<'src>> + Clone {
    just('"')
        .ignore_then(none_of('"').repeated().to_slice())
        .then_ignore(just('"'))
        .try_map(|text: &str, span| unescape(text).map_err(|message| Rich::custom(span, message)))
}

/// Double-quoted string with `\XX` escapes.
pub fn string_parser<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    quoted_bytes_parser()
        .try_map(|bytes, span| {
            String::from_utf8(bytes)
                .map_err(|_| Rich::custom(span, "string literal is not valid UTF-8"))
        })
        .labelled("string")
}

pub fn int_type_parser<'src>() -> impl Parser<'src, &'src str, Type, Extra<'src>> + Clone {
    just("i")
        .ignore_then(digits(10).at_least(1).to_slice().try_map(|digits: &str, span| {
            let width: u32 = digits.parse().map_err(|_| {
                Rich::custom(span, format!("invalid integer type width: {}", digits))
            })?;

            if width < Type::MIN_INT_BITS {
                return Err(Rich::custom(
                    span,
                    format!(
                        "minimum integer type width is {}, got {}",
                        Type::MIN_INT_BITS,
                        width
                    ),
                ));
            }

            if width > Type::MAX_INT_BITS {
                return Err(Rich::custom(
                    span,
                    format!(
                        "maximum integer type width is {}, got {}",
                        Type::MAX_INT_BITS,
                        width
                    ),
                ));
            }

            Ok(Type::Int(width))
        }))
        .labelled("integer type")
}

pub fn type_parser<'src>() -> impl Parser<'src, &'src str, Type, Extra<'src>> + Clone {
    recursive(|tree| {
        let primary = choice((
            just("void").to(Type::Void),
            int_type_parser(),
            just("float").to(Type::Float),
            just("double").to(Type::Double),
            just("ptr").to(Type::Ptr),
        ));

        // Array type (e.g., [N x T])
        let array_type = just('[')
            .ignore_then(digits(10).at_least(1).to_slice().padded().try_map(|len: &str, span| {
                len.parse::<u64>()
                    .map_err(|_| Rich::custom(span, format!("invalid array length: {}", len)))
            }))
            .then_ignore(just('x'))
            .then(tree.clone().padded())
            .then_ignore(just(']'))
            .map(|(len, elem)| Type::array(len, elem))
            .labelled("array type");

        // Struct type (e.g., { T1, T2, T3 })
        let struct_type = tree
            .padded()
            .separated_by(just(','))
            .collect::<Vec<_>>()
            .padded()
            .delimited_by(just('{'), just('}'))
            .map(Type::Struct)
            .labelled("structure type");

        choice((primary, array_type, struct_type)).labelled("type")
    })
}

/// A literal whose meaning depends on the type written in front of it.
#[derive(Debug, Clone)]
enum RawValue {
    Number(String),
    Bool(bool),
    Null,
    Undef,
    Zero,
    Bytes(Vec<u8>),
    Array(Vec<Constant>),
    Struct(Vec<Constant>),
    Symbol(String),
    Local(Name),
    /// Constant expression and, for casts, the written destination type.
    Expr(ConstExpr, Option<Type>),
}

fn build_constant(ty: Type, raw: RawValue) -> Result<Constant, String> {
    let kind = match raw {
        RawValue::Number(text) => match ty {
            Type::Float | Type::Double => ConstKind::Float(
                text.parse()
                    .map_err(|_| format!("invalid floating-point literal `{}`", text))?,
            ),
            Type::Int(_) => ConstKind::Int(
                text.parse()
                    .map_err(|_| format!("invalid integer literal `{}` for `{}`", text, ty))?,
            ),
            _ => return Err(format!("numeric literal `{}` is not a `{}` value", text, ty)),
        },
        RawValue::Bool(value) => {
            if !ty.is_int() {
                return Err(format!("boolean literal is not a `{}` value", ty));
            }
            ConstKind::Int(value as i128)
        }
        RawValue::Null => ConstKind::Null,
        RawValue::Undef => ConstKind::Undef,
        RawValue::Zero => ConstKind::Zero,
        RawValue::Bytes(bytes) => match &ty {
            Type::Array { len, elem } if **elem == Type::I8 && *len == bytes.len() as u64 => {
                ConstKind::Bytes(bytes)
            }
            _ => {
                return Err(format!(
                    "string literal of {} bytes does not match type `{}`",
                    bytes.len(),
                    ty
                ));
            }
        },
        RawValue::Array(elements) => {
            if !matches!(ty, Type::Array { .. }) {
                return Err(format!("array literal is not a `{}` value", ty));
            }
            ConstKind::Aggregate(elements)
        }
        RawValue::Struct(elements) => {
            if !ty.is_struct() {
                return Err(format!("structure literal is not a `{}` value", ty));
            }
            ConstKind::Aggregate(elements)
        }
        RawValue::Symbol(name) => {
            if ty != Type::Ptr {
                return Err(format!("symbol `@{}` must have type `ptr`, found `{}`", name, ty));
            }
            ConstKind::Symbol(name)
        }
        RawValue::Local(name) => {
            return Err(format!("local value `%{}` cannot appear in a constant", name));
        }
        RawValue::Expr(expr, destination) => {
            if let Some(destination) = destination {
                if destination != ty {
                    return Err(format!(
                        "`{}` converts to `{}` but is used as `{}`",
                        expr.op.opname(),
                        destination,
                        ty
                    ));
                }
            }
            ConstKind::Expr(expr)
        }
    };
    Ok(Constant::new(ty, kind))
}

fn resolve_operand(ty: &Type, raw: RawValue) -> Result<Operand, String> {
    match raw {
        RawValue::Local(name) => Ok(Operand::Local(name, ty.clone())),
        raw => build_constant(ty.clone(), raw).map(Operand::Const),
    }
}

fn number_parser<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    just('-')
        .or_not()
        .then(digits(10).at_least(1))
        .then(just('.').then(digits(10).at_least(1)).or_not())
        .then(
            one_of("eE")
                .then(one_of("+-").or_not())
                .then(digits(10).at_least(1))
                .or_not(),
        )
        .to_slice()
        .map(str::to_string)
        .labelled("number")
}

fn raw_value_parser<'src>(
    constant: impl Parser<'src, &'src str, Constant, Extra<'src>> + Clone,
) -> impl Parser<'src, &'src str, RawValue, Extra<'src>> + Clone {
    let list = constant
        .clone()
        .padded()
        .separated_by(just(','))
        .collect::<Vec<_>>()
        .padded();

    let array = list
        .clone()
        .delimited_by(just('['), just(']'))
        .map(RawValue::Array)
        .labelled("array literal");

    let structure = list
        .delimited_by(just('{'), just('}'))
        .map(RawValue::Struct)
        .labelled("structure literal");

    let gep = just("getelementptr")
        .padded()
        .ignore_then(
            type_parser()
                .padded()
                .then(
                    just(',')
                        .ignore_then(constant.clone().padded())
                        .repeated()
                        .collect::<Vec<_>>(),
                )
                .delimited_by(just('('), just(')')),
        )
        .map(|(source_ty, operands)| {
            RawValue::Expr(
                ConstExpr {
                    op: ConstOp::GetElementPtr,
                    source_ty: Some(source_ty),
                    operands,
                },
                None,
            )
        });

    let cast = choice((
        just("bitcast").to(ConstOp::BitCast),
        just("ptrtoint").to(ConstOp::PtrToInt),
        just("inttoptr").to(ConstOp::IntToPtr),
    ))
    .then_ignore(whitespace().or_not())
    .then(
        constant
            .clone()
            .padded()
            .then_ignore(just("to"))
            .then(type_parser().padded())
            .delimited_by(just('('), just(')')),
    )
    .map(|(op, (operand, destination))| {
        RawValue::Expr(
            ConstExpr {
                op,
                source_ty: None,
                operands: vec![operand],
            },
            Some(destination),
        )
    });

    let arith = choice((
        just("add").to(ConstOp::Add),
        just("sub").to(ConstOp::Sub),
    ))
    .then_ignore(whitespace().or_not())
    .then(
        constant
            .clone()
            .padded()
            .then_ignore(just(','))
            .then(constant.padded())
            .delimited_by(just('('), just(')')),
    )
    .map(|(op, (lhs, rhs))| {
        RawValue::Expr(
            ConstExpr {
                op,
                source_ty: None,
                operands: vec![lhs, rhs],
            },
            None,
        )
    });

    choice((
        gep.labelled("constant expression"),
        cast.labelled("constant expression"),
        arith.labelled("constant expression"),
        just("true").to(RawValue::Bool(true)),
        just("false").to(RawValue::Bool(false)),
        just("null").to(RawValue::Null),
        just("undef").to(RawValue::Undef),
        just("zeroinitializer").to(RawValue::Zero),
        just('c')
            .ignore_then(quoted_bytes_parser())
            .map(RawValue::Bytes)
            .labelled("byte string"),
        number_parser().map(RawValue::Number),
        global_name_parser().map(RawValue::Symbol),
        local_name_parser().map(RawValue::Local),
        array,
        structure,
    ))
    .labelled("value")
}

/// Typed constant, e.g. `i32 5`, `ptr @g` or `[2 x ptr] [ptr @a, ptr null]`.
pub fn constant_parser<'src>() -> impl Parser<'src, &'src str, Constant, Extra<'src>> + Clone {
    recursive(|constant| {
        type_parser()
            .then_ignore(whitespace())
            .then(raw_value_parser(constant))
            .try_map(|(ty, raw), span| {
                build_constant(ty, raw).map_err(|message| Rich::custom(span, message))
            })
    })
    .labelled("constant")
}

/// Typed operand, e.g. `i32 %x` or `ptr @g`.
pub fn operand_parser<'src>(
    constant: impl Parser<'src, &'src str, Constant, Extra<'src>> + Clone,
) -> impl Parser<'src, &'src str, Operand, Extra<'src>> + Clone {
    type_parser()
        .then_ignore(whitespace())
        .then(raw_value_parser(constant))
        .try_map(|(ty, raw), span| {
            resolve_operand(&ty, raw).map_err(|message| Rich::custom(span, message))
        })
        .labelled("operand")
}

fn set_destination(instr: &mut Instr, dest: Name) {
    match instr {
        Instr::Binary(binary) => binary.dest = dest,
        Instr::ICmp(icmp) => icmp.dest = dest,
        Instr::Alloca(alloca) => alloca.dest = dest,
        Instr::Load(load) => load.dest = dest,
        Instr::GetElementPtr(gep) => gep.dest = dest,
        Instr::Call(call) => call.dest = Some(dest),
        Instr::Phi(phi) => phi.dest = dest,
        Instr::Select(select) => select.dest = dest,
        Instr::Cast(cast) => cast.dest = dest,
        Instr::Store(_) => {}
    }
}

pub fn instruction_parser<'src>() -> impl Parser<'src, &'src str, Instr, Extra<'src>> + Clone {
    let constant = constant_parser();
    let value = raw_value_parser(constant.clone());
    let operand = operand_parser(constant);
    let comma = just(',').padded();

    let binary = mnemonic()
        .try_map(|name, span| {
            BinaryOp::from_str(name)
                .ok_or_else(|| Rich::custom(span, format!("unknown binary operator `{}`", name)))
        })
        .then_ignore(whitespace())
        .then(type_parser())
        .then_ignore(whitespace())
        .then(value.clone())
        .then_ignore(comma.clone())
        .then(value.clone())
        .try_map(|(((op, ty), lhs), rhs), span| {
            let lhs = resolve_operand(&ty, lhs).map_err(|m| Rich::custom(span, m))?;
            let rhs = resolve_operand(&ty, rhs).map_err(|m| Rich::custom(span, m))?;
            Ok(Instr::Binary(Binary {
                dest: Name::new(),
                op,
                ty,
                lhs,
                rhs,
            }))
        })
        .labelled("binary instruction");

    let icmp = keyword("icmp")
        .ignore_then(mnemonic().try_map(|name, span| {
            ICmpPred::from_str(name)
                .ok_or_else(|| Rich::custom(span, format!("unknown comparison `{}`", name)))
        }))
        .then_ignore(whitespace())
        .then(type_parser())
        .then_ignore(whitespace())
        .then(value.clone())
        .then_ignore(comma.clone())
        .then(value.clone())
        .try_map(|(((pred, ty), lhs), rhs), span| {
            let lhs = resolve_operand(&ty, lhs).map_err(|m| Rich::custom(span, m))?;
            let rhs = resolve_operand(&ty, rhs).map_err(|m| Rich::custom(span, m))?;
            Ok(Instr::ICmp(ICmp {
                dest: Name::new(),
                pred,
                ty,
                lhs,
                rhs,
            }))
        })
        .labelled("icmp instruction");

    let alloca = keyword("alloca")
        .ignore_then(type_parser())
        .map(|ty| {
            Instr::Alloca(Alloca {
                dest: Name::new(),
                ty,
            })
        })
        .labelled("alloca instruction");

    let load = keyword("load")
        .ignore_then(type_parser())
        .then_ignore(comma.clone())
        .then(operand.clone())
        .map(|(ty, addr)| {
            Instr::Load(Load {
                dest: Name::new(),
                ty,
                addr,
            })
        })
        .labelled("load instruction");

    let store = keyword("store")
        .ignore_then(operand.clone())
        .then_ignore(comma.clone())
        .then(operand.clone())
        .map(|(value, addr)| Instr::Store(Store { value, addr }))
        .labelled("store instruction");

    let gep = keyword("getelementptr")
        .ignore_then(type_parser())
        .then_ignore(comma.clone())
        .then(operand.clone())
        .then(
            comma
                .clone()
                .ignore_then(operand.clone())
                .repeated()
                .collect::<Vec<_>>(),
        )
        .map(|((source_ty, base), indices)| {
            Instr::GetElementPtr(GetElementPtr {
                dest: Name::new(),
                source_ty,
                base,
                indices,
            })
        })
        .labelled("getelementptr instruction");

    let cast = mnemonic()
        .try_map(|name, span| {
            CastOp::from_str(name)
                .ok_or_else(|| Rich::custom(span, format!("unknown cast `{}`", name)))
        })
        .then_ignore(whitespace())
        .then(operand.clone())
        .then_ignore(just("to").padded())
        .then(type_parser())
        .map(|((op, value), ty)| {
            Instr::Cast(Cast {
                dest: Name::new(),
                op,
                value,
                ty,
            })
        })
        .labelled("cast instruction");

    let call = keyword("call")
        .ignore_then(type_parser())
        .then_ignore(whitespace())
        .then(value.clone())
        .then(
            operand
                .clone()
                .padded()
                .separated_by(just(','))
                .collect::<Vec<_>>()
                .padded()
                .delimited_by(just('('), just(')')),
        )
        .try_map(|((ret_ty, callee), args), span| {
            let callee = resolve_operand(&Type::Ptr, callee).map_err(|m| Rich::custom(span, m))?;
            Ok(Instr::Call(Call {
                dest: None,
                ret_ty,
                callee,
                args,
            }))
        })
        .labelled("call instruction");

    let phi = keyword("phi")
        .ignore_then(type_parser())
        .then_ignore(whitespace())
        .then(
            value
                .clone()
                .padded()
                .then_ignore(just(','))
                .then(local_name_parser().padded())
                .delimited_by(just('['), just(']'))
                .separated_by(comma.clone())
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .try_map(|(ty, incoming), span| {
            let incoming = incoming
                .into_iter()
                .map(|(raw, label)| Ok((resolve_operand(&ty, raw)?, label)))
                .collect::<Result<Vec<_>, String>>()
                .map_err(|m| Rich::custom(span, m))?;
            Ok(Instr::Phi(Phi {
                dest: Name::new(),
                ty,
                incoming,
            }))
        })
        .labelled("phi instruction");

    let select = keyword("select")
        .ignore_then(operand.clone())
        .then_ignore(comma.clone())
        .then(operand.clone())
        .then_ignore(comma)
        .then(operand)
        .map(|((condition, true_value), false_value)| {
            Instr::Select(Select {
                dest: Name::new(),
                condition,
                true_value,
                false_value,
            })
        })
        .labelled("select instruction");

    let with_destination = local_name_parser()
        .then_ignore(just('=').padded())
        .then(choice((
            icmp,
            alloca,
            load,
            gep,
            call.clone(),
            phi,
            select,
            binary,
            cast,
        )))
        .map(|(dest, mut instr)| {
            set_destination(&mut instr, dest);
            instr
        });

    choice((with_destination, store, call))
        .labelled("instruction")
        .boxed()
}

pub fn terminator_parser<'src>() -> impl Parser<'src, &'src str, Terminator, Extra<'src>> + Clone {
    let operand = operand_parser(constant_parser());
    let label = keyword("label").ignore_then(local_name_parser());

    let ret = keyword("ret")
        .ignore_then(choice((
            just("void").to(None),
            operand.clone().map(Some),
        )))
        .map(Terminator::Ret)
        .labelled("return terminator");

    let jump = keyword("br")
        .ignore_then(label.clone())
        .map(Terminator::Br)
        .labelled("branch terminator");

    let branch = keyword("br")
        .ignore_then(operand)
        .then_ignore(just(',').padded())
        .then(label.clone())
        .then_ignore(just(',').padded())
        .then(label)
        .map(|((cond, target_true), target_false)| {
            Terminator::CondBr(CondBr {
                cond,
                target_true,
                target_false,
            })
        })
        .labelled("conditional branch terminator");

    choice((
        ret,
        jump,
        branch,
        just("unreachable").to(Terminator::Unreachable),
    ))
    .labelled("terminator")
}

pub fn block_parser<'src>() -> impl Parser<'src, &'src str, BasicBlock, Extra<'src>> + Clone {
    ident_parser()
        .then_ignore(just(':'))
        .labelled("block label")
        .then(
            instruction_parser()
                .padded_by(trivia())
                .repeated()
                .collect::<Vec<_>>(),
        )
        .then(terminator_parser().padded_by(trivia()))
        .map(|((label, instructions), terminator)| BasicBlock {
            label,
            instructions,
            terminator,
        })
        .labelled("block")
}

pub fn linkage_parser<'src>() -> impl Parser<'src, &'src str, Linkage, Extra<'src>> + Clone {
    choice((
        keyword("available_externally").to(Linkage::AvailableExternally),
        keyword("internal").to(Linkage::Internal),
        keyword("private").to(Linkage::Private),
        keyword("external").to(Linkage::External),
    ))
    .labelled("linkage")
}

pub fn visibility_parser<'src>() -> impl Parser<'src, &'src str, Visibility, Extra<'src>> + Clone
{
    choice((
        keyword("default").to(Visibility::Default),
        keyword("hidden").to(Visibility::Hidden),
        keyword("protected").to(Visibility::Protected),
    ))
    .labelled("visibility")
}

fn source_parser<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    keyword("source").ignore_then(string_parser())
}

/// `(i32 %a, ptr %b, ...)`, returning the parameters and the variadic flag.
fn params_parser<'src>() -> impl Parser<'src, &'src str, (Vec<Param>, bool), Extra<'src>> + Clone
{
    let param = type_parser()
        .then(whitespace().ignore_then(local_name_parser()).or_not())
        .map(|(ty, name)| Some(Param { name, ty }));

    choice((just("...").to(None), param))
        .padded()
        .separated_by(just(','))
        .collect::<Vec<_>>()
        .padded()
        .delimited_by(just('('), just(')'))
        .try_map(|mut items, span| {
            let variadic = matches!(items.last(), Some(None));
            if variadic {
                items.pop();
            }
            let params = items
                .into_iter()
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| Rich::custom(span, "`...` must be the last parameter"))?;
            Ok((params, variadic))
        })
        .labelled("parameter list")
}

/// Linkage, visibility and `dso_local`, all optional.
fn attributes_parser<'src>()
-> impl Parser<'src, &'src str, (Option<Linkage>, Option<Visibility>, bool), Extra<'src>> + Clone
{
    linkage_parser()
        .or_not()
        .then(visibility_parser().or_not())
        .then(keyword("dso_local").or_not())
        .map(|((linkage, visibility), dso_local)| (linkage, visibility, dso_local.is_some()))
}

pub fn function_parser<'src>() -> impl Parser<'src, &'src str, Function, Extra<'src>> + Clone {
    let head = attributes_parser()
        .then(type_parser())
        .then_ignore(whitespace())
        .then(global_name_parser())
        .then(params_parser())
        .then(whitespace().ignore_then(source_parser()).or_not());

    let define = keyword("define")
        .ignore_then(head.clone())
        .then(
            block_parser()
                .padded_by(trivia())
                .repeated()
                .at_least(1)
                .collect::<Vec<_>>()
                .delimited_by(just('{').padded(), just('}')),
        )
        .map(
            |((((((linkage, visibility, dso_local), ret_ty), name), (params, variadic)), source), blocks)| {
                Function {
                    name,
                    linkage: linkage.unwrap_or_default(),
                    visibility: visibility.unwrap_or_default(),
                    dso_local,
                    ret_ty,
                    params,
                    variadic,
                    blocks,
                    source,
                }
            },
        )
        .labelled("function definition");

    let declare = keyword("declare")
        .ignore_then(head)
        .map(
            |(((((linkage, visibility, dso_local), ret_ty), name), (params, variadic)), source)| {
                Function {
                    name,
                    linkage: linkage.unwrap_or_default(),
                    visibility: visibility.unwrap_or_default(),
                    dso_local,
                    ret_ty,
                    params,
                    variadic,
                    blocks: Vec::new(),
                    source,
                }
            },
        )
        .labelled("function declaration");

    choice((define, declare))
}

pub fn global_parser<'src>() -> impl Parser<'src, &'src str, GlobalVariable, Extra<'src>> + Clone {
    let name = global_name_parser().then_ignore(just('=').padded());

    let body = visibility_parser()
        .or_not()
        .then(keyword("dso_local").or_not())
        .then(keyword("externally_initialized").or_not())
        .then(choice((
            keyword("global").to(false),
            keyword("constant").to(true),
        )))
        .then(type_parser());

    let source = just(',').padded().ignore_then(source_parser()).or_not();

    let declaration = name
        .clone()
        .then_ignore(keyword("external"))
        .then(body.clone())
        .then(source.clone())
        .map(
            |((name, ((((visibility, dso_local), externally_initialized), is_constant), ty)), source)| {
                GlobalVariable {
                    name,
                    linkage: Linkage::External,
                    visibility: visibility.unwrap_or_default(),
                    dso_local: dso_local.is_some(),
                    is_constant,
                    externally_initialized: externally_initialized.is_some(),
                    ty,
                    initializer: None,
                    source,
                }
            },
        )
        .labelled("global declaration");

    let definition_linkage = choice((
        keyword("available_externally").to(Linkage::AvailableExternally),
        keyword("internal").to(Linkage::Internal),
        keyword("private").to(Linkage::Private),
    ));

    let definition = name
        .then(definition_linkage.or_not())
        .then(body)
        .then_ignore(whitespace())
        .then(raw_value_parser(constant_parser()))
        .then(source)
        .try_map(
            |((((name, linkage), ((((visibility, dso_local), externally_initialized), is_constant), ty)), raw), source),
             span| {
                let initializer = build_constant(ty.clone(), raw)
                    .map_err(|message| Rich::custom(span, message))?;
                Ok(GlobalVariable {
                    name,
                    linkage: linkage.unwrap_or_default(),
                    visibility: visibility.unwrap_or_default(),
                    dso_local: dso_local.is_some(),
                    is_constant,
                    externally_initialized: externally_initialized.is_some(),
                    ty,
                    initializer: Some(initializer),
                    source,
                })
            },
        )
        .labelled("global definition");

    choice((declaration, definition))
}

#[derive(Debug, Clone)]
enum Item {
    SourceFilename(String),
    DataLayout(String),
    TargetTriple(String),
    ModuleAsm(String),
    Global(GlobalVariable),
    Function(Function),
}

fn item_parser<'src>() -> impl Parser<'src, &'src str, Item, Extra<'src>> + Clone {
    let assignment = |key: &'static str| {
        just(key)
            .ignore_then(just('=').padded())
            .ignore_then(string_parser())
    };

    choice((
        assignment("source_filename").map(Item::SourceFilename),
        keyword("target")
            .ignore_then(choice((
                assignment("datalayout").map(Item::DataLayout),
                assignment("triple").map(Item::TargetTriple),
            )))
            .labelled("target description"),
        keyword("module")
            .ignore_then(keyword("asm"))
            .ignore_then(string_parser())
            .map(Item::ModuleAsm)
            .labelled("module asm"),
        global_parser().map(Item::Global),
        function_parser().map(Item::Function),
    ))
    .labelled("module item")
}

fn module_parser<'src>()
-> impl Parser<'src, &'src str, Vec<(Item, SimpleSpan)>, Extra<'src>> + Clone {
    item_parser()
        .map_with(|item, e| (item, e.span()))
        .padded_by(trivia())
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(end())
}

/// Parse `source` and append its content to `module`.
///
/// Header items overwrite the module's metadata; `module asm` lines are
/// appended. Symbols already present in `module` are reported as errors.
pub fn extend_module_from_string(
    module: &mut Module,
    source: &str,
    file: Option<&str>,
) -> Result<(), Error> {
    let file = file.map(str::to_string);
    let items = module_parser()
        .parse(source)
        .into_result()
        .map_err(|errors| Error::ParserErrors {
            file: file.clone(),
            errors: errors
                .into_iter()
                .map(|error| ParserError {
                    file: file.clone(),
                    start: error.span().start,
                    end: error.span().end,
                    message: error.to_string(),
                })
                .collect(),
        })?;

    let mut errors = Vec::new();
    for (item, span) in items {
        let inserted = match item {
            Item::SourceFilename(name) => {
                module.name = Some(name);
                Ok(())
            }
            Item::DataLayout(layout) => {
                module.data_layout = Some(layout);
                Ok(())
            }
            Item::TargetTriple(triple) => {
                module.target_triple = Some(triple);
                Ok(())
            }
            Item::ModuleAsm(line) => {
                module.inline_asm.push(line);
                Ok(())
            }
            Item::Global(global) => module.add_global(global),
            Item::Function(function) => module.add_function(function),
        };

        if let Err(error) = inserted {
            errors.push(ParserError {
                file: file.clone(),
                start: span.start,
                end: span.end,
                message: error.to_string(),
            });
        }
    }

    if !errors.is_empty() {
        return Err(Error::ParserErrors { file, errors });
    }

    debug!(
        "parser: module now holds {} global(s) and {} function(s)",
        module.globals.len(),
        module.functions.len()
    );
    Ok(())
}

/// Read `path` and append its content to `module`.
pub fn extend_module_from_path(module: &mut Module, path: &Path) -> Result<(), Error> {
    let source = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })?;
    extend_module_from_string(module, &source, Some(&path.display().to_string()))
}
