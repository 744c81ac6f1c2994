//! Type lattice for the Ljos checker.
//!
//! The checker is shallow: these types describe the shape of values well
//! enough to catch obvious mismatches, never to prove programs sound.
//! `Unknown` is compatible with everything in both directions.

use std::fmt;

use crate::ast::{BinaryOp, TypeExpr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int,
    Float,
    Num,
    Str,
    Bool,
    Byte,
    Char,
    Nul,
}

impl Primitive {
    pub fn from_name(name: &str) -> Option<Primitive> {
        Some(match name {
            "Int" => Primitive::Int,
            "Float" => Primitive::Float,
            "Num" => Primitive::Num,
            "Str" => Primitive::Str,
            "Bool" => Primitive::Bool,
            "Byte" => Primitive::Byte,
            "Char" => Primitive::Char,
            "Nul" => Primitive::Nul,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Primitive::Int => "Int",
            Primitive::Float => "Float",
            Primitive::Num => "Num",
            Primitive::Str => "Str",
            Primitive::Bool => "Bool",
            Primitive::Byte => "Byte",
            Primitive::Char => "Char",
            Primitive::Nul => "Nul",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Primitive::Int | Primitive::Float | Primitive::Num | Primitive::Byte
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Primitive(Primitive),
    /// An instance of a class.
    Class(String),
    /// The class object itself, for static access.
    ClassRef(String),
    Function {
        params: Vec<Type>,
        ret: Box<Type>,
    },
    Array(Box<Type>),
    Chan(Box<Type>),
    Enum(String),
    EnumMember {
        enum_name: String,
        member: String,
        payload: Option<Vec<Type>>,
    },
    Unknown,
    Void,
}

impl Type {
    pub const INT: Type = Type::Primitive(Primitive::Int);
    pub const FLOAT: Type = Type::Primitive(Primitive::Float);
    pub const NUM: Type = Type::Primitive(Primitive::Num);
    pub const STR: Type = Type::Primitive(Primitive::Str);
    pub const BOOL: Type = Type::Primitive(Primitive::Bool);
    pub const NUL: Type = Type::Primitive(Primitive::Nul);

    pub fn function(params: Vec<Type>, ret: Type) -> Type {
        Type::Function {
            params,
            ret: Box::new(ret),
        }
    }

    pub fn array(elem: Type) -> Type {
        Type::Array(Box::new(elem))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    pub fn is(&self, primitive: Primitive) -> bool {
        matches!(self, Type::Primitive(p) if *p == primitive)
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        match self {
            Type::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    /// Translate a type annotation that only mentions built-in names.
    /// Returns `None` at the first user-defined name.
    pub fn from_builtin_expr(expr: &TypeExpr) -> Option<Type> {
        Some(match expr {
            TypeExpr::Named(ident) => match ident.name.as_str() {
                "Void" => Type::Void,
                "Any" => Type::Unknown,
                name => Type::Primitive(Primitive::from_name(name)?),
            },
            TypeExpr::Array(elem) => Type::array(Type::from_builtin_expr(elem)?),
            TypeExpr::Chan(elem) => Type::Chan(Box::new(Type::from_builtin_expr(elem)?)),
            TypeExpr::Function { params, ret } => Type::function(
                params
                    .iter()
                    .map(Type::from_builtin_expr)
                    .collect::<Option<Vec<_>>>()?,
                Type::from_builtin_expr(ret)?,
            ),
        })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => f.write_str(p.name()),
            Type::Class(name) | Type::Enum(name) => f.write_str(name),
            Type::ClassRef(name) => write!(f, "class {name}"),
            Type::Function { params, ret } => {
                f.write_str("fn(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, "): {ret}")
            }
            Type::Array(elem) => write!(f, "{elem}[]"),
            Type::Chan(elem) => write!(f, "chan {elem}"),
            Type::EnumMember {
                enum_name, member, ..
            } => write!(f, "{enum_name}.{member}"),
            Type::Unknown => f.write_str("Any"),
            Type::Void => f.write_str("Void"),
        }
    }
}

/// How many arguments a callable accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub required: usize,
    /// `None` when a rest parameter soaks up the tail.
    pub max: Option<usize>,
}

impl Arity {
    pub fn exact(count: usize) -> Arity {
        Arity {
            required: count,
            max: Some(count),
        }
    }

    pub fn variadic(required: usize) -> Arity {
        Arity {
            required,
            max: None,
        }
    }

    pub fn accepts(self, count: usize) -> bool {
        count >= self.required && self.max.is_none_or(|max| count <= max)
    }
}

/// Result of an assignability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignability {
    /// Same type (or `Unknown` on either side).
    Equal,
    /// Allowed through an implicit conversion or a structural rule.
    Implicit,
    NotAssignable,
}

const IMPLICIT_CONVERSIONS: &[(Primitive, Primitive)] = &[
    (Primitive::Byte, Primitive::Int),
    (Primitive::Byte, Primitive::Float),
    (Primitive::Byte, Primitive::Num),
    (Primitive::Int, Primitive::Float),
    (Primitive::Int, Primitive::Num),
    (Primitive::Float, Primitive::Num),
    (Primitive::Char, Primitive::Str),
];

/// Conversions `of` accepts in either direction on top of assignability.
const EXPLICIT_CASTS: &[(Primitive, Primitive)] = &[
    (Primitive::Float, Primitive::Int),
    (Primitive::Int, Primitive::Byte),
    (Primitive::Int, Primitive::Char),
    (Primitive::Num, Primitive::Int),
    (Primitive::Num, Primitive::Float),
    (Primitive::Str, Primitive::Int),
    (Primitive::Str, Primitive::Float),
    (Primitive::Str, Primitive::Bool),
    (Primitive::Bool, Primitive::Int),
];

pub fn assignability(source: &Type, target: &Type) -> Assignability {
    use Assignability::*;

    if source.is_unknown() || target.is_unknown() || source == target {
        return Equal;
    }

    match (source, target) {
        (Type::Primitive(Primitive::Nul), Type::Class(_) | Type::Array(_)) => Implicit,
        (Type::Primitive(from), Type::Primitive(to)) => {
            if IMPLICIT_CONVERSIONS.contains(&(*from, *to)) {
                Implicit
            } else {
                NotAssignable
            }
        }
        (
            Type::Function {
                params: source_params,
                ret: source_ret,
            },
            Type::Function {
                params: target_params,
                ret: target_ret,
            },
        ) => {
            if source_params.len() != target_params.len() {
                return NotAssignable;
            }
            // parameters are contravariant
            let params_ok = source_params
                .iter()
                .zip(target_params)
                .all(|(s, t)| is_assignable(t, s));
            if params_ok && is_assignable(source_ret, target_ret) {
                Implicit
            } else {
                NotAssignable
            }
        }
        // Class compatibility is by name only; `Dog` is not a `Animal` here.
        (Type::Class(a), Type::Class(b)) if a == b => Equal,
        (Type::Array(a), Type::Array(b)) | (Type::Chan(a), Type::Chan(b)) => {
            if is_assignable(a, b) {
                Implicit
            } else {
                NotAssignable
            }
        }
        (Type::EnumMember { enum_name, .. }, Type::Enum(target)) if enum_name == target => {
            Implicit
        }
        _ => NotAssignable,
    }
}

pub fn is_assignable(source: &Type, target: &Type) -> bool {
    assignability(source, target) != Assignability::NotAssignable
}

/// Whether `value of target` is a legal cast from `source`.
pub fn is_valid_cast(source: &Type, target: &Type) -> bool {
    if source.is_unknown() || is_assignable(source, target) {
        return true;
    }
    match (source, target) {
        (Type::Primitive(from), Type::Primitive(to)) => {
            EXPLICIT_CASTS.contains(&(*from, *to)) || EXPLICIT_CASTS.contains(&(*to, *from))
        }
        (Type::Class(_), Type::Class(_)) => true,
        _ => false,
    }
}

/// Result type of a binary operator.
pub fn binary_result(op: BinaryOp, left: &Type, right: &Type) -> Type {
    if op.is_comparison() || op.is_logical() {
        return Type::BOOL;
    }
    if op == BinaryOp::Add && (left.is(Primitive::Str) || right.is(Primitive::Str)) {
        return Type::STR;
    }
    if left.is(Primitive::Float) || right.is(Primitive::Float) {
        return Type::FLOAT;
    }
    if left.is(Primitive::Int) && right.is(Primitive::Int) {
        return Type::INT;
    }
    if left.is_unknown() || right.is_unknown() {
        return Type::Unknown;
    }
    Type::NUM
}

/// Least common supertype of two branch types, as used for `if` and
/// `when` expressions.
///
/// * lcs(T, T)       = T
/// * lcs(Unknown, T) = Unknown
/// * lcs(S, T)       = T when S converts to T implicitly (and vice versa)
pub fn least_common_supertype(a: &Type, b: &Type) -> Option<Type> {
    if a.is_unknown() || b.is_unknown() {
        return Some(Type::Unknown);
    }
    if a == b {
        return Some(a.clone());
    }
    if is_assignable(a, b) {
        return Some(b.clone());
    }
    if is_assignable(b, a) {
        return Some(a.clone());
    }
    match (a, b) {
        (
            Type::EnumMember { enum_name: x, .. },
            Type::EnumMember { enum_name: y, .. },
        ) if x == y => Some(Type::Enum(x.clone())),
        _ => None,
    }
}
