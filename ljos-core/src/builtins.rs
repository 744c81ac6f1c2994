//! Built-in names visible to Ljos programs.
//!
//! Three tables live here:
//!
//! * [`GLOBALS`], the prelude every file sees without importing;
//! * [`STD_MODULES`], the fixed export lists of the `std:` modules, typed
//!   after the native runtime headers (`ljos::io`, `ljos::str`,
//!   `ljos::math`, `ljos::fs`) plus the concurrency modules;
//! * [`NATIVE_STRING_FUNCTIONS`], the calls the native backend knows to
//!   return `std::string`.
//!
//! Signatures are written as Ljos type annotations and parsed on demand.

use crate::parser::parse_type_source;
use crate::types::{Arity, Type};

/// Metadata about a single built-in symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinDescriptor {
    pub name: &'static str,
    /// Type annotation text, or `None` for host objects typed `Any`.
    pub signature: Option<&'static str>,
    /// Trailing arguments beyond the signature are accepted.
    pub variadic: bool,
}

impl BuiltinDescriptor {
    const fn object(name: &'static str) -> Self {
        BuiltinDescriptor {
            name,
            signature: None,
            variadic: false,
        }
    }

    const fn function(name: &'static str, signature: &'static str) -> Self {
        BuiltinDescriptor {
            name,
            signature: Some(signature),
            variadic: false,
        }
    }

    const fn value(name: &'static str, ty: &'static str) -> Self {
        BuiltinDescriptor {
            name,
            signature: Some(ty),
            variadic: false,
        }
    }

    const fn variadic(name: &'static str, signature: &'static str) -> Self {
        BuiltinDescriptor {
            name,
            signature: Some(signature),
            variadic: true,
        }
    }

    /// The checker's view of this symbol. Unparseable signatures degrade
    /// to `Any`.
    pub fn ty(&self) -> Type {
        self.signature
            .and_then(|sig| parse_type_source(sig).ok())
            .and_then(|expr| Type::from_builtin_expr(&expr))
            .unwrap_or(Type::Unknown)
    }

    pub fn arity(&self) -> Option<Arity> {
        let Type::Function { params, .. } = self.ty() else {
            return None;
        };
        Some(if self.variadic {
            Arity::variadic(params.len().saturating_sub(1))
        } else {
            Arity::exact(params.len())
        })
    }
}

/// The global prelude.
pub const GLOBALS: &[BuiltinDescriptor] = &[
    BuiltinDescriptor::variadic("print", "fn(Any): Void"),
    BuiltinDescriptor::variadic("println", "fn(Any): Void"),
    BuiltinDescriptor::object("console"),
    BuiltinDescriptor::object("Math"),
    BuiltinDescriptor::object("JSON"),
    BuiltinDescriptor::object("Object"),
    BuiltinDescriptor::object("Array"),
    BuiltinDescriptor::object("String"),
    BuiltinDescriptor::object("Number"),
    BuiltinDescriptor::object("Boolean"),
    BuiltinDescriptor::object("Promise"),
    BuiltinDescriptor::object("Error"),
    BuiltinDescriptor::object("TypeError"),
    BuiltinDescriptor::object("Map"),
    BuiltinDescriptor::object("Set"),
    BuiltinDescriptor::object("Date"),
    BuiltinDescriptor::object("parseInt"),
    BuiltinDescriptor::object("parseFloat"),
    BuiltinDescriptor::object("isNaN"),
    BuiltinDescriptor::object("setTimeout"),
    BuiltinDescriptor::object("clearTimeout"),
    BuiltinDescriptor::function("len", "fn(Any): Int"),
];

pub fn find_global(name: &str) -> Option<&'static BuiltinDescriptor> {
    GLOBALS.iter().find(|b| b.name == name)
}

/// A `std:<name>` module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StdModule {
    pub name: &'static str,
    pub exports: &'static [BuiltinDescriptor],
}

impl StdModule {
    pub fn export(&self, name: &str) -> Option<&'static BuiltinDescriptor> {
        self.exports.iter().find(|e| e.name == name)
    }

    pub fn export_names(&self) -> impl Iterator<Item = &'static str> {
        self.exports.iter().map(|e| e.name)
    }
}

use BuiltinDescriptor as B;

const IO: &[BuiltinDescriptor] = &[
    B::variadic("print", "fn(Any): Void"),
    B::variadic("println", "fn(Any): Void"),
    B::function("eprint", "fn(Str): Void"),
    B::function("eprintln", "fn(Str): Void"),
    B::function("readln", "fn(): Str"),
    B::function("readInt", "fn(): Int"),
    B::function("readFloat", "fn(): Float"),
    B::variadic("format", "fn(Str, Any): Str"),
    B::function("dbg", "fn(Any): Any"),
];

const STR: &[BuiltinDescriptor] = &[
    B::function("len", "fn(Str): Int"),
    B::function("isEmpty", "fn(Str): Bool"),
    B::function("charAt", "fn(Str, Int): Char"),
    B::variadic("substring", "fn(Str, Int, Int): Str"),
    B::variadic("slice", "fn(Str, Int, Int): Str"),
    B::variadic("indexOf", "fn(Str, Str, Int): Int"),
    B::function("lastIndexOf", "fn(Str, Str): Int"),
    B::function("contains", "fn(Str, Str): Bool"),
    B::function("startsWith", "fn(Str, Str): Bool"),
    B::function("endsWith", "fn(Str, Str): Bool"),
    B::function("toUpper", "fn(Str): Str"),
    B::function("toLower", "fn(Str): Str"),
    B::function("capitalize", "fn(Str): Str"),
    B::function("trimLeft", "fn(Str): Str"),
    B::function("trimRight", "fn(Str): Str"),
    B::function("trim", "fn(Str): Str"),
    B::variadic("split", "fn(Str, Str): Str[]"),
    B::variadic("join", "fn(Str[], Str): Str"),
    B::function("replace", "fn(Str, Str, Str): Str"),
    B::function("replaceFirst", "fn(Str, Str, Str): Str"),
    B::function("repeat", "fn(Str, Int): Str"),
    B::variadic("padLeft", "fn(Str, Int, Str): Str"),
    B::variadic("padRight", "fn(Str, Int, Str): Str"),
    B::variadic("toInt", "fn(Str, Int): Int"),
    B::variadic("toFloat", "fn(Str, Float): Float"),
    B::function("fromInt", "fn(Int): Str"),
    B::function("fromFloat", "fn(Float): Str"),
    B::function("isDigit", "fn(Char): Bool"),
    B::function("isAlpha", "fn(Char): Bool"),
    B::function("isAlnum", "fn(Char): Bool"),
    B::function("isSpace", "fn(Char): Bool"),
    B::function("isNumeric", "fn(Str): Bool"),
    B::function("reverse", "fn(Str): Str"),
];

const MATH: &[BuiltinDescriptor] = &[
    B::value("PI", "Float"),
    B::value("E", "Float"),
    B::value("TAU", "Float"),
    B::value("SQRT2", "Float"),
    B::value("LN2", "Float"),
    B::value("LN10", "Float"),
    B::function("abs", "fn(Num): Num"),
    B::function("floor", "fn(Float): Float"),
    B::function("ceil", "fn(Float): Float"),
    B::function("round", "fn(Float): Float"),
    B::function("trunc", "fn(Float): Float"),
    B::function("min", "fn(Num, Num): Num"),
    B::function("max", "fn(Num, Num): Num"),
    B::function("clamp", "fn(Num, Num, Num): Num"),
    B::function("pow", "fn(Float, Float): Float"),
    B::function("sqrt", "fn(Float): Float"),
    B::function("cbrt", "fn(Float): Float"),
    B::function("exp", "fn(Float): Float"),
    B::function("log", "fn(Float): Float"),
    B::function("sin", "fn(Float): Float"),
    B::function("cos", "fn(Float): Float"),
    B::function("tan", "fn(Float): Float"),
    B::function("asin", "fn(Float): Float"),
    B::function("acos", "fn(Float): Float"),
    B::function("atan", "fn(Float): Float"),
    B::function("sinh", "fn(Float): Float"),
    B::function("cosh", "fn(Float): Float"),
    B::function("tanh", "fn(Float): Float"),
    B::function("toRadians", "fn(Float): Float"),
    B::function("toDegrees", "fn(Float): Float"),
    B::function("random", "fn(): Float"),
    B::function("randomInt", "fn(Int, Int): Int"),
    B::function("randomFloat", "fn(Float, Float): Float"),
    B::function("seed", "fn(Int): Void"),
    B::function("isNaN", "fn(Float): Bool"),
    B::function("isInf", "fn(Float): Bool"),
    B::function("isFinite", "fn(Float): Bool"),
    B::function("sign", "fn(Float): Int"),
    B::function("gcd", "fn(Int, Int): Int"),
    B::function("lcm", "fn(Int, Int): Int"),
    B::function("factorial", "fn(Int): Int"),
    B::function("fibonacci", "fn(Int): Int"),
    B::function("isPrime", "fn(Int): Bool"),
];

const FS: &[BuiltinDescriptor] = &[
    B::function("readFile", "fn(Str): Str"),
    B::function("writeFile", "fn(Str, Str): Bool"),
    B::function("appendFile", "fn(Str, Str): Bool"),
    B::function("readLines", "fn(Str): Str[]"),
    B::function("exists", "fn(Str): Bool"),
    B::function("isFile", "fn(Str): Bool"),
    B::function("isDir", "fn(Str): Bool"),
    B::function("fileSize", "fn(Str): Int"),
    B::function("extension", "fn(Str): Str"),
    B::function("filename", "fn(Str): Str"),
    B::function("parent", "fn(Str): Str"),
    B::function("absolute", "fn(Str): Str"),
    B::function("cwd", "fn(): Str"),
    B::function("chdir", "fn(Str): Bool"),
    B::function("mkdir", "fn(Str): Bool"),
    B::function("mkdirp", "fn(Str): Bool"),
    B::function("remove", "fn(Str): Bool"),
    B::function("removeAll", "fn(Str): Int"),
    B::function("copy", "fn(Str, Str): Bool"),
    B::function("move", "fn(Str, Str): Bool"),
    B::function("listDir", "fn(Str): Str[]"),
];

const CHAN: &[BuiltinDescriptor] = &[
    B::object("Channel"),
    B::object("select"),
    B::object("go"),
    B::object("range"),
];

const SYNC: &[BuiltinDescriptor] = &[
    B::object("Lock"),
    B::object("WaitGroup"),
    B::object("DeferStack"),
];

pub const STD_MODULES: &[StdModule] = &[
    StdModule {
        name: "io",
        exports: IO,
    },
    StdModule {
        name: "str",
        exports: STR,
    },
    StdModule {
        name: "math",
        exports: MATH,
    },
    StdModule {
        name: "fs",
        exports: FS,
    },
    StdModule {
        name: "chan",
        exports: CHAN,
    },
    StdModule {
        name: "sync",
        exports: SYNC,
    },
];

pub fn find_std_module(name: &str) -> Option<&'static StdModule> {
    STD_MODULES.iter().find(|m| m.name == name)
}

/// Calls the native backend treats as producing `std::string`.
pub const NATIVE_STRING_FUNCTIONS: &[&str] = &[
    "substring",
    "slice",
    "toUpper",
    "toLower",
    "capitalize",
    "trimLeft",
    "trimRight",
    "trim",
    "join",
    "replace",
    "replaceFirst",
    "repeat",
    "padLeft",
    "padRight",
    "fromInt",
    "fromFloat",
    "reverse",
    "readln",
    "extension",
    "filename",
    "parent",
    "absolute",
    "cwd",
    "format",
    "toString",
];

pub fn is_native_string_function(name: &str) -> bool {
    NATIVE_STRING_FUNCTIONS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_signature_parses() {
        let all = GLOBALS
            .iter()
            .chain(STD_MODULES.iter().flat_map(|m| m.exports.iter()));
        for builtin in all {
            if builtin.signature.is_some() {
                assert_ne!(builtin.ty(), Type::Unknown, "{}", builtin.name);
            }
        }
    }

    #[test]
    fn println_is_variadic() {
        let println = find_global("println").expect("println");
        assert!(println.arity().expect("callable").accepts(3));
        let len = find_global("len").expect("len");
        assert!(!len.arity().expect("callable").accepts(2));
    }

    #[test]
    fn std_exports_are_typed() {
        let io = find_std_module("io").expect("io");
        assert_eq!(
            io.export("readln").map(|e| e.ty()),
            Some(Type::function(vec![], Type::STR))
        );
        assert!(find_std_module("str").expect("str").export("trim").is_some());
        assert!(find_std_module("net").is_none());
    }

    #[test]
    fn native_string_whitelist() {
        assert!(is_native_string_function("toUpper"));
        assert!(!is_native_string_function("len"));
    }
}
