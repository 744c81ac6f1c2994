//! Native target: C++17 source.
//!
//! The output includes the `ljos::io`, `ljos::str`, `ljos::math` and
//! `ljos::fs` runtime headers. Class instances have value semantics, so
//! `new C(x)` becomes `C(x)`. Top-level declarations stay at namespace
//! scope and every other top-level statement runs in `int main()`.
//!
//! Constructs with no C++ lowering are reported as `E0401` and the whole
//! program is rejected.

use std::collections::{HashMap, HashSet};

use crate::ast::{
    BinaryOp, ClassDecl, ClassMember, EnumDecl, ExportDecl, Expr, ExprKind, ImportDecl,
    LambdaBody, MemberKind, Param, Pattern, Program, Stmt, StmtKind, TemplatePart, TypeExpr,
    UnaryOp, VarDecl, Visibility, When, WhenBody, int_literal_value,
};
use crate::builtins::is_native_string_function;
use crate::diagnostic::Diagnostic;
use crate::span::Span;
use crate::stdlib::std_module_name;

const P_ASSIGN: u8 = 2;
const P_OR: u8 = 3;
const P_AND: u8 = 4;
const P_EQ: u8 = 8;
const P_REL: u8 = 9;
const P_ADD: u8 = 11;
const P_MUL: u8 = 12;
const P_UNARY: u8 = 14;
const P_CALL: u8 = 17;
const P_PRIMARY: u8 = 18;

const PRELUDE: &str = r#"#include <functional>
#include <sstream>
#include <stdexcept>
#include <string>
#include <vector>

#include "ljos/std/io.hpp"
#include "ljos/std/string.hpp"
#include "ljos/std/math.hpp"
#include "ljos/std/fs.hpp"

template <typename T>
std::string __ljos_str(const T& value) {
  std::ostringstream out;
  out << value;
  return out.str();
}
inline std::string __ljos_str(const std::string& value) { return value; }
inline std::string __ljos_str(bool value) { return value ? "true" : "false"; }
"#;

pub fn generate_native(program: &Program) -> Result<String, Vec<Diagnostic>> {
    let mut generator = NativeGenerator::default();
    generator.collect(&program.body);
    let text = generator.program(&program.body);
    if generator.diagnostics.is_empty() {
        Ok(text)
    } else {
        Err(generator.diagnostics)
    }
}

/// Shape of a `+` operand, for choosing between numeric addition and
/// string concatenation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    StringLike,
    Numeric,
    StringCall,
    Other,
}

fn classify(expr: &Expr) -> Operand {
    match &expr.kind {
        ExprKind::Str(_) | ExprKind::Template(_) => Operand::StringLike,
        ExprKind::Int(_) | ExprKind::Float(_) => Operand::Numeric,
        ExprKind::Call { callee, .. } if callee_name(callee).is_some_and(is_native_string_function) => {
            Operand::StringCall
        }
        ExprKind::Binary {
            op: BinaryOp::Add, ..
        } if is_concatenation(expr) => Operand::StringLike,
        _ => Operand::Other,
    }
}

fn is_concatenation(expr: &Expr) -> bool {
    let ExprKind::Binary {
        op: BinaryOp::Add,
        left,
        right,
    } = &expr.kind
    else {
        return false;
    };
    [left, right]
        .iter()
        .any(|e| matches!(classify(e), Operand::StringLike | Operand::StringCall))
}

fn callee_name(callee: &Expr) -> Option<&str> {
    match &callee.kind {
        ExprKind::Ident(name) => Some(name),
        ExprKind::Member { property, .. } => Some(&property.name),
        _ => None,
    }
}

#[derive(Default)]
struct NativeGenerator {
    out: String,
    indent: usize,
    next_temp: usize,
    diagnostics: Vec<Diagnostic>,
    classes: HashSet<String>,
    plain_enums: HashSet<String>,
    /// Local name of an imported std function -> qualified C++ name.
    std_names: HashMap<String, String>,
    /// `import * as m from "std:..."` aliases.
    namespaces: HashSet<String>,
    /// Superclass of the class being emitted.
    superclass: Option<String>,
}

impl NativeGenerator {
    fn unsupported(&mut self, what: &str, span: Span) {
        self.diagnostics.push(
            Diagnostic::error(format!("{what}: not supported by the native target"), span)
                .with_code("E0401"),
        );
    }

    fn temp(&mut self, prefix: &str) -> String {
        let name = format!("__{prefix}{}", self.next_temp);
        self.next_temp += 1;
        name
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn capture(&mut self, body: impl FnOnce(&mut Self)) -> String {
        let saved = std::mem::take(&mut self.out);
        body(self);
        std::mem::replace(&mut self.out, saved)
    }

    fn braced(&mut self, body: impl FnOnce(&mut Self)) -> String {
        self.indent += 1;
        let inner = self.capture(body);
        self.indent -= 1;
        let mut text = format!("{{\n{inner}");
        for _ in 0..self.indent {
            text.push_str("  ");
        }
        text.push('}');
        text
    }

    fn block(&mut self, stmts: &[Stmt]) -> String {
        self.braced(|g| g.statements(stmts))
    }

    // -----------------------------------------------------------------
    // Program
    // -----------------------------------------------------------------

    fn collect(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            let stmt = match &stmt.kind {
                StmtKind::Export(ExportDecl::Decl(inner)) => inner.as_ref(),
                _ => stmt,
            };
            match &stmt.kind {
                StmtKind::Class(class) => {
                    self.classes.insert(class.name.name.clone());
                }
                StmtKind::Enum(decl) if !decl.is_tagged() => {
                    self.plain_enums.insert(decl.name.name.clone());
                }
                _ => {}
            }
        }
    }

    fn program(&mut self, stmts: &[Stmt]) -> String {
        let mut text = String::from(PRELUDE);
        let mut main = Vec::new();
        let declarations = self.capture(|g| {
            for stmt in stmts {
                let stmt = match &stmt.kind {
                    StmtKind::Export(ExportDecl::Decl(inner)) => inner.as_ref(),
                    StmtKind::Export(_) => continue,
                    _ => stmt,
                };
                match &stmt.kind {
                    StmtKind::Import(import) => g.import(import, stmt.span),
                    StmtKind::Function(_) | StmtKind::Class(_) | StmtKind::Enum(_) => {
                        g.line("");
                        g.statement(stmt);
                    }
                    StmtKind::Var(decl) if !decl.mutable => match g.global_constant(decl) {
                        Some(text) => g.line(&text),
                        None => main.push(stmt),
                    },
                    _ => main.push(stmt),
                }
            }
        });
        text.push_str(&declarations);
        let body = self.braced(|g| {
            for stmt in main {
                g.statement(stmt);
            }
            g.line("return 0;");
        });
        text.push_str(&format!("\nint main() {body}\n"));
        text
    }

    /// Top-level `const` with a literal initializer, as a namespace-scope
    /// constant visible to functions.
    fn global_constant(&self, decl: &VarDecl) -> Option<String> {
        let init = decl.init.as_ref()?;
        let ty = literal_type(init)?;
        let value = match &init.kind {
            ExprKind::Int(text) => int_literal_value(text)?.to_string(),
            ExprKind::Float(text) => text.clone(),
            ExprKind::Str(value) => cpp_string(value),
            ExprKind::Bool(value) => value.to_string(),
            _ => return None,
        };
        Some(format!("const {ty} {} = {value};", decl.name.name))
    }

    fn import(&mut self, import: &ImportDecl, span: Span) {
        let Some(module) = std_module_name(&import.source) else {
            self.unsupported(&format!("import of '{}'", import.source), span);
            return;
        };
        let namespace = match module {
            "io" | "str" | "math" | "fs" => format!("ljos::{module}"),
            _ => {
                self.unsupported(&format!("'std:{module}'"), span);
                return;
            }
        };
        if let Some(alias) = &import.namespace {
            self.namespaces.insert(alias.name.clone());
            self.line(&format!("namespace {} = {namespace};", alias.name));
        }
        for name in &import.named {
            self.std_names.insert(
                name.local().name.clone(),
                format!("{namespace}::{}", name.name.name),
            );
        }
    }

    // -----------------------------------------------------------------
    // Types
    // -----------------------------------------------------------------

    fn cpp_type(&mut self, ty: &TypeExpr, span: Span) -> String {
        match ty {
            TypeExpr::Named(name) => match name.name.as_str() {
                "Int" => "long long".to_string(),
                "Float" | "Num" => "double".to_string(),
                "Str" => "std::string".to_string(),
                "Bool" => "bool".to_string(),
                "Char" => "char".to_string(),
                "Byte" => "unsigned char".to_string(),
                "Void" => "void".to_string(),
                "Nul" => "std::nullptr_t".to_string(),
                "Any" => "auto".to_string(),
                other => other.to_string(),
            },
            TypeExpr::Array(elem) => format!("std::vector<{}>", self.cpp_type(elem, span)),
            TypeExpr::Function { params, ret } => {
                let params: Vec<String> = params.iter().map(|p| self.cpp_type(p, span)).collect();
                let ret = self.cpp_type(ret, span);
                format!("std::function<{ret}({})>", params.join(", "))
            }
            TypeExpr::Chan(_) => {
                self.unsupported("channel types", span);
                "void".to_string()
            }
        }
    }

    /// Parameter list; untyped parameters become template parameters.
    fn params(&mut self, params: &[Param]) -> (Vec<String>, String) {
        let mut templates = Vec::new();
        let mut list = Vec::new();
        for param in params {
            let ty = match &param.ty {
                Some(ty) => self.cpp_type(ty, param.name.span),
                None => {
                    let name = format!("T{}", templates.len());
                    templates.push(format!("typename {name}"));
                    if param.rest {
                        format!("std::vector<{name}>")
                    } else {
                        name
                    }
                }
            };
            let mut text = format!("{ty} {}", param.name.name);
            if let Some(default) = &param.default {
                text.push_str(&format!(" = {}", self.expr_min(default, P_ASSIGN)));
            }
            list.push(text);
        }
        (templates, list.join(", "))
    }

    fn lambda_params(&mut self, params: &[Param]) -> String {
        params
            .iter()
            .map(|param| {
                let ty = match &param.ty {
                    Some(ty) => self.cpp_type(ty, param.name.span),
                    None => "auto".to_string(),
                };
                format!("{ty} {}", param.name.name)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn return_type(&mut self, ret: &Option<TypeExpr>, span: Span) -> String {
        match ret {
            Some(ty) => self.cpp_type(ty, span),
            None => "auto".to_string(),
        }
    }

    // -----------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------

    fn statements(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.statement(stmt);
        }
    }

    fn statement(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Var(decl) => {
                let prefix = if decl.mutable { "" } else { "const " };
                let ty = match &decl.ty {
                    Some(ty) => self.cpp_type(ty, decl.name.span),
                    None => "auto".to_string(),
                };
                match &decl.init {
                    Some(init) => {
                        let init = self.expr_min(init, P_ASSIGN);
                        self.line(&format!("{prefix}{ty} {} = {init};", decl.name.name));
                    }
                    None if decl.ty.is_some() => {
                        self.line(&format!("{ty} {}{{}};", decl.name.name));
                    }
                    None => self.unsupported(
                        &format!("'mut {}' without a type or initializer", decl.name.name),
                        stmt.span,
                    ),
                }
            }
            StmtKind::Function(func) if self.indent == 0 => {
                let (templates, params) = self.params(&func.params);
                let ret = self.return_type(&func.ret, func.name.span);
                if !templates.is_empty() {
                    self.line(&format!("template <{}>", templates.join(", ")));
                }
                let body = self.block(&func.body);
                self.line(&format!("{ret} {}({params}) {body}", func.name.name));
            }
            StmtKind::Function(func) => {
                // nested functions become local lambdas
                let params = self.lambda_params(&func.params);
                let body = self.block(&func.body);
                self.line(&format!("auto {} = [&]({params}) {body};", func.name.name));
            }
            StmtKind::Class(class) => self.class(class),
            StmtKind::Enum(decl) => self.enumeration(decl, stmt.span),
            StmtKind::Block(body) => {
                let text = self.block(body);
                self.line(&text);
            }
            StmtKind::If { .. } => {
                let text = self.if_chain(stmt);
                self.line(&text);
            }
            StmtKind::While { cond, body } => {
                let cond = self.expr(cond);
                let body = self.block(body);
                self.line(&format!("while ({cond}) {body}"));
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                let init = match init.as_deref() {
                    Some(Stmt {
                        kind: StmtKind::Var(decl),
                        ..
                    }) => {
                        let ty = match &decl.ty {
                            Some(ty) => self.cpp_type(ty, decl.name.span),
                            None => "auto".to_string(),
                        };
                        let value = decl
                            .init
                            .as_ref()
                            .map(|e| self.expr_min(e, P_ASSIGN))
                            .unwrap_or_else(|| "{}".to_string());
                        format!("{ty} {} = {value}", decl.name.name)
                    }
                    Some(Stmt {
                        kind: StmtKind::Expression(expr),
                        ..
                    }) => self.expr(expr),
                    _ => String::new(),
                };
                let cond = cond.as_ref().map(|c| self.expr(c)).unwrap_or_default();
                let update = update.as_ref().map(|u| self.expr(u)).unwrap_or_default();
                let body = self.block(body);
                self.line(&format!("for ({init}; {cond}; {update}) {body}"));
            }
            StmtKind::ForIn {
                binding,
                iterable,
                body,
            } => {
                let head = match &iterable.kind {
                    ExprKind::Range { start, end } => {
                        let start = self.expr_min(start, P_ASSIGN);
                        let end = self.expr_min(end, P_REL + 1);
                        let x = &binding.name;
                        format!("for (long long {x} = {start}; {x} < {end}; {x}++)")
                    }
                    _ => {
                        let iterable = self.expr(iterable);
                        format!("for (const auto& {} : {iterable})", binding.name)
                    }
                };
                let body = self.block(body);
                self.line(&format!("{head} {body}"));
            }
            StmtKind::When(when) => self.when(when, false),
            StmtKind::Return(Some(value)) => {
                let value = self.expr(value);
                self.line(&format!("return {value};"));
            }
            StmtKind::Return(None) => self.line("return;"),
            StmtKind::Break => self.line("break;"),
            StmtKind::Continue => self.line("continue;"),
            StmtKind::Throw(value) => {
                let value = self.expr_min(value, P_ASSIGN);
                self.line(&format!("throw std::runtime_error(__ljos_str({value}));"));
            }
            StmtKind::Try {
                body,
                catch,
                finally,
            } => {
                if finally.is_some() {
                    self.unsupported("'finally'", stmt.span);
                }
                let mut text = format!("try {}", self.block(body));
                match catch {
                    Some(clause) => {
                        let body = self.block(&clause.body);
                        match &clause.param {
                            Some(param) => text.push_str(&format!(
                                " catch (const std::exception& {}) {body}",
                                param.name
                            )),
                            None => text.push_str(&format!(" catch (...) {body}")),
                        }
                    }
                    None => text.push_str(" catch (...) {\n}"),
                }
                self.line(&text);
            }
            StmtKind::Import(import) => self.import(import, stmt.span),
            StmtKind::Export(ExportDecl::Decl(inner)) => self.statement(inner),
            StmtKind::Export(_) => {}
            StmtKind::Defer(_) => self.unsupported("'defer'", stmt.span),
            StmtKind::Using { .. } => self.unsupported("'using'", stmt.span),
            StmtKind::Expression(expr) => {
                let text = self.expr(expr);
                self.line(&format!("{text};"));
            }
            StmtKind::Empty => {}
        }
    }

    fn if_chain(&mut self, stmt: &Stmt) -> String {
        let StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } = &stmt.kind
        else {
            return self.braced(|g| g.statement(stmt));
        };
        let cond = self.expr(cond);
        let mut text = format!("if ({cond}) {}", self.block(then_branch));
        if let Some(other) = else_branch {
            let rest = match &other.kind {
                StmtKind::If { .. } => self.if_chain(other),
                StmtKind::Block(body) => self.block(body),
                _ => self.braced(|g| g.statement(other)),
            };
            text.push_str(" else ");
            text.push_str(&rest);
        }
        text
    }

    // -----------------------------------------------------------------
    // Classes and enums
    // -----------------------------------------------------------------

    fn class(&mut self, class: &ClassDecl) {
        let name = class.name.name.clone();
        let saved = std::mem::replace(
            &mut self.superclass,
            class.superclass.as_ref().map(|s| s.name.clone()),
        );

        let mut sections: [(Visibility, Vec<String>); 3] = [
            (Visibility::Public, Vec::new()),
            (Visibility::Protected, Vec::new()),
            (Visibility::Private, Vec::new()),
        ];
        self.indent += 1;
        let polymorphic = class.is_abstract
            || class.superclass.is_some()
            || class
                .members
                .iter()
                .any(|m| matches!(m.kind, MemberKind::Method { .. }) && !m.is_static);
        if polymorphic {
            sections[0].1.push(self.capture(|g| g.line(&format!("virtual ~{name}() = default;"))));
        }
        for member in &class.members {
            let text = self.capture(|g| g.member(class, member));
            let visibility = match member.kind {
                MemberKind::Constructor { .. } if class.is_abstract => Visibility::Protected,
                _ => member.visibility,
            };
            if let Some((_, lines)) = sections.iter_mut().find(|(v, _)| *v == visibility) {
                lines.push(text);
            }
        }
        if class.is_abstract && class.constructor().is_none() {
            let text = self.capture(|g| g.line(&format!("{name}() = default;")));
            sections[1].1.push(text);
        }
        self.indent -= 1;

        let head = match &class.superclass {
            Some(base) => format!("class {name} : public {} {{", base.name),
            None => format!("class {name} {{"),
        };
        self.line(&head);
        for (visibility, lines) in sections {
            if lines.is_empty() {
                continue;
            }
            let label = match visibility {
                Visibility::Public => "public:",
                Visibility::Protected => "protected:",
                Visibility::Private => "private:",
            };
            self.line(label);
            for text in lines {
                self.out.push_str(&text);
            }
        }
        self.line("};");
        self.superclass = saved;
    }

    fn member(&mut self, class: &ClassDecl, member: &ClassMember) {
        let is_static = member.is_static;
        match &member.kind {
            MemberKind::Field {
                mutable,
                name,
                ty,
                init,
            } => {
                let ty = match (ty, init) {
                    (Some(ty), _) => self.cpp_type(ty, name.span),
                    (None, Some(init)) => match literal_type(init) {
                        Some(ty) => ty.to_string(),
                        None => {
                            self.unsupported(&format!("untyped field '{}'", name.name), member.span);
                            return;
                        }
                    },
                    (None, None) => {
                        self.unsupported(&format!("untyped field '{}'", name.name), member.span);
                        return;
                    }
                };
                let mut prefix = String::new();
                if is_static {
                    prefix.push_str("static inline ");
                }
                if !mutable {
                    prefix.push_str("const ");
                }
                match init {
                    Some(init) => {
                        let init = self.expr_min(init, P_ASSIGN);
                        self.line(&format!("{prefix}{ty} {} = {init};", name.name));
                    }
                    None => self.line(&format!("{prefix}{ty} {}{{}};", name.name)),
                }
            }
            MemberKind::Method {
                name,
                params,
                ret,
                body,
            } => {
                let (templates, param_list) = self.params(params);
                let typed = templates.is_empty() && ret.is_some();
                let ret = self.return_type(ret, name.span);
                let Some(body) = body else {
                    if typed {
                        self.line(&format!("virtual {ret} {}({param_list}) = 0;", name.name));
                    } else {
                        self.unsupported(
                            &format!("abstract method '{}' without explicit types", name.name),
                            member.span,
                        );
                    }
                    return;
                };
                if !templates.is_empty() {
                    self.line(&format!("template <{}>", templates.join(", ")));
                }
                let prefix = if is_static {
                    "static "
                } else if typed {
                    "virtual "
                } else {
                    ""
                };
                let body = self.block(body);
                self.line(&format!("{prefix}{ret} {}({param_list}) {body}", name.name));
            }
            MemberKind::Constructor { params, body } => {
                let (templates, param_list) = self.params(params);
                if !templates.is_empty() {
                    self.line(&format!("template <{}>", templates.join(", ")));
                }
                let (init, body) = match body.split_first() {
                    Some((first, rest)) => match super_call(first) {
                        Some(args) => (Some(args), rest),
                        None => (None, body.as_slice()),
                    },
                    None => (None, body.as_slice()),
                };
                let initializer = match (init, &class.superclass) {
                    (Some(args), Some(base)) => {
                        let args: Vec<String> =
                            args.iter().map(|a| self.expr_min(a, P_ASSIGN)).collect();
                        format!(" : {}({})", base.name, args.join(", "))
                    }
                    _ => String::new(),
                };
                let body = self.block(body);
                self.line(&format!(
                    "{}({param_list}){initializer} {body}",
                    class.name.name
                ));
            }
        }
    }

    fn enumeration(&mut self, decl: &EnumDecl, span: Span) {
        if decl.is_tagged() {
            self.unsupported(&format!("tagged enum '{}'", decl.name.name), span);
            return;
        }
        let members: Vec<String> = decl
            .members
            .iter()
            .map(|member| match &member.value {
                Some(value) => format!("{} = {}", member.name.name, self.expr_min(value, P_ASSIGN)),
                None => member.name.name.clone(),
            })
            .collect();
        self.line(&format!(
            "enum class {} {{ {} }};",
            decl.name.name,
            members.join(", ")
        ));
    }

    // -----------------------------------------------------------------
    // `when`
    // -----------------------------------------------------------------

    /// An `if` chain over a subject temp. In value position every clause
    /// returns from the enclosing lambda.
    fn when(&mut self, when: &When, value: bool) {
        let subject = when.subject.as_ref().map(|s| self.expr_min(s, P_ASSIGN));
        let temp = subject.as_ref().map(|_| self.temp("w"));
        let chain = self.capture(|g| {
            if let (Some(subject), Some(temp)) = (&subject, &temp) {
                g.line(&format!("const auto& {temp} = {subject};"));
            }
            let mut text = String::new();
            for clause in &when.clauses {
                let body = g.braced(|g| match &clause.body {
                    WhenBody::Expr(expr) if value => {
                        let expr = g.expr(expr);
                        g.line(&format!("return {expr};"));
                    }
                    WhenBody::Expr(expr) => {
                        let expr = g.expr(expr);
                        g.line(&format!("{expr};"));
                    }
                    WhenBody::Block(stmts) => g.statements(stmts),
                });
                let head = match (&clause.pattern, &temp) {
                    (Pattern::Else(_), _) => None,
                    (Pattern::Literal(cond), None) => Some(g.expr(cond)),
                    (pattern, Some(temp)) => {
                        Some(g.pattern_condition(pattern, temp, &clause.guard, clause.span))
                    }
                    (_, None) => Some("true".to_string()),
                };
                if !text.is_empty() {
                    text.push_str(" else ");
                }
                match head {
                    Some(head) => text.push_str(&format!("if ({head}) {body}")),
                    None => {
                        text.push_str(&body);
                        break;
                    }
                }
            }
            if !text.is_empty() {
                g.line(&text);
            }
            if value {
                g.line("throw std::runtime_error(\"no 'when' clause matched\");");
            }
        });
        if value {
            self.out.push_str(&chain);
        } else {
            let indent = "  ".repeat(self.indent);
            self.line("{");
            for line in chain.lines() {
                self.out.push_str(&format!("  {line}\n"));
            }
            self.out.push_str(&format!("{indent}}}\n"));
        }
    }

    fn pattern_condition(
        &mut self,
        pattern: &Pattern,
        temp: &str,
        guard: &Option<Expr>,
        span: Span,
    ) -> String {
        let guard = guard.as_ref().map(|g| self.expr_min(g, P_AND + 1));
        match pattern {
            Pattern::Binding(name) => {
                let guard = guard.unwrap_or_else(|| "true".to_string());
                format!("const auto& {} = {temp}; {guard}", name.name)
            }
            _ => {
                let test = self.pattern_test(pattern, temp, span);
                match guard {
                    Some(guard) => format!("({test}) && {guard}"),
                    None => test,
                }
            }
        }
    }

    fn pattern_test(&mut self, pattern: &Pattern, temp: &str, span: Span) -> String {
        match pattern {
            Pattern::Literal(value) | Pattern::Value(value) => {
                format!("{temp} == {}", self.expr_min(value, P_EQ + 1))
            }
            Pattern::Or(alternatives) => alternatives
                .iter()
                .map(|alt| format!("({})", self.pattern_test(alt, temp, span)))
                .collect::<Vec<_>>()
                .join(" || "),
            Pattern::TypeTest(_) => {
                self.unsupported("type-test patterns", span);
                "false".to_string()
            }
            Pattern::Binding(_) | Pattern::Wildcard(_) | Pattern::Else(_) => "true".to_string(),
        }
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    fn expr(&mut self, expr: &Expr) -> String {
        self.emit(expr).0
    }

    fn expr_min(&mut self, expr: &Expr, min: u8) -> String {
        let (text, prec) = self.emit(expr);
        if prec < min { format!("({text})") } else { text }
    }

    fn emit(&mut self, expr: &Expr) -> (String, u8) {
        match &expr.kind {
            ExprKind::Int(text) => (
                int_literal_value(text).map_or_else(|| text.clone(), |v| v.to_string()),
                P_PRIMARY,
            ),
            ExprKind::Float(text) => (text.clone(), P_PRIMARY),
            ExprKind::Str(value) => (cpp_string(value), P_PRIMARY),
            ExprKind::Template(parts) => {
                let pieces: Vec<String> = parts
                    .iter()
                    .map(|part| match part {
                        TemplatePart::Text(text) => format!("std::string({})", cpp_string(text)),
                        TemplatePart::Expr(e) => format!("__ljos_str({})", self.expr_min(e, P_ASSIGN)),
                    })
                    .collect();
                match pieces.len() {
                    0 => ("std::string()".to_string(), P_CALL),
                    1 => (pieces.concat(), P_CALL),
                    _ => (pieces.join(" + "), P_ADD),
                }
            }
            ExprKind::Bool(value) => (value.to_string(), P_PRIMARY),
            ExprKind::Nul => ("nullptr".to_string(), P_PRIMARY),
            ExprKind::Ident(name) => {
                if let Some(qualified) = self.std_names.get(name) {
                    return (qualified.clone(), P_PRIMARY);
                }
                match name.as_str() {
                    "print" | "println" => (format!("ljos::io::{name}"), P_PRIMARY),
                    _ => (name.clone(), P_PRIMARY),
                }
            }
            ExprKind::This => ("(*this)".to_string(), P_PRIMARY),
            ExprKind::Super => {
                self.unsupported("'super' outside a constructor call or member access", expr.span);
                ("super".to_string(), P_PRIMARY)
            }
            ExprKind::Array(items) => {
                let items: Vec<String> = items.iter().map(|i| self.expr_min(i, P_ASSIGN)).collect();
                if items.is_empty() {
                    ("{}".to_string(), P_PRIMARY)
                } else {
                    (format!("std::vector{{{}}}", items.join(", ")), P_PRIMARY)
                }
            }
            ExprKind::Object(_) => {
                self.unsupported("object literals", expr.span);
                ("{}".to_string(), P_PRIMARY)
            }
            ExprKind::Unary { op, operand } => {
                let prefix = match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                    UnaryOp::Void => "(void)",
                    UnaryOp::Typeof => {
                        self.unsupported("'typeof'", expr.span);
                        ""
                    }
                    UnaryOp::Delete => {
                        self.unsupported("'delete'", expr.span);
                        ""
                    }
                    UnaryOp::Yield => {
                        self.unsupported("'yield'", expr.span);
                        ""
                    }
                };
                let value = self.expr_min(operand, P_UNARY);
                if *op == UnaryOp::Neg && value.starts_with('-') {
                    return (format!("-({value})"), P_UNARY);
                }
                (format!("{prefix}{value}"), P_UNARY)
            }
            ExprKind::Binary {
                op: BinaryOp::Add,
                left,
                right,
            } if is_concatenation(expr) => {
                let left = self.concat_operand(left, P_ADD);
                let right = self.concat_operand(right, P_ADD + 1);
                (format!("{left} + {right}"), P_ADD)
            }
            ExprKind::Binary { op, left, right } => {
                let prec = binary_precedence(*op);
                let left = self.expr_min(left, prec);
                let right = self.expr_min(right, prec + 1);
                (format!("{left} {} {right}", op.symbol()), prec)
            }
            ExprKind::Assign { op, target, value } => {
                let target = self.expr_min(target, P_UNARY);
                let value = self.expr_min(value, P_ASSIGN);
                (format!("{target} {} {value}", op.symbol()), P_ASSIGN)
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.expr_min(cond, P_OR);
                let a = self.expr_min(then_branch, P_ASSIGN);
                let b = self.expr_min(else_branch, P_ASSIGN);
                (format!("{cond} ? {a} : {b}"), P_ASSIGN)
            }
            ExprKind::When(when) => {
                let body = self.braced(|g| g.when(when, true));
                (format!("[&]() {body}()"), P_CALL)
            }
            ExprKind::TypeTest { .. } => {
                self.unsupported("'is'", expr.span);
                ("false".to_string(), P_PRIMARY)
            }
            ExprKind::InstanceOf { .. } => {
                self.unsupported("'instanceof'", expr.span);
                ("false".to_string(), P_PRIMARY)
            }
            ExprKind::Cast { expr: inner, ty } => self.cast(inner, ty, expr.span),
            ExprKind::Call { callee, args } => {
                let callee = self.expr_min(callee, P_CALL);
                let args: Vec<String> = args.iter().map(|a| self.expr_min(a, P_ASSIGN)).collect();
                (format!("{callee}({})", args.join(", ")), P_CALL)
            }
            ExprKind::Member {
                object,
                property,
                optional,
            } => {
                if *optional {
                    self.unsupported("'?.'", expr.span);
                }
                let name = &property.name;
                match &object.kind {
                    ExprKind::This => (format!("this->{name}"), P_CALL),
                    ExprKind::Super => match self.superclass.clone() {
                        Some(base) => (format!("{base}::{name}"), P_PRIMARY),
                        None => {
                            self.unsupported("'super' without a superclass", expr.span);
                            (name.clone(), P_PRIMARY)
                        }
                    },
                    ExprKind::Ident(owner)
                        if self.namespaces.contains(owner)
                            || self.plain_enums.contains(owner)
                            || self.classes.contains(owner) =>
                    {
                        (format!("{owner}::{name}"), P_PRIMARY)
                    }
                    _ => {
                        let object = self.expr_min(object, P_CALL);
                        if name == "length" {
                            (format!("{object}.size()"), P_CALL)
                        } else {
                            (format!("{object}.{name}"), P_CALL)
                        }
                    }
                }
            }
            ExprKind::Index { object, index } => {
                let object = self.expr_min(object, P_CALL);
                let index = self.expr(index);
                (format!("{object}[{index}]"), P_CALL)
            }
            ExprKind::Range { .. } => {
                self.unsupported("ranges outside 'for'", expr.span);
                ("{}".to_string(), P_PRIMARY)
            }
            ExprKind::Send { .. } | ExprKind::Receive(_) | ExprKind::MakeChan { .. } => {
                self.unsupported("channels", expr.span);
                ("{}".to_string(), P_PRIMARY)
            }
            ExprKind::Go(_) => {
                self.unsupported("'go'", expr.span);
                ("{}".to_string(), P_PRIMARY)
            }
            ExprKind::Await(_) => {
                self.unsupported("'await'", expr.span);
                ("{}".to_string(), P_PRIMARY)
            }
            ExprKind::New { class, args } => {
                let class = self.expr_min(class, P_CALL);
                let args: Vec<String> = args.iter().map(|a| self.expr_min(a, P_ASSIGN)).collect();
                (format!("{class}({})", args.join(", ")), P_CALL)
            }
            ExprKind::Lambda(lambda) => {
                let params = self.lambda_params(&lambda.params);
                let body = match &lambda.body {
                    LambdaBody::Block(body) => self.block(body),
                    LambdaBody::Expr(body) => {
                        let value = self.expr(body);
                        self.braced(|g| g.line(&format!("return {value};")))
                    }
                };
                (format!("[&]({params}) {body}"), P_ASSIGN)
            }
        }
    }

    fn concat_operand(&mut self, operand: &Expr, min: u8) -> String {
        match (classify(operand), &operand.kind) {
            (Operand::StringLike, ExprKind::Str(value)) => {
                format!("std::string({})", cpp_string(value))
            }
            (Operand::StringLike | Operand::StringCall, _) => self.expr_min(operand, min),
            (Operand::Numeric | Operand::Other, _) => {
                format!("__ljos_str({})", self.expr_min(operand, P_ASSIGN))
            }
        }
    }

    fn cast(&mut self, value: &Expr, ty: &TypeExpr, span: Span) -> (String, u8) {
        let TypeExpr::Named(name) = ty else {
            self.unsupported("casts to compound types", span);
            return self.emit(value);
        };
        let target = match name.name.as_str() {
            "Str" => {
                let inner = self.expr_min(value, P_ASSIGN);
                return (format!("__ljos_str({inner})"), P_CALL);
            }
            "Any" => return self.emit(value),
            "Int" | "Float" | "Num" | "Bool" | "Byte" | "Char" => self.cpp_type(ty, span),
            other => {
                self.unsupported(&format!("cast to class '{other}'"), span);
                return self.emit(value);
            }
        };
        let inner = self.expr_min(value, P_ASSIGN);
        (format!("static_cast<{target}>({inner})"), P_CALL)
    }
}

/// Arguments of a leading `super(...)` statement.
fn super_call(stmt: &Stmt) -> Option<&[Expr]> {
    let StmtKind::Expression(expr) = &stmt.kind else {
        return None;
    };
    match &expr.kind {
        ExprKind::Call { callee, args } if matches!(callee.kind, ExprKind::Super) => {
            Some(args.as_slice())
        }
        _ => None,
    }
}

fn literal_type(expr: &Expr) -> Option<&'static str> {
    match &expr.kind {
        ExprKind::Int(_) => Some("long long"),
        ExprKind::Float(_) => Some("double"),
        ExprKind::Str(_) | ExprKind::Template(_) => Some("std::string"),
        ExprKind::Bool(_) => Some("bool"),
        _ => None,
    }
}

fn binary_precedence(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Or => P_OR,
        BinaryOp::And => P_AND,
        BinaryOp::Eq | BinaryOp::Ne => P_EQ,
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => P_REL,
        BinaryOp::Add | BinaryOp::Sub => P_ADD,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => P_MUL,
    }
}

fn cpp_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\x{:02x}\"\"", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn native(source: &str) -> String {
        let program = parse_source(source).expect("parse");
        generate_native(&program).expect("native code")
    }

    fn native_errors(source: &str) -> Vec<Diagnostic> {
        let program = parse_source(source).expect("parse");
        generate_native(&program).expect_err("unsupported")
    }

    #[test]
    fn top_level_statements_run_in_main() {
        let out = native("println(\"hello\")");
        assert!(out.contains("#include \"ljos/std/io.hpp\""), "{out}");
        assert!(out.contains("int main() {\n  ljos::io::println(\"hello\");\n  return 0;\n}"), "{out}");
    }

    #[test]
    fn plus_with_a_string_operand_concatenates() {
        let out = native("const n = 3\nconst s = \"n = \" + n\nconst t = 1 + 2");
        assert!(out.contains("const long long n = 3;"), "{out}");
        assert!(out.contains("std::string(\"n = \") + __ljos_str(n)"), "{out}");
        assert!(out.contains("const auto t = 1 + 2;"), "{out}");
    }

    #[test]
    fn string_calls_count_as_strings() {
        let out = native("import { trim } from \"std:str\"\nfn f(a: Str, b: Int): Str { return trim(a) + b }");
        assert!(out.contains("return ljos::str::trim(a) + __ljos_str(b);"), "{out}");
        assert!(out.contains("std::string f(std::string a, long long b) {"), "{out}");
    }

    #[test]
    fn untyped_parameters_become_templates() {
        let out = native("fn id(x) { return x }");
        assert!(out.contains("template <typename T0>\nauto id(T0 x) {"), "{out}");
    }

    #[test]
    fn classes_get_access_sections() {
        let out = native(r#"
            abstract class Shape {
                private const id: Int = 0
                abstract fn area(): Float
                fn name(): Str { return "shape" }
            }
            class Square extends Shape {
                private mut side: Float
                constructor(side: Float) {
                    super()
                    this.side = side
                }
                fn area(): Float { return this.side * this.side }
            }
        "#);
        assert!(out.contains("class Shape {"), "{out}");
        assert!(out.contains("virtual double area() = 0;"), "{out}");
        assert!(out.contains("protected:\n  Shape() = default;"), "{out}");
        assert!(out.contains("private:\n  const long long id = 0;"), "{out}");
        assert!(out.contains("class Square : public Shape {"), "{out}");
        assert!(out.contains("Square(double side) : Shape() {"), "{out}");
        assert!(out.contains("this->side * this->side"), "{out}");
        assert!(out.contains("virtual ~Square() = default;"), "{out}");
    }

    #[test]
    fn plain_enums_become_enum_classes() {
        let out = native("enum Color { Red, Green = 5 }\nconst c = Color.Red");
        assert!(out.contains("enum class Color { Red, Green = 5 };"), "{out}");
        assert!(out.contains("const auto c = Color::Red;"), "{out}");
    }

    #[test]
    fn when_lowers_to_an_if_chain() {
        let out = native("const v = 2\nwhen (v) {\n 1 | 2 => println(\"small\")\n n if n > 9 => println(\"big\")\n else => println(\"other\")\n}");
        assert!(out.contains("const auto& __w0 = v;"), "{out}");
        assert!(out.contains("if ((__w0 == 1) || (__w0 == 2)) {"), "{out}");
        assert!(out.contains("} else if (const auto& n = __w0; n > 9) {"), "{out}");
        assert!(out.contains("} else {"), "{out}");
    }

    #[test]
    fn ranges_count_in_for_loops() {
        let out = native("for i in 0..3 { println(i) }");
        assert!(out.contains("for (long long i = 0; i < 3; i++) {"), "{out}");
    }

    #[test]
    fn unsupported_constructs_report_e0401() {
        let errors = native_errors(
            "enum Shape { Circle(r: Float) }\nconst ch = chan Int(1)\nfn f() {\n defer g()\n}\ngo f()",
        );
        assert_eq!(errors.len(), 4, "{errors:?}");
        assert!(errors.iter().all(|d| d.code == Some("E0401")));
        assert!(errors[0].message.contains("tagged enum 'Shape'"));
    }
}
