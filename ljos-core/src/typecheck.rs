//! Symbol and shape checking for Ljos.
//!
//! Three passes over a parsed program:
//!
//! 1. register every class and enum name, and every top-level function;
//! 2. fill in class members, enum members and function signatures;
//! 3. walk every body, recording the inferred type of each expression in a
//!    [`TypeTable`] keyed by [`NodeId`].
//!
//! The checker never fails: user mistakes become diagnostics and the
//! offending expression is typed `Unknown` so checking can continue.

use std::collections::{HashMap, HashSet};

use crate::ast::{
    self, BinaryOp, ClassDecl, EnumDecl, Expr, ExprKind, ExportDecl, FunctionDecl, LambdaBody,
    MemberKind, Param, Pattern, Program, Stmt, StmtKind, TemplatePart, TypeExpr, UnaryOp,
    Visibility, When, WhenBody,
};
use crate::builtins::find_global;
use crate::diagnostic::Diagnostic;
use crate::span::Span;
use crate::types::{
    Arity, Primitive, Type, binary_result, is_assignable, is_valid_cast, least_common_supertype,
};

/// Inferred types, keyed by expression id.
pub type TypeTable = HashMap<ast::NodeId, Type>;

/// Types of names bound by import statements, keyed by local name.
pub type ImportTypes = HashMap<String, Type>;

#[derive(Debug, Default)]
pub struct CheckResult {
    pub types: TypeTable,
    pub diagnostics: Vec<Diagnostic>,
}

/// Check a whole program.
pub fn check(program: &Program, imports: &ImportTypes) -> CheckResult {
    let mut checker = Checker::new(imports);
    checker.register_declarations(&program.body);
    checker.fill_declarations(&program.body);
    checker.check_block_contents(&program.body);

    // annotations are resolved once per pass; report each problem once
    let mut seen = HashSet::new();
    checker
        .diagnostics
        .retain(|d| seen.insert((d.span.start, d.span.end, d.message.clone())));
    CheckResult {
        types: checker.types,
        diagnostics: checker.diagnostics,
    }
}

// ---------------------------------------------------------------------
// Class and enum records
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MemberInfo {
    pub name: String,
    pub ty: Type,
    pub visibility: Visibility,
    pub is_static: bool,
    pub mutable: bool,
    pub arity: Option<Arity>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassInfo {
    pub name: String,
    pub is_abstract: bool,
    /// Looked up in the registry by name; the registry owns every record.
    pub superclass: Option<String>,
    pub members: Vec<MemberInfo>,
    pub constructor: Option<(Vec<Type>, Arity)>,
}

impl ClassInfo {
    fn member(&self, name: &str, is_static: bool) -> Option<&MemberInfo> {
        self.members
            .iter()
            .find(|m| m.name == name && m.is_static == is_static)
    }
}

/// Outcome of a member lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberLookup<'a> {
    Found(&'a MemberInfo),
    /// The member exists but is private to `owner`.
    Private { owner: String },
    Missing,
}

#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: HashMap<String, ClassInfo>,
}

impl ClassRegistry {
    pub fn register(&mut self, name: &str, is_abstract: bool) {
        self.classes.insert(
            name.to_string(),
            ClassInfo {
                name: name.to_string(),
                is_abstract,
                superclass: None,
                members: Vec::new(),
                constructor: None,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut ClassInfo> {
        self.classes.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Walk `class` and its superclasses for `member`.
    ///
    /// A private member is visible only on the class that declares it
    /// (depth 0) and only from code inside that class.
    pub fn lookup_member(
        &self,
        class: &str,
        member: &str,
        is_static: bool,
        accessed_from: Option<&str>,
    ) -> MemberLookup<'_> {
        let mut visited = HashSet::new();
        let mut current = Some(class);
        let mut depth = 0usize;
        while let Some(name) = current {
            if !visited.insert(name) {
                break;
            }
            let Some(info) = self.classes.get(name) else {
                break;
            };
            if let Some(found) = info.member(member, is_static) {
                if found.visibility == Visibility::Private
                    && (depth > 0 || accessed_from != Some(info.name.as_str()))
                {
                    return MemberLookup::Private {
                        owner: info.name.clone(),
                    };
                }
                return MemberLookup::Found(found);
            }
            current = info.superclass.as_deref();
            depth += 1;
        }
        MemberLookup::Missing
    }

    /// The nearest constructor signature along the superclass chain.
    pub fn constructor(&self, class: &str) -> Option<&(Vec<Type>, Arity)> {
        let mut visited = HashSet::new();
        let mut current = Some(class);
        while let Some(name) = current {
            if !visited.insert(name) {
                return None;
            }
            let info = self.classes.get(name)?;
            if let Some(ctor) = &info.constructor {
                return Some(ctor);
            }
            current = info.superclass.as_deref();
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
struct EnumInfo {
    members: Vec<(String, Option<Vec<Type>>)>,
    tagged: bool,
}

// ---------------------------------------------------------------------
// Scopes
// ---------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Symbol {
    ty: Type,
    mutable: bool,
    arity: Option<Arity>,
    /// The name refers to an enum object (`Color` in `Color.Red`).
    enum_object: bool,
}

impl Symbol {
    fn value(ty: Type, mutable: bool) -> Self {
        Symbol {
            ty,
            mutable,
            arity: None,
            enum_object: false,
        }
    }
}

struct Checker<'a> {
    imports: &'a ImportTypes,
    classes: ClassRegistry,
    enums: HashMap<String, EnumInfo>,
    scopes: Vec<HashMap<String, Symbol>>,
    types: TypeTable,
    diagnostics: Vec<Diagnostic>,
    current_class: Option<String>,
    /// Declared return type of each enclosing function, innermost last.
    returns: Vec<Option<Type>>,
}

impl<'a> Checker<'a> {
    fn new(imports: &'a ImportTypes) -> Self {
        Checker {
            imports,
            classes: ClassRegistry::default(),
            enums: HashMap::new(),
            scopes: vec![HashMap::new()],
            types: TypeTable::new(),
            diagnostics: Vec::new(),
            current_class: None,
            returns: Vec::new(),
        }
    }

    fn error(&mut self, code: &'static str, message: impl Into<String>, span: Span) {
        self.diagnostics
            .push(Diagnostic::error(message, span).with_code(code));
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str, symbol: Symbol) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), symbol);
        }
    }

    fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    // -----------------------------------------------------------------
    // Passes 1 and 2
    // -----------------------------------------------------------------

    fn register_declarations(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            match declaration_of(stmt) {
                Some(StmtKind::Class(class)) => {
                    self.classes.register(&class.name.name, class.is_abstract);
                    self.declare(
                        &class.name.name,
                        Symbol::value(Type::ClassRef(class.name.name.clone()), false),
                    );
                }
                Some(StmtKind::Enum(decl)) => {
                    self.enums.insert(
                        decl.name.name.clone(),
                        EnumInfo {
                            members: Vec::new(),
                            tagged: decl.is_tagged(),
                        },
                    );
                    self.declare(
                        &decl.name.name,
                        Symbol {
                            ty: Type::Enum(decl.name.name.clone()),
                            mutable: false,
                            arity: None,
                            enum_object: true,
                        },
                    );
                }
                Some(StmtKind::Function(func)) => {
                    self.declare(&func.name.name, Symbol::value(Type::Unknown, false));
                }
                _ => {}
            }
        }
    }

    fn fill_declarations(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            match declaration_of(stmt) {
                Some(StmtKind::Class(class)) => self.fill_class(class),
                Some(StmtKind::Enum(decl)) => self.fill_enum(decl),
                Some(StmtKind::Function(func)) => self.declare_function(func),
                _ => {}
            }
        }
    }

    fn fill_class(&mut self, class: &ClassDecl) {
        let mut members = Vec::new();
        let mut constructor = None;
        for member in &class.members {
            match &member.kind {
                MemberKind::Field {
                    mutable, name, ty, ..
                } => members.push(MemberInfo {
                    name: name.name.clone(),
                    ty: ty.as_ref().map_or(Type::Unknown, |t| self.resolve_type(t)),
                    visibility: member.visibility,
                    is_static: member.is_static,
                    mutable: *mutable,
                    arity: None,
                }),
                MemberKind::Method {
                    name, params, ret, ..
                } => {
                    let (ty, arity) = self.signature(params, ret.as_ref());
                    members.push(MemberInfo {
                        name: name.name.clone(),
                        ty,
                        visibility: member.visibility,
                        is_static: member.is_static,
                        mutable: false,
                        arity: Some(arity),
                    });
                }
                MemberKind::Constructor { params, .. } => {
                    let param_types: Vec<Type> =
                        params.iter().map(|p| self.param_type(p)).collect();
                    constructor = Some((param_types, arity_of(params)));
                }
            }
        }
        let superclass = class.superclass.as_ref().map(|s| s.name.clone());
        if let Some(base) = &class.superclass {
            if !self.classes.contains(&base.name) && find_global(&base.name).is_none() {
                self.error(
                    "E0201",
                    format!("undefined class '{}'", base.name),
                    base.span,
                );
            }
        }
        if let Some(info) = self.classes.get_mut(&class.name.name) {
            info.members = members;
            info.constructor = constructor;
            info.superclass = superclass;
        }
    }

    fn fill_enum(&mut self, decl: &EnumDecl) {
        let mut members = Vec::with_capacity(decl.members.len());
        for member in &decl.members {
            let payload = match &member.fields {
                Some(fields) => Some(fields.iter().map(|f| self.param_type(f)).collect()),
                None => None,
            };
            members.push((member.name.name.clone(), payload));
        }
        if let Some(info) = self.enums.get_mut(&decl.name.name) {
            info.members = members;
        }
    }

    fn declare_function(&mut self, func: &FunctionDecl) {
        let (ty, arity) = self.signature(&func.params, func.ret.as_ref());
        self.declare(
            &func.name.name,
            Symbol {
                ty,
                mutable: false,
                arity: Some(arity),
                enum_object: false,
            },
        );
    }

    fn signature(&mut self, params: &[Param], ret: Option<&TypeExpr>) -> (Type, Arity) {
        let param_types = params.iter().map(|p| self.param_type(p)).collect();
        let ret = ret.map_or(Type::Unknown, |r| self.resolve_type(r));
        (Type::function(param_types, ret), arity_of(params))
    }

    fn param_type(&mut self, param: &Param) -> Type {
        let ty = param
            .ty
            .as_ref()
            .map_or(Type::Unknown, |t| self.resolve_type(t));
        if param.rest { Type::array(ty) } else { ty }
    }

    fn resolve_type(&mut self, expr: &TypeExpr) -> Type {
        match expr {
            TypeExpr::Named(ident) => {
                let name = ident.name.as_str();
                if let Some(p) = Primitive::from_name(name) {
                    Type::Primitive(p)
                } else if name == "Void" {
                    Type::Void
                } else if name == "Any" {
                    Type::Unknown
                } else if self.classes.contains(name) {
                    Type::Class(name.to_string())
                } else if self.enums.contains_key(name) {
                    Type::Enum(name.to_string())
                } else if find_global(name).is_some() || self.lookup(name).is_some() {
                    // host or imported classes are opaque
                    Type::Unknown
                } else {
                    self.error("E0201", format!("undefined type '{name}'"), ident.span);
                    Type::Unknown
                }
            }
            TypeExpr::Array(elem) => Type::array(self.resolve_type(elem)),
            TypeExpr::Chan(elem) => Type::Chan(Box::new(self.resolve_type(elem))),
            TypeExpr::Function { params, ret } => {
                let params = params.iter().map(|p| self.resolve_type(p)).collect();
                Type::function(params, self.resolve_type(ret))
            }
        }
    }

    // -----------------------------------------------------------------
    // Pass 3: statements
    // -----------------------------------------------------------------

    fn check_block(&mut self, stmts: &[Stmt]) -> bool {
        self.push_scope();
        self.register_declarations(stmts);
        self.fill_declarations(stmts);
        let diverges = self.check_block_contents(stmts);
        self.pop_scope();
        diverges
    }

    /// Check statements in the current scope; true when control cannot
    /// fall off the end.
    fn check_block_contents(&mut self, stmts: &[Stmt]) -> bool {
        let mut diverged = false;
        let mut warned = false;
        for stmt in stmts {
            if diverged && !warned && !matches!(stmt.kind, StmtKind::Empty | StmtKind::Function(_))
            {
                self.diagnostics.push(
                    Diagnostic::warning("unreachable statement", stmt.span).with_code("W0201"),
                );
                warned = true;
            }
            if self.check_stmt(stmt) {
                diverged = true;
            }
        }
        diverged
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> bool {
        match &stmt.kind {
            StmtKind::Var(decl) => {
                let declared = decl.ty.as_ref().map(|t| self.resolve_type(t));
                let init = decl.init.as_ref().map(|e| (self.check_expr(e), e.span));
                if let (Some(target), Some((found, span))) = (&declared, &init) {
                    self.expect_assignable("E0203", found, target, *span);
                }
                let ty = declared
                    .or(init.map(|(t, _)| t))
                    .unwrap_or(Type::Unknown);
                self.declare(&decl.name.name, Symbol::value(ty, decl.mutable));
                false
            }
            StmtKind::Function(func) => {
                self.check_function_body(&func.params, func.ret.as_ref(), &func.body, None);
                false
            }
            StmtKind::Class(class) => {
                self.check_class(class);
                false
            }
            StmtKind::Enum(decl) => {
                for member in &decl.members {
                    if let Some(value) = &member.value {
                        self.check_expr(value);
                    }
                }
                false
            }
            StmtKind::Block(body) => self.check_block(body),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.check_expr(cond);
                let then_diverges = self.check_block(then_branch);
                let else_diverges = else_branch
                    .as_ref()
                    .is_some_and(|branch| self.check_stmt(branch));
                then_diverges && else_diverges
            }
            StmtKind::While { cond, body } => {
                self.check_expr(cond);
                self.check_block(body);
                false
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                self.push_scope();
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                if let Some(cond) = cond {
                    self.check_expr(cond);
                }
                if let Some(update) = update {
                    self.check_expr(update);
                }
                self.check_block(body);
                self.pop_scope();
                false
            }
            StmtKind::ForIn {
                binding,
                iterable,
                body,
            } => {
                let iterable_ty = self.check_expr(iterable);
                let elem = match iterable_ty {
                    Type::Array(elem) | Type::Chan(elem) => *elem,
                    Type::Primitive(Primitive::Str) => Type::STR,
                    _ => Type::Unknown,
                };
                self.push_scope();
                self.declare(&binding.name, Symbol::value(elem, false));
                self.check_block(body);
                self.pop_scope();
                false
            }
            StmtKind::When(when) => {
                self.check_when(when);
                false
            }
            StmtKind::Return(value) => {
                self.check_return(value.as_ref(), stmt.span);
                true
            }
            StmtKind::Break | StmtKind::Continue => true,
            StmtKind::Throw(value) => {
                self.check_expr(value);
                true
            }
            StmtKind::Try {
                body,
                catch,
                finally,
            } => {
                let body_diverges = self.check_block(body);
                let catch_diverges = match catch {
                    Some(clause) => {
                        self.push_scope();
                        if let Some(param) = &clause.param {
                            self.declare(&param.name, Symbol::value(Type::Unknown, false));
                        }
                        let diverges = self.check_block(&clause.body);
                        self.pop_scope();
                        diverges
                    }
                    None => false,
                };
                let finally_diverges = finally.as_ref().is_some_and(|f| self.check_block(f));
                finally_diverges || (body_diverges && catch.is_some() && catch_diverges)
            }
            StmtKind::Import(import) => {
                let locals = import
                    .default
                    .iter()
                    .chain(import.namespace.iter())
                    .chain(import.named.iter().map(|n| n.local()));
                for local in locals {
                    let ty = self
                        .imports
                        .get(&local.name)
                        .cloned()
                        .unwrap_or(Type::Unknown);
                    self.declare(&local.name, Symbol::value(ty, false));
                }
                false
            }
            StmtKind::Export(export) => match export {
                ExportDecl::Decl(inner) => self.check_stmt(inner),
                ExportDecl::Default(value) => {
                    self.check_expr(value);
                    false
                }
                ExportDecl::Named(names) => {
                    for name in names {
                        if self.lookup(&name.name.name).is_none() {
                            self.error(
                                "E0201",
                                format!("undefined identifier '{}'", name.name.name),
                                name.name.span,
                            );
                        }
                    }
                    false
                }
            },
            StmtKind::Defer(inner) => {
                self.push_scope();
                self.check_stmt(inner);
                self.pop_scope();
                false
            }
            StmtKind::Using {
                binding,
                init,
                body,
            } => {
                let ty = self.check_expr(init);
                self.push_scope();
                self.declare(&binding.name, Symbol::value(ty, false));
                let diverges = self.check_block(body);
                self.pop_scope();
                diverges
            }
            StmtKind::Expression(expr) => {
                self.check_expr(expr);
                false
            }
            StmtKind::Empty => false,
        }
    }

    fn check_return(&mut self, value: Option<&Expr>, span: Span) {
        let found = value.map(|v| (self.check_expr(v), v.span));
        let Some(Some(expected)) = self.returns.last().cloned() else {
            return;
        };
        match (found, &expected) {
            (Some((found, value_span)), Type::Void) => {
                if found != Type::Void && !found.is_unknown() {
                    self.error(
                        "E0204",
                        format!("function returns Void but a {found} is returned"),
                        value_span,
                    );
                }
            }
            (Some((found, value_span)), _) => {
                if !is_assignable(&found, &expected) {
                    self.error(
                        "E0204",
                        format!("return type mismatch: expected {expected}, found {found}"),
                        value_span,
                    );
                }
            }
            (None, Type::Void) | (None, Type::Unknown) => {}
            (None, _) => self.error(
                "E0204",
                format!("missing return value of type {expected}"),
                span,
            ),
        }
    }

    fn check_function_body(
        &mut self,
        params: &[Param],
        ret: Option<&TypeExpr>,
        body: &[Stmt],
        this: Option<Type>,
    ) {
        self.push_scope();
        if let Some(this) = this {
            self.declare("this", Symbol::value(this, false));
        }
        self.declare_params(params);
        let ret = ret.map(|r| self.resolve_type(r));
        self.returns.push(ret);
        self.check_block(body);
        self.returns.pop();
        self.pop_scope();
    }

    fn declare_params(&mut self, params: &[Param]) -> Vec<Type> {
        let mut types = Vec::with_capacity(params.len());
        for param in params {
            let ty = self.param_type(param);
            if let Some(default) = &param.default {
                let found = self.check_expr(default);
                self.expect_assignable("E0203", &found, &ty, default.span);
            }
            self.declare(&param.name.name, Symbol::value(ty.clone(), true));
            types.push(ty);
        }
        types
    }

    fn check_class(&mut self, class: &ClassDecl) {
        let previous = self.current_class.replace(class.name.name.clone());
        let instance = Type::Class(class.name.name.clone());
        let statics = Type::ClassRef(class.name.name.clone());
        for member in &class.members {
            let this = if member.is_static {
                statics.clone()
            } else {
                instance.clone()
            };
            match &member.kind {
                MemberKind::Field { ty, init, .. } => {
                    if let Some(init) = init {
                        self.push_scope();
                        self.declare("this", Symbol::value(this, false));
                        let found = self.check_expr(init);
                        self.pop_scope();
                        if let Some(ty) = ty {
                            let expected = self.resolve_type(ty);
                            self.expect_assignable("E0203", &found, &expected, init.span);
                        }
                    }
                }
                MemberKind::Method {
                    params,
                    ret,
                    body: Some(body),
                    ..
                } => self.check_function_body(params, ret.as_ref(), body, Some(this)),
                MemberKind::Method { body: None, .. } => {}
                MemberKind::Constructor { params, body } => {
                    self.check_function_body(params, None, body, Some(this))
                }
            }
        }
        self.current_class = previous;
    }

    // -----------------------------------------------------------------
    // `when`
    // -----------------------------------------------------------------

    /// Check every clause; returns the type of each expression body.
    fn check_when(&mut self, when: &When) -> Vec<Type> {
        let subject = when
            .subject
            .as_ref()
            .map_or(Type::Unknown, |s| self.check_expr(s));
        let mut results = Vec::new();
        for clause in &when.clauses {
            self.push_scope();
            self.check_pattern(&clause.pattern, &subject);
            if let Some(guard) = &clause.guard {
                self.check_expr(guard);
            }
            match &clause.body {
                WhenBody::Expr(expr) => results.push(self.check_expr(expr)),
                WhenBody::Block(body) => {
                    self.check_block(body);
                }
            }
            self.pop_scope();
        }
        results
    }

    fn check_pattern(&mut self, pattern: &Pattern, subject: &Type) {
        match pattern {
            Pattern::Literal(expr) | Pattern::Value(expr) => {
                self.check_expr(expr);
            }
            Pattern::Binding(name) => {
                self.declare(&name.name, Symbol::value(subject.clone(), false));
            }
            Pattern::TypeTest(ty) => {
                self.resolve_type(ty);
            }
            Pattern::Or(alternatives) => {
                for alternative in alternatives {
                    self.check_pattern(alternative, subject);
                }
            }
            Pattern::Wildcard(_) | Pattern::Else(_) => {}
        }
    }

    // -----------------------------------------------------------------
    // Pass 3: expressions
    // -----------------------------------------------------------------

    fn check_expr(&mut self, expr: &Expr) -> Type {
        let ty = self.infer_expr(expr);
        self.types.insert(expr.id, ty.clone());
        ty
    }

    fn infer_expr(&mut self, expr: &Expr) -> Type {
        match &expr.kind {
            ExprKind::Int(_) => Type::INT,
            ExprKind::Float(_) => Type::FLOAT,
            ExprKind::Str(_) => Type::STR,
            ExprKind::Template(parts) => {
                for part in parts {
                    if let TemplatePart::Expr(inner) = part {
                        self.check_expr(inner);
                    }
                }
                Type::STR
            }
            ExprKind::Bool(_) => Type::BOOL,
            ExprKind::Nul => Type::NUL,
            ExprKind::Ident(name) => self.check_ident(name, expr.span),
            ExprKind::This => self
                .lookup("this")
                .map_or(Type::Unknown, |s| s.ty.clone()),
            ExprKind::Super => self
                .current_class
                .as_deref()
                .and_then(|c| self.classes.get(c))
                .and_then(|info| info.superclass.clone())
                .map_or(Type::Unknown, Type::Class),
            ExprKind::Array(elements) => {
                let mut elem: Option<Type> = None;
                for element in elements {
                    let ty = self.check_expr(element);
                    elem = Some(match elem {
                        None => ty,
                        Some(prev) => least_common_supertype(&prev, &ty).unwrap_or(Type::Unknown),
                    });
                }
                Type::array(elem.unwrap_or(Type::Unknown))
            }
            ExprKind::Object(properties) => {
                for property in properties {
                    self.check_expr(&property.value);
                }
                Type::Unknown
            }
            ExprKind::Unary { op, operand } => {
                let operand_ty = self.check_expr(operand);
                match op {
                    UnaryOp::Not | UnaryOp::Delete => Type::BOOL,
                    UnaryOp::Typeof => Type::STR,
                    UnaryOp::Neg => match operand_ty.as_primitive() {
                        Some(p) if p.is_numeric() => operand_ty,
                        _ => Type::Unknown,
                    },
                    UnaryOp::Void | UnaryOp::Yield => Type::Unknown,
                }
            }
            ExprKind::Binary { op, left, right } => {
                let left_ty = self.check_expr(left);
                let right_ty = self.check_expr(right);
                binary_result(*op, &left_ty, &right_ty)
            }
            ExprKind::Assign { op, target, value } => self.check_assign(*op, target, value),
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.check_expr(cond);
                let a = self.check_expr(then_branch);
                let b = self.check_expr(else_branch);
                least_common_supertype(&a, &b).unwrap_or(Type::Unknown)
            }
            ExprKind::When(when) => {
                let results = self.check_when(when);
                let mut iter = results.into_iter();
                let first = iter.next().unwrap_or(Type::Unknown);
                iter.try_fold(first, |acc, ty| least_common_supertype(&acc, &ty))
                    .unwrap_or(Type::Unknown)
            }
            ExprKind::TypeTest { expr, ty } => {
                self.check_expr(expr);
                self.resolve_type(ty);
                Type::BOOL
            }
            ExprKind::InstanceOf { expr, class } => {
                self.check_expr(expr);
                self.check_expr(class);
                Type::BOOL
            }
            ExprKind::Cast { expr: inner, ty } => {
                let source = self.check_expr(inner);
                let target = self.resolve_type(ty);
                if !is_valid_cast(&source, &target) {
                    self.error(
                        "E0205",
                        format!("cannot cast {source} to {target}"),
                        expr.span,
                    );
                }
                target
            }
            ExprKind::Call { callee, args } => self.check_call(callee, args, expr.span),
            ExprKind::Member {
                object, property, ..
            } => self.check_member(object, property),
            ExprKind::Index { object, index } => {
                let object_ty = self.check_expr(object);
                self.check_expr(index);
                match object_ty {
                    Type::Array(elem) => *elem,
                    Type::Primitive(Primitive::Str) => Type::STR,
                    _ => Type::Unknown,
                }
            }
            ExprKind::Range { start, end } => {
                self.check_expr(start);
                self.check_expr(end);
                Type::array(Type::INT)
            }
            ExprKind::Send { channel, value } => {
                let channel_ty = self.check_expr(channel);
                let value_ty = self.check_expr(value);
                if let Type::Chan(elem) = &channel_ty {
                    self.expect_assignable("E0203", &value_ty, elem, value.span);
                }
                Type::Void
            }
            ExprKind::Receive(channel) => match self.check_expr(channel) {
                Type::Chan(elem) => *elem,
                _ => Type::Unknown,
            },
            ExprKind::New { class, args } => self.check_new(class, args, expr.span),
            ExprKind::Lambda(lambda) => {
                self.push_scope();
                let params = self.declare_params(&lambda.params);
                let declared = lambda.ret.as_ref().map(|r| self.resolve_type(r));
                self.returns.push(declared.clone());
                let body_ty = match &lambda.body {
                    LambdaBody::Expr(body) => self.check_expr(body),
                    LambdaBody::Block(body) => {
                        self.check_block(body);
                        Type::Unknown
                    }
                };
                self.returns.pop();
                self.pop_scope();
                Type::function(params, declared.unwrap_or(body_ty))
            }
            ExprKind::MakeChan { elem, capacity } => {
                if let Some(capacity) = capacity {
                    let ty = self.check_expr(capacity);
                    self.expect_assignable("E0203", &ty, &Type::INT, capacity.span);
                }
                let elem = elem
                    .as_ref()
                    .map_or(Type::Unknown, |t| self.resolve_type(t));
                Type::Chan(Box::new(elem))
            }
            ExprKind::Go(task) => {
                self.check_expr(task);
                Type::Unknown
            }
            ExprKind::Await(value) => self.check_expr(value),
        }
    }

    fn check_ident(&mut self, name: &str, span: Span) -> Type {
        if let Some(symbol) = self.lookup(name) {
            return symbol.ty.clone();
        }
        if let Some(builtin) = find_global(name) {
            return builtin.ty();
        }
        self.error("E0201", format!("undefined identifier '{name}'"), span);
        Type::Unknown
    }

    fn check_assign(&mut self, op: ast::AssignOp, target: &Expr, value: &Expr) -> Type {
        let target_ty = self.check_expr(target);
        let value_ty = self.check_expr(value);
        if let ExprKind::Ident(name) = &target.kind {
            if self.lookup(name).is_some_and(|s| !s.mutable) {
                self.error(
                    "E0208",
                    format!("cannot assign to constant '{name}'"),
                    target.span,
                );
                return target_ty;
            }
        }
        let result = match op {
            ast::AssignOp::Assign => value_ty,
            ast::AssignOp::Add => binary_result(BinaryOp::Add, &target_ty, &value_ty),
            ast::AssignOp::Sub => binary_result(BinaryOp::Sub, &target_ty, &value_ty),
            ast::AssignOp::Mul => binary_result(BinaryOp::Mul, &target_ty, &value_ty),
            ast::AssignOp::Div => binary_result(BinaryOp::Div, &target_ty, &value_ty),
            ast::AssignOp::Rem => binary_result(BinaryOp::Rem, &target_ty, &value_ty),
        };
        self.expect_assignable("E0203", &result, &target_ty, value.span);
        target_ty
    }

    fn check_member(&mut self, object: &Expr, property: &ast::Ident) -> Type {
        if let ExprKind::Ident(name) = &object.kind {
            if self.lookup(name).is_some_and(|s| s.enum_object) {
                let ty = self.enum_member(name, property);
                self.types.insert(object.id, Type::Enum(name.clone()));
                return ty;
            }
        }

        let object_ty = self.check_expr(object);
        let (class, is_static) = match &object_ty {
            Type::Class(class) => (class.clone(), false),
            Type::ClassRef(class) => (class.clone(), true),
            Type::Array(_) | Type::Primitive(Primitive::Str) if property.name == "length" => {
                return Type::INT;
            }
            _ => return Type::Unknown,
        };
        if !self.classes.contains(&class) {
            return Type::Unknown;
        }
        let found = match self.classes.lookup_member(
            &class,
            &property.name,
            is_static,
            self.current_class.as_deref(),
        ) {
            MemberLookup::Found(member) => Ok(member.ty.clone()),
            MemberLookup::Private { owner } => Err(Some(owner)),
            MemberLookup::Missing => Err(None),
        };
        match found {
            Ok(ty) => ty,
            Err(Some(owner)) => {
                self.error(
                    "E0202",
                    format!(
                        "property '{}' is private to class '{owner}'",
                        property.name
                    ),
                    property.span,
                );
                Type::Unknown
            }
            Err(None) => {
                // host base classes can contribute members we cannot see
                if self.has_opaque_ancestor(&class) {
                    return Type::Unknown;
                }
                self.error(
                    "E0202",
                    format!(
                        "property '{}' does not exist on type '{}'",
                        property.name, object_ty
                    ),
                    property.span,
                );
                Type::Unknown
            }
        }
    }

    fn has_opaque_ancestor(&self, class: &str) -> bool {
        let mut visited = HashSet::new();
        let mut current = self.classes.get(class);
        while let Some(info) = current {
            if !visited.insert(info.name.as_str()) {
                return false;
            }
            match &info.superclass {
                Some(base) if !self.classes.contains(base) => return true,
                Some(base) => current = self.classes.get(base),
                None => return false,
            }
        }
        false
    }

    fn enum_member(&mut self, enum_name: &str, property: &ast::Ident) -> Type {
        let Some(info) = self.enums.get(enum_name) else {
            return Type::Unknown;
        };
        if let Some((member, payload)) = info.members.iter().find(|(m, _)| *m == property.name) {
            return Type::EnumMember {
                enum_name: enum_name.to_string(),
                member: member.clone(),
                payload: payload.clone(),
            };
        }
        if info.tagged && matches!(property.name.as_str(), "match" | "is") {
            return Type::Unknown;
        }
        self.error(
            "E0202",
            format!(
                "property '{}' does not exist on enum '{enum_name}'",
                property.name
            ),
            property.span,
        );
        Type::Unknown
    }

    fn check_call(&mut self, callee: &Expr, args: &[Expr], span: Span) -> Type {
        let callee_ty = self.check_expr(callee);
        let arg_types: Vec<(Type, Span)> =
            args.iter().map(|a| (self.check_expr(a), a.span)).collect();

        // `Shape.Circle(r)` builds a tagged variant
        if let Type::EnumMember {
            enum_name,
            member,
            payload: Some(fields),
        } = &callee_ty
        {
            self.check_arguments(
                &format!("{enum_name}.{member}"),
                fields,
                Arity::exact(fields.len()),
                &arg_types,
                span,
            );
            return callee_ty.clone();
        }

        let Type::Function { params, ret } = &callee_ty else {
            return Type::Unknown;
        };
        let arity = self
            .callee_arity(callee)
            .unwrap_or(Arity::exact(params.len()));
        self.check_arguments(&callee_name(callee), params, arity, &arg_types, span);
        (**ret).clone()
    }

    fn check_arguments(
        &mut self,
        name: &str,
        params: &[Type],
        arity: Arity,
        args: &[(Type, Span)],
        span: Span,
    ) {
        if !arity.accepts(args.len()) {
            let expected = match arity.max {
                Some(max) if max == arity.required => format!("{max}"),
                Some(max) => format!("{} to {max}", arity.required),
                None => format!("at least {}", arity.required),
            };
            self.error(
                "E0207",
                format!(
                    "'{name}' expects {expected} argument(s), found {}",
                    args.len()
                ),
                span,
            );
            return;
        }
        for (index, ((found, arg_span), expected)) in args.iter().zip(params).enumerate() {
            if !is_assignable(found, expected) {
                self.error(
                    "E0207",
                    format!(
                        "argument {} of '{name}': expected {expected}, found {found}",
                        index + 1
                    ),
                    *arg_span,
                );
            }
        }
    }

    fn callee_arity(&self, callee: &Expr) -> Option<Arity> {
        match &callee.kind {
            ExprKind::Ident(name) => match self.lookup(name) {
                Some(symbol) => symbol.arity,
                None => find_global(name).and_then(|b| b.arity()),
            },
            ExprKind::Member {
                object, property, ..
            } => {
                let (class, is_static) = match self.types.get(&object.id)? {
                    Type::Class(class) => (class.as_str(), false),
                    Type::ClassRef(class) => (class.as_str(), true),
                    _ => return None,
                };
                match self.classes.lookup_member(
                    class,
                    &property.name,
                    is_static,
                    self.current_class.as_deref(),
                ) {
                    MemberLookup::Found(member) => member.arity,
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn check_new(&mut self, class: &Expr, args: &[Expr], span: Span) -> Type {
        let class_ty = self.check_expr(class);
        let arg_types: Vec<(Type, Span)> =
            args.iter().map(|a| (self.check_expr(a), a.span)).collect();
        let Type::ClassRef(name) = class_ty else {
            return Type::Unknown;
        };
        let Some(info) = self.classes.get(&name) else {
            return Type::Unknown;
        };
        if info.is_abstract {
            self.error(
                "E0206",
                format!("cannot instantiate abstract class '{name}'"),
                span,
            );
        }
        if let Some((params, arity)) = self.classes.constructor(&name).cloned() {
            self.check_arguments(&name, &params, arity, &arg_types, span);
        }
        Type::Class(name)
    }

    fn expect_assignable(&mut self, code: &'static str, found: &Type, expected: &Type, span: Span) {
        if !is_assignable(found, expected) {
            self.error(
                code,
                format!("type mismatch: expected {expected}, found {found}"),
                span,
            );
        }
    }
}

/// The declaration a top-level statement introduces, looking through
/// `export`.
fn declaration_of(stmt: &Stmt) -> Option<&StmtKind> {
    match &stmt.kind {
        StmtKind::Export(ExportDecl::Decl(inner)) => Some(&inner.kind),
        kind @ (StmtKind::Class(_) | StmtKind::Enum(_) | StmtKind::Function(_)) => Some(kind),
        _ => None,
    }
}

fn arity_of(params: &[Param]) -> Arity {
    let required = params
        .iter()
        .filter(|p| p.default.is_none() && !p.rest)
        .count();
    if params.iter().any(|p| p.rest) {
        Arity::variadic(required)
    } else {
        Arity {
            required,
            max: Some(params.len()),
        }
    }
}

fn callee_name(callee: &Expr) -> String {
    match &callee.kind {
        ExprKind::Ident(name) => name.clone(),
        ExprKind::Member { property, .. } => property.name.clone(),
        _ => "function".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;
    use crate::parser::parse_source;

    fn diagnostics(source: &str) -> Vec<Diagnostic> {
        let program = parse_source(source).expect("parse");
        check(&program, &ImportTypes::new()).diagnostics
    }

    fn codes(source: &str) -> Vec<&'static str> {
        diagnostics(source)
            .into_iter()
            .filter_map(|d| d.code)
            .collect()
    }

    #[test]
    fn clean_program_has_no_diagnostics() {
        let source = r#"
            class Point {
                mut x: Float = 0.0
                mut y: Float = 0.0
                constructor(x: Float, y: Float) {
                    this.x = x
                    this.y = y
                }
                fn len(): Float { return Math.sqrt(this.x * this.x + this.y * this.y) }
            }
            fn make(n: Int): Point { return new Point(n, 2.5) }
            const p = make(3)
            println(p.len(), p.x)
        "#;
        assert_eq!(diagnostics(source), vec![]);
    }

    #[test]
    fn each_undefined_identifier_is_reported_once() {
        let found = codes("println(a)\nconst b = c + d\nfoo()");
        assert_eq!(found, vec!["E0201"; 4]);
    }

    #[test]
    fn functions_are_visible_before_their_declaration() {
        assert!(codes("const r = later(1)\nfn later(x: Int): Int { return x }").is_empty());
    }

    #[test]
    fn declaration_type_mismatch() {
        assert_eq!(codes("const x: Int = \"hello\""), vec!["E0203"]);
        assert!(codes("const x: Float = 1").is_empty());
        assert!(codes("const x: Num = 1.5").is_empty());
    }

    #[test]
    fn return_type_mismatch() {
        assert_eq!(codes("fn f(): Int { return \"no\" }"), vec!["E0204"]);
        assert_eq!(codes("fn f(): Int { return }"), vec!["E0204"]);
        assert!(codes("fn f(): Float { return 1 }").is_empty());
    }

    #[test]
    fn invalid_cast() {
        assert_eq!(codes("const b = true of Float"), vec!["E0205"]);
        assert!(codes("const i = 3.7 of Int\nconst s = 10 of Str").is_empty());
    }

    #[test]
    fn abstract_classes_cannot_be_instantiated() {
        let source = "abstract class Shape { abstract fn area(): Float }\nconst s = new Shape()";
        assert_eq!(codes(source), vec!["E0206"]);
    }

    #[test]
    fn argument_count_and_types() {
        let source = "fn add(a: Int, b: Int = 1): Int { return a + b }\nadd()\nadd(1, 2, 3)\nadd(\"x\")\nadd(1)";
        assert_eq!(codes(source), vec!["E0207", "E0207", "E0207"]);
    }

    #[test]
    fn constants_cannot_be_reassigned() {
        assert_eq!(codes("const x = 1\nx = 2"), vec!["E0208"]);
        assert!(codes("mut y = 1\ny += 2").is_empty());
    }

    #[test]
    fn private_members_are_hidden_outside_the_class() {
        let source = r#"
            class Account {
                private mut balance: Int = 0
                fn deposit(n: Int) { this.balance += n }
            }
            class Savings extends Account {
                fn peek(): Int { return this.balance }
            }
            const a = new Account()
            a.deposit(5)
            println(a.balance)
        "#;
        let diags = diagnostics(source);
        assert_eq!(diags.len(), 2, "{diags:?}");
        assert!(diags.iter().all(|d| d.code == Some("E0202")));
        assert!(diags[0].message.contains("private"));
    }

    #[test]
    fn members_are_found_through_the_superclass_chain() {
        let source = r#"
            class Animal { fn name(): Str { return "animal" } }
            class Dog extends Animal {}
            const d = new Dog()
            println(d.name())
            println(d.bark())
        "#;
        let diags = diagnostics(source);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("'bark'"));
    }

    #[test]
    fn unreachable_code_is_a_warning() {
        let diags = diagnostics("fn f() {\n return 1\n println(2)\n println(3)\n}");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Warning);
        assert_eq!(diags[0].code, Some("W0201"));
    }

    #[test]
    fn records_expression_types() {
        let program = parse_source("const a = 1 + 2.0\nconst s = \"n=\" + 1").expect("parse");
        let result = check(&program, &ImportTypes::new());
        let mut found: Vec<Type> = result.types.values().cloned().collect();
        found.sort_by_key(|t| t.to_string());
        assert!(found.contains(&Type::FLOAT));
        assert!(found.contains(&Type::STR));
    }

    #[test]
    fn enums_and_tagged_constructors() {
        let source = r#"
            enum Color { Red, Green }
            enum Shape { Circle(r: Float), Square(side: Float) }
            const c: Color = Color.Red
            const s = Shape.Circle(1.5)
            const bad = Color.Purple
            const wrong = Shape.Square("x")
        "#;
        assert_eq!(codes(source), vec!["E0202", "E0207"]);
    }

    #[test]
    fn when_bindings_are_scoped_to_their_clause() {
        let source = "const v = 3\nconst r = when (v) { n if n > 1 => n, _ => 0 }\nprintln(n)";
        assert_eq!(codes(source), vec!["E0201"]);
    }

    #[test]
    fn channel_types_flow_through_send_and_receive() {
        let source = "const ch = chan Int(1)\nch <- \"text\"\nconst v: Int = <-ch";
        assert_eq!(codes(source), vec!["E0203"]);
    }

    #[test]
    fn imported_names_take_their_export_types() {
        let program = parse_source("import { trim } from \"std:str\"\nconst n: Int = trim(\" a \")")
            .expect("parse");
        let mut imports = ImportTypes::new();
        imports.insert("trim".into(), Type::function(vec![Type::STR], Type::STR));
        let diags = check(&program, &imports).diagnostics;
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, Some("E0203"));
    }
}
