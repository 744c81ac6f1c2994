//! JavaScript code generation.
//!
//! A syntax-directed walk over the AST that writes ES2020 source text.
//! Expressions are rendered bottom-up into `(text, precedence)` pairs so a
//! parent only adds parentheses where JavaScript's precedence requires
//! them. Statements are written line by line into one buffer; nested
//! bodies are rendered into a temporary buffer and spliced back in.

use std::collections::HashSet;

use serde_json::Value;

use crate::ast::{
    BinaryOp, ClassDecl, EnumDecl, ExportDecl, Expr, ExprKind, ImportDecl, Lambda,
    LambdaBody, MemberKind, Param, Pattern, Program, Stmt, StmtKind, TemplatePart, TypeExpr,
    UnaryOp, Visibility, Visitor, When, WhenBody, int_literal_value, walk_expr, walk_stmts,
};
use crate::config::{CompilerOptions, ModuleKind, Prelude};
use crate::stdlib::{std_module_name, std_module_path};

const P_ASSIGN: u8 = 2;
const P_OR: u8 = 3;
const P_AND: u8 = 4;
const P_BITAND: u8 = 7;
const P_EQ: u8 = 8;
const P_REL: u8 = 9;
const P_ADD: u8 = 11;
const P_MUL: u8 = 12;
const P_UNARY: u8 = 14;
const P_CALL: u8 = 17;
const P_PRIMARY: u8 = 18;

/// Generate JavaScript for a whole program.
pub fn generate(program: &Program, options: &CompilerOptions) -> String {
    let mut generator = JsGenerator::new(options);
    generator.collect_enums(&program.body);
    generator.collect_imports(&program.body);
    generator.module_body(&program.body);
    generator.finish()
}

struct ClassContext {
    name: String,
    privates: HashSet<String>,
}

struct LoopContext {
    label: Option<String>,
    switch_depth: usize,
}

struct JsGenerator<'a> {
    options: &'a CompilerOptions,
    out: String,
    indent: usize,
    next_temp: usize,
    uses_runtime: bool,
    classes: Vec<ClassContext>,
    loops: Vec<LoopContext>,
    switch_depth: usize,
    tagged_enums: HashSet<String>,
    plain_enums: HashSet<String>,
    /// Names bound by imports; these shadow the `print` builtins.
    imported: HashSet<String>,
}

impl<'a> JsGenerator<'a> {
    fn new(options: &'a CompilerOptions) -> Self {
        JsGenerator {
            options,
            out: String::new(),
            indent: 0,
            next_temp: 0,
            uses_runtime: false,
            classes: Vec::new(),
            loops: Vec::new(),
            switch_depth: 0,
            tagged_enums: HashSet::new(),
            plain_enums: HashSet::new(),
            imported: HashSet::new(),
        }
    }

    fn finish(self) -> String {
        let wanted = match self.options.prelude {
            Prelude::None => false,
            Prelude::Core => self.uses_runtime,
            Prelude::Full => true,
        };
        if !wanted {
            return self.out;
        }
        let module = Value::String(self.options.runtime_module.clone());
        let header = match self.options.module {
            ModuleKind::Esm => format!("import * as __ljos from {module};\n"),
            ModuleKind::CommonJs => format!("const __ljos = require({module});\n"),
        };
        header + &self.out
    }

    fn collect_enums(&mut self, stmts: &[Stmt]) {
        struct Enums<'g> {
            tagged: &'g mut HashSet<String>,
            plain: &'g mut HashSet<String>,
        }
        impl Visitor for Enums<'_> {
            fn visit_stmt(&mut self, stmt: &Stmt) -> bool {
                if let StmtKind::Enum(decl) = &stmt.kind {
                    let set = if decl.is_tagged() {
                        &mut *self.tagged
                    } else {
                        &mut *self.plain
                    };
                    set.insert(decl.name.name.clone());
                }
                true
            }
        }
        walk_stmts(
            &mut Enums {
                tagged: &mut self.tagged_enums,
                plain: &mut self.plain_enums,
            },
            stmts,
        );
    }

    fn collect_imports(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            if let StmtKind::Import(import) = &stmt.kind {
                let names = import
                    .default
                    .iter()
                    .chain(import.namespace.iter())
                    .chain(import.named.iter().map(|n| n.local()));
                self.imported.extend(names.map(|n| n.name.clone()));
            }
        }
    }

    fn temp(&mut self, prefix: &str) -> String {
        let name = format!("__{prefix}{}", self.next_temp);
        self.next_temp += 1;
        name
    }

    // -----------------------------------------------------------------
    // Output helpers
    // -----------------------------------------------------------------

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    /// Render `body` one level deeper and return it as `{ ... }` text that
    /// closes at the current indentation.
    fn braced(&mut self, body: impl FnOnce(&mut Self)) -> String {
        let saved = std::mem::take(&mut self.out);
        self.indent += 1;
        body(self);
        self.indent -= 1;
        let inner = std::mem::replace(&mut self.out, saved);
        let mut text = String::from("{\n");
        text.push_str(&inner);
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
    // Module level
    // -----------------------------------------------------------------

    fn module_body(&mut self, stmts: &[Stmt]) {
        let scan = BodyScan::of(stmts);
        if !scan.defers {
            self.statements(stmts);
            return;
        }

        let (imports, rest): (Vec<&Stmt>, Vec<&Stmt>) = stmts
            .iter()
            .partition(|s| matches!(s.kind, StmtKind::Import(_)));
        for stmt in imports {
            self.statement(stmt);
        }
        self.line("const __defers = [];");
        let exports = rest.iter().any(|s| matches!(s.kind, StmtKind::Export(_)));
        if exports {
            // exports cannot live inside a block; drain once the body ran
            for stmt in rest {
                self.statement(stmt);
            }
            self.defer_drain();
        } else {
            let body = self.braced(|g| {
                for stmt in rest {
                    g.statement(stmt);
                }
            });
            let drain = self.braced(|g| g.defer_drain());
            self.line(&format!("try {body} finally {drain}"));
        }
    }

    fn defer_drain(&mut self) {
        self.line("for (let __i = __defers.length - 1; __i >= 0; __i--) {");
        self.indent += 1;
        self.line("try {");
        self.line("  __defers[__i]();");
        self.line("} catch (__err) {");
        self.line("  console.error(\"deferred action failed:\", __err);");
        self.line("}");
        self.indent -= 1;
        self.line("}");
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
            StmtKind::Var(_) | StmtKind::Function(_) | StmtKind::Class(_) | StmtKind::Enum(_) => {
                self.declaration(stmt, "")
            }
            StmtKind::Block(body) => {
                let text = self.block(body);
                self.line(&text);
            }
            StmtKind::If { .. } => {
                let text = self.if_chain(stmt);
                self.line(&text);
            }
            StmtKind::While { cond, body } => {
                let label = self.loop_label(body);
                let cond = self.expr(cond);
                let body = self.loop_body(label.clone(), body);
                self.labelled(label, &format!("while ({cond}) {body}"));
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                let label = self.loop_label(body);
                let init = match init {
                    Some(init) => self.inline_statement(init),
                    None => String::new(),
                };
                let cond = cond.as_ref().map(|c| self.expr(c)).unwrap_or_default();
                let update = update.as_ref().map(|u| self.expr(u)).unwrap_or_default();
                let body = self.loop_body(label.clone(), body);
                self.labelled(label, &format!("for ({init}; {cond}; {update}) {body}"));
            }
            StmtKind::ForIn {
                binding,
                iterable,
                body,
            } => {
                let label = self.loop_label(body);
                let head = match &iterable.kind {
                    ExprKind::Range { start, end } => {
                        let start = self.expr_min(start, P_ASSIGN);
                        let end = self.expr_min(end, P_REL + 1);
                        let x = &binding.name;
                        format!("for (let {x} = {start}; {x} < {end}; {x}++)")
                    }
                    _ => {
                        let iterable = self.expr_min(iterable, P_ASSIGN);
                        format!("for (const {} of {iterable})", binding.name)
                    }
                };
                let body = self.loop_body(label.clone(), body);
                self.labelled(label, &format!("{head} {body}"));
            }
            StmtKind::When(when) => self.when(when, WhenMode::Statement),
            StmtKind::Return(value) => match value {
                Some(value) => {
                    let value = self.expr(value);
                    self.line(&format!("return {value};"));
                }
                None => self.line("return;"),
            },
            StmtKind::Break => {
                let text = match self.loops.last() {
                    Some(LoopContext {
                        label: Some(label),
                        switch_depth,
                    }) if self.switch_depth > *switch_depth => format!("break {label};"),
                    _ => "break;".to_string(),
                };
                self.line(&text);
            }
            StmtKind::Continue => self.line("continue;"),
            StmtKind::Throw(value) => {
                let value = self.expr(value);
                self.line(&format!("throw {value};"));
            }
            StmtKind::Try {
                body,
                catch,
                finally,
            } => {
                let mut text = format!("try {}", self.block(body));
                if let Some(clause) = catch {
                    let body = self.block(&clause.body);
                    match &clause.param {
                        Some(param) => text.push_str(&format!(" catch ({}) {body}", param.name)),
                        None => text.push_str(&format!(" catch {body}")),
                    }
                }
                if let Some(finally) = finally {
                    text.push_str(&format!(" finally {}", self.block(finally)));
                }
                self.line(&text);
            }
            StmtKind::Import(import) => self.import(import),
            StmtKind::Export(export) => self.export(export),
            StmtKind::Defer(inner) => {
                let action = match &inner.kind {
                    StmtKind::Expression(expr) => self.arrow_body_expr(expr),
                    StmtKind::Block(body) => self.block(body),
                    _ => self.braced(|g| g.statement(inner)),
                };
                self.line(&format!("__defers.push(() => {action});"));
            }
            StmtKind::Using {
                binding,
                init,
                body,
            } => {
                let init = self.expr(init);
                let name = binding.name.clone();
                let text = self.braced(|g| {
                    g.line(&format!("const {name} = {init};"));
                    let body = g.block(body);
                    let dispose = g.braced(|g| {
                        g.line(&format!("if ({name} != null) {{"));
                        g.line(&format!(
                            "  if (typeof {name}.dispose === \"function\") {name}.dispose();"
                        ));
                        g.line(&format!(
                            "  else if (typeof {name}.close === \"function\") {name}.close();"
                        ));
                        g.line("}");
                    });
                    g.line(&format!("try {body} finally {dispose}"));
                });
                self.line(&text);
            }
            StmtKind::Expression(expr) => self.expression_statement(expr),
            StmtKind::Empty => {}
        }
    }

    fn expression_statement(&mut self, expr: &Expr) {
        let text = self.expr(expr);
        if text.starts_with('{') || text.starts_with("function") {
            self.line(&format!("({text});"));
        } else {
            self.line(&format!("{text};"));
        }
    }

    fn declaration(&mut self, stmt: &Stmt, prefix: &str) {
        match &stmt.kind {
            StmtKind::Var(decl) => {
                let keyword = if decl.mutable { "let" } else { "const" };
                match &decl.init {
                    Some(init) => {
                        let init = self.expr_min(init, P_ASSIGN);
                        self.line(&format!("{prefix}{keyword} {} = {init};", decl.name.name));
                    }
                    None => self.line(&format!("{prefix}{keyword} {};", decl.name.name)),
                }
            }
            StmtKind::Function(func) => {
                let scan = BodyScan::of(&func.body);
                let params = self.params(&func.params);
                let body = self.function_body(&[], &func.body);
                self.line(&format!(
                    "{prefix}{}function{} {}({params}) {body}",
                    if scan.awaits { "async " } else { "" },
                    if scan.yields { "*" } else { "" },
                    func.name.name
                ));
            }
            StmtKind::Class(class) => self.class(class, prefix),
            StmtKind::Enum(decl) => self.enumeration(decl, prefix),
            _ => self.statement(stmt),
        }
    }

    /// A statement in `for (...)` init position, without its `;`.
    fn inline_statement(&mut self, stmt: &Stmt) -> String {
        match &stmt.kind {
            StmtKind::Var(decl) => {
                let keyword = if decl.mutable { "let" } else { "const" };
                match &decl.init {
                    Some(init) => {
                        let init = self.expr_min(init, P_ASSIGN);
                        format!("{keyword} {} = {init}", decl.name.name)
                    }
                    None => format!("{keyword} {}", decl.name.name),
                }
            }
            StmtKind::Expression(expr) => self.expr(expr),
            _ => String::new(),
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

    /// Loops containing a subject `when` need a label: its cases become a
    /// `switch`, where a bare `break` would only leave the switch.
    fn loop_label(&mut self, body: &[Stmt]) -> Option<String> {
        BodyScan::of(body).subject_when.then(|| self.temp("loop"))
    }

    fn loop_body(&mut self, label: Option<String>, body: &[Stmt]) -> String {
        self.loops.push(LoopContext {
            label,
            switch_depth: self.switch_depth,
        });
        let text = self.block(body);
        self.loops.pop();
        text
    }

    fn labelled(&mut self, label: Option<String>, text: &str) {
        match label {
            Some(label) => self.line(&format!("{label}: {text}")),
            None => self.line(text),
        }
    }

    // -----------------------------------------------------------------
    // Functions
    // -----------------------------------------------------------------

    fn params(&mut self, params: &[Param]) -> String {
        params
            .iter()
            .map(|param| {
                if param.rest {
                    format!("...{}", param.name.name)
                } else if let Some(default) = &param.default {
                    format!("{} = {}", param.name.name, self.expr_min(default, P_ASSIGN))
                } else {
                    param.name.name.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Body of a function, method or constructor. Loops and switches of
    /// the enclosing code do not reach into it.
    fn function_body(&mut self, prologue: &[String], body: &[Stmt]) -> String {
        let loops = std::mem::take(&mut self.loops);
        let switch_depth = std::mem::replace(&mut self.switch_depth, 0);
        let defers = BodyScan::of(body).defers;
        let text = self.braced(|g| {
            for line in prologue {
                g.line(line);
            }
            if defers {
                g.line("const __defers = [];");
                let inner = g.block(body);
                let drain = g.braced(|g| g.defer_drain());
                g.line(&format!("try {inner} finally {drain}"));
            } else {
                g.statements(body);
            }
        });
        self.loops = loops;
        self.switch_depth = switch_depth;
        text
    }

    fn lambda(&mut self, lambda: &Lambda) -> (String, u8) {
        let params = self.params(&lambda.params);
        let (awaits, yields) = match &lambda.body {
            LambdaBody::Block(body) => {
                let scan = BodyScan::of(body);
                (scan.awaits, scan.yields)
            }
            LambdaBody::Expr(body) => (BodyScan::of_expr(body).awaits, false),
        };
        let prefix = if awaits { "async " } else { "" };
        if lambda.is_fn || yields {
            let body = match &lambda.body {
                LambdaBody::Block(body) => self.function_body(&[], body),
                LambdaBody::Expr(body) => {
                    let value = self.expr(body);
                    self.braced(|g| g.line(&format!("return {value};")))
                }
            };
            let star = if yields { "*" } else { "" };
            return (format!("{prefix}function{star} ({params}) {body}"), P_ASSIGN);
        }
        let body = match &lambda.body {
            LambdaBody::Block(body) => self.function_body(&[], body),
            LambdaBody::Expr(body) => self.arrow_body_expr(body),
        };
        (format!("{prefix}({params}) => {body}"), P_ASSIGN)
    }

    fn arrow_body_expr(&mut self, expr: &Expr) -> String {
        let text = self.expr_min(expr, P_ASSIGN);
        if text.starts_with('{') {
            format!("({text})")
        } else {
            text
        }
    }

    // -----------------------------------------------------------------
    // Classes and enums
    // -----------------------------------------------------------------

    fn class(&mut self, class: &ClassDecl, prefix: &str) {
        let name = class.name.name.clone();
        let head = match &class.superclass {
            Some(base) => format!("{prefix}class {name} extends {}", base.name),
            None => format!("{prefix}class {name}"),
        };
        self.classes.push(ClassContext {
            name: name.clone(),
            privates: class
                .private_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        });

        let guard = format!(
            "if (new.target === {name}) throw new TypeError(\"Cannot instantiate abstract class {name}\");"
        );
        let body = self.braced(|g| {
            for member in &class.members {
                let member_name = |n: &str| {
                    let n = if member.visibility == Visibility::Private {
                        format!("#{n}")
                    } else {
                        n.to_string()
                    };
                    if member.is_static {
                        format!("static {n}")
                    } else {
                        n
                    }
                };
                match &member.kind {
                    MemberKind::Field { name, init, .. } => {
                        let field = member_name(&name.name);
                        match init {
                            Some(init) => {
                                let init = g.expr_min(init, P_ASSIGN);
                                g.line(&format!("{field} = {init};"));
                            }
                            None => g.line(&format!("{field};")),
                        }
                    }
                    MemberKind::Method {
                        name,
                        params,
                        body: Some(body),
                        ..
                    } => {
                        let scan = BodyScan::of(body);
                        let mut head = member_name(&name.name);
                        if scan.yields {
                            head = insert_before_name(&head, "*");
                        }
                        if scan.awaits {
                            head = insert_before_name(&head, "async ");
                        }
                        let params = g.params(params);
                        let body = g.function_body(&[], body);
                        g.line(&format!("{head}({params}) {body}"));
                    }
                    // abstract methods have no runtime presence
                    MemberKind::Method { body: None, .. } => {}
                    MemberKind::Constructor { params, body } => {
                        let prologue = if class.is_abstract {
                            vec![guard.clone()]
                        } else {
                            Vec::new()
                        };
                        let params = g.params(params);
                        let body = g.function_body(&prologue, body);
                        g.line(&format!("constructor({params}) {body}"));
                    }
                }
            }
            if class.is_abstract && class.constructor().is_none() {
                g.line("constructor(...args) {");
                g.line(&format!("  {guard}"));
                if class.superclass.is_some() {
                    g.line("  super(...args);");
                }
                g.line("}");
            }
        });
        self.classes.pop();
        self.line(&format!("{head} {body}"));
    }

    fn enumeration(&mut self, decl: &EnumDecl, prefix: &str) {
        let name = &decl.name.name;
        if !decl.is_tagged() {
            let mut next: Option<u128> = Some(0);
            let mut entries = Vec::new();
            for (index, member) in decl.members.iter().enumerate() {
                let value = match &member.value {
                    Some(value) => {
                        next = match &value.kind {
                            ExprKind::Int(text) => int_literal_value(text).map(|v| v + 1),
                            _ => None,
                        };
                        self.expr_min(value, P_ASSIGN)
                    }
                    None => {
                        let value = next.unwrap_or(index as u128);
                        next = Some(value + 1);
                        value.to_string()
                    }
                };
                entries.push(format!("{}: {value}", member.name.name));
            }
            self.line(&format!(
                "{prefix}const {name} = Object.freeze({{ {} }});",
                entries.join(", ")
            ));
            return;
        }

        let enum_name = Value::String(name.clone());
        let body = self.braced(|g| {
            for member in &decl.members {
                let variant = &member.name.name;
                let tag = format!("$enum: {enum_name}, $variant: {}", Value::String(variant.clone()));
                match &member.fields {
                    Some(fields) => {
                        let params: Vec<&str> =
                            fields.iter().map(|f| f.name.name.as_str()).collect();
                        g.line(&format!(
                            "{variant}: ({}) => Object.freeze({{ {tag}, {} }}),",
                            params.join(", "),
                            params.join(", ")
                        ));
                    }
                    None => g.line(&format!("{variant}: Object.freeze({{ {tag} }}),")),
                }
            }
            g.line("match(value, handlers) {");
            g.line("  const handler = Object.prototype.hasOwnProperty.call(handlers, value.$variant)");
            g.line("    ? handlers[value.$variant]");
            g.line("    : handlers._;");
            g.line("  if (handler === undefined) {");
            g.line(&format!(
                "    throw new Error(\"no handler for \" + {enum_name} + \".\" + value.$variant);"
            ));
            g.line("  }");
            g.line("  return typeof handler === \"function\" ? handler(value) : handler;");
            g.line("},");
            g.line("is(value, variant) {");
            g.line(&format!(
                "  return value != null && value.$enum === {enum_name} && value.$variant === variant;"
            ));
            g.line("},");
        });
        self.line(&format!("{prefix}const {name} = Object.freeze({body});"));
    }

    // -----------------------------------------------------------------
    // `when`
    // -----------------------------------------------------------------

    fn when(&mut self, when: &When, mode: WhenMode) {
        let Some(subject) = &when.subject else {
            self.when_conditions(when, mode);
            return;
        };

        let subject = self.expr_min(subject, P_ASSIGN);
        let temp = self.temp("w");
        let label = match mode {
            WhenMode::Statement => Some(self.temp("when")),
            WhenMode::Value => None,
        };
        // Only a leading run of unguarded literal clauses becomes a
        // `switch`; the rest stay an ordered chain so clause order holds.
        let split = when
            .clauses
            .iter()
            .position(|c| c.guard.is_some() || !c.pattern.is_switchable())
            .unwrap_or(when.clauses.len());
        let (cases, rest) = when.clauses.split_at(split);

        let text = self.braced(|g| {
            g.line(&format!("const {temp} = {subject};"));
            let inner = g.braced(|g| {
                if !cases.is_empty() {
                    g.line(&format!("switch ({temp}) {{"));
                    g.indent += 1;
                    g.switch_depth += 1;
                    for clause in cases {
                        let labels: Vec<String> = switch_values(&clause.pattern)
                            .into_iter()
                            .map(|value| format!("case {}:", g.expr_min(value, P_ASSIGN)))
                            .collect();
                        let body = g.braced(|g| {
                            g.clause_body(&None, &clause.body, mode, label.as_deref());
                        });
                        if let Some((last, first)) = labels.split_last() {
                            for case in first {
                                g.line(case);
                            }
                            g.line(&format!("{last} {body}"));
                        }
                    }
                    g.switch_depth -= 1;
                    g.indent -= 1;
                    g.line("}");
                }
                for clause in rest {
                    match &clause.pattern {
                        Pattern::Else(_) => {
                            g.clause_body(&None, &clause.body, mode, None);
                            break;
                        }
                        Pattern::Binding(name) => {
                            let body = g.braced(|g| {
                                g.line(&format!("const {} = {temp};", name.name));
                                g.clause_body(&clause.guard, &clause.body, mode, label.as_deref());
                            });
                            g.line(&body);
                        }
                        Pattern::Wildcard(_) => {
                            let body = g.braced(|g| {
                                g.clause_body(&clause.guard, &clause.body, mode, label.as_deref())
                            });
                            g.line(&body);
                        }
                        pattern => {
                            let test = g.pattern_test(pattern, &temp);
                            let body = g.braced(|g| {
                                g.clause_body(&clause.guard, &clause.body, mode, label.as_deref())
                            });
                            g.line(&format!("if ({test}) {body}"));
                        }
                    }
                }
            });
            match &label {
                Some(label) => g.line(&format!("{label}: {inner}")),
                None => g.line(&inner),
            }
        });
        self.line(&text);
    }

    /// Subject-less `when`: an ordered `if` chain.
    fn when_conditions(&mut self, when: &When, mode: WhenMode) {
        let mut text = String::new();
        for clause in &when.clauses {
            let body = self.braced(|g| g.clause_body(&None, &clause.body, mode, None));
            match &clause.pattern {
                Pattern::Literal(cond) => {
                    let cond = match &clause.guard {
                        Some(guard) => format!(
                            "{} && {}",
                            self.expr_min(cond, P_AND),
                            self.expr_min(guard, P_AND + 1)
                        ),
                        None => self.expr(cond),
                    };
                    if !text.is_empty() {
                        text.push_str(" else ");
                    }
                    text.push_str(&format!("if ({cond}) {body}"));
                }
                _ => {
                    if text.is_empty() {
                        text = body;
                    } else {
                        text.push_str(&format!(" else {body}"));
                    }
                    break;
                }
            }
        }
        if !text.is_empty() {
            self.line(&text);
        }
    }

    fn clause_body(
        &mut self,
        guard: &Option<Expr>,
        body: &WhenBody,
        mode: WhenMode,
        exit: Option<&str>,
    ) {
        let emit = |g: &mut Self| {
            match (body, mode) {
                (WhenBody::Expr(expr), WhenMode::Value) => {
                    let value = g.expr(expr);
                    g.line(&format!("return {value};"));
                    return;
                }
                (WhenBody::Expr(expr), WhenMode::Statement) => g.expression_statement(expr),
                (WhenBody::Block(stmts), _) => g.statements(stmts),
            }
            if let Some(exit) = exit {
                g.line(&format!("break {exit};"));
            }
        };
        match guard {
            Some(guard) => {
                let guard = self.expr(guard);
                let body = self.braced(emit);
                self.line(&format!("if ({guard}) {body}"));
            }
            None => emit(self),
        }
    }

    fn pattern_test(&mut self, pattern: &Pattern, temp: &str) -> String {
        match pattern {
            Pattern::Literal(value) | Pattern::Value(value) => {
                let value = self.expr_min(value, P_REL);
                format!("{temp} === {value}")
            }
            Pattern::TypeTest(ty) => self.type_test(temp, ty).0,
            Pattern::Or(alternatives) => alternatives
                .iter()
                .map(|alt| {
                    let test = self.pattern_test(alt, temp);
                    format!("({test})")
                })
                .collect::<Vec<_>>()
                .join(" || "),
            Pattern::Binding(_) | Pattern::Wildcard(_) | Pattern::Else(_) => "true".to_string(),
        }
    }

    // -----------------------------------------------------------------
    // Modules
    // -----------------------------------------------------------------

    fn module_specifier(&self, specifier: &str) -> String {
        let rewritten = if let Some(name) = std_module_name(specifier) {
            std_module_path(&self.options.runtime_dir, name)
        } else if let Some(stem) = specifier.strip_suffix(".lj") {
            format!("{stem}.js")
        } else if specifier.starts_with('.')
            && !specifier.rsplit('/').next().is_some_and(|f| f.contains('.'))
        {
            format!("{specifier}.js")
        } else {
            specifier.to_string()
        };
        Value::String(rewritten).to_string()
    }

    fn import(&mut self, import: &ImportDecl) {
        let source = self.module_specifier(&import.source);
        let named: Vec<(String, String)> = import
            .named
            .iter()
            .map(|n| (n.name.name.clone(), n.local().name.clone()))
            .collect();
        match self.options.module {
            ModuleKind::Esm => {
                let mut clauses = Vec::new();
                if let Some(default) = &import.default {
                    clauses.push(default.name.clone());
                }
                if let Some(namespace) = &import.namespace {
                    clauses.push(format!("* as {}", namespace.name));
                }
                if !named.is_empty() {
                    let names: Vec<String> = named
                        .iter()
                        .map(|(name, local)| {
                            if name == local {
                                name.clone()
                            } else {
                                format!("{name} as {local}")
                            }
                        })
                        .collect();
                    clauses.push(format!("{{ {} }}", names.join(", ")));
                }
                if clauses.is_empty() {
                    self.line(&format!("import {source};"));
                } else {
                    self.line(&format!("import {} from {source};", clauses.join(", ")));
                }
            }
            ModuleKind::CommonJs => {
                let module = match &import.namespace {
                    Some(namespace) => namespace.name.clone(),
                    None => self.temp("mod"),
                };
                self.line(&format!("const {module} = require({source});"));
                if let Some(default) = &import.default {
                    self.line(&format!("const {} = {module}.default;", default.name));
                }
                if !named.is_empty() {
                    let names: Vec<String> = named
                        .iter()
                        .map(|(name, local)| {
                            if name == local {
                                name.clone()
                            } else {
                                format!("{name}: {local}")
                            }
                        })
                        .collect();
                    self.line(&format!("const {{ {} }} = {module};", names.join(", ")));
                }
            }
        }
    }

    fn export(&mut self, export: &ExportDecl) {
        let commonjs = self.options.module == ModuleKind::CommonJs;
        match export {
            ExportDecl::Decl(inner) => {
                if !commonjs {
                    self.declaration(inner, "export ");
                    return;
                }
                self.declaration(inner, "");
                if let Some(name) = declared_name(inner) {
                    self.line(&format!("module.exports.{name} = {name};"));
                }
            }
            ExportDecl::Default(value) => {
                let value = self.expr_min(value, P_ASSIGN);
                if commonjs {
                    self.line(&format!("module.exports.default = {value};"));
                } else {
                    self.line(&format!("export default {value};"));
                }
            }
            ExportDecl::Named(names) => {
                if commonjs {
                    for name in names {
                        self.line(&format!(
                            "module.exports.{} = {};",
                            name.local().name,
                            name.name.name
                        ));
                    }
                } else {
                    let names: Vec<String> = names
                        .iter()
                        .map(|n| match &n.alias {
                            Some(alias) => format!("{} as {}", n.name.name, alias.name),
                            None => n.name.name.clone(),
                        })
                        .collect();
                    self.line(&format!("export {{ {} }};", names.join(", ")));
                }
            }
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
            ExprKind::Str(value) => (Value::String(value.clone()).to_string(), P_PRIMARY),
            ExprKind::Template(parts) => {
                let mut text = String::from("`");
                for part in parts {
                    match part {
                        TemplatePart::Text(t) => text.push_str(&escape_template(t)),
                        TemplatePart::Expr(e) => {
                            let inner = self.expr(e);
                            text.push_str(&format!("${{{inner}}}"));
                        }
                    }
                }
                text.push('`');
                (text, P_PRIMARY)
            }
            ExprKind::Bool(value) => (value.to_string(), P_PRIMARY),
            ExprKind::Nul => ("null".to_string(), P_PRIMARY),
            ExprKind::Ident(name) => {
                if matches!(name.as_str(), "print" | "println") && !self.imported.contains(name) {
                    ("console.log".to_string(), P_CALL)
                } else {
                    (name.clone(), P_PRIMARY)
                }
            }
            ExprKind::This => ("this".to_string(), P_PRIMARY),
            ExprKind::Super => ("super".to_string(), P_PRIMARY),
            ExprKind::Array(items) => {
                let items: Vec<String> = items.iter().map(|i| self.expr_min(i, P_ASSIGN)).collect();
                (format!("[{}]", items.join(", ")), P_PRIMARY)
            }
            ExprKind::Object(properties) => {
                if properties.is_empty() {
                    return ("{}".to_string(), P_PRIMARY);
                }
                let props: Vec<String> = properties
                    .iter()
                    .map(|p| {
                        let key = if is_js_identifier(&p.key) {
                            p.key.clone()
                        } else {
                            Value::String(p.key.clone()).to_string()
                        };
                        format!("{key}: {}", self.expr_min(&p.value, P_ASSIGN))
                    })
                    .collect();
                (format!("{{ {} }}", props.join(", ")), P_PRIMARY)
            }
            ExprKind::Unary { op, operand } => self.unary(*op, operand),
            ExprKind::Binary { op, left, right } => {
                let (symbol, prec) = binary_symbol(*op);
                let left = self.expr_min(left, prec);
                let right = self.expr_min(right, prec + 1);
                (format!("{left} {symbol} {right}"), prec)
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
                let awaits = BodyScan::of_expr(expr).awaits;
                let body = self.braced(|g| g.when(when, WhenMode::Value));
                if awaits {
                    (format!("await (async () => {body})()"), P_UNARY)
                } else {
                    (format!("(() => {body})()"), P_CALL)
                }
            }
            ExprKind::TypeTest { expr: inner, ty } => {
                let subject = self.expr_min(inner, P_UNARY);
                self.type_test(&subject, ty)
            }
            ExprKind::InstanceOf { expr: inner, class } => {
                let value = self.expr_min(inner, P_REL);
                let class = self.expr_min(class, P_REL + 1);
                (format!("{value} instanceof {class}"), P_REL)
            }
            ExprKind::Cast { expr: inner, ty } => self.cast(inner, ty),
            ExprKind::Call { callee, args } => {
                let callee_text = self.expr_min(callee, P_CALL);
                let args: Vec<String> = args.iter().map(|a| self.expr_min(a, P_ASSIGN)).collect();
                let call = format!("{callee_text}({})", args.join(", "));
                if is_ident(callee, "select") {
                    (format!("await {call}"), P_UNARY)
                } else {
                    (call, P_CALL)
                }
            }
            ExprKind::Member {
                object,
                property,
                optional,
            } => {
                let dot = if *optional { "?." } else { "." };
                let name = if self.is_private_access(&property.name) {
                    format!("#{}", property.name)
                } else {
                    property.name.clone()
                };
                let object = match &object.kind {
                    ExprKind::Int(_) | ExprKind::Float(_) => format!("({})", self.expr(object)),
                    _ => self.expr_min(object, P_CALL),
                };
                (format!("{object}{dot}{name}"), P_CALL)
            }
            ExprKind::Index { object, index } => {
                let object = self.expr_min(object, P_CALL);
                let index = self.expr(index);
                (format!("{object}[{index}]"), P_CALL)
            }
            ExprKind::Range { start, end } => {
                self.uses_runtime = true;
                let start = self.expr_min(start, P_ASSIGN);
                let end = self.expr_min(end, P_ASSIGN);
                (format!("__ljos.range({start}, {end})"), P_CALL)
            }
            ExprKind::Send { channel, value } => {
                let channel = self.expr_min(channel, P_CALL);
                let value = self.expr_min(value, P_ASSIGN);
                (format!("await {channel}.send({value})"), P_UNARY)
            }
            ExprKind::Receive(channel) => {
                let channel = self.expr_min(channel, P_CALL);
                (format!("await {channel}.receive()"), P_UNARY)
            }
            ExprKind::New { class, args } => {
                let class = match &class.kind {
                    ExprKind::Ident(_) | ExprKind::Member { .. } => self.expr_min(class, P_CALL),
                    _ => format!("({})", self.expr(class)),
                };
                let args: Vec<String> = args.iter().map(|a| self.expr_min(a, P_ASSIGN)).collect();
                (format!("new {class}({})", args.join(", ")), P_CALL)
            }
            ExprKind::Lambda(lambda) => self.lambda(lambda),
            ExprKind::MakeChan { capacity, .. } => {
                self.uses_runtime = true;
                let capacity = match capacity {
                    Some(c) => self.expr_min(c, P_ASSIGN),
                    None => "0".to_string(),
                };
                (format!("new __ljos.Channel({capacity})"), P_CALL)
            }
            ExprKind::Go(task) => {
                self.uses_runtime = true;
                let prefix = if BodyScan::of_expr(task).awaits {
                    "async "
                } else {
                    ""
                };
                let body = self.arrow_body_expr(task);
                (format!("__ljos.go({prefix}() => {body})"), P_CALL)
            }
            ExprKind::Await(value) => {
                let value = self.expr_min(value, P_UNARY);
                (format!("await {value}"), P_UNARY)
            }
        }
    }

    fn unary(&mut self, op: UnaryOp, operand: &Expr) -> (String, u8) {
        let prefix = match op {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
            UnaryOp::Typeof => "typeof ",
            UnaryOp::Void => "void ",
            UnaryOp::Delete => "delete ",
            UnaryOp::Yield => {
                if matches!(operand.kind, ExprKind::Nul) {
                    return ("yield".to_string(), P_ASSIGN);
                }
                let value = self.expr_min(operand, P_ASSIGN);
                return (format!("yield {value}"), P_ASSIGN);
            }
        };
        let value = self.expr_min(operand, P_UNARY);
        // `- -x` must not become `--x`
        if op == UnaryOp::Neg && value.starts_with('-') {
            return (format!("-({value})"), P_UNARY);
        }
        (format!("{prefix}{value}"), P_UNARY)
    }

    /// Inside a class body every access to one of its private names goes
    /// through `#name`, whatever the receiver. The checker has already
    /// rejected such accesses outside the class.
    fn is_private_access(&self, property: &str) -> bool {
        self.classes
            .last()
            .is_some_and(|class| class.privates.contains(property))
    }

    /// `subject is ty`; `subject` is already safe as a unary operand.
    fn type_test(&mut self, subject: &str, ty: &TypeExpr) -> (String, u8) {
        match ty {
            TypeExpr::Named(name) => match name.name.as_str() {
                "Int" | "Byte" => (format!("Number.isInteger({subject})"), P_CALL),
                "Float" | "Num" => (format!("typeof {subject} === \"number\""), P_EQ),
                "Str" | "Char" => (format!("typeof {subject} === \"string\""), P_EQ),
                "Bool" => (format!("typeof {subject} === \"boolean\""), P_EQ),
                "Nul" | "Void" => (format!("{subject} === null"), P_EQ),
                "Any" => ("true".to_string(), P_PRIMARY),
                other if self.tagged_enums.contains(other) => (
                    format!(
                        "({subject} != null && {subject}.$enum === {})",
                        Value::String(other.to_string())
                    ),
                    P_PRIMARY,
                ),
                other if self.plain_enums.contains(other) => (
                    format!("Object.values({other}).includes({subject})"),
                    P_CALL,
                ),
                other => (format!("{subject} instanceof {other}"), P_REL),
            },
            TypeExpr::Array(_) => (format!("Array.isArray({subject})"), P_CALL),
            TypeExpr::Function { .. } => (format!("typeof {subject} === \"function\""), P_EQ),
            TypeExpr::Chan(_) => {
                self.uses_runtime = true;
                (format!("{subject} instanceof __ljos.Channel"), P_REL)
            }
        }
    }

    fn cast(&mut self, value: &Expr, ty: &TypeExpr) -> (String, u8) {
        let TypeExpr::Named(name) = ty else {
            return self.emit(value);
        };
        let name = name.name.as_str();
        let wrap = |g: &mut Self, f: &str| {
            let inner = g.expr_min(value, P_ASSIGN);
            (format!("{f}({inner})"), P_CALL)
        };
        match name {
            "Int" => wrap(self, "Math.trunc"),
            "Float" | "Num" => wrap(self, "Number"),
            "Str" | "Char" => wrap(self, "String"),
            "Bool" => wrap(self, "Boolean"),
            "Byte" => {
                let inner = self.expr_min(value, P_EQ);
                (format!("{inner} & 0xff"), P_BITAND)
            }
            "Any" | "Void" | "Nul" => self.emit(value),
            _ if self.tagged_enums.contains(name) || self.plain_enums.contains(name) => {
                self.emit(value)
            }
            class => {
                let inner = self.expr_min(value, P_ASSIGN);
                let message = Value::String(format!("value is not a {class}"));
                (
                    format!(
                        "((__v) => {{ if (!(__v instanceof {class})) throw new TypeError({message}); return __v; }})({inner})"
                    ),
                    P_CALL,
                )
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WhenMode {
    Statement,
    /// Inside the IIFE of a `when` expression; bodies `return` their value.
    Value,
}

/// What a function body contains, not looking into nested functions.
#[derive(Debug, Default)]
struct BodyScan {
    awaits: bool,
    yields: bool,
    defers: bool,
    subject_when: bool,
}

impl BodyScan {
    fn of(stmts: &[Stmt]) -> Self {
        let mut scan = BodyScan::default();
        walk_stmts(&mut scan, stmts);
        scan
    }

    fn of_expr(expr: &Expr) -> Self {
        let mut scan = BodyScan::default();
        walk_expr(&mut scan, expr);
        scan
    }
}

impl Visitor for BodyScan {
    fn visit_stmt(&mut self, stmt: &Stmt) -> bool {
        match &stmt.kind {
            StmtKind::Function(_) | StmtKind::Class(_) => false,
            StmtKind::Defer(_) => {
                self.defers = true;
                true
            }
            StmtKind::When(when) => {
                self.subject_when |= when.subject.is_some();
                true
            }
            _ => true,
        }
    }

    fn visit_expr(&mut self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Lambda(_) | ExprKind::Go(_) => false,
            ExprKind::Await(_) | ExprKind::Receive(_) | ExprKind::Send { .. } => {
                self.awaits = true;
                true
            }
            ExprKind::Call { callee, .. } if is_ident(callee, "select") => {
                self.awaits = true;
                true
            }
            ExprKind::Unary {
                op: UnaryOp::Yield, ..
            } => {
                self.yields = true;
                true
            }
            _ => true,
        }
    }
}

fn switch_values(pattern: &Pattern) -> Vec<&Expr> {
    match pattern {
        Pattern::Literal(value) | Pattern::Value(value) => vec![value],
        Pattern::Or(alternatives) => alternatives.iter().flat_map(switch_values).collect(),
        _ => Vec::new(),
    }
}

fn declared_name(stmt: &Stmt) -> Option<&str> {
    match &stmt.kind {
        StmtKind::Var(decl) => Some(&decl.name.name),
        StmtKind::Function(func) => Some(&func.name.name),
        StmtKind::Class(class) => Some(&class.name.name),
        StmtKind::Enum(decl) => Some(&decl.name.name),
        _ => None,
    }
}

fn is_ident(expr: &Expr, name: &str) -> bool {
    matches!(&expr.kind, ExprKind::Ident(n) if n == name)
}

/// Put `marker` in front of the member name, after any `static `.
fn insert_before_name(head: &str, marker: &str) -> String {
    match head.strip_prefix("static ") {
        Some(rest) => format!("static {marker}{rest}"),
        None => format!("{marker}{head}"),
    }
}

fn binary_symbol(op: BinaryOp) -> (&'static str, u8) {
    match op {
        BinaryOp::Or => ("||", P_OR),
        BinaryOp::And => ("&&", P_AND),
        BinaryOp::Eq => ("===", P_EQ),
        BinaryOp::Ne => ("!==", P_EQ),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => (op.symbol(), P_REL),
        BinaryOp::Add | BinaryOp::Sub => (op.symbol(), P_ADD),
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => (op.symbol(), P_MUL),
    }
}

fn escape_template(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
}

fn is_js_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn js(source: &str) -> String {
        js_with(source, &CompilerOptions::default())
    }

    fn js_with(source: &str, options: &CompilerOptions) -> String {
        let program = parse_source(source).expect("parse");
        generate(&program, options)
    }

    #[test]
    fn numeric_literals_are_normalised() {
        let out = js("const a = 1_000_000\nconst b = 0b1010_1100\nconst c = 0xDEAD_BEEF");
        assert!(out.contains("const a = 1000000;"), "{out}");
        assert!(out.contains("const b = 172;"), "{out}");
        assert!(out.contains("const c = 3735928559;"), "{out}");
    }

    #[test]
    fn comma_and_semicolon_become_logical_operators() {
        let out = js("const x = a, b; c");
        assert!(out.contains("const x = a && b || c;"), "{out}");
    }

    #[test]
    fn parenthesises_only_where_needed() {
        let out = js("const x = (a + b) * c\nconst y = a + b * c\nconst z = a - (b - c)");
        assert!(out.contains("(a + b) * c"), "{out}");
        assert!(out.contains("a + b * c"), "{out}");
        assert!(out.contains("a - (b - c)"), "{out}");
    }

    #[test]
    fn declarations_and_functions() {
        let out = js("mut n = 0\nfn add(a: Int, b: Int = 1, ...rest: Int[]): Int { return a + b }");
        assert!(out.contains("let n = 0;"), "{out}");
        assert!(out.contains("function add(a, b = 1, ...rest) {"), "{out}");
        assert!(out.contains("  return a + b;"), "{out}");
    }

    #[test]
    fn range_loops_count() {
        let out = js("for i in 0..10 { println(i) }");
        assert!(out.contains("for (let i = 0; i < 10; i++) {"), "{out}");
        assert!(out.contains("console.log(i);"), "{out}");
        assert!(!out.contains("__ljos"), "{out}");
    }

    #[test]
    fn ranges_outside_loops_use_the_runtime() {
        let out = js("const r = 1..4");
        assert!(out.starts_with("import * as __ljos from \"ljos/runtime\";\n"), "{out}");
        assert!(out.contains("__ljos.range(1, 4)"), "{out}");

        let bare = CompilerOptions {
            prelude: Prelude::None,
            ..CompilerOptions::default()
        };
        assert!(!js_with("const r = 1..4", &bare).contains("import"));
    }

    #[test]
    fn full_prelude_always_imports_the_runtime() {
        let full = CompilerOptions {
            prelude: Prelude::Full,
            ..CompilerOptions::default()
        };
        let out = js_with("const x = 1", &full);
        assert!(out.starts_with("import * as __ljos from \"ljos/runtime\";\n"), "{out}");
        assert!(!js("const x = 1").contains("__ljos"));
    }

    #[test]
    fn private_members_use_hash_names() {
        let out = js(r#"
            class Counter {
                private mut count: Int = 0
                fn inc() { this.count += 1 }
                private fn reset() { this.count = 0 }
                fn clear() { this.reset() }
            }
        "#);
        assert!(out.contains("#count = 0;"), "{out}");
        assert!(out.contains("this.#count += 1;"), "{out}");
        assert!(out.contains("#reset() {"), "{out}");
        assert!(out.contains("this.#reset();"), "{out}");
    }

    #[test]
    fn private_members_of_other_instances_use_hash_names() {
        let out = js(r#"
            class Account {
                private mut balance: Int = 0
                fn same(other: Account): Bool { return this.balance == other.balance }
                fn copy(source: Account) { this.balance = source?.balance }
            }
        "#);
        assert!(out.contains("return this.#balance === other.#balance;"), "{out}");
        assert!(out.contains("source?.#balance"), "{out}");
        assert!(!out.contains(".balance"), "{out}");
    }

    #[test]
    fn abstract_guard_only_for_abstract_classes() {
        let out = js(r#"
            abstract class Shape { abstract fn area(): Float }
            class Square extends Shape {
                constructor(s: Float) { super() }
                fn area(): Float { return 1.0 }
            }
        "#);
        assert_eq!(out.matches("new.target").count(), 1, "{out}");
        assert!(out.contains("if (new.target === Shape)"), "{out}");
        assert!(out.contains("constructor(...args) {"), "{out}");
        assert!(!out.contains("super(...args)"), "{out}");
        assert_eq!(out.matches("area()").count(), 1, "{out}");
    }

    #[test]
    fn abstract_constructors_get_the_guard_first() {
        let out = js("abstract class A extends B { constructor(x: Int) { super(x) } }");
        let guard = out.find("new.target === A").expect("guard");
        let call = out.find("super(x);").expect("super");
        assert!(guard < call, "{out}");
    }

    #[test]
    fn plain_enums_are_frozen_objects() {
        let out = js("enum Color { Red, Green = 5, Blue }");
        assert!(
            out.contains("const Color = Object.freeze({ Red: 0, Green: 5, Blue: 6 });"),
            "{out}"
        );
    }

    #[test]
    fn tagged_enums_get_factories_and_helpers() {
        let out = js("enum Shape { Circle(radius: Float), Empty }");
        assert!(out.contains("Circle: (radius) => Object.freeze({ $enum: \"Shape\", $variant: \"Circle\", radius }),"), "{out}");
        assert!(out.contains("Empty: Object.freeze({ $enum: \"Shape\", $variant: \"Empty\" }),"), "{out}");
        assert!(out.contains("match(value, handlers) {"), "{out}");
        assert!(out.contains("is(value, variant) {"), "{out}");
    }

    #[test]
    fn when_with_subject_becomes_a_labelled_switch() {
        let out = js("when (v) {\n 1 | 2 => a()\n n if n > 10 => b(n)\n else => c()\n}");
        assert!(out.contains("const __w0 = v;"), "{out}");
        assert!(out.contains("__when1: {"), "{out}");
        assert!(out.contains("case 1:\n"), "{out}");
        assert!(out.contains("case 2: "), "{out}");
        assert!(out.contains("break __when1;"), "{out}");
        assert!(out.contains("const n = __w0;"), "{out}");
        assert!(out.contains("if (n > 10) {"), "{out}");
        assert!(out.contains("c();"), "{out}");
    }

    #[test]
    fn when_keeps_clause_order_after_a_binding() {
        let out = js("when (v) {\n x => first(x)\n 1 => second()\n else => third()\n}");
        assert!(!out.contains("switch"), "{out}");
        let first = out.find("first(x);").expect("binding clause");
        let second = out.find("second();").expect("literal clause");
        let third = out.find("third();").expect("else clause");
        assert!(first < second && second < third, "{out}");
        assert!(out.contains("if (__w0 === 1) {"), "{out}");
    }

    #[test]
    fn failed_guard_falls_through_to_later_clauses() {
        let out = js("const s = when (v) { 1 if ok => \"guarded\", 1 => \"plain\", else => \"other\" }");
        assert!(!out.contains("switch"), "{out}");
        assert!(!out.contains("break;"), "{out}");
        let guarded = out.find("if (__w0 === 1) {\n").expect("guarded clause");
        let guard = out.find("if (ok) {").expect("guard");
        let plain = out.find("return \"plain\";").expect("plain clause");
        let other = out.find("return \"other\";").expect("else clause");
        assert!(guarded < guard && guard < plain && plain < other, "{out}");
    }

    #[test]
    fn only_the_leading_literal_run_is_switched() {
        let out = js("when (v) {\n 1 => one()\n n if n > 5 => big()\n 2 => two()\n}");
        let switch = out.find("switch (__w0)").expect("switch");
        let one = out.find("one();").expect("one");
        let big = out.find("big();").expect("big");
        let two = out.find("two();").expect("two");
        assert!(switch < one && one < big && big < two, "{out}");
        assert!(!out.contains("case 2:"), "{out}");
    }

    #[test]
    fn subject_less_when_is_an_if_chain() {
        let out = js("when {\n x > 5 => big()\n x > 0 => small()\n else => none()\n}");
        assert!(out.contains("if (x > 5) {"), "{out}");
        assert!(out.contains("} else if (x > 0) {"), "{out}");
        assert!(out.contains("} else {"), "{out}");
        assert!(!out.contains("switch"), "{out}");
    }

    #[test]
    fn when_expressions_are_iifes() {
        let out = js("const s = when (n) { 1 => \"one\", else => \"many\" }");
        assert!(out.contains("const s = (() => {"), "{out}");
        assert!(out.contains("return \"one\";"), "{out}");
        assert!(out.contains("return \"many\";"), "{out}");
        assert!(out.contains("})();"), "{out}");
    }

    #[test]
    fn break_inside_a_switch_targets_the_loop() {
        let out = js("while true {\n when (x) { 1 => { break } else => {} }\n}");
        assert!(out.contains("__loop0: while (true) {"), "{out}");
        assert!(out.contains("break __loop0;"), "{out}");
    }

    #[test]
    fn defer_drains_in_reverse_with_isolation() {
        let out = js("fn work() {\n defer println(\"one\")\n defer { println(\"two\") }\n println(\"body\")\n}");
        assert!(out.contains("const __defers = [];"), "{out}");
        assert!(out.contains("__defers.push(() => console.log(\"one\"));"), "{out}");
        assert!(out.contains("for (let __i = __defers.length - 1; __i >= 0; __i--) {"), "{out}");
        assert!(out.contains("console.error(\"deferred action failed:\", __err);"), "{out}");
        let body = out.find("console.log(\"body\")").expect("body");
        let finally = out.find("finally").expect("finally");
        assert!(body < finally, "{out}");
    }

    #[test]
    fn using_disposes_in_finally() {
        let out = js("using (f = open(\"x\")) { read(f) }");
        assert!(out.contains("const f = open(\"x\");"), "{out}");
        assert!(out.contains("} finally {"), "{out}");
        assert!(out.contains("f.dispose();"), "{out}");
        assert!(out.contains("f.close();"), "{out}");
    }

    #[test]
    fn channel_operations_make_functions_async() {
        let out = js("fn pump(ch: chan Int) {\n ch <- 1\n const v = <-ch\n go worker(ch)\n}\nconst c = chan Int(2)");
        assert!(out.contains("async function pump(ch) {"), "{out}");
        assert!(out.contains("await ch.send(1);"), "{out}");
        assert!(out.contains("const v = await ch.receive();"), "{out}");
        assert!(out.contains("__ljos.go(() => worker(ch));"), "{out}");
        assert!(out.contains("new __ljos.Channel(2)"), "{out}");
    }

    #[test]
    fn generators_are_detected() {
        let out = js("fn count() { yield 1\n yield }");
        assert!(out.contains("function* count() {"), "{out}");
        assert!(out.contains("yield 1;"), "{out}");
        assert!(out.contains("yield;"), "{out}");
    }

    #[test]
    fn type_tests_and_casts() {
        let out = js("const a = x is Int\nconst b = x is Str[]\nconst c = y of Int\nconst d = y of Str\nconst e = p of Point");
        assert!(out.contains("Number.isInteger(x)"), "{out}");
        assert!(out.contains("Array.isArray(x)"), "{out}");
        assert!(out.contains("Math.trunc(y)"), "{out}");
        assert!(out.contains("String(y)"), "{out}");
        assert!(out.contains("instanceof Point"), "{out}");
    }

    #[test]
    fn std_and_relative_imports_are_rewritten() {
        let out = js("import { trim } from \"std:str\"\nimport util from \"./util.lj\"\nimport * as m from \"./math\"");
        assert!(out.contains("import { trim } from \"ljos/runtime/std/str.js\";"), "{out}");
        assert!(out.contains("import util from \"./util.js\";"), "{out}");
        assert!(out.contains("import * as m from \"./math.js\";"), "{out}");
    }

    #[test]
    fn commonjs_modules_use_require_and_module_exports() {
        let options = CompilerOptions {
            module: ModuleKind::CommonJs,
            ..CompilerOptions::default()
        };
        let out = js_with(
            "import { a as b } from \"./lib\"\nexport fn f() {}\nexport default f",
            &options,
        );
        assert!(out.contains("= require(\"./lib.js\");"), "{out}");
        assert!(out.contains("const { a: b } = __mod0;"), "{out}");
        assert!(out.contains("module.exports.f = f;"), "{out}");
        assert!(out.contains("module.exports.default = f;"), "{out}");
    }

    #[test]
    fn imported_print_is_not_rewritten() {
        let out = js("import { println } from \"std:io\"\nprintln(\"x\")");
        assert!(out.contains("println(\"x\");"), "{out}");
        assert!(!out.contains("console.log"), "{out}");
    }

    #[test]
    fn templates_escape_backticks_and_placeholders() {
        let out = js("const s = @\"a`b $${c} ${d}\"");
        assert!(out.contains("`a\\`b \\${c} ${d}`"), "{out}");
    }

    #[test]
    fn arrows_and_object_bodies() {
        let out = js("const f = (a, b) => a + b\nconst g = () => { }\nconst h = (x) => {}");
        assert!(out.contains("const f = (a, b) => a + b;"), "{out}");
        assert!(out.contains("const g = () => {"), "{out}");
    }
}
