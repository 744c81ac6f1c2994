//! Surface AST for Ljos.
//!
//! The tree is strictly owned: every node owns its children and nothing
//! is shared. Semantic information never lives here; the checker keys
//! its results by [`NodeId`] instead.

use crate::span::Span;

/// Parser-assigned identity of an expression, unique within one parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

// ---------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Var(VarDecl),
    Function(FunctionDecl),
    Class(ClassDecl),
    Enum(EnumDecl),
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        /// Either another `If` or a `Block`.
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    /// `for (init; cond; update) { ... }`
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        update: Option<Expr>,
        body: Vec<Stmt>,
    },
    /// `for x in iterable { ... }`
    ForIn {
        binding: Ident,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    When(When),
    Return(Option<Expr>),
    Break,
    Continue,
    Throw(Expr),
    Try {
        body: Vec<Stmt>,
        catch: Option<CatchClause>,
        finally: Option<Vec<Stmt>>,
    },
    Import(ImportDecl),
    Export(ExportDecl),
    /// `defer expr` or `defer { ... }`; the inner statement is an
    /// expression statement or a block.
    Defer(Box<Stmt>),
    Using {
        binding: Ident,
        init: Expr,
        body: Vec<Stmt>,
    },
    Expression(Expr),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub mutable: bool,
    pub name: Ident,
    pub ty: Option<TypeExpr>,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: Option<TypeExpr>,
    pub default: Option<Expr>,
    pub rest: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Ident,
    pub params: Vec<Param>,
    pub ret: Option<TypeExpr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: Ident,
    pub is_abstract: bool,
    pub superclass: Option<Ident>,
    pub members: Vec<ClassMember>,
}

impl ClassDecl {
    pub fn constructor(&self) -> Option<(&[Param], &[Stmt])> {
        self.members.iter().find_map(|m| match &m.kind {
            MemberKind::Constructor { params, body } => Some((params.as_slice(), body.as_slice())),
            _ => None,
        })
    }

    /// Names of private instance and static members.
    pub fn private_names(&self) -> Vec<&str> {
        self.members
            .iter()
            .filter(|m| m.visibility == Visibility::Private)
            .filter_map(|m| m.name())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMember {
    pub visibility: Visibility,
    pub is_static: bool,
    pub kind: MemberKind,
    pub span: Span,
}

impl ClassMember {
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            MemberKind::Field { name, .. } | MemberKind::Method { name, .. } => Some(&name.name),
            MemberKind::Constructor { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberKind {
    Field {
        mutable: bool,
        name: Ident,
        ty: Option<TypeExpr>,
        init: Option<Expr>,
    },
    Method {
        name: Ident,
        params: Vec<Param>,
        ret: Option<TypeExpr>,
        /// `None` for abstract methods.
        body: Option<Vec<Stmt>>,
    },
    Constructor {
        params: Vec<Param>,
        body: Vec<Stmt>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: Ident,
    pub members: Vec<EnumMember>,
}

impl EnumDecl {
    /// An enum is a tagged union as soon as one member carries data.
    pub fn is_tagged(&self) -> bool {
        self.members.iter().any(|m| m.fields.is_some())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: Ident,
    /// Explicit discriminant, `A = 3`.
    pub value: Option<Expr>,
    /// Payload fields, `Circle(radius: Float)`.
    pub fields: Option<Vec<Param>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub param: Option<Ident>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub default: Option<Ident>,
    pub namespace: Option<Ident>,
    pub named: Vec<ImportName>,
    pub source: String,
    pub source_span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportName {
    pub name: Ident,
    pub alias: Option<Ident>,
}

impl ImportName {
    /// Name bound in the importing file.
    pub fn local(&self) -> &Ident {
        self.alias.as_ref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportDecl {
    Decl(Box<Stmt>),
    Default(Expr),
    Named(Vec<ImportName>),
}

// ---------------------------------------------------------------------
// `when`
// ---------------------------------------------------------------------

/// Conditional dispatch, shared by both surface forms.
///
/// With a subject, clause heads are patterns. Without one, every clause
/// head is a condition wrapped in [`Pattern::Literal`].
#[derive(Debug, Clone, PartialEq)]
pub struct When {
    pub subject: Option<Box<Expr>>,
    pub clauses: Vec<WhenClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhenClause {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: WhenBody,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WhenBody {
    Expr(Expr),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Literal(Expr),
    /// Dotted constant such as `Color.Red`.
    Value(Expr),
    Binding(Ident),
    Wildcard(Span),
    TypeTest(TypeExpr),
    Or(Vec<Pattern>),
    Else(Span),
}

impl Pattern {
    /// Patterns a native `switch` can key on.
    pub fn is_switchable(&self) -> bool {
        match self {
            Pattern::Literal(_) | Pattern::Value(_) => true,
            Pattern::Or(alts) => alts.iter().all(Pattern::is_switchable),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Named(Ident),
    Array(Box<TypeExpr>),
    Function {
        params: Vec<TypeExpr>,
        ret: Box<TypeExpr>,
    },
    Chan(Box<TypeExpr>),
}

// ---------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Typeof,
    Void,
    Delete,
    Yield,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Rem => "%=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: String,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LambdaBody {
    Expr(Box<Expr>),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub params: Vec<Param>,
    pub ret: Option<TypeExpr>,
    pub body: LambdaBody,
    /// `fn (...) { }` rather than `(...) => ...`.
    pub is_fn: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Integer literal text with separators removed, base prefix kept.
    Int(String),
    Float(String),
    Str(String),
    Template(Vec<TemplatePart>),
    Bool(bool),
    Nul,
    Ident(String),
    This,
    Super,
    Array(Vec<Expr>),
    Object(Vec<Property>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    /// `if (c) a else b` in expression position.
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    When(When),
    /// `e is T`
    TypeTest {
        expr: Box<Expr>,
        ty: TypeExpr,
    },
    /// `e instanceof C`
    InstanceOf {
        expr: Box<Expr>,
        class: Box<Expr>,
    },
    /// `e of T`
    Cast {
        expr: Box<Expr>,
        ty: TypeExpr,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: Ident,
        optional: bool,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
    },
    /// `ch <- v`
    Send {
        channel: Box<Expr>,
        value: Box<Expr>,
    },
    /// `<-ch`
    Receive(Box<Expr>),
    New {
        class: Box<Expr>,
        args: Vec<Expr>,
    },
    Lambda(Lambda),
    /// `chan T(n)`
    MakeChan {
        elem: Option<TypeExpr>,
        capacity: Option<Box<Expr>>,
    },
    Go(Box<Expr>),
    Await(Box<Expr>),
}

/// Mathematical value of an integer literal's text.
pub fn int_literal_value(text: &str) -> Option<u128> {
    let (digits, radix) = match text.get(..2) {
        Some("0b") => (&text[2..], 2),
        Some("0o") => (&text[2..], 8),
        Some("0x") => (&text[2..], 16),
        _ => (text, 10),
    };
    u128::from_str_radix(digits, radix).ok()
}

// ---------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------

/// Read-only traversal hooks. Returning `false` skips a node's children.
pub trait Visitor {
    fn visit_stmt(&mut self, _stmt: &Stmt) -> bool {
        true
    }

    fn visit_expr(&mut self, _expr: &Expr) -> bool {
        true
    }
}

pub fn walk_stmts<V: Visitor>(visitor: &mut V, stmts: &[Stmt]) {
    for stmt in stmts {
        walk_stmt(visitor, stmt);
    }
}

pub fn walk_stmt<V: Visitor>(visitor: &mut V, stmt: &Stmt) {
    if !visitor.visit_stmt(stmt) {
        return;
    }
    match &stmt.kind {
        StmtKind::Var(decl) => {
            if let Some(init) = &decl.init {
                walk_expr(visitor, init);
            }
        }
        StmtKind::Function(func) => walk_stmts(visitor, &func.body),
        StmtKind::Class(class) => {
            for member in &class.members {
                match &member.kind {
                    MemberKind::Field { init, .. } => {
                        if let Some(init) = init {
                            walk_expr(visitor, init);
                        }
                    }
                    MemberKind::Method { body, .. } => {
                        if let Some(body) = body {
                            walk_stmts(visitor, body);
                        }
                    }
                    MemberKind::Constructor { body, .. } => walk_stmts(visitor, body),
                }
            }
        }
        StmtKind::Enum(decl) => {
            for member in &decl.members {
                if let Some(value) = &member.value {
                    walk_expr(visitor, value);
                }
            }
        }
        StmtKind::Block(body) => walk_stmts(visitor, body),
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            walk_expr(visitor, cond);
            walk_stmts(visitor, then_branch);
            if let Some(other) = else_branch {
                walk_stmt(visitor, other);
            }
        }
        StmtKind::While { cond, body } => {
            walk_expr(visitor, cond);
            walk_stmts(visitor, body);
        }
        StmtKind::For {
            init,
            cond,
            update,
            body,
        } => {
            if let Some(init) = init {
                walk_stmt(visitor, init);
            }
            if let Some(cond) = cond {
                walk_expr(visitor, cond);
            }
            if let Some(update) = update {
                walk_expr(visitor, update);
            }
            walk_stmts(visitor, body);
        }
        StmtKind::ForIn { iterable, body, .. } => {
            walk_expr(visitor, iterable);
            walk_stmts(visitor, body);
        }
        StmtKind::When(when) => walk_when(visitor, when),
        StmtKind::Return(value) => {
            if let Some(value) = value {
                walk_expr(visitor, value);
            }
        }
        StmtKind::Throw(value) | StmtKind::Expression(value) => walk_expr(visitor, value),
        StmtKind::Try {
            body,
            catch,
            finally,
        } => {
            walk_stmts(visitor, body);
            if let Some(catch) = catch {
                walk_stmts(visitor, &catch.body);
            }
            if let Some(finally) = finally {
                walk_stmts(visitor, finally);
            }
        }
        StmtKind::Export(ExportDecl::Decl(inner)) | StmtKind::Defer(inner) => {
            walk_stmt(visitor, inner)
        }
        StmtKind::Export(ExportDecl::Default(value)) => walk_expr(visitor, value),
        StmtKind::Using { init, body, .. } => {
            walk_expr(visitor, init);
            walk_stmts(visitor, body);
        }
        StmtKind::Export(ExportDecl::Named(_))
        | StmtKind::Import(_)
        | StmtKind::Break
        | StmtKind::Continue
        | StmtKind::Empty => {}
    }
}

fn walk_when<V: Visitor>(visitor: &mut V, when: &When) {
    if let Some(subject) = &when.subject {
        walk_expr(visitor, subject);
    }
    for clause in &when.clauses {
        walk_pattern(visitor, &clause.pattern);
        if let Some(guard) = &clause.guard {
            walk_expr(visitor, guard);
        }
        match &clause.body {
            WhenBody::Expr(expr) => walk_expr(visitor, expr),
            WhenBody::Block(body) => walk_stmts(visitor, body),
        }
    }
}

fn walk_pattern<V: Visitor>(visitor: &mut V, pattern: &Pattern) {
    match pattern {
        Pattern::Literal(expr) | Pattern::Value(expr) => walk_expr(visitor, expr),
        Pattern::Or(alts) => {
            for alt in alts {
                walk_pattern(visitor, alt);
            }
        }
        Pattern::Binding(_) | Pattern::Wildcard(_) | Pattern::TypeTest(_) | Pattern::Else(_) => {}
    }
}

pub fn walk_expr<V: Visitor>(visitor: &mut V, expr: &Expr) {
    if !visitor.visit_expr(expr) {
        return;
    }
    match &expr.kind {
        ExprKind::Int(_)
        | ExprKind::Float(_)
        | ExprKind::Str(_)
        | ExprKind::Bool(_)
        | ExprKind::Nul
        | ExprKind::Ident(_)
        | ExprKind::This
        | ExprKind::Super => {}
        ExprKind::Template(parts) => {
            for part in parts {
                if let TemplatePart::Expr(inner) = part {
                    walk_expr(visitor, inner);
                }
            }
        }
        ExprKind::Array(items) => {
            for item in items {
                walk_expr(visitor, item);
            }
        }
        ExprKind::Object(props) => {
            for prop in props {
                walk_expr(visitor, &prop.value);
            }
        }
        ExprKind::Unary { operand, .. } => walk_expr(visitor, operand),
        ExprKind::Binary { left, right, .. } => {
            walk_expr(visitor, left);
            walk_expr(visitor, right);
        }
        ExprKind::Assign { target, value, .. } => {
            walk_expr(visitor, target);
            walk_expr(visitor, value);
        }
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            walk_expr(visitor, cond);
            walk_expr(visitor, then_branch);
            walk_expr(visitor, else_branch);
        }
        ExprKind::When(when) => walk_when(visitor, when),
        ExprKind::TypeTest { expr, .. } | ExprKind::Cast { expr, .. } => walk_expr(visitor, expr),
        ExprKind::InstanceOf { expr, class } => {
            walk_expr(visitor, expr);
            walk_expr(visitor, class);
        }
        ExprKind::Call { callee, args } => {
            walk_expr(visitor, callee);
            for arg in args {
                walk_expr(visitor, arg);
            }
        }
        ExprKind::New { class, args } => {
            walk_expr(visitor, class);
            for arg in args {
                walk_expr(visitor, arg);
            }
        }
        ExprKind::Member { object, .. } => walk_expr(visitor, object),
        ExprKind::Index { object, index } => {
            walk_expr(visitor, object);
            walk_expr(visitor, index);
        }
        ExprKind::Range { start, end } => {
            walk_expr(visitor, start);
            walk_expr(visitor, end);
        }
        ExprKind::Send { channel, value } => {
            walk_expr(visitor, channel);
            walk_expr(visitor, value);
        }
        ExprKind::Receive(inner) | ExprKind::Go(inner) | ExprKind::Await(inner) => {
            walk_expr(visitor, inner)
        }
        ExprKind::Lambda(lambda) => match &lambda.body {
            LambdaBody::Expr(body) => walk_expr(visitor, body),
            LambdaBody::Block(body) => walk_stmts(visitor, body),
        },
        ExprKind::MakeChan { capacity, .. } => {
            if let Some(capacity) = capacity {
                walk_expr(visitor, capacity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_literal_values_by_base() {
        assert_eq!(int_literal_value("1000000"), Some(1_000_000));
        assert_eq!(int_literal_value("0b10101100"), Some(172));
        assert_eq!(int_literal_value("0o777"), Some(511));
        assert_eq!(int_literal_value("0xDEADBEEF"), Some(3_735_928_559));
    }

    #[test]
    fn or_patterns_switch_only_on_constants() {
        let span = Span::default();
        let lit = |n: &str| {
            Pattern::Literal(Expr {
                id: NodeId(0),
                kind: ExprKind::Int(n.into()),
                span,
            })
        };
        assert!(Pattern::Or(vec![lit("1"), lit("2")]).is_switchable());
        let binding = Pattern::Binding(Ident {
            name: "x".into(),
            span,
        });
        assert!(!Pattern::Or(vec![lit("1"), binding]).is_switchable());
    }
}
