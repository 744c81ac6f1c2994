//! Recursive-descent parser for Ljos.
//!
//! Statements and declarations live here; the expression ladder is in
//! `parser/expression.rs` and template splitting in
//! `parser/interpolation.rs`.
//!
//! A syntax error inside a statement is recorded, the parser skips to the
//! next statement boundary and carries on, so one run reports every
//! independent error in the file.

mod expression;
mod interpolation;

use crate::ast::{
    CatchClause, ClassDecl, ClassMember, EnumDecl, EnumMember, Expr, ExprKind, ExportDecl,
    FunctionDecl, Ident, ImportDecl, ImportName, MemberKind, NodeId, Param, Program, Stmt,
    StmtKind, TypeExpr, VarDecl, Visibility,
};
use crate::error::{CoreError, ParseError};
use crate::lexer::{Token, TokenKind, tokenize};
use crate::span::Span;

pub(crate) type PResult<T> = Result<T, ParseError>;

/// Parse a token stream into a program, collecting every syntax error.
pub fn parse(tokens: Vec<Token>) -> Result<Program, Vec<ParseError>> {
    let mut parser = Parser::new(tokens);
    let program = parser.parse_program();
    if parser.errors.is_empty() {
        Ok(program)
    } else {
        Err(parser.errors)
    }
}

/// Lex and parse in one go.
pub fn parse_source(source: &str) -> Result<Program, CoreError> {
    let tokens = tokenize(source)?;
    parse(tokens).map_err(CoreError::Parse)
}

/// Parse a standalone type annotation such as `fn(Str, Int): Str`.
pub fn parse_type_source(source: &str) -> Result<TypeExpr, CoreError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let ty = parser.parse_type().map_err(|e| CoreError::Parse(vec![e]))?;
    if !parser.check(TokenKind::Eof) {
        let error = parser.error_here("unexpected token after type");
        return Err(CoreError::Parse(vec![error]));
    }
    Ok(ty)
}

/// Which separators the expression ladder may treat as operators.
///
/// In full context `,` is logical AND and `;` is logical OR. Argument
/// lists, collection literals, `for` headers and `when` clause lists turn
/// one or both back into plain separators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Restrictions {
    pub no_comma: bool,
    pub no_semi: bool,
    /// Subject-less `when` heads end in `=>`, so `(a) =>` is not a lambda there.
    pub no_arrow: bool,
}

impl Restrictions {
    pub const FULL: Restrictions = Restrictions {
        no_comma: false,
        no_semi: false,
        no_arrow: false,
    };
    pub const LIST: Restrictions = Restrictions {
        no_comma: true,
        no_semi: false,
        no_arrow: false,
    };
    pub const CLAUSE: Restrictions = Restrictions {
        no_comma: true,
        no_semi: true,
        no_arrow: false,
    };
    pub const CLAUSE_HEAD: Restrictions = Restrictions {
        no_comma: true,
        no_semi: true,
        no_arrow: true,
    };
}

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    next_id: u32,
    block_depth: usize,
    errors: Vec<ParseError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser::with_first_id(tokens, 0)
    }

    /// A parser whose node ids start at `first_id`, so nested parses never
    /// collide with their parent.
    pub fn with_first_id(mut tokens: Vec<Token>, first_id: u32) -> Self {
        if !tokens.last().is_some_and(|t| t.is(TokenKind::Eof)) {
            let span = tokens.last().map(|t| t.span).unwrap_or_default();
            tokens.push(Token {
                kind: TokenKind::Eof,
                text: String::new(),
                span,
            });
        }
        Parser {
            tokens,
            position: 0,
            next_id: first_id,
            block_depth: 0,
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn parse_program(&mut self) -> Program {
        let mut body = Vec::new();
        while !self.check(TokenKind::Eof) {
            match self.statement() {
                Ok(stmt) => body.push(stmt),
                Err(error) => {
                    self.errors.push(error);
                    self.synchronize();
                }
            }
        }
        Program { body }
    }

    /// Skip to a statement boundary after an error.
    fn synchronize(&mut self) {
        if self.check(TokenKind::Eof) {
            return;
        }
        if self.check(TokenKind::RBrace) && self.block_depth > 0 {
            return;
        }
        self.advance();
        while !self.check(TokenKind::Eof) {
            let kind = self.peek_kind();
            if kind == TokenKind::Semi {
                self.advance();
                return;
            }
            if kind.starts_statement() || (kind == TokenKind::RBrace && self.block_depth > 0) {
                return;
            }
            self.advance();
        }
    }

    // -----------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------

    fn statement(&mut self) -> PResult<Stmt> {
        let start = self.peek().span;
        let kind = match self.peek_kind() {
            TokenKind::Semi => {
                self.advance();
                StmtKind::Empty
            }
            TokenKind::Const | TokenKind::Mut => {
                let decl = self.var_decl(Restrictions::FULL)?;
                self.eat(TokenKind::Semi);
                StmtKind::Var(decl)
            }
            TokenKind::Fn if self.peek_nth(1).is(TokenKind::Ident) => {
                StmtKind::Function(self.function_decl()?)
            }
            TokenKind::Class | TokenKind::Abstract => StmtKind::Class(self.class_decl()?),
            TokenKind::Enum => StmtKind::Enum(self.enum_decl()?),
            TokenKind::If => return self.if_statement(),
            TokenKind::While => {
                self.advance();
                let cond = self.expression(Restrictions::FULL)?;
                let body = self.block()?;
                StmtKind::While { cond, body }
            }
            TokenKind::For => self.for_statement()?,
            TokenKind::When => StmtKind::When(self.when(true)?),
            TokenKind::Return => {
                let keyword = self.advance();
                let value = if self.starts_expression_on_line(keyword.span.line) {
                    Some(self.expression(Restrictions::FULL)?)
                } else {
                    None
                };
                self.eat(TokenKind::Semi);
                StmtKind::Return(value)
            }
            TokenKind::Break => {
                self.advance();
                self.eat(TokenKind::Semi);
                StmtKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                self.eat(TokenKind::Semi);
                StmtKind::Continue
            }
            TokenKind::Throw => {
                self.advance();
                let value = self.expression(Restrictions::FULL)?;
                self.eat(TokenKind::Semi);
                StmtKind::Throw(value)
            }
            TokenKind::Try => self.try_statement()?,
            TokenKind::Import => StmtKind::Import(self.import_decl()?),
            TokenKind::Export => StmtKind::Export(self.export_decl()?),
            TokenKind::Defer => {
                self.advance();
                let inner = if self.check(TokenKind::LBrace) {
                    let block_start = self.peek().span;
                    let body = self.block()?;
                    Stmt {
                        kind: StmtKind::Block(body),
                        span: block_start.to(self.previous_span()),
                    }
                } else {
                    let expr = self.expression(Restrictions::FULL)?;
                    let span = expr.span;
                    Stmt {
                        kind: StmtKind::Expression(expr),
                        span,
                    }
                };
                self.eat(TokenKind::Semi);
                StmtKind::Defer(Box::new(inner))
            }
            TokenKind::Using => {
                self.advance();
                self.expect(TokenKind::LParen, "'(' after 'using'")?;
                let binding = self.ident("resource name")?;
                self.expect(TokenKind::Equal, "'=' in 'using' binding")?;
                let init = self.expression(Restrictions::FULL)?;
                self.expect(TokenKind::RParen, "')' after 'using' binding")?;
                let body = self.block()?;
                StmtKind::Using {
                    binding,
                    init,
                    body,
                }
            }
            TokenKind::LBrace => StmtKind::Block(self.block()?),
            TokenKind::Eof => return Err(self.error_here("unexpected end of input")),
            _ => {
                let expr = self.expression(Restrictions::FULL)?;
                self.eat(TokenKind::Semi);
                StmtKind::Expression(expr)
            }
        };
        Ok(Stmt {
            kind,
            span: start.to(self.previous_span()),
        })
    }

    fn var_decl(&mut self, restrictions: Restrictions) -> PResult<VarDecl> {
        let keyword = self.advance();
        let mutable = keyword.is(TokenKind::Mut);
        let name = self.ident("variable name")?;
        let ty = if self.eat(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let init = if self.eat(TokenKind::Equal) {
            Some(self.expression(restrictions)?)
        } else if mutable {
            None
        } else {
            return Err(self.error_here(format!("constant '{}' needs an initializer", name.name)));
        };
        Ok(VarDecl {
            mutable,
            name,
            ty,
            init,
        })
    }

    fn function_decl(&mut self) -> PResult<FunctionDecl> {
        self.expect(TokenKind::Fn, "'fn'")?;
        let name = self.ident("function name")?;
        let params = self.params()?;
        let ret = self.return_type()?;
        let body = self.block()?;
        Ok(FunctionDecl {
            name,
            params,
            ret,
            body,
        })
    }

    pub(crate) fn params(&mut self) -> PResult<Vec<Param>> {
        self.expect(TokenKind::LParen, "'(' before parameters")?;
        let mut params = Vec::new();
        while !self.check(TokenKind::RParen) {
            let rest = self.eat(TokenKind::Ellipsis);
            let name = self.ident("parameter name")?;
            let ty = if self.eat(TokenKind::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };
            let default = if self.eat(TokenKind::Equal) {
                Some(self.expression(Restrictions::LIST)?)
            } else {
                None
            };
            params.push(Param {
                name,
                ty,
                default,
                rest,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')' after parameters")?;
        Ok(params)
    }

    pub(crate) fn return_type(&mut self) -> PResult<Option<TypeExpr>> {
        if self.eat(TokenKind::Colon) {
            Ok(Some(self.parse_type()?))
        } else {
            Ok(None)
        }
    }

    fn class_decl(&mut self) -> PResult<ClassDecl> {
        let is_abstract = self.eat(TokenKind::Abstract);
        self.expect(TokenKind::Class, "'class'")?;
        let name = self.ident("class name")?;
        let superclass = if self.eat(TokenKind::Extends) {
            Some(self.ident("superclass name")?)
        } else {
            None
        };
        self.expect(TokenKind::LBrace, "'{' to open class body")?;
        self.block_depth += 1;
        let mut members = Vec::new();
        loop {
            while self.eat(TokenKind::Semi) || self.eat(TokenKind::Comma) {}
            if self.check(TokenKind::RBrace) || self.check(TokenKind::Eof) {
                break;
            }
            match self.class_member() {
                Ok(member) => members.push(member),
                Err(error) => {
                    self.errors.push(error);
                    self.synchronize();
                }
            }
        }
        self.block_depth -= 1;
        self.expect(TokenKind::RBrace, "'}' to close class body")?;
        Ok(ClassDecl {
            name,
            is_abstract,
            superclass,
            members,
        })
    }

    fn class_member(&mut self) -> PResult<ClassMember> {
        let start = self.peek().span;
        let visibility = match self.peek_kind() {
            TokenKind::Private => {
                self.advance();
                Visibility::Private
            }
            TokenKind::Protected => {
                self.advance();
                Visibility::Protected
            }
            TokenKind::Public => {
                self.advance();
                Visibility::Public
            }
            _ => Visibility::Public,
        };
        let is_static = self.eat(TokenKind::Static);
        let is_abstract = self.eat(TokenKind::Abstract);

        let kind = if self.peek().is_word("constructor") {
            self.advance();
            let params = self.params()?;
            let body = self.block()?;
            MemberKind::Constructor { params, body }
        } else if self.check(TokenKind::Fn) {
            self.advance();
            let name = self.member_name()?;
            let params = self.params()?;
            let ret = self.return_type()?;
            let body = if is_abstract {
                None
            } else {
                Some(self.block()?)
            };
            MemberKind::Method {
                name,
                params,
                ret,
                body,
            }
        } else if self.check(TokenKind::Const) || self.check(TokenKind::Mut) {
            let decl = self.var_decl(Restrictions::LIST)?;
            MemberKind::Field {
                mutable: decl.mutable,
                name: decl.name,
                ty: decl.ty,
                init: decl.init,
            }
        } else {
            return Err(self.error_here("expected a field, method or constructor"));
        };

        Ok(ClassMember {
            visibility,
            is_static,
            kind,
            span: start.to(self.previous_span()),
        })
    }

    fn enum_decl(&mut self) -> PResult<EnumDecl> {
        self.expect(TokenKind::Enum, "'enum'")?;
        let name = self.ident("enum name")?;
        self.expect(TokenKind::LBrace, "'{' to open enum body")?;
        let mut members = Vec::new();
        loop {
            while self.eat(TokenKind::Comma) || self.eat(TokenKind::Semi) {}
            if self.check(TokenKind::RBrace) {
                break;
            }
            let member_name = self.ident("enum member")?;
            let fields = if self.check(TokenKind::LParen) {
                Some(self.params()?)
            } else {
                None
            };
            let value = if fields.is_none() && self.eat(TokenKind::Equal) {
                Some(self.expression(Restrictions::CLAUSE)?)
            } else {
                None
            };
            members.push(EnumMember {
                name: member_name,
                value,
                fields,
            });
        }
        self.expect(TokenKind::RBrace, "'}' to close enum body")?;
        Ok(EnumDecl { name, members })
    }

    fn if_statement(&mut self) -> PResult<Stmt> {
        let start = self.expect(TokenKind::If, "'if'")?.span;
        let cond = self.expression(Restrictions::FULL)?;
        let then_branch = self.block()?;
        let else_branch = if self.eat(TokenKind::Else) {
            if self.check(TokenKind::If) {
                Some(Box::new(self.if_statement()?))
            } else {
                let block_start = self.peek().span;
                let body = self.block()?;
                Some(Box::new(Stmt {
                    kind: StmtKind::Block(body),
                    span: block_start.to(self.previous_span()),
                }))
            }
        } else {
            None
        };
        Ok(Stmt {
            kind: StmtKind::If {
                cond,
                then_branch,
                else_branch,
            },
            span: start.to(self.previous_span()),
        })
    }

    fn for_statement(&mut self) -> PResult<StmtKind> {
        self.expect(TokenKind::For, "'for'")?;

        let parenthesized_in = self.check(TokenKind::LParen)
            && self.peek_nth(1).is(TokenKind::Ident)
            && self.peek_nth(2).is(TokenKind::In);
        if self.check(TokenKind::LParen) && !parenthesized_in {
            return self.for_header_loop();
        }

        let parens = self.eat(TokenKind::LParen);
        let binding = self.ident("loop variable")?;
        self.expect(TokenKind::In, "'in' after loop variable")?;
        let iterable = self.expression(Restrictions::FULL)?;
        if parens {
            self.expect(TokenKind::RParen, "')' after loop header")?;
        }
        let body = self.block()?;
        Ok(StmtKind::ForIn {
            binding,
            iterable,
            body,
        })
    }

    /// `for (init; cond; update)`: both `;` are clause separators here.
    fn for_header_loop(&mut self) -> PResult<StmtKind> {
        self.expect(TokenKind::LParen, "'(' after 'for'")?;
        let header = Restrictions::CLAUSE;

        let init = if self.check(TokenKind::Semi) {
            None
        } else if self.check(TokenKind::Const) || self.check(TokenKind::Mut) {
            let start = self.peek().span;
            let decl = self.var_decl(header)?;
            Some(Box::new(Stmt {
                kind: StmtKind::Var(decl),
                span: start.to(self.previous_span()),
            }))
        } else {
            let expr = self.expression(header)?;
            let span = expr.span;
            Some(Box::new(Stmt {
                kind: StmtKind::Expression(expr),
                span,
            }))
        };
        self.expect(TokenKind::Semi, "';' after loop initializer")?;

        let cond = if self.check(TokenKind::Semi) {
            None
        } else {
            Some(self.expression(header)?)
        };
        self.expect(TokenKind::Semi, "';' after loop condition")?;

        let update = if self.check(TokenKind::RParen) {
            None
        } else {
            Some(self.expression(header)?)
        };
        self.expect(TokenKind::RParen, "')' after loop header")?;

        let body = self.block()?;
        Ok(StmtKind::For {
            init,
            cond,
            update,
            body,
        })
    }

    fn try_statement(&mut self) -> PResult<StmtKind> {
        self.expect(TokenKind::Try, "'try'")?;
        let body = self.block()?;
        let catch = if self.eat(TokenKind::Catch) {
            let param = if self.eat(TokenKind::LParen) {
                let name = self.ident("catch binding")?;
                self.expect(TokenKind::RParen, "')' after catch binding")?;
                Some(name)
            } else {
                None
            };
            let body = self.block()?;
            Some(CatchClause { param, body })
        } else {
            None
        };
        let finally = if self.eat(TokenKind::Finally) {
            Some(self.block()?)
        } else {
            None
        };
        if catch.is_none() && finally.is_none() {
            return Err(self.error_here("'try' needs a 'catch' or 'finally' block"));
        }
        Ok(StmtKind::Try {
            body,
            catch,
            finally,
        })
    }

    fn import_decl(&mut self) -> PResult<ImportDecl> {
        self.expect(TokenKind::Import, "'import'")?;
        let mut decl = ImportDecl {
            default: None,
            namespace: None,
            named: Vec::new(),
            source: String::new(),
            source_span: Span::default(),
        };

        if self.check(TokenKind::Str) {
            let source = self.advance();
            decl.source = source.text;
            decl.source_span = source.span;
            self.eat(TokenKind::Semi);
            return Ok(decl);
        }

        if self.check(TokenKind::Ident) {
            decl.default = Some(self.ident("default import name")?);
            if !self.eat(TokenKind::Comma) {
                return self.finish_import(decl);
            }
        }

        if self.eat(TokenKind::Star) {
            self.expect_word("as")?;
            decl.namespace = Some(self.ident("namespace name")?);
        } else {
            decl.named = self.name_list()?;
        }
        self.finish_import(decl)
    }

    fn finish_import(&mut self, mut decl: ImportDecl) -> PResult<ImportDecl> {
        self.expect_word("from")?;
        let source = self.expect(TokenKind::Str, "module path string")?;
        decl.source = source.text;
        decl.source_span = source.span;
        self.eat(TokenKind::Semi);
        Ok(decl)
    }

    /// `{ a, b as c }`
    fn name_list(&mut self) -> PResult<Vec<ImportName>> {
        self.expect(TokenKind::LBrace, "'{' to open name list")?;
        let mut names = Vec::new();
        while !self.check(TokenKind::RBrace) {
            let name = self.member_name()?;
            let alias = if self.peek().is_word("as") {
                self.advance();
                Some(self.ident("alias")?)
            } else {
                None
            };
            names.push(ImportName { name, alias });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "'}' to close name list")?;
        Ok(names)
    }

    fn export_decl(&mut self) -> PResult<ExportDecl> {
        self.expect(TokenKind::Export, "'export'")?;
        if self.eat(TokenKind::Default) {
            let value = self.expression(Restrictions::FULL)?;
            self.eat(TokenKind::Semi);
            return Ok(ExportDecl::Default(value));
        }
        if self.check(TokenKind::LBrace) {
            let names = self.name_list()?;
            self.eat(TokenKind::Semi);
            return Ok(ExportDecl::Named(names));
        }
        match self.peek_kind() {
            TokenKind::Fn
            | TokenKind::Const
            | TokenKind::Mut
            | TokenKind::Class
            | TokenKind::Abstract
            | TokenKind::Enum => Ok(ExportDecl::Decl(Box::new(self.statement()?))),
            _ => Err(self.error_here("expected a declaration after 'export'")),
        }
    }

    pub(crate) fn block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(TokenKind::LBrace, "'{'")?;
        self.block_depth += 1;
        let mut body = Vec::new();
        while !self.check(TokenKind::RBrace) {
            if self.check(TokenKind::Eof) {
                self.block_depth -= 1;
                return Err(self.error_here("expected '}' before end of input"));
            }
            match self.statement() {
                Ok(stmt) => body.push(stmt),
                Err(error) => {
                    self.errors.push(error);
                    self.synchronize();
                }
            }
        }
        self.block_depth -= 1;
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(body)
    }

    // -----------------------------------------------------------------
    // Types
    // -----------------------------------------------------------------

    pub(crate) fn parse_type(&mut self) -> PResult<TypeExpr> {
        let mut ty = match self.peek_kind() {
            TokenKind::Fn => {
                self.advance();
                self.expect(TokenKind::LParen, "'(' in function type")?;
                let mut params = Vec::new();
                while !self.check(TokenKind::RParen) {
                    params.push(self.parse_type()?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RParen, "')' in function type")?;
                let ret = match self.return_type()? {
                    Some(ret) => ret,
                    None => TypeExpr::Named(Ident {
                        name: "Void".to_string(),
                        span: self.previous_span(),
                    }),
                };
                TypeExpr::Function {
                    params,
                    ret: Box::new(ret),
                }
            }
            TokenKind::Chan => {
                self.advance();
                TypeExpr::Chan(Box::new(self.parse_type()?))
            }
            TokenKind::Ident => TypeExpr::Named(self.ident("type name")?),
            _ => return Err(self.error_here("expected a type")),
        };
        while self.check(TokenKind::LBracket) && self.peek_nth(1).is(TokenKind::RBracket) {
            self.advance();
            self.advance();
            ty = TypeExpr::Array(Box::new(ty));
        }
        Ok(ty)
    }

    // -----------------------------------------------------------------
    // Token helpers
    // -----------------------------------------------------------------

    pub(crate) fn make_expr(&mut self, kind: ExprKind, span: Span) -> Expr {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        Expr { id, kind, span }
    }

    pub(crate) fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.position.min(last)]
    }

    pub(crate) fn peek_nth(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.position + n).min(last)]
    }

    pub(crate) fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.peek().is(kind)
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !token.is(TokenKind::Eof) {
            self.position += 1;
        }
        token
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: TokenKind, what: &str) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!("expected {what}")))
        }
    }

    fn expect_word(&mut self, word: &str) -> PResult<Token> {
        if self.peek().is_word(word) {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!("expected '{word}'")))
        }
    }

    pub(crate) fn ident(&mut self, what: &str) -> PResult<Ident> {
        let token = self.expect(TokenKind::Ident, what)?;
        Ok(Ident {
            name: token.text,
            span: token.span,
        })
    }

    /// Property and export names may be keywords (`Shape.match`, `x.default`).
    pub(crate) fn member_name(&mut self) -> PResult<Ident> {
        let token = self.peek().clone();
        let usable = token.is(TokenKind::Ident)
            || (!token.text.is_empty()
                && token.text.chars().all(|c| c.is_ascii_alphabetic())
                && !matches!(
                    token.kind,
                    TokenKind::Str | TokenKind::Template | TokenKind::InterpStr
                ));
        if usable {
            self.advance();
            Ok(Ident {
                name: token.text,
                span: token.span,
            })
        } else {
            Err(self.error_here("expected a name"))
        }
    }

    pub(crate) fn previous_span(&self) -> Span {
        if self.position == 0 {
            return self.peek().span;
        }
        self.tokens[self.position - 1].span
    }

    pub(crate) fn error_here(&self, message: impl Into<String>) -> ParseError {
        let token = self.peek().clone();
        let found = if token.is(TokenKind::Eof) {
            "end of input".to_string()
        } else {
            format!("'{}'", token.text)
        };
        ParseError::new(format!("{}, found {found}", message.into()), token)
    }

    fn starts_expression_on_line(&self, line: u32) -> bool {
        let token = self.peek();
        token.span.line == line && can_start_expression(token.kind)
    }
}

pub(crate) fn can_start_expression(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Ident
            | TokenKind::Int
            | TokenKind::Float
            | TokenKind::Str
            | TokenKind::Template
            | TokenKind::InterpStr
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Nul
            | TokenKind::This
            | TokenKind::Super
            | TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::LBrace
            | TokenKind::Bang
            | TokenKind::Minus
            | TokenKind::Typeof
            | TokenKind::Void
            | TokenKind::Delete
            | TokenKind::Yield
            | TokenKind::Await
            | TokenKind::New
            | TokenKind::Fn
            | TokenKind::Chan
            | TokenKind::Go
            | TokenKind::LeftArrow
            | TokenKind::If
            | TokenKind::When
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Pattern, WhenBody};

    fn program(source: &str) -> Program {
        parse_source(source).expect("parse")
    }

    fn parse_errors(source: &str) -> Vec<ParseError> {
        match parse_source(source).unwrap_err() {
            CoreError::Parse(errors) => errors,
            other => panic!("expected parse errors, got {other:?}"),
        }
    }

    #[test]
    fn parses_declarations() {
        let prog = program(
            "const x: Int = 1\nmut y\nfn add(a: Int, b: Int): Int { return a + b }",
        );
        assert_eq!(prog.body.len(), 3);
        assert!(matches!(&prog.body[0].kind, StmtKind::Var(d) if !d.mutable && d.ty.is_some()));
        assert!(matches!(&prog.body[1].kind, StmtKind::Var(d) if d.mutable && d.init.is_none()));
        assert!(matches!(&prog.body[2].kind, StmtKind::Function(f) if f.params.len() == 2));
    }

    #[test]
    fn classic_for_header_keeps_semicolons_as_separators() {
        let prog = program("for (mut i = 0; i < 10; i += 1) { print(i) }");
        let StmtKind::For {
            init, cond, update, ..
        } = &prog.body[0].kind
        else {
            panic!("expected for loop");
        };
        assert!(init.is_some());
        assert!(matches!(
            cond.as_ref().map(|c| &c.kind),
            Some(ExprKind::Binary { op: BinaryOp::Lt, .. })
        ));
        assert!(matches!(
            update.as_ref().map(|u| &u.kind),
            Some(ExprKind::Assign { .. })
        ));
    }

    #[test]
    fn for_in_with_and_without_parens() {
        for src in ["for x in xs { print(x) }", "for (x in 0..3) { print(x) }"] {
            let prog = program(src);
            assert!(matches!(&prog.body[0].kind, StmtKind::ForIn { .. }), "{src}");
        }
    }

    #[test]
    fn parses_abstract_class_with_members() {
        let prog = program(
            "abstract class Shape extends Base {\n  private mut id: Int = 0\n  static const count = 1\n  constructor(id) { this.id = id }\n  abstract fn area(): Float\n  fn describe(): Str { return \"shape\" }\n}",
        );
        let StmtKind::Class(class) = &prog.body[0].kind else {
            panic!("expected class");
        };
        assert!(class.is_abstract);
        assert_eq!(class.superclass.as_ref().map(|s| s.name.as_str()), Some("Base"));
        assert_eq!(class.members.len(), 5);
        assert_eq!(class.private_names(), vec!["id"]);
        assert!(class.constructor().is_some());
        assert!(matches!(
            &class.members[3].kind,
            MemberKind::Method { body: None, .. }
        ));
    }

    #[test]
    fn parses_tagged_and_plain_enums() {
        let prog = program("enum Color { Red, Green = 5, Blue }\nenum Shape { Circle(r: Float), Empty }");
        let StmtKind::Enum(color) = &prog.body[0].kind else {
            panic!()
        };
        assert!(!color.is_tagged());
        assert!(color.members[1].value.is_some());
        let StmtKind::Enum(shape) = &prog.body[1].kind else {
            panic!()
        };
        assert!(shape.is_tagged());
    }

    #[test]
    fn parses_import_forms() {
        let prog = program(
            "import io from \"std:io\"\nimport { a, b as c } from \"./util\"\nimport * as m from \"./m\"\nimport \"./side\"",
        );
        let imports: Vec<&ImportDecl> = prog
            .body
            .iter()
            .filter_map(|s| match &s.kind {
                StmtKind::Import(i) => Some(i),
                _ => None,
            })
            .collect();
        assert_eq!(imports.len(), 4);
        assert_eq!(imports[0].default.as_ref().map(|d| d.name.as_str()), Some("io"));
        assert_eq!(imports[1].named[1].local().name, "c");
        assert!(imports[2].namespace.is_some());
        assert_eq!(imports[3].source, "./side");
    }

    #[test]
    fn parses_export_forms() {
        let prog = program("export fn f() {}\nexport default 42\nexport { f as g }");
        assert!(matches!(&prog.body[0].kind, StmtKind::Export(ExportDecl::Decl(_))));
        assert!(matches!(&prog.body[1].kind, StmtKind::Export(ExportDecl::Default(_))));
        assert!(matches!(&prog.body[2].kind, StmtKind::Export(ExportDecl::Named(n)) if n.len() == 1));
    }

    #[test]
    fn parses_defer_and_using() {
        let prog = program("fn f() {\n defer close(h)\n defer { log(1) }\n using (r = open()) { r.read() }\n}");
        let StmtKind::Function(f) = &prog.body[0].kind else {
            panic!()
        };
        assert!(matches!(&f.body[0].kind, StmtKind::Defer(inner) if matches!(inner.kind, StmtKind::Expression(_))));
        assert!(matches!(&f.body[1].kind, StmtKind::Defer(inner) if matches!(inner.kind, StmtKind::Block(_))));
        assert!(matches!(&f.body[2].kind, StmtKind::Using { binding, .. } if binding.name == "r"));
    }

    #[test]
    fn when_statement_allows_block_bodies() {
        let prog = program("when (v) {\n 1 | 2 => { print(1) }\n n if n > 5 => print(n)\n else => {}\n}");
        let StmtKind::When(when) = &prog.body[0].kind else {
            panic!()
        };
        assert_eq!(when.clauses.len(), 3);
        assert!(matches!(&when.clauses[0].pattern, Pattern::Or(alts) if alts.len() == 2));
        assert!(matches!(when.clauses[0].body, WhenBody::Block(_)));
        assert!(when.clauses[1].guard.is_some());
        assert!(matches!(when.clauses[2].pattern, Pattern::Else(_)));
    }

    #[test]
    fn return_value_must_share_the_line() {
        let prog = program("fn f() {\n return\n}\nfn g() { return 1 }");
        let StmtKind::Function(f) = &prog.body[0].kind else {
            panic!()
        };
        assert!(matches!(f.body[0].kind, StmtKind::Return(None)));
        let StmtKind::Function(g) = &prog.body[1].kind else {
            panic!()
        };
        assert!(matches!(g.body[0].kind, StmtKind::Return(Some(_))));
    }

    #[test]
    fn trailing_semicolon_terminates_statement() {
        let prog = program("x = 1;\ny = 2");
        assert_eq!(prog.body.len(), 2);
    }

    #[test]
    fn recovers_and_reports_every_syntax_error() {
        let errors = parse_errors("const = 1\nconst ok = 2\nfn f( {}\nconst y = )\n");
        assert_eq!(errors.len(), 3, "{errors:?}");
        assert_eq!(errors[0].token.span.line, 1);
        assert_eq!(errors[2].token.span.line, 4);
    }

    #[test]
    fn recovers_inside_function_bodies() {
        let errors = parse_errors("fn f() {\n const = 1\n return 2\n}\nfn g() { const = 3 }");
        assert_eq!(errors.len(), 2, "{errors:?}");
    }

    #[test]
    fn parses_types() {
        let prog = program("mut f: fn(Int, Str): Bool\nmut xs: Int[][]\nmut c: chan Int");
        let StmtKind::Var(f) = &prog.body[0].kind else {
            panic!()
        };
        assert!(matches!(f.ty, Some(TypeExpr::Function { ref params, .. }) if params.len() == 2));
        let StmtKind::Var(xs) = &prog.body[1].kind else {
            panic!()
        };
        assert!(matches!(xs.ty, Some(TypeExpr::Array(ref inner)) if matches!(**inner, TypeExpr::Array(_))));
        let StmtKind::Var(c) = &prog.body[2].kind else {
            panic!()
        };
        assert!(matches!(c.ty, Some(TypeExpr::Chan(_))));
    }

    #[test]
    fn node_ids_are_unique() {
        use crate::ast::{Visitor, walk_stmts};
        use std::collections::HashSet;

        struct Ids(HashSet<NodeId>, usize);
        impl Visitor for Ids {
            fn visit_expr(&mut self, expr: &Expr) -> bool {
                self.0.insert(expr.id);
                self.1 += 1;
                true
            }
        }
        let prog = program("const s = `a ${x + 1} b ${y}`\nconst t = f(1, 2) + g(3)");
        let mut ids = Ids(HashSet::new(), 0);
        walk_stmts(&mut ids, &prog.body);
        assert_eq!(ids.0.len(), ids.1);
    }
}
