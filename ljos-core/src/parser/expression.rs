//! Expression ladder, lowest precedence first:
//!
//! assignment, conditional (`if`/`when`), or (`||`, `;`), and (`&&`, `,`),
//! equality, relational, additive, multiplicative, unary, type postfix
//! (`is`, `of`, `instanceof`), call/member chain (`.`, `?.`, `[]`, `..`,
//! `<-`), primary.

use super::{PResult, Parser, Restrictions, can_start_expression};
use crate::ast::{
    AssignOp, BinaryOp, Expr, ExprKind, Lambda, LambdaBody, Pattern, Property, UnaryOp, When,
    WhenBody, WhenClause,
};
use crate::lexer::TokenKind;

impl Parser {
    pub(crate) fn expression(&mut self, r: Restrictions) -> PResult<Expr> {
        self.assignment(r)
    }

    fn assignment(&mut self, r: Restrictions) -> PResult<Expr> {
        let target = self.conditional(r)?;
        let op = match self.peek_kind() {
            TokenKind::Equal => AssignOp::Assign,
            TokenKind::PlusEqual => AssignOp::Add,
            TokenKind::MinusEqual => AssignOp::Sub,
            TokenKind::StarEqual => AssignOp::Mul,
            TokenKind::SlashEqual => AssignOp::Div,
            TokenKind::PercentEqual => AssignOp::Rem,
            _ => return Ok(target),
        };
        if !matches!(
            target.kind,
            ExprKind::Ident(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
        ) {
            return Err(self.error_here("invalid assignment target"));
        }
        self.advance();
        let value = self.assignment(r)?;
        let span = target.span.to(value.span);
        Ok(self.make_expr(
            ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            span,
        ))
    }

    fn conditional(&mut self, r: Restrictions) -> PResult<Expr> {
        match self.peek_kind() {
            TokenKind::If => self.if_expression(r),
            TokenKind::When => {
                let start = self.peek().span;
                let when = self.when(false)?;
                let span = start.to(self.previous_span());
                Ok(self.make_expr(ExprKind::When(when), span))
            }
            _ => self.logical_or(r),
        }
    }

    /// `if (cond) a else b`
    fn if_expression(&mut self, r: Restrictions) -> PResult<Expr> {
        let start = self.expect(TokenKind::If, "'if'")?.span;
        self.expect(TokenKind::LParen, "'(' after 'if' in expression")?;
        let cond = self.expression(Restrictions::FULL)?;
        self.expect(TokenKind::RParen, "')' after condition")?;
        let then_branch = self.expression(r)?;
        self.expect(TokenKind::Else, "'else' in conditional expression")?;
        let else_branch = self.expression(r)?;
        let span = start.to(else_branch.span);
        Ok(self.make_expr(
            ExprKind::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            span,
        ))
    }

    fn logical_or(&mut self, r: Restrictions) -> PResult<Expr> {
        let mut left = self.logical_and(r)?;
        loop {
            let is_or = match self.peek_kind() {
                TokenKind::OrOr => true,
                TokenKind::Semi => !r.no_semi && self.semicolon_continues(),
                _ => false,
            };
            if !is_or {
                return Ok(left);
            }
            self.advance();
            let right = self.logical_and(r)?;
            left = self.binary(BinaryOp::Or, left, right);
        }
    }

    /// A `;` is an operator only when an operand follows on the same line.
    /// At a line end, or before a statement keyword, it terminates the
    /// statement.
    fn semicolon_continues(&self) -> bool {
        let semi = self.peek();
        let next = self.peek_nth(1);
        next.span.line == semi.span.line
            && can_start_expression(next.kind)
            && !next.kind.starts_statement()
    }

    fn logical_and(&mut self, r: Restrictions) -> PResult<Expr> {
        let mut left = self.equality(r)?;
        loop {
            let is_and = match self.peek_kind() {
                TokenKind::AndAnd => true,
                TokenKind::Comma => !r.no_comma,
                _ => false,
            };
            if !is_and {
                return Ok(left);
            }
            self.advance();
            let right = self.equality(r)?;
            left = self.binary(BinaryOp::And, left, right);
        }
    }

    fn equality(&mut self, r: Restrictions) -> PResult<Expr> {
        let mut left = self.relational(r)?;
        while let Some(op) = match self.peek_kind() {
            TokenKind::EqualEqual => Some(BinaryOp::Eq),
            TokenKind::BangEqual => Some(BinaryOp::Ne),
            _ => None,
        } {
            self.advance();
            let right = self.relational(r)?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn relational(&mut self, r: Restrictions) -> PResult<Expr> {
        let mut left = self.additive(r)?;
        while let Some(op) = match self.peek_kind() {
            TokenKind::Less => Some(BinaryOp::Lt),
            TokenKind::LessEqual => Some(BinaryOp::Le),
            TokenKind::Greater => Some(BinaryOp::Gt),
            TokenKind::GreaterEqual => Some(BinaryOp::Ge),
            _ => None,
        } {
            self.advance();
            let right = self.additive(r)?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn additive(&mut self, r: Restrictions) -> PResult<Expr> {
        let mut left = self.multiplicative(r)?;
        while let Some(op) = match self.peek_kind() {
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            _ => None,
        } {
            self.advance();
            let right = self.multiplicative(r)?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn multiplicative(&mut self, r: Restrictions) -> PResult<Expr> {
        let mut left = self.unary(r)?;
        while let Some(op) = match self.peek_kind() {
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::Percent => Some(BinaryOp::Rem),
            _ => None,
        } {
            self.advance();
            let right = self.unary(r)?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn binary(&mut self, op: BinaryOp, left: Expr, right: Expr) -> Expr {
        let span = left.span.to(right.span);
        self.make_expr(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
        )
    }

    fn unary(&mut self, r: Restrictions) -> PResult<Expr> {
        let op = match self.peek_kind() {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Typeof => UnaryOp::Typeof,
            TokenKind::Void => UnaryOp::Void,
            TokenKind::Delete => UnaryOp::Delete,
            TokenKind::Yield => UnaryOp::Yield,
            _ => return self.type_postfix(r),
        };
        let start = self.advance().span;
        let operand = if op == UnaryOp::Yield && !can_start_expression(self.peek_kind()) {
            // bare `yield`
            self.make_expr(ExprKind::Nul, start)
        } else {
            self.unary(r)?
        };
        let span = start.to(operand.span);
        Ok(self.make_expr(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn type_postfix(&mut self, r: Restrictions) -> PResult<Expr> {
        let mut expr = self.call_chain(r, true)?;
        loop {
            let kind = match self.peek_kind() {
                TokenKind::Is => {
                    self.advance();
                    let ty = self.parse_type()?;
                    ExprKind::TypeTest {
                        expr: Box::new(expr),
                        ty,
                    }
                }
                TokenKind::Of => {
                    self.advance();
                    let ty = self.parse_type()?;
                    ExprKind::Cast {
                        expr: Box::new(expr),
                        ty,
                    }
                }
                TokenKind::Instanceof => {
                    self.advance();
                    let class = self.call_chain(r, false)?;
                    ExprKind::InstanceOf {
                        expr: Box::new(expr),
                        class: Box::new(class),
                    }
                }
                _ => return Ok(expr),
            };
            let span = match &kind {
                ExprKind::TypeTest { expr, .. }
                | ExprKind::Cast { expr, .. }
                | ExprKind::InstanceOf { expr, .. } => expr.span.to(self.previous_span()),
                _ => self.previous_span(),
            };
            expr = self.make_expr(kind, span);
        }
    }

    fn call_chain(&mut self, r: Restrictions, allow_range: bool) -> PResult<Expr> {
        let mut expr = self.primary(r)?;
        loop {
            let kind = match self.peek_kind() {
                TokenKind::LParen => {
                    self.advance();
                    let args = self.arguments()?;
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    }
                }
                TokenKind::Dot | TokenKind::QuestionDot => {
                    let optional = self.advance().is(TokenKind::QuestionDot);
                    let property = self.member_name()?;
                    ExprKind::Member {
                        object: Box::new(expr),
                        property,
                        optional,
                    }
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.expression(Restrictions::FULL)?;
                    self.expect(TokenKind::RBracket, "']' after index")?;
                    ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    }
                }
                TokenKind::DotDot if allow_range => {
                    self.advance();
                    let end = self.call_chain(r, false)?;
                    ExprKind::Range {
                        start: Box::new(expr),
                        end: Box::new(end),
                    }
                }
                TokenKind::LeftArrow => {
                    self.advance();
                    let value = self.logical_or(r)?;
                    let span = expr.span.to(value.span);
                    return Ok(self.make_expr(
                        ExprKind::Send {
                            channel: Box::new(expr),
                            value: Box::new(value),
                        },
                        span,
                    ));
                }
                _ => return Ok(expr),
            };
            let span = chain_start(&kind).to(self.previous_span());
            expr = self.make_expr(kind, span);
        }
    }

    fn arguments(&mut self) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();
        while !self.check(TokenKind::RParen) {
            args.push(self.expression(Restrictions::LIST)?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')' after arguments")?;
        Ok(args)
    }

    fn primary(&mut self, r: Restrictions) -> PResult<Expr> {
        let token = self.peek().clone();
        let simple = match token.kind {
            TokenKind::Int => Some(ExprKind::Int(token.text.clone())),
            TokenKind::Float => Some(ExprKind::Float(token.text.clone())),
            TokenKind::Str => Some(ExprKind::Str(token.text.clone())),
            TokenKind::True => Some(ExprKind::Bool(true)),
            TokenKind::False => Some(ExprKind::Bool(false)),
            TokenKind::Nul => Some(ExprKind::Nul),
            TokenKind::This => Some(ExprKind::This),
            TokenKind::Super => Some(ExprKind::Super),
            TokenKind::Ident => Some(ExprKind::Ident(token.text.clone())),
            _ => None,
        };
        if let Some(kind) = simple {
            self.advance();
            return Ok(self.make_expr(kind, token.span));
        }

        match token.kind {
            TokenKind::Template | TokenKind::InterpStr => {
                self.advance();
                let parts = self.template_parts(&token)?;
                Ok(self.make_expr(ExprKind::Template(parts), token.span))
            }
            TokenKind::LParen => {
                if !r.no_arrow && self.scan_arrow() {
                    return self.arrow(r);
                }
                self.advance();
                let inner = self.expression(Restrictions::FULL)?;
                self.expect(TokenKind::RParen, "')' to close group")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(TokenKind::RBracket) {
                    elements.push(self.expression(Restrictions::LIST)?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket, "']' to close array")?;
                let span = token.span.to(self.previous_span());
                Ok(self.make_expr(ExprKind::Array(elements), span))
            }
            TokenKind::LBrace => self.object_literal(),
            TokenKind::New => self.new_expression(),
            TokenKind::Fn => {
                self.advance();
                let params = self.params()?;
                let ret = self.return_type()?;
                let body = self.block()?;
                let span = token.span.to(self.previous_span());
                Ok(self.make_expr(
                    ExprKind::Lambda(Lambda {
                        params,
                        ret,
                        body: LambdaBody::Block(body),
                        is_fn: true,
                    }),
                    span,
                ))
            }
            TokenKind::Chan => {
                self.advance();
                let elem = if matches!(
                    self.peek_kind(),
                    TokenKind::Ident | TokenKind::Fn | TokenKind::Chan
                ) {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                let capacity = if self.eat(TokenKind::LParen) && !self.eat(TokenKind::RParen) {
                    let capacity = self.expression(Restrictions::LIST)?;
                    self.expect(TokenKind::RParen, "')' after channel capacity")?;
                    Some(Box::new(capacity))
                } else {
                    None
                };
                let span = token.span.to(self.previous_span());
                Ok(self.make_expr(ExprKind::MakeChan { elem, capacity }, span))
            }
            TokenKind::LeftArrow => {
                self.advance();
                let channel = self.call_chain(r, false)?;
                let span = token.span.to(channel.span);
                Ok(self.make_expr(ExprKind::Receive(Box::new(channel)), span))
            }
            TokenKind::Go => {
                self.advance();
                let task = self.call_chain(r, false)?;
                let span = token.span.to(task.span);
                Ok(self.make_expr(ExprKind::Go(Box::new(task)), span))
            }
            TokenKind::Await => {
                self.advance();
                let value = self.call_chain(r, false)?;
                let span = token.span.to(value.span);
                Ok(self.make_expr(ExprKind::Await(Box::new(value)), span))
            }
            _ => Err(self.error_here("expected expression")),
        }
    }

    /// Look past the parenthesised group at the cursor: a lambda if `=>`
    /// follows the matching `)`. The cursor is restored either way.
    fn scan_arrow(&mut self) -> bool {
        let saved = self.position;
        let mut depth = 0usize;
        let is_arrow = loop {
            match self.advance().kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        break self.check(TokenKind::FatArrow);
                    }
                }
                TokenKind::Eof => break false,
                _ => {}
            }
        };
        self.position = saved;
        is_arrow
    }

    fn arrow(&mut self, r: Restrictions) -> PResult<Expr> {
        let start = self.peek().span;
        let params = self.params()?;
        self.expect(TokenKind::FatArrow, "'=>'")?;
        let body = if self.check(TokenKind::LBrace) {
            LambdaBody::Block(self.block()?)
        } else {
            let body_restrictions = Restrictions {
                no_arrow: false,
                ..r
            };
            LambdaBody::Expr(Box::new(self.expression(body_restrictions)?))
        };
        let span = start.to(self.previous_span());
        Ok(self.make_expr(
            ExprKind::Lambda(Lambda {
                params,
                ret: None,
                body,
                is_fn: false,
            }),
            span,
        ))
    }

    fn object_literal(&mut self) -> PResult<Expr> {
        let start = self.expect(TokenKind::LBrace, "'{'")?.span;
        let mut properties = Vec::new();
        while !self.check(TokenKind::RBrace) {
            let key_token = self.peek().clone();
            let (key, shorthand_ok) = if key_token.is(TokenKind::Str) {
                self.advance();
                (key_token.text.clone(), false)
            } else {
                let name = self.member_name()?;
                (name.name, key_token.is(TokenKind::Ident))
            };
            let value = if self.eat(TokenKind::Colon) {
                self.expression(Restrictions::LIST)?
            } else if shorthand_ok {
                self.make_expr(ExprKind::Ident(key.clone()), key_token.span)
            } else {
                return Err(self.error_here(format!("expected ':' after key '{key}'")));
            };
            let span = key_token.span.to(value.span);
            properties.push(Property { key, value, span });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "'}' to close object")?;
        let span = start.to(self.previous_span());
        Ok(self.make_expr(ExprKind::Object(properties), span))
    }

    fn new_expression(&mut self) -> PResult<Expr> {
        let start = self.expect(TokenKind::New, "'new'")?.span;
        let name = self.ident("class name after 'new'")?;
        let mut class = self.make_expr(ExprKind::Ident(name.name), name.span);
        while self.check(TokenKind::Dot) {
            self.advance();
            let property = self.member_name()?;
            let span = class.span.to(property.span);
            class = self.make_expr(
                ExprKind::Member {
                    object: Box::new(class),
                    property,
                    optional: false,
                },
                span,
            );
        }
        let args = if self.eat(TokenKind::LParen) {
            self.arguments()?
        } else {
            Vec::new()
        };
        let span = start.to(self.previous_span());
        Ok(self.make_expr(
            ExprKind::New {
                class: Box::new(class),
                args,
            },
            span,
        ))
    }

    // -----------------------------------------------------------------
    // `when`
    // -----------------------------------------------------------------

    /// Both forms of `when`. Block clause bodies are only accepted in
    /// statement position.
    pub(crate) fn when(&mut self, allow_blocks: bool) -> PResult<When> {
        self.expect(TokenKind::When, "'when'")?;
        let subject = if self.check(TokenKind::LBrace) {
            None
        } else {
            Some(Box::new(self.expression(Restrictions::FULL)?))
        };
        self.expect(TokenKind::LBrace, "'{' to open 'when' clauses")?;
        let mut clauses = Vec::new();
        loop {
            while self.eat(TokenKind::Comma) || self.eat(TokenKind::Semi) {}
            if self.check(TokenKind::RBrace) {
                break;
            }
            if self.check(TokenKind::Eof) {
                return Err(self.error_here("expected '}' to close 'when'"));
            }
            clauses.push(self.when_clause(subject.is_some(), allow_blocks)?);
        }
        self.expect(TokenKind::RBrace, "'}' to close 'when'")?;
        Ok(When { subject, clauses })
    }

    fn when_clause(&mut self, has_subject: bool, allow_blocks: bool) -> PResult<WhenClause> {
        let start = self.peek().span;
        let pattern = if self.check(TokenKind::Else) {
            Pattern::Else(self.advance().span)
        } else if has_subject {
            self.pattern()?
        } else {
            Pattern::Literal(self.expression(Restrictions::CLAUSE_HEAD)?)
        };
        let guard = if has_subject && self.eat(TokenKind::If) {
            Some(self.expression(Restrictions::CLAUSE_HEAD)?)
        } else {
            None
        };
        self.expect(TokenKind::FatArrow, "'=>' after 'when' clause head")?;
        let body = if allow_blocks && self.check(TokenKind::LBrace) {
            WhenBody::Block(self.block()?)
        } else {
            WhenBody::Expr(self.expression(Restrictions::CLAUSE)?)
        };
        Ok(WhenClause {
            pattern,
            guard,
            body,
            span: start.to(self.previous_span()),
        })
    }

    fn pattern(&mut self) -> PResult<Pattern> {
        let first = self.single_pattern()?;
        if !self.check(TokenKind::Pipe) {
            return Ok(first);
        }
        let mut alternatives = vec![first];
        while self.eat(TokenKind::Pipe) {
            alternatives.push(self.single_pattern()?);
        }
        Ok(Pattern::Or(alternatives))
    }

    fn single_pattern(&mut self) -> PResult<Pattern> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Is => {
                self.advance();
                Ok(Pattern::TypeTest(self.parse_type()?))
            }
            TokenKind::Ident if token.text == "_" => {
                self.advance();
                Ok(Pattern::Wildcard(token.span))
            }
            TokenKind::Ident if self.peek_nth(1).is(TokenKind::Dot) => {
                self.advance();
                let mut path = self.make_expr(ExprKind::Ident(token.text.clone()), token.span);
                while self.eat(TokenKind::Dot) {
                    let property = self.member_name()?;
                    let span = path.span.to(property.span);
                    path = self.make_expr(
                        ExprKind::Member {
                            object: Box::new(path),
                            property,
                            optional: false,
                        },
                        span,
                    );
                }
                Ok(Pattern::Value(path))
            }
            TokenKind::Ident => Ok(Pattern::Binding(self.ident("binding")?)),
            TokenKind::Int
            | TokenKind::Float
            | TokenKind::Str
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Nul
            | TokenKind::Template
            | TokenKind::InterpStr => Ok(Pattern::Literal(self.primary(Restrictions::CLAUSE)?)),
            TokenKind::Minus
                if matches!(self.peek_nth(1).kind, TokenKind::Int | TokenKind::Float) =>
            {
                Ok(Pattern::Literal(self.unary(Restrictions::CLAUSE)?))
            }
            _ => Err(self.error_here("expected a pattern")),
        }
    }
}

fn chain_start(kind: &ExprKind) -> crate::span::Span {
    match kind {
        ExprKind::Call { callee: base, .. }
        | ExprKind::Member { object: base, .. }
        | ExprKind::Index { object: base, .. }
        | ExprKind::Range { start: base, .. } => base.span,
        _ => crate::span::Span::default(),
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{BinaryOp, ExprKind, LambdaBody, Pattern, Stmt, StmtKind, UnaryOp};
    use crate::parser::parse_source;

    fn expr(source: &str) -> ExprKind {
        let program = parse_source(source).expect("parse");
        match program.body.into_iter().next() {
            Some(Stmt {
                kind: StmtKind::Expression(e),
                ..
            }) => e.kind,
            Some(Stmt {
                kind: StmtKind::Var(decl),
                ..
            }) => decl.init.expect("initializer").kind,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn precedence_follows_the_ladder() {
        let ExprKind::Binary { op, right, .. } = expr("1 + 2 * 3") else {
            panic!()
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));

        let ExprKind::Binary { op, left, .. } = expr("a || b && c == d") else {
            panic!()
        };
        assert_eq!(op, BinaryOp::Or);
        assert!(matches!(left.kind, ExprKind::Ident(_)));
    }

    #[test]
    fn comma_and_semicolon_are_logical_in_full_context() {
        let ExprKind::Binary { op, left, .. } = expr("a, b; c") else {
            panic!()
        };
        assert_eq!(op, BinaryOp::Or);
        assert!(matches!(left.kind, ExprKind::Binary { op: BinaryOp::And, .. }));
    }

    #[test]
    fn comma_separates_arguments_and_elements() {
        let ExprKind::Call { args, .. } = expr("f(a, b, c)") else {
            panic!()
        };
        assert_eq!(args.len(), 3);
        let ExprKind::Array(items) = expr("const xs = [1, 2, 3]") else {
            panic!()
        };
        assert_eq!(items.len(), 3);
        let ExprKind::Object(props) = expr("const o = { a: 1, b, \"c\": 3 }") else {
            panic!()
        };
        assert_eq!(props.len(), 3);
        assert!(matches!(props[1].value.kind, ExprKind::Ident(ref n) if n == "b"));
    }

    #[test]
    fn parenthesised_group_is_not_a_lambda() {
        assert!(matches!(
            expr("(a + b) * c"),
            ExprKind::Binary { op: BinaryOp::Mul, .. }
        ));
        let ExprKind::Lambda(lambda) = expr("(a, b: Int) => a + b") else {
            panic!()
        };
        assert_eq!(lambda.params.len(), 2);
        assert!(!lambda.is_fn);
        assert!(matches!(lambda.body, LambdaBody::Expr(_)));
        let ExprKind::Lambda(empty) = expr("() => { return 1 }") else {
            panic!()
        };
        assert!(empty.params.is_empty());
        assert!(matches!(empty.body, LambdaBody::Block(_)));
        let ExprKind::Lambda(single) = expr("(x) => x") else {
            panic!()
        };
        assert_eq!(single.params.len(), 1);
        assert!(matches!(
            expr("(f(x) + 1)"),
            ExprKind::Binary { op: BinaryOp::Add, .. }
        ));
    }

    #[test]
    fn lambda_inside_arguments_stops_at_comma() {
        let ExprKind::Call { args, .. } = expr("map(xs, (x) => x * 2, 3)") else {
            panic!()
        };
        assert_eq!(args.len(), 3);
        assert!(matches!(args[1].kind, ExprKind::Lambda(_)));
    }

    #[test]
    fn function_expression() {
        let ExprKind::Lambda(lambda) = expr("const f = fn (x: Int): Int { return x }") else {
            panic!()
        };
        assert!(lambda.is_fn);
        assert!(lambda.ret.is_some());
    }

    #[test]
    fn conditional_expression() {
        let ExprKind::If { else_branch, .. } = expr("const v = if (a > b) a else b") else {
            panic!()
        };
        assert!(matches!(else_branch.kind, ExprKind::Ident(_)));
    }

    #[test]
    fn when_with_subject_reads_patterns() {
        let ExprKind::When(when) =
            expr("const s = when (c) { Color.Red => 1, 2 | 3 => 2, is Str => 3, n if n > 1 => n, _ => 0 }")
        else {
            panic!()
        };
        assert!(when.subject.is_some());
        assert!(matches!(when.clauses[0].pattern, Pattern::Value(_)));
        assert!(matches!(when.clauses[1].pattern, Pattern::Or(_)));
        assert!(matches!(when.clauses[2].pattern, Pattern::TypeTest(_)));
        assert!(matches!(when.clauses[3].pattern, Pattern::Binding(_)));
        assert!(when.clauses[3].guard.is_some());
        assert!(matches!(when.clauses[4].pattern, Pattern::Wildcard(_)));
    }

    #[test]
    fn when_without_subject_reads_conditions() {
        let ExprKind::When(when) =
            expr("const s = when { (x > 5) => \"big\"; x > 0 => \"small\"; else => \"none\" }")
        else {
            panic!()
        };
        assert!(when.subject.is_none());
        assert_eq!(when.clauses.len(), 3);
        assert!(matches!(
            when.clauses[0].pattern,
            Pattern::Literal(ref e) if matches!(e.kind, ExprKind::Binary { op: BinaryOp::Gt, .. })
        ));
        assert!(matches!(when.clauses[2].pattern, Pattern::Else(_)));
    }

    #[test]
    fn type_postfix_operators() {
        assert!(matches!(expr("x is Int"), ExprKind::TypeTest { .. }));
        assert!(matches!(expr("x of Float"), ExprKind::Cast { .. }));
        assert!(matches!(expr("x instanceof Shape"), ExprKind::InstanceOf { .. }));
        assert!(matches!(
            expr("!x is Bool"),
            ExprKind::Unary { op: UnaryOp::Not, .. }
        ));
    }

    #[test]
    fn member_chains_and_ranges() {
        let ExprKind::Call { callee, .. } = expr("a?.b.c[0](1)") else {
            panic!()
        };
        assert!(matches!(callee.kind, ExprKind::Index { .. }));
        assert!(matches!(expr("0..n"), ExprKind::Range { .. }));
        assert!(matches!(
            expr("Shape.match(s, {})"),
            ExprKind::Call { .. }
        ));
    }

    #[test]
    fn channel_operations() {
        assert!(matches!(
            expr("const ch = chan Int(2)"),
            ExprKind::MakeChan { elem: Some(_), capacity: Some(_) }
        ));
        assert!(matches!(
            expr("const ch = chan()"),
            ExprKind::MakeChan { elem: None, .. }
        ));
        let ExprKind::Send { value, .. } = expr("ch <- x + 1") else {
            panic!()
        };
        assert!(matches!(value.kind, ExprKind::Binary { op: BinaryOp::Add, .. }));
        assert!(matches!(expr("const v = <-ch"), ExprKind::Receive(_)));
        assert!(matches!(expr("go worker(ch)"), ExprKind::Go(_)));
        assert!(matches!(expr("await fetch()"), ExprKind::Await(_)));
    }

    #[test]
    fn new_with_dotted_class() {
        let ExprKind::New { class, args } = expr("new shapes.Circle(1.5)") else {
            panic!()
        };
        assert!(matches!(class.kind, ExprKind::Member { .. }));
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn assignment_is_right_associative() {
        let ExprKind::Assign { value, .. } = expr("a = b = 1") else {
            panic!()
        };
        assert!(matches!(value.kind, ExprKind::Assign { .. }));
        assert!(parse_source("1 = 2").is_err());
    }
}
