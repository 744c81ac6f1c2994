//! Splitting template bodies into text and `${...}` expression parts.
//!
//! Each embedded expression is lexed from its own slice of the body with
//! the lexer positioned where the slice starts in the file, then parsed by
//! a nested parser that continues this parser's node-id sequence.

use super::{PResult, Parser, Restrictions};
use crate::ast::TemplatePart;
use crate::error::ParseError;
use crate::lexer::{Lexer, Token, TokenKind, unescape};

/// Cursor over a template body that keeps file positions in step.
struct BodyCursor {
    chars: Vec<char>,
    index: usize,
    offset: u32,
    line: u32,
    column: u32,
}

impl BodyCursor {
    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.index + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek_at(0)?;
        self.index += 1;
        self.offset += ch.len_utf8() as u32;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }
}

impl Parser {
    pub(crate) fn template_parts(&mut self, token: &Token) -> PResult<Vec<TemplatePart>> {
        let cooked = token.is(TokenKind::InterpStr);
        let prefix = if cooked { 2 } else { 1 };
        let mut cursor = BodyCursor {
            chars: token.text.chars().collect(),
            index: 0,
            offset: token.span.start + prefix,
            line: token.span.line,
            column: token.span.column + prefix,
        };

        let mut parts = Vec::new();
        let mut text = String::new();
        while let Some(ch) = cursor.peek_at(0) {
            match ch {
                '\\' if cooked => {
                    // kept raw until the text part is cooked
                    cursor.bump();
                    text.push('\\');
                    if let Some(next) = cursor.bump() {
                        text.push(next);
                    }
                }
                '$' if cursor.peek_at(1) == Some('$') && cursor.peek_at(2) == Some('{') => {
                    cursor.bump();
                    cursor.bump();
                    cursor.bump();
                    text.push_str("${");
                }
                '$' if cursor.peek_at(1) == Some('{') => {
                    self.flush_text(&mut parts, &mut text, cooked, token)?;
                    cursor.bump();
                    cursor.bump();
                    let expr = self.embedded_expression(&mut cursor, token)?;
                    parts.push(TemplatePart::Expr(expr));
                }
                _ => {
                    cursor.bump();
                    text.push(ch);
                }
            }
        }
        self.flush_text(&mut parts, &mut text, cooked, token)?;
        Ok(parts)
    }

    fn flush_text(
        &self,
        parts: &mut Vec<TemplatePart>,
        text: &mut String,
        cooked: bool,
        token: &Token,
    ) -> PResult<()> {
        if text.is_empty() {
            return Ok(());
        }
        let raw = std::mem::take(text);
        let value = if cooked {
            unescape(&raw).map_err(|e| ParseError::new(e.message, token.clone()))?
        } else {
            raw
        };
        parts.push(TemplatePart::Text(value));
        Ok(())
    }

    /// Parse the expression after `${`, leaving the cursor past its `}`.
    fn embedded_expression(
        &mut self,
        cursor: &mut BodyCursor,
        token: &Token,
    ) -> PResult<crate::ast::Expr> {
        let (offset, line, column) = (cursor.offset, cursor.line, cursor.column);
        let mut source = String::new();
        let mut depth = 0usize;
        loop {
            let Some(ch) = cursor.bump() else {
                return Err(ParseError::new(
                    "unterminated '${' in template string",
                    token.clone(),
                ));
            };
            match ch {
                '{' => depth += 1,
                '}' if depth == 0 => break,
                '}' => depth -= 1,
                '"' | '`' => {
                    source.push(ch);
                    while let Some(inner) = cursor.bump() {
                        source.push(inner);
                        if inner == '\\' {
                            if let Some(escaped) = cursor.bump() {
                                source.push(escaped);
                            }
                        } else if inner == ch {
                            break;
                        }
                    }
                    continue;
                }
                _ => {}
            }
            source.push(ch);
        }

        if source.trim().is_empty() {
            return Err(ParseError::new(
                "empty '${}' in template string",
                token.clone(),
            ));
        }

        let tokens = Lexer::with_origin(&source, offset, line, column)
            .run()
            .map_err(|e| {
                ParseError::new(format!("in template expression: {}", e.message), token.clone())
            })?;
        let mut nested = Parser::with_first_id(tokens, self.next_id);
        let expr = nested.expression(Restrictions::FULL)?;
        if !nested.check(TokenKind::Eof) {
            return Err(nested.error_here("unexpected token in template expression"));
        }
        // errors recovered inside embedded blocks belong to the file
        self.errors.append(&mut nested.errors);
        self.next_id = nested.next_id;
        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{ExprKind, StmtKind, TemplatePart};
    use crate::error::CoreError;
    use crate::parser::parse_source;

    fn parts(source: &str) -> Vec<TemplatePart> {
        let program = parse_source(source).expect("parse");
        let Some(StmtKind::Var(decl)) = program.body.into_iter().next().map(|s| s.kind) else {
            panic!("expected declaration");
        };
        match decl.init.map(|e| e.kind) {
            Some(ExprKind::Template(parts)) => parts,
            other => panic!("expected template, got {other:?}"),
        }
    }

    #[test]
    fn splits_text_and_expressions() {
        let parts = parts("const s = `Hello, ${name}! You are ${age + 1}.`");
        assert_eq!(parts.len(), 5);
        assert!(matches!(&parts[0], TemplatePart::Text(t) if t == "Hello, "));
        assert!(matches!(&parts[1], TemplatePart::Expr(e) if matches!(e.kind, ExprKind::Ident(_))));
        assert!(matches!(&parts[3], TemplatePart::Expr(e) if matches!(e.kind, ExprKind::Binary { .. })));
        assert!(matches!(&parts[4], TemplatePart::Text(t) if t == "."));
    }

    #[test]
    fn double_dollar_is_a_literal_brace() {
        let parts = parts("const s = `cost: $${price}`");
        assert_eq!(parts.len(), 1);
        assert!(matches!(&parts[0], TemplatePart::Text(t) if t == "cost: ${price}"));
    }

    #[test]
    fn raw_templates_keep_backslashes() {
        let parts = parts(r"const s = `a\nb`");
        assert!(matches!(&parts[0], TemplatePart::Text(t) if t == r"a\nb"));
    }

    #[test]
    fn interpolated_strings_are_cooked() {
        let parts = parts(r#"const s = @"tab\there ${x}\n""#);
        assert!(matches!(&parts[0], TemplatePart::Text(t) if t == "tab\there "));
        assert!(matches!(&parts[2], TemplatePart::Text(t) if t == "\n"));
    }

    #[test]
    fn nested_braces_and_strings_inside_expressions() {
        let parts = parts(r#"const s = @"${f({ a: "}" })} done""#);
        assert!(matches!(&parts[0], TemplatePart::Expr(e) if matches!(e.kind, ExprKind::Call { .. })));
    }

    #[test]
    fn embedded_positions_point_into_the_file() {
        let parts = parts("const s = `ab${x}`");
        let TemplatePart::Expr(e) = &parts[1] else {
            panic!()
        };
        // `x` is the 16th character on line 1
        assert_eq!((e.span.line, e.span.column), (1, 16));
    }

    #[test]
    fn empty_interpolation_is_an_error() {
        assert!(parse_source("const s = `${}`").is_err());
    }

    #[test]
    fn errors_inside_embedded_blocks_are_reported() {
        let err = parse_source("const s = `${(() => { const = 1 })()}`").expect_err("syntax error");
        let CoreError::Parse(errors) = err else {
            panic!("expected parse errors, got {err:?}");
        };
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert_eq!(errors[0].token.span.line, 1);
    }
}
