//! Lexer for Ljos.
//!
//! A single forward pass over the source with one character of lookahead
//! beyond the current one. Line and column counters advance on every
//! character consumed, including inside strings and comments. The first
//! lexical error aborts the whole file.

use crate::error::LexError;
use crate::span::Span;

/// Kind of a token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Special
    Eof,

    // Identifiers and literals
    Ident,
    Int,
    Float,
    /// `"..."`, text is the cooked value.
    Str,
    /// `` `...` ``, text is the raw body.
    Template,
    /// `@"..."`, text is the raw body (escapes validated, not cooked).
    InterpStr,

    // Punctuation
    LParen,      // (
    RParen,      // )
    LBrace,      // {
    RBrace,      // }
    LBracket,    // [
    RBracket,    // ]
    Comma,       // ,
    Semi,        // ;
    Colon,       // :
    Dot,         // .
    DotDot,      // ..
    Ellipsis,    // ...
    Question,    // ?
    QuestionDot, // ?.

    // Operators
    Equal,        // =
    EqualEqual,   // ==
    Bang,         // !
    BangEqual,    // !=
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Percent,      // %
    PlusEqual,    // +=
    MinusEqual,   // -=
    StarEqual,    // *=
    SlashEqual,   // /=
    PercentEqual, // %=
    AndAnd,       // &&
    OrOr,         // ||
    Pipe,         // |
    FatArrow,     // =>
    LeftArrow,    // <-

    // Keywords
    Fn,
    Const,
    Mut,
    Class,
    Abstract,
    Extends,
    Static,
    Private,
    Public,
    Protected,
    New,
    This,
    Super,
    Enum,
    If,
    Else,
    When,
    For,
    In,
    While,
    Break,
    Continue,
    Return,
    Throw,
    Try,
    Catch,
    Finally,
    Import,
    Export,
    Default,
    Defer,
    Using,
    Go,
    Await,
    Chan,
    Typeof,
    Void,
    Delete,
    Yield,
    Is,
    Of,
    Instanceof,
    True,
    False,
    Nul,
}

impl TokenKind {
    /// Keywords at which error recovery may resume parsing.
    pub fn starts_statement(self) -> bool {
        matches!(
            self,
            TokenKind::Fn
                | TokenKind::Const
                | TokenKind::Mut
                | TokenKind::For
                | TokenKind::If
                | TokenKind::When
                | TokenKind::Return
                | TokenKind::Import
                | TokenKind::Export
        )
    }
}

/// A single token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// True for an identifier token spelled `word` (contextual keywords).
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == word
    }
}

/// Lex a whole source file.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).run()
}

/// Decode the escape sequences of a raw `@"..."` body part.
pub fn unescape(raw: &str) -> Result<String, LexError> {
    let mut lexer = Lexer::new(raw);
    let mut out = String::with_capacity(raw.len());
    while let Some(ch) = lexer.peek_char() {
        lexer.consume_char();
        if ch == '\\' {
            out.push(lexer.read_escape()?);
        } else {
            out.push(ch);
        }
    }
    Ok(out)
}

pub struct Lexer {
    chars: Vec<char>,
    index: usize,
    offset: u32,
    line: u32,
    column: u32,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer::with_origin(source, 0, 1, 1)
    }

    /// Lex `source` as if it started at the given position of an
    /// enclosing file.
    pub fn with_origin(source: &str, offset: u32, line: u32, column: u32) -> Self {
        Lexer {
            chars: source.chars().collect(),
            index: 0,
            offset,
            line,
            column,
        }
    }

    pub fn run(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_trivia()?;
            let Some(ch) = self.peek_char() else { break };
            let start = self.mark();

            let token = match ch {
                '(' => self.single(TokenKind::LParen, start),
                ')' => self.single(TokenKind::RParen, start),
                '{' => self.single(TokenKind::LBrace, start),
                '}' => self.single(TokenKind::RBrace, start),
                '[' => self.single(TokenKind::LBracket, start),
                ']' => self.single(TokenKind::RBracket, start),
                ',' => self.single(TokenKind::Comma, start),
                ';' => self.single(TokenKind::Semi, start),
                ':' => self.single(TokenKind::Colon, start),
                '.' => {
                    self.consume_char();
                    if self.peek_char() == Some('.') {
                        self.consume_char();
                        if self.peek_char() == Some('.') {
                            self.consume_char();
                            self.finish(TokenKind::Ellipsis, start)
                        } else {
                            self.finish(TokenKind::DotDot, start)
                        }
                    } else {
                        self.finish(TokenKind::Dot, start)
                    }
                }
                '?' => {
                    self.consume_char();
                    if self.peek_char() == Some('.') {
                        self.consume_char();
                        self.finish(TokenKind::QuestionDot, start)
                    } else {
                        self.finish(TokenKind::Question, start)
                    }
                }
                '=' => {
                    self.consume_char();
                    match self.peek_char() {
                        Some('=') => {
                            self.consume_char();
                            self.finish(TokenKind::EqualEqual, start)
                        }
                        Some('>') => {
                            self.consume_char();
                            self.finish(TokenKind::FatArrow, start)
                        }
                        _ => self.finish(TokenKind::Equal, start),
                    }
                }
                '!' => self.with_equal(TokenKind::Bang, TokenKind::BangEqual, start),
                '<' => {
                    self.consume_char();
                    match self.peek_char() {
                        Some('=') => {
                            self.consume_char();
                            self.finish(TokenKind::LessEqual, start)
                        }
                        Some('-') => {
                            self.consume_char();
                            self.finish(TokenKind::LeftArrow, start)
                        }
                        _ => self.finish(TokenKind::Less, start),
                    }
                }
                '>' => self.with_equal(TokenKind::Greater, TokenKind::GreaterEqual, start),
                '+' => self.with_equal(TokenKind::Plus, TokenKind::PlusEqual, start),
                '-' => self.with_equal(TokenKind::Minus, TokenKind::MinusEqual, start),
                '*' => self.with_equal(TokenKind::Star, TokenKind::StarEqual, start),
                '/' => self.with_equal(TokenKind::Slash, TokenKind::SlashEqual, start),
                '%' => self.with_equal(TokenKind::Percent, TokenKind::PercentEqual, start),
                '&' => {
                    if self.peek_next() == Some('&') {
                        self.consume_char();
                        self.consume_char();
                        self.finish(TokenKind::AndAnd, start)
                    } else {
                        return Err(self.error_at("unexpected character '&'", start));
                    }
                }
                '|' => {
                    self.consume_char();
                    if self.peek_char() == Some('|') {
                        self.consume_char();
                        self.finish(TokenKind::OrOr, start)
                    } else {
                        self.finish(TokenKind::Pipe, start)
                    }
                }
                '"' => self.lex_string(start)?,
                '`' => self.lex_template(start)?,
                '@' => {
                    // `@` only ever introduces an interpolating string.
                    if self.peek_next() == Some('"') {
                        self.lex_interp_string(start)?
                    } else {
                        return Err(self.error_at("unexpected character '@'", start));
                    }
                }
                '0'..='9' => self.lex_number(start)?,
                c if is_ident_start(c) => self.lex_ident_or_keyword(start),
                c => return Err(self.error_at(format!("unexpected character '{c}'"), start)),
            };
            tokens.push(token);
        }

        let eof = self.mark();
        tokens.push(Token {
            kind: TokenKind::Eof,
            text: String::new(),
            span: Span::new(eof.offset, eof.offset, eof.line, eof.column),
        });
        Ok(tokens)
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        while let Some(ch) = self.peek_char() {
            match ch {
                ' ' | '\t' | '\r' | '\n' => self.consume_char(),
                '#' => {
                    while self.peek_char().is_some_and(|c| c != '\n') {
                        self.consume_char();
                    }
                }
                '/' if self.peek_next() == Some('*') => self.skip_block_comment()?,
                '\'' if self.peek_next() == Some('\'') => self.skip_type_comment()?,
                _ => break,
            }
        }
        Ok(())
    }

    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let start = self.mark();
        self.consume_char();
        self.consume_char();
        let mut depth = 1usize;
        while depth > 0 {
            match (self.peek_char(), self.peek_next()) {
                (Some('/'), Some('*')) => {
                    self.consume_char();
                    self.consume_char();
                    depth += 1;
                }
                (Some('*'), Some('/')) => {
                    self.consume_char();
                    self.consume_char();
                    depth -= 1;
                }
                (Some(_), _) => self.consume_char(),
                (None, _) => return Err(self.error_at("unterminated block comment", start)),
            }
        }
        Ok(())
    }

    /// `''...''` annotations for external tools; they never produce tokens.
    fn skip_type_comment(&mut self) -> Result<(), LexError> {
        let start = self.mark();
        self.consume_char();
        self.consume_char();
        loop {
            match (self.peek_char(), self.peek_next()) {
                (Some('\''), Some('\'')) => {
                    self.consume_char();
                    self.consume_char();
                    return Ok(());
                }
                (Some(_), _) => self.consume_char(),
                (None, _) => return Err(self.error_at("unterminated type comment", start)),
            }
        }
    }

    fn lex_string(&mut self, start: Mark) -> Result<Token, LexError> {
        self.consume_char(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek_char() {
                Some('"') => {
                    self.consume_char();
                    return Ok(self.finish_with(TokenKind::Str, value, start));
                }
                Some('\\') => {
                    self.consume_char();
                    value.push(self.read_escape()?);
                }
                Some(c) => {
                    self.consume_char();
                    value.push(c);
                }
                None => return Err(self.error_at("unterminated string literal", start)),
            }
        }
    }

    fn lex_template(&mut self, start: Mark) -> Result<Token, LexError> {
        self.consume_char(); // `
        let body = self.scan_template_body('`', false, start)?;
        Ok(self.finish_with(TokenKind::Template, body, start))
    }

    fn lex_interp_string(&mut self, start: Mark) -> Result<Token, LexError> {
        self.consume_char(); // @
        self.consume_char(); // "
        let body = self.scan_template_body('"', true, start)?;
        Ok(self.finish_with(TokenKind::InterpStr, body, start))
    }

    /// Collect a template body verbatim up to `terminator`.
    ///
    /// Inside `${...}` spans the terminator does not end the literal and
    /// quoted strings are skipped whole, so `@"a ${f("x")}"` stays one token.
    fn scan_template_body(
        &mut self,
        terminator: char,
        escapes: bool,
        start: Mark,
    ) -> Result<String, LexError> {
        let mut body = String::new();
        let mut depth = 0usize;
        loop {
            let Some(ch) = self.peek_char() else {
                return Err(self.error_at("unterminated template string", start));
            };
            if depth == 0 && ch == terminator {
                self.consume_char();
                return Ok(body);
            }
            match ch {
                '\\' if escapes && depth == 0 => {
                    // Validate now, cook later when the parser splits the parts.
                    let snapshot = self.index;
                    self.consume_char();
                    self.read_escape()?;
                    body.extend(&self.chars[snapshot..self.index]);
                }
                '$' if self.peek_next() == Some('$') => {
                    self.consume_char();
                    body.push('$');
                    if self.peek_next() == Some('{') {
                        // `$${` stays literal; keep both characters for the splitter.
                        self.consume_char();
                        body.push('$');
                        self.consume_char();
                        body.push('{');
                    }
                }
                '$' if self.peek_next() == Some('{') => {
                    self.consume_char();
                    self.consume_char();
                    body.push_str("${");
                    depth += 1;
                }
                '{' if depth > 0 => {
                    self.consume_char();
                    body.push('{');
                    depth += 1;
                }
                '}' if depth > 0 => {
                    self.consume_char();
                    body.push('}');
                    depth -= 1;
                }
                '"' | '`' if depth > 0 => {
                    let quote = ch;
                    self.consume_char();
                    body.push(quote);
                    loop {
                        match self.peek_char() {
                            Some('\\') => {
                                self.consume_char();
                                body.push('\\');
                                if let Some(next) = self.peek_char() {
                                    self.consume_char();
                                    body.push(next);
                                }
                            }
                            Some(c) => {
                                self.consume_char();
                                body.push(c);
                                if c == quote {
                                    break;
                                }
                            }
                            None => {
                                return Err(self.error_at("unterminated template string", start));
                            }
                        }
                    }
                }
                _ => {
                    self.consume_char();
                    body.push(ch);
                }
            }
        }
    }

    /// Decode one escape sequence; the backslash is already consumed.
    fn read_escape(&mut self) -> Result<char, LexError> {
        let at = self.mark();
        let Some(ch) = self.peek_char() else {
            return Err(self.error_at("unterminated escape sequence", at));
        };
        self.consume_char();
        let decoded = match ch {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            '0' => '\0',
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            '$' => '$',
            'x' => self.read_hex_escape(2, at)?,
            'u' => self.read_hex_escape(4, at)?,
            'U' => self.read_hex_escape(8, at)?,
            other => {
                return Err(self.error_at(format!("invalid escape sequence '\\{other}'"), at));
            }
        };
        Ok(decoded)
    }

    fn read_hex_escape(&mut self, digits: usize, at: Mark) -> Result<char, LexError> {
        let mut value: u32 = 0;
        for _ in 0..digits {
            let digit = self
                .peek_char()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error_at("malformed hexadecimal escape sequence", at))?;
            self.consume_char();
            value = value * 16 + digit;
        }
        char::from_u32(value)
            .ok_or_else(|| self.error_at(format!("invalid code point U+{value:X} in escape"), at))
    }

    fn lex_number(&mut self, start: Mark) -> Result<Token, LexError> {
        let radix = match (self.peek_char(), self.peek_next()) {
            (Some('0'), Some('b' | 'B')) => Some((2, "0b", "binary")),
            (Some('0'), Some('o' | 'O')) => Some((8, "0o", "octal")),
            (Some('0'), Some('x' | 'X')) => Some((16, "0x", "hexadecimal")),
            _ => None,
        };

        if let Some((radix, prefix, name)) = radix {
            self.consume_char();
            self.consume_char();
            let mut text = String::from(prefix);
            while let Some(ch) = self.peek_char() {
                if ch == '_' {
                    self.consume_char();
                } else if ch.is_digit(radix) {
                    self.consume_char();
                    text.push(ch);
                } else if ch.is_ascii_alphanumeric() {
                    return Err(
                        self.error_at(format!("invalid digit '{ch}' in {name} literal"), start)
                    );
                } else {
                    break;
                }
            }
            if text.len() == prefix.len() {
                return Err(self.error_at(format!("{name} literal has no digits"), start));
            }
            return Ok(self.finish_with(TokenKind::Int, text, start));
        }

        let mut text = String::new();
        let mut kind = TokenKind::Int;
        self.take_digits(&mut text);

        // A fraction needs digits on both sides, so `1..5` stays a range.
        if self.peek_char() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.consume_char();
            text.push('.');
            self.take_digits(&mut text);
            kind = TokenKind::Float;
        }

        if matches!(self.peek_char(), Some('e' | 'E')) {
            let signed = matches!(self.peek_next(), Some('+' | '-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                self.consume_char();
                text.push('e');
                if signed {
                    if let Some(sign) = self.peek_char() {
                        self.consume_char();
                        text.push(sign);
                    }
                }
                self.take_digits(&mut text);
                kind = TokenKind::Float;
            }
        }

        if self.peek_char().is_some_and(is_ident_start) {
            return Err(self.error_at("invalid numeric literal", start));
        }

        Ok(self.finish_with(kind, text, start))
    }

    fn take_digits(&mut self, text: &mut String) {
        while let Some(ch) = self.peek_char() {
            if ch == '_' {
                self.consume_char();
            } else if ch.is_ascii_digit() {
                self.consume_char();
                text.push(ch);
            } else {
                break;
            }
        }
    }

    fn lex_ident_or_keyword(&mut self, start: Mark) -> Token {
        let mut text = String::new();
        while let Some(ch) = self.peek_char() {
            if is_ident_continue(ch) {
                self.consume_char();
                text.push(ch);
            } else {
                break;
            }
        }

        let kind = match text.as_str() {
            "fn" => TokenKind::Fn,
            "const" => TokenKind::Const,
            "mut" => TokenKind::Mut,
            "class" => TokenKind::Class,
            "abstract" => TokenKind::Abstract,
            "extends" => TokenKind::Extends,
            "static" => TokenKind::Static,
            "private" => TokenKind::Private,
            "public" => TokenKind::Public,
            "protected" => TokenKind::Protected,
            "new" => TokenKind::New,
            "this" => TokenKind::This,
            "super" => TokenKind::Super,
            "enum" => TokenKind::Enum,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "when" => TokenKind::When,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "while" => TokenKind::While,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "return" => TokenKind::Return,
            "throw" => TokenKind::Throw,
            "try" => TokenKind::Try,
            "catch" => TokenKind::Catch,
            "finally" => TokenKind::Finally,
            "import" => TokenKind::Import,
            "export" => TokenKind::Export,
            "default" => TokenKind::Default,
            "defer" => TokenKind::Defer,
            "using" => TokenKind::Using,
            "go" => TokenKind::Go,
            "await" => TokenKind::Await,
            "chan" => TokenKind::Chan,
            "typeof" => TokenKind::Typeof,
            "void" => TokenKind::Void,
            "delete" => TokenKind::Delete,
            "yield" => TokenKind::Yield,
            "is" => TokenKind::Is,
            "of" => TokenKind::Of,
            "instanceof" => TokenKind::Instanceof,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "nul" => TokenKind::Nul,
            _ => TokenKind::Ident,
        };

        self.finish_with(kind, text, start)
    }

    fn single(&mut self, kind: TokenKind, start: Mark) -> Token {
        self.consume_char();
        self.finish(kind, start)
    }

    fn with_equal(&mut self, plain: TokenKind, with_eq: TokenKind, start: Mark) -> Token {
        self.consume_char();
        if self.peek_char() == Some('=') {
            self.consume_char();
            self.finish(with_eq, start)
        } else {
            self.finish(plain, start)
        }
    }

    fn finish(&self, kind: TokenKind, start: Mark) -> Token {
        let text = self.chars[start.index..self.index].iter().collect();
        self.finish_with(kind, text, start)
    }

    fn finish_with(&self, kind: TokenKind, text: String, start: Mark) -> Token {
        Token {
            kind,
            text,
            span: Span::new(start.offset, self.offset, start.line, start.column),
        }
    }

    fn error_at(&self, message: impl Into<String>, at: Mark) -> LexError {
        LexError::new(message, at.line, at.column)
    }

    fn mark(&self) -> Mark {
        Mark {
            index: self.index,
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.peek_at(1)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.index + ahead).copied()
    }

    fn consume_char(&mut self) {
        if let Some(ch) = self.peek_char() {
            self.index += 1;
            self.offset += ch.len_utf8() as u32;
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Mark {
    index: usize,
    offset: u32,
    line: u32,
    column: u32,
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_continue(ch: char) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("lex")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn single(source: &str) -> Token {
        let mut tokens = tokenize(source).expect("lex");
        assert_eq!(tokens.len(), 2, "expected one token in {source:?}");
        tokens.remove(0)
    }

    #[test]
    fn strips_digit_separators() {
        assert_eq!(single("1_000_000").text, "1000000");
        assert_eq!(single("0b1010_1100").text, "0b10101100");
        assert_eq!(single("0xDEAD_BEEF").text, "0xDEADBEEF");
        assert_eq!(single("0o7_7").text, "0o77");
    }

    #[test]
    fn lexes_floats_and_exponents() {
        let t = single("3.25");
        assert_eq!((t.kind, t.text.as_str()), (TokenKind::Float, "3.25"));
        assert_eq!(single("1e9").kind, TokenKind::Float);
        assert_eq!(single("2.5E-3").text, "2.5e-3");
    }

    #[test]
    fn range_is_not_a_fraction() {
        assert_eq!(
            kinds("1..5"),
            vec![TokenKind::Int, TokenKind::DotDot, TokenKind::Int, TokenKind::Eof]
        );
    }

    #[test]
    fn rejects_bad_digits() {
        assert!(tokenize("0b102").is_err());
        assert!(tokenize("0x").is_err());
        assert!(tokenize("12abc").is_err());
    }

    #[test]
    fn nested_block_comments_vanish() {
        assert_eq!(kinds("/* a /* b */ c */"), vec![TokenKind::Eof]);
        let deep = "/* 1 /* 2 /* 3 /* 4 /* 5 */ */ */ */ */";
        assert_eq!(kinds(deep), vec![TokenKind::Eof]);
        assert_eq!(
            kinds("x /* /* */ */ y"),
            vec![TokenKind::Ident, TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn unterminated_nested_comment_is_an_error() {
        let err = tokenize("/* /* */").unwrap_err();
        assert_eq!((err.line, err.column), (1, 1));
    }

    #[test]
    fn type_comments_emit_nothing() {
        assert_eq!(
            kinds("const x ''Int'' = 1"),
            vec![
                TokenKind::Const,
                TokenKind::Ident,
                TokenKind::Equal,
                TokenKind::Int,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn line_comments_run_to_end_of_line() {
        assert_eq!(
            kinds("a # comment\nb"),
            vec![TokenKind::Ident, TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn cooks_double_quoted_escapes() {
        let t = single(r#""a\tb\n\x41é\U0001F600\$""#);
        assert_eq!(t.text, "a\tb\nA\u{e9}\u{1F600}$");
    }

    #[test]
    fn invalid_escape_reports_position() {
        let err = tokenize("x = \"ab\\q\"").unwrap_err();
        assert!(err.message.contains("\\q"));
        assert_eq!(err.line, 1);
    }

    #[test]
    fn template_keeps_raw_text() {
        let t = single("`a\\n ${x + 1} b`");
        assert_eq!(t.kind, TokenKind::Template);
        assert_eq!(t.text, "a\\n ${x + 1} b");
    }

    #[test]
    fn at_quote_starts_interpolated_string() {
        let t = single(r#"@"hi ${name("x")}!""#);
        assert_eq!(t.kind, TokenKind::InterpStr);
        assert_eq!(t.text, r#"hi ${name("x")}!"#);
        assert!(tokenize("@x").is_err());
    }

    #[test]
    fn tracks_lines_and_columns() {
        let tokens = tokenize("a\n  bb\n\"x\ny\" c").expect("lex");
        let positions: Vec<_> = tokens
            .iter()
            .map(|t| (t.span.line, t.span.column))
            .collect();
        assert_eq!(positions[0], (1, 1));
        assert_eq!(positions[1], (2, 3));
        assert_eq!(positions[2], (3, 1));
        assert_eq!(positions[3], (4, 4));
    }

    #[test]
    fn compound_operators() {
        assert_eq!(
            kinds("a ?. b <- c => d .. e ... f != g"),
            vec![
                TokenKind::Ident,
                TokenKind::QuestionDot,
                TokenKind::Ident,
                TokenKind::LeftArrow,
                TokenKind::Ident,
                TokenKind::FatArrow,
                TokenKind::Ident,
                TokenKind::DotDot,
                TokenKind::Ident,
                TokenKind::Ellipsis,
                TokenKind::Ident,
                TokenKind::BangEqual,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn unknown_character_is_fatal() {
        let err = tokenize("a ~ b").unwrap_err();
        assert_eq!(err.column, 3);
    }

    #[test]
    fn origin_offsets_positions() {
        let tokens = Lexer::with_origin("x", 10, 4, 9).run().expect("lex");
        assert_eq!((tokens[0].span.line, tokens[0].span.column), (4, 9));
        assert_eq!(tokens[0].span.start, 10);
    }

    #[test]
    fn unescape_decodes_raw_parts() {
        assert_eq!(unescape(r"a\nb\$").unwrap(), "a\nb$");
        assert!(unescape(r"\z").is_err());
    }
}
