use crate::language::{
    span::Span,
    token::{Token, TokenKind},
};
use num_bigint::BigInt;

const TAB_WIDTH: usize = 8;
const MAX_INDENT_LEVELS: usize = 100;

#[derive(Debug)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

pub fn lex(source: &str) -> Result<Vec<Token>, Vec<LexError>> {
    let lexer = Lexer::new(source);
    lexer.run()
}

struct Lexer<'a> {
    src: &'a str,
    chars: std::str::Chars<'a>,
    current: Option<char>,
    offset: usize,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
    indents: Vec<usize>,
    nesting: usize,
    at_line_start: bool,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        let mut chars = src.chars();
        let current = chars.next();
        Self {
            src,
            chars,
            current,
            offset: 0,
            tokens: Vec::new(),
            errors: Vec::new(),
            indents: vec![0],
            nesting: 0,
            at_line_start: true,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, Vec<LexError>> {
        while self.current.is_some() && self.errors.is_empty() {
            if self.at_line_start && self.nesting == 0 {
                self.lex_indentation();
                continue;
            }
            let Some(ch) = self.current else {
                break;
            };
            match ch {
                '#' => self.eat_comment(),
                '\\' if self.peek() == Some('\n') => {
                    self.bump();
                    self.bump();
                }
                '\\' if self.peek() == Some('\r') => {
                    self.bump();
                    self.bump();
                    if self.current == Some('\n') {
                        self.bump();
                    }
                }
                '\n' => {
                    if self.nesting == 0 {
                        self.push_newline(self.offset);
                        self.at_line_start = true;
                    }
                    self.bump();
                }
                ch if ch.is_whitespace() => {
                    self.bump();
                }
                ch if ch.is_alphabetic() || ch == '_' => self.lex_identifier(),
                ch if ch.is_ascii_digit() => self.lex_number(),
                '.' if self.peek().is_some_and(|next| next.is_ascii_digit()) => self.lex_number(),
                '"' | '\'' => self.lex_string(self.offset, false, false),
                _ => self.lex_symbol(),
            }
        }

        if !self.errors.is_empty() {
            return Err(self.errors);
        }

        self.push_newline(self.offset);
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push_token(TokenKind::Dedent, self.offset, self.offset);
        }
        self.push_token(TokenKind::Eof, self.offset, self.offset);
        Ok(self.tokens)
    }

    fn bump(&mut self) -> Option<char> {
        if let Some(ch) = self.current {
            self.offset += ch.len_utf8();
        }
        self.current = self.chars.next();
        self.current
    }

    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.chars.clone().nth(n)
    }

    fn push_token(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start, end),
        });
    }

    fn push_newline(&mut self, at: usize) {
        let needs_newline = self
            .tokens
            .last()
            .is_some_and(|token| !matches!(token.kind, TokenKind::Newline | TokenKind::Dedent));
        if needs_newline {
            self.push_token(TokenKind::Newline, at, at);
        }
    }

    fn error(&mut self, start: usize, end: usize, message: impl Into<String>) {
        self.errors.push(LexError {
            message: message.into(),
            span: Span::new(start, end),
        });
    }

    fn eat_comment(&mut self) {
        while let Some(ch) = self.current {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn lex_indentation(&mut self) {
        let start = self.offset;
        let mut column = 0;
        while let Some(ch) = self.current {
            match ch {
                ' ' => column += 1,
                '\t' => column = (column / TAB_WIDTH + 1) * TAB_WIDTH,
                '\x0c' => column = 0,
                _ => break,
            }
            self.bump();
        }

        // Blank and comment-only lines do not take part in indentation.
        match self.current {
            None => return,
            Some('\n') => {
                self.bump();
                return;
            }
            Some('\r') if self.peek() == Some('\n') => {
                self.bump();
                self.bump();
                return;
            }
            Some('#') => {
                self.eat_comment();
                if self.current == Some('\n') {
                    self.bump();
                }
                return;
            }
            _ => {}
        }

        self.at_line_start = false;
        let top = self.indents.last().copied().unwrap_or(0);
        if column > top {
            if self.indents.len() > MAX_INDENT_LEVELS {
                self.error(start, self.offset, "too many levels of indentation");
                return;
            }
            self.indents.push(column);
            self.push_token(TokenKind::Indent, start, self.offset);
            return;
        }
        while column < self.indents.last().copied().unwrap_or(0) {
            self.indents.pop();
            self.push_token(TokenKind::Dedent, self.offset, self.offset);
        }
        if column != self.indents.last().copied().unwrap_or(0) {
            self.error(
                start,
                self.offset,
                "unindent does not match any outer indentation level",
            );
        }
    }

    fn lex_identifier(&mut self) {
        let start = self.offset;
        while let Some(ch) = self.current {
            if ch.is_alphanumeric() || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }

        let end = self.offset;
        let slice = &self.src[start..end];
        if matches!(self.current, Some('"') | Some('\'')) {
            let prefix = slice.to_ascii_lowercase();
            match prefix.as_str() {
                "b" => return self.lex_string(start, true, false),
                "br" | "rb" => return self.lex_string(start, true, true),
                "r" => return self.lex_string(start, false, true),
                "u" => return self.lex_string(start, false, false),
                "ur" => return self.lex_string(start, false, true),
                _ => {}
            }
        }

        let kind = match slice {
            "def" => TokenKind::Def,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "not" => TokenKind::Not,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "pass" => TokenKind::Pass,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "print" => TokenKind::Print,
            "del" => TokenKind::Del,
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            "None" => TokenKind::None,
            _ => TokenKind::Identifier(slice.to_string()),
        };
        self.push_token(kind, start, end);
    }

    fn eat_digits(&mut self, radix: u32) {
        while let Some(ch) = self.current {
            if ch.is_digit(radix) || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn lex_number(&mut self) {
        let start = self.offset;

        if self.current == Some('0') && matches!(self.peek(), Some('x') | Some('X')) {
            self.bump();
            self.bump();
            let digits_start = self.offset;
            self.eat_digits(16);
            let digits: String = self.src[digits_start..self.offset]
                .chars()
                .filter(|ch| *ch != '_')
                .collect();
            match BigInt::parse_bytes(digits.as_bytes(), 16) {
                Some(value) => self.push_token(TokenKind::Integer(value), start, self.offset),
                None => self.error(start, self.offset, "invalid hexadecimal literal"),
            }
            return;
        }

        self.eat_digits(10);
        let mut is_float = false;
        if self.current == Some('.') {
            is_float = true;
            self.bump();
            self.eat_digits(10);
        }

        if matches!(self.current, Some('e') | Some('E')) {
            let signed = matches!(self.peek(), Some('+') | Some('-'));
            let digit_at = if signed { 1 } else { 0 };
            if self.peek_nth(digit_at).is_some_and(|ch| ch.is_ascii_digit()) {
                is_float = true;
                self.bump();
                if signed {
                    self.bump();
                }
                self.eat_digits(10);
            }
        }

        let text: String = self.src[start..self.offset]
            .chars()
            .filter(|ch| *ch != '_')
            .collect();

        if matches!(self.current, Some('j') | Some('J')) {
            self.bump();
            match text.parse::<f64>() {
                Ok(value) => self.push_token(TokenKind::Imaginary(value), start, self.offset),
                Err(_) => self.error(start, self.offset, "invalid imaginary literal"),
            }
            return;
        }

        if is_float {
            match text.parse::<f64>() {
                Ok(value) => self.push_token(TokenKind::Float(value), start, self.offset),
                Err(_) => self.error(start, self.offset, "invalid float literal"),
            }
        } else {
            match text.parse::<BigInt>() {
                Ok(value) => self.push_token(TokenKind::Integer(value), start, self.offset),
                Err(_) => self.error(start, self.offset, "invalid integer literal"),
            }
        }
    }

    fn lex_string(&mut self, start: usize, bytes: bool, raw: bool) {
        let Some(quote) = self.current else {
            return;
        };
        let triple = self.peek() == Some(quote) && self.peek_nth(1) == Some(quote);
        self.bump();
        if triple {
            self.bump();
            self.bump();
        }

        let mut value: Vec<char> = Vec::new();
        loop {
            let Some(ch) = self.current else {
                let message = if triple {
                    "EOF while scanning triple-quoted string literal"
                } else {
                    "EOL while scanning string literal"
                };
                self.error(start, self.offset, message);
                return;
            };

            if ch == quote {
                if !triple {
                    self.bump();
                    break;
                }
                if self.peek() == Some(quote) && self.peek_nth(1) == Some(quote) {
                    self.bump();
                    self.bump();
                    self.bump();
                    break;
                }
                value.push(ch);
                self.bump();
                continue;
            }

            if ch == '\n' && !triple {
                self.error(start, self.offset, "EOL while scanning string literal");
                return;
            }

            if ch == '\\' {
                self.bump();
                let Some(escaped) = self.current else {
                    continue;
                };
                if raw {
                    value.push('\\');
                    value.push(escaped);
                    self.bump();
                    continue;
                }
                match self.lex_escape(escaped, bytes) {
                    Some(decoded) => value.push(decoded),
                    None if escaped == '\n' => {}
                    None => {
                        value.push('\\');
                        value.push(escaped);
                        self.bump();
                    }
                }
                continue;
            }

            if bytes && !ch.is_ascii() {
                self.error(
                    start,
                    self.offset,
                    "bytes can only contain ASCII literal characters",
                );
                return;
            }
            value.push(ch);
            self.bump();
        }

        let end = self.offset;
        if bytes {
            // Escapes in byte literals decode to chars below 256.
            let data = value.into_iter().map(|ch| ch as u32 as u8).collect();
            self.push_token(TokenKind::Bytes(data), start, end);
        } else {
            self.push_token(TokenKind::String(value.into_iter().collect()), start, end);
        }
    }

    /// Decodes the escape starting at `escaped` (the char after the
    /// backslash). Consumes the escape when recognised; returns `None` and
    /// leaves the cursor untouched otherwise, except for an escaped newline
    /// which is consumed and dropped.
    fn lex_escape(&mut self, escaped: char, bytes: bool) -> Option<char> {
        let simple = match escaped {
            'n' => Some('\n'),
            't' => Some('\t'),
            'r' => Some('\r'),
            'a' => Some('\x07'),
            'b' => Some('\x08'),
            'f' => Some('\x0c'),
            'v' => Some('\x0b'),
            '\\' => Some('\\'),
            '\'' => Some('\''),
            '"' => Some('"'),
            _ => None,
        };
        if let Some(decoded) = simple {
            self.bump();
            return Some(decoded);
        }

        match escaped {
            '\n' => {
                self.bump();
                None
            }
            '0'..='7' => {
                let mut code = 0u32;
                let mut taken = 0;
                while taken < 3 {
                    match self.current.and_then(|ch| ch.to_digit(8)) {
                        Some(digit) => {
                            code = code * 8 + digit;
                            taken += 1;
                            self.bump();
                        }
                        None => break,
                    }
                }
                char::from_u32(code & 0xff)
            }
            'x' => self.lex_hex_escape(2),
            'u' if !bytes => self.lex_hex_escape(4),
            'U' if !bytes => self.lex_hex_escape(8),
            _ => None,
        }
    }

    fn lex_hex_escape(&mut self, width: usize) -> Option<char> {
        let digits: Option<String> = (0..width).map(|idx| self.peek_nth(idx)).collect();
        let digits = digits.filter(|digits| digits.chars().all(|ch| ch.is_ascii_hexdigit()))?;
        let code = u32::from_str_radix(&digits, 16).ok()?;
        let decoded = char::from_u32(code)?;
        self.bump();
        for _ in 0..width {
            self.bump();
        }
        Some(decoded)
    }

    fn lex_symbol(&mut self) {
        let start = self.offset;
        let ch = self.current;
        match ch {
            Some('(') => self.open(TokenKind::LParen),
            Some(')') => self.close(TokenKind::RParen),
            Some('{') => self.open(TokenKind::LBrace),
            Some('}') => self.close(TokenKind::RBrace),
            Some('[') => self.open(TokenKind::LBracket),
            Some(']') => self.close(TokenKind::RBracket),
            Some(',') => self.single(TokenKind::Comma),
            Some('.') => self.single(TokenKind::Dot),
            Some(':') => self.single(TokenKind::Colon),
            Some(';') => self.single(TokenKind::Semi),
            Some('+') => self.with_eq(TokenKind::Plus, TokenKind::PlusEq),
            Some('-') => self.with_eq(TokenKind::Minus, TokenKind::MinusEq),
            Some('%') => self.with_eq(TokenKind::Percent, TokenKind::PercentEq),
            Some('=') => self.with_eq(TokenKind::Eq, TokenKind::EqEq),
            Some('<') => self.with_eq(TokenKind::Lt, TokenKind::LtEq),
            Some('>') => self.with_eq(TokenKind::Gt, TokenKind::GtEq),
            Some('*') => {
                self.bump();
                if self.current == Some('*') {
                    self.bump();
                    self.push_token(TokenKind::StarStar, start, self.offset);
                } else if self.current == Some('=') {
                    self.bump();
                    self.push_token(TokenKind::StarEq, start, self.offset);
                } else {
                    self.push_token(TokenKind::Star, start, self.offset);
                }
            }
            Some('/') => {
                self.bump();
                if self.current == Some('/') {
                    self.bump();
                    if self.current == Some('=') {
                        self.bump();
                        self.push_token(TokenKind::SlashSlashEq, start, self.offset);
                    } else {
                        self.push_token(TokenKind::SlashSlash, start, self.offset);
                    }
                } else if self.current == Some('=') {
                    self.bump();
                    self.push_token(TokenKind::SlashEq, start, self.offset);
                } else {
                    self.push_token(TokenKind::Slash, start, self.offset);
                }
            }
            Some('!') => {
                self.bump();
                if self.current == Some('=') {
                    self.bump();
                    self.push_token(TokenKind::BangEq, start, self.offset);
                } else {
                    self.error(start, self.offset, "invalid syntax");
                }
            }
            Some(ch) => {
                self.bump();
                self.error(start, self.offset, format!("invalid character '{}'", ch));
            }
            None => {}
        }
    }

    fn single(&mut self, kind: TokenKind) {
        let start = self.offset;
        self.bump();
        self.push_token(kind, start, self.offset);
    }

    fn with_eq(&mut self, plain: TokenKind, with_eq: TokenKind) {
        let start = self.offset;
        self.bump();
        if self.current == Some('=') {
            self.bump();
            self.push_token(with_eq, start, self.offset);
        } else {
            self.push_token(plain, start, self.offset);
        }
    }

    fn open(&mut self, kind: TokenKind) {
        self.nesting += 1;
        self.single(kind);
    }

    fn close(&mut self, kind: TokenKind) {
        self.nesting = self.nesting.saturating_sub(1);
        self.single(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .expect("lex")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn indentation_produces_block_tokens() {
        let tokens = kinds("if x:\n    y\nz\n");
        assert_eq!(
            tokens,
            vec![
                TokenKind::If,
                TokenKind::Identifier("x".into()),
                TokenKind::Colon,
                TokenKind::Newline,
                TokenKind::Indent,
                TokenKind::Identifier("y".into()),
                TokenKind::Newline,
                TokenKind::Dedent,
                TokenKind::Identifier("z".into()),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn newlines_inside_brackets_are_ignored() {
        let tokens = kinds("[1,\n 2]");
        assert!(!tokens[..tokens.len() - 2].contains(&TokenKind::Newline));
    }

    #[test]
    fn numbers_cover_floats_and_imaginaries() {
        assert_eq!(
            kinds("1. .5 2e3 3j")[..4],
            [
                TokenKind::Float(1.0),
                TokenKind::Float(0.5),
                TokenKind::Float(2000.0),
                TokenKind::Imaginary(3.0),
            ]
        );
    }

    #[test]
    fn string_prefixes_and_escapes() {
        assert_eq!(
            kinds(r"b'a\x00' 'x\ty' r'\n'")[..3],
            [
                TokenKind::Bytes(vec![b'a', 0]),
                TokenKind::String("x\ty".into()),
                TokenKind::String("\\n".into()),
            ]
        );
    }

    #[test]
    fn octal_newline_escape() {
        assert_eq!(kinds(r"'\012'")[0], TokenKind::String("\n".into()));
    }

    #[test]
    fn bad_dedent_is_an_error() {
        let errors = lex("if x:\n        y\n    z\n").unwrap_err();
        assert!(errors[0].message.contains("unindent"));
    }

    #[test]
    fn indentation_depth_is_capped() {
        let nested = |levels: usize| {
            (0..levels)
                .map(|level| format!("{}if x:\n", " ".repeat(level)))
                .collect::<String>()
                + &" ".repeat(levels)
                + "pass\n"
        };
        assert!(lex(&nested(MAX_INDENT_LEVELS - 1)).is_ok());
        let errors = lex(&nested(MAX_INDENT_LEVELS + 1)).unwrap_err();
        assert_eq!(errors[0].message, "too many levels of indentation");
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(lex("'abc").is_err());
    }
}
