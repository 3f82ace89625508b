use crate::language::{
    ast::*,
    errors::SyntaxError,
    lexer::lex,
    span::{line_of, Span},
    token::{Token, TokenKind},
};
use std::rc::Rc;

/// Deepest bracket, unary or power nesting an expression may have.
pub const MAX_NESTING: usize = 100;

/// Parses `source` as a single expression (or a bare tuple of expressions).
/// Leading whitespace is ignored, as is trailing blank space.
pub fn parse_expression(source: &str) -> Result<Expr, SyntaxError> {
    let trimmed = source.trim_start_matches([' ', '\t', '\r', '\n']);
    let offset = source.len() - trimmed.len();
    let mut parser = Parser::from_source(source, trimmed, offset)?;
    let expr = parser.parse_expr_list()?;
    while parser.matches(&TokenKind::Newline) {}
    if !parser.check(&TokenKind::Eof) {
        return Err(parser.error_here());
    }
    Ok(expr)
}

/// Parses `source` as a module body: a sequence of statements.
pub fn parse_statements(source: &str) -> Result<Vec<Stmt>, SyntaxError> {
    let mut parser = Parser::from_source(source, source, 0)?;
    parser.parse_module()
}

struct Parser<'a> {
    source: &'a str,
    offset: usize,
    tokens: Vec<Token>,
    pos: usize,
    nesting: usize,
}

impl<'a> Parser<'a> {
    fn from_source(source: &'a str, lexed: &str, offset: usize) -> Result<Self, SyntaxError> {
        let tokens = match lex(lexed) {
            Ok(tokens) => tokens,
            Err(errors) => {
                let error = errors
                    .into_iter()
                    .next()
                    .map(|err| SyntaxError::new(err.message, err.span.shifted(offset)))
                    .unwrap_or_else(|| SyntaxError::new("invalid syntax", Span::new(offset, offset)));
                return Err(error);
            }
        };
        let tokens = tokens
            .into_iter()
            .map(|token| Token {
                span: token.span.shifted(offset),
                kind: token.kind,
            })
            .collect();
        Ok(Self {
            source,
            offset,
            tokens,
            pos: 0,
            nesting: 0,
        })
    }

    fn parse_module(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mut body = Vec::new();
        while !self.check(&TokenKind::Eof) {
            if self.matches(&TokenKind::Newline) {
                continue;
            }
            body.extend(self.parse_statement()?);
        }
        Ok(body)
    }

    // ----- token helpers -------------------------------------------------

    fn current(&self) -> &Token {
        let idx = self.pos.min(self.tokens.len().saturating_sub(1));
        &self.tokens[idx]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, SyntaxError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self
                .error_here()
                .with_help(format!("expected {}", kind.describe())))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, SyntaxError> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error_here().with_help("expected a name")),
        }
    }

    fn error_here(&self) -> SyntaxError {
        let token = self.current();
        let message = match token.kind {
            TokenKind::Eof => "unexpected EOF while parsing",
            TokenKind::Indent => "unexpected indent",
            _ => "invalid syntax",
        };
        SyntaxError::new(message, token.span)
    }

    /// Runs `parse` one nesting level deeper, refusing to go past
    /// `MAX_NESTING` so deeply nested input cannot exhaust the stack.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, SyntaxError>,
    ) -> Result<T, SyntaxError> {
        if self.nesting >= MAX_NESTING {
            return Err(SyntaxError::new(
                "too many nested parentheses",
                self.current().span,
            ));
        }
        self.nesting += 1;
        let result = parse(self);
        self.nesting -= 1;
        result
    }

    fn line_at(&self, span: Span) -> u32 {
        line_of(self.source, span.start.max(self.offset))
    }

    fn stmt(&self, kind: StmtKind, span: Span) -> Stmt {
        Stmt {
            kind,
            line: self.line_at(span),
        }
    }

    // ----- statements ----------------------------------------------------

    fn parse_statement(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let span = self.current().span;
        match self.peek_kind() {
            TokenKind::If => self.parse_if().map(|stmt| vec![stmt]),
            TokenKind::While => {
                self.advance();
                let condition = self.parse_expr()?;
                self.expect(TokenKind::Colon)?;
                let body = self.parse_suite()?;
                Ok(vec![self.stmt(StmtKind::While { condition, body }, span)])
            }
            TokenKind::For => {
                self.advance();
                let target = self.parse_for_target()?;
                self.expect(TokenKind::In)?;
                let iterable = self.parse_expr_list()?;
                self.expect(TokenKind::Colon)?;
                let body = self.parse_suite()?;
                Ok(vec![self.stmt(
                    StmtKind::For {
                        target,
                        iterable,
                        body,
                    },
                    span,
                )])
            }
            TokenKind::Def => self.parse_def().map(|stmt| vec![stmt]),
            TokenKind::Indent | TokenKind::Dedent => Err(self.error_here()),
            _ => self.parse_simple_line(),
        }
    }

    fn parse_if(&mut self) -> Result<Stmt, SyntaxError> {
        let span = self.expect(TokenKind::If)?.span;
        let mut branches = Vec::new();
        let condition = self.parse_expr()?;
        self.expect(TokenKind::Colon)?;
        branches.push((condition, self.parse_suite()?));

        let mut orelse = Vec::new();
        loop {
            if self.matches(&TokenKind::Elif) {
                let condition = self.parse_expr()?;
                self.expect(TokenKind::Colon)?;
                branches.push((condition, self.parse_suite()?));
                continue;
            }
            if self.matches(&TokenKind::Else) {
                self.expect(TokenKind::Colon)?;
                orelse = self.parse_suite()?;
            }
            break;
        }
        Ok(self.stmt(StmtKind::If { branches, orelse }, span))
    }

    fn parse_def(&mut self) -> Result<Stmt, SyntaxError> {
        let span = self.expect(TokenKind::Def)?.span;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) {
            params.push(self.expect_identifier()?);
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Colon)?;
        let body = self.parse_suite()?;
        let def = FunctionDef { name, params, body };
        Ok(self.stmt(StmtKind::FunctionDef(Rc::new(def)), span))
    }

    fn parse_suite(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        if !self.matches(&TokenKind::Newline) {
            return self.parse_simple_line();
        }
        if !self.matches(&TokenKind::Indent) {
            return Err(SyntaxError::new("expected an indented block", self.current().span));
        }
        let mut body = Vec::new();
        while !self.matches(&TokenKind::Dedent) {
            if self.check(&TokenKind::Eof) {
                break;
            }
            if self.matches(&TokenKind::Newline) {
                continue;
            }
            body.extend(self.parse_statement()?);
        }
        Ok(body)
    }

    fn parse_simple_line(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mut stmts = vec![self.parse_small_statement()?];
        while self.matches(&TokenKind::Semi) {
            if self.check(&TokenKind::Newline) || self.check(&TokenKind::Eof) {
                break;
            }
            stmts.push(self.parse_small_statement()?);
        }
        if !self.matches(&TokenKind::Newline) && !self.check(&TokenKind::Eof) {
            return Err(self.error_here());
        }
        Ok(stmts)
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Newline | TokenKind::Semi | TokenKind::Eof
        )
    }

    fn parse_small_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let span = self.current().span;
        match self.peek_kind() {
            TokenKind::Pass => {
                self.advance();
                Ok(self.stmt(StmtKind::Pass, span))
            }
            TokenKind::Break => {
                self.advance();
                Ok(self.stmt(StmtKind::Break, span))
            }
            TokenKind::Continue => {
                self.advance();
                Ok(self.stmt(StmtKind::Continue, span))
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.at_statement_end() {
                    None
                } else {
                    Some(self.parse_expr_list()?)
                };
                Ok(self.stmt(StmtKind::Return(value), span))
            }
            TokenKind::Del => {
                self.advance();
                let expr = self.parse_expr_list()?;
                let targets = match self.to_target(expr)? {
                    Target::Unpack(targets) => targets,
                    target => vec![target],
                };
                Ok(self.stmt(StmtKind::Del(targets), span))
            }
            TokenKind::Print => {
                self.advance();
                let mut values = Vec::new();
                let mut newline = true;
                while !self.at_statement_end() {
                    values.push(self.parse_expr()?);
                    newline = true;
                    if !self.matches(&TokenKind::Comma) {
                        break;
                    }
                    newline = false;
                }
                Ok(self.stmt(StmtKind::Print { values, newline }, span))
            }
            _ => self.parse_expression_statement(span),
        }
    }

    fn parse_expression_statement(&mut self, span: Span) -> Result<Stmt, SyntaxError> {
        let first = self.parse_expr_list()?;

        if let Some(op) = self.augmented_op() {
            self.advance();
            let target = match self.to_target(first)? {
                Target::Unpack(_) => {
                    return Err(SyntaxError::new(
                        "illegal expression for augmented assignment",
                        span,
                    ))
                }
                target => target,
            };
            let value = self.parse_expr_list()?;
            return Ok(self.stmt(StmtKind::AugAssign { target, op, value }, span));
        }

        if !self.check(&TokenKind::Eq) {
            return Ok(self.stmt(StmtKind::Expr(first), span));
        }

        let mut exprs = vec![first];
        while self.matches(&TokenKind::Eq) {
            exprs.push(self.parse_expr_list()?);
        }
        let value = exprs.pop().ok_or_else(|| self.error_here())?;
        let targets = exprs
            .into_iter()
            .map(|expr| self.to_target(expr))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.stmt(StmtKind::Assign { targets, value }, span))
    }

    fn augmented_op(&self) -> Option<BinaryOp> {
        match self.peek_kind() {
            TokenKind::PlusEq => Some(BinaryOp::Add),
            TokenKind::MinusEq => Some(BinaryOp::Sub),
            TokenKind::StarEq => Some(BinaryOp::Mul),
            TokenKind::SlashEq => Some(BinaryOp::Div),
            TokenKind::SlashSlashEq => Some(BinaryOp::FloorDiv),
            TokenKind::PercentEq => Some(BinaryOp::Mod),
            _ => None,
        }
    }

    fn to_target(&self, expr: Expr) -> Result<Target, SyntaxError> {
        match expr.kind {
            ExprKind::Name(name) => Ok(Target::Name(name)),
            ExprKind::Subscript { value, index } => Ok(Target::Subscript {
                value: *value,
                index: *index,
            }),
            ExprKind::Attribute { value, name } => Ok(Target::Attribute { value: *value, name }),
            ExprKind::Tuple(items) | ExprKind::List(items) => items
                .into_iter()
                .map(|item| self.to_target(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Target::Unpack),
            ExprKind::Call { .. } => Err(SyntaxError::new(
                "can't assign to function call",
                expr.span,
            )),
            _ => Err(SyntaxError::new("can't assign to literal", expr.span)),
        }
    }

    fn parse_for_target(&mut self) -> Result<Target, SyntaxError> {
        let start = self.current().span;
        let mut items = vec![self.parse_arith()?];
        let mut tuple = false;
        while self.matches(&TokenKind::Comma) {
            tuple = true;
            if self.check(&TokenKind::In) {
                break;
            }
            items.push(self.parse_arith()?);
        }
        let expr = if tuple {
            let span = start.join(self.previous_span());
            Expr {
                kind: ExprKind::Tuple(items),
                span,
            }
        } else {
            items.remove(0)
        };
        self.to_target(expr)
    }

    fn previous_span(&self) -> Span {
        self.tokens
            .get(self.pos.saturating_sub(1))
            .map(|token| token.span)
            .unwrap_or_default()
    }

    // ----- expressions ---------------------------------------------------

    fn starts_expression(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Identifier(_)
                | TokenKind::Integer(_)
                | TokenKind::Float(_)
                | TokenKind::Imaginary(_)
                | TokenKind::String(_)
                | TokenKind::Bytes(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::None
                | TokenKind::Not
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::LParen
                | TokenKind::LBracket
                | TokenKind::LBrace
        )
    }

    fn parse_expr_list(&mut self) -> Result<Expr, SyntaxError> {
        let first = self.parse_expr()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let start = first.span;
        let mut items = vec![first];
        while self.matches(&TokenKind::Comma) {
            if !self.starts_expression() {
                break;
            }
            items.push(self.parse_expr()?);
        }
        Ok(Expr {
            kind: ExprKind::Tuple(items),
            span: start.join(self.previous_span()),
        })
    }

    fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.nested(Self::parse_conditional)
    }

    fn parse_conditional(&mut self) -> Result<Expr, SyntaxError> {
        let then_branch = self.parse_or()?;
        if !self.matches(&TokenKind::If) {
            return Ok(then_branch);
        }
        let condition = self.parse_or()?;
        self.expect(TokenKind::Else)?;
        let else_branch = self.parse_expr()?;
        let span = then_branch.span.join(else_branch.span);
        Ok(Expr {
            kind: ExprKind::Conditional {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            span,
        })
    }

    fn parse_or(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_and()?;
        while self.matches(&TokenKind::Or) {
            let right = self.parse_and()?;
            left = logical(left, LogicalOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_not()?;
        while self.matches(&TokenKind::And) {
            let right = self.parse_not()?;
            left = logical(left, LogicalOp::And, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, SyntaxError> {
        if self.check(&TokenKind::Not) {
            let start = self.advance().span;
            let operand = self.nested(Self::parse_not)?;
            let span = start.join(operand.span);
            return Ok(Expr {
                kind: ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                span,
            });
        }
        self.parse_comparison()
    }

    fn compare_op(&mut self) -> Option<CompareOp> {
        let op = match self.peek_kind() {
            TokenKind::EqEq => CompareOp::Eq,
            TokenKind::BangEq => CompareOp::NotEq,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::LtEq => CompareOp::LtEq,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::GtEq => CompareOp::GtEq,
            TokenKind::In => CompareOp::In,
            TokenKind::Not => {
                let next = self.tokens.get(self.pos + 1).map(|token| &token.kind);
                if next != Some(&TokenKind::In) {
                    return None;
                }
                self.advance();
                CompareOp::NotIn
            }
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn parse_comparison(&mut self) -> Result<Expr, SyntaxError> {
        let left = self.parse_arith()?;
        let mut rest = Vec::new();
        while let Some(op) = self.compare_op() {
            rest.push((op, self.parse_arith()?));
        }
        if rest.is_empty() {
            return Ok(left);
        }
        let span = rest
            .last()
            .map(|(_, expr)| left.span.join(expr.span))
            .unwrap_or(left.span);
        Ok(Expr {
            kind: ExprKind::Compare {
                left: Box::new(left),
                rest,
            },
            span,
        })
    }

    fn parse_arith(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::SlashSlash => BinaryOp::FloorDiv,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            _ => return self.parse_power(),
        };
        let start = self.advance().span;
        let operand = self.nested(Self::parse_factor)?;
        let span = start.join(operand.span);
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        })
    }

    fn parse_power(&mut self) -> Result<Expr, SyntaxError> {
        let base = self.parse_postfix()?;
        if self.matches(&TokenKind::StarStar) {
            let exponent = self.nested(Self::parse_factor)?;
            return Ok(binary(base, BinaryOp::Pow, exponent));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_atom()?;
        loop {
            if self.matches(&TokenKind::LParen) {
                let mut args = Vec::new();
                while !self.check(&TokenKind::RParen) {
                    args.push(self.parse_expr()?);
                    if !self.matches(&TokenKind::Comma) {
                        break;
                    }
                }
                let end = self.expect(TokenKind::RParen)?.span;
                let span = expr.span.join(end);
                expr = Expr {
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    span,
                };
            } else if self.matches(&TokenKind::LBracket) {
                let index = self.parse_expr_list()?;
                let end = self.expect(TokenKind::RBracket)?.span;
                let span = expr.span.join(end);
                expr = Expr {
                    kind: ExprKind::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                    },
                    span,
                };
            } else if self.matches(&TokenKind::Dot) {
                let name_span = self.current().span;
                let name = self.expect_identifier()?;
                let span = expr.span.join(name_span);
                expr = Expr {
                    kind: ExprKind::Attribute {
                        value: Box::new(expr),
                        name,
                    },
                    span,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.current().clone();
        let kind = match token.kind {
            TokenKind::Integer(value) => ExprKind::Int(value),
            TokenKind::Float(value) => ExprKind::Float(value),
            TokenKind::Imaginary(value) => ExprKind::Imaginary(value),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::None => ExprKind::None,
            TokenKind::Identifier(name) => ExprKind::Name(name),
            TokenKind::String(_) | TokenKind::Bytes(_) => return self.parse_string_run(),
            TokenKind::LParen => return self.parse_parenthesized(),
            TokenKind::LBracket => return self.parse_list_display(),
            TokenKind::LBrace => return self.parse_brace_display(),
            _ => return Err(self.error_here()),
        };
        self.advance();
        Ok(Expr {
            kind,
            span: token.span,
        })
    }

    /// Adjacent literals concatenate; mixing text and bytes is rejected.
    fn parse_string_run(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.current().span;
        let mut text: Option<String> = None;
        let mut bytes: Option<Vec<u8>> = None;
        loop {
            match self.peek_kind().clone() {
                TokenKind::String(part) if bytes.is_none() => {
                    text.get_or_insert_with(String::new).push_str(&part);
                }
                TokenKind::Bytes(part) if text.is_none() => {
                    bytes.get_or_insert_with(Vec::new).extend(part);
                }
                TokenKind::String(_) | TokenKind::Bytes(_) => {
                    return Err(SyntaxError::new(
                        "cannot mix bytes and nonbytes literals",
                        self.current().span,
                    ))
                }
                _ => break,
            }
            self.advance();
        }
        let span = start.join(self.previous_span());
        let kind = match (text, bytes) {
            (_, Some(bytes)) => ExprKind::Bytes(bytes),
            (text, None) => ExprKind::Str(text.unwrap_or_default()),
        };
        Ok(Expr { kind, span })
    }

    fn parse_parenthesized(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.expect(TokenKind::LParen)?.span;
        if self.check(&TokenKind::RParen) {
            let end = self.advance().span;
            return Ok(Expr {
                kind: ExprKind::Tuple(Vec::new()),
                span: start.join(end),
            });
        }
        let inner = self.parse_expr()?;
        if !self.check(&TokenKind::Comma) {
            self.expect(TokenKind::RParen)?;
            return Ok(inner);
        }
        let mut items = vec![inner];
        while self.matches(&TokenKind::Comma) {
            if self.check(&TokenKind::RParen) {
                break;
            }
            items.push(self.parse_expr()?);
        }
        let end = self.expect(TokenKind::RParen)?.span;
        Ok(Expr {
            kind: ExprKind::Tuple(items),
            span: start.join(end),
        })
    }

    fn parse_list_display(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.expect(TokenKind::LBracket)?.span;
        let mut items = Vec::new();
        while !self.check(&TokenKind::RBracket) {
            items.push(self.parse_expr()?);
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(TokenKind::RBracket)?.span;
        Ok(Expr {
            kind: ExprKind::List(items),
            span: start.join(end),
        })
    }

    fn parse_brace_display(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.expect(TokenKind::LBrace)?.span;
        if self.check(&TokenKind::RBrace) {
            let end = self.advance().span;
            return Ok(Expr {
                kind: ExprKind::Dict(Vec::new()),
                span: start.join(end),
            });
        }

        let first = self.parse_expr()?;
        if self.matches(&TokenKind::Colon) {
            let mut entries = vec![(first, self.parse_expr()?)];
            while self.matches(&TokenKind::Comma) {
                if self.check(&TokenKind::RBrace) {
                    break;
                }
                let key = self.parse_expr()?;
                self.expect(TokenKind::Colon)?;
                entries.push((key, self.parse_expr()?));
            }
            let end = self.expect(TokenKind::RBrace)?.span;
            return Ok(Expr {
                kind: ExprKind::Dict(entries),
                span: start.join(end),
            });
        }

        let mut items = vec![first];
        while self.matches(&TokenKind::Comma) {
            if self.check(&TokenKind::RBrace) {
                break;
            }
            items.push(self.parse_expr()?);
        }
        let end = self.expect(TokenKind::RBrace)?.span;
        Ok(Expr {
            kind: ExprKind::Set(items),
            span: start.join(end),
        })
    }
}

fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    let span = left.span.join(right.span);
    Expr {
        kind: ExprKind::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        span,
    }
}

fn logical(left: Expr, op: LogicalOp, right: Expr) -> Expr {
    let span = left.span.join(right.span);
    Expr {
        kind: ExprKind::Logical {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_is_not_an_expression() {
        assert!(parse_expression("x = 5").is_err());
        let body = parse_statements("x = 5").expect("statements");
        assert!(matches!(body[0].kind, StmtKind::Assign { .. }));
    }

    #[test]
    fn print_is_a_statement() {
        assert!(parse_expression("print('hi')").is_err());
        let body = parse_statements("print('hi')").expect("statements");
        assert!(matches!(
            &body[0].kind,
            StmtKind::Print { values, newline: true } if values.len() == 1
        ));
    }

    #[test]
    fn power_binds_tighter_than_unary_minus() {
        let expr = parse_expression("-2**2").expect("expr");
        assert!(matches!(
            expr.kind,
            ExprKind::Unary {
                op: UnaryOp::Neg,
                ..
            }
        ));
    }

    #[test]
    fn bare_commas_build_tuples() {
        let expr = parse_expression("1, 2,").expect("expr");
        assert!(matches!(expr.kind, ExprKind::Tuple(items) if items.len() == 2));
    }

    #[test]
    fn brace_displays_pick_dict_or_set() {
        assert!(matches!(
            parse_expression("{}").expect("dict").kind,
            ExprKind::Dict(_)
        ));
        assert!(matches!(
            parse_expression("{1: 2}").expect("dict").kind,
            ExprKind::Dict(_)
        ));
        assert!(matches!(
            parse_expression("{1, 2}").expect("set").kind,
            ExprKind::Set(_)
        ));
    }

    #[test]
    fn broken_def_reports_position() {
        let err = parse_statements("def f(:").unwrap_err();
        assert_eq!(err.message, "invalid syntax");
        assert_eq!(err.span.start, 6);
    }

    #[test]
    fn statement_lines_are_recorded() {
        let body = parse_statements("a = 1\n\nb = 2\nif a:\n    c = 3\n").expect("body");
        assert_eq!(body[0].line, 1);
        assert_eq!(body[1].line, 3);
        match &body[2].kind {
            StmtKind::If { branches, .. } => assert_eq!(branches[0].1[0].line, 5),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn incomplete_block_is_a_syntax_error() {
        let err = parse_statements("for i in x:").unwrap_err();
        assert!(err.message.contains("EOF") || err.message.contains("indented"));
    }

    #[test]
    fn deep_nesting_is_a_syntax_error() {
        crate::tests::with_session_stack(deep_nesting_cases);
    }

    fn deep_nesting_cases() {
        let depth = 10_000;
        let source = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        let err = parse_expression(&source).unwrap_err();
        assert_eq!(err.message, "too many nested parentheses");
        assert!(parse_statements(&source).is_err());

        let lists = format!("{}{}", "[".repeat(depth), "]".repeat(depth));
        assert!(parse_expression(&lists).is_err());
        assert!(parse_expression(&"-".repeat(depth)).is_err());
        assert!(parse_expression(&"not ".repeat(depth)).is_err());
        assert!(parse_expression(&"2 ** ".repeat(depth)).is_err());
    }

    #[test]
    fn nesting_below_the_cap_parses() {
        crate::tests::with_session_stack(nesting_below_cap_cases);
    }

    fn nesting_below_cap_cases() {
        let depth = MAX_NESTING - 2;
        let source = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert!(parse_expression(&source).is_ok());
        assert!(parse_expression(&format!("{}1", "-".repeat(depth))).is_ok());
    }

    #[test]
    fn expression_ignores_leading_whitespace() {
        assert!(parse_expression("   1 + 1   \n").is_ok());
    }
}
