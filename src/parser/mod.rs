//=============================================
// aml/parser.rs
//=============================================
// Author: AML Contributors
// License: MIT
// Goal: AML recursive descent parser implementation
// Objective: Transform token streams into AST nodes consumed by the interpreter
//=============================================

use crate::ast::{
    AssignTarget, BinaryOp, Expr, ImportEntry, Literal, Parameter, Program, Span, Stmt, UnaryOp,
};
use crate::tokenizer::{Position, Token, TokenKind};

/// Parser error types
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    UnexpectedToken {
        expected: String,
        found: TokenKind,
        position: Position,
    },
    UnexpectedEndOfInput {
        expected: String,
        position: Position,
    },
    InvalidSyntax {
        message: String,
        position: Position,
    },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::UnexpectedToken {
                expected,
                found,
                position,
            } => {
                write!(
                    f,
                    "Expected {} but found {} at {}",
                    expected,
                    found.describe(),
                    position
                )
            }
            ParseError::UnexpectedEndOfInput { expected, position } => {
                write!(f, "Unexpected end of input, expected {} at {}", expected, position)
            }
            ParseError::InvalidSyntax { message, position } => {
                write!(f, "Invalid syntax: {} at {}", message, position)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Recursive descent parser for AML.
///
/// Single pass with bounded lookahead; aborts on the first syntax error.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    expr_depth: usize,
}

const MAX_EXPRESSION_DEPTH: usize = 2048;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            expr_depth: 0,
        }
    }

    //=============================================
    //            Token Navigation
    //=============================================

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.current)
            .unwrap_or_else(|| self.tokens.last().expect("token stream always ends with EOF"))
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_next_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.current + 1).map(|t| &t.kind)
    }

    fn current_position(&self) -> Position {
        self.peek().position.clone()
    }

    fn previous_position(&self) -> Position {
        self.tokens
            .get(self.current.saturating_sub(1))
            .map(|t| t.position.clone())
            .unwrap_or_else(|| self.current_position())
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.peek_kind() == &kind {
            Ok(self.advance())
        } else if self.is_at_end() {
            Err(ParseError::UnexpectedEndOfInput {
                expected: expected.into(),
                position: self.current_position(),
            })
        } else {
            Err(ParseError::UnexpectedToken {
                expected: expected.into(),
                found: self.peek_kind().clone(),
                position: self.current_position(),
            })
        }
    }

    fn expect_identifier(&mut self, expected: &str) -> Result<String, ParseError> {
        match self.peek_kind() {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            TokenKind::Eof => Err(ParseError::UnexpectedEndOfInput {
                expected: expected.into(),
                position: self.current_position(),
            }),
            other => Err(ParseError::UnexpectedToken {
                expected: expected.into(),
                found: other.clone(),
                position: self.current_position(),
            }),
        }
    }

    fn span_from(&self, start: Position) -> Span {
        Span::new(start, self.previous_position())
    }

    //=============================================
    //            Statement Parsing
    //=============================================

    /// Parse a complete AML program.
    pub fn parse(&mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }
        Ok(Program::new(statements))
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek_kind() {
            TokenKind::Var => self.parse_var_declaration(),
            TokenKind::Func => self.parse_func_declaration(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Break => {
                let start = self.current_position();
                self.advance();
                Ok(Stmt::Break {
                    span: self.span_from(start),
                })
            }
            TokenKind::Continue => {
                let start = self.current_position();
                self.advance();
                Ok(Stmt::Continue {
                    span: self.span_from(start),
                })
            }
            TokenKind::Namespace => self.parse_namespace(),
            TokenKind::ImportPy => self.parse_import(true),
            TokenKind::ImportAml => self.parse_import(false),
            TokenKind::Try => self.parse_try_catch(),
            TokenKind::Raise => self.parse_raise(),
            TokenKind::Meta => self.parse_meta(),
            TokenKind::Parallel => self.parse_parallel(),
            _ => self.parse_expression_or_assignment(),
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut body = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::RBrace | TokenKind::Eof) {
            body.push(self.parse_statement()?);
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(body)
    }

    fn parse_var_declaration(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current_position();
        self.advance(); // var
        let name = self.expect_identifier("variable name")?;
        self.expect(TokenKind::Assign, "'=' after variable name")?;
        let value = self.parse_expression()?;
        Ok(Stmt::VarDecl {
            name,
            value,
            span: self.span_from(start),
        })
    }

    fn parse_func_declaration(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current_position();
        self.advance(); // func
        let name = self.expect_identifier("function name")?;
        self.expect(TokenKind::LParen, "'(' after function name")?;
        let params = self.parse_parameter_list()?;
        let body = self.parse_block()?;
        Ok(Stmt::FuncDecl {
            name,
            params,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_parameter_list(&mut self) -> Result<Vec<Parameter>, ParseError> {
        let mut params = Vec::new();
        if !self.matches(&TokenKind::RParen) {
            loop {
                let name = self.expect_identifier("parameter name")?;
                let default = if self.matches(&TokenKind::Assign) {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                params.push(Parameter { name, default });
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen, "')' after parameters")?;
        }
        Ok(params)
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current_position();
        self.advance(); // if
        let condition = self.parse_expression()?;
        let then_body = self.parse_block()?;
        let else_body = if self.matches(&TokenKind::Else) {
            if matches!(self.peek_kind(), TokenKind::If) {
                // `else if` chains nest as a single-statement else body.
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_body,
            else_body,
            span: self.span_from(start),
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current_position();
        self.advance(); // while
        let condition = self.parse_expression()?;
        let body = self.parse_block()?;
        Ok(Stmt::While {
            condition,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current_position();
        self.advance(); // for
        let var = self.expect_identifier("loop variable")?;
        self.expect(TokenKind::In, "'in'")?;
        let iterable = self.parse_expression()?;
        let body = self.parse_block()?;
        Ok(Stmt::ForIn {
            var,
            iterable,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current_position();
        self.advance(); // return
        // A return directly before `}` carries no value.
        let value = if matches!(self.peek_kind(), TokenKind::RBrace | TokenKind::Eof) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        Ok(Stmt::Return {
            value,
            span: self.span_from(start),
        })
    }

    fn parse_namespace(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current_position();
        self.advance(); // namespace
        let name = self.expect_identifier("namespace name")?;
        let body = self.parse_block()?;
        Ok(Stmt::NamespaceDecl {
            name,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_import(&mut self, python: bool) -> Result<Stmt, ParseError> {
        let start = self.current_position();
        self.advance(); // import_py / import_aml
        self.expect(TokenKind::LBrace, "'{' after import keyword")?;
        let mut entries = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::RBrace | TokenKind::Eof) {
            entries.push(self.parse_import_entry()?);
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "'}' closing import block")?;
        let span = self.span_from(start);
        if python {
            Ok(Stmt::ImportPy { entries, span })
        } else {
            Ok(Stmt::ImportAml { entries, span })
        }
    }

    fn parse_import_entry(&mut self) -> Result<ImportEntry, ParseError> {
        // Module path: dotted identifiers (`plugins.console`) or a string literal.
        let module = match self.peek_kind() {
            TokenKind::Str(path) => {
                let path = path.clone();
                self.advance();
                path
            }
            _ => {
                let mut path = self.expect_identifier("module name")?;
                while self.matches(&TokenKind::Dot) {
                    path.push('.');
                    path.push_str(&self.expect_identifier("module path segment")?);
                }
                path
            }
        };
        let alias = if self.matches(&TokenKind::As) {
            Some(self.expect_identifier("import alias")?)
        } else {
            None
        };
        Ok(ImportEntry { module, alias })
    }

    fn parse_try_catch(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current_position();
        self.advance(); // try
        let try_body = self.parse_block()?;
        self.expect(TokenKind::Catch, "'catch' after try block")?;
        // Optional explicit binding: `catch (name) { }`; defaults to `error`.
        let error_name = if self.matches(&TokenKind::LParen) {
            let name = self.expect_identifier("catch binding name")?;
            self.expect(TokenKind::RParen, "')' after catch binding")?;
            Some(name)
        } else {
            None
        };
        let catch_body = self.parse_block()?;
        Ok(Stmt::TryCatch {
            try_body,
            error_name,
            catch_body,
            span: self.span_from(start),
        })
    }

    fn parse_raise(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current_position();
        self.advance(); // raise
        let value = self.parse_expression()?;
        Ok(Stmt::Raise {
            value,
            span: self.span_from(start),
        })
    }

    fn parse_meta(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current_position();
        self.advance(); // meta
        self.expect(TokenKind::LBrace, "'{' after meta")?;
        let mut entries = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::RBrace | TokenKind::Eof) {
            let key = match self.peek_kind() {
                TokenKind::Str(key) => {
                    let key = key.clone();
                    self.advance();
                    key
                }
                _ => self.expect_identifier("metadata key")?,
            };
            self.expect(TokenKind::Colon, "':' after metadata key")?;
            let value = self.parse_expression()?;
            entries.push((key, value));
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "'}' closing meta block")?;
        Ok(Stmt::Meta {
            entries,
            span: self.span_from(start),
        })
    }

    fn parse_parallel(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current_position();
        self.advance(); // parallel
        self.expect(TokenKind::LBrace, "'{' after parallel")?;
        let mut calls = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::RBrace | TokenKind::Eof) {
            let position = self.current_position();
            let expr = self.parse_expression()?;
            match expr {
                Expr::Call { .. } => calls.push(expr),
                _ => {
                    return Err(ParseError::InvalidSyntax {
                        message: "parallel blocks may contain only function calls".into(),
                        position,
                    });
                }
            }
        }
        self.expect(TokenKind::RBrace, "'}' closing parallel block")?;
        Ok(Stmt::Parallel {
            calls,
            span: self.span_from(start),
        })
    }

    fn parse_expression_or_assignment(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current_position();
        let expr = self.parse_expression()?;
        if self.matches(&TokenKind::Assign) {
            let target = Self::expr_into_assign_target(expr, &start)?;
            let value = self.parse_expression()?;
            return Ok(Stmt::Assign {
                target,
                value,
                span: self.span_from(start),
            });
        }
        Ok(Stmt::ExprStmt {
            expr,
            span: self.span_from(start),
        })
    }

    fn expr_into_assign_target(expr: Expr, position: &Position) -> Result<AssignTarget, ParseError> {
        match expr {
            Expr::Identifier { name, .. } => Ok(AssignTarget::Variable(name)),
            Expr::Index {
                container, index, ..
            } => Ok(AssignTarget::Index { container, index }),
            Expr::Member {
                object, property, ..
            } => Ok(AssignTarget::Member {
                object,
                property,
            }),
            _ => Err(ParseError::InvalidSyntax {
                message: "invalid assignment target".into(),
                position: position.clone(),
            }),
        }
    }

    //=============================================
    //            Expression Parsing
    //=============================================

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.expr_depth += 1;
        if self.expr_depth > MAX_EXPRESSION_DEPTH {
            self.expr_depth -= 1;
            return Err(ParseError::InvalidSyntax {
                message: "expression nesting too deep".into(),
                position: self.current_position(),
            });
        }
        let result = self.parse_or();
        self.expr_depth -= 1;
        result
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let start = self.current_position();
        let mut left = self.parse_and()?;
        while self.matches(&TokenKind::OrOr) {
            let right = self.parse_and()?;
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start.clone()),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let start = self.current_position();
        let mut left = self.parse_equality()?;
        while self.matches(&TokenKind::AndAnd) {
            let right = self.parse_equality()?;
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start.clone()),
            };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let start = self.current_position();
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqualEqual => BinaryOp::Equal,
                TokenKind::NotEqual => BinaryOp::NotEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start.clone()),
            };
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let start = self.current_position();
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Less => BinaryOp::Less,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::LessEqual => BinaryOp::LessEqual,
                TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start.clone()),
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let start = self.current_position();
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start.clone()),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let start = self.current_position();
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Percent => BinaryOp::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start.clone()),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let start = self.current_position();
        let op = match self.peek_kind() {
            TokenKind::Not => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Minus),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                span: self.span_from(start),
            });
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let start = self.current_position();
        let base = self.parse_postfix()?;
        if self.matches(&TokenKind::Power) {
            // Right associative; the exponent may itself be unary (`2 ** -3`).
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary {
                op: BinaryOp::Power,
                left: Box::new(base),
                right: Box::new(exponent),
                span: self.span_from(start),
            });
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let start = self.current_position();
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::LParen => {
                    self.advance();
                    let (args, kwargs) = self.parse_call_arguments()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        kwargs,
                        span: self.span_from(start.clone()),
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RBracket, "']' closing index")?;
                    expr = Expr::Index {
                        container: Box::new(expr),
                        index: Box::new(index),
                        span: self.span_from(start.clone()),
                    };
                }
                TokenKind::Dot => {
                    self.advance();
                    let property = self.expect_identifier("member name after '.'")?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property,
                        span: self.span_from(start.clone()),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_call_arguments(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), ParseError> {
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        if self.matches(&TokenKind::RParen) {
            return Ok((args, kwargs));
        }
        loop {
            // `name = expr` is a keyword argument; bounded two-token lookahead.
            let is_kwarg = matches!(self.peek_kind(), TokenKind::Identifier(_))
                && matches!(self.peek_next_kind(), Some(TokenKind::Assign));
            if is_kwarg {
                let name = self.expect_identifier("keyword argument name")?;
                self.advance(); // =
                let value = self.parse_expression()?;
                kwargs.push((name, value));
            } else {
                if !kwargs.is_empty() {
                    return Err(ParseError::InvalidSyntax {
                        message: "positional argument after keyword argument".into(),
                        position: self.current_position(),
                    });
                }
                args.push(self.parse_expression()?);
            }
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')' closing argument list")?;
        Ok((args, kwargs))
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let start = self.current_position();
        match self.peek_kind().clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Number(n),
                    span: self.span_from(start),
                })
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Str(s),
                    span: self.span_from(start),
                })
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Bool(true),
                    span: self.span_from(start),
                })
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Bool(false),
                    span: self.span_from(start),
                })
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Null,
                    span: self.span_from(start),
                })
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expr::Identifier {
                    name,
                    span: self.span_from(start),
                })
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LBracket => self.parse_list_or_comprehension(),
            TokenKind::LBrace => self.parse_dict_or_comprehension(),
            TokenKind::Spawn => self.parse_spawn(),
            TokenKind::Eof => Err(ParseError::UnexpectedEndOfInput {
                expected: "expression".into(),
                position: start,
            }),
            other => Err(ParseError::UnexpectedToken {
                expected: "expression".into(),
                found: other,
                position: start,
            }),
        }
    }

    fn parse_spawn(&mut self) -> Result<Expr, ParseError> {
        let start = self.current_position();
        self.advance(); // spawn
        let position = self.current_position();
        let call = self.parse_postfix()?;
        if !matches!(call, Expr::Call { .. }) {
            return Err(ParseError::InvalidSyntax {
                message: "spawn requires a function call".into(),
                position,
            });
        }
        Ok(Expr::Spawn {
            call: Box::new(call),
            span: self.span_from(start),
        })
    }

    fn parse_list_or_comprehension(&mut self) -> Result<Expr, ParseError> {
        let start = self.current_position();
        self.advance(); // [
        if self.matches(&TokenKind::RBracket) {
            return Ok(Expr::ListLit {
                elements: Vec::new(),
                span: self.span_from(start),
            });
        }
        let first = self.parse_expression()?;
        if self.matches(&TokenKind::For) {
            let (var, iterable, condition) = self.parse_comprehension_tail()?;
            self.expect(TokenKind::RBracket, "']' closing comprehension")?;
            return Ok(Expr::ListComprehension {
                element: Box::new(first),
                var,
                iterable: Box::new(iterable),
                condition,
                span: self.span_from(start),
            });
        }
        let mut elements = vec![first];
        while self.matches(&TokenKind::Comma) {
            if matches!(self.peek_kind(), TokenKind::RBracket) {
                break; // trailing comma
            }
            elements.push(self.parse_expression()?);
        }
        self.expect(TokenKind::RBracket, "']' closing list literal")?;
        Ok(Expr::ListLit {
            elements,
            span: self.span_from(start),
        })
    }

    fn parse_dict_or_comprehension(&mut self) -> Result<Expr, ParseError> {
        let start = self.current_position();
        self.advance(); // {
        if self.matches(&TokenKind::RBrace) {
            return Ok(Expr::DictLit {
                entries: Vec::new(),
                span: self.span_from(start),
            });
        }
        let first_key = self.parse_expression()?;
        self.expect(TokenKind::Colon, "':' after dict key")?;
        let first_value = self.parse_expression()?;
        if self.matches(&TokenKind::For) {
            let (var, iterable, condition) = self.parse_comprehension_tail()?;
            self.expect(TokenKind::RBrace, "'}' closing comprehension")?;
            return Ok(Expr::DictComprehension {
                key: Box::new(first_key),
                value: Box::new(first_value),
                var,
                iterable: Box::new(iterable),
                condition,
                span: self.span_from(start),
            });
        }
        let mut entries = vec![(first_key, first_value)];
        while self.matches(&TokenKind::Comma) {
            if matches!(self.peek_kind(), TokenKind::RBrace) {
                break; // trailing comma
            }
            let key = self.parse_expression()?;
            self.expect(TokenKind::Colon, "':' after dict key")?;
            let value = self.parse_expression()?;
            entries.push((key, value));
        }
        self.expect(TokenKind::RBrace, "'}' closing dict literal")?;
        Ok(Expr::DictLit {
            entries,
            span: self.span_from(start),
        })
    }

    /// `for <name> in <expr> [if <expr>]` shared by both comprehension forms.
    fn parse_comprehension_tail(
        &mut self,
    ) -> Result<(String, Expr, Option<Box<Expr>>), ParseError> {
        let var = self.expect_identifier("comprehension variable")?;
        self.expect(TokenKind::In, "'in'")?;
        let iterable = self.parse_expression()?;
        let condition = if self.matches(&TokenKind::If) {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        Ok((var, iterable, condition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Tokenizer;

    fn parse(source: &str) -> Program {
        let tokens = Tokenizer::new(source).tokenize().expect("tokenize");
        Parser::new(tokens).parse().expect("parse")
    }

    fn parse_err(source: &str) -> ParseError {
        let tokens = Tokenizer::new(source).tokenize().expect("tokenize");
        Parser::new(tokens).parse().unwrap_err()
    }

    #[test]
    fn var_declaration_and_precedence() {
        let program = parse("var x = 1 + 2 * 3");
        let Stmt::VarDecl { name, value, .. } = &program.statements[0] else {
            panic!("expected var declaration");
        };
        assert_eq!(name, "x");
        // Multiplication binds tighter than addition.
        let Expr::Binary { op, right, .. } = value else {
            panic!("expected binary expression");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(
            **right,
            Expr::Binary {
                op: BinaryOp::Multiply,
                ..
            }
        ));
    }

    #[test]
    fn function_with_default_parameter() {
        let program = parse("func greet(name, prefix = \"hi\") { return prefix + name }");
        let Stmt::FuncDecl { params, .. } = &program.statements[0] else {
            panic!("expected function declaration");
        };
        assert_eq!(params.len(), 2);
        assert!(params[0].default.is_none());
        assert!(params[1].default.is_some());
    }

    #[test]
    fn call_with_keyword_arguments() {
        let program = parse("move(10, speed = 3, curve = \"ease\")");
        let Stmt::ExprStmt {
            expr: Expr::Call { args, kwargs, .. },
            ..
        } = &program.statements[0]
        else {
            panic!("expected call statement");
        };
        assert_eq!(args.len(), 1);
        assert_eq!(kwargs.len(), 2);
        assert_eq!(kwargs[0].0, "speed");
    }

    #[test]
    fn positional_after_keyword_is_rejected() {
        let err = parse_err("f(a = 1, 2)");
        assert!(matches!(err, ParseError::InvalidSyntax { .. }));
    }

    #[test]
    fn dotted_and_indexed_assignment_targets() {
        let program = parse("ns.config[\"retries\"] = 3");
        let Stmt::Assign { target, .. } = &program.statements[0] else {
            panic!("expected assignment");
        };
        assert!(matches!(target, AssignTarget::Index { .. }));
    }

    #[test]
    fn else_if_chain_nests() {
        let program = parse("if a { f() } else if b { g() } else { h() }");
        let Stmt::If { else_body, .. } = &program.statements[0] else {
            panic!("expected if");
        };
        let chained = else_body.as_ref().expect("else body");
        assert!(matches!(chained[0], Stmt::If { .. }));
    }

    #[test]
    fn list_comprehension_with_filter() {
        let program = parse("var evens = [x * x for x in nums if x % 2 == 0]");
        let Stmt::VarDecl { value, .. } = &program.statements[0] else {
            panic!("expected var declaration");
        };
        assert!(matches!(
            value,
            Expr::ListComprehension {
                condition: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn dict_comprehension_parses() {
        let program = parse("var m = {k: k * 2 for k in keys}");
        let Stmt::VarDecl { value, .. } = &program.statements[0] else {
            panic!("expected var declaration");
        };
        assert!(matches!(value, Expr::DictComprehension { .. }));
    }

    #[test]
    fn import_blocks_with_aliases() {
        let program = parse("import_py { console, plugins.timing as clock }");
        let Stmt::ImportPy { entries, .. } = &program.statements[0] else {
            panic!("expected import_py");
        };
        assert_eq!(entries[0].module, "console");
        assert_eq!(entries[1].module, "plugins.timing");
        assert_eq!(entries[1].binding_name(), "clock");
    }

    #[test]
    fn parallel_rejects_non_calls() {
        let err = parse_err("parallel { 1 + 2 }");
        assert!(matches!(err, ParseError::InvalidSyntax { .. }));
    }

    #[test]
    fn spawn_requires_call() {
        assert!(matches!(
            parse_err("var t = spawn 42"),
            ParseError::InvalidSyntax { .. }
        ));
        let program = parse("var t = spawn work(1, 2)");
        let Stmt::VarDecl { value, .. } = &program.statements[0] else {
            panic!("expected var declaration");
        };
        assert!(matches!(value, Expr::Spawn { .. }));
    }

    #[test]
    fn meta_block_entries() {
        let program = parse("meta { entry: \"app.main\", version: 2, notes: \"demo\" }");
        let Stmt::Meta { entries, .. } = &program.statements[0] else {
            panic!("expected meta block");
        };
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].0, "entry");
    }

    #[test]
    fn try_catch_with_named_binding() {
        let program = parse("try { risky() } catch (e) { log(e) }");
        let Stmt::TryCatch { error_name, .. } = &program.statements[0] else {
            panic!("expected try/catch");
        };
        assert_eq!(error_name.as_deref(), Some("e"));
    }

    #[test]
    fn error_reports_position() {
        let err = parse_err("var = 3");
        match err {
            ParseError::UnexpectedToken { position, .. } => {
                assert_eq!(position.line, 1);
                assert_eq!(position.column, 5);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
