//! Recursive descent parser
//!
//! Builds a [`Program`] from source text. Binary operators are parsed by
//! precedence climbing; everything else is one function per grammar rule.
//! Automatic semicolon insertion follows the usual rule: a missing `;` is
//! accepted before `}`, at end of input, or after a line break.

use std::rc::Rc;

use thiserror::Error;

use crate::error::{ErrorKind, ScriptError};
use crate::parser::ast::{
    BinaryOp, CatchClause, Declarator, Expr, ForInTarget, ForInit, FunctionDef, LogicalOp,
    Program, Stmt, SwitchCase, UnaryOp,
};
use crate::parser::lexer::{Lexer, SourcePos, Spanned, Token};
use crate::util::number_to_string;

/// Syntax error with the position it was detected at
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (line {line})")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl From<ParseError> for ScriptError {
    fn from(err: ParseError) -> Self {
        ScriptError::new(ErrorKind::SyntaxError, err.to_string())
    }
}

type ParseResult<T> = Result<T, ParseError>;

/// Deepest statement and expression nesting accepted
pub const MAX_NESTING_DEPTH: usize = 128;

/// Parse a complete script
pub fn parse_program(source: &str) -> ParseResult<Program> {
    let mut parser = Parser::new(source);
    let body = parser.parse_statements_until(&Token::Eof)?;
    let scope = parser.scopes.pop().unwrap_or_default();
    Ok(Program {
        body,
        var_names: scope.var_names,
        functions: scope.functions,
    })
}

/// Declarations collected for the function being parsed
#[derive(Default)]
struct FunctionScope {
    var_names: Vec<Rc<str>>,
    functions: Vec<Rc<FunctionDef>>,
    loop_depth: usize,
    breakable_depth: usize,
    uses_arguments: bool,
}

enum InfixOp {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Spanned,
    scopes: Vec<FunctionScope>,
    /// Cleared while parsing a `for` initializer so `in` ends the expression
    allow_in: bool,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_spanned();
        Parser {
            lexer,
            current,
            scopes: vec![FunctionScope::default()],
            allow_in: true,
            depth: 0,
        }
    }

    // ---- token helpers ----

    fn advance(&mut self) -> Spanned {
        let next = self.lexer.next_spanned();
        std::mem::replace(&mut self.current, next)
    }

    #[inline]
    fn check(&self, token: &Token) -> bool {
        self.current.token == *token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> ParseResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn error_at(&self, pos: SourcePos, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            line: pos.line,
            column: pos.column,
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        self.error_at(self.current.pos, message)
    }

    fn unexpected(&self) -> ParseError {
        match &self.current.token {
            Token::Error(message) => self.error(message.clone()),
            Token::Eof => self.error("unexpected end of input"),
            token => self.error(format!("unexpected token {}", describe(token))),
        }
    }

    fn expect_ident(&mut self) -> ParseResult<Rc<str>> {
        match &self.current.token {
            Token::Ident(name) => {
                let name: Rc<str> = Rc::from(name.as_str());
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Property name after `.` or in an object literal key position
    fn expect_property_name(&mut self) -> ParseResult<Rc<str>> {
        let name: Rc<str> = match &self.current.token {
            Token::Ident(name) => Rc::from(name.as_str()),
            token => match token.keyword_name() {
                Some(name) => Rc::from(name),
                None => return Err(self.unexpected()),
            },
        };
        self.advance();
        Ok(name)
    }

    fn consume_semicolon(&mut self) -> ParseResult<()> {
        if self.eat(&Token::Semicolon)
            || self.check(&Token::RBrace)
            || self.check(&Token::Eof)
            || self.current.newline_before
        {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn scope(&mut self) -> &mut FunctionScope {
        // the program scope is pushed in `new` and never popped while parsing
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    fn declare_var(&mut self, name: &Rc<str>) {
        let scope = self.scope();
        if !scope.var_names.iter().any(|n| n == name) {
            scope.var_names.push(Rc::clone(name));
        }
    }

    /// Run `f` with `in` allowed as an operator again
    fn with_in<T>(&mut self, f: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        let saved = std::mem::replace(&mut self.allow_in, true);
        let result = f(self);
        self.allow_in = saved;
        result
    }

    /// Run `f` one nesting level deeper
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        self.check_depth(1)?;
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Fail if `extra` more levels would exceed the nesting limit
    fn check_depth(&self, extra: usize) -> ParseResult<()> {
        if self.depth + extra > MAX_NESTING_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        Ok(())
    }

    // ---- statements ----

    fn parse_statements_until(&mut self, end: &Token) -> ParseResult<Vec<Stmt>> {
        let mut body = Vec::new();
        while !self.check(end) {
            if self.check(&Token::Eof) {
                return Err(self.unexpected());
            }
            body.push(self.parse_statement()?);
        }
        Ok(body)
    }

    fn parse_block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(&Token::LBrace)?;
        let body = self.parse_statements_until(&Token::RBrace)?;
        self.expect(&Token::RBrace)?;
        Ok(body)
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        self.nested(Self::parse_statement_kind)
    }

    fn parse_statement_kind(&mut self) -> ParseResult<Stmt> {
        match self.current.token {
            Token::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            Token::Semicolon => {
                self.advance();
                Ok(Stmt::Empty)
            }
            Token::Var | Token::Let | Token::Const => {
                self.advance();
                let decls = self.parse_declarations()?;
                self.consume_semicolon()?;
                Ok(Stmt::Var(decls))
            }
            Token::Function => {
                self.advance();
                let name = self.expect_ident()?;
                let def = self.parse_function_rest(Some(name), false)?;
                self.scope().functions.push(def);
                Ok(Stmt::Empty)
            }
            Token::If => self.parse_if(),
            Token::While => {
                self.advance();
                let test = self.parse_paren_expression()?;
                let body = self.parse_loop_body()?;
                Ok(Stmt::While(test, Box::new(body)))
            }
            Token::Do => {
                self.advance();
                let body = self.parse_loop_body()?;
                self.expect(&Token::While)?;
                let test = self.parse_paren_expression()?;
                // `do ... while (x)` may be followed by another statement on the same line
                self.eat(&Token::Semicolon);
                Ok(Stmt::DoWhile(Box::new(body), test))
            }
            Token::For => self.parse_for(),
            Token::Switch => self.parse_switch(),
            Token::Break => {
                self.advance();
                if self.scope().breakable_depth == 0 {
                    return Err(self.error("illegal break statement"));
                }
                self.consume_semicolon()?;
                Ok(Stmt::Break)
            }
            Token::Continue => {
                self.advance();
                if self.scope().loop_depth == 0 {
                    return Err(self.error("illegal continue statement"));
                }
                self.consume_semicolon()?;
                Ok(Stmt::Continue)
            }
            Token::Return => {
                if self.scopes.len() == 1 {
                    return Err(self.error("return not in function"));
                }
                self.advance();
                let value = if self.check(&Token::Semicolon)
                    || self.check(&Token::RBrace)
                    || self.check(&Token::Eof)
                    || self.current.newline_before
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume_semicolon()?;
                Ok(Stmt::Return(value))
            }
            Token::Throw => {
                self.advance();
                if self.current.newline_before {
                    return Err(self.error("illegal newline after throw"));
                }
                let value = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Throw(value))
            }
            Token::Try => self.parse_try(),
            Token::Debugger => {
                self.advance();
                self.consume_semicolon()?;
                Ok(Stmt::Empty)
            }
            _ => {
                let expr = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_declarations(&mut self) -> ParseResult<Vec<Declarator>> {
        let mut decls = Vec::new();
        loop {
            let name = self.expect_ident()?;
            self.declare_var(&name);
            let init = if self.eat(&Token::Eq) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            decls.push((name, init));
            if !self.eat(&Token::Comma) {
                return Ok(decls);
            }
        }
    }

    fn parse_paren_expression(&mut self) -> ParseResult<Expr> {
        self.expect(&Token::LParen)?;
        let expr = self.with_in(Self::parse_expression)?;
        self.expect(&Token::RParen)?;
        Ok(expr)
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        self.advance();
        let test = self.parse_paren_expression()?;
        let then = self.parse_statement()?;
        let otherwise = if self.eat(&Token::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If(test, Box::new(then), otherwise))
    }

    fn parse_loop_body(&mut self) -> ParseResult<Stmt> {
        let scope = self.scope();
        scope.loop_depth += 1;
        scope.breakable_depth += 1;
        let body = self.parse_statement();
        let scope = self.scope();
        scope.loop_depth -= 1;
        scope.breakable_depth -= 1;
        body
    }

    fn parse_for(&mut self) -> ParseResult<Stmt> {
        self.advance();
        self.expect(&Token::LParen)?;

        let saved = std::mem::replace(&mut self.allow_in, false);
        let init = if self.check(&Token::Semicolon) {
            Ok(None)
        } else if matches!(self.current.token, Token::Var | Token::Let | Token::Const) {
            self.advance();
            self.parse_declarations().map(|decls| Some(ForInit::Var(decls)))
        } else {
            self.parse_expression().map(|expr| Some(ForInit::Expr(expr)))
        };
        self.allow_in = saved;
        let init = init?;

        if self.check(&Token::In) {
            let target = match init {
                Some(ForInit::Var(mut decls)) if decls.len() == 1 && decls[0].1.is_none() => {
                    ForInTarget::Var(decls.remove(0).0)
                }
                Some(ForInit::Expr(expr)) if expr.is_reference() => ForInTarget::Expr(expr),
                _ => return Err(self.error("invalid left-hand side in for-in")),
            };
            self.advance();
            let object = self.with_in(Self::parse_expression)?;
            self.expect(&Token::RParen)?;
            let body = self.parse_loop_body()?;
            return Ok(Stmt::ForIn {
                target,
                object,
                body: Box::new(body),
            });
        }

        self.expect(&Token::Semicolon)?;
        let test = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&Token::Semicolon)?;
        let update = if self.check(&Token::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&Token::RParen)?;
        let body = self.parse_loop_body()?;
        Ok(Stmt::For {
            init,
            test,
            update,
            body: Box::new(body),
        })
    }

    fn parse_switch(&mut self) -> ParseResult<Stmt> {
        self.advance();
        let discriminant = self.parse_paren_expression()?;
        self.expect(&Token::LBrace)?;
        self.scope().breakable_depth += 1;
        let cases = self.parse_switch_cases();
        self.scope().breakable_depth -= 1;
        Ok(Stmt::Switch(discriminant, cases?))
    }

    fn parse_switch_cases(&mut self) -> ParseResult<Vec<SwitchCase>> {
        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.eat(&Token::RBrace) {
            let test = if self.eat(&Token::Case) {
                Some(self.parse_expression()?)
            } else if self.check(&Token::Default) {
                if seen_default {
                    return Err(self.error("more than one default clause in switch"));
                }
                seen_default = true;
                self.advance();
                None
            } else {
                return Err(self.unexpected());
            };
            self.expect(&Token::Colon)?;

            let mut body = Vec::new();
            while !matches!(
                self.current.token,
                Token::Case | Token::Default | Token::RBrace | Token::Eof
            ) {
                body.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        Ok(cases)
    }

    fn parse_try(&mut self) -> ParseResult<Stmt> {
        self.advance();
        let block = self.parse_block()?;

        let catch = if self.eat(&Token::Catch) {
            let param = if self.eat(&Token::LParen) {
                let name = self.expect_ident()?;
                self.expect(&Token::RParen)?;
                Some(name)
            } else {
                None
            };
            let body = self.parse_block()?;
            Some(CatchClause { param, body })
        } else {
            None
        };

        let finally = if self.eat(&Token::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };

        if catch.is_none() && finally.is_none() {
            return Err(self.error("missing catch or finally after try"));
        }
        Ok(Stmt::Try {
            block,
            catch,
            finally,
        })
    }

    fn parse_function_rest(
        &mut self,
        name: Option<Rc<str>>,
        is_expression: bool,
    ) -> ParseResult<Rc<FunctionDef>> {
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                params.push(self.expect_ident()?);
                if !self.eat(&Token::Comma) {
                    self.expect(&Token::RParen)?;
                    break;
                }
            }
        }

        self.expect(&Token::LBrace)?;
        self.scopes.push(FunctionScope::default());
        let body = self.with_in(|p| p.parse_statements_until(&Token::RBrace));
        let scope = self.scopes.pop().unwrap_or_default();
        let body = body?;
        self.expect(&Token::RBrace)?;

        Ok(Rc::new(FunctionDef {
            name,
            params,
            body,
            var_names: scope.var_names,
            functions: scope.functions,
            is_expression,
            uses_arguments: scope.uses_arguments,
        }))
    }

    // ---- expressions ----

    fn parse_expression(&mut self) -> ParseResult<Expr> {
        let first = self.parse_assignment()?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat(&Token::Comma) {
            exprs.push(self.parse_assignment()?);
        }
        Ok(Expr::Sequence(exprs))
    }

    fn parse_assignment(&mut self) -> ParseResult<Expr> {
        self.nested(Self::parse_assignment_kind)
    }

    fn parse_assignment_kind(&mut self) -> ParseResult<Expr> {
        let start = self.current.pos;
        let target = self.parse_conditional()?;

        let op = match self.current.token {
            Token::Eq => None,
            Token::PlusEq => Some(BinaryOp::Add),
            Token::MinusEq => Some(BinaryOp::Sub),
            Token::StarEq => Some(BinaryOp::Mul),
            Token::SlashEq => Some(BinaryOp::Div),
            Token::PercentEq => Some(BinaryOp::Mod),
            Token::StarStarEq => Some(BinaryOp::Exp),
            Token::LtLtEq => Some(BinaryOp::Shl),
            Token::GtGtEq => Some(BinaryOp::Shr),
            Token::GtGtGtEq => Some(BinaryOp::UShr),
            Token::AmpEq => Some(BinaryOp::BitAnd),
            Token::PipeEq => Some(BinaryOp::BitOr),
            Token::CaretEq => Some(BinaryOp::BitXor),
            _ => return Ok(target),
        };
        if !target.is_reference() {
            return Err(self.error_at(start, "invalid assignment target"));
        }
        self.advance();
        let value = self.parse_assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn parse_conditional(&mut self) -> ParseResult<Expr> {
        let test = self.parse_binary(1)?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }
        let then = self.with_in(Self::parse_assignment)?;
        self.expect(&Token::Colon)?;
        let otherwise = self.parse_assignment()?;
        Ok(Expr::Conditional(
            Box::new(test),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    /// Binding power and operator of the current token, if it is infix
    fn infix_op(&self) -> Option<(u8, InfixOp)> {
        use InfixOp::{Binary, Logical};
        let op = match self.current.token {
            Token::PipePipe => (1, Logical(LogicalOp::Or)),
            Token::AmpAmp => (2, Logical(LogicalOp::And)),
            Token::Pipe => (3, Binary(BinaryOp::BitOr)),
            Token::Caret => (4, Binary(BinaryOp::BitXor)),
            Token::Amp => (5, Binary(BinaryOp::BitAnd)),
            Token::EqEq => (6, Binary(BinaryOp::Eq)),
            Token::BangEq => (6, Binary(BinaryOp::NotEq)),
            Token::EqEqEq => (6, Binary(BinaryOp::StrictEq)),
            Token::BangEqEq => (6, Binary(BinaryOp::StrictNotEq)),
            Token::Lt => (7, Binary(BinaryOp::Lt)),
            Token::LtEq => (7, Binary(BinaryOp::LtEq)),
            Token::Gt => (7, Binary(BinaryOp::Gt)),
            Token::GtEq => (7, Binary(BinaryOp::GtEq)),
            Token::In if self.allow_in => (7, Binary(BinaryOp::In)),
            Token::LtLt => (8, Binary(BinaryOp::Shl)),
            Token::GtGt => (8, Binary(BinaryOp::Shr)),
            Token::GtGtGt => (8, Binary(BinaryOp::UShr)),
            Token::Plus => (9, Binary(BinaryOp::Add)),
            Token::Minus => (9, Binary(BinaryOp::Sub)),
            Token::Star => (10, Binary(BinaryOp::Mul)),
            Token::Slash => (10, Binary(BinaryOp::Div)),
            Token::Percent => (10, Binary(BinaryOp::Mod)),
            Token::StarStar => (11, Binary(BinaryOp::Exp)),
            _ => return None,
        };
        Some(op)
    }

    fn parse_binary(&mut self, min_prec: u8) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        let mut links = 0;
        loop {
            if self.check(&Token::InstanceOf) {
                return Err(self.error("instanceof is not supported"));
            }
            let Some((prec, op)) = self.infix_op() else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.advance();
            // `**` is right associative
            let next_prec = if matches!(op, InfixOp::Binary(BinaryOp::Exp)) {
                prec
            } else {
                prec + 1
            };
            links += 1;
            self.check_depth(links)?;
            let right = self.nested(|p| p.parse_binary(next_prec))?;
            left = match op {
                InfixOp::Binary(op) => Expr::Binary(op, Box::new(left), Box::new(right)),
                InfixOp::Logical(op) => Expr::Logical(op, Box::new(left), Box::new(right)),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let op = match self.current.token {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Plus,
            Token::Tilde => UnaryOp::BitNot,
            Token::TypeOf => UnaryOp::TypeOf,
            Token::Void => UnaryOp::Void,
            Token::Delete => UnaryOp::Delete,
            Token::PlusPlus | Token::MinusMinus => {
                let increment = self.advance().token == Token::PlusPlus;
                let start = self.current.pos;
                let target = self.nested(Self::parse_unary)?;
                if !target.is_reference() {
                    return Err(self.error_at(start, "invalid update target"));
                }
                return Ok(Expr::Update {
                    increment,
                    prefix: true,
                    target: Box::new(target),
                });
            }
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let start = self.current.pos;
        let expr = self.parse_call_member()?;
        let increment = match self.current.token {
            Token::PlusPlus if !self.current.newline_before => true,
            Token::MinusMinus if !self.current.newline_before => false,
            _ => return Ok(expr),
        };
        if !expr.is_reference() {
            return Err(self.error_at(start, "invalid update target"));
        }
        self.advance();
        Ok(Expr::Update {
            increment,
            prefix: false,
            target: Box::new(expr),
        })
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect(&Token::LParen)?;
        self.with_in(|p| {
            let mut args = Vec::new();
            if p.eat(&Token::RParen) {
                return Ok(args);
            }
            loop {
                args.push(p.parse_assignment()?);
                if !p.eat(&Token::Comma) {
                    p.expect(&Token::RParen)?;
                    return Ok(args);
                }
            }
        })
    }

    /// Parse `.name` or `[expr]` after `object`, if present
    fn parse_member_suffix(&mut self, object: Expr) -> ParseResult<Result<Expr, Expr>> {
        if self.eat(&Token::Dot) {
            let name = self.expect_property_name()?;
            return Ok(Ok(Expr::Member(Box::new(object), name)));
        }
        if self.eat(&Token::LBracket) {
            let index = self.with_in(Self::parse_expression)?;
            self.expect(&Token::RBracket)?;
            return Ok(Ok(Expr::Index(Box::new(object), Box::new(index))));
        }
        Ok(Err(object))
    }

    fn parse_call_member(&mut self) -> ParseResult<Expr> {
        let mut expr = if self.check(&Token::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        let mut links = 0;
        loop {
            links += 1;
            self.check_depth(links)?;
            if self.check(&Token::LParen) {
                let args = self.parse_arguments()?;
                expr = Expr::Call(Box::new(expr), args);
                continue;
            }
            match self.parse_member_suffix(expr)? {
                Ok(next) => expr = next,
                Err(done) => return Ok(done),
            }
        }
    }

    fn parse_new(&mut self) -> ParseResult<Expr> {
        self.advance();
        let mut callee = if self.check(&Token::New) {
            self.nested(Self::parse_new)?
        } else {
            self.parse_primary()?
        };
        let mut links = 0;
        loop {
            links += 1;
            self.check_depth(links)?;
            match self.parse_member_suffix(callee)? {
                Ok(next) => callee = next,
                Err(done) => {
                    callee = done;
                    break;
                }
            }
        }
        let args = if self.check(&Token::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New(Box::new(callee), args))
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let expr = match &self.current.token {
            Token::Number(n) => Expr::Number(*n),
            Token::String(s) => Expr::String(Rc::from(s.as_str())),
            Token::Ident(name) => {
                let is_arguments = name == "arguments";
                let expr = Expr::Ident(Rc::from(name.as_str()));
                if is_arguments {
                    self.scope().uses_arguments = true;
                }
                expr
            }
            Token::True => Expr::Bool(true),
            Token::False => Expr::Bool(false),
            Token::Null => Expr::Null,
            Token::This => Expr::This,
            Token::LParen => return self.parse_paren_expression(),
            Token::LBracket => return self.parse_array_literal(),
            Token::LBrace => return self.parse_object_literal(),
            Token::Function => {
                self.advance();
                let name = match &self.current.token {
                    Token::Ident(_) => Some(self.expect_ident()?),
                    _ => None,
                };
                return Ok(Expr::Function(self.parse_function_rest(name, true)?));
            }
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(expr)
    }

    fn parse_array_literal(&mut self) -> ParseResult<Expr> {
        self.advance();
        self.with_in(|p| {
            let mut elements = Vec::new();
            loop {
                if p.eat(&Token::RBracket) {
                    return Ok(Expr::Array(elements));
                }
                if p.eat(&Token::Comma) {
                    elements.push(None);
                    continue;
                }
                elements.push(Some(p.parse_assignment()?));
                if !p.eat(&Token::Comma) {
                    p.expect(&Token::RBracket)?;
                    return Ok(Expr::Array(elements));
                }
            }
        })
    }

    fn parse_object_literal(&mut self) -> ParseResult<Expr> {
        self.advance();
        self.with_in(|p| {
            let mut props = Vec::new();
            loop {
                if p.eat(&Token::RBrace) {
                    return Ok(Expr::Object(props));
                }
                let key: Rc<str> = match &p.current.token {
                    Token::String(s) => {
                        let key: Rc<str> = Rc::from(s.as_str());
                        p.advance();
                        key
                    }
                    Token::Number(n) => {
                        let key: Rc<str> = Rc::from(number_to_string(*n));
                        p.advance();
                        key
                    }
                    _ => p.expect_property_name()?,
                };
                p.expect(&Token::Colon)?;
                props.push((key, p.parse_assignment()?));
                if !p.eat(&Token::Comma) {
                    p.expect(&Token::RBrace)?;
                    return Ok(Expr::Object(props));
                }
            }
        })
    }
}

/// Short token description for error messages
fn describe(token: &Token) -> String {
    match token {
        Token::Ident(name) => format!("'{name}'"),
        Token::Number(n) => format!("'{}'", number_to_string(*n)),
        Token::String(_) => "string".to_string(),
        Token::Eof => "end of input".to_string(),
        Token::Error(message) => message.clone(),
        other => match other.keyword_name() {
            Some(name) => format!("'{name}'"),
            None => format!("{other:?}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_expr(source: &str) -> Expr {
        let program = parse_program(source).unwrap();
        match program.body.into_iter().next() {
            Some(Stmt::Expr(expr)) => expr,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expr("1 + 2 * 3");
        let Expr::Binary(BinaryOp::Add, left, right) = expr else {
            panic!("expected addition");
        };
        assert!(matches!(*left, Expr::Number(n) if n == 1.0));
        assert!(matches!(*right, Expr::Binary(BinaryOp::Mul, _, _)));
    }

    #[test]
    fn test_exponent_right_assoc() {
        let expr = parse_expr("2 ** 3 ** 2");
        let Expr::Binary(BinaryOp::Exp, _, right) = expr else {
            panic!("expected exponent");
        };
        assert!(matches!(*right, Expr::Binary(BinaryOp::Exp, _, _)));
    }

    #[test]
    fn test_hoisting_collected() {
        let program = parse_program("var a = 1; function f(x) { var b; } var a;").unwrap();
        assert_eq!(program.var_names.len(), 1);
        assert_eq!(program.functions.len(), 1);
        assert_eq!(&*program.var_names[0], "a");

        let f = &program.functions[0];
        assert_eq!(f.name.as_deref(), Some("f"));
        assert_eq!(f.params.len(), 1);
        assert_eq!(&*f.var_names[0], "b");
    }

    #[test]
    fn test_asi() {
        let program = parse_program("var a = 1\nvar b = 2\na + b").unwrap();
        assert_eq!(program.body.len(), 3);
    }

    #[test]
    fn test_return_newline() {
        let program = parse_program("(function () { return\n42 })").unwrap();
        let Some(Stmt::Expr(Expr::Function(def))) = program.body.first() else {
            panic!("expected function expression");
        };
        assert!(matches!(def.body[0], Stmt::Return(None)));
    }

    #[test]
    fn test_keyword_member_names() {
        let expr = parse_expr("o.default.new");
        assert!(matches!(expr, Expr::Member(_, ref name) if &**name == "new"));
    }

    #[test]
    fn test_for_in() {
        let program = parse_program("for (var k in o) {}").unwrap();
        assert!(matches!(
            program.body[0],
            Stmt::ForIn {
                target: ForInTarget::Var(_),
                ..
            }
        ));
    }

    #[test]
    fn test_new_with_member() {
        let expr = parse_expr("new a.B(1)");
        let Expr::New(callee, args) = expr else {
            panic!("expected new");
        };
        assert!(matches!(*callee, Expr::Member(..)));
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_syntax_errors() {
        for source in [
            "var = 1",
            "1 +",
            "return 1",
            "break",
            "(function () { continue; })",
            "1 = 2",
            "a instanceof b",
            "try {}",
            "{",
            "'unterminated",
        ] {
            assert!(parse_program(source).is_err(), "{source} should not parse");
        }
    }

    #[test]
    fn test_nesting_limit() {
        let ok = format!("{}1{}", "[".repeat(50), "]".repeat(50));
        assert!(parse_program(&ok).is_ok());

        for source in [
            format!("{}1{}", "[".repeat(300), "]".repeat(300)),
            format!("{}1{}", "(".repeat(50_000), ")".repeat(50_000)),
            format!("{}1", "-".repeat(50_000)),
            format!("{}{}", "{".repeat(1_000), "}".repeat(1_000)),
            format!("1{}", " + 1".repeat(1_000)),
            format!("f{}", "()".repeat(1_000)),
        ] {
            let err = parse_program(&source).unwrap_err();
            assert_eq!(err.message, "nesting too deep");
        }
    }

    #[test]
    fn test_error_line() {
        let err = parse_program("var a;\nvar b = ;").unwrap_err();
        assert_eq!(err.line, 2);
        let script: ScriptError = err.into();
        assert_eq!(script.name, "SyntaxError");
    }
}
