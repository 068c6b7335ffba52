//! Single pass, syntax directed translation of one class.
//!
//! The grammar is recognized by recursive descent and instructions are
//! emitted as soon as each construct is recognized:
//!
//! ```text
//! class          ::= "class" Name "{" classVarDec* subroutineDec* "}"
//! classVarDec    ::= ("static" | "field") type name ("," name)* ";"
//! subroutineDec  ::= ("constructor" | "function" | "method") ("void" | type)
//!                    name "(" parameterList ")" subroutineBody
//! parameterList  ::= (type name ("," type name)*)?
//! subroutineBody ::= "{" varDec* statements "}"
//! varDec         ::= "var" type name ("," name)* ";"
//! statements     ::= (let | if | while | do | return)*
//! expression     ::= term (op term)*
//! term           ::= int | string | keywordConst | name | name "[" expression "]"
//!                  | subroutineCall | "(" expression ")" | unaryOp term
//! subroutineCall ::= name "(" expressionList ")"
//!                  | (Name | name) "." name "(" expressionList ")"
//! ```
//!
//! Binary operators have no precedence; expressions associate to the left.

use std::format_args as f;

use tracing::{debug, trace};

use crate::{
    codegen::{
        labels::LabelSource,
        vm::{runtime, BinaryOp, Code, KeywordConst, Segment, UnaryOp},
    },
    error::{Error, ErrorKind},
    lexer::{self, extract, TokenStream},
    symbol_table::{
        self, ClassStorage, ClassTable, Resolved, SubroutineStorage, SubroutineTable,
    },
    token::{Spanned, Token, TokenKind},
};

type Result<T, E = Spanned<ErrorKind>> = std::result::Result<T, E>;

/// Translates the class in `src` into VM code.
///
/// `unit` only names the source in error messages. Labels are drawn from
/// `labels`, which must be shared by every unit of the same program.
pub fn translate(
    unit: &str,
    src: &str,
    labels: &mut dyn LabelSource,
) -> Result<CompiledUnit, Error> {
    let tokens =
        lexer::lex(src).map_err(|e| Error::new(unit, src, e.map(ErrorKind::from)))?;
    let mut translator = Translator::new(src, tokens, labels);
    let code = translator
        .compile_class()
        .map_err(|e| Error::new(unit, src, e))?;
    Ok(CompiledUnit {
        class_name: translator.class_name.into(),
        code,
    })
}

/// The VM code of a single class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledUnit {
    class_name: Box<str>,
    code: Code,
}

impl CompiledUnit {
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn code(&self) -> &Code {
        &self.code
    }

    pub fn as_str(&self) -> &str {
        self.code.as_str()
    }

    /// Instructions in emission order.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.code.lines()
    }

    pub fn into_string(self) -> String {
        self.code.into_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxError {
    #[error("expected token {expected:?}, but got {actual:?}")]
    Unexpected {
        expected: TokenKind,
        actual: TokenKind,
    },
    #[error("expected one of {expected:?}, but got {actual:?}")]
    UnexpectedAny {
        expected: &'static [TokenKind],
        actual: TokenKind,
    },
    #[error("unexpected token {actual:?} in expression")]
    UnexpectedInExpr { actual: TokenKind },
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("expected end of input, but got {actual:?}")]
    TrailingInput { actual: TokenKind },
}

struct Translator<'src, 'lbl> {
    src: &'src str,
    tokens: TokenStream,
    class_table: ClassTable<'src>,
    subroutine_table: SubroutineTable<'src>,
    class_name: &'src str,
    labels: &'lbl mut dyn LabelSource,
}

impl<'src, 'lbl> Translator<'src, 'lbl> {
    fn new(
        src: &'src str,
        tokens: TokenStream,
        labels: &'lbl mut dyn LabelSource,
    ) -> Translator<'src, 'lbl> {
        Translator {
            src,
            tokens,
            class_table: ClassTable::default(),
            subroutine_table: SubroutineTable::default(),
            class_name: "",
            labels,
        }
    }

    fn compile_class(&mut self) -> Result<Code> {
        self.class_table.reset();
        self.consume(TokenKind::Class)?;
        self.class_name = self.consume_ident()?;
        debug!(class = self.class_name, "translating class");
        self.consume(TokenKind::LBrace)?;

        while self.peek_is(TokenKind::is_class_var_kind) {
            self.class_var_dec()?;
        }
        let mut code = Code::new();
        while self.peek_is(TokenKind::is_subroutine_kind) {
            self.subroutine_dec(&mut code)?;
        }

        self.consume(TokenKind::RBrace)?;
        if let Some(token) = self.tokens.peek() {
            let error = SyntaxError::TrailingInput { actual: token.kind };
            return Err(token.span().wrap(error.into()));
        }

        debug!(
            class = self.class_name,
            instructions = code.len(),
            "translated class"
        );
        Ok(code)
    }

    fn class_var_dec(&mut self) -> Result<()> {
        let storage = match self.consume_any(TokenKind::CLASS_VAR_KINDS)?.kind {
            TokenKind::Static => ClassStorage::Static,
            _ => ClassStorage::Field,
        };
        let ty = self.consume_type()?;
        loop {
            let name = self.consume_ident()?;
            self.class_table
                .define(name, ty, storage)
                .ok_or_else(|| self.too_many("class variables"))?;
            if !self.take(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::Semicolon)?;
        Ok(())
    }

    fn subroutine_dec(&mut self, code: &mut Code) -> Result<()> {
        let kind = self.consume_any(TokenKind::SUBROUTINE_KINDS)?.kind;
        self.subroutine_table.reset();
        self.consume_any(TokenKind::RETURN_TYPES)?;
        let name = self.consume_ident()?;

        // The receiver of a method is passed as its first argument.
        if kind == TokenKind::Method {
            self.define_argument("this", self.class_name)?;
        }
        self.parameter_list()?;
        let (n_locals, body) = self.subroutine_body()?;

        trace!(
            class = self.class_name,
            subroutine = name,
            n_locals,
            "translated subroutine"
        );
        code.function(f!("{}.{name}", self.class_name), n_locals);
        match kind {
            TokenKind::Constructor => {
                code.push(Segment::Constant, self.class_table.field_count());
                code.call(runtime::ALLOC, 1);
                code.pop(Segment::Pointer, 0);
            }
            TokenKind::Method => {
                code.push(Segment::Argument, 0);
                code.pop(Segment::Pointer, 0);
            }
            _ => {}
        }
        code.append(&body);
        Ok(())
    }

    /// Defines each parameter as the next ARGUMENT. A method's receiver is
    /// already defined as argument 0, so method parameters start at 1.
    fn parameter_list(&mut self) -> Result<()> {
        self.consume(TokenKind::LParen)?;
        if !self.take(TokenKind::RParen) {
            loop {
                let ty = self.consume_type()?;
                let name = self.consume_ident()?;
                self.define_argument(name, ty)?;
                if !self.take(TokenKind::Comma) {
                    break;
                }
            }
            self.consume(TokenKind::RParen)?;
        }
        Ok(())
    }

    /// Returns the number of locals and the code of the body. The function
    /// header can only be emitted once the locals are known.
    fn subroutine_body(&mut self) -> Result<(u16, Code)> {
        self.consume(TokenKind::LBrace)?;
        let mut n_locals: u16 = 0;
        while self.is(TokenKind::Var) {
            n_locals = n_locals
                .checked_add(self.var_dec()?)
                .ok_or_else(|| self.too_many("local variables"))?;
        }
        let mut body = Code::new();
        self.statements(&mut body)?;
        self.consume(TokenKind::RBrace)?;
        Ok((n_locals, body))
    }

    /// Returns the number of declared locals.
    fn var_dec(&mut self) -> Result<u16> {
        self.consume(TokenKind::Var)?;
        let ty = self.consume_type()?;
        let mut count = 0;
        loop {
            let name = self.consume_ident()?;
            self.subroutine_table
                .define(name, ty, SubroutineStorage::Local)
                .ok_or_else(|| self.too_many("local variables"))?;
            // Can't overflow: the table already counted this local.
            count += 1;
            if !self.take(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::Semicolon)?;
        Ok(count)
    }

    fn statements(&mut self, code: &mut Code) -> Result<()> {
        loop {
            match self.advance()?.kind {
                TokenKind::Let => self.let_statement(code)?,
                TokenKind::If => self.if_statement(code)?,
                TokenKind::While => self.while_statement(code)?,
                TokenKind::Do => self.do_statement(code)?,
                TokenKind::Return => self.return_statement(code)?,
                _ => {
                    self.tokens.pushback();
                    return Ok(());
                }
            }
        }
    }

    fn let_statement(&mut self, code: &mut Code) -> Result<()> {
        let target = self.consume(TokenKind::Identifier)?;
        let var = self.resolve(target)?;

        if self.take(TokenKind::LBracket) {
            code.push(var.segment, var.index);
            self.expression(code)?;
            code.binary_op(BinaryOp::Add);
            self.consume(TokenKind::RBracket)?;
            self.consume(TokenKind::Eq)?;
            self.expression(code)?;
            // The right hand side may itself use `that`, so the target
            // address is only installed once the value is computed.
            code.pop(Segment::Temp, 0);
            code.pop(Segment::Pointer, 1);
            code.push(Segment::Temp, 0);
            code.pop(Segment::That, 0);
        } else {
            self.consume(TokenKind::Eq)?;
            self.expression(code)?;
            code.pop(var.segment, var.index);
        }

        self.consume(TokenKind::Semicolon)?;
        Ok(())
    }

    fn if_statement(&mut self, code: &mut Code) -> Result<()> {
        let else_label = self.labels.next_label();
        let end_label = self.labels.next_label();
        trace!(%else_label, %end_label, "if");

        self.condition(code)?;
        code.if_goto(else_label);
        self.block(code)?;
        code.goto(end_label);
        code.label(else_label);
        if self.take(TokenKind::Else) {
            self.block(code)?;
        }
        code.label(end_label);
        Ok(())
    }

    fn while_statement(&mut self, code: &mut Code) -> Result<()> {
        let top_label = self.labels.next_label();
        let bottom_label = self.labels.next_label();
        trace!(%top_label, %bottom_label, "while");

        code.label(top_label);
        self.condition(code)?;
        code.if_goto(bottom_label);
        self.block(code)?;
        code.goto(top_label);
        code.label(bottom_label);
        Ok(())
    }

    fn do_statement(&mut self, code: &mut Code) -> Result<()> {
        self.subroutine_call(code)?;
        self.consume(TokenKind::Semicolon)?;
        // Discard the returned value.
        code.pop(Segment::Temp, 0);
        Ok(())
    }

    fn return_statement(&mut self, code: &mut Code) -> Result<()> {
        if self.take(TokenKind::Semicolon) {
            code.push(Segment::Constant, 0);
        } else {
            self.expression(code)?;
            self.consume(TokenKind::Semicolon)?;
        }
        code.ret();
        Ok(())
    }

    /// Parses `( expression )`, leaving the negated condition on the stack.
    fn condition(&mut self, code: &mut Code) -> Result<()> {
        self.consume(TokenKind::LParen)?;
        self.expression(code)?;
        self.consume(TokenKind::RParen)?;
        code.unary_op(UnaryOp::Not);
        Ok(())
    }

    fn block(&mut self, code: &mut Code) -> Result<()> {
        self.consume(TokenKind::LBrace)?;
        self.statements(code)?;
        self.consume(TokenKind::RBrace)?;
        Ok(())
    }

    fn expression(&mut self, code: &mut Code) -> Result<()> {
        self.term(code)?;
        while let Some(op) = self
            .tokens
            .peek()
            .and_then(|token| BinaryOp::from_token(token.kind))
        {
            self.advance()?;
            self.term(code)?;
            code.binary_op(op);
        }
        Ok(())
    }

    fn term(&mut self, code: &mut Code) -> Result<()> {
        let token = self.advance()?;

        if let Some(constant) = KeywordConst::from_token(token.kind) {
            code.keyword_constant(constant);
            return Ok(());
        }
        if let Some(op) = UnaryOp::from_token(token.kind) {
            self.term(code)?;
            code.unary_op(op);
            return Ok(());
        }

        match token.kind {
            TokenKind::IntConst(value) => code.push(Segment::Constant, value),
            TokenKind::StringConst => code.string_literal(extract::string(token, self.src)),
            TokenKind::LParen => {
                self.expression(code)?;
                self.consume(TokenKind::RParen)?;
            }
            TokenKind::Identifier => match self.tokens.peek().map(|next| next.kind) {
                Some(TokenKind::LBracket) => {
                    let var = self.resolve(token)?;
                    self.advance()?;
                    code.push(var.segment, var.index);
                    self.expression(code)?;
                    self.consume(TokenKind::RBracket)?;
                    code.binary_op(BinaryOp::Add);
                    code.pop(Segment::Pointer, 1);
                    code.push(Segment::That, 0);
                }
                Some(TokenKind::LParen | TokenKind::Dot) => {
                    self.tokens.pushback();
                    self.subroutine_call(code)?;
                }
                _ => {
                    let var = self.resolve(token)?;
                    code.push(var.segment, var.index);
                }
            },
            actual => {
                let error = SyntaxError::UnexpectedInExpr { actual };
                return Err(token.span().wrap(error.into()));
            }
        }
        Ok(())
    }

    /// Handles the three call forms:
    ///
    /// - `var.m(..)`, where `var` is a variable: a method call on `var`;
    /// - `Name.f(..)`, where `Name` is not a variable: a function or
    ///   constructor call;
    /// - `m(..)`: a method call on the current object.
    fn subroutine_call(&mut self, code: &mut Code) -> Result<()> {
        let first = self.consume_ident()?;

        if self.take(TokenKind::Dot) {
            let subroutine = self.consume_ident()?;
            if let Some(var) = self.lookup(first) {
                code.push(var.segment, var.index);
                let n_args = self.call_arguments(code)?;
                code.call(f!("{}.{subroutine}", var.ty), self.with_receiver(n_args)?);
            } else {
                let n_args = self.call_arguments(code)?;
                code.call(f!("{first}.{subroutine}"), n_args);
            }
        } else {
            code.push(Segment::Pointer, 0);
            let n_args = self.call_arguments(code)?;
            code.call(f!("{}.{first}", self.class_name), self.with_receiver(n_args)?);
        }
        Ok(())
    }

    fn call_arguments(&mut self, code: &mut Code) -> Result<u16> {
        self.consume(TokenKind::LParen)?;
        let n_args = self.expression_list(code)?;
        self.consume(TokenKind::RParen)?;
        Ok(n_args)
    }

    /// Returns the number of expressions in the list.
    fn expression_list(&mut self, code: &mut Code) -> Result<u16> {
        if self.is(TokenKind::RParen) {
            return Ok(0);
        }
        let mut count: u16 = 0;
        loop {
            self.expression(code)?;
            count = count
                .checked_add(1)
                .ok_or_else(|| self.too_many("arguments"))?;
            if !self.take(TokenKind::Comma) {
                break;
            }
        }
        Ok(count)
    }
}

// Utility functions.
impl<'src> Translator<'src, '_> {
    /// Returns the current token and advances the cursor.
    fn advance(&mut self) -> Result<Token> {
        self.tokens
            .next()
            .map_err(|eof| eof.wrap(SyntaxError::UnexpectedEof.into()))
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek_is(|kind| kind == expect)
    }

    fn peek_is(&self, pred: impl FnOnce(TokenKind) -> bool) -> bool {
        self.tokens.peek().is_some_and(|token| pred(token.kind))
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> bool {
        self.is(expect) && self.tokens.next().is_ok()
    }

    /// Advances, failing if the consumed token isn't the provided one.
    fn consume(&mut self, expect: TokenKind) -> Result<Token> {
        let token = self.advance()?;
        if token.kind == expect {
            Ok(token)
        } else {
            let error = SyntaxError::Unexpected {
                expected: expect,
                actual: token.kind,
            };
            Err(token.span().wrap(error.into()))
        }
    }

    /// Advances, failing if the consumed token isn't any of the provided ones.
    fn consume_any(&mut self, expect: &'static [TokenKind]) -> Result<Token> {
        let token = self.advance()?;
        if expect.contains(&token.kind) {
            Ok(token)
        } else {
            let error = SyntaxError::UnexpectedAny {
                expected: expect,
                actual: token.kind,
            };
            Err(token.span().wrap(error.into()))
        }
    }

    fn consume_ident(&mut self) -> Result<&'src str> {
        let token = self.consume(TokenKind::Identifier)?;
        Ok(extract::ident(token, self.src))
    }

    fn consume_type(&mut self) -> Result<&'src str> {
        let token = self.consume_any(TokenKind::VAR_TYPES)?;
        Ok(token.text(self.src))
    }

    fn lookup(&self, name: &str) -> Option<Resolved<'src>> {
        symbol_table::resolve(&self.subroutine_table, &self.class_table, name)
    }

    fn define_argument(&mut self, name: &'src str, ty: &'src str) -> Result<()> {
        self.subroutine_table
            .define(name, ty, SubroutineStorage::Argument)
            .ok_or_else(|| self.too_many("parameters"))?;
        Ok(())
    }

    /// Argument count of a method call, which also passes the receiver.
    fn with_receiver(&self, n_args: u16) -> Result<u16> {
        n_args
            .checked_add(1)
            .ok_or_else(|| self.too_many("arguments"))
    }

    /// Locates a limit error at the most recently consumed token.
    fn too_many(&self, what: &'static str) -> Spanned<ErrorKind> {
        self.tokens.last_span().wrap(ErrorKind::LimitExceeded(what))
    }

    /// Resolves the identifier `token` against both scopes.
    fn resolve(&self, token: Token) -> Result<Resolved<'src>> {
        let name = extract::ident(token, self.src);
        self.lookup(name)
            .ok_or_else(|| token.span().wrap(ErrorKind::UnresolvedSymbol(name.into())))
    }
}
