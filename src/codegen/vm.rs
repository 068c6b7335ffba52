use std::{
    fmt::{self, Write},
    format_args as f,
};

use crate::{codegen::labels::Label, token::TokenKind};

const DEFAULT_CODE_CAPACITY: usize = 4 * 1024; // 4 KiB

/// Runtime library routines the generated code relies on.
pub mod runtime {
    pub const MULTIPLY: &str = "Math.multiply";
    pub const DIVIDE: &str = "Math.divide";
    pub const ALLOC: &str = "Memory.alloc";
    pub const STRING_NEW: &str = "String.new";
    pub const STRING_APPEND_CHAR: &str = "String.appendChar";
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Constant,
    Argument,
    Local,
    Static,
    This,
    That,
    Pointer,
    Temp,
}

impl Segment {
    pub const fn name(self) -> &'static str {
        match self {
            Segment::Constant => "constant",
            Segment::Argument => "argument",
            Segment::Local => "local",
            Segment::Static => "static",
            Segment::This => "this",
            Segment::That => "that",
            Segment::Pointer => "pointer",
            Segment::Temp => "temp",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Lt,
    Gt,
    Eq,
}

impl BinaryOp {
    pub fn from_token(kind: TokenKind) -> Option<BinaryOp> {
        let op = match kind {
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Amp => BinaryOp::And,
            TokenKind::Pipe => BinaryOp::Or,
            TokenKind::Less => BinaryOp::Lt,
            TokenKind::Greater => BinaryOp::Gt,
            TokenKind::Eq => BinaryOp::Eq,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation, `-`.
    Neg,
    /// Bitwise (and boolean) negation, `~`.
    Not,
}

impl UnaryOp {
    pub fn from_token(kind: TokenKind) -> Option<UnaryOp> {
        match kind {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Tilde => Some(UnaryOp::Not),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeywordConst {
    True,
    False,
    Null,
    This,
}

impl KeywordConst {
    pub fn from_token(kind: TokenKind) -> Option<KeywordConst> {
        match kind {
            TokenKind::True => Some(KeywordConst::True),
            TokenKind::False => Some(KeywordConst::False),
            TokenKind::Null => Some(KeywordConst::Null),
            TokenKind::This => Some(KeywordConst::This),
            _ => None,
        }
    }
}

/// A buffer of VM instructions, one per line.
///
/// All the formatting of the target instruction set lives here; the buffer
/// itself only accumulates text.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Code {
    code: String,
    lines: usize,
}

impl Code {
    pub fn new() -> Code {
        Code::with_capacity(DEFAULT_CODE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Code {
        Code {
            code: String::with_capacity(capacity),
            lines: 0,
        }
    }

    pub fn push(&mut self, segment: Segment, index: u16) {
        self.emit(f!("push {segment} {index}"));
    }

    pub fn pop(&mut self, segment: Segment, index: u16) {
        debug_assert_ne!(segment, Segment::Constant, "can't pop into constant");
        self.emit(f!("pop {segment} {index}"));
    }

    /// The target has no multiplication or division instructions, so those
    /// are delegated to the runtime library.
    pub fn binary_op(&mut self, op: BinaryOp) {
        match op {
            BinaryOp::Add => self.emit(f!("add")),
            BinaryOp::Sub => self.emit(f!("sub")),
            BinaryOp::Mul => self.call(runtime::MULTIPLY, 2),
            BinaryOp::Div => self.call(runtime::DIVIDE, 2),
            BinaryOp::And => self.emit(f!("and")),
            BinaryOp::Or => self.emit(f!("or")),
            BinaryOp::Lt => self.emit(f!("lt")),
            BinaryOp::Gt => self.emit(f!("gt")),
            BinaryOp::Eq => self.emit(f!("eq")),
        }
    }

    pub fn unary_op(&mut self, op: UnaryOp) {
        match op {
            UnaryOp::Neg => self.emit(f!("neg")),
            UnaryOp::Not => self.emit(f!("not")),
        }
    }

    pub fn label(&mut self, label: Label) {
        self.emit(f!("label {label}"));
    }

    pub fn goto(&mut self, label: Label) {
        self.emit(f!("goto {label}"));
    }

    pub fn if_goto(&mut self, label: Label) {
        self.emit(f!("if-goto {label}"));
    }

    pub fn call(&mut self, name: impl fmt::Display, n_args: u16) {
        self.emit(f!("call {name} {n_args}"));
    }

    pub fn function(&mut self, name: impl fmt::Display, n_locals: u16) {
        self.emit(f!("function {name} {n_locals}"));
    }

    pub fn ret(&mut self) {
        self.emit(f!("return"));
    }

    /// Strings are built at the call site: allocate, then append every
    /// character code.
    ///
    /// `text` must fit the runtime's string length, which the lexer checks for
    /// every literal.
    pub fn string_literal(&mut self, text: &str) {
        let len = u16::try_from(text.len()).expect("string literal length should be checked");
        self.push(Segment::Constant, len);
        self.call(runtime::STRING_NEW, 1);
        for byte in text.bytes() {
            self.push(Segment::Constant, u16::from(byte));
            self.call(runtime::STRING_APPEND_CHAR, 2);
        }
    }

    pub fn keyword_constant(&mut self, constant: KeywordConst) {
        match constant {
            KeywordConst::True => {
                self.push(Segment::Constant, 1);
                self.unary_op(UnaryOp::Neg);
            }
            KeywordConst::False | KeywordConst::Null => self.push(Segment::Constant, 0),
            KeywordConst::This => self.push(Segment::Pointer, 0),
        }
    }

    /// Appends every instruction of `other`, in order.
    pub fn append(&mut self, other: &Code) {
        self.code.push_str(&other.code);
        self.lines += other.lines;
    }

    pub fn as_str(&self) -> &str {
        &self.code
    }

    pub fn into_string(self) -> String {
        self.code
    }

    pub fn lines(&self) -> std::str::Lines<'_> {
        self.code.lines()
    }

    /// Number of instructions in the buffer.
    pub fn len(&self) -> usize {
        self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines == 0
    }
}

// Utility functions.
impl Code {
    fn emit(&mut self, f: fmt::Arguments<'_>) {
        self.code
            .write_fmt(f)
            .expect("code emit should be infallible");
        self.code.push('\n');
        self.lines += 1;
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.lines()).finish()
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}
