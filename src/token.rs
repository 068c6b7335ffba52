use std::{fmt, ops::Range};

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    lo: usize,
    len: u32,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Token {
        Token {
            kind,
            len: span.len,
            lo: span.lo,
        }
    }

    pub fn span(&self) -> Span {
        Span {
            len: self.len,
            lo: self.lo,
        }
    }

    /// Returns the source text covered by this token.
    pub fn text<'src>(&self, src: &'src str) -> &'src str {
        self.span().substr(src)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {})", self.kind, self.span())
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Span {
    pub len: u32,
    pub lo: usize,
}

impl Span {
    pub fn new_of_bounds(Range { start: lo, end: hi }: Range<usize>) -> Span {
        debug_assert!(hi >= lo);
        let len = u32::try_from(hi - lo).unwrap_or(u32::MAX);
        Self::new_of_length(lo, len)
    }

    pub fn new_of_length(lo: usize, len: u32) -> Span {
        Span { len, lo }
    }

    pub fn hi(&self) -> usize {
        self.lo + self.len as usize
    }

    pub fn substr<'src>(&self, src: &'src str) -> &'src str {
        &src[self.lo..self.hi()]
    }

    /// Shrinks (or grows) the span by the given amounts on each side.
    ///
    /// Callers must ensure the resulting bounds are still inside the source.
    pub fn offset(&self, lo: isize, hi: isize) -> Span {
        let new_lo = self.lo.saturating_add_signed(lo);
        let new_hi = self.hi().saturating_add_signed(hi).max(new_lo);
        Span::new_of_bounds(new_lo..new_hi)
    }

    pub fn wrap<T>(self, inner: T) -> Spanned<T> {
        Spanned { span: self, inner }
    }

    /// Resolves the 1-based line and column of the start of this span.
    pub fn position(&self, src: &str) -> Position {
        let lo = self.lo.min(src.len());
        let before = &src[..lo];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        Position { line, column }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self}, len: {})", self.len)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = self.lo;
        let hi = self.hi();
        write!(f, "{lo}..{hi}")
    }
}

/// Some value attached to the source region it was produced from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub inner: T,
}

impl<T> Spanned<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            span: self.span,
            inner: f(self.inner),
        }
    }
}

/// A human readable source location. Both fields are 1-based.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

// Identifiers and string literals don't carry their text; it is recovered from
// the source through the token span (see `lexer::extract`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Class,
    Constructor,
    Function,
    Method,
    Field,
    Static,
    Var,
    Int,
    Char,
    Boolean,
    Void,
    True,
    False,
    Null,
    This,
    Let,
    Do,
    If,
    Else,
    While,
    Return,

    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
    Semicolon,
    Plus,
    Minus,
    Star,
    Slash,
    Amp,
    Pipe,
    Less,
    Greater,
    Eq,
    Tilde,

    Identifier,
    StringConst,
    /// Always within `0..=32767`.
    IntConst(u16),
}

impl TokenKind {
    /// `static` or `field`.
    pub const CLASS_VAR_KINDS: &'static [TokenKind] = &[TokenKind::Static, TokenKind::Field];

    pub const SUBROUTINE_KINDS: &'static [TokenKind] = &[
        TokenKind::Constructor,
        TokenKind::Function,
        TokenKind::Method,
    ];

    /// Tokens which may name a variable type (`void` is excluded).
    pub const VAR_TYPES: &'static [TokenKind] = &[
        TokenKind::Int,
        TokenKind::Char,
        TokenKind::Boolean,
        TokenKind::Identifier,
    ];

    pub const RETURN_TYPES: &'static [TokenKind] = &[
        TokenKind::Void,
        TokenKind::Int,
        TokenKind::Char,
        TokenKind::Boolean,
        TokenKind::Identifier,
    ];

    pub fn is_class_var_kind(self) -> bool {
        Self::CLASS_VAR_KINDS.contains(&self)
    }

    pub fn is_subroutine_kind(self) -> bool {
        Self::SUBROUTINE_KINDS.contains(&self)
    }
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "class" => TokenKind::Class,
    "constructor" => TokenKind::Constructor,
    "function" => TokenKind::Function,
    "method" => TokenKind::Method,
    "field" => TokenKind::Field,
    "static" => TokenKind::Static,
    "var" => TokenKind::Var,
    "int" => TokenKind::Int,
    "char" => TokenKind::Char,
    "boolean" => TokenKind::Boolean,
    "void" => TokenKind::Void,
    "true" => TokenKind::True,
    "false" => TokenKind::False,
    "null" => TokenKind::Null,
    "this" => TokenKind::This,
    "let" => TokenKind::Let,
    "do" => TokenKind::Do,
    "if" => TokenKind::If,
    "else" => TokenKind::Else,
    "while" => TokenKind::While,
    "return" => TokenKind::Return,
};
