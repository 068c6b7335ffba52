use std::iter::Peekable;

use crate::token::{Span, Spanned, Token, TokenKind, KEYWORDS};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 1_024;

/// Largest integer constant the target machine can represent.
pub const MAX_INT_CONST: u16 = 32_767;

/// Longest string literal (in characters) the runtime can allocate.
pub const MAX_STRING_LEN: usize = 65_535;

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

/// Lexes the whole provided string into a [`TokenStream`].
///
/// Comments and whitespace are dropped. The first malformed token aborts the
/// lexing process.
pub fn lex(src: &str) -> Result<TokenStream> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    Lexer::new(src).lex(&mut tokens)?;
    Ok(TokenStream::new(tokens, src.len()))
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("string literal crosses a line boundary")]
    MultilineString,
    #[error("unclosed string literal")]
    UnclosedString,
    #[error("unclosed block comment")]
    UnclosedComment,
    #[error("integer constant is greater than 32767")]
    IntegerOutOfRange,
    #[error("string literal is longer than 65535 characters")]
    StringTooLong,
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),
}

/// The Jack lexer
struct Lexer<'src> {
    src: &'src str,
    iter: Peekable<std::str::Chars<'src>>,
    cursor: usize,
    current_lo: usize,
}

impl Lexer<'_> {
    /// Scans the source string until the input is exhausted.
    fn lex(mut self, tokens: &mut Vec<Token>) -> Result<()> {
        assert_eq!(tokens.len(), 0, "must pass clean tokens buffer");
        while let Some(kind) = self.scan_token_kind()? {
            tokens.push(Token::new(kind, self.span()));
        }
        Ok(())
    }

    /// Scans the next token, skipping any trivia. Returns `None` once the
    /// input is exhausted.
    fn scan_token_kind(&mut self) -> Result<Option<TokenKind>> {
        use TokenKind::*;
        loop {
            let Some(current) = self.mark_advance() else {
                return Ok(None);
            };
            let kind = match current {
                '/' => match self.peek() {
                    Some('/') => {
                        self.inline_comment();
                        continue;
                    }
                    Some('*') => {
                        self.multiline_comment()?;
                        continue;
                    }
                    _ => Slash,
                },
                c if c.is_ascii_whitespace() => continue,
                '{' => LBrace,
                '}' => RBrace,
                '(' => LParen,
                ')' => RParen,
                '[' => LBracket,
                ']' => RBracket,
                '.' => Dot,
                ',' => Comma,
                ';' => Semicolon,
                '+' => Plus,
                '-' => Minus,
                '*' => Star,
                '&' => Amp,
                '|' => Pipe,
                '<' => Less,
                '>' => Greater,
                '=' => Eq,
                '~' => Tilde,
                '"' => self.string()?,
                c if c.is_ascii_alphabetic() || c == '_' => self.identifier_or_keyword(),
                c if c.is_ascii_digit() => self.number()?,
                c => return Err(self.span().wrap(Error::UnexpectedChar(c))),
            };
            return Ok(Some(kind));
        }
    }

    /// Lexes a string literal. There are no escape sequences; the literal ends
    /// at the next quotation mark, which must be on the same line.
    fn string(&mut self) -> Result<TokenKind> {
        loop {
            let (current, current_span) = self.advance_with_span();
            match current {
                Some('"') => break,
                Some('\n' | '\r') => return Err(self.span().wrap(Error::MultilineString)),
                None => return Err(self.span().wrap(Error::UnclosedString)),
                Some(c) if !c.is_ascii() || c == '\0' => {
                    return Err(current_span.wrap(Error::UnexpectedChar(c)));
                }
                Some(_) => (),
            }
        }
        // Only ASCII gets here, so bytes and characters coincide.
        if self.substr().len() - 2 > MAX_STRING_LEN {
            return Err(self.span().wrap(Error::StringTooLong));
        }
        Ok(TokenKind::StringConst)
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        let valid_identifier_suffix = |c: char| c.is_ascii_alphanumeric() || c == '_';

        while self.peek().is_some_and(valid_identifier_suffix) {
            self.advance();
        }
        KEYWORDS
            .get(self.substr())
            .copied()
            .unwrap_or(TokenKind::Identifier)
    }

    fn number(&mut self) -> Result<TokenKind> {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        match self.substr().parse::<u16>() {
            Ok(value) if value <= MAX_INT_CONST => Ok(TokenKind::IntConst(value)),
            _ => Err(self.span().wrap(Error::IntegerOutOfRange)),
        }
    }

    fn inline_comment(&mut self) {
        assert_eq!(self.advance(), Some('/'));
        while self.peek().is_some_and(|c| c != '\n') {
            self.advance();
        }
    }

    fn multiline_comment(&mut self) -> Result<()> {
        assert_eq!(self.advance(), Some('*'));
        loop {
            match self.advance() {
                Some('*') => (), // start closing comment
                None => return Err(self.span().wrap(Error::UnclosedComment)),
                Some(_) => continue, // keep scanning comment...
            }
            // A run of stars may precede the closing slash (`**/`).
            while self.peek() == Some('*') {
                self.advance();
            }
            match self.advance() {
                Some('/') => return Ok(()), // finished closing comment
                None => return Err(self.span().wrap(Error::UnclosedComment)),
                Some(_) => continue, // sadly couldn't close it! keep scanning...
            }
        }
    }
}

impl Lexer<'_> {
    /// Constructs a new lexer with the default state.
    fn new(src: &str) -> Lexer<'_> {
        Lexer {
            src,
            iter: src.chars().peekable(),
            cursor: 0,
            current_lo: 0,
        }
    }

    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> Option<char> {
        self.current_lo = self.cursor;
        self.advance()
    }

    /// Returns the next character and advances the iterator. `None` marks the
    /// end of the input.
    fn advance(&mut self) -> Option<char> {
        self.iter.next().inspect(|c| self.cursor += c.len_utf8())
    }

    /// Returns the next character (with its span) and advances the iterator.
    fn advance_with_span(&mut self) -> (Option<char>, Span) {
        let lo = self.cursor;
        let char = self.advance();
        let hi = self.cursor;
        (char, Span::new_of_bounds(lo..hi))
    }

    /// Returns the next character without advancing the iterator.
    fn peek(&mut self) -> Option<char> {
        self.iter.peek().copied()
    }

    /// Returns the current span.
    fn span(&self) -> Span {
        Span::new_of_bounds(self.current_lo..self.cursor)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &str {
        self.span().substr(self.src)
    }
}

/// A fully materialized sequence of tokens with a single cursor.
///
/// Consumption is strictly sequential. Backtracking is done one step at a
/// time through [`TokenStream::pushback`].
#[derive(Debug)]
pub struct TokenStream {
    tokens: Vec<Token>,
    cursor: usize,
    /// Byte offset of the end of the source, used to locate end-of-input
    /// errors.
    end: usize,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>, end: usize) -> TokenStream {
        TokenStream {
            tokens,
            cursor: 0,
            end,
        }
    }

    /// Whether the cursor is not at the end of the stream.
    pub fn has_next(&self) -> bool {
        self.cursor < self.tokens.len()
    }

    /// Returns the current token and advances the cursor.
    ///
    /// Fails with the end-of-input span once the stream is exhausted.
    pub fn next(&mut self) -> Result<Token, Span> {
        let token = self.tokens.get(self.cursor).copied().ok_or(self.eof_span())?;
        self.cursor += 1;
        Ok(token)
    }

    /// Moves the cursor back by one token.
    pub fn pushback(&mut self) {
        debug_assert!(self.cursor > 0, "pushback before the start of the stream");
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// Returns the current token without consuming it.
    pub fn peek(&self) -> Option<Token> {
        self.tokens.get(self.cursor).copied()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Span of the most recently consumed token.
    pub fn last_span(&self) -> Span {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(Span::new_of_length(0, 0), Token::span)
    }

    pub fn eof_span(&self) -> Span {
        Span::new_of_length(self.end, 0)
    }
}

pub mod extract {
    use super::*;

    pub fn ident(token: Token, src: &str) -> &str {
        debug_assert_eq!(token.kind, TokenKind::Identifier);
        token.text(src)
    }

    /// Returns the contents of a string literal, without the quotes.
    pub fn string(token: Token, src: &str) -> &str {
        debug_assert_eq!(token.kind, TokenKind::StringConst);
        token.span().offset(1, -1).substr(src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lex_all(src: &str) -> Vec<Token> {
        let mut stream = lex(src).expect("failed to lex");
        let mut tokens = Vec::new();
        while stream.has_next() {
            tokens.push(stream.next().unwrap());
        }
        tokens
    }

    fn lex_error(src: &str) -> (Error, std::ops::Range<usize>) {
        let error = lex(src).expect_err("lexing should fail");
        (error.inner, error.span.lo..error.span.hi())
    }

    #[test]
    fn test_fixtures_no_errors() {
        for src in [
            include_str!("../fixtures/Square/Main.jack"),
            include_str!("../fixtures/Square/Square.jack"),
            include_str!("../fixtures/Square/SquareGame.jack"),
            include_str!("../fixtures/Average/Main.jack"),
        ] {
            assert!(lex(src).is_ok());
        }
    }

    #[test]
    fn tests_with_span() {
        use TokenKind::*;
        let cases = cases!(match .. {
            "+-*/&|<>=~" => [
                (Plus, 0..1),
                (Minus, 1..2),
                (Star, 2..3),
                (Slash, 3..4),
                (Amp, 4..5),
                (Pipe, 5..6),
                (Less, 6..7),
                (Greater, 7..8),
                (Eq, 8..9),
                (Tilde, 9..10),
            ],
            "{}()[].,;" => [
                (LBrace, 0..1),
                (RBrace, 1..2),
                (LParen, 2..3),
                (RParen, 3..4),
                (LBracket, 4..5),
                (RBracket, 5..6),
                (Dot, 6..7),
                (Comma, 7..8),
                (Semicolon, 8..9),
            ],
            "class Class classy _class" => [
                (Class, 0..5),
                (Identifier, 6..11),
                (Identifier, 12..18),
                (Identifier, 19..25),
            ],
            "0 1 007 32767" => [
                (IntConst(0), 0..1),
                (IntConst(1), 2..3),
                (IntConst(7), 4..7),
                (IntConst(32767), 8..13),
            ],
            "x1 a_b2 12ab" => [
                (Identifier, 0..2),
                (Identifier, 3..7),
                (IntConst(12), 8..10),
                (Identifier, 10..12),
            ],
            r#"""/"hello world"/"a//b""# => [
                (StringConst, 0..2),
                (Slash, 2..3),
                (StringConst, 3..16),
                (Slash, 16..17),
                (StringConst, 17..23),
            ],
            "let x = a[i];" => [
                (Let, 0..3),
                (Identifier, 4..5),
                (Eq, 6..7),
                (Identifier, 8..9),
                (LBracket, 9..10),
                (Identifier, 10..11),
                (RBracket, 11..12),
                (Semicolon, 12..13),
            ],
            "hello /* world!\n this */ 1 /**/ 2 // is a\n\"comment!\"" => [
                (Identifier, 0..5),
                (IntConst(1), 25..26),
                (IntConst(2), 32..33),
                (StringConst, 42..52),
            ],
            "a/** doc\n * comment **/b" => [
                (Identifier, 0..1),
                (Identifier, 23..24),
            ],
            "half ( of ) this /* line */ are // comments" => [
                (Identifier, 0..4),
                (LParen, 5..6),
                (Identifier, 7..9),
                (RParen, 10..11),
                (This, 12..16),
                (Identifier, 28..31),
            ],
            "// line comment without line break" => [],
            "" => [],
        });

        for (input, tokens) in cases {
            let lexed = lex_all(input);
            assert_eq!(lexed, tokens.as_slice(), "input: {input:?}");
        }
    }

    #[test]
    fn every_keyword_is_recognized() {
        for (text, kind) in &KEYWORDS {
            let span = Span::new_of_bounds(0..text.len());
            assert_eq!(lex_all(text), [Token::new(*kind, span)]);
        }
    }

    #[test]
    fn lexical_errors() {
        assert_eq!(lex_error("x /* unclosed"), (Error::UnclosedComment, 2..13));
        assert_eq!(lex_error("x /* almost *"), (Error::UnclosedComment, 2..13));
        assert_eq!(
            lex_error("let s = \"broken\nstring\";"),
            (Error::MultilineString, 8..16)
        );
        assert_eq!(lex_error("\"open"), (Error::UnclosedString, 0..5));
        assert_eq!(lex_error("32768"), (Error::IntegerOutOfRange, 0..5));
        assert_eq!(lex_error("99999999"), (Error::IntegerOutOfRange, 0..8));
        assert_eq!(lex_error("a $ b"), (Error::UnexpectedChar('$'), 2..3));
        assert_eq!(lex_error("\"caf\u{e9}\""), (Error::UnexpectedChar('\u{e9}'), 4..6));
    }

    #[test]
    fn nul_is_not_end_of_input() {
        assert_eq!(lex_error("a \0 b $"), (Error::UnexpectedChar('\0'), 2..3));
        assert_eq!(lex_error("\"a\0b\""), (Error::UnexpectedChar('\0'), 2..3));
        assert_eq!(
            lex_all("x /* a\0b */ y // c\0d\nz"),
            [
                Token::new(TokenKind::Identifier, Span::new_of_bounds(0..1)),
                Token::new(TokenKind::Identifier, Span::new_of_bounds(12..13)),
                Token::new(TokenKind::Identifier, Span::new_of_bounds(21..22)),
            ]
        );
    }

    #[test]
    fn string_length_limit() {
        let longest = format!("\"{}\"", "a".repeat(MAX_STRING_LEN));
        assert_eq!(lex_all(&longest).len(), 1);

        let too_long = format!("\"{}\"", "a".repeat(MAX_STRING_LEN + 1));
        assert_eq!(
            lex_error(&too_long),
            (Error::StringTooLong, 0..MAX_STRING_LEN + 3)
        );
    }

    #[test]
    fn stream_pushback() {
        let mut stream = lex("a . b").unwrap();
        assert_eq!(stream.len(), 3);

        let a = stream.next().unwrap();
        let dot = stream.next().unwrap();
        assert_eq!(a.kind, TokenKind::Identifier);
        assert_eq!(dot.kind, TokenKind::Dot);

        stream.pushback();
        stream.pushback();
        assert_eq!(stream.next().unwrap(), a);
        assert_eq!(stream.peek(), Some(dot));

        stream.next().unwrap();
        stream.next().unwrap();
        assert!(!stream.has_next());
        assert_eq!(stream.next(), Err(Span::new_of_length(5, 0)));
    }

    #[test]
    fn extract_text() {
        let src = r#"greet("hi")"#;
        let mut stream = lex(src).unwrap();
        let ident = stream.next().unwrap();
        stream.next().unwrap();
        let string = stream.next().unwrap();
        assert_eq!(extract::ident(ident, src), "greet");
        assert_eq!(extract::string(string, src), "hi");
    }

    macro_rules! cases {
        (match .. {
            $($str:expr => [$(($kind:expr, $range:expr)),* $(,)?]),* $(,)?
        }) => {{
            &[$((
                $str,
                vec![
                    $(Token::new($kind, Span::new_of_bounds($range.start..$range.end))),*
                ],
            )),*]
        }};
    }
    use cases;
}
