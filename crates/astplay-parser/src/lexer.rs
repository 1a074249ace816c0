//! Lexer (tokenizer) for JavaScript.
//!
//! The lexer converts source text into a stream of tokens. It's called
//! on-demand by the parser, not upfront. `/` is always lexed as division;
//! the parser asks for a regex rescan when it expects an expression, and
//! for a template rescan after the `}` that closes a substitution.

use crate::span::Span;
use crate::token::{keyword_from_str, punctuator_from_str, Token, TokenKind, MAX_PUNCTUATOR_LEN};

/// The lexer state.
#[derive(Clone)]
pub struct Lexer<'a> {
    /// Source text.
    source: &'a str,
    /// Source code as bytes (for fast indexing).
    bytes: &'a [u8],
    /// Current byte position.
    pos: usize,
    /// Start position of the current token.
    token_start: usize,
    /// Whether a line terminator was skipped before the current token.
    newline_before: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            token_start: 0,
            newline_before: false,
        }
    }

    /// Get the current byte position.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Token {
        self.newline_before = false;
        if let Some(error) = self.skip_whitespace_and_comments() {
            self.token_start = self.pos;
            return self.make_token(TokenKind::Invalid(error));
        }
        self.token_start = self.pos;

        if self.is_eof() {
            return self.make_token(TokenKind::Eof);
        }

        let ch = self.current();
        let kind = match ch {
            // Identifiers and keywords
            b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'$' => self.scan_identifier(),
            b'\\' => {
                self.advance();
                TokenKind::Invalid("Unicode escapes in identifiers are not supported".into())
            }
            // Numbers
            b'0'..=b'9' => self.scan_number(),

            // Strings
            b'"' | b'\'' => self.scan_string(ch),

            // Template literals
            b'`' => {
                self.advance();
                self.scan_template_part(true)
            }

            // `.5`
            b'.' if self.peek_char().is_ascii_digit() => self.scan_leading_fraction(),

            // Punctuation and operators
            b if b.is_ascii_punctuation() => self.scan_punctuator(),

            _ => {
                let c = self.current_char();
                if c.is_alphabetic() {
                    self.scan_identifier()
                } else {
                    self.pos += c.len_utf8();
                    TokenKind::Invalid(format!("Unexpected character '{c}'"))
                }
            }
        };

        self.make_token(kind)
    }

    /// Peek at the next token without consuming it.
    pub fn peek(&mut self) -> Token {
        let saved = self.clone();
        let token = self.next_token();
        *self = saved;
        token
    }

    /// Rescan a `/` or `/=` token at `slash` as a regular expression.
    pub fn rescan_regex(&mut self, slash: Span) -> Token {
        self.pos = slash.start as usize;
        self.token_start = self.pos;
        let kind = self.scan_regex();
        self.make_token(kind)
    }

    /// Rescan the `}` at `rbrace` as the continuation of a template literal.
    pub fn rescan_template_continuation(&mut self, rbrace: Span) -> Token {
        self.pos = rbrace.start as usize;
        self.token_start = self.pos;
        self.advance(); // Skip }
        let kind = self.scan_template_part(false);
        self.make_token(kind)
    }

    // === Helper methods ===

    fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn current(&self) -> u8 {
        self.bytes.get(self.pos).copied().unwrap_or(0)
    }

    fn current_char(&self) -> char {
        self.source[self.pos..].chars().next().unwrap_or('\0')
    }

    fn peek_char(&self) -> u8 {
        self.bytes.get(self.pos + 1).copied().unwrap_or(0)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn advance_n(&mut self, n: usize) {
        self.pos += n;
    }

    /// Advance past the current character, returning it.
    fn bump_char(&mut self) -> char {
        let c = self.current_char();
        self.pos += c.len_utf8().max(1);
        c
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(
            kind,
            Span::new(self.token_start as u32, self.pos as u32),
            self.newline_before,
        )
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.source[start..end]
    }

    fn token_slice(&self) -> &'a str {
        self.slice(self.token_start, self.pos)
    }

    // === Whitespace and comments ===

    fn skip_whitespace_and_comments(&mut self) -> Option<String> {
        loop {
            match self.current() {
                b' ' | b'\t' | b'\r' | 0x0b | 0x0c => self.advance(),
                b'\n' => {
                    self.newline_before = true;
                    self.advance();
                }
                b'/' if self.peek_char() == b'/' => self.skip_line_comment(),
                b'/' if self.peek_char() == b'*' => {
                    if !self.skip_block_comment() {
                        return Some("Unterminated comment".into());
                    }
                }
                // Non-ASCII whitespace: NBSP, BOM, line/paragraph separators
                0xc2 | 0xe2 | 0xef if !self.is_eof() => {
                    let c = self.current_char();
                    if matches!(c, '\u{2028}' | '\u{2029}') {
                        self.newline_before = true;
                    } else if !(c == '\u{a0}' || c == '\u{feff}' || c.is_whitespace()) {
                        return None;
                    }
                    self.pos += c.len_utf8();
                }
                _ => return None,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        self.advance_n(2); // Skip //
        while !self.is_eof() && self.current() != b'\n' {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> bool {
        self.advance_n(2); // Skip /*
        while !self.is_eof() {
            match self.current() {
                b'*' if self.peek_char() == b'/' => {
                    self.advance_n(2);
                    return true;
                }
                b'\n' => {
                    self.newline_before = true;
                    self.advance();
                }
                _ => self.advance(),
            }
        }
        false
    }

    // === Token scanning ===

    fn scan_identifier(&mut self) -> TokenKind {
        while !self.is_eof() {
            match self.current() {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'$' => self.advance(),
                b if b >= 0x80 && self.current_char().is_alphanumeric() => {
                    self.bump_char();
                }
                _ => break,
            }
        }

        let ident = self.token_slice();
        keyword_from_str(ident).unwrap_or_else(|| TokenKind::Identifier(ident.to_string()))
    }

    /// Collect digits accepted by `is_digit`, dropping numeric separators.
    fn scan_digits(&mut self, is_digit: fn(u8) -> bool) -> String {
        let mut digits = String::new();
        while is_digit(self.current()) || (self.current() == b'_' && is_digit(self.peek_char())) {
            if self.current() != b'_' {
                digits.push(self.current() as char);
            }
            self.advance();
        }
        digits
    }

    fn scan_number(&mut self) -> TokenKind {
        if self.current() == b'0' {
            let radix = match self.peek_char() {
                b'x' | b'X' => Some(16),
                b'b' | b'B' => Some(2),
                b'o' | b'O' => Some(8),
                _ => None,
            };
            if let Some(radix) = radix {
                return self.scan_radix_number(radix);
            }
        }

        let mut text = self.scan_digits(|b| b.is_ascii_digit());

        if self.current() == b'n' {
            self.advance();
            return TokenKind::BigInt(text);
        }

        if self.current() == b'.' {
            self.advance();
            text.push('.');
            text.push_str(&self.scan_digits(|b| b.is_ascii_digit()));
        }

        if matches!(self.current(), b'e' | b'E') {
            let save = self.pos;
            self.advance();
            let mut exp = String::from("e");
            if matches!(self.current(), b'+' | b'-') {
                exp.push(self.current() as char);
                self.advance();
            }
            let digits = self.scan_digits(|b| b.is_ascii_digit());
            if digits.is_empty() {
                self.pos = save;
            } else {
                text.push_str(&exp);
                text.push_str(&digits);
            }
        }

        if self.current().is_ascii_alphabetic() || self.current() == b'_' || self.current() == b'$' {
            self.advance();
            return TokenKind::Invalid("Identifier directly after number".into());
        }

        TokenKind::Number(text.parse().unwrap_or(f64::NAN))
    }

    fn scan_radix_number(&mut self, radix: u32) -> TokenKind {
        self.advance_n(2); // Skip 0x / 0b / 0o
        let digits = match radix {
            16 => self.scan_digits(|b| b.is_ascii_hexdigit()),
            8 => self.scan_digits(|b| (b'0'..=b'7').contains(&b)),
            _ => self.scan_digits(|b| b == b'0' || b == b'1'),
        };
        if digits.is_empty() {
            return TokenKind::Invalid("Expected number in radix".into());
        }
        if self.current() == b'n' {
            self.advance();
            return TokenKind::BigInt(self.slice(self.token_start, self.pos - 1).replace('_', ""));
        }
        let value = digits
            .chars()
            .filter_map(|c| c.to_digit(radix))
            .fold(0f64, |acc, d| acc * f64::from(radix) + f64::from(d));
        TokenKind::Number(value)
    }

    fn scan_string(&mut self, quote: u8) -> TokenKind {
        self.advance(); // Skip opening quote

        let mut value = String::new();
        loop {
            if self.is_eof() {
                return TokenKind::Invalid("Unterminated string constant".into());
            }
            match self.current() {
                c if c == quote => {
                    self.advance();
                    return TokenKind::String(value);
                }
                b'\n' | b'\r' => {
                    return TokenKind::Invalid("Unterminated string constant".into());
                }
                b'\\' => {
                    self.advance();
                    if let Some(c) = self.scan_escape_sequence() {
                        value.push(c);
                    }
                }
                _ => value.push(self.bump_char()),
            }
        }
    }

    /// Decode an escape after the backslash. Line continuations yield `None`.
    fn scan_escape_sequence(&mut self) -> Option<char> {
        if self.is_eof() {
            return None;
        }
        let ch = self.current();
        match ch {
            b'n' => { self.advance(); Some('\n') }
            b'r' => { self.advance(); Some('\r') }
            b't' => { self.advance(); Some('\t') }
            b'b' => { self.advance(); Some('\u{8}') }
            b'f' => { self.advance(); Some('\u{c}') }
            b'v' => { self.advance(); Some('\u{b}') }
            b'0' if !self.peek_char().is_ascii_digit() => { self.advance(); Some('\0') }
            b'x' => {
                self.advance();
                Some(self.scan_code_point(Some(2)))
            }
            b'u' if self.peek_char() == b'{' => {
                self.advance_n(2);
                let c = self.scan_code_point(None);
                if self.current() == b'}' {
                    self.advance();
                }
                Some(c)
            }
            b'u' => {
                self.advance();
                Some(self.scan_code_point(Some(4)))
            }
            b'\r' => {
                self.advance();
                if self.current() == b'\n' {
                    self.advance();
                }
                None
            }
            b'\n' => {
                self.advance();
                None
            }
            _ => Some(self.bump_char()),
        }
    }

    /// Hex digits of an escape: up to `len` of them for `\xHH` and
    /// `\uHHHH`, any number for `\u{...}`. Invalid code points become U+FFFD.
    fn scan_code_point(&mut self, len: Option<usize>) -> char {
        let mut value = 0u32;
        let mut taken = 0;
        while len.map_or(true, |len| taken < len) {
            let Some(digit) = char::from(self.current()).to_digit(16) else {
                break;
            };
            value = value.saturating_mul(16).saturating_add(digit);
            taken += 1;
            self.advance();
        }
        char::from_u32(value).unwrap_or('\u{FFFD}')
    }

    /// Scan a template chunk up to `${` or the closing backtick.
    fn scan_template_part(&mut self, head: bool) -> TokenKind {
        let mut value = String::new();
        while !self.is_eof() {
            match self.current() {
                b'`' => {
                    self.advance();
                    return if head {
                        TokenKind::TemplateNoSub(value)
                    } else {
                        TokenKind::TemplateTail(value)
                    };
                }
                b'$' if self.peek_char() == b'{' => {
                    self.advance_n(2);
                    return if head {
                        TokenKind::TemplateHead(value)
                    } else {
                        TokenKind::TemplateMiddle(value)
                    };
                }
                b'\\' => {
                    self.advance();
                    if let Some(c) = self.scan_escape_sequence() {
                        value.push(c);
                    }
                }
                b'\r' => {
                    // Template values normalize CRLF to LF
                    self.advance();
                    if self.current() == b'\n' {
                        self.advance();
                    }
                    value.push('\n');
                }
                _ => value.push(self.bump_char()),
            }
        }

        TokenKind::Invalid("Unterminated template".into())
    }

    fn scan_regex(&mut self) -> TokenKind {
        self.advance(); // Skip opening /
        let pattern_start = self.pos;

        let mut in_class = false;
        loop {
            if self.is_eof() {
                return TokenKind::Invalid("Unterminated regular expression".into());
            }
            match self.current() {
                b'/' if !in_class => break,
                b'[' => {
                    in_class = true;
                    self.advance();
                }
                b']' => {
                    in_class = false;
                    self.advance();
                }
                b'\\' => {
                    self.advance();
                    if !self.is_eof() {
                        self.bump_char();
                    }
                }
                b'\n' | b'\r' => {
                    return TokenKind::Invalid("Unterminated regular expression".into());
                }
                _ => {
                    self.bump_char();
                }
            }
        }

        let pattern = self.slice(pattern_start, self.pos).to_string();
        self.advance(); // Skip closing /

        let flags_start = self.pos;
        while self.current().is_ascii_alphabetic() {
            self.advance();
        }
        let flags = self.slice(flags_start, self.pos).to_string();
        if let Some(bad) = flags.chars().find(|c| !"dgimsuyv".contains(*c)) {
            return TokenKind::Invalid(format!("Invalid regular expression flag '{bad}'"));
        }

        TokenKind::Regex { pattern, flags }
    }

    // === Punctuators ===

    fn scan_leading_fraction(&mut self) -> TokenKind {
        self.advance();
        let digits = self.scan_digits(|b| b.is_ascii_digit());
        TokenKind::Number(format!("0.{digits}").parse().unwrap_or(f64::NAN))
    }

    /// Longest-match scan over the punctuator table.
    fn scan_punctuator(&mut self) -> TokenKind {
        let rest = &self.bytes[self.pos..];
        for len in (1..=MAX_PUNCTUATOR_LEN.min(rest.len())).rev() {
            let Ok(text) = std::str::from_utf8(&rest[..len]) else {
                continue;
            };
            let Some(kind) = punctuator_from_str(text) else {
                continue;
            };
            // `a?.5:b` is a conditional followed by a number.
            if kind == TokenKind::QuestionDot && rest.get(2).is_some_and(u8::is_ascii_digit) {
                continue;
            }
            self.advance_n(len);
            return kind;
        }
        let c = self.bump_char();
        TokenKind::Invalid(format!("Unexpected character '{c}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            if matches!(token.kind, TokenKind::Eof) {
                break;
            }
            tokens.push(token.kind);
        }
        tokens
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(
            tokenize("foo bar _baz $qux"),
            vec![
                TokenKind::Identifier("foo".into()),
                TokenKind::Identifier("bar".into()),
                TokenKind::Identifier("_baz".into()),
                TokenKind::Identifier("$qux".into()),
            ]
        );
    }

    #[test]
    fn test_contextual_words_stay_identifiers() {
        assert_eq!(
            tokenize("const let var async"),
            vec![
                TokenKind::Const,
                TokenKind::Identifier("let".into()),
                TokenKind::Var,
                TokenKind::Identifier("async".into()),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokenize("42 3.14 0xff 0b101 0o77 1_000 .5 1e3"),
            vec![
                TokenKind::Number(42.0),
                TokenKind::Number(3.14),
                TokenKind::Number(255.0),
                TokenKind::Number(5.0),
                TokenKind::Number(63.0),
                TokenKind::Number(1000.0),
                TokenKind::Number(0.5),
                TokenKind::Number(1000.0),
            ]
        );
        assert_eq!(tokenize("10n"), vec![TokenKind::BigInt("10".into())]);
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            tokenize(r#""hello" 'wörld' "a\nb""#),
            vec![
                TokenKind::String("hello".into()),
                TokenKind::String("wörld".into()),
                TokenKind::String("a\nb".into()),
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(tokenize("'abc")[0], TokenKind::Invalid(_)));
        assert!(matches!(tokenize("'abc\n'")[0], TokenKind::Invalid(_)));
    }

    #[test]
    fn test_punctuators_take_longest_match() {
        assert_eq!(
            tokenize("a >>>= b ?? c ?. d ... === !== ** ++"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::GtGtGtEq,
                TokenKind::Identifier("b".into()),
                TokenKind::QuestionQuestion,
                TokenKind::Identifier("c".into()),
                TokenKind::QuestionDot,
                TokenKind::Identifier("d".into()),
                TokenKind::Spread,
                TokenKind::EqEqEq,
                TokenKind::BangEqEq,
                TokenKind::StarStar,
                TokenKind::PlusPlus,
            ]
        );
        assert_eq!(
            tokenize("x=>x<=1"),
            vec![
                TokenKind::Identifier("x".into()),
                TokenKind::Arrow,
                TokenKind::Identifier("x".into()),
                TokenKind::LtEq,
                TokenKind::Number(1.0),
            ]
        );
    }

    #[test]
    fn test_conditional_before_fraction() {
        assert_eq!(
            tokenize("a?.5:b"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Question,
                TokenKind::Number(0.5),
                TokenKind::Colon,
                TokenKind::Identifier("b".into()),
            ]
        );
    }

    #[test]
    fn test_escapes() {
        assert_eq!(
            tokenize(r#""\x41\u0042\u{1F600}\u{43}""#),
            vec![TokenKind::String("AB\u{1F600}C".into())]
        );
        assert!(matches!(tokenize("@")[0], TokenKind::Invalid(_)));
    }

    #[test]
    fn test_comments_and_newlines() {
        let mut lexer = Lexer::new("a // line comment\nb /* block */ c");
        assert!(!lexer.next_token().had_newline_before);
        let b = lexer.next_token();
        assert_eq!(b.kind, TokenKind::Identifier("b".into()));
        assert!(b.had_newline_before);
        let c = lexer.next_token();
        assert!(!c.had_newline_before);
        assert_eq!(c.span, Span::new(32, 33));
    }

    #[test]
    fn test_regex_rescan() {
        let mut lexer = Lexer::new("/ab+c/gi.test(x)");
        let slash = lexer.next_token();
        assert_eq!(slash.kind, TokenKind::Slash);
        let regex = lexer.rescan_regex(slash.span);
        assert_eq!(
            regex.kind,
            TokenKind::Regex { pattern: "ab+c".into(), flags: "gi".into() }
        );
        assert_eq!(lexer.next_token().kind, TokenKind::Dot);
    }

    #[test]
    fn test_template_parts() {
        let mut lexer = Lexer::new("`a${b}c`");
        assert_eq!(lexer.next_token().kind, TokenKind::TemplateHead("a".into()));
        assert_eq!(lexer.next_token().kind, TokenKind::Identifier("b".into()));
        let rbrace = lexer.next_token();
        assert_eq!(rbrace.kind, TokenKind::RBrace);
        let tail = lexer.rescan_template_continuation(rbrace.span);
        assert_eq!(tail.kind, TokenKind::TemplateTail("c".into()));
        assert_eq!(tail.span, Span::new(5, 8));
    }

    #[test]
    fn test_template_literal_no_sub() {
        assert_eq!(
            tokenize("`hello world`"),
            vec![TokenKind::TemplateNoSub("hello world".into())]
        );
    }
}
