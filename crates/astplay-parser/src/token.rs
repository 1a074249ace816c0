//! Token types for JavaScript.
//!
//! Only reserved words get their own kind. Contextual words such as `let`,
//! `async`, `of`, `get` or `from` stay identifiers and the parser checks
//! them by name, so they remain usable as binding names.

use crate::span::Span;

/// A token with its kind and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// A line terminator appeared between the previous token and this one.
    pub had_newline_before: bool,
}

impl Token {
    /// Create a new token.
    #[inline]
    pub const fn new(kind: TokenKind, span: Span, had_newline_before: bool) -> Self {
        Self {
            kind,
            span,
            had_newline_before,
        }
    }

    /// The identifier name if this token is an identifier with that name.
    pub fn is_word(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Identifier(name) if name == word)
    }
}

/// The kind of token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // === Literals ===
    /// Identifier: `foo`, `_bar`, `$baz`
    Identifier(String),
    /// String literal: `"hello"`, `'world'`
    String(String),
    /// Number literal: `42`, `3.14`, `0xff`
    Number(f64),
    /// BigInt literal: `42n`
    BigInt(String),
    /// Regular expression: `/pattern/flags` (only produced on rescan)
    Regex { pattern: String, flags: String },
    /// Template literal part (no substitutions)
    TemplateNoSub(String),
    /// Template head: `` `hello ${``
    TemplateHead(String),
    /// Template middle: `` } middle ${``
    TemplateMiddle(String),
    /// Template tail: `` } end` ``
    TemplateTail(String),

    // === Keywords ===
    // Declarations
    Var,
    Const,
    Function,
    Class,

    // Control flow
    If,
    Else,
    Switch,
    Case,
    Default,
    For,
    While,
    Do,
    Break,
    Continue,
    Return,

    // Exception handling
    Try,
    Catch,
    Finally,
    Throw,

    // Operators as keywords
    New,
    Delete,
    Typeof,
    Void,
    In,
    Instanceof,

    // Values
    This,
    Super,
    Null,
    True,
    False,

    // Modules
    Import,
    Export,

    // Classes
    Extends,

    // Other
    With,
    Debugger,

    // === Punctuation ===
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Colon,
    Dot,
    Question,
    Hash,
    Arrow,
    Spread,
    QuestionDot,

    // === Operators ===
    // Assignment
    Eq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    StarStarEq,
    AmpEq,
    PipeEq,
    CaretEq,
    LtLtEq,
    GtGtEq,
    GtGtGtEq,
    AmpAmpEq,
    PipePipeEq,
    QuestionQuestionEq,

    // Comparison
    EqEq,
    EqEqEq,
    BangEq,
    BangEqEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    StarStar,
    PlusPlus,
    MinusMinus,

    // Bitwise
    Amp,
    Pipe,
    Caret,
    Tilde,
    LtLt,
    GtGt,
    GtGtGt,

    // Logical
    AmpAmp,
    PipePipe,
    Bang,
    QuestionQuestion,

    // === Special ===
    /// End of file
    Eof,
    /// Invalid token (lexer error); carries a description.
    Invalid(String),
}

impl TokenKind {
    /// Check if this is a reserved word.
    pub fn is_keyword(&self) -> bool {
        self.keyword_str().is_some()
    }

    /// Source text of a reserved word.
    pub fn keyword_str(&self) -> Option<&'static str> {
        keyword_text(self)
    }

    /// Check if this is an assignment operator.
    pub fn is_assignment(&self) -> bool {
        matches!(self, TokenKind::Eq) || self.compound_assignment_base().is_some()
    }

    /// For `op=` operators, the binary or logical operator applied before
    /// assigning: `+=` gives `+`.
    pub fn compound_assignment_base(&self) -> Option<&'static str> {
        let text = punctuator_text(self)?;
        let base = text.strip_suffix('=')?;
        match base {
            "" | "=" | "==" | "!" | "!=" | "<" | ">" => None,
            _ => Some(base),
        }
    }

    /// Get the precedence of a binary operator (higher = binds tighter).
    /// Returns None if not a binary operator.
    pub fn binary_precedence(&self) -> Option<u8> {
        let level = match self {
            TokenKind::QuestionQuestion => 1,
            TokenKind::PipePipe => 2,
            TokenKind::AmpAmp => 3,
            TokenKind::Pipe => 4,
            TokenKind::Caret => 5,
            TokenKind::Amp => 6,
            TokenKind::EqEq | TokenKind::EqEqEq | TokenKind::BangEq | TokenKind::BangEqEq => 7,
            TokenKind::Lt
            | TokenKind::LtEq
            | TokenKind::Gt
            | TokenKind::GtEq
            | TokenKind::In
            | TokenKind::Instanceof => 8,
            TokenKind::LtLt | TokenKind::GtGt | TokenKind::GtGtGt => 9,
            TokenKind::Plus | TokenKind::Minus => 10,
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => 11,
            TokenKind::StarStar => 12,
            _ => return None,
        };
        Some(level)
    }

    /// Check if this binary operator is right associative.
    pub fn is_right_associative(&self) -> bool {
        matches!(self, TokenKind::StarStar)
    }

    /// Human readable description used in error messages.
    pub fn describe(&self) -> String {
        if let Some(text) = keyword_text(self).or_else(|| punctuator_text(self)) {
            return format!("'{text}'");
        }
        match self {
            TokenKind::Identifier(name) => format!("identifier '{name}'"),
            TokenKind::String(_) => "string".to_string(),
            TokenKind::Number(_) => "number".to_string(),
            TokenKind::BigInt(_) => "bigint".to_string(),
            TokenKind::Regex { .. } => "regular expression".to_string(),
            TokenKind::TemplateNoSub(_)
            | TokenKind::TemplateHead(_)
            | TokenKind::TemplateMiddle(_)
            | TokenKind::TemplateTail(_) => "template".to_string(),
            TokenKind::Invalid(reason) => reason.clone(),
            _ => "end of input".to_string(),
        }
    }
}

/// Declares a two-way mapping between fixed source text and token kinds.
macro_rules! token_table {
    ($to_text:ident, $from_text:ident { $($text:literal => $kind:ident,)* }) => {
        /// Source text of `kind`, if it belongs to this table.
        pub fn $to_text(kind: &TokenKind) -> Option<&'static str> {
            match kind {
                $(TokenKind::$kind => Some($text),)*
                _ => None,
            }
        }

        /// The token kind spelled exactly `text`.
        pub fn $from_text(text: &str) -> Option<TokenKind> {
            match text {
                $($text => Some(TokenKind::$kind),)*
                _ => None,
            }
        }
    };
}

token_table!(keyword_text, keyword_from_str {
    "var" => Var,
    "const" => Const,
    "function" => Function,
    "class" => Class,
    "if" => If,
    "else" => Else,
    "switch" => Switch,
    "case" => Case,
    "default" => Default,
    "for" => For,
    "while" => While,
    "do" => Do,
    "break" => Break,
    "continue" => Continue,
    "return" => Return,
    "try" => Try,
    "catch" => Catch,
    "finally" => Finally,
    "throw" => Throw,
    "new" => New,
    "delete" => Delete,
    "typeof" => Typeof,
    "void" => Void,
    "in" => In,
    "instanceof" => Instanceof,
    "this" => This,
    "super" => Super,
    "null" => Null,
    "true" => True,
    "false" => False,
    "import" => Import,
    "export" => Export,
    "extends" => Extends,
    "with" => With,
    "debugger" => Debugger,
});

token_table!(punctuator_text, punctuator_from_str {
    "(" => LParen,
    ")" => RParen,
    "{" => LBrace,
    "}" => RBrace,
    "[" => LBracket,
    "]" => RBracket,
    ";" => Semicolon,
    "," => Comma,
    ":" => Colon,
    "." => Dot,
    "?" => Question,
    "#" => Hash,
    "=>" => Arrow,
    "..." => Spread,
    "?." => QuestionDot,
    "=" => Eq,
    "+=" => PlusEq,
    "-=" => MinusEq,
    "*=" => StarEq,
    "/=" => SlashEq,
    "%=" => PercentEq,
    "**=" => StarStarEq,
    "&=" => AmpEq,
    "|=" => PipeEq,
    "^=" => CaretEq,
    "<<=" => LtLtEq,
    ">>=" => GtGtEq,
    ">>>=" => GtGtGtEq,
    "&&=" => AmpAmpEq,
    "||=" => PipePipeEq,
    "??=" => QuestionQuestionEq,
    "==" => EqEq,
    "===" => EqEqEq,
    "!=" => BangEq,
    "!==" => BangEqEq,
    "<" => Lt,
    "<=" => LtEq,
    ">" => Gt,
    ">=" => GtEq,
    "+" => Plus,
    "-" => Minus,
    "*" => Star,
    "/" => Slash,
    "%" => Percent,
    "**" => StarStar,
    "++" => PlusPlus,
    "--" => MinusMinus,
    "&" => Amp,
    "|" => Pipe,
    "^" => Caret,
    "~" => Tilde,
    "<<" => LtLt,
    ">>" => GtGt,
    ">>>" => GtGtGt,
    "&&" => AmpAmp,
    "||" => PipePipe,
    "!" => Bang,
    "??" => QuestionQuestion,
});

/// Length of the longest punctuator (`>>>=`).
pub const MAX_PUNCTUATOR_LEN: usize = 4;

/// Source text of a punctuator or operator token, or `""` for other kinds.
pub fn punctuator_str(kind: &TokenKind) -> &'static str {
    punctuator_text(kind).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_round_trip() {
        for word in ["var", "instanceof", "debugger"] {
            let kind = keyword_from_str(word).unwrap();
            assert_eq!(kind.keyword_str(), Some(word));
        }
        for text in [">>>=", "...", "?.", "??=", "~"] {
            let kind = punctuator_from_str(text).unwrap();
            assert_eq!(punctuator_str(&kind), text);
        }
        assert_eq!(keyword_from_str("let"), None);
        assert_eq!(punctuator_from_str("@"), None);
    }

    #[test]
    fn test_compound_assignment() {
        assert_eq!(TokenKind::PlusEq.compound_assignment_base(), Some("+"));
        assert_eq!(TokenKind::GtGtGtEq.compound_assignment_base(), Some(">>>"));
        assert_eq!(TokenKind::QuestionQuestionEq.compound_assignment_base(), Some("??"));
        assert_eq!(TokenKind::EqEqEq.compound_assignment_base(), None);
        assert_eq!(TokenKind::LtEq.compound_assignment_base(), None);
        assert!(TokenKind::Eq.is_assignment());
        assert!(TokenKind::AmpAmpEq.is_assignment());
        assert!(!TokenKind::BangEq.is_assignment());
    }

    #[test]
    fn test_describe() {
        assert_eq!(TokenKind::Return.describe(), "'return'");
        assert_eq!(TokenKind::Arrow.describe(), "'=>'");
        assert_eq!(TokenKind::Identifier("x".into()).describe(), "identifier 'x'");
        assert_eq!(TokenKind::Eof.describe(), "end of input");
    }
}
