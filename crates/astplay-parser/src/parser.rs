//! JavaScript parser.
//!
//! Recursive descent for statements, precedence climbing for binary
//! operators. Arrow parameters and destructuring assignments are parsed as
//! expressions first and converted to patterns once `=>` or `=` shows up.
//!
//! Every node span runs from the start of its first token to the end of its
//! last token (`prev_end`), so child spans always nest inside their parents.

use crate::ast::*;
use crate::lexer::Lexer;
use crate::span::{LineIndex, Position, Span};
use crate::token::{Token, TokenKind};

/// Parser configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// Parse as ECMAScript module (enables import/export and top-level await).
    pub module: bool,
    /// Accept `return` at the top level.
    pub allow_return_outside_function: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            module: true,
            allow_return_outside_function: false,
        }
    }
}

impl ParserOptions {
    /// Options for classic scripts.
    pub fn script() -> Self {
        Self {
            module: false,
            ..Self::default()
        }
    }
}

/// Parse error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    /// 1-indexed position of `span.start`.
    pub position: Position,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span, source: &str) -> Self {
        let position = LineIndex::new(source)
            .position(span.start)
            .unwrap_or(Position::new(1, 1));
        Self {
            message: message.into(),
            span,
            position,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.position)
    }
}

impl std::error::Error for ParseError {}

type PResult<T> = Result<T, ParseError>;

/// Deepest syntactic nesting accepted before parsing gives up. Every
/// recursive walk over the AST stays within the caller's stack below it.
pub const MAX_NESTING_DEPTH: u32 = 128;

/// Function context flags, saved and restored around function bodies.
#[derive(Debug, Clone, Copy)]
struct FnContext {
    in_function: bool,
    in_async: bool,
    in_generator: bool,
}

/// The parser.
pub struct Parser<'a> {
    /// The lexer.
    lexer: Lexer<'a>,
    /// Current token.
    current: Token,
    /// End of the last consumed token.
    prev_end: u32,
    /// Parser options.
    options: ParserOptions,
    /// Source code.
    source: &'a str,
    /// When false, `in` is not parsed as a binary operator (for-in init).
    allow_in: bool,
    ctx: FnContext,
    /// Open statements, assignment expressions and patterns.
    depth: u32,
}

impl<'a> Parser<'a> {
    /// Create a new parser.
    pub fn new(source: &'a str, options: ParserOptions) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        let ctx = FnContext {
            in_function: false,
            in_async: options.module,
            in_generator: false,
        };
        Self {
            lexer,
            current,
            prev_end: 0,
            options,
            source,
            allow_in: true,
            ctx,
            depth: 0,
        }
    }

    /// Parse the entire source into an AST.
    pub fn parse(mut self) -> PResult<Ast> {
        let mut body = Vec::new();
        while !self.is_eof() {
            body.push(self.parse_stmt()?);
        }
        let source_type = if self.options.module {
            SourceType::Module
        } else {
            SourceType::Script
        };
        let program = Program {
            body,
            source_type,
            span: Span::new(0, self.source.len() as u32),
        };
        Ok(Ast::new(program, self.source))
    }

    /// Parse a single expression spanning the whole source.
    pub fn parse_expression(mut self) -> PResult<Expr> {
        let expr = self.parse_expr()?;
        if !self.is_eof() {
            return Err(self.unexpected());
        }
        Ok(expr)
    }

    // =========================================================================
    // Token Handling
    // =========================================================================

    fn peek(&self) -> &TokenKind {
        &self.current.kind
    }

    /// Advance to the next token and return the previous.
    fn advance(&mut self) -> Token {
        self.prev_end = self.current.span.end;
        std::mem::replace(&mut self.current, self.lexer.next_token())
    }

    /// Check if the current token matches the given kind.
    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(kind)
    }

    fn is_word(&self, word: &str) -> bool {
        self.current.is_word(word)
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    /// Consume a token if it matches, otherwise return an error.
    fn expect(&mut self, kind: &TokenKind) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else if let TokenKind::Invalid(_) = self.peek() {
            Err(self.unexpected())
        } else {
            Err(self.error(
                format!(
                    "Unexpected token, expected \"{}\"",
                    crate::token::punctuator_str(kind)
                ),
                self.current.span,
            ))
        }
    }

    fn expect_word(&mut self, word: &str) -> PResult<()> {
        if self.is_word(word) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(
                format!("Unexpected token, expected \"{word}\""),
                self.current.span,
            ))
        }
    }

    /// Consume a token if it matches, returning true if consumed.
    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume a semicolon (with ASI support).
    fn expect_semicolon(&mut self) -> PResult<()> {
        if self.eat(&TokenKind::Semicolon) {
            return Ok(());
        }
        if self.check(&TokenKind::RBrace) || self.is_eof() || self.current.had_newline_before {
            return Ok(());
        }
        Err(self.error("Missing semicolon.", Span::empty(self.prev_end)))
    }

    /// True where ASI would end a statement before the current token.
    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
        ) || self.current.had_newline_before
    }

    fn finish(&self, start: u32) -> Span {
        Span::new(start, self.prev_end.max(start))
    }

    fn error(&self, message: impl Into<String>, span: Span) -> ParseError {
        ParseError::new(message, span, self.source)
    }

    fn unexpected(&self) -> ParseError {
        match self.peek() {
            TokenKind::Invalid(message) => self.error(message.clone(), self.current.span),
            _ => self.error("Unexpected token", self.current.span),
        }
    }

    fn with_allow_in<T>(&mut self, allow: bool, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        let saved = std::mem::replace(&mut self.allow_in, allow);
        let result = f(self);
        self.allow_in = saved;
        result
    }

    /// Run `f` one nesting level deeper, failing past `MAX_NESTING_DEPTH`.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error("Maximum nesting depth exceeded", self.current.span));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn with_fn_context<T>(&mut self, ctx: FnContext, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        let saved = std::mem::replace(&mut self.ctx, ctx);
        let result = f(self);
        self.ctx = saved;
        result
    }

    /// Identifier, or any reserved word (property names, export names).
    fn parse_identifier_name(&mut self) -> PResult<Ident> {
        let span = self.current.span;
        let name = match self.peek() {
            TokenKind::Identifier(name) => name.clone(),
            kind => match kind.keyword_str() {
                Some(word) => word.to_string(),
                None => return Err(self.unexpected()),
            },
        };
        self.advance();
        Ok(Ident::new(name, span))
    }

    /// Identifier usable as a binding or reference.
    fn parse_binding_ident(&mut self) -> PResult<Ident> {
        match self.peek() {
            TokenKind::Identifier(name) => {
                let ident = Ident::new(name.clone(), self.current.span);
                self.advance();
                Ok(ident)
            }
            kind if kind.is_keyword() => Err(self.error(
                format!("Unexpected keyword '{}'", kind.keyword_str().unwrap_or_default()),
                self.current.span,
            )),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_string_literal(&mut self) -> PResult<Expr> {
        match self.peek() {
            TokenKind::String(value) => {
                let expr = Expr::new(ExprKind::String(value.clone()), self.current.span);
                self.advance();
                Ok(expr)
            }
            _ => Err(self.unexpected()),
        }
    }

    // =========================================================================
    // Statement Parsing
    // =========================================================================

    /// Parse a statement.
    fn parse_stmt(&mut self) -> PResult<Stmt> {
        self.nested(Self::parse_stmt_kind)
    }

    fn parse_stmt_kind(&mut self) -> PResult<Stmt> {
        let start = self.current.span.start;

        match self.peek().clone() {
            // Declarations
            TokenKind::Var | TokenKind::Const => self.parse_var_stmt(),
            TokenKind::Identifier(name) if name == "let" && self.let_starts_declaration() => {
                self.parse_var_stmt()
            }
            TokenKind::Identifier(name) if name == "async" && self.async_function_ahead() => {
                self.advance();
                let function = self.parse_function(start, true, true)?;
                Ok(Stmt::new(StmtKind::Function(Box::new(function)), self.finish(start)))
            }
            TokenKind::Function => {
                let function = self.parse_function(start, false, true)?;
                Ok(Stmt::new(StmtKind::Function(Box::new(function)), self.finish(start)))
            }
            TokenKind::Class => {
                let class = self.parse_class(start, true)?;
                Ok(Stmt::new(StmtKind::Class(Box::new(class)), self.finish(start)))
            }

            // Control flow
            TokenKind::If => self.parse_if_stmt(),
            TokenKind::Switch => self.parse_switch_stmt(),
            TokenKind::For => self.parse_for_stmt(),
            TokenKind::While => self.parse_while_stmt(),
            TokenKind::Do => self.parse_do_while_stmt(),
            TokenKind::Break | TokenKind::Continue => self.parse_jump_stmt(),
            TokenKind::Return => self.parse_return_stmt(),
            TokenKind::Throw => self.parse_throw_stmt(),
            TokenKind::Try => self.parse_try_stmt(),
            TokenKind::Debugger => {
                self.advance();
                self.expect_semicolon()?;
                Ok(Stmt::new(StmtKind::Debugger, self.finish(start)))
            }
            TokenKind::With => Err(self.error(
                "'with' statements are not supported",
                self.current.span,
            )),

            // Block
            TokenKind::LBrace => {
                let block = self.parse_block()?;
                let span = block.span;
                Ok(Stmt::new(StmtKind::Block(block), span))
            }

            // Empty statement
            TokenKind::Semicolon => {
                self.advance();
                Ok(Stmt::new(StmtKind::Empty, self.finish(start)))
            }

            // Module declarations; `import(` and `import.meta` are expressions
            TokenKind::Import
                if !matches!(self.lexer.peek().kind, TokenKind::LParen | TokenKind::Dot) =>
            {
                self.parse_import_decl()
            }
            TokenKind::Export => self.parse_export_decl(),

            // Labeled statement
            TokenKind::Identifier(_) if matches!(self.lexer.peek().kind, TokenKind::Colon) => {
                let label = self.parse_binding_ident()?;
                self.advance(); // consume ':'
                let body = self.parse_stmt()?;
                Ok(Stmt::new(
                    StmtKind::Labeled { label, body: Box::new(body) },
                    self.finish(start),
                ))
            }

            // Expression statement
            _ => self.parse_expr_stmt(),
        }
    }

    /// `let` followed by a binding starts a declaration; otherwise it is an identifier.
    fn let_starts_declaration(&mut self) -> bool {
        matches!(
            self.lexer.peek().kind,
            TokenKind::Identifier(_) | TokenKind::LBracket | TokenKind::LBrace
        )
    }

    fn async_function_ahead(&mut self) -> bool {
        let next = self.lexer.peek();
        matches!(next.kind, TokenKind::Function) && !next.had_newline_before
    }

    /// Parse a `{ ... }` block.
    fn parse_block(&mut self) -> PResult<Block> {
        let start = self.current.span.start;
        self.expect(&TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_eof() {
            body.push(self.parse_stmt()?);
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Block { body, span: self.finish(start) })
    }

    fn parse_var_stmt(&mut self) -> PResult<Stmt> {
        let start = self.current.span.start;
        let mut decl = self.parse_var_decl()?;
        self.expect_semicolon()?;
        decl.span = self.finish(start);
        let span = decl.span;
        Ok(Stmt::new(StmtKind::Var(decl), span))
    }

    /// Parse `var`/`let`/`const` declarators (no trailing semicolon).
    fn parse_var_decl(&mut self) -> PResult<VarDecl> {
        let start = self.current.span.start;
        let kind = match self.peek() {
            TokenKind::Var => VarKind::Var,
            TokenKind::Const => VarKind::Const,
            _ => VarKind::Let,
        };
        self.advance();

        let mut declarations = Vec::new();
        loop {
            declarations.push(self.parse_var_declarator()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }

        Ok(VarDecl {
            kind,
            declarations,
            span: self.finish(start),
        })
    }

    fn parse_var_declarator(&mut self) -> PResult<VarDeclarator> {
        let start = self.current.span.start;
        let id = self.parse_binding_pattern()?;
        let init = if self.eat(&TokenKind::Eq) {
            Some(self.parse_assign_expr()?)
        } else {
            None
        };
        Ok(VarDeclarator {
            id,
            init,
            span: self.finish(start),
        })
    }

    fn parse_if_stmt(&mut self) -> PResult<Stmt> {
        let start = self.current.span.start;
        self.expect(&TokenKind::If)?;
        self.expect(&TokenKind::LParen)?;
        let test = self.with_allow_in(true, Self::parse_expr)?;
        self.expect(&TokenKind::RParen)?;
        let consequent = Box::new(self.parse_stmt()?);
        let alternate = if self.eat(&TokenKind::Else) {
            Some(Box::new(self.parse_stmt()?))
        } else {
            None
        };
        Ok(Stmt::new(
            StmtKind::If { test, consequent, alternate },
            self.finish(start),
        ))
    }

    fn parse_switch_stmt(&mut self) -> PResult<Stmt> {
        let start = self.current.span.start;
        self.expect(&TokenKind::Switch)?;
        self.expect(&TokenKind::LParen)?;
        let discriminant = self.with_allow_in(true, Self::parse_expr)?;
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::LBrace)?;

        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.check(&TokenKind::RBrace) && !self.is_eof() {
            let case_start = self.current.span.start;
            let test = if self.eat(&TokenKind::Case) {
                Some(self.with_allow_in(true, Self::parse_expr)?)
            } else if self.check(&TokenKind::Default) {
                if seen_default {
                    return Err(self.error("Multiple default clauses", self.current.span));
                }
                seen_default = true;
                self.advance();
                None
            } else {
                return Err(self.unexpected());
            };
            self.expect(&TokenKind::Colon)?;

            let mut consequent = Vec::new();
            while !matches!(
                self.peek(),
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
            ) {
                consequent.push(self.parse_stmt()?);
            }
            cases.push(SwitchCase {
                test,
                consequent,
                span: self.finish(case_start),
            });
        }
        self.expect(&TokenKind::RBrace)?;

        Ok(Stmt::new(
            StmtKind::Switch { discriminant, cases },
            self.finish(start),
        ))
    }

    fn parse_for_stmt(&mut self) -> PResult<Stmt> {
        let start = self.current.span.start;
        self.expect(&TokenKind::For)?;
        let is_await = if self.is_word("await") && self.ctx.in_async {
            self.advance();
            true
        } else {
            false
        };
        self.expect(&TokenKind::LParen)?;

        let mut init = None;
        if !self.check(&TokenKind::Semicolon) {
            let starts_decl = matches!(self.peek(), TokenKind::Var | TokenKind::Const)
                || (self.is_word("let") && self.let_starts_declaration());
            if starts_decl {
                let decl = self.with_allow_in(false, Self::parse_var_decl)?;
                if self.is_word("of") || self.check(&TokenKind::In) {
                    if decl.declarations.len() != 1 {
                        return Err(self.error(
                            "Only a single variable declaration is allowed in a for-in/for-of statement",
                            decl.span,
                        ));
                    }
                    return self.parse_for_in_of(start, ForHead::Var(decl), is_await);
                }
                init = Some(ForInit::Var(decl));
            } else {
                let expr = self.with_allow_in(false, Self::parse_expr)?;
                if self.is_word("of") || self.check(&TokenKind::In) {
                    let pattern = self.expr_to_pattern(expr)?;
                    return self.parse_for_in_of(start, ForHead::Pattern(pattern), is_await);
                }
                init = Some(ForInit::Expr(expr));
            }
        }

        self.expect(&TokenKind::Semicolon)?;
        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.with_allow_in(true, Self::parse_expr)?)
        };
        self.expect(&TokenKind::Semicolon)?;
        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.with_allow_in(true, Self::parse_expr)?)
        };
        self.expect(&TokenKind::RParen)?;
        let body = Box::new(self.parse_stmt()?);

        Ok(Stmt::new(
            StmtKind::For { init, test, update, body },
            self.finish(start),
        ))
    }

    fn parse_for_in_of(&mut self, start: u32, left: ForHead, is_await: bool) -> PResult<Stmt> {
        let is_of = self.is_word("of");
        self.advance(); // `of` / `in`
        let right = if is_of {
            self.with_allow_in(true, Self::parse_assign_expr)?
        } else {
            self.with_allow_in(true, Self::parse_expr)?
        };
        self.expect(&TokenKind::RParen)?;
        let body = Box::new(self.parse_stmt()?);
        let kind = if is_of {
            StmtKind::ForOf { left, right, body, is_await }
        } else {
            StmtKind::ForIn { left, right, body }
        };
        Ok(Stmt::new(kind, self.finish(start)))
    }

    fn parse_while_stmt(&mut self) -> PResult<Stmt> {
        let start = self.current.span.start;
        self.expect(&TokenKind::While)?;
        self.expect(&TokenKind::LParen)?;
        let test = self.with_allow_in(true, Self::parse_expr)?;
        self.expect(&TokenKind::RParen)?;
        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt::new(StmtKind::While { test, body }, self.finish(start)))
    }

    fn parse_do_while_stmt(&mut self) -> PResult<Stmt> {
        let start = self.current.span.start;
        self.expect(&TokenKind::Do)?;
        let body = Box::new(self.parse_stmt()?);
        self.expect(&TokenKind::While)?;
        self.expect(&TokenKind::LParen)?;
        let test = self.with_allow_in(true, Self::parse_expr)?;
        self.expect(&TokenKind::RParen)?;
        self.eat(&TokenKind::Semicolon);
        Ok(Stmt::new(StmtKind::DoWhile { body, test }, self.finish(start)))
    }

    fn parse_jump_stmt(&mut self) -> PResult<Stmt> {
        let start = self.current.span.start;
        let is_break = self.check(&TokenKind::Break);
        self.advance();
        let label = if matches!(self.peek(), TokenKind::Identifier(_)) && !self.current.had_newline_before {
            Some(self.parse_binding_ident()?)
        } else {
            None
        };
        self.expect_semicolon()?;
        let kind = if is_break {
            StmtKind::Break { label }
        } else {
            StmtKind::Continue { label }
        };
        Ok(Stmt::new(kind, self.finish(start)))
    }

    fn parse_return_stmt(&mut self) -> PResult<Stmt> {
        let start = self.current.span.start;
        if !self.ctx.in_function && !self.options.allow_return_outside_function {
            return Err(self.error("'return' outside of function.", self.current.span));
        }
        self.expect(&TokenKind::Return)?;
        let argument = if self.at_statement_end() {
            None
        } else {
            Some(self.with_allow_in(true, Self::parse_expr)?)
        };
        self.expect_semicolon()?;
        Ok(Stmt::new(StmtKind::Return { argument }, self.finish(start)))
    }

    fn parse_throw_stmt(&mut self) -> PResult<Stmt> {
        let start = self.current.span.start;
        self.expect(&TokenKind::Throw)?;
        if self.current.had_newline_before {
            return Err(self.error("Illegal newline after throw", self.current.span));
        }
        let argument = self.with_allow_in(true, Self::parse_expr)?;
        self.expect_semicolon()?;
        Ok(Stmt::new(StmtKind::Throw { argument }, self.finish(start)))
    }

    fn parse_try_stmt(&mut self) -> PResult<Stmt> {
        let start = self.current.span.start;
        self.expect(&TokenKind::Try)?;
        let block = self.parse_block()?;

        let handler = if self.check(&TokenKind::Catch) {
            let catch_start = self.current.span.start;
            self.advance();
            let param = if self.eat(&TokenKind::LParen) {
                let param = self.parse_binding_pattern()?;
                self.expect(&TokenKind::RParen)?;
                Some(param)
            } else {
                None
            };
            let body = self.parse_block()?;
            Some(CatchClause {
                param,
                body,
                span: self.finish(catch_start),
            })
        } else {
            None
        };

        let finalizer = if self.eat(&TokenKind::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(self.error("Missing catch or finally clause", self.current.span));
        }

        Ok(Stmt::new(
            StmtKind::Try { block, handler, finalizer },
            self.finish(start),
        ))
    }

    fn parse_expr_stmt(&mut self) -> PResult<Stmt> {
        let start = self.current.span.start;
        let expr = self.with_allow_in(true, Self::parse_expr)?;
        self.expect_semicolon()?;
        Ok(Stmt::new(StmtKind::Expr(expr), self.finish(start)))
    }

    // =========================================================================
    // Modules
    // =========================================================================

    fn require_module(&self) -> PResult<()> {
        if self.options.module {
            Ok(())
        } else {
            Err(self.error(
                "'import' and 'export' may appear only with 'sourceType: \"module\"'",
                self.current.span,
            ))
        }
    }

    fn parse_import_decl(&mut self) -> PResult<Stmt> {
        let start = self.current.span.start;
        self.require_module()?;
        self.expect(&TokenKind::Import)?;

        let mut specifiers = Vec::new();
        if !matches!(self.peek(), TokenKind::String(_)) {
            if matches!(self.peek(), TokenKind::Identifier(_)) {
                let local = self.parse_binding_ident()?;
                let span = local.span;
                specifiers.push(ImportSpecifier {
                    kind: ImportSpecifierKind::Default(local),
                    span,
                });
                if !self.eat(&TokenKind::Comma) {
                    return self.finish_import(start, specifiers);
                }
            }

            if self.check(&TokenKind::Star) {
                let spec_start = self.current.span.start;
                self.advance();
                self.expect_word("as")?;
                let local = self.parse_binding_ident()?;
                specifiers.push(ImportSpecifier {
                    kind: ImportSpecifierKind::Namespace(local),
                    span: self.finish(spec_start),
                });
            } else if self.eat(&TokenKind::LBrace) {
                while !self.check(&TokenKind::RBrace) {
                    let spec_start = self.current.span.start;
                    let imported = self.parse_identifier_name()?;
                    let local = if self.is_word("as") {
                        self.advance();
                        self.parse_binding_ident()?
                    } else {
                        imported.clone()
                    };
                    specifiers.push(ImportSpecifier {
                        kind: ImportSpecifierKind::Named { imported, local },
                        span: self.finish(spec_start),
                    });
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RBrace)?;
            }
        }
        self.finish_import(start, specifiers)
    }

    fn finish_import(&mut self, start: u32, specifiers: Vec<ImportSpecifier>) -> PResult<Stmt> {
        if !specifiers.is_empty() {
            self.expect_word("from")?;
        }
        let source = self.parse_string_literal()?;
        self.expect_semicolon()?;
        Ok(Stmt::new(
            StmtKind::Import(ImportDecl { specifiers, source }),
            self.finish(start),
        ))
    }

    fn parse_export_decl(&mut self) -> PResult<Stmt> {
        let start = self.current.span.start;
        self.require_module()?;
        self.expect(&TokenKind::Export)?;

        let kind = match self.peek() {
            TokenKind::Default => {
                self.advance();
                let decl_start = self.current.span.start;
                if self.check(&TokenKind::Function) {
                    let function = self.parse_function(decl_start, false, false)?;
                    StmtKind::ExportDefault(ExportDefault::Function(Box::new(function)))
                } else if self.is_word("async") && self.async_function_ahead() {
                    self.advance();
                    let function = self.parse_function(decl_start, true, false)?;
                    StmtKind::ExportDefault(ExportDefault::Function(Box::new(function)))
                } else if self.check(&TokenKind::Class) {
                    let class = self.parse_class(decl_start, false)?;
                    StmtKind::ExportDefault(ExportDefault::Class(Box::new(class)))
                } else {
                    let expr = self.with_allow_in(true, Self::parse_assign_expr)?;
                    self.expect_semicolon()?;
                    StmtKind::ExportDefault(ExportDefault::Expr(expr))
                }
            }
            TokenKind::Star => {
                self.advance();
                let exported = if self.is_word("as") {
                    self.advance();
                    Some(self.parse_identifier_name()?)
                } else {
                    None
                };
                self.expect_word("from")?;
                let source = self.parse_string_literal()?;
                self.expect_semicolon()?;
                StmtKind::ExportAll(ExportAll { exported, source })
            }
            TokenKind::LBrace => {
                self.advance();
                let mut specifiers = Vec::new();
                while !self.check(&TokenKind::RBrace) {
                    let spec_start = self.current.span.start;
                    let local = self.parse_identifier_name()?;
                    let exported = if self.is_word("as") {
                        self.advance();
                        self.parse_identifier_name()?
                    } else {
                        local.clone()
                    };
                    specifiers.push(ExportSpecifier {
                        local,
                        exported,
                        span: self.finish(spec_start),
                    });
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RBrace)?;
                let source = if self.is_word("from") {
                    self.advance();
                    Some(self.parse_string_literal()?)
                } else {
                    None
                };
                self.expect_semicolon()?;
                StmtKind::ExportNamed(ExportNamed {
                    declaration: None,
                    specifiers,
                    source,
                })
            }
            TokenKind::Var | TokenKind::Const | TokenKind::Function | TokenKind::Class => {
                let declaration = Box::new(self.parse_stmt()?);
                StmtKind::ExportNamed(ExportNamed {
                    declaration: Some(declaration),
                    specifiers: Vec::new(),
                    source: None,
                })
            }
            TokenKind::Identifier(_) if self.is_word("let") || self.is_word("async") => {
                let declaration = Box::new(self.parse_stmt()?);
                StmtKind::ExportNamed(ExportNamed {
                    declaration: Some(declaration),
                    specifiers: Vec::new(),
                    source: None,
                })
            }
            _ => return Err(self.unexpected()),
        };

        Ok(Stmt::new(kind, self.finish(start)))
    }

    // =========================================================================
    // Functions and classes
    // =========================================================================

    /// Parse `function name(params) { body }`; `async` is already consumed.
    fn parse_function(&mut self, start: u32, is_async: bool, require_name: bool) -> PResult<Function> {
        self.expect(&TokenKind::Function)?;
        let is_generator = self.eat(&TokenKind::Star);
        let id = if matches!(self.peek(), TokenKind::Identifier(_)) {
            Some(self.parse_binding_ident()?)
        } else if require_name {
            return Err(self.error("A function name is required", self.current.span));
        } else {
            None
        };
        let (params, body) = self.parse_function_rest(is_async, is_generator)?;
        Ok(Function {
            id,
            params,
            body,
            is_async,
            is_generator,
            span: self.finish(start),
        })
    }

    /// Parameters and body of a function or method.
    fn parse_function_rest(&mut self, is_async: bool, is_generator: bool) -> PResult<(Vec<Pattern>, Block)> {
        let ctx = FnContext {
            in_function: true,
            in_async: is_async,
            in_generator: is_generator,
        };
        self.with_fn_context(ctx, |p| {
            let params = p.parse_formal_params()?;
            let body = p.with_allow_in(true, Self::parse_block)?;
            Ok((params, body))
        })
    }

    fn parse_formal_params(&mut self) -> PResult<Vec<Pattern>> {
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) {
            if self.check(&TokenKind::Spread) {
                let start = self.current.span.start;
                self.advance();
                let argument = self.parse_binding_pattern()?;
                params.push(Pattern::new(
                    PatternKind::Rest(Box::new(argument)),
                    self.finish(start),
                ));
                break;
            }
            params.push(self.parse_binding_element()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_method_function(&mut self, start: u32, is_async: bool, is_generator: bool) -> PResult<Function> {
        let (params, body) = self.parse_function_rest(is_async, is_generator)?;
        Ok(Function {
            id: None,
            params,
            body,
            is_async,
            is_generator,
            span: self.finish(start),
        })
    }

    /// Parse `class Name extends Base { ... }`.
    fn parse_class(&mut self, start: u32, require_name: bool) -> PResult<Class> {
        self.expect(&TokenKind::Class)?;
        let id = if matches!(self.peek(), TokenKind::Identifier(_)) {
            Some(self.parse_binding_ident()?)
        } else if require_name {
            return Err(self.error("A class name is required", self.current.span));
        } else {
            None
        };
        let super_class = if self.eat(&TokenKind::Extends) {
            Some(Box::new(self.parse_lhs_expr()?))
        } else {
            None
        };

        let body_start = self.current.span.start;
        self.expect(&TokenKind::LBrace)?;
        let mut members = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_eof() {
            if self.eat(&TokenKind::Semicolon) {
                continue;
            }
            members.push(self.parse_class_member()?);
        }
        self.expect(&TokenKind::RBrace)?;

        Ok(Class {
            id,
            super_class,
            body: ClassBody {
                members,
                span: self.finish(body_start),
            },
            span: self.finish(start),
        })
    }

    /// Whether the current word is a modifier (`static`, `async`, `get`,
    /// `set`) rather than the member name itself.
    fn is_modifier(&mut self, word: &str) -> bool {
        if !self.is_word(word) {
            return false;
        }
        let next = self.lexer.peek();
        let ends_name = matches!(
            next.kind,
            TokenKind::LParen
                | TokenKind::Eq
                | TokenKind::Semicolon
                | TokenKind::RBrace
                | TokenKind::Comma
                | TokenKind::Colon
                | TokenKind::Eof
        );
        !ends_name && !(word == "async" && next.had_newline_before)
    }

    fn parse_class_member(&mut self) -> PResult<ClassMember> {
        let start = self.current.span.start;
        let is_static = if self.is_modifier("static") {
            self.advance();
            true
        } else {
            false
        };
        let (is_async, is_generator, accessor) = self.parse_method_modifiers()?;

        if self.check(&TokenKind::Hash) {
            return Err(self.error("Private class members are not supported", self.current.span));
        }
        let key = self.parse_property_key()?;

        if self.check(&TokenKind::LParen) || is_async || is_generator || accessor.is_some() {
            let fn_start = self.current.span.start;
            let function = self.parse_method_function(fn_start, is_async, is_generator)?;
            let kind = match accessor {
                Some(kind) => kind,
                None if !is_static && key.static_name().as_deref() == Some("constructor") => {
                    MethodKind::Constructor
                }
                None => MethodKind::Method,
            };
            return Ok(ClassMember {
                kind: ClassMemberKind::Method { key, kind, is_static, function },
                span: self.finish(start),
            });
        }

        let value = if self.eat(&TokenKind::Eq) {
            let ctx = FnContext { in_function: true, ..self.ctx };
            Some(self.with_fn_context(ctx, |p| p.with_allow_in(true, Self::parse_assign_expr))?)
        } else {
            None
        };
        self.expect_semicolon()?;
        Ok(ClassMember {
            kind: ClassMemberKind::Property { key, value, is_static },
            span: self.finish(start),
        })
    }

    /// `async`, `*`, `get`, `set` prefixes of object and class methods.
    fn parse_method_modifiers(&mut self) -> PResult<(bool, bool, Option<MethodKind>)> {
        let is_async = if self.is_modifier("async") {
            self.advance();
            true
        } else {
            false
        };
        let is_generator = self.eat(&TokenKind::Star);
        let accessor = if !is_async && !is_generator {
            if self.is_modifier("get") {
                self.advance();
                Some(MethodKind::Get)
            } else if self.is_modifier("set") {
                self.advance();
                Some(MethodKind::Set)
            } else {
                None
            }
        } else {
            None
        };
        Ok((is_async, is_generator, accessor))
    }

    /// Parse an object/class property key.
    fn parse_property_key(&mut self) -> PResult<PropertyKey> {
        match self.peek().clone() {
            TokenKind::String(value) => {
                let span = self.current.span;
                self.advance();
                Ok(PropertyKey::Literal(Expr::new(ExprKind::String(value), span)))
            }
            TokenKind::Number(value) => {
                let span = self.current.span;
                self.advance();
                Ok(PropertyKey::Literal(Expr::new(ExprKind::Number(value), span)))
            }
            TokenKind::LBracket => {
                self.advance();
                let expr = self.with_allow_in(true, Self::parse_assign_expr)?;
                self.expect(&TokenKind::RBracket)?;
                Ok(PropertyKey::Computed(expr))
            }
            _ => Ok(PropertyKey::Ident(self.parse_identifier_name()?)),
        }
    }

    // =========================================================================
    // Binding patterns
    // =========================================================================

    fn parse_binding_pattern(&mut self) -> PResult<Pattern> {
        self.nested(Self::parse_binding_target)
    }

    fn parse_binding_target(&mut self) -> PResult<Pattern> {
        match self.peek() {
            TokenKind::LBracket => self.parse_array_pattern(),
            TokenKind::LBrace => self.parse_object_pattern(),
            _ => {
                let ident = self.parse_binding_ident()?;
                let span = ident.span;
                Ok(Pattern::new(PatternKind::Ident(ident), span))
            }
        }
    }

    /// A binding pattern with an optional `= default`.
    fn parse_binding_element(&mut self) -> PResult<Pattern> {
        let start = self.current.span.start;
        let pattern = self.parse_binding_pattern()?;
        if self.eat(&TokenKind::Eq) {
            let right = self.with_allow_in(true, Self::parse_assign_expr)?;
            return Ok(Pattern::new(
                PatternKind::Assign {
                    left: Box::new(pattern),
                    right: Box::new(right),
                },
                self.finish(start),
            ));
        }
        Ok(pattern)
    }

    fn parse_array_pattern(&mut self) -> PResult<Pattern> {
        let start = self.current.span.start;
        self.expect(&TokenKind::LBracket)?;
        let mut elements = Vec::new();
        while !self.check(&TokenKind::RBracket) {
            if self.eat(&TokenKind::Comma) {
                elements.push(None);
                continue;
            }
            if self.check(&TokenKind::Spread) {
                let rest_start = self.current.span.start;
                self.advance();
                let argument = self.parse_binding_pattern()?;
                elements.push(Some(Pattern::new(
                    PatternKind::Rest(Box::new(argument)),
                    self.finish(rest_start),
                )));
                break;
            }
            elements.push(Some(self.parse_binding_element()?));
            if !self.check(&TokenKind::RBracket) {
                self.expect(&TokenKind::Comma)?;
            }
        }
        self.expect(&TokenKind::RBracket)?;
        Ok(Pattern::new(PatternKind::Array(elements), self.finish(start)))
    }

    fn parse_object_pattern(&mut self) -> PResult<Pattern> {
        let start = self.current.span.start;
        self.expect(&TokenKind::LBrace)?;
        let mut props = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let prop_start = self.current.span.start;
            if self.eat(&TokenKind::Spread) {
                let argument = self.parse_binding_pattern()?;
                props.push(PatternProp::Rest(Pattern::new(
                    PatternKind::Rest(Box::new(argument)),
                    self.finish(prop_start),
                )));
                break;
            }

            let key = self.parse_property_key()?;
            let (value, shorthand) = if self.eat(&TokenKind::Colon) {
                (self.parse_binding_element()?, false)
            } else {
                let PropertyKey::Ident(ident) = &key else {
                    return Err(self.unexpected());
                };
                if ident_is_reserved(&ident.name) {
                    return Err(self.error(
                        format!("Unexpected keyword '{}'", ident.name),
                        ident.span,
                    ));
                }
                let target = Pattern::new(PatternKind::Ident(ident.clone()), ident.span);
                if self.eat(&TokenKind::Eq) {
                    let right = self.with_allow_in(true, Self::parse_assign_expr)?;
                    let pattern = Pattern::new(
                        PatternKind::Assign {
                            left: Box::new(target),
                            right: Box::new(right),
                        },
                        self.finish(prop_start),
                    );
                    (pattern, true)
                } else {
                    (target, true)
                }
            };
            props.push(PatternProp::Prop {
                key,
                value,
                shorthand,
                span: self.finish(prop_start),
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Pattern::new(PatternKind::Object(props), self.finish(start)))
    }

    // =========================================================================
    // Expression Parsing
    // =========================================================================

    /// Parse an expression (with comma operator).
    fn parse_expr(&mut self) -> PResult<Expr> {
        let first = self.parse_assign_expr()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let start = first.span.start;
        let mut expressions = vec![first];
        while self.eat(&TokenKind::Comma) {
            expressions.push(self.parse_assign_expr()?);
        }
        Ok(Expr::new(ExprKind::Sequence(expressions), self.finish(start)))
    }

    /// Parse an assignment expression.
    fn parse_assign_expr(&mut self) -> PResult<Expr> {
        self.nested(Self::parse_assign)
    }

    fn parse_assign(&mut self) -> PResult<Expr> {
        let start = self.current.span.start;

        if self.is_word("yield") && self.ctx.in_generator {
            return self.parse_yield_expr();
        }

        // Single-param arrow: `x => expr`
        if matches!(self.peek(), TokenKind::Identifier(_)) {
            let next = self.lexer.peek();
            if matches!(next.kind, TokenKind::Arrow) && !next.had_newline_before {
                let param = self.parse_binding_pattern()?;
                self.advance(); // eat =>
                return self.parse_arrow_body(vec![param], false, start);
            }
            // `async x => expr`
            if self.is_word("async") && matches!(next.kind, TokenKind::Identifier(_)) && !next.had_newline_before {
                self.advance(); // eat async
                let param = self.parse_binding_pattern()?;
                self.expect(&TokenKind::Arrow)?;
                return self.parse_arrow_body(vec![param], true, start);
            }
        }

        let left = self.parse_conditional_expr()?;

        let Some(op) = self.assign_op() else {
            return Ok(left);
        };
        let target = if op == AssignOp::Assign {
            self.expr_to_pattern(left)?
        } else {
            self.simple_target(left)?
        };
        self.advance();
        let right = self.parse_assign_expr()?;
        Ok(Expr::new(
            ExprKind::Assign {
                op,
                left: Box::new(target),
                right: Box::new(right),
            },
            self.finish(start),
        ))
    }

    fn assign_op(&self) -> Option<AssignOp> {
        operator_text(self.peek()).and_then(AssignOp::from_name)
    }

    fn parse_yield_expr(&mut self) -> PResult<Expr> {
        let start = self.current.span.start;
        self.advance(); // yield
        let delegate = !self.current.had_newline_before && self.eat(&TokenKind::Star);
        let ends = matches!(
            self.peek(),
            TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
                | TokenKind::Comma
                | TokenKind::Semicolon
                | TokenKind::Colon
                | TokenKind::Eof
        ) || (self.current.had_newline_before && !delegate);
        let argument = if ends {
            None
        } else {
            Some(Box::new(self.parse_assign_expr()?))
        };
        Ok(Expr::new(
            ExprKind::Yield { argument, delegate },
            self.finish(start),
        ))
    }

    /// Parse conditional expression (ternary).
    fn parse_conditional_expr(&mut self) -> PResult<Expr> {
        let start = self.current.span.start;
        let test = self.parse_binary_expr(0)?;

        if !self.eat(&TokenKind::Question) {
            return Ok(test);
        }
        let consequent = self.with_allow_in(true, Self::parse_assign_expr)?;
        self.expect(&TokenKind::Colon)?;
        let alternate = self.parse_assign_expr()?;
        Ok(Expr::new(
            ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            self.finish(start),
        ))
    }

    /// Parse binary expression using precedence climbing.
    fn parse_binary_expr(&mut self, min_prec: u8) -> PResult<Expr> {
        let start = self.current.span.start;
        let mut left = self.parse_unary_expr()?;

        loop {
            let Some(prec) = self.peek().binary_precedence() else {
                break;
            };
            if prec < min_prec || (self.check(&TokenKind::In) && !self.allow_in) {
                break;
            }
            let kind = self.peek().clone();
            let next_prec = if kind.is_right_associative() { prec } else { prec + 1 };
            self.advance();
            // Right-associative chains recurse once per operator.
            let right = if kind.is_right_associative() {
                Box::new(self.nested(|p| p.parse_binary_expr(next_prec))?)
            } else {
                Box::new(self.parse_binary_expr(next_prec)?)
            };
            let left_box = Box::new(left);

            let expr_kind = match logical_op(&kind) {
                Some(op) => ExprKind::Logical { op, left: left_box, right },
                None => ExprKind::Binary {
                    op: binary_op(&kind).ok_or_else(|| self.unexpected())?,
                    left: left_box,
                    right,
                },
            };
            left = Expr::new(expr_kind, self.finish(start));
        }

        Ok(left)
    }

    /// Parse unary expression.
    fn parse_unary_expr(&mut self) -> PResult<Expr> {
        let start = self.current.span.start;

        let op = match self.peek() {
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Typeof => Some(UnaryOp::Typeof),
            TokenKind::Void => Some(UnaryOp::Void),
            TokenKind::Delete => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let argument = Box::new(self.nested(Self::parse_unary_expr)?);
            return Ok(Expr::new(ExprKind::Unary { op, argument }, self.finish(start)));
        }

        if matches!(self.peek(), TokenKind::PlusPlus | TokenKind::MinusMinus) {
            let op = if self.check(&TokenKind::PlusPlus) {
                UpdateOp::Increment
            } else {
                UpdateOp::Decrement
            };
            self.advance();
            let argument = self.nested(Self::parse_unary_expr)?;
            self.check_update_target(&argument)?;
            return Ok(Expr::new(
                ExprKind::Update { op, prefix: true, argument: Box::new(argument) },
                self.finish(start),
            ));
        }

        if self.is_word("await") && self.ctx.in_async {
            self.advance();
            let argument = Box::new(self.nested(Self::parse_unary_expr)?);
            return Ok(Expr::new(ExprKind::Await(argument), self.finish(start)));
        }

        self.parse_postfix_expr()
    }

    fn parse_postfix_expr(&mut self) -> PResult<Expr> {
        let start = self.current.span.start;
        let expr = self.parse_lhs_expr()?;

        if matches!(self.peek(), TokenKind::PlusPlus | TokenKind::MinusMinus)
            && !self.current.had_newline_before
        {
            self.check_update_target(&expr)?;
            let op = if self.check(&TokenKind::PlusPlus) {
                UpdateOp::Increment
            } else {
                UpdateOp::Decrement
            };
            self.advance();
            return Ok(Expr::new(
                ExprKind::Update { op, prefix: false, argument: Box::new(expr) },
                self.finish(start),
            ));
        }

        Ok(expr)
    }

    fn check_update_target(&self, expr: &Expr) -> PResult<()> {
        match &expr.kind {
            ExprKind::Ident(_) => Ok(()),
            ExprKind::Member { .. } if !expr.is_optional_chain() => Ok(()),
            _ => Err(self.error("Invalid left-hand side in postfix operation", expr.span)),
        }
    }

    /// Member accesses, calls and tagged templates.
    fn parse_lhs_expr(&mut self) -> PResult<Expr> {
        let start = self.current.span.start;
        let mut expr = if self.check(&TokenKind::New) {
            self.parse_new_expr()?
        } else {
            self.parse_primary_expr()?
        };

        loop {
            let kind = match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    let property = MemberProp::Ident(self.parse_member_name()?);
                    ExprKind::Member { object: Box::new(expr), property, optional: false }
                }
                TokenKind::QuestionDot => {
                    self.advance();
                    match self.peek() {
                        TokenKind::LParen => {
                            let arguments = self.parse_arguments()?;
                            ExprKind::Call { callee: Box::new(expr), arguments, optional: true }
                        }
                        TokenKind::LBracket => {
                            let property = self.parse_computed_member()?;
                            ExprKind::Member { object: Box::new(expr), property, optional: true }
                        }
                        _ => {
                            let property = MemberProp::Ident(self.parse_member_name()?);
                            ExprKind::Member { object: Box::new(expr), property, optional: true }
                        }
                    }
                }
                TokenKind::LBracket => {
                    let property = self.parse_computed_member()?;
                    ExprKind::Member { object: Box::new(expr), property, optional: false }
                }
                TokenKind::LParen => {
                    let arguments = self.parse_arguments()?;
                    ExprKind::Call { callee: Box::new(expr), arguments, optional: false }
                }
                TokenKind::TemplateNoSub(_) | TokenKind::TemplateHead(_) => {
                    if expr.is_optional_chain() {
                        return Err(self.error(
                            "Tagged template cannot be used in optional chain",
                            self.current.span,
                        ));
                    }
                    let quasi = self.parse_template()?;
                    ExprKind::TaggedTemplate { tag: Box::new(expr), quasi }
                }
                _ => break,
            };
            expr = Expr::new(kind, self.finish(start));
        }

        Ok(expr)
    }

    fn parse_member_name(&mut self) -> PResult<Ident> {
        if self.check(&TokenKind::Hash) {
            return Err(self.error("Private names are not supported", self.current.span));
        }
        self.parse_identifier_name()
    }

    fn parse_computed_member(&mut self) -> PResult<MemberProp> {
        self.expect(&TokenKind::LBracket)?;
        let property = self.with_allow_in(true, Self::parse_expr)?;
        self.expect(&TokenKind::RBracket)?;
        Ok(MemberProp::Computed(Box::new(property)))
    }

    /// `new Callee(args)`; the callee has no call of its own.
    fn parse_new_expr(&mut self) -> PResult<Expr> {
        let start = self.current.span.start;
        let new_span = self.current.span;
        self.expect(&TokenKind::New)?;

        if self.eat(&TokenKind::Dot) {
            let property = self.parse_identifier_name()?;
            if property.name != "target" {
                return Err(self.error("The only valid meta property for new is new.target", property.span));
            }
            return Ok(Expr::new(
                ExprKind::MetaProperty {
                    meta: Ident::new("new", new_span),
                    property,
                },
                self.finish(start),
            ));
        }

        let callee_start = self.current.span.start;
        let mut callee = if self.check(&TokenKind::New) {
            self.nested(Self::parse_new_expr)?
        } else {
            self.parse_primary_expr()?
        };
        loop {
            let kind = match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    let property = MemberProp::Ident(self.parse_member_name()?);
                    ExprKind::Member { object: Box::new(callee), property, optional: false }
                }
                TokenKind::LBracket => {
                    let property = self.parse_computed_member()?;
                    ExprKind::Member { object: Box::new(callee), property, optional: false }
                }
                TokenKind::QuestionDot => {
                    return Err(self.error(
                        "Constructors in/after an Optional Chain are not allowed.",
                        self.current.span,
                    ));
                }
                _ => break,
            };
            callee = Expr::new(kind, self.finish(callee_start));
        }

        let arguments = if self.check(&TokenKind::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::new(
            ExprKind::New { callee: Box::new(callee), arguments },
            self.finish(start),
        ))
    }

    fn parse_arguments(&mut self) -> PResult<Vec<Expr>> {
        self.expect(&TokenKind::LParen)?;
        let mut arguments = Vec::new();
        while !self.check(&TokenKind::RParen) {
            arguments.push(self.parse_spread_or_assign()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(arguments)
    }

    fn parse_spread_or_assign(&mut self) -> PResult<Expr> {
        let start = self.current.span.start;
        if self.eat(&TokenKind::Spread) {
            let argument = self.with_allow_in(true, Self::parse_assign_expr)?;
            return Ok(Expr::new(ExprKind::Spread(Box::new(argument)), self.finish(start)));
        }
        self.with_allow_in(true, Self::parse_assign_expr)
    }

    /// Parse a primary expression.
    fn parse_primary_expr(&mut self) -> PResult<Expr> {
        let start = self.current.span.start;
        let span = self.current.span;

        let kind = match self.peek().clone() {
            TokenKind::Identifier(name) => {
                if name == "async" {
                    let next = self.lexer.peek();
                    if !next.had_newline_before {
                        if matches!(next.kind, TokenKind::Function) {
                            self.advance();
                            let function = self.parse_function(start, true, false)?;
                            return Ok(Expr::new(ExprKind::Function(Box::new(function)), self.finish(start)));
                        }
                        if matches!(next.kind, TokenKind::LParen) {
                            self.advance();
                            return self.parse_paren_or_arrow(true, start);
                        }
                    }
                }
                self.advance();
                ExprKind::Ident(Ident::new(name, span))
            }
            TokenKind::Number(value) => {
                self.advance();
                ExprKind::Number(value)
            }
            TokenKind::String(value) => {
                self.advance();
                ExprKind::String(value)
            }
            TokenKind::BigInt(digits) => {
                self.advance();
                ExprKind::BigInt(digits)
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Bool(true)
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Bool(false)
            }
            TokenKind::Null => {
                self.advance();
                ExprKind::Null
            }
            TokenKind::This => {
                self.advance();
                ExprKind::This
            }
            TokenKind::Super => {
                self.advance();
                ExprKind::Super
            }
            TokenKind::Slash | TokenKind::SlashEq => {
                self.current = self.lexer.rescan_regex(self.current.span);
                match self.advance().kind {
                    TokenKind::Regex { pattern, flags } => ExprKind::Regex { pattern, flags },
                    TokenKind::Invalid(message) => return Err(self.error(message, span)),
                    _ => return Err(self.error("Unexpected token", span)),
                }
            }
            TokenKind::TemplateNoSub(_) | TokenKind::TemplateHead(_) => {
                ExprKind::Template(self.parse_template()?)
            }
            TokenKind::LParen => return self.parse_paren_or_arrow(false, start),
            TokenKind::LBracket => return self.parse_array_literal(),
            TokenKind::LBrace => return self.parse_object_literal(),
            TokenKind::Function => {
                let function = self.parse_function(start, false, false)?;
                ExprKind::Function(Box::new(function))
            }
            TokenKind::Class => {
                let class = self.parse_class(start, false)?;
                ExprKind::Class(Box::new(class))
            }
            TokenKind::Import => {
                self.advance();
                if self.eat(&TokenKind::Dot) {
                    let property = self.parse_identifier_name()?;
                    if property.name != "meta" {
                        return Err(self.error("The only valid meta property for import is import.meta", property.span));
                    }
                    ExprKind::MetaProperty {
                        meta: Ident::new("import", span),
                        property,
                    }
                } else if self.check(&TokenKind::LParen) {
                    ExprKind::Import
                } else {
                    return Err(self.unexpected());
                }
            }
            _ => return Err(self.unexpected()),
        };

        Ok(Expr::new(kind, self.finish(start)))
    }

    fn parse_array_literal(&mut self) -> PResult<Expr> {
        let start = self.current.span.start;
        self.expect(&TokenKind::LBracket)?;
        let mut elements = Vec::new();
        while !self.check(&TokenKind::RBracket) {
            if self.eat(&TokenKind::Comma) {
                elements.push(None);
                continue;
            }
            elements.push(Some(self.parse_spread_or_assign()?));
            if !self.check(&TokenKind::RBracket) {
                self.expect(&TokenKind::Comma)?;
            }
        }
        self.expect(&TokenKind::RBracket)?;
        Ok(Expr::new(ExprKind::Array(elements), self.finish(start)))
    }

    fn parse_object_literal(&mut self) -> PResult<Expr> {
        let start = self.current.span.start;
        self.expect(&TokenKind::LBrace)?;
        let mut properties = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            properties.push(self.parse_object_member()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Expr::new(ExprKind::Object(properties), self.finish(start)))
    }

    fn parse_object_member(&mut self) -> PResult<Property> {
        let start = self.current.span.start;
        if self.eat(&TokenKind::Spread) {
            let argument = self.with_allow_in(true, Self::parse_assign_expr)?;
            return Ok(Property {
                kind: PropertyKind::Spread(argument),
                span: self.finish(start),
            });
        }

        let (is_async, is_generator, accessor) = self.parse_method_modifiers()?;
        let key = self.parse_property_key()?;

        if self.check(&TokenKind::LParen) || is_async || is_generator || accessor.is_some() {
            let fn_start = self.current.span.start;
            let function = self.parse_method_function(fn_start, is_async, is_generator)?;
            return Ok(Property {
                kind: PropertyKind::Method {
                    key,
                    kind: accessor.unwrap_or(MethodKind::Method),
                    function,
                },
                span: self.finish(start),
            });
        }

        if self.eat(&TokenKind::Colon) {
            let value = self.with_allow_in(true, Self::parse_assign_expr)?;
            return Ok(Property {
                kind: PropertyKind::Init { key, value, shorthand: false },
                span: self.finish(start),
            });
        }

        // Shorthand `{ a }`, or `{ a = 1 }` which is only valid as a pattern.
        let PropertyKey::Ident(ident) = &key else {
            return Err(self.unexpected());
        };
        if ident_is_reserved(&ident.name) {
            return Err(self.error(format!("Unexpected keyword '{}'", ident.name), ident.span));
        }
        let mut value = Expr::new(ExprKind::Ident(ident.clone()), ident.span);
        if self.eat(&TokenKind::Eq) {
            let right = self.with_allow_in(true, Self::parse_assign_expr)?;
            let left = Pattern::new(PatternKind::Ident(ident.clone()), ident.span);
            value = Expr::new(
                ExprKind::Assign {
                    op: AssignOp::Assign,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                self.finish(start),
            );
        }
        Ok(Property {
            kind: PropertyKind::Init { key, value, shorthand: true },
            span: self.finish(start),
        })
    }

    /// Parse parenthesized expression, arrow function, or `async(...)` call.
    /// When `is_async`, `async` has already been consumed and `(` is current.
    fn parse_paren_or_arrow(&mut self, is_async: bool, outer_start: u32) -> PResult<Expr> {
        self.expect(&TokenKind::LParen)?;

        let mut items = Vec::new();
        let mut rest = None;
        self.with_allow_in(true, |p| {
            while !p.check(&TokenKind::RParen) {
                if p.check(&TokenKind::Spread) {
                    let rest_start = p.current.span.start;
                    p.advance();
                    let argument = p.parse_binding_pattern()?;
                    rest = Some(Pattern::new(
                        PatternKind::Rest(Box::new(argument)),
                        p.finish(rest_start),
                    ));
                    break;
                }
                items.push(p.parse_assign_expr()?);
                if !p.eat(&TokenKind::Comma) {
                    break;
                }
            }
            Ok(())
        })?;
        self.expect(&TokenKind::RParen)?;

        if self.check(&TokenKind::Arrow) && !self.current.had_newline_before {
            self.advance();
            let mut params = Vec::with_capacity(items.len() + 1);
            for item in items {
                let param = self.expr_to_pattern(item)?;
                self.check_binding(&param)?;
                params.push(param);
            }
            params.extend(rest);
            return self.parse_arrow_body(params, is_async, outer_start);
        }

        if let Some(rest) = rest {
            return Err(self.error("Unexpected token '...'", rest.span));
        }

        if is_async {
            let callee = Expr::new(
                ExprKind::Ident(Ident::new("async", Span::new(outer_start, outer_start + 5))),
                Span::new(outer_start, outer_start + 5),
            );
            return Ok(Expr::new(
                ExprKind::Call { callee: Box::new(callee), arguments: items, optional: false },
                self.finish(outer_start),
            ));
        }

        match items.len() {
            0 => Err(self.error("Unexpected token ')'", Span::empty(self.prev_end))),
            1 => Ok(items.remove(0)),
            _ => {
                let span = Span::new(items[0].span.start, items[items.len() - 1].span.end);
                Ok(Expr::new(ExprKind::Sequence(items), span))
            }
        }
    }

    /// Parse arrow function body.
    fn parse_arrow_body(&mut self, params: Vec<Pattern>, is_async: bool, start: u32) -> PResult<Expr> {
        let ctx = FnContext {
            in_function: true,
            in_async: is_async,
            in_generator: false,
        };
        let body = self.with_fn_context(ctx, |p| {
            if p.check(&TokenKind::LBrace) {
                Ok(ArrowBody::Block(p.with_allow_in(true, Self::parse_block)?))
            } else {
                Ok(ArrowBody::Expr(Box::new(p.parse_assign_expr()?)))
            }
        })?;

        let span = self.finish(start);
        Ok(Expr::new(
            ExprKind::Arrow(Box::new(ArrowFunction { params, body, is_async, span })),
            span,
        ))
    }

    /// Parse template literal starting at the current template token.
    fn parse_template(&mut self) -> PResult<Template> {
        let start = self.current.span.start;
        let mut quasis = Vec::new();
        let mut expressions = Vec::new();

        let head = self.advance();
        match head.kind {
            TokenKind::TemplateNoSub(cooked) => {
                quasis.push(TemplateElement {
                    cooked,
                    tail: true,
                    span: Span::new(head.span.start + 1, head.span.end - 1),
                });
                return Ok(Template { quasis, expressions, span: self.finish(start) });
            }
            TokenKind::TemplateHead(cooked) => quasis.push(TemplateElement {
                cooked,
                tail: false,
                span: Span::new(head.span.start + 1, head.span.end - 2),
            }),
            _ => return Err(self.error("Unexpected token", head.span)),
        }

        loop {
            expressions.push(self.with_allow_in(true, Self::parse_expr)?);
            if !self.check(&TokenKind::RBrace) {
                return Err(self.error("Unexpected token, expected \"}\"", self.current.span));
            }
            self.current = self.lexer.rescan_template_continuation(self.current.span);
            let part = self.advance();
            match part.kind {
                TokenKind::TemplateMiddle(cooked) => quasis.push(TemplateElement {
                    cooked,
                    tail: false,
                    span: Span::new(part.span.start + 1, part.span.end - 2),
                }),
                TokenKind::TemplateTail(cooked) => {
                    quasis.push(TemplateElement {
                        cooked,
                        tail: true,
                        span: Span::new(part.span.start + 1, part.span.end - 1),
                    });
                    break;
                }
                TokenKind::Invalid(message) => return Err(self.error(message, part.span)),
                _ => return Err(self.error("Unexpected token", part.span)),
            }
        }

        Ok(Template { quasis, expressions, span: self.finish(start) })
    }

    // =========================================================================
    // Cover grammar
    // =========================================================================

    /// Convert an expression parsed ahead of `=` or `=>` into a pattern.
    fn expr_to_pattern(&self, expr: Expr) -> PResult<Pattern> {
        let span = expr.span;
        let chained = expr.is_optional_chain();
        let kind = match expr.kind {
            ExprKind::Ident(ident) => PatternKind::Ident(ident),
            member @ ExprKind::Member { .. } if !chained => {
                PatternKind::Expr(Box::new(Expr::new(member, span)))
            }
            ExprKind::Array(elements) => {
                let mut patterns = Vec::with_capacity(elements.len());
                for element in elements {
                    patterns.push(match element {
                        None => None,
                        Some(Expr { kind: ExprKind::Spread(argument), span }) => Some(Pattern::new(
                            PatternKind::Rest(Box::new(self.expr_to_pattern(*argument)?)),
                            span,
                        )),
                        Some(element) => Some(self.expr_to_pattern(element)?),
                    });
                }
                PatternKind::Array(patterns)
            }
            ExprKind::Object(properties) => {
                let mut props = Vec::with_capacity(properties.len());
                for property in properties {
                    props.push(match property.kind {
                        PropertyKind::Init { key, value, shorthand } => PatternProp::Prop {
                            key,
                            value: self.expr_to_pattern(value)?,
                            shorthand,
                            span: property.span,
                        },
                        PropertyKind::Spread(argument) => PatternProp::Rest(Pattern::new(
                            PatternKind::Rest(Box::new(self.expr_to_pattern(argument)?)),
                            property.span,
                        )),
                        PropertyKind::Method { .. } => {
                            return Err(self.error("Invalid destructuring assignment target", property.span));
                        }
                    });
                }
                PatternKind::Object(props)
            }
            ExprKind::Assign { op: AssignOp::Assign, left, right } => PatternKind::Assign { left, right },
            _ => return Err(self.error("Invalid left-hand side in assignment expression", span)),
        };
        Ok(Pattern::new(kind, span))
    }

    /// Target of a compound assignment (`+=` and friends).
    fn simple_target(&self, expr: Expr) -> PResult<Pattern> {
        let span = expr.span;
        let chained = expr.is_optional_chain();
        match expr.kind {
            ExprKind::Ident(ident) => Ok(Pattern::new(PatternKind::Ident(ident), span)),
            member @ ExprKind::Member { .. } if !chained => {
                Ok(Pattern::new(PatternKind::Expr(Box::new(Expr::new(member, span))), span))
            }
            _ => Err(self.error("Invalid left-hand side in assignment expression", span)),
        }
    }

    /// Parameters may not bind member expressions.
    fn check_binding(&self, pattern: &Pattern) -> PResult<()> {
        match &pattern.kind {
            PatternKind::Ident(_) => Ok(()),
            PatternKind::Expr(_) => Err(self.error("Binding member expression", pattern.span)),
            PatternKind::Array(elements) => elements
                .iter()
                .flatten()
                .try_for_each(|element| self.check_binding(element)),
            PatternKind::Object(props) => props.iter().try_for_each(|prop| match prop {
                PatternProp::Prop { value, .. } => self.check_binding(value),
                PatternProp::Rest(rest) => self.check_binding(rest),
            }),
            PatternKind::Assign { left, .. } => self.check_binding(left),
            PatternKind::Rest(argument) => self.check_binding(argument),
        }
    }
}

fn ident_is_reserved(name: &str) -> bool {
    crate::token::keyword_from_str(name).is_some()
}

/// Spelling of an operator token, word operators included.
fn operator_text(kind: &TokenKind) -> Option<&'static str> {
    kind.keyword_str().or_else(|| crate::token::punctuator_text(kind))
}

fn logical_op(kind: &TokenKind) -> Option<LogicalOp> {
    operator_text(kind).and_then(LogicalOp::from_name)
}

fn binary_op(kind: &TokenKind) -> Option<BinaryOp> {
    operator_text(kind).and_then(BinaryOp::from_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<Ast, ParseError> {
        Parser::new(source, ParserOptions::default()).parse()
    }

    fn first_expr(source: &str) -> Expr {
        let ast = parse(source).unwrap();
        match ast.program.body.into_iter().next().map(|stmt| stmt.kind) {
            Some(StmtKind::Expr(expr)) => expr,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn test_variable_declaration() {
        let ast = parse("var a = 10;").unwrap();
        assert_eq!(ast.program.body.len(), 1);
        let StmtKind::Var(decl) = &ast.program.body[0].kind else {
            panic!("expected var");
        };
        assert_eq!(decl.kind, VarKind::Var);
        assert_eq!(decl.span, Span::new(0, 11));
        assert_eq!(decl.declarations[0].span, Span::new(4, 10));
    }

    #[test]
    fn test_function_declaration() {
        let ast = parse("function sum(a, b) { return a + b; }").unwrap();
        let StmtKind::Function(function) = &ast.program.body[0].kind else {
            panic!("expected function");
        };
        assert_eq!(function.id.as_ref().map(|id| id.span), Some(Span::new(9, 12)));
        assert_eq!(function.params.len(), 2);
        assert_eq!(function.body.span, Span::new(19, 36));
    }

    #[test]
    fn test_binary_precedence() {
        let expr = first_expr("1 + 2 * 3;");
        let ExprKind::Binary { op: BinaryOp::Add, right, .. } = expr.kind else {
            panic!("expected addition");
        };
        assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_logical_is_separate() {
        let expr = first_expr("a && b || c;");
        assert!(matches!(expr.kind, ExprKind::Logical { op: LogicalOp::Or, .. }));
    }

    #[test]
    fn test_arrow_function() {
        let ast = parse("const add = (a, b = 1, ...rest) => a + b;").unwrap();
        let StmtKind::Var(decl) = &ast.program.body[0].kind else {
            panic!("expected var");
        };
        let Some(Expr { kind: ExprKind::Arrow(arrow), .. }) = &decl.declarations[0].init else {
            panic!("expected arrow");
        };
        assert_eq!(arrow.params.len(), 3);
        assert!(matches!(arrow.params[1].kind, PatternKind::Assign { .. }));
        assert!(matches!(arrow.params[2].kind, PatternKind::Rest(_)));
    }

    #[test]
    fn test_destructuring_assignment() {
        let expr = first_expr("[a, { b, c: d }] = value;");
        let ExprKind::Assign { left, .. } = expr.kind else {
            panic!("expected assignment");
        };
        assert!(matches!(left.kind, PatternKind::Array(_)));
    }

    #[test]
    fn test_class_declaration() {
        let ast = parse("class Foo extends Bar { constructor() {} static x = 1; get y() { return 2 } }").unwrap();
        let StmtKind::Class(class) = &ast.program.body[0].kind else {
            panic!("expected class");
        };
        assert_eq!(class.body.members.len(), 3);
        assert!(matches!(
            class.body.members[0].kind,
            ClassMemberKind::Method { kind: MethodKind::Constructor, .. }
        ));
    }

    #[test]
    fn test_regex_vs_division() {
        let expr = first_expr("a / b / c;");
        assert!(matches!(expr.kind, ExprKind::Binary { op: BinaryOp::Div, .. }));
        let expr = first_expr("x.replace(/a+/g, 'b');");
        let ExprKind::Call { arguments, .. } = expr.kind else {
            panic!("expected call");
        };
        assert!(matches!(&arguments[0].kind, ExprKind::Regex { flags, .. } if flags == "g"));
    }

    #[test]
    fn test_template_spans() {
        let expr = first_expr("`a${b}c`;");
        let ExprKind::Template(template) = expr.kind else {
            panic!("expected template");
        };
        assert_eq!(template.quasis[0].span, Span::new(1, 2));
        assert_eq!(template.expressions[0].span, Span::new(4, 5));
        assert_eq!(template.quasis[1].span, Span::new(6, 7));
        assert_eq!(template.span, Span::new(0, 8));
    }

    #[test]
    fn test_asi() {
        let ast = parse("let a = 1\nlet b = 2\na++\n").unwrap();
        assert_eq!(ast.program.body.len(), 3);
        assert!(parse("let a = 1 let b = 2").is_err());
    }

    #[test]
    fn test_modules() {
        let ast = parse(
            "import a, { b as c } from 'm';\nexport default () => {};\nexport const x = 1;\nexport * from 'n';",
        )
        .unwrap();
        assert_eq!(ast.program.body.len(), 4);
        assert!(Parser::new("import a from 'm';", ParserOptions::script()).parse().is_err());
    }

    #[test]
    fn test_optional_chain() {
        let expr = first_expr("a?.b.c();");
        assert!(expr.is_optional_chain());
    }

    #[test]
    fn test_error_position() {
        let err = parse("var a = ;").unwrap_err();
        assert_eq!(err.position, Position::new(1, 9));
        assert_eq!(err.to_string(), "Unexpected token (1:9)");
    }

    /// Parse on a thread with room for the deepest accepted nesting in
    /// unoptimized builds.
    fn parse_deep(source: String) -> Result<Ast, ParseError> {
        std::thread::scope(|scope| {
            std::thread::Builder::new()
                .stack_size(64 * 1024 * 1024)
                .spawn_scoped(scope, move || parse(&source))
                .unwrap()
                .join()
                .unwrap()
        })
    }

    fn nested_parens(depth: usize) -> String {
        format!("x = {}1{};", "(".repeat(depth), ")".repeat(depth))
    }

    #[test]
    fn test_nesting_limit() {
        assert!(parse_deep(nested_parens(100)).is_ok());

        let err = parse_deep(nested_parens(5000)).unwrap_err();
        assert_eq!(err.message, "Maximum nesting depth exceeded");
        assert_eq!(err.position.line, 1);

        let blocks = format!("{}{}", "{".repeat(5000), "}".repeat(5000));
        assert_eq!(parse_deep(blocks).unwrap_err().message, "Maximum nesting depth exceeded");

        let unary = format!("{}x;", "!".repeat(5000));
        assert_eq!(parse_deep(unary).unwrap_err().message, "Maximum nesting depth exceeded");

        let power = format!("x = 2{};", " ** 2".repeat(5000));
        assert_eq!(parse_deep(power).unwrap_err().message, "Maximum nesting depth exceeded");

        let patterns = format!("let {}x{} = y;", "[".repeat(5000), "]".repeat(5000));
        assert_eq!(parse_deep(patterns).unwrap_err().message, "Maximum nesting depth exceeded");
    }

    #[test]
    fn test_long_chains_are_not_nesting() {
        let sum = format!("x = 1{};", " + 1".repeat(1000));
        assert!(parse(&sum).is_ok());
        let members = format!("x{};", ".y".repeat(1000));
        assert!(parse(&members).is_ok());
    }

    #[test]
    fn test_return_outside_function() {
        assert!(parse("return 1;").is_err());
        let options = ParserOptions {
            allow_return_outside_function: true,
            ..ParserOptions::default()
        };
        assert!(Parser::new("return 1;", options).parse().is_ok());
    }
}
