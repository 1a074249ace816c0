//! astplay-parser: JavaScript parser with a Babel-shaped AST
//!
//! # Design Principles
//!
//! 1. **Babel's vocabulary on top of Rust enums**
//!    - The AST is plain owned data (`Stmt`, `Expr`, `Pattern`)
//!    - `node::NodeRef` names every node with its Babel type and exposes
//!      its fields in Babel's order, so tools can speak `VariableDeclaration`
//!      and `declarations[0].init`
//!
//! 2. **Lexing on-demand**
//!    - Lexer is called during parsing, not upfront
//!    - Enables context-sensitive tokenization (regex vs division)
//!
//! 3. **Exact locations**
//!    - Every node carries a byte span; children nest inside parents
//!    - `LineIndex` turns spans into 1-indexed, inclusive line/column ranges
//!
//! 4. **Round-trip through codegen**
//!    - `Codegen` prints any (possibly edited) AST back to source
//!
//! # Example
//!
//! ```
//! use astplay_parser::{generate, parse, ParserOptions};
//!
//! let ast = parse("var a=10", ParserOptions::default()).unwrap();
//! assert_eq!(generate(&ast.program), "var a = 10;");
//! ```

mod ast;
mod codegen;
mod lexer;
pub mod node;
mod parser;
mod span;
mod token;

// Re-exports
pub use ast::*;
pub use codegen::{format_number, Codegen, CodegenOptions};
pub use lexer::Lexer;
pub use node::{Alias, Field, NodeMut, NodeRef, NodeType, Scalar, SlotMut, Step};
pub use parser::{ParseError, Parser, ParserOptions, MAX_NESTING_DEPTH};
pub use span::{LineIndex, Position, SourceRange, Span};
pub use token::{Token, TokenKind};

/// Parse a whole program.
pub fn parse(source: &str, options: ParserOptions) -> Result<Ast, ParseError> {
    Parser::new(source, options).parse()
}

/// Parse a single expression, e.g. the argument of `replaceWithSourceString`.
pub fn parse_expression(source: &str) -> Result<Expr, ParseError> {
    Parser::new(source, ParserOptions::default()).parse_expression()
}

/// Print a program with default formatting.
pub fn generate(program: &Program) -> String {
    Codegen::new(program, CodegenOptions::default()).generate()
}
