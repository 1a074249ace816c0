//! AST node types for JavaScript.
//!
//! The shape follows Babel's AST: identifiers are nodes with their own span,
//! logical operators are separate from binary ones, object members and
//! class members distinguish properties from methods. `node::NodeRef` maps
//! these structures onto Babel node type names.

use crate::span::{LineIndex, SourceRange, Span};

/// The root AST for a parsed module/script.
#[derive(Debug, Clone)]
pub struct Ast {
    pub program: Program,
    line_index: LineIndex,
}

impl Ast {
    /// Create a new AST.
    pub fn new(program: Program, source: &str) -> Self {
        Self {
            program,
            line_index: LineIndex::new(source),
        }
    }

    /// The source text this AST was parsed from.
    pub fn source(&self) -> &str {
        self.line_index.source()
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    /// Line/column range of a span, `None` if the span does not fit the source.
    pub fn range(&self, span: Span) -> Option<SourceRange> {
        self.line_index.range(span)
    }
}

/// Script or module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Script,
    Module,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Script => "script",
            SourceType::Module => "module",
        }
    }
}

/// The `Program` node.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub source_type: SourceType,
    pub span: Span,
}

/// An identifier: a binding name, a reference, a property name or a label.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

// =============================================================================
// Statements
// =============================================================================

/// A statement node.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Statement kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    // === Declarations ===
    /// `var`/`let`/`const` declaration
    Var(VarDecl),
    /// Function declaration
    Function(Box<Function>),
    /// Class declaration
    Class(Box<Class>),

    // === Simple statements ===
    /// `{ ... }`
    Block(Block),
    /// Expression statement
    Expr(Expr),
    /// `;`
    Empty,
    /// `debugger;`
    Debugger,

    // === Control flow ===
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
    },
    For {
        init: Option<ForInit>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForIn {
        left: ForHead,
        right: Expr,
        body: Box<Stmt>,
    },
    ForOf {
        left: ForHead,
        right: Expr,
        body: Box<Stmt>,
        is_await: bool,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        test: Expr,
    },
    Break {
        label: Option<Ident>,
    },
    Continue {
        label: Option<Ident>,
    },
    Return {
        argument: Option<Expr>,
    },
    Throw {
        argument: Expr,
    },
    Try {
        block: Block,
        handler: Option<CatchClause>,
        finalizer: Option<Block>,
    },
    Labeled {
        label: Ident,
        body: Box<Stmt>,
    },

    // === Modules ===
    Import(ImportDecl),
    ExportNamed(ExportNamed),
    ExportDefault(ExportDefault),
    ExportAll(ExportAll),
}

/// A `{ ... }` block.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// Variable declaration kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

impl VarKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VarKind::Var => "var",
            VarKind::Let => "let",
            VarKind::Const => "const",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "var" => Some(VarKind::Var),
            "let" => Some(VarKind::Let),
            "const" => Some(VarKind::Const),
            _ => None,
        }
    }
}

/// `var a = 1, b;`
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub kind: VarKind,
    pub declarations: Vec<VarDeclarator>,
    pub span: Span,
}

/// One `id = init` inside a declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclarator {
    pub id: Pattern,
    pub init: Option<Expr>,
    pub span: Span,
}

/// Initializer of a C-style `for`.
#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    Var(VarDecl),
    Expr(Expr),
}

/// Left side of `for-in`/`for-of`.
#[derive(Debug, Clone, PartialEq)]
pub enum ForHead {
    Var(VarDecl),
    Pattern(Pattern),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// `None` for `default:`
    pub test: Option<Expr>,
    pub consequent: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub param: Option<Pattern>,
    pub body: Block,
    pub span: Span,
}

// =============================================================================
// Modules
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub specifiers: Vec<ImportSpecifier>,
    /// Always a string literal.
    pub source: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSpecifier {
    pub kind: ImportSpecifierKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportSpecifierKind {
    /// `import a from "m"`
    Default(Ident),
    /// `import * as a from "m"`
    Namespace(Ident),
    /// `import { a as b } from "m"`
    Named { imported: Ident, local: Ident },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportNamed {
    pub declaration: Option<Box<Stmt>>,
    pub specifiers: Vec<ExportSpecifier>,
    pub source: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSpecifier {
    pub local: Ident,
    pub exported: Ident,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportDefault {
    Function(Box<Function>),
    Class(Box<Class>),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportAll {
    pub exported: Option<Ident>,
    pub source: Expr,
}

// =============================================================================
// Expressions
// =============================================================================

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Whether this expression is a member or call that is part of an
    /// optional chain (`a?.b.c`).
    pub fn is_optional_chain(&self) -> bool {
        match &self.kind {
            ExprKind::Member { object, optional, .. } => *optional || object.is_optional_chain(),
            ExprKind::Call { callee, optional, .. } => *optional || callee.is_optional_chain(),
            _ => false,
        }
    }
}

/// Expression kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    // === Literals ===
    Null,
    Bool(bool),
    Number(f64),
    /// BigInt literal (digits without the `n`)
    BigInt(String),
    String(String),
    Regex {
        pattern: String,
        flags: String,
    },
    Template(Template),
    TaggedTemplate {
        tag: Box<Expr>,
        quasi: Template,
    },

    // === Identifiers ===
    Ident(Ident),
    This,
    Super,
    /// `import` as the callee of `import(...)`
    Import,
    /// `new.target`, `import.meta`
    MetaProperty {
        meta: Ident,
        property: Ident,
    },

    // === Compound Expressions ===
    /// `[a, , ...b]`
    Array(Vec<Option<Expr>>),
    /// `{a: 1, b() {}, ...c}`
    Object(Vec<Property>),
    Function(Box<Function>),
    Arrow(Box<ArrowFunction>),
    Class(Box<Class>),

    // === Operators ===
    Unary {
        op: UnaryOp,
        argument: Box<Expr>,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        argument: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        left: Box<Pattern>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Sequence(Vec<Expr>),

    // === Access and calls ===
    Member {
        object: Box<Expr>,
        property: MemberProp,
        /// This link is written `?.`
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
        optional: bool,
    },
    New {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
    /// `...expr` in array literals and call arguments
    Spread(Box<Expr>),

    // === Async / generators ===
    Yield {
        argument: Option<Box<Expr>>,
        delegate: bool,
    },
    Await(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberProp {
    /// `a.b`
    Ident(Ident),
    /// `a[b]`
    Computed(Box<Expr>),
}

/// A template literal: `quasis.len() == expressions.len() + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub quasis: Vec<TemplateElement>,
    pub expressions: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateElement {
    /// Cooked value (escapes resolved).
    pub cooked: String,
    pub tail: bool,
    pub span: Span,
}

/// Object literal member.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub kind: PropertyKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    /// `key: value` or shorthand `key`
    Init {
        key: PropertyKey,
        value: Expr,
        shorthand: bool,
    },
    /// `key() {}`, `get key() {}`, `set key(v) {}`
    Method {
        key: PropertyKey,
        kind: MethodKind,
        function: Function,
    },
    /// `...expr`
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    Ident(Ident),
    /// String or numeric literal key.
    Literal(Expr),
    /// `[expr]`
    Computed(Expr),
}

impl PropertyKey {
    pub fn span(&self) -> Span {
        match self {
            PropertyKey::Ident(ident) => ident.span,
            PropertyKey::Literal(expr) | PropertyKey::Computed(expr) => expr.span,
        }
    }

    /// Static name of the key, if it has one.
    pub fn static_name(&self) -> Option<String> {
        match self {
            PropertyKey::Ident(ident) => Some(ident.name.clone()),
            PropertyKey::Literal(Expr { kind: ExprKind::String(s), .. }) => Some(s.clone()),
            PropertyKey::Literal(Expr { kind: ExprKind::Number(n), .. }) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, PropertyKey::Computed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Get,
    Set,
    Constructor,
}

impl MethodKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MethodKind::Method => "method",
            MethodKind::Get => "get",
            MethodKind::Set => "set",
            MethodKind::Constructor => "constructor",
        }
    }
}

// =============================================================================
// Functions and classes
// =============================================================================

/// Function declaration or expression; also the body of methods.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub id: Option<Ident>,
    pub params: Vec<Pattern>,
    pub body: Block,
    pub is_async: bool,
    pub is_generator: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrowFunction {
    pub params: Vec<Pattern>,
    pub body: ArrowBody,
    pub is_async: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrowBody {
    Expr(Box<Expr>),
    Block(Block),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub id: Option<Ident>,
    pub super_class: Option<Box<Expr>>,
    pub body: ClassBody,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassBody {
    pub members: Vec<ClassMember>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMember {
    pub kind: ClassMemberKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassMemberKind {
    Method {
        key: PropertyKey,
        kind: MethodKind,
        is_static: bool,
        function: Function,
    },
    Property {
        key: PropertyKey,
        value: Option<Expr>,
        is_static: bool,
    },
}

// =============================================================================
// Patterns
// =============================================================================

/// A binding or assignment target.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub kind: PatternKind,
    pub span: Span,
}

impl Pattern {
    pub fn new(kind: PatternKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
    Ident(Ident),
    /// `[a, , b]`
    Array(Vec<Option<Pattern>>),
    /// `{a, b: c, ...d}`
    Object(Vec<PatternProp>),
    /// `a = 1`
    Assign {
        left: Box<Pattern>,
        right: Box<Expr>,
    },
    /// `...a`
    Rest(Box<Pattern>),
    /// Member expression target: `a.b = 1`
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternProp {
    Prop {
        key: PropertyKey,
        value: Pattern,
        shorthand: bool,
        span: Span,
    },
    /// A `Pattern` of kind `Rest`.
    Rest(Pattern),
}

// =============================================================================
// Operators
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,
    Plus,
    Not,
    BitNot,
    Typeof,
    Void,
    Delete,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Minus => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Typeof => "typeof",
            UnaryOp::Void => "void",
            UnaryOp::Delete => "delete",
        }
    }

    pub fn from_name(op: &str) -> Option<Self> {
        [
            UnaryOp::Minus,
            UnaryOp::Plus,
            UnaryOp::Not,
            UnaryOp::BitNot,
            UnaryOp::Typeof,
            UnaryOp::Void,
            UnaryOp::Delete,
        ]
        .into_iter()
        .find(|candidate| candidate.as_str() == op)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

impl UpdateOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateOp::Increment => "++",
            UpdateOp::Decrement => "--",
        }
    }

    pub fn from_name(op: &str) -> Option<Self> {
        match op {
            "++" => Some(UpdateOp::Increment),
            "--" => Some(UpdateOp::Decrement),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Shl,
    Shr,
    UShr,
    BitOr,
    BitXor,
    BitAnd,
    In,
    Instanceof,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 22] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Mod,
        BinaryOp::Pow,
        BinaryOp::Eq,
        BinaryOp::NotEq,
        BinaryOp::StrictEq,
        BinaryOp::StrictNotEq,
        BinaryOp::Lt,
        BinaryOp::LtEq,
        BinaryOp::Gt,
        BinaryOp::GtEq,
        BinaryOp::Shl,
        BinaryOp::Shr,
        BinaryOp::UShr,
        BinaryOp::BitOr,
        BinaryOp::BitXor,
        BinaryOp::BitAnd,
        BinaryOp::In,
        BinaryOp::Instanceof,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::BitAnd => "&",
            BinaryOp::In => "in",
            BinaryOp::Instanceof => "instanceof",
        }
    }

    pub fn from_name(op: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == op)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

impl LogicalOp {
    pub fn as_str(self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
            LogicalOp::Nullish => "??",
        }
    }

    pub fn from_name(op: &str) -> Option<Self> {
        match op {
            "&&" => Some(LogicalOp::And),
            "||" => Some(LogicalOp::Or),
            "??" => Some(LogicalOp::Nullish),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    PowAssign,
    ShlAssign,
    ShrAssign,
    UShrAssign,
    BitOrAssign,
    BitXorAssign,
    BitAndAssign,
    AndAssign,
    OrAssign,
    NullishAssign,
}

impl AssignOp {
    pub const ALL: [AssignOp; 16] = [
        AssignOp::Assign,
        AssignOp::AddAssign,
        AssignOp::SubAssign,
        AssignOp::MulAssign,
        AssignOp::DivAssign,
        AssignOp::ModAssign,
        AssignOp::PowAssign,
        AssignOp::ShlAssign,
        AssignOp::ShrAssign,
        AssignOp::UShrAssign,
        AssignOp::BitOrAssign,
        AssignOp::BitXorAssign,
        AssignOp::BitAndAssign,
        AssignOp::AndAssign,
        AssignOp::OrAssign,
        AssignOp::NullishAssign,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::AddAssign => "+=",
            AssignOp::SubAssign => "-=",
            AssignOp::MulAssign => "*=",
            AssignOp::DivAssign => "/=",
            AssignOp::ModAssign => "%=",
            AssignOp::PowAssign => "**=",
            AssignOp::ShlAssign => "<<=",
            AssignOp::ShrAssign => ">>=",
            AssignOp::UShrAssign => ">>>=",
            AssignOp::BitOrAssign => "|=",
            AssignOp::BitXorAssign => "^=",
            AssignOp::BitAndAssign => "&=",
            AssignOp::AndAssign => "&&=",
            AssignOp::OrAssign => "||=",
            AssignOp::NullishAssign => "??=",
        }
    }

    pub fn from_name(op: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == op)
    }
}
