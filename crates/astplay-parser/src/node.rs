//! Babel-style node view over the typed AST.
//!
//! The AST is stored as Rust enums; tools that talk to users (the tree
//! viewer, the visitor engine) need Babel's vocabulary instead: node type
//! names such as `VariableDeclaration`, named fields in Babel's order, and
//! alias groups such as `Expression`.
//!
//! `NodeRef` is the read side. A few AST layers are transparent: a
//! `Stmt` holding a `VarDecl` *is* the `VariableDeclaration`, an `Expr`
//! holding an `Ident` *is* the `Identifier`. `NodeMut` is the write side and
//! agrees with `NodeRef` on field names and list indices, so a path recorded
//! while reading can be replayed for editing.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use rustc_hash::FxHashMap;

use crate::ast::*;
use crate::span::Span;

// =============================================================================
// Node types
// =============================================================================

macro_rules! node_types {
    ($($name:ident),* $(,)?) => {
        /// Babel node type.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub enum NodeType {
            $($name),*
        }

        impl NodeType {
            /// Every node type this parser produces.
            pub const ALL: &'static [NodeType] = &[$(NodeType::$name),*];

            /// The Babel type name.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(NodeType::$name => stringify!($name)),*
                }
            }
        }
    };
}

node_types! {
    Program,
    // Statements
    ExpressionStatement,
    BlockStatement,
    EmptyStatement,
    DebuggerStatement,
    ReturnStatement,
    IfStatement,
    SwitchStatement,
    SwitchCase,
    ThrowStatement,
    TryStatement,
    CatchClause,
    WhileStatement,
    DoWhileStatement,
    ForStatement,
    ForInStatement,
    ForOfStatement,
    BreakStatement,
    ContinueStatement,
    LabeledStatement,
    // Declarations
    VariableDeclaration,
    VariableDeclarator,
    FunctionDeclaration,
    ClassDeclaration,
    // Modules
    ImportDeclaration,
    ImportSpecifier,
    ImportDefaultSpecifier,
    ImportNamespaceSpecifier,
    ExportNamedDeclaration,
    ExportSpecifier,
    ExportDefaultDeclaration,
    ExportAllDeclaration,
    // Identifiers and literals
    Identifier,
    StringLiteral,
    NumericLiteral,
    BooleanLiteral,
    NullLiteral,
    RegExpLiteral,
    BigIntLiteral,
    TemplateLiteral,
    TemplateElement,
    TaggedTemplateExpression,
    // Expressions
    ThisExpression,
    Super,
    Import,
    MetaProperty,
    ArrayExpression,
    ObjectExpression,
    ObjectProperty,
    ObjectMethod,
    SpreadElement,
    FunctionExpression,
    ArrowFunctionExpression,
    ClassExpression,
    UnaryExpression,
    UpdateExpression,
    BinaryExpression,
    LogicalExpression,
    AssignmentExpression,
    ConditionalExpression,
    SequenceExpression,
    MemberExpression,
    OptionalMemberExpression,
    CallExpression,
    OptionalCallExpression,
    NewExpression,
    AwaitExpression,
    YieldExpression,
    // Classes
    ClassBody,
    ClassMethod,
    ClassProperty,
    // Patterns
    ArrayPattern,
    ObjectPattern,
    AssignmentPattern,
    RestElement,
}

impl NodeType {
    /// Look a type up by its Babel name.
    pub fn from_name(name: &str) -> Option<NodeType> {
        static BY_NAME: OnceLock<FxHashMap<&'static str, NodeType>> = OnceLock::new();
        BY_NAME
            .get_or_init(|| NodeType::ALL.iter().map(|ty| (ty.as_str(), *ty)).collect())
            .get(name)
            .copied()
    }

    /// Alias groups this type belongs to.
    pub fn aliases(self) -> impl Iterator<Item = Alias> {
        Alias::ALL.iter().copied().filter(move |alias| alias.covers(self))
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unknown node type names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownNodeType(pub String);

impl fmt::Display for UnknownNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown node type `{}`", self.0)
    }
}

impl std::error::Error for UnknownNodeType {}

impl FromStr for NodeType {
    type Err = UnknownNodeType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeType::from_name(s).ok_or_else(|| UnknownNodeType(s.to_string()))
    }
}

/// Babel alias: a name standing for a group of node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Alias {
    Expression,
    Statement,
    Declaration,
    Function,
    Literal,
    Loop,
    For,
    While,
    Class,
    Pattern,
    ModuleDeclaration,
    ExportDeclaration,
    ModuleSpecifier,
    Method,
    ObjectMember,
    Property,
    Binary,
    Conditional,
    CompletionStatement,
    Block,
}

impl Alias {
    pub const ALL: &'static [Alias] = &[
        Alias::Expression,
        Alias::Statement,
        Alias::Declaration,
        Alias::Function,
        Alias::Literal,
        Alias::Loop,
        Alias::For,
        Alias::While,
        Alias::Class,
        Alias::Pattern,
        Alias::ModuleDeclaration,
        Alias::ExportDeclaration,
        Alias::ModuleSpecifier,
        Alias::Method,
        Alias::ObjectMember,
        Alias::Property,
        Alias::Binary,
        Alias::Conditional,
        Alias::CompletionStatement,
        Alias::Block,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Alias::Expression => "Expression",
            Alias::Statement => "Statement",
            Alias::Declaration => "Declaration",
            Alias::Function => "Function",
            Alias::Literal => "Literal",
            Alias::Loop => "Loop",
            Alias::For => "For",
            Alias::While => "While",
            Alias::Class => "Class",
            Alias::Pattern => "Pattern",
            Alias::ModuleDeclaration => "ModuleDeclaration",
            Alias::ExportDeclaration => "ExportDeclaration",
            Alias::ModuleSpecifier => "ModuleSpecifier",
            Alias::Method => "Method",
            Alias::ObjectMember => "ObjectMember",
            Alias::Property => "Property",
            Alias::Binary => "Binary",
            Alias::Conditional => "Conditional",
            Alias::CompletionStatement => "CompletionStatement",
            Alias::Block => "Block",
        }
    }

    pub fn from_name(name: &str) -> Option<Alias> {
        Alias::ALL.iter().copied().find(|alias| alias.as_str() == name)
    }

    /// Whether `ty` belongs to this alias group.
    pub fn covers(self, ty: NodeType) -> bool {
        use NodeType as T;
        match self {
            Alias::Expression => matches!(
                ty,
                T::Identifier
                    | T::StringLiteral
                    | T::NumericLiteral
                    | T::BooleanLiteral
                    | T::NullLiteral
                    | T::RegExpLiteral
                    | T::BigIntLiteral
                    | T::TemplateLiteral
                    | T::TaggedTemplateExpression
                    | T::ThisExpression
                    | T::Super
                    | T::Import
                    | T::MetaProperty
                    | T::ArrayExpression
                    | T::ObjectExpression
                    | T::FunctionExpression
                    | T::ArrowFunctionExpression
                    | T::ClassExpression
                    | T::UnaryExpression
                    | T::UpdateExpression
                    | T::BinaryExpression
                    | T::LogicalExpression
                    | T::AssignmentExpression
                    | T::ConditionalExpression
                    | T::SequenceExpression
                    | T::MemberExpression
                    | T::OptionalMemberExpression
                    | T::CallExpression
                    | T::OptionalCallExpression
                    | T::NewExpression
                    | T::AwaitExpression
                    | T::YieldExpression
            ),
            Alias::Statement => matches!(
                ty,
                T::ExpressionStatement
                    | T::BlockStatement
                    | T::EmptyStatement
                    | T::DebuggerStatement
                    | T::ReturnStatement
                    | T::IfStatement
                    | T::SwitchStatement
                    | T::ThrowStatement
                    | T::TryStatement
                    | T::WhileStatement
                    | T::DoWhileStatement
                    | T::ForStatement
                    | T::ForInStatement
                    | T::ForOfStatement
                    | T::BreakStatement
                    | T::ContinueStatement
                    | T::LabeledStatement
                    | T::VariableDeclaration
                    | T::FunctionDeclaration
                    | T::ClassDeclaration
                    | T::ImportDeclaration
                    | T::ExportNamedDeclaration
                    | T::ExportDefaultDeclaration
                    | T::ExportAllDeclaration
            ),
            Alias::Declaration => matches!(
                ty,
                T::VariableDeclaration
                    | T::FunctionDeclaration
                    | T::ClassDeclaration
                    | T::ImportDeclaration
                    | T::ExportNamedDeclaration
                    | T::ExportDefaultDeclaration
                    | T::ExportAllDeclaration
            ),
            Alias::Function => matches!(
                ty,
                T::FunctionDeclaration
                    | T::FunctionExpression
                    | T::ArrowFunctionExpression
                    | T::ObjectMethod
                    | T::ClassMethod
            ),
            Alias::Literal => matches!(
                ty,
                T::StringLiteral
                    | T::NumericLiteral
                    | T::BooleanLiteral
                    | T::NullLiteral
                    | T::RegExpLiteral
                    | T::BigIntLiteral
                    | T::TemplateLiteral
            ),
            Alias::Loop => matches!(
                ty,
                T::ForStatement
                    | T::ForInStatement
                    | T::ForOfStatement
                    | T::WhileStatement
                    | T::DoWhileStatement
            ),
            Alias::For => matches!(ty, T::ForStatement | T::ForInStatement | T::ForOfStatement),
            Alias::While => matches!(ty, T::WhileStatement | T::DoWhileStatement),
            Alias::Class => matches!(ty, T::ClassDeclaration | T::ClassExpression),
            Alias::Pattern => matches!(ty, T::ArrayPattern | T::ObjectPattern | T::AssignmentPattern),
            Alias::ModuleDeclaration => matches!(
                ty,
                T::ImportDeclaration
                    | T::ExportNamedDeclaration
                    | T::ExportDefaultDeclaration
                    | T::ExportAllDeclaration
            ),
            Alias::ExportDeclaration => matches!(
                ty,
                T::ExportNamedDeclaration | T::ExportDefaultDeclaration | T::ExportAllDeclaration
            ),
            Alias::ModuleSpecifier => matches!(
                ty,
                T::ImportSpecifier
                    | T::ImportDefaultSpecifier
                    | T::ImportNamespaceSpecifier
                    | T::ExportSpecifier
            ),
            Alias::Method => matches!(ty, T::ObjectMethod | T::ClassMethod),
            Alias::ObjectMember => matches!(ty, T::ObjectProperty | T::ObjectMethod),
            Alias::Property => matches!(ty, T::ObjectProperty | T::ClassProperty),
            Alias::Binary => matches!(ty, T::BinaryExpression | T::LogicalExpression),
            Alias::Conditional => matches!(ty, T::IfStatement | T::ConditionalExpression),
            Alias::CompletionStatement => matches!(
                ty,
                T::BreakStatement | T::ContinueStatement | T::ReturnStatement | T::ThrowStatement
            ),
            Alias::Block => matches!(ty, T::BlockStatement | T::Program),
        }
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Field values
// =============================================================================

/// A non-node field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Number(f64),
    Bool(bool),
}

impl fmt::Display for Scalar {
    /// Formats the value as a JavaScript literal.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => write!(f, "{s:?}"),
            Scalar::Number(n) => f.write_str(&crate::codegen::format_number(*n)),
            Scalar::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// One field of a node.
#[derive(Debug, Clone)]
pub enum Field<'a> {
    Node(NodeRef<'a>),
    List(Vec<NodeRef<'a>>),
    Value(Scalar),
    /// An absent optional child (`init: null`).
    Null,
}

impl<'a> Field<'a> {
    fn opt(node: Option<NodeRef<'a>>) -> Self {
        node.map_or(Field::Null, Field::Node)
    }

    fn str(value: &str) -> Self {
        Field::Value(Scalar::String(value.to_string()))
    }

    fn bool(value: bool) -> Self {
        Field::Value(Scalar::Bool(value))
    }

    /// Whether this field holds nodes rather than a plain value.
    pub fn is_structural(&self) -> bool {
        matches!(self, Field::Node(_) | Field::List(_))
    }
}

/// One step from a node to a child: the field name and, for list fields,
/// the index in the list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Step {
    pub field: String,
    pub index: Option<usize>,
}

impl Step {
    pub fn field(field: impl Into<String>) -> Self {
        Self { field: field.into(), index: None }
    }

    pub fn item(field: impl Into<String>, index: usize) -> Self {
        Self { field: field.into(), index: Some(index) }
    }
}

/// Declaration or expression form of functions and classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Declaration,
    Expression,
}

// =============================================================================
// Read side
// =============================================================================

/// A borrowed AST node seen as a Babel node.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Program(&'a Program),
    /// Any statement that is not a declaration or block.
    Stmt(&'a Stmt),
    Block(&'a Block),
    VarDecl(&'a VarDecl),
    VarDeclarator(&'a VarDeclarator),
    Function(&'a Function, Flavor),
    Arrow(&'a ArrowFunction),
    Class(&'a Class, Flavor),
    ClassBody(&'a ClassBody),
    ClassMember(&'a ClassMember),
    SwitchCase(&'a SwitchCase),
    CatchClause(&'a CatchClause),
    ImportSpecifier(&'a ImportSpecifier),
    ExportSpecifier(&'a ExportSpecifier),
    /// Any expression that is not an identifier, template, function or class.
    Expr(&'a Expr),
    Template(&'a Template),
    TemplateElement(&'a TemplateElement),
    Property(&'a Property),
    /// `PatternProp::Prop` only; rest properties are `RestElement` patterns.
    PatternProp(&'a PatternProp),
    /// Array, object, assignment and rest patterns.
    Pattern(&'a Pattern),
    Ident(&'a Ident),
}

impl<'a> NodeRef<'a> {
    pub fn program(program: &'a Program) -> Self {
        NodeRef::Program(program)
    }

    pub fn stmt(stmt: &'a Stmt) -> Self {
        match &stmt.kind {
            StmtKind::Var(decl) => NodeRef::VarDecl(decl),
            StmtKind::Function(function) => NodeRef::Function(function, Flavor::Declaration),
            StmtKind::Class(class) => NodeRef::Class(class, Flavor::Declaration),
            StmtKind::Block(block) => NodeRef::Block(block),
            _ => NodeRef::Stmt(stmt),
        }
    }

    pub fn expr(expr: &'a Expr) -> Self {
        match &expr.kind {
            ExprKind::Ident(ident) => NodeRef::Ident(ident),
            ExprKind::Template(template) => NodeRef::Template(template),
            ExprKind::Function(function) => NodeRef::Function(function, Flavor::Expression),
            ExprKind::Arrow(arrow) => NodeRef::Arrow(arrow),
            ExprKind::Class(class) => NodeRef::Class(class, Flavor::Expression),
            _ => NodeRef::Expr(expr),
        }
    }

    pub fn pattern(pattern: &'a Pattern) -> Self {
        match &pattern.kind {
            PatternKind::Ident(ident) => NodeRef::Ident(ident),
            PatternKind::Expr(expr) => NodeRef::expr(expr),
            _ => NodeRef::Pattern(pattern),
        }
    }

    pub fn pattern_prop(prop: &'a PatternProp) -> Self {
        match prop {
            PatternProp::Rest(rest) => NodeRef::pattern(rest),
            PatternProp::Prop { .. } => NodeRef::PatternProp(prop),
        }
    }

    fn key(key: &'a PropertyKey) -> Self {
        match key {
            PropertyKey::Ident(ident) => NodeRef::Ident(ident),
            PropertyKey::Literal(expr) | PropertyKey::Computed(expr) => NodeRef::expr(expr),
        }
    }

    fn for_init(init: &'a ForInit) -> Self {
        match init {
            ForInit::Var(decl) => NodeRef::VarDecl(decl),
            ForInit::Expr(expr) => NodeRef::expr(expr),
        }
    }

    fn for_head(head: &'a ForHead) -> Self {
        match head {
            ForHead::Var(decl) => NodeRef::VarDecl(decl),
            ForHead::Pattern(pattern) => NodeRef::pattern(pattern),
        }
    }

    /// The Babel type of this node.
    pub fn node_type(&self) -> NodeType {
        use NodeType as T;
        match self {
            NodeRef::Program(_) => T::Program,
            NodeRef::Stmt(stmt) => match &stmt.kind {
                StmtKind::Var(_) => T::VariableDeclaration,
                StmtKind::Function(_) => T::FunctionDeclaration,
                StmtKind::Class(_) => T::ClassDeclaration,
                StmtKind::Block(_) => T::BlockStatement,
                StmtKind::Expr(_) => T::ExpressionStatement,
                StmtKind::Empty => T::EmptyStatement,
                StmtKind::Debugger => T::DebuggerStatement,
                StmtKind::If { .. } => T::IfStatement,
                StmtKind::Switch { .. } => T::SwitchStatement,
                StmtKind::For { .. } => T::ForStatement,
                StmtKind::ForIn { .. } => T::ForInStatement,
                StmtKind::ForOf { .. } => T::ForOfStatement,
                StmtKind::While { .. } => T::WhileStatement,
                StmtKind::DoWhile { .. } => T::DoWhileStatement,
                StmtKind::Break { .. } => T::BreakStatement,
                StmtKind::Continue { .. } => T::ContinueStatement,
                StmtKind::Return { .. } => T::ReturnStatement,
                StmtKind::Throw { .. } => T::ThrowStatement,
                StmtKind::Try { .. } => T::TryStatement,
                StmtKind::Labeled { .. } => T::LabeledStatement,
                StmtKind::Import(_) => T::ImportDeclaration,
                StmtKind::ExportNamed(_) => T::ExportNamedDeclaration,
                StmtKind::ExportDefault(_) => T::ExportDefaultDeclaration,
                StmtKind::ExportAll(_) => T::ExportAllDeclaration,
            },
            NodeRef::Block(_) => T::BlockStatement,
            NodeRef::VarDecl(_) => T::VariableDeclaration,
            NodeRef::VarDeclarator(_) => T::VariableDeclarator,
            NodeRef::Function(_, Flavor::Declaration) => T::FunctionDeclaration,
            NodeRef::Function(_, Flavor::Expression) => T::FunctionExpression,
            NodeRef::Arrow(_) => T::ArrowFunctionExpression,
            NodeRef::Class(_, Flavor::Declaration) => T::ClassDeclaration,
            NodeRef::Class(_, Flavor::Expression) => T::ClassExpression,
            NodeRef::ClassBody(_) => T::ClassBody,
            NodeRef::ClassMember(member) => match member.kind {
                ClassMemberKind::Method { .. } => T::ClassMethod,
                ClassMemberKind::Property { .. } => T::ClassProperty,
            },
            NodeRef::SwitchCase(_) => T::SwitchCase,
            NodeRef::CatchClause(_) => T::CatchClause,
            NodeRef::ImportSpecifier(spec) => match spec.kind {
                ImportSpecifierKind::Default(_) => T::ImportDefaultSpecifier,
                ImportSpecifierKind::Namespace(_) => T::ImportNamespaceSpecifier,
                ImportSpecifierKind::Named { .. } => T::ImportSpecifier,
            },
            NodeRef::ExportSpecifier(_) => T::ExportSpecifier,
            NodeRef::Expr(expr) => match &expr.kind {
                ExprKind::Null => T::NullLiteral,
                ExprKind::Bool(_) => T::BooleanLiteral,
                ExprKind::Number(_) => T::NumericLiteral,
                ExprKind::BigInt(_) => T::BigIntLiteral,
                ExprKind::String(_) => T::StringLiteral,
                ExprKind::Regex { .. } => T::RegExpLiteral,
                ExprKind::Template(_) => T::TemplateLiteral,
                ExprKind::TaggedTemplate { .. } => T::TaggedTemplateExpression,
                ExprKind::Ident(_) => T::Identifier,
                ExprKind::This => T::ThisExpression,
                ExprKind::Super => T::Super,
                ExprKind::Import => T::Import,
                ExprKind::MetaProperty { .. } => T::MetaProperty,
                ExprKind::Array(_) => T::ArrayExpression,
                ExprKind::Object(_) => T::ObjectExpression,
                ExprKind::Function(_) => T::FunctionExpression,
                ExprKind::Arrow(_) => T::ArrowFunctionExpression,
                ExprKind::Class(_) => T::ClassExpression,
                ExprKind::Unary { .. } => T::UnaryExpression,
                ExprKind::Update { .. } => T::UpdateExpression,
                ExprKind::Binary { .. } => T::BinaryExpression,
                ExprKind::Logical { .. } => T::LogicalExpression,
                ExprKind::Assign { .. } => T::AssignmentExpression,
                ExprKind::Conditional { .. } => T::ConditionalExpression,
                ExprKind::Sequence(_) => T::SequenceExpression,
                ExprKind::Member { .. } if expr.is_optional_chain() => T::OptionalMemberExpression,
                ExprKind::Member { .. } => T::MemberExpression,
                ExprKind::Call { .. } if expr.is_optional_chain() => T::OptionalCallExpression,
                ExprKind::Call { .. } => T::CallExpression,
                ExprKind::New { .. } => T::NewExpression,
                ExprKind::Spread(_) => T::SpreadElement,
                ExprKind::Yield { .. } => T::YieldExpression,
                ExprKind::Await(_) => T::AwaitExpression,
            },
            NodeRef::Template(_) => T::TemplateLiteral,
            NodeRef::TemplateElement(_) => T::TemplateElement,
            NodeRef::Property(prop) => match prop.kind {
                PropertyKind::Init { .. } => T::ObjectProperty,
                PropertyKind::Method { .. } => T::ObjectMethod,
                PropertyKind::Spread(_) => T::SpreadElement,
            },
            NodeRef::PatternProp(_) => T::ObjectProperty,
            NodeRef::Pattern(pattern) => match pattern.kind {
                PatternKind::Ident(_) => T::Identifier,
                PatternKind::Array(_) => T::ArrayPattern,
                PatternKind::Object(_) => T::ObjectPattern,
                PatternKind::Assign { .. } => T::AssignmentPattern,
                PatternKind::Rest(_) => T::RestElement,
                PatternKind::Expr(_) => T::MemberExpression,
            },
            NodeRef::Ident(_) => T::Identifier,
        }
    }

    /// Source span of this node.
    pub fn span(&self) -> Span {
        match self {
            NodeRef::Program(program) => program.span,
            NodeRef::Stmt(stmt) => stmt.span,
            NodeRef::Block(block) => block.span,
            NodeRef::VarDecl(decl) => decl.span,
            NodeRef::VarDeclarator(decl) => decl.span,
            NodeRef::Function(function, _) => function.span,
            NodeRef::Arrow(arrow) => arrow.span,
            NodeRef::Class(class, _) => class.span,
            NodeRef::ClassBody(body) => body.span,
            NodeRef::ClassMember(member) => member.span,
            NodeRef::SwitchCase(case) => case.span,
            NodeRef::CatchClause(clause) => clause.span,
            NodeRef::ImportSpecifier(spec) => spec.span,
            NodeRef::ExportSpecifier(spec) => spec.span,
            NodeRef::Expr(expr) => expr.span,
            NodeRef::Template(template) => template.span,
            NodeRef::TemplateElement(element) => element.span,
            NodeRef::Property(prop) => prop.span,
            NodeRef::PatternProp(prop) => match prop {
                PatternProp::Prop { span, .. } => *span,
                PatternProp::Rest(rest) => rest.span,
            },
            NodeRef::Pattern(pattern) => pattern.span,
            NodeRef::Ident(ident) => ident.span,
        }
    }

    /// Named fields in Babel's order.
    pub fn fields(&self) -> Vec<(&'static str, Field<'a>)> {
        match *self {
            NodeRef::Program(program) => vec![
                ("sourceType", Field::str(program.source_type.as_str())),
                ("body", stmts(&program.body)),
            ],
            NodeRef::Stmt(stmt) => stmt_fields(stmt),
            NodeRef::Block(block) => vec![("body", stmts(&block.body))],
            NodeRef::VarDecl(decl) => vec![
                (
                    "declarations",
                    Field::List(decl.declarations.iter().map(NodeRef::VarDeclarator).collect()),
                ),
                ("kind", Field::str(decl.kind.as_str())),
            ],
            NodeRef::VarDeclarator(decl) => vec![
                ("id", Field::Node(NodeRef::pattern(&decl.id))),
                ("init", Field::opt(decl.init.as_ref().map(NodeRef::expr))),
            ],
            NodeRef::Function(function, _) => vec![
                ("id", Field::opt(function.id.as_ref().map(NodeRef::Ident))),
                ("generator", Field::bool(function.is_generator)),
                ("async", Field::bool(function.is_async)),
                ("params", patterns(&function.params)),
                ("body", Field::Node(NodeRef::Block(&function.body))),
            ],
            NodeRef::Arrow(arrow) => vec![
                ("id", Field::Null),
                ("generator", Field::bool(false)),
                ("async", Field::bool(arrow.is_async)),
                ("params", patterns(&arrow.params)),
                (
                    "body",
                    Field::Node(match &arrow.body {
                        ArrowBody::Expr(expr) => NodeRef::expr(expr),
                        ArrowBody::Block(block) => NodeRef::Block(block),
                    }),
                ),
            ],
            NodeRef::Class(class, _) => vec![
                ("id", Field::opt(class.id.as_ref().map(NodeRef::Ident))),
                ("superClass", Field::opt(class.super_class.as_deref().map(NodeRef::expr))),
                ("body", Field::Node(NodeRef::ClassBody(&class.body))),
            ],
            NodeRef::ClassBody(body) => vec![(
                "body",
                Field::List(body.members.iter().map(NodeRef::ClassMember).collect()),
            )],
            NodeRef::ClassMember(member) => match &member.kind {
                ClassMemberKind::Method { key, kind, is_static, function } => vec![
                    ("static", Field::bool(*is_static)),
                    ("key", Field::Node(NodeRef::key(key))),
                    ("computed", Field::bool(key.is_computed())),
                    ("kind", Field::str(kind.as_str())),
                    ("generator", Field::bool(function.is_generator)),
                    ("async", Field::bool(function.is_async)),
                    ("params", patterns(&function.params)),
                    ("body", Field::Node(NodeRef::Block(&function.body))),
                ],
                ClassMemberKind::Property { key, value, is_static } => vec![
                    ("static", Field::bool(*is_static)),
                    ("key", Field::Node(NodeRef::key(key))),
                    ("computed", Field::bool(key.is_computed())),
                    ("value", Field::opt(value.as_ref().map(NodeRef::expr))),
                ],
            },
            NodeRef::SwitchCase(case) => vec![
                ("test", Field::opt(case.test.as_ref().map(NodeRef::expr))),
                ("consequent", stmts(&case.consequent)),
            ],
            NodeRef::CatchClause(clause) => vec![
                ("param", Field::opt(clause.param.as_ref().map(NodeRef::pattern))),
                ("body", Field::Node(NodeRef::Block(&clause.body))),
            ],
            NodeRef::ImportSpecifier(spec) => match &spec.kind {
                ImportSpecifierKind::Default(local) | ImportSpecifierKind::Namespace(local) => {
                    vec![("local", Field::Node(NodeRef::Ident(local)))]
                }
                ImportSpecifierKind::Named { imported, local } => vec![
                    ("imported", Field::Node(NodeRef::Ident(imported))),
                    ("local", Field::Node(NodeRef::Ident(local))),
                ],
            },
            NodeRef::ExportSpecifier(spec) => vec![
                ("local", Field::Node(NodeRef::Ident(&spec.local))),
                ("exported", Field::Node(NodeRef::Ident(&spec.exported))),
            ],
            NodeRef::Expr(expr) => expr_fields(expr),
            NodeRef::Template(template) => vec![
                (
                    "quasis",
                    Field::List(template.quasis.iter().map(NodeRef::TemplateElement).collect()),
                ),
                ("expressions", exprs(&template.expressions)),
            ],
            NodeRef::TemplateElement(element) => vec![
                ("value", Field::str(&element.cooked)),
                ("tail", Field::bool(element.tail)),
            ],
            NodeRef::Property(prop) => match &prop.kind {
                PropertyKind::Init { key, value, shorthand } => vec![
                    ("method", Field::bool(false)),
                    ("key", Field::Node(NodeRef::key(key))),
                    ("computed", Field::bool(key.is_computed())),
                    ("shorthand", Field::bool(*shorthand)),
                    ("value", Field::Node(NodeRef::expr(value))),
                ],
                PropertyKind::Method { key, kind, function } => vec![
                    ("method", Field::bool(*kind == MethodKind::Method)),
                    ("key", Field::Node(NodeRef::key(key))),
                    ("computed", Field::bool(key.is_computed())),
                    ("kind", Field::str(kind.as_str())),
                    ("generator", Field::bool(function.is_generator)),
                    ("async", Field::bool(function.is_async)),
                    ("params", patterns(&function.params)),
                    ("body", Field::Node(NodeRef::Block(&function.body))),
                ],
                PropertyKind::Spread(argument) => {
                    vec![("argument", Field::Node(NodeRef::expr(argument)))]
                }
            },
            NodeRef::PatternProp(prop) => match prop {
                PatternProp::Prop { key, value, shorthand, .. } => vec![
                    ("method", Field::bool(false)),
                    ("key", Field::Node(NodeRef::key(key))),
                    ("computed", Field::bool(key.is_computed())),
                    ("shorthand", Field::bool(*shorthand)),
                    ("value", Field::Node(NodeRef::pattern(value))),
                ],
                PatternProp::Rest(rest) => NodeRef::pattern(rest).fields(),
            },
            NodeRef::Pattern(pattern) => match &pattern.kind {
                PatternKind::Ident(ident) => NodeRef::Ident(ident).fields(),
                PatternKind::Expr(expr) => NodeRef::expr(expr).fields(),
                PatternKind::Array(elements) => vec![(
                    "elements",
                    Field::List(elements.iter().flatten().map(NodeRef::pattern).collect()),
                )],
                PatternKind::Object(props) => vec![(
                    "properties",
                    Field::List(props.iter().map(NodeRef::pattern_prop).collect()),
                )],
                PatternKind::Assign { left, right } => vec![
                    ("left", Field::Node(NodeRef::pattern(left))),
                    ("right", Field::Node(NodeRef::expr(right))),
                ],
                PatternKind::Rest(argument) => {
                    vec![("argument", Field::Node(NodeRef::pattern(argument)))]
                }
            },
            NodeRef::Ident(ident) => vec![("name", Field::str(&ident.name))],
        }
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<Field<'a>> {
        self.fields()
            .into_iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    /// The child at `step`, if the field holds a node there.
    pub fn child(&self, step: &Step) -> Option<NodeRef<'a>> {
        match (self.field(&step.field)?, step.index) {
            (Field::Node(node), None) => Some(node),
            (Field::List(items), Some(index)) => items.get(index).copied(),
            _ => None,
        }
    }

    /// Follow a path of steps down from this node.
    pub fn descend(&self, path: &[Step]) -> Option<NodeRef<'a>> {
        path.iter().try_fold(*self, |node, step| node.child(step))
    }

    /// Direct children with the step that reaches each, in field order.
    pub fn children(&self) -> Vec<(Step, NodeRef<'a>)> {
        let mut children = Vec::new();
        for (name, field) in self.fields() {
            match field {
                Field::Node(node) => children.push((Step::field(name), node)),
                Field::List(items) => children.extend(
                    items
                        .into_iter()
                        .enumerate()
                        .map(|(index, node)| (Step::item(name, index), node)),
                ),
                Field::Value(_) | Field::Null => {}
            }
        }
        children
    }
}

fn stmts(body: &[Stmt]) -> Field<'_> {
    Field::List(body.iter().map(NodeRef::stmt).collect())
}

fn exprs(list: &[Expr]) -> Field<'_> {
    Field::List(list.iter().map(NodeRef::expr).collect())
}

fn patterns(list: &[Pattern]) -> Field<'_> {
    Field::List(list.iter().map(NodeRef::pattern).collect())
}

fn stmt_fields(stmt: &Stmt) -> Vec<(&'static str, Field<'_>)> {
    match &stmt.kind {
        StmtKind::Var(_) | StmtKind::Function(_) | StmtKind::Class(_) | StmtKind::Block(_) => {
            NodeRef::stmt(stmt).fields()
        }
        StmtKind::Expr(expr) => vec![("expression", Field::Node(NodeRef::expr(expr)))],
        StmtKind::Empty | StmtKind::Debugger => Vec::new(),
        StmtKind::If { test, consequent, alternate } => vec![
            ("test", Field::Node(NodeRef::expr(test))),
            ("consequent", Field::Node(NodeRef::stmt(consequent))),
            ("alternate", Field::opt(alternate.as_deref().map(NodeRef::stmt))),
        ],
        StmtKind::Switch { discriminant, cases } => vec![
            ("discriminant", Field::Node(NodeRef::expr(discriminant))),
            ("cases", Field::List(cases.iter().map(NodeRef::SwitchCase).collect())),
        ],
        StmtKind::For { init, test, update, body } => vec![
            ("init", Field::opt(init.as_ref().map(NodeRef::for_init))),
            ("test", Field::opt(test.as_ref().map(NodeRef::expr))),
            ("update", Field::opt(update.as_ref().map(NodeRef::expr))),
            ("body", Field::Node(NodeRef::stmt(body))),
        ],
        StmtKind::ForIn { left, right, body } => vec![
            ("left", Field::Node(NodeRef::for_head(left))),
            ("right", Field::Node(NodeRef::expr(right))),
            ("body", Field::Node(NodeRef::stmt(body))),
        ],
        StmtKind::ForOf { left, right, body, is_await } => vec![
            ("await", Field::bool(*is_await)),
            ("left", Field::Node(NodeRef::for_head(left))),
            ("right", Field::Node(NodeRef::expr(right))),
            ("body", Field::Node(NodeRef::stmt(body))),
        ],
        StmtKind::While { test, body } => vec![
            ("test", Field::Node(NodeRef::expr(test))),
            ("body", Field::Node(NodeRef::stmt(body))),
        ],
        StmtKind::DoWhile { body, test } => vec![
            ("body", Field::Node(NodeRef::stmt(body))),
            ("test", Field::Node(NodeRef::expr(test))),
        ],
        StmtKind::Break { label } | StmtKind::Continue { label } => {
            vec![("label", Field::opt(label.as_ref().map(NodeRef::Ident)))]
        }
        StmtKind::Return { argument } => {
            vec![("argument", Field::opt(argument.as_ref().map(NodeRef::expr)))]
        }
        StmtKind::Throw { argument } => vec![("argument", Field::Node(NodeRef::expr(argument)))],
        StmtKind::Try { block, handler, finalizer } => vec![
            ("block", Field::Node(NodeRef::Block(block))),
            ("handler", Field::opt(handler.as_ref().map(NodeRef::CatchClause))),
            ("finalizer", Field::opt(finalizer.as_ref().map(NodeRef::Block))),
        ],
        StmtKind::Labeled { label, body } => vec![
            ("label", Field::Node(NodeRef::Ident(label))),
            ("body", Field::Node(NodeRef::stmt(body))),
        ],
        StmtKind::Import(decl) => vec![
            (
                "specifiers",
                Field::List(decl.specifiers.iter().map(NodeRef::ImportSpecifier).collect()),
            ),
            ("source", Field::Node(NodeRef::expr(&decl.source))),
        ],
        StmtKind::ExportNamed(export) => vec![
            ("declaration", Field::opt(export.declaration.as_deref().map(NodeRef::stmt))),
            (
                "specifiers",
                Field::List(export.specifiers.iter().map(NodeRef::ExportSpecifier).collect()),
            ),
            ("source", Field::opt(export.source.as_ref().map(NodeRef::expr))),
        ],
        StmtKind::ExportDefault(export) => vec![(
            "declaration",
            Field::Node(match export {
                ExportDefault::Function(function) => NodeRef::Function(function, Flavor::Declaration),
                ExportDefault::Class(class) => NodeRef::Class(class, Flavor::Declaration),
                ExportDefault::Expr(expr) => NodeRef::expr(expr),
            }),
        )],
        StmtKind::ExportAll(export) => vec![
            ("exported", Field::opt(export.exported.as_ref().map(NodeRef::Ident))),
            ("source", Field::Node(NodeRef::expr(&export.source))),
        ],
    }
}

fn expr_fields(expr: &Expr) -> Vec<(&'static str, Field<'_>)> {
    let optional = expr.is_optional_chain();
    match &expr.kind {
        ExprKind::Ident(_)
        | ExprKind::Template(_)
        | ExprKind::Function(_)
        | ExprKind::Arrow(_)
        | ExprKind::Class(_) => NodeRef::expr(expr).fields(),
        ExprKind::Null | ExprKind::This | ExprKind::Super | ExprKind::Import => Vec::new(),
        ExprKind::Bool(value) => vec![("value", Field::bool(*value))],
        ExprKind::Number(value) => vec![("value", Field::Value(Scalar::Number(*value)))],
        ExprKind::BigInt(digits) => vec![("value", Field::str(digits))],
        ExprKind::String(value) => vec![("value", Field::str(value))],
        ExprKind::Regex { pattern, flags } => vec![
            ("pattern", Field::str(pattern)),
            ("flags", Field::str(flags)),
        ],
        ExprKind::TaggedTemplate { tag, quasi } => vec![
            ("tag", Field::Node(NodeRef::expr(tag))),
            ("quasi", Field::Node(NodeRef::Template(quasi))),
        ],
        ExprKind::MetaProperty { meta, property } => vec![
            ("meta", Field::Node(NodeRef::Ident(meta))),
            ("property", Field::Node(NodeRef::Ident(property))),
        ],
        ExprKind::Array(elements) => vec![(
            "elements",
            Field::List(elements.iter().flatten().map(NodeRef::expr).collect()),
        )],
        ExprKind::Object(properties) => vec![(
            "properties",
            Field::List(properties.iter().map(NodeRef::Property).collect()),
        )],
        ExprKind::Unary { op, argument } => vec![
            ("operator", Field::str(op.as_str())),
            ("prefix", Field::bool(true)),
            ("argument", Field::Node(NodeRef::expr(argument))),
        ],
        ExprKind::Update { op, prefix, argument } => vec![
            ("operator", Field::str(op.as_str())),
            ("prefix", Field::bool(*prefix)),
            ("argument", Field::Node(NodeRef::expr(argument))),
        ],
        ExprKind::Binary { op, left, right } => vec![
            ("left", Field::Node(NodeRef::expr(left))),
            ("operator", Field::str(op.as_str())),
            ("right", Field::Node(NodeRef::expr(right))),
        ],
        ExprKind::Logical { op, left, right } => vec![
            ("left", Field::Node(NodeRef::expr(left))),
            ("operator", Field::str(op.as_str())),
            ("right", Field::Node(NodeRef::expr(right))),
        ],
        ExprKind::Assign { op, left, right } => vec![
            ("operator", Field::str(op.as_str())),
            ("left", Field::Node(NodeRef::pattern(left))),
            ("right", Field::Node(NodeRef::expr(right))),
        ],
        ExprKind::Conditional { test, consequent, alternate } => vec![
            ("test", Field::Node(NodeRef::expr(test))),
            ("consequent", Field::Node(NodeRef::expr(consequent))),
            ("alternate", Field::Node(NodeRef::expr(alternate))),
        ],
        ExprKind::Sequence(expressions) => vec![("expressions", exprs(expressions))],
        ExprKind::Member { object, property, optional: link } => {
            let mut fields = vec![
                ("object", Field::Node(NodeRef::expr(object))),
                ("computed", Field::bool(matches!(property, MemberProp::Computed(_)))),
                (
                    "property",
                    Field::Node(match property {
                        MemberProp::Ident(ident) => NodeRef::Ident(ident),
                        MemberProp::Computed(expr) => NodeRef::expr(expr),
                    }),
                ),
            ];
            if optional {
                fields.push(("optional", Field::bool(*link)));
            }
            fields
        }
        ExprKind::Call { callee, arguments, optional: link } => {
            let mut fields = vec![
                ("callee", Field::Node(NodeRef::expr(callee))),
                ("arguments", exprs(arguments)),
            ];
            if optional {
                fields.push(("optional", Field::bool(*link)));
            }
            fields
        }
        ExprKind::New { callee, arguments } => vec![
            ("callee", Field::Node(NodeRef::expr(callee))),
            ("arguments", exprs(arguments)),
        ],
        ExprKind::Spread(argument) => vec![("argument", Field::Node(NodeRef::expr(argument)))],
        ExprKind::Yield { argument, delegate } => vec![
            ("delegate", Field::bool(*delegate)),
            ("argument", Field::opt(argument.as_deref().map(NodeRef::expr))),
        ],
        ExprKind::Await(argument) => vec![("argument", Field::Node(NodeRef::expr(argument)))],
    }
}

/// Visit `node` and all of its descendants in pre-order.
pub fn walk<'a>(node: NodeRef<'a>, f: &mut impl FnMut(NodeRef<'a>)) {
    f(node);
    for (_, child) in node.children() {
        walk(child, f);
    }
}

// =============================================================================
// Write side
// =============================================================================

/// Error from an edit through `NodeMut`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditError(pub String);

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for EditError {}

type EditResult = Result<(), EditError>;

fn edit_err<T>(message: impl Into<String>) -> Result<T, EditError> {
    Err(EditError(message.into()))
}

/// A mutably borrowed AST node.
///
/// Unlike `NodeRef` the wrappers are not unfolded up front; each operation
/// looks through them, so the same field names work on both sides.
#[derive(Debug)]
pub enum NodeMut<'a> {
    Program(&'a mut Program),
    Stmt(&'a mut Stmt),
    Block(&'a mut Block),
    VarDecl(&'a mut VarDecl),
    VarDeclarator(&'a mut VarDeclarator),
    Function(&'a mut Function),
    Arrow(&'a mut ArrowFunction),
    Class(&'a mut Class),
    ClassBody(&'a mut ClassBody),
    ClassMember(&'a mut ClassMember),
    SwitchCase(&'a mut SwitchCase),
    CatchClause(&'a mut CatchClause),
    ImportSpecifier(&'a mut ImportSpecifier),
    ExportSpecifier(&'a mut ExportSpecifier),
    Expr(&'a mut Expr),
    Template(&'a mut Template),
    TemplateElement(&'a mut TemplateElement),
    Property(&'a mut Property),
    PatternProp(&'a mut PatternProp),
    Pattern(&'a mut Pattern),
    Ident(&'a mut Ident),
}

/// A position holding a node. Statement and expression positions accept
/// replacements; the rest only give access to the node.
#[derive(Debug)]
pub enum SlotMut<'a> {
    Stmt(&'a mut Stmt),
    Expr(&'a mut Expr),
    Pattern(&'a mut Pattern),
    Ident(&'a mut Ident),
    Node(NodeMut<'a>),
}

/// A list field.
#[derive(Debug)]
pub enum ListMut<'a> {
    Stmts(&'a mut Vec<Stmt>),
    Exprs(&'a mut Vec<Expr>),
    Elements(&'a mut Vec<Option<Expr>>),
    Properties(&'a mut Vec<Property>),
    Declarators(&'a mut Vec<VarDeclarator>),
    Members(&'a mut Vec<ClassMember>),
    Cases(&'a mut Vec<SwitchCase>),
    Params(&'a mut Vec<Pattern>),
    PatternElements(&'a mut Vec<Option<Pattern>>),
    PatternProps(&'a mut Vec<PatternProp>),
    ImportSpecifiers(&'a mut Vec<ImportSpecifier>),
    ExportSpecifiers(&'a mut Vec<ExportSpecifier>),
    /// Template parts must stay paired, so they cannot be removed.
    Quasis(&'a mut Vec<TemplateElement>),
    TemplateExprs(&'a mut Vec<Expr>),
}

impl<'a> ListMut<'a> {
    pub fn len(&self) -> usize {
        match self {
            ListMut::Stmts(v) => v.len(),
            ListMut::Exprs(v) | ListMut::TemplateExprs(v) => v.len(),
            ListMut::Elements(v) => v.iter().flatten().count(),
            ListMut::Properties(v) => v.len(),
            ListMut::Declarators(v) => v.len(),
            ListMut::Members(v) => v.len(),
            ListMut::Cases(v) => v.len(),
            ListMut::Params(v) => v.len(),
            ListMut::PatternElements(v) => v.iter().flatten().count(),
            ListMut::PatternProps(v) => v.len(),
            ListMut::ImportSpecifiers(v) => v.len(),
            ListMut::ExportSpecifiers(v) => v.len(),
            ListMut::Quasis(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The item at `index`; holes in array literals are not counted.
    pub fn into_item(self, index: usize) -> Option<SlotMut<'a>> {
        match self {
            ListMut::Stmts(v) => v.get_mut(index).map(SlotMut::Stmt),
            ListMut::Exprs(v) | ListMut::TemplateExprs(v) => v.get_mut(index).map(SlotMut::Expr),
            ListMut::Elements(v) => v.iter_mut().flatten().nth(index).map(SlotMut::Expr),
            ListMut::Properties(v) => v.get_mut(index).map(|p| SlotMut::Node(NodeMut::Property(p))),
            ListMut::Declarators(v) => v
                .get_mut(index)
                .map(|d| SlotMut::Node(NodeMut::VarDeclarator(d))),
            ListMut::Members(v) => v.get_mut(index).map(|m| SlotMut::Node(NodeMut::ClassMember(m))),
            ListMut::Cases(v) => v.get_mut(index).map(|c| SlotMut::Node(NodeMut::SwitchCase(c))),
            ListMut::Params(v) => v.get_mut(index).map(SlotMut::Pattern),
            ListMut::PatternElements(v) => v.iter_mut().flatten().nth(index).map(SlotMut::Pattern),
            ListMut::PatternProps(v) => v
                .get_mut(index)
                .map(|p| SlotMut::Node(NodeMut::PatternProp(p))),
            ListMut::ImportSpecifiers(v) => v
                .get_mut(index)
                .map(|s| SlotMut::Node(NodeMut::ImportSpecifier(s))),
            ListMut::ExportSpecifiers(v) => v
                .get_mut(index)
                .map(|s| SlotMut::Node(NodeMut::ExportSpecifier(s))),
            ListMut::Quasis(v) => v
                .get_mut(index)
                .map(|q| SlotMut::Node(NodeMut::TemplateElement(q))),
        }
    }

    /// Remove the item at `index`.
    pub fn remove(self, index: usize) -> EditResult {
        fn take<T>(v: &mut Vec<T>, index: usize) -> EditResult {
            if index < v.len() {
                v.remove(index);
                Ok(())
            } else {
                edit_err("Cannot remove a node that is no longer in its container")
            }
        }
        fn take_present<T>(v: &mut Vec<Option<T>>, index: usize) -> EditResult {
            let actual = v
                .iter()
                .enumerate()
                .filter(|(_, item)| item.is_some())
                .nth(index)
                .map(|(actual, _)| actual);
            match actual {
                Some(actual) => take(v, actual),
                None => edit_err("Cannot remove a node that is no longer in its container"),
            }
        }
        match self {
            ListMut::Stmts(v) => take(v, index),
            ListMut::Exprs(v) => take(v, index),
            ListMut::Elements(v) => take_present(v, index),
            ListMut::Properties(v) => take(v, index),
            ListMut::Declarators(v) => take(v, index),
            ListMut::Members(v) => take(v, index),
            ListMut::Cases(v) => take(v, index),
            ListMut::Params(v) => take(v, index),
            ListMut::PatternElements(v) => take_present(v, index),
            ListMut::PatternProps(v) => take(v, index),
            ListMut::ImportSpecifiers(v) => take(v, index),
            ListMut::ExportSpecifiers(v) => take(v, index),
            ListMut::Quasis(_) | ListMut::TemplateExprs(_) => {
                edit_err("Template literal parts cannot be removed")
            }
        }
    }
}

impl<'a> SlotMut<'a> {
    pub fn into_node(self) -> NodeMut<'a> {
        match self {
            SlotMut::Stmt(stmt) => NodeMut::Stmt(stmt),
            SlotMut::Expr(expr) => NodeMut::Expr(expr),
            SlotMut::Pattern(pattern) => NodeMut::Pattern(pattern),
            SlotMut::Ident(ident) => NodeMut::Ident(ident),
            SlotMut::Node(node) => node,
        }
    }

    /// Put `expr` where the current node is. Statement positions wrap it in
    /// an expression statement.
    pub fn replace(self, expr: Expr) -> EditResult {
        match self {
            SlotMut::Expr(slot) => {
                *slot = expr;
                Ok(())
            }
            SlotMut::Stmt(slot) => {
                let span = expr.span;
                *slot = Stmt::new(StmtKind::Expr(expr), span);
                Ok(())
            }
            SlotMut::Pattern(slot) => {
                let span = expr.span;
                let chained = expr.is_optional_chain();
                slot.kind = match expr.kind {
                    ExprKind::Ident(ident) => PatternKind::Ident(ident),
                    member @ ExprKind::Member { .. } if !chained => {
                        PatternKind::Expr(Box::new(Expr::new(member, span)))
                    }
                    _ => return edit_err("Invalid left-hand side in replacement"),
                };
                slot.span = span;
                Ok(())
            }
            SlotMut::Ident(slot) => match expr.kind {
                ExprKind::Ident(ident) => {
                    *slot = ident;
                    Ok(())
                }
                _ => edit_err("Only an identifier can replace an identifier in this position"),
            },
            SlotMut::Node(node) => edit_err(format!(
                "Cannot replace a {} with an expression",
                node.type_name()
            )),
        }
    }
}

fn key_slot(key: &mut PropertyKey) -> SlotMut<'_> {
    match key {
        PropertyKey::Ident(ident) => SlotMut::Ident(ident),
        PropertyKey::Literal(expr) | PropertyKey::Computed(expr) => SlotMut::Expr(expr),
    }
}

fn opt_expr(expr: &mut Option<Expr>) -> Option<SlotMut<'_>> {
    expr.as_mut().map(SlotMut::Expr)
}

fn opt_box_expr(expr: &mut Option<Box<Expr>>) -> Option<SlotMut<'_>> {
    expr.as_deref_mut().map(SlotMut::Expr)
}

fn expect_bool(value: &Scalar, field: &str) -> Result<bool, EditError> {
    match value {
        Scalar::Bool(b) => Ok(*b),
        other => edit_err(format!("Property {field} expected a boolean, got {other}")),
    }
}

fn expect_string<'v>(value: &'v Scalar, field: &str) -> Result<&'v str, EditError> {
    match value {
        Scalar::String(s) => Ok(s),
        other => edit_err(format!("Property {field} expected a string, got {other}")),
    }
}

fn invalid_value<T>(field: &str, value: &str) -> Result<T, EditError> {
    edit_err(format!("Property {field} of value \"{value}\" is not valid here"))
}

fn set_key_computed(key: &mut PropertyKey, computed: bool) -> EditResult {
    let replacement = match key {
        PropertyKey::Ident(ident) if computed => {
            PropertyKey::Computed(Expr::new(ExprKind::Ident(ident.clone()), ident.span))
        }
        PropertyKey::Literal(expr) if computed => PropertyKey::Computed(expr.clone()),
        PropertyKey::Computed(Expr { kind: ExprKind::Ident(ident), .. }) if !computed => {
            PropertyKey::Ident(ident.clone())
        }
        PropertyKey::Computed(expr @ Expr { kind: ExprKind::String(_) | ExprKind::Number(_), .. })
            if !computed =>
        {
            PropertyKey::Literal(expr.clone())
        }
        PropertyKey::Computed(_) if !computed => {
            return edit_err("A computed key that is not an identifier or literal must stay computed")
        }
        _ => return Ok(()),
    };
    *key = replacement;
    Ok(())
}

fn set_member_computed(property: &mut MemberProp, computed: bool) -> EditResult {
    let replacement = match property {
        MemberProp::Ident(ident) if computed => MemberProp::Computed(Box::new(Expr::new(
            ExprKind::Ident(ident.clone()),
            ident.span,
        ))),
        MemberProp::Computed(expr) if !computed => match &expr.kind {
            ExprKind::Ident(ident) => MemberProp::Ident(ident.clone()),
            _ => return edit_err("A computed property that is not an identifier must stay computed"),
        },
        _ => return Ok(()),
    };
    *property = replacement;
    Ok(())
}

fn set_method_kind(slot: &mut MethodKind, value: &Scalar, allow_constructor: bool) -> EditResult {
    let name = expect_string(value, "kind")?;
    *slot = match name {
        "method" => MethodKind::Method,
        "get" => MethodKind::Get,
        "set" => MethodKind::Set,
        "constructor" if allow_constructor => MethodKind::Constructor,
        _ => return invalid_value("kind", name),
    };
    Ok(())
}

impl<'a> NodeMut<'a> {
    /// Babel type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeMut::Program(program) => NodeRef::Program(program).node_type().as_str(),
            NodeMut::Stmt(stmt) => NodeRef::stmt(stmt).node_type().as_str(),
            NodeMut::Block(_) => "BlockStatement",
            NodeMut::VarDecl(_) => "VariableDeclaration",
            NodeMut::VarDeclarator(_) => "VariableDeclarator",
            NodeMut::Function(_) => "Function",
            NodeMut::Arrow(_) => "ArrowFunctionExpression",
            NodeMut::Class(_) => "Class",
            NodeMut::ClassBody(_) => "ClassBody",
            NodeMut::ClassMember(member) => NodeRef::ClassMember(member).node_type().as_str(),
            NodeMut::SwitchCase(_) => "SwitchCase",
            NodeMut::CatchClause(_) => "CatchClause",
            NodeMut::ImportSpecifier(spec) => NodeRef::ImportSpecifier(spec).node_type().as_str(),
            NodeMut::ExportSpecifier(_) => "ExportSpecifier",
            NodeMut::Expr(expr) => NodeRef::expr(expr).node_type().as_str(),
            NodeMut::Template(_) => "TemplateLiteral",
            NodeMut::TemplateElement(_) => "TemplateElement",
            NodeMut::Property(prop) => NodeRef::Property(prop).node_type().as_str(),
            NodeMut::PatternProp(prop) => NodeRef::pattern_prop(prop).node_type().as_str(),
            NodeMut::Pattern(pattern) => NodeRef::pattern(pattern).node_type().as_str(),
            NodeMut::Ident(_) => "Identifier",
        }
    }

    /// The child at `step`.
    pub fn child(self, step: &Step) -> Option<SlotMut<'a>> {
        match step.index {
            None => self.single(&step.field),
            Some(index) => self.list(&step.field)?.into_item(index),
        }
    }

    /// Follow a path of steps down from this node.
    pub fn descend(self, path: &[Step]) -> Option<SlotMut<'a>> {
        let (last, init) = path.split_last()?;
        let mut node = self;
        for step in init {
            node = node.child(step)?.into_node();
        }
        node.child(last)
    }

    /// A single-node field.
    pub fn single(self, field: &str) -> Option<SlotMut<'a>> {
        match self {
            NodeMut::Program(_) | NodeMut::VarDecl(_) | NodeMut::ClassBody(_) => None,
            NodeMut::Stmt(stmt) => match &mut stmt.kind {
                StmtKind::Var(decl) => NodeMut::VarDecl(decl).single(field),
                StmtKind::Function(function) => NodeMut::Function(function).single(field),
                StmtKind::Class(class) => NodeMut::Class(class).single(field),
                StmtKind::Block(block) => NodeMut::Block(block).single(field),
                StmtKind::Expr(expr) => match field {
                    "expression" => Some(SlotMut::Expr(expr)),
                    _ => None,
                },
                StmtKind::Empty | StmtKind::Debugger => None,
                StmtKind::If { test, consequent, alternate } => match field {
                    "test" => Some(SlotMut::Expr(test)),
                    "consequent" => Some(SlotMut::Stmt(consequent)),
                    "alternate" => alternate.as_deref_mut().map(SlotMut::Stmt),
                    _ => None,
                },
                StmtKind::Switch { discriminant, .. } => match field {
                    "discriminant" => Some(SlotMut::Expr(discriminant)),
                    _ => None,
                },
                StmtKind::For { init, test, update, body } => match field {
                    "init" => init.as_mut().map(|init| match init {
                        ForInit::Var(decl) => SlotMut::Node(NodeMut::VarDecl(decl)),
                        ForInit::Expr(expr) => SlotMut::Expr(expr),
                    }),
                    "test" => opt_expr(test),
                    "update" => opt_expr(update),
                    "body" => Some(SlotMut::Stmt(body)),
                    _ => None,
                },
                StmtKind::ForIn { left, right, body } | StmtKind::ForOf { left, right, body, .. } => {
                    match field {
                        "left" => Some(match left {
                            ForHead::Var(decl) => SlotMut::Node(NodeMut::VarDecl(decl)),
                            ForHead::Pattern(pattern) => SlotMut::Pattern(pattern),
                        }),
                        "right" => Some(SlotMut::Expr(right)),
                        "body" => Some(SlotMut::Stmt(body)),
                        _ => None,
                    }
                }
                StmtKind::While { test, body } | StmtKind::DoWhile { body, test } => match field {
                    "test" => Some(SlotMut::Expr(test)),
                    "body" => Some(SlotMut::Stmt(body)),
                    _ => None,
                },
                StmtKind::Break { label } | StmtKind::Continue { label } => match field {
                    "label" => label.as_mut().map(SlotMut::Ident),
                    _ => None,
                },
                StmtKind::Return { argument } => match field {
                    "argument" => opt_expr(argument),
                    _ => None,
                },
                StmtKind::Throw { argument } => match field {
                    "argument" => Some(SlotMut::Expr(argument)),
                    _ => None,
                },
                StmtKind::Try { block, handler, finalizer } => match field {
                    "block" => Some(SlotMut::Node(NodeMut::Block(block))),
                    "handler" => handler.as_mut().map(|h| SlotMut::Node(NodeMut::CatchClause(h))),
                    "finalizer" => finalizer.as_mut().map(|b| SlotMut::Node(NodeMut::Block(b))),
                    _ => None,
                },
                StmtKind::Labeled { label, body } => match field {
                    "label" => Some(SlotMut::Ident(label)),
                    "body" => Some(SlotMut::Stmt(body)),
                    _ => None,
                },
                StmtKind::Import(decl) => match field {
                    "source" => Some(SlotMut::Expr(&mut decl.source)),
                    _ => None,
                },
                StmtKind::ExportNamed(export) => match field {
                    "declaration" => export.declaration.as_deref_mut().map(SlotMut::Stmt),
                    "source" => opt_expr(&mut export.source),
                    _ => None,
                },
                StmtKind::ExportDefault(export) => match field {
                    "declaration" => Some(match export {
                        ExportDefault::Function(function) => SlotMut::Node(NodeMut::Function(function)),
                        ExportDefault::Class(class) => SlotMut::Node(NodeMut::Class(class)),
                        ExportDefault::Expr(expr) => SlotMut::Expr(expr),
                    }),
                    _ => None,
                },
                StmtKind::ExportAll(export) => match field {
                    "exported" => export.exported.as_mut().map(SlotMut::Ident),
                    "source" => Some(SlotMut::Expr(&mut export.source)),
                    _ => None,
                },
            },
            NodeMut::Block(_) => None,
            NodeMut::VarDeclarator(decl) => match field {
                "id" => Some(SlotMut::Pattern(&mut decl.id)),
                "init" => opt_expr(&mut decl.init),
                _ => None,
            },
            NodeMut::Function(function) => match field {
                "id" => function.id.as_mut().map(SlotMut::Ident),
                "body" => Some(SlotMut::Node(NodeMut::Block(&mut function.body))),
                _ => None,
            },
            NodeMut::Arrow(arrow) => match field {
                "body" => Some(match &mut arrow.body {
                    ArrowBody::Expr(expr) => SlotMut::Expr(expr),
                    ArrowBody::Block(block) => SlotMut::Node(NodeMut::Block(block)),
                }),
                _ => None,
            },
            NodeMut::Class(class) => match field {
                "id" => class.id.as_mut().map(SlotMut::Ident),
                "superClass" => opt_box_expr(&mut class.super_class),
                "body" => Some(SlotMut::Node(NodeMut::ClassBody(&mut class.body))),
                _ => None,
            },
            NodeMut::ClassMember(member) => match &mut member.kind {
                ClassMemberKind::Method { key, function, .. } => match field {
                    "key" => Some(key_slot(key)),
                    "body" => Some(SlotMut::Node(NodeMut::Block(&mut function.body))),
                    _ => None,
                },
                ClassMemberKind::Property { key, value, .. } => match field {
                    "key" => Some(key_slot(key)),
                    "value" => opt_expr(value),
                    _ => None,
                },
            },
            NodeMut::SwitchCase(case) => match field {
                "test" => opt_expr(&mut case.test),
                _ => None,
            },
            NodeMut::CatchClause(clause) => match field {
                "param" => clause.param.as_mut().map(SlotMut::Pattern),
                "body" => Some(SlotMut::Node(NodeMut::Block(&mut clause.body))),
                _ => None,
            },
            NodeMut::ImportSpecifier(spec) => match (&mut spec.kind, field) {
                (ImportSpecifierKind::Default(local), "local")
                | (ImportSpecifierKind::Namespace(local), "local")
                | (ImportSpecifierKind::Named { local, .. }, "local") => Some(SlotMut::Ident(local)),
                (ImportSpecifierKind::Named { imported, .. }, "imported") => Some(SlotMut::Ident(imported)),
                _ => None,
            },
            NodeMut::ExportSpecifier(spec) => match field {
                "local" => Some(SlotMut::Ident(&mut spec.local)),
                "exported" => Some(SlotMut::Ident(&mut spec.exported)),
                _ => None,
            },
            NodeMut::Expr(expr) => match &mut expr.kind {
                ExprKind::Ident(_) => None,
                ExprKind::Template(template) => NodeMut::Template(template).single(field),
                ExprKind::Function(function) => NodeMut::Function(function).single(field),
                ExprKind::Arrow(arrow) => NodeMut::Arrow(arrow).single(field),
                ExprKind::Class(class) => NodeMut::Class(class).single(field),
                ExprKind::TaggedTemplate { tag, quasi } => match field {
                    "tag" => Some(SlotMut::Expr(tag)),
                    "quasi" => Some(SlotMut::Node(NodeMut::Template(quasi))),
                    _ => None,
                },
                ExprKind::MetaProperty { meta, property } => match field {
                    "meta" => Some(SlotMut::Ident(meta)),
                    "property" => Some(SlotMut::Ident(property)),
                    _ => None,
                },
                ExprKind::Unary { argument, .. }
                | ExprKind::Update { argument, .. }
                | ExprKind::Spread(argument)
                | ExprKind::Await(argument) => match field {
                    "argument" => Some(SlotMut::Expr(argument)),
                    _ => None,
                },
                ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                    match field {
                        "left" => Some(SlotMut::Expr(left)),
                        "right" => Some(SlotMut::Expr(right)),
                        _ => None,
                    }
                }
                ExprKind::Assign { left, right, .. } => match field {
                    "left" => Some(SlotMut::Pattern(left)),
                    "right" => Some(SlotMut::Expr(right)),
                    _ => None,
                },
                ExprKind::Conditional { test, consequent, alternate } => match field {
                    "test" => Some(SlotMut::Expr(test)),
                    "consequent" => Some(SlotMut::Expr(consequent)),
                    "alternate" => Some(SlotMut::Expr(alternate)),
                    _ => None,
                },
                ExprKind::Member { object, property, .. } => match field {
                    "object" => Some(SlotMut::Expr(object)),
                    "property" => Some(match property {
                        MemberProp::Ident(ident) => SlotMut::Ident(ident),
                        MemberProp::Computed(expr) => SlotMut::Expr(expr),
                    }),
                    _ => None,
                },
                ExprKind::Call { callee, .. } | ExprKind::New { callee, .. } => match field {
                    "callee" => Some(SlotMut::Expr(callee)),
                    _ => None,
                },
                ExprKind::Yield { argument, .. } => match field {
                    "argument" => opt_box_expr(argument),
                    _ => None,
                },
                _ => None,
            },
            NodeMut::Template(_) | NodeMut::TemplateElement(_) | NodeMut::Ident(_) => None,
            NodeMut::Property(prop) => match &mut prop.kind {
                PropertyKind::Init { key, value, .. } => match field {
                    "key" => Some(key_slot(key)),
                    "value" => Some(SlotMut::Expr(value)),
                    _ => None,
                },
                PropertyKind::Method { key, function, .. } => match field {
                    "key" => Some(key_slot(key)),
                    "body" => Some(SlotMut::Node(NodeMut::Block(&mut function.body))),
                    _ => None,
                },
                PropertyKind::Spread(argument) => match field {
                    "argument" => Some(SlotMut::Expr(argument)),
                    _ => None,
                },
            },
            NodeMut::PatternProp(prop) => match prop {
                PatternProp::Prop { key, value, .. } => match field {
                    "key" => Some(key_slot(key)),
                    "value" => Some(SlotMut::Pattern(value)),
                    _ => None,
                },
                PatternProp::Rest(rest) => NodeMut::Pattern(rest).single(field),
            },
            NodeMut::Pattern(pattern) => match &mut pattern.kind {
                PatternKind::Ident(_) | PatternKind::Array(_) | PatternKind::Object(_) => None,
                PatternKind::Expr(expr) => NodeMut::Expr(expr).single(field),
                PatternKind::Assign { left, right } => match field {
                    "left" => Some(SlotMut::Pattern(left)),
                    "right" => Some(SlotMut::Expr(right)),
                    _ => None,
                },
                PatternKind::Rest(argument) => match field {
                    "argument" => Some(SlotMut::Pattern(argument)),
                    _ => None,
                },
            },
        }
    }

    /// A list field.
    pub fn list(self, field: &str) -> Option<ListMut<'a>> {
        match self {
            NodeMut::Program(program) => match field {
                "body" => Some(ListMut::Stmts(&mut program.body)),
                _ => None,
            },
            NodeMut::Stmt(stmt) => match &mut stmt.kind {
                StmtKind::Var(decl) => NodeMut::VarDecl(decl).list(field),
                StmtKind::Function(function) => NodeMut::Function(function).list(field),
                StmtKind::Class(class) => NodeMut::Class(class).list(field),
                StmtKind::Block(block) => NodeMut::Block(block).list(field),
                StmtKind::Switch { cases, .. } => match field {
                    "cases" => Some(ListMut::Cases(cases)),
                    _ => None,
                },
                StmtKind::Import(decl) => match field {
                    "specifiers" => Some(ListMut::ImportSpecifiers(&mut decl.specifiers)),
                    _ => None,
                },
                StmtKind::ExportNamed(export) => match field {
                    "specifiers" => Some(ListMut::ExportSpecifiers(&mut export.specifiers)),
                    _ => None,
                },
                _ => None,
            },
            NodeMut::Block(block) => match field {
                "body" => Some(ListMut::Stmts(&mut block.body)),
                _ => None,
            },
            NodeMut::VarDecl(decl) => match field {
                "declarations" => Some(ListMut::Declarators(&mut decl.declarations)),
                _ => None,
            },
            NodeMut::Function(function) => match field {
                "params" => Some(ListMut::Params(&mut function.params)),
                _ => None,
            },
            NodeMut::Arrow(arrow) => match field {
                "params" => Some(ListMut::Params(&mut arrow.params)),
                _ => None,
            },
            NodeMut::ClassBody(body) => match field {
                "body" => Some(ListMut::Members(&mut body.members)),
                _ => None,
            },
            NodeMut::ClassMember(member) => match (&mut member.kind, field) {
                (ClassMemberKind::Method { function, .. }, "params") => {
                    Some(ListMut::Params(&mut function.params))
                }
                _ => None,
            },
            NodeMut::SwitchCase(case) => match field {
                "consequent" => Some(ListMut::Stmts(&mut case.consequent)),
                _ => None,
            },
            NodeMut::Expr(expr) => match &mut expr.kind {
                ExprKind::Template(template) => NodeMut::Template(template).list(field),
                ExprKind::Function(function) => NodeMut::Function(function).list(field),
                ExprKind::Arrow(arrow) => NodeMut::Arrow(arrow).list(field),
                ExprKind::Array(elements) => match field {
                    "elements" => Some(ListMut::Elements(elements)),
                    _ => None,
                },
                ExprKind::Object(properties) => match field {
                    "properties" => Some(ListMut::Properties(properties)),
                    _ => None,
                },
                ExprKind::Sequence(expressions) => match field {
                    "expressions" => Some(ListMut::Exprs(expressions)),
                    _ => None,
                },
                ExprKind::Call { arguments, .. } | ExprKind::New { arguments, .. } => match field {
                    "arguments" => Some(ListMut::Exprs(arguments)),
                    _ => None,
                },
                _ => None,
            },
            NodeMut::Template(template) => match field {
                "quasis" => Some(ListMut::Quasis(&mut template.quasis)),
                "expressions" => Some(ListMut::TemplateExprs(&mut template.expressions)),
                _ => None,
            },
            NodeMut::Property(prop) => match (&mut prop.kind, field) {
                (PropertyKind::Method { function, .. }, "params") => {
                    Some(ListMut::Params(&mut function.params))
                }
                _ => None,
            },
            NodeMut::PatternProp(prop) => match prop {
                PatternProp::Rest(rest) => NodeMut::Pattern(rest).list(field),
                PatternProp::Prop { .. } => None,
            },
            NodeMut::Pattern(pattern) => match &mut pattern.kind {
                PatternKind::Array(elements) => match field {
                    "elements" => Some(ListMut::PatternElements(elements)),
                    _ => None,
                },
                PatternKind::Object(props) => match field {
                    "properties" => Some(ListMut::PatternProps(props)),
                    _ => None,
                },
                PatternKind::Expr(expr) => NodeMut::Expr(expr).list(field),
                _ => None,
            },
            NodeMut::VarDeclarator(_)
            | NodeMut::Class(_)
            | NodeMut::CatchClause(_)
            | NodeMut::ImportSpecifier(_)
            | NodeMut::ExportSpecifier(_)
            | NodeMut::TemplateElement(_)
            | NodeMut::Ident(_) => None,
        }
    }

    /// Assign a plain-valued field such as `kind`, `name` or `operator`.
    pub fn set_scalar(self, field: &str, value: &Scalar) -> EditResult {
        let type_name = self.type_name();
        let unknown = || edit_err(format!("Cannot assign to {type_name}.{field}"));
        match self {
            NodeMut::Stmt(stmt) => match &mut stmt.kind {
                StmtKind::Var(decl) => NodeMut::VarDecl(decl).set_scalar(field, value),
                StmtKind::Function(function) => NodeMut::Function(function).set_scalar(field, value),
                StmtKind::ForOf { is_await, .. } if field == "await" => {
                    *is_await = expect_bool(value, field)?;
                    Ok(())
                }
                _ => unknown(),
            },
            NodeMut::VarDecl(decl) => match field {
                "kind" => {
                    let name = expect_string(value, field)?;
                    decl.kind = match VarKind::from_name(name) {
                        Some(kind) => kind,
                        None => return invalid_value(field, name),
                    };
                    Ok(())
                }
                _ => unknown(),
            },
            NodeMut::Function(function) => match field {
                "async" => {
                    function.is_async = expect_bool(value, field)?;
                    Ok(())
                }
                "generator" => {
                    function.is_generator = expect_bool(value, field)?;
                    Ok(())
                }
                _ => unknown(),
            },
            NodeMut::Arrow(arrow) => match field {
                "async" => {
                    arrow.is_async = expect_bool(value, field)?;
                    Ok(())
                }
                _ => unknown(),
            },
            NodeMut::ClassMember(member) => match (&mut member.kind, field) {
                (ClassMemberKind::Method { is_static, .. }, "static")
                | (ClassMemberKind::Property { is_static, .. }, "static") => {
                    *is_static = expect_bool(value, field)?;
                    Ok(())
                }
                (ClassMemberKind::Method { key, .. }, "computed")
                | (ClassMemberKind::Property { key, .. }, "computed") => {
                    set_key_computed(key, expect_bool(value, field)?)
                }
                (ClassMemberKind::Method { kind, .. }, "kind") => set_method_kind(kind, value, true),
                (ClassMemberKind::Method { function, .. }, "async" | "generator") => {
                    NodeMut::Function(function).set_scalar(field, value)
                }
                _ => unknown(),
            },
            NodeMut::Property(prop) => match (&mut prop.kind, field) {
                (PropertyKind::Init { shorthand, .. }, "shorthand") => {
                    *shorthand = expect_bool(value, field)?;
                    Ok(())
                }
                (PropertyKind::Init { key, .. }, "computed")
                | (PropertyKind::Method { key, .. }, "computed") => {
                    set_key_computed(key, expect_bool(value, field)?)
                }
                (PropertyKind::Method { kind, .. }, "kind") => set_method_kind(kind, value, false),
                (PropertyKind::Method { function, .. }, "async" | "generator") => {
                    NodeMut::Function(function).set_scalar(field, value)
                }
                _ => unknown(),
            },
            NodeMut::PatternProp(prop) => match prop {
                PatternProp::Prop { shorthand, .. } if field == "shorthand" => {
                    *shorthand = expect_bool(value, field)?;
                    Ok(())
                }
                PatternProp::Prop { key, .. } if field == "computed" => {
                    set_key_computed(key, expect_bool(value, field)?)
                }
                PatternProp::Rest(rest) => NodeMut::Pattern(rest).set_scalar(field, value),
                _ => unknown(),
            },
            NodeMut::Pattern(pattern) => match &mut pattern.kind {
                PatternKind::Ident(ident) => NodeMut::Ident(ident).set_scalar(field, value),
                PatternKind::Expr(expr) => NodeMut::Expr(expr).set_scalar(field, value),
                _ => unknown(),
            },
            NodeMut::Ident(ident) => match field {
                "name" => {
                    ident.name = expect_string(value, field)?.to_string();
                    Ok(())
                }
                _ => unknown(),
            },
            NodeMut::TemplateElement(element) => match field {
                "value" => {
                    element.cooked = expect_string(value, field)?.to_string();
                    Ok(())
                }
                _ => unknown(),
            },
            NodeMut::Expr(expr) => set_expr_scalar(expr, field, value).unwrap_or_else(unknown),
            _ => unknown(),
        }
    }
}

/// `None` when the field does not exist on this expression.
fn set_expr_scalar(expr: &mut Expr, field: &str, value: &Scalar) -> Option<EditResult> {
    if field == "operator" && matches!(expr.kind, ExprKind::Binary { .. } | ExprKind::Logical { .. }) {
        return Some(set_binary_operator(expr, value));
    }
    let result = match (&mut expr.kind, field) {
        (ExprKind::Ident(ident), _) => return Some(NodeMut::Ident(ident).set_scalar(field, value)),
        (ExprKind::Function(function), _) => {
            return Some(NodeMut::Function(function).set_scalar(field, value))
        }
        (ExprKind::Arrow(arrow), _) => return Some(NodeMut::Arrow(arrow).set_scalar(field, value)),
        (ExprKind::String(s), "value") | (ExprKind::BigInt(s), "value") => {
            expect_string(value, field).map(|v| *s = v.to_string())
        }
        (ExprKind::Regex { pattern, .. }, "pattern") => {
            expect_string(value, field).map(|v| *pattern = v.to_string())
        }
        (ExprKind::Regex { flags, .. }, "flags") => {
            expect_string(value, field).map(|v| *flags = v.to_string())
        }
        (ExprKind::Number(n), "value") => match value {
            Scalar::Number(v) => {
                *n = *v;
                Ok(())
            }
            other => edit_err(format!("Property value expected a number, got {other}")),
        },
        (ExprKind::Bool(b), "value") => expect_bool(value, field).map(|v| *b = v),
        (ExprKind::Unary { op, .. }, "operator") => {
            let name = expect_string(value, field);
            name.and_then(|name| match UnaryOp::from_name(name) {
                Some(new) => {
                    *op = new;
                    Ok(())
                }
                None => invalid_value(field, name),
            })
        }
        (ExprKind::Update { op, .. }, "operator") => {
            let name = expect_string(value, field);
            name.and_then(|name| match UpdateOp::from_name(name) {
                Some(new) => {
                    *op = new;
                    Ok(())
                }
                None => invalid_value(field, name),
            })
        }
        (ExprKind::Update { prefix, .. }, "prefix") => expect_bool(value, field).map(|v| *prefix = v),
        (ExprKind::Assign { op, .. }, "operator") => {
            let name = expect_string(value, field);
            name.and_then(|name| match AssignOp::from_name(name) {
                Some(new) => {
                    *op = new;
                    Ok(())
                }
                None => invalid_value(field, name),
            })
        }
        (ExprKind::Member { property, .. }, "computed") => {
            expect_bool(value, field).and_then(|computed| set_member_computed(property, computed))
        }
        (ExprKind::Yield { delegate, .. }, "delegate") => {
            expect_bool(value, field).map(|v| *delegate = v)
        }
        _ => return None,
    };
    Some(result)
}

/// Binary and logical expressions share `operator`; switching between the
/// two groups changes the node type.
fn set_binary_operator(expr: &mut Expr, value: &Scalar) -> EditResult {
    enum Target {
        Binary(BinaryOp),
        Logical(LogicalOp),
    }

    let name = expect_string(value, "operator")?;
    let target = if let Some(op) = BinaryOp::from_name(name) {
        Target::Binary(op)
    } else if let Some(op) = LogicalOp::from_name(name) {
        Target::Logical(op)
    } else {
        return invalid_value("operator", name);
    };
    let (left, right) = match std::mem::replace(&mut expr.kind, ExprKind::Null) {
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => (left, right),
        other => {
            expr.kind = other;
            return edit_err("Cannot assign to operator");
        }
    };
    expr.kind = match target {
        Target::Binary(op) => ExprKind::Binary { op, left, right },
        Target::Logical(op) => ExprKind::Logical { op, left, right },
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse, ParserOptions};

    fn types(source: &str) -> Vec<&'static str> {
        let ast = parse(source, ParserOptions::default()).unwrap();
        let mut out = Vec::new();
        walk(NodeRef::program(&ast.program), &mut |node| out.push(node.node_type().as_str()));
        out
    }

    #[test]
    fn test_node_type_names() {
        assert_eq!(NodeType::from_name("VariableDeclaration"), Some(NodeType::VariableDeclaration));
        assert_eq!("Identifier".parse::<NodeType>(), Ok(NodeType::Identifier));
        assert!("Expression".parse::<NodeType>().is_err());
        for ty in NodeType::ALL {
            assert_eq!(NodeType::from_name(ty.as_str()), Some(*ty));
        }
    }

    #[test]
    fn test_aliases() {
        assert!(Alias::Expression.covers(NodeType::Identifier));
        assert!(!Alias::Expression.covers(NodeType::VariableDeclaration));
        assert!(Alias::Function.covers(NodeType::ArrowFunctionExpression));
        let aliases: Vec<_> = NodeType::ForOfStatement.aliases().collect();
        assert!(aliases.contains(&Alias::Loop));
        assert!(aliases.contains(&Alias::Statement));
    }

    #[test]
    fn test_walk_order() {
        assert_eq!(
            types("var a = 10;"),
            vec![
                "Program",
                "VariableDeclaration",
                "VariableDeclarator",
                "Identifier",
                "NumericLiteral"
            ]
        );
    }

    #[test]
    fn test_optional_chain_types() {
        let seen = types("a?.b.c();");
        assert!(seen.contains(&"OptionalCallExpression"));
        assert!(seen.contains(&"OptionalMemberExpression"));
        assert!(!seen.contains(&"CallExpression"));
    }

    #[test]
    fn test_fields_in_babel_order() {
        let ast = parse("let x = 1;", ParserOptions::default()).unwrap();
        let decl = NodeRef::stmt(&ast.program.body[0]);
        let names: Vec<_> = decl.fields().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["declarations", "kind"]);
    }

    #[test]
    fn test_descend_matches_between_sides() {
        let mut ast = parse("foo(1, bar);", ParserOptions::default()).unwrap();
        let path = [
            Step::item("body", 0),
            Step::field("expression"),
            Step::item("arguments", 1),
        ];
        let node = NodeRef::program(&ast.program).descend(&path).unwrap();
        assert_eq!(node.node_type(), NodeType::Identifier);

        let slot = NodeMut::Program(&mut ast.program).descend(&path).unwrap();
        slot.into_node()
            .set_scalar("name", &Scalar::String("baz".into()))
            .unwrap();
        let node = NodeRef::program(&ast.program).descend(&path).unwrap();
        assert!(matches!(node, NodeRef::Ident(ident) if ident.name == "baz"));
    }

    #[test]
    fn test_set_kind_validates() {
        let mut ast = parse("var a = 1;", ParserOptions::default()).unwrap();
        let slot = NodeMut::Program(&mut ast.program)
            .descend(&[Step::item("body", 0)])
            .unwrap();
        let err = slot
            .into_node()
            .set_scalar("kind", &Scalar::String("banana".into()))
            .unwrap_err();
        assert!(err.to_string().contains("banana"));
    }

    #[test]
    fn test_operator_switches_group() {
        let mut ast = parse("a + b;", ParserOptions::default()).unwrap();
        let slot = NodeMut::Program(&mut ast.program)
            .descend(&[Step::item("body", 0), Step::field("expression")])
            .unwrap();
        slot.into_node()
            .set_scalar("operator", &Scalar::String("&&".into()))
            .unwrap();
        let StmtKind::Expr(expr) = &ast.program.body[0].kind else {
            panic!("expected expression statement");
        };
        assert!(matches!(expr.kind, ExprKind::Logical { op: LogicalOp::And, .. }));
    }

    #[test]
    fn test_remove_skips_holes() {
        let mut ast = parse("[a, , b, c];", ParserOptions::default()).unwrap();
        let list = NodeMut::Program(&mut ast.program)
            .descend(&[Step::item("body", 0), Step::field("expression")])
            .unwrap()
            .into_node()
            .list("elements")
            .unwrap();
        assert_eq!(list.len(), 3);
        list.remove(1).unwrap();
        let StmtKind::Expr(Expr { kind: ExprKind::Array(elements), .. }) = &ast.program.body[0].kind else {
            panic!("expected array");
        };
        assert_eq!(elements.len(), 3);
        assert!(elements[1].is_none());
    }
}
