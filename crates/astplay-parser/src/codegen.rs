//! JavaScript code generator.
//!
//! Converts an AST back to JavaScript source code. Output is normalized:
//! double-quoted strings, two-space indentation, one statement per line and
//! no comments. Parentheses are inserted from operator precedence, so an
//! edited tree prints correctly even when the edit changed the nesting.

use crate::ast::*;

/// Code generation options.
#[derive(Debug, Clone, Default)]
pub struct CodegenOptions {
    /// Indent string (default: two spaces).
    pub indent: Option<String>,
}

/// Prints a [`Program`] as normalized JavaScript.
pub struct Codegen<'a> {
    program: &'a Program,
    out: String,
    /// Current block nesting.
    depth: usize,
    indent: String,
}

// Precedence levels used by `emit_expr_with_prec`.
const PREC_SEQUENCE: u8 = 1;
const PREC_ASSIGN: u8 = 2;
const PREC_CONDITIONAL: u8 = 3;
const PREC_CONDITIONAL_TEST: u8 = 4;
const PREC_UNARY: u8 = 15;
const PREC_POSTFIX: u8 = 16;
const PREC_NEW: u8 = 17;
const PREC_MEMBER: u8 = 18;

impl<'a> Codegen<'a> {
    pub fn new(program: &'a Program, options: CodegenOptions) -> Self {
        Self {
            program,
            out: String::new(),
            depth: 0,
            indent: options.indent.unwrap_or_else(|| "  ".to_string()),
        }
    }

    /// Print the program, statements separated by newlines.
    pub fn generate(mut self) -> String {
        let program = self.program;
        for (i, stmt) in program.body.iter().enumerate() {
            if i > 0 {
                self.newline();
            }
            self.emit_stmt(stmt);
        }
        self.out
    }

    // =========================================================================
    // Output Helpers
    // =========================================================================

    fn write(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn space(&mut self) {
        self.out.push(' ');
    }

    fn newline(&mut self) {
        self.out.push('\n');
        self.out.extend(std::iter::repeat(self.indent.as_str()).take(self.depth));
    }

    fn semicolon(&mut self) {
        self.out.push(';');
    }

    fn close_brace(&mut self) {
        self.out.push('}');
    }

    fn indent(&mut self) {
        self.depth += 1;
    }

    fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn emit_comma_list<T>(&mut self, items: &[T], mut each: impl FnMut(&mut Self, &T)) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.write(",");
                self.space();
            }
            each(self, item);
        }
    }

    /// `{ a, b }` with inner padding, `{}` when empty.
    fn emit_braced_list<T>(&mut self, items: &[T], each: impl FnMut(&mut Self, &T)) {
        self.write("{");
        if !items.is_empty() {
            self.space();
            self.emit_comma_list(items, each);
            self.space();
        }
        self.write("}");
    }

    // =========================================================================
    // Statement Emission
    // =========================================================================

    fn emit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Var(decl) => {
                self.emit_var_decl(decl);
                self.semicolon();
            }
            StmtKind::Function(func) => {
                self.emit_function(func);
            }
            StmtKind::Class(class) => {
                self.emit_class(class);
            }
            StmtKind::Block(block) => {
                self.emit_block(block);
            }
            StmtKind::If { test, consequent, alternate } => {
                self.write("if");
                self.space();
                self.write("(");
                self.emit_expr(test);
                self.write(")");
                self.space();
                // A nested `if` without `else` would capture our `else`.
                let dangling = alternate.is_some()
                    && matches!(consequent.kind, StmtKind::If { alternate: None, .. });
                if dangling {
                    self.write("{");
                    self.indent();
                    self.newline();
                    self.emit_stmt(consequent);
                    self.dedent();
                    self.newline();
                    self.close_brace();
                } else {
                    self.emit_stmt(consequent);
                }
                if let Some(alt) = alternate {
                    if matches!(consequent.kind, StmtKind::Block(_)) || dangling {
                        self.space();
                    } else {
                        self.newline();
                    }
                    self.write("else");
                    if matches!(alt.kind, StmtKind::Block(_)) {
                        self.space();
                    } else {
                        self.write(" ");
                    }
                    self.emit_stmt(alt);
                }
            }
            StmtKind::Switch { discriminant, cases } => {
                self.write("switch");
                self.space();
                self.write("(");
                self.emit_expr(discriminant);
                self.write(")");
                self.space();
                self.write("{");
                self.indent();
                for case in cases {
                    self.newline();
                    if let Some(test) = &case.test {
                        self.write("case ");
                        self.emit_expr(test);
                        self.write(":");
                    } else {
                        self.write("default:");
                    }
                    self.indent();
                    for stmt in &case.consequent {
                        self.newline();
                        self.emit_stmt(stmt);
                    }
                    self.dedent();
                }
                self.dedent();
                if !cases.is_empty() {
                    self.newline();
                }
                self.close_brace();
            }
            StmtKind::For { init, test, update, body } => {
                self.write("for");
                self.space();
                self.write("(");
                if let Some(init) = init {
                    match init {
                        ForInit::Var(decl) => self.emit_var_decl(decl),
                        ForInit::Expr(expr) => self.emit_expr(expr),
                    }
                }
                self.write(";");
                if let Some(test) = test {
                    self.space();
                    self.emit_expr(test);
                }
                self.write(";");
                if let Some(update) = update {
                    self.space();
                    self.emit_expr(update);
                }
                self.write(")");
                self.emit_loop_body(body);
            }
            StmtKind::ForIn { left, right, body } => {
                self.write("for");
                self.space();
                self.write("(");
                self.emit_for_head(left);
                self.write(" in ");
                self.emit_expr(right);
                self.write(")");
                self.emit_loop_body(body);
            }
            StmtKind::ForOf { left, right, body, is_await } => {
                self.write("for");
                if *is_await {
                    self.write(" await");
                }
                self.space();
                self.write("(");
                self.emit_for_head(left);
                self.write(" of ");
                self.emit_expr_with_prec(right, PREC_ASSIGN);
                self.write(")");
                self.emit_loop_body(body);
            }
            StmtKind::While { test, body } => {
                self.write("while");
                self.space();
                self.write("(");
                self.emit_expr(test);
                self.write(")");
                self.emit_loop_body(body);
            }
            StmtKind::DoWhile { body, test } => {
                self.write("do");
                if matches!(body.kind, StmtKind::Block(_)) {
                    self.space();
                } else {
                    self.write(" ");
                }
                self.emit_stmt(body);
                self.space();
                self.write("while");
                self.space();
                self.write("(");
                self.emit_expr(test);
                self.write(")");
                self.semicolon();
            }
            StmtKind::Break { label } | StmtKind::Continue { label } => {
                let keyword = if matches!(stmt.kind, StmtKind::Break { .. }) {
                    "break"
                } else {
                    "continue"
                };
                self.write(keyword);
                if let Some(label) = label {
                    self.write(" ");
                    self.write(&label.name);
                }
                self.semicolon();
            }
            StmtKind::Return { argument } => {
                self.write("return");
                if let Some(argument) = argument {
                    self.write(" ");
                    self.emit_expr(argument);
                }
                self.semicolon();
            }
            StmtKind::Throw { argument } => {
                self.write("throw ");
                self.emit_expr(argument);
                self.semicolon();
            }
            StmtKind::Try { block, handler, finalizer } => {
                self.write("try");
                self.space();
                self.emit_block(block);
                if let Some(catch) = handler {
                    self.space();
                    self.write("catch");
                    if let Some(param) = &catch.param {
                        self.space();
                        self.write("(");
                        self.emit_pattern(param);
                        self.write(")");
                    }
                    self.space();
                    self.emit_block(&catch.body);
                }
                if let Some(finally) = finalizer {
                    self.space();
                    self.write("finally");
                    self.space();
                    self.emit_block(finally);
                }
            }
            StmtKind::Labeled { label, body } => {
                self.write(&label.name);
                self.write(":");
                self.space();
                self.emit_stmt(body);
            }
            StmtKind::Expr(expr) => {
                if starts_ambiguously(expr) {
                    self.write("(");
                    self.emit_expr(expr);
                    self.write(")");
                } else {
                    self.emit_expr(expr);
                }
                self.semicolon();
            }
            StmtKind::Empty => {
                self.write(";");
            }
            StmtKind::Debugger => {
                self.write("debugger");
                self.semicolon();
            }
            StmtKind::Import(decl) => {
                self.emit_import(decl);
            }
            StmtKind::ExportNamed(export) => {
                self.write("export ");
                if let Some(decl) = &export.declaration {
                    self.emit_stmt(decl);
                } else {
                    self.emit_braced_list(&export.specifiers, |this, spec| {
                        this.write(&spec.local.name);
                        if spec.local.name != spec.exported.name {
                            this.write(" as ");
                            this.write(&spec.exported.name);
                        }
                    });
                    if let Some(source) = &export.source {
                        self.space();
                        self.write("from");
                        self.space();
                        self.emit_expr(source);
                    }
                    self.semicolon();
                }
            }
            StmtKind::ExportDefault(export) => {
                self.write("export default ");
                match export {
                    ExportDefault::Function(func) => self.emit_function(func),
                    ExportDefault::Class(class) => self.emit_class(class),
                    ExportDefault::Expr(expr) => {
                        if starts_ambiguously(expr) {
                            self.write("(");
                            self.emit_expr_with_prec(expr, PREC_ASSIGN);
                            self.write(")");
                        } else {
                            self.emit_expr_with_prec(expr, PREC_ASSIGN);
                        }
                        self.semicolon();
                    }
                }
            }
            StmtKind::ExportAll(export) => {
                self.write("export *");
                if let Some(exported) = &export.exported {
                    self.write(" as ");
                    self.write(&exported.name);
                }
                self.space();
                self.write("from");
                self.space();
                self.emit_expr(&export.source);
                self.semicolon();
            }
        }
    }

    fn emit_loop_body(&mut self, body: &Stmt) {
        if matches!(body.kind, StmtKind::Empty) {
            self.write(";");
        } else {
            self.space();
            self.emit_stmt(body);
        }
    }

    fn emit_block(&mut self, block: &Block) {
        self.write("{");
        if !block.body.is_empty() {
            self.indent();
            for stmt in &block.body {
                self.newline();
                self.emit_stmt(stmt);
            }
            self.dedent();
            self.newline();
        }
        self.close_brace();
    }

    /// `let a = 1, b` without the trailing semicolon.
    fn emit_var_decl(&mut self, decl: &VarDecl) {
        self.write(decl.kind.as_str());
        self.write(" ");
        self.emit_comma_list(&decl.declarations, |this, declarator| {
            this.emit_pattern(&declarator.id);
            if let Some(init) = &declarator.init {
                this.space();
                this.write("=");
                this.space();
                this.emit_expr_with_prec(init, PREC_ASSIGN);
            }
        });
    }

    fn emit_for_head(&mut self, head: &ForHead) {
        match head {
            ForHead::Var(decl) => self.emit_var_decl(decl),
            ForHead::Pattern(pattern) => self.emit_pattern(pattern),
        }
    }

    fn emit_pattern(&mut self, pattern: &Pattern) {
        match &pattern.kind {
            PatternKind::Ident(ident) => self.write(&ident.name),
            PatternKind::Array(elements) => {
                self.write("[");
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.write(",");
                        if element.is_some() {
                            self.space();
                        }
                    }
                    if let Some(element) = element {
                        self.emit_pattern(element);
                    }
                }
                if matches!(elements.last(), Some(None)) {
                    self.write(",");
                }
                self.write("]");
            }
            PatternKind::Object(props) => {
                self.emit_braced_list(props, |this, prop| match prop {
                    PatternProp::Prop { key, value, shorthand, .. } => {
                        if *shorthand && pattern_is_shorthand(key, value) {
                            this.emit_pattern(value);
                        } else {
                            this.emit_property_key(key);
                            this.write(":");
                            this.space();
                            this.emit_pattern(value);
                        }
                    }
                    PatternProp::Rest(rest) => this.emit_pattern(rest),
                });
            }
            PatternKind::Assign { left, right } => {
                self.emit_pattern(left);
                self.space();
                self.write("=");
                self.space();
                self.emit_expr_with_prec(right, PREC_ASSIGN);
            }
            PatternKind::Rest(argument) => {
                self.write("...");
                self.emit_pattern(argument);
            }
            PatternKind::Expr(expr) => self.emit_expr_with_prec(expr, PREC_MEMBER),
        }
    }

    fn emit_params(&mut self, params: &[Pattern]) {
        self.write("(");
        self.emit_comma_list(params, |this, param| this.emit_pattern(param));
        self.write(")");
    }

    fn emit_function(&mut self, func: &Function) {
        if func.is_async {
            self.write("async ");
        }
        self.write("function");
        if func.is_generator {
            self.write("*");
        }
        if let Some(id) = &func.id {
            self.write(" ");
            self.write(&id.name);
        } else {
            self.space();
        }
        self.emit_params(&func.params);
        self.space();
        self.emit_block(&func.body);
    }

    fn emit_arrow(&mut self, arrow: &ArrowFunction) {
        if arrow.is_async {
            self.write("async ");
        }

        // Single identifier parameter can omit parens
        match arrow.params.as_slice() {
            [Pattern { kind: PatternKind::Ident(ident), .. }] => self.write(&ident.name),
            params => self.emit_params(params),
        }

        self.space();
        self.write("=>");
        self.space();

        match &arrow.body {
            ArrowBody::Expr(expr) => {
                // Object literal needs parens
                if starts_ambiguously(expr) {
                    self.write("(");
                    self.emit_expr_with_prec(expr, PREC_ASSIGN);
                    self.write(")");
                } else {
                    self.emit_expr_with_prec(expr, PREC_ASSIGN);
                }
            }
            ArrowBody::Block(block) => {
                self.emit_block(block);
            }
        }
    }

    /// Parameters and body of a method; the key has already been written.
    fn emit_method_rest(&mut self, func: &Function) {
        self.emit_params(&func.params);
        self.space();
        self.emit_block(&func.body);
    }

    fn emit_method_head(&mut self, kind: MethodKind, func: &Function, key: &PropertyKey) {
        match kind {
            MethodKind::Get => self.write("get "),
            MethodKind::Set => self.write("set "),
            MethodKind::Method | MethodKind::Constructor => {
                if func.is_async {
                    self.write("async ");
                }
                if func.is_generator {
                    self.write("*");
                }
            }
        }
        self.emit_property_key(key);
    }

    fn emit_class(&mut self, class: &Class) {
        self.write("class");
        if let Some(id) = &class.id {
            self.write(" ");
            self.write(&id.name);
        }
        if let Some(super_class) = &class.super_class {
            self.write(" extends ");
            self.emit_expr_with_prec(super_class, PREC_MEMBER);
        }
        self.space();
        self.write("{");
        self.indent();
        for member in &class.body.members {
            self.newline();
            self.emit_class_member(member);
        }
        self.dedent();
        if !class.body.members.is_empty() {
            self.newline();
        }
        self.close_brace();
    }

    fn emit_class_member(&mut self, member: &ClassMember) {
        match &member.kind {
            ClassMemberKind::Method { key, kind, is_static, function } => {
                if *is_static {
                    self.write("static ");
                }
                self.emit_method_head(*kind, function, key);
                self.emit_method_rest(function);
            }
            ClassMemberKind::Property { key, value, is_static } => {
                if *is_static {
                    self.write("static ");
                }
                self.emit_property_key(key);
                if let Some(value) = value {
                    self.space();
                    self.write("=");
                    self.space();
                    self.emit_expr_with_prec(value, PREC_ASSIGN);
                }
                self.semicolon();
            }
        }
    }

    fn emit_import(&mut self, decl: &ImportDecl) {
        self.write("import ");

        let mut wrote_clause = false;
        let mut named = Vec::new();

        for spec in &decl.specifiers {
            match &spec.kind {
                ImportSpecifierKind::Default(local) => {
                    self.write(&local.name);
                    wrote_clause = true;
                }
                ImportSpecifierKind::Namespace(local) => {
                    if wrote_clause {
                        self.write(",");
                        self.space();
                    }
                    self.write("* as ");
                    self.write(&local.name);
                    wrote_clause = true;
                }
                ImportSpecifierKind::Named { imported, local } => {
                    named.push((imported, local));
                }
            }
        }

        if !named.is_empty() {
            if wrote_clause {
                self.write(",");
                self.space();
            }
            self.emit_braced_list(&named, |this, (imported, local)| {
                this.write(&imported.name);
                if imported.name != local.name {
                    this.write(" as ");
                    this.write(&local.name);
                }
            });
            wrote_clause = true;
        }

        if wrote_clause {
            self.write(" from ");
        }
        self.emit_expr(&decl.source);
        self.semicolon();
    }

    // =========================================================================
    // Expression Emission
    // =========================================================================

    fn emit_expr(&mut self, expr: &Expr) {
        self.emit_expr_with_prec(expr, 0);
    }

    fn emit_expr_with_prec(&mut self, expr: &Expr, min_prec: u8) {
        match &expr.kind {
            ExprKind::Null => self.write("null"),
            ExprKind::Bool(b) => self.write(if *b { "true" } else { "false" }),
            ExprKind::Number(n) => {
                let text = format_number(*n);
                if text.starts_with('-') && min_prec >= PREC_UNARY {
                    self.write("(");
                    self.write(&text);
                    self.write(")");
                } else if min_prec >= PREC_MEMBER && !text.contains(|c: char| matches!(c, '.' | 'e' | 'N' | 'I')) {
                    // `1.toString()` would read as a decimal point
                    self.write("(");
                    self.write(&text);
                    self.write(")");
                } else {
                    self.write(&text);
                }
            }
            ExprKind::BigInt(digits) => {
                self.write(digits);
                self.write("n");
            }
            ExprKind::String(s) => {
                self.write("\"");
                self.write(&escape_string(s));
                self.write("\"");
            }
            ExprKind::Regex { pattern, flags } => {
                self.write("/");
                self.write(pattern);
                self.write("/");
                self.write(flags);
            }
            ExprKind::Template(template) => self.emit_template(template),
            ExprKind::TaggedTemplate { tag, quasi } => {
                self.emit_expr_with_prec(tag, PREC_MEMBER);
                self.emit_template(quasi);
            }
            ExprKind::Ident(ident) => self.write(&ident.name),
            ExprKind::This => self.write("this"),
            ExprKind::Super => self.write("super"),
            ExprKind::Import => self.write("import"),
            ExprKind::MetaProperty { meta, property } => {
                self.write(&meta.name);
                self.write(".");
                self.write(&property.name);
            }
            ExprKind::Array(elements) => {
                self.write("[");
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        self.write(",");
                        if elem.is_some() {
                            self.space();
                        }
                    }
                    if let Some(elem) = elem {
                        self.emit_expr_with_prec(elem, PREC_ASSIGN);
                    }
                }
                if matches!(elements.last(), Some(None)) {
                    self.write(",");
                }
                self.write("]");
            }
            ExprKind::Object(properties) => {
                self.emit_braced_list(properties, |this, prop| this.emit_object_property(prop));
            }
            ExprKind::Function(func) => {
                self.emit_function(func);
            }
            ExprKind::Arrow(arrow) => {
                // Arrows have low precedence; may need parens
                let parens = min_prec > PREC_ASSIGN;
                if parens {
                    self.write("(");
                }
                self.emit_arrow(arrow);
                if parens {
                    self.write(")");
                }
            }
            ExprKind::Class(class) => {
                self.emit_class(class);
            }
            ExprKind::Unary { op, argument } => {
                let parens = min_prec > PREC_UNARY;
                if parens {
                    self.write("(");
                }
                let op_str = op.as_str();
                self.write(op_str);
                if op_str.chars().all(|c| c.is_ascii_alphabetic()) {
                    self.write(" ");
                }
                let mark = self.out.len();
                self.emit_expr_with_prec(argument, PREC_UNARY);
                // `- -a` and `+ +a` must not fuse into `--`/`++`
                if matches!(op, UnaryOp::Minus | UnaryOp::Plus) && self.out[mark..].starts_with(op_str) {
                    self.out.insert(mark, ' ');
                }
                if parens {
                    self.write(")");
                }
            }
            ExprKind::Update { op, prefix, argument } => {
                let parens = min_prec > PREC_UNARY;
                if parens {
                    self.write("(");
                }
                if *prefix {
                    self.write(op.as_str());
                    self.emit_expr_with_prec(argument, PREC_UNARY);
                } else {
                    self.emit_expr_with_prec(argument, PREC_POSTFIX);
                    self.write(op.as_str());
                }
                if parens {
                    self.write(")");
                }
            }
            ExprKind::Binary { op, left, right } => {
                let prec = binary_prec(*op);
                let needs_parens = prec < min_prec;
                if needs_parens {
                    self.write("(");
                }
                // `-a ** b` is a syntax error, so the base binds tighter than unary
                let left_prec = if *op == BinaryOp::Pow { PREC_POSTFIX } else { prec };
                self.emit_expr_with_prec(left, left_prec);
                self.space();
                self.write(op.as_str());
                self.space();
                // Right side needs higher precedence for left-associative ops
                let right_prec = if *op == BinaryOp::Pow { prec } else { prec + 1 };
                self.emit_expr_with_prec(right, right_prec);
                if needs_parens {
                    self.write(")");
                }
            }
            ExprKind::Logical { op, left, right } => {
                let prec = logical_prec(*op);
                let needs_parens = prec < min_prec;
                if needs_parens {
                    self.write("(");
                }
                self.emit_logical_operand(*op, left, prec);
                self.space();
                self.write(op.as_str());
                self.space();
                self.emit_logical_operand(*op, right, prec + 1);
                if needs_parens {
                    self.write(")");
                }
            }
            ExprKind::Assign { op, left, right } => {
                let parens = min_prec > PREC_ASSIGN;
                if parens {
                    self.write("(");
                }
                self.emit_pattern(left);
                self.space();
                self.write(op.as_str());
                self.space();
                self.emit_expr_with_prec(right, PREC_ASSIGN);
                if parens {
                    self.write(")");
                }
            }
            ExprKind::Conditional { test, consequent, alternate } => {
                let parens = min_prec > PREC_CONDITIONAL;
                if parens {
                    self.write("(");
                }
                self.emit_expr_with_prec(test, PREC_CONDITIONAL_TEST);
                self.space();
                self.write("?");
                self.space();
                self.emit_expr_with_prec(consequent, PREC_ASSIGN);
                self.space();
                self.write(":");
                self.space();
                self.emit_expr_with_prec(alternate, PREC_ASSIGN);
                if parens {
                    self.write(")");
                }
            }
            ExprKind::Sequence(exprs) => {
                let parens = min_prec > PREC_SEQUENCE;
                if parens {
                    self.write("(");
                }
                self.emit_comma_list(exprs, |this, expr| this.emit_expr_with_prec(expr, PREC_ASSIGN));
                if parens {
                    self.write(")");
                }
            }
            ExprKind::Member { object, property, optional } => {
                self.emit_expr_with_prec(object, PREC_MEMBER);
                match property {
                    MemberProp::Ident(ident) => {
                        self.write(if *optional { "?." } else { "." });
                        self.write(&ident.name);
                    }
                    MemberProp::Computed(expr) => {
                        self.write(if *optional { "?.[" } else { "[" });
                        self.emit_expr(expr);
                        self.write("]");
                    }
                }
            }
            ExprKind::Call { callee, arguments, optional } => {
                self.emit_expr_with_prec(callee, PREC_MEMBER);
                self.write(if *optional { "?.(" } else { "(" });
                self.emit_arguments(arguments);
                self.write(")");
            }
            ExprKind::New { callee, arguments } => {
                self.write("new ");
                if contains_call(callee) {
                    self.write("(");
                    self.emit_expr(callee);
                    self.write(")");
                } else {
                    self.emit_expr_with_prec(callee, PREC_NEW);
                }
                self.write("(");
                self.emit_arguments(arguments);
                self.write(")");
            }
            ExprKind::Spread(argument) => {
                self.write("...");
                self.emit_expr_with_prec(argument, PREC_ASSIGN);
            }
            ExprKind::Yield { argument, delegate } => {
                let parens = min_prec > PREC_ASSIGN;
                if parens {
                    self.write("(");
                }
                self.write("yield");
                if *delegate {
                    self.write("*");
                }
                if let Some(argument) = argument {
                    self.write(" ");
                    self.emit_expr_with_prec(argument, PREC_ASSIGN);
                }
                if parens {
                    self.write(")");
                }
            }
            ExprKind::Await(argument) => {
                let parens = min_prec > PREC_UNARY;
                if parens {
                    self.write("(");
                }
                self.write("await ");
                self.emit_expr_with_prec(argument, PREC_UNARY);
                if parens {
                    self.write(")");
                }
            }
        }
    }

    /// `??` cannot be mixed with `&&`/`||` without parentheses.
    fn emit_logical_operand(&mut self, op: LogicalOp, operand: &Expr, prec: u8) {
        let mixes = match &operand.kind {
            ExprKind::Logical { op: inner, .. } => {
                (op == LogicalOp::Nullish) != (*inner == LogicalOp::Nullish)
            }
            _ => false,
        };
        if mixes {
            self.write("(");
            self.emit_expr(operand);
            self.write(")");
        } else {
            self.emit_expr_with_prec(operand, prec);
        }
    }

    fn emit_arguments(&mut self, arguments: &[Expr]) {
        self.emit_comma_list(arguments, |this, arg| this.emit_expr_with_prec(arg, PREC_ASSIGN));
    }

    fn emit_template(&mut self, template: &Template) {
        self.write("`");
        for (i, quasi) in template.quasis.iter().enumerate() {
            self.write(&escape_template(&quasi.cooked));
            if let Some(expr) = template.expressions.get(i) {
                self.write("${");
                self.emit_expr(expr);
                self.write("}");
            }
        }
        self.write("`");
    }

    fn emit_object_property(&mut self, prop: &Property) {
        match &prop.kind {
            PropertyKind::Init { key, value, shorthand } => {
                let is_shorthand = *shorthand
                    && matches!(
                        (key, &value.kind),
                        (PropertyKey::Ident(k), ExprKind::Ident(v)) if k.name == v.name
                    );
                if is_shorthand {
                    self.write(&key_name(key));
                } else {
                    self.emit_property_key(key);
                    self.write(":");
                    self.space();
                    self.emit_expr_with_prec(value, PREC_ASSIGN);
                }
            }
            PropertyKind::Method { key, kind, function } => {
                self.emit_method_head(*kind, function, key);
                self.emit_method_rest(function);
            }
            PropertyKind::Spread(argument) => {
                self.write("...");
                self.emit_expr_with_prec(argument, PREC_ASSIGN);
            }
        }
    }

    fn emit_property_key(&mut self, key: &PropertyKey) {
        match key {
            PropertyKey::Ident(ident) => self.write(&ident.name),
            PropertyKey::Literal(expr) => self.emit_expr(expr),
            PropertyKey::Computed(expr) => {
                self.write("[");
                self.emit_expr_with_prec(expr, PREC_ASSIGN);
                self.write("]");
            }
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn key_name(key: &PropertyKey) -> String {
    key.static_name().unwrap_or_default()
}

/// Whether `{ a }` / `{ a = 1 }` can be printed for this pattern property.
fn pattern_is_shorthand(key: &PropertyKey, value: &Pattern) -> bool {
    let PropertyKey::Ident(key) = key else {
        return false;
    };
    match &value.kind {
        PatternKind::Ident(ident) => ident.name == key.name,
        PatternKind::Assign { left, .. } => {
            matches!(&left.kind, PatternKind::Ident(ident) if ident.name == key.name)
        }
        _ => false,
    }
}

/// Whether an expression in statement position would be read as a
/// declaration or block if printed bare.
fn starts_ambiguously(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Object(_) | ExprKind::Function(_) | ExprKind::Class(_) => true,
        ExprKind::Member { object, .. } => starts_ambiguously(object),
        ExprKind::Call { callee, .. } => starts_ambiguously(callee),
        ExprKind::TaggedTemplate { tag, .. } => starts_ambiguously(tag),
        ExprKind::Binary { left, .. } | ExprKind::Logical { left, .. } => starts_ambiguously(left),
        ExprKind::Conditional { test, .. } => starts_ambiguously(test),
        ExprKind::Sequence(exprs) => exprs.first().is_some_and(starts_ambiguously),
        ExprKind::Update { prefix: false, argument, .. } => starts_ambiguously(argument),
        ExprKind::Assign { left, .. } => match &left.kind {
            PatternKind::Object(_) => true,
            PatternKind::Expr(target) => starts_ambiguously(target),
            _ => false,
        },
        _ => false,
    }
}

/// `new a.b()` is fine, `new (a())()` needs parens around the callee.
fn contains_call(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Call { .. } => true,
        ExprKind::Member { object, .. } => contains_call(object),
        ExprKind::TaggedTemplate { tag, .. } => contains_call(tag),
        _ => false,
    }
}

/// Format a number the way JavaScript's `Number.prototype.toString` does.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    let sign = if value < 0.0 { "-" } else { "" };
    // Rust's `{:e}` gives the shortest round-trip digits.
    let sci = format!("{:e}", value.abs());
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    let n = exponent + 1;

    let body = if k <= n && n <= 21 {
        format!("{digits}{}", "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        let (int, frac) = digits.split_at(n as usize);
        format!("{int}.{frac}")
    } else if -6 < n && n <= 0 {
        format!("0.{}{digits}", "0".repeat((-n) as usize))
    } else {
        let (first, rest) = digits.split_at(1);
        let e = n - 1;
        let e_sign = if e < 0 { '-' } else { '+' };
        if rest.is_empty() {
            format!("{first}e{e_sign}{}", e.abs())
        } else {
            format!("{first}.{rest}e{e_sign}{}", e.abs())
        }
    };
    format!("{sign}{body}")
}

fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\0' => result.push_str("\\0"),
            '\u{2028}' => result.push_str("\\u2028"),
            '\u{2029}' => result.push_str("\\u2029"),
            c if c.is_control() => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }
    result
}

fn escape_template(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => result.push_str("\\\\"),
            '`' => result.push_str("\\`"),
            '$' if chars.peek() == Some(&'{') => result.push_str("\\$"),
            c => result.push(c),
        }
    }
    result
}

fn binary_prec(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::BitOr => 6,
        BinaryOp::BitXor => 7,
        BinaryOp::BitAnd => 8,
        BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::StrictEq | BinaryOp::StrictNotEq => 9,
        BinaryOp::Lt
        | BinaryOp::LtEq
        | BinaryOp::Gt
        | BinaryOp::GtEq
        | BinaryOp::In
        | BinaryOp::Instanceof => 10,
        BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => 11,
        BinaryOp::Add | BinaryOp::Sub => 12,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 13,
        BinaryOp::Pow => 14,
    }
}

fn logical_prec(op: LogicalOp) -> u8 {
    match op {
        LogicalOp::Or | LogicalOp::Nullish => 4,
        LogicalOp::And => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Parser, ParserOptions};

    fn roundtrip(source: &str) -> String {
        let ast = Parser::new(source, ParserOptions::default()).parse().unwrap();
        Codegen::new(&ast.program, CodegenOptions::default()).generate()
    }

    #[test]
    fn test_variable_declaration() {
        assert_eq!(roundtrip("let x = 1;"), "let x = 1;");
        assert_eq!(roundtrip("var a=10"), "var a = 10;");
    }

    #[test]
    fn test_function_declaration() {
        assert_eq!(
            roundtrip("function foo(a, b) { return a + b; }"),
            "function foo(a, b) {\n  return a + b;\n}"
        );
    }

    #[test]
    fn test_strings_use_double_quotes() {
        assert_eq!(roundtrip("f('it\\'s', \"q\\\"\");"), "f(\"it's\", \"q\\\"\");");
    }

    #[test]
    fn test_comments_dropped() {
        assert_eq!(roundtrip("// hi\nlet a = 1; /* x */"), "let a = 1;");
    }

    #[test]
    fn test_precedence_parens() {
        assert_eq!(roundtrip("(a + b) * c;"), "(a + b) * c;");
        assert_eq!(roundtrip("a + b * c;"), "a + b * c;");
        assert_eq!(roundtrip("a - (b - c);"), "a - (b - c);");
        assert_eq!(roundtrip("(-a) ** 2;"), "(-a) ** 2;");
        assert_eq!(roundtrip("a ?? (b || c);"), "a ?? (b || c);");
    }

    #[test]
    fn test_statement_start_parens() {
        assert_eq!(roundtrip("({}).x;"), "({}.x);");
        assert_eq!(roundtrip("(function () {})();"), "(function () {}());");
        assert_eq!(roundtrip("f = () => ({});"), "f = () => ({});");
    }

    #[test]
    fn test_arrow_and_call() {
        assert_eq!(roundtrip("foo(x => x * 2);"), "foo(x => x * 2);");
        assert_eq!(roundtrip("a?.b?.(c);"), "a?.b?.(c);");
        assert_eq!(roundtrip("new Foo;"), "new Foo();");
    }

    #[test]
    fn test_templates() {
        assert_eq!(roundtrip("`a${b}c`;"), "`a${b}c`;");
    }

    #[test]
    fn test_custom_indent() {
        let ast = Parser::new("if (a) { b(); }", ParserOptions::default()).parse().unwrap();
        let options = CodegenOptions { indent: Some("\t".to_string()) };
        assert_eq!(Codegen::new(&ast.program, options).generate(), "if (a) {\n\tb();\n}");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(10.0), "10");
        assert_eq!(format_number(0.1), "0.1");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(123456789012345680000.0), "123456789012345680000");
        assert_eq!(format_number(-2.5), "-2.5");
        assert_eq!(format_number(f64::NAN), "NaN");
    }
}
