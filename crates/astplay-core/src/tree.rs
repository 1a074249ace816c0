//! Tree projector: turns an AST into the nested display tree shown next to
//! the input buffer.
//!
//! The projection is a pure function of the node, the active node type and
//! the options. Nothing is cached; the session re-projects whenever the AST
//! or the active type changes.

use astplay_parser::{Field, LineIndex, NodeRef, SourceRange};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write as _;

/// What the projector shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectOptions {
    /// Nodes deeper than this are not expanded. The root is depth 0.
    pub max_depth: Option<usize>,
    /// Scalar fields to show when `show_all_fields` is off.
    pub field_whitelist: Option<BTreeSet<String>>,
    /// Show every scalar and empty field.
    pub show_all_fields: bool,
}

impl ProjectOptions {
    /// Show everything, unlimited depth.
    #[must_use]
    pub fn show_all() -> Self {
        Self {
            show_all_fields: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    #[must_use]
    pub fn with_whitelist<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field_whitelist = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    fn shows(&self, field: &str) -> bool {
        self.show_all_fields
            || self
                .field_whitelist
                .as_ref()
                .is_some_and(|fields| fields.contains(field))
    }
}

/// How a display node hangs off its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Label {
    Root,
    Field { name: String },
    Element { field: String, index: usize },
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Root => Ok(()),
            Label::Field { name } => write!(f, "{name}: "),
            Label::Element { field, index } => write!(f, "{field}[{index}]: "),
        }
    }
}

/// A scalar field shown next to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldValue {
    pub name: String,
    /// JavaScript literal form: `"a"`, `10`, `true`, `null`, `[]`.
    pub value: String,
}

/// One node of the display tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayNode {
    pub label: Label,
    pub node_type: String,
    pub range: Option<SourceRange>,
    pub is_active: bool,
    pub values: Vec<FieldValue>,
    pub children: Vec<DisplayNode>,
    /// Children exist but were cut off by `max_depth`.
    pub truncated: bool,
}

impl DisplayNode {
    /// Number of display nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(DisplayNode::count).sum::<usize>()
    }

    /// Pre-order iterator over this subtree.
    pub fn iter(&self) -> impl Iterator<Item = &DisplayNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    /// Indented text outline; active nodes are marked with `*`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        out.push_str(&"  ".repeat(depth));
        if self.is_active {
            out.push_str("* ");
        }
        let _ = write!(out, "{}{}", self.label, self.node_type);
        if let Some(range) = &self.range {
            let _ = write!(out, " {range}");
        }
        for value in &self.values {
            let _ = write!(out, " {}={}", value.name, value.value);
        }
        if self.truncated {
            out.push_str(" ...");
        }
        out.push('\n');
        for child in &self.children {
            child.render_into(out, depth + 1);
        }
    }
}

/// Project `node` and its descendants.
pub fn project(
    node: NodeRef<'_>,
    active: Option<&str>,
    options: &ProjectOptions,
    index: &LineIndex,
) -> DisplayNode {
    Projector { active, options, index }.node(node, Label::Root, 0)
}

/// Project a list of sibling nodes.
pub fn project_list(
    nodes: &[NodeRef<'_>],
    active: Option<&str>,
    options: &ProjectOptions,
    index: &LineIndex,
) -> Vec<DisplayNode> {
    let projector = Projector { active, options, index };
    nodes
        .iter()
        .map(|node| projector.node(*node, Label::Root, 0))
        .collect()
}

struct Projector<'o> {
    active: Option<&'o str>,
    options: &'o ProjectOptions,
    index: &'o LineIndex,
}

impl Projector<'_> {
    fn node(&self, node: NodeRef<'_>, label: Label, depth: usize) -> DisplayNode {
        let node_type = node.node_type().as_str();
        let expand = self.options.max_depth.map_or(true, |max| depth < max);

        let mut values = Vec::new();
        let mut children = Vec::new();
        let mut truncated = false;

        for (name, field) in node.fields() {
            match field {
                Field::Node(child) => {
                    if expand {
                        let label = Label::Field { name: name.to_string() };
                        children.push(self.node(child, label, depth + 1));
                    } else {
                        truncated = true;
                    }
                }
                Field::List(items) if !items.is_empty() => {
                    if expand {
                        for (index, child) in items.into_iter().enumerate() {
                            let label = Label::Element {
                                field: name.to_string(),
                                index,
                            };
                            children.push(self.node(child, label, depth + 1));
                        }
                    } else {
                        truncated = true;
                    }
                }
                Field::List(_) => {
                    if self.options.show_all_fields {
                        values.push(FieldValue {
                            name: name.to_string(),
                            value: "[]".to_string(),
                        });
                    }
                }
                Field::Null => {
                    if self.options.show_all_fields {
                        values.push(FieldValue {
                            name: name.to_string(),
                            value: "null".to_string(),
                        });
                    }
                }
                Field::Value(scalar) => {
                    if self.options.shows(name) {
                        values.push(FieldValue {
                            name: name.to_string(),
                            value: scalar.to_string(),
                        });
                    }
                }
            }
        }

        DisplayNode {
            label,
            node_type: node_type.to_string(),
            range: self.index.range(node.span()),
            is_active: self.active == Some(node_type),
            values,
            children,
            truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use astplay_parser::{node::walk, parse, ParserOptions};

    fn tree(source: &str, active: Option<&str>, options: &ProjectOptions) -> DisplayNode {
        let ast = parse(source, ParserOptions::default()).unwrap();
        project(NodeRef::program(&ast.program), active, options, ast.line_index())
    }

    /// The fields the viewer shows by default.
    fn viewer() -> ProjectOptions {
        ProjectOptions::default().with_whitelist(["name", "value", "kind", "operator"])
    }

    #[test]
    fn test_var_declaration_shape() {
        let root = tree("var a = 10;", None, &ProjectOptions::default());
        assert_eq!(root.node_type, "Program");
        assert_eq!(root.label, Label::Root);

        let decl = &root.children[0];
        assert_eq!(decl.node_type, "VariableDeclaration");
        assert_eq!(
            decl.label,
            Label::Element {
                field: "body".into(),
                index: 0
            }
        );
        let declarator = &decl.children[0];
        let types: Vec<_> = declarator.children.iter().map(|c| c.node_type.as_str()).collect();
        assert_eq!(types, ["Identifier", "NumericLiteral"]);
        assert_eq!(declarator.children[0].label, Label::Field { name: "id".into() });
    }

    #[test]
    fn test_one_display_node_per_ast_node() {
        for source in [
            "var a = 10;",
            "function sum(a, b) { return a + b; }",
            "const [x, , ...rest] = list; let { p: q = 1, ...o } = obj;",
            "class A extends B { static x = 1; get y() { return `t${this.x}`; } }",
            "for (const k of ks) { if (k?.v ?? d) continue; else break; }",
            "import a, { b as c } from \"m\"; export default [1, , 2];",
        ] {
            let ast = parse(source, ParserOptions::default()).unwrap();
            let mut count = 0;
            walk(NodeRef::program(&ast.program), &mut |_| count += 1);
            let root = project(
                NodeRef::program(&ast.program),
                None,
                &ProjectOptions::show_all(),
                ast.line_index(),
            );
            assert_eq!(root.count(), count, "{source}");
            assert_eq!(root.iter().count(), count, "{source}");
        }
    }

    #[test]
    fn test_active_marks_matching_types() {
        let root = tree(
            "function sum(a, b) { return a + b; }",
            Some("Identifier"),
            &ProjectOptions::default(),
        );
        let active: Vec<_> = root.iter().filter(|n| n.is_active).collect();
        assert_eq!(active.len(), 5);
        assert!(active.iter().all(|n| n.node_type == "Identifier"));
    }

    #[test]
    fn test_values() {
        let root = tree("var a = 10;", None, &viewer());
        let decl = &root.children[0];
        assert_eq!(
            decl.values,
            [FieldValue {
                name: "kind".into(),
                value: "\"var\"".into()
            }]
        );
        // Whitelist without `kind`.
        let root = tree("var a = 10;", None, &ProjectOptions::default().with_whitelist(["name"]));
        assert!(root.children[0].values.is_empty());
        // No whitelist shows no scalars.
        let root = tree("var a = 10;", None, &ProjectOptions::default());
        assert!(root.iter().all(|n| n.values.is_empty()));
        // Everything, including null and empty lists.
        let root = tree("function f() {}", None, &ProjectOptions::show_all());
        let function = &root.children[0];
        let names: Vec<_> = function.values.iter().map(|v| (v.name.as_str(), v.value.as_str())).collect();
        assert_eq!(
            names,
            [("generator", "false"), ("async", "false"), ("params", "[]")]
        );
        let body = &function.children[1];
        assert_eq!(body.node_type, "BlockStatement");
        assert_eq!(body.values[0].value, "[]");
    }

    #[test]
    fn test_max_depth_truncates() {
        let root = tree("var a = 10;", None, &ProjectOptions::default().with_max_depth(1));
        assert_eq!(root.count(), 2);
        let decl = &root.children[0];
        assert!(decl.children.is_empty());
        assert!(decl.truncated);
        assert!(!root.truncated);

        let root = tree("var a = 10;", None, &ProjectOptions::default().with_max_depth(0));
        assert_eq!(root.count(), 1);
        assert!(root.truncated);

        // Leaves are never truncated.
        let root = tree("a;", None, &ProjectOptions::default().with_max_depth(2));
        let ident = &root.children[0].children[0];
        assert_eq!(ident.node_type, "Identifier");
        assert!(!ident.truncated);
    }

    #[test]
    fn test_ranges() {
        let root = tree("var a = 10;\nb;", None, &ProjectOptions::default());
        assert_eq!(root.range.unwrap().to_string(), "1:1-2:2");
        let ident = &root.children[0].children[0].children[0];
        assert_eq!(ident.range.unwrap().to_string(), "1:5-1:5");
    }

    #[test]
    fn test_render() {
        let root = tree("var a = 10;", Some("Identifier"), &viewer());
        let text = root.render();
        let expected = "\
Program 1:1-1:11
  body[0]: VariableDeclaration 1:1-1:11 kind=\"var\"
    declarations[0]: VariableDeclarator 1:5-1:10
      * id: Identifier 1:5-1:5 name=\"a\"
      init: NumericLiteral 1:9-1:10 value=10
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_project_list() {
        let ast = parse("a; b;", ParserOptions::default()).unwrap();
        let nodes: Vec<_> = ast.program.body.iter().map(NodeRef::stmt).collect();
        let list = project_list(&nodes, None, &ProjectOptions::default(), ast.line_index());
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|n| n.node_type == "ExpressionStatement"));
    }
}
