//! Definition tree construction.
//!
//! Walks a parsed Python file and produces one [`DefRecord`] per documentable
//! definition: the module itself, classes, functions, and async functions.
//! Traversal keeps an explicit stack of open record indices; a definition's
//! `level` is the stack depth at the moment it is entered, and its `parent`
//! is the index on top of the stack. Nodes outside the documentable kinds are
//! recursed through without producing records, so a function inside an `if`
//! block at module level still sits directly under the module record.
//!
//! Visibility and decorator skip rules run here, at visit time: a skipped
//! definition's entire subtree is skipped with it.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use tree_sitter::Node;

use crate::filter::ScopeConfig;
use crate::parser::{node_text, string_content, ParserError, PythonParser};
use crate::record::{DefKind, DefRecord, DefTree};

// ============================================================================
// Builder Errors
// ============================================================================

/// Errors that can occur while building a definition tree.
#[derive(Debug, Error)]
pub enum TreeError {
    /// Parser error
    #[error("Parser error: {0}")]
    Parser(#[from] ParserError),

    /// Failed to read a source file
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ============================================================================
// Decorator Shapes
// ============================================================================

/// Shape of a decorator expression.
///
/// Only bare-name references (`@property`) and attribute-access references
/// (`@x.setter`, `@typing.overload`) participate in skip rules; calls and
/// other expressions never match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoratorShape {
    /// `@name`
    Name(String),
    /// `@value.attr`
    Attribute { attr: String },
}

impl DecoratorShape {
    fn from_expression(expr: Node<'_>, source: &str) -> Option<Self> {
        match expr.kind() {
            "identifier" => Some(DecoratorShape::Name(node_text(expr, source).to_string())),
            "attribute" => {
                let attr = expr.child_by_field_name("attribute")?;
                Some(DecoratorShape::Attribute {
                    attr: node_text(attr, source).to_string(),
                })
            }
            _ => None,
        }
    }

    /// Property getter, setter, or deleter.
    fn is_property_like(&self) -> bool {
        match self {
            DecoratorShape::Name(name) => name == "property",
            DecoratorShape::Attribute { attr } => attr == "setter" || attr == "deleter",
        }
    }

    /// Property setter only.
    fn is_setter(&self) -> bool {
        matches!(self, DecoratorShape::Attribute { attr } if attr == "setter")
    }

    /// `@overload` or `@typing.overload`.
    fn is_overload(&self) -> bool {
        match self {
            DecoratorShape::Name(name) => name == "overload",
            DecoratorShape::Attribute { attr } => attr == "overload",
        }
    }
}

// ============================================================================
// Tree Builder
// ============================================================================

/// Builds per-file definition trees.
pub struct TreeBuilder {
    parser: PythonParser,
    config: ScopeConfig,
}

impl TreeBuilder {
    /// Create a builder with the given scope configuration.
    pub fn new(config: ScopeConfig) -> Result<Self, TreeError> {
        Ok(Self {
            parser: PythonParser::new()?,
            config,
        })
    }

    /// Read and build the definition tree for one source file.
    pub fn build_file(&mut self, path: &Path) -> Result<DefTree, TreeError> {
        let source = std::fs::read_to_string(path).map_err(|source| TreeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.build(path, &source)
    }

    /// Build the definition tree for one file's source text.
    pub fn build(&mut self, file: &Path, source: &str) -> Result<DefTree, TreeError> {
        let syntax = self.parser.parse(source)?;
        let root = syntax.root_node();

        let base_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());

        let docstring = docstring_node(root).map(|n| clean_docstring(&string_content(n, source)));
        let covered = docstring.as_deref().is_some_and(|d| !d.trim().is_empty());

        let mut records = vec![DefRecord {
            name: base_name.clone(),
            path: base_name,
            kind: DefKind::Module,
            level: 0,
            line: Some(1),
            span: source.lines().count(),
            covered,
            docstring,
            code: None,
            nested_function: false,
            nested_class: false,
            parent: None,
            file: file.to_path_buf(),
        }];

        let mut stack = vec![0];
        self.walk_children(root, source, file, &mut stack, &mut records);

        debug!("Built {} records for {}", records.len(), file.display());
        Ok(DefTree::new(file.to_path_buf(), records))
    }

    fn walk_children(
        &self,
        node: Node<'_>,
        source: &str,
        file: &Path,
        stack: &mut Vec<usize>,
        records: &mut Vec<DefRecord>,
    ) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child, source, file, stack, records);
        }
    }

    fn visit(
        &self,
        node: Node<'_>,
        source: &str,
        file: &Path,
        stack: &mut Vec<usize>,
        records: &mut Vec<DefRecord>,
    ) {
        match node.kind() {
            "decorated_definition" => {
                let decorators = collect_decorators(node, source);
                if let Some(def) = node.child_by_field_name("definition") {
                    self.visit_definition(def, &decorators, source, file, stack, records);
                }
            }
            "class_definition" | "function_definition" => {
                self.visit_definition(node, &[], source, file, stack, records);
            }
            _ => self.walk_children(node, source, file, stack, records),
        }
    }

    fn visit_definition(
        &self,
        node: Node<'_>,
        decorators: &[DecoratorShape],
        source: &str,
        file: &Path,
        stack: &mut Vec<usize>,
        records: &mut Vec<DefRecord>,
    ) {
        let name = match node.child_by_field_name("name") {
            Some(n) => node_text(n, source).to_string(),
            None => return,
        };
        let kind = match node.kind() {
            "class_definition" => DefKind::Class,
            _ if is_async(node) => DefKind::AsyncFunction,
            _ => DefKind::Function,
        };

        if self.should_skip(&name, kind, decorators) {
            return;
        }

        // Definitions are only ever visited under an open module record.
        let parent_idx = match stack.last() {
            Some(&idx) => idx,
            None => return,
        };
        let parent = &records[parent_idx];
        let separator = if parent.kind == DefKind::Module {
            ":"
        } else {
            "."
        };
        let path = format!("{}{}{}", parent.path, separator, name);
        let nested_function = kind.is_callable() && parent.kind.is_callable();
        let nested_class = kind == DefKind::Class && parent.kind != DefKind::Module;

        let raw = node_text(node, source);
        let doc_node = docstring_node(node);
        let docstring = doc_node.map(|n| clean_docstring(&string_content(n, source)));
        let covered = docstring.as_deref().is_some_and(|d| !d.trim().is_empty());
        let def_row = node.start_position().row;
        let doc_rows = doc_node.map(|n| (n.start_position().row, n.end_position().row));
        let code = strip_docstring_lines(raw, def_row, doc_rows);

        let idx = records.len();
        records.push(DefRecord {
            name,
            path,
            kind,
            level: stack.len(),
            line: Some(node.start_position().row + 1),
            span: raw.lines().count(),
            covered,
            docstring,
            code: Some(code),
            nested_function,
            nested_class,
            parent: Some(parent_idx),
            file: file.to_path_buf(),
        });

        if let Some(body) = node.child_by_field_name("body") {
            stack.push(idx);
            self.walk_children(body, source, file, stack, records);
            stack.pop();
        }
    }

    /// Visit-time skip rules. A skipped definition's subtree is never entered.
    fn should_skip(&self, name: &str, kind: DefKind, decorators: &[DecoratorShape]) -> bool {
        if self.config.ignore_private && is_private(name) {
            return true;
        }
        if self.config.ignore_semiprivate && is_semiprivate(name) {
            return true;
        }
        if kind.is_callable() {
            if self.config.ignore_init_method && name == "__init__" {
                return true;
            }
            if self.config.ignore_magic && is_magic(name) {
                return true;
            }
            if self.config.ignore_property_decorators
                && decorators.iter().any(DecoratorShape::is_property_like)
            {
                return true;
            }
            if self.config.ignore_property_setters && decorators.iter().any(DecoratorShape::is_setter)
            {
                return true;
            }
            if self.config.ignore_overloaded_functions
                && decorators.iter().any(DecoratorShape::is_overload)
            {
                return true;
            }
        }
        false
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn collect_decorators(node: Node<'_>, source: &str) -> Vec<DecoratorShape> {
    let mut shapes = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "decorator" {
            if let Some(expr) = child.named_child(0) {
                if let Some(shape) = DecoratorShape::from_expression(expr, source) {
                    shapes.push(shape);
                }
            }
        }
    }
    shapes
}

fn is_async(node: Node<'_>) -> bool {
    node.child(0).is_some_and(|c| c.kind() == "async")
}

/// Locate the docstring string node of a definition, when present: the first
/// statement of the body, and an expression statement holding a plain string.
pub fn docstring_node(node: Node<'_>) -> Option<Node<'_>> {
    let body = if node.kind() == "module" {
        node
    } else {
        node.child_by_field_name("body")?
    };
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = first.named_child(0)?;
    if expr.kind() == "string" {
        Some(expr)
    } else {
        None
    }
}

/// Normalize docstring text: drop the first line's leading whitespace, remove
/// the common indentation of the remaining lines, and strip enclosing blank
/// lines.
fn clean_docstring(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let margin = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<String> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                line.trim_start().trim_end().to_string()
            } else {
                line.get(margin..).unwrap_or("").trim_end().to_string()
            }
        })
        .collect();

    while cleaned.first().is_some_and(|l| l.is_empty()) {
        cleaned.remove(0);
    }
    while cleaned.last().is_some_and(|l| l.is_empty()) {
        cleaned.pop();
    }
    cleaned.join("\n")
}

/// Remove the docstring's source lines (content plus the enclosing quote
/// marker lines) from a definition's text. `doc_rows` is the docstring string
/// node's inclusive row range in the file; rows are rebased onto the
/// definition's own first row before filtering.
fn strip_docstring_lines(raw: &str, def_row: usize, doc_rows: Option<(usize, usize)>) -> String {
    let Some((doc_start, doc_end)) = doc_rows else {
        return raw.to_string();
    };
    let first = doc_start.saturating_sub(def_row);
    let last = doc_end.saturating_sub(def_row);
    raw.lines()
        .enumerate()
        .filter(|(i, _)| *i < first || *i > last)
        .map(|(_, line)| line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Name starts with two leading underscores and does not end with two.
fn is_private(name: &str) -> bool {
    if name.ends_with("__") {
        return false;
    }
    name.starts_with("__")
}

/// Name starts with exactly one underscore and does not end with two.
fn is_semiprivate(name: &str) -> bool {
    if name.ends_with("__") || name.starts_with("__") {
        return false;
    }
    name.starts_with('_')
}

/// Dunder name other than the constructor.
fn is_magic(name: &str) -> bool {
    name != "__init__" && name.starts_with("__") && name.ends_with("__")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#""""Module docs."""


class Outer:
    """Outer docs."""

    def __init__(self, x):
        self.x = x

    def method(self):
        """Method docs."""
        return self.x

    class Inner:
        def inner_method(self):
            pass


def top(a, b):
    """Top.

    More detail.
    """
    def closure():
        return a + b
    return closure


async def fetch():
    pass
"#;

    fn build(source: &str, config: ScopeConfig) -> DefTree {
        let mut builder = TreeBuilder::new(config).unwrap();
        builder.build(Path::new("sample.py"), source).unwrap()
    }

    #[test]
    fn test_builds_expected_records() {
        let tree = build(SAMPLE, ScopeConfig::default());
        let names: Vec<&str> = tree.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "sample.py",
                "Outer",
                "__init__",
                "method",
                "Inner",
                "inner_method",
                "top",
                "closure",
                "fetch",
            ]
        );
        let kinds: Vec<DefKind> = tree.records.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DefKind::Module,
                DefKind::Class,
                DefKind::Function,
                DefKind::Function,
                DefKind::Class,
                DefKind::Function,
                DefKind::Function,
                DefKind::Function,
                DefKind::AsyncFunction,
            ]
        );
        let levels: Vec<usize> = tree.records.iter().map(|r| r.level).collect();
        assert_eq!(levels, vec![0, 1, 2, 2, 2, 3, 1, 2, 1]);
    }

    #[test]
    fn test_paths_join_module_with_colon_and_scopes_with_dot() {
        let tree = build(SAMPLE, ScopeConfig::default());
        let paths: Vec<&str> = tree.records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "sample.py",
                "sample.py:Outer",
                "sample.py:Outer.__init__",
                "sample.py:Outer.method",
                "sample.py:Outer.Inner",
                "sample.py:Outer.Inner.inner_method",
                "sample.py:top",
                "sample.py:top.closure",
                "sample.py:fetch",
            ]
        );
    }

    #[test]
    fn test_module_record_spans_whole_file() {
        let tree = build(SAMPLE, ScopeConfig::default());
        let module = &tree.records[0];
        assert_eq!(module.kind, DefKind::Module);
        assert_eq!(module.line, Some(1));
        assert_eq!(module.span, SAMPLE.lines().count());
        assert!(module.covered);
        assert_eq!(module.code, None);
    }

    #[test]
    fn test_coverage_flags() {
        let tree = build(SAMPLE, ScopeConfig::default());
        let covered: Vec<bool> = tree.records.iter().map(|r| r.covered).collect();
        assert_eq!(
            covered,
            vec![true, true, false, true, false, false, true, false, false]
        );
    }

    #[test]
    fn test_docstring_cleaning_removes_common_indent() {
        let tree = build(SAMPLE, ScopeConfig::default());
        let top = &tree.records[6];
        assert_eq!(top.docstring.as_deref(), Some("Top.\n\nMore detail."));
    }

    #[test]
    fn test_code_strips_docstring_lines() {
        let tree = build(SAMPLE, ScopeConfig::default());
        let method = &tree.records[3];
        let code = method.code.as_deref().unwrap();
        assert!(code.contains("def method(self):"));
        assert!(code.contains("return self.x"));
        assert!(!code.contains("Method docs."));
        assert!(!code.contains("\"\"\""));
    }

    #[test]
    fn test_single_line_docstring_is_stripped() {
        let source = "def f():\n    \"\"\"Doc.\"\"\"\n    return 1\n";
        let tree = build(source, ScopeConfig::default());
        let code = tree.records[1].code.as_deref().unwrap();
        assert_eq!(code, "def f():\n    return 1");
    }

    #[test]
    fn test_blank_body_lines_survive_stripping() {
        let source = "def f():\n    \"\"\"Doc.\n\n    Tail.\n    \"\"\"\n    a = 1\n\n    return a\n";
        let tree = build(source, ScopeConfig::default());
        let code = tree.records[1].code.as_deref().unwrap();
        assert_eq!(code, "def f():\n    a = 1\n\n    return a");
    }

    #[test]
    fn test_parent_extent_contains_children() {
        let tree = build(SAMPLE, ScopeConfig::default());
        for rec in &tree.records {
            let Some(parent_idx) = rec.parent else {
                continue;
            };
            let (child_start, child_end) = rec.extent().unwrap();
            let (parent_start, parent_end) = tree.records[parent_idx].extent().unwrap();
            assert!(parent_start <= child_start, "start order for {}", rec.path);
            assert!(child_end <= parent_end, "end order for {}", rec.path);
        }
    }

    #[test]
    fn test_nested_flags() {
        let tree = build(SAMPLE, ScopeConfig::default());
        let inner = &tree.records[4];
        assert!(inner.nested_class);
        assert!(!inner.nested_function);
        let inner_method = &tree.records[5];
        assert!(!inner_method.nested_function);
        let closure = &tree.records[7];
        assert!(closure.nested_function);
        let top = &tree.records[6];
        assert!(!top.nested_function);
    }

    #[test]
    fn test_definition_under_conditional_stays_at_module_level() {
        let source = "import sys\n\nif sys.platform == \"linux\":\n    def native():\n        pass\n";
        let tree = build(source, ScopeConfig::default());
        assert_eq!(tree.records.len(), 2);
        let native = &tree.records[1];
        assert_eq!(native.name, "native");
        assert_eq!(native.level, 1);
        assert_eq!(native.parent, Some(0));
        assert_eq!(native.line, Some(4));
    }

    #[test]
    fn test_decorated_definition_line_is_the_def_line() {
        let source = "class C:\n    @property\n    def value(self):\n        return 1\n";
        let tree = build(source, ScopeConfig::default());
        let value = &tree.records[2];
        assert_eq!(value.name, "value");
        assert_eq!(value.line, Some(3));
        assert_eq!(value.span, 2);
    }

    #[test]
    fn test_one_liner_span() {
        let source = "def f(): return 1\n";
        let tree = build(source, ScopeConfig::default());
        assert_eq!(tree.records[1].span, 1);
        assert_eq!(tree.records[1].extent(), Some((1, 2)));
    }

    #[test]
    fn test_ignore_private_prunes_subtree() {
        let source = "class __Hidden:\n    def visible_inside(self):\n        pass\n\ndef __also_hidden():\n    pass\n";
        let config = ScopeConfig {
            ignore_private: true,
            ..ScopeConfig::default()
        };
        let tree = build(source, config);
        let names: Vec<&str> = tree.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["sample.py"]);
    }

    #[test]
    fn test_ignore_semiprivate_keeps_dunder_names() {
        let source = "def _helper():\n    pass\n\ndef __repr__():\n    pass\n";
        let config = ScopeConfig {
            ignore_semiprivate: true,
            ..ScopeConfig::default()
        };
        let tree = build(source, config);
        let names: Vec<&str> = tree.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["sample.py", "__repr__"]);
    }

    #[test]
    fn test_ignore_init_and_magic() {
        let source = "class C:\n    def __init__(self):\n        pass\n\n    def __eq__(self, other):\n        return True\n\n    def method(self):\n        pass\n";
        let config = ScopeConfig {
            ignore_init_method: true,
            ignore_magic: true,
            ..ScopeConfig::default()
        };
        let tree = build(source, config);
        let names: Vec<&str> = tree.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["sample.py", "C", "method"]);
    }

    #[test]
    fn test_magic_skip_does_not_apply_to_classes() {
        let source = "class __Meta__:\n    pass\n";
        let config = ScopeConfig {
            ignore_magic: true,
            ..ScopeConfig::default()
        };
        let tree = build(source, config);
        assert_eq!(tree.records.len(), 2);
        assert_eq!(tree.records[1].name, "__Meta__");
    }

    #[test]
    fn test_property_decorator_rules() {
        let source = "class C:\n    @property\n    def value(self):\n        return self._v\n\n    @value.setter\n    def value(self, v):\n        self._v = v\n\n    @value.deleter\n    def value(self):\n        del self._v\n";

        let all = build(source, ScopeConfig::default());
        assert_eq!(all.records.len(), 5);

        let config = ScopeConfig {
            ignore_property_decorators: true,
            ..ScopeConfig::default()
        };
        let tree = build(source, config);
        let names: Vec<&str> = tree.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["sample.py", "C"]);

        let config = ScopeConfig {
            ignore_property_setters: true,
            ..ScopeConfig::default()
        };
        let tree = build(source, config);
        // Only the setter goes; getter and deleter stay.
        assert_eq!(tree.records.len(), 4);
    }

    #[test]
    fn test_overload_decorator_rule() {
        let source = "from typing import overload\n\n@overload\ndef f(x: int) -> int: ...\n\n@typing.overload\ndef f(x: str) -> str: ...\n\ndef f(x):\n    return x\n";
        let config = ScopeConfig {
            ignore_overloaded_functions: true,
            ..ScopeConfig::default()
        };
        let tree = build(source, config);
        let names: Vec<&str> = tree.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["sample.py", "f"]);
    }

    #[test]
    fn test_decorator_call_shapes_never_match() {
        let source = "@functools.lru_cache()\ndef cached():\n    pass\n";
        let config = ScopeConfig {
            ignore_property_decorators: true,
            ignore_overloaded_functions: true,
            ..ScopeConfig::default()
        };
        let tree = build(source, config);
        assert_eq!(tree.records.len(), 2);
    }

    #[test]
    fn test_record_count_matches_definition_count() {
        let tree = build(SAMPLE, ScopeConfig::default());
        // One module, three classes/functions at module level, plus nested:
        // Outer, __init__, method, Inner, inner_method, top, closure, fetch.
        assert_eq!(tree.records.len(), 9);
        assert_eq!(tree.selected_count(), 9);
    }

    #[test]
    fn test_visibility_helpers() {
        assert!(is_private("__secret"));
        assert!(!is_private("__init__"));
        assert!(!is_private("_semi"));
        assert!(is_semiprivate("_semi"));
        assert!(!is_semiprivate("__secret"));
        assert!(!is_semiprivate("__eq__"));
        assert!(is_magic("__eq__"));
        assert!(!is_magic("__init__"));
    }

    #[test]
    fn test_clean_docstring_strips_outer_blanks() {
        assert_eq!(clean_docstring("\n    One.\n    Two.\n    "), "One.\nTwo.");
        assert_eq!(clean_docstring("Lead.\n    Indented."), "Lead.\nIndented.");
        assert_eq!(clean_docstring("   "), "");
    }
}
