//! Docstring rewrite and post-processing.
//!
//! Applies a name-keyed docstring map back onto a source file: every class
//! or function definition whose name appears in the map gets its docstring
//! replaced, or a new one inserted as the first body statement. Edits are
//! byte-range replacements applied back to front so earlier offsets stay
//! valid, followed by optional `black` and `docconvert` passes.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::process::Command;

use doclens_core::parser::{node_text, PythonParser};
use doclens_core::tree::docstring_node;
use tracing::{debug, warn};
use tree_sitter::Node;

use crate::error::RewriteError;

/// One byte-range replacement; insertions have an empty range.
struct Edit {
    start: usize,
    end: usize,
    text: String,
}

/// Writes generated docstrings back into source files.
pub struct Rewriter {
    parser: PythonParser,
    cleanup: bool,
    convert: bool,
    style: String,
}

impl Rewriter {
    pub fn new(cleanup: bool, convert: bool, style: impl Into<String>) -> Result<Self, RewriteError> {
        Ok(Self {
            parser: PythonParser::new()?,
            cleanup,
            convert,
            style: style.into(),
        })
    }

    /// Rewrite one file with the docstrings in `docs`, then post-process.
    ///
    /// Definitions are matched by bare name, at any nesting depth; a name
    /// occurring more than once receives the same docstring at every site.
    pub fn process(&mut self, path: &Path, docs: &BTreeMap<String, String>) -> Result<(), RewriteError> {
        let source = fs::read_to_string(path)?;
        let tree = self.parser.parse(&source)?;

        let mut edits = Vec::new();
        collect_edits(tree.root_node(), &source, docs, &mut edits);

        if !edits.is_empty() {
            edits.sort_by(|a, b| b.start.cmp(&a.start));
            let mut updated = source;
            for edit in &edits {
                updated.replace_range(edit.start..edit.end, &edit.text);
            }
            fs::write(path, updated)?;
            debug!("Rewrote {} docstrings in {}", edits.len(), path.display());
        }

        self.post_process(path);
        Ok(())
    }

    /// Run the configured formatting tools; failures are reported and
    /// swallowed so one missing tool never aborts the run.
    fn post_process(&self, path: &Path) {
        if self.cleanup {
            run_tool("black", Command::new("black").arg(path).arg("-q"));
        }
        if self.convert {
            run_tool(
                "docconvert",
                Command::new("docconvert")
                    .arg(path)
                    .arg("--output")
                    .arg(&self.style)
                    .arg("--in-place"),
            );
        }
    }
}

fn collect_edits(
    node: Node<'_>,
    source: &str,
    docs: &BTreeMap<String, String>,
    edits: &mut Vec<Edit>,
) {
    if matches!(node.kind(), "class_definition" | "function_definition") {
        if let Some(edit) = edit_for(node, source, docs) {
            edits.push(edit);
        }
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_edits(child, source, docs, edits);
    }
}

fn edit_for(node: Node<'_>, source: &str, docs: &BTreeMap<String, String>) -> Option<Edit> {
    let name_node = node.child_by_field_name("name")?;
    let name = node_text(name_node, source);
    let text = trim_quotes(docs.get(name)?);

    if let Some(existing) = docstring_node(node) {
        let column = existing.start_position().column;
        Some(Edit {
            start: existing.start_byte(),
            end: existing.end_byte(),
            text: render_docstring(text, column),
        })
    } else {
        // Insert ahead of the first body statement, pushing it onto its
        // own line at the same column
        let first = node.child_by_field_name("body")?.named_child(0)?;
        let column = first.start_position().column;
        Some(Edit {
            start: first.start_byte(),
            end: first.start_byte(),
            text: format!("{}\n{}", render_docstring(text, column), " ".repeat(column)),
        })
    }
}

/// Strip one layer of surrounding triple quotes from generated text.
fn trim_quotes(text: &str) -> &str {
    let text = text.strip_prefix("\"\"\"").unwrap_or(text);
    text.strip_suffix("\"\"\"").unwrap_or(text)
}

/// Wrap text in triple quotes, indenting continuation lines to `column`.
fn render_docstring(text: &str, column: usize) -> String {
    let indent = " ".repeat(column);
    let mut rendered = String::from("\"\"\"");
    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            rendered.push('\n');
            if !line.is_empty() {
                rendered.push_str(&indent);
            }
        }
        rendered.push_str(line);
    }
    rendered.push_str("\"\"\"");
    rendered
}

fn run_tool(tool: &str, cmd: &mut Command) {
    match cmd.output() {
        Ok(output) if output.status.success() => {}
        Ok(output) => {
            warn!(
                "{} failed: {}",
                tool,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Err(e) => {
            warn!("{} not available: {}", tool, e);
        }
    }
}
