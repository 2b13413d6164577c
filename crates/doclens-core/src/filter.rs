//! Scope filtering.
//!
//! [`ScopeConfig`] carries every switch narrowing which definitions are in
//! scope. Name- and decorator-based switches act at visit time inside
//! [`crate::tree::TreeBuilder`]; the remaining rules act here, on a built
//! tree, in a fixed order:
//!
//! 1. drop the module record;
//! 2. restrict to nested functions (the flag reads inverted from its filter;
//!    the literal behavior is kept on purpose);
//! 3. collapse nested-class subtrees;
//! 4. propagate coverage between a constructor and its owning class under
//!    the constructor-documents-class docstring convention.
//!
//! Filtering narrows the tree's selected set and never removes records, so
//! applying the same configuration twice is a no-op after the first pass.

use crate::record::{DefKind, DefRecord, DefTree};

/// Switches controlling which definitions are in scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeConfig {
    /// Drop the module-level record
    pub ignore_module: bool,
    /// Skip dunder-named methods other than the constructor
    pub ignore_magic: bool,
    /// Skip names with two leading underscores
    pub ignore_private: bool,
    /// Skip names with one leading underscore
    pub ignore_semiprivate: bool,
    /// Skip `__init__`
    pub ignore_init_method: bool,
    /// Collapse nested classes and everything beneath them
    pub ignore_nested_classes: bool,
    /// Restrict the selection to nested functions only
    pub ignore_nested_functions: bool,
    /// Skip property getters, setters, and deleters
    pub ignore_property_decorators: bool,
    /// Skip property setters
    pub ignore_property_setters: bool,
    /// Skip `@overload` definitions
    pub ignore_overloaded_functions: bool,
    /// Constructor arguments are documented at the class level, so a
    /// constructor and its class share one coverage verdict
    pub constructor_documents_class: bool,
}

/// Applies the post-build scope rules to a definition tree.
pub struct ScopeFilter<'a> {
    config: &'a ScopeConfig,
}

impl<'a> ScopeFilter<'a> {
    pub fn new(config: &'a ScopeConfig) -> Self {
        Self { config }
    }

    /// Narrow the tree's selection in rule order.
    pub fn apply(&self, tree: &mut DefTree) {
        let DefTree {
            records, selected, ..
        } = tree;

        if self.config.ignore_module {
            selected.retain(|&i| records[i].kind != DefKind::Module);
        }

        if self.config.ignore_nested_functions {
            selected.retain(|&i| records[i].nested_function);
        }

        if self.config.ignore_nested_classes {
            selected.retain(|&i| !under_nested_class(records, i));
        }

        if self.config.constructor_documents_class {
            propagate_constructor_coverage(records, selected);
        }
    }
}

/// True when the record or any ancestor is a nested class.
fn under_nested_class(records: &[DefRecord], idx: usize) -> bool {
    let mut current = Some(idx);
    while let Some(i) = current {
        if records[i].nested_class {
            return true;
        }
        current = records[i].parent;
    }
    false
}

/// Force a selected constructor and its owning class to agree on coverage:
/// if either side is documented, both count as documented.
fn propagate_constructor_coverage(records: &mut [DefRecord], selected: &[usize]) {
    let pairs: Vec<(usize, usize)> = selected
        .iter()
        .filter_map(|&i| {
            let rec = &records[i];
            if !rec.kind.is_callable() || rec.name != "__init__" {
                return None;
            }
            rec.parent
                .filter(|&p| records[p].kind == DefKind::Class)
                .map(|p| (i, p))
        })
        .collect();

    for (init, class) in pairs {
        let either = records[init].covered || records[class].covered;
        records[init].covered = either;
        records[class].covered = either;
    }
}
