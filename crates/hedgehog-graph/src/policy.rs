//! Heuristic variable classification.
//!
//! Every check on a free-text type name or a debugger-specific variable name
//! lives here.

use std::collections::BTreeSet;

use hedgehog_dap::DebugVariable;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static CONTAINER_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)pointer|\*|array|list|dict|map").expect("container pattern"));

const CALLABLE_TYPE_MARKERS: &[&str] = &["function", "method", "builtin"];
const STRUCTURAL_TYPE_MARKERS: &[&str] = &["Node", "List", "Tree"];
const NULL_VALUES: &[&str] = &["null", "None", "nullptr"];

/// Group labels and attributes the Python debug adapter reports alongside
/// user variables.
pub const PYTHON_INTERNAL_NAMES: &[&str] = &[
    "__dict__",
    "__weakref__",
    "__module__",
    "__doc__",
    "__class__",
    "__bases__",
    "__mro__",
    "__subclasses__",
    "special variables",
    "function variables",
    "class variables",
];

/// Named filter presets selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyPreset {
    #[default]
    Python,
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariablePolicy {
    internal_names: BTreeSet<String>,
}

impl Default for VariablePolicy {
    fn default() -> Self {
        Self::python()
    }
}

impl VariablePolicy {
    /// Dunder names, callables and the Python adapter's synthetic groups.
    pub fn python() -> Self {
        Self {
            internal_names: PYTHON_INTERNAL_NAMES
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
        }
    }

    /// Dunder names and callables only.
    pub fn generic() -> Self {
        Self {
            internal_names: BTreeSet::new(),
        }
    }

    pub fn for_preset(preset: PolicyPreset) -> Self {
        match preset {
            PolicyPreset::Python => Self::python(),
            PolicyPreset::Generic => Self::generic(),
        }
    }

    #[must_use]
    pub fn with_internal_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.internal_names
            .extend(names.into_iter().map(Into::into).filter(|name| !name.is_empty()));
        self
    }

    pub fn internal_names(&self) -> impl Iterator<Item = &str> {
        self.internal_names.iter().map(String::as_str)
    }

    /// Skip filter applied before a variable consumes any node budget.
    pub fn should_skip(&self, variable: &DebugVariable, hide_internal: bool) -> bool {
        if !hide_internal {
            return false;
        }
        is_dunder(&variable.name)
            || self.internal_names.contains(&variable.name)
            || is_callable_type(variable.type_str())
    }

    /// Expandable by handle, or by type-name vocabulary.
    pub fn is_container(&self, variable: &DebugVariable) -> bool {
        variable.variables_reference.is_some() || is_container_type(variable.type_str())
    }
}

/// Starts and ends with `__`. The bare `__` counts.
pub fn is_dunder(name: &str) -> bool {
    name.starts_with("__") && name.ends_with("__")
}

pub fn is_callable_type(type_name: &str) -> bool {
    CALLABLE_TYPE_MARKERS
        .iter()
        .any(|marker| type_name.contains(marker))
}

pub fn is_container_type(type_name: &str) -> bool {
    CONTAINER_TYPE.is_match(type_name)
}

pub fn is_pointer_type(type_name: &str) -> bool {
    type_name.contains('*')
}

pub fn is_structural_type(type_name: &str) -> bool {
    STRUCTURAL_TYPE_MARKERS
        .iter()
        .any(|marker| type_name.contains(marker))
}

pub fn is_null_value(value: &str) -> bool {
    NULL_VALUES.contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hedgehog_dap::VariablesRef;

    fn variable(name: &str, type_name: Option<&str>) -> DebugVariable {
        DebugVariable {
            name: name.to_string(),
            value: None,
            type_name: type_name.map(str::to_string),
            variables_reference: None,
            memory_reference: None,
            address: None,
        }
    }

    #[test]
    fn python_policy_hides_dunders_groups_and_callables() {
        let policy = VariablePolicy::python();
        assert!(policy.should_skip(&variable("__class__", None), true));
        assert!(policy.should_skip(&variable("__init__", None), true));
        assert!(policy.should_skip(&variable("special variables", None), true));
        assert!(policy.should_skip(&variable("append", Some("builtin_function_or_method")), true));
        assert!(policy.should_skip(&variable("run", Some("method")), true));
        assert!(!policy.should_skip(&variable("x", Some("int")), true));
        assert!(!policy.should_skip(&variable("_private", None), true));
        assert!(!policy.should_skip(&variable("__private", None), true));
        assert!(policy.should_skip(&variable("__", None), true));
        assert!(policy.should_skip(&variable("____", None), true));
        assert!(!policy.should_skip(&variable("__class__", None), false));
    }

    #[test]
    fn generic_policy_keeps_python_group_labels() {
        let policy = VariablePolicy::generic();
        assert!(!policy.should_skip(&variable("special variables", None), true));
        assert!(policy.should_skip(&variable("__vptr__", None), true));

        let extended = VariablePolicy::generic().with_internal_names(["_vptr.Base"]);
        assert!(extended.should_skip(&variable("_vptr.Base", None), true));
    }

    #[test]
    fn container_classification_uses_handle_or_type_vocabulary() {
        let policy = VariablePolicy::python();
        assert!(policy.is_container(&variable("p", Some("Node *"))));
        assert!(policy.is_container(&variable("v", Some("std::vector<int> Array"))));
        assert!(policy.is_container(&variable("d", Some("Dict[str, int]"))));
        assert!(policy.is_container(&variable("m", Some("HashMap<u8, u8>"))));
        assert!(!policy.is_container(&variable("n", Some("int"))));

        let mut handle = variable("obj", Some("Foo"));
        handle.variables_reference = VariablesRef::new(3, 0);
        assert!(policy.is_container(&handle));
    }

    #[test]
    fn structural_and_pointer_predicates() {
        assert!(is_pointer_type("struct list_head *"));
        assert!(!is_pointer_type("int"));
        assert!(is_structural_type("TreeNode"));
        assert!(is_structural_type("LinkedList"));
        assert!(!is_structural_type("node"));
        assert!(is_null_value("nullptr"));
        assert!(!is_null_value("0x0"));
    }
}
