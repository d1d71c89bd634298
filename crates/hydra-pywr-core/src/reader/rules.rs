use super::ReaderError;
use crate::hydra::Rule;

/// Imports every custom rules module starts with.
const PRELUDE: &[&str] = &[
    "from pywr import recorders",
    "from pywr import parameters",
    "import pandas",
    "import numpy as np",
    "import scipy",
    "from pywr.nodes import *",
    "from pywr.parameters.control_curves import *",
    "from pywr.parameters._thresholds import *",
    "from pywr.parameters._hydropower import *",
    "from pywr.domains.river import *",
];

/// Statements rules may not contain.
const FORBIDDEN: &[&str] = &["import", "eval", "exec"];

/// Renders network rules as a Python module for the engine to import.
pub fn render_rules_module(rules: &[Rule]) -> Result<String, ReaderError> {
    let mut module = String::new();
    for line in PRELUDE {
        module.push_str(line);
        module.push('\n');
    }
    module.push('\n');

    for rule in rules {
        if let Some(word) = FORBIDDEN.iter().find(|w| rule.value.contains(*w)) {
            return Err(ReaderError::ForbiddenRule {
                rule: rule.name.clone(),
                word,
            });
        }
        module.push_str(&rule.value);
        module.push_str("\n\n");
    }

    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(value: &str) -> Rule {
        Rule {
            id: None,
            name: "custom".to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_module_has_prelude_and_rules() {
        let module = render_rules_module(&[rule("class A:\n    pass")]).unwrap();
        assert!(module.starts_with("from pywr import recorders\n"));
        assert!(module.ends_with("class A:\n    pass\n\n"));
    }

    #[test]
    fn test_forbidden_statements_rejected() {
        for body in ["import os", "eval('1')", "exec('x')"] {
            let err = render_rules_module(&[rule(body)]).unwrap_err();
            assert!(matches!(err, ReaderError::ForbiddenRule { .. }), "{body}");
        }
    }
}
