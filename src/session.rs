use std::path::PathBuf;

use im::Vector;
use serde::Serialize;

use crate::errors::{IncludeError, Warning};

// ============================================================================
// LOCATED DIAGNOSTICS
// ============================================================================

/// A diagnostic tagged with the source line it was reported at.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Located<T> {
    pub line: u32,
    pub item: T,
}

// ============================================================================
// SESSION STATE: threaded by value through every include
// ============================================================================

/// Compilation-session state. Never mutated in place: each method consumes
/// the state and returns its successor, so earlier states stay valid.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SessionState {
    /// Line of the include directive being processed.
    pub line: u32,
    pub errors: Vector<Located<IncludeError>>,
    pub warnings: Vector<Located<Warning>>,
    pub include_path: Vector<PathBuf>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_include_path(self, include_path: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            include_path: include_path.into_iter().collect(),
            ..self
        }
    }

    pub fn at_line(self, line: u32) -> Self {
        Self { line, ..self }
    }

    pub fn with_error(self, item: IncludeError) -> Self {
        let mut errors = self.errors;
        errors.push_back(Located {
            line: self.line,
            item,
        });
        Self { errors, ..self }
    }

    /// Appends a warning located at the current include line.
    pub fn with_warning(self, item: Warning) -> Self {
        let mut warnings = self.warnings;
        warnings.push_back(Located {
            line: self.line,
            item,
        });
        Self { warnings, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::IncludeKind;

    #[test]
    fn earlier_states_are_untouched() {
        let first = SessionState::new().at_line(3);
        let second = first.clone().with_error(IncludeError::NoInclude {
            kind: IncludeKind::File,
            name: "x.hrl".into(),
        });
        assert!(first.errors.is_empty());
        assert_eq!(second.errors.len(), 1);
        assert_eq!(second.errors[0].line, 3);
    }

    #[test]
    fn warnings_keep_encounter_order() {
        let state = SessionState::new()
            .with_warning(Warning::Type {
                name: "a".into(),
                reason: "r".into(),
            })
            .with_warning(Warning::Type {
                name: "b".into(),
                reason: "r".into(),
            });
        let names: Vec<String> = state.warnings.iter().map(|w| w.item.to_string()).collect();
        assert_eq!(names, vec!["unable to translate type a: r", "unable to translate type b: r"]);
    }

    #[test]
    fn missing_include_serializes_with_its_kind() {
        let state = SessionState::new().at_line(7).with_error(IncludeError::NoInclude {
            kind: IncludeKind::Lib,
            name: "app/include/x.hrl".into(),
        });
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(
            value["errors"][0],
            serde_json::json!({
                "line": 7,
                "item": {"error": "no_include", "kind": "lib", "name": "app/include/x.hrl"},
            })
        );
    }
}
