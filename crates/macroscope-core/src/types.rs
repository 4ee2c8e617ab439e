//! Core type definitions

use crate::region::Location;
use serde::{Deserialize, Serialize};

/// How a macro's expansion text is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacroKind {
    /// A literal expansion image is available from the defining directive
    Static,
    /// The expansion is computed per invocation (e.g. `__LINE__`)
    Dynamic,
}

/// Identifies a macro definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroBinding {
    /// Macro name
    pub name: String,
    /// Parameter names; absent for object-like macros
    pub params: Option<Vec<String>>,
    /// Whether the parameter list ends in `...`
    pub is_variadic: bool,
    /// How the expansion text is obtained
    pub kind: MacroKind,
}

impl MacroBinding {
    /// Create an object-like binding
    pub fn object(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: None,
            is_variadic: false,
            kind: MacroKind::Static,
        }
    }

    /// Create a function-like binding
    pub fn function(name: impl Into<String>, params: Vec<String>, is_variadic: bool) -> Self {
        Self {
            name: name.into(),
            params: Some(params),
            is_variadic,
            kind: MacroKind::Static,
        }
    }

    /// Create a dynamic (computed) binding
    pub fn dynamic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: None,
            is_variadic: false,
            kind: MacroKind::Dynamic,
        }
    }

    /// Whether the macro takes a parameter list
    pub fn is_function_like(&self) -> bool {
        self.params.is_some()
    }

    /// Signature for display, e.g. `SQ(x)` or `BUFSIZE`
    pub fn signature(&self) -> String {
        match &self.params {
            Some(params) => {
                let mut list = params.join(", ");
                if self.is_variadic {
                    if list.is_empty() {
                        list.push_str("...");
                    } else {
                        list.push_str(", ...");
                    }
                }
                format!("{}({})", self.name, list)
            }
            None => self.name.clone(),
        }
    }
}

/// A single textual edit: delete `deleted_length` bytes at `offset`,
/// insert `inserted_text` in their place.
///
/// Replacements belonging to one step are produced in increasing offset
/// order and do not overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextReplacement {
    /// Byte offset in the pre-step text
    pub offset: usize,
    /// Number of bytes removed
    pub deleted_length: usize,
    /// Replacement text
    pub inserted_text: String,
}

impl TextReplacement {
    /// Create a new replacement
    pub fn new(offset: usize, deleted_length: usize, inserted_text: impl Into<String>) -> Self {
        Self {
            offset,
            deleted_length,
            inserted_text: inserted_text.into(),
        }
    }

    /// Exclusive end offset of the deleted range
    pub fn end(&self) -> usize {
        self.offset + self.deleted_length
    }

    /// Length change introduced by this replacement
    pub fn delta(&self) -> isize {
        self.inserted_text.len() as isize - self.deleted_length as isize
    }
}

/// Apply an ordered, non-overlapping replacement list to `text`.
///
/// Replacements are applied back to front so earlier edits do not shift
/// the offsets of later ones.
pub fn apply_replacements(text: &str, replacements: &[TextReplacement]) -> String {
    let mut result = text.to_string();
    for rep in replacements.iter().rev() {
        let end = rep.end().min(result.len());
        let offset = rep.offset.min(end);
        result.replace_range(offset..end, &rep.inserted_text);
    }
    result
}

/// One element of the exploration sequence.
///
/// Index 0 is the original unexpanded text; each following step applies
/// exactly one level of macro substitution. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionStep {
    /// Position in the exploration sequence
    pub index: usize,
    /// Region text before this step's substitution
    pub code_before_step: String,
    /// Region text after this step's substitution
    pub code_after_step: String,
    /// The macro expanded at this step
    pub expanded_macro: MacroBinding,
    /// Textual edits performed by this step, in increasing offset order
    pub replacements: Vec<TextReplacement>,
    /// Where the macro's defining directive lives, when known
    pub definition_location: Option<Location>,
}

/// A highlight span in diff output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightRange {
    /// Start offset in the surrounding display text
    pub start: usize,
    /// Span length in bytes
    pub length: usize,
}

impl HighlightRange {
    /// Create a new range
    pub fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_replacements() {
        let text = "int y = SQ(3);";
        let reps = vec![TextReplacement::new(8, 5, "((3)*(3))")];

        assert_eq!(apply_replacements(text, &reps), "int y = ((3)*(3));");
    }

    #[test]
    fn test_apply_multiple_replacements() {
        let text = "A + B";
        let reps = vec![
            TextReplacement::new(0, 1, "1"),
            TextReplacement::new(4, 1, "(1+2)"),
        ];

        assert_eq!(apply_replacements(text, &reps), "1 + (1+2)");
    }

    #[test]
    fn test_replacement_delta() {
        let rep = TextReplacement::new(0, 2, "abcd");
        assert_eq!(rep.delta(), 2);

        let rep = TextReplacement::new(0, 4, "ab");
        assert_eq!(rep.delta(), -2);
    }

    #[test]
    fn test_binding_signature() {
        let obj = MacroBinding::object("BUFSIZE");
        assert_eq!(obj.signature(), "BUFSIZE");

        let func = MacroBinding::function("SQ", vec!["x".into()], false);
        assert_eq!(func.signature(), "SQ(x)");

        let var = MacroBinding::function("LOG", vec!["fmt".into()], true);
        assert_eq!(var.signature(), "LOG(fmt, ...)");
    }
}
