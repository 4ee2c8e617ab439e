//! Exploration sessions
//!
//! An `ExplorationSession` re-exposes the parser's recorded expansion
//! history as a navigable step sequence. Sessions are immutable,
//! created per request, and exclusively owned by their requester.

use macroscope_core::{ExpansionStep, MacroKind, SourceRegion, TextReplacement};
use macroscope_parser::expand::{ExpansionHistory, RecordedStep};
use macroscope_parser::ParsedUnit;

/// The ordered expansion step sequence for one resolved region
#[derive(Debug, Clone)]
pub struct ExplorationSession {
    steps: Vec<ExpansionStep>,
    full: ExpansionStep,
    definition_texts: Vec<String>,
    truncated: bool,
}

impl ExplorationSession {
    /// Build a session for a resolved region of a unit.
    ///
    /// Returns `None` when the region contains nothing expandable.
    pub fn from_unit(unit: &ParsedUnit, region: SourceRegion) -> Option<Self> {
        Self::from_history(unit.expansion_history(region))
    }

    /// Build a session from recorded bookkeeping.
    ///
    /// The recorded step order is replayed verbatim; the session never
    /// re-derives which macro expands at which step.
    pub fn from_history(history: ExpansionHistory) -> Option<Self> {
        if history.steps.is_empty() {
            return None;
        }

        let steps: Vec<ExpansionStep> = history
            .steps
            .iter()
            .enumerate()
            .map(|(index, rec)| ExpansionStep {
                index,
                code_before_step: rec.code_before.clone(),
                code_after_step: rec.code_after.clone(),
                expanded_macro: rec.binding.clone(),
                replacements: rec.replacements.clone(),
                definition_location: rec.definition_location.clone(),
            })
            .collect();

        let definition_texts = history.steps.iter().map(reconstruct_definition).collect();

        // The terminal step carries the whole original-to-full edit so
        // its replacement list stands on its own.
        let full = ExpansionStep {
            index: steps.len(),
            code_before_step: history.original.clone(),
            code_after_step: history.full.clone(),
            expanded_macro: steps[0].expanded_macro.clone(),
            replacements: vec![TextReplacement::new(
                0,
                history.original.len(),
                history.full.clone(),
            )],
            definition_location: steps[0].definition_location.clone(),
        };

        Some(Self {
            steps,
            full,
            definition_texts,
            truncated: history.truncated,
        })
    }

    /// Number of incremental steps
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Step at `index`.
    ///
    /// With a single-step session, index 1 is normalized to 0: there is
    /// no meaningful "next" step beyond the only available one.
    pub fn step_at(&self, index: usize) -> Option<&ExpansionStep> {
        let index = if self.step_count() == 1 && index == 1 {
            0
        } else {
            index
        };
        self.steps.get(index)
    }

    /// The terminal step with every nested macro fully expanded
    pub fn full_expansion(&self) -> &ExpansionStep {
        &self.full
    }

    /// Reconstructed defining-directive text for the macro expanded at
    /// `index`, for display
    pub fn definition_text_at(&self, index: usize) -> Option<&str> {
        self.definition_texts.get(index).map(|s| s.as_str())
    }

    /// Whether the step ceiling cut the history short
    pub fn was_truncated(&self) -> bool {
        self.truncated
    }
}

/// Reconstruct a `#define` image for display.
///
/// Static macros with a known body synthesize the directive text. A
/// dynamic macro with exactly one replacement reads its body off that
/// replacement; anything else degrades to an empty body.
fn reconstruct_definition(rec: &RecordedStep) -> String {
    match (rec.binding.kind, &rec.body_image) {
        (MacroKind::Static, Some(body)) => {
            format!("#define {} {}", rec.binding.signature(), body)
        }
        _ => {
            if rec.replacements.len() == 1 {
                rec.replacements[0].inserted_text.clone()
            } else {
                String::new()
            }
        }
    }
}
