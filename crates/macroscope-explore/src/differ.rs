//! Step diffing
//!
//! Computes parallel highlight-range lists for one step transition
//! from the replacement list stored on the step. Replacements are
//! trusted to be in increasing offset order; no re-sorting happens
//! here.

use macroscope_core::{ExpansionStep, HighlightRange};

/// Highlight ranges for a step's before text (deleted spans) and after
/// text (inserted spans).
///
/// `prefix_len` shifts every range by the length of any context text
/// the presentation prepends to both sides. Inserted spans accumulate
/// the length delta of the replacements applied before them, since
/// insertions shift subsequent offsets in the transformed text but not
/// in the original.
pub fn diff_step(
    step: &ExpansionStep,
    prefix_len: usize,
) -> (Vec<HighlightRange>, Vec<HighlightRange>) {
    let mut before = Vec::with_capacity(step.replacements.len());
    let mut after = Vec::with_capacity(step.replacements.len());
    let mut delta: isize = 0;

    for rep in &step.replacements {
        before.push(HighlightRange::new(
            prefix_len + rep.offset,
            rep.deleted_length,
        ));
        let start = (prefix_len as isize + rep.offset as isize + delta) as usize;
        after.push(HighlightRange::new(start, rep.inserted_text.len()));
        delta += rep.delta();
    }

    (before, after)
}

/// Highlight ranges for the transition between two adjacent steps.
///
/// The replacement list of the transition lives on `before`; `after`
/// only corroborates adjacency.
pub fn diff(
    before: &ExpansionStep,
    after: &ExpansionStep,
    prefix_len: usize,
) -> (Vec<HighlightRange>, Vec<HighlightRange>) {
    debug_assert_eq!(before.code_after_step, after.code_before_step);
    diff_step(before, prefix_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use macroscope_core::{MacroBinding, TextReplacement};

    fn make_step(before: &str, after: &str, replacements: Vec<TextReplacement>) -> ExpansionStep {
        ExpansionStep {
            index: 0,
            code_before_step: before.to_string(),
            code_after_step: after.to_string(),
            expanded_macro: MacroBinding::object("TEST"),
            replacements,
            definition_location: None,
        }
    }

    #[test]
    fn test_single_replacement() {
        let step = make_step("B", "(A+1)", vec![TextReplacement::new(0, 1, "(A+1)")]);
        let (before, after) = diff_step(&step, 0);

        assert_eq!(before, vec![HighlightRange::new(0, 1)]);
        assert_eq!(after, vec![HighlightRange::new(0, 5)]);
    }

    #[test]
    fn test_prefix_shifts_both_sides() {
        let step = make_step("B", "(A+1)", vec![TextReplacement::new(0, 1, "(A+1)")]);
        let (before, after) = diff_step(&step, 10);

        assert_eq!(before[0].start, 10);
        assert_eq!(after[0].start, 10);
    }

    #[test]
    fn test_cumulative_delta() {
        // "A + B" -> "1 + (1+2)": the second insertion starts where the
        // first one left the text, not where the original had it.
        let step = make_step(
            "A + B",
            "1 + (1+2)",
            vec![
                TextReplacement::new(0, 1, "1"),
                TextReplacement::new(4, 1, "(1+2)"),
            ],
        );
        let (before, after) = diff_step(&step, 0);

        assert_eq!(before, vec![HighlightRange::new(0, 1), HighlightRange::new(4, 1)]);
        assert_eq!(after, vec![HighlightRange::new(0, 1), HighlightRange::new(4, 5)]);
    }

    #[test]
    fn test_growing_replacement_shifts_later_ranges() {
        // "X Y" -> "longer Y2": first replacement grows the text by 5.
        let step = make_step(
            "X Y",
            "longer Y2",
            vec![
                TextReplacement::new(0, 1, "longer"),
                TextReplacement::new(2, 1, "Y2"),
            ],
        );
        let (before, after) = diff_step(&step, 0);

        assert_eq!(before[1].start, 2);
        assert_eq!(after[1].start, 7);
        assert_eq!(after[1].length, 2);
    }
}
