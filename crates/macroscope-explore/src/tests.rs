//! Tests for the exploration engine, end to end over real C sources

use super::*;
use crate::differ::diff_step;
use macroscope_core::{apply_replacements, SourceRegion};
use macroscope_parser::treesitter::CParser;
use macroscope_parser::ParsedUnit;
use pretty_assertions::assert_eq;

fn parse(source: &str) -> ParsedUnit {
    let mut parser = CParser::new();
    parser.parse_source(source, "test.c").unwrap()
}

/// Caret placed on the last occurrence of `name` in `source`
fn caret_on(source: &str, name: &str) -> SourceRegion {
    SourceRegion::point(source.rfind(name).unwrap())
}

#[test]
fn test_single_macro_exploration() {
    let source = "#define SQ(x) ((x)*(x))\nint y = SQ(3);\n";
    let unit = parse(source);

    let session = explore(&unit, caret_on(source, "SQ"), false).unwrap();

    assert_eq!(session.step_count(), 1);
    assert_eq!(session.step_at(0).unwrap().code_before_step, "SQ(3)");
    assert_eq!(session.full_expansion().code_after_step, "((3)*(3))");
}

#[test]
fn test_nested_macro_exploration() {
    let source = "#define A 1\n#define B (A+1)\nint z = B;\n";
    let unit = parse(source);

    let session = explore(&unit, caret_on(source, "B;"), false).unwrap();

    assert_eq!(session.step_count(), 2);
    assert_eq!(session.step_at(0).unwrap().code_before_step, "B");
    assert_eq!(session.step_at(1).unwrap().code_before_step, "(A+1)");
    assert_eq!(session.full_expansion().code_after_step, "(1+1)");
}

#[test]
fn test_step_zero_is_literal_source_text() {
    let source = "#define MAX(a, b) ((a) > (b) ? (a) : (b))\nint m = MAX(x, y + 1);\n";
    let unit = parse(source);

    let session = explore(&unit, caret_on(source, "MAX"), false).unwrap();

    assert_eq!(session.step_at(0).unwrap().code_before_step, "MAX(x, y + 1)");
}

#[test]
fn test_single_step_index_normalization() {
    let source = "#define SQ(x) ((x)*(x))\nint y = SQ(3);\n";
    let unit = parse(source);

    let session = explore(&unit, caret_on(source, "SQ"), false).unwrap();

    assert_eq!(session.step_count(), 1);
    // Index 1 is normalized to index 0 rather than exposing a
    // duplicate terminal state.
    assert_eq!(session.step_at(1), session.step_at(0));
    assert!(session.step_at(2).is_none());
}

#[test]
fn test_full_expansion_is_idempotent() {
    let source = "#define A 1\n#define B (A+1)\nint z = B;\n";
    let unit = parse(source);

    let session = explore(&unit, caret_on(source, "B;"), false).unwrap();

    assert_eq!(session.full_expansion(), session.full_expansion());

    let again = explore(&unit, caret_on(source, "B;"), false).unwrap();
    assert_eq!(session.full_expansion(), again.full_expansion());
}

#[test]
fn test_full_expansion_distinct_from_last_step() {
    let source = "#define A 1\n#define B (A+1)\nint z = B;\n";
    let unit = parse(source);

    let session = explore(&unit, caret_on(source, "B;"), false).unwrap();
    let full = session.full_expansion();

    assert_eq!(full.index, session.step_count());
    assert_eq!(full.code_before_step, "B");
    assert_eq!(full.code_after_step, "(1+1)");
}

#[test]
fn test_full_expansion_leaves_no_resolvable_names() {
    let source = "#define A 1\n#define B (A+1)\nint z = B;\n";
    let unit = parse(source);

    let session = explore(&unit, caret_on(source, "B;"), false).unwrap();
    let full = &session.full_expansion().code_after_step;

    assert!(!full.contains('A'));
    assert!(!full.contains('B'));
}

#[test]
fn test_step_chain_is_contiguous() {
    let source = "#define A 1\n#define B (A+1)\n#define C (B*2)\nint z = C;\n";
    let unit = parse(source);

    let session = explore(&unit, caret_on(source, "C;"), false).unwrap();

    assert_eq!(session.step_count(), 3);
    for k in 0..session.step_count() - 1 {
        let step = session.step_at(k).unwrap();
        let next = session.step_at(k + 1).unwrap();
        assert_eq!(step.code_after_step, next.code_before_step);
    }
}

#[test]
fn test_replacements_reproduce_each_transition() {
    let source = "#define A 1\n#define B (A+1)\n#define C (B*2)\nint z = C;\n";
    let unit = parse(source);

    let session = explore(&unit, caret_on(source, "C;"), false).unwrap();

    for k in 0..session.step_count() {
        let step = session.step_at(k).unwrap();
        assert_eq!(
            apply_replacements(&step.code_before_step, &step.replacements),
            step.code_after_step
        );
    }

    let full = session.full_expansion();
    assert_eq!(
        apply_replacements(&full.code_before_step, &full.replacements),
        full.code_after_step
    );
}

#[test]
fn test_diff_highlights_changed_span() {
    let source = "#define A 1\n#define B (A+1)\nint z = B;\n";
    let unit = parse(source);

    let session = explore(&unit, caret_on(source, "B;"), false).unwrap();
    let (before, after) = diff_step(session.step_at(0).unwrap(), 0);

    assert_eq!(before.len(), 1);
    assert_eq!(before[0].start, 0);
    assert_eq!(before[0].length, 1); // "B"
    assert_eq!(after[0].start, 0);
    assert_eq!(after[0].length, 5); // "(A+1)"
}

#[test]
fn test_diff_between_adjacent_steps() {
    let source = "#define A 1\n#define B (A+1)\nint z = B;\n";
    let unit = parse(source);

    let session = explore(&unit, caret_on(source, "B;"), false).unwrap();
    let (before, after) = crate::differ::diff(
        session.step_at(0).unwrap(),
        session.step_at(1).unwrap(),
        0,
    );

    // The transition replaces "B" with "(A+1)".
    assert_eq!(before, vec![macroscope_core::HighlightRange::new(0, 1)]);
    assert_eq!(after, vec![macroscope_core::HighlightRange::new(0, 5)]);
}

#[test]
fn test_selection_spanning_two_macros() {
    let source = "#define A 1\n#define B 2\nint z = A + B;\n";
    let unit = parse(source);

    let start = source.find("A + B").unwrap();
    let session = explore(&unit, SourceRegion::new(start, 5), true).unwrap();

    assert_eq!(session.step_count(), 2);
    assert_eq!(session.step_at(0).unwrap().code_before_step, "A + B");
    assert_eq!(session.full_expansion().code_after_step, "1 + 2");
}

#[test]
fn test_no_macro_yields_no_session() {
    let source = "int y = f(3);\n";
    let unit = parse(source);

    assert!(explore(&unit, SourceRegion::point(8), false).is_none());
    assert!(explore(&unit, SourceRegion::new(8, 4), true).is_none());
}

#[test]
fn test_exploration_result_classification() {
    let single = "#define SQ(x) ((x)*(x))\nint y = SQ(3);\n";
    let unit = parse(single);
    let result = explore_classified(&unit, caret_on(single, "SQ"), false);
    assert!(matches!(result, ExplorationResult::SingleStep(_)));

    let nested = "#define A 1\n#define B (A+1)\nint z = B;\n";
    let unit = parse(nested);
    let result = explore_classified(&unit, caret_on(nested, "B;"), false);
    assert!(matches!(result, ExplorationResult::MultiStep(_)));

    let plain = "int y = f(3);\n";
    let unit = parse(plain);
    let result = explore_classified(&unit, SourceRegion::point(4), false);
    assert!(matches!(result, ExplorationResult::NoResult));
    assert!(result.into_session().is_none());
}

#[test]
fn test_definition_text_reconstruction() {
    let source = "#define SQ(x) ((x)*(x))\nint y = SQ(3);\n";
    let unit = parse(source);

    let session = explore(&unit, caret_on(source, "SQ"), false).unwrap();

    assert_eq!(
        session.definition_text_at(0),
        Some("#define SQ(x) ((x)*(x))")
    );
}

#[test]
fn test_dynamic_macro_definition_text_uses_replacement() {
    let source = "int line = __LINE__;\n";
    let unit = parse(source);

    let session = explore(&unit, caret_on(source, "__LINE__"), false).unwrap();

    // Dynamic macros have no literal image; the single replacement's
    // inserted text stands in for the body.
    assert_eq!(session.definition_text_at(0), Some("1"));
    assert!(session.step_at(0).unwrap().definition_location.is_none());
}

#[test]
fn test_definition_location_points_at_directive() {
    let source = "#define SQ(x) ((x)*(x))\nint y = SQ(3);\n";
    let unit = parse(source);

    let session = explore(&unit, caret_on(source, "SQ"), false).unwrap();
    let location = session
        .step_at(0)
        .unwrap()
        .definition_location
        .clone()
        .unwrap();

    assert_eq!(location.file, "test.c");
    assert_eq!(location.region.offset, 0);
    assert!(unit
        .region_text(location.region)
        .starts_with("#define SQ(x)"));
}
