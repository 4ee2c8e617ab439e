//! Region resolution
//!
//! Maps a requested text region to the minimal region spanning every
//! macro invocation it touches, reasoning over the parser's syntax
//! arena.

use macroscope_core::SourceRegion;
use macroscope_parser::{MacroOccurrence, ParsedUnit};

/// Resolve a requested region to the minimal exploration region.
///
/// An exact match on a macro reference name anchors the computation on
/// that single invocation. Otherwise, when `allow_selection` is set,
/// every invocation overlapping the selection anchors it. Returns
/// `None` when no macro reference overlaps the input.
pub fn resolve(
    unit: &ParsedUnit,
    region: SourceRegion,
    allow_selection: bool,
) -> Option<SourceRegion> {
    let anchors: Vec<&MacroOccurrence> = match unit.resolve_macro_reference(region) {
        Some(occ) => vec![occ],
        None if allow_selection => unit.occurrences_overlapping(region),
        None => Vec::new(),
    };

    if anchors.is_empty() {
        return None;
    }

    let nodes: Vec<_> = anchors.iter().map(|occ| occ.node).collect();
    let ancestor = unit.arena.common_ancestor(&nodes)?;

    // Union the requested region with each anchor, projecting an anchor
    // up to a direct child of the common ancestor when it sits deeper.
    let mut minimal = region;
    for occ in &anchors {
        let direct = occ.node == ancestor
            || unit.arena.node(occ.node).parent == Some(ancestor);
        let anchor_region = if direct {
            occ.region
        } else {
            let projected = unit.arena.child_of_ancestor(occ.node, ancestor);
            unit.arena.node(projected).region
        };
        minimal = minimal.union(&anchor_region);
    }

    Some(minimal)
}
