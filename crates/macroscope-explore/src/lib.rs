//! Macroscope Exploration Engine
//!
//! The host-independent core of macro exploration:
//! - Region resolution: from a requested text region to the minimal
//!   region spanning the macro invocations it touches
//! - Session construction: the ordered expansion step sequence for a
//!   resolved region, replayed from the parser's bookkeeping
//! - Step diffing: before/after highlight ranges per transition

pub mod differ;
pub mod resolver;
pub mod session;

pub use differ::{diff, diff_step};
pub use session::ExplorationSession;

use macroscope_core::SourceRegion;
use macroscope_parser::ParsedUnit;
use tracing::debug;

/// Outcome of an exploration request, tagged by how much there is to
/// show. Consumers pattern-match instead of probing a session.
#[derive(Debug)]
pub enum ExplorationResult {
    /// No macro touches the requested region
    NoResult,
    /// Exactly one substitution step
    SingleStep(ExplorationSession),
    /// More than one substitution step
    MultiStep(ExplorationSession),
}

impl ExplorationResult {
    /// The session, if any
    pub fn into_session(self) -> Option<ExplorationSession> {
        match self {
            ExplorationResult::NoResult => None,
            ExplorationResult::SingleStep(session) | ExplorationResult::MultiStep(session) => {
                Some(session)
            }
        }
    }
}

/// Explore the macro expansion at `region`.
///
/// Returns `None` when no macro reference overlaps the region; this is
/// a normal outcome, not a fault.
pub fn explore(
    unit: &ParsedUnit,
    region: SourceRegion,
    allow_selection: bool,
) -> Option<ExplorationSession> {
    let resolved = resolver::resolve(unit, region, allow_selection)?;
    debug!("Resolved {} to {}", region, resolved);
    ExplorationSession::from_unit(unit, resolved)
}

/// Explore and classify the outcome for presentation
pub fn explore_classified(
    unit: &ParsedUnit,
    region: SourceRegion,
    allow_selection: bool,
) -> ExplorationResult {
    match explore(unit, region, allow_selection) {
        None => ExplorationResult::NoResult,
        Some(session) if session.step_count() == 1 => ExplorationResult::SingleStep(session),
        Some(session) => ExplorationResult::MultiStep(session),
    }
}

#[cfg(test)]
mod tests;
