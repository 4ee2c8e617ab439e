//! Macroscope Parser
//!
//! C front end built on tree-sitter. Produces a `ParsedUnit` per source
//! file: an index-addressable syntax arena, the macro directive table,
//! the macro occurrences found in the code, and on-demand expansion
//! bookkeeping for a source region.
//!
//! ## Modules
//!
//! - `treesitter` - Parsing and directive/occurrence extraction
//! - `arena` - Index-addressable syntax tree arena
//! - `directives` - Macro table with a define/undef timeline
//! - `expand` - Single-step expansion engine
//! - `cache` - LRU cache for parsed units
//! - `scan` - Parallel macro inventory over a directory tree

pub mod arena;
pub mod cache;
pub mod directives;
pub mod expand;
pub mod scan;
pub mod treesitter;

use macroscope_core::config::EngineConfig;
use macroscope_core::{Location, Result, SourceRegion};
use std::path::Path;

use arena::{NodeId, SyntaxArena};
use directives::MacroTable;
use expand::{ExpansionEngine, ExpansionHistory};

/// A macro invocation found in the parsed code.
///
/// Definition names and `#undef` operands are not occurrences; only
/// references that would actually expand are recorded.
#[derive(Debug, Clone)]
pub struct MacroOccurrence {
    /// Macro name
    pub name: String,
    /// Region of the name token alone
    pub name_region: SourceRegion,
    /// Region of the whole invocation, including any argument list
    pub region: SourceRegion,
    /// Arena node the occurrence is anchored to
    pub node: NodeId,
}

/// A fully parsed source unit
pub struct ParsedUnit {
    /// File path the unit was parsed from
    pub file: String,
    /// Full source text
    pub source: String,
    /// Content hash of `source`, for consistency checks
    pub content_hash: u64,
    /// Syntax arena
    pub arena: SyntaxArena,
    /// Macro directive table
    pub macros: MacroTable,
    /// Macro invocations in the code, in increasing offset order
    pub occurrences: Vec<MacroOccurrence>,
    /// Expansion engine configuration
    pub engine_config: EngineConfig,
}

impl ParsedUnit {
    /// Find the occurrence whose name token the region points at.
    ///
    /// A zero-length region (caret) inside the name token counts as a
    /// match, as does byte-equality with the name token region.
    pub fn resolve_macro_reference(&self, region: SourceRegion) -> Option<&MacroOccurrence> {
        self.occurrences.iter().find(|occ| {
            occ.name_region == region
                || (region.is_empty() && occ.name_region.contains_offset(region.offset))
        })
    }

    /// All occurrences whose invocation region overlaps `region`
    pub fn occurrences_overlapping(&self, region: SourceRegion) -> Vec<&MacroOccurrence> {
        self.occurrences
            .iter()
            .filter(|occ| occ.region.overlaps(&region))
            .collect()
    }

    /// Defining-directive locations for a macro name, in source order
    pub fn definitions_of(&self, name: &str) -> Vec<Location> {
        self.macros.definitions_of(name)
    }

    /// Slice of the source covered by `region`, clamped to the buffer
    pub fn region_text(&self, region: SourceRegion) -> &str {
        let end = region.end().min(self.source.len());
        let start = region.offset.min(end);
        &self.source[start..end]
    }

    /// 1-based line number of a byte offset
    pub fn line_of(&self, offset: usize) -> usize {
        let offset = offset.min(self.source.len());
        self.source[..offset].bytes().filter(|&b| b == b'\n').count() + 1
    }

    /// Compute the expansion bookkeeping for a region: the ordered
    /// sequence of single-level substitutions from the region text as
    /// written down to the fully expanded text.
    pub fn expansion_history(&self, region: SourceRegion) -> ExpansionHistory {
        let engine = ExpansionEngine::new(
            &self.macros,
            &self.engine_config,
            &self.file,
            region.offset,
            self.line_of(region.offset),
        );
        engine.explore(self.region_text(region))
    }
}

/// Parser trait for different backends
pub trait Parser: Send + Sync {
    /// Parse source code text
    fn parse(&self, source: &str, filename: &str) -> Result<ParsedUnit>;

    /// Parse a file
    fn parse_file(&self, path: &Path) -> Result<ParsedUnit> {
        let source = std::fs::read_to_string(path)?;
        let filename = path.to_string_lossy();
        self.parse(&source, &filename)
    }

    /// Get parser name
    fn name(&self) -> &str;
}

/// Get the default parser
pub fn get_parser() -> Box<dyn Parser> {
    Box::new(treesitter::CParser::new())
}
