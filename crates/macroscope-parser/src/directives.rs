//! Macro directive table
//!
//! Records `#define` and `#undef` directives as an ordered timeline so
//! lookups can answer "which definition is effective at byte offset X".
//! Redefinition without an intervening `#undef` shadows the earlier
//! definition from its own offset onward, as a compiler would warn
//! about but accept.

use macroscope_core::{Location, MacroBinding, SourceRegion};
use std::collections::HashMap;

/// A `#define` entry
#[derive(Debug, Clone)]
pub struct MacroDef {
    /// The binding this directive establishes
    pub binding: MacroBinding,
    /// Replacement body text, trimmed
    pub body: String,
    /// Region of the whole directive
    pub location: Location,
    /// Region of the name token
    pub name_region: SourceRegion,
}

impl MacroDef {
    /// Byte offset from which the definition is effective
    pub fn effective_from(&self) -> usize {
        self.location.region.end()
    }
}

/// One timeline event for a name
#[derive(Debug, Clone)]
enum MacroEvent {
    Define(MacroDef),
    Undef { offset: usize },
}

impl MacroEvent {
    fn offset(&self) -> usize {
        match self {
            MacroEvent::Define(def) => def.effective_from(),
            MacroEvent::Undef { offset } => *offset,
        }
    }
}

/// Macro table with a define/undef timeline per name
#[derive(Debug, Default)]
pub struct MacroTable {
    events: HashMap<String, Vec<MacroEvent>>,
}

impl MacroTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a `#define`
    pub fn add_define(&mut self, def: MacroDef) {
        self.events
            .entry(def.binding.name.clone())
            .or_default()
            .push(MacroEvent::Define(def));
    }

    /// Record an `#undef` taking effect at `offset`
    pub fn add_undef(&mut self, name: &str, offset: usize) {
        self.events
            .entry(name.to_string())
            .or_default()
            .push(MacroEvent::Undef { offset });
    }

    /// Definition of `name` effective at `offset`, if any
    pub fn effective_at(&self, name: &str, offset: usize) -> Option<&MacroDef> {
        let events = self.events.get(name)?;
        let mut effective = None;
        for event in events {
            if event.offset() > offset {
                break;
            }
            effective = match event {
                MacroEvent::Define(def) => Some(def),
                MacroEvent::Undef { .. } => None,
            };
        }
        effective
    }

    /// Whether `name` is defined anywhere in the unit
    pub fn defined_anywhere(&self, name: &str) -> bool {
        self.events
            .get(name)
            .is_some_and(|events| events.iter().any(|e| matches!(e, MacroEvent::Define(_))))
    }

    /// All defining-directive locations for `name`, in source order
    pub fn definitions_of(&self, name: &str) -> Vec<Location> {
        self.events
            .get(name)
            .map(|events| {
                events
                    .iter()
                    .filter_map(|e| match e {
                        MacroEvent::Define(def) => Some(def.location.clone()),
                        MacroEvent::Undef { .. } => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every definition in the table, in source order
    pub fn all_definitions(&self) -> Vec<&MacroDef> {
        let mut defs: Vec<&MacroDef> = self
            .events
            .values()
            .flatten()
            .filter_map(|e| match e {
                MacroEvent::Define(def) => Some(def),
                MacroEvent::Undef { .. } => None,
            })
            .collect();
        defs.sort_by_key(|d| d.location.region.offset);
        defs
    }

    /// Number of distinct names with at least one definition
    pub fn len(&self) -> usize {
        self.events
            .values()
            .filter(|events| events.iter().any(|e| matches!(e, MacroEvent::Define(_))))
            .count()
    }

    /// Whether the table holds no definitions
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
