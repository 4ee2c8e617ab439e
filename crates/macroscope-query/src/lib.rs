//! Macroscope Query Engine
//!
//! High-level facade combining the unit provider, the single-flight
//! scheduler, and the exploration core. Presentation layers consume
//! this surface purely as data.

use macroscope_core::config::Config;
use macroscope_core::SourceRegion;
use macroscope_explore::{explore, ExplorationSession};
use macroscope_parser::scan::InventoryEntry;
use macroscope_sched::{AstService, FileProvider, Priority, UnitRequest};
use std::path::Path;

/// Exploration engine over file-backed units
pub struct ExplorationEngine {
    service: AstService,
}

impl ExplorationEngine {
    /// Create an engine with default configuration
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create an engine with a custom configuration
    pub fn with_config(config: Config) -> Self {
        Self {
            service: AstService::new(FileProvider::with_config(config.engine)),
        }
    }

    /// Explore the macro expansion at `region` of a file.
    ///
    /// Returns `None` when no macro touches the region, the unit is
    /// unavailable, or the request is cancelled.
    pub fn explore(
        &self,
        path: &Path,
        region: SourceRegion,
        allow_selection: bool,
        priority: Priority,
    ) -> Option<ExplorationSession> {
        self.service
            .run_exclusive(UnitRequest::new(path), priority, move |unit| {
                explore(unit, region, allow_selection)
            })
    }

    /// Explore only if the file's content still hashes to `hash`
    pub fn explore_consistent(
        &self,
        path: &Path,
        hash: u64,
        region: SourceRegion,
        allow_selection: bool,
        priority: Priority,
    ) -> Option<ExplorationSession> {
        let request = UnitRequest::new(path).consistent_with(hash);
        self.service.run_exclusive(request, priority, move |unit| {
            explore(unit, region, allow_selection)
        })
    }

    /// List every macro definition in a file
    pub fn macros(&self, path: &Path, priority: Priority) -> Option<Vec<InventoryEntry>> {
        self.service
            .run_exclusive(UnitRequest::new(path), priority, |unit| {
                let entries = unit
                    .macros
                    .all_definitions()
                    .into_iter()
                    .map(|def| InventoryEntry {
                        name: def.binding.name.clone(),
                        signature: def.binding.signature(),
                        kind: def.binding.kind,
                        body: def.body.clone(),
                        file: def.location.file.clone(),
                        offset: def.location.region.offset,
                    })
                    .collect();
                Some(entries)
            })
    }

    /// The underlying service, for instrumentation
    pub fn service(&self) -> &AstService {
        &self.service
    }
}

impl Default for ExplorationEngine {
    fn default() -> Self {
        Self::new()
    }
}
