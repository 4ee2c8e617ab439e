//! Parallel macro inventory
//!
//! Walks a source tree and aggregates every macro definition found,
//! parsing files in parallel.

use crate::treesitter::CParser;
use crate::Parser;
use globset::{Glob, GlobSet, GlobSetBuilder};
use macroscope_core::config::ScanConfig;
use macroscope_core::{Error, MacroKind, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// One macro definition found during a scan
#[derive(Debug, Clone, Serialize)]
pub struct InventoryEntry {
    /// Macro name
    pub name: String,
    /// Display signature, e.g. `SQ(x)`
    pub signature: String,
    /// Static or dynamic expansion
    pub kind: MacroKind,
    /// Replacement body text
    pub body: String,
    /// File the directive lives in
    pub file: String,
    /// Byte offset of the directive
    pub offset: usize,
}

/// Aggregated scan result
#[derive(Debug, Default)]
pub struct ScanReport {
    /// All definitions, ordered by file then offset
    pub entries: Vec<InventoryEntry>,
    /// Number of files parsed
    pub files_parsed: usize,
    /// Non-fatal per-file errors
    pub errors: Vec<String>,
}

/// Parallel directory scanner
pub struct MacroScanner {
    config: ScanConfig,
    exclude: GlobSet,
}

impl MacroScanner {
    /// Create a scanner from a scan configuration
    pub fn new(config: ScanConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for dir in &config.exclude_dirs {
            let glob = Glob::new(&format!("**/{}", dir))
                .map_err(|e| Error::Config(e.to_string()))?;
            builder.add(glob);
        }
        let exclude = builder.build().map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self { config, exclude })
    }

    /// Scan a directory tree for macro definitions
    pub fn scan(&self, root: &Path) -> ScanReport {
        let paths: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| !self.exclude.is_match(e.path()))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| self.config.extensions.iter().any(|want| want == ext))
                    .unwrap_or(false)
            })
            .map(|e| e.path().to_path_buf())
            .collect();

        info!("Found {} files to scan", paths.len());

        let results: Vec<(PathBuf, Result<Vec<InventoryEntry>>)> = paths
            .par_iter()
            .map(|path| {
                debug!("Scanning {:?}", path);
                let parser = CParser::new();
                let result = parser.parse_file(path).map(|unit| {
                    unit.macros
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
                        .collect()
                });
                (path.clone(), result)
            })
            .collect();

        let mut report = ScanReport::default();
        for (path, result) in results {
            match result {
                Ok(entries) => {
                    report.files_parsed += 1;
                    report.entries.extend(entries);
                }
                Err(err) => report.errors.push(format!("{}: {}", path.display(), err)),
            }
        }
        report
            .entries
            .sort_by(|a, b| (&a.file, a.offset).cmp(&(&b.file, b.offset)));
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_scan_directory() {
        let dir = TempDir::new().unwrap();

        for i in 0..3 {
            let path = dir.path().join(format!("file{}.h", i));
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "#define VALUE{} {}", i, i).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "#define SKIPPED 1").unwrap();

        let scanner = MacroScanner::new(ScanConfig::default()).unwrap();
        let report = scanner.scan(dir.path());

        assert_eq!(report.files_parsed, 3);
        assert_eq!(report.entries.len(), 3);
        assert!(report.errors.is_empty());
        assert!(report.entries.iter().any(|e| e.name == "VALUE0"));
    }

    #[test]
    fn test_scan_respects_excludes() {
        let dir = TempDir::new().unwrap();
        let build = dir.path().join("build");
        std::fs::create_dir(&build).unwrap();
        std::fs::write(build.join("gen.h"), "#define GENERATED 1\n").unwrap();
        std::fs::write(dir.path().join("main.c"), "#define KEPT 1\n").unwrap();

        let scanner = MacroScanner::new(ScanConfig::default()).unwrap();
        let report = scanner.scan(dir.path());

        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].name, "KEPT");
    }
}
