//! Configuration types

use serde::{Deserialize, Serialize};

/// Macroscope configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Expansion engine configuration
    pub engine: EngineConfig,

    /// Directory scan configuration
    pub scan: ScanConfig,
}

/// Expansion engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Ceiling on recorded expansion steps per exploration
    pub max_steps: usize,

    /// Whether builtin dynamic macros (`__LINE__`, `__FILE__`,
    /// `__COUNTER__`) participate in expansion
    pub builtins: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: 64,
            builtins: true,
        }
    }
}

/// Directory scan configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// File extensions to parse
    pub extensions: Vec<String>,

    /// Directories to exclude
    pub exclude_dirs: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["c".into(), "h".into()],
            exclude_dirs: vec![".git".into(), "build".into(), "node_modules".into()],
        }
    }
}
