//! Source code region types
//!
//! Regions are half-open `offset + length` byte spans within a single
//! text buffer. Offsets are 0-based.

use serde::{Deserialize, Serialize};

/// A span within a single file's text buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRegion {
    /// Start byte offset (0-based)
    pub offset: usize,
    /// Span length in bytes
    pub length: usize,
}

impl SourceRegion {
    /// Create a new region
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    /// Create a zero-length region (a caret position)
    pub fn point(offset: usize) -> Self {
        Self { offset, length: 0 }
    }

    /// Exclusive end offset
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Whether the region covers no bytes
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Whether `offset` falls inside the region. A zero-length region
    /// contains only its own offset.
    pub fn contains_offset(&self, offset: usize) -> bool {
        if self.is_empty() {
            offset == self.offset
        } else {
            offset >= self.offset && offset < self.end()
        }
    }

    /// Whether `other` lies entirely within this region
    pub fn contains(&self, other: &SourceRegion) -> bool {
        other.offset >= self.offset && other.end() <= self.end()
    }

    /// Whether the two regions share at least one byte. A zero-length
    /// region overlaps when its offset falls within the other region.
    pub fn overlaps(&self, other: &SourceRegion) -> bool {
        if self.is_empty() {
            return other.contains_offset(self.offset);
        }
        if other.is_empty() {
            return self.contains_offset(other.offset);
        }
        self.offset < other.end() && other.offset < self.end()
    }

    /// Smallest region covering both
    pub fn union(&self, other: &SourceRegion) -> SourceRegion {
        let offset = self.offset.min(other.offset);
        let end = self.end().max(other.end());
        SourceRegion::new(offset, end - offset)
    }
}

impl std::fmt::Display for SourceRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}+{}]", self.offset, self.length)
    }
}

/// A region within a named file, used for macro definition locations
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// File path
    pub file: String,
    /// Region within the file
    pub region: SourceRegion,
}

impl Location {
    /// Create a new location
    pub fn new(file: impl Into<String>, offset: usize, length: usize) -> Self {
        Self {
            file: file.into(),
            region: SourceRegion::new(offset, length),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.region)
    }
}
