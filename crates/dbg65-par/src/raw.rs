//! The parse-phase database.
//!
//! During parsing, records land in by-id collections exactly where their
//! id says, with `None` holes for ids that have not appeared yet. The
//! format guarantees dense ids per kind, so after a clean parse there are
//! no holes left; the resolver verifies that and turns the raw database
//! into the frozen, hole-free one.

use dbg65_util::IndexVec;

use crate::record::{
    FileId, FileInfo, LibId, LibInfo, LineId, LineInfo, ModId, ModInfo, ScopeId, ScopeInfo, SegId,
    SegInfo, SpanId, SpanInfo, SymId, SymInfo,
};

/// All records of a parsed debug info file, keyed by id, references still
/// unvalidated.
#[derive(Debug, Default, PartialEq)]
pub struct RawDatabase {
    /// Major format version from the `version` record.
    pub major: u64,
    /// Minor format version from the `version` record.
    pub minor: u64,
    /// File records by id.
    pub files: IndexVec<FileId, Option<FileInfo>>,
    /// Library records by id.
    pub libraries: IndexVec<LibId, Option<LibInfo>>,
    /// Line records by id.
    pub lines: IndexVec<LineId, Option<LineInfo>>,
    /// Module records by id.
    pub modules: IndexVec<ModId, Option<ModInfo>>,
    /// Scope records by id.
    pub scopes: IndexVec<ScopeId, Option<ScopeInfo>>,
    /// Segment records by id.
    pub segments: IndexVec<SegId, Option<SegInfo>>,
    /// Span records by id.
    pub spans: IndexVec<SpanId, Option<SpanInfo>>,
    /// Symbol records by id.
    pub symbols: IndexVec<SymId, Option<SymInfo>>,
}

impl RawDatabase {
    /// Creates an empty raw database.
    pub fn new() -> Self {
        Self::default()
    }
}
