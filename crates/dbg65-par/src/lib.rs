//! dbg65-par - Record parser for the debug info format.
//!
//! Takes the token stream produced by `dbg65-lex` and turns it into the
//! raw, id-keyed record collections. This crate knows the grammar of
//! every record kind and enforces the per-record constraints that can be
//! checked line-locally (required attributes, paired attributes, the
//! scope/parent exclusivity of symbols, the enumerated `type` values).
//! What it does not do is look across records: ids are stored as given,
//! and validating them is the resolver's job in the `dbg65` crate.
//!
//! The parser is deliberately forgiving in one direction: unknown
//! attribute and record keywords produce a warning and are skipped, so a
//! file written by a newer toolchain still loads as far as the known
//! subset carries. It is strict in the other direction: the first line
//! must name a format version this reader supports, and a file below the
//! supported major version is rejected outright.

pub mod parser;
pub mod raw;
pub mod record;

mod edge_cases;

pub use parser::{parse, FatalError, SUPPORTED_MAJOR, SUPPORTED_MINOR};
pub use raw::RawDatabase;
pub use record::{
    Addr, FileId, FileInfo, LibId, LibInfo, LineId, LineInfo, LineType, ModId, ModInfo,
    OutputFile, ScopeId, ScopeInfo, ScopeType, SegId, SegInfo, SpanId, SpanInfo, SymId, SymInfo,
    SymType,
};
