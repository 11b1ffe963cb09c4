//! dbg65 - A reader for 6502-toolchain debug info files.
//!
//! Assemblers and linkers of the 6502 family can emit a textual debug
//! information file describing the built program: its source files,
//! libraries, modules, lexical scopes, output segments, address spans,
//! symbols and source line records. This crate loads such a file and
//! exposes an immutable, queryable database over it, for debuggers and
//! other source-level inspectors to answer questions like "which source
//! line covers this address" or "which symbols lie in this range".
//!
//! The pipeline:
//!
//! ```text
//! bytes -> scanner -> tokens -> record parser -> raw records (ids)
//!       -> resolver -> frozen Database (validated ids, back-links,
//!                      sorted indices, span-by-address map)
//! ```
//!
//! Scanning and record parsing live in the `dbg65-lex` and `dbg65-par`
//! crates; this crate adds reference resolution, the address map and the
//! query surface, and is the only crate consumers need to depend on.
//!
//! # Diagnostics
//!
//! Every problem found in the input - warnings included - is delivered
//! to a caller-supplied [`DiagnosticSink`] the moment it is found.
//! Recoverable errors do not stop the reader (it resynchronises on the
//! next line and keeps going, so one load reports as many problems as
//! possible), but any error means the returned result is
//! [`LoadError::Invalid`] and no database is handed out.
//!
//! # Example
//!
//! ```
//! use dbg65::{load_str, Collector, FileId};
//!
//! let source = "\
//! version major=2,minor=0
//! file    id=0,name=\"a.s\",size=10,mtime=0x500,mod=0
//! seg     id=0,name=\"CODE\",start=0x8000,size=0x10,addrsize=abs,type=ro
//! span    id=0,seg=0,start=0,size=4
//! line    id=0,file=0,line=7,span=0
//! mod     id=0,name=\"a\",file=0
//! scope   id=0,mod=0,name=\"\",type=scope
//! ";
//!
//! let mut sink = Collector::new();
//! let db = load_str(source, "a.dbg", &mut sink).unwrap();
//!
//! // Source line 7 of file 0 is covered by span 0 ...
//! let line = db.line_by_file_and_line(FileId(0), 7).unwrap();
//! assert_eq!(line.spans.len(), 1);
//!
//! // ... which sits at 0x8000..=0x8003 after segment rebasing.
//! assert_eq!(db.spans_by_address(0x8000).count(), 1);
//! assert_eq!(db.spans_by_address(0x8004).count(), 0);
//! ```

pub mod addrmap;
pub mod database;
mod resolve;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use dbg65_par::parser;
use dbg65_util::Reporter;

pub use addrmap::{AddrEntry, SpanAddrMap};
pub use database::Database;
pub use dbg65_par::parser::{FatalError, SUPPORTED_MAJOR, SUPPORTED_MINOR};
pub use dbg65_par::record::{
    Addr, FileId, FileInfo, LibId, LibInfo, LineId, LineInfo, LineType, ModId, ModInfo,
    OutputFile, ScopeId, ScopeInfo, ScopeType, SegId, SegInfo, SpanId, SpanInfo, SymId, SymInfo,
    SymType,
};
pub use dbg65_util::{Collector, Diagnostic, DiagnosticSink, FnSink, Severity};

/// Why a load produced no database.
///
/// Individual problems in the input are reported through the diagnostic
/// sink as they are found; this type only describes the overall outcome.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The input file could not be read at all.
    #[error("cannot open input file \"{}\": {source}", path.display())]
    Io {
        /// Path that failed to open.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The input is not a debug info file this reader can interpret: the
    /// version record is missing or names an unsupported major version.
    #[error(transparent)]
    Format(#[from] FatalError),

    /// The input was readable but contained errors; the sink has the
    /// details.
    #[error("debug info file contains {errors} error(s)")]
    Invalid {
        /// Number of error-severity diagnostics reported.
        errors: u32,
    },
}

/// Loads a debug info file from disk.
///
/// On success the returned [`Database`] is fully resolved and immutable.
/// All diagnostics, including warnings on successful loads, go to
/// `sink`. Freeing the database is just dropping it.
pub fn load(path: impl AsRef<Path>, sink: &mut dyn DiagnosticSink) -> Result<Database, LoadError> {
    let path = path.as_ref();
    let file_name = path.display().to_string();

    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            let mut reporter = Reporter::new(file_name.clone(), sink);
            reporter.error(0, 0, format!("cannot open input file \"{}\": {}", file_name, err));
            return Err(LoadError::Io {
                path: path.to_path_buf(),
                source: err,
            });
        }
    };

    load_str(&source, &file_name, sink)
}

/// Loads a debug info file that is already in memory.
///
/// `file_name` is only used to label diagnostics. See [`load`].
pub fn load_str(
    source: &str,
    file_name: &str,
    sink: &mut dyn DiagnosticSink,
) -> Result<Database, LoadError> {
    let mut reporter = Reporter::new(file_name, sink);

    let raw = parser::parse(source, &mut reporter)?;

    // Resolution only makes sense over a record set that parsed cleanly.
    if reporter.error_count() > 0 {
        return Err(LoadError::Invalid {
            errors: reporter.error_count(),
        });
    }

    let database = resolve::resolve(raw, &mut reporter);
    match database {
        Some(database) if reporter.error_count() == 0 => {
            log::debug!(
                "loaded debug info from {} ({} warning(s))",
                file_name,
                reporter.warning_count()
            );
            Ok(database)
        }
        _ => Err(LoadError::Invalid {
            errors: reporter.error_count(),
        }),
    }
}
