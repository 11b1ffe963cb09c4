//! The resolved, immutable debug info database.
//!
//! Everything in here is frozen after resolution: the eight by-id record
//! collections, the name/value-sorted secondary indices and the
//! span-by-address map. Queries hand out borrowed references into the
//! collections; nothing is copied and nothing can be mutated.
//!
//! An immutable database is freely shareable between threads; a debugger
//! typically loads once and queries from wherever it pleases.

use dbg65_par::record::{
    Addr, FileId, FileInfo, LibId, LibInfo, LineId, LineInfo, ModId, ModInfo, ScopeId, ScopeInfo,
    SegId, SegInfo, SpanId, SpanInfo, SymId, SymInfo, SymType,
};
use dbg65_util::IndexVec;

use crate::addrmap::SpanAddrMap;

/// A fully resolved debug info database.
///
/// Created by [`load`](crate::load) / [`load_str`](crate::load_str);
/// there is no other way to obtain one, and by the time the caller holds
/// it every cross-reference has been validated.
#[derive(Debug, PartialEq, Eq)]
pub struct Database {
    /// Format version `(major, minor)` of the input file.
    pub(crate) version: (u64, u64),

    // Primary by-id collections. These own the records.
    pub(crate) files: IndexVec<FileId, FileInfo>,
    pub(crate) libraries: IndexVec<LibId, LibInfo>,
    pub(crate) lines: IndexVec<LineId, LineInfo>,
    pub(crate) modules: IndexVec<ModId, ModInfo>,
    pub(crate) scopes: IndexVec<ScopeId, ScopeInfo>,
    pub(crate) segments: IndexVec<SegId, SegInfo>,
    pub(crate) spans: IndexVec<SpanId, SpanInfo>,
    pub(crate) symbols: IndexVec<SymId, SymInfo>,

    // Secondary sorted indices; ids only, the collections above own the
    // data.
    pub(crate) file_by_name: Vec<FileId>,
    pub(crate) module_by_name: Vec<ModId>,
    pub(crate) segment_by_name: Vec<SegId>,
    pub(crate) symbol_by_name: Vec<SymId>,
    pub(crate) symbol_by_value: Vec<SymId>,

    /// Span lookup by covered address.
    pub(crate) span_by_addr: SpanAddrMap,
}

impl Database {
    /// Format version `(major, minor)` the file declared.
    pub fn version(&self) -> (u64, u64) {
        self.version
    }

    // ------------------------------------------------------------------
    // By-id access and full listings
    // ------------------------------------------------------------------

    /// The file with the given id.
    pub fn file(&self, id: FileId) -> Option<&FileInfo> {
        self.files.get(id)
    }

    /// All files in id order.
    pub fn files(&self) -> impl Iterator<Item = &FileInfo> {
        self.files.iter()
    }

    /// The library with the given id.
    pub fn library(&self, id: LibId) -> Option<&LibInfo> {
        self.libraries.get(id)
    }

    /// All libraries in id order.
    pub fn libraries(&self) -> impl Iterator<Item = &LibInfo> {
        self.libraries.iter()
    }

    /// The line with the given id.
    pub fn line(&self, id: LineId) -> Option<&LineInfo> {
        self.lines.get(id)
    }

    /// All lines in id order.
    pub fn lines(&self) -> impl Iterator<Item = &LineInfo> {
        self.lines.iter()
    }

    /// The module with the given id.
    pub fn module(&self, id: ModId) -> Option<&ModInfo> {
        self.modules.get(id)
    }

    /// All modules in id order.
    pub fn modules(&self) -> impl Iterator<Item = &ModInfo> {
        self.modules.iter()
    }

    /// The scope with the given id.
    pub fn scope(&self, id: ScopeId) -> Option<&ScopeInfo> {
        self.scopes.get(id)
    }

    /// All scopes in id order.
    pub fn scopes(&self) -> impl Iterator<Item = &ScopeInfo> {
        self.scopes.iter()
    }

    /// The segment with the given id.
    pub fn segment(&self, id: SegId) -> Option<&SegInfo> {
        self.segments.get(id)
    }

    /// All segments in id order.
    pub fn segments(&self) -> impl Iterator<Item = &SegInfo> {
        self.segments.iter()
    }

    /// The span with the given id.
    pub fn span(&self, id: SpanId) -> Option<&SpanInfo> {
        self.spans.get(id)
    }

    /// All spans in id order.
    pub fn spans(&self) -> impl Iterator<Item = &SpanInfo> {
        self.spans.iter()
    }

    /// The symbol with the given id.
    pub fn symbol(&self, id: SymId) -> Option<&SymInfo> {
        self.symbols.get(id)
    }

    /// All symbols in id order.
    pub fn symbols(&self) -> impl Iterator<Item = &SymInfo> {
        self.symbols.iter()
    }

    // ------------------------------------------------------------------
    // Lookup queries
    // ------------------------------------------------------------------

    /// The line record for a source line of a file.
    ///
    /// Binary search over the file's line-sorted list. When several line
    /// records share a line number (macro expansions do that) the one
    /// with the lowest id is returned.
    pub fn line_by_file_and_line(&self, file: FileId, line: u64) -> Option<&LineInfo> {
        let file = self.files.get(file)?;
        let index = file
            .lines
            .partition_point(|&id| self.lines[id].line < line);
        let id = *file.lines.get(index)?;
        if self.lines[id].line == line {
            Some(&self.lines[id])
        } else {
            None
        }
    }

    /// All symbols with the given name, in value order of the name index.
    pub fn symbols_by_name(&self, name: &str) -> Vec<&SymInfo> {
        let start = self
            .symbol_by_name
            .partition_point(|&id| self.symbols[id].name.as_str() < name);
        self.symbol_by_name[start..]
            .iter()
            .map(|&id| &self.symbols[id])
            .take_while(|sym| sym.name == name)
            .collect()
    }

    /// All label symbols whose value lies in `start..=end`.
    ///
    /// Equates are not addresses and are filtered out.
    pub fn symbols_in_range(&self, start: Addr, end: Addr) -> Vec<&SymInfo> {
        let lower = self
            .symbol_by_value
            .partition_point(|&id| self.symbols[id].value < start as i64);
        self.symbol_by_value[lower..]
            .iter()
            .map(|&id| &self.symbols[id])
            .take_while(|sym| sym.value <= end as i64)
            .filter(|sym| sym.sym_type == SymType::Label)
            .collect()
    }

    /// All spans covering the given address. Empty on a miss.
    pub fn spans_by_address(&self, addr: Addr) -> impl Iterator<Item = &SpanInfo> {
        self.span_by_addr
            .lookup(addr)
            .map(|entry| entry.span_ids())
            .unwrap_or(&[])
            .iter()
            .map(move |&id| &self.spans[id])
    }

    /// The span-by-address map itself, for consumers that want the raw
    /// entries.
    pub fn span_addr_map(&self) -> &SpanAddrMap {
        &self.span_by_addr
    }

    // ------------------------------------------------------------------
    // By-name queries
    // ------------------------------------------------------------------

    /// All files with the given name. Several records may share a name
    /// when the same source was compiled into different objects.
    pub fn files_by_name(&self, name: &str) -> Vec<&FileInfo> {
        let start = self
            .file_by_name
            .partition_point(|&id| self.files[id].name.as_str() < name);
        self.file_by_name[start..]
            .iter()
            .map(|&id| &self.files[id])
            .take_while(|file| file.name == name)
            .collect()
    }

    /// The first module with the given name.
    pub fn module_by_name(&self, name: &str) -> Option<&ModInfo> {
        let index = self
            .module_by_name
            .partition_point(|&id| self.modules[id].name.as_str() < name);
        let id = *self.module_by_name.get(index)?;
        if self.modules[id].name == name {
            Some(&self.modules[id])
        } else {
            None
        }
    }

    /// The first segment with the given name.
    pub fn segment_by_name(&self, name: &str) -> Option<&SegInfo> {
        let index = self
            .segment_by_name
            .partition_point(|&id| self.segments[id].name.as_str() < name);
        let id = *self.segment_by_name.get(index)?;
        if self.segments[id].name == name {
            Some(&self.segments[id])
        } else {
            None
        }
    }

    // ------------------------------------------------------------------
    // By-module queries
    // ------------------------------------------------------------------

    /// The files used by a module, sorted by name.
    pub fn files_by_module(&self, module: ModId) -> impl Iterator<Item = &FileInfo> {
        self.modules
            .get(module)
            .map(|m| m.files.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&id| &self.files[id])
    }

    /// The scopes of a module, sorted by name.
    pub fn scopes_by_module(&self, module: ModId) -> impl Iterator<Item = &ScopeInfo> {
        self.modules
            .get(module)
            .map(|m| m.scopes.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&id| &self.scopes[id])
    }

    /// The main scope of a module.
    pub fn main_scope(&self, module: ModId) -> Option<&ScopeInfo> {
        let id = self.modules.get(module)?.main_scope?;
        Some(&self.scopes[id])
    }
}
