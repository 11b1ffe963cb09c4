//! Reference resolution.
//!
//! Runs once, after the whole file has been parsed without errors. The
//! raw database stores every cross-reference as the numeric id from the
//! file; this pass validates each one against the target collection,
//! fills in the back-reference lists (file/line, module/scope,
//! span/scope, span/line), rebases span addresses from segment-relative
//! to absolute, lets scope-less symbols inherit their parent's scope,
//! and finally builds the sorted secondary indices plus the
//! span-by-address map.
//!
//! Any invalid id is reported as an error and the dangling reference is
//! dropped; the caller then discards the whole database, so queries never
//! see a partially resolved graph.

use std::mem;

use dbg65_par::raw::RawDatabase;
use dbg65_par::record::{
    FileId, FileInfo, LibId, LibInfo, LineId, LineInfo, ModId, ModInfo, ScopeId, ScopeInfo, SegId,
    SegInfo, SpanId, SpanInfo, SymId, SymInfo,
};
use dbg65_util::{Idx, IndexVec, Reporter};

use crate::addrmap::SpanAddrMap;
use crate::database::Database;

/// Resolves a parsed database. Returns `None` when record ids are not
/// dense (a record is missing); other problems are reported and leave
/// the error count for the caller to inspect.
pub(crate) fn resolve(raw: RawDatabase, reporter: &mut Reporter<'_>) -> Option<Database> {
    let RawDatabase {
        major,
        minor,
        files,
        libraries,
        lines,
        modules,
        scopes,
        segments,
        spans,
        symbols,
    } = raw;

    // The format guarantees contiguous ids per kind; a hole at this point
    // means the producer skipped a record and nothing referencing that id
    // range can be trusted.
    let errors_before = reporter.error_count();
    let files = densify(files, "file", reporter);
    let libraries = densify(libraries, "lib", reporter);
    let lines = densify(lines, "line", reporter);
    let modules = densify(modules, "mod", reporter);
    let scopes = densify(scopes, "scope", reporter);
    let segments = densify(segments, "seg", reporter);
    let spans = densify(spans, "span", reporter);
    let symbols = densify(symbols, "sym", reporter);
    if reporter.error_count() != errors_before {
        return None;
    }

    let resolver = Resolver {
        reporter,
        files,
        libraries,
        lines,
        modules,
        scopes,
        segments,
        spans,
        symbols,
    };
    Some(resolver.run((major, minor)))
}

/// Converts a hole-tolerant parse collection into a dense one, reporting
/// every hole.
fn densify<I: Idx, T>(
    vec: IndexVec<I, Option<T>>,
    kind: &str,
    reporter: &mut Reporter<'_>,
) -> IndexVec<I, T> {
    let mut dense = IndexVec::with_capacity(vec.len());
    for (id, slot) in vec.into_iter_enumerated() {
        match slot {
            Some(record) => {
                dense.push(record);
            }
            None => reporter.error(
                0,
                0,
                format!("missing {} record with id {}", kind, id.index()),
            ),
        }
    }
    dense
}

struct Resolver<'r, 'k> {
    reporter: &'r mut Reporter<'k>,
    files: IndexVec<FileId, FileInfo>,
    libraries: IndexVec<LibId, LibInfo>,
    lines: IndexVec<LineId, LineInfo>,
    modules: IndexVec<ModId, ModInfo>,
    scopes: IndexVec<ScopeId, ScopeInfo>,
    segments: IndexVec<SegId, SegInfo>,
    spans: IndexVec<SpanId, SpanInfo>,
    symbols: IndexVec<SymId, SymInfo>,
}

impl Resolver<'_, '_> {
    fn error(&mut self, message: String) {
        // Resolution errors have no single source position; they are
        // reported against the file as a whole.
        self.reporter.error(0, 0, message);
    }

    fn run(mut self, version: (u64, u64)) -> Database {
        self.resolve_files();
        self.resolve_lines();
        self.resolve_modules();
        self.resolve_scopes();
        self.resolve_spans();
        self.resolve_symbols();
        self.finish(version)
    }

    /// Files: validate the module list, back-link into `module.files`,
    /// then sort both sides of the relation by name.
    fn resolve_files(&mut self) {
        for index in 0..self.files.len() {
            let f = FileId::from_usize(index);
            let list = mem::take(&mut self.files[f].modules);
            let mut kept = Vec::with_capacity(list.len());
            for m in list {
                if m.index() >= self.modules.len() {
                    let msg = format!("invalid module id {} for file with id {}", m.0, f.0);
                    self.error(msg);
                } else {
                    self.modules[m].files.push(f);
                    kept.push(m);
                }
            }
            self.files[f].modules = kept;
        }

        for index in 0..self.files.len() {
            let f = FileId::from_usize(index);
            let mut list = mem::take(&mut self.files[f].modules);
            list.sort_by(|&a, &b| self.modules[a].name.cmp(&self.modules[b].name));
            self.files[f].modules = list;
        }
        for index in 0..self.modules.len() {
            let m = ModId::from_usize(index);
            let mut list = mem::take(&mut self.modules[m].files);
            list.sort_by(|&a, &b| file_name_key(&self.files[a]).cmp(&file_name_key(&self.files[b])));
            self.modules[m].files = list;
        }
    }

    /// Lines: validate the file, back-link into `file.lines` and sort
    /// those for binary search; validate the span list and back-link
    /// into `span.lines`.
    fn resolve_lines(&mut self) {
        for index in 0..self.lines.len() {
            let l = LineId::from_usize(index);

            let file = self.lines[l].file;
            if file.index() >= self.files.len() {
                let msg = format!("invalid file id {} for line with id {}", file.0, l.0);
                self.error(msg);
            } else {
                self.files[file].lines.push(l);
            }

            let list = mem::take(&mut self.lines[l].spans);
            let mut kept = Vec::with_capacity(list.len());
            for span in list {
                if span.index() >= self.spans.len() {
                    let msg = format!("invalid span id {} for line with id {}", span.0, l.0);
                    self.error(msg);
                } else {
                    self.spans[span].lines.push(l);
                    kept.push(span);
                }
            }
            self.lines[l].spans = kept;
        }

        // Duplicate line numbers from macro expansion stay in id order,
        // so a lookup returns the first record the producer emitted.
        for index in 0..self.files.len() {
            let f = FileId::from_usize(index);
            let mut list = mem::take(&mut self.files[f].lines);
            list.sort_by_key(|&l| (self.lines[l].line, l.0));
            self.files[f].lines = list;
        }
    }

    /// Modules: validate the main file and the optional library.
    fn resolve_modules(&mut self) {
        for index in 0..self.modules.len() {
            let m = ModId::from_usize(index);

            let file = self.modules[m].file;
            if file.index() >= self.files.len() {
                let msg = format!("invalid file id {} for module with id {}", file.0, m.0);
                self.error(msg);
            }

            if let Some(lib) = self.modules[m].library {
                if lib.index() >= self.libraries.len() {
                    let msg = format!("invalid library id {} for module with id {}", lib.0, m.0);
                    self.error(msg);
                    self.modules[m].library = None;
                }
            }
        }
    }

    /// Scopes: validate module/parent/label and the span list with its
    /// `span.scopes` back-links; a parent-less scope is its module's
    /// main scope, of which there must be exactly one.
    fn resolve_scopes(&mut self) {
        for index in 0..self.scopes.len() {
            let s = ScopeId::from_usize(index);

            let module = self.scopes[s].module;
            if module.index() >= self.modules.len() {
                let msg = format!("invalid module id {} for scope with id {}", module.0, s.0);
                self.error(msg);
            } else {
                self.modules[module].scopes.push(s);
                if self.scopes[s].parent.is_none() {
                    if let Some(previous) = self.modules[module].main_scope {
                        let msg = format!(
                            "module with id {} has more than one main scope (scopes {} and {})",
                            module.0, previous.0, s.0
                        );
                        self.error(msg);
                    } else {
                        self.modules[module].main_scope = Some(s);
                    }
                }
            }

            if let Some(parent) = self.scopes[s].parent {
                if parent.index() >= self.scopes.len() {
                    let msg =
                        format!("invalid parent scope id {} for scope with id {}", parent.0, s.0);
                    self.error(msg);
                    self.scopes[s].parent = None;
                }
            }

            if let Some(label) = self.scopes[s].label {
                if label.index() >= self.symbols.len() {
                    let msg = format!("invalid label id {} for scope with id {}", label.0, s.0);
                    self.error(msg);
                    self.scopes[s].label = None;
                }
            }

            let list = mem::take(&mut self.scopes[s].spans);
            let mut kept = Vec::with_capacity(list.len());
            for span in list {
                if span.index() >= self.spans.len() {
                    let msg = format!("invalid span id {} for scope with id {}", span.0, s.0);
                    self.error(msg);
                } else {
                    self.spans[span].scopes.push(s);
                    kept.push(span);
                }
            }
            self.scopes[s].spans = kept;
        }

        for index in 0..self.modules.len() {
            let m = ModId::from_usize(index);
            if self.modules[m].main_scope.is_none() {
                let msg = format!("module with id {} has no main scope", m.0);
                self.error(msg);
            }
            let mut list = mem::take(&mut self.modules[m].scopes);
            list.sort_by(|&a, &b| self.scopes[a].name.cmp(&self.scopes[b].name));
            self.modules[m].scopes = list;
        }
    }

    /// Spans: validate the segment and rebase the start address by the
    /// segment base, making span addresses absolute.
    fn resolve_spans(&mut self) {
        for index in 0..self.spans.len() {
            let span = SpanId::from_usize(index);
            let seg = self.spans[span].segment;
            if seg.index() >= self.segments.len() {
                let msg = format!("invalid segment id {} for span with id {}", seg.0, span.0);
                self.error(msg);
            } else {
                let base = self.segments[seg].start;
                self.spans[span].start += base;
            }
        }
    }

    /// Symbols: validate segment/scope/parent, then let symbols without
    /// an explicit scope inherit their parent's.
    fn resolve_symbols(&mut self) {
        for index in 0..self.symbols.len() {
            let s = SymId::from_usize(index);

            if let Some(seg) = self.symbols[s].segment {
                if seg.index() >= self.segments.len() {
                    let msg = format!("invalid segment id {} for symbol with id {}", seg.0, s.0);
                    self.error(msg);
                    self.symbols[s].segment = None;
                }
            }
            if let Some(scope) = self.symbols[s].scope {
                if scope.index() >= self.scopes.len() {
                    let msg = format!("invalid scope id {} for symbol with id {}", scope.0, s.0);
                    self.error(msg);
                    self.symbols[s].scope = None;
                }
            }
            if let Some(parent) = self.symbols[s].parent {
                if parent.index() >= self.symbols.len() {
                    let msg = format!("invalid parent id {} for symbol with id {}", parent.0, s.0);
                    self.error(msg);
                    self.symbols[s].parent = None;
                }
            }
        }

        // Second pass: cheap locals carry only a parent; they inherit the
        // parent's scope. Walking in id order lets a chain whose parent
        // precedes the child settle in one pass.
        for index in 0..self.symbols.len() {
            let s = SymId::from_usize(index);
            if self.symbols[s].scope.is_some() {
                continue;
            }
            match self.symbols[s].parent {
                None => {
                    let msg = format!("symbol with id {} has no parent and no scope", s.0);
                    self.error(msg);
                }
                Some(parent) => match self.symbols[parent].scope {
                    None => {
                        let msg = format!(
                            "symbol with id {} has parent {} without a scope",
                            s.0, parent.0
                        );
                        self.error(msg);
                    }
                    Some(scope) => self.symbols[s].scope = Some(scope),
                },
            }
        }
    }

    /// Builds the sorted secondary indices and the span-by-address map,
    /// then freezes everything into the [`Database`].
    fn finish(self, version: (u64, u64)) -> Database {
        let mut file_by_name: Vec<FileId> = self.files.indices().collect();
        file_by_name
            .sort_by(|&a, &b| file_name_key(&self.files[a]).cmp(&file_name_key(&self.files[b])));

        let mut module_by_name: Vec<ModId> = self.modules.indices().collect();
        module_by_name.sort_by(|&a, &b| self.modules[a].name.cmp(&self.modules[b].name));

        let mut segment_by_name: Vec<SegId> = self.segments.indices().collect();
        segment_by_name.sort_by(|&a, &b| self.segments[a].name.cmp(&self.segments[b].name));

        // Stable sorts keep equal keys in id order, which the duplicate
        // scans of the query layer rely on.
        let mut symbol_by_name: Vec<SymId> = self.symbols.indices().collect();
        symbol_by_name.sort_by(|&a, &b| self.symbols[a].name.cmp(&self.symbols[b].name));

        let mut symbol_by_value: Vec<SymId> = self.symbols.indices().collect();
        symbol_by_value.sort_by(|&a, &b| {
            (self.symbols[a].value, self.symbols[a].name.as_str())
                .cmp(&(self.symbols[b].value, self.symbols[b].name.as_str()))
        });

        // Address-sorted span list; empty spans cover nothing and are
        // left out of the map entirely.
        let mut by_addr: Vec<SpanId> = self
            .spans
            .indices()
            .filter(|&span| !self.spans[span].is_empty())
            .collect();
        by_addr.sort_by_key(|&span| (self.spans[span].start, self.spans[span].end(), span.0));
        let span_by_addr = SpanAddrMap::build(&by_addr, &self.spans);

        log::debug!(
            "resolved debug info: {} files, {} modules, {} scopes, {} segments, {} spans, \
             {} lines, {} symbols, {} unique span addresses",
            self.files.len(),
            self.modules.len(),
            self.scopes.len(),
            self.segments.len(),
            self.spans.len(),
            self.lines.len(),
            self.symbols.len(),
            span_by_addr.unique_addresses()
        );

        Database {
            version,
            files: self.files,
            libraries: self.libraries,
            lines: self.lines,
            modules: self.modules,
            scopes: self.scopes,
            segments: self.segments,
            spans: self.spans,
            symbols: self.symbols,
            file_by_name,
            module_by_name,
            segment_by_name,
            symbol_by_name,
            symbol_by_value,
            span_by_addr,
        }
    }
}

/// Sort key for files: identical files (same name, timestamp and size)
/// end up next to each other.
fn file_name_key(file: &FileInfo) -> (&str, u64, u64) {
    (file.name.as_str(), file.mtime, file.size)
}
