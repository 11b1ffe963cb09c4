//! The record parser.
//!
//! A debug info file is `version` on the first line followed by any
//! number of records, one per line:
//!
//! ```text
//! recordline := recordkw attr ("," attr)* EOL
//! attr       := IDENT "=" (INT | STRING | IDENT | INT ("+" INT)*)
//! ```
//!
//! Each record parser accepts its attributes in any order, tracks the
//! required ones in a bitmask that is checked at the end of the line, and
//! treats unknown attribute keywords as a warning followed by a skip, so
//! files written by newer producers degrade gracefully instead of
//! failing. Any error makes the parser skip to the end of the line and
//! resume with the next record; nothing short of an unsupported format
//! version aborts the parse.

use dbg65_lex::{Keyword, Lexer, Token};
use dbg65_util::Reporter;
use thiserror::Error;

use crate::raw::RawDatabase;
use crate::record::{
    FileId, FileInfo, LibId, LibInfo, LineId, LineInfo, LineType, ModId, ModInfo, OutputFile,
    ScopeId, ScopeInfo, ScopeType, SegId, SegInfo, SpanId, SpanInfo, SymId, SymInfo, SymType,
};

/// Major format version this reader understands.
pub const SUPPORTED_MAJOR: u64 = 2;

/// Minor format version this reader understands.
pub const SUPPORTED_MINOR: u64 = 0;

/// Conditions that abort the parse immediately.
///
/// Everything else is recoverable: it is reported through the diagnostic
/// sink and the parser carries on with the next line.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FatalError {
    /// The first line of the file is not a `version` record.
    #[error("\"version\" keyword missing in first line - this is not a valid debug info file")]
    MissingVersion,

    /// The file uses a major version older than the supported one.
    #[error(
        "debug info format version {major}.{minor} is no longer supported (supported: {}.{})",
        SUPPORTED_MAJOR,
        SUPPORTED_MINOR
    )]
    UnsupportedVersion {
        /// Major version found in the file.
        major: u64,
        /// Minor version found in the file.
        minor: u64,
    },
}

/// Parses a complete debug info file into a [`RawDatabase`].
///
/// Diagnostics go to `reporter` as they are discovered; the caller is
/// expected to check `reporter.error_count()` afterwards and discard the
/// result when it is non-zero. The returned database has not been
/// resolved: ids are unvalidated and back-reference lists are empty.
pub fn parse(source: &str, reporter: &mut Reporter<'_>) -> Result<RawDatabase, FatalError> {
    Parser::new(source, reporter).run()
}

// Required-attribute bitmasks live as consts inside each record parser;
// a shared alias keeps the signatures readable.
type InfoBits = u32;

struct Parser<'s, 'r, 'k> {
    lexer: Lexer<'s>,
    reporter: &'r mut Reporter<'k>,
    tok: Token,
    raw: RawDatabase,
}

impl<'s, 'r, 'k> Parser<'s, 'r, 'k> {
    fn new(source: &'s str, reporter: &'r mut Reporter<'k>) -> Self {
        Self {
            lexer: Lexer::new(source),
            reporter,
            tok: Token::Eof,
            raw: RawDatabase::new(),
        }
    }

    fn run(mut self) -> Result<RawDatabase, FatalError> {
        self.next();

        // The first record must carry the version; nothing else can be
        // interpreted without knowing it.
        if self.tok != Token::Keyword(Keyword::Version) {
            self.error_here(
                "\"version\" keyword missing in first line - this is not a valid debug info file",
            );
            return Err(FatalError::MissingVersion);
        }

        if self.parse_version() {
            let (major, minor) = (self.raw.major, self.raw.minor);
            if major < SUPPORTED_MAJOR {
                let fatal = FatalError::UnsupportedVersion { major, minor };
                self.error_here(fatal.to_string());
                return Err(fatal);
            } else if major > SUPPORTED_MAJOR {
                self.warning_here(format!(
                    "debug info format version {}.{} is newer than the supported {}.{}; \
                     expect warnings about unknown keywords",
                    major, minor, SUPPORTED_MAJOR, SUPPORTED_MINOR
                ));
            } else if minor > SUPPORTED_MINOR {
                self.warning_here(format!(
                    "debug info format version {}.{} is slightly newer than the supported {}.{}",
                    major, minor, SUPPORTED_MAJOR, SUPPORTED_MINOR
                ));
            }
        }
        self.consume_eol();

        while self.tok != Token::Eof {
            match &self.tok {
                Token::Keyword(Keyword::File) => self.parse_file(),
                Token::Keyword(Keyword::Info) => self.parse_info(),
                Token::Keyword(Keyword::Library) => self.parse_library(),
                Token::Keyword(Keyword::Line) => self.parse_line(),
                Token::Keyword(Keyword::Module) => self.parse_module(),
                Token::Keyword(Keyword::Scope) => self.parse_scope(),
                Token::Keyword(Keyword::Segment) => self.parse_segment(),
                Token::Keyword(Keyword::Span) => self.parse_span(),
                Token::Keyword(Keyword::Sym) => self.parse_sym(),
                Token::Ident(name) => {
                    // A record type added by a later format version.
                    let name = name.clone();
                    self.warning_here(format!("unknown keyword \"{}\" - skipping", name));
                    self.skip_line();
                }
                _ => self.unexpected_token(),
            }
            self.consume_eol();
        }

        Ok(self.raw)
    }

    // ------------------------------------------------------------------
    // Token plumbing
    // ------------------------------------------------------------------

    fn next(&mut self) {
        self.tok = self.lexer.next_token(self.reporter);
    }

    fn error_here(&mut self, message: impl Into<String>) {
        self.reporter.error(
            self.lexer.token_line(),
            self.lexer.token_column(),
            message,
        );
    }

    fn warning_here(&mut self, message: impl Into<String>) {
        self.reporter.warning(
            self.lexer.token_line(),
            self.lexer.token_column(),
            message,
        );
    }

    /// Error recovery: drop tokens until the end of the line.
    fn skip_line(&mut self) {
        while !matches!(self.tok, Token::Eol | Token::Eof) {
            self.next();
        }
    }

    fn unexpected_token(&mut self) {
        let message = format!("unexpected input token: {}", self.tok);
        self.error_here(message);
        self.skip_line();
    }

    /// Consumes the end-of-line terminating a record. Leftover tokens are
    /// an error.
    fn consume_eol(&mut self) {
        if self.tok != Token::Eof {
            if self.tok != Token::Eol {
                self.error_here("extra tokens in line");
                self.skip_line();
            }
            self.next();
        }
    }

    fn consume_equal(&mut self) -> bool {
        if self.tok == Token::Eq {
            self.next();
            true
        } else {
            self.error_here("'=' expected");
            self.skip_line();
            false
        }
    }

    /// Expects an integer constant value.
    fn int_const(&mut self) -> Option<u64> {
        if let Token::Int(value) = self.tok {
            self.next();
            Some(value)
        } else {
            self.error_here("integer constant expected");
            self.skip_line();
            None
        }
    }

    /// Expects a string constant value.
    fn str_const(&mut self) -> Option<String> {
        if let Token::Str(value) = &self.tok {
            let value = value.clone();
            self.next();
            Some(value)
        } else {
            self.error_here("string constant expected");
            self.skip_line();
            None
        }
    }

    /// Expects an integer constant that fits a record id.
    fn id_const(&mut self) -> Option<u32> {
        let value = self.int_const()?;
        match u32::try_from(value) {
            Ok(id) => Some(id),
            Err(_) => {
                self.error_here(format!("id value {} out of range", value));
                self.skip_line();
                None
            }
        }
    }

    /// Expects a `+`-separated list of ids.
    fn id_list(&mut self) -> Option<Vec<u32>> {
        let mut ids = Vec::new();
        loop {
            ids.push(self.id_const()?);
            if self.tok != Token::Plus {
                break;
            }
            self.next();
        }
        Some(ids)
    }

    /// Skips an unknown attribute, including its optional `= value`
    /// payload and a trailing comma, then lets the record loop continue
    /// with the next attribute. Later format versions add attributes;
    /// this is what keeps old readers working against them.
    fn unknown_keyword(&mut self) {
        let name = match &self.tok {
            Token::Ident(name) => name.clone(),
            Token::Keyword(kw) => kw.as_str().to_string(),
            _ => return,
        };
        self.warning_here(format!("unknown keyword \"{}\" - skipping", name));
        self.next();

        if self.tok == Token::Eq {
            self.next();
            while !matches!(self.tok, Token::Comma | Token::Eol | Token::Eof) {
                self.next();
            }
        } else if !matches!(self.tok, Token::Comma | Token::Eol | Token::Eof) {
            self.skip_line();
        }
        if self.tok == Token::Comma {
            self.next();
        }
    }

    /// Consumes an attribute value without interpreting it. Used for the
    /// `addrsize` and segment `type` values, whose vocabulary has grown
    /// over time; their presence is required, their spelling is not.
    fn skip_attr_value(&mut self) {
        if !matches!(self.tok, Token::Eol | Token::Eof) {
            self.next();
        }
    }

    /// Final checks shared by all record parsers: the line must be over
    /// and every required attribute must have been seen.
    fn end_of_record(&mut self, bits: InfoBits, required: InfoBits) -> bool {
        if !matches!(self.tok, Token::Eol | Token::Eof) {
            self.unexpected_token();
            return false;
        }
        if bits & required != required {
            self.error_here("required attributes missing");
            return false;
        }
        true
    }

    // ------------------------------------------------------------------
    // Record parsers
    // ------------------------------------------------------------------

    /// Parses the `version` record. Returns false when the record was
    /// malformed and no version gate should be applied.
    fn parse_version(&mut self) -> bool {
        const IB_MAJOR: InfoBits = 0x01;
        const IB_MINOR: InfoBits = 0x02;
        const IB_REQUIRED: InfoBits = IB_MAJOR | IB_MINOR;

        let mut bits: InfoBits = 0;
        self.next();

        while !matches!(self.tok, Token::Eol | Token::Eof) {
            match self.tok {
                Token::Keyword(Keyword::Major) => {
                    self.next();
                    if !self.consume_equal() {
                        return false;
                    }
                    let Some(value) = self.int_const() else {
                        return false;
                    };
                    self.raw.major = value;
                    bits |= IB_MAJOR;
                }
                Token::Keyword(Keyword::Minor) => {
                    self.next();
                    if !self.consume_equal() {
                        return false;
                    }
                    let Some(value) = self.int_const() else {
                        return false;
                    };
                    self.raw.minor = value;
                    bits |= IB_MINOR;
                }
                Token::Ident(_) | Token::Keyword(_) => {
                    self.unknown_keyword();
                    continue;
                }
                _ => {
                    self.unexpected_token();
                    return false;
                }
            }

            if self.tok == Token::Comma {
                self.next();
            } else if matches!(self.tok, Token::Eol | Token::Eof) {
                break;
            } else {
                self.unexpected_token();
                return false;
            }
        }

        if bits & IB_REQUIRED != IB_REQUIRED {
            self.error_here("required attributes missing");
            return false;
        }
        true
    }

    /// Parses an `info` record: record counts per kind, used purely as
    /// capacity hints.
    fn parse_info(&mut self) {
        self.next();

        loop {
            let kw = match self.tok {
                Token::Keyword(
                    kw @ (Keyword::File
                    | Keyword::Library
                    | Keyword::Line
                    | Keyword::Module
                    | Keyword::Scope
                    | Keyword::Segment
                    | Keyword::Span
                    | Keyword::Sym),
                ) => kw,
                Token::Ident(_) | Token::Keyword(_) => {
                    self.unknown_keyword();
                    continue;
                }
                _ => break,
            };

            self.next();
            if !self.consume_equal() {
                return;
            }
            let Some(count) = self.int_const() else {
                return;
            };

            // Advisory only; clamp so a corrupt count cannot balloon the
            // allocations. The resolver validates the real ids anyway.
            let hint = count.min(1 << 20) as usize;
            match kw {
                Keyword::File => reserve_hint(&mut self.raw.files, hint),
                Keyword::Library => reserve_hint(&mut self.raw.libraries, hint),
                Keyword::Line => reserve_hint(&mut self.raw.lines, hint),
                Keyword::Module => reserve_hint(&mut self.raw.modules, hint),
                Keyword::Scope => reserve_hint(&mut self.raw.scopes, hint),
                Keyword::Segment => reserve_hint(&mut self.raw.segments, hint),
                Keyword::Span => reserve_hint(&mut self.raw.spans, hint),
                Keyword::Sym => reserve_hint(&mut self.raw.symbols, hint),
                _ => unreachable!(),
            }

            if self.tok != Token::Comma {
                break;
            }
            self.next();
        }

        if !matches!(self.tok, Token::Eol | Token::Eof) {
            self.unexpected_token();
        }
    }

    /// Parses a `file` record.
    fn parse_file(&mut self) {
        const IB_ID: InfoBits = 0x01;
        const IB_NAME: InfoBits = 0x02;
        const IB_SIZE: InfoBits = 0x04;
        const IB_MTIME: InfoBits = 0x08;
        const IB_MOD: InfoBits = 0x10;
        const IB_REQUIRED: InfoBits = IB_ID | IB_NAME | IB_SIZE | IB_MTIME | IB_MOD;

        let mut bits: InfoBits = 0;
        let mut id = 0u32;
        let mut name = String::new();
        let mut size = 0u64;
        let mut mtime = 0u64;
        let mut modules: Vec<u32> = Vec::new();

        self.next();

        loop {
            let kw = match self.tok {
                Token::Keyword(
                    kw @ (Keyword::Id
                    | Keyword::Module
                    | Keyword::MTime
                    | Keyword::Name
                    | Keyword::Size),
                ) => kw,
                Token::Ident(_) | Token::Keyword(_) => {
                    self.unknown_keyword();
                    continue;
                }
                _ => break,
            };

            self.next();
            if !self.consume_equal() {
                return;
            }

            match kw {
                Keyword::Id => {
                    let Some(value) = self.id_const() else { return };
                    id = value;
                    bits |= IB_ID;
                }
                Keyword::Module => {
                    let Some(value) = self.id_list() else { return };
                    modules = value;
                    bits |= IB_MOD;
                }
                Keyword::MTime => {
                    let Some(value) = self.int_const() else { return };
                    mtime = value;
                    bits |= IB_MTIME;
                }
                Keyword::Name => {
                    let Some(value) = self.str_const() else { return };
                    name = value;
                    bits |= IB_NAME;
                }
                Keyword::Size => {
                    let Some(value) = self.int_const() else { return };
                    size = value;
                    bits |= IB_SIZE;
                }
                _ => unreachable!(),
            }

            if self.tok != Token::Comma {
                break;
            }
            self.next();
        }

        if !self.end_of_record(bits, IB_REQUIRED) {
            return;
        }

        let info = FileInfo {
            id: FileId(id),
            name,
            size,
            mtime,
            modules: modules.into_iter().map(ModId).collect(),
            lines: Vec::new(),
        };
        self.raw.files.insert_expand(FileId(id), info);
    }

    /// Parses a `lib` record.
    fn parse_library(&mut self) {
        const IB_ID: InfoBits = 0x01;
        const IB_NAME: InfoBits = 0x02;
        const IB_REQUIRED: InfoBits = IB_ID | IB_NAME;

        let mut bits: InfoBits = 0;
        let mut id = 0u32;
        let mut name = String::new();

        self.next();

        loop {
            let kw = match self.tok {
                Token::Keyword(kw @ (Keyword::Id | Keyword::Name)) => kw,
                Token::Ident(_) | Token::Keyword(_) => {
                    self.unknown_keyword();
                    continue;
                }
                _ => break,
            };

            self.next();
            if !self.consume_equal() {
                return;
            }

            match kw {
                Keyword::Id => {
                    let Some(value) = self.id_const() else { return };
                    id = value;
                    bits |= IB_ID;
                }
                Keyword::Name => {
                    let Some(value) = self.str_const() else { return };
                    name = value;
                    bits |= IB_NAME;
                }
                _ => unreachable!(),
            }

            if self.tok != Token::Comma {
                break;
            }
            self.next();
        }

        if !self.end_of_record(bits, IB_REQUIRED) {
            return;
        }

        let info = LibInfo { id: LibId(id), name };
        self.raw.libraries.insert_expand(LibId(id), info);
    }

    /// Parses a `line` record.
    fn parse_line(&mut self) {
        const IB_COUNT: InfoBits = 0x01;
        const IB_FILE: InfoBits = 0x02;
        const IB_ID: InfoBits = 0x04;
        const IB_LINE: InfoBits = 0x08;
        const IB_SPAN: InfoBits = 0x20;
        const IB_TYPE: InfoBits = 0x40;
        const IB_REQUIRED: InfoBits = IB_FILE | IB_ID | IB_LINE;

        let mut bits: InfoBits = 0;
        let mut id = 0u32;
        let mut file = 0u32;
        let mut line = 0u64;
        let mut line_type = LineType::Asm;
        let mut count = 0u64;
        let mut spans: Vec<u32> = Vec::new();

        self.next();

        loop {
            let kw = match self.tok {
                Token::Keyword(
                    kw @ (Keyword::Count
                    | Keyword::File
                    | Keyword::Id
                    | Keyword::Line
                    | Keyword::Span
                    | Keyword::Type),
                ) => kw,
                Token::Ident(_) | Token::Keyword(_) => {
                    self.unknown_keyword();
                    continue;
                }
                _ => break,
            };

            self.next();
            if !self.consume_equal() {
                return;
            }

            match kw {
                Keyword::Count => {
                    let Some(value) = self.int_const() else { return };
                    count = value;
                    bits |= IB_COUNT;
                }
                Keyword::File => {
                    let Some(value) = self.id_const() else { return };
                    file = value;
                    bits |= IB_FILE;
                }
                Keyword::Id => {
                    let Some(value) = self.id_const() else { return };
                    id = value;
                    bits |= IB_ID;
                }
                Keyword::Line => {
                    let Some(value) = self.int_const() else { return };
                    line = value;
                    bits |= IB_LINE;
                }
                Keyword::Span => {
                    let Some(value) = self.id_list() else { return };
                    spans = value;
                    bits |= IB_SPAN;
                }
                Keyword::Type => {
                    let Some(value) = self.int_const() else { return };
                    line_type = match value {
                        0 => LineType::Asm,
                        1 => LineType::External,
                        2 => LineType::Macro,
                        _ => {
                            self.error_here("unknown value for attribute \"type\"");
                            self.skip_line();
                            return;
                        }
                    };
                    bits |= IB_TYPE;
                }
                _ => unreachable!(),
            }

            if self.tok != Token::Comma {
                break;
            }
            self.next();
        }

        if !self.end_of_record(bits, IB_REQUIRED) {
            return;
        }

        let info = LineInfo {
            id: LineId(id),
            file: FileId(file),
            line,
            line_type,
            count,
            spans: spans.into_iter().map(SpanId).collect(),
        };
        self.raw.lines.insert_expand(LineId(id), info);
    }

    /// Parses a `mod` record.
    fn parse_module(&mut self) {
        const IB_FILE: InfoBits = 0x01;
        const IB_ID: InfoBits = 0x02;
        const IB_NAME: InfoBits = 0x04;
        const IB_LIB: InfoBits = 0x08;
        const IB_REQUIRED: InfoBits = IB_ID | IB_NAME | IB_FILE;

        let mut bits: InfoBits = 0;
        let mut id = 0u32;
        let mut name = String::new();
        let mut file = 0u32;
        let mut library: Option<u32> = None;

        self.next();

        loop {
            let kw = match self.tok {
                Token::Keyword(
                    kw @ (Keyword::File | Keyword::Id | Keyword::Library | Keyword::Name),
                ) => kw,
                Token::Ident(_) | Token::Keyword(_) => {
                    self.unknown_keyword();
                    continue;
                }
                _ => break,
            };

            self.next();
            if !self.consume_equal() {
                return;
            }

            match kw {
                Keyword::File => {
                    let Some(value) = self.id_const() else { return };
                    file = value;
                    bits |= IB_FILE;
                }
                Keyword::Id => {
                    let Some(value) = self.id_const() else { return };
                    id = value;
                    bits |= IB_ID;
                }
                Keyword::Library => {
                    let Some(value) = self.id_const() else { return };
                    library = Some(value);
                    bits |= IB_LIB;
                }
                Keyword::Name => {
                    let Some(value) = self.str_const() else { return };
                    name = value;
                    bits |= IB_NAME;
                }
                _ => unreachable!(),
            }

            if self.tok != Token::Comma {
                break;
            }
            self.next();
        }

        if !self.end_of_record(bits, IB_REQUIRED) {
            return;
        }

        let info = ModInfo {
            id: ModId(id),
            name,
            file: FileId(file),
            library: library.map(LibId),
            main_scope: None,
            files: Vec::new(),
            scopes: Vec::new(),
        };
        self.raw.modules.insert_expand(ModId(id), info);
    }

    /// Parses a `scope` record.
    fn parse_scope(&mut self) {
        const IB_ID: InfoBits = 0x001;
        const IB_MOD: InfoBits = 0x002;
        const IB_NAME: InfoBits = 0x004;
        const IB_PARENT: InfoBits = 0x008;
        const IB_SIZE: InfoBits = 0x010;
        const IB_SPAN: InfoBits = 0x020;
        const IB_SYM: InfoBits = 0x040;
        const IB_TYPE: InfoBits = 0x080;
        const IB_REQUIRED: InfoBits = IB_ID | IB_MOD | IB_NAME;

        let mut bits: InfoBits = 0;
        let mut id = 0u32;
        let mut name = String::new();
        let mut scope_type = ScopeType::Module;
        let mut size = 0u64;
        let mut module = 0u32;
        let mut parent: Option<u32> = None;
        let mut label: Option<u32> = None;
        let mut spans: Vec<u32> = Vec::new();

        self.next();

        loop {
            let kw = match self.tok {
                Token::Keyword(
                    kw @ (Keyword::Id
                    | Keyword::Module
                    | Keyword::Name
                    | Keyword::Parent
                    | Keyword::Size
                    | Keyword::Span
                    | Keyword::Sym
                    | Keyword::Type),
                ) => kw,
                Token::Ident(_) | Token::Keyword(_) => {
                    self.unknown_keyword();
                    continue;
                }
                _ => break,
            };

            self.next();
            if !self.consume_equal() {
                return;
            }

            match kw {
                Keyword::Id => {
                    let Some(value) = self.id_const() else { return };
                    id = value;
                    bits |= IB_ID;
                }
                Keyword::Module => {
                    let Some(value) = self.id_const() else { return };
                    module = value;
                    bits |= IB_MOD;
                }
                Keyword::Name => {
                    let Some(value) = self.str_const() else { return };
                    name = value;
                    bits |= IB_NAME;
                }
                Keyword::Parent => {
                    let Some(value) = self.id_const() else { return };
                    parent = Some(value);
                    bits |= IB_PARENT;
                }
                Keyword::Size => {
                    let Some(value) = self.int_const() else { return };
                    size = value;
                    bits |= IB_SIZE;
                }
                Keyword::Span => {
                    let Some(value) = self.id_list() else { return };
                    spans = value;
                    bits |= IB_SPAN;
                }
                Keyword::Sym => {
                    let Some(value) = self.id_const() else { return };
                    label = Some(value);
                    bits |= IB_SYM;
                }
                Keyword::Type => {
                    scope_type = match self.tok {
                        Token::Keyword(Keyword::Global) => ScopeType::Global,
                        Token::Keyword(Keyword::File) => ScopeType::Module,
                        Token::Keyword(Keyword::Scope) => ScopeType::Scope,
                        Token::Keyword(Keyword::Struct) => ScopeType::Struct,
                        Token::Keyword(Keyword::Enum) => ScopeType::Enum,
                        _ => {
                            self.error_here("unknown value for attribute \"type\"");
                            self.skip_line();
                            return;
                        }
                    };
                    self.next();
                    bits |= IB_TYPE;
                }
                _ => unreachable!(),
            }

            if self.tok != Token::Comma {
                break;
            }
            self.next();
        }

        if !self.end_of_record(bits, IB_REQUIRED) {
            return;
        }

        let info = ScopeInfo {
            id: ScopeId(id),
            name,
            scope_type,
            size,
            module: ModId(module),
            parent: parent.map(ScopeId),
            label: label.map(SymId),
            spans: spans.into_iter().map(SpanId).collect(),
        };
        self.raw.scopes.insert_expand(ScopeId(id), info);
    }

    /// Parses a `seg` record.
    fn parse_segment(&mut self) {
        const IB_ADDRSIZE: InfoBits = 0x001;
        const IB_ID: InfoBits = 0x002;
        const IB_ONAME: InfoBits = 0x004;
        const IB_OOFFS: InfoBits = 0x008;
        const IB_NAME: InfoBits = 0x010;
        const IB_SIZE: InfoBits = 0x020;
        const IB_START: InfoBits = 0x040;
        const IB_TYPE: InfoBits = 0x080;
        const IB_REQUIRED: InfoBits =
            IB_ID | IB_NAME | IB_START | IB_SIZE | IB_ADDRSIZE | IB_TYPE;

        let mut bits: InfoBits = 0;
        let mut id = 0u32;
        let mut name = String::new();
        let mut start = 0u64;
        let mut size = 0u64;
        let mut output_name = String::new();
        let mut output_offs = 0u64;

        self.next();

        loop {
            let kw = match self.tok {
                Token::Keyword(
                    kw @ (Keyword::AddrSize
                    | Keyword::Id
                    | Keyword::Name
                    | Keyword::OutputName
                    | Keyword::OutputOffs
                    | Keyword::Size
                    | Keyword::Start
                    | Keyword::Type),
                ) => kw,
                Token::Ident(_) | Token::Keyword(_) => {
                    self.unknown_keyword();
                    continue;
                }
                _ => break,
            };

            self.next();
            if !self.consume_equal() {
                return;
            }

            match kw {
                Keyword::AddrSize => {
                    self.skip_attr_value();
                    bits |= IB_ADDRSIZE;
                }
                Keyword::Id => {
                    let Some(value) = self.id_const() else { return };
                    id = value;
                    bits |= IB_ID;
                }
                Keyword::Name => {
                    let Some(value) = self.str_const() else { return };
                    name = value;
                    bits |= IB_NAME;
                }
                Keyword::OutputName => {
                    let Some(value) = self.str_const() else { return };
                    output_name = value;
                    bits |= IB_ONAME;
                }
                Keyword::OutputOffs => {
                    let Some(value) = self.int_const() else { return };
                    output_offs = value;
                    bits |= IB_OOFFS;
                }
                Keyword::Size => {
                    let Some(value) = self.int_const() else { return };
                    size = value;
                    bits |= IB_SIZE;
                }
                Keyword::Start => {
                    let Some(value) = self.int_const() else { return };
                    start = value;
                    bits |= IB_START;
                }
                Keyword::Type => {
                    self.skip_attr_value();
                    bits |= IB_TYPE;
                }
                _ => unreachable!(),
            }

            if self.tok != Token::Comma {
                break;
            }
            self.next();
        }

        if !self.end_of_record(bits, IB_REQUIRED) {
            return;
        }

        let pair = bits & (IB_ONAME | IB_OOFFS);
        if pair != 0 && pair != (IB_ONAME | IB_OOFFS) {
            self.error_here("attributes \"oname\" and \"ooffs\" must be paired");
            return;
        }

        let output = if pair == (IB_ONAME | IB_OOFFS) {
            Some(OutputFile {
                name: output_name,
                offset: output_offs,
            })
        } else {
            None
        };

        let info = SegInfo {
            id: SegId(id),
            name,
            start,
            size,
            output,
        };
        self.raw.segments.insert_expand(SegId(id), info);
    }

    /// Parses a `span` record. The inclusive end address is derived from
    /// start and size during resolution, once the segment base is known.
    fn parse_span(&mut self) {
        const IB_ID: InfoBits = 0x01;
        const IB_SEG: InfoBits = 0x02;
        const IB_SIZE: InfoBits = 0x04;
        const IB_START: InfoBits = 0x08;
        const IB_REQUIRED: InfoBits = IB_ID | IB_SEG | IB_SIZE | IB_START;

        let mut bits: InfoBits = 0;
        let mut id = 0u32;
        let mut segment = 0u32;
        let mut start = 0u64;
        let mut size = 0u64;

        self.next();

        loop {
            let kw = match self.tok {
                Token::Keyword(
                    kw @ (Keyword::Id | Keyword::Segment | Keyword::Size | Keyword::Start),
                ) => kw,
                Token::Ident(_) | Token::Keyword(_) => {
                    self.unknown_keyword();
                    continue;
                }
                _ => break,
            };

            self.next();
            if !self.consume_equal() {
                return;
            }

            match kw {
                Keyword::Id => {
                    let Some(value) = self.id_const() else { return };
                    id = value;
                    bits |= IB_ID;
                }
                Keyword::Segment => {
                    let Some(value) = self.id_const() else { return };
                    segment = value;
                    bits |= IB_SEG;
                }
                Keyword::Size => {
                    let Some(value) = self.int_const() else { return };
                    size = value;
                    bits |= IB_SIZE;
                }
                Keyword::Start => {
                    let Some(value) = self.int_const() else { return };
                    start = value;
                    bits |= IB_START;
                }
                _ => unreachable!(),
            }

            if self.tok != Token::Comma {
                break;
            }
            self.next();
        }

        if !self.end_of_record(bits, IB_REQUIRED) {
            return;
        }

        let info = SpanInfo {
            id: SpanId(id),
            segment: SegId(segment),
            start,
            size,
            scopes: Vec::new(),
            lines: Vec::new(),
        };
        self.raw.spans.insert_expand(SpanId(id), info);
    }

    /// Parses a `sym` record.
    fn parse_sym(&mut self) {
        const IB_ADDRSIZE: InfoBits = 0x001;
        const IB_FILE: InfoBits = 0x002;
        const IB_ID: InfoBits = 0x004;
        const IB_PARENT: InfoBits = 0x008;
        const IB_SCOPE: InfoBits = 0x010;
        const IB_SEG: InfoBits = 0x020;
        const IB_SIZE: InfoBits = 0x040;
        const IB_NAME: InfoBits = 0x080;
        const IB_TYPE: InfoBits = 0x100;
        const IB_VALUE: InfoBits = 0x200;
        const IB_REQUIRED: InfoBits = IB_ADDRSIZE | IB_ID | IB_NAME | IB_TYPE | IB_VALUE;

        let mut bits: InfoBits = 0;
        let mut id = 0u32;
        let mut name = String::new();
        let mut sym_type = SymType::Equate;
        let mut value = 0i64;
        let mut size = 0u64;
        let mut segment: Option<u32> = None;
        let mut scope: Option<u32> = None;
        let mut parent: Option<u32> = None;

        self.next();

        loop {
            let kw = match self.tok {
                Token::Keyword(
                    kw @ (Keyword::AddrSize
                    | Keyword::File
                    | Keyword::Id
                    | Keyword::Name
                    | Keyword::Parent
                    | Keyword::Scope
                    | Keyword::Segment
                    | Keyword::Size
                    | Keyword::Type
                    | Keyword::Value),
                ) => kw,
                Token::Ident(_) | Token::Keyword(_) => {
                    self.unknown_keyword();
                    continue;
                }
                _ => break,
            };

            self.next();
            if !self.consume_equal() {
                return;
            }

            match kw {
                Keyword::AddrSize => {
                    self.skip_attr_value();
                    bits |= IB_ADDRSIZE;
                }
                Keyword::File => {
                    // Accepted for compatibility; the model does not keep
                    // a per-symbol file.
                    let Some(_) = self.id_const() else { return };
                    bits |= IB_FILE;
                }
                Keyword::Id => {
                    let Some(v) = self.id_const() else { return };
                    id = v;
                    bits |= IB_ID;
                }
                Keyword::Name => {
                    let Some(v) = self.str_const() else { return };
                    name = v;
                    bits |= IB_NAME;
                }
                Keyword::Parent => {
                    let Some(v) = self.id_const() else { return };
                    parent = Some(v);
                    bits |= IB_PARENT;
                }
                Keyword::Scope => {
                    let Some(v) = self.id_const() else { return };
                    scope = Some(v);
                    bits |= IB_SCOPE;
                }
                Keyword::Segment => {
                    let Some(v) = self.id_const() else { return };
                    segment = Some(v);
                    bits |= IB_SEG;
                }
                Keyword::Size => {
                    let Some(v) = self.int_const() else { return };
                    size = v;
                    bits |= IB_SIZE;
                }
                Keyword::Type => {
                    sym_type = match self.tok {
                        Token::Keyword(Keyword::Equate) => SymType::Equate,
                        Token::Keyword(Keyword::Label) => SymType::Label,
                        _ => {
                            self.error_here("unknown value for attribute \"type\"");
                            self.skip_line();
                            return;
                        }
                    };
                    self.next();
                    bits |= IB_TYPE;
                }
                Keyword::Value => {
                    let Some(v) = self.int_const() else { return };
                    value = v as i64;
                    bits |= IB_VALUE;
                }
                _ => unreachable!(),
            }

            if self.tok != Token::Comma {
                break;
            }
            self.next();
        }

        if !self.end_of_record(bits, IB_REQUIRED) {
            return;
        }

        // A symbol is located either directly by scope or indirectly via
        // a parent symbol, never both, never neither.
        let located = bits & (IB_SCOPE | IB_PARENT);
        if located == IB_SCOPE | IB_PARENT {
            self.error_here("attributes \"parent\" and \"scope\" must not both be set");
            return;
        }
        if located == 0 {
            self.error_here("one of \"parent\" and \"scope\" is required");
            return;
        }

        let info = SymInfo {
            id: SymId(id),
            name,
            sym_type,
            value,
            size,
            segment: segment.map(SegId),
            scope: scope.map(ScopeId),
            parent: parent.map(SymId),
        };
        self.raw.symbols.insert_expand(SymId(id), info);
    }
}

/// Grows a raw collection's capacity towards an `info` hint.
fn reserve_hint<I: dbg65_util::Idx, T>(
    vec: &mut dbg65_util::IndexVec<I, Option<T>>,
    total: usize,
) {
    vec.reserve(total.saturating_sub(vec.len()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbg65_util::Collector;

    fn parse_source(source: &str) -> (Result<RawDatabase, FatalError>, Collector) {
        let mut collector = Collector::new();
        let result = {
            let mut reporter = Reporter::new("test.dbg", &mut collector);
            parse(source, &mut reporter)
        };
        (result, collector)
    }

    fn parse_clean(source: &str) -> RawDatabase {
        let (result, collector) = parse_source(source);
        assert!(
            !collector.has_errors(),
            "unexpected errors: {:?}",
            collector.diagnostics()
        );
        result.expect("unexpected fatal error")
    }

    #[test]
    fn test_version_only() {
        let raw = parse_clean("version\tmajor=2,minor=0\n");
        assert_eq!(raw.major, 2);
        assert_eq!(raw.minor, 0);
        assert!(raw.files.is_empty());
        assert!(raw.symbols.is_empty());
    }

    #[test]
    fn test_missing_version_is_fatal() {
        let (result, collector) = parse_source("mod id=0,name=\"a\",file=0\n");
        assert_eq!(result, Err(FatalError::MissingVersion));
        assert!(collector.has_errors());
    }

    #[test]
    fn test_empty_input_is_fatal() {
        let (result, _) = parse_source("");
        assert_eq!(result, Err(FatalError::MissingVersion));
    }

    #[test]
    fn test_older_major_is_fatal() {
        let (result, collector) = parse_source("version major=1,minor=9\n");
        assert_eq!(
            result,
            Err(FatalError::UnsupportedVersion { major: 1, minor: 9 })
        );
        assert_eq!(collector.error_count(), 1);
    }

    #[test]
    fn test_newer_minor_warns() {
        let (result, collector) = parse_source("version major=2,minor=1\n");
        assert!(result.is_ok());
        assert!(!collector.has_errors());
        assert_eq!(collector.warning_count(), 1);
    }

    #[test]
    fn test_newer_major_warns() {
        let (result, collector) = parse_source("version major=3,minor=0\n");
        assert!(result.is_ok());
        assert!(!collector.has_errors());
        assert_eq!(collector.warning_count(), 1);
    }

    #[test]
    fn test_file_record() {
        let raw = parse_clean(
            "version major=2,minor=0\n\
             file id=0,name=\"main.s\",size=317,mtime=0x56789abc,mod=0+2\n",
        );
        let file = raw.files[FileId(0)].as_ref().unwrap();
        assert_eq!(file.name, "main.s");
        assert_eq!(file.size, 317);
        assert_eq!(file.mtime, 0x5678_9abc);
        assert_eq!(file.modules, vec![ModId(0), ModId(2)]);
        assert!(file.lines.is_empty());
    }

    #[test]
    fn test_library_record() {
        let raw = parse_clean(
            "version major=2,minor=0\n\
             lib id=1,name=\"c64.lib\"\n",
        );
        assert!(raw.libraries[LibId(0)].is_none());
        let lib = raw.libraries[LibId(1)].as_ref().unwrap();
        assert_eq!(lib.name, "c64.lib");
    }

    #[test]
    fn test_line_record_with_span_list() {
        let raw = parse_clean(
            "version major=2,minor=0\n\
             line id=3,file=0,line=42,type=2,count=1,span=0+5\n",
        );
        let line = raw.lines[LineId(3)].as_ref().unwrap();
        assert_eq!(line.file, FileId(0));
        assert_eq!(line.line, 42);
        assert_eq!(line.line_type, LineType::Macro);
        assert_eq!(line.count, 1);
        assert_eq!(line.spans, vec![SpanId(0), SpanId(5)]);
    }

    #[test]
    fn test_line_record_defaults() {
        let raw = parse_clean(
            "version major=2,minor=0\n\
             line id=0,file=0,line=7\n",
        );
        let line = raw.lines[LineId(0)].as_ref().unwrap();
        assert_eq!(line.line_type, LineType::Asm);
        assert_eq!(line.count, 0);
        assert!(line.spans.is_empty());
    }

    #[test]
    fn test_bad_line_type_is_error() {
        let (_, collector) = parse_source(
            "version major=2,minor=0\n\
             line id=0,file=0,line=7,type=9\n",
        );
        assert!(collector
            .diagnostics()
            .iter()
            .any(|d| d.message.contains("unknown value for attribute \"type\"")));
    }

    #[test]
    fn test_module_record() {
        let raw = parse_clean(
            "version major=2,minor=0\n\
             mod id=0,name=\"main\",file=0,lib=1\n",
        );
        let module = raw.modules[ModId(0)].as_ref().unwrap();
        assert_eq!(module.name, "main");
        assert_eq!(module.file, FileId(0));
        assert_eq!(module.library, Some(LibId(1)));
        assert_eq!(module.main_scope, None);
    }

    #[test]
    fn test_scope_record_types() {
        let raw = parse_clean(
            "version major=2,minor=0\n\
             scope id=0,mod=0,name=\"\",type=file,size=0x100\n\
             scope id=1,mod=0,name=\"Vec\",type=struct,parent=0,sym=4,span=1+2\n",
        );
        let main = raw.scopes[ScopeId(0)].as_ref().unwrap();
        assert_eq!(main.scope_type, ScopeType::Module);
        assert_eq!(main.parent, None);
        assert_eq!(main.size, 0x100);

        let nested = raw.scopes[ScopeId(1)].as_ref().unwrap();
        assert_eq!(nested.scope_type, ScopeType::Struct);
        assert_eq!(nested.parent, Some(ScopeId(0)));
        assert_eq!(nested.label, Some(SymId(4)));
        assert_eq!(nested.spans, vec![SpanId(1), SpanId(2)]);
    }

    #[test]
    fn test_bad_scope_type_keyword_is_error() {
        let (_, collector) = parse_source(
            "version major=2,minor=0\n\
             scope id=0,mod=0,name=\"\",type=ro\n",
        );
        assert!(collector.has_errors());
    }

    #[test]
    fn test_segment_record_with_output() {
        let raw = parse_clean(
            "version major=2,minor=0\n\
             seg id=0,name=\"CODE\",start=0x8000,size=0x1000,addrsize=abs,type=ro,\
             oname=\"prog.bin\",ooffs=0x10\n",
        );
        let seg = raw.segments[SegId(0)].as_ref().unwrap();
        assert_eq!(seg.name, "CODE");
        assert_eq!(seg.start, 0x8000);
        assert_eq!(seg.size, 0x1000);
        let output = seg.output.as_ref().unwrap();
        assert_eq!(output.name, "prog.bin");
        assert_eq!(output.offset, 0x10);
    }

    #[test]
    fn test_segment_record_without_output() {
        let raw = parse_clean(
            "version major=2,minor=0\n\
             seg id=0,name=\"BSS\",start=0x200,size=0x80,addrsize=abs,type=rw\n",
        );
        assert!(raw.segments[SegId(0)].as_ref().unwrap().output.is_none());
    }

    #[test]
    fn test_segment_unpaired_output_is_error() {
        let (_, collector) = parse_source(
            "version major=2,minor=0\n\
             seg id=0,name=\"CODE\",start=0,size=1,addrsize=abs,type=ro,oname=\"x\"\n",
        );
        assert!(collector
            .diagnostics()
            .iter()
            .any(|d| d.message.contains("must be paired")));
    }

    #[test]
    fn test_segment_tolerates_unknown_addrsize_spelling() {
        // Newer writers spell out "absolute"; the value is not
        // interpreted, so this must stay clean.
        let raw = parse_clean(
            "version major=2,minor=0\n\
             seg id=0,name=\"CODE\",start=0,size=1,addrsize=absolute,type=ro\n",
        );
        assert!(raw.segments[SegId(0)].is_some());
    }

    #[test]
    fn test_span_record() {
        let raw = parse_clean(
            "version major=2,minor=0\n\
             span id=2,seg=0,start=0x10,size=4\n",
        );
        let span = raw.spans[SpanId(2)].as_ref().unwrap();
        assert_eq!(span.segment, SegId(0));
        assert_eq!(span.start, 0x10);
        assert_eq!(span.size, 4);
        assert!(span.scopes.is_empty());
        assert!(span.lines.is_empty());
    }

    #[test]
    fn test_sym_record() {
        let raw = parse_clean(
            "version major=2,minor=0\n\
             sym id=0,name=\"_main\",addrsize=abs,type=lab,val=0x8000,seg=0,scope=0,size=2\n",
        );
        let sym = raw.symbols[SymId(0)].as_ref().unwrap();
        assert_eq!(sym.name, "_main");
        assert_eq!(sym.sym_type, SymType::Label);
        assert_eq!(sym.value, 0x8000);
        assert_eq!(sym.segment, Some(SegId(0)));
        assert_eq!(sym.scope, Some(ScopeId(0)));
        assert_eq!(sym.parent, None);
        assert_eq!(sym.size, 2);
    }

    #[test]
    fn test_sym_with_parent_only() {
        let raw = parse_clean(
            "version major=2,minor=0\n\
             sym id=1,name=\"@loop\",addrsize=abs,type=lab,val=3,parent=0\n",
        );
        let sym = raw.symbols[SymId(1)].as_ref().unwrap();
        assert_eq!(sym.parent, Some(SymId(0)));
        assert_eq!(sym.scope, None);
    }

    #[test]
    fn test_sym_scope_and_parent_is_error() {
        let (_, collector) = parse_source(
            "version major=2,minor=0\n\
             sym id=0,name=\"s\",addrsize=abs,type=lab,val=0,scope=0,parent=1\n",
        );
        assert_eq!(collector.error_count(), 1);
        assert!(collector.diagnostics()[0]
            .message
            .contains("must not both be set"));
    }

    #[test]
    fn test_sym_without_scope_or_parent_is_error() {
        let (_, collector) = parse_source(
            "version major=2,minor=0\n\
             sym id=0,name=\"s\",addrsize=abs,type=lab,val=0\n",
        );
        assert!(collector
            .diagnostics()
            .iter()
            .any(|d| d.message.contains("one of \"parent\" and \"scope\"")));
    }

    #[test]
    fn test_sym_negative_value_wraps_to_signed() {
        // Equates may be negative; the producer writes them as the
        // two's complement bit pattern.
        let raw = parse_clean(
            "version major=2,minor=0\n\
             sym id=0,name=\"NEG\",addrsize=abs,type=equ,val=0xffffffffffffffff,scope=0\n",
        );
        assert_eq!(raw.symbols[SymId(0)].as_ref().unwrap().value, -1);
    }

    #[test]
    fn test_unknown_attribute_is_tolerated() {
        let (result, collector) = parse_source(
            "version major=2,minor=0\n\
             file id=0,name=\"x\",size=1,mtime=0,mod=0,futurething=42\n",
        );
        let raw = result.unwrap();
        assert!(!collector.has_errors());
        assert_eq!(collector.warning_count(), 1);
        assert!(collector.diagnostics()[0]
            .message
            .contains("unknown keyword \"futurething\""));
        assert!(raw.files[FileId(0)].is_some());
    }

    #[test]
    fn test_unknown_attribute_mid_line_is_tolerated() {
        let (result, collector) = parse_source(
            "version major=2,minor=0\n\
             file id=0,futurething=42,name=\"x\",size=1,mtime=0,mod=0\n",
        );
        let raw = result.unwrap();
        assert!(
            !collector.has_errors(),
            "errors: {:?}",
            collector.diagnostics()
        );
        assert_eq!(collector.warning_count(), 1);
        let file = raw.files[FileId(0)].as_ref().unwrap();
        assert_eq!(file.name, "x");
    }

    #[test]
    fn test_unknown_record_is_tolerated() {
        let (result, collector) = parse_source(
            "version major=2,minor=0\n\
             csym id=0,name=\"c\",scope=0,type=0\n\
             lib id=0,name=\"a.lib\"\n",
        );
        let raw = result.unwrap();
        assert!(!collector.has_errors());
        assert_eq!(collector.warning_count(), 1);
        assert!(raw.libraries[LibId(0)].is_some());
    }

    #[test]
    fn test_missing_required_attribute() {
        let (_, collector) = parse_source(
            "version major=2,minor=0\n\
             lib id=0\n",
        );
        assert_eq!(collector.error_count(), 1);
        assert!(collector.diagnostics()[0]
            .message
            .contains("required attributes missing"));
    }

    #[test]
    fn test_error_recovery_continues_with_next_line() {
        let (result, collector) = parse_source(
            "version major=2,minor=0\n\
             lib id=0\n\
             lib id=1,name=\"ok.lib\"\n",
        );
        let raw = result.unwrap();
        assert_eq!(collector.error_count(), 1);
        assert!(raw.libraries[LibId(1)].is_some());
    }

    #[test]
    fn test_unterminated_string_resynchronises() {
        let (result, collector) = parse_source(
            "version major=2,minor=0\n\
             mod id=0,name=\"oops\n\
             lib id=0,name=\"fine.lib\"\n",
        );
        let raw = result.unwrap();
        assert!(collector
            .diagnostics()
            .iter()
            .any(|d| d.message.contains("unterminated string")));
        // The next line still parses.
        assert!(raw.libraries[LibId(0)].is_some());
    }

    #[test]
    fn test_info_record_reserves() {
        let raw = parse_clean(
            "version major=2,minor=0\n\
             info file=10,lib=2,line=100,mod=3,scope=7,seg=4,span=50,sym=20\n",
        );
        assert!(raw.files.capacity() >= 10);
        assert!(raw.spans.capacity() >= 50);
        assert!(raw.symbols.capacity() >= 20);
        // Hints do not create records.
        assert!(raw.files.is_empty());
    }

    #[test]
    fn test_out_of_order_ids_leave_holes() {
        let raw = parse_clean(
            "version major=2,minor=0\n\
             lib id=2,name=\"c.lib\"\n\
             lib id=0,name=\"a.lib\"\n",
        );
        assert_eq!(raw.libraries.len(), 3);
        assert!(raw.libraries[LibId(0)].is_some());
        assert!(raw.libraries[LibId(1)].is_none());
        assert!(raw.libraries[LibId(2)].is_some());
    }

    #[test]
    fn test_duplicate_id_replaces() {
        let raw = parse_clean(
            "version major=2,minor=0\n\
             lib id=0,name=\"first\"\n\
             lib id=0,name=\"second\"\n",
        );
        assert_eq!(raw.libraries.len(), 1);
        assert_eq!(raw.libraries[LibId(0)].as_ref().unwrap().name, "second");
    }

    #[test]
    fn test_extra_tokens_in_line() {
        let (_, collector) = parse_source(
            "version major=2,minor=0\n\
             lib id=0,name=\"a\" 17\n",
        );
        assert!(collector.has_errors());
    }

    #[test]
    fn test_version_not_allowed_later() {
        let (_, collector) = parse_source(
            "version major=2,minor=0\n\
             version major=2,minor=0\n",
        );
        assert!(collector.has_errors());
    }
}
