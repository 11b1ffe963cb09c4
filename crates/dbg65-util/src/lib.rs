//! dbg65-util - Foundation types for the dbg65 debug info reader.
//!
//! This crate provides the two building blocks every other dbg65 crate
//! rests on:
//!
//! - [`diagnostic`]: severity levels, the [`DiagnosticSink`] callback
//!   contract, a collecting sink for tests and batch consumers, and the
//!   [`Reporter`] that stamps every message with the input file name and
//!   the position of the offending token.
//! - [`index_vec`]: [`IndexVec`], a vector indexed by a typed id. Debug
//!   info records carry dense numeric ids assigned by the producer, and
//!   every cross-reference in the model is such an id. Typed indices make
//!   it impossible to look up a scope id in the symbol table by accident.
//!
//! Nothing in here knows about the debug info file format itself.

pub mod diagnostic;
pub mod index_vec;

pub use diagnostic::{Collector, Diagnostic, DiagnosticSink, FnSink, Reporter, Severity};
pub use index_vec::{Idx, IndexVec};
