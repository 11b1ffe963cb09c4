//! Edge case tests for dbg65-par.
