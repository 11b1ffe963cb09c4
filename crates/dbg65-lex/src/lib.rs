//! dbg65-lex - Scanner for the textual debug info format.
//!
//! The input format is line oriented: one record per physical line, each
//! record a keyword followed by comma-separated `attr=value` pairs.
//! The scanner turns the raw text into a token stream of
//!
//! - end-of-line and end-of-file terminators (newlines are significant,
//!   all other whitespace is skipped),
//! - the punctuation `=`, `,`, `+`, `-`,
//! - integer constants (decimal, octal with a leading `0`, hex with a
//!   leading `0x`),
//! - double-quoted string constants without escape processing,
//! - keywords from a fixed, sorted table, and
//! - generic identifiers for everything else, so that files written by a
//!   newer producer still scan cleanly and the parser can skip what it
//!   does not understand.
//!
//! Lexical errors (an invalid character, an unterminated string) are
//! reported through the caller's diagnostic reporter; the scanner then
//! resumes, it never gives up on the rest of the input.
//!
//! # Example
//!
//! ```
//! use dbg65_lex::{Keyword, Lexer, Token};
//! use dbg65_util::{Collector, Reporter};
//!
//! let mut collector = Collector::new();
//! let mut reporter = Reporter::new("a.dbg", &mut collector);
//! let mut lexer = Lexer::new("mod id=0,name=\"a\"");
//!
//! assert_eq!(lexer.next_token(&mut reporter), Token::Keyword(Keyword::Module));
//! assert_eq!(lexer.next_token(&mut reporter), Token::Keyword(Keyword::Id));
//! assert_eq!(lexer.next_token(&mut reporter), Token::Eq);
//! assert_eq!(lexer.next_token(&mut reporter), Token::Int(0));
//! ```

pub mod cursor;
mod edge_cases;
pub mod scanner;
pub mod token;

pub use cursor::Cursor;
pub use scanner::Lexer;
pub use token::{Keyword, Token};
