//! JavaScript parser
//!
//! Source text is tokenized by the lexer and turned into a syntax tree by a
//! recursive descent parser. The evaluator walks the tree directly.

pub mod ast;
pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;

// Re-exports
pub use lexer::{Lexer, Token};
pub use parser::{ParseError, parse_program};
