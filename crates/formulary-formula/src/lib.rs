//! # formulary-formula
//!
//! Lossless processing of spreadsheet formula text.
//!
//! - `tokenizer`: splits formula text into tokens whose concatenation is the input
//! - `parser`: builds a concrete syntax tree of plain tokens and function calls
//! - `refactor`: renames identifiers while respecting `LET` / `LAMBDA` scopes
//!
//! None of these stages fail: malformed input degrades to a best-effort
//! pass-through, so rewriting one formula never corrupts unrelated text.

pub mod parser;
pub mod refactor;
pub mod tokenizer;

pub use parser::{parse, serialize, FunctionCall, Node, Parser};
pub use refactor::{refactor, RenameMap, Renamer, Scope};
pub use tokenizer::{reconstruct, tokenize, Lexer, Token, TokenKind};
