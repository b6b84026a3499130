//! C++ declaration scanner
//!
//! This module turns C++ source text into a flat list of declaration-level
//! nodes:
//! - [`lexer`]: Tokenization (source text → tokens)
//! - [`keywords`]: Keyword classification
//! - [`parse`]: The [`Builder`] (tokens → nodes) and its error types
//! - [`ast`]: Node definitions
//! - [`types`]: Conversion of token runs into types and parameters
//!
//! # Scope
//!
//! The builder recognizes what a header declares, not what code does:
//! - Includes, defines, namespaces, using-declarations and typedefs
//! - Classes, structs, unions and enums with their members and bases
//! - Functions, methods, constructors, destructors and operators
//! - Variables, including function pointers
//! - Function bodies are kept as flat token runs and never parsed
//!
//! # Builder Implementation
//!
//! Hand-written heuristic recursive descent over a lazy token stream with a
//! pushback queue. The builder does not recover from errors: the first
//! failure ends the file.

pub mod ast;
mod classes;
mod declarations;
mod directives;
mod handlers;
pub mod keywords;
pub mod lexer;
pub mod parse;
pub mod types;

pub use ast::*;
pub use lexer::{line_number, LexError, Lexer, Token, TokenKind};
pub use parse::{Builder, Error, ParseError};
