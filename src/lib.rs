//! # Introduction
//!
//! cppscan reads C++ headers and sources and reports what they declare:
//! includes, macros, namespaces, classes, enums, functions, methods and
//! variables. It is a best-effort scanner, not a compiler front end; code it
//! does not understand is skipped or kept as raw tokens.
//!
//! ## Pipeline
//!
//! ```text
//! Source → Lexer → Tokens → Builder → Nodes
//! ```
//!
//! 1. [`parser::lexer`] splits source text into classified tokens with byte
//!    spans and suppresses `#if 0` blocks.
//! 2. [`parser::parse::Builder`] pulls tokens and yields one top-level
//!    [`parser::ast::Node`] at a time. Class bodies come back as nested nodes.
//! 3. [`batch`] runs the builder over many files, isolating failures per file.
//!
//! ## Collaborators
//!
//! Header classification needs to know which search directory holds a file.
//! That question goes through the [`source::SourceFiles`] trait so the
//! builder itself performs no I/O.
//!
//! ```
//! use cppscan::parser::{Builder, Node};
//!
//! let nodes: Vec<Node> = Builder::new("namespace app { int run(); }", "main.cc")
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(nodes[0].full_name().as_deref(), Some("app::run"));
//! ```

pub mod batch;
pub mod options;
pub mod parser;
pub mod source;

pub use batch::{parse_files, parse_source, FileError, ParsedFile};
pub use options::BuildOptions;
pub use source::{FileSystem, InMemoryFiles, SourceFiles};
