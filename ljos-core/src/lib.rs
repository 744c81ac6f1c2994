//! Core compiler for the Ljos language.
//!
//! The pipeline is roughly:
//!
//!   source .lj
//!     -> lexer      (tokens)
//!     -> parser     (AST)
//!     -> module_graph (import validation)
//!     -> typecheck  (types + diagnostics)
//!     -> codegen_js | codegen_native
//!
//! The CLI and any other front end should depend on this crate rather
//! than reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod span;
pub mod diagnostic;
pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing and parsing
// ---------------------------------------------------------------------

pub mod lexer;
pub mod parser;
pub mod ast;

// ---------------------------------------------------------------------
// Semantic layers: types and checking
// ---------------------------------------------------------------------

pub mod types;
pub mod typecheck;

// ---------------------------------------------------------------------
// Builtins, stdlib and modules
// ---------------------------------------------------------------------

pub mod builtins;
pub mod stdlib;
pub mod module_graph;
pub mod config;

// ---------------------------------------------------------------------
// Back-end: code generation and compiler orchestration
// ---------------------------------------------------------------------

pub mod codegen_js;
pub mod codegen_native;
pub mod compiler;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use compiler::{CompileResult, Compiler};
pub use config::{CompilerOptions, ModuleKind, Prelude, Target, load_config};
pub use diagnostic::{Diagnostic, Severity};
pub use error::CoreError;
