//! SparkleCode: a small dynamically-typed, class-based scripting language
//! with a tree-walking interpreter.
//!
//! Pipeline: [`scanner`] → [`parser`] → [`resolver`] → [`interpreter`],
//! driven per source unit by [`session::Session`].

pub mod ast;
pub mod ast_printer;
pub mod callable;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod session;
pub mod token;
pub mod value;

pub use error::{Diagnostics, Result, RunError, SparkleError};
pub use session::Session;
