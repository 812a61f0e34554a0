//! One interpreter session: the whole pipeline for each source unit.
//!
//! A session owns the interpreter (and with it the globals) plus the
//! expression-id counter, so a REPL can feed it one line at a time and
//! closures defined on earlier lines keep working.  Each call to [`Session::run`]
//! ends in one of three ways:
//!
//! * `Ok(())`: clean success;
//! * `Err(RunError::Static(_))`: lexical, syntax or resolution errors were
//!   found and nothing was executed;
//! * `Err(RunError::Runtime(_))`: execution stopped at the first runtime
//!   error, after whatever side effects came before it.

use std::collections::HashSet;
use std::io::{self, Write};

use log::{debug, info};

use crate::ast::Stmt;
use crate::callable::Callable;
use crate::error::{Diagnostics, RunError};
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::scan_tokens;
use crate::value::Value;

/// Scan and parse `source` on its own, e.g. for the AST dump.
pub fn parse_source(source: &str) -> Result<Vec<Stmt>, Diagnostics> {
    let mut diagnostics = Diagnostics::new();

    let tokens = scan_tokens(source, &mut diagnostics);
    let statements = Parser::new(&tokens).parse(&mut diagnostics);

    if diagnostics.has_errors() {
        Err(diagnostics)
    } else {
        Ok(statements)
    }
}

pub struct Session<W: Write = io::Stdout> {
    interpreter: Interpreter<W>,
    next_id: usize,
    /// Globals assigned to by any unit so far.
    reassigned: HashSet<String>,
}

impl Session<io::Stdout> {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Session<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Session<W> {
    pub fn with_output(out: W) -> Self {
        Self {
            interpreter: Interpreter::with_output(out),
            next_id: 0,
            reassigned: HashSet::new(),
        }
    }

    /// Everything printed so far.
    pub fn output(&self) -> &W {
        self.interpreter.output()
    }

    pub fn into_output(self) -> W {
        self.interpreter.into_output()
    }

    /// Run one source unit (a file, or one REPL line).
    pub fn run(&mut self, source: &str) -> Result<(), RunError> {
        let statements = self.front_end(source)?;

        self.interpreter
            .interpret(&statements)
            .map_err(RunError::Runtime)
    }

    /// Like [`run`](Self::run), but a line that is exactly one expression
    /// statement has its value printed.
    pub fn run_repl_line(&mut self, line: &str) -> Result<(), RunError> {
        let statements = self.front_end(line)?;

        if let [Stmt::Expression(expr)] = statements.as_slice() {
            debug!("Echoing REPL expression");

            let value = self.interpreter.evaluate(expr).map_err(RunError::Runtime)?;
            return self
                .interpreter
                .print_value(&value)
                .map_err(RunError::Runtime);
        }

        self.interpreter
            .interpret(&statements)
            .map_err(RunError::Runtime)
    }

    /// Scan, parse and resolve.  The resolver only runs on a clean parse.
    fn front_end(&mut self, source: &str) -> Result<Vec<Stmt>, RunError> {
        let mut diagnostics = Diagnostics::new();

        let tokens = scan_tokens(source, &mut diagnostics);

        let mut parser = Parser::starting_at(&tokens, self.next_id);
        let statements = parser.parse(&mut diagnostics);
        self.next_id = parser.next_id();

        if diagnostics.has_errors() {
            info!("Front end stopped after parsing: {} error(s)", diagnostics.len());
            return Err(RunError::Static(diagnostics));
        }

        let globals = self.interpreter.globals();
        let known: Vec<(String, bool)> = globals
            .borrow()
            .entries()
            .map(|(name, value)| {
                let is_class = matches!(value, Some(Value::Callable(Callable::Class(_))));
                (name.to_string(), is_class)
            })
            .collect();

        let resolution = Resolver::new(&mut diagnostics)
            .with_globals(known)
            .with_reassigned(self.reassigned.iter().cloned())
            .run(&statements);

        if diagnostics.has_errors() {
            info!("Front end stopped after resolving: {} error(s)", diagnostics.len());
            return Err(RunError::Static(diagnostics));
        }

        self.reassigned = resolution.reassigned;
        self.interpreter.resolve(resolution.locals);

        Ok(statements)
    }
}
