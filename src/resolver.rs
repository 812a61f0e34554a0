//! Static resolver pass for the **SparkleCode** interpreter.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (stack of `HashMap<String, Binding>` tracking
//!    declared/defined).
//! 2. Report static errors (redeclaration, read in own initializer, invalid
//!    `return`, `this`/`super` misuse, bad superclass) into [`Diagnostics`],
//!    continuing past each one.
//! 3. Record, for *each* variable/`this`/`super` occurrence that is not a
//!    global, how many scopes separate it from its declaration.  The result is
//!    the [`Locals`] side table the interpreter reads; anything absent from it
//!    is looked up in the globals.
//!
//! Scopes opened here mirror the environments the interpreter creates one for
//! one: blocks, function calls, the `this` binding of bound methods, and the
//! `super` binding of subclass bodies.

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::callable::INITIALIZER;
use crate::error::{Diagnostics, SparkleError};
use crate::token::Token;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Resolver output: expression identity → number of enclosing environments to
/// walk.
pub type Locals = HashMap<ExprId, usize>;

/// Everything one pass produces besides diagnostics.
#[derive(Debug, Default)]
pub struct Resolution {
    pub locals: Locals,
    pub reassigned: HashSet<String>,
}

/// What kind of function body we are in.  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

/// What kind of class body we are in.  Used to validate `this` / `super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Per-name state inside one scope.
#[derive(Copy, Clone, Debug)]
struct Binding {
    /// `false` between declaration and the end of its initializer.
    defined: bool,

    /// Declared by a `class` statement.
    class: bool,
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances for locals.
pub struct Resolver<'d> {
    scopes: Vec<HashMap<String, Binding>>,
    locals: Locals,
    current_function: FunctionType,
    current_class: ClassType,
    /// Names declared at top level, this pass or an earlier one, and whether
    /// the latest declaration of each was a class.
    globals: HashMap<String, bool>,
    /// Globals assigned to somewhere; their kind is only known at runtime.
    reassigned: HashSet<String>,
    diagnostics: &'d mut Diagnostics,
}

impl<'d> Resolver<'d> {
    /// Create a new resolver reporting into `diagnostics`.
    pub fn new(diagnostics: &'d mut Diagnostics) -> Self {
        info!("Resolver instantiated");

        Resolver {
            scopes: Vec::new(),
            locals: Locals::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            globals: HashMap::new(),
            reassigned: HashSet::new(),
            diagnostics,
        }
    }

    /// Seed the globals already bound by earlier source units, each flagged
    /// with whether it currently holds a class.
    pub fn with_globals<I>(mut self, globals: I) -> Self
    where
        I: IntoIterator<Item = (String, bool)>,
    {
        self.globals.extend(globals);
        self
    }

    /// Seed the globals that code from earlier source units assigns to.
    pub fn with_reassigned<I>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.reassigned.extend(names);
        self
    }

    /// Walk all top‑level statements and hand back the distance table.
    pub fn resolve(self, statements: &[Stmt]) -> Locals {
        self.run(statements).locals
    }

    /// Like [`resolve`](Self::resolve), also returning every global assigned
    /// to so far, for seeding the next source unit.
    pub fn run(mut self, statements: &[Stmt]) -> Resolution {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        info!("Resolved {} local reference(s)", self.locals.len());

        Resolution {
            locals: self.locals,
            reassigned: self.reassigned,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                for s in statements {
                    self.resolve_stmt(s);
                }
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }
                self.define(name);
            }

            Stmt::Function(decl) => {
                // name is visible *inside* its own body for recursion
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(decl, FunctionType::Function);
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "Can't return from top-level code.");
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(expr);
                }
            }
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) {
        debug!("Resolving class '{}'", name.lexeme);

        self.declare(name);
        self.define_class(name);

        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        if let Some(superclass) = superclass {
            if let Expr::Variable {
                name: super_name, ..
            } = superclass
            {
                let is_class: Option<bool> = match self.lookup(&super_name.lexeme) {
                    Some(binding) => Some(binding.class),
                    // Outside any function, top-level declarations have all
                    // run, in order, by the time this class statement does.
                    None if self.current_function == FunctionType::None
                        && !self.reassigned.contains(&super_name.lexeme) =>
                    {
                        self.globals.get(&super_name.lexeme).copied()
                    }
                    None => None,
                };

                if super_name.lexeme == name.lexeme {
                    self.error(super_name, "A class can't inherit from itself.");
                } else if is_class == Some(false) {
                    self.error(super_name, "Superclass must be a class.");
                }
            }

            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass);

            self.begin_scope();
            self.insert_defined("super");
        }

        self.begin_scope();
        self.insert_defined("this");

        for method in methods {
            let kind = if method.name.lexeme == INITIALIZER {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(method, kind);
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => self.resolve_expr(inner),

            Expr::Unary { right, .. } => self.resolve_expr(right),

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable { id, name } => {
                let uninitialized: bool = self
                    .scopes
                    .last()
                    .and_then(|scope| scope.get(&name.lexeme))
                    .is_some_and(|binding| !binding.defined);

                if uninitialized {
                    // The initializer sees the binding this declaration
                    // shadows, if there is one.
                    if !self.resolve_shadowed(*id, name) {
                        self.error(name, "Can't read local variable in its own initializer.");
                    }
                    return;
                }

                self.resolve_local(*id, name);
            }

            Expr::Assign { id, name, value } => {
                self.resolve_expr(value);
                self.resolve_local(*id, name);

                if self.lookup(&name.lexeme).is_none() {
                    self.reassigned.insert(name.lexeme.clone());
                }
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(object);
                self.resolve_expr(value);
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Can't use 'this' outside of a class.");
                    return;
                }

                self.resolve_local(*id, keyword);
            }

            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.error(keyword, "Can't use 'super' outside of a class.");
                        return;
                    }
                    ClassType::Class => {
                        self.error(keyword, "Can't use 'super' in a class with no superclass.");
                        return;
                    }
                    ClassType::Subclass => {}
                }

                self.resolve_local(*id, keyword);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function’s parameters + body.
    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionType) {
        let enclosing = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }
        for stmt in &decl.body {
            self.resolve_stmt(stmt);
        }
        self.end_scope();

        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        let duplicate: bool = match self.scopes.last_mut() {
            Some(scope) => {
                let seen = scope.contains_key(&name.lexeme);
                scope.insert(
                    name.lexeme.clone(),
                    Binding {
                        defined: false,
                        class: false,
                    },
                );
                seen
            }
            None => {
                // Globals may be redeclared.
                if self.globals.insert(name.lexeme.clone(), false).is_some() {
                    warn!("Global '{}' redeclared on line {}", name.lexeme, name.line);
                }
                false
            }
        };

        if duplicate {
            self.error(name, "Already a variable with this name in this scope.");
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(binding) = self
            .scopes
            .last_mut()
            .and_then(|scope| scope.get_mut(&name.lexeme))
        {
            binding.defined = true;
        }
    }

    fn define_class(&mut self, name: &Token) {
        match self.scopes.last_mut() {
            Some(scope) => {
                if let Some(binding) = scope.get_mut(&name.lexeme) {
                    binding.defined = true;
                    binding.class = true;
                }
            }
            None => {
                self.globals.insert(name.lexeme.clone(), true);
            }
        }
    }

    /// Bind a synthetic name (`this`, `super`) in the innermost scope.
    fn insert_defined(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(
                name.to_string(),
                Binding {
                    defined: true,
                    class: false,
                },
            );
        }
    }

    /// Innermost local binding for `name`, if any.
    fn lookup(&self, name: &str) -> Option<Binding> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at depth `d`, or leave it out of the
    /// table (global) if no scope declares it.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                self.locals.insert(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }

    /// Resolve `name` skipping the innermost scope.  `false` when no outer
    /// scope and no known global declares it.
    fn resolve_shadowed(&mut self, id: ExprId, name: &Token) -> bool {
        let inner: usize = self.scopes.len().saturating_sub(1);

        for (depth, scope) in self.scopes[..inner].iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                debug!("Resolved shadowed '{}' at depth {}", name.lexeme, depth + 1);
                self.locals.insert(id, depth + 1);
                return true;
            }
        }

        self.globals.contains_key(&name.lexeme)
    }

    fn error(&mut self, token: &Token, message: &str) {
        self.diagnostics
            .report(SparkleError::resolve(token, message));
    }
}
