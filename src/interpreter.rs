//! Tree-walking evaluator.
//!
//! Statements execute against a chain of [`Environment`]s that mirrors, hop
//! for hop, the scopes the resolver saw.  Every statement returns a [`Flow`]
//! so a `return` can unwind to the nearest call boundary without any
//! unwinding machinery; runtime errors travel as `Err` and abort the run.
//!
//! Evaluation recurses on the host stack.  Deep user recursion (or deeply
//! nested source) eventually overflows it; that is a resource-exhaustion
//! crash, not a language error.

use std::cell::RefCell;
use std::io::{self, Write};
use std::mem;
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};

use crate::ast::{Expr, ExprId, LiteralValue, Stmt};
use crate::callable::{Callable, Class, Function, Instance, NativeFunction, INITIALIZER};
use crate::environment::{EnvRef, Environment};
use crate::error::{Result, SparkleError};
use crate::resolver::Locals;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// How control leaves a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Fell off the end; continue with the next statement.
    Normal,

    /// A `return` is unwinding to the enclosing call.
    Return(Value),
}

/// The tree-walking interpreter.  `print` output goes to `out`.
///
/// `locals` accumulates the side tables of every source unit run so far and
/// is never pruned: a closure from an earlier REPL line still looks its
/// variables up by the ids that line was resolved with.
pub struct Interpreter<W: Write = io::Stdout> {
    globals: EnvRef,
    environment: EnvRef,
    locals: Locals,
    out: W,
    /// Resolved accesses replayed as a plain outward name lookup.
    #[cfg(test)]
    chain_checks: Vec<ChainCheck>,
}

#[cfg(test)]
#[derive(Debug)]
struct ChainCheck {
    name: String,
    line: usize,
    agrees: bool,
}

impl Interpreter<io::Stdout> {
    /// Interpreter printing to standard output.
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Interpreter<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Interpreter<W> {
    /// Creates a new Interpreter writing to `out` and defines the native
    /// functions.
    pub fn with_output(out: W) -> Self {
        info!("Initializing Interpreter");

        let globals: EnvRef = Environment::new().into_ref();

        debug!("Defining native function 'clock'");

        globals.borrow_mut().define(
            "clock",
            Value::Callable(Callable::Native(Rc::new(NativeFunction {
                name: "clock",
                arity: 0,
                func: |_args: &[Value]| {
                    let millis: i64 = Utc::now().timestamp_millis();
                    Ok(Value::Number(millis as f64 / 1000.0))
                },
            }))),
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: Locals::new(),
            out,
            #[cfg(test)]
            chain_checks: Vec::new(),
        }
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub fn globals(&self) -> EnvRef {
        Rc::clone(&self.globals)
    }

    /// Merge a resolver side table.  Ids never collide across source units of
    /// one session, so earlier entries stay valid for earlier closures.
    pub fn resolve(&mut self, locals: Locals) {
        debug!("Absorbing {} resolved local(s)", locals.len());

        self.locals.extend(locals);
    }

    /// Runs a program, stopping at the first runtime error.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        info!("Interpreting {} statement(s)", statements.len());

        for stmt in statements {
            self.execute(stmt)?;
        }

        self.out.flush()?;

        info!("Interpretation completed successfully");

        Ok(())
    }

    /// Write a value the way `print` does.
    pub fn print_value(&mut self, value: &Value) -> Result<()> {
        writeln!(self.out, "{}", value)?;

        Ok(())
    }

    // ───────────────────────────── statements ──────────────────────────────

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;
                debug!("Printing value: {}", value);
                self.print_value(&value)?;
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}'", name.lexeme);
                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let env: EnvRef =
                    Environment::with_enclosing(Rc::clone(&self.environment)).into_ref();
                self.execute_block(statements, env)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.name.lexeme);

                let function = Function::new(Rc::clone(decl), Rc::clone(&self.environment), false);
                self.environment.borrow_mut().define(
                    &decl.name.lexeme,
                    Value::Callable(Callable::Function(Rc::new(function))),
                );
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                Ok(Flow::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                debug!("Defining class '{}'", name.lexeme);

                // Reserved, not readable, until the class below is built.
                self.environment.borrow_mut().declare(&name.lexeme);

                let superclass: Option<Rc<Class>> = match superclass {
                    Some(expr) => match self.evaluate(expr)? {
                        Value::Callable(Callable::Class(class)) => Some(class),
                        _ => {
                            return Err(SparkleError::runtime(
                                name.line,
                                "Superclass must be a class.",
                            ));
                        }
                    },
                    None => None,
                };

                let method_env: EnvRef = match &superclass {
                    Some(class) => {
                        let mut env = Environment::with_enclosing(Rc::clone(&self.environment));
                        env.define("super", Value::Callable(Callable::Class(Rc::clone(class))));
                        env.into_ref()
                    }
                    None => Rc::clone(&self.environment),
                };

                let methods = methods
                    .iter()
                    .map(|decl| {
                        let function = Function::new(
                            Rc::clone(decl),
                            Rc::clone(&method_env),
                            decl.name.lexeme == INITIALIZER,
                        );
                        (decl.name.lexeme.clone(), Rc::new(function))
                    })
                    .collect();

                let class = Class {
                    name: name.lexeme.clone(),
                    superclass,
                    methods,
                };

                self.environment
                    .borrow_mut()
                    .define(&name.lexeme, Value::Callable(Callable::Class(Rc::new(class))));
                Ok(Flow::Normal)
            }
        }
    }

    /// Run `statements` inside `env`, restoring the current environment on
    /// every exit path.
    pub fn execute_block(&mut self, statements: &[Stmt], env: EnvRef) -> Result<Flow> {
        let previous: EnvRef = mem::replace(&mut self.environment, env);

        let mut result: Result<Flow> = Ok(Flow::Normal);

        for stmt in statements {
            match self.execute(stmt) {
                Ok(Flow::Normal) => {}
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;

        result
    }

    // ───────────────────────────── expressions ─────────────────────────────

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::string(s),
                LiteralValue::Bool(b) => Value::Bool(*b),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(id).copied() {
                    Some(distance) => {
                        Environment::assign_at(&self.environment, distance, name, value.clone())?;

                        #[cfg(test)]
                        self.check_chain_walk(name, &value);
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Unary { operator, right } => {
                let right: Value = self.evaluate(right)?;

                match (&operator.token_type, right) {
                    (TokenType::BANG, value) => Ok(Value::Bool(!value.is_truthy())),
                    (TokenType::MINUS, Value::Number(n)) => Ok(Value::Number(-n)),
                    (TokenType::MINUS, value) => Err(SparkleError::runtime(
                        operator.line,
                        format!("Operand must be a number. Got {}.", value.type_name()),
                    )),
                    _ => Err(SparkleError::runtime(
                        operator.line,
                        format!("Invalid unary operator '{}'.", operator.lexeme),
                    )),
                }
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;
                let right: Value = self.evaluate(right)?;
                binary(operator, left, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;

                let short_circuit: bool = if operator.token_type == TokenType::OR {
                    left.is_truthy()
                } else {
                    !left.is_truthy()
                };

                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: Value = self.evaluate(callee)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.evaluate(arg)?);
                }

                self.call(callee, paren, args)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Instance::get(&instance, name),
                other => Err(SparkleError::runtime(
                    name.line,
                    format!("Only instances have properties. Got {}.", other.type_name()),
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(SparkleError::runtime(name.line, "Only instances have fields."));
                };

                let value: Value = self.evaluate(value)?;
                instance.borrow_mut().set(name, value.clone());
                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn look_up_variable(&mut self, id: ExprId, name: &Token) -> Result<Value> {
        match self.locals.get(&id).copied() {
            Some(distance) => {
                let value: Value = Environment::get_at(&self.environment, distance, name)?;

                #[cfg(test)]
                self.check_chain_walk(name, &value);

                Ok(value)
            }
            None => self.globals.borrow().get(name),
        }
    }

    /// Record whether walking outward from the current scope by name finds
    /// the same value the resolved distance did.
    #[cfg(test)]
    fn check_chain_walk(&mut self, name: &Token, resolved: &Value) {
        let walked: Option<Value> = self.environment.borrow().get(name).ok();

        self.chain_checks.push(ChainCheck {
            name: name.lexeme.clone(),
            line: name.line,
            agrees: walked.as_ref() == Some(resolved),
        });
    }

    /// `super.method`: the superclass sits `distance` hops out and the
    /// instance in the `this` scope one hop closer.
    fn evaluate_super(&self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        let unresolved = || SparkleError::runtime(keyword.line, "Unresolved 'super'.");

        let distance: usize = *self.locals.get(&id).ok_or_else(unresolved)?;
        let this_distance: usize = distance.checked_sub(1).ok_or_else(unresolved)?;

        let Value::Callable(Callable::Class(superclass)) =
            Environment::get_at(&self.environment, distance, keyword)?
        else {
            return Err(unresolved());
        };

        let Some(Value::Instance(instance)) =
            Environment::ancestor(&self.environment, this_distance)?
                .borrow()
                .get_local("this")
        else {
            return Err(unresolved());
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Callable(Callable::Function(Rc::new(
                found.bind(instance),
            )))),
            None => Err(SparkleError::runtime(
                method.line,
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }

    // ─────────────────────────────── calls ─────────────────────────────────

    /// Invokes a callable (native, user function or class).
    fn call(&mut self, callee: Value, paren: &Token, args: Vec<Value>) -> Result<Value> {
        let callable: Callable = match callee {
            Value::Callable(callable) => callable,
            other => {
                return Err(SparkleError::runtime(
                    paren.line,
                    format!("Can only call functions and classes. Got {}.", other.type_name()),
                ));
            }
        };

        if args.len() != callable.arity() {
            return Err(SparkleError::runtime(
                paren.line,
                format!(
                    "Expected {} arguments but got {}.",
                    callable.arity(),
                    args.len()
                ),
            ));
        }

        debug!("Calling '{}' with {} argument(s)", callable.name(), args.len());

        match callable {
            Callable::Native(native) => {
                (native.func)(&args).map_err(|msg| SparkleError::runtime(paren.line, msg))
            }

            Callable::Function(function) => self.call_function(&function, args),

            Callable::Class(class) => {
                let instance = Rc::new(RefCell::new(Instance::new(Rc::clone(&class))));

                if let Some(init) = class.find_method(INITIALIZER) {
                    self.call_function(&init.bind(Rc::clone(&instance)), args)?;
                }

                Ok(Value::Instance(instance))
            }
        }
    }

    fn call_function(&mut self, function: &Function, args: Vec<Value>) -> Result<Value> {
        let mut env = Environment::with_enclosing(Rc::clone(&function.closure));

        for (param, arg) in function.decl.params.iter().zip(args) {
            env.define(&param.lexeme, arg);
        }

        let flow: Flow = self.execute_block(&function.decl.body, env.into_ref())?;

        // An initializer always hands back its instance.
        if function.is_initializer {
            return Ok(function
                .closure
                .borrow()
                .get_local("this")
                .unwrap_or(Value::Nil));
        }

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }
}

/// Arithmetic, comparison and equality.
fn binary(operator: &Token, left: Value, right: Value) -> Result<Value> {
    use Value::{Bool, Number};

    let numbers_expected = |left: &Value, right: &Value| {
        SparkleError::runtime(
            operator.line,
            format!(
                "Operands must be numbers. Got {} and {}.",
                left.type_name(),
                right.type_name()
            ),
        )
    };

    match (&operator.token_type, &left, &right) {
        (TokenType::EQUAL_EQUAL, _, _) => Ok(Bool(left == right)),
        (TokenType::BANG_EQUAL, _, _) => Ok(Bool(left != right)),

        (TokenType::PLUS, Number(a), Number(b)) => Ok(Number(a + b)),
        (TokenType::PLUS, Value::Str(a), Value::Str(b)) => {
            let mut joined: String = String::with_capacity(a.len() + b.len());
            joined.push_str(a);
            joined.push_str(b);
            Ok(Value::string(joined))
        }
        (TokenType::PLUS, _, _) => Err(SparkleError::runtime(
            operator.line,
            format!(
                "Operands must be two numbers or two strings. Got {} and {}.",
                left.type_name(),
                right.type_name()
            ),
        )),

        // Division by zero is reported before the operand type check.
        (TokenType::SLASH, _, Number(b)) if *b == 0.0 => {
            Err(SparkleError::runtime(operator.line, "Divide by zero."))
        }

        (TokenType::MINUS, Number(a), Number(b)) => Ok(Number(a - b)),
        (TokenType::STAR, Number(a), Number(b)) => Ok(Number(a * b)),
        (TokenType::SLASH, Number(a), Number(b)) => Ok(Number(a / b)),
        (TokenType::GREATER, Number(a), Number(b)) => Ok(Bool(a > b)),
        (TokenType::GREATER_EQUAL, Number(a), Number(b)) => Ok(Bool(a >= b)),
        (TokenType::LESS, Number(a), Number(b)) => Ok(Bool(a < b)),
        (TokenType::LESS_EQUAL, Number(a), Number(b)) => Ok(Bool(a <= b)),

        (
            TokenType::MINUS
            | TokenType::STAR
            | TokenType::SLASH
            | TokenType::GREATER
            | TokenType::GREATER_EQUAL
            | TokenType::LESS
            | TokenType::LESS_EQUAL,
            _,
            _,
        ) => Err(numbers_expected(&left, &right)),

        _ => Err(SparkleError::runtime(
            operator.line,
            format!("Invalid binary operator '{}'.", operator.lexeme),
        )),
    }
}
