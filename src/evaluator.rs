use crate::ast::{Definition, Expr, Node, Operator, PrintKind, Program, Statement};
use crate::config::Config;
use crate::environment::{EnvError, Environment};
use crate::source::Span;
use crate::stack::ensure_sufficient_stack;
use crate::types::{Closure, Kind, Value};
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use tracing::{debug, trace};

// --- Evaluation Error ---
/// A fault raised while evaluating. Every fault is fatal to the program being
/// run; the interpreter itself stays usable (the REPL keeps going).
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("{error}")]
    Env { error: EnvError, span: Span },
    #[error("Type Error: Expect '{expected}' but got '{found}'.")]
    TypeMismatch {
        expected: Kind,
        found: Kind,
        span: Span,
    },
    #[error("Type Error: Expect 'function' but got '{found}'.")]
    NotAFunction { found: Kind, span: Span },
    #[error("Error: Need {expected} arguments, but got {found}.")]
    ArityMismatch {
        expected: usize,
        found: usize,
        span: Span,
    },
    #[error("Error: Division by zero")]
    DivisionByZero { span: Span },
    #[error("Error: Maximum call depth of {limit} exceeded.")]
    CallDepthExceeded { limit: usize, span: Span },
}

impl EvalError {
    pub fn span(&self) -> Span {
        match self {
            EvalError::Env { span, .. }
            | EvalError::TypeMismatch { span, .. }
            | EvalError::NotAFunction { span, .. }
            | EvalError::ArityMismatch { span, .. }
            | EvalError::DivisionByZero { span }
            | EvalError::CallDepthExceeded { span, .. } => *span,
        }
    }
}

// Result type alias for convenience
pub type EvalResult<T = Value> = Result<T, EvalError>;

/// Where `print-num` and `print-bool` send their lines.
pub trait Output {
    fn emit(&mut self, line: String);
}

impl Output for Vec<String> {
    fn emit(&mut self, line: String) {
        self.push(line);
    }
}

impl<O: Output + ?Sized> Output for &mut O {
    fn emit(&mut self, line: String) {
        (**self).emit(line);
    }
}

/// Writes each line to `W`. Write failures such as a closed pipe are ignored
/// and the program keeps running.
pub struct WriteOutput<W: Write>(pub W);

impl<W: Write> Output for WriteOutput<W> {
    fn emit(&mut self, line: String) {
        let _ = writeln!(self.0, "{line}");
    }
}

fn expect_number(value: &Value, span: Span) -> EvalResult<i64> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(EvalError::TypeMismatch {
            expected: Kind::Number,
            found: other.kind(),
            span,
        }),
    }
}

fn expect_boolean(value: &Value, span: Span) -> EvalResult<bool> {
    match value {
        Value::Boolean(b) => Ok(*b),
        other => Err(EvalError::TypeMismatch {
            expected: Kind::Boolean,
            found: other.kind(),
            span,
        }),
    }
}

/// Tree-walking evaluator holding the global environment and the output sink.
pub struct Interpreter<O: Output> {
    global: Rc<RefCell<Environment>>,
    output: O,
    config: Config,
    depth: usize,
}

impl<O: Output> Interpreter<O> {
    pub fn new(output: O) -> Self {
        Interpreter::with_config(output, Config::default())
    }

    pub fn with_config(output: O, config: Config) -> Self {
        Interpreter {
            global: Environment::new(),
            output,
            config,
            depth: 0,
        }
    }

    pub fn global(&self) -> Rc<RefCell<Environment>> {
        Rc::clone(&self.global)
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    pub fn into_output(self) -> O {
        self.output
    }

    /// Executes every top-level statement in order, stopping at the first fault.
    #[tracing::instrument(level = "debug", skip_all, fields(statements = program.statements.len()))]
    pub fn run(&mut self, program: &Program) -> EvalResult<()> {
        for statement in &program.statements {
            self.execute(statement)?;
        }
        Ok(())
    }

    /// Executes one top-level statement against the global environment.
    /// Returns the value of a bare expression, `Value::None` otherwise.
    pub fn execute(&mut self, statement: &Statement) -> EvalResult {
        debug!(span = %statement.span(), "execute statement");
        let global = Rc::clone(&self.global);
        match statement {
            Statement::Define(definition) => {
                self.define(definition, &global)?;
                Ok(Value::None)
            }
            Statement::Print { kind, operand, .. } => {
                let value = self.evaluate(operand, &global)?;
                let line = match kind {
                    PrintKind::Number => expect_number(&value, operand.span)?.to_string(),
                    PrintKind::Boolean => {
                        Value::Boolean(expect_boolean(&value, operand.span)?).to_string()
                    }
                };
                self.output.emit(line);
                Ok(Value::None)
            }
            Statement::Expression(node) => self.evaluate(node, &global),
        }
    }

    fn define(
        &mut self,
        definition: &Definition,
        env: &Rc<RefCell<Environment>>,
    ) -> EvalResult<()> {
        let value = self.evaluate(&definition.value, env)?;
        env.borrow_mut()
            .bind(definition.name.as_str(), value)
            .map_err(|error| EvalError::Env {
                error,
                span: definition.span,
            })
    }

    /// Evaluates a given AST Node within the specified environment.
    pub fn evaluate(&mut self, node: &Node, env: &Rc<RefCell<Environment>>) -> EvalResult {
        ensure_sufficient_stack(|| match &node.kind {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Boolean(b) => Ok(Value::Boolean(*b)),
            Expr::Variable(name) => env.borrow().lookup(name).map_err(|error| EvalError::Env {
                error,
                span: node.span,
            }),
            Expr::Operation { op, operands } => {
                self.evaluate_operation(*op, operands, env, node.span)
            }
            Expr::If {
                test,
                then,
                otherwise,
            } => {
                let condition = self.evaluate(test, env)?;
                if expect_boolean(&condition, test.span)? {
                    self.evaluate(then, env)
                } else {
                    self.evaluate(otherwise, env)
                }
            }
            Expr::Function(function) => {
                Ok(Value::Function(Closure::new(function, Rc::clone(env))))
            }
            Expr::Call { callee, args } => self.evaluate_call(callee, args, env, node.span),
            Expr::Block { definitions, value } => {
                for definition in definitions {
                    self.define(definition, env)?;
                }
                self.evaluate(value, env)
            }
        })
    }

    // Every operand is evaluated before any operator logic runs, so `and`/`or`
    // see faults and side effects from all operands.
    fn evaluate_operation(
        &mut self,
        op: Operator,
        operands: &[Node],
        env: &Rc<RefCell<Environment>>,
        span: Span,
    ) -> EvalResult {
        let mut values = Vec::with_capacity(operands.len());
        for operand in operands {
            values.push((self.evaluate(operand, env)?, operand.span));
        }

        match op {
            Operator::Add => {
                let mut sum: i64 = 0;
                for (value, span) in &values {
                    sum = sum.wrapping_add(expect_number(value, *span)?);
                }
                Ok(Value::Number(sum))
            }
            Operator::Mul => {
                let mut product: i64 = 1;
                for (value, span) in &values {
                    product = product.wrapping_mul(expect_number(value, *span)?);
                }
                Ok(Value::Number(product))
            }
            Operator::Sub => {
                let (a, b) = two_numbers(&values, span)?;
                Ok(Value::Number(a.wrapping_sub(b)))
            }
            // Division and remainder truncate toward zero.
            Operator::Div => {
                let (a, b) = two_numbers(&values, span)?;
                if b == 0 {
                    return Err(EvalError::DivisionByZero { span });
                }
                Ok(Value::Number(a.wrapping_div(b)))
            }
            Operator::Mod => {
                let (a, b) = two_numbers(&values, span)?;
                if b == 0 {
                    return Err(EvalError::DivisionByZero { span });
                }
                Ok(Value::Number(a.wrapping_rem(b)))
            }
            Operator::Greater => {
                let (a, b) = two_numbers(&values, span)?;
                Ok(Value::Boolean(a > b))
            }
            Operator::Less => {
                let (a, b) = two_numbers(&values, span)?;
                Ok(Value::Boolean(a < b))
            }
            Operator::Equal => {
                let numbers = values
                    .iter()
                    .map(|(value, span)| expect_number(value, *span))
                    .collect::<EvalResult<Vec<i64>>>()?;
                Ok(Value::Boolean(numbers.iter().all(|n| *n == numbers[0])))
            }
            Operator::And => {
                let booleans = all_booleans(&values)?;
                Ok(Value::Boolean(booleans.iter().all(|b| *b)))
            }
            Operator::Or => {
                let booleans = all_booleans(&values)?;
                Ok(Value::Boolean(booleans.iter().any(|b| *b)))
            }
            Operator::Not => match values.as_slice() {
                [(value, operand_span)] => {
                    Ok(Value::Boolean(!expect_boolean(value, *operand_span)?))
                }
                _ => Err(EvalError::ArityMismatch {
                    expected: 1,
                    found: values.len(),
                    span,
                }),
            },
        }
    }

    fn evaluate_call(
        &mut self,
        callee: &Node,
        args: &[Node],
        env: &Rc<RefCell<Environment>>,
        span: Span,
    ) -> EvalResult {
        let closure = match self.evaluate(callee, env)? {
            Value::Function(closure) => closure,
            other => {
                return Err(EvalError::NotAFunction {
                    found: other.kind(),
                    span: callee.span,
                });
            }
        };

        // Arguments are evaluated in the caller's environment.
        let mut arguments = Vec::with_capacity(args.len());
        for arg in args {
            arguments.push(self.evaluate(arg, env)?);
        }
        if arguments.len() != closure.arity() {
            return Err(EvalError::ArityMismatch {
                expected: closure.arity(),
                found: arguments.len(),
                span,
            });
        }
        if self.depth >= self.config.max_call_depth {
            return Err(EvalError::CallDepthExceeded {
                limit: self.config.max_call_depth,
                span,
            });
        }

        // The new frame hangs off the closure's captured environment, never the caller's.
        let frame = Environment::new_enclosed(Rc::clone(&closure.env));
        {
            let mut frame_mut = frame.borrow_mut();
            for (param, value) in closure.params.iter().zip(arguments) {
                frame_mut
                    .bind(param.as_str(), value)
                    .map_err(|error| EvalError::Env { error, span })?;
            }
        }

        trace!(depth = self.depth, arity = closure.arity(), "call");
        self.depth += 1;
        let result = self.evaluate(&closure.body, &frame);
        self.depth -= 1;
        result
    }
}

fn two_numbers(values: &[(Value, Span)], span: Span) -> EvalResult<(i64, i64)> {
    match values {
        [(a, a_span), (b, b_span)] => {
            Ok((expect_number(a, *a_span)?, expect_number(b, *b_span)?))
        }
        _ => Err(EvalError::ArityMismatch {
            expected: 2,
            found: values.len(),
            span,
        }),
    }
}

fn all_booleans(values: &[(Value, Span)]) -> EvalResult<Vec<bool>> {
    values
        .iter()
        .map(|(value, span)| expect_boolean(value, *span))
        .collect()
}
