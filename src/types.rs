use crate::ast::{FunctionLiteral, Node};
use crate::environment::Environment;
use std::cell::RefCell;
use std::fmt; // For custom display formatting
use std::rc::Rc;

/// A runtime value. Values are immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(i64),
    Boolean(bool),
    Function(Closure),
    /// Result of statements with no meaningful value (`define`, `print-*`).
    None,
}

/// The checkable kind of a [`Value`], as named in type errors.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Kind {
    Number,
    Boolean,
    Function,
    None,
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Number(_) => Kind::Number,
            Value::Boolean(_) => Kind::Boolean,
            Value::Function(_) => Kind::Function,
            Value::None => Kind::None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::Number => "number",
            Kind::Boolean => "boolean",
            Kind::Function => "function",
            Kind::None => "none",
        })
    }
}

// Numbers print in decimal and booleans as #t/#f, matching print-num/print-bool.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::Function(closure) => write!(f, "#<function/{}>", closure.arity()),
            Value::None => write!(f, "#<none>"),
        }
    }
}

/// A function value: parameters and body shared with the AST, plus the
/// environment frame that was current when the `fun` literal was evaluated.
///
/// Cloning is cheap; nothing is deep-copied. The captured environment is the
/// live frame, so names bound into it later (a recursive `define`) are
/// visible to the body.
#[derive(Clone)]
pub struct Closure {
    pub params: Rc<[String]>,
    pub body: Rc<Node>,
    pub env: Rc<RefCell<Environment>>,
}

impl Closure {
    pub fn new(function: &FunctionLiteral, env: Rc<RefCell<Environment>>) -> Self {
        Closure {
            params: Rc::clone(&function.params),
            body: Rc::clone(&function.body),
            env,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

// The captured environment may contain this very closure, so Debug stops at
// the parameter list instead of walking the environment.
impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Closure({})", self.params.join(" "))
    }
}

// Two closures are the same value only if they came from the same literal
// evaluated in the same frame.
impl PartialEq for Closure {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.body, &other.body) && Rc::ptr_eq(&self.env, &other.env)
    }
}
