use crate::source::Span;
use std::fmt;
use std::rc::Rc;

/// An expression together with the source span it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: Expr,
    pub span: Span,
}

impl Node {
    pub fn new(kind: Expr, span: Span) -> Self {
        Node { kind, span }
    }

    pub fn new_number(n: i64, span: Span) -> Self {
        Node::new(Expr::Number(n), span)
    }

    pub fn new_bool(b: bool, span: Span) -> Self {
        Node::new(Expr::Boolean(b), span)
    }

    pub fn new_variable(name: impl Into<String>, span: Span) -> Self {
        Node::new(Expr::Variable(name.into()), span)
    }
}

/// Expression forms. Statement-only forms (`define`, `print-*`) live in
/// [`Statement`] so they cannot appear in operand position.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(i64),
    Boolean(bool),
    Variable(String),
    Operation {
        op: Operator,
        operands: Vec<Node>,
    },
    If {
        test: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },
    Function(FunctionLiteral),
    Call {
        callee: Box<Node>,
        args: Vec<Node>,
    },
    /// A function body with leading definitions: `(fun (x) (define y 1) (+ x y))`.
    Block {
        definitions: Vec<Definition>,
        value: Box<Node>,
    },
}

impl Expr {
    fn is_leaf(&self) -> bool {
        matches!(self, Expr::Number(_) | Expr::Boolean(_) | Expr::Variable(_))
    }

    /// Moves every owned compound child into `pending`, leaving leaves in place.
    fn detach_children(&mut self, pending: &mut Vec<Node>) {
        match self {
            Expr::Number(_) | Expr::Boolean(_) | Expr::Variable(_) => {}
            Expr::Operation { operands, .. } => pending.append(operands),
            Expr::If {
                test,
                then,
                otherwise,
            } => {
                for child in [test, then, otherwise] {
                    detach(child, pending);
                }
            }
            Expr::Function(function) if !function.body.kind.is_leaf() => {
                let placeholder = Node::new_bool(false, function.body.span);
                let body = std::mem::replace(&mut function.body, Rc::new(placeholder));
                // Closures still holding the body keep it alive
                if let Ok(node) = Rc::try_unwrap(body) {
                    pending.push(node);
                }
            }
            Expr::Function(_) => {}
            Expr::Call { callee, args } => {
                detach(callee, pending);
                pending.append(args);
            }
            Expr::Block { definitions, value } => {
                pending.extend(definitions.drain(..).map(|definition| definition.value));
                detach(value, pending);
            }
        }
    }
}

fn detach(slot: &mut Box<Node>, pending: &mut Vec<Node>) {
    if !slot.kind.is_leaf() {
        let placeholder = Node::new_bool(false, slot.span);
        pending.push(std::mem::replace(&mut **slot, placeholder));
    }
}

// Nesting depth is unbounded, so the tree is torn down from a heap worklist
// instead of recursing on the native stack.
impl Drop for Expr {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.detach_children(&mut pending);
        while let Some(mut node) = pending.pop() {
            node.kind.detach_children(&mut pending);
        }
    }
}

/// `(fun (params...) body)`. Parameters and body sit behind `Rc` so every
/// closure created from this literal shares them instead of copying.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLiteral {
    pub params: Rc<[String]>,
    pub body: Rc<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub name: String,
    pub value: Node,
    pub span: Span,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PrintKind {
    Number,
    Boolean,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Define(Definition),
    Print {
        kind: PrintKind,
        operand: Node,
        span: Span,
    },
    Expression(Node),
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Define(definition) => definition.span,
            Statement::Print { span, .. } => *span,
            Statement::Expression(node) => node.span,
        }
    }
}

/// The parsed program: top-level statements in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

/// How many operands an operator takes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Greater,
    Less,
    Equal,
    And,
    Or,
    Not,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "mod",
            Operator::Greater => ">",
            Operator::Less => "<",
            Operator::Equal => "=",
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Not => "not",
        }
    }

    pub fn arity(self) -> Arity {
        match self {
            Operator::Add | Operator::Mul | Operator::Equal | Operator::And | Operator::Or => {
                Arity::AtLeast(1)
            }
            Operator::Sub | Operator::Div | Operator::Mod | Operator::Greater | Operator::Less => {
                Arity::Exactly(2)
            }
            Operator::Not => Arity::Exactly(1),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
