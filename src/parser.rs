use crate::Span;
use crate::ast::{
    Arity, Definition, Expr, FunctionLiteral, Node, Operator, PrintKind, Program, Statement,
};
use crate::lexer::{LexerError, Token, TokenKind};
use crate::stack::ensure_sufficient_stack;
use std::iter::Peekable;
use std::rc::Rc;
use std::vec::IntoIter; // To iterate over Vec<Token>
use tracing::debug;

/// Any failure to turn source text into a [`Program`]. There is no error
/// recovery: the first failure aborts the whole parse.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("syntax error, unexpected '{found}'")]
    UnexpectedToken { found: Token, expected: String },
    #[error("syntax error")]
    UnexpectedEof { expected: String, span: Span },
    #[error("syntax error, {0}")]
    LexerError(#[from] LexerError),
    #[error("syntax error, duplicate parameter '{name}'")]
    DuplicateParameter { name: String, span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedToken { found, .. } => found.span,
            ParseError::UnexpectedEof { span, .. } => *span,
            ParseError::LexerError(err) => err.span,
            ParseError::DuplicateParameter { span, .. } => *span,
        }
    }

    fn unexpected(found: Token, expected: &str) -> Self {
        ParseError::UnexpectedToken {
            found,
            expected: expected.to_string(),
        }
    }
}

// Result type alias for convenience
type ParseResult<T> = Result<T, ParseError>;

pub struct Parser {
    // We iterate over owned Tokens, consuming them.
    tokens: Peekable<IntoIter<Token>>,
    // Zero-width span just past the last token, reported on unexpected EOF.
    end: Span,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let end = tokens
            .last()
            .map(|t| Span::new(t.span.end, t.span.end))
            .unwrap_or_default();
        Parser {
            tokens: tokens.into_iter().peekable(),
            end,
        }
    }

    // Consumes the next token if available.
    fn next_token(&mut self) -> Option<Token> {
        self.tokens.next()
    }

    fn peek_kind(&mut self) -> Option<&TokenKind> {
        self.tokens.peek().map(|t| &t.kind)
    }

    // Consumes the next token, treating end of input as an error.
    fn expect_token(&mut self, expected: &str) -> ParseResult<Token> {
        let end = self.end;
        self.next_token().ok_or_else(|| ParseError::UnexpectedEof {
            expected: expected.to_string(),
            span: end,
        })
    }

    fn expect_rparen(&mut self) -> ParseResult<Span> {
        let token = self.expect_token("')'")?;
        match token.kind {
            TokenKind::RParen => Ok(token.span),
            _ => Err(ParseError::unexpected(token, "')'")),
        }
    }

    /// Parses the whole token stream as a sequence of top-level statements.
    pub fn parse(mut self) -> ParseResult<Program> {
        let mut statements = Vec::new();
        while self.tokens.peek().is_some() {
            statements.push(self.parse_statement()?);
        }
        debug!(statements = statements.len(), "parsed program");
        Ok(Program { statements })
    }

    /// Parses a `define`, a `print-num`/`print-bool`, or a bare expression.
    pub fn parse_statement(&mut self) -> ParseResult<Statement> {
        let token = self.expect_token("a statement")?;
        match token.kind {
            TokenKind::LParen => {
                let head = self.expect_token("a form")?;
                match head.kind {
                    TokenKind::Define => Ok(Statement::Define(self.parse_definition(token.span)?)),
                    TokenKind::PrintNum => self.parse_print(PrintKind::Number, token.span),
                    TokenKind::PrintBool => self.parse_print(PrintKind::Boolean, token.span),
                    _ => Ok(Statement::Expression(self.parse_form(token.span, head)?)),
                }
            }
            _ => Ok(Statement::Expression(self.parse_atom(token)?)),
        }
    }

    /// Parses a single expression from the token stream.
    pub fn parse_expr(&mut self) -> ParseResult<Node> {
        let token = self.expect_token("an expression")?;
        self.parse_expr_with_token(token)
    }

    fn parse_expr_with_token(&mut self, token: Token) -> ParseResult<Node> {
        ensure_sufficient_stack(|| match token.kind {
            TokenKind::LParen => {
                let head = self.expect_token("a form")?;
                self.parse_form(token.span, head)
            }
            _ => self.parse_atom(token),
        })
    }

    /// Parses a number, boolean, or variable reference.
    fn parse_atom(&mut self, token: Token) -> ParseResult<Node> {
        let kind = match token.kind {
            TokenKind::Number(n) => Expr::Number(n),
            TokenKind::Boolean(b) => Expr::Boolean(b),
            TokenKind::Identifier(name) => Expr::Variable(name),
            other => {
                return Err(ParseError::unexpected(
                    Token {
                        kind: other,
                        span: token.span,
                    },
                    "an expression",
                ));
            }
        };
        Ok(Node::new(kind, token.span))
    }

    /// Parses the rest of a parenthesized expression whose `(` and first
    /// token have already been consumed.
    fn parse_form(&mut self, open: Span, head: Token) -> ParseResult<Node> {
        let op = match head.kind {
            TokenKind::Plus => Operator::Add,
            TokenKind::Minus => Operator::Sub,
            TokenKind::Star => Operator::Mul,
            TokenKind::Slash => Operator::Div,
            TokenKind::Mod => Operator::Mod,
            TokenKind::Greater => Operator::Greater,
            TokenKind::Less => Operator::Less,
            TokenKind::Equal => Operator::Equal,
            TokenKind::And => Operator::And,
            TokenKind::Or => Operator::Or,
            TokenKind::Not => Operator::Not,
            TokenKind::If => return self.parse_if(open),
            TokenKind::Fun => return self.parse_function(open),
            TokenKind::Identifier(name) => {
                let callee = Node::new_variable(name, head.span);
                return self.parse_call(open, callee);
            }
            TokenKind::LParen => {
                // Only an inline function literal may be called directly.
                let fun = self.expect_token("'fun'")?;
                if fun.kind != TokenKind::Fun {
                    return Err(ParseError::unexpected(fun, "'fun'"));
                }
                let callee = self.parse_function(head.span)?;
                return self.parse_call(open, callee);
            }
            _ => {
                return Err(ParseError::unexpected(
                    head,
                    "an operator, 'if', 'fun', or a function to call",
                ));
            }
        };
        self.parse_operation(open, op)
    }

    fn parse_operation(&mut self, open: Span, op: Operator) -> ParseResult<Node> {
        let mut operands = Vec::new();
        match op.arity() {
            Arity::Exactly(n) => {
                for _ in 0..n {
                    operands.push(self.parse_operand(op)?);
                }
            }
            Arity::AtLeast(n) => {
                for _ in 0..n {
                    operands.push(self.parse_operand(op)?);
                }
                while self
                    .peek_kind()
                    .is_some_and(|kind| *kind != TokenKind::RParen)
                {
                    operands.push(self.parse_expr()?);
                }
            }
        }
        let close = self.expect_rparen()?;
        Ok(Node::new(Expr::Operation { op, operands }, open.merge(close)))
    }

    fn parse_operand(&mut self, op: Operator) -> ParseResult<Node> {
        let expected = format!("an operand for '{op}'");
        let token = self.expect_token(&expected)?;
        if token.kind == TokenKind::RParen {
            return Err(ParseError::unexpected(token, &expected));
        }
        self.parse_expr_with_token(token)
    }

    fn parse_if(&mut self, open: Span) -> ParseResult<Node> {
        let test = self.parse_expr()?;
        let then = self.parse_expr()?;
        let otherwise = self.parse_expr()?;
        let close = self.expect_rparen()?;
        Ok(Node::new(
            Expr::If {
                test: Box::new(test),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            open.merge(close),
        ))
    }

    /// Parses `(fun (params...) body)` after the `fun` keyword.
    fn parse_function(&mut self, open: Span) -> ParseResult<Node> {
        let params_open = self.expect_token("a parameter list")?;
        if params_open.kind != TokenKind::LParen {
            return Err(ParseError::unexpected(params_open, "a parameter list"));
        }

        let mut params: Vec<String> = Vec::new();
        loop {
            let token = self.expect_token("a parameter name or ')'")?;
            match token.kind {
                TokenKind::RParen => break,
                TokenKind::Identifier(name) => {
                    if params.contains(&name) {
                        return Err(ParseError::DuplicateParameter {
                            name,
                            span: token.span,
                        });
                    }
                    params.push(name);
                }
                _ => return Err(ParseError::unexpected(token, "a parameter name or ')'")),
            }
        }

        let body = self.parse_body()?;
        let close = self.expect_rparen()?;
        Ok(Node::new(
            Expr::Function(FunctionLiteral {
                params: params.into(),
                body: Rc::new(body),
            }),
            open.merge(close),
        ))
    }

    /// A function body: zero or more `define`s followed by one expression.
    fn parse_body(&mut self) -> ParseResult<Node> {
        let mut definitions = Vec::new();
        loop {
            let token = self.expect_token("a function body")?;
            if token.kind == TokenKind::LParen && self.peek_kind() == Some(&TokenKind::Define) {
                self.next_token(); // the `define` keyword
                definitions.push(self.parse_definition(token.span)?);
                continue;
            }

            let value = self.parse_expr_with_token(token)?;
            return Ok(match definitions.first() {
                None => value,
                Some(first) => {
                    let span = first.span.merge(value.span);
                    Node::new(
                        Expr::Block {
                            definitions,
                            value: Box::new(value),
                        },
                        span,
                    )
                }
            });
        }
    }

    /// Parses `(define id expr)` after the `define` keyword.
    fn parse_definition(&mut self, open: Span) -> ParseResult<Definition> {
        let name_token = self.expect_token("an identifier")?;
        let name = match name_token.kind {
            TokenKind::Identifier(name) => name,
            _ => return Err(ParseError::unexpected(name_token, "an identifier")),
        };
        let value = self.parse_expr()?;
        let close = self.expect_rparen()?;
        Ok(Definition {
            name,
            value,
            span: open.merge(close),
        })
    }

    fn parse_print(&mut self, kind: PrintKind, open: Span) -> ParseResult<Statement> {
        let operand = self.parse_expr()?;
        let close = self.expect_rparen()?;
        Ok(Statement::Print {
            kind,
            operand,
            span: open.merge(close),
        })
    }

    fn parse_call(&mut self, open: Span, callee: Node) -> ParseResult<Node> {
        let mut args = Vec::new();
        while self
            .peek_kind()
            .is_some_and(|kind| *kind != TokenKind::RParen)
        {
            args.push(self.parse_expr()?);
        }
        let close = self.expect_rparen()?;
        Ok(Node::new(
            Expr::Call {
                callee: Box::new(callee),
                args,
            },
            open.merge(close),
        ))
    }
}

// Helper function to lex and parse a string directly (useful for tests and REPL)
pub fn parse_str(input: &str) -> ParseResult<Program> {
    let tokens = crate::lexer::tokenize(input)?;
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::LexerErrorKind;

    // Helper for asserting successful parsing of a single statement
    fn parse_one(input: &str) -> Statement {
        match parse_str(input) {
            Ok(mut program) => {
                assert_eq!(program.statements.len(), 1, "Input: '{}'", input);
                program.statements.remove(0)
            }
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        }
    }

    fn parse_one_expr(input: &str) -> Node {
        match parse_one(input) {
            Statement::Expression(node) => node,
            other => panic!("Expected an expression for '{}', got {:?}", input, other),
        }
    }

    // Helper for asserting parse errors
    fn assert_parse_error(input: &str, expected_error_variant: ParseError) {
        match parse_str(input) {
            Ok(result) => panic!(
                "Expected parsing to fail for input '{}', but got: {:?}",
                input, result
            ),
            Err(e) => {
                // Compare enum variants, ignoring specific content for simplicity
                assert_eq!(
                    std::mem::discriminant(&e),
                    std::mem::discriminant(&expected_error_variant),
                    "Input: '{}', Expected error variant like {:?}, got: {:?}",
                    input,
                    expected_error_variant,
                    e
                );
            }
        }
    }

    // Asserts the token the parser choked on
    fn assert_unexpected(input: &str, found: TokenKind) {
        match parse_str(input) {
            Err(ParseError::UnexpectedToken { found: token, .. }) => {
                assert_eq!(token.kind, found, "Input: '{}'", input)
            }
            other => panic!(
                "Expected UnexpectedToken for input '{}', got {:?}",
                input, other
            ),
        }
    }

    fn eof() -> ParseError {
        ParseError::UnexpectedEof {
            expected: String::new(),
            span: Span::default(),
        }
    }

    fn num(n: i64, start: usize, end: usize) -> Node {
        Node::new_number(n, Span::new(start, end))
    }

    fn var(name: &str, start: usize, end: usize) -> Node {
        Node::new_variable(name, Span::new(start, end))
    }

    #[test]
    fn test_parse_atoms() {
        assert_eq!(parse_one_expr("123"), num(123, 0, 3));
        assert_eq!(parse_one_expr("-4"), num(-4, 0, 2));
        assert_eq!(
            parse_one_expr("#t"),
            Node::new_bool(true, Span::new(0, 2))
        );
        assert_eq!(parse_one_expr("foo"), var("foo", 0, 3));
    }

    #[test]
    fn test_parse_operation_with_spans() {
        assert_eq!(
            parse_one_expr("(+ 1 2)"),
            Node::new(
                Expr::Operation {
                    op: Operator::Add,
                    operands: vec![num(1, 3, 4), num(2, 5, 6)],
                },
                Span::new(0, 7),
            )
        );
    }

    #[test]
    fn test_parse_variadic_operators_keep_order() {
        let node = parse_one_expr("(= a 2 (* 3 4) b)");
        match &node.kind {
            Expr::Operation { op, operands } => {
                assert_eq!(*op, Operator::Equal);
                assert_eq!(operands.len(), 4);
                assert_eq!(operands[0], var("a", 3, 4));
                assert_eq!(operands[3], var("b", 15, 16));
            }
            other => panic!("Expected operation, got {:?}", other),
        }
        // Single operand is accepted for the variadic forms
        assert!(matches!(
            parse_one_expr("(and #t)").kind,
            Expr::Operation { op: Operator::And, ref operands } if operands.len() == 1
        ));
    }

    #[test]
    fn test_parse_fixed_arity_errors() {
        assert_unexpected("(- 1)", TokenKind::RParen);
        assert_unexpected("(- 1 2 3)", TokenKind::Number(3));
        assert_unexpected("(mod 1)", TokenKind::RParen);
        assert_unexpected("(not #t #f)", TokenKind::Boolean(false));
        assert_unexpected("(+)", TokenKind::RParen);
        assert_unexpected("(or)", TokenKind::RParen);
        assert_unexpected("(if #t 1)", TokenKind::RParen);
        assert_unexpected("(if #t 1 2 3)", TokenKind::Number(3));
    }

    #[test]
    fn test_missing_operand_names_the_operator() {
        match parse_str("(mod 7)") {
            Err(ParseError::UnexpectedToken { found, expected }) => {
                assert_eq!(found.kind, TokenKind::RParen);
                assert_eq!(expected, "an operand for 'mod'");
            }
            other => panic!("Expected UnexpectedToken, got {:?}", other),
        }
        match parse_str("(+") {
            Err(ParseError::UnexpectedEof { expected, .. }) => {
                assert_eq!(expected, "an operand for '+'");
            }
            other => panic!("Expected UnexpectedEof, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_if() {
        let node = parse_one_expr("(if (< x 1) 0 x)");
        match &node.kind {
            Expr::If {
                test,
                then,
                otherwise,
            } => {
                assert!(matches!(
                    test.kind,
                    Expr::Operation {
                        op: Operator::Less,
                        ..
                    }
                ));
                assert_eq!(**then, num(0, 12, 13));
                assert_eq!(**otherwise, var("x", 14, 15));
            }
            other => panic!("Expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_define_and_print_statements() {
        match parse_one("(define x 10)") {
            Statement::Define(def) => {
                assert_eq!(def.name, "x");
                assert_eq!(def.value, num(10, 10, 12));
                assert_eq!(def.span, Span::new(0, 13));
            }
            other => panic!("Expected define, got {:?}", other),
        }
        assert!(matches!(
            parse_one("(print-num 1)"),
            Statement::Print {
                kind: PrintKind::Number,
                ..
            }
        ));
        assert!(matches!(
            parse_one("(print-bool #f)"),
            Statement::Print {
                kind: PrintKind::Boolean,
                ..
            }
        ));
    }

    #[test]
    fn test_statement_forms_rejected_as_operands() {
        assert_unexpected("(+ 1 (print-num 2))", TokenKind::PrintNum);
        assert_unexpected("(if (define x 1) 1 2)", TokenKind::Define);
        assert_unexpected("(print-num (print-bool #t))", TokenKind::PrintBool);
    }

    #[test]
    fn test_parse_define_errors() {
        assert_unexpected("(define 1 2)", TokenKind::Number(1));
        assert_unexpected("(define if 2)", TokenKind::If);
        assert_unexpected("(define x 1 2)", TokenKind::Number(2));
        assert_parse_error("(define x", eof());
    }

    #[test]
    fn test_parse_function_literal() {
        let node = parse_one_expr("(fun (a b) (+ a b))");
        match &node.kind {
            Expr::Function(function) => {
                assert_eq!(&*function.params, &["a".to_string(), "b".to_string()]);
                assert!(matches!(
                    function.body.kind,
                    Expr::Operation {
                        op: Operator::Add,
                        ..
                    }
                ));
            }
            other => panic!("Expected function, got {:?}", other),
        }
        assert!(matches!(
            parse_one_expr("(fun () 1)").kind,
            Expr::Function(ref f) if f.params.is_empty()
        ));
    }

    #[test]
    fn test_parse_function_body_with_definitions() {
        let node = parse_one_expr("(fun (x) (define y 1) (define z 2) (+ x y z))");
        let Expr::Function(function) = &node.kind else {
            panic!("Expected function");
        };
        match &function.body.kind {
            Expr::Block { definitions, value } => {
                let names: Vec<&str> = definitions.iter().map(|d| d.name.as_str()).collect();
                assert_eq!(names, vec!["y", "z"]);
                assert!(matches!(value.kind, Expr::Operation { .. }));
            }
            other => panic!("Expected block body, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_function_body_errors() {
        // Definitions must be followed by an expression
        assert_unexpected("(fun (x) (define y 1))", TokenKind::RParen);
        // Only one trailing expression
        assert_unexpected("(fun (x) x x)", TokenKind::Identifier("x".to_string()));
        // A definition after the trailing expression
        assert_unexpected("(fun (x) x (define y 1))", TokenKind::LParen);
        // Empty body
        assert_unexpected("(fun (x))", TokenKind::RParen);
        // Parameter list must be parenthesized identifiers
        assert_unexpected("(fun x x)", TokenKind::Identifier("x".to_string()));
        assert_unexpected("(fun (1) 1)", TokenKind::Number(1));
    }

    #[test]
    fn test_parse_duplicate_parameters() {
        match parse_str("(fun (a b a) a)") {
            Err(ParseError::DuplicateParameter { name, span }) => {
                assert_eq!(name, "a");
                assert_eq!(span, Span::new(10, 11));
            }
            other => panic!("Expected DuplicateParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_calls() {
        let node = parse_one_expr("(f 1 x)");
        match &node.kind {
            Expr::Call { callee, args } => {
                assert_eq!(**callee, var("f", 1, 2));
                assert_eq!(*args, vec![num(1, 3, 4), var("x", 5, 6)]);
            }
            other => panic!("Expected call, got {:?}", other),
        }
        assert!(matches!(
            parse_one_expr("(f)").kind,
            Expr::Call { ref args, .. } if args.is_empty()
        ));

        let node = parse_one_expr("((fun (x) x) 3)");
        match &node.kind {
            Expr::Call { callee, args } => {
                assert!(matches!(callee.kind, Expr::Function(_)));
                assert_eq!(callee.span, Span::new(1, 12));
                assert_eq!(*args, vec![num(3, 13, 14)]);
            }
            other => panic!("Expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_invalid_callees() {
        assert_unexpected("(1 2)", TokenKind::Number(1));
        assert_unexpected("(#t)", TokenKind::Boolean(true));
        assert_unexpected("()", TokenKind::RParen);
        assert_unexpected("((f 1) 2)", TokenKind::Identifier("f".to_string()));
    }

    #[test]
    fn test_parse_program_sequence() {
        let program = parse_str("(define x 1) (print-num x) x").unwrap();
        assert_eq!(program.statements.len(), 3);
        assert!(matches!(program.statements[0], Statement::Define(_)));
        assert!(matches!(program.statements[1], Statement::Print { .. }));
        assert!(matches!(program.statements[2], Statement::Expression(_)));
        assert_eq!(parse_str("").unwrap(), Program::default());
    }

    #[test]
    fn test_parse_errors_unbalanced() {
        assert_parse_error("(+ 1 2", eof());
        assert_parse_error("(", eof());
        assert_unexpected(")", TokenKind::RParen);
        assert_unexpected("(+ 1 2))", TokenKind::RParen);
    }

    #[test]
    fn test_eof_span_is_end_of_input() {
        let err = parse_str("(+ 1 2").unwrap_err();
        assert_eq!(err.span(), Span::new(6, 6));
    }

    #[test]
    fn test_parse_lexer_error_propagation() {
        assert_eq!(
            parse_str("(+ 1 ?)"),
            Err(ParseError::LexerError(LexerError {
                error: LexerErrorKind::InvalidCharacter('?'),
                span: Span::new(5, 6),
            }))
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            parse_str("(+ 1 2))").unwrap_err().to_string(),
            "syntax error, unexpected ')'"
        );
        assert_eq!(parse_str("(+ 1").unwrap_err().to_string(), "syntax error");
        assert_eq!(
            parse_str("(+ 1 @)").unwrap_err().to_string(),
            "syntax error, unexpected '@'"
        );
    }

    #[test]
    fn test_deeply_nested_input() {
        let depth = 1_000;
        let input = format!("{}1{}", "(+ ".repeat(depth), ")".repeat(depth));
        assert!(parse_str(&input).is_ok());
    }

    #[test]
    fn test_dropping_deeply_nested_program() {
        let depth = 200_000;
        let input = format!("(print-num {}1{})", "(+ 1 ".repeat(depth), ")".repeat(depth));
        let program = parse_str(&input).unwrap();
        assert_eq!(program.statements.len(), 1);
        drop(program);

        let nested_funs = format!("{}1{}", "(fun () ".repeat(depth), ")".repeat(depth));
        drop(parse_str(&nested_funs).unwrap());

        let nested_ifs = format!("{}1{}", "(if #t 0 ".repeat(depth), ")".repeat(depth));
        drop(parse_str(&nested_ifs).unwrap());
    }
}
