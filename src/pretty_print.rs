use crate::lexer::LexerErrorKind;
use crate::{EnvError, Error, EvalError, ParseError};
use ariadne::{Color, Label, Report, ReportKind, Source};

impl ParseError {
    fn label(&self) -> String {
        match self {
            ParseError::UnexpectedToken { expected, .. } => format!("expected {expected}"),
            ParseError::UnexpectedEof { expected, .. } => {
                format!("input ended here, expected {expected}")
            }
            ParseError::LexerError(lex_err) => match &lex_err.error {
                LexerErrorKind::InvalidCharacter(_) => {
                    "this character cannot start any token".to_string()
                }
                other => other.to_string(),
            },
            ParseError::DuplicateParameter { .. } => {
                "this name already appears in the parameter list".to_string()
            }
        }
    }
}

impl EvalError {
    fn label(&self) -> String {
        match self {
            EvalError::Env { error, .. } => match error {
                EnvError::UndefinedName(_) => {
                    "this name is not bound in any enclosing scope".to_string()
                }
                EnvError::NameConflict(_) => {
                    "this name is already bound in the current scope".to_string()
                }
            },
            EvalError::TypeMismatch {
                expected, found, ..
            } => format!("expected {expected}, found {found}"),
            EvalError::NotAFunction { found, .. } => {
                format!("this {found} cannot be called")
            }
            EvalError::ArityMismatch {
                expected, found, ..
            } => format!("function takes {expected} arguments, {found} given"),
            EvalError::DivisionByZero { .. } => "the divisor evaluated to zero".to_string(),
            EvalError::CallDepthExceeded { .. } => "this call nests too deeply".to_string(),
        }
    }
}

impl Error {
    fn label(&self) -> String {
        match self {
            Error::Parse(err) => err.label(),
            Error::Eval(err) => err.label(),
        }
    }

    /// Writes a source-annotated report for this fault to stderr.
    pub fn pretty_print(&self, source_name: &str, input: &str) -> std::io::Result<()> {
        let mut range = self.span().to_range();
        // End-of-input spans are zero-width; point at the last character instead
        if range.is_empty() {
            range.start = range.start.saturating_sub(1);
        }
        Report::build(ReportKind::Error, (source_name, range.clone()))
            .with_message(self.to_string())
            .with_label(
                Label::new((source_name, range))
                    .with_message(self.label())
                    .with_color(Color::Red),
            )
            .finish()
            .eprint((source_name, Source::from(input)))
    }
}
