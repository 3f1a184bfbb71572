// Declare modules publicly so they are part of the library interface
pub mod ast;
pub mod config;
pub mod environment;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod pretty_print;
pub mod source;
mod stack;
pub mod types;

pub use config::Config;
pub use environment::{EnvError, Environment};
pub use evaluator::{EvalError, EvalResult, Interpreter, Output, WriteOutput};
pub use lexer::{LexerError, Token, TokenKind, tokenize};
pub use parser::{ParseError, Parser, parse_str};
pub use source::Span;
pub use types::{Closure, Kind, Value};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Installs a tracing subscriber for the binaries.
///
/// Only does anything when `RUST_LOG` is set, e.g. `RUST_LOG=minilisp=trace`
/// to see every call and binding. Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}

/// Anything that stops a Mini-LISP run: a syntax fault before evaluation
/// starts, or a runtime fault during it.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl Error {
    pub fn span(&self) -> Span {
        match self {
            Error::Parse(err) => err.span(),
            Error::Eval(err) => err.span(),
        }
    }
}

/// Everything a run printed, plus the fault that ended it early, if any.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transcript {
    pub output: Vec<String>,
    pub fault: Option<Error>,
}

/// Parses `source` and runs it against a fresh global environment, sending
/// printed lines to `output` as they are produced.
pub fn run<O: Output>(source: &str, output: O, config: Config) -> Result<(), Error> {
    let program = parse_str(source)?;
    let mut interpreter = Interpreter::with_config(output, config);
    interpreter.run(&program)?;
    Ok(())
}

/// Runs `source` with the default configuration and collects its output.
/// Lines printed before a fault are kept in the transcript.
pub fn evaluate(source: &str) -> Transcript {
    let mut output = Vec::new();
    let fault = run(source, &mut output, Config::default()).err();
    Transcript { output, fault }
}
