use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use minilisp::{
    Environment, Error, Interpreter, Output, TokenKind, Value, WriteOutput, init_tracing, parse_str,
    tokenize,
};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};

const HISTORY_FILE: &str = "minilisp_history.txt";

struct MiniLispCompleter {
    env: Rc<RefCell<Environment>>,
}

impl MiniLispCompleter {
    fn new(env: Rc<RefCell<Environment>>) -> Self {
        MiniLispCompleter { env }
    }

    fn candidates(&self) -> HashSet<String> {
        let mut identifiers = self.env.borrow().get_identifiers();
        identifiers.extend(TokenKind::KEYWORDS.iter().map(|k| k.to_string()));
        identifiers
    }
}

impl rustyline::completion::Completer for MiniLispCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        // Keywords lex as their own tokens, so any trailing word token is a prefix
        let prefix = match tokenize(&line[..pos]) {
            Ok(tokens) if !line[..pos].ends_with(char::is_whitespace) => {
                tokens.last().and_then(|t| match &t.kind {
                    TokenKind::LParen | TokenKind::RParen => None,
                    TokenKind::Number(_) | TokenKind::Boolean(_) => None,
                    other => Some(other.to_string()),
                })
            }
            _ => None,
        };
        let Some(prefix) = prefix else {
            return Ok((pos, vec![]));
        };
        let mut completions: Vec<String> = self
            .candidates()
            .into_iter()
            .filter(|id| id.starts_with(&prefix) && id.len() > prefix.len())
            .map(|id| id[prefix.len()..].to_string())
            .collect();
        completions.sort();
        Ok((pos, completions))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct ReplHelper {
    #[rustyline(Validator)]
    validator: MiniLispValidator,
    #[rustyline(Highlighter)]
    highlighter: MiniLispHighlighter,
    #[rustyline(Completer)]
    completer: MiniLispCompleter,
}

struct MiniLispValidator;

impl Validator for MiniLispValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let mut depth: usize = 0;
        for (i, c) in ctx.input().chars().enumerate() {
            match c {
                '(' => depth += 1,
                ')' => {
                    if depth == 0 {
                        return Ok(ValidationResult::Invalid(Some(format!(
                            "  - Unmatched ')' at position {}",
                            i
                        ))));
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
        if depth > 0 {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

struct MiniLispHighlighter;

impl Highlighter for MiniLispHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> std::borrow::Cow<'l, str> {
        let mut stack: Vec<usize> = Vec::new();
        let mut highlighted = String::new();

        for (i, c) in line.chars().enumerate() {
            match c {
                '(' => {
                    stack.push(highlighted.len());
                    highlighted.push(c);
                }
                ')' => {
                    if let Some(matching_pos) = stack.pop() {
                        // Cursor sits just after either paren of the pair
                        if pos > 0 && (matching_pos == pos - 1 || i == pos - 1) {
                            // Blue for matching brackets
                            highlighted.push_str("\x1b[34m)\x1b[0m");
                            highlighted.replace_range(
                                matching_pos..=matching_pos,
                                "\x1b[1;34m(\x1b[0m",
                            );
                        } else {
                            highlighted.push(c);
                        }
                    } else {
                        // Red for unmatched closing brackets
                        highlighted.push_str("\x1b[31m)\x1b[0m");
                    }
                }
                _ => highlighted.push(c),
            }
        }

        std::borrow::Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn report(fault: Error, input: &str) {
    eprintln!("{}", fault);
    if let Err(e) = fault.pretty_print("repl", input) {
        eprintln!("could not render report: {}", e);
    }
}

fn main() -> rustyline::Result<()> {
    init_tracing();

    let mut interpreter = Interpreter::new(WriteOutput(std::io::stdout()));
    let banner = format!("minilisp {} (exit or Ctrl-D to leave)", env!("CARGO_PKG_VERSION"));
    interpreter.output_mut().emit(banner);
    let helper = ReplHelper {
        highlighter: MiniLispHighlighter,
        validator: MiniLispValidator,
        completer: MiniLispCompleter::new(interpreter.global()),
    };
    let config = rustyline::config::Config::builder()
        .edit_mode(rustyline::EditMode::Emacs)
        .build();
    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(helper));
    // Alt-Enter breaks the line without submitting an unbalanced form
    rl.bind_sequence(
        KeyEvent(KeyCode::Enter, Modifiers::ALT),
        EventHandler::Simple(Cmd::Newline),
    );
    // A missing history file just means a first session
    let _ = rl.load_history(HISTORY_FILE);

    loop {
        let readline = rl.readline("minilisp> ");
        match readline {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let input = line.trim();
                match input {
                    "" => continue,
                    "exit" => break,
                    _ => {}
                }

                let program = match parse_str(input) {
                    Ok(program) => program,
                    Err(fault) => {
                        report(fault.into(), input);
                        continue;
                    }
                };
                // Definitions made before a fault stay bound for the next entry
                for statement in &program.statements {
                    match interpreter.execute(statement) {
                        Ok(Value::None) => {}
                        Ok(value) => interpreter.output_mut().emit(value.to_string()),
                        Err(fault) => {
                            report(fault.into(), input);
                            break;
                        }
                    }
                }
            }
            // Ctrl-C drops the pending entry, Ctrl-D leaves
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("readline failed: {}", err);
                break;
            }
        }
    }
    rl.save_history(HISTORY_FILE)
}
