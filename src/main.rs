use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use argh::FromArgs;
use minilisp::{Config, WriteOutput, init_tracing};

#[derive(FromArgs)]
/// Run a Mini-LISP program. Reads stdin when neither FILE nor --code is given.
struct Args {
    #[argh(positional)]
    /// path to a Mini-LISP source file
    path: Option<PathBuf>,

    #[argh(option, short = 'c')]
    /// mini-LISP source to run instead of a file
    code: Option<String>,

    #[argh(option, default = "Config::DEFAULT_MAX_CALL_DEPTH")]
    /// maximum number of nested function calls
    max_depth: usize,

    #[argh(switch)]
    /// print a source-annotated report for faults
    report: bool,
}

fn read_source(args: &Args) -> std::io::Result<(String, String)> {
    if let Some(code) = &args.code {
        return Ok(("<code>".to_string(), code.clone()));
    }
    match &args.path {
        Some(path) => Ok((path.display().to_string(), std::fs::read_to_string(path)?)),
        None => {
            let mut source = String::new();
            std::io::stdin().read_to_string(&mut source)?;
            Ok(("<stdin>".to_string(), source))
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let args: Args = argh::from_env();

    let (name, source) = match read_source(&args) {
        Ok(input) => input,
        Err(e) => {
            eprintln!("Could not read source: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = Config::default().with_max_call_depth(args.max_depth);
    // Lines go out as they are produced, so output before a fault is visible
    match minilisp::run(&source, WriteOutput(std::io::stdout()), config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(fault) => {
            eprintln!("{}", fault);
            if args.report {
                if let Err(e) = fault.pretty_print(&name, &source) {
                    eprintln!("Could not render report: {}", e);
                }
            }
            ExitCode::FAILURE
        }
    }
}
