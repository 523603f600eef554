//! One Bolton execution, from source text to the report sent back to the caller.
//!
//! Every execution gets its own environment and its own console: nothing is shared between
//! two executions, so any number of them can run side by side.
use crate::interpreter::{
    capture, global_environment, Console, Context, Environment, ExecutionBudget, Interpreter,
    RuntimeError,
};
use crate::parser::{parse, SyntaxError};
use crate::scanner::{tokenize, LexError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

pub use crate::interpreter::PROGRAM_CONTEXT;

/// The name submitted code goes by in diagnostics.
pub const SOURCE_NAME: &str = "<stdin>";
pub const FALLBACK_OUTPUT: &str = "Execution completed with no explicit output.";

#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    pub budget: ExecutionBudget,
    /// The directory `RUN` loads scripts from. `RUN` fails when it is not set.
    pub scripts: Option<PathBuf>,
}

/// How the pipeline ended. Exactly one stage outcome is ever reported.
#[derive(Debug)]
pub enum Outcome {
    LexError(LexError),
    SyntaxError(SyntaxError),
    RuntimeError(RuntimeError),
    /// The program's final value, already rendered and capped at the output limit.
    Value(String),
}

impl Outcome {
    pub fn is_error(&self) -> bool {
        !matches!(self, Outcome::Value(_))
    }

    /// Errors render as their diagnostic.
    pub fn into_text(self) -> String {
        match self {
            Outcome::LexError(e) => e.to_string(),
            Outcome::SyntaxError(e) => e.to_string(),
            Outcome::RuntimeError(e) => e.to_string(),
            Outcome::Value(text) => text,
        }
    }
}

/// Run `code` through the scanner, the parser and the interpreter, stopping at the first
/// stage that fails.
///
/// The final value leaves out `NULL` statement values and is rendered before the interpreter
/// goes away: lists are emptied once their execution is over.
pub fn execute(
    code: &str,
    environment: &mut Environment,
    console: &mut Console,
    options: &ExecutionOptions,
) -> Outcome {
    let tokens = match tokenize(SOURCE_NAME, code) {
        Ok(tokens) => tokens,
        Err(e) => {
            debug!(error = %e.kind, "Lexing failed");
            return Outcome::LexError(e);
        }
    };
    debug!(tokens = tokens.iter().count(), "Lexing succeeded");

    let program = match parse(tokens) {
        Ok(program) => program,
        Err(e) => {
            debug!(error = %e.message, "Parsing failed");
            return Outcome::SyntaxError(e);
        }
    };
    debug!("Parsing succeeded");

    let mut interpreter = Interpreter::new(console, options.budget.clone(), options.scripts.clone());
    let mut context = Context::new(PROGRAM_CONTEXT, environment);
    match interpreter.evaluate(&program, &mut context) {
        Ok(value) => {
            debug!("Evaluation succeeded");
            Outcome::Value(value.to_result_text(options.budget.max_output_bytes))
        }
        Err(e) => {
            debug!(error = %e.message, "Evaluation failed");
            Outcome::RuntimeError(e)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The program ran to completion.
    Ok,
    /// The program was rejected by the scanner or the parser, or failed at runtime.
    Error,
    /// The service itself failed while handling the request.
    InternalError,
}

/// The text shown to the caller, together with how the execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub output: String,
    pub status: Status,
}

/// Execute `code` in a fresh environment, feeding it `input` line by line.
pub fn run(code: &str, input: &str, options: &ExecutionOptions) -> Report {
    let mut environment = global_environment();
    let (outcome, captured) = capture(input, options.budget.max_output_bytes, |console| {
        execute(code, &mut environment, console, options)
    });
    let status = if outcome.is_error() {
        Status::Error
    } else {
        Status::Ok
    };
    Report {
        output: format_response(&captured.stdout, &captured.stderr, &outcome.into_text()),
        status,
    }
}

/// Join the non-empty parts with a line break, falling back to [`FALLBACK_OUTPUT`] when
/// there is nothing to show.
pub fn format_response(stdout: &str, stderr: &str, result: &str) -> String {
    let output = [stdout, stderr, result]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if output.trim().is_empty() {
        FALLBACK_OUTPUT.to_owned()
    } else {
        output
    }
}
