use crate::interpreter::ExecutionBudget;
use crate::pipeline::ExecutionOptions;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Serve a Bolton playground over HTTP.
///
/// Every flag can also be set through the environment variable named next to it.
#[derive(Parser, Debug, Clone)]
#[command(name = "bolton", about = "Bolton playground server", version)]
pub struct Config {
    /// Address to bind to.
    #[arg(long, env = "BOLTON_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on. `0` picks a free port.
    #[arg(long, env = "BOLTON_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Directory holding `index.html` and the other front-end files.
    #[arg(long, env = "BOLTON_ASSETS", default_value = ".")]
    pub assets: PathBuf,

    /// Directory the `RUN` built-in loads scripts from. `RUN` is disabled when unset.
    #[arg(long, env = "BOLTON_SCRIPTS")]
    pub scripts: Option<PathBuf>,

    /// Wall-clock limit for a single execution, in milliseconds.
    #[arg(long = "timeout-ms", env = "BOLTON_TIMEOUT_MS", default_value_t = 2000)]
    pub timeout_ms: u64,

    /// Number of evaluation steps a single execution may take.
    #[arg(long = "max-steps", env = "BOLTON_MAX_STEPS", default_value_t = 5_000_000)]
    pub max_steps: u64,

    /// Maximum depth of nested function calls.
    #[arg(long = "max-call-depth", env = "BOLTON_MAX_CALL_DEPTH", default_value_t = 200)]
    pub max_call_depth: usize,
}

impl Config {
    /// Host and port to listen on. Kept apart so IPv6 hosts need no brackets.
    pub fn address(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }

    pub fn execution_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            budget: ExecutionBudget {
                timeout: Duration::from_millis(self.timeout_ms),
                max_steps: self.max_steps,
                max_call_depth: self.max_call_depth,
                ..ExecutionBudget::default()
            },
            scripts: self.scripts.clone(),
        }
    }
}
