pub mod config;
pub mod diagnostic;
pub mod interpreter;
pub mod parser;
pub mod paths;
pub mod pipeline;
pub mod scanner;
pub mod server;

pub use config::Config;
pub use pipeline::{run, ExecutionOptions, Report, Status};
pub use server::Server;
