use anyhow::Context;
use bolton::{Config, Server};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Executions run the recursive tree-walker on the runtime's blocking threads.
const WORKER_STACK_SIZE: usize = 16 * 1024 * 1024;

fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Logs go to stderr; `RUST_LOG` overrides the default level.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("bolton=info".parse()?))
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_stack_size(WORKER_STACK_SIZE)
        .build()
        .context("Failed to start the async runtime")?;

    runtime.block_on(async {
        let server = Server::bind(&config).await?;
        server.run().await
    })
}
