mod assets;
pub mod handler;
pub mod http;

pub use assets::AssetRoot;

use crate::config::Config;
use crate::pipeline::ExecutionOptions;
use anyhow::Context;
use self::http::{Request, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// The playground's HTTP server.
pub struct Server {
    listener: TcpListener,
    routes: Arc<Routes>,
}

struct Routes {
    assets: AssetRoot,
    options: Arc<ExecutionOptions>,
}

impl Server {
    pub async fn bind(config: &Config) -> anyhow::Result<Self> {
        let (host, port) = config.address();
        let listener = TcpListener::bind((host, port))
            .await
            .with_context(|| format!("Failed to bind to host {host}, port {port}"))?;
        Ok(Self {
            listener,
            routes: Arc::new(Routes {
                assets: AssetRoot::new(&config.assets),
                options: Arc::new(config.execution_options()),
            }),
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read the listening address")
    }

    /// Accept connections until the task is dropped. Each connection gets its own task.
    pub async fn run(self) -> anyhow::Result<()> {
        info!(address = %self.local_addr()?, "Listening");
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(connection) => connection,
                Err(e) => {
                    warn!(error = %e, "Failed to accept a connection");
                    continue;
                }
            };
            let routes = Arc::clone(&self.routes);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, &routes).await {
                    debug!(%peer, error = %e, "Failed to write the response");
                }
            });
        }
    }
}

async fn handle_connection(mut stream: TcpStream, routes: &Routes) -> std::io::Result<()> {
    let started = Instant::now();
    let response = match self::http::read_request(&mut stream).await {
        Ok(request) => {
            let response = routes.route(&request).await;
            info!(
                method = %request.method,
                path = %request.path,
                status = response.status,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Handled request"
            );
            response
        }
        Err(e) => {
            warn!(error = %e, "Rejected a malformed request");
            Response::text(e.status(), e.to_string())
        }
    };
    response.write_to(&mut stream).await
}

impl Routes {
    async fn route(&self, request: &Request) -> Response {
        match (request.method.as_str(), request.path.as_str()) {
            ("POST", "/run" | "/run-bolton") => {
                let response = handler::run_code(&request.body, Arc::clone(&self.options)).await;
                Response::json(&response)
            }
            ("GET", path) => self.assets.serve(path).await,
            _ => Response::method_not_allowed(),
        }
    }
}
