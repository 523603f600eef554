use crate::pipeline::{self, format_response, ExecutionOptions, Report, Status};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Extra time granted to a worker on top of the interpreter's own deadline.
const WORKER_GRACE: Duration = Duration::from_secs(1);

/// The body of `POST /run`. Missing fields default to empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunRequest {
    pub code: String,
    /// Lines handed to `INPUT` and `INPUT_INT`.
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResponse {
    pub output: String,
    pub status: Status,
}

/// Failures of the service itself, as opposed to errors in the submitted program.
#[derive(Debug, thiserror::Error)]
pub enum InternalFault {
    #[error("malformed request body: {0}")]
    MalformedBody(#[from] serde_json::Error),
    #[error("execution worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
    #[error("execution did not finish within {0} ms")]
    Unresponsive(u128),
}

/// Decode a request body. An empty body, or `null`, is the same as `{}`.
pub fn decode_request(body: &[u8]) -> Result<RunRequest, InternalFault> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RunRequest::default());
    }
    let request: Option<RunRequest> = serde_json::from_slice(body)?;
    Ok(request.unwrap_or_default())
}

/// Handle `POST /run`. Whatever happens, the caller gets a response.
pub async fn run_code(body: &[u8], options: Arc<ExecutionOptions>) -> RunResponse {
    match execute_request(body, options).await {
        Ok(Report { output, status }) => RunResponse { output, status },
        Err(fault) => {
            warn!(error = %fault, "Internal fault while running code");
            let message = format!("An internal server error occurred: {fault}");
            RunResponse {
                output: format_response("", "", &message),
                status: Status::InternalError,
            }
        }
    }
}

async fn execute_request(
    body: &[u8],
    options: Arc<ExecutionOptions>,
) -> Result<Report, InternalFault> {
    let request = decode_request(body)?;
    let deadline = options.budget.timeout + WORKER_GRACE;
    // The interpreter is single-threaded and recursive: it gets a blocking worker of its own.
    let worker = tokio::task::spawn_blocking(move || {
        pipeline::run(&request.code, &request.input, &options)
    });
    match tokio::time::timeout(deadline, worker).await {
        Ok(report) => Ok(report?),
        Err(_) => Err(InternalFault::Unresponsive(deadline.as_millis())),
    }
}
