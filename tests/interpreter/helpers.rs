use bolton::{run, ExecutionOptions, Report, Status};

/// Execute the provided Bolton source code.
/// It returns the text the caller would see: captured output followed by the final value.
/// Panics if the program fails, either at parsing time or at runtime.
pub fn execute(source: &str) -> String {
    execute_with_input(source, "")
}

/// Execute the provided Bolton source code, feeding `input` to `INPUT` and `INPUT_INT`.
pub fn execute_with_input(source: &str, input: &str) -> String {
    let report = run(source, input, &ExecutionOptions::default());
    assert_eq!(report.status, Status::Ok, "{}", report.output);
    report.output
}

/// Execute the provided Bolton source code, expecting it to fail.
/// It returns the rendered diagnostic, preceded by whatever was printed before the failure.
pub fn execute_err(source: &str) -> String {
    let report = try_execute(source, &ExecutionOptions::default());
    assert_eq!(report.status, Status::Error, "{}", report.output);
    report.output
}

pub fn try_execute(source: &str, options: &ExecutionOptions) -> Report {
    run(source, "", options)
}
