use crate::helpers::{execute, execute_err, execute_with_input, try_execute};
use bolton::{ExecutionOptions, Status};
use insta::assert_snapshot;

#[test]
fn print_ret_returns_the_text_instead_of_printing_it() {
    assert_eq!(execute(r#"PRINT_RET(1.5) + "!""#), "1.5!");
}

#[test]
fn type_predicates() {
    let output = execute("[IS_NUM(1), IS_STR(\"a\"), IS_LIST([]), IS_FUN(PRINT), IS_FUN(1)]");
    assert_eq!(output, "1, 1, 1, 1, 0");
}

#[test]
fn list_builtins_mutate_in_place() {
    let source = r#"VAR items = [1, 2]
APPEND(items, 3)
EXTEND(items, [4, 5])
PRINT(POP(items, 0))
PRINT(LEN(items))
PRINT(items)"#;
    let output = execute(source);
    // The final value shows `items` as it is when the program ends.
    assert_snapshot!(output, @r###"
    1
    4
    2, 3, 4, 5

    2, 3, 4, 5
    "###);
}

#[test]
fn list_builtins_validate_their_arguments() {
    let output = execute_err("APPEND(1, 2)");
    assert!(output.contains("Runtime Error: First argument must be list"), "{output}");
    let output = execute_err("EXTEND([1], 2)");
    assert!(output.contains("Runtime Error: Second argument must be list"), "{output}");
    let output = execute_err("LEN(1)");
    assert!(output.contains("Runtime Error: Argument must be list"), "{output}");
    let output = execute_err("POP([1], 5)");
    assert!(
        output.contains("could not be removed from list because index is out of bounds"),
        "{output}"
    );
}

#[test]
fn input_reads_one_line_at_a_time() {
    let output = execute_with_input(r#"PRINT("Hello, " + INPUT() + " and " + INPUT())"#, "Ada\nGrace\n");
    assert_eq!(output, "Hello, Ada and Grace\n");
}

#[test]
fn input_int_retries_until_it_reads_an_integer() {
    let output = execute_with_input("INPUT_INT() * 6", "abc\n7\n");
    assert_snapshot!(output, @r###"
    'abc' must be an integer. Try again!

    42
    "###);
}

#[test]
fn exhausted_input_warns_and_yields_an_empty_string() {
    let output = execute_with_input("INPUT()", "");
    assert_eq!(output, "INPUT: no input left, using an empty string\n");
}

#[test]
fn clear_discards_earlier_output() {
    assert_eq!(execute("PRINT(\"gone\")\nCLEAR()\nPRINT(\"kept\")"), "kept\n");
}

#[test]
fn math_pi_is_predefined() {
    assert_eq!(execute("MATH_PI > 3.14 AND MATH_PI < 3.15"), "1");
}

fn with_scripts(scripts: &[(&str, &str)]) -> (tempfile::TempDir, ExecutionOptions) {
    let directory = tempfile::tempdir().unwrap();
    for (name, text) in scripts {
        std::fs::write(directory.path().join(name), text).unwrap();
    }
    let options = ExecutionOptions {
        scripts: Some(directory.path().to_path_buf()),
        ..ExecutionOptions::default()
    };
    (directory, options)
}

#[test]
fn run_defines_into_the_calling_environment() {
    let (_directory, options) = with_scripts(&[("lib.bolton", "FUN double(x) -> x * 2")]);
    let report = try_execute("RUN(\"lib.bolton\")\ndouble(21)", &options);
    assert_eq!(report.status, Status::Ok, "{}", report.output);
    assert_eq!(report.output, "42");
}

#[test]
fn run_reports_failures_inside_the_script() {
    let (_directory, options) = with_scripts(&[("bad.bolton", "1 / 0")]);
    let report = try_execute("RUN(\"bad.bolton\")", &options);
    assert_eq!(report.status, Status::Error);
    assert!(
        report
            .output
            .contains("Runtime Error: Failed to finish executing script \"bad.bolton\""),
        "{}",
        report.output
    );
    assert!(report.output.contains("Division by zero"), "{}", report.output);
}

#[test]
fn run_cannot_escape_the_script_directory() {
    let (_directory, options) = with_scripts(&[]);
    let report = try_execute("RUN(\"../secret.bolton\")", &options);
    assert_eq!(report.status, Status::Error);
    assert!(
        report
            .output
            .contains("Failed to load script \"../secret.bolton\"\nScript path must stay inside the script directory"),
        "{}",
        report.output
    );
}

#[test]
fn run_is_disabled_without_a_script_directory() {
    let output = execute_err("RUN(\"lib.bolton\")");
    assert!(output.contains("Running scripts is disabled on this server"), "{output}");
}

#[test]
fn print_ret_is_held_to_the_length_limit() {
    let options = ExecutionOptions {
        budget: bolton::interpreter::ExecutionBudget {
            max_collection_len: 10,
            ..Default::default()
        },
        ..ExecutionOptions::default()
    };
    let report = try_execute("PRINT_RET([1, 2, 3, 4, 5, 6])", &options);
    assert_eq!(report.status, Status::Error);
    assert!(
        report.output.contains("Result would exceed the limit of 10 elements"),
        "{}",
        report.output
    );
}
