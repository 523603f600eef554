use crate::helpers::{execute, execute_err, try_execute};
use bolton::interpreter::ExecutionBudget;
use bolton::pipeline::FALLBACK_OUTPUT;
use bolton::{run, ExecutionOptions, Status};
use insta::assert_snapshot;
use std::time::Duration;

#[test]
fn printed_text_is_returned() {
    assert_eq!(execute(r#"PRINT("hi")"#), "hi\n");
}

#[test]
fn the_final_value_is_returned() {
    assert_eq!(execute("1 + 2"), "3");
    assert_eq!(execute("PRINT(\"first\")\n\"last\""), "first\n\nlast");
}

#[test]
fn nothing_to_show_falls_back_to_a_notice() {
    assert_eq!(execute(""), FALLBACK_OUTPUT);
    assert_eq!(execute("NULL"), FALLBACK_OUTPUT);
    assert_eq!(execute("# only a comment"), FALLBACK_OUTPUT);
}

#[test]
fn lexical_errors_stop_the_pipeline() {
    let output = execute_err(r#"PRINT("hi)"#);
    assert_snapshot!(output, @r###"
    Expected Character: '"' (to close the string)
    File <stdin>, line 1

    PRINT("hi)
          ^^^^
    "###);
}

#[test]
fn syntax_errors_stop_the_pipeline() {
    let output = execute_err("VAR x =");
    assert_snapshot!(output, @r###"
    Invalid Syntax: Expected int, float, string, identifier, '+', '-', '(', '[', 'IF', 'FOR', 'WHILE', 'FUN' or 'NOT'
    File <stdin>, line 1

    VAR x =
           ^
    "###);
}

#[test]
fn runtime_errors_keep_earlier_output() {
    let output = execute_err("PRINT(\"before\")\n1 / 0");
    assert_snapshot!(output, @r###"
    before

    Traceback (most recent call last):
      File <stdin>, line 2, in <program>
    Runtime Error: Division by zero

    1 / 0
    ^^^^^
    "###);
}

#[test]
fn runaway_loops_exhaust_the_step_budget() {
    let options = ExecutionOptions {
        budget: ExecutionBudget {
            max_steps: 10_000,
            ..ExecutionBudget::default()
        },
        ..ExecutionOptions::default()
    };
    let report = try_execute("WHILE 1 THEN\nEND", &options);
    assert_eq!(report.status, Status::Error);
    assert!(
        report.output.contains("Execution exceeded the limit of 10000 steps"),
        "{}",
        report.output
    );
}

#[test]
fn runaway_loops_time_out() {
    let options = ExecutionOptions {
        budget: ExecutionBudget {
            timeout: Duration::ZERO,
            ..ExecutionBudget::default()
        },
        ..ExecutionOptions::default()
    };
    let report = try_execute("WHILE 1 THEN\nEND", &options);
    assert_eq!(report.status, Status::Error);
    assert!(report.output.contains("Execution timed out"), "{}", report.output);
}

#[test]
fn unbounded_recursion_hits_the_call_depth_limit() {
    // The server runs programs on threads with a larger stack than the test harness default.
    let output = std::thread::Builder::new()
        .stack_size(16 * 1024 * 1024)
        .spawn(|| execute_err("FUN f() -> f()\nf()"))
        .unwrap()
        .join()
        .unwrap();
    assert!(output.contains("Maximum call depth of 200 exceeded"), "{output}");
}

#[test]
fn runaway_printing_hits_the_output_cap() {
    let options = ExecutionOptions {
        budget: ExecutionBudget {
            max_output_bytes: 64,
            ..ExecutionBudget::default()
        },
        ..ExecutionOptions::default()
    };
    let report = try_execute("WHILE 1 THEN PRINT(\"spam\")", &options);
    assert_eq!(report.status, Status::Error);
    assert!(report.output.len() < 1024, "{}", report.output);
}

#[test]
fn concurrent_executions_are_isolated() {
    std::thread::scope(|scope| {
        let redefining = scope.spawn(|| {
            for _ in 0..50 {
                let report = run("VAR PRINT = 5\nPRINT", "", &ExecutionOptions::default());
                assert_eq!(report.output, "5, 5");
            }
        });
        let printing = scope.spawn(|| {
            for _ in 0..50 {
                let report = run("PRINT(\"ok\")", "", &ExecutionOptions::default());
                assert_eq!(report.status, Status::Ok);
                assert_eq!(report.output, "ok\n");
            }
        });
        redefining.join().unwrap();
        printing.join().unwrap();
    });
}

#[test]
fn growing_a_list_in_place_hits_the_memory_limit() {
    let options = ExecutionOptions {
        budget: ExecutionBudget {
            max_allocated_bytes: 64 * 1024,
            ..ExecutionBudget::default()
        },
        ..ExecutionOptions::default()
    };
    let report = try_execute("VAR a = [1]\nWHILE 1 THEN EXTEND(a, a)", &options);
    assert_eq!(report.status, Status::Error);
    assert!(
        report
            .output
            .contains("Runtime Error: Execution exceeded the memory limit of 65536 bytes"),
        "{}",
        report.output
    );
}

#[test]
fn copies_of_a_long_string_share_its_text() {
    let source = r#"FUN build()
VAR a = ["a" * 1000000]
FOR i = 0 TO 14 THEN EXTEND(a, a)
RETURN LEN(a)
END
build()"#;
    assert_eq!(execute(source), "<function build>, 16384");
}

#[test]
fn the_final_value_is_capped_at_the_output_limit() {
    let options = ExecutionOptions {
        budget: ExecutionBudget {
            max_output_bytes: 64,
            ..ExecutionBudget::default()
        },
        ..ExecutionOptions::default()
    };
    let report = try_execute(r#""x" * 1000"#, &options);
    assert_eq!(report.status, Status::Ok);
    assert_eq!(report.output, format!("{}...", "x".repeat(64)));
}
