use crate::helpers::{execute, execute_err};
use insta::assert_snapshot;

#[test]
fn declare_and_invoke_function() {
    let source = r#"FUN greet(first, last)
    PRINT("Hi, " + first + " " + last + "!")
END

greet("Dear", "Reader")"#;
    let output = execute(source);
    assert_snapshot!(output, @r###"
    Hi, Dear Reader!

    <function greet>
    "###);
}

#[test]
fn arrow_functions_return_their_expression() {
    assert_eq!(execute("FUN add(a, b) -> a + b; add(1, 2)"), "<function add>, 3");
}

#[test]
fn recursion_with_early_returns() {
    let source = r#"FUN fib(n)
    IF n < 2 THEN RETURN n
    RETURN fib(n - 1) + fib(n - 2)
END
PRINT(fib(10))"#;
    let output = execute(source);
    assert_snapshot!(output, @r###"
    55

    <function fib>
    "###);
}

#[test]
fn block_functions_without_return_yield_null() {
    let output = execute("FUN f()\n    1\nEND\nPRINT(f())");
    assert_eq!(output, "NULL\n\n<function f>");
}

#[test]
fn anonymous_functions_are_values() {
    let output = execute("VAR twice = FUN (x) -> x * 2\ntwice(21)");
    assert_eq!(output, "<function <anonymous>>, 42");
}

#[test]
fn arity_is_checked() {
    let output = execute_err("FUN f(a) -> a\nf(1, 2)");
    assert!(output.contains("Runtime Error: 1 too many args passed into 'f'"), "{output}");
    let output = execute_err("FUN f(a, b) -> a\nf(1)");
    assert!(output.contains("Runtime Error: 1 too few args passed into 'f'"), "{output}");
}

#[test]
fn callees_see_the_callers_variables() {
    let source = r#"FUN show() -> secret
FUN wrapper()
    VAR secret = "from the caller"
    RETURN show()
END
PRINT(wrapper())"#;
    let output = execute(source);
    assert_snapshot!(output, @r###"
    from the caller

    <function show>, <function wrapper>
    "###);
}

#[test]
fn function_scope_does_not_leak() {
    let source = r#"FUN f()
    VAR c = 1
END
f()
c"#;
    let output = execute_err(source);
    assert_snapshot!(output, @r###"
    Traceback (most recent call last):
      File <stdin>, line 5, in <program>
    Runtime Error: 'c' is not defined

    c
    ^
    "###);
}

#[test]
fn calling_a_non_function_fails() {
    let output = execute_err("VAR x = 3\nx()");
    assert!(output.contains("Runtime Error: `3` is not callable."), "{output}");
}
